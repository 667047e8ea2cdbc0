//! Label text handling: DSL escaping and approximate pixel measurement.
//!
//! Model labels hold real newlines and quotes. In DSL text a newline is the
//! inline `<br/>` token, and `"`, `#` and `<` are `#name;` / `#NNN;` entities.

use unicode_width::UnicodeWidthStr;

pub const LINE_BREAK_TOKEN: &str = "<br/>";
pub const QUOTE_ENTITY: &str = "#quot;";
const HASH_ENTITY: &str = "#35;";
const LT_ENTITY: &str = "#lt;";

const CHAR_WIDTH: f64 = 8.0;
const LINE_HEIGHT: f64 = 18.0;

pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Split text on `<br/>`, `<br>`, `<br />` (case-insensitive).
pub fn split_br(s: &str) -> Vec<&str> {
    let lower = s.to_ascii_lowercase();
    let bytes = lower.as_bytes();
    let mut result = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i + 3 < bytes.len() {
        if bytes[i] == b'<' && bytes[i + 1] == b'b' && bytes[i + 2] == b'r' {
            let tag_len = if bytes[i + 3] == b'>' {
                4
            } else if i + 5 <= bytes.len() && bytes[i + 3] == b'/' && bytes[i + 4] == b'>' {
                5
            } else if i + 6 <= bytes.len()
                && bytes[i + 3] == b' '
                && bytes[i + 4] == b'/'
                && bytes[i + 5] == b'>'
            {
                6
            } else {
                0
            };

            if tag_len > 0 {
                result.push(&s[start..i]);
                start = i + tag_len;
                i = start;
                continue;
            }
        }
        i += 1;
    }
    result.push(&s[start..]);
    result
}

/// Turn raw DSL label text into a model label.
pub fn decode_label(raw: &str) -> String {
    decode_entities(&split_br(raw.trim()).join("\n"))
}

/// Replace `#name;` and `#NNN;` entities. Anything else after `#` is kept.
fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(at) = rest.find('#') {
        out.push_str(&rest[..at]);
        let tail = &rest[at + 1..];
        let decoded = tail
            .find(';')
            .and_then(|end| entity(&tail[..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('#');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

fn entity(name: &str) -> Option<char> {
    match name {
        "quot" => Some('"'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        _ if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) => {
            name.parse::<u32>().ok().and_then(char::from_u32)
        }
        _ => None,
    }
}

/// Turn a model label into DSL label text. Never contains a raw newline or
/// double quote, so it can always be wrapped in quotes.
pub fn encode_label(label: &str) -> String {
    label
        .replace("\r\n", "\n")
        .replace('#', HASH_ENTITY)
        .replace('"', QUOTE_ENTITY)
        .replace('<', LT_ENTITY)
        .replace('\n', LINE_BREAK_TOKEN)
}

/// Whether an encoded label must be quoted inside shape brackets.
pub fn needs_quotes(encoded: &str) -> bool {
    encoded.is_empty()
        || encoded != encoded.trim()
        || encoded
            .chars()
            .any(|c| matches!(c, '[' | ']' | '(' | ')' | '{' | '}' | '|' | '>' | ';' | ':' | '&'))
}

/// Whether the text can stand as a bare identifier in every dialect.
pub fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Derive an identifier from free text: runs of non-identifier characters
/// collapse to a single underscore.
pub fn slugify(text: &str) -> String {
    let mut slug = String::new();
    let mut pending_sep = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            slug.push(c);
            pending_sep = false;
        } else {
            pending_sep = true;
        }
    }
    if slug.is_empty() { "node".to_string() } else { slug }
}

/// Approximate rendered size of a (multi-line) label in pixels.
pub fn measure(label: &str) -> (f64, f64) {
    let lines: Vec<&str> = label.split('\n').collect();
    let widest = lines.iter().map(|l| display_width(l)).max().unwrap_or(0);
    #[allow(clippy::cast_precision_loss)]
    let size = (widest as f64 * CHAR_WIDTH, lines.len() as f64 * LINE_HEIGHT);
    size
}
