use tracing::trace;
use winnow::prelude::*;
use winnow::ascii::{float, space0, space1, till_line_ending};
use winnow::combinator::{alt, delimited, eof, opt, preceded};
use winnow::token::take_till;

use crate::label::decode_label;
use crate::pie_ast::PieToken;

pub fn tokenize(input: &str) -> Vec<PieToken> {
    let mut tokens = Vec::new();
    for (index, raw) in input.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with("%%") {
            continue;
        }
        match pie_line.parse(line) {
            Ok(token) => tokens.push(token),
            Err(_) => trace!(line = index + 1, text = line, "skipping pie line"),
        }
    }
    tokens
}

fn pie_line(input: &mut &str) -> winnow::Result<PieToken> {
    alt((header, ("showData", space0, eof).value(PieToken::ShowData), title_line, slice)).parse_next(input)
}

fn header(input: &mut &str) -> winnow::Result<PieToken> {
    "pie".parse_next(input)?;
    let show_data = opt((space1, "showData")).parse_next(input)?.is_some();
    let title = opt(preceded(space1, title_line)).parse_next(input)?;
    space0.parse_next(input)?;
    eof.parse_next(input)?;
    Ok(PieToken::Header {
        show_data,
        title: title.and_then(|t| match t {
            PieToken::Title(text) => Some(text),
            _ => None,
        }),
    })
}

fn title_line(input: &mut &str) -> winnow::Result<PieToken> {
    "title".parse_next(input)?;
    space1.parse_next(input)?;
    let text = till_line_ending.parse_next(input)?;
    Ok(PieToken::Title(decode_label(text)))
}

fn slice(input: &mut &str) -> winnow::Result<PieToken> {
    let label = delimited('"', take_till(0.., '"'), '"').parse_next(input)?;
    space0.parse_next(input)?;
    ':'.parse_next(input)?;
    space0.parse_next(input)?;
    let value: f64 = float.parse_next(input)?;
    space0.parse_next(input)?;
    Ok(PieToken::Slice {
        label: decode_label(label),
        value,
    })
}
