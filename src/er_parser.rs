use tracing::trace;
use winnow::prelude::*;
use winnow::ascii::{space0, space1, till_line_ending};
use winnow::combinator::{alt, delimited, eof, opt, preceded};
use winnow::token::{take_till, take_while};

use crate::er_ast::*;
use crate::label::decode_label;
use crate::model::{Cardinality, ErAttribute, Relation};

/// Tokenize an ER diagram. Lines between `NAME {` and `}` are read as
/// attributes.
pub fn tokenize(input: &str) -> Vec<ErToken> {
    let mut tokens = Vec::new();
    let mut in_block = false;
    for (index, raw) in input.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with("%%") {
            continue;
        }
        let parsed = if in_block {
            block_line.parse(line)
        } else {
            er_line.parse(line)
        };
        match parsed {
            Ok(token) => {
                match token {
                    ErToken::BlockStart(_) => in_block = true,
                    ErToken::BlockEnd => in_block = false,
                    _ => {}
                }
                tokens.push(token);
            }
            Err(_) => trace!(line = index + 1, text = line, in_block, "skipping ER line"),
        }
    }
    tokens
}

fn er_line(input: &mut &str) -> winnow::Result<ErToken> {
    alt((
        ("erDiagram", space0, eof).value(ErToken::Header),
        relationship_line.map(ErToken::Relationship),
        (er_identifier, space0, '{', space0, '}', space0, eof)
            .map(|(name, ..)| ErToken::Entity(name.to_string())),
        (er_identifier, space0, '{', space0, eof).map(|(name, ..)| ErToken::BlockStart(name.to_string())),
        (er_identifier, space0, eof).map(|(name, ..)| ErToken::Entity(name.to_string())),
    ))
    .parse_next(input)
}

fn block_line(input: &mut &str) -> winnow::Result<ErToken> {
    alt((
        ('}', space0, eof).value(ErToken::BlockEnd),
        entity_attribute.map(ErToken::Attribute),
    ))
    .parse_next(input)
}

fn entity_attribute(input: &mut &str) -> winnow::Result<ErAttribute> {
    let attr_type = er_identifier.parse_next(input)?;
    space1.parse_next(input)?;
    let name = er_identifier.parse_next(input)?;
    let constraint = opt(preceded(space1, till_line_ending)).parse_next(input)?;

    Ok(ErAttribute {
        attr_type: attr_type.to_string(),
        name: name.to_string(),
        constraint: constraint.map(str::trim).filter(|c| !c.is_empty()).map(str::to_string),
    })
}

fn er_identifier<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    take_while(1.., |c: char| c.is_alphanumeric() || c == '_' || c == '-').parse_next(input)
}

fn relationship_line(input: &mut &str) -> winnow::Result<Relationship> {
    let from = er_identifier.parse_next(input)?;
    space1.parse_next(input)?;
    let relation = cardinality.parse_next(input)?;
    space1.parse_next(input)?;
    let to = er_identifier.parse_next(input)?;
    space0.parse_next(input)?;
    let label = opt(preceded((':', space0), relationship_label)).parse_next(input)?;
    space0.parse_next(input)?;

    Ok(Relationship {
        from: from.to_string(),
        to: to.to_string(),
        relation,
        label: label.filter(|l| !l.is_empty()),
    })
}

fn relationship_label(input: &mut &str) -> winnow::Result<String> {
    let raw = alt((delimited('"', take_till(0.., '"'), '"'), till_line_ending)).parse_next(input)?;
    Ok(decode_label(raw))
}

fn cardinality(input: &mut &str) -> winnow::Result<Relation> {
    let left = take_while(2, |c: char| matches!(c, '|' | 'o' | '{' | '}'))
        .verify_map(parse_left_cardinality)
        .parse_next(input)?;
    let identifying = alt(("--".value(true), "..".value(false))).parse_next(input)?;
    let right = take_while(2, |c: char| matches!(c, '|' | 'o' | '{' | '}'))
        .verify_map(parse_right_cardinality)
        .parse_next(input)?;
    Ok(Relation {
        left,
        right,
        identifying,
    })
}

/// Both the canonical `|o` and the mirrored `o|` are read as zero-or-one.
fn parse_left_cardinality(s: &str) -> Option<Cardinality> {
    match s {
        "||" => Some(Cardinality::ExactlyOne),
        "|o" | "o|" => Some(Cardinality::ZeroOrOne),
        "}|" => Some(Cardinality::OneOrMany),
        "}o" => Some(Cardinality::ZeroOrMany),
        _ => None,
    }
}

fn parse_right_cardinality(s: &str) -> Option<Cardinality> {
    match s {
        "||" => Some(Cardinality::ExactlyOne),
        "o|" | "|o" => Some(Cardinality::ZeroOrOne),
        "|{" => Some(Cardinality::OneOrMany),
        "o{" => Some(Cardinality::ZeroOrMany),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_er_identifier_with_hyphen() {
        let mut input = "LINE-ITEM rest";
        assert_eq!(er_identifier(&mut input).unwrap(), "LINE-ITEM");
    }

    #[test]
    fn parse_cardinality_one_to_many() {
        let mut input = "||--o{ rest";
        let rel = cardinality(&mut input).unwrap();
        assert_eq!(input, " rest");
        assert_eq!(rel.left, Cardinality::ExactlyOne);
        assert_eq!(rel.right, Cardinality::ZeroOrMany);
        assert!(rel.identifying);
    }

    #[test]
    fn parse_cardinality_non_identifying() {
        let mut input = "}o..o{ rest";
        let rel = cardinality(&mut input).unwrap();
        assert_eq!(rel.left, Cardinality::ZeroOrMany);
        assert_eq!(rel.right, Cardinality::ZeroOrMany);
        assert!(!rel.identifying);
    }

    #[test]
    fn parse_cardinality_zero_or_one_both_spellings() {
        for text in ["|o--o| x", "o|--|o x"] {
            let mut input = text;
            let rel = cardinality(&mut input).unwrap();
            assert_eq!(rel.left, Cardinality::ZeroOrOne, "{text}");
            assert_eq!(rel.right, Cardinality::ZeroOrOne, "{text}");
        }
    }

    #[test]
    fn parse_cardinality_rejects_garbage() {
        let mut input = "{{--}} x";
        assert!(cardinality(&mut input).is_err());
    }

    #[test]
    fn parse_relationship_labels() {
        let tokens = tokenize("CUSTOMER }o--|| ADDRESS : billing address");
        let ErToken::Relationship(rel) = &tokens[0] else {
            panic!("expected relationship, got {tokens:?}");
        };
        assert_eq!(rel.from, "CUSTOMER");
        assert_eq!(rel.to, "ADDRESS");
        assert_eq!(rel.label.as_deref(), Some("billing address"));

        let tokens = tokenize("A ||--|| B : \"has many\"");
        let ErToken::Relationship(rel) = &tokens[0] else {
            panic!("expected relationship");
        };
        assert_eq!(rel.label.as_deref(), Some("has many"));

        let tokens = tokenize("A ||--|| B");
        let ErToken::Relationship(rel) = &tokens[0] else {
            panic!("expected relationship");
        };
        assert_eq!(rel.label, None);
    }

    #[test]
    fn parse_entity_block() {
        let tokens = tokenize("erDiagram\nCUSTOMER {\n  string name PK\n  int age\n}\nEMPTY { }\nLONE\n");
        assert_eq!(
            tokens,
            vec![
                ErToken::Header,
                ErToken::BlockStart("CUSTOMER".into()),
                ErToken::Attribute(ErAttribute {
                    attr_type: "string".into(),
                    name: "name".into(),
                    constraint: Some("PK".into()),
                }),
                ErToken::Attribute(ErAttribute {
                    attr_type: "int".into(),
                    name: "age".into(),
                    constraint: None,
                }),
                ErToken::BlockEnd,
                ErToken::Entity("EMPTY".into()),
                ErToken::Entity("LONE".into()),
            ]
        );
    }
}
