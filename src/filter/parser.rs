//! Recursive-descent parser for RFC 4515 string filters.
//!
//! Lexical pieces (attribute descriptions, OIDs, operators) are nom parsers;
//! the recursive structure and assertion values are walked by hand so that
//! every error carries the byte offset where it was detected.

use super::{extensible_error, ExtensibleMatch, Filter, SubstringFilter};
use crate::config::MAX_NESTING_DEPTH;
use crate::core::byte_string::ByteString;
use crate::error::{constants, FilterParseError};
use crate::schema::oid::{attribute_description, oid};
use nom::branch::alt;
use nom::bytes::complete::{tag, tag_no_case};
use nom::character::complete::char;
use nom::combinator::{opt, peek};
use nom::sequence::{pair, preceded, terminated, tuple};
use nom::IResult;

type ParseResult<T> = Result<T, FilterParseError>;

pub(super) fn parse(input: &str) -> ParseResult<Filter> {
    if input.is_empty() {
        return Err(FilterParseError::new(0, constants::ERR_FILTER_EMPTY));
    }

    let mut parser = Parser { input, pos: 0, depth: 0 };
    let filter = if input.starts_with('(') {
        parser.filter()?
    } else {
        parser.item()?
    };

    if parser.pos != input.len() {
        let reason = if parser.peek() == Some(b')') {
            constants::ERR_FILTER_UNBALANCED
        } else {
            constants::ERR_FILTER_TRAILING
        };
        return Err(FilterParseError::new(parser.pos, reason));
    }
    Ok(filter)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Equal,
    Approx,
    GreaterOrEqual,
    LessOrEqual,
}

/// `attr[:dn][:rule]:=`
struct ExtensibleHead<'a> {
    attribute: Option<&'a str>,
    dn_attributes: bool,
    matching_rule: Option<&'a str>,
}

fn extensible_head(input: &str) -> IResult<&str, ExtensibleHead<'_>> {
    let dn = terminated(tag_no_case(":dn"), peek(char(':')));
    let (rest, (attribute, dn, matching_rule, _)) = tuple((
        opt(attribute_description),
        opt(dn),
        opt(preceded(char(':'), oid)),
        tag(":="),
    ))(input)?;
    Ok((
        rest,
        ExtensibleHead {
            attribute,
            dn_attributes: dn.is_some(),
            matching_rule,
        },
    ))
}

fn simple_head(input: &str) -> IResult<&str, (&str, Operator)> {
    pair(
        attribute_description,
        alt((
            nom::combinator::value(Operator::Approx, tag("~=")),
            nom::combinator::value(Operator::GreaterOrEqual, tag(">=")),
            nom::combinator::value(Operator::LessOrEqual, tag("<=")),
            nom::combinator::value(Operator::Equal, tag("=")),
        )),
    )(input)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn advance_to(&mut self, rest: &str) {
        self.pos = self.input.len() - rest.len();
    }

    fn error<T>(&self, offset: usize, reason: &'static str) -> ParseResult<T> {
        Err(FilterParseError::new(offset, reason))
    }

    /// `filter = "(" filtercomp ")"`
    fn filter(&mut self) -> ParseResult<Filter> {
        if self.peek() != Some(b'(') {
            let reason = if self.pos == self.input.len() {
                constants::ERR_FILTER_UNBALANCED
            } else {
                constants::ERR_FILTER_EXPECTED_OPEN
            };
            return self.error(self.pos, reason);
        }
        if self.depth >= MAX_NESTING_DEPTH {
            return self.error(self.pos, constants::ERR_FILTER_TOO_DEEP);
        }
        self.pos += 1;
        self.depth += 1;

        let filter = match self.peek() {
            Some(b'&') => {
                self.pos += 1;
                Filter::And(self.filter_list()?)
            }
            Some(b'|') => {
                self.pos += 1;
                Filter::Or(self.filter_list()?)
            }
            Some(b'!') => {
                self.pos += 1;
                Filter::Not(Box::new(self.filter()?))
            }
            Some(b')') | None => return self.error(self.pos, constants::ERR_FILTER_EMPTY),
            Some(_) => self.item()?,
        };

        if self.peek() != Some(b')') {
            let reason = if self.pos == self.input.len() {
                constants::ERR_FILTER_EXPECTED_CLOSE
            } else {
                constants::ERR_FILTER_TRAILING
            };
            return self.error(self.pos, reason);
        }
        self.pos += 1;
        self.depth -= 1;
        Ok(filter)
    }

    /// Zero or more filters; an empty list is an absolute true/false
    fn filter_list(&mut self) -> ParseResult<Vec<Filter>> {
        let mut filters = Vec::new();
        while self.peek() == Some(b'(') {
            filters.push(self.filter()?);
        }
        Ok(filters)
    }

    /// A simple, present, substring or extensible item
    fn item(&mut self) -> ParseResult<Filter> {
        let start = self.pos;

        if let Ok((rest, head)) = extensible_head(self.rest()) {
            if let Some(reason) = extensible_error(head.matching_rule, head.attribute) {
                return self.error(start, reason);
            }
            self.advance_to(rest);
            let mut value = self.value(false)?;
            let ext = ExtensibleMatch {
                matching_rule: head.matching_rule.map(str::to_string),
                attribute: head.attribute.map(str::to_string),
                value: ByteString::wrap(value.remove(0)),
                dn_attributes: head.dn_attributes,
            };
            return Ok(Filter::Extensible(ext));
        }

        let (rest, (attribute, operator)) = match simple_head(self.rest()) {
            Ok(parsed) => parsed,
            Err(_) => {
                return match attribute_description(self.rest()) {
                    Ok((rest, _)) => {
                        let offset = self.input.len() - rest.len();
                        self.error(offset, constants::ERR_FILTER_MISSING_OPERATOR)
                    }
                    Err(_) => self.error(start, constants::ERR_FILTER_BAD_ATTRIBUTE),
                };
            }
        };
        self.advance_to(rest);
        let attribute = attribute.to_string();
        let value_start = self.pos;

        if operator != Operator::Equal {
            let mut value = self.value(false)?;
            let value = ByteString::wrap(value.remove(0));
            return Ok(match operator {
                Operator::Approx => Filter::approx(attribute, value),
                Operator::GreaterOrEqual => Filter::greater_or_equal(attribute, value),
                Operator::LessOrEqual => Filter::less_or_equal(attribute, value),
                Operator::Equal => Filter::equality(attribute, value),
            });
        }

        let mut segments = self.value(true)?;
        match segments.len() {
            1 => Ok(Filter::equality(attribute, ByteString::wrap(segments.remove(0)))),
            2 if segments.iter().all(Vec::is_empty) => Ok(Filter::present(attribute)),
            _ => {
                let final_ = segments.pop().map(ByteString::wrap);
                let mut pieces = segments.into_iter().map(ByteString::wrap);
                let initial = pieces.next();
                let any = pieces.collect();
                SubstringFilter::new(attribute, initial, any, final_)
                    .map(Filter::Substrings)
                    .or_else(|_| self.error(value_start, constants::ERR_FILTER_NO_SUBSTRINGS))
            }
        }
    }

    /// Read an assertion value up to the closing parenthesis, decoding `\XX`
    /// escapes. With `split` each unescaped `*` starts a new segment,
    /// otherwise an unescaped `*` is an error.
    fn value(&mut self, split: bool) -> ParseResult<Vec<Vec<u8>>> {
        let bytes = self.input.as_bytes();
        let mut segments = vec![Vec::new()];

        while let Some(&b) = bytes.get(self.pos) {
            match b {
                b')' => break,
                b'(' => return self.error(self.pos, constants::ERR_FILTER_UNBALANCED),
                b'*' if split => {
                    segments.push(Vec::new());
                    self.pos += 1;
                }
                b'*' => return self.error(self.pos, constants::ERR_FILTER_UNEXPECTED_ASTERISK),
                b'\\' => {
                    let decoded = bytes
                        .get(self.pos + 1..self.pos + 3)
                        .filter(|hex| hex.iter().all(u8::is_ascii_hexdigit))
                        .and_then(|hex| std::str::from_utf8(hex).ok())
                        .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                    match decoded {
                        Some(byte) => {
                            if let Some(segment) = segments.last_mut() {
                                segment.push(byte);
                            }
                            self.pos += 3;
                        }
                        None => return self.error(self.pos, constants::ERR_FILTER_BAD_ESCAPE),
                    }
                }
                _ => {
                    if let Some(segment) = segments.last_mut() {
                        segment.push(b);
                    }
                    self.pos += 1;
                }
            }
        }

        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::AttributeValueAssertion;

    fn offset(text: &str) -> usize {
        parse(text).unwrap_err().offset()
    }

    #[test]
    fn test_simple_items() {
        assert_eq!(parse("(cn=Babs Jensen)").unwrap(), Filter::equality("cn", "Babs Jensen"));
        assert_eq!(parse("(uidNumber>=100)").unwrap(), Filter::greater_or_equal("uidNumber", "100"));
        assert_eq!(parse("(uidNumber<=100)").unwrap(), Filter::less_or_equal("uidNumber", "100"));
        assert_eq!(parse("(sn~=jensin)").unwrap(), Filter::approx("sn", "jensin"));
        assert_eq!(parse("(objectClass=*)").unwrap(), Filter::present("objectClass"));
        assert_eq!(parse("(cn=)").unwrap(), Filter::equality("cn", ""));
        assert_eq!(parse("cn=Babs").unwrap(), Filter::equality("cn", "Babs"));
    }

    #[test]
    fn test_composite() {
        let filter = parse("(&(cn=Bob)(!(uid=admin)))").unwrap();
        assert_eq!(
            filter,
            Filter::and(vec![
                Filter::equality("cn", "Bob"),
                Filter::not(Filter::equality("uid", "admin")),
            ])
        );
        assert_eq!(parse("(&)").unwrap(), Filter::and(vec![]));
        assert_eq!(parse("(|)").unwrap(), Filter::or(vec![]));
    }

    #[test]
    fn test_substrings() {
        let filter = parse("(cn=B*a*b*s)").unwrap();
        let Filter::Substrings(sub) = filter else {
            panic!("not a substring filter");
        };
        assert_eq!(sub.initial(), Some(&ByteString::from("B")));
        assert_eq!(sub.any(), &[ByteString::from("a"), ByteString::from("b")]);
        assert_eq!(sub.final_(), Some(&ByteString::from("s")));

        let filter = parse("(cn=*jensen)").unwrap();
        let Filter::Substrings(sub) = filter else {
            panic!("not a substring filter");
        };
        assert_eq!(sub.initial(), None);
        assert_eq!(sub.final_(), Some(&ByteString::from("jensen")));
    }

    #[test]
    fn test_extensible() {
        assert_eq!(
            parse("(cn:caseExactMatch:=Fred)").unwrap(),
            Filter::extensible(Some("caseExactMatch".into()), Some("cn".into()), "Fred", false).unwrap()
        );
        assert_eq!(
            parse("(:dn:2.5.13.5:=Fred)").unwrap(),
            Filter::extensible(Some("2.5.13.5".into()), None, "Fred", true).unwrap()
        );
        assert_eq!(
            parse("(o:dn:=Ace)").unwrap(),
            Filter::extensible(None, Some("o".into()), "Ace", true).unwrap()
        );
        assert_eq!(
            parse("(cn:dnQualifier:=x)").unwrap(),
            Filter::extensible(Some("dnQualifier".into()), Some("cn".into()), "x", false).unwrap()
        );
    }

    #[test]
    fn test_dn_flag_ignores_case() {
        assert_eq!(
            parse("(cn:DN:=x)").unwrap(),
            Filter::extensible(None, Some("cn".into()), "x", true).unwrap()
        );
        assert_eq!(
            parse("(cn:Dn:caseExactMatch:=x)").unwrap(),
            Filter::extensible(Some("caseExactMatch".into()), Some("cn".into()), "x", true).unwrap()
        );
        assert_eq!(parse("(cn:dn:dn:=x)").unwrap_err().reason(), constants::ERR_FILTER_DN_RULE);
    }

    #[test]
    fn test_escapes() {
        assert_eq!(
            parse("(cn=a\\2a\\28\\29\\5c\\00)").unwrap(),
            Filter::Equality(AttributeValueAssertion::new(
                "cn",
                ByteString::from_static(b"a*()\\\x00")
            ))
        );
        assert_eq!(
            parse("(cn=caf\\c3\\a9)").unwrap(),
            Filter::equality("cn", "caf\u{e9}")
        );
    }

    #[test]
    fn test_error_offsets() {
        assert_eq!(offset(""), 0);
        assert_eq!(offset("()"), 1);
        assert_eq!(offset("(cn=Babs"), 8);
        assert_eq!(offset("(cn=Babs))"), 9);
        assert_eq!(offset("(cn=a\\zz)"), 5);
        assert_eq!(offset("(cn=a\\2)"), 5);
        assert_eq!(offset("(=x)"), 1);
        assert_eq!(offset("(cn x)"), 3);
        assert_eq!(offset("(cn=**)"), 4);
        assert_eq!(offset("(uid>=a*)"), 7);
        assert_eq!(offset("(:=x)"), 1);
        assert_eq!(offset("(&(cn=a)"), 8);
        assert_eq!(offset("(cn=a(b)"), 5);
    }

    #[test]
    fn test_depth_limit() {
        let deep = "(!".repeat(MAX_NESTING_DEPTH + 1) + "(cn=x)" + &")".repeat(MAX_NESTING_DEPTH + 1);
        assert_eq!(parse(&deep).unwrap_err().reason(), constants::ERR_FILTER_TOO_DEEP);
    }
}
