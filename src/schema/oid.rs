//! RFC 4512 §1.4 lexical productions shared by the OID syntax and the
//! string filter parser.
//!
//! ```text
//! numericoid  = number 1*( DOT number )
//! descr       = keystring
//! keystring   = leadkeychar *keychar
//! oid         = descr / numericoid
//! attributedescription = oid options   ; options = *( SEMI option )
//! ```

use nom::branch::alt;
use nom::bytes::complete::{take_while, take_while1};
use nom::character::complete::{char, digit1, satisfy};
use nom::combinator::recognize;
use nom::multi::many0_count;
use nom::sequence::{pair, preceded};
use nom::IResult;

fn is_keychar(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-'
}

/// Dotted decimal OID. A single number is accepted as well.
pub(crate) fn numericoid(input: &str) -> IResult<&str, &str> {
    recognize(pair(digit1, many0_count(preceded(char('.'), digit1))))(input)
}

/// Short name: a letter followed by letters, digits and hyphens
pub(crate) fn descr(input: &str) -> IResult<&str, &str> {
    recognize(pair(satisfy(|c| c.is_ascii_alphabetic()), take_while(is_keychar)))(input)
}

pub(crate) fn oid(input: &str) -> IResult<&str, &str> {
    alt((numericoid, descr))(input)
}

/// Attribute type plus `;option` suffixes
pub(crate) fn attribute_description(input: &str) -> IResult<&str, &str> {
    recognize(pair(oid, many0_count(preceded(char(';'), take_while1(is_keychar)))))(input)
}

/// Check that all of `value` is an OID; on failure say where and why
pub(crate) fn validate_oid(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err("the empty string is not a valid OID".to_string());
    }
    match oid(value) {
        Ok(("", _)) => Ok(()),
        Ok((rest, _)) => {
            let position = value.len() - rest.len();
            let c = rest.chars().next().unwrap_or('?');
            Err(format!("illegal character '{c}' at position {position} in OID '{value}'"))
        }
        Err(_) => {
            let c = value.chars().next().unwrap_or('?');
            Err(format!("OID '{value}' must start with a digit or a letter, found '{c}'"))
        }
    }
}
