//! # Search Filters
//!
//! Typed LDAP search filters (RFC 4511 §4.5.1.7) with their BER encoding,
//! RFC 4515 string form, and evaluation against an entry.
//!
//! A `Filter` is an owning tree: `And`/`Or` own their children, `Not` owns one.
//! Invariants are enforced on construction, so every value of this type is
//! encodable:
//! - a substrings filter has at least one non-empty initial, any or final component
//! - an extensible match names a matching rule, an attribute, or both, and
//!   none of its names is empty or the rule name `dn`
//!
//! The infallible builders (`present`, `equality` and the other assertions)
//! do not check the attribute description. An empty one encodes, but both
//! the decoder and the string parser refuse it.
//!
//! ## Wire Format
//! ```text
//! and [0] SET OF Filter        substrings [4]      approxMatch [8]
//! or  [1] SET OF Filter        greaterOrEqual [5]  extensibleMatch [9]
//! not [2] Filter               lessOrEqual [6]
//! equalityMatch [3]            present [7] AttributeDescription
//! ```
//!
//! ## Example Usage
//! ```rust
//! use ldap_core::filter::Filter;
//!
//! let filter = Filter::parse("(&(cn=Babs*)(!(uid=admin)))").unwrap();
//! assert_eq!(filter.to_string(), "(&(cn=Babs*)(!(uid=admin)))");
//! assert_eq!(Filter::from_ber(&filter.to_ber()).unwrap(), filter);
//! ```

mod codec;
mod matcher;
mod parser;

pub use matcher::ConditionResult;

use crate::core::byte_string::ByteString;
use crate::error::{constants, FilterParseError, LdapError, Result};
use std::fmt;

/// An attribute description paired with an assertion value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeValueAssertion {
    pub attribute: String,
    pub value: ByteString,
}

impl AttributeValueAssertion {
    pub fn new(attribute: impl Into<String>, value: impl Into<ByteString>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }
}

/// Substring assertion; always holds at least one non-empty component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstringFilter {
    attribute: String,
    initial: Option<ByteString>,
    any: Vec<ByteString>,
    final_: Option<ByteString>,
}

impl SubstringFilter {
    /// Empty components are dropped; fails if nothing is left
    pub fn new(
        attribute: impl Into<String>,
        initial: Option<ByteString>,
        any: Vec<ByteString>,
        final_: Option<ByteString>,
    ) -> Result<Self> {
        let attribute = attribute.into();
        if attribute.is_empty() {
            return Err(LdapError::InvalidArgument(constants::ERR_FILTER_EMPTY_NAME));
        }
        let initial = initial.filter(|v| !v.is_empty());
        let final_ = final_.filter(|v| !v.is_empty());
        let any: Vec<ByteString> = any.into_iter().filter(|v| !v.is_empty()).collect();

        if initial.is_none() && any.is_empty() && final_.is_none() {
            return Err(LdapError::InvalidArgument(constants::ERR_FILTER_NO_SUBSTRINGS));
        }

        Ok(Self {
            attribute,
            initial,
            any,
            final_,
        })
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn initial(&self) -> Option<&ByteString> {
        self.initial.as_ref()
    }

    pub fn any(&self) -> &[ByteString] {
        &self.any
    }

    pub fn final_(&self) -> Option<&ByteString> {
        self.final_.as_ref()
    }
}

/// Extensible match assertion; names a rule, an attribute, or both
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensibleMatch {
    matching_rule: Option<String>,
    attribute: Option<String>,
    value: ByteString,
    dn_attributes: bool,
}

impl ExtensibleMatch {
    pub fn new(
        matching_rule: Option<String>,
        attribute: Option<String>,
        value: impl Into<ByteString>,
        dn_attributes: bool,
    ) -> Result<Self> {
        if let Some(reason) = extensible_error(matching_rule.as_deref(), attribute.as_deref()) {
            return Err(LdapError::InvalidArgument(reason));
        }
        Ok(Self {
            matching_rule,
            attribute,
            value: value.into(),
            dn_attributes,
        })
    }

    pub fn matching_rule(&self) -> Option<&str> {
        self.matching_rule.as_deref()
    }

    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }

    pub fn value(&self) -> &ByteString {
        &self.value
    }

    pub fn dn_attributes(&self) -> bool {
        self.dn_attributes
    }
}

/// Why `matching_rule` and `attribute` cannot head an extensible match
pub(crate) fn extensible_error(matching_rule: Option<&str>, attribute: Option<&str>) -> Option<&'static str> {
    if matching_rule.is_none() && attribute.is_none() {
        return Some(constants::ERR_FILTER_EXTENSIBLE_EMPTY);
    }
    if matching_rule == Some("") || attribute == Some("") {
        return Some(constants::ERR_FILTER_EMPTY_NAME);
    }
    // `:dn` in the string form is always the dnAttributes flag
    if matching_rule.is_some_and(|rule| rule.eq_ignore_ascii_case("dn")) {
        return Some(constants::ERR_FILTER_DN_RULE);
    }
    None
}

/// An LDAP search filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Matches when every child matches; `(&)` is absolute true
    And(Vec<Filter>),
    /// Matches when any child matches; `(|)` is absolute false
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Equality(AttributeValueAssertion),
    Substrings(SubstringFilter),
    GreaterOrEqual(AttributeValueAssertion),
    LessOrEqual(AttributeValueAssertion),
    Present(String),
    Approx(AttributeValueAssertion),
    Extensible(ExtensibleMatch),
}

impl Filter {
    pub fn and(children: Vec<Filter>) -> Self {
        Filter::And(children)
    }

    pub fn or(children: Vec<Filter>) -> Self {
        Filter::Or(children)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(child: Filter) -> Self {
        Filter::Not(Box::new(child))
    }

    pub fn equality(attribute: impl Into<String>, value: impl Into<ByteString>) -> Self {
        Filter::Equality(AttributeValueAssertion::new(attribute, value))
    }

    pub fn greater_or_equal(attribute: impl Into<String>, value: impl Into<ByteString>) -> Self {
        Filter::GreaterOrEqual(AttributeValueAssertion::new(attribute, value))
    }

    pub fn less_or_equal(attribute: impl Into<String>, value: impl Into<ByteString>) -> Self {
        Filter::LessOrEqual(AttributeValueAssertion::new(attribute, value))
    }

    pub fn approx(attribute: impl Into<String>, value: impl Into<ByteString>) -> Self {
        Filter::Approx(AttributeValueAssertion::new(attribute, value))
    }

    pub fn present(attribute: impl Into<String>) -> Self {
        Filter::Present(attribute.into())
    }

    pub fn substrings(
        attribute: impl Into<String>,
        initial: Option<ByteString>,
        any: Vec<ByteString>,
        final_: Option<ByteString>,
    ) -> Result<Self> {
        SubstringFilter::new(attribute, initial, any, final_).map(Filter::Substrings)
    }

    pub fn extensible(
        matching_rule: Option<String>,
        attribute: Option<String>,
        value: impl Into<ByteString>,
        dn_attributes: bool,
    ) -> Result<Self> {
        ExtensibleMatch::new(matching_rule, attribute, value, dn_attributes).map(Filter::Extensible)
    }

    /// `(objectClass=*)`
    pub fn object_class_present() -> Self {
        Filter::present("objectClass")
    }

    /// Parse an RFC 4515 string filter.
    ///
    /// The outer parentheses may be omitted for a single item (`cn=Babs`).
    pub fn parse(text: &str) -> std::result::Result<Self, FilterParseError> {
        parser::parse(text)
    }
}

impl std::str::FromStr for Filter {
    type Err = FilterParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Filter::parse(s)
    }
}

/// Append `value` using RFC 4515 escaping for anything outside printable ASCII
fn write_escaped(f: &mut fmt::Formatter<'_>, value: &[u8]) -> fmt::Result {
    for &b in value {
        match b {
            b'*' | b'(' | b')' | b'\\' => write!(f, "\\{b:02x}")?,
            0x20..=0x7e => write!(f, "{}", b as char)?,
            _ => write!(f, "\\{b:02x}")?,
        }
    }
    Ok(())
}

/// Prints the RFC 4515 form; the output parses back to an equal filter
impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::And(children) | Filter::Or(children) => {
                let op = if matches!(self, Filter::And(_)) { '&' } else { '|' };
                write!(f, "({op}")?;
                for child in children {
                    write!(f, "{child}")?;
                }
                f.write_str(")")
            }
            Filter::Not(child) => write!(f, "(!{child})"),
            Filter::Equality(ava) => write_ava(f, ava, "="),
            Filter::GreaterOrEqual(ava) => write_ava(f, ava, ">="),
            Filter::LessOrEqual(ava) => write_ava(f, ava, "<="),
            Filter::Approx(ava) => write_ava(f, ava, "~="),
            Filter::Present(attribute) => write!(f, "({attribute}=*)"),
            Filter::Substrings(sub) => {
                write!(f, "({}=", sub.attribute)?;
                if let Some(initial) = &sub.initial {
                    write_escaped(f, initial)?;
                }
                f.write_str("*")?;
                for any in &sub.any {
                    write_escaped(f, any)?;
                    f.write_str("*")?;
                }
                if let Some(final_) = &sub.final_ {
                    write_escaped(f, final_)?;
                }
                f.write_str(")")
            }
            Filter::Extensible(ext) => {
                f.write_str("(")?;
                if let Some(attribute) = &ext.attribute {
                    f.write_str(attribute)?;
                }
                if ext.dn_attributes {
                    f.write_str(":dn")?;
                }
                if let Some(rule) = &ext.matching_rule {
                    write!(f, ":{rule}")?;
                }
                f.write_str(":=")?;
                write_escaped(f, &ext.value)?;
                f.write_str(")")
            }
        }
    }
}

fn write_ava(f: &mut fmt::Formatter<'_>, ava: &AttributeValueAssertion, op: &str) -> fmt::Result {
    write!(f, "({}{}", ava.attribute, op)?;
    write_escaped(f, &ava.value)?;
    f.write_str(")")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substrings_require_a_component() {
        assert!(Filter::substrings("cn", None, vec![], None).is_err());
        assert!(Filter::substrings("cn", Some(ByteString::empty()), vec![ByteString::empty()], None).is_err());
        let filter = Filter::substrings("cn", None, vec![ByteString::from("ab")], None).unwrap();
        assert_eq!(filter.to_string(), "(cn=*ab*)");
    }

    #[test]
    fn test_extensible_requires_rule_or_attribute() {
        assert!(Filter::extensible(None, None, "x", false).is_err());
        let filter = Filter::extensible(Some("2.5.13.5".into()), Some("cn".into()), "Babs", true).unwrap();
        assert_eq!(filter.to_string(), "(cn:dn:2.5.13.5:=Babs)");
    }

    #[test]
    fn test_names_must_print_unambiguously() {
        for rule in ["dn", "DN", "dN"] {
            assert!(Filter::extensible(Some(rule.into()), Some("cn".into()), "x", false).is_err());
        }
        assert!(Filter::extensible(Some(String::new()), Some("cn".into()), "x", false).is_err());
        assert!(Filter::extensible(None, Some(String::new()), "x", false).is_err());
        assert!(Filter::substrings("", Some("a".into()), vec![], None).is_err());

        let filter = Filter::extensible(None, Some("cn".into()), "x", true).unwrap();
        assert_eq!(filter.to_string(), "(cn:dn:=x)");
        assert_eq!(Filter::parse(&filter.to_string()).unwrap(), filter);
    }

    #[test]
    fn test_display_escapes() {
        let filter = Filter::equality("cn", ByteString::from_static(b"a*(b)\\\x00\xc3\xa9"));
        assert_eq!(filter.to_string(), "(cn=a\\2a\\28b\\29\\5c\\00\\c3\\a9)");
    }

    #[test]
    fn test_display_absolute_true_and_false() {
        assert_eq!(Filter::and(vec![]).to_string(), "(&)");
        assert_eq!(Filter::or(vec![]).to_string(), "(|)");
    }
}
