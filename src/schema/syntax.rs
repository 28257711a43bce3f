//! Attribute syntaxes: value-acceptability predicates plus default matching rules.

use super::oid::validate_oid;
use super::rules;
use std::fmt;

pub const SYNTAX_BOOLEAN_OID: &str = "1.3.6.1.4.1.1466.115.121.1.7";
pub const SYNTAX_DN_OID: &str = "1.3.6.1.4.1.1466.115.121.1.12";
pub const SYNTAX_DIRECTORY_STRING_OID: &str = "1.3.6.1.4.1.1466.115.121.1.15";
pub const SYNTAX_IA5_STRING_OID: &str = "1.3.6.1.4.1.1466.115.121.1.26";
pub const SYNTAX_INTEGER_OID: &str = "1.3.6.1.4.1.1466.115.121.1.27";
pub const SYNTAX_NUMERIC_STRING_OID: &str = "1.3.6.1.4.1.1466.115.121.1.36";
pub const SYNTAX_OID_OID: &str = "1.3.6.1.4.1.1466.115.121.1.38";
pub const SYNTAX_OCTET_STRING_OID: &str = "1.3.6.1.4.1.1466.115.121.1.40";
pub const SYNTAX_PROTOCOL_INFORMATION_OID: &str = "1.3.6.1.4.1.1466.115.121.1.42";
pub const SYNTAX_TELEPHONE_NUMBER_OID: &str = "1.3.6.1.4.1.1466.115.121.1.50";

/// An attribute syntax.
///
/// `value_is_acceptable` is a pure predicate; the rejection reason is for
/// humans and must not be parsed.
pub trait Syntax: Send + Sync {
    fn oid(&self) -> &str;

    fn name(&self) -> &str;

    /// Whether values are text that can be shown to a user as is
    fn is_human_readable(&self) -> bool;

    fn value_is_acceptable(&self, value: &[u8]) -> Result<(), String>;

    fn equality_rule(&self) -> Option<&str> {
        None
    }

    fn ordering_rule(&self) -> Option<&str> {
        None
    }

    fn substring_rule(&self) -> Option<&str> {
        None
    }

    fn approximate_rule(&self) -> Option<&str> {
        None
    }
}

/// RFC 4512 `oid`: a numeric OID or a short name
#[derive(Debug, Clone, Copy, Default)]
pub struct OidSyntax;

impl Syntax for OidSyntax {
    fn oid(&self) -> &str {
        SYNTAX_OID_OID
    }

    fn name(&self) -> &str {
        "OID"
    }

    fn is_human_readable(&self) -> bool {
        true
    }

    fn value_is_acceptable(&self, value: &[u8]) -> Result<(), String> {
        let text = std::str::from_utf8(value).map_err(|_| "OID is not valid UTF-8".to_string())?;
        validate_oid(text)
    }

    fn equality_rule(&self) -> Option<&str> {
        Some(rules::OBJECT_IDENTIFIER_MATCH_OID)
    }

    fn substring_rule(&self) -> Option<&str> {
        Some(rules::CASE_IGNORE_SUBSTRINGS_MATCH_OID)
    }
}

/// Deprecated Protocol Information syntax, kept for backward compatibility.
///
/// Every value is accepted, including empty and non-UTF-8 ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtocolInformationSyntax;

impl Syntax for ProtocolInformationSyntax {
    fn oid(&self) -> &str {
        SYNTAX_PROTOCOL_INFORMATION_OID
    }

    fn name(&self) -> &str {
        "Protocol Information"
    }

    fn is_human_readable(&self) -> bool {
        true
    }

    fn value_is_acceptable(&self, _value: &[u8]) -> Result<(), String> {
        Ok(())
    }

    fn equality_rule(&self) -> Option<&str> {
        Some(rules::CASE_IGNORE_MATCH_OID)
    }

    fn ordering_rule(&self) -> Option<&str> {
        Some(rules::CASE_IGNORE_ORDERING_MATCH_OID)
    }

    fn substring_rule(&self) -> Option<&str> {
        Some(rules::CASE_IGNORE_SUBSTRINGS_MATCH_OID)
    }
}

type Validator = fn(&[u8]) -> Result<(), String>;

/// A syntax described by a table entry and a validation function.
///
/// This is how most syntaxes are declared, and how embedding servers add
/// their own without writing a new type.
#[derive(Clone)]
pub struct SyntaxDefinition {
    oid: String,
    name: String,
    human_readable: bool,
    validator: Validator,
    equality: Option<String>,
    ordering: Option<String>,
    substring: Option<String>,
    approximate: Option<String>,
}

impl SyntaxDefinition {
    pub fn new(oid: impl Into<String>, name: impl Into<String>, validator: Validator) -> Self {
        Self {
            oid: oid.into(),
            name: name.into(),
            human_readable: true,
            validator,
            equality: None,
            ordering: None,
            substring: None,
            approximate: None,
        }
    }

    pub fn binary(mut self) -> Self {
        self.human_readable = false;
        self
    }

    pub fn with_equality(mut self, rule: impl Into<String>) -> Self {
        self.equality = Some(rule.into());
        self
    }

    pub fn with_ordering(mut self, rule: impl Into<String>) -> Self {
        self.ordering = Some(rule.into());
        self
    }

    pub fn with_substring(mut self, rule: impl Into<String>) -> Self {
        self.substring = Some(rule.into());
        self
    }

    pub fn with_approximate(mut self, rule: impl Into<String>) -> Self {
        self.approximate = Some(rule.into());
        self
    }
}

impl fmt::Debug for SyntaxDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntaxDefinition")
            .field("oid", &self.oid)
            .field("name", &self.name)
            .field("human_readable", &self.human_readable)
            .finish_non_exhaustive()
    }
}

impl Syntax for SyntaxDefinition {
    fn oid(&self) -> &str {
        &self.oid
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_human_readable(&self) -> bool {
        self.human_readable
    }

    fn value_is_acceptable(&self, value: &[u8]) -> Result<(), String> {
        (self.validator)(value)
    }

    fn equality_rule(&self) -> Option<&str> {
        self.equality.as_deref()
    }

    fn ordering_rule(&self) -> Option<&str> {
        self.ordering.as_deref()
    }

    fn substring_rule(&self) -> Option<&str> {
        self.substring.as_deref()
    }

    fn approximate_rule(&self) -> Option<&str> {
        self.approximate.as_deref()
    }
}

pub(crate) fn accept_any(_value: &[u8]) -> Result<(), String> {
    Ok(())
}

fn utf8(value: &[u8]) -> Result<&str, String> {
    std::str::from_utf8(value).map_err(|e| format!("value is not valid UTF-8: {e}"))
}

pub(crate) fn validate_directory_string(value: &[u8]) -> Result<(), String> {
    if utf8(value)?.is_empty() {
        return Err("a directory string must not be empty".to_string());
    }
    Ok(())
}

pub(crate) fn validate_ia5_string(value: &[u8]) -> Result<(), String> {
    match value.iter().position(|b| !b.is_ascii()) {
        Some(i) => Err(format!("byte 0x{:02x} at position {i} is not IA5", value[i])),
        None => Ok(()),
    }
}

pub(crate) fn validate_integer(value: &[u8]) -> Result<(), String> {
    let text = utf8(value)?;
    let digits = text.strip_prefix('-').unwrap_or(text);
    if digits.is_empty() {
        return Err(format!("'{text}' is not an integer"));
    }
    if let Some(c) = digits.chars().find(|c| !c.is_ascii_digit()) {
        return Err(format!("illegal character '{c}' in integer '{text}'"));
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return Err(format!("integer '{text}' has a leading zero"));
    }
    if text == "-0" {
        return Err("negative zero is not a valid integer".to_string());
    }
    Ok(())
}

pub(crate) fn validate_boolean(value: &[u8]) -> Result<(), String> {
    match value {
        b"TRUE" | b"FALSE" => Ok(()),
        _ => Err(format!(
            "'{}' is not TRUE or FALSE",
            String::from_utf8_lossy(value)
        )),
    }
}

pub(crate) fn validate_numeric_string(value: &[u8]) -> Result<(), String> {
    if value.is_empty() {
        return Err("a numeric string must not be empty".to_string());
    }
    match value.iter().find(|b| !b.is_ascii_digit() && **b != b' ') {
        Some(b) => Err(format!("illegal character 0x{b:02x} in numeric string")),
        None => Ok(()),
    }
}

pub(crate) fn validate_telephone_number(value: &[u8]) -> Result<(), String> {
    let text = utf8(value)?;
    if text.trim().is_empty() {
        return Err("a telephone number must not be empty".to_string());
    }
    match text
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || " '()+,-./:?".contains(*c)))
    {
        Some(c) => Err(format!("illegal character '{c}' in telephone number")),
        None => Ok(()),
    }
}

/// Loose DN check: every RDN component is `type=value`
pub(crate) fn validate_dn(value: &[u8]) -> Result<(), String> {
    let text = utf8(value)?;
    if text.is_empty() {
        return Ok(());
    }
    for component in split_unescaped(text, &[',', '+']) {
        let Some((attribute, _)) = component.split_once('=') else {
            return Err(format!("RDN component '{component}' has no '='"));
        };
        validate_oid(attribute.trim())?;
    }
    Ok(())
}

/// Split on any of `separators` unless preceded by a backslash
pub(crate) fn split_unescaped<'a>(text: &'a str, separators: &[char]) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if separators.contains(&c) {
            parts.push(&text[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&text[start..]);
    parts
}

/// The syntaxes every schema starts with
pub(crate) fn core_syntaxes() -> Vec<Box<dyn Syntax>> {
    vec![
        Box::new(OidSyntax),
        Box::new(ProtocolInformationSyntax),
        Box::new(
            SyntaxDefinition::new(
                SYNTAX_DIRECTORY_STRING_OID,
                "Directory String",
                validate_directory_string,
            )
            .with_equality(rules::CASE_IGNORE_MATCH_OID)
            .with_ordering(rules::CASE_IGNORE_ORDERING_MATCH_OID)
            .with_substring(rules::CASE_IGNORE_SUBSTRINGS_MATCH_OID),
        ),
        Box::new(
            SyntaxDefinition::new(SYNTAX_DN_OID, "DN", validate_dn)
                .with_equality(rules::DISTINGUISHED_NAME_MATCH_OID),
        ),
        Box::new(
            SyntaxDefinition::new(
                SYNTAX_TELEPHONE_NUMBER_OID,
                "Telephone Number",
                validate_telephone_number,
            )
            .with_equality(rules::TELEPHONE_NUMBER_MATCH_OID)
            .with_substring(rules::TELEPHONE_NUMBER_SUBSTRINGS_MATCH_OID),
        ),
        Box::new(
            SyntaxDefinition::new(SYNTAX_IA5_STRING_OID, "IA5 String", validate_ia5_string)
                .with_equality(rules::CASE_EXACT_IA5_MATCH_OID)
                .with_substring(rules::CASE_IGNORE_IA5_SUBSTRINGS_MATCH_OID),
        ),
        Box::new(
            SyntaxDefinition::new(SYNTAX_OCTET_STRING_OID, "Octet String", accept_any)
                .binary()
                .with_equality(rules::OCTET_STRING_MATCH_OID)
                .with_ordering(rules::OCTET_STRING_ORDERING_MATCH_OID),
        ),
        Box::new(
            SyntaxDefinition::new(SYNTAX_INTEGER_OID, "Integer", validate_integer)
                .with_equality(rules::INTEGER_MATCH_OID)
                .with_ordering(rules::INTEGER_ORDERING_MATCH_OID),
        ),
        Box::new(
            SyntaxDefinition::new(SYNTAX_BOOLEAN_OID, "Boolean", validate_boolean)
                .with_equality(rules::BOOLEAN_MATCH_OID),
        ),
        Box::new(
            SyntaxDefinition::new(
                SYNTAX_NUMERIC_STRING_OID,
                "Numeric String",
                validate_numeric_string,
            )
            .with_equality(rules::NUMERIC_STRING_MATCH_OID)
            .with_ordering(rules::NUMERIC_STRING_ORDERING_MATCH_OID)
            .with_substring(rules::NUMERIC_STRING_SUBSTRINGS_MATCH_OID),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oid_syntax() {
        let syntax = OidSyntax;
        assert!(syntax.value_is_acceptable(b"1.3.6.1.1.12").is_ok());
        assert!(syntax.value_is_acceptable(b"cn").is_ok());

        let reason = syntax.value_is_acceptable(b"1.3.6..1").unwrap_err();
        assert!(!reason.is_empty());
        let reason = syntax.value_is_acceptable(b"").unwrap_err();
        assert!(!reason.is_empty());
        assert!(syntax.value_is_acceptable(&[0xff]).is_err());
    }

    #[test]
    fn test_protocol_information_accepts_everything() {
        let syntax = ProtocolInformationSyntax;
        assert!(syntax.value_is_acceptable(b"").is_ok());
        assert!(syntax.value_is_acceptable(&[0xff, 0xfe, 0x00]).is_ok());
        assert!(syntax.value_is_acceptable(b"ldap 1.3.6.1").is_ok());
        assert_eq!(syntax.approximate_rule(), None);
        assert_eq!(syntax.equality_rule(), Some(rules::CASE_IGNORE_MATCH_OID));
    }

    #[test]
    fn test_integer_syntax() {
        for ok in ["0", "7", "-12", "123456789012345678901234567890"] {
            assert!(validate_integer(ok.as_bytes()).is_ok(), "{ok}");
        }
        for bad in ["", "-", "01", "-0", "1a", "+1"] {
            assert!(validate_integer(bad.as_bytes()).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_other_validators() {
        assert!(validate_boolean(b"TRUE").is_ok());
        assert!(validate_boolean(b"true").is_err());
        assert!(validate_ia5_string(b"user@example.com").is_ok());
        assert!(validate_ia5_string("caf\u{e9}".as_bytes()).is_err());
        assert!(validate_numeric_string(b"555 1234").is_ok());
        assert!(validate_numeric_string(b"555-1234").is_err());
        assert!(validate_directory_string(b"").is_err());
        assert!(validate_directory_string(&[0xc3]).is_err());
        assert!(validate_telephone_number(b"+1 408 555 1212").is_ok());
        assert!(validate_telephone_number(b"555*1212").is_err());
    }

    #[test]
    fn test_dn_syntax() {
        assert!(validate_dn(b"uid=bjensen,ou=People,dc=example,dc=com").is_ok());
        assert!(validate_dn(b"cn=Jensen\\, Babs+uid=b,o=x").is_ok());
        assert!(validate_dn(b"").is_ok());
        assert!(validate_dn(b"not a dn").is_err());
        assert_eq!(split_unescaped("a\\,b,c", &[',']), vec!["a\\,b", "c"]);
    }
}
