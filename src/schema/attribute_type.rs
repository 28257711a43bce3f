use super::rules::{
    CASE_IGNORE_IA5_MATCH_OID, CASE_IGNORE_IA5_SUBSTRINGS_MATCH_OID,
    OBJECT_IDENTIFIER_MATCH_OID, OCTET_STRING_MATCH_OID,
};
use super::syntax::{
    SYNTAX_DIRECTORY_STRING_OID, SYNTAX_DN_OID, SYNTAX_IA5_STRING_OID, SYNTAX_INTEGER_OID,
    SYNTAX_OCTET_STRING_OID, SYNTAX_OID_OID, SYNTAX_TELEPHONE_NUMBER_OID,
};

/// An attribute type definition.
///
/// Matching rules left unset here fall back to the defaults of the syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeType {
    oid: String,
    names: Vec<String>,
    syntax_oid: String,
    equality: Option<String>,
    ordering: Option<String>,
    substring: Option<String>,
    approximate: Option<String>,
    single_value: bool,
}

impl AttributeType {
    pub fn new(oid: impl Into<String>, syntax_oid: impl Into<String>) -> Self {
        Self {
            oid: oid.into(),
            names: Vec::new(),
            syntax_oid: syntax_oid.into(),
            equality: None,
            ordering: None,
            substring: None,
            approximate: None,
            single_value: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
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

    pub fn single_valued(mut self) -> Self {
        self.single_value = true;
        self
    }

    pub fn oid(&self) -> &str {
        &self.oid
    }

    /// Primary name, or the OID for unnamed types
    pub fn name(&self) -> &str {
        self.names.first().map_or(&self.oid, String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn syntax_oid(&self) -> &str {
        &self.syntax_oid
    }

    pub fn equality_override(&self) -> Option<&str> {
        self.equality.as_deref()
    }

    pub fn ordering_override(&self) -> Option<&str> {
        self.ordering.as_deref()
    }

    pub fn substring_override(&self) -> Option<&str> {
        self.substring.as_deref()
    }

    pub fn approximate_override(&self) -> Option<&str> {
        self.approximate.as_deref()
    }

    pub fn is_single_valued(&self) -> bool {
        self.single_value
    }

    /// Whether `name` is the OID or one of the names, ignoring case
    pub fn has_name_or_oid(&self, name: &str) -> bool {
        self.oid == name || self.names.iter().any(|n| n.eq_ignore_ascii_case(name))
    }
}

/// The attribute types every schema starts with
pub(crate) fn core_attribute_types() -> Vec<AttributeType> {
    let string = |oid: &str, name: &str| AttributeType::new(oid, SYNTAX_DIRECTORY_STRING_OID).with_name(name);

    vec![
        AttributeType::new("2.5.4.0", SYNTAX_OID_OID)
            .with_name("objectClass")
            .with_equality(OBJECT_IDENTIFIER_MATCH_OID),
        string("2.5.4.3", "cn").with_name("commonName"),
        string("2.5.4.4", "sn").with_name("surname"),
        string("0.9.2342.19200300.100.1.1", "uid").with_name("userid"),
        string("2.5.4.13", "description"),
        AttributeType::new("0.9.2342.19200300.100.1.3", SYNTAX_IA5_STRING_OID)
            .with_name("mail")
            .with_name("rfc822Mailbox")
            .with_equality(CASE_IGNORE_IA5_MATCH_OID)
            .with_substring(CASE_IGNORE_IA5_SUBSTRINGS_MATCH_OID),
        string("2.5.4.10", "o").with_name("organizationName"),
        string("2.5.4.11", "ou").with_name("organizationalUnitName"),
        AttributeType::new("2.5.4.20", SYNTAX_TELEPHONE_NUMBER_OID)
            .with_name("telephoneNumber"),
        AttributeType::new("1.3.6.1.1.1.1.0", SYNTAX_INTEGER_OID)
            .with_name("uidNumber")
            .single_valued(),
        AttributeType::new("2.5.4.31", SYNTAX_DN_OID).with_name("member"),
        AttributeType::new("2.5.4.35", SYNTAX_OCTET_STRING_OID)
            .with_name("userPassword")
            .with_equality(OCTET_STRING_MATCH_OID),
    ]
}
