//! # Schema Engine
//!
//! Registries of attribute syntaxes, matching rules and attribute types,
//! keyed by OID.
//!
//! ## Lifecycle
//! A [`SchemaBuilder`] is filled during bootstrap, then frozen into a
//! [`Schema`]. The frozen schema is immutable, so any number of threads may
//! validate and compare values through it without locking. Tests build
//! isolated schemas instead of touching a shared global.
//!
//! ## Rule Resolution
//! The effective matching rule of an attribute is its own override if set,
//! otherwise the default of its syntax. Attribute types missing from the
//! schema use the configured default syntax (Directory String unless changed).
//!
//! ```rust
//! use ldap_core::schema::Schema;
//!
//! let schema = Schema::core();
//! assert!(schema.validate_value("objectClass", b"inetOrgPerson").is_ok());
//! assert!(schema.validate_value("objectClass", b"1.3..6").is_err());
//!
//! let rule = schema.equality_rule("cn").unwrap();
//! assert!(rule.values_match(b"Babs  Jensen", b"babs jensen").unwrap());
//! ```

mod attribute_type;
pub(crate) mod oid;
pub mod rules;
pub mod syntax;

pub use attribute_type::AttributeType;
pub use rules::{MatchingRule, MatchingRuleKind, Normalizer};
pub use syntax::{OidSyntax, ProtocolInformationSyntax, Syntax, SyntaxDefinition};

use crate::config::SchemaConfig;
use crate::error::{LdapError, Result};
use crate::protocol::attribute::base_type;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Mutable registration phase of a [`Schema`].
///
/// Registering an element under an OID that is already present replaces it.
pub struct SchemaBuilder {
    syntaxes: HashMap<String, Arc<dyn Syntax>>,
    rules: HashMap<String, Arc<MatchingRule>>,
    attribute_types: HashMap<String, Arc<AttributeType>>,
    default_syntax_oid: String,
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaBuilder {
    /// An empty builder
    pub fn new() -> Self {
        Self {
            syntaxes: HashMap::new(),
            rules: HashMap::new(),
            attribute_types: HashMap::new(),
            default_syntax_oid: syntax::SYNTAX_DIRECTORY_STRING_OID.to_string(),
        }
    }

    /// A builder pre-loaded with the core syntaxes, rules and attribute types
    pub fn core() -> Self {
        let mut builder = Self::new();
        for syntax in syntax::core_syntaxes() {
            builder.insert_syntax(Arc::from(syntax));
        }
        for rule in rules::core_matching_rules() {
            builder.register_matching_rule(rule);
        }
        for attribute_type in attribute_type::core_attribute_types() {
            builder.register_attribute_type(attribute_type);
        }
        builder
    }

    /// Core builder with the default syntax taken from `config`
    pub fn from_config(config: &SchemaConfig) -> Self {
        let mut builder = Self::core();
        builder.default_syntax(config.default_syntax_oid.clone());
        builder
    }

    /// Syntax used for attribute types missing from the schema
    pub fn default_syntax(&mut self, oid: impl Into<String>) -> &mut Self {
        self.default_syntax_oid = oid.into();
        self
    }

    pub fn register_syntax<S>(&mut self, syntax: S) -> &mut Self
    where
        S: Syntax + 'static,
    {
        self.insert_syntax(Arc::new(syntax))
    }

    fn insert_syntax(&mut self, syntax: Arc<dyn Syntax>) -> &mut Self {
        let oid = syntax.oid().to_string();
        if self.syntaxes.insert(oid.clone(), syntax).is_some() {
            debug!(oid = %oid, "replaced existing syntax");
        } else {
            debug!(oid = %oid, "registered syntax");
        }
        self
    }

    pub fn register_matching_rule(&mut self, rule: MatchingRule) -> &mut Self {
        let oid = rule.oid().to_string();
        if self.rules.insert(oid.clone(), Arc::new(rule)).is_some() {
            debug!(oid = %oid, "replaced existing matching rule");
        } else {
            debug!(oid = %oid, "registered matching rule");
        }
        self
    }

    pub fn register_attribute_type(&mut self, attribute_type: AttributeType) -> &mut Self {
        let oid = attribute_type.oid().to_string();
        if self
            .attribute_types
            .insert(oid.clone(), Arc::new(attribute_type))
            .is_some()
        {
            debug!(oid = %oid, "replaced existing attribute type");
        } else {
            debug!(oid = %oid, "registered attribute type");
        }
        self
    }

    /// Freeze the registrations after checking that every referenced
    /// syntax and matching rule exists
    pub fn build(self) -> Result<Schema> {
        let has_rule = |oid_or_name: &str| {
            self.rules.contains_key(oid_or_name)
                || self
                    .rules
                    .values()
                    .any(|r| r.names().iter().any(|n| n.eq_ignore_ascii_case(oid_or_name)))
        };
        let unknown = |what: &str, oid: &str, owner: &str| {
            LdapError::UnknownSchemaElement(format!("{what} {oid} referenced by {owner}"))
        };

        if !self.syntaxes.contains_key(&self.default_syntax_oid) {
            return Err(unknown("syntax", &self.default_syntax_oid, "the default syntax"));
        }
        for syntax in self.syntaxes.values() {
            let defaults = [
                syntax.equality_rule(),
                syntax.ordering_rule(),
                syntax.substring_rule(),
                syntax.approximate_rule(),
            ];
            if let Some(rule) = defaults.into_iter().flatten().find(|r| !has_rule(*r)) {
                return Err(unknown("matching rule", rule, syntax.name()));
            }
        }
        for attribute_type in self.attribute_types.values() {
            if !self.syntaxes.contains_key(attribute_type.syntax_oid()) {
                return Err(unknown("syntax", attribute_type.syntax_oid(), attribute_type.name()));
            }
            let overrides = [
                attribute_type.equality_override(),
                attribute_type.ordering_override(),
                attribute_type.substring_override(),
                attribute_type.approximate_override(),
            ];
            if let Some(rule) = overrides.into_iter().flatten().find(|r| !has_rule(*r)) {
                return Err(unknown("matching rule", rule, attribute_type.name()));
            }
        }
        Ok(self.freeze())
    }

    fn freeze(self) -> Schema {
        let rule_names = index_names(&self.rules, |r| r.names());
        let attribute_names = index_names(&self.attribute_types, |t| t.names());
        debug!(
            syntaxes = self.syntaxes.len(),
            matching_rules = self.rules.len(),
            attribute_types = self.attribute_types.len(),
            "schema frozen"
        );
        Schema {
            syntaxes: self.syntaxes,
            rules: self.rules,
            rule_names,
            attribute_types: self.attribute_types,
            attribute_names,
            default_syntax_oid: self.default_syntax_oid,
        }
    }
}

/// Lowercased name → OID
fn index_names<T>(
    elements: &HashMap<String, Arc<T>>,
    names: impl Fn(&T) -> &[String],
) -> HashMap<String, String> {
    elements
        .iter()
        .flat_map(|(oid, element)| {
            names(element.as_ref())
                .iter()
                .map(move |name| (name.to_ascii_lowercase(), oid.clone()))
        })
        .collect()
}

/// Frozen, read-only schema.
pub struct Schema {
    syntaxes: HashMap<String, Arc<dyn Syntax>>,
    rules: HashMap<String, Arc<MatchingRule>>,
    rule_names: HashMap<String, String>,
    attribute_types: HashMap<String, Arc<AttributeType>>,
    attribute_names: HashMap<String, String>,
    default_syntax_oid: String,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// Process-wide core schema, built on first use
    pub fn core() -> &'static Schema {
        static CORE: OnceLock<Schema> = OnceLock::new();
        CORE.get_or_init(|| SchemaBuilder::core().freeze())
    }

    pub fn syntax(&self, oid: &str) -> Option<&dyn Syntax> {
        self.syntaxes.get(oid).map(|s| s.as_ref())
    }

    /// Look a matching rule up by OID or name
    pub fn matching_rule(&self, oid_or_name: &str) -> Option<&MatchingRule> {
        self.rules
            .get(oid_or_name)
            .or_else(|| {
                self.rule_names
                    .get(&oid_or_name.to_ascii_lowercase())
                    .and_then(|oid| self.rules.get(oid))
            })
            .map(|r| r.as_ref())
    }

    /// Look an attribute type up by OID, name or attribute description
    pub fn attribute_type(&self, description: &str) -> Option<&AttributeType> {
        let name = base_type(description);
        self.attribute_types
            .get(name)
            .or_else(|| {
                self.attribute_names
                    .get(&name.to_ascii_lowercase())
                    .and_then(|oid| self.attribute_types.get(oid))
            })
            .map(|t| t.as_ref())
    }

    pub fn default_syntax_oid(&self) -> &str {
        &self.default_syntax_oid
    }

    /// Syntax of `description`, falling back to the default syntax
    pub fn syntax_for(&self, description: &str) -> Option<&dyn Syntax> {
        let oid = self
            .attribute_type(description)
            .map_or(self.default_syntax_oid.as_str(), |t| t.syntax_oid());
        self.syntax(oid)
    }

    /// Effective matching rule of `kind` for `description`, if any
    pub fn rule_for(&self, description: &str, kind: MatchingRuleKind) -> Option<&MatchingRule> {
        let attribute_type = self.attribute_type(description);
        let overridden = attribute_type.and_then(|t| match kind {
            MatchingRuleKind::Equality => t.equality_override(),
            MatchingRuleKind::Ordering => t.ordering_override(),
            MatchingRuleKind::Substring => t.substring_override(),
            MatchingRuleKind::Approximate => t.approximate_override(),
        });
        let oid = match overridden {
            Some(oid) => oid,
            None => {
                let syntax = self.syntax_for(description)?;
                match kind {
                    MatchingRuleKind::Equality => syntax.equality_rule(),
                    MatchingRuleKind::Ordering => syntax.ordering_rule(),
                    MatchingRuleKind::Substring => syntax.substring_rule(),
                    MatchingRuleKind::Approximate => syntax.approximate_rule(),
                }?
            }
        };
        self.matching_rule(oid)
    }

    pub fn equality_rule(&self, description: &str) -> Option<&MatchingRule> {
        self.rule_for(description, MatchingRuleKind::Equality)
    }

    pub fn ordering_rule(&self, description: &str) -> Option<&MatchingRule> {
        self.rule_for(description, MatchingRuleKind::Ordering)
    }

    pub fn substring_rule(&self, description: &str) -> Option<&MatchingRule> {
        self.rule_for(description, MatchingRuleKind::Substring)
    }

    pub fn approximate_rule(&self, description: &str) -> Option<&MatchingRule> {
        self.rule_for(description, MatchingRuleKind::Approximate)
    }

    /// Check `value` against the syntax of `description`
    pub fn validate_value(&self, description: &str, value: &[u8]) -> Result<()> {
        let syntax = self.syntax_for(description).ok_or_else(|| {
            LdapError::UnknownSchemaElement(format!("no syntax for attribute {description}"))
        })?;
        syntax
            .value_is_acceptable(value)
            .map_err(|reason| LdapError::SyntaxViolation {
                syntax: syntax.name().to_string(),
                reason,
            })
    }

    /// Whether two attribute descriptions name the same attribute type
    /// (options ignored)
    pub fn same_attribute_type(&self, a: &str, b: &str) -> bool {
        let (a, b) = (base_type(a), base_type(b));
        if a.eq_ignore_ascii_case(b) {
            return true;
        }
        match (self.attribute_type(a), self.attribute_type(b)) {
            (Some(x), Some(y)) => x.oid() == y.oid(),
            _ => false,
        }
    }

    pub fn syntaxes(&self) -> impl Iterator<Item = &dyn Syntax> {
        self.syntaxes.values().map(|s| s.as_ref())
    }

    pub fn matching_rules(&self) -> impl Iterator<Item = &MatchingRule> {
        self.rules.values().map(|r| r.as_ref())
    }

    pub fn attribute_types(&self) -> impl Iterator<Item = &AttributeType> {
        self.attribute_types.values().map(|t| t.as_ref())
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("syntaxes", &self.syntaxes.len())
            .field("matching_rules", &self.rules.len())
            .field("attribute_types", &self.attribute_types.len())
            .field("default_syntax_oid", &self.default_syntax_oid)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn test_core_schema_builds_cleanly() {
        let schema = SchemaBuilder::core().build().unwrap();
        assert!(schema.syntax(syntax::SYNTAX_OID_OID).is_some());
        assert!(schema.syntax(syntax::SYNTAX_PROTOCOL_INFORMATION_OID).is_some());
        assert!(schema.matching_rule("caseExactOrderingMatch").is_some());
        assert!(schema.matching_rule(rules::CASE_EXACT_ORDERING_MATCH_OID).is_some());
        assert_eq!(schema.attribute_type("commonName").unwrap().oid(), "2.5.4.3");
    }

    #[test]
    fn test_rule_resolution() {
        let schema = Schema::core();
        assert_eq!(schema.equality_rule("cn").unwrap().oid(), rules::CASE_IGNORE_MATCH_OID);
        assert_eq!(schema.equality_rule("mail").unwrap().oid(), rules::CASE_IGNORE_IA5_MATCH_OID);
        assert_eq!(
            schema.ordering_rule("uidNumber").unwrap().oid(),
            rules::INTEGER_ORDERING_MATCH_OID
        );
        assert!(schema.ordering_rule("objectClass").is_none());
        assert!(schema.approximate_rule("cn").is_none());
        // unknown attributes use Directory String
        assert_eq!(
            schema.equality_rule("x-unknown;lang-en").unwrap().oid(),
            rules::CASE_IGNORE_MATCH_OID
        );
    }

    #[test]
    fn test_validate_value() {
        let schema = Schema::core();
        assert!(schema.validate_value("uidNumber", b"1000").is_ok());
        match schema.validate_value("uidNumber", b"ten") {
            Err(LdapError::SyntaxViolation { syntax, reason }) => {
                assert_eq!(syntax, "Integer");
                assert!(!reason.is_empty());
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(schema.validate_value("userPassword", &[0xff, 0x00]).is_ok());
    }

    #[test]
    fn test_attribute_override_takes_precedence() {
        let mut builder = SchemaBuilder::core();
        builder.register_attribute_type(
            AttributeType::new("1.2.3.4", syntax::SYNTAX_DIRECTORY_STRING_OID)
                .with_name("exactName")
                .with_equality("caseExactMatch")
                .with_ordering(rules::CASE_EXACT_ORDERING_MATCH_OID),
        );
        let schema = builder.build().unwrap();
        let rule = schema.equality_rule("exactName").unwrap();
        assert!(!rule.values_match(b"Babs", b"babs").unwrap());
        let ordering = schema.ordering_rule("EXACTNAME").unwrap();
        assert_eq!(ordering.compare(b"abcdef", b"bcdefa").unwrap(), Ordering::Less);
    }

    #[test]
    fn test_unknown_references_rejected() {
        let mut builder = SchemaBuilder::core();
        builder.register_attribute_type(AttributeType::new("1.2.3.5", "9.9.9"));
        assert!(matches!(builder.build(), Err(LdapError::UnknownSchemaElement(_))));

        let mut builder = SchemaBuilder::core();
        builder.register_attribute_type(
            AttributeType::new("1.2.3.6", syntax::SYNTAX_DIRECTORY_STRING_OID)
                .with_equality("noSuchMatch"),
        );
        assert!(matches!(builder.build(), Err(LdapError::UnknownSchemaElement(_))));

        let mut builder = SchemaBuilder::new();
        builder.default_syntax("1.2.3");
        assert!(builder.build().is_err());
    }

    #[test]
    fn test_same_attribute_type() {
        let schema = Schema::core();
        assert!(schema.same_attribute_type("cn", "commonName"));
        assert!(schema.same_attribute_type("CN;lang-en", "2.5.4.3"));
        assert!(!schema.same_attribute_type("cn", "sn"));
        assert!(schema.same_attribute_type("x-custom", "X-CUSTOM"));
    }

    #[test]
    fn test_replacing_a_syntax() {
        let mut builder = SchemaBuilder::core();
        builder.register_syntax(
            SyntaxDefinition::new(syntax::SYNTAX_INTEGER_OID, "Lenient Integer", syntax::accept_any)
                .with_equality(rules::INTEGER_MATCH_OID),
        );
        let schema = builder.build().unwrap();
        assert!(schema.validate_value("uidNumber", b"01").is_ok());
        assert!(schema.ordering_rule("uidNumber").is_none());
    }
}
