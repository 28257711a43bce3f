//! Filter evaluation against an entry.
//!
//! Results are three-valued as in RFC 4511 §4.5.1.7: an assertion that cannot
//! be evaluated (no suitable matching rule, or an assertion value the rule
//! cannot interpret) is `Undefined`, and `Undefined` propagates through `And`,
//! `Or` and `Not` under Kleene logic.

use super::{AttributeValueAssertion, ExtensibleMatch, Filter, SubstringFilter};
use crate::core::byte_string::ByteString;
use crate::protocol::attribute::Entry;
use crate::schema::syntax::split_unescaped;
use crate::schema::{MatchingRule, MatchingRuleKind, Schema};
use std::cmp::Ordering;
use std::ops::Not;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionResult {
    True,
    False,
    Undefined,
}

impl ConditionResult {
    pub fn and(self, other: ConditionResult) -> ConditionResult {
        use ConditionResult::*;
        match (self, other) {
            (False, _) | (_, False) => False,
            (Undefined, _) | (_, Undefined) => Undefined,
            (True, True) => True,
        }
    }

    pub fn or(self, other: ConditionResult) -> ConditionResult {
        use ConditionResult::*;
        match (self, other) {
            (True, _) | (_, True) => True,
            (Undefined, _) | (_, Undefined) => Undefined,
            (False, False) => False,
        }
    }

    pub fn is_true(self) -> bool {
        self == ConditionResult::True
    }
}

impl Not for ConditionResult {
    type Output = ConditionResult;

    fn not(self) -> ConditionResult {
        match self {
            ConditionResult::True => ConditionResult::False,
            ConditionResult::False => ConditionResult::True,
            ConditionResult::Undefined => ConditionResult::Undefined,
        }
    }
}

impl From<bool> for ConditionResult {
    fn from(value: bool) -> Self {
        if value {
            ConditionResult::True
        } else {
            ConditionResult::False
        }
    }
}

impl Filter {
    /// Evaluate this filter against `entry`; every comparison goes through
    /// the matching rules `schema` assigns to the attribute
    pub fn matches(&self, entry: &Entry, schema: &Schema) -> ConditionResult {
        match self {
            Filter::And(children) => children
                .iter()
                .fold(ConditionResult::True, |acc, f| acc.and(f.matches(entry, schema))),
            Filter::Or(children) => children
                .iter()
                .fold(ConditionResult::False, |acc, f| acc.or(f.matches(entry, schema))),
            Filter::Not(child) => !child.matches(entry, schema),
            Filter::Present(attribute) => values_of(entry, schema, attribute).next().is_some().into(),
            Filter::Equality(ava) => {
                let rule = schema.equality_rule(&ava.attribute);
                match_values(entry, schema, ava, rule, |o| o == Ordering::Equal)
            }
            Filter::GreaterOrEqual(ava) => {
                let rule = schema.ordering_rule(&ava.attribute);
                match_values(entry, schema, ava, rule, |o| o != Ordering::Less)
            }
            Filter::LessOrEqual(ava) => {
                let rule = schema.ordering_rule(&ava.attribute);
                match_values(entry, schema, ava, rule, |o| o != Ordering::Greater)
            }
            Filter::Approx(ava) => {
                let rule = schema
                    .approximate_rule(&ava.attribute)
                    .or_else(|| schema.equality_rule(&ava.attribute));
                match_values(entry, schema, ava, rule, |o| o == Ordering::Equal)
            }
            Filter::Substrings(sub) => match_substrings(entry, schema, sub),
            Filter::Extensible(ext) => match_extensible(entry, schema, ext),
        }
    }
}

/// Every value of every attribute in `entry` of the same type as `description`
fn values_of<'a>(
    entry: &'a Entry,
    schema: &'a Schema,
    description: &'a str,
) -> impl Iterator<Item = &'a ByteString> + 'a {
    entry
        .attributes
        .iter()
        .filter(move |a| schema.same_attribute_type(&a.description, description))
        .flat_map(|a| a.values.iter())
}

fn match_values(
    entry: &Entry,
    schema: &Schema,
    ava: &AttributeValueAssertion,
    rule: Option<&MatchingRule>,
    accept: impl Fn(Ordering) -> bool,
) -> ConditionResult {
    let Some(rule) = rule else {
        return ConditionResult::Undefined;
    };
    if rule.normalize(&ava.value).is_err() {
        return ConditionResult::Undefined;
    }
    let mut result = ConditionResult::False;
    for value in values_of(entry, schema, &ava.attribute) {
        match rule.compare(value, &ava.value) {
            Ok(order) if accept(order) => return ConditionResult::True,
            Ok(_) => {}
            Err(_) => result = ConditionResult::Undefined,
        }
    }
    result
}

fn match_substrings(entry: &Entry, schema: &Schema, sub: &SubstringFilter) -> ConditionResult {
    let Some(rule) = schema.substring_rule(sub.attribute()) else {
        return ConditionResult::Undefined;
    };
    let initial = sub.initial().map(|v| v.as_bytes());
    let final_ = sub.final_().map(|v| v.as_bytes());

    let mut result = ConditionResult::False;
    for value in values_of(entry, schema, sub.attribute()) {
        match rule.substrings_match(value, initial, sub.any(), final_) {
            Ok(true) => return ConditionResult::True,
            Ok(false) => {}
            Err(_) => result = ConditionResult::Undefined,
        }
    }
    result
}

fn match_extensible(entry: &Entry, schema: &Schema, ext: &ExtensibleMatch) -> ConditionResult {
    let rule = match (ext.matching_rule(), ext.attribute()) {
        (Some(name), _) => schema.matching_rule(name),
        (None, Some(attribute)) => schema.equality_rule(attribute),
        (None, None) => None,
    };
    let Some(rule) = rule else {
        return ConditionResult::Undefined;
    };
    if rule.kind() == MatchingRuleKind::Substring || rule.normalize(ext.value()).is_err() {
        return ConditionResult::Undefined;
    }

    let mut candidates: Vec<(&str, &[u8])> = entry
        .attributes
        .iter()
        .filter(|a| ext.attribute().map_or(true, |t| schema.same_attribute_type(&a.description, t)))
        .flat_map(|a| a.values.iter().map(move |v| (a.description.as_str(), v.as_bytes())))
        .collect();
    if ext.dn_attributes() {
        candidates.extend(
            dn_values(&entry.dn)
                .into_iter()
                .filter(|(t, _)| ext.attribute().map_or(true, |a| schema.same_attribute_type(t, a))),
        );
    }

    let mut result = ConditionResult::False;
    for (_, value) in candidates {
        let outcome = match rule.kind() {
            MatchingRuleKind::Ordering => rule.compare(value, ext.value()).map(|o| o == Ordering::Less),
            _ => rule.values_match(value, ext.value()),
        };
        match outcome {
            Ok(true) => return ConditionResult::True,
            Ok(false) => {}
            Err(_) => result = ConditionResult::Undefined,
        }
    }
    result
}

/// Attribute type and value of every AVA in a DN
fn dn_values(dn: &str) -> Vec<(&str, &[u8])> {
    split_unescaped(dn, &[',', '+'])
        .into_iter()
        .filter_map(|ava| ava.split_once('='))
        .map(|(t, v)| (t.trim(), v.trim().as_bytes()))
        .collect()
}
