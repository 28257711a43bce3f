//! Matching rules: equality, ordering, substring and approximate comparators.
//!
//! Every rule reduces values to a canonical form with a [`Normalizer`] and
//! then compares canonical forms. Normalization is pure, so comparing
//! `normalize(a)` with `normalize(b)` is consistent: ordering rules give a
//! total order and equality rules an equivalence over the normalized space.

use crate::core::byte_string::ByteString;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

pub const OBJECT_IDENTIFIER_MATCH_OID: &str = "2.5.13.0";
pub const DISTINGUISHED_NAME_MATCH_OID: &str = "2.5.13.1";
pub const CASE_IGNORE_MATCH_OID: &str = "2.5.13.2";
pub const CASE_IGNORE_ORDERING_MATCH_OID: &str = "2.5.13.3";
pub const CASE_IGNORE_SUBSTRINGS_MATCH_OID: &str = "2.5.13.4";
pub const CASE_EXACT_MATCH_OID: &str = "2.5.13.5";
pub const CASE_EXACT_ORDERING_MATCH_OID: &str = "2.5.13.6";
pub const CASE_EXACT_SUBSTRINGS_MATCH_OID: &str = "2.5.13.7";
pub const NUMERIC_STRING_MATCH_OID: &str = "2.5.13.8";
pub const NUMERIC_STRING_ORDERING_MATCH_OID: &str = "2.5.13.9";
pub const NUMERIC_STRING_SUBSTRINGS_MATCH_OID: &str = "2.5.13.10";
pub const BOOLEAN_MATCH_OID: &str = "2.5.13.13";
pub const INTEGER_MATCH_OID: &str = "2.5.13.14";
pub const INTEGER_ORDERING_MATCH_OID: &str = "2.5.13.15";
pub const TELEPHONE_NUMBER_MATCH_OID: &str = "2.5.13.20";
pub const TELEPHONE_NUMBER_SUBSTRINGS_MATCH_OID: &str = "2.5.13.21";
pub const OCTET_STRING_MATCH_OID: &str = "2.5.13.17";
pub const OCTET_STRING_ORDERING_MATCH_OID: &str = "2.5.13.18";
pub const CASE_EXACT_IA5_MATCH_OID: &str = "1.3.6.1.4.1.1466.109.114.1";
pub const CASE_IGNORE_IA5_MATCH_OID: &str = "1.3.6.1.4.1.1466.109.114.2";
pub const CASE_IGNORE_IA5_SUBSTRINGS_MATCH_OID: &str = "1.3.6.1.4.1.1466.109.114.3";

use super::syntax::{
    split_unescaped, SYNTAX_BOOLEAN_OID, SYNTAX_DIRECTORY_STRING_OID, SYNTAX_DN_OID,
    SYNTAX_IA5_STRING_OID, SYNTAX_INTEGER_OID, SYNTAX_NUMERIC_STRING_OID, SYNTAX_OCTET_STRING_OID,
    SYNTAX_OID_OID, SYNTAX_TELEPHONE_NUMBER_OID,
};

/// Substring assertions are written in the Substring Assertion syntax
const SYNTAX_SUBSTRING_ASSERTION_OID: &str = "1.3.6.1.4.1.1466.115.121.1.58";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchingRuleKind {
    Equality,
    Ordering,
    Substring,
    Approximate,
}

/// Canonical form of values for one matching rule.
pub trait Normalizer: Send + Sync {
    /// Canonical form of `value`; fails when the value cannot be interpreted
    fn normalize(&self, value: &[u8]) -> Result<ByteString, String>;

    /// Order two canonical values; byte-wise unless the rule says otherwise
    fn compare_normalized(&self, a: &ByteString, b: &ByteString) -> Ordering {
        a.cmp(b)
    }
}

/// A matching rule registered under an OID.
#[derive(Clone)]
pub struct MatchingRule {
    oid: String,
    names: Vec<String>,
    kind: MatchingRuleKind,
    syntax_oid: String,
    normalizer: Arc<dyn Normalizer>,
}

impl MatchingRule {
    pub fn new<N>(
        oid: impl Into<String>,
        name: impl Into<String>,
        kind: MatchingRuleKind,
        syntax_oid: impl Into<String>,
        normalizer: N,
    ) -> Self
    where
        N: Normalizer + 'static,
    {
        Self {
            oid: oid.into(),
            names: vec![name.into()],
            kind,
            syntax_oid: syntax_oid.into(),
            normalizer: Arc::new(normalizer),
        }
    }

    pub fn oid(&self) -> &str {
        &self.oid
    }

    /// Primary name, or the OID when the rule has none
    pub fn name(&self) -> &str {
        self.names.first().map_or(&self.oid, String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn kind(&self) -> MatchingRuleKind {
        self.kind
    }

    /// OID of the syntax assertion values are written in
    pub fn syntax_oid(&self) -> &str {
        &self.syntax_oid
    }

    pub fn normalize(&self, value: &[u8]) -> Result<ByteString, String> {
        self.normalizer.normalize(value)
    }

    /// Equality (or approximate equality) of an attribute value and an assertion value
    pub fn values_match(&self, attribute_value: &[u8], assertion_value: &[u8]) -> Result<bool, String> {
        Ok(self.compare(attribute_value, assertion_value)? == Ordering::Equal)
    }

    /// Three-way comparison of an attribute value against an assertion value
    pub fn compare(&self, attribute_value: &[u8], assertion_value: &[u8]) -> Result<Ordering, String> {
        let a = self.normalize(attribute_value)?;
        let b = self.normalize(assertion_value)?;
        Ok(self.normalizer.compare_normalized(&a, &b))
    }

    /// Substring match. Components that normalize to nothing are ignored; if
    /// nothing is left the result is a non-match, never a vacuous match.
    pub fn substrings_match(
        &self,
        attribute_value: &[u8],
        initial: Option<&[u8]>,
        any: &[ByteString],
        final_: Option<&[u8]>,
    ) -> Result<bool, String> {
        let normalize_opt = |c: Option<&[u8]>| -> Result<Option<ByteString>, String> {
            match c {
                Some(c) => Ok(Some(self.normalize(c)?).filter(|n| !n.is_empty())),
                None => Ok(None),
            }
        };
        let initial = normalize_opt(initial)?;
        let final_ = normalize_opt(final_)?;
        let any = any
            .iter()
            .map(|c| self.normalize(c))
            .filter(|c| !matches!(c, Ok(n) if n.is_empty()))
            .collect::<Result<Vec<_>, _>>()?;

        if initial.is_none() && any.is_empty() && final_.is_none() {
            return Ok(false);
        }

        let value = self.normalize(attribute_value)?;
        let bytes = value.as_bytes();
        let mut start = 0;
        let mut end = bytes.len();

        if let Some(initial) = &initial {
            if !bytes.starts_with(initial) {
                return Ok(false);
            }
            start = initial.len();
        }
        if let Some(final_) = &final_ {
            if final_.len() > end - start || !bytes.ends_with(final_) {
                return Ok(false);
            }
            end -= final_.len();
        }
        for component in &any {
            match find(&bytes[start..end], component) {
                Some(at) => start += at + component.len(),
                None => return Ok(false),
            }
        }
        Ok(true)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

impl fmt::Debug for MatchingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchingRule")
            .field("oid", &self.oid)
            .field("names", &self.names)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Trim leading and trailing spaces and collapse inner runs to one space
fn collapse_spaces(text: &str) -> String {
    text.split(' ')
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn utf8(value: &[u8]) -> Result<&str, String> {
    std::str::from_utf8(value).map_err(|_| "value is not valid UTF-8".to_string())
}

/// Directory string comparison with insignificant spaces removed
#[derive(Debug, Clone, Copy)]
pub struct CaseExactNormalizer;

impl Normalizer for CaseExactNormalizer {
    fn normalize(&self, value: &[u8]) -> Result<ByteString, String> {
        Ok(ByteString::from(collapse_spaces(utf8(value)?)))
    }
}

/// As [`CaseExactNormalizer`] and case folded
#[derive(Debug, Clone, Copy)]
pub struct CaseIgnoreNormalizer;

impl Normalizer for CaseIgnoreNormalizer {
    fn normalize(&self, value: &[u8]) -> Result<ByteString, String> {
        Ok(ByteString::from(collapse_spaces(&utf8(value)?.to_lowercase())))
    }
}

/// IA5 (ASCII) strings, optionally case folded
#[derive(Debug, Clone, Copy)]
pub struct Ia5Normalizer {
    pub ignore_case: bool,
}

impl Normalizer for Ia5Normalizer {
    fn normalize(&self, value: &[u8]) -> Result<ByteString, String> {
        if !value.is_ascii() {
            return Err("value is not an IA5 string".to_string());
        }
        let text = utf8(value)?;
        let collapsed = collapse_spaces(text);
        Ok(ByteString::from(if self.ignore_case {
            collapsed.to_ascii_lowercase()
        } else {
            collapsed
        }))
    }
}

/// Raw octets
#[derive(Debug, Clone, Copy)]
pub struct OctetStringNormalizer;

impl Normalizer for OctetStringNormalizer {
    fn normalize(&self, value: &[u8]) -> Result<ByteString, String> {
        Ok(ByteString::copy_from_slice(value))
    }
}

/// Numeric strings compare with all spaces removed
#[derive(Debug, Clone, Copy)]
pub struct NumericStringNormalizer;

impl Normalizer for NumericStringNormalizer {
    fn normalize(&self, value: &[u8]) -> Result<ByteString, String> {
        Ok(ByteString::wrap(
            value.iter().copied().filter(|b| *b != b' ').collect::<Vec<u8>>(),
        ))
    }
}

/// `TRUE`/`FALSE`, case-insensitively
#[derive(Debug, Clone, Copy)]
pub struct BooleanNormalizer;

impl Normalizer for BooleanNormalizer {
    fn normalize(&self, value: &[u8]) -> Result<ByteString, String> {
        let text = utf8(value)?.trim();
        if text.eq_ignore_ascii_case("true") {
            Ok(ByteString::from_static(b"TRUE"))
        } else if text.eq_ignore_ascii_case("false") {
            Ok(ByteString::from_static(b"FALSE"))
        } else {
            Err(format!("'{text}' is not a boolean"))
        }
    }
}

/// Object identifiers; descriptors compare case-insensitively
#[derive(Debug, Clone, Copy)]
pub struct OidNormalizer;

impl Normalizer for OidNormalizer {
    fn normalize(&self, value: &[u8]) -> Result<ByteString, String> {
        Ok(ByteString::from(utf8(value)?.trim().to_ascii_lowercase()))
    }
}

/// Telephone numbers compare without spaces and hyphens, ignoring case
#[derive(Debug, Clone, Copy)]
pub struct TelephoneNumberNormalizer;

impl Normalizer for TelephoneNumberNormalizer {
    fn normalize(&self, value: &[u8]) -> Result<ByteString, String> {
        let text: String = utf8(value)?
            .chars()
            .filter(|c| *c != ' ' && *c != '-')
            .collect();
        Ok(ByteString::from(text.to_lowercase()))
    }
}

/// DNs compare RDN by RDN with spaces around separators removed and case folded.
///
/// Multi-valued RDNs are sorted so that `a=1+b=2` equals `b=2+a=1`.
#[derive(Debug, Clone, Copy)]
pub struct DnNormalizer;

impl Normalizer for DnNormalizer {
    fn normalize(&self, value: &[u8]) -> Result<ByteString, String> {
        let text = utf8(value)?.trim();
        if text.is_empty() {
            return Ok(ByteString::empty());
        }
        let rdns = split_unescaped(text, &[','])
            .into_iter()
            .map(|rdn| {
                let mut avas = split_unescaped(rdn, &['+'])
                    .into_iter()
                    .map(|ava| {
                        let (attribute, value) = ava
                            .split_once('=')
                            .ok_or_else(|| format!("RDN component '{ava}' has no '='"))?;
                        Ok(format!(
                            "{}={}",
                            attribute.trim().to_ascii_lowercase(),
                            collapse_spaces(&value.trim().to_lowercase())
                        ))
                    })
                    .collect::<Result<Vec<_>, String>>()?;
                avas.sort();
                Ok(avas.join("+"))
            })
            .collect::<Result<Vec<_>, String>>()?;
        Ok(ByteString::from(rdns.join(",")))
    }
}

/// Arbitrary-size decimal integers ordered numerically
#[derive(Debug, Clone, Copy)]
pub struct IntegerNormalizer;

impl Normalizer for IntegerNormalizer {
    fn normalize(&self, value: &[u8]) -> Result<ByteString, String> {
        let text = utf8(value)?.trim();
        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("'{text}' is not an integer"));
        }
        let digits = digits.trim_start_matches('0');
        Ok(ByteString::from(match (negative, digits.is_empty()) {
            (_, true) => "0".to_string(),
            (true, false) => format!("-{digits}"),
            (false, false) => digits.to_string(),
        }))
    }

    fn compare_normalized(&self, a: &ByteString, b: &ByteString) -> Ordering {
        let a_negative = a.starts_with(b"-");
        let b_negative = b.starts_with(b"-");
        let magnitude = |x: &ByteString, negative: bool| x.sub_sequence(usize::from(negative), x.len());
        match (a_negative, b_negative) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (negative, _) => {
                let (ma, mb) = (magnitude(a, negative), magnitude(b, negative));
                let order = ma.len().cmp(&mb.len()).then_with(|| ma.cmp(&mb));
                if negative {
                    order.reverse()
                } else {
                    order
                }
            }
        }
    }
}

/// The matching rules every schema starts with
pub(crate) fn core_matching_rules() -> Vec<MatchingRule> {
    use MatchingRuleKind as K;

    let ia5_exact = Ia5Normalizer { ignore_case: false };
    let ia5_ignore = Ia5Normalizer { ignore_case: true };

    vec![
        MatchingRule::new(OBJECT_IDENTIFIER_MATCH_OID, "objectIdentifierMatch", K::Equality, SYNTAX_OID_OID, OidNormalizer),
        MatchingRule::new(DISTINGUISHED_NAME_MATCH_OID, "distinguishedNameMatch", K::Equality, SYNTAX_DN_OID, DnNormalizer),
        MatchingRule::new(TELEPHONE_NUMBER_MATCH_OID, "telephoneNumberMatch", K::Equality, SYNTAX_TELEPHONE_NUMBER_OID, TelephoneNumberNormalizer),
        MatchingRule::new(TELEPHONE_NUMBER_SUBSTRINGS_MATCH_OID, "telephoneNumberSubstringsMatch", K::Substring, SYNTAX_SUBSTRING_ASSERTION_OID, TelephoneNumberNormalizer),
        MatchingRule::new(CASE_EXACT_MATCH_OID, "caseExactMatch", K::Equality, SYNTAX_DIRECTORY_STRING_OID, CaseExactNormalizer),
        MatchingRule::new(CASE_IGNORE_MATCH_OID, "caseIgnoreMatch", K::Equality, SYNTAX_DIRECTORY_STRING_OID, CaseIgnoreNormalizer),
        MatchingRule::new(CASE_EXACT_ORDERING_MATCH_OID, "caseExactOrderingMatch", K::Ordering, SYNTAX_DIRECTORY_STRING_OID, CaseExactNormalizer),
        MatchingRule::new(CASE_IGNORE_ORDERING_MATCH_OID, "caseIgnoreOrderingMatch", K::Ordering, SYNTAX_DIRECTORY_STRING_OID, CaseIgnoreNormalizer),
        MatchingRule::new(CASE_EXACT_SUBSTRINGS_MATCH_OID, "caseExactSubstringsMatch", K::Substring, SYNTAX_SUBSTRING_ASSERTION_OID, CaseExactNormalizer),
        MatchingRule::new(CASE_IGNORE_SUBSTRINGS_MATCH_OID, "caseIgnoreSubstringsMatch", K::Substring, SYNTAX_SUBSTRING_ASSERTION_OID, CaseIgnoreNormalizer),
        MatchingRule::new(OCTET_STRING_MATCH_OID, "octetStringMatch", K::Equality, SYNTAX_OCTET_STRING_OID, OctetStringNormalizer),
        MatchingRule::new(OCTET_STRING_ORDERING_MATCH_OID, "octetStringOrderingMatch", K::Ordering, SYNTAX_OCTET_STRING_OID, OctetStringNormalizer),
        MatchingRule::new(INTEGER_MATCH_OID, "integerMatch", K::Equality, SYNTAX_INTEGER_OID, IntegerNormalizer),
        MatchingRule::new(INTEGER_ORDERING_MATCH_OID, "integerOrderingMatch", K::Ordering, SYNTAX_INTEGER_OID, IntegerNormalizer),
        MatchingRule::new(BOOLEAN_MATCH_OID, "booleanMatch", K::Equality, SYNTAX_BOOLEAN_OID, BooleanNormalizer),
        MatchingRule::new(NUMERIC_STRING_MATCH_OID, "numericStringMatch", K::Equality, SYNTAX_NUMERIC_STRING_OID, NumericStringNormalizer),
        MatchingRule::new(NUMERIC_STRING_ORDERING_MATCH_OID, "numericStringOrderingMatch", K::Ordering, SYNTAX_NUMERIC_STRING_OID, NumericStringNormalizer),
        MatchingRule::new(NUMERIC_STRING_SUBSTRINGS_MATCH_OID, "numericStringSubstringsMatch", K::Substring, SYNTAX_SUBSTRING_ASSERTION_OID, NumericStringNormalizer),
        MatchingRule::new(CASE_EXACT_IA5_MATCH_OID, "caseExactIA5Match", K::Equality, SYNTAX_IA5_STRING_OID, ia5_exact),
        MatchingRule::new(CASE_IGNORE_IA5_MATCH_OID, "caseIgnoreIA5Match", K::Equality, SYNTAX_IA5_STRING_OID, ia5_ignore),
        MatchingRule::new(CASE_IGNORE_IA5_SUBSTRINGS_MATCH_OID, "caseIgnoreIA5SubstringsMatch", K::Substring, SYNTAX_SUBSTRING_ASSERTION_OID, ia5_ignore),
    ]
}
