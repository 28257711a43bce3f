//! LDAP result codes (RFC 4511 §4.1.9 and Appendix A) and the `LDAPResult` body.

use crate::core::ber::{BerReader, BerWriter, Tag};
use crate::error::DecodeError;
use std::fmt;

/// An LDAP result code.
///
/// Codes without a dedicated variant are kept as `Other` so that decoding a
/// response never fails on an unfamiliar code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Success,
    OperationsError,
    ProtocolError,
    TimeLimitExceeded,
    SizeLimitExceeded,
    CompareFalse,
    CompareTrue,
    AuthMethodNotSupported,
    StrongerAuthRequired,
    Referral,
    AdminLimitExceeded,
    UnavailableCriticalExtension,
    ConfidentialityRequired,
    SaslBindInProgress,
    NoSuchAttribute,
    UndefinedAttributeType,
    InappropriateMatching,
    ConstraintViolation,
    AttributeOrValueExists,
    InvalidAttributeSyntax,
    NoSuchObject,
    AliasProblem,
    InvalidDnSyntax,
    AliasDereferencingProblem,
    InappropriateAuthentication,
    InvalidCredentials,
    InsufficientAccessRights,
    Busy,
    Unavailable,
    UnwillingToPerform,
    LoopDetect,
    NamingViolation,
    ObjectClassViolation,
    NotAllowedOnNonLeaf,
    NotAllowedOnRdn,
    EntryAlreadyExists,
    ObjectClassModsProhibited,
    AffectsMultipleDsas,
    Other(i32),
}

impl ResultCode {
    pub fn code(self) -> i32 {
        match self {
            ResultCode::Success => 0,
            ResultCode::OperationsError => 1,
            ResultCode::ProtocolError => 2,
            ResultCode::TimeLimitExceeded => 3,
            ResultCode::SizeLimitExceeded => 4,
            ResultCode::CompareFalse => 5,
            ResultCode::CompareTrue => 6,
            ResultCode::AuthMethodNotSupported => 7,
            ResultCode::StrongerAuthRequired => 8,
            ResultCode::Referral => 10,
            ResultCode::AdminLimitExceeded => 11,
            ResultCode::UnavailableCriticalExtension => 12,
            ResultCode::ConfidentialityRequired => 13,
            ResultCode::SaslBindInProgress => 14,
            ResultCode::NoSuchAttribute => 16,
            ResultCode::UndefinedAttributeType => 17,
            ResultCode::InappropriateMatching => 18,
            ResultCode::ConstraintViolation => 19,
            ResultCode::AttributeOrValueExists => 20,
            ResultCode::InvalidAttributeSyntax => 21,
            ResultCode::NoSuchObject => 32,
            ResultCode::AliasProblem => 33,
            ResultCode::InvalidDnSyntax => 34,
            ResultCode::AliasDereferencingProblem => 36,
            ResultCode::InappropriateAuthentication => 48,
            ResultCode::InvalidCredentials => 49,
            ResultCode::InsufficientAccessRights => 50,
            ResultCode::Busy => 51,
            ResultCode::Unavailable => 52,
            ResultCode::UnwillingToPerform => 53,
            ResultCode::LoopDetect => 54,
            ResultCode::NamingViolation => 64,
            ResultCode::ObjectClassViolation => 65,
            ResultCode::NotAllowedOnNonLeaf => 66,
            ResultCode::NotAllowedOnRdn => 67,
            ResultCode::EntryAlreadyExists => 68,
            ResultCode::ObjectClassModsProhibited => 69,
            ResultCode::AffectsMultipleDsas => 71,
            ResultCode::Other(code) => code,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            0 => ResultCode::Success,
            1 => ResultCode::OperationsError,
            2 => ResultCode::ProtocolError,
            3 => ResultCode::TimeLimitExceeded,
            4 => ResultCode::SizeLimitExceeded,
            5 => ResultCode::CompareFalse,
            6 => ResultCode::CompareTrue,
            7 => ResultCode::AuthMethodNotSupported,
            8 => ResultCode::StrongerAuthRequired,
            10 => ResultCode::Referral,
            11 => ResultCode::AdminLimitExceeded,
            12 => ResultCode::UnavailableCriticalExtension,
            13 => ResultCode::ConfidentialityRequired,
            14 => ResultCode::SaslBindInProgress,
            16 => ResultCode::NoSuchAttribute,
            17 => ResultCode::UndefinedAttributeType,
            18 => ResultCode::InappropriateMatching,
            19 => ResultCode::ConstraintViolation,
            20 => ResultCode::AttributeOrValueExists,
            21 => ResultCode::InvalidAttributeSyntax,
            32 => ResultCode::NoSuchObject,
            33 => ResultCode::AliasProblem,
            34 => ResultCode::InvalidDnSyntax,
            36 => ResultCode::AliasDereferencingProblem,
            48 => ResultCode::InappropriateAuthentication,
            49 => ResultCode::InvalidCredentials,
            50 => ResultCode::InsufficientAccessRights,
            51 => ResultCode::Busy,
            52 => ResultCode::Unavailable,
            53 => ResultCode::UnwillingToPerform,
            54 => ResultCode::LoopDetect,
            64 => ResultCode::NamingViolation,
            65 => ResultCode::ObjectClassViolation,
            66 => ResultCode::NotAllowedOnNonLeaf,
            67 => ResultCode::NotAllowedOnRdn,
            68 => ResultCode::EntryAlreadyExists,
            69 => ResultCode::ObjectClassModsProhibited,
            71 => ResultCode::AffectsMultipleDsas,
            other => ResultCode::Other(other),
        }
    }

    /// Whether this code reports a completed operation rather than a failure
    pub fn is_success(self) -> bool {
        matches!(
            self,
            ResultCode::Success | ResultCode::CompareTrue | ResultCode::CompareFalse
        )
    }
}

impl From<i32> for ResultCode {
    fn from(code: i32) -> Self {
        ResultCode::from_code(code)
    }
}

impl From<ResultCode> for i32 {
    fn from(code: ResultCode) -> Self {
        code.code()
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultCode::Other(code) => write!(f, "{code}"),
            known => write!(f, "{} ({:?})", known.code(), known),
        }
    }
}

/// The `LDAPResult` carried by every non-search response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdapResult {
    pub code: ResultCode,
    pub matched_dn: String,
    pub diagnostic_message: String,
    pub referrals: Vec<String>,
}

const REFERRAL: Tag = Tag::context_constructed(3);

impl LdapResult {
    pub fn new(code: ResultCode) -> Self {
        Self {
            code,
            matched_dn: String::new(),
            diagnostic_message: String::new(),
            referrals: Vec::new(),
        }
    }

    pub fn with_diagnostic(mut self, message: impl Into<String>) -> Self {
        self.diagnostic_message = message.into();
        self
    }

    /// Write the result components into the already opened response sequence
    pub(crate) fn write_components(&self, writer: &mut BerWriter) {
        writer
            .write_enumerated(i64::from(self.code.code()))
            .write_octet_string(self.matched_dn.as_bytes())
            .write_octet_string(self.diagnostic_message.as_bytes());
        if !self.referrals.is_empty() {
            writer.write_sequence(REFERRAL, |w| {
                for uri in &self.referrals {
                    w.write_octet_string(uri.as_bytes());
                }
            });
        }
    }

    /// Read the result components from inside an opened response sequence
    pub(crate) fn read_components(reader: &mut BerReader) -> Result<Self, DecodeError> {
        let raw = reader.read_enumerated()?;
        let code = i32::try_from(raw)
            .map(ResultCode::from_code)
            .map_err(|_| DecodeError::InvalidValue(format!("result code {raw} out of range")))?;
        let matched_dn = reader.read_octet_string_utf8()?;
        let diagnostic_message = reader.read_octet_string_utf8()?;

        let mut referrals = Vec::new();
        if reader.has_next_element() && reader.peek_tag()? == REFERRAL {
            reader.read_start_sequence_with_tag(REFERRAL)?;
            while reader.has_next_element() {
                referrals.push(reader.read_octet_string_utf8()?);
            }
            reader.read_end_sequence()?;
        }

        Ok(Self {
            code,
            matched_dn,
            diagnostic_message,
            referrals,
        })
    }
}
