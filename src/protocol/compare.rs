//! # Compare
//!
//! Compare assertions and the rule for folding several compare results into
//! one overall outcome.
//!
//! When one assertion is compared against many entries, the overall result is
//! computed by [`aggregate_compare_result`]:
//! - a SUCCESS or COMPARE_TRUE accumulator is replaced by the new code
//! - a COMPARE_FALSE accumulator is replaced by anything except COMPARE_TRUE
//! - any other (error) code is kept
//!
//! So one false comparison is not hidden by later true ones, and the first
//! error is never overwritten.
//!
//! ## Example Usage
//! ```rust
//! use ldap_core::protocol::compare::aggregate_compare_results;
//! use ldap_core::protocol::result::ResultCode;
//!
//! let overall = aggregate_compare_results([
//!     ResultCode::CompareTrue,
//!     ResultCode::CompareFalse,
//!     ResultCode::CompareTrue,
//! ]);
//! assert_eq!(overall, ResultCode::CompareFalse);
//! ```

use crate::core::byte_string::ByteString;
use crate::error::{constants, LdapError, Result};
use crate::protocol::result::ResultCode;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::Path;

/// Combine the running result `acc` with the result of one more comparison
pub fn aggregate_compare_result(acc: ResultCode, new: ResultCode) -> ResultCode {
    match acc {
        ResultCode::Success | ResultCode::CompareTrue => new,
        ResultCode::CompareFalse if new != ResultCode::CompareTrue => new,
        _ => acc,
    }
}

/// Fold a sequence of compare results, starting from SUCCESS
pub fn aggregate_compare_results<I>(results: I) -> ResultCode
where
    I: IntoIterator<Item = ResultCode>,
{
    results
        .into_iter()
        .fold(ResultCode::Success, aggregate_compare_result)
}

/// An attribute description and the value to compare it against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareAssertion {
    pub attribute: String,
    pub value: ByteString,
}

impl CompareAssertion {
    pub fn new(attribute: impl Into<String>, value: impl Into<ByteString>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Parse `attr:value`, `attr::base64` or `attr:<path`.
    ///
    /// The `:<` form reads the assertion value from a file.
    pub fn parse(text: &str) -> Result<Self> {
        let (attribute, rest) = text
            .split_once(':')
            .ok_or(LdapError::InvalidArgument("compare assertion must be attr:value"))?;
        if attribute.is_empty() {
            return Err(LdapError::InvalidArgument("compare assertion has no attribute"));
        }

        let value = if let Some(encoded) = rest.strip_prefix(':') {
            let decoded = STANDARD
                .decode(encoded.trim())
                .map_err(|_| LdapError::InvalidArgument(constants::ERR_LDIF_BAD_BASE64))?;
            ByteString::wrap(decoded)
        } else if let Some(path) = rest.strip_prefix('<') {
            ByteString::wrap(std::fs::read(Path::new(path.trim()))?)
        } else {
            ByteString::from(rest)
        };

        Ok(Self::new(attribute, value))
    }
}
