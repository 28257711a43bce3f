use super::{Control, ControlDecoder};
use crate::core::byte_string::ByteString;
use crate::error::DecodeError;
use crate::filter::Filter;
use std::any::Any;

/// LDAP Assertion control (RFC 4528)
pub const OID_ASSERTION: &str = "1.3.6.1.1.12";

/// Makes an update or read conditional on the target entry matching a filter.
///
/// The control value is the BER encoding of the filter and is mandatory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionControl {
    critical: bool,
    filter: Filter,
}

impl AssertionControl {
    pub fn new(critical: bool, filter: Filter) -> Self {
        Self { critical, filter }
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }
}

impl Control for AssertionControl {
    fn oid(&self) -> &str {
        OID_ASSERTION
    }

    fn is_critical(&self) -> bool {
        self.critical
    }

    fn value(&self) -> Option<ByteString> {
        Some(self.filter.to_ber())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Decoder for [`AssertionControl`]
#[derive(Debug, Clone, Copy, Default)]
pub struct AssertionControlDecoder;

impl ControlDecoder for AssertionControlDecoder {
    fn oid(&self) -> &str {
        OID_ASSERTION
    }

    fn decode(
        &self,
        critical: bool,
        value: Option<&ByteString>,
    ) -> Result<Box<dyn Control>, DecodeError> {
        let value = value.ok_or_else(|| DecodeError::MissingControlValue(OID_ASSERTION.to_string()))?;
        let filter = Filter::from_ber(value).map_err(|e| DecodeError::InvalidControlValue {
            oid: OID_ASSERTION.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Box::new(AssertionControl::new(critical, filter)))
    }
}
