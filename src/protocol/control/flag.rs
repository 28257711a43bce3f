use super::{Control, ControlDecoder};
use crate::core::byte_string::ByteString;
use crate::error::{constants, DecodeError};
use std::any::Any;
use std::borrow::Cow;

/// ManageDsaIT (RFC 3296): treat referral objects as ordinary entries
pub const OID_MANAGE_DSA_IT: &str = "2.16.840.1.113730.3.4.2";

/// Permissive Modify: adding a present value or deleting a missing one is not an error
pub const OID_PERMISSIVE_MODIFY: &str = "1.2.840.113556.1.4.1413";

/// Subtree Delete: delete an entry together with all of its subordinates
pub const OID_SUBTREE_DELETE: &str = "1.2.840.113556.1.4.805";

/// A control whose presence is its whole meaning; it never carries a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagControl {
    oid: Cow<'static, str>,
    critical: bool,
}

impl FlagControl {
    pub fn new(oid: impl Into<Cow<'static, str>>, critical: bool) -> Self {
        Self {
            oid: oid.into(),
            critical,
        }
    }

    pub fn manage_dsa_it(critical: bool) -> Self {
        Self::new(OID_MANAGE_DSA_IT, critical)
    }

    pub fn permissive_modify(critical: bool) -> Self {
        Self::new(OID_PERMISSIVE_MODIFY, critical)
    }

    pub fn subtree_delete(critical: bool) -> Self {
        Self::new(OID_SUBTREE_DELETE, critical)
    }
}

impl Control for FlagControl {
    fn oid(&self) -> &str {
        &self.oid
    }

    fn is_critical(&self) -> bool {
        self.critical
    }

    fn value(&self) -> Option<ByteString> {
        None
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Decoder for a [`FlagControl`] OID; rejects any value
#[derive(Debug, Clone)]
pub struct FlagControlDecoder {
    oid: Cow<'static, str>,
}

impl FlagControlDecoder {
    pub fn new(oid: impl Into<Cow<'static, str>>) -> Self {
        Self { oid: oid.into() }
    }
}

impl ControlDecoder for FlagControlDecoder {
    fn oid(&self) -> &str {
        &self.oid
    }

    fn decode(
        &self,
        critical: bool,
        value: Option<&ByteString>,
    ) -> Result<Box<dyn Control>, DecodeError> {
        if value.is_some() {
            return Err(DecodeError::InvalidControlValue {
                oid: self.oid.to_string(),
                reason: constants::ERR_CONTROL_UNEXPECTED_VALUE.to_string(),
            });
        }
        Ok(Box::new(FlagControl::new(self.oid.clone(), critical)))
    }
}
