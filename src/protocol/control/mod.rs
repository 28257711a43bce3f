//! # Controls
//!
//! Request and response controls (RFC 4511 §4.1.11).
//!
//! A control travels as
//! `SEQUENCE { controlType LDAPOID, criticality BOOLEAN DEFAULT FALSE, controlValue OCTET STRING OPTIONAL }`.
//! Decoding goes through a [`ControlRegistry`] that maps the OID to a
//! [`ControlDecoder`]. OIDs without a decoder come back as [`RawControl`]
//! with the untyped bytes; whether an unrecognized *critical* control rejects
//! the operation is decided by the caller from [`Control::is_critical`].
//!
//! ## Example Usage
//! ```rust
//! use ldap_core::filter::Filter;
//! use ldap_core::protocol::control::{AssertionControl, Control, ControlRegistry};
//!
//! let registry = ControlRegistry::with_defaults();
//! let control = AssertionControl::new(true, Filter::parse("(cn=Babs)").unwrap());
//!
//! let decoded = registry
//!     .decode(control.oid(), control.is_critical(), control.value().as_ref())
//!     .unwrap();
//! assert_eq!(decoded.downcast_ref::<AssertionControl>(), Some(&control));
//! ```

mod assertion;
mod flag;
mod registry;

pub use assertion::{AssertionControl, AssertionControlDecoder, OID_ASSERTION};
pub use flag::{
    FlagControl, FlagControlDecoder, OID_MANAGE_DSA_IT, OID_PERMISSIVE_MODIFY, OID_SUBTREE_DELETE,
};
pub use registry::{ControlDecoder, ControlRegistry, ControlRegistryBuilder};

use crate::core::ber::{BerWriter, Tag};
use crate::core::byte_string::ByteString;
use std::any::Any;
use std::fmt;

/// A decoded control attached to a request or response.
///
/// Implementations are immutable once built and know how to serialize their
/// own value.
pub trait Control: fmt::Debug + Send + Sync {
    fn oid(&self) -> &str;

    fn is_critical(&self) -> bool;

    /// Encoded `controlValue`, if the control carries one
    fn value(&self) -> Option<ByteString>;

    fn as_any(&self) -> &dyn Any;
}

impl<'a> dyn Control + 'a {
    /// Access the concrete control type
    pub fn downcast_ref<T: Control + 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Append the control SEQUENCE to `writer`
    pub fn write_to(&self, writer: &mut BerWriter) {
        write_control(writer, self.oid(), self.is_critical(), self.value().as_ref());
    }
}

/// Controls compare by their wire identity: OID, criticality and value
impl PartialEq for dyn Control {
    fn eq(&self, other: &Self) -> bool {
        self.oid() == other.oid()
            && self.is_critical() == other.is_critical()
            && self.value() == other.value()
    }
}

pub(crate) fn write_control(
    writer: &mut BerWriter,
    oid: &str,
    critical: bool,
    value: Option<&ByteString>,
) {
    writer.write_sequence(Tag::SEQUENCE, |w| {
        w.write_octet_string(oid.as_bytes());
        // DEFAULT FALSE is never encoded
        if critical {
            w.write_boolean(true);
        }
        if let Some(value) = value {
            w.write_octet_string(value);
        }
    });
}

/// A control with no registered decoder, kept as received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawControl {
    pub oid: String,
    pub critical: bool,
    pub value: Option<ByteString>,
}

impl RawControl {
    pub fn new(oid: impl Into<String>, critical: bool, value: Option<ByteString>) -> Self {
        Self {
            oid: oid.into(),
            critical,
            value,
        }
    }
}

impl Control for RawControl {
    fn oid(&self) -> &str {
        &self.oid
    }

    fn is_critical(&self) -> bool {
        self.critical
    }

    fn value(&self) -> Option<ByteString> {
        self.value.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
