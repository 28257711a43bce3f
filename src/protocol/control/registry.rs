use super::{AssertionControlDecoder, Control, FlagControlDecoder, RawControl};
use super::{OID_MANAGE_DSA_IT, OID_PERMISSIVE_MODIFY, OID_SUBTREE_DELETE};
use crate::core::ber::BerReader;
use crate::core::ber::Tag;
use crate::core::byte_string::ByteString;
use crate::error::DecodeError;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Turns the criticality and value of one control OID into a typed control.
pub trait ControlDecoder: Send + Sync {
    fn oid(&self) -> &str;

    fn decode(
        &self,
        critical: bool,
        value: Option<&ByteString>,
    ) -> Result<Box<dyn Control>, DecodeError>;

    /// Whether one operation may carry this control more than once
    fn allows_multiple(&self) -> bool {
        false
    }
}

type DecodeFn =
    dyn Fn(bool, Option<&ByteString>) -> Result<Box<dyn Control>, DecodeError> + Send + Sync;

struct FnDecoder {
    oid: Cow<'static, str>,
    decode: Box<DecodeFn>,
}

impl ControlDecoder for FnDecoder {
    fn oid(&self) -> &str {
        &self.oid
    }

    fn decode(
        &self,
        critical: bool,
        value: Option<&ByteString>,
    ) -> Result<Box<dyn Control>, DecodeError> {
        (self.decode)(critical, value)
    }
}

type DecoderMap = HashMap<Cow<'static, str>, Arc<dyn ControlDecoder>>;

/// Mutable registration phase of a [`ControlRegistry`].
///
/// Registration is an explicit bootstrap step. Registering a second decoder
/// for an OID replaces the first.
#[derive(Default)]
pub struct ControlRegistryBuilder {
    decoders: DecoderMap,
}

impl ControlRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder pre-loaded with the built-in controls
    pub fn with_defaults() -> Self {
        let mut builder = Self::new();
        builder
            .register(AssertionControlDecoder)
            .register(FlagControlDecoder::new(OID_MANAGE_DSA_IT))
            .register(FlagControlDecoder::new(OID_PERMISSIVE_MODIFY))
            .register(FlagControlDecoder::new(OID_SUBTREE_DELETE));
        builder
    }

    pub fn register<D>(&mut self, decoder: D) -> &mut Self
    where
        D: ControlDecoder + 'static,
    {
        let oid = Cow::Owned(decoder.oid().to_string());
        self.insert(oid, Arc::new(decoder))
    }

    /// Register a closure as the decoder for `oid`
    pub fn register_fn<F>(&mut self, oid: impl Into<Cow<'static, str>>, decode: F) -> &mut Self
    where
        F: Fn(bool, Option<&ByteString>) -> Result<Box<dyn Control>, DecodeError>
            + Send
            + Sync
            + 'static,
    {
        let oid = oid.into();
        let decoder = FnDecoder {
            oid: oid.clone(),
            decode: Box::new(decode),
        };
        self.insert(oid, Arc::new(decoder))
    }

    fn insert(&mut self, oid: Cow<'static, str>, decoder: Arc<dyn ControlDecoder>) -> &mut Self {
        if self.decoders.insert(oid.clone(), decoder).is_some() {
            debug!(oid = %oid, "replaced existing control decoder");
        } else {
            debug!(oid = %oid, "registered control decoder");
        }
        self
    }

    /// Freeze the registrations; the result is read-only and freely shareable
    pub fn build(self) -> ControlRegistry {
        debug!(decoders = self.decoders.len(), "control registry frozen");
        ControlRegistry {
            decoders: self.decoders,
        }
    }
}

/// Read-only map from control OID to decoder.
///
/// Lookups need no locking; share it between connections with an `Arc`.
pub struct ControlRegistry {
    decoders: DecoderMap,
}

impl Default for ControlRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ControlRegistry {
    pub fn builder() -> ControlRegistryBuilder {
        ControlRegistryBuilder::new()
    }

    /// A registry holding only the built-in controls
    pub fn with_defaults() -> Self {
        ControlRegistryBuilder::with_defaults().build()
    }

    /// A registry with no decoders; every control decodes as raw
    pub fn empty() -> Self {
        ControlRegistryBuilder::new().build()
    }

    pub fn is_registered(&self, oid: &str) -> bool {
        self.decoders.contains_key(oid)
    }

    /// Unregistered OIDs are passed through, so they may repeat
    pub fn allows_multiple(&self, oid: &str) -> bool {
        self.decoders
            .get(oid)
            .map_or(true, |decoder| decoder.allows_multiple())
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Decode one control; OIDs without a decoder produce a [`RawControl`]
    pub fn decode(
        &self,
        oid: &str,
        critical: bool,
        value: Option<&ByteString>,
    ) -> Result<Box<dyn Control>, DecodeError> {
        match self.decoders.get(oid) {
            Some(decoder) => decoder.decode(critical, value),
            None => Ok(Box::new(RawControl::new(oid, critical, value.cloned()))),
        }
    }

    /// Read one control SEQUENCE and decode it
    pub fn read_control(&self, reader: &mut BerReader) -> Result<Box<dyn Control>, DecodeError> {
        reader.read_start_sequence()?;
        let oid = reader.read_octet_string_utf8()?;
        let mut critical = false;
        if reader.has_next_element() && reader.peek_tag()? == Tag::BOOLEAN {
            critical = reader.read_boolean()?;
        }
        let value = if reader.has_next_element() && reader.peek_tag()? == Tag::OCTET_STRING {
            Some(reader.read_octet_string()?)
        } else {
            None
        };
        reader.read_end_sequence()?;
        self.decode(&oid, critical, value.as_ref())
    }
}

impl fmt::Debug for ControlRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut oids: Vec<&str> = self.decoders.keys().map(|k| k.as_ref()).collect();
        oids.sort_unstable();
        f.debug_struct("ControlRegistry").field("oids", &oids).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ber::BerWriter;
    use crate::protocol::control::{write_control, FlagControl};

    #[test]
    fn test_unknown_oid_is_raw() {
        let registry = ControlRegistry::with_defaults();
        let value = ByteString::from("opaque");
        let control = registry.decode("1.2.3.4", true, Some(&value)).unwrap();
        let raw = control.downcast_ref::<RawControl>().unwrap();
        assert!(raw.critical);
        assert_eq!(raw.value.as_ref(), Some(&value));
    }

    #[test]
    fn test_last_registration_wins() {
        let mut builder = ControlRegistryBuilder::with_defaults();
        builder.register_fn(OID_MANAGE_DSA_IT, |critical, value| {
            Ok(Box::new(RawControl::new("replaced", critical, value.cloned())))
        });
        let registry = builder.build();
        let control = registry.decode(OID_MANAGE_DSA_IT, false, None).unwrap();
        assert_eq!(control.oid(), "replaced");
    }

    #[test]
    fn test_read_control_sequence() {
        let mut writer = BerWriter::new();
        write_control(&mut writer, OID_SUBTREE_DELETE, true, None);
        let mut reader = BerReader::new(writer.finish());
        let control = ControlRegistry::with_defaults().read_control(&mut reader).unwrap();
        assert_eq!(
            control.downcast_ref::<FlagControl>(),
            Some(&FlagControl::subtree_delete(true))
        );
    }

    #[test]
    fn test_registry_debug_lists_oids() {
        let registry = ControlRegistry::with_defaults();
        assert_eq!(registry.len(), 4);
        assert!(format!("{registry:?}").contains(crate::protocol::control::OID_ASSERTION));
    }
}
