//! The `LDAPMessage` envelope and the protocol operations it carries.
//!
//! ```text
//! LDAPMessage ::= SEQUENCE {
//!      messageID       INTEGER (0 .. maxInt),
//!      protocolOp      CHOICE { ... },
//!      controls       [0] Controls OPTIONAL }
//! ```

use super::attribute::{Attribute, Entry, Modification, ModificationType};
use super::control::{Control, ControlRegistry};
use super::result::LdapResult;
use crate::core::ber::{BerReader, BerWriter, Tag};
use crate::core::byte_string::ByteString;
use crate::error::{self, DecodeError, LdapError};
use crate::filter::{AttributeValueAssertion, Filter};
use tracing::trace;

const CONTROLS: Tag = Tag::context_constructed(0);
const NEW_SUPERIOR: Tag = Tag::context(0);

const UNBIND_REQUEST: Tag = Tag::application(2);
const SEARCH_REQUEST: Tag = Tag::application_constructed(3);
const SEARCH_RESULT_ENTRY: Tag = Tag::application_constructed(4);
const SEARCH_RESULT_DONE: Tag = Tag::application_constructed(5);
const MODIFY_REQUEST: Tag = Tag::application_constructed(6);
const MODIFY_RESPONSE: Tag = Tag::application_constructed(7);
const ADD_REQUEST: Tag = Tag::application_constructed(8);
const ADD_RESPONSE: Tag = Tag::application_constructed(9);
const DELETE_REQUEST: Tag = Tag::application(10);
const DELETE_RESPONSE: Tag = Tag::application_constructed(11);
const MODIFY_DN_REQUEST: Tag = Tag::application_constructed(12);
const MODIFY_DN_RESPONSE: Tag = Tag::application_constructed(13);
const COMPARE_REQUEST: Tag = Tag::application_constructed(14);
const COMPARE_RESPONSE: Tag = Tag::application_constructed(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    BaseObject,
    SingleLevel,
    WholeSubtree,
}

impl SearchScope {
    fn from_code(code: i64) -> Result<Self, DecodeError> {
        match code {
            0 => Ok(SearchScope::BaseObject),
            1 => Ok(SearchScope::SingleLevel),
            2 => Ok(SearchScope::WholeSubtree),
            other => Err(DecodeError::InvalidValue(format!("search scope {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerefAliases {
    Never,
    InSearching,
    FindingBaseObject,
    Always,
}

impl DerefAliases {
    fn from_code(code: i64) -> Result<Self, DecodeError> {
        match code {
            0 => Ok(DerefAliases::Never),
            1 => Ok(DerefAliases::InSearching),
            2 => Ok(DerefAliases::FindingBaseObject),
            3 => Ok(DerefAliases::Always),
            other => Err(DecodeError::InvalidValue(format!("deref aliases {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub base_object: String,
    pub scope: SearchScope,
    pub deref_aliases: DerefAliases,
    pub size_limit: i32,
    pub time_limit: i32,
    pub types_only: bool,
    pub filter: Filter,
    pub attributes: Vec<String>,
}

impl SearchRequest {
    /// Subtree search below `base_object` returning all user attributes
    pub fn new(base_object: impl Into<String>, filter: Filter) -> Self {
        Self {
            base_object: base_object.into(),
            scope: SearchScope::WholeSubtree,
            deref_aliases: DerefAliases::Never,
            size_limit: 0,
            time_limit: 0,
            types_only: false,
            filter,
            attributes: Vec::new(),
        }
    }
}

/// The `protocolOp` CHOICE, restricted to the operations this crate handles
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolOp {
    AddRequest(Entry),
    AddResponse(LdapResult),
    DeleteRequest {
        dn: String,
    },
    DeleteResponse(LdapResult),
    ModifyRequest {
        dn: String,
        changes: Vec<Modification>,
    },
    ModifyResponse(LdapResult),
    ModifyDnRequest {
        dn: String,
        new_rdn: String,
        delete_old_rdn: bool,
        new_superior: Option<String>,
    },
    ModifyDnResponse(LdapResult),
    CompareRequest {
        dn: String,
        assertion: AttributeValueAssertion,
    },
    CompareResponse(LdapResult),
    SearchRequest(SearchRequest),
    SearchResultEntry(Entry),
    SearchResultDone(LdapResult),
    UnbindRequest,
}

impl ProtocolOp {
    pub fn name(&self) -> &'static str {
        match self {
            ProtocolOp::AddRequest(_) => "addRequest",
            ProtocolOp::AddResponse(_) => "addResponse",
            ProtocolOp::DeleteRequest { .. } => "delRequest",
            ProtocolOp::DeleteResponse(_) => "delResponse",
            ProtocolOp::ModifyRequest { .. } => "modifyRequest",
            ProtocolOp::ModifyResponse(_) => "modifyResponse",
            ProtocolOp::ModifyDnRequest { .. } => "modDNRequest",
            ProtocolOp::ModifyDnResponse(_) => "modDNResponse",
            ProtocolOp::CompareRequest { .. } => "compareRequest",
            ProtocolOp::CompareResponse(_) => "compareResponse",
            ProtocolOp::SearchRequest(_) => "searchRequest",
            ProtocolOp::SearchResultEntry(_) => "searchResEntry",
            ProtocolOp::SearchResultDone(_) => "searchResDone",
            ProtocolOp::UnbindRequest => "unbindRequest",
        }
    }

    /// The result of a response operation
    pub fn result(&self) -> Option<&LdapResult> {
        match self {
            ProtocolOp::AddResponse(r)
            | ProtocolOp::DeleteResponse(r)
            | ProtocolOp::ModifyResponse(r)
            | ProtocolOp::ModifyDnResponse(r)
            | ProtocolOp::CompareResponse(r)
            | ProtocolOp::SearchResultDone(r) => Some(r),
            _ => None,
        }
    }

    pub fn write_to(&self, writer: &mut BerWriter) {
        match self {
            ProtocolOp::AddRequest(entry) => write_entry(writer, ADD_REQUEST, entry),
            ProtocolOp::SearchResultEntry(entry) => write_entry(writer, SEARCH_RESULT_ENTRY, entry),
            ProtocolOp::AddResponse(r) => write_result(writer, ADD_RESPONSE, r),
            ProtocolOp::DeleteResponse(r) => write_result(writer, DELETE_RESPONSE, r),
            ProtocolOp::ModifyResponse(r) => write_result(writer, MODIFY_RESPONSE, r),
            ProtocolOp::ModifyDnResponse(r) => write_result(writer, MODIFY_DN_RESPONSE, r),
            ProtocolOp::CompareResponse(r) => write_result(writer, COMPARE_RESPONSE, r),
            ProtocolOp::SearchResultDone(r) => write_result(writer, SEARCH_RESULT_DONE, r),
            ProtocolOp::DeleteRequest { dn } => {
                writer.write_octet_string_with_tag(DELETE_REQUEST, dn.as_bytes());
            }
            ProtocolOp::UnbindRequest => {
                writer.write_octet_string_with_tag(UNBIND_REQUEST, &[]);
            }
            ProtocolOp::ModifyRequest { dn, changes } => {
                writer.write_sequence(MODIFY_REQUEST, |w| {
                    w.write_octet_string(dn.as_bytes());
                    w.write_sequence(Tag::SEQUENCE, |w| {
                        for change in changes {
                            w.write_sequence(Tag::SEQUENCE, |w| {
                                w.write_enumerated(change.mod_type.code());
                                change.attribute.write_to(w);
                            });
                        }
                    });
                });
            }
            ProtocolOp::ModifyDnRequest {
                dn,
                new_rdn,
                delete_old_rdn,
                new_superior,
            } => {
                writer.write_sequence(MODIFY_DN_REQUEST, |w| {
                    w.write_octet_string(dn.as_bytes())
                        .write_octet_string(new_rdn.as_bytes())
                        .write_boolean(*delete_old_rdn);
                    if let Some(superior) = new_superior {
                        w.write_octet_string_with_tag(NEW_SUPERIOR, superior.as_bytes());
                    }
                });
            }
            ProtocolOp::CompareRequest { dn, assertion } => {
                writer.write_sequence(COMPARE_REQUEST, |w| {
                    w.write_octet_string(dn.as_bytes());
                    w.write_sequence(Tag::SEQUENCE, |w| {
                        w.write_octet_string(assertion.attribute.as_bytes())
                            .write_octet_string(&assertion.value);
                    });
                });
            }
            ProtocolOp::SearchRequest(search) => {
                writer.write_sequence(SEARCH_REQUEST, |w| {
                    w.write_octet_string(search.base_object.as_bytes())
                        .write_enumerated(search.scope as i64)
                        .write_enumerated(search.deref_aliases as i64)
                        .write_integer(i64::from(search.size_limit))
                        .write_integer(i64::from(search.time_limit))
                        .write_boolean(search.types_only);
                    search.filter.write_to(w);
                    w.write_sequence(Tag::SEQUENCE, |w| {
                        for attribute in &search.attributes {
                            w.write_octet_string(attribute.as_bytes());
                        }
                    });
                });
            }
        }
    }

    pub fn read_from(reader: &mut BerReader) -> Result<Self, DecodeError> {
        let tag = reader.peek_tag()?;
        let op = match tag {
            UNBIND_REQUEST => {
                reader.read_null_with_tag(UNBIND_REQUEST)?;
                ProtocolOp::UnbindRequest
            }
            DELETE_REQUEST => ProtocolOp::DeleteRequest {
                dn: reader.read_utf8_with_tag(DELETE_REQUEST)?,
            },
            ADD_REQUEST => ProtocolOp::AddRequest(read_entry(reader, ADD_REQUEST)?),
            SEARCH_RESULT_ENTRY => ProtocolOp::SearchResultEntry(read_entry(reader, SEARCH_RESULT_ENTRY)?),
            ADD_RESPONSE => ProtocolOp::AddResponse(read_result(reader, ADD_RESPONSE)?),
            DELETE_RESPONSE => ProtocolOp::DeleteResponse(read_result(reader, DELETE_RESPONSE)?),
            MODIFY_RESPONSE => ProtocolOp::ModifyResponse(read_result(reader, MODIFY_RESPONSE)?),
            MODIFY_DN_RESPONSE => ProtocolOp::ModifyDnResponse(read_result(reader, MODIFY_DN_RESPONSE)?),
            COMPARE_RESPONSE => ProtocolOp::CompareResponse(read_result(reader, COMPARE_RESPONSE)?),
            SEARCH_RESULT_DONE => ProtocolOp::SearchResultDone(read_result(reader, SEARCH_RESULT_DONE)?),
            MODIFY_REQUEST => read_modify(reader)?,
            MODIFY_DN_REQUEST => {
                reader.read_start_sequence_with_tag(MODIFY_DN_REQUEST)?;
                let dn = reader.read_octet_string_utf8()?;
                let new_rdn = reader.read_octet_string_utf8()?;
                let delete_old_rdn = reader.read_boolean()?;
                let mut new_superior = None;
                if reader.has_next_element() && reader.peek_tag()? == NEW_SUPERIOR {
                    new_superior = Some(reader.read_utf8_with_tag(NEW_SUPERIOR)?);
                }
                reader.read_end_sequence()?;
                ProtocolOp::ModifyDnRequest {
                    dn,
                    new_rdn,
                    delete_old_rdn,
                    new_superior,
                }
            }
            COMPARE_REQUEST => {
                reader.read_start_sequence_with_tag(COMPARE_REQUEST)?;
                let dn = reader.read_octet_string_utf8()?;
                reader.read_start_sequence()?;
                let attribute = reader.read_octet_string_utf8()?;
                let value = reader.read_octet_string()?;
                reader.read_end_sequence()?;
                reader.read_end_sequence()?;
                ProtocolOp::CompareRequest {
                    dn,
                    assertion: AttributeValueAssertion { attribute, value },
                }
            }
            SEARCH_REQUEST => ProtocolOp::SearchRequest(read_search(reader)?),
            other => {
                return Err(DecodeError::InvalidTag {
                    tag: other.raw(),
                    context: "protocol operation",
                })
            }
        };
        trace!(op = op.name(), "decoded protocol operation");
        Ok(op)
    }
}

fn write_entry(writer: &mut BerWriter, tag: Tag, entry: &Entry) {
    writer.write_sequence(tag, |w| {
        w.write_octet_string(entry.dn.as_bytes());
        w.write_sequence(Tag::SEQUENCE, |w| {
            for attribute in &entry.attributes {
                attribute.write_to(w);
            }
        });
    });
}

fn read_entry(reader: &mut BerReader, tag: Tag) -> Result<Entry, DecodeError> {
    reader.read_start_sequence_with_tag(tag)?;
    let dn = reader.read_octet_string_utf8()?;
    let mut attributes = Vec::new();
    reader.read_start_sequence()?;
    while reader.has_next_element() {
        attributes.push(Attribute::read_from(reader)?);
    }
    reader.read_end_sequence()?;
    reader.read_end_sequence()?;
    Ok(Entry { dn, attributes })
}

fn write_result(writer: &mut BerWriter, tag: Tag, result: &LdapResult) {
    writer.write_sequence(tag, |w| result.write_components(w));
}

fn read_result(reader: &mut BerReader, tag: Tag) -> Result<LdapResult, DecodeError> {
    reader.read_start_sequence_with_tag(tag)?;
    let result = LdapResult::read_components(reader)?;
    reader.read_end_sequence()?;
    Ok(result)
}

fn read_modify(reader: &mut BerReader) -> Result<ProtocolOp, DecodeError> {
    reader.read_start_sequence_with_tag(MODIFY_REQUEST)?;
    let dn = reader.read_octet_string_utf8()?;
    let mut changes = Vec::new();
    reader.read_start_sequence()?;
    while reader.has_next_element() {
        reader.read_start_sequence()?;
        let code = reader.read_enumerated()?;
        let mod_type = ModificationType::from_code(code)
            .ok_or_else(|| DecodeError::InvalidValue(format!("modification type {code}")))?;
        let attribute = Attribute::read_from(reader)?;
        reader.read_end_sequence()?;
        changes.push(Modification::new(mod_type, attribute));
    }
    reader.read_end_sequence()?;
    reader.read_end_sequence()?;
    Ok(ProtocolOp::ModifyRequest { dn, changes })
}

fn read_search(reader: &mut BerReader) -> Result<SearchRequest, DecodeError> {
    reader.read_start_sequence_with_tag(SEARCH_REQUEST)?;
    let base_object = reader.read_octet_string_utf8()?;
    let scope = SearchScope::from_code(reader.read_enumerated()?)?;
    let deref_aliases = DerefAliases::from_code(reader.read_enumerated()?)?;
    let size_limit = reader.read_i32()?;
    let time_limit = reader.read_i32()?;
    let types_only = reader.read_boolean()?;
    let filter = Filter::read_from(reader)?;
    let mut attributes = Vec::new();
    reader.read_start_sequence()?;
    while reader.has_next_element() {
        attributes.push(reader.read_octet_string_utf8()?);
    }
    reader.read_end_sequence()?;
    reader.read_end_sequence()?;
    Ok(SearchRequest {
        base_object,
        scope,
        deref_aliases,
        size_limit,
        time_limit,
        types_only,
        filter,
        attributes,
    })
}

/// One LDAP protocol data unit
#[derive(Debug, PartialEq)]
pub struct LdapMessage {
    pub message_id: i32,
    pub op: ProtocolOp,
    pub controls: Vec<Box<dyn Control>>,
}

impl LdapMessage {
    pub fn new(message_id: i32, op: ProtocolOp) -> Self {
        Self {
            message_id,
            op,
            controls: Vec::new(),
        }
    }

    pub fn with_control(mut self, control: impl Control + 'static) -> Self {
        self.controls.push(Box::new(control));
        self
    }

    /// Find an attached control by OID
    pub fn control(&self, oid: &str) -> Option<&dyn Control> {
        self.controls.iter().find(|c| c.oid() == oid).map(|c| &**c)
    }

    pub fn write_to(&self, writer: &mut BerWriter) {
        writer.write_sequence(Tag::SEQUENCE, |w| {
            w.write_integer(i64::from(self.message_id));
            self.op.write_to(w);
            if !self.controls.is_empty() {
                w.write_sequence(CONTROLS, |w| {
                    for control in &self.controls {
                        control.write_to(w);
                    }
                });
            }
        });
    }

    /// Encode the message; negative message IDs are refused
    pub fn to_byte_string(&self) -> error::Result<ByteString> {
        if self.message_id < 0 {
            return Err(LdapError::InvalidArgument("message ID must not be negative"));
        }
        let mut writer = BerWriter::new();
        self.write_to(&mut writer);
        writer.into_byte_string()
    }

    /// Decode one message at the reader's cursor.
    ///
    /// Controls are decoded through `registry`; a second control with the
    /// same OID is rejected unless its decoder allows repeats.
    pub fn decode(reader: &mut BerReader, registry: &ControlRegistry) -> Result<Self, DecodeError> {
        reader.read_start_sequence()?;
        let message_id = reader.read_i32()?;
        if message_id < 0 {
            return Err(DecodeError::InvalidValue(format!("message ID {message_id}")));
        }
        let op = ProtocolOp::read_from(reader)?;

        let mut controls: Vec<Box<dyn Control>> = Vec::new();
        if reader.has_next_element() && reader.peek_tag()? == CONTROLS {
            reader.read_start_sequence_with_tag(CONTROLS)?;
            while reader.has_next_element() {
                let control = registry.read_control(reader)?;
                let repeated = controls.iter().any(|c| c.oid() == control.oid());
                if repeated && !registry.allows_multiple(control.oid()) {
                    return Err(DecodeError::DuplicateControl(control.oid().to_string()));
                }
                controls.push(control);
            }
            reader.read_end_sequence()?;
        }
        reader.read_end_sequence()?;

        Ok(Self {
            message_id,
            op,
            controls,
        })
    }

    /// Decode a message that must occupy all of `bytes`
    pub fn from_bytes(bytes: &ByteString, registry: &ControlRegistry) -> Result<Self, DecodeError> {
        let mut reader = BerReader::new(bytes.clone());
        let message = Self::decode(&mut reader, registry)?;
        reader.ensure_consumed()?;
        Ok(message)
    }

    /// Fails with the OID of the first critical control `registry` does not know
    pub fn check_critical_controls(&self, registry: &ControlRegistry) -> error::Result<()> {
        match self
            .controls
            .iter()
            .find(|c| c.is_critical() && !registry.is_registered(c.oid()))
        {
            Some(control) => Err(LdapError::UnsupportedCriticalExtension(control.oid().to_string())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::control::{AssertionControl, FlagControl, RawControl};
    use crate::protocol::result::ResultCode;

    fn round_trip(message: &LdapMessage) -> LdapMessage {
        let bytes = message.to_byte_string().unwrap();
        LdapMessage::from_bytes(&bytes, &ControlRegistry::with_defaults()).unwrap()
    }

    #[test]
    fn test_unbind_encoding() {
        let bytes = LdapMessage::new(3, ProtocolOp::UnbindRequest)
            .to_byte_string()
            .unwrap();
        assert_eq!(bytes.as_bytes(), &[0x30, 0x05, 0x02, 0x01, 0x03, 0x42, 0x00]);
    }

    #[test]
    fn test_delete_encoding() {
        let bytes = LdapMessage::new(1, ProtocolOp::DeleteRequest { dn: "o=x".into() })
            .to_byte_string()
            .unwrap();
        assert_eq!(
            bytes.as_bytes(),
            &[0x30, 0x08, 0x02, 0x01, 0x01, 0x4a, 0x03, b'o', b'=', b'x']
        );
    }

    #[test]
    fn test_requests_round_trip() {
        let ops = vec![
            ProtocolOp::AddRequest(
                Entry::new("uid=bjensen,dc=example,dc=com")
                    .with_attribute("objectClass", ["top", "person"])
                    .with_attribute("cn", ["Babs Jensen"]),
            ),
            ProtocolOp::ModifyRequest {
                dn: "uid=bjensen,dc=example,dc=com".into(),
                changes: vec![
                    Modification::new(
                        ModificationType::Replace,
                        Attribute::with_values("mail", ["b@example.com"]),
                    ),
                    Modification::new(ModificationType::Delete, Attribute::new("description")),
                ],
            },
            ProtocolOp::ModifyDnRequest {
                dn: "uid=a,dc=x".into(),
                new_rdn: "uid=b".into(),
                delete_old_rdn: true,
                new_superior: Some("ou=People,dc=x".into()),
            },
            ProtocolOp::CompareRequest {
                dn: "uid=a,dc=x".into(),
                assertion: AttributeValueAssertion::new("sn", "Jensen"),
            },
            ProtocolOp::SearchRequest(SearchRequest {
                attributes: vec!["cn".into(), "mail".into()],
                ..SearchRequest::new("dc=x", Filter::parse("(&(cn=Babs*)(uidNumber>=10))").unwrap())
            }),
        ];
        for (id, op) in ops.into_iter().enumerate() {
            let message = LdapMessage::new(id as i32 + 1, op);
            assert_eq!(round_trip(&message), message);
        }
    }

    #[test]
    fn test_responses_round_trip() {
        let mut result = LdapResult::new(ResultCode::NoSuchObject).with_diagnostic("gone");
        result.matched_dn = "dc=x".into();
        for op in [
            ProtocolOp::AddResponse(result.clone()),
            ProtocolOp::DeleteResponse(result.clone()),
            ProtocolOp::ModifyResponse(result.clone()),
            ProtocolOp::ModifyDnResponse(result.clone()),
            ProtocolOp::CompareResponse(LdapResult::new(ResultCode::CompareTrue)),
            ProtocolOp::SearchResultDone(result.clone()),
            ProtocolOp::SearchResultEntry(Entry::new("dc=x").with_attribute("dc", ["x"])),
        ] {
            let message = LdapMessage::new(9, op);
            assert_eq!(round_trip(&message), message);
        }
    }

    #[test]
    fn test_controls_round_trip() {
        let message = LdapMessage::new(4, ProtocolOp::DeleteRequest { dn: "cn=x".into() })
            .with_control(AssertionControl::new(true, Filter::present("cn")))
            .with_control(FlagControl::subtree_delete(false))
            .with_control(RawControl::new("1.2.3.4", false, Some("opaque".into())));
        let decoded = round_trip(&message);
        assert_eq!(decoded, message);
        assert!(decoded
            .control(crate::protocol::control::OID_ASSERTION)
            .and_then(|c| c.downcast_ref::<AssertionControl>())
            .is_some());
    }

    #[test]
    fn test_duplicate_control_rejected() {
        let message = LdapMessage::new(5, ProtocolOp::UnbindRequest)
            .with_control(FlagControl::manage_dsa_it(false))
            .with_control(FlagControl::manage_dsa_it(true));
        let bytes = message.to_byte_string().unwrap();
        assert!(matches!(
            LdapMessage::from_bytes(&bytes, &ControlRegistry::with_defaults()),
            Err(DecodeError::DuplicateControl(_))
        ));
    }

    #[test]
    fn test_unknown_critical_control() {
        let registry = ControlRegistry::with_defaults();
        let message = LdapMessage::new(6, ProtocolOp::UnbindRequest)
            .with_control(RawControl::new("1.2.3.4", false, None));
        assert!(message.check_critical_controls(&registry).is_ok());

        let message = message.with_control(RawControl::new("1.2.3.5", true, None));
        match message.check_critical_controls(&registry) {
            Err(LdapError::UnsupportedCriticalExtension(oid)) => assert_eq!(oid, "1.2.3.5"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_negative_message_id_rejected() {
        let bytes = ByteString::from_static(&[0x30, 0x05, 0x02, 0x01, 0xff, 0x42, 0x00]);
        assert!(LdapMessage::from_bytes(&bytes, &ControlRegistry::empty()).is_err());
        assert!(LdapMessage::new(-1, ProtocolOp::UnbindRequest).to_byte_string().is_err());
    }

    #[test]
    fn test_unknown_operation_rejected() {
        // abandonRequest is not handled
        let bytes = ByteString::from_static(&[0x30, 0x06, 0x02, 0x01, 0x01, 0x50, 0x01, 0x02]);
        assert!(matches!(
            LdapMessage::from_bytes(&bytes, &ControlRegistry::empty()),
            Err(DecodeError::InvalidTag { tag: 0x50, .. })
        ));
    }
}
