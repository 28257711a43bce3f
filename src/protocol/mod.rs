//! # LDAP Protocol Layer
//!
//! Typed protocol data units on top of the BER codec.
//!
//! ## Components
//! - **Message**: the `LDAPMessage` envelope and the operations it carries
//! - **Controls**: OID-keyed decoder registry and the built-in controls
//! - **Attributes**: entries, attributes and modifications
//! - **Results**: result codes and `LDAPResult`
//! - **Compare**: compare assertions and result aggregation

pub mod attribute;
pub mod compare;
pub mod control;
pub mod message;
pub mod result;

pub use attribute::{Attribute, Entry, Modification, ModificationType};
pub use message::{LdapMessage, ProtocolOp, SearchRequest};
pub use result::{LdapResult, ResultCode};
