//! # ldap-core
//!
//! Protocol and semantics core of an LDAP directory: the pieces a server or
//! tool needs before any networking or storage enters the picture.
//!
//! ## Components
//! - **core**: `ByteString`, the BER reader/writer and a Tokio message codec
//! - **protocol**: LDAP messages, results, attributes and request controls
//! - **filter**: search filters in BER and RFC 4515 form, plus evaluation
//! - **schema**: syntaxes, matching rules and attribute types
//! - **ldif**: reading and writing LDIF change records
//!
//! Registries (`ControlRegistry`, `Schema`) are built once and frozen; the
//! frozen values are `Send + Sync` and meant to be shared behind an `Arc` or a
//! `'static` reference.
//!
//! ## Example Usage
//! ```rust
//! use ldap_core::filter::{ConditionResult, Filter};
//! use ldap_core::protocol::Entry;
//! use ldap_core::schema::Schema;
//!
//! let entry = Entry::new("uid=bjensen,dc=example,dc=com")
//!     .with_attribute("cn", ["Babs Jensen"]);
//! let filter = Filter::parse("(cn=babs jensen)").unwrap();
//! assert_eq!(filter.matches(&entry, Schema::core()), ConditionResult::True);
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod filter;
pub mod ldif;
pub mod protocol;
pub mod schema;
pub mod utils;

pub use crate::config::CoreConfig;
pub use crate::core::byte_string::ByteString;
pub use crate::error::{LdapError, Result};
