//! # LDIF Change Records
//!
//! RFC 2849 change records: a stable, diffable text form of directory
//! changes.
//!
//! ```text
//! dn: uid=bjensen,ou=People,dc=example,dc=com
//! changetype: modify
//! replace: description
//! description:: w6lsw6h2ZQ==
//! -
//! ```
//!
//! ## Value Encoding
//! A value is written as plain text only when [`is_safe`] holds for its raw
//! bytes; otherwise it is base64 encoded after `::`. A value externalizer may
//! instead turn it into a `:<` URL reference.
//!
//! ## Folding
//! With a wrap column `N > 0`, long lines are folded so that no physical line
//! exceeds `N` bytes. Continuation lines start with a single space, which the
//! reader strips before joining.

mod reader;
mod writer;

pub use reader::LdifChangeRecordReader;
pub use writer::{LdifChangeRecordWriter, LdifSink, StreamSink};

use crate::error::{LdapError, Result};
use crate::protocol::attribute::{Entry, Modification};
use crate::protocol::message::ProtocolOp;

/// One Add, Delete, ModifyDN or Modify unit of an LDIF stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeRecord {
    Add(Entry),
    Delete {
        dn: String,
    },
    ModifyDn {
        dn: String,
        new_rdn: String,
        delete_old_rdn: bool,
        new_superior: Option<String>,
    },
    Modify {
        dn: String,
        modifications: Vec<Modification>,
    },
}

impl ChangeRecord {
    /// DN of the entry the change applies to
    pub fn dn(&self) -> &str {
        match self {
            ChangeRecord::Add(entry) => &entry.dn,
            ChangeRecord::Delete { dn }
            | ChangeRecord::ModifyDn { dn, .. }
            | ChangeRecord::Modify { dn, .. } => dn,
        }
    }

    /// The `changetype:` keyword of this record
    pub fn change_type(&self) -> &'static str {
        match self {
            ChangeRecord::Add(_) => "add",
            ChangeRecord::Delete { .. } => "delete",
            ChangeRecord::ModifyDn { .. } => "modrdn",
            ChangeRecord::Modify { .. } => "modify",
        }
    }
}

impl From<ChangeRecord> for ProtocolOp {
    fn from(record: ChangeRecord) -> Self {
        match record {
            ChangeRecord::Add(entry) => ProtocolOp::AddRequest(entry),
            ChangeRecord::Delete { dn } => ProtocolOp::DeleteRequest { dn },
            ChangeRecord::ModifyDn {
                dn,
                new_rdn,
                delete_old_rdn,
                new_superior,
            } => ProtocolOp::ModifyDnRequest {
                dn,
                new_rdn,
                delete_old_rdn,
                new_superior,
            },
            ChangeRecord::Modify { dn, modifications } => ProtocolOp::ModifyRequest {
                dn,
                changes: modifications,
            },
        }
    }
}

impl TryFrom<ProtocolOp> for ChangeRecord {
    type Error = LdapError;

    fn try_from(op: ProtocolOp) -> Result<Self> {
        match op {
            ProtocolOp::AddRequest(entry) => Ok(ChangeRecord::Add(entry)),
            ProtocolOp::DeleteRequest { dn } => Ok(ChangeRecord::Delete { dn }),
            ProtocolOp::ModifyDnRequest {
                dn,
                new_rdn,
                delete_old_rdn,
                new_superior,
            } => Ok(ChangeRecord::ModifyDn {
                dn,
                new_rdn,
                delete_old_rdn,
                new_superior,
            }),
            ProtocolOp::ModifyRequest { dn, changes } => Ok(ChangeRecord::Modify {
                dn,
                modifications: changes,
            }),
            _ => Err(LdapError::InvalidArgument("operation is not a change request")),
        }
    }
}

/// Whether `value` can be written as plain text after `attr: `.
///
/// RFC 2849 SAFE-STRING, plus no trailing space (it would not survive
/// editors and line-oriented tools): only ASCII without NUL, CR or LF, and
/// not starting with a space, `:` or `<`.
pub fn is_safe(value: &[u8]) -> bool {
    let Some((&first, _)) = value.split_first() else {
        return true;
    };
    if matches!(first, b' ' | b':' | b'<') || value.last() == Some(&b' ') {
        return false;
    }
    value
        .iter()
        .all(|&b| b.is_ascii() && !matches!(b, 0x00 | b'\n' | b'\r'))
}

/// Fold `line` so that no piece exceeds `wrap_column` bytes.
///
/// Continuation pieces start with one space. A column of 0 (or 1, which
/// leaves no room after the space) disables folding. Pieces never split a
/// UTF-8 character.
pub fn fold_line(line: &str, wrap_column: usize) -> Vec<String> {
    if wrap_column < 2 || line.len() <= wrap_column {
        return vec![line.to_string()];
    }

    let mut pieces = Vec::new();
    let mut rest = line;
    let mut room = wrap_column;
    while !rest.is_empty() {
        let mut end = room.min(rest.len());
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            // a character wider than the room left; emit it whole
            end = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }
        let (head, tail) = rest.split_at(end);
        if pieces.is_empty() {
            pieces.push(head.to_string());
        } else {
            pieces.push(format!(" {head}"));
        }
        rest = tail;
        room = wrap_column - 1;
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_safe() {
        assert!(is_safe(b""));
        assert!(is_safe(b"Babs Jensen"));
        assert!(is_safe(b"a:b<c"));
        assert!(!is_safe(b" leading"));
        assert!(!is_safe(b":colon"));
        assert!(!is_safe(b"<angle"));
        assert!(!is_safe(b"trailing "));
        assert!(!is_safe(b"line\nbreak"));
        assert!(!is_safe(b"nul\x00"));
        assert!(!is_safe("\u{e9}l\u{e8}ve".as_bytes()));
    }

    #[test]
    fn test_fold_line() {
        assert_eq!(fold_line("abcdef", 0), vec!["abcdef"]);
        assert_eq!(fold_line("abcdef", 6), vec!["abcdef"]);
        assert_eq!(fold_line("abcdefgh", 4), vec!["abcd", " efg", " h"]);
        let folded = fold_line(&"x".repeat(100), 10);
        assert!(folded.iter().all(|l| l.len() <= 10));
        let joined: String = folded
            .iter()
            .enumerate()
            .map(|(i, l)| if i == 0 { l.as_str() } else { &l[1..] })
            .collect();
        assert_eq!(joined, "x".repeat(100));
    }

    #[test]
    fn test_fold_line_keeps_characters_whole() {
        let folded = fold_line("# caf\u{e9} au lait", 6);
        for piece in &folded {
            assert!(piece.len() <= 6);
        }
        assert_eq!(folded[0], "# caf");
    }

    #[test]
    fn test_protocol_op_conversion() {
        let record = ChangeRecord::Delete { dn: "cn=x".into() };
        let op = ProtocolOp::from(record.clone());
        assert_eq!(op, ProtocolOp::DeleteRequest { dn: "cn=x".into() });
        assert_eq!(ChangeRecord::try_from(op).unwrap(), record);
        assert!(ChangeRecord::try_from(ProtocolOp::UnbindRequest).is_err());
    }
}
