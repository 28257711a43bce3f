//! Attributes, entries and modifications shared by protocol operations,
//! filter evaluation and LDIF change records.

use crate::core::ber::{BerReader, BerWriter, Tag};
use crate::core::byte_string::ByteString;
use crate::error::DecodeError;

/// An attribute description with its values, in the order they were supplied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub description: String,
    pub values: Vec<ByteString>,
}

impl Attribute {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            values: Vec::new(),
        }
    }

    pub fn with_values<I, V>(description: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ByteString>,
    {
        Self {
            description: description.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn add_value(&mut self, value: impl Into<ByteString>) {
        self.values.push(value.into());
    }

    /// The attribute type part of the description, without options (`cn;lang-en` → `cn`)
    pub fn attribute_type(&self) -> &str {
        base_type(&self.description)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `PartialAttribute ::= SEQUENCE { type, vals SET OF value }`
    pub(crate) fn write_to(&self, writer: &mut BerWriter) {
        writer.write_sequence(Tag::SEQUENCE, |w| {
            w.write_octet_string(self.description.as_bytes());
            w.write_sequence(Tag::SET, |w| {
                for value in &self.values {
                    w.write_octet_string(value);
                }
            });
        });
    }

    pub(crate) fn read_from(reader: &mut BerReader) -> Result<Self, DecodeError> {
        reader.read_start_sequence()?;
        let description = reader.read_octet_string_utf8()?;
        let mut values = Vec::new();
        reader.read_start_set()?;
        while reader.has_next_element() {
            values.push(reader.read_octet_string()?);
        }
        reader.read_end_set()?;
        reader.read_end_sequence()?;
        Ok(Self {
            description,
            values,
        })
    }
}

/// Strip attribute options from an attribute description
pub fn base_type(description: &str) -> &str {
    description.split(';').next().unwrap_or(description)
}

/// A directory entry: a DN and its attributes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Entry {
    pub dn: String,
    pub attributes: Vec<Attribute>,
}

impl Entry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: Vec::new(),
        }
    }

    /// Builder-style helper adding one attribute
    pub fn with_attribute<I, V>(mut self, description: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ByteString>,
    {
        self.attributes.push(Attribute::with_values(description, values));
        self
    }

    /// Attributes whose type name matches `name`, ignoring case and options
    pub fn attributes_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Attribute> + 'a {
        let wanted = base_type(name);
        self.attributes
            .iter()
            .filter(move |a| a.attribute_type().eq_ignore_ascii_case(wanted))
    }
}

/// Kind of change made by one modification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModificationType {
    Add,
    Delete,
    Replace,
    /// RFC 4525 modify-increment
    Increment,
}

impl ModificationType {
    pub fn code(self) -> i64 {
        match self {
            ModificationType::Add => 0,
            ModificationType::Delete => 1,
            ModificationType::Replace => 2,
            ModificationType::Increment => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ModificationType::Add),
            1 => Some(ModificationType::Delete),
            2 => Some(ModificationType::Replace),
            3 => Some(ModificationType::Increment),
            _ => None,
        }
    }

    /// Keyword used in LDIF modify records
    pub fn ldif_keyword(self) -> &'static str {
        match self {
            ModificationType::Add => "add",
            ModificationType::Delete => "delete",
            ModificationType::Replace => "replace",
            ModificationType::Increment => "increment",
        }
    }

    pub fn from_ldif_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "add" => Some(ModificationType::Add),
            "delete" => Some(ModificationType::Delete),
            "replace" => Some(ModificationType::Replace),
            "increment" => Some(ModificationType::Increment),
            _ => None,
        }
    }
}

/// One change inside a modify request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modification {
    pub mod_type: ModificationType,
    pub attribute: Attribute,
}

impl Modification {
    pub fn new(mod_type: ModificationType, attribute: Attribute) -> Self {
        Self {
            mod_type,
            attribute,
        }
    }
}
