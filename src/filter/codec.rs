use super::{extensible_error, AttributeValueAssertion, ExtensibleMatch, Filter, SubstringFilter};
use crate::core::ber::{BerReader, BerWriter, Tag};
use crate::core::byte_string::ByteString;
use crate::error::{constants, DecodeError};

const AND: Tag = Tag::context_constructed(0);
const OR: Tag = Tag::context_constructed(1);
const NOT: Tag = Tag::context_constructed(2);
const EQUALITY: Tag = Tag::context_constructed(3);
const SUBSTRINGS: Tag = Tag::context_constructed(4);
const GREATER_OR_EQUAL: Tag = Tag::context_constructed(5);
const LESS_OR_EQUAL: Tag = Tag::context_constructed(6);
const PRESENT: Tag = Tag::context(7);
const APPROX: Tag = Tag::context_constructed(8);
const EXTENSIBLE: Tag = Tag::context_constructed(9);

const SUB_INITIAL: Tag = Tag::context(0);
const SUB_ANY: Tag = Tag::context(1);
const SUB_FINAL: Tag = Tag::context(2);

const EXT_RULE: Tag = Tag::context(1);
const EXT_TYPE: Tag = Tag::context(2);
const EXT_VALUE: Tag = Tag::context(3);
const EXT_DN_ATTRIBUTES: Tag = Tag::context(4);

impl Filter {
    /// Append the BER encoding of this filter; tags are derived from the variant
    pub fn write_to(&self, writer: &mut BerWriter) {
        match self {
            Filter::And(children) => write_set(writer, AND, children),
            Filter::Or(children) => write_set(writer, OR, children),
            Filter::Not(child) => {
                writer.write_sequence(NOT, |w| child.write_to(w));
            }
            Filter::Equality(ava) => write_ava(writer, EQUALITY, ava),
            Filter::GreaterOrEqual(ava) => write_ava(writer, GREATER_OR_EQUAL, ava),
            Filter::LessOrEqual(ava) => write_ava(writer, LESS_OR_EQUAL, ava),
            Filter::Approx(ava) => write_ava(writer, APPROX, ava),
            Filter::Present(attribute) => {
                writer.write_octet_string_with_tag(PRESENT, attribute.as_bytes());
            }
            Filter::Substrings(sub) => {
                writer.write_sequence(SUBSTRINGS, |w| {
                    w.write_octet_string(sub.attribute.as_bytes());
                    w.write_sequence(Tag::SEQUENCE, |w| {
                        if let Some(initial) = &sub.initial {
                            w.write_octet_string_with_tag(SUB_INITIAL, initial);
                        }
                        for any in &sub.any {
                            w.write_octet_string_with_tag(SUB_ANY, any);
                        }
                        if let Some(final_) = &sub.final_ {
                            w.write_octet_string_with_tag(SUB_FINAL, final_);
                        }
                    });
                });
            }
            Filter::Extensible(ext) => {
                writer.write_sequence(EXTENSIBLE, |w| {
                    if let Some(rule) = &ext.matching_rule {
                        w.write_octet_string_with_tag(EXT_RULE, rule.as_bytes());
                    }
                    if let Some(attribute) = &ext.attribute {
                        w.write_octet_string_with_tag(EXT_TYPE, attribute.as_bytes());
                    }
                    w.write_octet_string_with_tag(EXT_VALUE, &ext.value);
                    if ext.dn_attributes {
                        w.write_boolean_with_tag(EXT_DN_ATTRIBUTES, true);
                    }
                });
            }
        }
    }

    /// Standalone BER encoding of this filter
    pub fn to_ber(&self) -> ByteString {
        let mut writer = BerWriter::new();
        self.write_to(&mut writer);
        writer.finish()
    }

    /// Read one filter at the reader's cursor
    pub fn read_from(reader: &mut BerReader) -> Result<Filter, DecodeError> {
        let tag = reader.peek_tag()?;
        match tag {
            AND => read_set(reader, AND).map(Filter::And),
            OR => read_set(reader, OR).map(Filter::Or),
            NOT => {
                reader.read_start_sequence_with_tag(NOT)?;
                let child = Filter::read_from(reader)?;
                reader.ensure_consumed()?;
                reader.read_end_sequence()?;
                Ok(Filter::Not(Box::new(child)))
            }
            EQUALITY => read_ava(reader, EQUALITY).map(Filter::Equality),
            GREATER_OR_EQUAL => read_ava(reader, GREATER_OR_EQUAL).map(Filter::GreaterOrEqual),
            LESS_OR_EQUAL => read_ava(reader, LESS_OR_EQUAL).map(Filter::LessOrEqual),
            APPROX => read_ava(reader, APPROX).map(Filter::Approx),
            PRESENT => read_attribute(reader, PRESENT).map(Filter::Present),
            SUBSTRINGS => read_substrings(reader).map(Filter::Substrings),
            EXTENSIBLE => read_extensible(reader).map(Filter::Extensible),
            other => Err(DecodeError::InvalidTag {
                tag: other.raw(),
                context: "filter",
            }),
        }
    }

    /// Decode a filter that must occupy all of `bytes`
    pub fn from_ber(bytes: &ByteString) -> Result<Filter, DecodeError> {
        let mut reader = BerReader::new(bytes.clone());
        let filter = Filter::read_from(&mut reader)?;
        reader.ensure_consumed()?;
        Ok(filter)
    }
}

fn write_set(writer: &mut BerWriter, tag: Tag, children: &[Filter]) {
    writer.write_sequence(tag, |w| {
        for child in children {
            child.write_to(w);
        }
    });
}

fn write_ava(writer: &mut BerWriter, tag: Tag, ava: &AttributeValueAssertion) {
    writer.write_sequence(tag, |w| {
        w.write_octet_string(ava.attribute.as_bytes());
        w.write_octet_string(&ava.value);
    });
}

fn read_set(reader: &mut BerReader, tag: Tag) -> Result<Vec<Filter>, DecodeError> {
    reader.read_start_sequence_with_tag(tag)?;
    let mut children = Vec::new();
    while reader.has_next_element() {
        children.push(Filter::read_from(reader)?);
    }
    reader.read_end_sequence()?;
    Ok(children)
}

fn read_ava(reader: &mut BerReader, tag: Tag) -> Result<AttributeValueAssertion, DecodeError> {
    reader.read_start_sequence_with_tag(tag)?;
    let attribute = read_attribute(reader, Tag::OCTET_STRING)?;
    let value = reader.read_octet_string()?;
    reader.read_end_sequence()?;
    Ok(AttributeValueAssertion { attribute, value })
}

fn read_substrings(reader: &mut BerReader) -> Result<SubstringFilter, DecodeError> {
    reader.read_start_sequence_with_tag(SUBSTRINGS)?;
    let attribute = read_attribute(reader, Tag::OCTET_STRING)?;

    let mut initial = None;
    let mut any = Vec::new();
    let mut final_ = None;
    let mut first = true;

    reader.read_start_sequence()?;
    while reader.has_next_element() {
        if final_.is_some() {
            return Err(DecodeError::InvalidFilter(constants::ERR_FILTER_BAD_SUBSTRING_ORDER));
        }
        match reader.peek_tag()? {
            SUB_INITIAL if first => initial = Some(reader.read_octet_string_with_tag(SUB_INITIAL)?),
            SUB_ANY => any.push(reader.read_octet_string_with_tag(SUB_ANY)?),
            SUB_FINAL => final_ = Some(reader.read_octet_string_with_tag(SUB_FINAL)?),
            SUB_INITIAL => {
                return Err(DecodeError::InvalidFilter(constants::ERR_FILTER_BAD_SUBSTRING_ORDER))
            }
            other => {
                return Err(DecodeError::InvalidTag {
                    tag: other.raw(),
                    context: "substring filter",
                })
            }
        }
        first = false;
    }
    reader.read_end_sequence()?;
    reader.read_end_sequence()?;

    SubstringFilter::new(attribute, initial, any, final_)
        .map_err(|_| DecodeError::InvalidFilter(constants::ERR_FILTER_NO_SUBSTRINGS))
}

fn read_extensible(reader: &mut BerReader) -> Result<ExtensibleMatch, DecodeError> {
    reader.read_start_sequence_with_tag(EXTENSIBLE)?;

    let mut matching_rule = None;
    if reader.has_next_element() && reader.peek_tag()? == EXT_RULE {
        matching_rule = Some(reader.read_utf8_with_tag(EXT_RULE)?);
    }
    let mut attribute = None;
    if reader.has_next_element() && reader.peek_tag()? == EXT_TYPE {
        attribute = Some(reader.read_utf8_with_tag(EXT_TYPE)?);
    }
    let value = reader.read_octet_string_with_tag(EXT_VALUE)?;
    let mut dn_attributes = false;
    if reader.has_next_element() && reader.peek_tag()? == EXT_DN_ATTRIBUTES {
        dn_attributes = reader.read_boolean_with_tag(EXT_DN_ATTRIBUTES)?;
    }
    reader.read_end_sequence()?;

    if let Some(reason) = extensible_error(matching_rule.as_deref(), attribute.as_deref()) {
        return Err(DecodeError::InvalidFilter(reason));
    }
    Ok(ExtensibleMatch {
        matching_rule,
        attribute,
        value,
        dn_attributes,
    })
}

/// An attribute description; the empty string is not one
fn read_attribute(reader: &mut BerReader, tag: Tag) -> Result<String, DecodeError> {
    let attribute = reader.read_utf8_with_tag(tag)?;
    if attribute.is_empty() {
        return Err(DecodeError::InvalidFilter(constants::ERR_FILTER_EMPTY_NAME));
    }
    Ok(attribute)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_encoding() {
        let filter = Filter::equality("cn", "Babs");
        assert_eq!(
            filter.to_ber().as_bytes(),
            &[0xa3, 0x0a, 0x04, 0x02, b'c', b'n', 0x04, 0x04, b'B', b'a', b'b', b's']
        );
    }

    #[test]
    fn test_present_encoding() {
        assert_eq!(
            Filter::present("cn").to_ber().as_bytes(),
            &[0x87, 0x02, b'c', b'n']
        );
    }

    #[test]
    fn test_nested_round_trip() {
        let filter = Filter::and(vec![
            Filter::or(vec![Filter::equality("uid", "a"), Filter::approx("sn", "jensen")]),
            Filter::not(Filter::present("mail")),
            Filter::substrings(
                "cn",
                Some("B".into()),
                vec!["a".into(), "b".into()],
                Some("s".into()),
            )
            .unwrap(),
            Filter::extensible(None, Some("ou".into()), "x", true).unwrap(),
            Filter::less_or_equal("uidNumber", "100"),
            Filter::and(vec![]),
        ]);
        assert_eq!(Filter::from_ber(&filter.to_ber()).unwrap(), filter);
    }

    #[test]
    fn test_unknown_choice_is_rejected() {
        let bytes = ByteString::from_static(&[0xaa, 0x00]);
        assert!(matches!(
            Filter::from_ber(&bytes),
            Err(DecodeError::InvalidTag { tag: 0xaa, .. })
        ));
    }

    #[test]
    fn test_empty_substrings_rejected() {
        // (cn=) as substrings with no components
        let bytes = ByteString::from_static(&[0xa4, 0x06, 0x04, 0x02, b'c', b'n', 0x30, 0x00]);
        assert_eq!(
            Filter::from_ber(&bytes),
            Err(DecodeError::InvalidFilter(constants::ERR_FILTER_NO_SUBSTRINGS))
        );
    }

    #[test]
    fn test_substring_order_enforced() {
        // final before any
        let bytes = ByteString::from_static(&[
            0xa4, 0x0c, 0x04, 0x02, b'c', b'n', 0x30, 0x06, 0x82, 0x01, b'a', 0x81, 0x01, b'b',
        ]);
        assert_eq!(
            Filter::from_ber(&bytes),
            Err(DecodeError::InvalidFilter(constants::ERR_FILTER_BAD_SUBSTRING_ORDER))
        );
    }

    #[test]
    fn test_not_with_two_children_rejected() {
        let bytes = ByteString::from_static(&[0xa2, 0x08, 0x87, 0x02, b'c', b'n', 0x87, 0x02, b's', b'n']);
        assert_eq!(Filter::from_ber(&bytes), Err(DecodeError::TrailingData(4)));
    }

    #[test]
    fn test_extensible_without_rule_or_type_rejected() {
        let bytes = ByteString::from_static(&[0xa9, 0x03, 0x83, 0x01, b'x']);
        assert!(Filter::from_ber(&bytes).is_err());
    }

    #[test]
    fn test_names_that_cannot_be_printed_rejected() {
        // present with an empty attribute description
        let bytes = ByteString::from_static(&[0x87, 0x00]);
        assert_eq!(
            Filter::from_ber(&bytes),
            Err(DecodeError::InvalidFilter(constants::ERR_FILTER_EMPTY_NAME))
        );
        // (cn:dn:=x) with "dn" as the matching rule
        let bytes = ByteString::from_static(&[
            0xa9, 0x0b, 0x81, 0x02, b'd', b'n', 0x82, 0x02, b'c', b'n', 0x83, 0x01, b'x',
        ]);
        assert_eq!(
            Filter::from_ber(&bytes),
            Err(DecodeError::InvalidFilter(constants::ERR_FILTER_DN_RULE))
        );
    }
}
