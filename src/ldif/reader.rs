use super::ChangeRecord;
use crate::config::LdifConfig;
use crate::core::byte_string::ByteString;
use crate::error::{constants, LdapError, Result};
use crate::protocol::attribute::{base_type, Attribute, Entry, Modification, ModificationType};
use crate::schema::oid::attribute_description;
use crate::schema::Schema;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::io::BufRead;
use std::iter::Peekable;
use std::vec::IntoIter;
use tracing::trace;

/// A logical (unfolded) line and the number of its first physical line
type Line = (usize, String);

/// Reads change records from LDIF text.
///
/// Continuation lines are joined, comments and the `version:` line are
/// skipped, and `control:` lines are accepted but ignored. A record without
/// a `changetype:` line is an add.
pub struct LdifChangeRecordReader<'s, R: BufRead> {
    input: R,
    line_number: usize,
    first_record: bool,
    resolve_url_values: bool,
    schema: Option<&'s Schema>,
    strict_values: bool,
}

impl<'s, R: BufRead> LdifChangeRecordReader<'s, R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            line_number: 0,
            first_record: true,
            resolve_url_values: false,
            schema: None,
            strict_values: true,
        }
    }

    pub fn from_config(input: R, config: &LdifConfig) -> Self {
        let mut reader = Self::new(input);
        reader.set_resolve_url_values(config.resolve_url_values);
        reader
    }

    /// Allow `:<` values with `file://` URLs to be read from disk
    pub fn set_resolve_url_values(&mut self, enabled: bool) -> &mut Self {
        self.resolve_url_values = enabled;
        self
    }

    /// Validate added and replaced values against `schema`
    pub fn set_schema(&mut self, schema: &'s Schema) -> &mut Self {
        self.schema = Some(schema);
        self
    }

    /// With a schema attached, reject values that violate their syntax (default on)
    pub fn set_strict_values(&mut self, strict: bool) -> &mut Self {
        self.strict_values = strict;
        self
    }

    /// Next change record, or `None` at end of input
    pub fn read_change_record(&mut self) -> Result<Option<ChangeRecord>> {
        loop {
            let Some(mut lines) = self.read_record_lines()? else {
                return Ok(None);
            };
            if std::mem::take(&mut self.first_record) {
                self.strip_version(&mut lines)?;
                if lines.is_empty() {
                    continue;
                }
            }
            let record = self.parse_record(lines)?;
            trace!(dn = record.dn(), change_type = record.change_type(), "read change record");
            return Ok(Some(record));
        }
    }

    fn next_physical_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        self.line_number += 1;
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }

    /// Logical lines of the next record, comments removed
    fn read_record_lines(&mut self) -> Result<Option<Vec<Line>>> {
        let mut lines: Vec<Line> = Vec::new();
        let mut in_comment = false;
        while let Some(line) = self.next_physical_line()? {
            if line.is_empty() {
                if lines.is_empty() {
                    in_comment = false;
                    continue;
                }
                break;
            }
            if let Some(continuation) = line.strip_prefix(' ') {
                if in_comment {
                    continue;
                }
                match lines.last_mut() {
                    Some((_, last)) => last.push_str(continuation),
                    None => {
                        return Err(LdapError::malformed_ldif(
                            self.line_number,
                            constants::ERR_LDIF_LEADING_CONTINUATION,
                        ))
                    }
                }
                continue;
            }
            in_comment = line.starts_with('#');
            if !in_comment {
                lines.push((self.line_number, line));
            }
        }
        Ok((!lines.is_empty()).then_some(lines))
    }

    fn strip_version(&self, lines: &mut Vec<Line>) -> Result<()> {
        let Some((number, first)) = lines.first() else {
            return Ok(());
        };
        let Some((name, value)) = first.split_once(':') else {
            return Ok(());
        };
        if !name.eq_ignore_ascii_case("version") {
            return Ok(());
        }
        if value.trim() != "1" {
            return Err(LdapError::malformed_ldif(
                *number,
                format!("unsupported LDIF version '{}'", value.trim()),
            ));
        }
        lines.remove(0);
        Ok(())
    }

    fn parse_record(&self, lines: Vec<Line>) -> Result<ChangeRecord> {
        let mut lines = lines.into_iter().peekable();
        let (dn_line, dn_name, dn_value) = match lines.next() {
            Some((number, text)) => {
                let (name, value) = self.parse_line(number, &text)?;
                (number, name, value)
            }
            None => return Err(LdapError::malformed_ldif(self.line_number, constants::ERR_LDIF_NO_DN)),
        };
        if !dn_name.eq_ignore_ascii_case("dn") {
            return Err(LdapError::malformed_ldif(dn_line, constants::ERR_LDIF_NO_DN));
        }
        let dn = utf8(dn_line, dn_value)?;

        while lines
            .peek()
            .is_some_and(|(_, text)| has_name(text, "control"))
        {
            lines.next();
        }

        let change_type = match lines.peek() {
            Some((number, text)) if has_name(text, "changetype") => {
                let number = *number;
                let (_, value) = self.parse_line(number, text)?;
                lines.next();
                (number, utf8(number, value)?.to_ascii_lowercase())
            }
            _ => (dn_line, "add".to_string()),
        };

        match change_type.1.as_str() {
            "add" => self.parse_add(dn, change_type.0, lines),
            "delete" => match lines.next() {
                Some((number, _)) => Err(LdapError::malformed_ldif(
                    number,
                    "a delete record has no body",
                )),
                None => Ok(ChangeRecord::Delete { dn }),
            },
            "modrdn" | "moddn" => self.parse_modify_dn(dn, change_type.0, lines),
            "modify" => self.parse_modify(dn, lines),
            other => Err(LdapError::malformed_ldif(
                change_type.0,
                format!("unknown changetype '{other}'"),
            )),
        }
    }

    fn parse_add(
        &self,
        dn: String,
        header_line: usize,
        lines: Peekable<IntoIter<Line>>,
    ) -> Result<ChangeRecord> {
        let mut entry = Entry::new(dn);
        for (number, text) in lines {
            let (name, value) = self.parse_line(number, &text)?;
            self.check_value(number, &name, &value)?;
            match entry.attributes.iter_mut().find(|a| a.description == name) {
                Some(attribute) => attribute.add_value(value),
                None => entry.attributes.push(Attribute::with_values(name, [value])),
            }
        }
        if entry.attributes.is_empty() {
            return Err(LdapError::malformed_ldif(
                header_line,
                "an add record needs at least one attribute",
            ));
        }
        Ok(ChangeRecord::Add(entry))
    }

    fn parse_modify_dn(
        &self,
        dn: String,
        header_line: usize,
        mut lines: Peekable<IntoIter<Line>>,
    ) -> Result<ChangeRecord> {
        let mut expect = |name: &str, required: bool| -> Result<Option<(usize, String)>> {
            match lines.peek() {
                Some((_, text)) if has_name(text, name) => {
                    let Some((number, text)) = lines.next() else {
                        return Ok(None);
                    };
                    let (_, value) = self.parse_line(number, &text)?;
                    Ok(Some((number, utf8(number, value)?)))
                }
                Some((number, _)) if required => Err(LdapError::malformed_ldif(
                    *number,
                    format!("expected '{name}:'"),
                )),
                None if required => Err(LdapError::malformed_ldif(
                    header_line,
                    format!("missing '{name}:'"),
                )),
                _ => Ok(None),
            }
        };

        let new_rdn = expect("newrdn", true)?.map(|(_, v)| v).unwrap_or_default();
        let delete_old_rdn = match expect("deleteoldrdn", true)? {
            Some((_, v)) if v.trim() == "1" => true,
            Some((_, v)) if v.trim() == "0" => false,
            Some((number, v)) => {
                return Err(LdapError::malformed_ldif(
                    number,
                    format!("deleteoldrdn must be 0 or 1, found '{v}'"),
                ))
            }
            None => false,
        };
        let new_superior = expect("newsuperior", false)?.map(|(_, v)| v);

        if let Some((number, _)) = lines.next() {
            return Err(LdapError::malformed_ldif(number, "unexpected line after modrdn body"));
        }
        Ok(ChangeRecord::ModifyDn {
            dn,
            new_rdn,
            delete_old_rdn,
            new_superior,
        })
    }

    fn parse_modify(&self, dn: String, mut lines: Peekable<IntoIter<Line>>) -> Result<ChangeRecord> {
        let mut modifications = Vec::new();
        while let Some((number, text)) = lines.next() {
            let (keyword, description) = self.parse_line(number, &text)?;
            let mod_type = ModificationType::from_ldif_keyword(&keyword.to_ascii_lowercase())
                .ok_or_else(|| {
                    LdapError::malformed_ldif(number, format!("unknown modification '{keyword}'"))
                })?;
            let description = utf8(number, description)?;
            let mut attribute = Attribute::new(description.trim());

            while let Some((number, text)) = lines.next() {
                if text == "-" {
                    break;
                }
                let (name, value) = self.parse_line(number, &text)?;
                if !base_type(&name).eq_ignore_ascii_case(attribute.attribute_type()) {
                    return Err(LdapError::malformed_ldif(
                        number,
                        format!("attribute '{name}' does not match '{}'", attribute.description),
                    ));
                }
                if mod_type != ModificationType::Delete {
                    self.check_value(number, &name, &value)?;
                }
                attribute.add_value(value);
            }
            modifications.push(Modification::new(mod_type, attribute));
        }
        Ok(ChangeRecord::Modify { dn, modifications })
    }

    /// Split `name: value`, `name:: base64` or `name:< url`
    fn parse_line(&self, number: usize, text: &str) -> Result<(String, ByteString)> {
        let (name, rest) = text
            .split_once(':')
            .ok_or_else(|| LdapError::malformed_ldif(number, constants::ERR_LDIF_BAD_LINE))?;
        if !matches!(attribute_description(name), Ok(("", _))) {
            return Err(LdapError::malformed_ldif(number, constants::ERR_LDIF_BAD_LINE));
        }

        let value = if let Some(encoded) = rest.strip_prefix(':') {
            let decoded = STANDARD
                .decode(encoded.trim())
                .map_err(|_| LdapError::malformed_ldif(number, constants::ERR_LDIF_BAD_BASE64))?;
            ByteString::wrap(decoded)
        } else if let Some(url) = rest.strip_prefix('<') {
            self.resolve_url(number, url.trim())?
        } else {
            ByteString::copy_from_slice(rest.trim_start_matches(' ').as_bytes())
        };
        Ok((name.to_string(), value))
    }

    fn resolve_url(&self, number: usize, url: &str) -> Result<ByteString> {
        if !self.resolve_url_values {
            return Err(LdapError::malformed_ldif(number, constants::ERR_LDIF_URL_DISABLED));
        }
        let path = url
            .strip_prefix("file://")
            .ok_or_else(|| LdapError::malformed_ldif(number, constants::ERR_LDIF_UNSUPPORTED_URL))?;
        std::fs::read(path)
            .map(ByteString::wrap)
            .map_err(|e| LdapError::malformed_ldif(number, format!("cannot read {url}: {e}")))
    }

    fn check_value(&self, number: usize, name: &str, value: &[u8]) -> Result<()> {
        match self.schema {
            Some(schema) if self.strict_values => schema
                .validate_value(name, value)
                .map_err(|e| LdapError::malformed_ldif(number, e.to_string())),
            _ => Ok(()),
        }
    }
}

impl<R: BufRead> Iterator for LdifChangeRecordReader<'_, R> {
    type Item = Result<ChangeRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_change_record().transpose()
    }
}

fn has_name(text: &str, name: &str) -> bool {
    text.split_once(':')
        .is_some_and(|(n, _)| n.eq_ignore_ascii_case(name))
}

fn utf8(number: usize, value: ByteString) -> Result<String> {
    String::from_utf8(value.to_vec())
        .map_err(|_| LdapError::malformed_ldif(number, "value is not valid UTF-8"))
}
