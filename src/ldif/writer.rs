use super::{fold_line, is_safe, ChangeRecord};
use crate::config::LdifConfig;
use crate::core::byte_string::ByteString;
use crate::error::{constants, LdapError, Result};
use crate::protocol::attribute::Attribute;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;
use std::io::{self, Write};
use tracing::trace;

/// Destination of LDIF lines, without line terminators
pub trait LdifSink {
    fn write_line(&mut self, line: &str) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LdifSink for Vec<String> {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.push(line.to_string());
        Ok(())
    }
}

impl<S: LdifSink + ?Sized> LdifSink for &mut S {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        (**self).write_line(line)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

/// Writes lines to a byte stream, each terminated by `\n`
#[derive(Debug)]
pub struct StreamSink<W: Write> {
    inner: W,
}

impl<W: Write> StreamSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> LdifSink for StreamSink<W> {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.inner.write_all(line.as_bytes())?;
        self.inner.write_all(b"\n")
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

type ValueExternalizer = dyn FnMut(&str, &ByteString) -> Option<String> + Send;

/// Serializes change records as LDIF.
///
/// Each record ends with a blank line. Once closed, every further write
/// fails with an I/O error; closing again is a no-op.
pub struct LdifChangeRecordWriter<S: LdifSink> {
    sink: S,
    wrap_column: usize,
    add_user_friendly_comments: bool,
    externalizer: Option<Box<ValueExternalizer>>,
    closed: bool,
}

impl<'a> LdifChangeRecordWriter<&'a mut Vec<String>> {
    /// Append lines to an in-memory list
    pub fn to_lines(lines: &'a mut Vec<String>) -> Self {
        Self::new(lines)
    }
}

impl<W: Write> LdifChangeRecordWriter<StreamSink<W>> {
    /// Write `\n`-terminated lines to a byte stream
    pub fn to_writer(out: W) -> Self {
        Self::new(StreamSink::new(out))
    }
}

impl<S: LdifSink> LdifChangeRecordWriter<S> {
    /// No folding, no comments, no externalizer
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            wrap_column: 0,
            add_user_friendly_comments: false,
            externalizer: None,
            closed: false,
        }
    }

    pub fn from_config(sink: S, config: &LdifConfig) -> Self {
        let mut writer = Self::new(sink);
        writer
            .set_wrap_column(config.wrap_column)
            .set_add_user_friendly_comments(config.add_user_friendly_comments);
        writer
    }

    pub fn wrap_column(&self) -> usize {
        self.wrap_column
    }

    /// Fold lines longer than `column` bytes; 0 disables folding
    pub fn set_wrap_column(&mut self, column: usize) -> &mut Self {
        self.wrap_column = column;
        self
    }

    pub fn adds_user_friendly_comments(&self) -> bool {
        self.add_user_friendly_comments
    }

    /// Precede base64 values holding non-ASCII text with a `# attr: text` comment
    pub fn set_add_user_friendly_comments(&mut self, enabled: bool) -> &mut Self {
        self.add_user_friendly_comments = enabled;
        self
    }

    /// Ask `externalizer` for a URL before writing each value; `Some(url)`
    /// writes `attr:< url` in place of the value
    pub fn set_value_externalizer<F>(&mut self, externalizer: F) -> &mut Self
    where
        F: FnMut(&str, &ByteString) -> Option<String> + Send + 'static,
    {
        self.externalizer = Some(Box::new(externalizer));
        self
    }

    pub fn write_change_record(&mut self, record: &ChangeRecord) -> Result<&mut Self> {
        self.ensure_open()?;
        self.write_value_line("dn", record.dn().as_bytes())?;
        self.write_line(&format!("changetype: {}", record.change_type()))?;

        match record {
            ChangeRecord::Add(entry) => {
                for attribute in &entry.attributes {
                    self.write_values(attribute)?;
                }
            }
            ChangeRecord::Delete { .. } => {}
            ChangeRecord::ModifyDn {
                new_rdn,
                delete_old_rdn,
                new_superior,
                ..
            } => {
                self.write_value_line("newrdn", new_rdn.as_bytes())?;
                self.write_line(if *delete_old_rdn {
                    "deleteoldrdn: 1"
                } else {
                    "deleteoldrdn: 0"
                })?;
                if let Some(superior) = new_superior {
                    self.write_value_line("newsuperior", superior.as_bytes())?;
                }
            }
            ChangeRecord::Modify { modifications, .. } => {
                for modification in modifications {
                    self.write_line(&format!(
                        "{}: {}",
                        modification.mod_type.ldif_keyword(),
                        modification.attribute.description
                    ))?;
                    self.write_values(&modification.attribute)?;
                    self.write_line("-")?;
                }
            }
        }

        self.write_line("")?;
        trace!(dn = record.dn(), change_type = record.change_type(), "wrote change record");
        Ok(self)
    }

    /// Write `comment` as `#` lines, one per line of the comment
    pub fn write_comment(&mut self, comment: &str) -> Result<&mut Self> {
        self.ensure_open()?;
        for line in comment.lines() {
            if line.is_empty() {
                self.write_line("#")?;
            } else {
                self.write_line(&format!("# {line}"))?;
            }
        }
        Ok(self)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.sink.flush()?;
        Ok(())
    }

    /// Flush and close; later writes fail, later closes do nothing
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.sink.flush()?;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn into_inner(self) -> S {
        self.sink
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(LdapError::Io(io::Error::new(
                io::ErrorKind::Other,
                constants::ERR_WRITER_CLOSED,
            )));
        }
        Ok(())
    }

    fn write_values(&mut self, attribute: &Attribute) -> Result<()> {
        for value in &attribute.values {
            if let Some(url) = self
                .externalizer
                .as_mut()
                .and_then(|externalize| externalize(&attribute.description, value))
            {
                self.write_line(&format!("{}:< {url}", attribute.description))?;
                continue;
            }
            self.write_value_line(&attribute.description, value)?;
        }
        Ok(())
    }

    fn write_value_line(&mut self, name: &str, value: &[u8]) -> Result<()> {
        if is_safe(value) {
            // safe values are ASCII
            let text = String::from_utf8_lossy(value);
            if text.is_empty() {
                return self.write_line(&format!("{name}:"));
            }
            return self.write_line(&format!("{name}: {text}"));
        }
        if self.add_user_friendly_comments {
            if let Ok(text) = std::str::from_utf8(value) {
                if !text.is_ascii() && !text.contains(|c| c == '\n' || c == '\r') {
                    self.write_line(&format!("# {name}: {text}"))?;
                }
            }
        }
        self.write_line(&format!("{name}:: {}", STANDARD.encode(value)))
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        for piece in fold_line(line, self.wrap_column) {
            self.sink.write_line(&piece)?;
        }
        Ok(())
    }
}

impl<S: LdifSink> fmt::Debug for LdifChangeRecordWriter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LdifChangeRecordWriter")
            .field("wrap_column", &self.wrap_column)
            .field("add_user_friendly_comments", &self.add_user_friendly_comments)
            .field("externalizer", &self.externalizer.is_some())
            .field("closed", &self.closed)
            .finish()
    }
}
