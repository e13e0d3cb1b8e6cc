use std::io::{BufReader, Read, Write};

use serde::de::{Deserialize, IgnoredAny};

use crate::body::BodySink;
use crate::config::DEFAULT_MAX_PAYLOAD;
use crate::error::{CodecError, Result};
use crate::scan::{read_value, skip_whitespace, ValueScanner};
use crate::traits::Marshal;

/// Tag wrapping every top-level value.
pub const ROOT_TAG: &str = "value";

fn xml_error(err: impl std::fmt::Display) -> CodecError {
    CodecError::Xml(err.to_string())
}

/// XML element-stream marshaler.
///
/// Each value is written as one `<value>` element followed by a newline.
/// Top-level sequences are not supported: they serialize as several sibling
/// elements and cannot be told apart from the next value.
pub struct XmlMarshal<S> {
    reader: BufReader<S>,
    scratch: String,
    value: Vec<u8>,
    max_value_size: usize,
}

impl<S: Read + Write> XmlMarshal<S> {
    pub fn new(stream: S) -> Self {
        Self::with_limit(stream, DEFAULT_MAX_PAYLOAD)
    }

    /// Reject incoming elements larger than `max_value_size` bytes.
    pub fn with_limit(stream: S, max_value_size: usize) -> Self {
        Self {
            reader: BufReader::new(stream),
            scratch: String::new(),
            value: Vec::new(),
            max_value_size,
        }
    }

    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

impl<S: Read + Write> Marshal for XmlMarshal<S> {
    fn encode(&mut self, value: &dyn erased_serde::Serialize) -> Result<()> {
        self.scratch.clear();
        let ser = quick_xml::se::Serializer::with_root(&mut self.scratch, Some(ROOT_TAG))
            .map_err(xml_error)?;
        erased_serde::serialize(value, ser).map_err(xml_error)?;
        self.scratch.push('\n');

        let stream = self.reader.get_mut();
        stream.write_all(self.scratch.as_bytes())?;
        stream.flush()?;
        Ok(())
    }

    fn decode(&mut self, sink: Option<&mut dyn BodySink>) -> Result<()> {
        read_value(
            &mut self.reader,
            &mut XmlScanner::default(),
            &mut self.value,
            self.max_value_size,
        )?;

        let text = std::str::from_utf8(&self.value).map_err(xml_error)?;
        let mut de = quick_xml::de::Deserializer::from_str(text);
        match sink {
            Some(sink) => {
                let mut erased = <dyn erased_serde::Deserializer>::erase(&mut de);
                sink.decode(&mut erased).map_err(CodecError::decode)?;
            }
            None => {
                IgnoredAny::deserialize(&mut de).map_err(xml_error)?;
            }
        }
        Ok(())
    }

    fn at_end(&mut self) -> Result<bool> {
        skip_whitespace(&mut self.reader)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    /// Just read `<`.
    Pending,
    Open,
    Close,
    /// Declaration, comment or processing instruction.
    Other,
}

/// Cuts one top-level element out of an XML stream.
#[derive(Debug, Default)]
struct XmlScanner {
    tag: Option<Tag>,
    quote: Option<u8>,
    depth: usize,
    prev: u8,
}

impl ValueScanner for XmlScanner {
    fn feed(&mut self, bytes: &[u8]) -> Option<usize> {
        for (i, &b) in bytes.iter().enumerate() {
            let prev = std::mem::replace(&mut self.prev, b);
            match self.tag {
                None => {
                    if b == b'<' {
                        self.tag = Some(Tag::Pending);
                    } else if self.depth == 0 && !b.is_ascii_whitespace() {
                        // Stray text is handed on alone and fails to parse.
                        return Some(i + 1);
                    }
                }
                Some(_) if self.quote.is_some() => {
                    if self.quote == Some(b) {
                        self.quote = None;
                    }
                }
                Some(Tag::Pending) => {
                    self.tag = Some(match b {
                        b'/' => Tag::Close,
                        b'?' | b'!' => Tag::Other,
                        b'>' => return Some(i + 1),
                        _ => Tag::Open,
                    });
                }
                Some(kind) => match b {
                    b'"' | b'\'' if kind != Tag::Other => self.quote = Some(b),
                    b'>' => {
                        self.tag = None;
                        match kind {
                            Tag::Open if prev != b'/' => self.depth += 1,
                            Tag::Open => {}
                            Tag::Close => self.depth = self.depth.saturating_sub(1),
                            Tag::Other | Tag::Pending => continue,
                        }
                        if self.depth == 0 {
                            return Some(i + 1);
                        }
                    }
                    _ => {}
                },
            }
        }
        None
    }

    fn complete_at_eof(&self) -> bool {
        false
    }
}
