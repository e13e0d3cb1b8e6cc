use std::io::{BufReader, Read, Write};

use serde::de::{Deserialize, IgnoredAny};

use crate::body::BodySink;
use crate::config::DEFAULT_MAX_PAYLOAD;
use crate::error::{CodecError, Result};
use crate::scan::{read_value, skip_whitespace, ValueScanner};
use crate::traits::Marshal;

/// JSON token-stream marshaler.
///
/// Values are written one after another, each followed by a newline. On
/// read, values may also be directly adjacent (`1{"a":2}`): each value is
/// cut at its own end and the bytes after it stay buffered for the next.
pub struct JsonMarshal<S> {
    reader: BufReader<S>,
    scratch: Vec<u8>,
    value: Vec<u8>,
    max_value_size: usize,
}

impl<S: Read + Write> JsonMarshal<S> {
    pub fn new(stream: S) -> Self {
        Self::with_limit(stream, DEFAULT_MAX_PAYLOAD)
    }

    /// Reject incoming values larger than `max_value_size` bytes.
    pub fn with_limit(stream: S, max_value_size: usize) -> Self {
        Self {
            reader: BufReader::new(stream),
            scratch: Vec::new(),
            value: Vec::new(),
            max_value_size,
        }
    }

    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

impl<S: Read + Write> Marshal for JsonMarshal<S> {
    fn encode(&mut self, value: &dyn erased_serde::Serialize) -> Result<()> {
        self.scratch.clear();
        serde_json::to_writer(&mut self.scratch, value)?;
        self.scratch.push(b'\n');

        let stream = self.reader.get_mut();
        stream.write_all(&self.scratch)?;
        stream.flush()?;
        Ok(())
    }

    fn decode(&mut self, sink: Option<&mut dyn BodySink>) -> Result<()> {
        read_value(
            &mut self.reader,
            &mut JsonScanner::default(),
            &mut self.value,
            self.max_value_size,
        )?;

        let mut de = serde_json::Deserializer::from_slice(&self.value);
        match sink {
            Some(sink) => {
                let mut erased = <dyn erased_serde::Deserializer>::erase(&mut de);
                sink.decode(&mut erased).map_err(CodecError::decode)?;
            }
            None => {
                IgnoredAny::deserialize(&mut de)?;
            }
        }
        de.end()?;
        Ok(())
    }

    fn at_end(&mut self) -> Result<bool> {
        skip_whitespace(&mut self.reader)
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
enum JsonState {
    #[default]
    Start,
    /// A number or literal; ends at the first delimiter, which is not part
    /// of it.
    Scalar,
    /// A string, object or array; ends at its closing byte.
    Nested,
}

/// Cuts one JSON value out of a token stream.
#[derive(Debug, Default)]
struct JsonScanner {
    state: JsonState,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl JsonScanner {
    fn nested(&mut self, b: u8) -> bool {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if b == b'\\' {
                self.escaped = true;
            } else if b == b'"' {
                self.in_string = false;
            }
        } else {
            match b {
                b'"' => self.in_string = true,
                b'{' | b'[' => self.depth += 1,
                b'}' | b']' => self.depth = self.depth.saturating_sub(1),
                _ => {}
            }
        }
        !self.in_string && self.depth == 0
    }
}

fn ends_scalar(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b'{' | b'}' | b'[' | b']' | b'"' | b',' | b':')
}

impl ValueScanner for JsonScanner {
    fn feed(&mut self, bytes: &[u8]) -> Option<usize> {
        for (i, &b) in bytes.iter().enumerate() {
            match self.state {
                JsonState::Start => {
                    if b.is_ascii_whitespace() {
                        continue;
                    }
                    match b {
                        b'{' | b'[' | b'"' => {
                            self.state = JsonState::Nested;
                            if self.nested(b) {
                                return Some(i + 1);
                            }
                        }
                        // A stray delimiter is handed on alone and fails to parse.
                        b'}' | b']' | b',' | b':' => return Some(i + 1),
                        _ => self.state = JsonState::Scalar,
                    }
                }
                JsonState::Scalar => {
                    if ends_scalar(b) {
                        return Some(i);
                    }
                }
                JsonState::Nested => {
                    if self.nested(b) {
                        return Some(i + 1);
                    }
                }
            }
        }
        None
    }

    fn complete_at_eof(&self) -> bool {
        self.state == JsonState::Scalar
    }
}
