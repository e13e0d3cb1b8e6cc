use std::io::BufRead;

use crate::error::{CodecError, Result};

/// Finds where one self-delimiting value ends in a byte stream.
pub(crate) trait ValueScanner {
    /// Feed the next bytes. Returns how many of them belong to the value
    /// once its end is found.
    fn feed(&mut self, bytes: &[u8]) -> Option<usize>;

    /// Whether the bytes fed so far form a whole value when the stream ends.
    fn complete_at_eof(&self) -> bool;
}

/// Copy exactly one value from `reader` into `value`.
///
/// Bytes after the value are left in the reader.
pub(crate) fn read_value<R, S>(
    reader: &mut R,
    scanner: &mut S,
    value: &mut Vec<u8>,
    max: usize,
) -> Result<()>
where
    R: BufRead,
    S: ValueScanner,
{
    value.clear();
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return if scanner.complete_at_eof() {
                Ok(())
            } else {
                Err(CodecError::ConnectionClosed)
            };
        }

        let found = scanner.feed(buf);
        let used = found.unwrap_or(buf.len());
        value.extend_from_slice(&buf[..used]);
        reader.consume(used);

        if value.len() > max {
            return Err(CodecError::PayloadTooLarge {
                size: value.len(),
                max,
            });
        }
        if found.is_some() {
            return Ok(());
        }
    }
}

/// Consume whitespace; `true` if the stream ends before the next value.
pub(crate) fn skip_whitespace<R: BufRead>(reader: &mut R) -> Result<bool> {
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Ok(true);
        }
        let blank = buf
            .iter()
            .take_while(|b| b.is_ascii_whitespace())
            .count();
        let more = blank < buf.len();
        reader.consume(blank);
        if more {
            return Ok(false);
        }
    }
}
