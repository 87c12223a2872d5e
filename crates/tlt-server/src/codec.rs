use std::io;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

/// Longest line accepted from a client, excluding the newline.
pub const MAX_LINE_LEN: usize = 1024;

/// One framed unit read from a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A complete line, decoded lossily so bad bytes reach the command parser.
    Line(String),
    /// A line longer than the limit; its bytes were dropped up to the next newline.
    TooLong,
}

/// Newline-delimited decoder that never fails on line content.
///
/// Invalid UTF-8 is replaced rather than rejected, and an overlong line is
/// reported once and skipped, so the stream stays usable in both cases.
#[derive(Debug)]
pub struct LineCodec {
    max_len: usize,
    discarding: bool,
    next_index: usize,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::with_max_len(MAX_LINE_LEN)
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            max_len,
            discarding: false,
            next_index: 0,
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

impl Decoder for LineCodec {
    type Item = Inbound;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> io::Result<Option<Inbound>> {
        loop {
            let newline = buf[self.next_index..]
                .iter()
                .position(|b| *b == b'\n')
                .map(|i| i + self.next_index);

            match newline {
                Some(end) if self.discarding => {
                    buf.advance(end + 1);
                    self.discarding = false;
                    self.next_index = 0;
                }
                None if self.discarding => {
                    buf.clear();
                    self.next_index = 0;
                    return Ok(None);
                }
                Some(end) => {
                    let line = buf.split_to(end + 1);
                    self.next_index = 0;
                    if end > self.max_len {
                        return Ok(Some(Inbound::TooLong));
                    }
                    return Ok(Some(Inbound::Line(decode_line(&line[..end]))));
                }
                None if buf.len() > self.max_len => {
                    buf.clear();
                    self.discarding = true;
                    self.next_index = 0;
                    return Ok(Some(Inbound::TooLong));
                }
                None => {
                    self.next_index = buf.len();
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> io::Result<Option<Inbound>> {
        if let Some(item) = self.decode(buf)? {
            return Ok(Some(item));
        }
        // Unterminated final line.
        if buf.is_empty() || self.discarding {
            buf.clear();
            return Ok(None);
        }
        let line = buf.split();
        self.next_index = 0;
        Ok(Some(Inbound::Line(decode_line(&line))))
    }
}
