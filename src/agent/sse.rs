//! Incremental SSE frame decoding.
//!
//! Bytes arrive in arbitrary chunks from the network. The decoder keeps two
//! pieces of state between chunks: the tail of an incomplete UTF-8 sequence
//! and the text of a frame whose terminating blank line has not arrived yet.

/// Splits a byte stream into frames terminated by a blank line (`"\n\n"`).
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Bytes of a multi-byte character cut off by a chunk boundary.
    pending: Vec<u8>,
    /// Decoded text not yet terminated by a blank line.
    buffer: String,
    /// Offset in `buffer` where the next terminator search starts. Always a
    /// char boundary.
    scanned: usize,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one network chunk and returns every frame it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.decode_utf8(chunk);
        self.drain_frames()
    }

    /// Feeds already-decoded text.
    pub fn push_str(&mut self, text: &str) -> Vec<String> {
        self.buffer.push_str(text);
        self.drain_frames()
    }

    /// Ends the stream. Returns the unterminated remainder, which is dropped
    /// rather than interpreted as a frame.
    pub fn finish(self) -> Option<String> {
        let mut rest = self.buffer;
        if !self.pending.is_empty() {
            rest.push_str(&String::from_utf8_lossy(&self.pending));
        }
        if rest.is_empty() { None } else { Some(rest) }
    }

    fn decode_utf8(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
        let mut start = 0;
        loop {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(valid) => {
                    self.buffer.push_str(valid);
                    start = self.pending.len();
                    break;
                }
                Err(err) => {
                    let valid_up_to = err.valid_up_to();
                    self.buffer.push_str(&String::from_utf8_lossy(
                        &self.pending[start..start + valid_up_to],
                    ));
                    start += valid_up_to;
                    match err.error_len() {
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            start += len;
                        }
                        // incomplete sequence at the end, wait for more bytes
                        None => break,
                    }
                }
            }
        }
        self.pending.drain(..start);
    }

    fn drain_frames(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        let mut consumed = 0;
        let mut from = self.scanned;
        while let Some(pos) = self.buffer[from..].find("\n\n") {
            let end = from + pos;
            frames.push(self.buffer[consumed..end].to_string());
            consumed = end + 2;
            from = consumed;
        }
        self.buffer.drain(..consumed);
        // a trailing '\n' may pair with the first byte of the next chunk
        self.scanned = if self.buffer.ends_with('\n') {
            self.buffer.len() - 1
        } else {
            self.buffer.len()
        };
        frames
    }
}
