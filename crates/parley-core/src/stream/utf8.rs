//! Incremental UTF-8 decoding across transport chunks

/// Holds back the bytes of a multi-byte character that was split across
/// two chunks, so it is decoded once the rest of it arrives.
#[derive(Debug, Default)]
pub struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `chunk` and append the text to `out`.
    ///
    /// An incomplete sequence at the end of the chunk is kept for the next
    /// call. Invalid sequences become U+FFFD and decoding carries on.
    pub fn decode(&mut self, chunk: &[u8], out: &mut String) {
        if self.pending.is_empty() {
            self.decode_complete(chunk, out);
        } else {
            let mut joined = std::mem::take(&mut self.pending);
            joined.extend_from_slice(chunk);
            self.decode_complete(&joined, out);
        }
    }

    /// End of input: an incomplete sequence can no longer be completed
    pub fn flush(&mut self, out: &mut String) {
        if !self.pending.is_empty() {
            self.pending.clear();
            out.push(char::REPLACEMENT_CHARACTER);
        }
    }

    /// Number of bytes waiting for the rest of their character
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn reset(&mut self) {
        self.pending.clear();
    }

    fn decode_complete(&mut self, bytes: &[u8], out: &mut String) {
        let mut rest = bytes;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    return;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    if let Ok(text) = std::str::from_utf8(valid) {
                        out.push_str(text);
                    }
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            self.pending.extend_from_slice(after);
                            return;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passthrough() {
        let mut carry = Utf8Carry::new();
        let mut out = String::new();
        carry.decode(b"data: hi\n", &mut out);
        assert_eq!(out, "data: hi\n");
        assert_eq!(carry.pending_len(), 0);
    }

    #[test]
    fn test_split_multibyte_waits_for_rest() {
        // "é" is C3 A9, "€" is E2 82 AC
        let mut carry = Utf8Carry::new();
        let mut out = String::new();

        carry.decode(&[b'a', 0xC3], &mut out);
        assert_eq!(out, "a");
        assert_eq!(carry.pending_len(), 1);

        carry.decode(&[0xA9, 0xE2], &mut out);
        assert_eq!(out, "aé");
        assert_eq!(carry.pending_len(), 1);

        carry.decode(&[0x82], &mut out);
        assert_eq!(out, "aé");
        assert_eq!(carry.pending_len(), 2);

        carry.decode(&[0xAC, b'!'], &mut out);
        assert_eq!(out, "aé€!");
        assert_eq!(carry.pending_len(), 0);
    }

    #[test]
    fn test_byte_at_a_time_emoji() {
        let text = "hi 🦀 there";
        let mut carry = Utf8Carry::new();
        let mut out = String::new();
        for byte in text.as_bytes() {
            carry.decode(std::slice::from_ref(byte), &mut out);
        }
        assert_eq!(out, text);
    }

    #[test]
    fn test_invalid_bytes_replaced() {
        let mut carry = Utf8Carry::new();
        let mut out = String::new();
        carry.decode(&[b'a', 0xFF, b'b'], &mut out);
        assert_eq!(out, "a\u{FFFD}b");
        assert_eq!(carry.pending_len(), 0);
    }

    #[test]
    fn test_flush_incomplete_sequence() {
        let mut carry = Utf8Carry::new();
        let mut out = String::new();
        carry.decode(&[b'x', 0xE2, 0x82], &mut out);
        assert_eq!(out, "x");

        carry.flush(&mut out);
        assert_eq!(out, "x\u{FFFD}");
        assert_eq!(carry.pending_len(), 0);

        // Nothing pending, nothing added
        carry.flush(&mut out);
        assert_eq!(out, "x\u{FFFD}");
    }
}
