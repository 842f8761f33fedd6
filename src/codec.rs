//! UTF-8 byte conversion for the terminal write and notification paths.

/// Encodes a single operator-input character as its UTF-8 bytes.
pub fn encode_char(ch: char) -> Vec<u8> {
    let mut buf = [0u8; 4];
    ch.encode_utf8(&mut buf).as_bytes().to_vec()
}

/// Encodes a string as UTF-8 bytes.
pub fn encode(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}

/// Decodes an inbound payload as UTF-8, replacing invalid sequences.
pub fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
