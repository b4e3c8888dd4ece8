//! UTF8String AVP data.
use crate::error::{Error, Result};
use std::io::{Read, Write};

pub fn decode_from<R: Read>(reader: &mut R, len: usize) -> Result<String> {
    let mut b = vec![0u8; len];
    reader.read_exact(&mut b)?;
    String::from_utf8(b).map_err(|e| Error::DecodeError(format!("invalid UTF8String: {}", e)))
}

pub fn encode_to<W: Write>(writer: &mut W, value: &str) -> Result<()> {
    writer.write_all(value.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_encode_decode_utf8() {
        let s = "世界,你好";
        let mut encoded = Vec::new();
        encode_to(&mut encoded, s).unwrap();
        let mut cursor = Cursor::new(&encoded);
        let decoded = decode_from(&mut cursor, encoded.len()).unwrap();
        assert_eq!(decoded, s);
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let bytes = vec![0x61, 0x62, 0x63, 0x64, 0x80];
        let mut cursor = Cursor::new(&bytes);
        match decode_from(&mut cursor, bytes.len()) {
            Err(Error::DecodeError(_)) => {}
            other => panic!("expected DecodeError, got {:?}", other),
        }
    }
}
