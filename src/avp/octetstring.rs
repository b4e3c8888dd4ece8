//! OctetString AVP data: raw, type-less bytes. Identity, URI, and
//! IP-filter-rule AVPs all share this wire encoding and differ only in
//! their dictionary type tag.
use crate::error::Result;
use std::io::{Read, Write};

pub fn decode_from<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut b = vec![0u8; len];
    reader.read_exact(&mut b)?;
    Ok(b)
}

pub fn encode_to<W: Write>(writer: &mut W, value: &[u8]) -> Result<()> {
    writer.write_all(value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_encode_decode_ascii() {
        let bytes = b"Hello World";
        let mut encoded = Vec::new();
        encode_to(&mut encoded, bytes).unwrap();
        let mut cursor = Cursor::new(&encoded);
        let decoded = decode_from(&mut cursor, bytes.len()).unwrap();
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn test_decode_non_utf8() {
        let bytes = vec![0x61, 0x62, 0x63, 0x64, 0x80];
        let mut encoded = Vec::new();
        encode_to(&mut encoded, &bytes).unwrap();
        let mut cursor = Cursor::new(&encoded);
        let decoded = decode_from(&mut cursor, bytes.len()).unwrap();
        assert_eq!(decoded, bytes);
    }
}
