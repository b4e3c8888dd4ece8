//! Unsigned32 AVP data (RFC 6733 §4.3.1): 4-byte unsigned.
use crate::error::Result;
use std::io::{Read, Write};

pub fn decode_from<R: Read>(reader: &mut R) -> Result<u32> {
    let mut b = [0u8; 4];
    reader.read_exact(&mut b)?;
    Ok(u32::from_be_bytes(b))
}

pub fn encode_to<W: Write>(writer: &mut W, value: u32) -> Result<()> {
    writer.write_all(&value.to_be_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_encode_decode() {
        let mut encoded = Vec::new();
        encode_to(&mut encoded, 1234567890).unwrap();
        let mut cursor = Cursor::new(&encoded);
        assert_eq!(decode_from(&mut cursor).unwrap(), 1234567890);
    }
}
