//! Unsigned64 AVP data (RFC 6733 §4.3.1): 8-byte unsigned.
//!
//! Stored as a true `u64` rather than aliasing into a signed 64-bit
//! value: bitwise round-trip through the wire is preserved either way,
//! and a real `u64` avoids sign confusion for callers (accounting
//! AVPs like Accounting-Input-Octets commonly carry values above
//! i64::MAX).
use crate::error::Result;
use std::io::{Read, Write};

pub fn decode_from<R: Read>(reader: &mut R) -> Result<u64> {
    let mut b = [0u8; 8];
    reader.read_exact(&mut b)?;
    Ok(u64::from_be_bytes(b))
}

pub fn encode_to<W: Write>(writer: &mut W, value: u64) -> Result<()> {
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
        encode_to(&mut encoded, u64::MAX - 1).unwrap();
        let mut cursor = Cursor::new(&encoded);
        assert_eq!(decode_from(&mut cursor).unwrap(), u64::MAX - 1);
    }
}
