//! Enumerated AVP data (RFC 6733 §4.3.1): wire-identical to Integer32.
//! Symbol resolution against the dictionary's enum tables happens at
//! the [`super::Avp`] level, not here; this module only knows the
//! wire representation.
use crate::error::Result;
use std::io::{Read, Write};

pub fn decode_from<R: Read>(reader: &mut R) -> Result<i32> {
    super::integer32::decode_from(reader)
}

pub fn encode_to<W: Write>(writer: &mut W, value: i32) -> Result<()> {
    super::integer32::encode_to(writer, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_encode_decode() {
        let mut encoded = Vec::new();
        encode_to(&mut encoded, -1234567890).unwrap();
        let mut cursor = Cursor::new(&encoded);
        assert_eq!(decode_from(&mut cursor).unwrap(), -1234567890);
    }
}
