//! DiameterIdentity, DiameterURI and IPFilterRule AVP data.
//!
//! All three are wire-identical to OctetString (an ASCII string per
//! RFC 6733) and differ only in the dictionary type tag that routes a
//! decode to this module instead of `utf8string`.
use crate::avp::octetstring;
use crate::error::{Error, Result};
use std::io::{Read, Write};

pub fn decode_from<R: Read>(reader: &mut R, len: usize) -> Result<String> {
    let bytes = octetstring::decode_from(reader, len)?;
    String::from_utf8(bytes).map_err(|e| Error::DecodeError(format!("invalid identity: {}", e)))
}

pub fn encode_to<W: Write>(writer: &mut W, value: &str) -> Result<()> {
    octetstring::encode_to(writer, value.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_encode_decode_ascii() {
        let s = "example.com";
        let mut encoded = Vec::new();
        encode_to(&mut encoded, s).unwrap();
        let mut cursor = Cursor::new(&encoded);
        let decoded = decode_from(&mut cursor, encoded.len()).unwrap();
        assert_eq!(decoded, s);
    }
}
