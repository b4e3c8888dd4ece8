//! Address AVP data, IPv4 family (RFC 6733 §4.3.1, address family 1):
//! 4 bytes in network byte order, no family tag (family tag lives in
//! the generic [`address`] module for the `Address` base type).
use crate::error::Result;
use std::io::{Read, Write};
use std::net::Ipv4Addr;

pub fn decode_from<R: Read>(reader: &mut R) -> Result<Ipv4Addr> {
    let mut b = [0u8; 4];
    reader.read_exact(&mut b)?;
    Ok(Ipv4Addr::from(b))
}

pub fn encode_to<W: Write>(writer: &mut W, value: &Ipv4Addr) -> Result<()> {
    writer.write_all(&value.octets())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_encode_decode() {
        let addr = Ipv4Addr::new(127, 0, 0, 1);
        let mut encoded = Vec::new();
        encode_to(&mut encoded, &addr).unwrap();
        let mut cursor = Cursor::new(&encoded);
        let decoded = decode_from(&mut cursor).unwrap();
        assert_eq!(decoded, addr);
    }
}
