//! Address AVP data, IPv6 family (RFC 6733 §4.3.1, address family 2):
//! 16 bytes in network byte order.
use crate::error::Result;
use std::io::{Read, Write};
use std::net::Ipv6Addr;

pub fn decode_from<R: Read>(reader: &mut R) -> Result<Ipv6Addr> {
    let mut b = [0u8; 16];
    reader.read_exact(&mut b)?;
    Ok(Ipv6Addr::from(b))
}

pub fn encode_to<W: Write>(writer: &mut W, value: &Ipv6Addr) -> Result<()> {
    writer.write_all(&value.octets())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_encode_decode() {
        let addr: Ipv6Addr = "2001:db8::1".parse().unwrap();
        let mut encoded = Vec::new();
        encode_to(&mut encoded, &addr).unwrap();
        let mut cursor = Cursor::new(&encoded);
        let decoded = decode_from(&mut cursor).unwrap();
        assert_eq!(decoded, addr);
    }
}
