//! IPv6 prefix AVP data (RFC 6733 §4.3.1): 1 reserved byte, 1 prefix
//! length byte, then the 16-byte address. Rendered as text "addr/len".
use crate::error::{Error, Result};
use std::io::{Read, Write};
use std::net::Ipv6Addr;

pub fn decode_from<R: Read>(reader: &mut R) -> Result<String> {
    let mut b = [0u8; 18];
    reader.read_exact(&mut b)?;
    let prefix_len = b[1];
    let mut octets = [0u8; 16];
    octets.copy_from_slice(&b[2..18]);
    let addr = Ipv6Addr::from(octets);
    Ok(format!("{}/{}", addr, prefix_len))
}

pub fn encode_to<W: Write>(writer: &mut W, value: &str) -> Result<()> {
    let (addr, prefix_len) = value
        .split_once('/')
        .ok_or_else(|| Error::EncodeError(format!("invalid IPv6 prefix: {}", value)))?;
    let addr: Ipv6Addr = addr
        .parse()
        .map_err(|_| Error::EncodeError(format!("invalid IPv6 address: {}", addr)))?;
    let prefix_len: u8 = prefix_len
        .parse()
        .map_err(|_| Error::EncodeError(format!("invalid prefix length: {}", prefix_len)))?;

    writer.write_all(&[0, prefix_len])?;
    writer.write_all(&addr.octets())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_encode_decode() {
        let value = "2001:db8::1/64";
        let mut encoded = Vec::new();
        encode_to(&mut encoded, value).unwrap();
        let mut cursor = Cursor::new(&encoded);
        let decoded = decode_from(&mut cursor).unwrap();
        assert_eq!(decoded, value);
    }
}
