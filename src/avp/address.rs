//! Address AVP data (RFC 6733 §4.3.1): a 2-byte address family tag
//! followed by the family's raw address bytes. Only IPv4 (family 1)
//! and IPv6 (family 2) are supported; any other family is a decode
//! error rather than silently truncated, fixing the 4-byte-only
//! assumption a fixed-family `AddressIPv4`/`AddressIPv6` AVP makes.
use crate::error::{Error, Result};
use std::io::{Read, Write};
use std::net::IpAddr;

const FAMILY_IPV4: u16 = 1;
const FAMILY_IPV6: u16 = 2;

pub fn decode_from<R: Read>(reader: &mut R) -> Result<IpAddr> {
    let mut tag = [0u8; 2];
    reader.read_exact(&mut tag)?;
    let family = u16::from_be_bytes(tag);

    match family {
        FAMILY_IPV4 => Ok(IpAddr::V4(super::ipv4::decode_from(reader)?)),
        FAMILY_IPV6 => Ok(IpAddr::V6(super::ipv6::decode_from(reader)?)),
        other => Err(Error::DecodeError(format!(
            "unsupported address family {}",
            other
        ))),
    }
}

pub fn encode_to<W: Write>(writer: &mut W, value: &IpAddr) -> Result<()> {
    match value {
        IpAddr::V4(addr) => {
            writer.write_all(&FAMILY_IPV4.to_be_bytes())?;
            super::ipv4::encode_to(writer, addr)
        }
        IpAddr::V6(addr) => {
            writer.write_all(&FAMILY_IPV6.to_be_bytes())?;
            super::ipv6::encode_to(writer, addr)
        }
    }
}

pub fn length(value: &IpAddr) -> u32 {
    match value {
        IpAddr::V4(_) => 6,
        IpAddr::V6(_) => 18,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_v4() {
        let addr: IpAddr = "127.0.0.1".parse().unwrap();
        let mut encoded = Vec::new();
        encode_to(&mut encoded, &addr).unwrap();
        assert_eq!(encoded.len(), 6);
        let mut cursor = std::io::Cursor::new(&encoded);
        assert_eq!(decode_from(&mut cursor).unwrap(), addr);
    }

    #[test]
    fn test_encode_decode_v6() {
        let addr: IpAddr = "2001:db8::1".parse().unwrap();
        let mut encoded = Vec::new();
        encode_to(&mut encoded, &addr).unwrap();
        assert_eq!(encoded.len(), 18);
        let mut cursor = std::io::Cursor::new(&encoded);
        assert_eq!(decode_from(&mut cursor).unwrap(), addr);
    }

    #[test]
    fn test_decode_unsupported_family() {
        let data = [0x00, 0x0f, 0x01, 0x02, 0x03, 0x04];
        let mut cursor = std::io::Cursor::new(&data);
        assert!(decode_from(&mut cursor).is_err());
    }
}
