//! IPFilterRule AVP data, OctetString-encoded (RFC 6733 §4.3.2 / RFC 3588).
use crate::avp::octetstring;
use crate::error::{Error, Result};
use std::io::{Read, Write};

pub fn decode_from<R: Read>(reader: &mut R, len: usize) -> Result<String> {
    let bytes = octetstring::decode_from(reader, len)?;
    String::from_utf8(bytes).map_err(|e| Error::DecodeError(format!("invalid IPFilterRule: {}", e)))
}

pub fn encode_to<W: Write>(writer: &mut W, value: &str) -> Result<()> {
    octetstring::encode_to(writer, value.as_bytes())
}
