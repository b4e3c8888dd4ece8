//! Grouped AVP data (RFC 6733 §4.4): an ordered sequence of AVPs,
//! encoded back to back with no extra framing of their own.
use super::Avp;
use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use std::io::{Read, Seek, Write};

pub fn decode_from<R: Read + Seek>(
    reader: &mut R,
    len: usize,
    dict: &Dictionary,
) -> Result<Vec<Avp>> {
    let mut avps = Vec::new();
    let mut offset = 0usize;
    while offset < len {
        let avp = Avp::decode_from(reader, dict)?;
        offset += avp.wire_length() as usize;
        if offset > len {
            return Err(Error::DecodeError(
                "grouped avp child overruns parent length".into(),
            ));
        }
        avps.push(avp);
    }
    Ok(avps)
}

pub fn encode_to<W: Write>(writer: &mut W, children: &[Avp]) -> Result<()> {
    for avp in children {
        avp.encode_to(writer)?;
    }
    Ok(())
}

pub fn length(children: &[Avp]) -> u32 {
    children.iter().map(|avp| avp.wire_length()).sum()
}
