//! Time AVP data (RFC 6733 §4.3.1): a 32-bit NTP-era timestamp,
//! seconds since 1900-01-01 00:00 UTC.
use crate::error::{Error, Result};
use chrono::{DateTime, TimeZone, Utc};
use std::io::{Read, Write};

const RFC868_OFFSET: i64 = 2208988800; // diff between 1970 and 1900 in seconds

pub fn decode_from<R: Read>(reader: &mut R) -> Result<DateTime<Utc>> {
    let mut b = [0u8; 4];
    reader.read_exact(&mut b)?;
    let diameter_timestamp = u32::from_be_bytes(b) as i64;
    let unix_timestamp = diameter_timestamp - RFC868_OFFSET;
    Utc.timestamp_opt(unix_timestamp, 0)
        .single()
        .ok_or_else(|| Error::DecodeError("invalid time".to_string()))
}

pub fn encode_to<W: Write>(writer: &mut W, value: &DateTime<Utc>) -> Result<()> {
    let diameter_timestamp = value.timestamp() + RFC868_OFFSET;
    if diameter_timestamp < 0 || diameter_timestamp > u32::MAX as i64 {
        return Err(Error::EncodeError(
            "time out of range for a 32-bit Diameter timestamp".to_string(),
        ));
    }
    writer.write_all(&(diameter_timestamp as u32).to_be_bytes())?;
    Ok(())
}
