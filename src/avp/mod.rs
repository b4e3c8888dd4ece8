/*
 * AVP format:
 *   0                   1                   2                   3
 *   0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
 *  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
 *  |                           AVP Code                           |
 *  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
 *  |V M P r r r r r|                 AVP Length                    |
 *  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
 *  |                        Vendor-ID (opt)                       |
 *  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
 *  |                             Data ...
 *  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
 */

pub mod address;
pub mod enumerated;
pub mod float32;
pub mod float64;
pub mod group;
pub mod identity;
pub mod integer32;
pub mod integer64;
pub mod ipfilterrule;
pub mod ipv4;
pub mod ipv6;
pub mod ipv6prefix;
pub mod octetstring;
pub mod time;
pub mod unsigned32;
pub mod unsigned64;
pub mod uri;
pub mod utf8string;

use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::io::{Read, Seek, SeekFrom, Write};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

const VENDOR_FLAG: u8 = 0x80;
const MANDATORY_FLAG: u8 = 0x40;
const PRIVATE_FLAG: u8 = 0x20;

/// The dictionary type tag an AVP code resolves to. `Unknown` is not a
/// wire type, it is what the dictionary returns for a code it has no
/// entry for; such AVPs are decoded as raw octets and re-encoded
/// unchanged (RFC 6733 §3, unrecognized AVPs without the M-bit MUST be
/// ignored but preserved when relayed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvpType {
    OctetString,
    UTF8String,
    Identity,
    URI,
    IPFilterRule,
    Integer32,
    Integer64,
    Unsigned32,
    Unsigned64,
    Float32,
    Float64,
    Address,
    AddressIPv4,
    AddressIPv6,
    IPv6Prefix,
    Time,
    Enumerated,
    Grouped,
    Unknown,
}

#[derive(Debug, Clone)]
pub enum AvpValue {
    OctetString(Vec<u8>),
    UTF8String(String),
    Identity(String),
    URI(String),
    IPFilterRule(String),
    Integer32(i32),
    Integer64(i64),
    Unsigned32(u32),
    Unsigned64(u64),
    Float32(f32),
    Float64(f64),
    Address(IpAddr),
    AddressIPv4(Ipv4Addr),
    AddressIPv6(Ipv6Addr),
    IPv6Prefix(String),
    Time(DateTime<Utc>),
    Enumerated(i32),
    Grouped(Vec<Avp>),
}

impl AvpValue {
    fn wire_length(&self) -> u32 {
        match self {
            AvpValue::OctetString(v) => v.len() as u32,
            AvpValue::UTF8String(v) => v.as_bytes().len() as u32,
            AvpValue::Identity(v) => v.as_bytes().len() as u32,
            AvpValue::URI(v) => v.as_bytes().len() as u32,
            AvpValue::IPFilterRule(v) => v.as_bytes().len() as u32,
            AvpValue::Integer32(_) => 4,
            AvpValue::Integer64(_) => 8,
            AvpValue::Unsigned32(_) => 4,
            AvpValue::Unsigned64(_) => 8,
            AvpValue::Float32(_) => 4,
            AvpValue::Float64(_) => 8,
            AvpValue::Address(addr) => address::length(addr),
            AvpValue::AddressIPv4(_) => 4,
            AvpValue::AddressIPv6(_) => 16,
            AvpValue::IPv6Prefix(_) => 18,
            AvpValue::Time(_) => 4,
            AvpValue::Enumerated(_) => 4,
            AvpValue::Grouped(children) => group::length(children),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            AvpValue::OctetString(_) => "OctetString",
            AvpValue::UTF8String(_) => "UTF8String",
            AvpValue::Identity(_) => "Identity",
            AvpValue::URI(_) => "URI",
            AvpValue::IPFilterRule(_) => "IPFilterRule",
            AvpValue::Integer32(_) => "Integer32",
            AvpValue::Integer64(_) => "Integer64",
            AvpValue::Unsigned32(_) => "Unsigned32",
            AvpValue::Unsigned64(_) => "Unsigned64",
            AvpValue::Float32(_) => "Float32",
            AvpValue::Float64(_) => "Float64",
            AvpValue::Address(_) => "Address",
            AvpValue::AddressIPv4(_) => "AddressIPv4",
            AvpValue::AddressIPv6(_) => "AddressIPv6",
            AvpValue::IPv6Prefix(_) => "IPv6Prefix",
            AvpValue::Time(_) => "Time",
            AvpValue::Enumerated(_) => "Enumerated",
            AvpValue::Grouped(_) => "Grouped",
        }
    }
}

macro_rules! from_impl {
    ($variant:ident, $ty:ty) => {
        impl From<$ty> for AvpValue {
            fn from(v: $ty) -> Self {
                AvpValue::$variant(v)
            }
        }
    };
}

from_impl!(OctetString, Vec<u8>);
from_impl!(Integer32, i32);
from_impl!(Integer64, i64);
from_impl!(Unsigned32, u32);
from_impl!(Unsigned64, u64);
from_impl!(Float32, f32);
from_impl!(Float64, f64);
from_impl!(Address, IpAddr);
from_impl!(AddressIPv4, Ipv4Addr);
from_impl!(AddressIPv6, Ipv6Addr);
from_impl!(Time, DateTime<Utc>);

impl From<String> for AvpValue {
    fn from(v: String) -> Self {
        AvpValue::UTF8String(v)
    }
}

impl From<Vec<Avp>> for AvpValue {
    fn from(v: Vec<Avp>) -> Self {
        AvpValue::Grouped(v)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AvpFlags {
    pub vendor: bool,
    pub mandatory: bool,
    pub private: bool,
}

#[derive(Debug, Clone)]
pub struct Avp {
    code: u32,
    vendor_id: Option<u32>,
    flags: AvpFlags,
    value: AvpValue,
    padding: u8,
}

fn pad_to_32_bits(length: u32) -> u8 {
    ((4 - (length & 0b11)) % 4) as u8
}

fn encode_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(s, "{:02x}", b).unwrap();
    }
    s
}

fn decode_hex(s: &str) -> Result<Vec<u8>> {
    if s.len() % 2 != 0 {
        return Err(Error::DecodeError(format!("odd-length hex string: {}", s)));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&s[i..i + 2], 16)
                .map_err(|_| Error::DecodeError(format!("invalid hex string: {}", s)))
        })
        .collect()
}

fn json_str<'a>(json: &'a serde_json::Value) -> Result<&'a str> {
    json.as_str()
        .ok_or_else(|| Error::DecodeError(format!("expected a JSON string, got {}", json)))
}

impl AvpValue {
    /// Builds a value from its dictionary-resolved type and a JSON
    /// projection of it, the inverse of [`Avp::to_json`]. Used to turn
    /// an HTTP handler's JSON answer back into wire AVPs.
    pub fn from_json(avp_type: AvpType, json: &serde_json::Value, dict: &Dictionary) -> Result<AvpValue> {
        match avp_type {
            AvpType::OctetString | AvpType::Unknown => Ok(AvpValue::OctetString(decode_hex(json_str(json)?)?)),
            AvpType::UTF8String => Ok(AvpValue::UTF8String(json_str(json)?.to_string())),
            AvpType::Identity => Ok(AvpValue::Identity(json_str(json)?.to_string())),
            AvpType::URI => Ok(AvpValue::URI(json_str(json)?.to_string())),
            AvpType::IPFilterRule => Ok(AvpValue::IPFilterRule(json_str(json)?.to_string())),
            AvpType::IPv6Prefix => Ok(AvpValue::IPv6Prefix(json_str(json)?.to_string())),
            AvpType::Integer32 => Ok(AvpValue::Integer32(json_i64(json)? as i32)),
            AvpType::Integer64 => Ok(AvpValue::Integer64(json_i64(json)?)),
            AvpType::Unsigned32 => Ok(AvpValue::Unsigned32(json_i64(json)? as u32)),
            AvpType::Unsigned64 => Ok(AvpValue::Unsigned64(json_i64(json)? as u64)),
            AvpType::Float32 => Ok(AvpValue::Float32(json_f64(json)? as f32)),
            AvpType::Float64 => Ok(AvpValue::Float64(json_f64(json)?)),
            AvpType::Enumerated => Ok(AvpValue::Enumerated(json_i64(json)? as i32)),
            AvpType::Address => {
                let addr: IpAddr = json_str(json)?
                    .parse()
                    .map_err(|_| Error::DecodeError(format!("invalid address: {}", json)))?;
                Ok(AvpValue::Address(addr))
            }
            AvpType::AddressIPv4 => {
                let addr: Ipv4Addr = json_str(json)?
                    .parse()
                    .map_err(|_| Error::DecodeError(format!("invalid ipv4 address: {}", json)))?;
                Ok(AvpValue::AddressIPv4(addr))
            }
            AvpType::AddressIPv6 => {
                let addr: Ipv6Addr = json_str(json)?
                    .parse()
                    .map_err(|_| Error::DecodeError(format!("invalid ipv6 address: {}", json)))?;
                Ok(AvpValue::AddressIPv6(addr))
            }
            AvpType::Time => {
                let time: DateTime<Utc> = json_str(json)?
                    .parse::<DateTime<chrono::FixedOffset>>()
                    .map_err(|_| Error::DecodeError(format!("invalid time: {}", json)))?
                    .into();
                Ok(AvpValue::Time(time))
            }
            AvpType::Grouped => {
                let items = json
                    .as_array()
                    .ok_or_else(|| Error::DecodeError("expected a JSON array for a Grouped AVP".into()))?;
                let mut children = Vec::with_capacity(items.len());
                for item in items {
                    let obj = item
                        .as_object()
                        .ok_or_else(|| Error::DecodeError("expected a single-key object per child AVP".into()))?;
                    let (name, value) = obj
                        .iter()
                        .next()
                        .ok_or_else(|| Error::DecodeError("empty child AVP object".into()))?;
                    children.push(Avp::by_name_json(dict, name, value.clone())?);
                }
                Ok(AvpValue::Grouped(children))
            }
        }
    }
}

fn json_i64(json: &serde_json::Value) -> Result<i64> {
    json.as_i64()
        .ok_or_else(|| Error::DecodeError(format!("expected a JSON integer, got {}", json)))
}

fn json_f64(json: &serde_json::Value) -> Result<f64> {
    json.as_f64()
        .ok_or_else(|| Error::DecodeError(format!("expected a JSON number, got {}", json)))
}

impl Avp {
    pub fn new(code: u32, vendor_id: Option<u32>, value: AvpValue, mandatory: bool) -> Avp {
        let padding = pad_to_32_bits(value.wire_length());
        Avp {
            code,
            vendor_id,
            flags: AvpFlags {
                vendor: vendor_id.is_some(),
                mandatory,
                private: false,
            },
            value,
            padding,
        }
    }

    pub fn with_flags(mut self, mandatory: bool, private: bool) -> Avp {
        self.flags.mandatory = mandatory;
        self.flags.private = private;
        self
    }

    pub fn by_name(dict: &Dictionary, name: &str, value: AvpValue) -> Result<Avp> {
        let entry = dict
            .avp_by_name(name)
            .ok_or_else(|| Error::UnknownAvpName(name.to_string()))?;
        Ok(Avp::new(entry.code, entry.vendor_id, value, entry.mandatory))
    }

    /// Like [`Avp::by_name`], but decodes the value from its JSON
    /// projection using the dictionary-resolved type instead of taking
    /// an already-typed [`AvpValue`].
    pub fn by_name_json(dict: &Dictionary, name: &str, json: serde_json::Value) -> Result<Avp> {
        let entry = dict
            .avp_by_name(name)
            .ok_or_else(|| Error::UnknownAvpName(name.to_string()))?;
        let value = AvpValue::from_json(entry.avp_type, &json, dict)?;
        Ok(Avp::new(entry.code, entry.vendor_id, value, entry.mandatory))
    }

    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn vendor_id(&self) -> Option<u32> {
        self.vendor_id
    }

    pub fn flags(&self) -> AvpFlags {
        self.flags
    }

    pub fn value(&self) -> &AvpValue {
        &self.value
    }

    pub fn padding(&self) -> u8 {
        self.padding
    }

    fn header_length(&self) -> u32 {
        if self.vendor_id.is_some() {
            12
        } else {
            8
        }
    }

    /// Total bytes this AVP occupies on the wire, header plus data plus padding.
    pub fn wire_length(&self) -> u32 {
        self.header_length() + self.value.wire_length() + self.padding as u32
    }

    pub fn decode_from<R: Read + Seek>(reader: &mut R, dict: &Dictionary) -> Result<Avp> {
        let mut b = [0u8; 8];
        reader.read_exact(&mut b)?;
        let code = u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
        let vendor_flag = (b[4] & VENDOR_FLAG) != 0;
        let mandatory = (b[4] & MANDATORY_FLAG) != 0;
        let private = (b[4] & PRIVATE_FLAG) != 0;
        let avp_length = u32::from_be_bytes([0, b[5], b[6], b[7]]);

        let vendor_id = if vendor_flag {
            let mut vb = [0u8; 4];
            reader.read_exact(&mut vb)?;
            Some(u32::from_be_bytes(vb))
        } else {
            None
        };

        let header_length = if vendor_flag { 12 } else { 8 };
        if avp_length < header_length {
            return Err(Error::DecodeError(format!(
                "avp {} length {} shorter than header",
                code, avp_length
            )));
        }
        let data_length = (avp_length - header_length) as usize;

        let avp_type = dict.avp_type(vendor_id, code);

        let value = match avp_type {
            AvpType::OctetString => AvpValue::OctetString(octetstring::decode_from(reader, data_length)?),
            AvpType::UTF8String => AvpValue::UTF8String(utf8string::decode_from(reader, data_length)?),
            AvpType::Identity => AvpValue::Identity(identity::decode_from(reader, data_length)?),
            AvpType::URI => AvpValue::URI(uri::decode_from(reader, data_length)?),
            AvpType::IPFilterRule => {
                AvpValue::IPFilterRule(ipfilterrule::decode_from(reader, data_length)?)
            }
            AvpType::Integer32 => AvpValue::Integer32(integer32::decode_from(reader)?),
            AvpType::Integer64 => AvpValue::Integer64(integer64::decode_from(reader)?),
            AvpType::Unsigned32 => AvpValue::Unsigned32(unsigned32::decode_from(reader)?),
            AvpType::Unsigned64 => AvpValue::Unsigned64(unsigned64::decode_from(reader)?),
            AvpType::Float32 => AvpValue::Float32(float32::decode_from(reader)?),
            AvpType::Float64 => AvpValue::Float64(float64::decode_from(reader)?),
            AvpType::Address => AvpValue::Address(address::decode_from(reader)?),
            AvpType::AddressIPv4 => AvpValue::AddressIPv4(ipv4::decode_from(reader)?),
            AvpType::AddressIPv6 => AvpValue::AddressIPv6(ipv6::decode_from(reader)?),
            AvpType::IPv6Prefix => AvpValue::IPv6Prefix(ipv6prefix::decode_from(reader)?),
            AvpType::Time => AvpValue::Time(time::decode_from(reader)?),
            AvpType::Enumerated => AvpValue::Enumerated(enumerated::decode_from(reader)?),
            AvpType::Grouped => AvpValue::Grouped(group::decode_from(reader, data_length, dict)?),
            AvpType::Unknown => AvpValue::OctetString(octetstring::decode_from(reader, data_length)?),
        };

        let padding = pad_to_32_bits(data_length as u32);
        if padding > 0 {
            reader.seek(SeekFrom::Current(padding as i64))?;
        }

        Ok(Avp {
            code,
            vendor_id,
            flags: AvpFlags {
                vendor: vendor_flag,
                mandatory,
                private,
            },
            value,
            padding,
        })
    }

    pub fn encode_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.code.to_be_bytes())?;

        let mut flags: u8 = 0;
        if self.flags.vendor {
            flags |= VENDOR_FLAG;
        }
        if self.flags.mandatory {
            flags |= MANDATORY_FLAG;
        }
        if self.flags.private {
            flags |= PRIVATE_FLAG;
        }
        writer.write_all(&[flags])?;
        let length_field = self.header_length() + self.value.wire_length();
        writer.write_all(&length_field.to_be_bytes()[1..4])?;

        if let Some(vendor_id) = self.vendor_id {
            writer.write_all(&vendor_id.to_be_bytes())?;
        }

        match &self.value {
            AvpValue::OctetString(v) => octetstring::encode_to(writer, v)?,
            AvpValue::UTF8String(v) => utf8string::encode_to(writer, v)?,
            AvpValue::Identity(v) => identity::encode_to(writer, v)?,
            AvpValue::URI(v) => uri::encode_to(writer, v)?,
            AvpValue::IPFilterRule(v) => ipfilterrule::encode_to(writer, v)?,
            AvpValue::Integer32(v) => integer32::encode_to(writer, *v)?,
            AvpValue::Integer64(v) => integer64::encode_to(writer, *v)?,
            AvpValue::Unsigned32(v) => unsigned32::encode_to(writer, *v)?,
            AvpValue::Unsigned64(v) => unsigned64::encode_to(writer, *v)?,
            AvpValue::Float32(v) => float32::encode_to(writer, *v)?,
            AvpValue::Float64(v) => float64::encode_to(writer, *v)?,
            AvpValue::Address(v) => address::encode_to(writer, v)?,
            AvpValue::AddressIPv4(v) => ipv4::encode_to(writer, v)?,
            AvpValue::AddressIPv6(v) => ipv6::encode_to(writer, v)?,
            AvpValue::IPv6Prefix(v) => ipv6prefix::encode_to(writer, v)?,
            AvpValue::Time(v) => time::encode_to(writer, v)?,
            AvpValue::Enumerated(v) => enumerated::encode_to(writer, *v)?,
            AvpValue::Grouped(children) => group::encode_to(writer, children)?,
        }

        for _ in 0..self.padding {
            writer.write_all(&[0])?;
        }
        Ok(())
    }

    pub fn as_i64(&self) -> Option<i64> {
        match &self.value {
            AvpValue::Integer32(v) => Some(*v as i64),
            AvpValue::Integer64(v) => Some(*v),
            AvpValue::Enumerated(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match &self.value {
            AvpValue::Unsigned32(v) => Some(*v as u64),
            AvpValue::Unsigned64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match &self.value {
            AvpValue::Float32(v) => Some(*v as f64),
            AvpValue::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            AvpValue::UTF8String(v) => Some(v),
            AvpValue::Identity(v) => Some(v),
            AvpValue::URI(v) => Some(v),
            AvpValue::IPFilterRule(v) => Some(v),
            AvpValue::IPv6Prefix(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.value {
            AvpValue::OctetString(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_ip(&self) -> Option<IpAddr> {
        match &self.value {
            AvpValue::Address(v) => Some(*v),
            AvpValue::AddressIPv4(v) => Some(IpAddr::V4(*v)),
            AvpValue::AddressIPv6(v) => Some(IpAddr::V6(*v)),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<&DateTime<Utc>> {
        match &self.value {
            AvpValue::Time(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_grouped(&self) -> Option<&[Avp]> {
        match &self.value {
            AvpValue::Grouped(v) => Some(v),
            _ => None,
        }
    }

    /// Appends a child AVP, rejecting the call instead of mutating a
    /// non-grouped AVP. Returns the error and leaves `self` untouched
    /// on failure.
    pub fn add_child(&mut self, child: Avp) -> Result<()> {
        match &mut self.value {
            AvpValue::Grouped(children) => {
                children.push(child);
                self.padding = pad_to_32_bits(self.value.wire_length());
                Ok(())
            }
            _ => Err(Error::NotGrouped(self.code)),
        }
    }

    pub fn get_first(&self, code: u32, vendor_id: Option<u32>) -> Option<&Avp> {
        self.as_grouped()?
            .iter()
            .find(|a| a.code == code && a.vendor_id == vendor_id)
    }

    pub fn get_all(&self, code: u32, vendor_id: Option<u32>) -> Vec<&Avp> {
        match self.as_grouped() {
            Some(children) => children
                .iter()
                .filter(|a| a.code == code && a.vendor_id == vendor_id)
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn delete_all(&mut self, code: u32, vendor_id: Option<u32>) -> Result<()> {
        match &mut self.value {
            AvpValue::Grouped(children) => {
                children.retain(|a| !(a.code == code && a.vendor_id == vendor_id));
                self.padding = pad_to_32_bits(self.value.wire_length());
                Ok(())
            }
            _ => Err(Error::NotGrouped(self.code)),
        }
    }

    /// Resolves a dotted path of AVP names through nested Grouped AVPs,
    /// e.g. `"Subscription-Id.Subscription-Id-Data"`.
    pub fn get_path<'a>(&'a self, dict: &Dictionary, path: &str) -> Option<&'a Avp> {
        let mut current = self;
        for segment in path.split('.') {
            let entry = dict.avp_by_name(segment)?;
            current = current.get_first(entry.code, entry.vendor_id)?;
        }
        Some(current)
    }

    pub fn to_json(&self, dict: &Dictionary) -> serde_json::Value {
        match &self.value {
            AvpValue::OctetString(v) => serde_json::Value::String(encode_hex(v)),
            AvpValue::UTF8String(v) => serde_json::Value::String(v.clone()),
            AvpValue::Identity(v) => serde_json::Value::String(v.clone()),
            AvpValue::URI(v) => serde_json::Value::String(v.clone()),
            AvpValue::IPFilterRule(v) => serde_json::Value::String(v.clone()),
            AvpValue::IPv6Prefix(v) => serde_json::Value::String(v.clone()),
            AvpValue::Integer32(v) => serde_json::Value::from(*v),
            AvpValue::Integer64(v) => serde_json::Value::from(*v),
            AvpValue::Unsigned32(v) => serde_json::Value::from(*v),
            AvpValue::Unsigned64(v) => serde_json::Value::from(*v),
            AvpValue::Float32(v) => serde_json::json!(*v),
            AvpValue::Float64(v) => serde_json::json!(*v),
            AvpValue::Address(v) => serde_json::Value::String(v.to_string()),
            AvpValue::AddressIPv4(v) => serde_json::Value::String(v.to_string()),
            AvpValue::AddressIPv6(v) => serde_json::Value::String(v.to_string()),
            AvpValue::Time(v) => serde_json::Value::String(v.to_rfc3339()),
            AvpValue::Enumerated(v) => match dict.enum_name(self.code, self.vendor_id, *v) {
                Some(name) => serde_json::Value::String(name.to_string()),
                None => serde_json::Value::from(*v),
            },
            AvpValue::Grouped(children) => serde_json::Value::Array(
                children
                    .iter()
                    .map(|c| {
                        let name = dict.avp_name(c.vendor_id, c.code).unwrap_or("Unknown");
                        serde_json::json!({ name: c.to_json(dict) })
                    })
                    .collect(),
            ),
        }
    }
}

#[macro_export]
macro_rules! avp {
    ($code:expr, $vendor_id:expr, $value:expr) => {
        $crate::avp::Avp::new($code, $vendor_id, $value.into(), false)
    };
    ($code:expr, $vendor_id:expr, $value:expr, $mflag:expr) => {
        $crate::avp::Avp::new($code, $vendor_id, $value.into(), $mflag)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::Dictionary;
    use std::io::Cursor;

    fn test_dict() -> Dictionary {
        Dictionary::new(&[crate::dictionary::BASE_DICT_XML]).unwrap()
    }

    #[test]
    fn test_encode_decode_utf8string() {
        let dict = test_dict();
        let avp = avp!(461, None, "diam.example.com".to_string(), true);
        let mut encoded = Vec::new();
        avp.encode_to(&mut encoded).unwrap();
        let mut cursor = Cursor::new(&encoded);
        let decoded = Avp::decode_from(&mut cursor, &dict).unwrap();
        assert_eq!(decoded.as_str(), avp.as_str());
        assert_eq!(decoded.wire_length(), avp.wire_length());
    }

    #[test]
    fn test_unknown_avp_roundtrips_as_octetstring() {
        let dict = test_dict();
        let avp = Avp::new(999_999, None, AvpValue::OctetString(vec![1, 2, 3, 4, 5]), false);
        let mut encoded = Vec::new();
        avp.encode_to(&mut encoded).unwrap();
        let mut cursor = Cursor::new(&encoded);
        let decoded = Avp::decode_from(&mut cursor, &dict).unwrap();
        assert_eq!(decoded.as_bytes(), Some(&[1u8, 2, 3, 4, 5][..]));
    }

    #[test]
    fn test_length_field_excludes_padding() {
        let avp = Avp::new(999_999, None, AvpValue::OctetString(vec![1, 2, 3, 4, 5]), false);
        let mut encoded = Vec::new();
        avp.encode_to(&mut encoded).unwrap();

        let length_field = u32::from_be_bytes([0, encoded[5], encoded[6], encoded[7]]);
        assert_eq!(length_field, avp.header_length() + 5);
        assert_eq!(encoded.len() as u32, avp.header_length() + 5 + 3);
    }

    #[test]
    fn test_grouped_add_child_rejects_non_grouped() {
        let mut avp = avp!(461, None, "example".to_string());
        let child = avp!(1, None, 7i32);
        assert!(avp.add_child(child).is_err());
    }

    #[test]
    fn test_grouped_roundtrip_and_lookup() {
        let dict = test_dict();
        let mut group = Avp::new(443, None, AvpValue::Grouped(Vec::new()), true);
        group.add_child(avp!(444, None, "1".to_string())).unwrap();
        group.add_child(avp!(450, None, 1i32)).unwrap();

        let mut encoded = Vec::new();
        group.encode_to(&mut encoded).unwrap();
        let mut cursor = Cursor::new(&encoded);
        let decoded = Avp::decode_from(&mut cursor, &dict).unwrap();

        assert_eq!(decoded.get_all(444, None).len(), 1);
        assert!(decoded.get_first(450, None).is_some());
    }
}
