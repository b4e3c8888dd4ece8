//! Diameter message header and message container (RFC 6733 §3).
//!
//! ```text
//!   0                   1                   2                   3
//!   0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  |    Version    |                 Message Length                |
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  | command flags |                  Command-Code                 |
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  |                         Application-ID                        |
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  |                      Hop-by-Hop Identifier                    |
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  |                      End-to-End Identifier                    |
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Command Flags: `R(equest) P(roxyable) E(rror) T(potentially
//! re-transmitted) r(eserved x4)`.

use crate::avp::{Avp, AvpValue};
use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use std::io::{Read, Seek, Write};

const DIAMETER_VERSION: u8 = 1;

const REQUEST_FLAG: u8 = 0x80;
const PROXYABLE_FLAG: u8 = 0x40;
const ERROR_FLAG: u8 = 0x20;
const RETRANSMIT_FLAG: u8 = 0x10;

#[derive(Debug, Clone, Copy, Default)]
pub struct CommandFlags {
    pub request: bool,
    pub proxyable: bool,
    pub error: bool,
    pub retransmit: bool,
}

impl CommandFlags {
    fn from_byte(b: u8) -> CommandFlags {
        CommandFlags {
            request: b & REQUEST_FLAG != 0,
            proxyable: b & PROXYABLE_FLAG != 0,
            error: b & ERROR_FLAG != 0,
            retransmit: b & RETRANSMIT_FLAG != 0,
        }
    }

    fn to_byte(self) -> u8 {
        let mut b = 0u8;
        if self.request {
            b |= REQUEST_FLAG;
        }
        if self.proxyable {
            b |= PROXYABLE_FLAG;
        }
        if self.error {
            b |= ERROR_FLAG;
        }
        if self.retransmit {
            b |= RETRANSMIT_FLAG;
        }
        b
    }
}

#[derive(Debug, Clone)]
pub struct DiameterHeader {
    pub version: u8,
    pub flags: CommandFlags,
    pub code: u32,
    pub application_id: u32,
    pub hop_by_hop_id: u32,
    pub end_to_end_id: u32,
}

#[derive(Debug, Clone)]
pub struct DiameterMessage {
    pub header: DiameterHeader,
    pub avps: Vec<Avp>,
}

impl DiameterMessage {
    pub fn new(
        code: u32,
        application_id: u32,
        flags: CommandFlags,
        hop_by_hop_id: u32,
        end_to_end_id: u32,
    ) -> DiameterMessage {
        DiameterMessage {
            header: DiameterHeader {
                version: DIAMETER_VERSION,
                flags,
                code,
                application_id,
                hop_by_hop_id,
                end_to_end_id,
            },
            avps: Vec::new(),
        }
    }

    /// Builds an answer skeleton from a request: same command code and
    /// application id, the request's E bit cleared and R bit cleared,
    /// same hop-by-hop/end-to-end ids so a peer's in-flight-request map
    /// matches the reply to the pending request (RFC 6733 §3).
    pub fn new_answer(request: &DiameterMessage) -> DiameterMessage {
        let mut flags = request.header.flags;
        flags.request = false;
        flags.error = false;
        DiameterMessage::new(
            request.header.code,
            request.header.application_id,
            flags,
            request.header.hop_by_hop_id,
            request.header.end_to_end_id,
        )
    }

    pub fn add_avp(&mut self, avp: Avp) -> &mut Self {
        self.avps.push(avp);
        self
    }

    pub fn get_first(&self, code: u32, vendor_id: Option<u32>) -> Option<&Avp> {
        self.avps
            .iter()
            .find(|a| a.code() == code && a.vendor_id() == vendor_id)
    }

    pub fn get_all(&self, code: u32, vendor_id: Option<u32>) -> Vec<&Avp> {
        self.avps
            .iter()
            .filter(|a| a.code() == code && a.vendor_id() == vendor_id)
            .collect()
    }

    pub fn delete_all(&mut self, code: u32, vendor_id: Option<u32>) {
        self.avps
            .retain(|a| !(a.code() == code && a.vendor_id() == vendor_id));
    }

    pub fn get_by_name<'a>(&'a self, dict: &Dictionary, name: &str) -> Option<&'a Avp> {
        let entry = dict.avp_by_name(name)?;
        self.get_first(entry.code, entry.vendor_id)
    }

    pub fn add_by_name(&mut self, dict: &Dictionary, name: &str, value: AvpValue) -> Result<&mut Self> {
        let avp = Avp::by_name(dict, name, value)?;
        Ok(self.add_avp(avp))
    }

    /// Resolves a dotted AVP-name path, descending through Grouped AVPs.
    pub fn get_path<'a>(&'a self, dict: &Dictionary, path: &str) -> Option<&'a Avp> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.get_by_name(dict, first)?;
        for segment in segments {
            current = current.get_path(dict, segment)?;
        }
        Some(current)
    }

    /// Fills in dictionary-derivable display fields (the application
    /// and command names, AVP names) without touching the wire data;
    /// used by the JSON projection and logging layers.
    pub fn tidy(&self, dict: &Dictionary) -> TidyMessage {
        let app_name = dict
            .app_by_code(self.header.application_id)
            .map(|a| a.name.clone());
        let command_name = dict
            .command_by_code(self.header.application_id, self.header.code)
            .map(|c| c.name.clone());

        TidyMessage {
            command_code: self.header.code,
            command_name,
            application_id: self.header.application_id,
            application_name: app_name,
            is_request: self.header.flags.request,
            hop_by_hop_id: self.header.hop_by_hop_id,
            end_to_end_id: self.header.end_to_end_id,
            avps: self
                .avps
                .iter()
                .map(|a| {
                    let name = dict
                        .avp_name(a.vendor_id(), a.code())
                        .unwrap_or("Unknown")
                        .to_string();
                    (name, a.to_json(dict))
                })
                .collect(),
        }
    }

    pub fn to_json(&self, dict: &Dictionary) -> serde_json::Value {
        serde_json::to_value(self.tidy(dict)).unwrap_or(serde_json::Value::Null)
    }

    pub fn decode_from<R: Read + Seek>(reader: &mut R, dict: &Dictionary) -> Result<DiameterMessage> {
        let mut b = [0u8; 20];
        reader.read_exact(&mut b)?;

        let version = b[0];
        let length = u32::from_be_bytes([0, b[1], b[2], b[3]]);
        let flags = CommandFlags::from_byte(b[4]);
        let code = u32::from_be_bytes([0, b[5], b[6], b[7]]);
        let application_id = u32::from_be_bytes([b[8], b[9], b[10], b[11]]);
        let hop_by_hop_id = u32::from_be_bytes([b[12], b[13], b[14], b[15]]);
        let end_to_end_id = u32::from_be_bytes([b[16], b[17], b[18], b[19]]);

        if length < 20 {
            return Err(Error::DecodeError(format!(
                "diameter message length {} shorter than header",
                length
            )));
        }

        let mut avps = Vec::new();
        let mut consumed = 20u32;
        while consumed < length {
            let avp = Avp::decode_from(reader, dict)?;
            consumed += avp.wire_length();
            avps.push(avp);
        }
        if consumed != length {
            return Err(Error::DecodeError(
                "diameter message length mismatch against avp sum".into(),
            ));
        }

        Ok(DiameterMessage {
            header: DiameterHeader {
                version,
                flags,
                code,
                application_id,
                hop_by_hop_id,
                end_to_end_id,
            },
            avps,
        })
    }

    pub fn encode_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let length = self.wire_length();

        writer.write_all(&[self.header.version])?;
        writer.write_all(&length.to_be_bytes()[1..4])?;
        writer.write_all(&[self.header.flags.to_byte()])?;
        writer.write_all(&self.header.code.to_be_bytes()[1..4])?;
        writer.write_all(&self.header.application_id.to_be_bytes())?;
        writer.write_all(&self.header.hop_by_hop_id.to_be_bytes())?;
        writer.write_all(&self.header.end_to_end_id.to_be_bytes())?;

        for avp in &self.avps {
            avp.encode_to(writer)?;
        }
        Ok(())
    }

    pub fn wire_length(&self) -> u32 {
        20 + self.avps.iter().map(|a| a.wire_length()).sum::<u32>()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct TidyMessage {
    pub command_code: u32,
    pub command_name: Option<String>,
    pub application_id: u32,
    pub application_name: Option<String>,
    pub is_request: bool,
    pub hop_by_hop_id: u32,
    pub end_to_end_id: u32,
    pub avps: Vec<(String, serde_json::Value)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::BASE_DICT_XML;
    use std::io::Cursor;

    fn test_dict() -> Dictionary {
        Dictionary::new(&[BASE_DICT_XML]).unwrap()
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let dict = test_dict();
        let mut msg = DiameterMessage::new(
            257,
            0,
            CommandFlags {
                request: true,
                proxyable: false,
                error: false,
                retransmit: false,
            },
            1123158610,
            3102381851,
        );
        msg.add_by_name(&dict, "Origin-Host", "host.example.com".to_string().into())
            .unwrap();
        msg.add_by_name(&dict, "Origin-Realm", "example.com".to_string().into())
            .unwrap();

        let mut encoded = Vec::new();
        msg.encode_to(&mut encoded).unwrap();

        let mut cursor = Cursor::new(&encoded);
        let decoded = DiameterMessage::decode_from(&mut cursor, &dict).unwrap();

        assert_eq!(decoded.header.code, 257);
        assert_eq!(decoded.header.hop_by_hop_id, 1123158610);
        assert_eq!(decoded.avps.len(), 2);
        assert_eq!(
            decoded.get_by_name(&dict, "Origin-Host").unwrap().as_str(),
            Some("host.example.com")
        );
        assert_eq!(
            decoded.get_by_name(&dict, "Origin-Realm").unwrap().as_str(),
            Some("example.com")
        );
    }

    #[test]
    fn test_new_answer_preserves_ids_and_clears_request_bit() {
        let request = DiameterMessage::new(
            257,
            0,
            CommandFlags {
                request: true,
                proxyable: false,
                error: false,
                retransmit: false,
            },
            42,
            99,
        );
        let answer = DiameterMessage::new_answer(&request);
        assert!(!answer.header.flags.request);
        assert_eq!(answer.header.hop_by_hop_id, 42);
        assert_eq!(answer.header.end_to_end_id, 99);
        assert_eq!(answer.header.code, 257);
    }
}
