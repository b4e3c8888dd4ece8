//! Human-readable rendering of messages and AVPs for logs and
//! debugging. Unlike a plain `Display` impl, names here are resolved
//! through a [`Dictionary`] rather than hardcoded, so rendering tracks
//! whatever dictionary the caller loaded.
use crate::avp::{Avp, AvpValue};
use crate::dictionary::Dictionary;
use crate::diameter::{CommandFlags, DiameterHeader, DiameterMessage};
use std::fmt::Write;

impl DiameterMessage {
    pub fn render(&self, dict: &Dictionary) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.header.render(dict));
        let _ = writeln!(
            out,
            "  {:<40} {:>8} {:>5}  {} {} {}  {:<16}  {}",
            "AVP", "Vendor", "Code", "V", "M", "P", "Type", "Value"
        );
        for avp in &self.avps {
            let _ = writeln!(out, "{}", avp.render(dict));
        }
        out
    }
}

impl DiameterHeader {
    pub fn render(&self, dict: &Dictionary) -> String {
        let command_name = dict
            .command_by_code(self.application_id, self.code)
            .map(|c| c.name.as_str())
            .unwrap_or("Unknown");
        let application_name = dict.app_by_code(self.application_id).map(|a| a.name.as_str()).unwrap_or("Unknown");

        format!(
            "{}({}) {}({}) {} {}, {}",
            command_name,
            self.code,
            application_name,
            self.application_id,
            render_flags(self.flags),
            self.hop_by_hop_id,
            self.end_to_end_id
        )
    }
}

fn render_flags(flags: CommandFlags) -> String {
    let mut s = String::new();
    s.push(if flags.request { 'R' } else { 'A' });
    if flags.proxyable {
        s.push('P');
    }
    if flags.error {
        s.push('E');
    }
    if flags.retransmit {
        s.push('T');
    }
    s
}

impl Avp {
    pub fn render(&self, dict: &Dictionary) -> String {
        let name = dict.avp_name(self.vendor_id(), self.code()).unwrap_or("Unknown");
        let vendor_id = self.vendor_id().map(|v| v.to_string()).unwrap_or_default();
        let flags = self.flags();

        format!(
            "  {:<40} {:>8} {:>5}  {} {} {}  {:<16}  {}",
            name,
            vendor_id,
            self.code(),
            bool_mark(flags.vendor),
            bool_mark(flags.mandatory),
            bool_mark(flags.private),
            self.value().type_name(),
            render_value(self, dict),
        )
    }
}

fn render_value(avp: &Avp, dict: &Dictionary) -> String {
    match avp.value() {
        AvpValue::Grouped(children) => {
            let rendered: Vec<String> = children
                .iter()
                .map(|c| format!("{}={}", dict.avp_name(c.vendor_id(), c.code()).unwrap_or("Unknown"), render_value(c, dict)))
                .collect();
            format!("[{}]", rendered.join(", "))
        }
        _ => match avp.to_json(dict) {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        },
    }
}

fn bool_mark(v: bool) -> &'static str {
    if v {
        "Y"
    } else {
        "N"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avp::Avp;
    use crate::dictionary::BASE_DICT_XML;
    use crate::diameter::CommandFlags;

    fn test_dict() -> Dictionary {
        Dictionary::new(&[BASE_DICT_XML]).unwrap()
    }

    #[test]
    fn test_render_resolves_names_from_dictionary() {
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
            1,
            1,
        );
        msg.add_by_name(&dict, "Origin-Host", "peer.example.com".to_string().into()).unwrap();

        let rendered = msg.render(&dict);
        assert!(rendered.contains("Capabilities-Exchange"));
        assert!(rendered.contains("Origin-Host"));
        assert!(rendered.contains("peer.example.com"));
    }

    #[test]
    fn test_render_unknown_avp_falls_back() {
        let dict = test_dict();
        let avp = Avp::new(999999, None, AvpValue::OctetString(vec![1, 2, 3]), false);
        assert!(avp.render(&dict).contains("Unknown"));
    }
}
