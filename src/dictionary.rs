//! Parses one or more Diameter dictionary XML documents (a base
//! document plus optional vendor extensions) into lookup tables keyed
//! by AVP code/vendor-id, application id and command code, mirroring
//! the shape of the standard Diameter dictionaries shipped alongside
//! most AAA stacks (freeDiameter's `.dict`, OpenDiameter's XML, igor's
//! `JDiameter.xml`). Multiple documents are merged: a later document's
//! AVP, application or command with the same key overrides an earlier
//! one, so vendor extension files can be layered on top of a base file.
use crate::avp::AvpType;
use crate::error::{Error, Result};
use serde::Deserialize;
use serde_xml_rs::from_str;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct AvpEntry {
    pub code: u32,
    pub vendor_id: Option<u32>,
    pub name: String,
    pub avp_type: AvpType,
    pub mandatory: bool,
    /// Enumerated value -> symbolic name, empty for non-Enumerated AVPs.
    pub enum_values: HashMap<i32, String>,
    /// Allowed child AVP names for a Grouped AVP, empty otherwise.
    pub children: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ApplicationEntry {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct CommandEntry {
    pub application_id: u32,
    pub code: u32,
    pub name: String,
}

#[derive(Debug, Default)]
pub struct Dictionary {
    avps: HashMap<(Option<u32>, u32), AvpEntry>,
    avps_by_name: HashMap<String, (Option<u32>, u32)>,
    applications: HashMap<u32, ApplicationEntry>,
    applications_by_name: HashMap<String, u32>,
    commands: HashMap<(u32, u32), CommandEntry>,
    commands_by_name: HashMap<String, (u32, u32)>,
}

impl Dictionary {
    pub fn new(xmls: &[&str]) -> Result<Dictionary> {
        let mut dict = Dictionary::default();
        for xml in xmls {
            dict.merge(xml)?;
        }
        Ok(dict)
    }

    fn merge(&mut self, xml: &str) -> Result<()> {
        let doc: XmlDiameter =
            from_str(xml).map_err(|e| Error::DecodeError(format!("dictionary parse error: {}", e)))?;

        for app in doc.application {
            let app_id: u32 = app
                .id
                .parse()
                .map_err(|_| Error::DecodeError(format!("invalid application id: {}", app.id)))?;

            self.applications.insert(
                app_id,
                ApplicationEntry {
                    id: app_id,
                    name: app.name.clone(),
                },
            );
            self.applications_by_name.insert(app.name.clone(), app_id);

            if let Some(command) = &app.command {
                let code: u32 = command
                    .code
                    .parse()
                    .map_err(|_| Error::DecodeError(format!("invalid command code: {}", command.code)))?;
                let entry = CommandEntry {
                    application_id: app_id,
                    code,
                    name: command.name.clone(),
                };
                self.commands.insert((app_id, code), entry);
                self.commands_by_name
                    .insert(command.name.clone(), (app_id, code));
            }

            for avp in &app.avps {
                let entry = parse_avp(avp)?;
                let key = (entry.vendor_id, entry.code);
                self.avps_by_name.insert(entry.name.clone(), key);
                self.avps.insert(key, entry);
            }
        }
        Ok(())
    }

    pub fn avp_type(&self, vendor_id: Option<u32>, code: u32) -> AvpType {
        self.avps
            .get(&(vendor_id, code))
            .map(|e| e.avp_type)
            .unwrap_or(AvpType::Unknown)
    }

    pub fn avp(&self, vendor_id: Option<u32>, code: u32) -> Option<&AvpEntry> {
        self.avps.get(&(vendor_id, code))
    }

    pub fn avp_by_name(&self, name: &str) -> Option<&AvpEntry> {
        let key = self.avps_by_name.get(name)?;
        self.avps.get(key)
    }

    pub fn avp_name(&self, vendor_id: Option<u32>, code: u32) -> Option<&str> {
        self.avps.get(&(vendor_id, code)).map(|e| e.name.as_str())
    }

    pub fn enum_name(&self, code: u32, vendor_id: Option<u32>, value: i32) -> Option<&str> {
        self.avps
            .get(&(vendor_id, code))?
            .enum_values
            .get(&value)
            .map(|s| s.as_str())
    }

    pub fn allowed_children(&self, vendor_id: Option<u32>, code: u32) -> &[String] {
        self.avps
            .get(&(vendor_id, code))
            .map(|e| e.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn app_by_code(&self, id: u32) -> Option<&ApplicationEntry> {
        self.applications.get(&id)
    }

    pub fn app_by_name(&self, name: &str) -> Option<&ApplicationEntry> {
        let id = self.applications_by_name.get(name)?;
        self.applications.get(id)
    }

    pub fn command_by_code(&self, application_id: u32, code: u32) -> Option<&CommandEntry> {
        self.commands.get(&(application_id, code))
    }

    pub fn command_by_name(&self, name: &str) -> Option<&CommandEntry> {
        let key = self.commands_by_name.get(name)?;
        self.commands.get(key)
    }
}

fn parse_avp(avp: &XmlAvp) -> Result<AvpEntry> {
    let code: u32 = avp
        .code
        .parse()
        .map_err(|_| Error::DecodeError(format!("invalid avp code: {}", avp.code)))?;
    let vendor_id = match &avp.vendor_id {
        Some(v) => Some(
            v.parse::<u32>()
                .map_err(|_| Error::DecodeError(format!("invalid vendor-id: {}", v)))?,
        ),
        None => None,
    };
    let mandatory = avp
        .must
        .as_deref()
        .map(|m| m.contains('M'))
        .unwrap_or(false);

    let avp_type = match avp.data.data_type.as_str() {
        "UTF8String" => AvpType::UTF8String,
        "OctetString" => AvpType::OctetString,
        "Integer32" => AvpType::Integer32,
        "Integer64" => AvpType::Integer64,
        "Unsigned32" => AvpType::Unsigned32,
        "Unsigned64" => AvpType::Unsigned64,
        "Enumerated" => AvpType::Enumerated,
        "Grouped" => AvpType::Grouped,
        "DiameterIdentity" => AvpType::Identity,
        "DiameterURI" => AvpType::URI,
        "IPFilterRule" => AvpType::IPFilterRule,
        "Time" => AvpType::Time,
        "Address" => AvpType::Address,
        "IPv4" => AvpType::AddressIPv4,
        "IPv6" => AvpType::AddressIPv6,
        "IPv6Prefix" => AvpType::IPv6Prefix,
        "Float32" => AvpType::Float32,
        "Float64" => AvpType::Float64,
        _ => AvpType::Unknown,
    };

    let mut enum_values = HashMap::new();
    if avp_type == AvpType::Enumerated {
        for item in &avp.data.item {
            let v: i32 = item
                .code
                .parse()
                .map_err(|_| Error::DecodeError(format!("invalid enum item code: {}", item.code)))?;
            enum_values.insert(v, item.name.clone());
        }
    }

    let children = if avp_type == AvpType::Grouped {
        avp.data.rule.iter().map(|r| r.avp.clone()).collect()
    } else {
        Vec::new()
    };

    Ok(AvpEntry {
        code,
        vendor_id,
        name: avp.name.clone(),
        avp_type,
        mandatory,
        enum_values,
        children,
    })
}

#[derive(Debug, Deserialize, PartialEq)]
struct XmlDiameter {
    #[serde(rename = "application", default)]
    application: Vec<XmlApplication>,
}

#[derive(Debug, Deserialize, PartialEq)]
struct XmlApplication {
    id: String,
    name: String,
    command: Option<XmlCommand>,
    #[serde(rename = "avp", default)]
    avps: Vec<XmlAvp>,
}

#[derive(Debug, Deserialize, PartialEq)]
struct XmlCommand {
    code: String,
    name: String,
}

#[derive(Debug, Deserialize, PartialEq)]
struct XmlAvp {
    name: String,
    code: String,
    must: Option<String>,
    may: Option<String>,
    #[serde(rename = "must-not")]
    must_not: Option<String>,
    #[serde(rename = "vendor-id")]
    vendor_id: Option<String>,
    data: XmlData,
}

#[derive(Debug, Deserialize, PartialEq)]
struct XmlData {
    #[serde(rename = "type")]
    data_type: String,
    #[serde(rename = "item", default)]
    item: Vec<XmlItem>,
    #[serde(rename = "rule", default)]
    rule: Vec<XmlRule>,
}

#[derive(Debug, Deserialize, PartialEq)]
struct XmlItem {
    code: String,
    name: String,
}

#[derive(Debug, Deserialize, PartialEq)]
struct XmlRule {
    avp: String,
    #[allow(dead_code)]
    required: Option<String>,
}

/// A small base dictionary covering the Base Accounting application
/// (RFC 6733 §2.4) AVPs this crate's peer state machine needs at a
/// minimum: the CER/CEA/DWR/DWA/DPR/DPA command set and the common
/// session/result/routing AVPs. Deployments layer their own vendor
/// dictionaries on top via [`Dictionary::new`].
pub const BASE_DICT_XML: &str = r#"
<diameter>
    <application id="0" name="Base">
        <avp name="Session-Id" code="263" must="M">
            <data type="UTF8String"/>
        </avp>
        <avp name="Origin-Host" code="264" must="M">
            <data type="DiameterIdentity"/>
        </avp>
        <avp name="Origin-Realm" code="296" must="M">
            <data type="DiameterIdentity"/>
        </avp>
        <avp name="Destination-Host" code="293" must="M">
            <data type="DiameterIdentity"/>
        </avp>
        <avp name="Destination-Realm" code="283" must="M">
            <data type="DiameterIdentity"/>
        </avp>
        <avp name="Auth-Application-Id" code="258" must="M">
            <data type="Unsigned32"/>
        </avp>
        <avp name="Acct-Application-Id" code="259" must="M">
            <data type="Unsigned32"/>
        </avp>
        <avp name="Vendor-Id" code="266" must="M">
            <data type="Unsigned32"/>
        </avp>
        <avp name="Product-Name" code="269">
            <data type="UTF8String"/>
        </avp>
        <avp name="Origin-State-Id" code="278">
            <data type="Unsigned32"/>
        </avp>
        <avp name="Host-IP-Address" code="257" must="M">
            <data type="Address"/>
        </avp>
        <avp name="Supported-Vendor-Id" code="265">
            <data type="Unsigned32"/>
        </avp>
        <avp name="Firmware-Revision" code="267">
            <data type="Unsigned32"/>
        </avp>
        <avp name="Result-Code" code="268" must="M">
            <data type="Unsigned32"/>
        </avp>
        <avp name="Error-Message" code="281">
            <data type="UTF8String"/>
        </avp>
        <avp name="Error-Reporting-Host" code="294">
            <data type="DiameterIdentity"/>
        </avp>
        <avp name="Disconnect-Cause" code="273" must="M">
            <data type="Enumerated">
                <item code="0" name="REBOOTING"/>
                <item code="1" name="BUSY"/>
                <item code="2" name="DO_NOT_WANT_TO_TALK_TO_YOU"/>
            </data>
        </avp>
        <avp name="Re-Auth-Request-Type" code="285" must="M">
            <data type="Enumerated">
                <item code="0" name="AUTHORIZE_ONLY"/>
                <item code="1" name="AUTHORIZE_AUTHENTICATE"/>
            </data>
        </avp>
        <avp name="Proxy-Info" code="284" must="M">
            <data type="Grouped">
                <rule avp="Proxy-Host" required="true"/>
                <rule avp="Proxy-State" required="true"/>
            </data>
        </avp>
        <avp name="Proxy-Host" code="280" must="M">
            <data type="DiameterIdentity"/>
        </avp>
        <avp name="Proxy-State" code="33" must="M">
            <data type="OctetString"/>
        </avp>
        <avp name="Subscription-Id" code="443" must="M" vendor-id="10415">
            <data type="Grouped">
                <rule avp="Subscription-Id-Type" required="true"/>
                <rule avp="Subscription-Id-Data" required="true"/>
            </data>
        </avp>
        <avp name="Subscription-Id-Type" code="450" must="M" vendor-id="10415">
            <data type="Enumerated">
                <item code="0" name="END_USER_E164"/>
                <item code="1" name="END_USER_IMSI"/>
                <item code="2" name="END_USER_SIP_URI"/>
                <item code="3" name="END_USER_NAI"/>
                <item code="4" name="END_USER_PRIVATE"/>
            </data>
        </avp>
        <avp name="Subscription-Id-Data" code="444" must="M" vendor-id="10415">
            <data type="UTF8String"/>
        </avp>
    </application>
    <application id="0" name="Base-CER">
        <command code="257" name="Capabilities-Exchange"/>
    </application>
    <application id="0" name="Base-DWR">
        <command code="280" name="Device-Watchdog"/>
    </application>
    <application id="0" name="Base-DPR">
        <command code="282" name="Disconnect-Peer"/>
    </application>
</diameter>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base_dict_resolves_avp_type() {
        let dict = Dictionary::new(&[BASE_DICT_XML]).unwrap();
        assert_eq!(dict.avp_type(None, 264), AvpType::Identity);
        assert_eq!(dict.avp_type(None, 268), AvpType::Unsigned32);
        assert_eq!(dict.avp_type(Some(10415), 443), AvpType::Grouped);
        assert_eq!(dict.avp_type(None, 999_999), AvpType::Unknown);
    }

    #[test]
    fn test_avp_by_name_round_trips_code() {
        let dict = Dictionary::new(&[BASE_DICT_XML]).unwrap();
        let entry = dict.avp_by_name("Origin-Host").unwrap();
        assert_eq!(entry.code, 264);
        assert!(entry.mandatory);
    }

    #[test]
    fn test_enum_name_resolution() {
        let dict = Dictionary::new(&[BASE_DICT_XML]).unwrap();
        assert_eq!(dict.enum_name(450, Some(10415), 1), Some("END_USER_IMSI"));
        assert_eq!(dict.enum_name(450, Some(10415), 99), None);
    }

    #[test]
    fn test_command_lookup() {
        let dict = Dictionary::new(&[BASE_DICT_XML]).unwrap();
        let cmd = dict.command_by_code(0, 257).unwrap();
        assert_eq!(cmd.name, "Capabilities-Exchange");
        assert_eq!(dict.command_by_name("Device-Watchdog").unwrap().code, 280);
    }

    #[test]
    fn test_grouped_allowed_children() {
        let dict = Dictionary::new(&[BASE_DICT_XML]).unwrap();
        let children = dict.allowed_children(Some(10415), 443);
        assert_eq!(children, &["Subscription-Id-Type", "Subscription-Id-Data"]);
    }

    #[test]
    fn test_vendor_extension_layered_on_base() {
        let extension = r#"
<diameter>
    <application id="16777251" name="Gx">
        <avp name="Custom-Vendor-Avp" code="9999" must="M" vendor-id="99999">
            <data type="OctetString"/>
        </avp>
    </application>
"#;
        let dict = Dictionary::new(&[BASE_DICT_XML, extension]).unwrap();
        assert_eq!(dict.avp_type(None, 264), AvpType::Identity);
        assert_eq!(dict.avp_type(Some(99999), 9999), AvpType::OctetString);
    }
}
