#![feature(test)]

extern crate test;
use aaa_router::avp::{Avp, AvpValue};
use aaa_router::dictionary::{Dictionary, BASE_DICT_XML};
use aaa_router::{CommandFlags, DiameterHeader, DiameterMessage};
use std::io::Cursor;
use test::black_box;
use test::Bencher;

fn test_dict() -> Dictionary {
    Dictionary::new(&[BASE_DICT_XML]).unwrap()
}

fn cca_message(dict: &Dictionary) -> DiameterMessage {
    let mut message = DiameterMessage::new(
        272,
        4,
        CommandFlags {
            request: true,
            proxyable: true,
            error: false,
            retransmit: false,
        },
        1123158610,
        3102381851,
    );

    message.add_by_name(dict, "Origin-Host", "host.example.com".to_string().into()).unwrap();
    message.add_by_name(dict, "Origin-Realm", "realm.example.com".to_string().into()).unwrap();
    message.add_by_name(dict, "Session-Id", "ses;12345888".to_string().into()).unwrap();
    message.add_by_name(dict, "Result-Code", 2001i32.into()).unwrap();

    message
}

#[bench]
fn bench_encode_decode_header(b: &mut Bencher) {
    let dict = test_dict();
    let message = cca_message(&dict);
    let mut bytes = Vec::new();
    message.encode_to(&mut bytes).unwrap();

    b.iter(|| {
        let mut cursor = Cursor::new(&bytes);
        black_box(DiameterMessage::decode_from(&mut cursor, &dict).unwrap())
    });
}

#[bench]
fn bench_encode_message(b: &mut Bencher) {
    let dict = test_dict();
    let message = cca_message(&dict);

    let mut encoded = Vec::new();
    b.iter(|| {
        encoded.clear();
        black_box(message.encode_to(&mut encoded).unwrap());
    });
}

#[bench]
fn bench_decode_message(b: &mut Bencher) {
    let dict = test_dict();
    let message = cca_message(&dict);
    let mut bytes = Vec::new();
    message.encode_to(&mut bytes).unwrap();

    b.iter(|| {
        let mut cursor = Cursor::new(&bytes);
        black_box(DiameterMessage::decode_from(&mut cursor, &dict).unwrap())
    });
}

#[bench]
fn bench_avp_to_json(b: &mut Bencher) {
    let dict = test_dict();
    let avp = Avp::by_name(&dict, "Origin-Host", AvpValue::from("host.example.com".to_string())).unwrap();

    b.iter(|| black_box(avp.to_json(&dict)));
}

#[bench]
fn bench_header_encode_roundtrip(b: &mut Bencher) {
    let header = DiameterHeader {
        version: 1,
        flags: CommandFlags {
            request: true,
            proxyable: true,
            error: false,
            retransmit: false,
        },
        code: 272,
        application_id: 4,
        hop_by_hop_id: 1123158610,
        end_to_end_id: 3102381851,
    };
    let mut message = DiameterMessage {
        header,
        avps: Vec::new(),
    };

    let mut encoded = Vec::new();
    b.iter(|| {
        encoded.clear();
        black_box(message.encode_to(&mut encoded).unwrap());
        message.header.hop_by_hop_id = message.header.hop_by_hop_id.wrapping_add(1);
    });
}
