// Tests for handling legacy INTRODUCE cells, using plaintexts of every version.
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unwrap_used)]

use std::net::Ipv4Addr;

use hex_literal::hex;
use rsa::rand_core::OsRng;
use tor_bytes::Writer as _;
use tor_rendintro::{
    DecryptError, Error, HybridDecrypt as _, IntroAuthType, IntroPlaintext, IntroRequest,
    IntroVersion, RsaHybridKey, encode_intro_cell,
};

const SERVICE_KEY: &str = include_str!("../testdata/service_key.pem");
const OTHER_KEY: &str = include_str!("../testdata/other_key.pem");
/// A v0 cell encrypted to `SERVICE_KEY` by OpenSSL, with a fixed symmetric key.
const V0_CELL: &[u8] = include_bytes!("../testdata/v0_cell.bin");

const HS_LEN: usize = 128;
const LEGACY_LEN: usize = 20 + 20 + HS_LEN;

const COOKIE: [u8; 20] = hex!("000102030405060708090a0b0c0d0e0f10111213");
const RP_ID: [u8; 20] = hex!("000102030405060708090a0b0c0d0e0f10111213");
const TIMESTAMP: [u8; 4] = hex!("500bb5aa");
const AUTH_DATA: [u8; 16] = hex!("000102030405060708090a0b0c0d0e0f");

/// The onion key from the v2 and v3 vectors.
fn onion_key() -> Vec<u8> {
    let mut s = "
        30818902818100b1cd46a918d20f01f8b2ada479b4bb4bf4541e3f0354cf7cb6
        b5f0feed4b7dd761db6dd919e27204aa3e892614629a6c110b35992c9f2c64a1
        d9e288cef654fe1d375e6d73955490f07bfad444acb2239f7536e278628280a4
        2322c9bfc436d131338e64b4a974a1cb428d60c7bb8e6e0f36748ef408990692
        b13fb3ddedf7c90203010001"
        .to_string();
    s.retain(|c| !c.is_whitespace());
    let key = hex::decode(s).unwrap();
    assert_eq!(key.len(), 140);
    key
}

fn handshake() -> Vec<u8> {
    let pattern = hex!(
        "000102030405060708090a0b0c0d0e0f"
        "0f0e0d0c0b0a09080706050403020100"
    );
    pattern.repeat(4)
}

/// Address, port, identity, and onion key, as used in v2 and v3.
fn rend_point_block() -> Vec<u8> {
    let mut v = hex!("c0a80001 235a").to_vec();
    v.extend_from_slice(&RP_ID);
    v.extend_from_slice(&hex!("008c"));
    v.extend_from_slice(&onion_key());
    v
}

fn with_tail(mut v: Vec<u8>) -> Vec<u8> {
    v.extend_from_slice(&COOKIE);
    v.extend_from_slice(&handshake());
    v
}

fn v0() -> Vec<u8> {
    let mut v = b"Nickname".to_vec();
    v.resize(20, 0);
    with_tail(v)
}

fn v1() -> Vec<u8> {
    let mut v = vec![0x01];
    v.extend_from_slice(b"$000102030405060708090A0B0C0D0E0F10111213\0");
    with_tail(v)
}

fn v2() -> Vec<u8> {
    let mut v = vec![0x02];
    v.extend_from_slice(&rend_point_block());
    with_tail(v)
}

fn v3_no_auth() -> Vec<u8> {
    let mut v = vec![0x03, 0x00];
    v.extend_from_slice(&TIMESTAMP);
    v.extend_from_slice(&rend_point_block());
    with_tail(v)
}

fn v3_basic_auth() -> Vec<u8> {
    let mut v = hex!("03 01 0010").to_vec();
    v.extend_from_slice(&AUTH_DATA);
    v.extend_from_slice(&TIMESTAMP);
    v.extend_from_slice(&rend_point_block());
    with_tail(v)
}

fn all_vectors() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        ("v0", v0()),
        ("v1", v1()),
        ("v2", v2()),
        ("v3 no auth", v3_no_auth()),
        ("v3 basic auth", v3_basic_auth()),
    ]
}

fn service_key() -> RsaHybridKey {
    RsaHybridKey::from_pem(SERVICE_KEY).unwrap()
}

fn encrypt(plaintext: &[u8]) -> Vec<u8> {
    encode_intro_cell(&service_key().to_public_key(), &mut OsRng, plaintext).unwrap()
}

/// Run every phase on `plaintext`, and return the finished request.
fn full_pipeline(plaintext: &[u8]) -> IntroRequest {
    let key = service_key();
    let mut req = IntroRequest::begin_parse(&encrypt(plaintext), HS_LEN).unwrap();
    req.decrypt(&key).unwrap();
    req.parse_plaintext().unwrap();
    req
}

fn encode(p: &IntroPlaintext) -> Vec<u8> {
    let mut v = Vec::new();
    v.write(p).unwrap();
    v
}

#[test]
fn vector_lengths() {
    assert_eq!(v0().len(), LEGACY_LEN);
    assert_eq!(v1().len(), 191);
    assert_eq!(v2().len(), 317);
    assert_eq!(v3_no_auth().len(), 322);
    assert_eq!(v3_basic_auth().len(), 340);
}

#[test]
fn early_parse() {
    let key = service_key();
    for (name, pt) in all_vectors() {
        let cell = encrypt(&pt);
        let req = IntroRequest::begin_parse(&cell, HS_LEN).unwrap();
        assert_eq!(req.key_digest(), &key.key_digest(), "{}", name);
        assert_eq!(req.ciphertext(), &cell[20..], "{}", name);
        assert!(req.plaintext().is_none());
        assert!(req.parsed().is_none());
        assert!(req.diagnostic_message().is_none());
    }
}

#[test]
fn decrypt_only() {
    let key = service_key();
    for (name, pt) in all_vectors() {
        let mut req = IntroRequest::begin_parse(&encrypt(&pt), HS_LEN).unwrap();
        req.decrypt(&key).unwrap();
        assert_eq!(req.plaintext().unwrap(), &pt[..], "{}", name);
        assert!(req.parsed().is_none());
        assert!(req.diagnostic_message().is_none());
    }
}

#[test]
fn late_parse() {
    for (name, pt) in all_vectors() {
        let req = full_pipeline(&pt);
        let parsed = req.parsed().unwrap();
        assert_eq!(parsed.cookie().as_bytes(), &COOKIE, "{}", name);
        assert_eq!(parsed.handshake_data(), &handshake()[..], "{}", name);
        // Every field survives: re-encoding gives back the same plaintext.
        assert_eq!(encode(parsed), pt, "{}", name);
    }
}

#[test]
fn fields() {
    let req = full_pipeline(&v0());
    let p = req.parsed().unwrap();
    assert!(p.version().is_none());
    assert_eq!(p.rend_point_name().unwrap(), b"Nickname");

    let req = full_pipeline(&v1());
    let p = req.parsed().unwrap();
    assert_eq!(p.version(), Some(IntroVersion::V1));
    assert_eq!(
        p.rend_point_name().unwrap(),
        b"$000102030405060708090A0B0C0D0E0F10111213"
    );
    assert!(p.rend_point_info().is_none());

    let req = full_pipeline(&v2());
    let p = req.parsed().unwrap();
    assert_eq!(p.version(), Some(IntroVersion::V2));
    let info = p.rend_point_info().unwrap();
    assert_eq!(info.addr(), Ipv4Addr::new(192, 168, 0, 1));
    assert_eq!(info.port(), 9050);
    assert_eq!(info.identity().as_bytes(), &RP_ID);
    assert_eq!(info.onion_key(), &onion_key()[..]);
    assert_eq!(info.onion_key().len(), 140);

    let req = full_pipeline(&v3_no_auth());
    let IntroPlaintext::V3(p) = req.parsed().unwrap() else {
        panic!("not v3");
    };
    assert!(p.auth().is_none());
    assert_eq!(p.timestamp(), 0x500bb5aa);
    assert_eq!(p.rend_point().port(), 9050);

    let req = full_pipeline(&v3_basic_auth());
    let IntroPlaintext::V3(p) = req.parsed().unwrap() else {
        panic!("not v3");
    };
    let auth = p.auth().unwrap();
    assert_eq!(auth.auth_type(), IntroAuthType::BASIC_AUTH);
    assert_eq!(auth.data(), &AUTH_DATA);
    assert_eq!(p.timestamp(), 0x500bb5aa);
    assert_eq!(p.rend_point().onion_key(), &onion_key()[..]);
}

#[test]
fn known_cell() {
    // This cell was not made by our own encryption code.
    let mut req = IntroRequest::begin_parse(V0_CELL, HS_LEN).unwrap();
    req.decrypt(&service_key()).unwrap();
    assert_eq!(req.plaintext().unwrap(), &v0()[..]);
    req.parse_plaintext().unwrap();
    let p = req.parsed().unwrap();
    assert_eq!(p.rend_point_name().unwrap(), b"Nickname");
    assert_eq!(p.cookie().as_bytes(), &COOKIE);
}

#[test]
fn idempotent_parse() {
    for (name, pt) in all_vectors() {
        let mut req = full_pipeline(&pt);
        let before = encode(req.parsed().unwrap());
        req.parse_plaintext().unwrap();
        req.parse_plaintext().unwrap();
        assert_eq!(encode(req.parsed().unwrap()), before, "{}", name);
        assert!(req.diagnostic_message().is_none());
    }
}

/// Return the offsets at which each field of `name`'s plaintext ends.
fn field_ends(name: &str) -> Vec<usize> {
    // version, address, port, identity, key length, key
    let v2_block = [1, 5, 7, 27, 29, 169];
    let mut ends = match name {
        "v0" => vec![20],
        "v1" => vec![1, 43],
        "v2" => v2_block.to_vec(),
        // version, auth type, timestamp, then the v2 block.
        "v3 no auth" => [1, 2, 6]
            .into_iter()
            .chain(v2_block[1..].iter().map(|e| e + 5))
            .collect(),
        // version, auth type, auth length, auth data, timestamp, then the v2 block.
        "v3 basic auth" => [1, 2, 4, 20, 24]
            .into_iter()
            .chain(v2_block[1..].iter().map(|e| e + 23))
            .collect(),
        _ => panic!("unknown vector {}", name),
    };
    let last = *ends.last().unwrap();
    ends.push(last + 20);
    ends.push(last + 20 + HS_LEN);
    ends
}

#[test]
fn truncation() {
    for (name, pt) in all_vectors().into_iter().skip(1) {
        let ends = field_ends(name);
        assert_eq!(*ends.last().unwrap(), pt.len(), "{}", name);
        for end in ends {
            let short = &pt[..end - 1];
            if short.len() == LEGACY_LEN {
                // Ambiguous; see below.
                continue;
            }
            let e = IntroPlaintext::parse(short, HS_LEN).unwrap_err();
            assert!(
                matches!(e, Error::TruncatedCell { .. }),
                "{} cut to {}: {:?}",
                name,
                end - 1,
                e
            );
        }

        let mut long = pt.clone();
        long.push(0);
        let e = IntroPlaintext::parse(&long, HS_LEN).unwrap_err();
        assert!(matches!(
            e,
            Error::TruncatedCell {
                problem: "trailing bytes",
                ..
            }
        ));
    }
}

#[test]
fn truncated_through_pipeline() {
    let key = service_key();
    let pt = v3_basic_auth();
    let mut req = IntroRequest::begin_parse(&encrypt(&pt[..pt.len() - 1]), HS_LEN).unwrap();
    req.decrypt(&key).unwrap();
    let e = req.parse_plaintext().unwrap_err();
    assert!(matches!(
        e,
        Error::TruncatedCell {
            field: "handshake data",
            ..
        }
    ));
    assert!(req.parsed().is_none());
    assert!(req.diagnostic_message().unwrap().contains("handshake data"));
}

#[test]
fn legacy_ambiguity() {
    // A v2 plaintext cut to exactly the legacy length is a valid legacy
    // plaintext: its first 20 bytes contain a NUL.
    let pt = v2();
    let p = IntroPlaintext::parse(&pt[..LEGACY_LEN], HS_LEN).unwrap();
    assert!(p.version().is_none());
    assert_eq!(p.rend_point_name().unwrap(), &hex!("02c0a8")[..]);

    // A legacy plaintext cut short has no recognizable version.
    let pt = v0();
    for end in field_ends("v0") {
        let e = IntroPlaintext::parse(&pt[..end - 1], HS_LEN).unwrap_err();
        assert!(matches!(e, Error::UnsupportedVersion { version: b'N', .. }));
    }
}

#[test]
fn bad_auth_len() {
    for len in [15_u16, 17] {
        let mut pt = v3_basic_auth();
        pt[2..4].copy_from_slice(&len.to_be_bytes());
        if len == 15 {
            pt.remove(4);
        } else {
            pt.insert(4, 0xff);
        }
        let key = service_key();
        let mut req = IntroRequest::begin_parse(&encrypt(&pt), HS_LEN).unwrap();
        req.decrypt(&key).unwrap();
        let e = req.parse_plaintext().unwrap_err();
        assert!(matches!(
            e,
            Error::InvalidAuthLength {
                auth_type: IntroAuthType::BASIC_AUTH,
                expected: 16,
                ..
            }
        ));
        assert!(req.diagnostic_message().unwrap().contains("authorization"));
    }
}

#[test]
fn wrong_key() {
    let other = RsaHybridKey::from_pem(OTHER_KEY).unwrap();
    for (name, pt) in all_vectors() {
        let cell = encrypt(&pt);
        let mut req = IntroRequest::begin_parse(&cell, HS_LEN).unwrap();
        let e = req.decrypt(&other).unwrap_err();
        assert!(matches!(e, Error::DecryptionFailed(_)), "{}", name);
        assert!(req.plaintext().is_none());

        // Even if the cell lies about which key it is for.
        let mut lying = other.key_digest().as_bytes().to_vec();
        lying.extend_from_slice(&cell[20..]);
        let mut req = IntroRequest::begin_parse(&lying, HS_LEN).unwrap();
        let e = req.decrypt(&other).unwrap_err();
        assert!(
            matches!(e, Error::DecryptionFailed(DecryptError::PkDecrypt)),
            "{}",
            name
        );
        assert!(req.plaintext().is_none());
        assert!(req.diagnostic_message().is_some());
    }
}

#[test]
fn truncated_ciphertext() {
    let cell = encrypt(&v0());
    let mut req = IntroRequest::begin_parse(&cell[..20 + 127], HS_LEN).unwrap();
    let e = req.decrypt(&service_key()).unwrap_err();
    assert!(matches!(
        e,
        Error::DecryptionFailed(DecryptError::TruncatedPkPart {
            len: 127,
            key_len: 128
        })
    ));
}

#[test]
fn unsupported_versions() {
    let pt = v2();
    for version in 0x04..=0xff_u8 {
        let mut pt = pt.clone();
        pt[0] = version;
        let e = IntroPlaintext::parse(&pt, HS_LEN).unwrap_err();
        assert!(
            matches!(e, Error::UnsupportedVersion { version: v, len: 317 } if v == version),
            "{:#x}",
            version
        );
    }

    // Through the whole pipeline, for one of them.
    let mut pt = v1();
    pt[0] = 0x42;
    let mut req = IntroRequest::begin_parse(&encrypt(&pt), HS_LEN).unwrap();
    req.decrypt(&service_key()).unwrap();
    assert!(matches!(
        req.parse_plaintext(),
        Err(Error::UnsupportedVersion { version: 0x42, .. })
    ));
}

#[test]
fn candidate_keys() {
    let key = service_key();
    let other = RsaHybridKey::from_pem(OTHER_KEY).unwrap();
    let keys = [other, key];
    let mut req = IntroRequest::begin_parse(&encrypt(&v2()), HS_LEN).unwrap();
    let used = req.decrypt_with_candidates(&keys).unwrap();
    assert_eq!(used.key_digest(), keys[1].key_digest());
    req.parse_plaintext().unwrap();
    assert_eq!(req.parsed().unwrap().version(), Some(IntroVersion::V2));
}
