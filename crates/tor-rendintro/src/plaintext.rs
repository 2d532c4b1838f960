//! Decrypted INTRODUCE plaintexts.
//!
//! There are four formats.  The legacy one (which we call "v0") has no
//! version byte at all; the others start with one:
//!
//! ```text
//!   v0:  NICKNAME[20] COOKIE[20] HANDSHAKE
//!   v1:  01 DIGEST[42] COOKIE[20] HANDSHAKE
//!   v2:  02 IP[4] PORT[2] ID[20] KLEN[2] KEY[KLEN] COOKIE[20] HANDSHAKE
//!   v3:  03 ATYPE[1] (ALEN[2] ADATA[ALEN])? TS[4]
//!           IP[4] PORT[2] ID[20] KLEN[2] KEY[KLEN] COOKIE[20] HANDSHAKE
//! ```
//!
//! `NICKNAME` and `DIGEST` are NUL-padded.  The handshake data has no length
//! field; its length depends on the handshake in use, and must be supplied by
//! the caller.
//!
//! Since v0 has no version byte, a plaintext whose first byte is 1, 2, or 3
//! could be either kind.  We try the versioned format first, and fall back to
//! v0 if that fails and the length is exactly right for v0.

use caret::caret_int;
use std::fmt;
use std::net::Ipv4Addr;
use tor_bytes::{EncodeError, EncodeResult, Readable, Reader, SecretBuf, Writeable, Writer};
use tor_error::bad_api_usage;
use tor_llcrypto::pk::rsa::RsaIdentity;
use tracing::trace;

use crate::{
    DESC_COOKIE_LEN, Error, HEX_NICKNAME_FIELD_LEN, LEGACY_NICKNAME_FIELD_LEN, REND_COOKIE_LEN,
    Result,
};

caret_int! {
    /// The version byte at the start of a versioned INTRODUCE plaintext.
    ///
    /// The legacy format has no version byte, so it has no value here.
    pub struct IntroVersion(u8) {
        /// Rendezvous point named by its hex identity digest.
        V1 = 1,
        /// Rendezvous point given by address, identity, and onion key.
        V2 = 2,
        /// Like V2, with client authorization and a timestamp.
        V3 = 3,
    }
}

caret_int! {
    /// A kind of client authorization in a v3 INTRODUCE plaintext.
    pub struct IntroAuthType(u8) {
        /// No authorization: no length or data follows.
        NO_AUTH = 0,
        /// Basic authorization with a descriptor cookie.
        BASIC_AUTH = 1,
        /// Stealth authorization with a descriptor cookie.
        STEALTH_AUTH = 2,
    }
}

impl IntroAuthType {
    /// Return the length that authorization data of this type must have, if
    /// there is one.
    pub fn required_len(self) -> Option<u16> {
        match self {
            IntroAuthType::BASIC_AUTH | IntroAuthType::STEALTH_AUTH => Some(DESC_COOKIE_LEN as u16),
            _ => None,
        }
    }
}

/// A rendezvous cookie, chosen by the client to match up the two halves of a
/// rendezvous circuit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RendCookie([u8; REND_COOKIE_LEN]);

impl RendCookie {
    /// Return the bytes of this cookie.
    pub fn as_bytes(&self) -> &[u8; REND_COOKIE_LEN] {
        &self.0
    }
}

impl From<[u8; REND_COOKIE_LEN]> for RendCookie {
    fn from(value: [u8; REND_COOKIE_LEN]) -> Self {
        RendCookie(value)
    }
}

impl Readable for RendCookie {
    fn take_from(r: &mut Reader<'_>) -> tor_bytes::Result<Self> {
        Ok(RendCookie(r.extract()?))
    }
}

impl Writeable for RendCookie {
    fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) -> EncodeResult<()> {
        b.write_all(&self.0[..]);
        Ok(())
    }
}

/// A rendezvous point, as described in a v2 or v3 plaintext.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RendPointInfo {
    /// IPv4 address of the rendezvous point's OR port.
    addr: Ipv4Addr,
    /// The OR port.
    port: u16,
    /// The rendezvous point's RSA identity.
    identity: RsaIdentity,
    /// The rendezvous point's onion key, DER-encoded.
    onion_key: Vec<u8>,
}

impl RendPointInfo {
    /// Construct a new RendPointInfo.
    pub fn new(addr: Ipv4Addr, port: u16, identity: RsaIdentity, onion_key: Vec<u8>) -> Self {
        RendPointInfo {
            addr,
            port,
            identity,
            onion_key,
        }
    }
    /// Return the rendezvous point's IPv4 address.
    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }
    /// Return the rendezvous point's OR port.
    pub fn port(&self) -> u16 {
        self.port
    }
    /// Return the rendezvous point's RSA identity.
    pub fn identity(&self) -> &RsaIdentity {
        &self.identity
    }
    /// Return the rendezvous point's DER-encoded onion key.
    ///
    /// We don't check that this is a well-formed key.
    pub fn onion_key(&self) -> &[u8] {
        &self.onion_key[..]
    }

    /// Decode a RendPointInfo from a reader.
    fn take_from(r: &mut Reader<'_>) -> Result<Self> {
        let addr = r
            .extract::<Ipv4Addr>()
            .map_err(Error::truncated("rendezvous point address"))?;
        let port = r
            .take_u16()
            .map_err(Error::truncated("rendezvous point port"))?;
        let identity = r
            .extract::<RsaIdentity>()
            .map_err(Error::truncated("rendezvous point identity"))?;
        let key_len = r.take_u16().map_err(Error::truncated("onion key length"))?;
        let onion_key = r
            .take(key_len.into())
            .map_err(Error::truncated("onion key"))?
            .to_vec();
        Ok(RendPointInfo {
            addr,
            port,
            identity,
            onion_key,
        })
    }
}

impl Writeable for RendPointInfo {
    fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) -> EncodeResult<()> {
        b.write(&self.addr)?;
        b.write_u16(self.port);
        b.write(&self.identity)?;
        let mut w = b.write_nested_u16len();
        w.write_all(&self.onion_key[..]);
        w.finish()?;
        Ok(())
    }
}

/// Client authorization data from a v3 plaintext.
#[derive(Clone)]
pub struct IntroAuth {
    /// The kind of authorization.
    auth_type: IntroAuthType,
    /// The authorization data.
    data: SecretBuf,
}

impl fmt::Debug for IntroAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntroAuth")
            .field("auth_type", &self.auth_type)
            .field("len", &self.data.len())
            .finish_non_exhaustive()
    }
}

impl IntroAuth {
    /// Construct a new IntroAuth.
    pub fn new(auth_type: IntroAuthType, data: impl Into<SecretBuf>) -> Self {
        IntroAuth {
            auth_type,
            data: data.into(),
        }
    }
    /// Return the kind of authorization.
    pub fn auth_type(&self) -> IntroAuthType {
        self.auth_type
    }
    /// Return the authorization data.
    pub fn data(&self) -> &[u8] {
        &self.data[..]
    }

    /// Decode the (optional) authorization section of a v3 plaintext.
    fn take_from(r: &mut Reader<'_>) -> Result<Option<Self>> {
        let auth_type: IntroAuthType = r.take_u8().map_err(Error::truncated("auth type"))?.into();
        if auth_type == IntroAuthType::NO_AUTH {
            return Ok(None);
        }
        let len = r.take_u16().map_err(Error::truncated("auth length"))?;
        if let Some(expected) = auth_type.required_len() {
            if len != expected {
                return Err(Error::InvalidAuthLength {
                    auth_type,
                    len,
                    expected,
                });
            }
        }
        let data = r
            .take(len.into())
            .map_err(Error::truncated("auth data"))?;
        Ok(Some(IntroAuth::new(auth_type, data.to_vec())))
    }
}

impl Writeable for IntroAuth {
    fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) -> EncodeResult<()> {
        if self.auth_type == IntroAuthType::NO_AUTH {
            return Err(bad_api_usage!("Tried to encode NO_AUTH with authorization data").into());
        }
        if let Some(expected) = self.auth_type.required_len() {
            if self.data.len() != usize::from(expected) {
                return Err(EncodeError::BadLengthValue);
            }
        }
        b.write_u8(self.auth_type.into());
        let mut w = b.write_nested_u16len();
        w.write_all(&self.data[..]);
        w.finish()?;
        Ok(())
    }
}

/// Write `name` into a NUL-padded field of `field_len` bytes.
///
/// There must be room for at least one NUL.
fn write_padded<B: Writer + ?Sized>(b: &mut B, name: &[u8], field_len: usize) -> EncodeResult<()> {
    if name.len() >= field_len {
        return Err(EncodeError::BadLengthValue);
    }
    if name.contains(&0) {
        return Err(bad_api_usage!("Tried to encode a name containing NUL").into());
    }
    b.write_all(name);
    b.write_zeros(field_len - name.len());
    Ok(())
}

/// Read a NUL-padded field of `field_len` bytes, and return what comes before
/// the first NUL.
fn take_padded(r: &mut Reader<'_>, field_len: usize, field: &'static str) -> Result<Vec<u8>> {
    let raw = r.take(field_len).map_err(Error::truncated(field))?;
    let end = raw
        .iter()
        .position(|b| *b == 0)
        .ok_or(Error::TruncatedCell {
            field,
            problem: "no NUL terminator",
        })?;
    Ok(raw[..end].to_vec())
}

/// Read the cookie and handshake data that end every format, and make sure
/// nothing follows them.
fn take_tail(r: &mut Reader<'_>, handshake_len: usize) -> Result<(RendCookie, Vec<u8>)> {
    let cookie = r
        .extract::<RendCookie>()
        .map_err(Error::truncated("rendezvous cookie"))?;
    let handshake = r
        .take(handshake_len)
        .map_err(Error::truncated("handshake data"))?
        .to_vec();
    r.should_be_exhausted().map_err(|_| Error::TruncatedCell {
        field: "handshake data",
        problem: "trailing bytes",
    })?;
    Ok((cookie, handshake))
}

/// A legacy (unversioned) plaintext: the rendezvous point is named by its
/// nickname.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntroV0 {
    /// The rendezvous point's nickname, without padding.
    nickname: Vec<u8>,
    /// The rendezvous cookie.
    cookie: RendCookie,
    /// The client's handshake data.
    handshake: Vec<u8>,
}

impl IntroV0 {
    /// Construct a new IntroV0.
    pub fn new(nickname: impl Into<Vec<u8>>, cookie: RendCookie, handshake: Vec<u8>) -> Self {
        IntroV0 {
            nickname: nickname.into(),
            cookie,
            handshake,
        }
    }
    /// Return the rendezvous point's nickname.
    pub fn nickname(&self) -> &[u8] {
        &self.nickname[..]
    }

    /// Decode an IntroV0 from a whole plaintext.
    fn parse(plaintext: &[u8], handshake_len: usize) -> Result<Self> {
        let mut r = Reader::from_slice(plaintext);
        let nickname = take_padded(&mut r, LEGACY_NICKNAME_FIELD_LEN, "rendezvous point nickname")?;
        let (cookie, handshake) = take_tail(&mut r, handshake_len)?;
        Ok(IntroV0 {
            nickname,
            cookie,
            handshake,
        })
    }
}

impl Writeable for IntroV0 {
    fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) -> EncodeResult<()> {
        write_padded(b, &self.nickname, LEGACY_NICKNAME_FIELD_LEN)?;
        b.write(&self.cookie)?;
        b.write_all(&self.handshake[..]);
        Ok(())
    }
}

/// A v1 plaintext: the rendezvous point is named by its hex identity digest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntroV1 {
    /// The rendezvous point's name (usually `$` and 40 hex digits), without
    /// padding.
    rend_point: Vec<u8>,
    /// The rendezvous cookie.
    cookie: RendCookie,
    /// The client's handshake data.
    handshake: Vec<u8>,
}

impl IntroV1 {
    /// Construct a new IntroV1.
    pub fn new(rend_point: impl Into<Vec<u8>>, cookie: RendCookie, handshake: Vec<u8>) -> Self {
        IntroV1 {
            rend_point: rend_point.into(),
            cookie,
            handshake,
        }
    }
    /// Return the rendezvous point's name.
    pub fn rend_point(&self) -> &[u8] {
        &self.rend_point[..]
    }

    /// Decode an IntroV1 from the bytes after the version byte.
    fn take_from(r: &mut Reader<'_>, handshake_len: usize) -> Result<Self> {
        let rend_point = take_padded(r, HEX_NICKNAME_FIELD_LEN, "rendezvous point digest")?;
        let (cookie, handshake) = take_tail(r, handshake_len)?;
        Ok(IntroV1 {
            rend_point,
            cookie,
            handshake,
        })
    }
}

impl Writeable for IntroV1 {
    fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) -> EncodeResult<()> {
        b.write_u8(IntroVersion::V1.into());
        write_padded(b, &self.rend_point, HEX_NICKNAME_FIELD_LEN)?;
        b.write(&self.cookie)?;
        b.write_all(&self.handshake[..]);
        Ok(())
    }
}

/// A v2 plaintext: the rendezvous point is described in full.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntroV2 {
    /// The rendezvous point.
    rend_point: RendPointInfo,
    /// The rendezvous cookie.
    cookie: RendCookie,
    /// The client's handshake data.
    handshake: Vec<u8>,
}

impl IntroV2 {
    /// Construct a new IntroV2.
    pub fn new(rend_point: RendPointInfo, cookie: RendCookie, handshake: Vec<u8>) -> Self {
        IntroV2 {
            rend_point,
            cookie,
            handshake,
        }
    }
    /// Return the rendezvous point.
    pub fn rend_point(&self) -> &RendPointInfo {
        &self.rend_point
    }

    /// Decode an IntroV2 from the bytes after the version byte.
    fn take_from(r: &mut Reader<'_>, handshake_len: usize) -> Result<Self> {
        let rend_point = RendPointInfo::take_from(r)?;
        let (cookie, handshake) = take_tail(r, handshake_len)?;
        Ok(IntroV2 {
            rend_point,
            cookie,
            handshake,
        })
    }
}

impl Writeable for IntroV2 {
    fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) -> EncodeResult<()> {
        b.write_u8(IntroVersion::V2.into());
        b.write(&self.rend_point)?;
        b.write(&self.cookie)?;
        b.write_all(&self.handshake[..]);
        Ok(())
    }
}

/// A v3 plaintext: like v2, with optional client authorization and a
/// timestamp.
#[derive(Clone, Debug)]
pub struct IntroV3 {
    /// Client authorization, if any.
    auth: Option<IntroAuth>,
    /// The client's timestamp, in seconds since the epoch.
    ///
    /// Some clients send a rounded or zero value here.
    timestamp: u32,
    /// The rendezvous point.
    rend_point: RendPointInfo,
    /// The rendezvous cookie.
    cookie: RendCookie,
    /// The client's handshake data.
    handshake: Vec<u8>,
}

impl IntroV3 {
    /// Construct a new IntroV3.
    pub fn new(
        auth: Option<IntroAuth>,
        timestamp: u32,
        rend_point: RendPointInfo,
        cookie: RendCookie,
        handshake: Vec<u8>,
    ) -> Self {
        IntroV3 {
            auth,
            timestamp,
            rend_point,
            cookie,
            handshake,
        }
    }
    /// Return the client authorization, if any.
    pub fn auth(&self) -> Option<&IntroAuth> {
        self.auth.as_ref()
    }
    /// Return the timestamp.
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }
    /// Return the rendezvous point.
    pub fn rend_point(&self) -> &RendPointInfo {
        &self.rend_point
    }

    /// Decode an IntroV3 from the bytes after the version byte.
    fn take_from(r: &mut Reader<'_>, handshake_len: usize) -> Result<Self> {
        let auth = IntroAuth::take_from(r)?;
        let timestamp = r.take_u32().map_err(Error::truncated("timestamp"))?;
        let rend_point = RendPointInfo::take_from(r)?;
        let (cookie, handshake) = take_tail(r, handshake_len)?;
        Ok(IntroV3 {
            auth,
            timestamp,
            rend_point,
            cookie,
            handshake,
        })
    }
}

impl Writeable for IntroV3 {
    fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) -> EncodeResult<()> {
        b.write_u8(IntroVersion::V3.into());
        match &self.auth {
            Some(auth) => b.write(auth)?,
            None => b.write_u8(IntroAuthType::NO_AUTH.into()),
        }
        b.write_u32(self.timestamp);
        b.write(&self.rend_point)?;
        b.write(&self.cookie)?;
        b.write_all(&self.handshake[..]);
        Ok(())
    }
}

/// A decoded INTRODUCE plaintext, in any of its formats.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum IntroPlaintext {
    /// Legacy format.
    V0(IntroV0),
    /// Version 1.
    V1(IntroV1),
    /// Version 2.
    V2(IntroV2),
    /// Version 3.
    V3(IntroV3),
}

impl IntroPlaintext {
    /// Decode a plaintext, given the length of the handshake data it should
    /// end with.
    ///
    /// Every byte of `plaintext` must be accounted for.
    pub fn parse(plaintext: &[u8], handshake_len: usize) -> Result<Self> {
        let first = *plaintext.first().ok_or(Error::TruncatedCell {
            field: "version",
            problem: "not enough bytes",
        })?;
        // None if no legacy plaintext could have this handshake length.
        let legacy_len = (LEGACY_NICKNAME_FIELD_LEN + REND_COOKIE_LEN).checked_add(handshake_len);
        let is_legacy_len = legacy_len == Some(plaintext.len());
        let version = IntroVersion::from(first);

        if version.is_recognized() {
            match Self::parse_versioned(version, plaintext, handshake_len) {
                Ok(p) => Ok(p),
                Err(e) if is_legacy_len => {
                    trace!("Plaintext is not valid {}; trying legacy format", version);
                    IntroV0::parse(plaintext, handshake_len)
                        .map(IntroPlaintext::V0)
                        .or(Err(e))
                }
                Err(e) => Err(e),
            }
        } else if is_legacy_len {
            IntroV0::parse(plaintext, handshake_len).map(IntroPlaintext::V0)
        } else {
            Err(Error::UnsupportedVersion {
                version: first,
                len: plaintext.len(),
            })
        }
    }

    /// Decode a plaintext that starts with the recognized version byte
    /// `version`.
    fn parse_versioned(
        version: IntroVersion,
        plaintext: &[u8],
        handshake_len: usize,
    ) -> Result<Self> {
        let mut r = Reader::from_slice(plaintext);
        let _version = r.take_u8().map_err(Error::truncated("version"))?;
        Ok(match version {
            IntroVersion::V1 => IntroPlaintext::V1(IntroV1::take_from(&mut r, handshake_len)?),
            IntroVersion::V2 => IntroPlaintext::V2(IntroV2::take_from(&mut r, handshake_len)?),
            IntroVersion::V3 => IntroPlaintext::V3(IntroV3::take_from(&mut r, handshake_len)?),
            _ => {
                return Err(Error::UnsupportedVersion {
                    version: version.into(),
                    len: plaintext.len(),
                });
            }
        })
    }

    /// Return the version byte of this plaintext, or None for the legacy
    /// format.
    pub fn version(&self) -> Option<IntroVersion> {
        match self {
            IntroPlaintext::V0(_) => None,
            IntroPlaintext::V1(_) => Some(IntroVersion::V1),
            IntroPlaintext::V2(_) => Some(IntroVersion::V2),
            IntroPlaintext::V3(_) => Some(IntroVersion::V3),
        }
    }
    /// Return the rendezvous cookie.
    pub fn cookie(&self) -> &RendCookie {
        match self {
            IntroPlaintext::V0(p) => &p.cookie,
            IntroPlaintext::V1(p) => &p.cookie,
            IntroPlaintext::V2(p) => &p.cookie,
            IntroPlaintext::V3(p) => &p.cookie,
        }
    }
    /// Return the client's handshake data.
    pub fn handshake_data(&self) -> &[u8] {
        match self {
            IntroPlaintext::V0(p) => &p.handshake[..],
            IntroPlaintext::V1(p) => &p.handshake[..],
            IntroPlaintext::V2(p) => &p.handshake[..],
            IntroPlaintext::V3(p) => &p.handshake[..],
        }
    }
    /// Return the full description of the rendezvous point, if this format has
    /// one.
    pub fn rend_point_info(&self) -> Option<&RendPointInfo> {
        match self {
            IntroPlaintext::V0(_) | IntroPlaintext::V1(_) => None,
            IntroPlaintext::V2(p) => Some(&p.rend_point),
            IntroPlaintext::V3(p) => Some(&p.rend_point),
        }
    }
    /// Return the rendezvous point's name, if this format gives it by name.
    pub fn rend_point_name(&self) -> Option<&[u8]> {
        match self {
            IntroPlaintext::V0(p) => Some(p.nickname()),
            IntroPlaintext::V1(p) => Some(p.rend_point()),
            IntroPlaintext::V2(_) | IntroPlaintext::V3(_) => None,
        }
    }
}

impl Writeable for IntroPlaintext {
    fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) -> EncodeResult<()> {
        match self {
            IntroPlaintext::V0(p) => b.write(p),
            IntroPlaintext::V1(p) => b.write(p),
            IntroPlaintext::V2(p) => b.write(p),
            IntroPlaintext::V3(p) => b.write(p),
        }
    }
}
