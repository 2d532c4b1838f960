#![cfg_attr(docsrs, feature(doc_auto_cfg, doc_cfg))]
#![doc = include_str!("../README.md")]
// @@ begin lint list maintained by maint/add_warning @@
#![cfg_attr(not(ci_arti_stable), allow(renamed_and_removed_lints))]
#![cfg_attr(not(ci_arti_nightly), allow(unknown_lints))]
#![warn(missing_docs)]
#![warn(noop_method_call)]
#![warn(unreachable_pub)]
#![warn(clippy::all)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::cargo_common_metadata)]
#![deny(clippy::cast_lossless)]
#![deny(clippy::checked_conversions)]
#![warn(clippy::cognitive_complexity)]
#![deny(clippy::debug_assert_with_mut_call)]
#![deny(clippy::exhaustive_enums)]
#![deny(clippy::exhaustive_structs)]
#![deny(clippy::expl_impl_clone_on_copy)]
#![deny(clippy::fallible_impl_from)]
#![deny(clippy::implicit_clone)]
#![deny(clippy::large_stack_arrays)]
#![warn(clippy::manual_ok_or)]
#![deny(clippy::missing_docs_in_private_items)]
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_pass_by_value)]
#![warn(clippy::option_option)]
#![deny(clippy::print_stderr)]
#![deny(clippy::print_stdout)]
#![warn(clippy::rc_buffer)]
#![deny(clippy::ref_option_ref)]
#![warn(clippy::semicolon_if_nothing_returned)]
#![warn(clippy::trait_duplication_in_bounds)]
#![deny(clippy::unchecked_duration_subtraction)]
#![deny(clippy::unnecessary_wraps)]
#![warn(clippy::unseparated_literal_suffix)]
#![deny(clippy::unwrap_used)]
#![allow(clippy::let_unit_value)] // This can reasonably be done for explicitness
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::significant_drop_in_scrutinee)] // arti/-/merge_requests/588/#note_2812945
#![allow(clippy::result_large_err)] // temporary workaround for arti#587
#![allow(clippy::needless_raw_string_hashes)] // complained-about code is fine, often best
#![allow(clippy::needless_lifetimes)] // See arti#1765
//! <!-- @@ end lint list maintained by maint/add_warning @@ -->

pub mod config;
mod err;
pub mod hybrid;
mod pipeline;
pub mod plaintext;
mod request;

pub use config::{IntroCellType, IntroParseConfig, IntroParseConfigBuilder};
pub use err::{DecryptError, Error};
pub use hybrid::{HybridDecrypt, RsaHybridKey, RsaHybridPublicKey, encode_intro_cell};
pub use pipeline::IntroParser;
pub use plaintext::{
    IntroAuth, IntroAuthType, IntroPlaintext, IntroV0, IntroV1, IntroV2, IntroV3, IntroVersion,
    RendCookie, RendPointInfo,
};
pub use request::IntroRequest;

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Length of the key digest at the start of an INTRODUCE cell.
///
/// This is the SHA1 digest of the DER-encoded public key of the service (or
/// of its introduction point key) that can decrypt the cell.
pub const DIGEST_LEN: usize = tor_llcrypto::pk::rsa::RSA_ID_LEN;

/// Length of a rendezvous cookie.
pub const REND_COOKIE_LEN: usize = 20;

/// Length of the handshake data for the TAP (DH-1024) handshake.
///
/// This is the default expected handshake length.
pub const DH1024_KEY_LEN: usize = 128;

/// Length of the fixed-width nickname field in a v0 plaintext, including the
/// NUL terminator.
pub const LEGACY_NICKNAME_FIELD_LEN: usize = 20;

/// Length of the fixed-width rendezvous point field in a v1 plaintext
/// (`$` plus 40 hex digits, plus the NUL terminator).
pub const HEX_NICKNAME_FIELD_LEN: usize = 42;

/// Length of a descriptor cookie, as used for basic and stealth
/// authorization in a v3 plaintext.
pub const DESC_COOKIE_LEN: usize = 16;

/// Largest number of bytes a relay message body can hold.
pub const RELAY_PAYLOAD_SIZE: usize = 498;
