//! Configuration for handling INTRODUCE cells.

use std::fmt;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use tor_config::{ConfigBuildError, impl_standard_builder};

use crate::{DH1024_KEY_LEN, DIGEST_LEN, RELAY_PAYLOAD_SIZE};

/// Which kind of INTRODUCE cell we are handling.
///
/// The formats are the same; this only affects how we describe the cell.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum IntroCellType {
    /// A cell from a client to an introduction point.
    Introduce1,
    /// A cell from an introduction point to a service.
    #[default]
    Introduce2,
}

impl fmt::Display for IntroCellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntroCellType::Introduce1 => write!(f, "INTRODUCE1"),
            IntroCellType::Introduce2 => write!(f, "INTRODUCE2"),
        }
    }
}

/// Configuration for an [`IntroParser`](crate::IntroParser).
///
/// This type is immutable once constructed.  To build one, use
/// [`IntroParseConfigBuilder`], or deserialize it.
#[derive(Debug, Clone, Builder, Eq, PartialEq)]
#[builder(build_fn(error = "ConfigBuildError", validate = "Self::validate"))]
#[builder(derive(Debug, Serialize, Deserialize))]
pub struct IntroParseConfig {
    /// Length of the handshake data at the end of every plaintext.
    ///
    /// The default suits the TAP handshake.
    #[builder(default = "DH1024_KEY_LEN")]
    pub(crate) handshake_len: usize,

    /// Largest raw cell that we will try to decrypt.
    #[builder(default = "RELAY_PAYLOAD_SIZE")]
    pub(crate) max_cell_len: usize,

    /// Which kind of cell this is.
    #[builder(default)]
    pub(crate) cell_type: IntroCellType,
}
impl_standard_builder! { IntroParseConfig }

impl IntroParseConfigBuilder {
    /// Builder helper: check whether the options in this builder are consistent.
    fn validate(&self) -> Result<(), ConfigBuildError> {
        if let Some(len) = self.handshake_len {
            if !(1..=RELAY_PAYLOAD_SIZE).contains(&len) {
                return Err(ConfigBuildError::Invalid {
                    field: "handshake_len".into(),
                    problem: format!("Out of range 1..={}", RELAY_PAYLOAD_SIZE),
                });
            }
        }
        if let Some(len) = self.max_cell_len {
            if len <= DIGEST_LEN {
                return Err(ConfigBuildError::Invalid {
                    field: "max_cell_len".into(),
                    problem: format!("Must be more than {}", DIGEST_LEN),
                });
            }
        }
        Ok(())
    }
}

impl IntroParseConfig {
    /// Return the expected handshake data length.
    pub fn handshake_len(&self) -> usize {
        self.handshake_len
    }
    /// Return the largest raw cell we accept.
    pub fn max_cell_len(&self) -> usize {
        self.max_cell_len
    }
    /// Return the kind of cell we handle.
    pub fn cell_type(&self) -> IntroCellType {
        self.cell_type
    }
}
