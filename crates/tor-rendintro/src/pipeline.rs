//! Run the whole INTRODUCE cell pipeline under a configuration.

use safelog::Redactable as _;
use tor_error::ErrorReport as _;
use tracing::debug;

use crate::{Error, HybridDecrypt, IntroParseConfig, IntroRequest, Result};

/// Handles INTRODUCE cells from start to finish.
///
/// This frames, decrypts, and decodes each cell, using whichever of a set of
/// candidate keys the cell names.  Callers that want to stop partway through
/// should use [`IntroRequest`] directly.
#[derive(Debug, Clone)]
pub struct IntroParser {
    /// Our configuration.
    config: IntroParseConfig,
}

impl IntroParser {
    /// Construct a new IntroParser.
    pub fn new(config: IntroParseConfig) -> Self {
        IntroParser { config }
    }

    /// Return the configuration for this parser.
    pub fn config(&self) -> &IntroParseConfig {
        &self.config
    }

    /// Check the size of `cell` and split it into digest and ciphertext.
    pub fn begin(&self, cell: &[u8]) -> Result<IntroRequest> {
        if cell.len() > self.config.max_cell_len {
            let e = Error::MalformedCell("longer than the largest allowed cell");
            debug!(
                "Rejected {} of {} bytes: {}",
                self.config.cell_type,
                cell.len(),
                e.report()
            );
            return Err(e);
        }
        IntroRequest::begin_parse(cell, self.config.handshake_len).inspect_err(|e| {
            debug!("Rejected {}: {}", self.config.cell_type, e.report());
        })
    }

    /// Frame, decrypt, and decode `cell`, using whichever of `keys` it names.
    ///
    /// On success, the returned request has a decoded plaintext.
    pub fn parse_cell<'k, K, I>(&self, cell: &[u8], keys: I) -> Result<IntroRequest>
    where
        K: HybridDecrypt + ?Sized + 'k,
        I: IntoIterator<Item = &'k K>,
    {
        let mut request = self.begin(cell)?;
        let outcome = request
            .decrypt_with_candidates(keys)
            .map(|_| ())
            .and_then(|()| request.parse_plaintext());
        match outcome {
            Ok(()) => {
                debug!(
                    "Accepted {} for {} ({:?})",
                    self.config.cell_type,
                    request.key_digest().redacted(),
                    request.parsed().map(|p| p.version())
                );
                Ok(request)
            }
            Err(e) => {
                debug!(
                    "Rejected {} for {}: {}",
                    self.config.cell_type,
                    request.key_digest().redacted(),
                    e.report()
                );
                Err(e)
            }
        }
    }
}
