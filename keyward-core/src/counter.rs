//! Signature counter monotonicity.

use crate::error::{KeywardError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterVerdict {
    /// Presented counter is strictly greater than the stored one.
    Advanced,
    /// Authenticator reports zero and never has; nothing to compare.
    Unsupported,
    /// Stored counter is nonzero and the presented one did not exceed it.
    Regressed { stored: u32, presented: u32 },
}

/// Decides whether a counter regression aborts the ceremony or only
/// annotates the result.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureCounterPolicy {
    pub regression_is_fatal: bool,
}

impl SignatureCounterPolicy {
    pub fn new(regression_is_fatal: bool) -> Self {
        Self {
            regression_is_fatal,
        }
    }

    pub fn evaluate(&self, stored: u32, presented: u32) -> CounterVerdict {
        if stored == 0 && presented == 0 {
            CounterVerdict::Unsupported
        } else if stored != 0 && presented <= stored {
            CounterVerdict::Regressed { stored, presented }
        } else {
            CounterVerdict::Advanced
        }
    }

    /// Returns a warning string for a tolerated regression.
    pub fn enforce(&self, stored: u32, presented: u32) -> Result<(CounterVerdict, Option<String>)> {
        let verdict = self.evaluate(stored, presented);
        match verdict {
            CounterVerdict::Regressed { stored, presented } => {
                if self.regression_is_fatal {
                    return Err(KeywardError::CounterRegression { stored, presented });
                }
                tracing::warn!(stored, presented, "Signature counter did not advance");
                Ok((
                    verdict,
                    Some(format!(
                        "Signature counter did not advance (stored {}, presented {}); the authenticator may be cloned",
                        stored, presented
                    )),
                ))
            }
            _ => Ok((verdict, None)),
        }
    }
}
