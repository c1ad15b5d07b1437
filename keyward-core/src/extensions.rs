//! Extension output containment checks.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{KeywardError, Result};

/// Where an extension output was reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionLocation {
    Client,
    Authenticator,
}

impl fmt::Display for ExtensionLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client => f.write_str("client"),
            Self::Authenticator => f.write_str("authenticator"),
        }
    }
}

/// Both output sets must be subsets of the requested identifiers.
pub fn validate_extensions(
    requested: &BTreeSet<String>,
    client_outputs: &BTreeSet<String>,
    authenticator_outputs: &BTreeSet<String>,
) -> Result<()> {
    check_subset(requested, client_outputs, ExtensionLocation::Client)?;
    check_subset(requested, authenticator_outputs, ExtensionLocation::Authenticator)
}

fn check_subset(
    requested: &BTreeSet<String>,
    outputs: &BTreeSet<String>,
    location: ExtensionLocation,
) -> Result<()> {
    let unrequested: Vec<String> = outputs.difference(requested).cloned().collect();
    if unrequested.is_empty() {
        return Ok(());
    }
    Err(KeywardError::UnrequestedExtension {
        location,
        ids: unrequested,
        requested: requested.iter().cloned().collect(),
    })
}
