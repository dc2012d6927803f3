//! Self-describing serialisation of sampled ensembles.
//!
//! The document captures tree topology, split rules, leaf values, and the
//! hyperparameter history of the retained draws. Encoding is JSON through
//! serde, with fields emitted in struct order, so the output is a
//! deterministic function of the sampler state and round-trips exactly.

use serde::{Deserialize, Serialize};

use crate::ensemble::SampleContainer;
use crate::error::XBartError;
use crate::suffstats::LeafModelKind;

/// Current document format version.
pub const FORMAT_VERSION: u32 = 1;

/// Serialisable snapshot of a sampling run's retained draws.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleDocument {
    /// Document format version.
    pub format_version: u32,
    /// Leaf model the ensembles were sampled under.
    pub leaf_model: LeafModelKind,
    /// Retained ensembles with their σ² and leaf-scale histories.
    pub samples: SampleContainer,
}

impl SampleDocument {
    /// Builds a document from a container of retained draws.
    pub fn new(leaf_model: LeafModelKind, samples: &SampleContainer) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            leaf_model,
            samples: samples.clone(),
        }
    }
}

/// Encodes a document as JSON.
pub fn to_json(document: &SampleDocument) -> Result<String, XBartError> {
    Ok(serde_json::to_string(document)?)
}

/// Decodes a document from JSON.
pub fn from_json(json: &str) -> Result<SampleDocument, XBartError> {
    Ok(serde_json::from_str(json)?)
}
