//! Request signatures: content addresses for calculation results.
//!
//! A signature is the BLAKE3 digest of the canonical JSON text of a
//! calculation request whose template has been versioned first. The JSON
//! is produced through `serde_json::Value`, whose object map keeps keys
//! sorted, so two requests that differ only in map construction order hash
//! identically.
//!
//! The digest algorithm and the canonical layout are part of the cache
//! format. Changing either invalidates every stored entry.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use dataflow_core::{
    version_template, CalculationRequest, ModuleIndex, ModuleRegistry, NodeConfig, ReturnType,
    Template,
};

use crate::error::CacheError;

/// Number of hex characters in a signature.
pub const SIGNATURE_LEN: usize = 64;

/// Lowercase hex digest identifying one calculation request.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Signature(String);

impl Signature {
    /// Accepts a stored signature string if it has the digest shape.
    pub fn parse(s: &str) -> Option<Signature> {
        let valid = s.len() == SIGNATURE_LEN
            && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        valid.then(|| Signature(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_hash(hash: blake3::Hash) -> Signature {
        Signature(hash.to_hex().to_string())
    }
}

impl TryFrom<String> for Signature {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Signature::parse(&s).ok_or_else(|| format!("malformed signature '{s}'"))
    }
}

impl From<Signature> for String {
    fn from(sig: Signature) -> String {
        sig.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The object that is serialized and hashed.
#[derive(Serialize)]
struct CanonicalRequest<'a> {
    method: &'static str,
    template: &'a Template,
    config: &'a BTreeMap<ModuleIndex, NodeConfig>,
    node: ModuleIndex,
    terminal: &'a str,
    return_type: ReturnType,
    export_type: Option<&'a str>,
    concatenate: bool,
}

/// Canonical JSON text of `request` after versioning its template against
/// `registry`.
pub fn canonical_json(
    request: &CalculationRequest,
    registry: &ModuleRegistry,
) -> Result<String, CacheError> {
    let versioned = version_template(&request.template, registry);
    let canonical = CanonicalRequest {
        method: "calculate",
        template: &versioned,
        config: &request.config,
        node: request.node,
        terminal: &request.terminal,
        return_type: request.return_type,
        export_type: request.export_type.as_deref(),
        concatenate: request.concatenate,
    };
    // Round-trip through Value to sort keys at every depth.
    let value = serde_json::to_value(&canonical)?;
    Ok(serde_json::to_string(&value)?)
}

/// Computes the signature of `request`.
pub fn compute_signature(
    request: &CalculationRequest,
    registry: &ModuleRegistry,
) -> Result<Signature, CacheError> {
    let text = canonical_json(request, registry)?;
    Ok(Signature::from_hash(blake3::hash(text.as_bytes())))
}
