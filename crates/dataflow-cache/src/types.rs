//! Stored cache records.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use dataflow_core::CalcResult;

use crate::signature::Signature;

/// One cached calculation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub signature: Signature,
    /// Creation time in milliseconds since the Unix epoch.
    pub created_at: i64,
    pub value: CalcResult,
}

impl CacheEntry {
    /// An entry created now.
    pub fn new(signature: Signature, value: CalcResult) -> Self {
        CacheEntry {
            signature,
            created_at: now_millis(),
            value,
        }
    }
}

/// Milliseconds since the Unix epoch; clocks set before 1970 read as 0.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Cutoff timestamp for entries older than `age`, relative to now.
pub fn horizon_millis(age: Duration) -> i64 {
    let age = i64::try_from(age.as_millis()).unwrap_or(i64::MAX);
    now_millis().saturating_sub(age)
}
