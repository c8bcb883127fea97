//! The subset of an agent record that dependency checks need.

use serde::{Deserialize, Serialize};

/// An enrolled agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Agent {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub hash: String,
    /// Agent build version, e.g. `"1.4.2-rc1"`.
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub arch: String,
}

impl Agent {
    pub fn new(hash: &str, version: &str) -> Self {
        Self {
            hash: hash.to_string(),
            version: version.to_string(),
            ..Self::default()
        }
    }
}
