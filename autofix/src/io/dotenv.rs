//! `.env` secrets lookup.
//!
//! The file is read into a map once at startup. Nothing is written back into
//! the process environment; lookups consult the real environment first so an
//! exported variable always wins over the file.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DotEnv {
    vars: HashMap<String, String>,
}

impl DotEnv {
    /// Load `path`. A missing file yields an empty set.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), ".env not found");
            return Ok(Self::default());
        }
        let vars = dotenvy::from_path_iter(path)
            .and_then(|iter| iter.collect::<Result<HashMap<_, _>, _>>())
            .with_context(|| format!("read {}", path.display()))?;
        let env = Self { vars };
        debug!(path = %path.display(), keys = env.vars.len(), ".env loaded");
        Ok(env)
    }

    /// Process environment first, then the file.
    pub fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .or_else(|| self.vars.get(key).cloned())
    }
}
