//! OIDC token cache.
//!
//! A small on-disk key/value file mapping API URL to a cached bearer token. The OIDC
//! device-authorisation flow that populates it is an external collaborator; this module
//! only owns the cache's read/write contract, which the core does consume.

use std::{collections::HashMap, path::Path};

use crate::error::{Error, Result};

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct TokenCache(HashMap<String, String>);

impl TokenCache {
    pub fn load(path: &Path) -> Result<TokenCache> {
        match std::fs::read_to_string(path) {
            Ok(data) => serde_json::from_str(&data).map_err(|e| Error::RegistryDecode(e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TokenCache::default()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(&self.0).map_err(Error::RegistryDecode)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    pub fn get(&self, api_url: &str) -> Option<&str> {
        self.0.get(api_url).map(String::as_str)
    }

    pub fn set(&mut self, api_url: impl Into<String>, token: impl Into<String>) {
        self.0.insert(api_url.into(), token.into());
    }
}
