//! Cluster registry HTTP client.
//!
//! The registry itself — authentication, OIDC, request shaping — is an out-of-scope
//! external collaborator; this module only specifies the three calls the core consumes,
//! behind a trait so pipeline tests never perform real network I/O.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct ClusterFacts {
    pub id: String,
    pub tenant_id: String,
    pub display_name: String,
    #[serde(default)]
    pub facts: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub dynamic_facts: serde_json::Map<String, serde_json::Value>,
    pub catalog_repo_url: String,
    pub config_repo_url: Option<String>,
    pub config_repo_revision: Option<String>,
    pub global_repo_url: Option<String>,
    pub global_repo_revision: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TenantFacts {
    pub id: String,
    pub display_name: String,
    pub global_repo_url: Option<String>,
    pub config_repo_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClusterSummary {
    pub id: String,
    pub display_name: String,
}

/// The three registry calls the core consumes.
pub trait RegistryClient: Send + Sync {
    fn fetch_cluster(&self, cluster_id: &str) -> Result<ClusterFacts>;
    fn fetch_tenant(&self, tenant_id: &str) -> Result<TenantFacts>;
    fn list_clusters(&self) -> Result<Vec<ClusterSummary>>;
}

/// `reqwest`-backed implementation of [`RegistryClient`].
pub struct HttpRegistryClient {
    base_url: String,
    token: String,
    client: reqwest::blocking::Client,
}

impl HttpRegistryClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::Registry)?;
        Ok(HttpRegistryClient {
            base_url: base_url.into(),
            token: token.into(),
            client,
        })
    }

    fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .map_err(Error::Registry)?
            .error_for_status()
            .map_err(Error::Registry)?;
        response.json::<T>().map_err(Error::Registry)
    }
}

impl RegistryClient for HttpRegistryClient {
    fn fetch_cluster(&self, cluster_id: &str) -> Result<ClusterFacts> {
        self.get(&format!("clusters/{cluster_id}"))
    }

    fn fetch_tenant(&self, tenant_id: &str) -> Result<TenantFacts> {
        self.get(&format!("tenants/{tenant_id}"))
    }

    fn list_clusters(&self) -> Result<Vec<ClusterSummary>> {
        self.get("clusters/")
    }
}

/// [`RegistryClient`] that always fails; used when `--local` means the registry is
/// never meant to be consulted, so any call into it is a programming error rather than
/// a silently wrong answer.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRegistryClient;

impl RegistryClient for NullRegistryClient {
    fn fetch_cluster(&self, cluster_id: &str) -> Result<ClusterFacts> {
        Err(Error::NotFound(cluster_id.to_string()))
    }

    fn fetch_tenant(&self, tenant_id: &str) -> Result<TenantFacts> {
        Err(Error::NotFound(tenant_id.to_string()))
    }

    fn list_clusters(&self) -> Result<Vec<ClusterSummary>> {
        Err(Error::MissingApiCredentials)
    }
}


#[cfg(test)]
mod tests {
    use super::fake::FakeRegistryClient;
    use super::*;

    #[test]
    fn fake_client_round_trips_cluster_facts() {
        let mut fake = FakeRegistryClient::default();
        fake.clusters.insert(
            "c-test".into(),
            ClusterFacts {
                id: "c-test".into(),
                tenant_id: "t-test".into(),
                display_name: "Test Cluster".into(),
                facts: Default::default(),
                dynamic_facts: Default::default(),
                catalog_repo_url: "https://example.com/catalog.git".into(),
                config_repo_url: None,
                config_repo_revision: None,
                global_repo_url: None,
                global_repo_revision: None,
            },
        );

        let facts = fake.fetch_cluster("c-test").unwrap();
        assert_eq!(facts.tenant_id, "t-test");
    }

    #[test]
    fn fake_client_errors_on_unknown_cluster() {
        let fake = FakeRegistryClient::default();
        assert!(fake.fetch_cluster("nope").is_err());
    }
}
