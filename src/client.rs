//! # Client Facade
//!
//! Purpose: The top-level entry point wrapping a [`Pool`] with the
//! operations callers reach for directly (ping, bucket-type properties)
//! plus a [`Client::bucket`] constructor for everything bucket-scoped.
//! Generalizes `hkv-client::KVClient`'s role as the crate's one public
//! facade type.
//!
//! ## Design Principles
//! 1. **Thin Facade**: `Client` owns nothing but a `Pool`; every real
//!    operation lives in its dedicated module and is reachable either
//!    through `Client` directly or through `Client::bucket(..)`.
//! 2. **Config In, Pool Out**: `Client::connect` is the only place a
//!    [`ClientConfig`] is consumed; everything downstream works in terms of
//!    a `Pool`.

use std::time::Duration;

use crate::bucket::Bucket;
use crate::codec::BucketProps;
use crate::error::RiakResult;
use crate::pool::Pool;

/// Environment variable consulted by [`ClientConfig::from_env`] (spec §6).
pub const RIAK_PB_URL_VAR: &str = "RIAK_PB_URL";

/// Fixed per-request server-side timeout applied when a request doesn't
/// specify its own (spec §6).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(500);

/// Connection parameters for a [`Client`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub nodes: Vec<String>,
    pub client_id: Option<Vec<u8>>,
}

impl ClientConfig {
    pub fn new(nodes: Vec<String>) -> Self {
        ClientConfig {
            nodes,
            client_id: None,
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<Vec<u8>>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Builds a config from the `RIAK_PB_URL` environment variable, which
    /// may hold a comma-separated list of `host:port` node addresses.
    pub fn from_env() -> RiakResult<Self> {
        let raw = std::env::var(RIAK_PB_URL_VAR)
            .map_err(|_| crate::error::RiakError::Unavail)?;
        let nodes = raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();
        if nodes.is_empty() {
            return Err(crate::error::RiakError::Unavail);
        }
        Ok(ClientConfig::new(nodes))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig::new(vec!["127.0.0.1:8087".to_string()])
    }
}

/// The client's top-level handle: a pooled connection to a cluster's nodes.
#[derive(Clone)]
pub struct Client {
    pool: Pool,
}

impl Client {
    /// Resolves every node address and dials a startup probe connection.
    pub async fn connect(config: ClientConfig) -> RiakResult<Self> {
        let pool = Pool::connect(&config.nodes, config.client_id).await?;
        Ok(Client { pool })
    }

    /// A bucket-scoped facade over this client's pool.
    pub fn bucket(&self, name: impl Into<Vec<u8>>) -> Bucket {
        Bucket::new(self.pool.clone(), name.into())
    }

    /// Confirms at least one node is reachable.
    pub async fn ping(&self) -> RiakResult<()> {
        let mut conn = self.pool.acquire().await?;
        let result = conn.ping().await;
        match result {
            Ok(()) => {
                self.pool.release_ok(conn).await;
                Ok(())
            }
            Err(err) => {
                self.pool.release_err(conn).await;
                Err(err)
            }
        }
    }

    pub async fn get_bucket_type_properties(&self, type_name: &[u8]) -> RiakResult<BucketProps> {
        crate::bucket::get_bucket_type_properties(&self.pool, type_name).await
    }

    pub async fn set_bucket_type_properties(
        &self,
        type_name: &[u8],
        props: &BucketProps,
    ) -> RiakResult<()> {
        crate::bucket::set_bucket_type_properties(&self.pool, type_name, props).await
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Closes the underlying pool. Safe to call once the client is no
    /// longer needed; subsequent operations fail with `RiakError::Closed`.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_splits_comma_separated_nodes() {
        std::env::set_var(RIAK_PB_URL_VAR, "10.0.0.1:8087, 10.0.0.2:8087");
        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config.nodes, vec!["10.0.0.1:8087", "10.0.0.2:8087"]);
        std::env::remove_var(RIAK_PB_URL_VAR);
    }

    #[test]
    fn default_config_has_one_local_node() {
        let config = ClientConfig::default();
        assert_eq!(config.nodes, vec!["127.0.0.1:8087"]);
    }
}
