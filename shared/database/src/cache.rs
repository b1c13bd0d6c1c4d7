//! Analysis Cache
//!
//! Fused results in Redis, keyed by the SHA-256 of the document bytes so a
//! re-uploaded file is not sent through the model channels again.

use anyhow::{Context, Result};
use lexbid_models::FusedResult;
use redis::AsyncCommands;
use sha2::{Digest, Sha256};

use crate::redis::RedisPool;

/// Hex SHA-256 of the document content.
pub fn content_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[derive(Clone)]
pub struct AnalysisCache {
    connection: RedisPool,
    prefix: String,
    ttl_seconds: u64,
}

impl AnalysisCache {
    pub fn new(connection: RedisPool, prefix: impl Into<String>, ttl_seconds: u64) -> Self {
        Self {
            connection,
            prefix: prefix.into(),
            ttl_seconds,
        }
    }

    pub fn key(&self, hash: &str) -> String {
        format!("{}{}", self.prefix, hash)
    }

    pub async fn get(&self, hash: &str) -> Result<Option<FusedResult>> {
        let mut connection = self.connection.clone();
        let raw: Option<String> = connection
            .get(self.key(hash))
            .await
            .context("Failed to read analysis cache")?;

        match raw {
            Some(json) => match serde_json::from_str(&json) {
                Ok(fused) => Ok(Some(fused)),
                Err(e) => {
                    // Stale shape from an older release; treat as a miss.
                    tracing::warn!(hash, error = %e, "Discarding unreadable cached analysis");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    pub async fn put(&self, hash: &str, fused: &FusedResult) -> Result<()> {
        let json = serde_json::to_string(fused)?;
        let mut connection = self.connection.clone();
        redis::cmd("SET")
            .arg(self.key(hash))
            .arg(json)
            .arg("EX")
            .arg(self.ttl_seconds)
            .query_async::<_, ()>(&mut connection)
            .await
            .context("Failed to write analysis cache")?;
        Ok(())
    }
}
