// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Process-wide HTTP connection pool shared by HTTP-speaking backends
//!
//! `reqwest::Client` keeps the keep-alive connections; a semaphore bounds how
//! many requests may be in flight against one backend at a time so that
//! concurrent requests queue instead of opening unbounded sockets.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::store::StoreError;

/// Pool sizing and timeouts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Maximum concurrent in-flight requests (and idle keep-alive connections)
    pub max_connections: usize,
    /// How long a request waits for a free slot
    pub acquire_timeout_ms: u64,
    /// TCP connect timeout
    pub connect_timeout_ms: u64,
    /// Idle keep-alive connections are closed after this long
    pub idle_timeout_ms: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 16,
            acquire_timeout_ms: 1_000,
            connect_timeout_ms: 2_000,
            idle_timeout_ms: 60_000,
        }
    }
}

impl PoolSettings {
    pub fn validate(&self, section: &str) -> Result<(), String> {
        if self.max_connections == 0 {
            return Err(format!("{}.pool.max_connections must be greater than 0", section));
        }
        if self.acquire_timeout_ms == 0 || self.connect_timeout_ms == 0 {
            return Err(format!("{}.pool timeouts must be greater than 0", section));
        }
        Ok(())
    }
}

/// Pool occupancy snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub max_connections: usize,
    pub in_use: usize,
    pub available: usize,
}

/// A checked-out slot; dropping it returns the slot to the pool
pub struct PooledClient {
    client: Client,
    _permit: OwnedSemaphorePermit,
}

impl PooledClient {
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Shared, cloneable HTTP pool
#[derive(Clone)]
pub struct HttpPool {
    client: Client,
    permits: Arc<Semaphore>,
    settings: PoolSettings,
}

impl HttpPool {
    /// Build the pool once at startup
    pub fn new(settings: PoolSettings) -> Result<Self, StoreError> {
        let client = Client::builder()
            .pool_max_idle_per_host(settings.max_connections)
            .pool_idle_timeout(Duration::from_millis(settings.idle_timeout_ms))
            .connect_timeout(Duration::from_millis(settings.connect_timeout_ms))
            .build()
            .map_err(|e| StoreError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            permits: Arc::new(Semaphore::new(settings.max_connections)),
            settings,
        })
    }

    /// Check out a slot, waiting at most `acquire_timeout_ms`
    pub async fn acquire(&self) -> Result<PooledClient, StoreError> {
        let wait = Duration::from_millis(self.settings.acquire_timeout_ms);
        let permit = tokio::time::timeout(wait, Arc::clone(&self.permits).acquire_owned())
            .await
            .map_err(|_| {
                StoreError::Transport(format!(
                    "connection pool exhausted ({} in use)",
                    self.settings.max_connections
                ))
            })?
            .map_err(|_| StoreError::Transport("connection pool closed".to_string()))?;

        Ok(PooledClient {
            client: self.client.clone(),
            _permit: permit,
        })
    }

    pub fn stats(&self) -> PoolStats {
        let available = self.permits.available_permits();
        PoolStats {
            max_connections: self.settings.max_connections,
            in_use: self.settings.max_connections.saturating_sub(available),
            available,
        }
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }
}
