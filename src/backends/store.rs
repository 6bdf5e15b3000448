// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Raw store transport seam
//!
//! A `StoreClient` knows how to translate one payload into one call against
//! its data store. Deadlines, retries and result classification live in
//! `StoreAdapter`, so clients stay thin.

use async_trait::async_trait;
use thiserror::Error;

use crate::rag::types::{BackendKind, SubQueryPayload};

/// One (text, score) pair as returned by a store
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    pub text: String,
    pub score: f32,
}

impl RawHit {
    pub fn new(text: impl Into<String>, score: f32) -> Self {
        Self {
            text: text.into(),
            score,
        }
    }
}

/// Errors raised by store transports
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    /// Connection refused/reset, I/O failure, pool exhaustion, gateway errors
    #[error("Transport error: {0}")]
    Transport(String),

    /// The store refused the request (malformed query, auth failure, bad response)
    #[error("Rejected by backend: {0}")]
    Rejected(String),

    /// Query text could not be embedded
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// The payload does not belong to this store
    #[error("Payload for {actual} sent to {expected} backend")]
    PayloadMismatch {
        expected: BackendKind,
        actual: BackendKind,
    },
}

impl StoreError {
    /// Whether one more attempt may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transport(_))
    }

    /// Classify a reqwest failure
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            StoreError::Transport(err.to_string())
        } else {
            StoreError::Rejected(err.to_string())
        }
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = if body.is_empty() {
            format!("HTTP {}", status.as_u16())
        } else {
            format!("HTTP {}: {}", status.as_u16(), truncate(body, 200))
        };

        match status.as_u16() {
            502..=504 => StoreError::Transport(message),
            _ => StoreError::Rejected(message),
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

/// Transport for one data store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Backend this client serves
    fn kind(&self) -> BackendKind;

    /// Execute one translated query, returning hits in store ranking order
    async fn fetch(&self, payload: &SubQueryPayload) -> Result<Vec<RawHit>, StoreError>;

    /// Cheap liveness probe
    async fn ping(&self) -> Result<(), StoreError>;
}
