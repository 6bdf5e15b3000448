// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Relational store client (PostgreSQL via sqlx)
//!
//! Rows whose text column matches any query term are returned, scored by
//! the fraction of terms they contain.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder, Row};
use std::time::Duration;
use tracing::debug;

use super::store::{RawHit, StoreClient, StoreError};
use crate::rag::types::{BackendKind, SubQueryPayload};

/// Accepts `name` or `schema.name` made of `[A-Za-z_][A-Za-z0-9_]*` parts
pub fn is_valid_identifier(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() <= 2
        && parts.iter().all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

/// Escape LIKE metacharacters and wrap in `%...%`
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn classify(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Io(e) => StoreError::Transport(e.to_string()),
        sqlx::Error::PoolTimedOut => StoreError::Transport("connection pool timed out".to_string()),
        sqlx::Error::Tls(e) => StoreError::Transport(e.to_string()),
        other => StoreError::Rejected(other.to_string()),
    }
}

/// Keyword retrieval over one table
pub struct RelationalStoreClient {
    pool: PgPool,
    table: String,
    text_column: String,
}

impl RelationalStoreClient {
    /// Create a lazily-connecting pool; no connection is opened until first use
    pub fn connect_lazy(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
        table: String,
        text_column: String,
    ) -> Result<Self, StoreError> {
        if !is_valid_identifier(&table) || !is_valid_identifier(&text_column) {
            return Err(StoreError::Rejected(format!(
                "invalid table or column name: {}.{}",
                table, text_column
            )));
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(database_url)
            .map_err(|e| StoreError::Rejected(format!("invalid database URL: {}", e)))?;

        Ok(Self {
            pool,
            table,
            text_column,
        })
    }

    /// Build the scored keyword query
    fn build_query<'a>(&self, terms: &'a [String], limit: usize) -> QueryBuilder<'a, Postgres> {
        let col = &self.text_column;
        let mut qb = QueryBuilder::new(format!("SELECT {}::text AS text, (", col));

        for (i, term) in terms.iter().enumerate() {
            if i > 0 {
                qb.push(" + ");
            }
            qb.push(format!("(CASE WHEN {} ILIKE ", col));
            qb.push_bind(like_pattern(term));
            qb.push(" THEN 1 ELSE 0 END)");
        }

        qb.push(format!(")::float4 / {} AS score FROM {} WHERE ", terms.len(), self.table));

        for (i, term) in terms.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push(format!("{} ILIKE ", col));
            qb.push_bind(like_pattern(term));
        }

        qb.push(" ORDER BY score DESC LIMIT ");
        qb.push_bind(limit as i64);
        qb
    }
}

#[async_trait]
impl StoreClient for RelationalStoreClient {
    fn kind(&self) -> BackendKind {
        BackendKind::Relational
    }

    async fn fetch(&self, payload: &SubQueryPayload) -> Result<Vec<RawHit>, StoreError> {
        let (terms, limit) = match payload {
            SubQueryPayload::Relational { terms, limit } => (terms, *limit),
            other => {
                return Err(StoreError::PayloadMismatch {
                    expected: BackendKind::Relational,
                    actual: other.backend(),
                })
            }
        };
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = self.build_query(terms, limit);
        let rows = qb.build().fetch_all(&self.pool).await.map_err(classify)?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            let text: Option<String> = row.try_get("text").map_err(classify)?;
            let score: f32 = row.try_get("score").map_err(classify)?;
            if let Some(text) = text {
                hits.push(RawHit::new(text, score));
            }
        }

        debug!("Relational store returned {} rows from {}", hits.len(), self.table);
        Ok(hits)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(classify)
    }
}
