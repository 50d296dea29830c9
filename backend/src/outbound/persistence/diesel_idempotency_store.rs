//! PostgreSQL-backed `IdempotencyStore` implementation using Diesel.
//!
//! This adapter is the durable tier of the idempotency gateway. It stores the
//! captured response alongside the payload fingerprint so a replayed request
//! can be answered without re-executing the mutation, and it is the tier that
//! survives cache restarts.
//!
//! # TTL enforcement
//!
//! Lookups do not filter by expiry; the gateway checks `expires_at` itself and
//! evicts lazily, so a stale row behaves like a miss. `sweep_expired` deletes
//! the rows outright and runs from a periodic background task.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::debug;

use crate::domain::ports::{IdempotencyStore, IdempotencyStoreError};
use crate::domain::{
    CapturedResponse, IdempotencyKey, IdempotencyRecord, PayloadFingerprint, PrincipalId,
};

use super::diesel_helpers::{
    is_closed_connection, is_unique_violation, map_diesel_error_message, map_pool_error_message,
};
use super::models::{IdempotencyRecordRow, NewIdempotencyRecordRow};
use super::pool::{DbPool, PoolError};
use super::schema::idempotency_records;

/// Diesel-backed implementation of the `IdempotencyStore` port.
#[derive(Clone)]
pub struct DieselIdempotencyStore {
    pool: DbPool,
}

impl DieselIdempotencyStore {
    /// Create a new store with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Map pool errors to idempotency store errors.
fn map_pool_error(error: PoolError) -> IdempotencyStoreError {
    IdempotencyStoreError::connection(map_pool_error_message(error))
}

/// Map Diesel errors to idempotency store errors.
fn map_diesel_error(error: diesel::result::Error, operation: &str) -> IdempotencyStoreError {
    if is_unique_violation(&error) {
        return IdempotencyStoreError::duplicate_key(
            "an idempotency record already exists for this key",
        );
    }
    if is_closed_connection(&error) {
        return IdempotencyStoreError::connection("database connection closed");
    }
    IdempotencyStoreError::query(map_diesel_error_message(error, operation))
}

/// Rebuild a domain record from a database row.
///
/// Rows are written from validated domain values, so decode failures here
/// indicate external tampering or data corruption and map to serialization
/// errors rather than panics.
fn row_to_record(row: IdempotencyRecordRow) -> Result<IdempotencyRecord, IdempotencyStoreError> {
    let key = IdempotencyKey::from_uuid(row.key).map_err(|err| {
        IdempotencyStoreError::serialization(format!(
            "corrupted idempotency key in database: {err}"
        ))
    })?;
    let fingerprint = PayloadFingerprint::from_hex(&row.fingerprint_hex).map_err(|err| {
        IdempotencyStoreError::serialization(format!(
            "corrupted payload fingerprint in database: {err}"
        ))
    })?;
    let status = u16::try_from(row.response_status).map_err(|_| {
        IdempotencyStoreError::serialization(format!(
            "stored response status {} is out of range",
            row.response_status
        ))
    })?;
    Ok(IdempotencyRecord {
        key,
        principal: PrincipalId::from_uuid(row.principal_id),
        fingerprint,
        response: CapturedResponse::new(status, row.response_content_type, row.response_body),
        created_at: row.created_at,
        expires_at: row.expires_at,
    })
}

#[async_trait]
impl IdempotencyStore for DieselIdempotencyStore {
    async fn find(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<IdempotencyRecord>, IdempotencyStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row = idempotency_records::table
            .filter(idempotency_records::key.eq(key.as_uuid()))
            .select(IdempotencyRecordRow::as_select())
            .first::<IdempotencyRecordRow>(&mut conn)
            .await
            .optional()
            .map_err(|err| map_diesel_error(err, "find idempotency record"))?;

        row.map(row_to_record).transpose()
    }

    async fn insert(&self, record: &IdempotencyRecord) -> Result<(), IdempotencyStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let response_status = i16::try_from(record.response.status).map_err(|_| {
            IdempotencyStoreError::serialization(format!(
                "response status {} does not fit the storage column",
                record.response.status
            ))
        })?;
        let fingerprint_hex = record.fingerprint.to_hex();
        let new_row = NewIdempotencyRecordRow {
            key: *record.key.as_uuid(),
            principal_id: *record.principal.as_uuid(),
            fingerprint_hex: &fingerprint_hex,
            response_status,
            response_content_type: &record.response.content_type,
            response_body: &record.response.body,
            created_at: record.created_at,
            expires_at: record.expires_at,
        };

        diesel::insert_into(idempotency_records::table)
            .values(&new_row)
            .execute(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "insert idempotency record"))?;

        Ok(())
    }

    async fn remove(&self, key: &IdempotencyKey) -> Result<(), IdempotencyStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        diesel::delete(
            idempotency_records::table.filter(idempotency_records::key.eq(key.as_uuid())),
        )
        .execute(&mut conn)
        .await
        .map_err(|err| map_diesel_error(err, "remove idempotency record"))?;

        Ok(())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, IdempotencyStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let deleted = diesel::delete(
            idempotency_records::table.filter(idempotency_records::expires_at.le(now)),
        )
        .execute(&mut conn)
        .await
        .map_err(|err| map_diesel_error(err, "sweep expired idempotency records"))?;

        if deleted > 0 {
            debug!(deleted, "swept expired idempotency records");
        }

        Ok(deleted as u64)
    }
}
