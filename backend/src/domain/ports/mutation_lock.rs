//! Port abstraction for the per-key stampede lock.
//!
//! The lock serializes concurrent first executions of the same idempotency
//! key: one caller proceeds, the rest are told to retry shortly. It is a
//! best-effort guard (the record store's uniqueness constraint remains the
//! final backstop), so lock failures degrade to lock-less execution rather
//! than failing the request.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{IdempotencyKey, PrincipalId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by mutation lock adapters.
    pub enum MutationLockError {
        /// Lock backend connection could not be established.
        Connection { message: String } => "mutation lock connection failed: {message}",
        /// Lock command failed during execution.
        Command { message: String } => "mutation lock command failed: {message}",
    }
}

/// Result of a lock acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAcquisition {
    /// This caller now holds the lock.
    Acquired,
    /// Another request already holds the lock for this key.
    Held,
}

/// Port for the stampede lock guarding first executions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MutationLock: Send + Sync {
    /// Attempt to acquire the lock for a key.
    ///
    /// Acquisition is atomic set-if-absent with the given expiry; the holder
    /// identity is stored for diagnostics. Never blocks waiting for the
    /// lock.
    async fn acquire(
        &self,
        key: &IdempotencyKey,
        holder: &PrincipalId,
        ttl: Duration,
    ) -> Result<LockAcquisition, MutationLockError>;

    /// Release the lock for a key.
    ///
    /// The delete is unconditional; if it fails, the TTL bounds how long the
    /// key stays blocked.
    async fn release(&self, key: &IdempotencyKey) -> Result<(), MutationLockError>;
}

/// Lock that always grants acquisition.
///
/// Used when no distributed lock backend is configured; execution proceeds
/// lock-less and relies on store-level uniqueness.
#[derive(Debug, Default)]
pub struct NoOpMutationLock;

#[async_trait]
impl MutationLock for NoOpMutationLock {
    async fn acquire(
        &self,
        _key: &IdempotencyKey,
        _holder: &PrincipalId,
        _ttl: Duration,
    ) -> Result<LockAcquisition, MutationLockError> {
        Ok(LockAcquisition::Acquired)
    }

    async fn release(&self, _key: &IdempotencyKey) -> Result<(), MutationLockError> {
        Ok(())
    }
}
