// SPDX-License-Identifier: Apache-2.0

//! Errors raised by the tenant registry.

/// Errors returned by [`crate::TenantRegistry`] operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The caller referenced a tenant id the registry no longer has (or
    /// never had).
    #[error("unknown tenant id {0:?}")]
    UnknownTenant(crate::TenantId),

    /// A weight of zero or less was rejected; weights must be positive to
    /// take part in the multiplicative `total_weight` aggregate.
    #[error("tenant weight must be positive, got {0}")]
    NonPositiveWeight(i64),

    /// The core list passed to registration or a weight update was empty.
    #[error("tenant must be bound to at least one core")]
    NoCoresBound,
}
