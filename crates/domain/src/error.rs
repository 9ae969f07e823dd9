//! Domain error types.

use common::OrderId;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The submitted cart has no lines.
    #[error("the order must contain at least one item")]
    EmptyOrder,

    /// A line carries an unusable quantity.
    #[error("invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// The order does not exist, or the caller may not learn that it does.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// The caller is not allowed to perform this operation.
    #[error("access denied")]
    AccessDenied,

    /// An error occurred in the store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
