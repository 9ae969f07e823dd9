use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A product does not have enough stock for the requested quantity.
    #[error("insufficient stock for product: {product}")]
    InsufficientStock { product: String },

    /// The product already has an assigned user.
    #[error("product already assigned to a user: {product}")]
    AlreadyAssigned { product: String },

    /// A stored value could not be interpreted.
    #[error("invalid stored value: {0}")]
    InvalidValue(String),

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Builds a `NotFound` error for the given entity and ID.
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
