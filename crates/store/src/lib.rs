//! Persistence layer for the ordering portal.
//!
//! Exposes the [`Store`] trait with two implementations: [`PostgresStore`]
//! backed by `sqlx`, and [`InMemoryStore`] for tests and demo mode. Both
//! uphold the same contract, most importantly that order placement is a
//! single atomic unit and that product stock never goes negative.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use model::{
    Category, EMAIL_NOTIFICATIONS, NewProduct, NewUser, Order, OrderItem, OrderLine, OrderScope,
    OrderUpdate, OrderedProduct, Product, ProductFilter, User, UserSummary,
};
pub use postgres::PostgresStore;
pub use store::Store;
