//! The storage trait implemented by the PostgreSQL and in-memory backends.

use async_trait::async_trait;
use common::{CategoryId, OrderId, ProductId, UserId};

use crate::error::Result;
use crate::model::{
    Category, NewProduct, NewUser, Order, OrderLine, OrderScope, OrderUpdate, Product,
    ProductFilter, User,
};

/// Persistent storage for the ordering portal.
///
/// All mutations are atomic per call. [`Store::place_order`] is the single
/// multi-step commit unit in the system: order row, item rows and stock
/// decrements succeed or fail together, and stock can never be driven below
/// zero by concurrent placements.
#[async_trait]
pub trait Store: Send + Sync {
    // -- Categories --

    /// Lists all categories, sorted by name.
    async fn list_categories(&self) -> Result<Vec<Category>>;

    /// Loads a category by ID.
    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>>;

    /// Creates a category with the given name.
    async fn create_category(&self, name: &str) -> Result<Category>;

    // -- Products --

    /// Lists products matching the filter, sorted by name.
    async fn list_products(&self, filter: ProductFilter) -> Result<Vec<Product>>;

    /// Loads a product by ID.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Creates a product.
    async fn create_product(&self, input: NewProduct) -> Result<Product>;

    /// Replaces a product's fields. Fails with `NotFound` if absent.
    async fn update_product(&self, id: ProductId, input: NewProduct) -> Result<Product>;

    /// Deletes a product. Lines of existing orders keep their quantity but
    /// lose the product reference.
    async fn delete_product(&self, id: ProductId) -> Result<()>;

    // -- Users --

    /// Loads a user by ID.
    async fn get_user(&self, id: UserId) -> Result<Option<User>>;

    /// Creates a user (seeding and tests; no HTTP surface).
    async fn create_user(&self, input: NewUser) -> Result<User>;

    /// Lists all admin users, sorted by email.
    async fn list_admins(&self) -> Result<Vec<User>>;

    // -- Orders --

    /// Atomically creates an order with its lines and decrements the stock of
    /// every referenced product.
    ///
    /// Fails with `NotFound` if a referenced product does not exist and with
    /// `InsufficientStock` (naming the product) if any line exceeds the
    /// available stock; in both cases nothing is persisted.
    async fn place_order(
        &self,
        user_id: UserId,
        lines: &[OrderLine],
        notes: Option<String>,
    ) -> Result<Order>;

    /// Loads a fully hydrated order by ID.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Lists orders in the given scope, newest first.
    async fn list_orders(&self, scope: OrderScope) -> Result<Vec<Order>>;

    /// Applies a partial update (status and/or notes) to an order.
    async fn update_order(&self, id: OrderId, update: OrderUpdate) -> Result<Order>;

    /// Deletes an order and its lines.
    async fn delete_order(&self, id: OrderId) -> Result<()>;

    // -- Assignments --

    /// Assigns a product to a user. Fails with `AlreadyAssigned` if the
    /// product has an assignee; the check and the write are one atomic step.
    async fn assign_product(&self, product_id: ProductId, user_id: UserId) -> Result<()>;

    /// Removes a product's assignment. Fails with `NotFound` when no
    /// assignment exists.
    async fn unassign_product(&self, product_id: ProductId) -> Result<()>;

    // -- Settings --

    /// Reads a setting value.
    async fn get_setting(&self, key: &str) -> Result<Option<String>>;

    /// Writes a setting value, inserting or overwriting.
    async fn set_setting(&self, key: &str, value: &str) -> Result<()>;
}
