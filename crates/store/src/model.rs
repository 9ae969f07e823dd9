//! Entity models persisted by the store.

use chrono::{DateTime, Utc};
use common::{CategoryId, Money, OrderId, OrderItemId, OrderStatus, ProductId, Role, UserId};
use serde::{Deserialize, Serialize};

/// Storage key of the setting that gates order-placed email notifications.
///
/// The value `"true"` enables the dispatcher; anything else disables it.
pub const EMAIL_NOTIFICATIONS: &str = "email_notifications";

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// A short user description embedded in other entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub name: Option<String>,
    pub email: String,
}

/// A portal user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
}

impl User {
    /// Returns the summary form embedded in products and orders.
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Input for creating a user (seeding and tests; there is no user CRUD API).
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
}

/// A catalog product with its category and optional assigned user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub reference: Option<String>,
    pub supplier_ref: Option<String>,
    pub description: Option<String>,
    pub price: Money,
    /// Units available to order. Never negative after any committed operation.
    pub stock: i32,
    pub category: Category,
    /// The single user this product is restricted to, if any.
    pub assigned_user: Option<UserSummary>,
}

/// Input for creating or fully updating a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub reference: Option<String>,
    pub supplier_ref: Option<String>,
    pub description: Option<String>,
    pub price: Money,
    pub stock: i32,
    pub category_id: CategoryId,
}

/// Filters applied when listing products.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Case-insensitive match against name, reference and description.
    pub search: Option<String>,
    pub category: Option<CategoryId>,
    /// Restrict to products assigned to this user.
    pub assigned_to: Option<UserId>,
}

/// The product data embedded in an order line.
///
/// Lighter than [`Product`]: an order remembers what was ordered, not the
/// current stock or assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedProduct {
    pub id: ProductId,
    pub name: String,
    pub reference: Option<String>,
    pub category: Category,
}

/// A single line of a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub quantity: u32,
    /// None once the referenced product has been deleted.
    pub product: Option<OrderedProduct>,
}

/// A placed order with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user: UserSummary,
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

/// A requested order line, as submitted by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Partial update of an order.
#[derive(Debug, Clone, Default)]
pub struct OrderUpdate {
    pub status: Option<OrderStatus>,
    pub notes: Option<String>,
}

/// Which orders to list.
#[derive(Debug, Clone, Copy)]
pub enum OrderScope {
    /// Every order in the system (admin view).
    All,
    /// Only orders owned by the given user.
    ForUser(UserId),
}
