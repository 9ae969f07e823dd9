//! In-memory store implementation for tests and demo mode.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CategoryId, Money, OrderId, OrderItemId, OrderStatus, ProductId, UserId};
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::model::{
    Category, NewProduct, NewUser, Order, OrderItem, OrderLine, OrderScope, OrderUpdate,
    OrderedProduct, Product, ProductFilter, User,
};
use crate::store::Store;

#[derive(Debug, Clone)]
struct StoredProduct {
    id: ProductId,
    name: String,
    reference: Option<String>,
    supplier_ref: Option<String>,
    description: Option<String>,
    price: Money,
    stock: i32,
    category_id: CategoryId,
}

#[derive(Debug, Clone)]
struct StoredItem {
    id: OrderItemId,
    product_id: Option<ProductId>,
    quantity: u32,
}

#[derive(Debug, Clone)]
struct StoredOrder {
    id: OrderId,
    user_id: UserId,
    status: OrderStatus,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    items: Vec<StoredItem>,
}

#[derive(Default)]
struct MemState {
    categories: HashMap<CategoryId, Category>,
    products: HashMap<ProductId, StoredProduct>,
    users: HashMap<UserId, User>,
    orders: HashMap<OrderId, StoredOrder>,
    assignments: HashMap<ProductId, UserId>,
    settings: HashMap<String, String>,
}

impl MemState {
    fn product_view(&self, product: &StoredProduct) -> Result<Product> {
        let category = self
            .categories
            .get(&product.category_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("category", product.category_id))?;

        let assigned_user = self
            .assignments
            .get(&product.id)
            .and_then(|user_id| self.users.get(user_id))
            .map(User::summary);

        Ok(Product {
            id: product.id,
            name: product.name.clone(),
            reference: product.reference.clone(),
            supplier_ref: product.supplier_ref.clone(),
            description: product.description.clone(),
            price: product.price,
            stock: product.stock,
            category,
            assigned_user,
        })
    }

    fn order_view(&self, order: &StoredOrder) -> Result<Order> {
        let user = self
            .users
            .get(&order.user_id)
            .map(User::summary)
            .ok_or_else(|| StoreError::not_found("user", order.user_id))?;

        let mut items = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let product = match item.product_id.and_then(|id| self.products.get(&id)) {
                Some(stored) => {
                    let category = self
                        .categories
                        .get(&stored.category_id)
                        .cloned()
                        .ok_or_else(|| StoreError::not_found("category", stored.category_id))?;
                    Some(OrderedProduct {
                        id: stored.id,
                        name: stored.name.clone(),
                        reference: stored.reference.clone(),
                        category,
                    })
                }
                None => None,
            };
            items.push(OrderItem {
                id: item.id,
                quantity: item.quantity,
                product,
            });
        }

        Ok(Order {
            id: order.id,
            user,
            status: order.status,
            notes: order.notes.clone(),
            created_at: order.created_at,
            items,
        })
    }
}

/// In-memory store.
///
/// Provides the same interface and semantics as the PostgreSQL
/// implementation; the whole placement runs under a single write lock, so it
/// is atomic with respect to concurrent calls.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemState>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn list_categories(&self) -> Result<Vec<Category>> {
        let state = self.state.read().await;
        let mut categories: Vec<_> = state.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>> {
        let state = self.state.read().await;
        Ok(state.categories.get(&id).cloned())
    }

    async fn create_category(&self, name: &str) -> Result<Category> {
        let category = Category {
            id: CategoryId::new(),
            name: name.to_string(),
        };
        let mut state = self.state.write().await;
        state.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn list_products(&self, filter: ProductFilter) -> Result<Vec<Product>> {
        let state = self.state.read().await;
        let search = filter.search.map(|s| s.to_lowercase());

        let mut products = Vec::new();
        for stored in state.products.values() {
            if let Some(ref needle) = search {
                let matches = |field: &Option<String>| {
                    field
                        .as_deref()
                        .is_some_and(|v| v.to_lowercase().contains(needle.as_str()))
                };
                if !stored.name.to_lowercase().contains(needle.as_str())
                    && !matches(&stored.reference)
                    && !matches(&stored.description)
                {
                    continue;
                }
            }
            if let Some(category) = filter.category
                && stored.category_id != category
            {
                continue;
            }
            if let Some(user) = filter.assigned_to
                && state.assignments.get(&stored.id) != Some(&user)
            {
                continue;
            }
            products.push(state.product_view(stored)?);
        }

        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let state = self.state.read().await;
        state
            .products
            .get(&id)
            .map(|stored| state.product_view(stored))
            .transpose()
    }

    async fn create_product(&self, input: NewProduct) -> Result<Product> {
        let mut state = self.state.write().await;
        if !state.categories.contains_key(&input.category_id) {
            return Err(StoreError::not_found("category", input.category_id));
        }

        let stored = StoredProduct {
            id: ProductId::new(),
            name: input.name,
            reference: input.reference,
            supplier_ref: input.supplier_ref,
            description: input.description,
            price: input.price,
            stock: input.stock,
            category_id: input.category_id,
        };
        let view = state.product_view(&stored)?;
        state.products.insert(stored.id, stored);
        Ok(view)
    }

    async fn update_product(&self, id: ProductId, input: NewProduct) -> Result<Product> {
        let mut state = self.state.write().await;
        if !state.categories.contains_key(&input.category_id) {
            return Err(StoreError::not_found("category", input.category_id));
        }
        if !state.products.contains_key(&id) {
            return Err(StoreError::not_found("product", id));
        }

        let stored = StoredProduct {
            id,
            name: input.name,
            reference: input.reference,
            supplier_ref: input.supplier_ref,
            description: input.description,
            price: input.price,
            stock: input.stock,
            category_id: input.category_id,
        };
        let view = state.product_view(&stored)?;
        state.products.insert(id, stored);
        Ok(view)
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        let mut state = self.state.write().await;
        if state.products.remove(&id).is_none() {
            return Err(StoreError::not_found("product", id));
        }

        // Mirror the schema: assignment rows cascade, order lines keep their
        // quantity but lose the product reference.
        state.assignments.remove(&id);
        for order in state.orders.values_mut() {
            for item in &mut order.items {
                if item.product_id == Some(id) {
                    item.product_id = None;
                }
            }
        }
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.get(&id).cloned())
    }

    async fn create_user(&self, input: NewUser) -> Result<User> {
        let user = User {
            id: UserId::new(),
            email: input.email,
            name: input.name,
            role: input.role,
        };
        let mut state = self.state.write().await;
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn list_admins(&self) -> Result<Vec<User>> {
        let state = self.state.read().await;
        let mut admins: Vec<_> = state
            .users
            .values()
            .filter(|u| u.role.is_admin())
            .cloned()
            .collect();
        admins.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(admins)
    }

    async fn place_order(
        &self,
        user_id: UserId,
        lines: &[OrderLine],
        notes: Option<String>,
    ) -> Result<Order> {
        let mut state = self.state.write().await;

        if !state.users.contains_key(&user_id) {
            return Err(StoreError::not_found("user", user_id));
        }

        // Validate against a working copy of the stocks so that several
        // lines for the same product count against each other; nothing is
        // written until every line fits.
        let mut projected: HashMap<ProductId, i32> = HashMap::new();
        for line in lines {
            let product = state
                .products
                .get(&line.product_id)
                .ok_or_else(|| StoreError::not_found("product", line.product_id))?;
            let quantity = i32::try_from(line.quantity)
                .map_err(|_| StoreError::InvalidValue(format!("quantity {}", line.quantity)))?;

            let available = projected.entry(line.product_id).or_insert(product.stock);
            if *available < quantity {
                return Err(StoreError::InsufficientStock {
                    product: product.name.clone(),
                });
            }
            *available -= quantity;
        }

        for (product_id, stock) in projected {
            if let Some(product) = state.products.get_mut(&product_id) {
                product.stock = stock;
            }
        }

        let stored = StoredOrder {
            id: OrderId::new(),
            user_id,
            status: OrderStatus::Pending,
            notes,
            created_at: Utc::now(),
            items: lines
                .iter()
                .map(|line| StoredItem {
                    id: OrderItemId::new(),
                    product_id: Some(line.product_id),
                    quantity: line.quantity,
                })
                .collect(),
        };

        let view = state.order_view(&stored)?;
        state.orders.insert(stored.id, stored);
        Ok(view)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let state = self.state.read().await;
        state
            .orders
            .get(&id)
            .map(|stored| state.order_view(stored))
            .transpose()
    }

    async fn list_orders(&self, scope: OrderScope) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders = Vec::new();
        for stored in state.orders.values() {
            if let OrderScope::ForUser(user_id) = scope
                && stored.user_id != user_id
            {
                continue;
            }
            orders.push(state.order_view(stored)?);
        }

        orders.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.to_string().cmp(&b.id.to_string()))
        });
        Ok(orders)
    }

    async fn update_order(&self, id: OrderId, update: OrderUpdate) -> Result<Order> {
        let mut state = self.state.write().await;
        let stored = state
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("order", id))?;

        if let Some(status) = update.status {
            stored.status = status;
        }
        if let Some(notes) = update.notes {
            stored.notes = Some(notes);
        }

        let stored = stored.clone();
        state.order_view(&stored)
    }

    async fn delete_order(&self, id: OrderId) -> Result<()> {
        let mut state = self.state.write().await;
        if state.orders.remove(&id).is_none() {
            return Err(StoreError::not_found("order", id));
        }
        Ok(())
    }

    async fn assign_product(&self, product_id: ProductId, user_id: UserId) -> Result<()> {
        let mut state = self.state.write().await;
        let product = state
            .products
            .get(&product_id)
            .ok_or_else(|| StoreError::not_found("product", product_id))?
            .name
            .clone();
        if !state.users.contains_key(&user_id) {
            return Err(StoreError::not_found("user", user_id));
        }
        if state.assignments.contains_key(&product_id) {
            return Err(StoreError::AlreadyAssigned { product });
        }

        state.assignments.insert(product_id, user_id);
        Ok(())
    }

    async fn unassign_product(&self, product_id: ProductId) -> Result<()> {
        let mut state = self.state.write().await;
        if state.assignments.remove(&product_id).is_none() {
            return Err(StoreError::not_found("assignment", product_id));
        }
        Ok(())
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let state = self.state.read().await;
        Ok(state.settings.get(key).cloned())
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.settings.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Role;

    async fn seed_catalog(store: &InMemoryStore) -> (User, Category) {
        let user = store
            .create_user(NewUser {
                email: "nurse@example.com".to_string(),
                name: Some("Test Nurse".to_string()),
                role: Role::User,
            })
            .await
            .unwrap();
        let category = store.create_category("Dressings").await.unwrap();
        (user, category)
    }

    async fn seed_product(store: &InMemoryStore, category: CategoryId, stock: i32) -> Product {
        store
            .create_product(NewProduct {
                name: "Sterile compresses".to_string(),
                reference: Some("COMP-ST-1010".to_string()),
                supplier_ref: None,
                description: Some("Box of 50".to_string()),
                price: Money::from_cents(599),
                stock,
                category_id: category,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn place_order_decrements_stock() {
        let store = InMemoryStore::new();
        let (user, category) = seed_catalog(&store).await;
        let product = seed_product(&store, category.id, 10).await;

        let order = store
            .place_order(
                user.id,
                &[OrderLine {
                    product_id: product.id,
                    quantity: 4,
                }],
                Some("urgent".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].quantity, 4);
        assert_eq!(order.notes.as_deref(), Some("urgent"));

        let product = store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(product.stock, 6);
    }

    #[tokio::test]
    async fn insufficient_stock_rejects_whole_order() {
        let store = InMemoryStore::new();
        let (user, category) = seed_catalog(&store).await;
        let plenty = seed_product(&store, category.id, 100).await;
        let scarce = store
            .create_product(NewProduct {
                name: "Nitrile gloves".to_string(),
                reference: Some("GANT-NIT-M".to_string()),
                supplier_ref: None,
                description: None,
                price: Money::from_cents(1500),
                stock: 2,
                category_id: category.id,
            })
            .await
            .unwrap();

        let result = store
            .place_order(
                user.id,
                &[
                    OrderLine {
                        product_id: plenty.id,
                        quantity: 5,
                    },
                    OrderLine {
                        product_id: scarce.id,
                        quantity: 3,
                    },
                ],
                None,
            )
            .await;

        match result {
            Err(StoreError::InsufficientStock { product }) => {
                assert_eq!(product, "Nitrile gloves");
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        // Nothing was persisted: no order, first product's stock untouched.
        assert!(store.list_orders(OrderScope::All).await.unwrap().is_empty());
        let plenty = store.get_product(plenty.id).await.unwrap().unwrap();
        assert_eq!(plenty.stock, 100);
    }

    #[tokio::test]
    async fn unknown_product_rejects_whole_order() {
        let store = InMemoryStore::new();
        let (user, _) = seed_catalog(&store).await;

        let result = store
            .place_order(
                user.id,
                &[OrderLine {
                    product_id: ProductId::new(),
                    quantity: 1,
                }],
                None,
            )
            .await;

        assert!(matches!(result, Err(StoreError::NotFound { .. })));
        assert!(store.list_orders(OrderScope::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeated_lines_share_the_same_stock() {
        let store = InMemoryStore::new();
        let (user, category) = seed_catalog(&store).await;
        let product = seed_product(&store, category.id, 5).await;

        // Each line fits on its own, together they do not.
        let result = store
            .place_order(
                user.id,
                &[
                    OrderLine {
                        product_id: product.id,
                        quantity: 3,
                    },
                    OrderLine {
                        product_id: product.id,
                        quantity: 3,
                    },
                ],
                None,
            )
            .await;

        assert!(matches!(result, Err(StoreError::InsufficientStock { .. })));
        let product = store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(product.stock, 5);
    }

    #[tokio::test]
    async fn second_order_for_remaining_stock_is_rejected() {
        let store = InMemoryStore::new();
        let (user, category) = seed_catalog(&store).await;
        let product = seed_product(&store, category.id, 5).await;
        let line = OrderLine {
            product_id: product.id,
            quantity: 3,
        };

        store.place_order(user.id, &[line], None).await.unwrap();
        let second = store.place_order(user.id, &[line], None).await;

        match second {
            Err(StoreError::InsufficientStock { product }) => {
                assert_eq!(product, "Sterile compresses");
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        let product = store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(product.stock, 2);
    }

    #[tokio::test]
    async fn concurrent_placements_never_oversell() {
        let store = InMemoryStore::new();
        let (user, category) = seed_catalog(&store).await;
        let product = seed_product(&store, category.id, 5).await;
        let line = OrderLine {
            product_id: product.id,
            quantity: 3,
        };

        let a = {
            let store = store.clone();
            tokio::spawn(async move { store.place_order(user.id, &[line], None).await })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move { store.place_order(user.id, &[line], None).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);

        let product = store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(product.stock, 2);
        assert!(product.stock >= 0);
    }

    #[tokio::test]
    async fn deleting_a_product_keeps_order_lines() {
        let store = InMemoryStore::new();
        let (user, category) = seed_catalog(&store).await;
        let product = seed_product(&store, category.id, 10).await;

        let order = store
            .place_order(
                user.id,
                &[OrderLine {
                    product_id: product.id,
                    quantity: 2,
                }],
                None,
            )
            .await
            .unwrap();

        store.delete_product(product.id).await.unwrap();

        let order = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].quantity, 2);
        assert!(order.items[0].product.is_none());
    }

    #[tokio::test]
    async fn update_order_is_partial() {
        let store = InMemoryStore::new();
        let (user, category) = seed_catalog(&store).await;
        let product = seed_product(&store, category.id, 10).await;
        let order = store
            .place_order(
                user.id,
                &[OrderLine {
                    product_id: product.id,
                    quantity: 1,
                }],
                Some("initial".to_string()),
            )
            .await
            .unwrap();

        let updated = store
            .update_order(
                order.id,
                OrderUpdate {
                    status: Some(OrderStatus::InPreparation),
                    notes: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.status, OrderStatus::InPreparation);
        assert_eq!(updated.notes.as_deref(), Some("initial"));
    }

    #[tokio::test]
    async fn assignment_is_exclusive_per_product() {
        let store = InMemoryStore::new();
        let (user, category) = seed_catalog(&store).await;
        let other = store
            .create_user(NewUser {
                email: "other@example.com".to_string(),
                name: None,
                role: Role::User,
            })
            .await
            .unwrap();
        let product = seed_product(&store, category.id, 1).await;

        store.assign_product(product.id, user.id).await.unwrap();

        let conflict = store.assign_product(product.id, other.id).await;
        assert!(matches!(conflict, Err(StoreError::AlreadyAssigned { .. })));

        // The original assignee is still the one on the product.
        let product = store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(product.assigned_user.unwrap().id, user.id);
    }

    #[tokio::test]
    async fn unassigning_without_assignment_is_not_found() {
        let store = InMemoryStore::new();
        let (_, category) = seed_catalog(&store).await;
        let product = seed_product(&store, category.id, 1).await;

        let result = store.unassign_product(product.id).await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn product_listing_filters() {
        let store = InMemoryStore::new();
        let (user, category) = seed_catalog(&store).await;
        let other_category = store.create_category("Protection").await.unwrap();
        let compresses = seed_product(&store, category.id, 10).await;
        store
            .create_product(NewProduct {
                name: "Surgical masks".to_string(),
                reference: Some("MASK-CHIR-II".to_string()),
                supplier_ref: None,
                description: None,
                price: Money::from_cents(999),
                stock: 50,
                category_id: other_category.id,
            })
            .await
            .unwrap();

        let by_search = store
            .list_products(ProductFilter {
                search: Some("comp-st".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_search.len(), 1);
        assert_eq!(by_search[0].id, compresses.id);

        let by_category = store
            .list_products(ProductFilter {
                category: Some(other_category.id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_category.len(), 1);
        assert_eq!(by_category[0].name, "Surgical masks");

        store.assign_product(compresses.id, user.id).await.unwrap();
        let assigned = store
            .list_products(ProductFilter {
                assigned_to: Some(user.id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].id, compresses.id);
    }

    #[tokio::test]
    async fn order_listing_scopes_to_owner() {
        let store = InMemoryStore::new();
        let (user, category) = seed_catalog(&store).await;
        let other = store
            .create_user(NewUser {
                email: "other@example.com".to_string(),
                name: None,
                role: Role::User,
            })
            .await
            .unwrap();
        let product = seed_product(&store, category.id, 100).await;
        let line = OrderLine {
            product_id: product.id,
            quantity: 1,
        };

        store.place_order(user.id, &[line], None).await.unwrap();
        store.place_order(other.id, &[line], None).await.unwrap();

        assert_eq!(store.list_orders(OrderScope::All).await.unwrap().len(), 2);
        let mine = store
            .list_orders(OrderScope::ForUser(user.id))
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].user.id, user.id);
    }

    #[tokio::test]
    async fn settings_round_trip() {
        let store = InMemoryStore::new();
        assert_eq!(store.get_setting("email_notifications").await.unwrap(), None);

        store.set_setting("email_notifications", "true").await.unwrap();
        assert_eq!(
            store.get_setting("email_notifications").await.unwrap(),
            Some("true".to_string())
        );

        store.set_setting("email_notifications", "false").await.unwrap();
        assert_eq!(
            store.get_setting("email_notifications").await.unwrap(),
            Some("false".to_string())
        );
    }
}
