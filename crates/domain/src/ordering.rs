//! Order placement and management service.

use std::sync::Arc;

use common::{OrderId, UserId};
use notify::OrderNotifier;
use store::{Order, OrderLine, OrderScope, OrderUpdate, Store, User};

use crate::error::DomainError;
use crate::policy;

/// The consistency-sensitive heart of the portal.
///
/// Placement validates the submitted lines, hands them to the store's single
/// atomic commit unit (order row + item rows + stock decrements), and then
/// triggers the notification as a detached best-effort step. Order updates
/// and deletion enforce the authorization policy at this boundary.
pub struct OrderService<S> {
    store: S,
    notifier: Arc<dyn OrderNotifier>,
}

impl<S: Clone> Clone for OrderService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            notifier: Arc::clone(&self.notifier),
        }
    }
}

impl<S: Store> OrderService<S> {
    /// Creates a new order service.
    pub fn new(store: S, notifier: Arc<dyn OrderNotifier>) -> Self {
        Self { store, notifier }
    }

    /// Places an order for the given user.
    ///
    /// Rejects empty carts and zero quantities before any storage I/O. The
    /// store call commits everything or nothing: a missing product or a line
    /// exceeding the available stock aborts the whole placement naming the
    /// offending product. Notification failure never surfaces here.
    #[tracing::instrument(skip(self, lines, notes), fields(lines = lines.len()))]
    pub async fn place_order(
        &self,
        user_id: UserId,
        lines: Vec<OrderLine>,
        notes: Option<String>,
    ) -> Result<Order, DomainError> {
        if lines.is_empty() {
            return Err(DomainError::EmptyOrder);
        }
        for line in &lines {
            if line.quantity == 0 || i32::try_from(line.quantity).is_err() {
                return Err(DomainError::InvalidQuantity {
                    quantity: line.quantity,
                });
            }
        }

        let order = self.store.place_order(user_id, &lines, notes).await?;
        metrics::counter!("orders_placed_total").increment(1);
        tracing::info!(order_id = %order.id, "order placed");

        // Best-effort: runs after the commit, possibly after the response.
        let notifier = Arc::clone(&self.notifier);
        let placed = order.clone();
        tokio::spawn(async move {
            if let Err(error) = notifier.order_placed(&placed).await {
                tracing::warn!(order_id = %placed.id, %error, "order notification failed");
            }
        });

        Ok(order)
    }

    /// Lists the orders visible to the actor, newest first.
    #[tracing::instrument(skip(self, actor))]
    pub async fn list_orders(&self, actor: &User) -> Result<Vec<Order>, DomainError> {
        let scope = if policy::can_view_all_orders(actor) {
            OrderScope::All
        } else {
            OrderScope::ForUser(actor.id)
        };
        Ok(self.store.list_orders(scope).await?)
    }

    /// Applies a partial update ({status, notes}) to an order.
    #[tracing::instrument(skip(self, actor, update))]
    pub async fn update_order(
        &self,
        actor: &User,
        id: OrderId,
        update: OrderUpdate,
    ) -> Result<Order, DomainError> {
        let order = self
            .store
            .get_order(id)
            .await?
            .ok_or(DomainError::OrderNotFound(id))?;

        // A stranger is told "not found" rather than learning the order exists.
        if !policy::is_admin(actor) && !policy::owns_order(actor, &order) {
            return Err(DomainError::OrderNotFound(id));
        }
        if !policy::can_update_order(actor, &order, &update) {
            return Err(DomainError::AccessDenied);
        }

        Ok(self.store.update_order(id, update).await?)
    }

    /// Deletes an order and its lines.
    #[tracing::instrument(skip(self, actor))]
    pub async fn delete_order(&self, actor: &User, id: OrderId) -> Result<(), DomainError> {
        if !policy::can_delete_order(actor) {
            return Err(DomainError::AccessDenied);
        }
        Ok(self.store.delete_order(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Money, OrderStatus, Role};
    use notify::{InMemoryMailer, NoopNotifier, NotificationDispatcher};
    use store::{EMAIL_NOTIFICATIONS, InMemoryStore, NewProduct, NewUser, StoreError};

    async fn seed_user(store: &InMemoryStore, email: &str, role: Role) -> User {
        store
            .create_user(NewUser {
                email: email.to_string(),
                name: Some("Test User".to_string()),
                role,
            })
            .await
            .unwrap()
    }

    async fn seed_product(store: &InMemoryStore, name: &str, stock: i32) -> store::Product {
        let category = store.create_category("Dressings").await.unwrap();
        store
            .create_product(NewProduct {
                name: name.to_string(),
                reference: Some("REF-001".to_string()),
                supplier_ref: None,
                description: None,
                price: Money::from_cents(599),
                stock,
                category_id: category.id,
            })
            .await
            .unwrap()
    }

    fn service(store: InMemoryStore) -> OrderService<InMemoryStore> {
        OrderService::new(store, Arc::new(NoopNotifier))
    }

    #[tokio::test]
    async fn empty_cart_is_rejected_before_any_write() {
        let store = InMemoryStore::new();
        let user = seed_user(&store, "nurse@example.com", Role::User).await;
        let service = service(store.clone());

        let result = service.place_order(user.id, Vec::new(), None).await;
        assert!(matches!(result, Err(DomainError::EmptyOrder)));
        assert!(service.list_orders(&user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected() {
        let store = InMemoryStore::new();
        let user = seed_user(&store, "nurse@example.com", Role::User).await;
        let product = seed_product(&store, "Sterile compresses", 10).await;
        let service = service(store);

        let result = service
            .place_order(
                user.id,
                vec![OrderLine {
                    product_id: product.id,
                    quantity: 0,
                }],
                None,
            )
            .await;
        assert!(matches!(
            result,
            Err(DomainError::InvalidQuantity { quantity: 0 })
        ));
    }

    #[tokio::test]
    async fn placement_decrements_stock_and_hydrates_order() {
        let store = InMemoryStore::new();
        let user = seed_user(&store, "nurse@example.com", Role::User).await;
        let product = seed_product(&store, "Sterile compresses", 5).await;
        let service = service(store.clone());

        let order = service
            .place_order(
                user.id,
                vec![OrderLine {
                    product_id: product.id,
                    quantity: 3,
                }],
                Some("for ward 2".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(order.user.email, "nurse@example.com");
        assert_eq!(order.items[0].quantity, 3);
        assert_eq!(
            order.items[0].product.as_ref().unwrap().name,
            "Sterile compresses"
        );
        assert_eq!(
            store.get_product(product.id).await.unwrap().unwrap().stock,
            2
        );
    }

    #[tokio::test]
    async fn insufficient_stock_propagates_and_nothing_is_written() {
        let store = InMemoryStore::new();
        let user = seed_user(&store, "nurse@example.com", Role::User).await;
        let product = seed_product(&store, "Sterile compresses", 2).await;
        let service = service(store.clone());

        let result = service
            .place_order(
                user.id,
                vec![OrderLine {
                    product_id: product.id,
                    quantity: 3,
                }],
                None,
            )
            .await;

        match result {
            Err(DomainError::Store(StoreError::InsufficientStock { product })) => {
                assert_eq!(product, "Sterile compresses");
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        assert!(service.list_orders(&user).await.unwrap().is_empty());
        assert_eq!(
            store.get_product(product.id).await.unwrap().unwrap().stock,
            2
        );
    }

    #[tokio::test]
    async fn notification_failure_never_fails_placement() {
        let store = InMemoryStore::new();
        seed_user(&store, "admin@example.com", Role::Admin).await;
        let user = seed_user(&store, "nurse@example.com", Role::User).await;
        let product = seed_product(&store, "Sterile compresses", 5).await;
        store
            .set_setting(EMAIL_NOTIFICATIONS, "true")
            .await
            .unwrap();

        let mailer = InMemoryMailer::new();
        mailer.set_fail_on_send(true);
        let service = OrderService::new(
            store.clone(),
            Arc::new(NotificationDispatcher::new(store.clone(), mailer)),
        );

        let order = service
            .place_order(
                user.id,
                vec![OrderLine {
                    product_id: product.id,
                    quantity: 1,
                }],
                None,
            )
            .await
            .unwrap();

        // The order committed even though delivery will fail.
        assert!(store.get_order(order.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn notification_is_delivered_after_placement() {
        let store = InMemoryStore::new();
        seed_user(&store, "admin@example.com", Role::Admin).await;
        let user = seed_user(&store, "nurse@example.com", Role::User).await;
        let product = seed_product(&store, "Sterile compresses", 5).await;
        store
            .set_setting(EMAIL_NOTIFICATIONS, "true")
            .await
            .unwrap();

        let mailer = InMemoryMailer::new();
        let service = OrderService::new(
            store.clone(),
            Arc::new(NotificationDispatcher::new(store.clone(), mailer.clone())),
        );

        service
            .place_order(
                user.id,
                vec![OrderLine {
                    product_id: product.id,
                    quantity: 1,
                }],
                None,
            )
            .await
            .unwrap();

        // Delivery is detached from the placement; give it a moment.
        for _ in 0..100 {
            if mailer.sent_count() == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(mailer.sent_count(), 1);
    }

    #[tokio::test]
    async fn owner_may_edit_notes_but_not_status() {
        let store = InMemoryStore::new();
        let user = seed_user(&store, "nurse@example.com", Role::User).await;
        let product = seed_product(&store, "Sterile compresses", 5).await;
        let service = service(store);

        let order = service
            .place_order(
                user.id,
                vec![OrderLine {
                    product_id: product.id,
                    quantity: 1,
                }],
                None,
            )
            .await
            .unwrap();

        let updated = service
            .update_order(
                &user,
                order.id,
                OrderUpdate {
                    status: None,
                    notes: Some("deliver to ward 2".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.notes.as_deref(), Some("deliver to ward 2"));

        let denied = service
            .update_order(
                &user,
                order.id,
                OrderUpdate {
                    status: Some(OrderStatus::Delivered),
                    notes: None,
                },
            )
            .await;
        assert!(matches!(denied, Err(DomainError::AccessDenied)));
    }

    #[tokio::test]
    async fn strangers_are_told_not_found() {
        let store = InMemoryStore::new();
        let owner = seed_user(&store, "nurse@example.com", Role::User).await;
        let stranger = seed_user(&store, "stranger@example.com", Role::User).await;
        let product = seed_product(&store, "Sterile compresses", 5).await;
        let service = service(store);

        let order = service
            .place_order(
                owner.id,
                vec![OrderLine {
                    product_id: product.id,
                    quantity: 1,
                }],
                None,
            )
            .await
            .unwrap();

        let result = service
            .update_order(
                &stranger,
                order.id,
                OrderUpdate {
                    status: None,
                    notes: Some("mine".to_string()),
                },
            )
            .await;
        assert!(matches!(result, Err(DomainError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn admin_may_update_status_and_delete() {
        let store = InMemoryStore::new();
        let admin = seed_user(&store, "admin@example.com", Role::Admin).await;
        let user = seed_user(&store, "nurse@example.com", Role::User).await;
        let product = seed_product(&store, "Sterile compresses", 5).await;
        let service = service(store);

        let order = service
            .place_order(
                user.id,
                vec![OrderLine {
                    product_id: product.id,
                    quantity: 1,
                }],
                None,
            )
            .await
            .unwrap();

        let updated = service
            .update_order(
                &admin,
                order.id,
                OrderUpdate {
                    status: Some(OrderStatus::InPreparation),
                    notes: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, OrderStatus::InPreparation);

        let denied = service.delete_order(&user, order.id).await;
        assert!(matches!(denied, Err(DomainError::AccessDenied)));

        service.delete_order(&admin, order.id).await.unwrap();
        assert!(service.list_orders(&admin).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn listing_scopes_to_the_actor() {
        let store = InMemoryStore::new();
        let admin = seed_user(&store, "admin@example.com", Role::Admin).await;
        let user = seed_user(&store, "nurse@example.com", Role::User).await;
        let other = seed_user(&store, "other@example.com", Role::User).await;
        let product = seed_product(&store, "Sterile compresses", 50).await;
        let service = service(store);
        let line = OrderLine {
            product_id: product.id,
            quantity: 1,
        };

        service
            .place_order(user.id, vec![line], None)
            .await
            .unwrap();
        service
            .place_order(other.id, vec![line], None)
            .await
            .unwrap();

        assert_eq!(service.list_orders(&admin).await.unwrap().len(), 2);
        let mine = service.list_orders(&user).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].user.id, user.id);
    }
}
