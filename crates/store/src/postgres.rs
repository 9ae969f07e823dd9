//! PostgreSQL-backed store implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CategoryId, Money, OrderId, OrderItemId, OrderStatus, ProductId, Role, UserId};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::model::{
    Category, NewProduct, NewUser, Order, OrderItem, OrderLine, OrderScope, OrderUpdate,
    OrderedProduct, Product, ProductFilter, User, UserSummary,
};
use crate::store::Store;

const PRODUCT_SELECT: &str = r#"
    SELECT p.id, p.name, p.reference, p.supplier_ref, p.description,
           p.price_cents, p.stock,
           c.id AS category_id, c.name AS category_name,
           au.id AS assigned_user_id, au.name AS assigned_user_name,
           au.email AS assigned_user_email
    FROM products p
    JOIN categories c ON c.id = p.category_id
    LEFT JOIN user_products up ON up.product_id = p.id
    LEFT JOIN users au ON au.id = up.user_id
"#;

const ORDER_SELECT: &str = r#"
    SELECT o.id, o.status, o.notes, o.created_at,
           u.id AS user_id, u.name AS user_name, u.email AS user_email
    FROM orders o
    JOIN users u ON u.id = o.user_id
"#;

const ORDER_ITEMS_SELECT: &str = r#"
    SELECT i.id, i.quantity,
           p.id AS product_id, p.name AS product_name, p.reference AS product_reference,
           c.id AS category_id, c.name AS category_name
    FROM order_items i
    LEFT JOIN products p ON p.id = i.product_id
    LEFT JOIN categories c ON c.id = p.category_id
    WHERE i.order_id = $1
    ORDER BY i.position ASC
"#;

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_category(row: &PgRow) -> Result<Category> {
        Ok(Category {
            id: CategoryId::from_uuid(row.try_get("id")?),
            name: row.try_get("name")?,
        })
    }

    fn row_to_user(row: &PgRow) -> Result<User> {
        let role: String = row.try_get("role")?;
        Ok(User {
            id: UserId::from_uuid(row.try_get("id")?),
            email: row.try_get("email")?,
            name: row.try_get("name")?,
            role: role
                .parse::<Role>()
                .map_err(|e| StoreError::InvalidValue(e.to_string()))?,
        })
    }

    fn row_to_product(row: &PgRow) -> Result<Product> {
        let assigned_user = match row.try_get::<Option<Uuid>, _>("assigned_user_id")? {
            Some(id) => Some(UserSummary {
                id: UserId::from_uuid(id),
                name: row.try_get("assigned_user_name")?,
                email: row.try_get("assigned_user_email")?,
            }),
            None => None,
        };

        Ok(Product {
            id: ProductId::from_uuid(row.try_get("id")?),
            name: row.try_get("name")?,
            reference: row.try_get("reference")?,
            supplier_ref: row.try_get("supplier_ref")?,
            description: row.try_get("description")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock: row.try_get("stock")?,
            category: Category {
                id: CategoryId::from_uuid(row.try_get("category_id")?),
                name: row.try_get("category_name")?,
            },
            assigned_user,
        })
    }

    fn row_to_order_item(row: &PgRow) -> Result<OrderItem> {
        let product = match row.try_get::<Option<Uuid>, _>("product_id")? {
            Some(id) => Some(OrderedProduct {
                id: ProductId::from_uuid(id),
                name: row.try_get("product_name")?,
                reference: row.try_get("product_reference")?,
                category: Category {
                    id: CategoryId::from_uuid(row.try_get("category_id")?),
                    name: row.try_get("category_name")?,
                },
            }),
            None => None,
        };

        let quantity: i32 = row.try_get("quantity")?;
        Ok(OrderItem {
            id: OrderItemId::from_uuid(row.try_get("id")?),
            quantity: quantity as u32,
            product,
        })
    }

    fn row_to_order(row: &PgRow, items: Vec<OrderItem>) -> Result<Order> {
        let status: String = row.try_get("status")?;
        Ok(Order {
            id: OrderId::from_uuid(row.try_get("id")?),
            user: UserSummary {
                id: UserId::from_uuid(row.try_get("user_id")?),
                name: row.try_get("user_name")?,
                email: row.try_get("user_email")?,
            },
            status: status
                .parse::<OrderStatus>()
                .map_err(|e| StoreError::InvalidValue(e.to_string()))?,
            notes: row.try_get("notes")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            items,
        })
    }

    async fn load_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(ORDER_ITEMS_SELECT)
            .bind(order_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_order_item).collect()
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn list_categories(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query("SELECT id, name FROM categories ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_category).collect()
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>> {
        let row = sqlx::query("SELECT id, name FROM categories WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_category).transpose()
    }

    async fn create_category(&self, name: &str) -> Result<Category> {
        let id = CategoryId::new();
        sqlx::query("INSERT INTO categories (id, name) VALUES ($1, $2)")
            .bind(id.as_uuid())
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(Category {
            id,
            name: name.to_string(),
        })
    }

    async fn list_products(&self, filter: ProductFilter) -> Result<Vec<Product>> {
        let mut sql = format!("{PRODUCT_SELECT} WHERE 1=1");
        let mut param_count = 0;

        if filter.search.is_some() {
            param_count += 1;
            sql.push_str(&format!(
                " AND (p.name ILIKE ${param_count} OR p.reference ILIKE ${param_count} OR p.description ILIKE ${param_count})"
            ));
        }
        if filter.category.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND p.category_id = ${param_count}"));
        }
        if filter.assigned_to.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND up.user_id = ${param_count}"));
        }

        sql.push_str(" ORDER BY p.name ASC");

        let mut query = sqlx::query(&sql);
        if let Some(search) = filter.search {
            query = query.bind(format!("%{search}%"));
        }
        if let Some(category) = filter.category {
            query = query.bind(category.as_uuid());
        }
        if let Some(user) = filter.assigned_to {
            query = query.bind(user.as_uuid());
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_product).collect()
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let sql = format!("{PRODUCT_SELECT} WHERE p.id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_product).transpose()
    }

    async fn create_product(&self, input: NewProduct) -> Result<Product> {
        let id = ProductId::new();
        sqlx::query(
            r#"
            INSERT INTO products (id, name, reference, supplier_ref, description, price_cents, stock, category_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id.as_uuid())
        .bind(&input.name)
        .bind(&input.reference)
        .bind(&input.supplier_ref)
        .bind(&input.description)
        .bind(input.price.cents())
        .bind(input.stock)
        .bind(input.category_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| constraint_error(e, &input))?;

        self.get_product(id)
            .await?
            .ok_or_else(|| StoreError::not_found("product", id))
    }

    async fn update_product(&self, id: ProductId, input: NewProduct) -> Result<Product> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = $2, reference = $3, supplier_ref = $4, description = $5,
                price_cents = $6, stock = $7, category_id = $8
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(&input.name)
        .bind(&input.reference)
        .bind(&input.supplier_ref)
        .bind(&input.description)
        .bind(input.price.cents())
        .bind(input.stock)
        .bind(input.category_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| constraint_error(e, &input))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("product", id));
        }

        self.get_product(id)
            .await?
            .ok_or_else(|| StoreError::not_found("product", id))
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("product", id));
        }
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, email, name, role FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn create_user(&self, input: NewUser) -> Result<User> {
        let id = UserId::new();
        sqlx::query("INSERT INTO users (id, email, name, role) VALUES ($1, $2, $3, $4)")
            .bind(id.as_uuid())
            .bind(&input.email)
            .bind(&input.name)
            .bind(input.role.as_str())
            .execute(&self.pool)
            .await?;

        Ok(User {
            id,
            email: input.email,
            name: input.name,
            role: input.role,
        })
    }

    async fn list_admins(&self) -> Result<Vec<User>> {
        let rows =
            sqlx::query("SELECT id, email, name, role FROM users WHERE role = $1 ORDER BY email")
                .bind(Role::Admin.as_str())
                .fetch_all(&self.pool)
                .await?;

        rows.iter().map(Self::row_to_user).collect()
    }

    async fn place_order(
        &self,
        user_id: UserId,
        lines: &[OrderLine],
        notes: Option<String>,
    ) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let order_id = OrderId::new();
        sqlx::query("INSERT INTO orders (id, user_id, status, notes) VALUES ($1, $2, $3, $4)")
            .bind(order_id.as_uuid())
            .bind(user_id.as_uuid())
            .bind(OrderStatus::Pending.as_str())
            .bind(&notes)
            .execute(&mut *tx)
            .await?;

        for (position, line) in lines.iter().enumerate() {
            let quantity = i32::try_from(line.quantity)
                .map_err(|_| StoreError::InvalidValue(format!("quantity {}", line.quantity)))?;

            // Conditional decrement: the stock check and the write are one
            // statement, so racing placements cannot drive stock negative.
            let decremented: Option<String> = sqlx::query_scalar(
                "UPDATE products SET stock = stock - $2 WHERE id = $1 AND stock >= $2 RETURNING name",
            )
            .bind(line.product_id.as_uuid())
            .bind(quantity)
            .fetch_optional(&mut *tx)
            .await?;

            if decremented.is_none() {
                let existing: Option<String> =
                    sqlx::query_scalar("SELECT name FROM products WHERE id = $1")
                        .bind(line.product_id.as_uuid())
                        .fetch_optional(&mut *tx)
                        .await?;

                // Dropping the transaction rolls back the order row and any
                // decrements already applied for earlier lines.
                return Err(match existing {
                    Some(product) => StoreError::InsufficientStock { product },
                    None => StoreError::not_found("product", line.product_id),
                });
            }

            sqlx::query(
                "INSERT INTO order_items (id, order_id, product_id, quantity, position) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(OrderItemId::new().as_uuid())
            .bind(order_id.as_uuid())
            .bind(line.product_id.as_uuid())
            .bind(quantity)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.get_order(order_id)
            .await?
            .ok_or_else(|| StoreError::not_found("order", order_id))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let sql = format!("{ORDER_SELECT} WHERE o.id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let items = self.load_order_items(id).await?;
                Ok(Some(Self::row_to_order(&row, items)?))
            }
            None => Ok(None),
        }
    }

    async fn list_orders(&self, scope: OrderScope) -> Result<Vec<Order>> {
        let rows = match scope {
            OrderScope::All => {
                let sql = format!("{ORDER_SELECT} ORDER BY o.created_at DESC");
                sqlx::query(&sql).fetch_all(&self.pool).await?
            }
            OrderScope::ForUser(user_id) => {
                let sql = format!("{ORDER_SELECT} WHERE o.user_id = $1 ORDER BY o.created_at DESC");
                sqlx::query(&sql)
                    .bind(user_id.as_uuid())
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            let id = OrderId::from_uuid(row.try_get("id")?);
            let items = self.load_order_items(id).await?;
            orders.push(Self::row_to_order(row, items)?);
        }
        Ok(orders)
    }

    async fn update_order(&self, id: OrderId, update: OrderUpdate) -> Result<Order> {
        let result = sqlx::query(
            "UPDATE orders SET status = COALESCE($2, status), notes = COALESCE($3, notes) WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(update.status.map(|s| s.as_str()))
        .bind(&update.notes)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("order", id));
        }

        self.get_order(id)
            .await?
            .ok_or_else(|| StoreError::not_found("order", id))
    }

    async fn delete_order(&self, id: OrderId) -> Result<()> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("order", id));
        }
        Ok(())
    }

    async fn assign_product(&self, product_id: ProductId, user_id: UserId) -> Result<()> {
        let name: Option<String> = sqlx::query_scalar("SELECT name FROM products WHERE id = $1")
            .bind(product_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        let product = name.ok_or_else(|| StoreError::not_found("product", product_id))?;

        // The primary key on product_id makes this an atomic
        // insert-or-reject; a concurrent assignment loses here, not at some
        // earlier read.
        sqlx::query("INSERT INTO user_products (product_id, user_id) VALUES ($1, $2)")
            .bind(product_id.as_uuid())
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e {
                    match db_err.constraint() {
                        Some("user_products_pkey") => {
                            return StoreError::AlreadyAssigned { product };
                        }
                        Some("user_products_user_id_fkey") => {
                            return StoreError::not_found("user", user_id);
                        }
                        _ => {}
                    }
                }
                StoreError::Database(e)
            })?;

        Ok(())
    }

    async fn unassign_product(&self, product_id: ProductId) -> Result<()> {
        let result = sqlx::query("DELETE FROM user_products WHERE product_id = $1")
            .bind(product_id.as_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("assignment", product_id));
        }
        Ok(())
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn constraint_error(e: sqlx::Error, input: &NewProduct) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.constraint() == Some("products_category_id_fkey")
    {
        return StoreError::not_found("category", input.category_id);
    }
    StoreError::Database(e)
}
