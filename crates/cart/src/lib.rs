//! Client-side cart with durable local persistence.
//!
//! The cart is the staging area for an order before submission. It lives on
//! the client, not the server: no network calls originate here, and the
//! server re-validates everything (in particular stock) at submit time.
//!
//! Every mutation persists the full list to a JSON file under a fixed
//! storage key, and [`CartStore::open`] reloads it verbatim, so pending
//! lines survive restarts.

use std::fs;
use std::path::{Path, PathBuf};

use common::{Money, ProductId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fixed namespace key under which the cart is persisted.
pub const CART_STORAGE_KEY: &str = "medical_consumable_cart";

/// Errors that can occur while loading or persisting the cart.
#[derive(Debug, Error)]
pub enum CartError {
    /// The cart file could not be read or written.
    #[error("cart storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted cart could not be parsed.
    #[error("cart serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for cart operations.
pub type Result<T> = std::result::Result<T, CartError>;

/// A pending order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Unit price snapshot taken when the item was added.
    pub price: Money,
    /// Display label for the line.
    pub label: String,
}

/// The client-local pending order.
///
/// An explicitly-scoped store with a defined lifecycle: opened once at
/// startup, passed to whatever composes the checkout flow, persisted on
/// every mutation.
#[derive(Debug)]
pub struct CartStore {
    path: PathBuf,
    items: Vec<CartItem>,
}

impl CartStore {
    /// Opens the cart persisted under `dir`, loading any existing content.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let path = dir.as_ref().join(format!("{CART_STORAGE_KEY}.json"));
        let items = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, items })
    }

    /// Adds an item to the cart.
    ///
    /// If a line for the same product already exists, its quantity is
    /// incremented by the incoming quantity and its price and label are
    /// overwritten with the incoming values (last write wins). No upper
    /// bound is enforced here; the server checks stock at submit time.
    pub fn add(&mut self, item: CartItem) -> Result<()> {
        match self
            .items
            .iter_mut()
            .find(|existing| existing.product_id == item.product_id)
        {
            Some(existing) => {
                existing.quantity += item.quantity;
                existing.price = item.price;
                existing.label = item.label;
            }
            None => self.items.push(item),
        }
        self.persist()
    }

    /// Removes the line for the given product. No-op if absent.
    pub fn remove(&mut self, product_id: ProductId) -> Result<()> {
        self.items.retain(|item| item.product_id != product_id);
        self.persist()
    }

    /// Overwrites the quantity of the line for the given product.
    ///
    /// A quantity of zero behaves as [`CartStore::remove`]. Callers wanting a
    /// polished UX should validate input before calling; the store itself is
    /// permissive beyond this clamp.
    pub fn update_quantity(&mut self, product_id: ProductId, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return self.remove(product_id);
        }
        if let Some(item) = self
            .items
            .iter_mut()
            .find(|item| item.product_id == product_id)
        {
            item.quantity = quantity;
        }
        self.persist()
    }

    /// Empties the cart. Called after a successful order submission.
    pub fn clear(&mut self) -> Result<()> {
        self.items.clear();
        self.persist()
    }

    /// Returns the pending lines in insertion order.
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Returns the number of pending lines.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true when the cart holds no lines.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the total of all lines at their snapshot prices.
    pub fn total(&self) -> Money {
        self.items
            .iter()
            .map(|item| item.price.multiply(item.quantity))
            .sum()
    }

    fn persist(&self) -> Result<()> {
        let json = serde_json::to_vec(&self.items)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn item(product_id: ProductId, quantity: u32, cents: i64, label: &str) -> CartItem {
        CartItem {
            product_id,
            quantity,
            price: Money::from_cents(cents),
            label: label.to_string(),
        }
    }

    #[test]
    fn open_starts_empty_without_a_file() {
        let dir = tempdir().unwrap();
        let cart = CartStore::open(dir.path()).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn adding_same_product_merges_quantities_and_takes_latest_price() {
        let dir = tempdir().unwrap();
        let mut cart = CartStore::open(dir.path()).unwrap();
        let product = ProductId::new();

        cart.add(item(product, 2, 599, "Compresses")).unwrap();
        cart.add(item(product, 3, 649, "Compresses")).unwrap();

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.items()[0].quantity, 5);
        assert_eq!(cart.items()[0].price.cents(), 649);
    }

    #[test]
    fn update_quantity_zero_removes_the_line() {
        let dir = tempdir().unwrap();
        let mut cart = CartStore::open(dir.path()).unwrap();
        let product = ProductId::new();

        cart.add(item(product, 2, 599, "Compresses")).unwrap();
        cart.update_quantity(product, 0).unwrap();

        assert!(cart.is_empty());

        // Equivalent to an explicit remove.
        cart.add(item(product, 2, 599, "Compresses")).unwrap();
        cart.remove(product).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn update_quantity_overwrites() {
        let dir = tempdir().unwrap();
        let mut cart = CartStore::open(dir.path()).unwrap();
        let product = ProductId::new();

        cart.add(item(product, 2, 599, "Compresses")).unwrap();
        cart.update_quantity(product, 7).unwrap();

        assert_eq!(cart.items()[0].quantity, 7);
    }

    #[test]
    fn removing_an_absent_product_is_a_no_op() {
        let dir = tempdir().unwrap();
        let mut cart = CartStore::open(dir.path()).unwrap();
        cart.add(item(ProductId::new(), 1, 100, "Gloves")).unwrap();

        cart.remove(ProductId::new()).unwrap();
        assert_eq!(cart.len(), 1);
    }

    #[test]
    fn reload_round_trips_the_exact_list() {
        let dir = tempdir().unwrap();
        let first = ProductId::new();
        let second = ProductId::new();

        let mut cart = CartStore::open(dir.path()).unwrap();
        cart.add(item(first, 2, 599, "Compresses")).unwrap();
        cart.add(item(second, 1, 1500, "Gloves")).unwrap();
        let before = cart.items().to_vec();

        let reloaded = CartStore::open(dir.path()).unwrap();
        assert_eq!(reloaded.items(), before.as_slice());
        // Order-preserving: first added stays first.
        assert_eq!(reloaded.items()[0].product_id, first);
    }

    #[test]
    fn clear_empties_and_persists() {
        let dir = tempdir().unwrap();
        let mut cart = CartStore::open(dir.path()).unwrap();
        cart.add(item(ProductId::new(), 2, 599, "Compresses"))
            .unwrap();

        cart.clear().unwrap();
        assert!(cart.is_empty());

        let reloaded = CartStore::open(dir.path()).unwrap();
        assert!(reloaded.is_empty());
    }

    #[test]
    fn total_sums_price_times_quantity() {
        let dir = tempdir().unwrap();
        let mut cart = CartStore::open(dir.path()).unwrap();
        cart.add(item(ProductId::new(), 2, 599, "Compresses"))
            .unwrap();
        cart.add(item(ProductId::new(), 3, 100, "Tape")).unwrap();

        assert_eq!(cart.total().cents(), 2 * 599 + 3 * 100);
    }
}
