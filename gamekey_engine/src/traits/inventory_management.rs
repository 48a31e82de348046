use gamekey_common::{Coins, FiatAmount};
use thiserror::Error;

use crate::db_types::{NewProduct, Product};

#[derive(Debug, Clone, Error)]
pub enum InventoryError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("The requested product {0} does not exist")]
    ProductNotFound(i64),
    #[error("Product {product_id} has {available} items in stock, but {requested} were requested")]
    InsufficientStock { product_id: i64, requested: i64, available: i64 },
    #[error("Quantities must be strictly positive. Got {0}")]
    InvalidQuantity(i64),
    #[error("Invalid price: {0}")]
    InvalidPrice(String),
}

impl From<sqlx::Error> for InventoryError {
    fn from(e: sqlx::Error) -> Self {
        InventoryError::DatabaseError(e.to_string())
    }
}

/// Behaviour for managing the catalog and each product's ordered stock of digital content.
///
/// The stock of a product is an ordered list. Allocation takes from the front, and the length of the list is the
/// authoritative inventory count. Every operation that changes the stock also recomputes `Product::is_available`.
#[allow(async_fn_in_trait)]
pub trait InventoryManagement {
    /// Adds a product to the catalog along with its initial stock.
    async fn insert_product(&self, product: NewProduct) -> Result<Product, InventoryError>;

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, InventoryError>;

    /// The catalog, ordered by name. If `only_available` is true, products that cannot be bought right now are left out.
    async fn fetch_products(&self, only_available: bool) -> Result<Vec<Product>, InventoryError>;

    /// The number of items left in stock.
    async fn available_count(&self, product_id: i64) -> Result<i64, InventoryError>;

    /// The remaining stock, front first.
    async fn fetch_stock(&self, product_id: i64) -> Result<Vec<String>, InventoryError>;

    /// Atomically removes the first `quantity` items from the product's stock and returns them in stock order.
    ///
    /// If fewer than `quantity` items remain at write time, nothing is removed and `InsufficientStock` is returned.
    /// Two concurrent calls never receive overlapping items.
    async fn allocate(&self, product_id: i64, quantity: i64) -> Result<Vec<String>, InventoryError>;

    /// Puts previously allocated items back at the front of the stock, preserving their relative order.
    async fn release(&self, product_id: i64, items: &[String]) -> Result<Product, InventoryError>;

    /// Appends new items to the back of the stock.
    async fn restock(&self, product_id: i64, items: &[String]) -> Result<Product, InventoryError>;

    /// Sets the admin on/off-sale switch. A disabled product is never available, whatever its stock.
    async fn set_enabled(&self, product_id: i64, enabled: bool) -> Result<Product, InventoryError>;

    /// Changes the catalog prices. Existing orders keep the prices they were created with.
    async fn update_prices(
        &self,
        product_id: i64,
        price_fiat: FiatAmount,
        price_coins: Coins,
    ) -> Result<Product, InventoryError>;
}
