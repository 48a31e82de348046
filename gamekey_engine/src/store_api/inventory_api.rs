//! Catalog and stock management.
//!
//! Restocking lives on [`crate::PurchaseApi::restock`], because new stock has to be offered to waiting preorders
//! first.
use std::fmt::Debug;

use gamekey_common::{Coins, FiatAmount};
use log::*;

use crate::{
    db_types::{NewProduct, Product},
    traits::{InventoryError, InventoryManagement},
};

pub struct InventoryApi<B> {
    db: B,
}

impl<B: Debug> Debug for InventoryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InventoryApi ({:?})", self.db)
    }
}

impl<B> InventoryApi<B>
where B: InventoryManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn create_product(&self, product: NewProduct) -> Result<Product, InventoryError> {
        let product = self.db.insert_product(product).await?;
        info!("📦️ Product #{} [{}] added to the catalog", product.id, product.name);
        Ok(product)
    }

    pub async fn product(&self, product_id: i64) -> Result<Option<Product>, InventoryError> {
        self.db.fetch_product(product_id).await
    }

    /// The catalog. With `only_available`, products that can currently be bought or preordered.
    pub async fn products(&self, only_available: bool) -> Result<Vec<Product>, InventoryError> {
        self.db.fetch_products(only_available).await
    }

    pub async fn available_count(&self, product_id: i64) -> Result<i64, InventoryError> {
        self.db.available_count(product_id).await
    }

    pub async fn stock(&self, product_id: i64) -> Result<Vec<String>, InventoryError> {
        self.db.fetch_stock(product_id).await
    }

    /// Removes the first `quantity` items from the stock and returns them, or fails and changes nothing.
    pub async fn allocate(&self, product_id: i64, quantity: i64) -> Result<Vec<String>, InventoryError> {
        self.db.allocate(product_id, quantity).await
    }

    /// Puts previously allocated items back at the front of the stock, in their original order.
    pub async fn release(&self, product_id: i64, items: &[String]) -> Result<Product, InventoryError> {
        if items.is_empty() {
            return self.db.fetch_product(product_id).await?.ok_or(InventoryError::ProductNotFound(product_id));
        }
        self.db.release(product_id, items).await
    }

    pub async fn set_enabled(&self, product_id: i64, enabled: bool) -> Result<Product, InventoryError> {
        let product = self.db.set_enabled(product_id, enabled).await?;
        info!("📦️ Product #{product_id} is now {}", if enabled { "enabled" } else { "disabled" });
        Ok(product)
    }

    /// New prices only apply to new orders. Existing orders keep the unit price they were created with.
    pub async fn update_prices(
        &self,
        product_id: i64,
        price_fiat: FiatAmount,
        price_coins: Coins,
    ) -> Result<Product, InventoryError> {
        if price_fiat.cents() < 0 || price_coins.value() < 0 {
            return Err(InventoryError::InvalidPrice(format!("Got {price_fiat} and {price_coins}")));
        }
        self.db.update_prices(product_id, price_fiat, price_coins).await
    }
}
