//! Storage boundary for the catalog and the stock ledger.
//!
//! Writes that touch stock go through a [`StockTransaction`]: it holds the
//! product lock, stages movement inserts/deletes and the projected quantity,
//! and persists them together on [`StockTransaction::commit`]. Dropping a
//! transaction without committing discards everything it staged.

use std::sync::Arc;

use async_trait::async_trait;

use stockroom_core::{MovementId, ProductId};
use stockroom_inventory::{AggregateRow, GroupBy, MovementFilter, StockMovement, fold_case};
use stockroom_products::{Category, Product};

use crate::error::StoreError;

mod in_memory;
mod postgres;

pub use in_memory::{InMemoryLedgerStore, InMemoryTransaction};
pub use postgres::{PostgresLedgerStore, PostgresTransaction};

/// Catalog listing criteria.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductQuery {
    pub category: Option<Category>,
    /// Case-insensitive substring of the product name (see [`fold_case`]).
    pub search: Option<String>,
}

impl ProductQuery {
    pub fn matches(&self, product: &Product) -> bool {
        if self.category.is_some_and(|c| c != product.category()) {
            return false;
        }
        match &self.search {
            Some(needle) => fold_case(product.name()).contains(&fold_case(needle)),
            None => true,
        }
    }
}

/// A per-product unit of work.
#[async_trait]
pub trait StockTransaction: Send {
    /// The locked product as of the start of the transaction plus staged changes.
    fn product(&self) -> &Product;

    fn product_mut(&mut self) -> &mut Product;

    async fn insert_movement(&mut self, movement: &StockMovement) -> Result<(), StoreError>;

    /// Delete a movement of the locked product, returning it if it existed.
    async fn delete_movement(&mut self, id: MovementId) -> Result<Option<StockMovement>, StoreError>;

    /// Persist staged movements and the product's `current_qty`. Other product
    /// fields are not written.
    async fn commit(self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    type Tx: StockTransaction;

    /// Lock `product_id` and open a unit of work on it. `None` if the product does not exist.
    async fn begin(&self, product_id: ProductId) -> Result<Option<Self::Tx>, StoreError>;

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError>;

    /// Write every field except `current_qty`. Returns `false` if the product is gone.
    async fn update_product_details(&self, product: &Product) -> Result<bool, StoreError>;

    /// Delete a product and, by cascade, its movements.
    async fn delete_product(&self, id: ProductId) -> Result<bool, StoreError>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Products matching `query`, ordered by name.
    async fn list_products(&self, query: &ProductQuery) -> Result<Vec<Product>, StoreError>;

    async fn get_movement(&self, id: MovementId) -> Result<Option<StockMovement>, StoreError>;

    /// Movements matching `filter`, newest first.
    async fn list_movements(&self, filter: &MovementFilter, limit: usize) -> Result<Vec<StockMovement>, StoreError>;

    /// Grouped sums ordered by group key. See [`stockroom_inventory::aggregate`].
    async fn aggregate(
        &self,
        filter: &MovementFilter,
        group_by: GroupBy,
        signed: bool,
    ) -> Result<Vec<AggregateRow>, StoreError>;

    /// Overwrite a movement's note. Returns `false` if the movement is gone.
    async fn update_movement_note(&self, id: MovementId, note: &str) -> Result<bool, StoreError>;
}

#[async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    type Tx = S::Tx;

    async fn begin(&self, product_id: ProductId) -> Result<Option<Self::Tx>, StoreError> {
        (**self).begin(product_id).await
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        (**self).insert_product(product).await
    }

    async fn update_product_details(&self, product: &Product) -> Result<bool, StoreError> {
        (**self).update_product_details(product).await
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, StoreError> {
        (**self).delete_product(id).await
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        (**self).get_product(id).await
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<Vec<Product>, StoreError> {
        (**self).list_products(query).await
    }

    async fn get_movement(&self, id: MovementId) -> Result<Option<StockMovement>, StoreError> {
        (**self).get_movement(id).await
    }

    async fn list_movements(&self, filter: &MovementFilter, limit: usize) -> Result<Vec<StockMovement>, StoreError> {
        (**self).list_movements(filter, limit).await
    }

    async fn aggregate(
        &self,
        filter: &MovementFilter,
        group_by: GroupBy,
        signed: bool,
    ) -> Result<Vec<AggregateRow>, StoreError> {
        (**self).aggregate(filter, group_by, signed).await
    }

    async fn update_movement_note(&self, id: MovementId, note: &str) -> Result<bool, StoreError> {
        (**self).update_movement_note(id, note).await
    }
}
