use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use stockroom_core::{MovementId, ProductId};
use stockroom_inventory::{AggregateRow, GroupBy, MovementFilter, StockMovement, aggregate};
use stockroom_products::Product;

use super::{LedgerStore, ProductQuery, StockTransaction};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct State {
    products: HashMap<ProductId, Product>,
    movements: HashMap<MovementId, StockMovement>,
}

impl State {
    fn matching<'a>(&'a self, filter: &'a MovementFilter) -> impl Iterator<Item = &'a StockMovement> + 'a {
        self.movements.values().filter(move |m| {
            let name = self.products.get(&m.product_id).map(Product::name);
            filter.matches(m, name)
        })
    }
}

/// In-memory ledger store.
///
/// Intended for tests/dev. A single async mutex serializes every writer, and a
/// transaction holds it until commit or drop.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug)]
pub struct InMemoryTransaction {
    state: OwnedMutexGuard<State>,
    product: Product,
    inserted: Vec<StockMovement>,
    deleted: Vec<MovementId>,
}

#[async_trait]
impl StockTransaction for InMemoryTransaction {
    fn product(&self) -> &Product {
        &self.product
    }

    fn product_mut(&mut self) -> &mut Product {
        &mut self.product
    }

    async fn insert_movement(&mut self, movement: &StockMovement) -> Result<(), StoreError> {
        let duplicate = self.inserted.iter().any(|m| m.id == movement.id)
            || (self.state.movements.contains_key(&movement.id) && !self.deleted.contains(&movement.id));
        if duplicate {
            return Err(StoreError::Conflict(format!("movement {} already exists", movement.id)));
        }
        self.inserted.push(movement.clone());
        Ok(())
    }

    async fn delete_movement(&mut self, id: MovementId) -> Result<Option<StockMovement>, StoreError> {
        if let Some(pos) = self.inserted.iter().position(|m| m.id == id) {
            return Ok(Some(self.inserted.remove(pos)));
        }
        if self.deleted.contains(&id) {
            return Ok(None);
        }
        let found = self
            .state
            .movements
            .get(&id)
            .filter(|m| m.product_id == self.product.id_typed())
            .cloned();
        if found.is_some() {
            self.deleted.push(id);
        }
        Ok(found)
    }

    async fn commit(self) -> Result<(), StoreError> {
        let InMemoryTransaction {
            mut state,
            product,
            inserted,
            deleted,
        } = self;

        let stored = state
            .products
            .get_mut(&product.id_typed())
            .ok_or_else(|| StoreError::Conflict(format!("product {} disappeared mid-transaction", product.id_typed())))?;
        stored.set_projected_qty(product.current_qty());

        for id in deleted {
            state.movements.remove(&id);
        }
        for m in inserted {
            state.movements.insert(m.id, m);
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self, product_id: ProductId) -> Result<Option<Self::Tx>, StoreError> {
        let state = Arc::clone(&self.state).lock_owned().await;
        let Some(product) = state.products.get(&product_id).cloned() else {
            return Ok(None);
        };
        Ok(Some(InMemoryTransaction {
            state,
            product,
            inserted: Vec::new(),
            deleted: Vec::new(),
        }))
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.products.contains_key(&product.id_typed()) {
            return Err(StoreError::Conflict(format!("product {} already exists", product.id_typed())));
        }
        state.products.insert(product.id_typed(), product.clone());
        Ok(())
    }

    async fn update_product_details(&self, product: &Product) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let Some(stored) = state.products.get_mut(&product.id_typed()) else {
            return Ok(false);
        };
        let current_qty = stored.current_qty();
        *stored = product.clone();
        stored.set_projected_qty(current_qty);
        Ok(true)
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        if state.products.remove(&id).is_none() {
            return Ok(false);
        }
        state.movements.retain(|_, m| m.product_id != id);
        Ok(true)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<Vec<Product>, StoreError> {
        let state = self.state.lock().await;
        let mut products: Vec<Product> = state.products.values().filter(|p| query.matches(p)).cloned().collect();
        products.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.id_typed().cmp(&b.id_typed())));
        Ok(products)
    }

    async fn get_movement(&self, id: MovementId) -> Result<Option<StockMovement>, StoreError> {
        Ok(self.state.lock().await.movements.get(&id).cloned())
    }

    async fn list_movements(&self, filter: &MovementFilter, limit: usize) -> Result<Vec<StockMovement>, StoreError> {
        let state = self.state.lock().await;
        let mut movements: Vec<StockMovement> = state.matching(filter).cloned().collect();
        movements.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        movements.truncate(limit);
        Ok(movements)
    }

    async fn aggregate(
        &self,
        filter: &MovementFilter,
        group_by: GroupBy,
        signed: bool,
    ) -> Result<Vec<AggregateRow>, StoreError> {
        let state = self.state.lock().await;
        Ok(aggregate(state.matching(filter), group_by, signed))
    }

    async fn update_movement_note(&self, id: MovementId, note: &str) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        match state.movements.get_mut(&id) {
            Some(m) => {
                m.note = note.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
