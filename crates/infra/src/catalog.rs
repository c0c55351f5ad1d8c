use chrono::Utc;
use tracing::instrument;

use stockroom_core::ProductId;
use stockroom_products::{CreateProduct, Product, UpdateProduct};

use crate::error::{LedgerError, LedgerResult};
use crate::store::{LedgerStore, ProductQuery};

/// Product catalog operations. Never touches `current_qty`.
#[derive(Debug, Clone)]
pub struct Catalog<S> {
    store: S,
}

impl<S: LedgerStore> Catalog<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[instrument(skip(self, cmd), fields(name = %cmd.name), err)]
    pub async fn create(&self, cmd: CreateProduct) -> LedgerResult<Product> {
        let product = Product::create(ProductId::new(), cmd, Utc::now())?;
        self.store.insert_product(&product).await?;
        tracing::info!(product_id = %product.id_typed(), "product created");
        Ok(product)
    }

    /// Edit catalog fields; all-or-nothing.
    #[instrument(skip(self, cmd), fields(product_id = %id), err)]
    pub async fn update(&self, id: ProductId, cmd: UpdateProduct) -> LedgerResult<Product> {
        let mut product = self.get(id).await?;
        product.update(cmd)?;
        if !self.store.update_product_details(&product).await? {
            return Err(LedgerError::not_found("product"));
        }
        // current_qty may have moved since the read above.
        self.get(id).await
    }

    /// Delete a product together with its movements.
    #[instrument(skip(self), fields(product_id = %id), err)]
    pub async fn delete(&self, id: ProductId) -> LedgerResult<()> {
        if !self.store.delete_product(id).await? {
            return Err(LedgerError::not_found("product"));
        }
        tracing::info!(product_id = %id, "product deleted with its movements");
        Ok(())
    }

    pub async fn get(&self, id: ProductId) -> LedgerResult<Product> {
        self.store
            .get_product(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("product"))
    }

    /// Products ordered by name.
    pub async fn list(&self, query: &ProductQuery) -> LedgerResult<Vec<Product>> {
        Ok(self.store.list_products(query).await?)
    }
}
