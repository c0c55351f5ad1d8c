//! The stock ledger write path.
//!
//! Every write that moves stock runs as one unit of work on the owning
//! product: lock, project, write the movement, persist `current_qty`, commit.
//! The projector is called explicitly here; there is no implicit hook.

use chrono::{DateTime, Utc};
use tracing::{instrument, warn};

use stockroom_core::{MovementId, ProductId};
use stockroom_inventory::{
    AggregateRow, GroupBy, MovementEdit, MovementFilter, RecordMovement, StockChange,
    StockMovement, StockProjector,
};

use crate::error::{LedgerError, LedgerResult};
use crate::store::{LedgerStore, StockTransaction};

/// A movement write together with its effect on the product's quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerWrite {
    pub movement: StockMovement,
    pub change: StockChange,
}

#[derive(Debug, Clone)]
pub struct Ledger<S> {
    store: S,
}

impl<S: LedgerStore> Ledger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Record a movement and project it onto the product.
    ///
    /// Field validation runs before the store is touched. Any failure after
    /// the product is locked drops the transaction, rolling everything back.
    #[instrument(
        skip(self, cmd),
        fields(product_id = %cmd.product_id, move_type = %cmd.move_type),
        err
    )]
    pub async fn record(&self, cmd: RecordMovement) -> LedgerResult<LedgerWrite> {
        self.record_at(cmd, Utc::now()).await
    }

    /// [`Ledger::record`] with an explicit clock, used for the default timestamp.
    pub async fn record_at(&self, cmd: RecordMovement, now: DateTime<Utc>) -> LedgerResult<LedgerWrite> {
        let valid = cmd.validate()?;

        let mut tx = self
            .store
            .begin(valid.product_id())
            .await?
            .ok_or_else(|| LedgerError::not_found("product"))?;

        let movement = valid.into_movement(MovementId::new(), tx.product(), now)?;
        let change = StockProjector::on_movement_created(tx.product_mut(), &movement)?;
        tx.insert_movement(&movement).await?;
        tx.commit().await?;

        if change.was_clamped() {
            warn!(
                movement_id = %movement.id,
                product_id = %movement.product_id,
                requested = movement.quantity,
                clamped = change.clamped,
                "outbound movement exceeds recorded stock; quantity clamped at zero"
            );
        }
        tracing::info!(
            movement_id = %movement.id,
            before = change.before,
            after = change.after,
            "movement recorded"
        );

        Ok(LedgerWrite { movement, change })
    }

    /// Remove a movement and reverse its effect on the product.
    #[instrument(skip(self), fields(movement_id = %id), err)]
    pub async fn remove(&self, id: MovementId) -> LedgerResult<LedgerWrite> {
        let existing = self
            .store
            .get_movement(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("movement"))?;

        let mut tx = self
            .store
            .begin(existing.product_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("movement"))?;

        // Re-read under the lock; a concurrent remove may have won.
        let movement = tx
            .delete_movement(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("movement"))?;
        let change = StockProjector::on_movement_deleted(tx.product_mut(), &movement)?;
        tx.commit().await?;

        if change.was_clamped() {
            warn!(
                movement_id = %movement.id,
                product_id = %movement.product_id,
                clamped = change.clamped,
                "removing movement would take stock below zero; quantity clamped at zero"
            );
        }
        tracing::info!(movement_id = %movement.id, before = change.before, after = change.after, "movement removed");

        Ok(LedgerWrite { movement, change })
    }

    /// Apply an edit to a recorded movement. Only the note may change.
    #[instrument(skip(self, edit), fields(movement_id = %id), err)]
    pub async fn amend(&self, id: MovementId, edit: MovementEdit) -> LedgerResult<StockMovement> {
        let mut movement = self
            .store
            .get_movement(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("movement"))?;

        movement.apply_edit(edit)?;

        if !self.store.update_movement_note(id, &movement.note).await? {
            return Err(LedgerError::not_found("movement"));
        }
        Ok(movement)
    }

    pub async fn amend_note(&self, id: MovementId, note: impl Into<String>) -> LedgerResult<StockMovement> {
        self.amend(
            id,
            MovementEdit {
                note: Some(note.into()),
                ..MovementEdit::default()
            },
        )
        .await
    }

    pub async fn get(&self, id: MovementId) -> LedgerResult<StockMovement> {
        self.store
            .get_movement(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("movement"))
    }

    /// Movements matching `filter`, newest first.
    pub async fn list(&self, filter: &MovementFilter, limit: usize) -> LedgerResult<Vec<StockMovement>> {
        Ok(self.store.list_movements(filter, limit).await?)
    }

    pub async fn aggregate(
        &self,
        filter: &MovementFilter,
        group_by: GroupBy,
        signed: bool,
    ) -> LedgerResult<Vec<AggregateRow>> {
        Ok(self.store.aggregate(filter, group_by, signed).await?)
    }

    /// Net signed quantity recorded strictly after `cutoff` for one product.
    pub async fn net_after(&self, product_id: ProductId, cutoff: DateTime<Utc>) -> LedgerResult<i64> {
        let filter = MovementFilter::all().for_product(product_id).after(cutoff);
        let rows = self.store.aggregate(&filter, GroupBy::NONE, true).await?;
        Ok(rows.first().map_or(0, |r| r.total))
    }

    /// Quantity of `product_id` held as of `cutoff`.
    pub async fn as_of(&self, product_id: ProductId, cutoff: DateTime<Utc>) -> LedgerResult<u64> {
        let product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("product"))?;
        let net_after = self.net_after(product_id, cutoff).await?;
        Ok(StockProjector::as_of(product.current_qty(), net_after))
    }
}
