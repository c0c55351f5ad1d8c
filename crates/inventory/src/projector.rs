//! Stock projector: keeps `Product::current_qty` in step with the ledger.
//!
//! The ledger write path calls [`StockProjector::on_movement_created`] and
//! [`StockProjector::on_movement_deleted`] inside the same unit of work that
//! inserts or deletes the movement. Every step clamps at zero, so the cached
//! quantity is never negative.
//!
//! Historical quantities are reconstructed backwards from the live value:
//! `as_of(T) = max(0, current_qty - net signed quantity after T)`. That is only
//! exact back to the last time the running total was clamped; earlier cutoffs
//! can diverge from true history.

use stockroom_core::{DomainError, DomainResult};
use stockroom_products::Product;

use crate::movement::{MoveType, StockMovement};

/// Outcome of one projector step.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StockChange {
    pub before: u64,
    pub after: u64,
    /// Decrease requested past zero and swallowed by the clamp.
    pub clamped: u64,
}

impl StockChange {
    pub fn was_clamped(&self) -> bool {
        self.clamped > 0
    }
}

#[derive(Debug, Default, Copy, Clone)]
pub struct StockProjector;

impl StockProjector {
    pub fn signed_delta(move_type: MoveType, quantity: u64) -> i64 {
        move_type.sign() * i64::try_from(quantity).unwrap_or(i64::MAX)
    }

    /// `max(0, current + delta)`.
    pub fn apply_delta(current: u64, delta: i64) -> StockChange {
        let target = i128::from(current) + i128::from(delta);
        let (after, clamped) = if target < 0 {
            (0, u64::try_from(-target).unwrap_or(u64::MAX))
        } else {
            (u64::try_from(target).unwrap_or(u64::MAX), 0)
        };
        StockChange {
            before: current,
            after,
            clamped,
        }
    }

    pub fn on_movement_created(product: &mut Product, movement: &StockMovement) -> DomainResult<StockChange> {
        Self::ensure_owner(product, movement)?;
        let change = Self::apply_delta(
            product.current_qty(),
            Self::signed_delta(movement.move_type, movement.quantity),
        );
        product.set_projected_qty(change.after);
        Ok(change)
    }

    /// Exact inverse of creation: OUT deletions add back, IN deletions subtract.
    pub fn on_movement_deleted(product: &mut Product, movement: &StockMovement) -> DomainResult<StockChange> {
        Self::ensure_owner(product, movement)?;
        let change = Self::apply_delta(
            product.current_qty(),
            -Self::signed_delta(movement.move_type, movement.quantity),
        );
        product.set_projected_qty(change.after);
        Ok(change)
    }

    /// Quantity held as of a cutoff, given the net signed quantity recorded after it.
    pub fn as_of(current_qty: u64, net_after: i64) -> u64 {
        Self::apply_delta(current_qty, net_after.saturating_neg()).after
    }

    fn ensure_owner(product: &Product, movement: &StockMovement) -> DomainResult<()> {
        if product.id_typed() != movement.product_id {
            return Err(DomainError::invariant(format!(
                "movement {} belongs to product {}, not {}",
                movement.id,
                movement.product_id,
                product.id_typed()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use stockroom_core::{MovementId, ProductId};
    use stockroom_products::{Category, CreateProduct};

    use crate::movement::Unit;
    use crate::reason::Reason;

    fn day(n: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, n, 12, 0, 0).unwrap()
    }

    fn end_of_day(n: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, n, 23, 59, 59).unwrap()
    }

    fn product() -> Product {
        Product::create(
            ProductId::new(),
            CreateProduct {
                name: "Tutkal".to_string(),
                description: String::new(),
                category: Category::Adhesive,
                unit_price: Decimal::new(250, 1),
                min_stock: 10,
                pallet_size: 64,
            },
            day(1),
        )
        .unwrap()
    }

    fn movement(product: &Product, move_type: MoveType, quantity: u64, at: DateTime<Utc>) -> StockMovement {
        StockMovement {
            id: MovementId::new(),
            product_id: product.id_typed(),
            move_type,
            reason: Reason::Correction,
            quantity,
            unit: Unit::Piece,
            note: String::new(),
            created_at: at,
        }
    }

    /// Build a movement for `product` and run it through the projector.
    fn record(product: &mut Product, move_type: MoveType, quantity: u64, at: DateTime<Utc>) -> (StockMovement, StockChange) {
        let m = movement(product, move_type, quantity, at);
        let change = StockProjector::on_movement_created(product, &m).unwrap();
        (m, change)
    }

    fn net_after(movements: &[StockMovement], cutoff: DateTime<Utc>) -> i64 {
        movements
            .iter()
            .filter(|m| m.created_at > cutoff)
            .map(StockMovement::signed_quantity)
            .sum()
    }

    #[test]
    fn inbound_adds_outbound_subtracts() {
        let mut p = product();
        let (_, change) = record(&mut p, MoveType::In, 40, day(1));
        assert_eq!(change, StockChange { before: 0, after: 40, clamped: 0 });

        record(&mut p, MoveType::Out, 15, day(2));
        assert_eq!(p.current_qty(), 25);
    }

    #[test]
    fn outbound_past_zero_clamps_and_reports_the_loss() {
        let mut p = product();
        record(&mut p, MoveType::In, 10, day(1));
        let (_, change) = record(&mut p, MoveType::Out, 25, day(2));
        assert_eq!(p.current_qty(), 0);
        assert_eq!(change.clamped, 15);
        assert!(change.was_clamped());
    }

    #[test]
    fn delete_reverses_create() {
        let mut p = product();
        record(&mut p, MoveType::In, 50, day(1));
        let out = movement(&p, MoveType::Out, 20, day(2));
        StockProjector::on_movement_created(&mut p, &out).unwrap();
        assert_eq!(p.current_qty(), 30);

        StockProjector::on_movement_deleted(&mut p, &out).unwrap();
        assert_eq!(p.current_qty(), 50);
    }

    #[test]
    fn delete_after_clamp_does_not_restore_previous_value() {
        // 10 in, 25 out (clamped to 0), then deleting the OUT adds 25 back: 25, not 10.
        let mut p = product();
        record(&mut p, MoveType::In, 10, day(1));
        let out = movement(&p, MoveType::Out, 25, day(2));
        StockProjector::on_movement_created(&mut p, &out).unwrap();
        StockProjector::on_movement_deleted(&mut p, &out).unwrap();
        assert_eq!(p.current_qty(), 25);
    }

    #[test]
    fn foreign_movement_is_rejected() {
        let mut p = product();
        let other = product();
        let m = movement(&other, MoveType::In, 1, day(1));
        let err = StockProjector::on_movement_created(&mut p, &m).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(p.current_qty(), 0);
    }

    #[test]
    fn three_movement_scenario() {
        let mut p = product();
        let ledger = vec![
            movement(&p, MoveType::In, 100, day(1)),
            movement(&p, MoveType::Out, 30, day(5)),
            movement(&p, MoveType::In, 10, day(10)),
        ];
        for m in &ledger {
            StockProjector::on_movement_created(&mut p, m).unwrap();
        }
        assert_eq!(p.current_qty(), 80);

        assert_eq!(net_after(&ledger, end_of_day(5)), 10);
        assert_eq!(StockProjector::as_of(p.current_qty(), net_after(&ledger, end_of_day(5))), 70);

        assert_eq!(net_after(&ledger, end_of_day(1)), -20);
        assert_eq!(StockProjector::as_of(p.current_qty(), net_after(&ledger, end_of_day(1))), 100);
    }

    #[test]
    fn as_of_now_is_current_and_before_history_is_zero() {
        let mut p = product();
        let ledger = vec![
            movement(&p, MoveType::In, 100, day(1)),
            movement(&p, MoveType::Out, 30, day(5)),
        ];
        for m in &ledger {
            StockProjector::on_movement_created(&mut p, m).unwrap();
        }
        let now = day(20);
        assert_eq!(StockProjector::as_of(p.current_qty(), net_after(&ledger, now)), p.current_qty());

        let before_everything = day(1) - Duration::days(1);
        assert_eq!(StockProjector::as_of(p.current_qty(), net_after(&ledger, before_everything)), 0);
    }

    #[test]
    fn as_of_clamps_when_net_after_exceeds_current() {
        assert_eq!(StockProjector::as_of(5, 9), 0);
        assert_eq!(StockProjector::as_of(5, i64::MIN), 5u64.saturating_add(i64::MAX as u64));
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn arb_moves() -> impl Strategy<Value = Vec<(bool, u64)>> {
            prop::collection::vec((any::<bool>(), 1u64..500), 0..60)
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: current_qty equals the per-step clamped running sum.
            #[test]
            fn current_qty_is_clamped_running_sum(moves in arb_moves()) {
                let mut p = product();
                let mut expected: i64 = 0;
                for (inbound, qty) in moves {
                    let move_type = if inbound { MoveType::In } else { MoveType::Out };
                    record(&mut p, move_type, qty, day(1));
                    expected = (expected + StockProjector::signed_delta(move_type, qty)).max(0);
                    prop_assert_eq!(p.current_qty(), expected as u64);
                }
            }

            /// Property: without clamping, create then delete restores the previous value.
            #[test]
            fn create_then_delete_is_identity_without_clamp(start in 0u64..10_000, qty in 1u64..10_000, inbound in any::<bool>()) {
                let mut p = product();
                p.set_projected_qty(start);
                let move_type = if inbound { MoveType::In } else { MoveType::Out };
                prop_assume!(inbound || qty <= start);

                let m = movement(&p, move_type, qty, day(1));
                StockProjector::on_movement_created(&mut p, &m).unwrap();
                StockProjector::on_movement_deleted(&mut p, &m).unwrap();
                prop_assert_eq!(p.current_qty(), start);
            }

            /// Property: if the running total never clamped, as_of matches forward replay.
            #[test]
            fn as_of_matches_forward_replay_without_clamp(qtys in prop::collection::vec(1u64..100, 1..30), cut in 0usize..30) {
                let mut p = product();
                let mut ledger = Vec::new();
                // Alternate IN 2q / OUT q so the running total stays positive.
                for (i, q) in qtys.iter().enumerate() {
                    let at = day(1) + Duration::hours(i as i64);
                    ledger.push(movement(&p, MoveType::In, q * 2, at));
                    ledger.push(movement(&p, MoveType::Out, *q, at + Duration::minutes(30)));
                }
                for m in &ledger {
                    StockProjector::on_movement_created(&mut p, m).unwrap();
                }

                let cut = cut.min(ledger.len() - 1);
                let cutoff = ledger[cut].created_at;
                let replayed: i64 = ledger.iter().filter(|m| m.created_at <= cutoff).map(StockMovement::signed_quantity).sum();
                prop_assert_eq!(
                    StockProjector::as_of(p.current_qty(), net_after(&ledger, cutoff)),
                    replayed as u64
                );
            }
        }
    }
}
