//! Ledger filters and grouped aggregation.
//!
//! Stores translate [`MovementFilter`] and [`GroupBy`] into their own query
//! language; [`aggregate`] is the reference implementation over in-memory
//! records.

use core::str::FromStr;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, ProductId};

use crate::movement::{MoveType, StockMovement};
use crate::reason::Reason;

/// Which movements a query covers. Unset fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovementFilter {
    pub product_id: Option<ProductId>,
    pub move_type: Option<MoveType>,
    pub reason: Option<Reason>,
    /// `created_at >= since`
    pub since: Option<DateTime<Utc>>,
    /// `created_at > after`
    pub after: Option<DateTime<Utc>>,
    /// `created_at <= until`
    pub until: Option<DateTime<Utc>>,
    /// Case-insensitive substring of product name, reason label or note.
    pub search: Option<String>,
}

impl MovementFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_product(mut self, product_id: ProductId) -> Self {
        self.product_id = Some(product_id);
        self
    }

    pub fn of_type(mut self, move_type: MoveType) -> Self {
        self.move_type = Some(move_type);
        self
    }

    pub fn with_reason(mut self, reason: Reason) -> Self {
        self.reason = Some(reason);
        self
    }

    pub fn since(mut self, at: DateTime<Utc>) -> Self {
        self.since = Some(at);
        self
    }

    pub fn after(mut self, at: DateTime<Utc>) -> Self {
        self.after = Some(at);
        self
    }

    pub fn until(mut self, at: DateTime<Utc>) -> Self {
        self.until = Some(at);
        self
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.search = (!text.trim().is_empty()).then(|| text.trim().to_string());
        self
    }

    /// Whether `m` passes the filter. `product_name` is only consulted for `search`.
    pub fn matches(&self, m: &StockMovement, product_name: Option<&str>) -> bool {
        if self.product_id.is_some_and(|p| p != m.product_id) {
            return false;
        }
        if self.move_type.is_some_and(|t| t != m.move_type) {
            return false;
        }
        if self.reason.is_some_and(|r| r != m.reason) {
            return false;
        }
        if self.since.is_some_and(|t| m.created_at < t) {
            return false;
        }
        if self.after.is_some_and(|t| m.created_at <= t) {
            return false;
        }
        if self.until.is_some_and(|t| m.created_at > t) {
            return false;
        }
        if let Some(needle) = &self.search {
            let needle = fold_case(needle);
            let hit = fold_case(m.reason.label()).contains(&needle)
                || fold_case(&m.note).contains(&needle)
                || product_name.is_some_and(|n| fold_case(n).contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }
}

/// Search key for case-insensitive matching.
///
/// Lowercases, and folds the Turkish `İ`, `I` and `ı` to `i`, so `iade`
/// finds `İade` and `SIVA` finds `Sıva`. The Postgres store applies the same
/// folding with `translate(.., 'İIı', 'iii')` before `ILIKE`.
pub fn fold_case(text: &str) -> String {
    text.chars()
        .flat_map(|c| match c {
            'İ' | 'I' | 'ı' => 'i'.to_lowercase(),
            other => other.to_lowercase(),
        })
        .collect()
}

/// Grouping dimensions for [`aggregate`]. All `false` means one total row.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct GroupBy {
    pub product: bool,
    pub move_type: bool,
    pub reason: bool,
}

impl GroupBy {
    pub const NONE: GroupBy = GroupBy {
        product: false,
        move_type: false,
        reason: false,
    };

    pub const PRODUCT: GroupBy = GroupBy {
        product: true,
        move_type: false,
        reason: false,
    };

    pub const REASON_AND_TYPE: GroupBy = GroupBy {
        product: false,
        move_type: true,
        reason: true,
    };

    pub fn is_total(&self) -> bool {
        *self == Self::NONE
    }

    pub fn key_for(&self, m: &StockMovement) -> GroupKey {
        GroupKey {
            product_id: self.product.then_some(m.product_id),
            move_type: self.move_type.then_some(m.move_type),
            reason: self.reason.then_some(m.reason),
        }
    }
}

impl FromStr for GroupBy {
    type Err = DomainError;

    /// Comma-separated list of `product`, `move_type`, `reason`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut g = GroupBy::NONE;
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part {
                "product" => g.product = true,
                "move_type" => g.move_type = true,
                "reason" => g.reason = true,
                other => {
                    return Err(DomainError::validation(
                        "group_by",
                        format!("unknown grouping '{other}' (expected product, move_type, reason)"),
                    ));
                }
            }
        }
        Ok(g)
    }
}

/// Group key; dimensions not grouped on are `None`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub product_id: Option<ProductId>,
    pub move_type: Option<MoveType>,
    pub reason: Option<Reason>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub key: GroupKey,
    pub total: i64,
}

/// Sum quantities per group, ordered by key.
///
/// `signed` sums `+quantity` for IN and `-quantity` for OUT; otherwise raw
/// quantities. With [`GroupBy::NONE`] the result is always exactly one row
/// (total 0 for an empty input).
pub fn aggregate<'a>(
    movements: impl IntoIterator<Item = &'a StockMovement>,
    group_by: GroupBy,
    signed: bool,
) -> Vec<AggregateRow> {
    let mut totals: BTreeMap<GroupKey, i64> = BTreeMap::new();
    if group_by.is_total() {
        totals.insert(GroupKey::default(), 0);
    }

    for m in movements {
        let amount = if signed {
            m.signed_quantity()
        } else {
            i64::try_from(m.quantity).unwrap_or(i64::MAX)
        };
        let total = totals.entry(group_by.key_for(m)).or_insert(0);
        *total = total.saturating_add(amount);
    }

    totals
        .into_iter()
        .map(|(key, total)| AggregateRow { key, total })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use stockroom_core::MovementId;

    use crate::movement::Unit;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 1, 10, 0, 0).unwrap()
    }

    fn mv(product_id: ProductId, move_type: MoveType, reason: Reason, quantity: u64, minutes: i64) -> StockMovement {
        StockMovement {
            id: MovementId::new(),
            product_id,
            move_type,
            reason,
            quantity,
            unit: Unit::Piece,
            note: String::new(),
            created_at: t0() + Duration::minutes(minutes),
        }
    }

    #[test]
    fn total_of_nothing_is_a_single_zero_row() {
        let rows = aggregate(std::iter::empty(), GroupBy::NONE, true);
        assert_eq!(rows, vec![AggregateRow { key: GroupKey::default(), total: 0 }]);
    }

    #[test]
    fn grouped_aggregate_of_nothing_is_empty() {
        assert!(aggregate(std::iter::empty(), GroupBy::PRODUCT, true).is_empty());
    }

    #[test]
    fn signed_and_raw_sums_per_product() {
        let a = ProductId::new();
        let b = ProductId::new();
        let ledger = vec![
            mv(a, MoveType::In, Reason::Purchase, 100, 0),
            mv(a, MoveType::Out, Reason::Sale, 30, 1),
            mv(b, MoveType::Out, Reason::Damage, 5, 2),
        ];

        let signed = aggregate(&ledger, GroupBy::PRODUCT, true);
        let raw = aggregate(&ledger, GroupBy::PRODUCT, false);

        let total = |rows: &[AggregateRow], p: ProductId| {
            rows.iter().find(|r| r.key.product_id == Some(p)).map(|r| r.total)
        };
        assert_eq!(total(&signed, a), Some(70));
        assert_eq!(total(&signed, b), Some(-5));
        assert_eq!(total(&raw, a), Some(130));
        assert_eq!(total(&raw, b), Some(5));
    }

    #[test]
    fn group_by_reason_and_type_keeps_correction_directions_apart() {
        let p = ProductId::new();
        let ledger = vec![
            mv(p, MoveType::In, Reason::Correction, 4, 0),
            mv(p, MoveType::Out, Reason::Correction, 6, 1),
        ];
        let rows = aggregate(&ledger, GroupBy::REASON_AND_TYPE, false);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.key.product_id.is_none()));
    }

    #[test]
    fn time_bounds_are_inclusive_or_strict_as_named() {
        let p = ProductId::new();
        let m = mv(p, MoveType::In, Reason::Purchase, 1, 0);
        assert!(MovementFilter::all().since(m.created_at).matches(&m, None));
        assert!(!MovementFilter::all().after(m.created_at).matches(&m, None));
        assert!(MovementFilter::all().until(m.created_at).matches(&m, None));
        assert!(!MovementFilter::all().until(m.created_at - Duration::seconds(1)).matches(&m, None));
    }

    #[test]
    fn filter_by_product_type_and_reason() {
        let p = ProductId::new();
        let m = mv(p, MoveType::Out, Reason::Loss, 2, 0);
        assert!(MovementFilter::all().for_product(p).of_type(MoveType::Out).with_reason(Reason::Loss).matches(&m, None));
        assert!(!MovementFilter::all().for_product(ProductId::new()).matches(&m, None));
        assert!(!MovementFilter::all().of_type(MoveType::In).matches(&m, None));
        assert!(!MovementFilter::all().with_reason(Reason::Sale).matches(&m, None));
    }

    #[test]
    fn search_covers_product_name_reason_and_note() {
        let p = ProductId::new();
        let mut m = mv(p, MoveType::Out, Reason::Shrinkage, 2, 0);
        m.note = "Depo B rafı".to_string();

        assert!(MovementFilter::all().search("fire").matches(&m, None));
        assert!(MovementFilter::all().search("depo b").matches(&m, None));
        assert!(MovementFilter::all().search("sıva").matches(&m, Some("Hazır Sıva")));
        assert!(!MovementFilter::all().search("sıva").matches(&m, None));
        assert_eq!(MovementFilter::all().search("   ").search, None);
    }

    #[test]
    fn search_folds_turkish_i() {
        let p = ProductId::new();
        let m = mv(p, MoveType::In, Reason::Return, 2, 0);

        assert!(MovementFilter::all().search("iade").matches(&m, None));
        assert!(MovementFilter::all().search("İADE").matches(&m, None));
        assert!(MovementFilter::all().search("SIVA").matches(&m, Some("Dekoratif Sıva")));
        assert_eq!(fold_case("İade"), "iade");
        assert_eq!(fold_case("ISI Yalıtım"), "isi yalitim");
    }

    #[test]
    fn parse_group_by() {
        assert_eq!("".parse::<GroupBy>().unwrap(), GroupBy::NONE);
        assert_eq!("product".parse::<GroupBy>().unwrap(), GroupBy::PRODUCT);
        assert_eq!("reason, move_type".parse::<GroupBy>().unwrap(), GroupBy::REASON_AND_TYPE);
        assert_eq!("colour".parse::<GroupBy>().unwrap_err().field(), Some("group_by"));
    }
}
