use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, Entity, MovementId, ProductId};
use stockroom_products::Product;

use crate::reason::Reason;

/// Largest quantity (in bags) a single movement may carry.
pub const MAX_QUANTITY: u64 = i32::MAX as u64;

pub const MAX_NOTE_CHARS: usize = 255;

/// Direction of a stock movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MoveType {
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "OUT")]
    Out,
}

impl MoveType {
    pub fn as_str(self) -> &'static str {
        match self {
            MoveType::In => "IN",
            MoveType::Out => "OUT",
        }
    }

    /// `+1` for inbound, `-1` for outbound.
    pub fn sign(self) -> i64 {
        match self {
            MoveType::In => 1,
            MoveType::Out => -1,
        }
    }
}

impl core::fmt::Display for MoveType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MoveType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IN" => Ok(MoveType::In),
            "OUT" => Ok(MoveType::Out),
            other => Err(DomainError::validation(
                "move_type",
                format!("move type must be IN or OUT, got '{other}'"),
            )),
        }
    }
}

/// Unit the quantity was entered in.
///
/// Only an input-time multiplier: stored quantities are always bags.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    #[default]
    #[serde(rename = "Adet", alias = "piece")]
    Piece,
    #[serde(rename = "Palet", alias = "pallet")]
    Pallet,
}

impl Unit {
    pub fn label(self) -> &'static str {
        match self {
            Unit::Piece => "Adet",
            Unit::Pallet => "Palet",
        }
    }
}

impl core::fmt::Display for Unit {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Unit {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Adet" => Ok(Unit::Piece),
            "Palet" => Ok(Unit::Pallet),
            other if other.eq_ignore_ascii_case("piece") => Ok(Unit::Piece),
            other if other.eq_ignore_ascii_case("pallet") => Ok(Unit::Pallet),
            other => Err(DomainError::validation("unit", format!("unknown unit '{other}'"))),
        }
    }
}

/// Convert a submitted quantity to bags.
///
/// Returns `None` on overflow.
pub fn normalize_quantity(quantity: u64, unit: Unit, pallet_size: u32) -> Option<u64> {
    match unit {
        Unit::Piece => Some(quantity),
        Unit::Pallet => quantity.checked_mul(u64::from(pallet_size)),
    }
}

/// A recorded stock movement. `quantity` is always in bags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub move_type: MoveType,
    pub reason: Reason,
    pub quantity: u64,
    pub unit: Unit,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// `+quantity` for IN, `-quantity` for OUT.
    pub fn signed_quantity(&self) -> i64 {
        // MAX_QUANTITY keeps this in range for validated movements.
        let qty = i64::try_from(self.quantity).unwrap_or(i64::MAX);
        self.move_type.sign() * qty
    }

    /// e.g. `"Hazır Sıva +100 (Satın Alma)"`.
    pub fn summary(&self, product_name: &str) -> String {
        let sign = match self.move_type {
            MoveType::In => '+',
            MoveType::Out => '-',
        };
        format!("{product_name} {sign}{} ({})", self.quantity, self.reason)
    }

    /// Apply an edit. Only the note may change; anything that would alter the
    /// movement's stock effect is rejected.
    pub fn apply_edit(&mut self, edit: MovementEdit) -> DomainResult<()> {
        reject_change("product_id", edit.product_id, self.product_id)?;
        reject_change("move_type", edit.move_type, self.move_type)?;
        reject_change("reason", edit.reason, self.reason)?;
        reject_change("quantity", edit.quantity, self.quantity)?;
        reject_change("unit", edit.unit, self.unit)?;
        reject_change("created_at", edit.created_at, self.created_at)?;

        if let Some(note) = edit.note {
            self.note = validate_note(note)?;
        }
        Ok(())
    }
}

impl Entity for StockMovement {
    type Id = MovementId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

fn reject_change<T: PartialEq>(field: &str, proposed: Option<T>, current: T) -> DomainResult<()> {
    match proposed {
        Some(v) if v != current => Err(DomainError::validation(
            field,
            "recorded movements cannot change their stock effect; remove it and record a new one",
        )),
        _ => Ok(()),
    }
}

fn validate_note(note: String) -> DomainResult<String> {
    if note.chars().count() > MAX_NOTE_CHARS {
        return Err(DomainError::validation(
            "note",
            format!("note cannot exceed {MAX_NOTE_CHARS} characters"),
        ));
    }
    Ok(note)
}

/// Edit request for a recorded movement. See [`StockMovement::apply_edit`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementEdit {
    pub product_id: Option<ProductId>,
    pub move_type: Option<MoveType>,
    pub reason: Option<Reason>,
    pub quantity: Option<u64>,
    pub unit: Option<Unit>,
    pub note: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Command: RecordMovement, as submitted by a user or an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMovement {
    pub product_id: ProductId,
    pub move_type: MoveType,
    /// Raw reason; checked against the table for `move_type`.
    pub reason: String,
    /// Quantity in `unit`.
    pub quantity: u64,
    #[serde(default)]
    pub unit: Unit,
    #[serde(default)]
    pub note: String,
    /// Backdating; defaults to the time of recording.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl RecordMovement {
    /// Field-level validation that needs no stored state.
    pub fn validate(self) -> DomainResult<ValidMovement> {
        if self.quantity < 1 {
            return Err(DomainError::validation("quantity", "quantity must be at least 1"));
        }
        let reason = Reason::parse_for(self.move_type, &self.reason)?;
        let note = validate_note(self.note)?;

        Ok(ValidMovement {
            product_id: self.product_id,
            move_type: self.move_type,
            reason,
            quantity: self.quantity,
            unit: self.unit,
            note,
            created_at: self.created_at,
        })
    }
}

/// A movement that passed field validation but is not yet normalized to bags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidMovement {
    product_id: ProductId,
    move_type: MoveType,
    reason: Reason,
    quantity: u64,
    unit: Unit,
    note: String,
    created_at: Option<DateTime<Utc>>,
}

impl ValidMovement {
    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn move_type(&self) -> MoveType {
        self.move_type
    }

    /// Normalize the quantity against the owning product and build the record.
    pub fn into_movement(
        self,
        id: MovementId,
        product: &Product,
        now: DateTime<Utc>,
    ) -> DomainResult<StockMovement> {
        if product.id_typed() != self.product_id {
            return Err(DomainError::invariant("movement product does not match the locked product"));
        }

        let quantity = normalize_quantity(self.quantity, self.unit, product.effective_pallet_size())
            .filter(|q| *q <= MAX_QUANTITY)
            .ok_or_else(|| {
                DomainError::validation(
                    "quantity",
                    format!("quantity cannot exceed {MAX_QUANTITY} bags"),
                )
            })?;

        // Backdating only: a movement after `now` would already count in
        // `current_qty` but be undone by `as_of(now)`.
        let created_at = match self.created_at {
            Some(at) if at > now => {
                return Err(DomainError::validation(
                    "created_at",
                    "movements cannot be recorded in the future",
                ));
            }
            Some(at) => at,
            None => now,
        };

        Ok(StockMovement {
            id,
            product_id: self.product_id,
            move_type: self.move_type,
            reason: self.reason,
            quantity,
            unit: self.unit,
            note: self.note,
            created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use stockroom_products::{Category, CreateProduct};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 10, 9, 30, 0).unwrap()
    }

    fn product(pallet_size: u32) -> Product {
        Product::create(
            ProductId::new(),
            CreateProduct {
                name: "Isı Yalıtım Levhası".to_string(),
                description: String::new(),
                category: Category::ThermalInsulation,
                unit_price: Decimal::new(4000, 2),
                min_stock: 0,
                pallet_size,
            },
            now(),
        )
        .unwrap()
    }

    fn cmd(product: &Product, move_type: MoveType, reason: &str, quantity: u64, unit: Unit) -> RecordMovement {
        RecordMovement {
            product_id: product.id_typed(),
            move_type,
            reason: reason.to_string(),
            quantity,
            unit,
            note: String::new(),
            created_at: None,
        }
    }

    #[test]
    fn two_pallets_become_128_bags() {
        let p = product(64);
        let m = cmd(&p, MoveType::In, "Satın Alma", 2, Unit::Pallet)
            .validate()
            .unwrap()
            .into_movement(MovementId::new(), &p, now())
            .unwrap();
        assert_eq!(m.quantity, 128);
        assert_eq!(m.unit, Unit::Pallet);
    }

    #[test]
    fn pieces_are_kept_as_is() {
        assert_eq!(normalize_quantity(7, Unit::Piece, 64), Some(7));
    }

    #[test]
    fn pallet_normalization_overflow_is_detected() {
        assert_eq!(normalize_quantity(u64::MAX, Unit::Pallet, 2), None);
    }

    #[test]
    fn oversized_pallet_quantity_is_a_quantity_error() {
        let p = product(64);
        let err = cmd(&p, MoveType::In, "Üretim", MAX_QUANTITY, Unit::Pallet)
            .validate()
            .unwrap()
            .into_movement(MovementId::new(), &p, now())
            .unwrap_err();
        assert_eq!(err.field(), Some("quantity"));
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let p = product(64);
        let err = cmd(&p, MoveType::In, "Üretim", 0, Unit::Piece).validate().unwrap_err();
        assert_eq!(err.field(), Some("quantity"));
    }

    #[test]
    fn out_with_production_reason_is_rejected() {
        let p = product(64);
        let err = cmd(&p, MoveType::Out, "Üretim", 5, Unit::Piece).validate().unwrap_err();
        assert_eq!(err.field(), Some("reason"));
    }

    #[test]
    fn long_note_is_rejected() {
        let p = product(64);
        let mut c = cmd(&p, MoveType::Out, "Satış", 5, Unit::Piece);
        c.note = "n".repeat(MAX_NOTE_CHARS + 1);
        assert_eq!(c.validate().unwrap_err().field(), Some("note"));
    }

    #[test]
    fn created_at_defaults_to_now_but_may_be_backdated() {
        let p = product(64);
        let m = cmd(&p, MoveType::In, "İade", 1, Unit::Piece)
            .validate()
            .unwrap()
            .into_movement(MovementId::new(), &p, now())
            .unwrap();
        assert_eq!(m.created_at, now());

        let earlier = Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap();
        let mut c = cmd(&p, MoveType::In, "İade", 1, Unit::Piece);
        c.created_at = Some(earlier);
        let m = c.validate().unwrap().into_movement(MovementId::new(), &p, now()).unwrap();
        assert_eq!(m.created_at, earlier);
    }

    #[test]
    fn future_timestamp_is_rejected() {
        let p = product(64);
        let mut c = cmd(&p, MoveType::In, "Satın Alma", 50, Unit::Piece);
        c.created_at = Some(now() + chrono::Duration::days(365));
        let err = c
            .validate()
            .unwrap()
            .into_movement(MovementId::new(), &p, now())
            .unwrap_err();
        assert_eq!(err.field(), Some("created_at"));

        let mut c = cmd(&p, MoveType::In, "Satın Alma", 50, Unit::Piece);
        c.created_at = Some(now());
        let m = c.validate().unwrap().into_movement(MovementId::new(), &p, now()).unwrap();
        assert_eq!(m.created_at, now());
    }

    #[test]
    fn into_movement_requires_matching_product() {
        let p = product(64);
        let other = product(64);
        let err = cmd(&p, MoveType::In, "Üretim", 1, Unit::Piece)
            .validate()
            .unwrap()
            .into_movement(MovementId::new(), &other, now())
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn signed_quantity_and_summary() {
        let p = product(64);
        let m = cmd(&p, MoveType::Out, "Hasar", 3, Unit::Piece)
            .validate()
            .unwrap()
            .into_movement(MovementId::new(), &p, now())
            .unwrap();
        assert_eq!(m.signed_quantity(), -3);
        assert_eq!(m.summary(p.name()), "Isı Yalıtım Levhası -3 (Hasar)");
    }

    #[test]
    fn edit_may_change_note_only() {
        let p = product(64);
        let mut m = cmd(&p, MoveType::Out, "Satış", 3, Unit::Piece)
            .validate()
            .unwrap()
            .into_movement(MovementId::new(), &p, now())
            .unwrap();

        m.apply_edit(MovementEdit {
            note: Some("fatura 42".to_string()),
            quantity: Some(3),
            ..MovementEdit::default()
        })
        .unwrap();
        assert_eq!(m.note, "fatura 42");

        let before = m.clone();
        let err = m
            .apply_edit(MovementEdit {
                quantity: Some(4),
                note: Some("x".to_string()),
                ..MovementEdit::default()
            })
            .unwrap_err();
        assert_eq!(err.field(), Some("quantity"));
        assert_eq!(m, before);
    }

    #[test]
    fn parse_move_type_and_unit() {
        assert_eq!("out".parse::<MoveType>().unwrap(), MoveType::Out);
        assert_eq!("Palet".parse::<Unit>().unwrap(), Unit::Pallet);
        assert_eq!("piece".parse::<Unit>().unwrap(), Unit::Piece);
        assert_eq!("SIDEWAYS".parse::<MoveType>().unwrap_err().field(), Some("move_type"));
    }
}
