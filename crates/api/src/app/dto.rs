use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, ProductId};
use stockroom_inventory::{
    AggregateRow, GroupBy, GroupKey, MoveType, MovementEdit, MovementFilter, Reason,
    RecordMovement, StockChange, StockMovement, Unit,
};
use stockroom_products::{Category, CreateProduct, DEFAULT_PALLET_SIZE, Product, UpdateProduct};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub unit_price: Decimal,
    #[serde(default)]
    pub min_stock: u64,
    pub pallet_size: Option<u32>,
}

impl CreateProductRequest {
    pub fn into_command(self) -> DomainResult<CreateProduct> {
        Ok(CreateProduct {
            name: self.name,
            description: self.description,
            category: self.category.parse()?,
            unit_price: self.unit_price,
            min_stock: self.min_stock,
            pallet_size: self.pallet_size.unwrap_or(DEFAULT_PALLET_SIZE),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub unit_price: Option<Decimal>,
    pub min_stock: Option<u64>,
    pub pallet_size: Option<u32>,
}

impl UpdateProductRequest {
    pub fn into_command(self) -> DomainResult<UpdateProduct> {
        Ok(UpdateProduct {
            name: self.name,
            description: self.description,
            category: self.category.as_deref().map(str::parse).transpose()?,
            unit_price: self.unit_price,
            min_stock: self.min_stock,
            pallet_size: self.pallet_size,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RecordMovementRequest {
    pub product_id: String,
    pub move_type: String,
    pub reason: String,
    pub quantity: u64,
    pub unit: Option<String>,
    #[serde(default)]
    pub note: String,
    pub created_at: Option<String>,
}

impl RecordMovementRequest {
    pub fn into_command(self) -> DomainResult<RecordMovement> {
        Ok(RecordMovement {
            product_id: parse_field("product_id", &self.product_id)?,
            move_type: self.move_type.parse()?,
            reason: self.reason,
            quantity: self.quantity,
            unit: self.unit.as_deref().map(str::parse::<Unit>).transpose()?.unwrap_or_default(),
            note: self.note,
            created_at: self
                .created_at
                .as_deref()
                .map(|raw| parse_timestamp("created_at", raw))
                .transpose()?,
        })
    }
}

/// Amendment body. Only `note` may differ from the recorded movement; the
/// other fields may be echoed back unchanged, and any real change is rejected
/// by [`StockMovement::apply_edit`].
#[derive(Debug, Default, Deserialize)]
pub struct AmendMovementRequest {
    pub note: Option<String>,
    pub product_id: Option<String>,
    pub move_type: Option<String>,
    pub reason: Option<String>,
    pub quantity: Option<u64>,
    pub unit: Option<String>,
    pub created_at: Option<String>,
}

impl AmendMovementRequest {
    pub fn into_edit(self) -> DomainResult<MovementEdit> {
        Ok(MovementEdit {
            product_id: self
                .product_id
                .as_deref()
                .map(|raw| parse_field("product_id", raw))
                .transpose()?,
            move_type: self.move_type.as_deref().map(str::parse::<MoveType>).transpose()?,
            reason: self.reason.as_deref().map(str::parse::<Reason>).transpose()?,
            quantity: self.quantity,
            unit: self.unit.as_deref().map(str::parse::<Unit>).transpose()?,
            note: self.note,
            created_at: self
                .created_at
                .as_deref()
                .map(|raw| parse_timestamp("created_at", raw))
                .transpose()?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    pub category: Option<String>,
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MovementListQuery {
    pub product_id: Option<String>,
    pub move_type: Option<String>,
    pub reason: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub q: Option<String>,
    pub limit: Option<usize>,
}

impl MovementListQuery {
    pub fn to_filter(&self) -> DomainResult<MovementFilter> {
        let mut filter = MovementFilter::all();
        if let Some(raw) = non_empty(&self.product_id) {
            filter = filter.for_product(parse_field("product_id", raw)?);
        }
        if let Some(raw) = non_empty(&self.move_type) {
            filter = filter.of_type(raw.parse()?);
        }
        if let Some(raw) = non_empty(&self.reason) {
            filter = filter.with_reason(raw.parse()?);
        }
        if let Some(raw) = non_empty(&self.since) {
            filter = filter.since(parse_timestamp("since", raw)?);
        }
        if let Some(raw) = non_empty(&self.until) {
            filter = filter.until(parse_timestamp("until", raw)?);
        }
        if let Some(raw) = non_empty(&self.q) {
            filter = filter.search(raw);
        }
        Ok(filter)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AggregateQuery {
    pub group_by: Option<String>,
    #[serde(default)]
    pub signed: bool,
    pub product_id: Option<String>,
    pub move_type: Option<String>,
    pub reason: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub q: Option<String>,
}

impl AggregateQuery {
    pub fn group_by(&self) -> DomainResult<GroupBy> {
        match non_empty(&self.group_by) {
            Some(raw) => raw.parse(),
            None => Ok(GroupBy::NONE),
        }
    }

    pub fn to_filter(&self) -> DomainResult<MovementFilter> {
        MovementListQuery {
            product_id: self.product_id.clone(),
            move_type: self.move_type.clone(),
            reason: self.reason.clone(),
            since: self.since.clone(),
            until: self.until.clone(),
            q: self.q.clone(),
            limit: None,
        }
        .to_filter()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReasonsQuery {
    pub move_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AsOfQuery {
    pub at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MonthlyQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub format: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct PalletBreakdown {
    pub pallets: u64,
    pub bags: u64,
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub category: Category,
    pub category_key: &'static str,
    pub unit_price: Decimal,
    pub min_stock: u64,
    pub pallet_size: u32,
    pub current_qty: u64,
    pub created_at: DateTime<Utc>,
    pub pallet_breakdown: PalletBreakdown,
    pub pallet_stock: String,
    pub total_value: Decimal,
    pub pallet_price: Decimal,
    pub stock_ok: bool,
    pub is_low_stock: bool,
    pub is_out_of_stock: bool,
}

impl From<&Product> for ProductResponse {
    fn from(p: &Product) -> Self {
        let (pallets, bags) = p.pallet_breakdown();
        Self {
            id: p.id_typed(),
            name: p.name().to_string(),
            description: p.description().to_string(),
            category: p.category(),
            category_key: p.category().key(),
            unit_price: p.unit_price(),
            min_stock: p.min_stock(),
            pallet_size: p.pallet_size(),
            current_qty: p.current_qty(),
            created_at: p.created_at(),
            pallet_breakdown: PalletBreakdown { pallets, bags },
            pallet_stock: p.pallet_stock_text(),
            total_value: p.total_value(),
            pallet_price: p.pallet_price(),
            stock_ok: p.stock_ok(),
            is_low_stock: p.is_low_stock(),
            is_out_of_stock: p.is_out_of_stock(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub key: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MovementResponse {
    #[serde(flatten)]
    pub movement: StockMovement,
    pub signed_quantity: i64,
}

impl From<StockMovement> for MovementResponse {
    fn from(movement: StockMovement) -> Self {
        Self {
            signed_quantity: movement.signed_quantity(),
            movement,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StockChangeResponse {
    pub before: u64,
    pub after: u64,
    pub clamped: u64,
}

impl From<StockChange> for StockChangeResponse {
    fn from(c: StockChange) -> Self {
        Self {
            before: c.before,
            after: c.after,
            clamped: c.clamped,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LedgerWriteResponse {
    pub movement: MovementResponse,
    pub stock: StockChangeResponse,
}

#[derive(Debug, Serialize)]
pub struct AggregateRowResponse {
    #[serde(flatten)]
    pub key: GroupKey,
    pub total: i64,
}

impl From<AggregateRow> for AggregateRowResponse {
    fn from(row: AggregateRow) -> Self {
        Self {
            key: row.key,
            total: row.total,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReasonChoice {
    pub key: &'static str,
    pub label: &'static str,
    pub move_types: Vec<MoveType>,
}

impl From<Reason> for ReasonChoice {
    fn from(r: Reason) -> Self {
        Self {
            key: r.key(),
            label: r.label(),
            move_types: [MoveType::In, MoveType::Out]
                .into_iter()
                .filter(|t| r.is_allowed_for(*t))
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AsOfResponse {
    pub product_id: ProductId,
    pub at: DateTime<Utc>,
    pub current_qty: u64,
    pub as_of_qty: u64,
}

// -------------------------
// Parsing helpers
// -------------------------

fn non_empty(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Parse an identifier, reporting failures against the request field.
pub fn parse_field<T>(field: &str, raw: &str) -> DomainResult<T>
where
    T: core::str::FromStr<Err = DomainError>,
{
    raw.trim()
        .parse()
        .map_err(|e: DomainError| DomainError::validation(field, e.to_string()))
}

/// RFC 3339 timestamp, normalized to UTC.
pub fn parse_timestamp(field: &str, raw: &str) -> DomainResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DomainError::validation(field, format!("expected an RFC 3339 timestamp: {e}")))
}
