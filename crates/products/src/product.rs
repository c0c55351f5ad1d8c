use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, Entity, ProductId};

use crate::category::Category;

/// Bags per pallet when a product does not specify its own size.
pub const DEFAULT_PALLET_SIZE: u32 = 64;

const MAX_NAME_CHARS: usize = 150;

/// `NUMERIC(10, 2)`: eight integer digits.
const MAX_UNIT_PRICE_EXCLUSIVE: i64 = 100_000_000;

/// Catalog product.
///
/// `current_qty` is a cached value derived from the stock ledger. Catalog
/// commands never touch it; only the stock projector moves it, through
/// [`Product::set_projected_qty`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    name: String,
    description: String,
    category: Category,
    unit_price: Decimal,
    min_stock: u64,
    pallet_size: u32,
    current_qty: u64,
    created_at: DateTime<Utc>,
}

/// Flat, storage-shaped view of a product (all fields public).
///
/// Stores load rows into this and convert with `Product::from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub category: Category,
    pub unit_price: Decimal,
    pub min_stock: u64,
    pub pallet_size: u32,
    pub current_qty: u64,
    pub created_at: DateTime<Utc>,
}

/// Command: CreateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: Category,
    pub unit_price: Decimal,
    #[serde(default)]
    pub min_stock: u64,
    #[serde(default = "default_pallet_size")]
    pub pallet_size: u32,
}

/// Command: UpdateProduct. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub unit_price: Option<Decimal>,
    pub min_stock: Option<u64>,
    pub pallet_size: Option<u32>,
}

fn default_pallet_size() -> u32 {
    DEFAULT_PALLET_SIZE
}

impl Product {
    /// Validate a create command and build a product with zero stock.
    pub fn create(id: ProductId, cmd: CreateProduct, now: DateTime<Utc>) -> DomainResult<Self> {
        let name = validate_name(&cmd.name)?;
        validate_unit_price(cmd.unit_price)?;
        validate_pallet_size(cmd.pallet_size)?;

        Ok(Self {
            id,
            name,
            description: cmd.description,
            category: cmd.category,
            unit_price: cmd.unit_price.normalize(),
            min_stock: cmd.min_stock,
            pallet_size: cmd.pallet_size,
            current_qty: 0,
            created_at: now,
        })
    }

    /// Apply an edit to the catalog fields.
    ///
    /// All fields are validated before any of them is changed.
    pub fn update(&mut self, cmd: UpdateProduct) -> DomainResult<()> {
        let name = cmd.name.as_deref().map(validate_name).transpose()?;
        if let Some(price) = cmd.unit_price {
            validate_unit_price(price)?;
        }
        if let Some(size) = cmd.pallet_size {
            validate_pallet_size(size)?;
        }

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(description) = cmd.description {
            self.description = description;
        }
        if let Some(category) = cmd.category {
            self.category = category;
        }
        if let Some(price) = cmd.unit_price {
            self.unit_price = price.normalize();
        }
        if let Some(min_stock) = cmd.min_stock {
            self.min_stock = min_stock;
        }
        if let Some(size) = cmd.pallet_size {
            self.pallet_size = size;
        }
        Ok(())
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    pub fn min_stock(&self) -> u64 {
        self.min_stock
    }

    pub fn pallet_size(&self) -> u32 {
        self.pallet_size
    }

    /// Pallet size used for unit conversion; rows stored with 0 fall back to the default.
    pub fn effective_pallet_size(&self) -> u32 {
        if self.pallet_size == 0 {
            DEFAULT_PALLET_SIZE
        } else {
            self.pallet_size
        }
    }

    pub fn current_qty(&self) -> u64 {
        self.current_qty
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Overwrite the cached quantity. Only the stock projector calls this.
    pub fn set_projected_qty(&mut self, qty: u64) {
        self.current_qty = qty;
    }

    /// Whole pallets and remaining bags in the current stock.
    pub fn pallet_breakdown(&self) -> (u64, u64) {
        let size = u64::from(self.effective_pallet_size());
        (self.current_qty / size, self.current_qty % size)
    }

    /// e.g. `"3 palet + 12 çuval"`.
    pub fn pallet_stock_text(&self) -> String {
        let (pallets, bags) = self.pallet_breakdown();
        format!("{pallets} palet + {bags} çuval")
    }

    /// Stock value at the unit price.
    pub fn total_value(&self) -> Decimal {
        self.value_of(self.current_qty)
    }

    /// Value of an arbitrary quantity of this product at its unit price.
    pub fn value_of(&self, qty: u64) -> Decimal {
        self.unit_price * Decimal::from(qty)
    }

    pub fn pallet_price(&self) -> Decimal {
        self.unit_price * Decimal::from(self.pallet_size)
    }

    pub fn stock_ok(&self) -> bool {
        self.current_qty >= self.min_stock
    }

    pub fn is_low_stock(&self) -> bool {
        !self.stock_ok()
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.current_qty == 0
    }

    pub fn to_record(&self) -> ProductRecord {
        ProductRecord {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            category: self.category,
            unit_price: self.unit_price,
            min_stock: self.min_stock,
            pallet_size: self.pallet_size,
            current_qty: self.current_qty,
            created_at: self.created_at,
        }
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

impl From<ProductRecord> for Product {
    fn from(r: ProductRecord) -> Self {
        Self {
            id: r.id,
            name: r.name,
            description: r.description,
            category: r.category,
            unit_price: r.unit_price,
            min_stock: r.min_stock,
            pallet_size: r.pallet_size,
            current_qty: r.current_qty,
            created_at: r.created_at,
        }
    }
}

impl core::fmt::Display for Product {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.name)
    }
}

fn validate_name(raw: &str) -> DomainResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(DomainError::validation("name", "name cannot be empty"));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(DomainError::validation(
            "name",
            format!("name cannot exceed {MAX_NAME_CHARS} characters"),
        ));
    }
    Ok(name.to_string())
}

fn validate_unit_price(price: Decimal) -> DomainResult<()> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(DomainError::validation("unit_price", "unit price cannot be negative"));
    }
    if price.round_dp(2) != price {
        return Err(DomainError::validation(
            "unit_price",
            "unit price allows at most 2 decimal places",
        ));
    }
    if price >= Decimal::from(MAX_UNIT_PRICE_EXCLUSIVE) {
        return Err(DomainError::validation("unit_price", "unit price is too large"));
    }
    Ok(())
}

fn validate_pallet_size(size: u32) -> DomainResult<()> {
    if size == 0 {
        return Err(DomainError::validation("pallet_size", "pallet size must be at least 1"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 1, 8, 0, 0).unwrap()
    }

    fn create_cmd() -> CreateProduct {
        CreateProduct {
            name: "Hazır Sıva".to_string(),
            description: String::new(),
            category: Category::DecorativePlaster,
            unit_price: Decimal::new(12550, 2),
            min_stock: 100,
            pallet_size: DEFAULT_PALLET_SIZE,
        }
    }

    fn product() -> Product {
        Product::create(ProductId::new(), create_cmd(), test_time()).unwrap()
    }

    #[test]
    fn create_starts_with_zero_stock() {
        let p = product();
        assert_eq!(p.current_qty(), 0);
        assert_eq!(p.name(), "Hazır Sıva");
        assert_eq!(p.pallet_size(), 64);
        assert_eq!(p.created_at(), test_time());
    }

    #[test]
    fn create_trims_name() {
        let mut cmd = create_cmd();
        cmd.name = "  Yapıştırıcı Harç  ".to_string();
        let p = Product::create(ProductId::new(), cmd, test_time()).unwrap();
        assert_eq!(p.name(), "Yapıştırıcı Harç");
    }

    #[test]
    fn create_rejects_empty_name() {
        let mut cmd = create_cmd();
        cmd.name = "   ".to_string();
        let err = Product::create(ProductId::new(), cmd, test_time()).unwrap_err();
        assert_eq!(err.field(), Some("name"));
    }

    #[test]
    fn create_rejects_overlong_name() {
        let mut cmd = create_cmd();
        cmd.name = "x".repeat(151);
        let err = Product::create(ProductId::new(), cmd, test_time()).unwrap_err();
        assert_eq!(err.field(), Some("name"));
    }

    #[test]
    fn create_rejects_negative_price() {
        let mut cmd = create_cmd();
        cmd.unit_price = Decimal::new(-1, 0);
        let err = Product::create(ProductId::new(), cmd, test_time()).unwrap_err();
        assert_eq!(err.field(), Some("unit_price"));
    }

    #[test]
    fn create_rejects_sub_cent_price() {
        let mut cmd = create_cmd();
        cmd.unit_price = Decimal::new(10001, 3);
        let err = Product::create(ProductId::new(), cmd, test_time()).unwrap_err();
        assert_eq!(err.field(), Some("unit_price"));
    }

    #[test]
    fn create_accepts_free_product() {
        let mut cmd = create_cmd();
        cmd.unit_price = Decimal::ZERO;
        assert!(Product::create(ProductId::new(), cmd, test_time()).is_ok());
    }

    #[test]
    fn create_rejects_zero_pallet_size() {
        let mut cmd = create_cmd();
        cmd.pallet_size = 0;
        let err = Product::create(ProductId::new(), cmd, test_time()).unwrap_err();
        assert_eq!(err.field(), Some("pallet_size"));
    }

    #[test]
    fn update_changes_only_given_fields() {
        let mut p = product();
        p.update(UpdateProduct {
            min_stock: Some(5),
            pallet_size: Some(40),
            ..UpdateProduct::default()
        })
        .unwrap();
        assert_eq!(p.min_stock(), 5);
        assert_eq!(p.pallet_size(), 40);
        assert_eq!(p.name(), "Hazır Sıva");
        assert_eq!(p.category(), Category::DecorativePlaster);
    }

    #[test]
    fn update_is_all_or_nothing() {
        let mut p = product();
        let before = p.clone();
        let err = p
            .update(UpdateProduct {
                name: Some("Yeni Ad".to_string()),
                pallet_size: Some(0),
                ..UpdateProduct::default()
            })
            .unwrap_err();
        assert_eq!(err.field(), Some("pallet_size"));
        assert_eq!(p, before);
    }

    #[test]
    fn update_never_touches_current_qty() {
        let mut p = product();
        p.set_projected_qty(77);
        p.update(UpdateProduct {
            name: Some("Başka".to_string()),
            ..UpdateProduct::default()
        })
        .unwrap();
        assert_eq!(p.current_qty(), 77);
    }

    #[test]
    fn pallet_breakdown_splits_stock() {
        let mut p = product();
        p.set_projected_qty(64 * 3 + 12);
        assert_eq!(p.pallet_breakdown(), (3, 12));
        assert_eq!(p.pallet_stock_text(), "3 palet + 12 çuval");
    }

    #[test]
    fn value_properties() {
        let mut p = product();
        p.set_projected_qty(10);
        assert_eq!(p.total_value(), Decimal::new(125500, 2));
        assert_eq!(p.pallet_price(), Decimal::new(12550, 2) * Decimal::from(64));
    }

    #[test]
    fn stock_flags() {
        let mut p = product();
        assert!(p.is_out_of_stock());
        assert!(p.is_low_stock());

        p.set_projected_qty(100);
        assert!(p.stock_ok());
        assert!(!p.is_low_stock());
        assert!(!p.is_out_of_stock());
    }

    #[test]
    fn legacy_zero_pallet_size_falls_back_to_default() {
        let mut record = product().to_record();
        record.pallet_size = 0;
        record.current_qty = 130;
        let p = Product::from(record);
        assert_eq!(p.effective_pallet_size(), DEFAULT_PALLET_SIZE);
        assert_eq!(p.pallet_breakdown(), (2, 2));
    }

    #[test]
    fn record_round_trip_preserves_state() {
        let mut p = product();
        p.set_projected_qty(9);
        assert_eq!(Product::from(p.to_record()), p);
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: pallets * size + bags always equals the stock.
            #[test]
            fn pallet_breakdown_recomposes(qty in 0u64..1_000_000, size in 1u32..500) {
                let mut cmd = create_cmd();
                cmd.pallet_size = size;
                let mut p = Product::create(ProductId::new(), cmd, test_time()).unwrap();
                p.set_projected_qty(qty);

                let (pallets, bags) = p.pallet_breakdown();
                prop_assert!(bags < u64::from(size));
                prop_assert_eq!(pallets * u64::from(size) + bags, qty);
            }

            /// Property: low stock is exactly "below the minimum".
            #[test]
            fn low_stock_matches_threshold(qty in 0u64..10_000, min in 0u64..10_000) {
                let mut cmd = create_cmd();
                cmd.min_stock = min;
                let mut p = Product::create(ProductId::new(), cmd, test_time()).unwrap();
                p.set_projected_qty(qty);
                prop_assert_eq!(p.is_low_stock(), qty < min);
            }
        }
    }
}
