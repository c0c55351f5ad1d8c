//! Read-side reporting: the operational dashboard and the end-of-month stock
//! snapshot with its workbook and CSV exports.

use std::collections::HashMap;

use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde::Serialize;
use tracing::instrument;

use stockroom_core::ProductId;
use stockroom_inventory::{
    GroupBy, MoveType, MovementFilter, Reason, ReportMonth, SnapshotRow, StockMovement,
    start_of_day,
};
use stockroom_products::Product;

use crate::error::{LedgerError, LedgerResult};
use crate::store::{LedgerStore, ProductQuery};

/// Istanbul has stayed on +03:00 all year since 2016.
pub const DEFAULT_UTC_OFFSET_SECS: i32 = 3 * 3600;

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Longest trailing activity window the dashboard accepts.
pub const MAX_WINDOW_DAYS: i64 = 366;

pub const SNAPSHOT_HEADERS: [&str; 7] = [
    "Ürün",
    "Kategori",
    "Min Stok",
    "Palet",
    "Birim Fiyat",
    "ASOF Stok",
    "Toplam Değer",
];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ReportSettings {
    /// Offset that defines "today" and month boundaries.
    pub offset: FixedOffset,
    /// Trailing window for activity figures, `1..=MAX_WINDOW_DAYS`.
    pub window_days: i64,
    pub recent_limit: usize,
    pub active_limit: usize,
    pub decreasing_limit: usize,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            offset: FixedOffset::east_opt(DEFAULT_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix()),
            window_days: 7,
            recent_limit: 10,
            active_limit: 10,
            decreasing_limit: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockLevel {
    pub product_id: ProductId,
    pub name: String,
    pub current_qty: u64,
    pub min_stock: u64,
    /// e.g. `"2 palet + 10 çuval"`.
    pub pallet_stock: String,
}

impl From<&Product> for StockLevel {
    fn from(p: &Product) -> Self {
        Self {
            product_id: p.id_typed(),
            name: p.name().to_string(),
            current_qty: p.current_qty(),
            min_stock: p.min_stock(),
            pallet_stock: p.pallet_stock_text(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductActivity {
    pub product_id: ProductId,
    pub name: String,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReasonCount {
    pub reason: Reason,
    pub move_type: MoveType,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentMovement {
    #[serde(flatten)]
    pub movement: StockMovement,
    pub product_name: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub generated_at: DateTime<Utc>,
    pub total_products: usize,
    pub total_quantity: u64,
    pub total_value: Decimal,
    pub today_in: i64,
    pub today_out: i64,
    pub low_stock_count: usize,
    /// Ascending by quantity.
    pub low_stock: Vec<StockLevel>,
    pub out_of_stock_count: usize,
    pub window_days: i64,
    /// Highest raw moved quantity in the window, descending.
    pub most_active: Vec<ProductActivity>,
    /// Products whose net change in the window is negative, most negative first.
    pub decreasing: Vec<ProductActivity>,
    pub window_in: i64,
    pub window_out: i64,
    pub window_net: i64,
    pub popular_reasons: Vec<ReasonCount>,
    pub recent: Vec<RecentMovement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlySnapshot {
    #[serde(serialize_with = "serialize_month")]
    pub month: ReportMonth,
    pub cutoff: DateTime<Utc>,
    pub rows: Vec<SnapshotRow>,
}

fn serialize_month<S: serde::Serializer>(month: &ReportMonth, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&month.label())
}

impl MonthlySnapshot {
    /// `ay-sonu-stoklari_YYYY-MM.xlsx`.
    pub fn file_name(&self) -> String {
        self.month.file_name()
    }

    pub fn csv_file_name(&self) -> String {
        format!("{}.csv", self.month.file_stem())
    }

    /// Workbook with a single sheet named after the month: a bold header row,
    /// then one row per product with numeric cells for every figure.
    pub fn to_xlsx(&self) -> LedgerResult<Vec<u8>> {
        self.write_workbook()
            .map_err(|e| LedgerError::Export(format!("XLSX writer error: {e}")))
    }

    fn write_workbook(&self) -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let header = Format::new().set_bold();
        let money = Format::new().set_num_format("#,##0.00");

        {
            let sheet = workbook.add_worksheet();
            sheet.set_name(self.month.label())?;
            for (col, title) in (0u16..).zip(SNAPSHOT_HEADERS) {
                sheet.write_string_with_format(0, col, title, &header)?;
            }
            sheet.set_column_width(0, 32)?;

            for (r, row) in (1u32..).zip(&self.rows) {
                sheet.write_string(r, 0, &row.name)?;
                sheet.write_string(r, 1, &row.category)?;
                sheet.write_number(r, 2, row.min_stock as f64)?;
                sheet.write_number(r, 3, f64::from(row.pallet_size))?;
                sheet.write_number_with_format(r, 4, decimal_cell(row.unit_price), &money)?;
                sheet.write_number(r, 5, row.as_of_qty as f64)?;
                sheet.write_number_with_format(r, 6, decimal_cell(row.total_value), &money)?;
            }
        }

        workbook.save_to_buffer()
    }

    /// CSV with one header line and one line per product.
    pub fn to_csv(&self) -> LedgerResult<Vec<u8>> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        if self.rows.is_empty() {
            wtr.write_record(SNAPSHOT_HEADERS)
                .map_err(|e| LedgerError::Export(format!("CSV header error: {e}")))?;
        }
        for row in &self.rows {
            wtr.serialize(row)
                .map_err(|e| LedgerError::Export(format!("CSV serialization error: {e}")))?;
        }
        wtr.into_inner()
            .map_err(|e| LedgerError::Export(format!("CSV writer error: {e}")))
    }
}

fn decimal_cell(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct Reporting<S> {
    store: S,
    settings: ReportSettings,
}

impl<S: LedgerStore> Reporting<S> {
    pub fn new(store: S, settings: ReportSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &ReportSettings {
        &self.settings
    }

    /// Month reported when none is requested: the month of `now - 30 days`.
    pub fn default_month(&self, now: DateTime<Utc>) -> ReportMonth {
        ReportMonth::preceding(now, self.settings.offset)
    }

    #[instrument(skip(self), err)]
    pub async fn dashboard(&self, now: DateTime<Utc>) -> LedgerResult<Dashboard> {
        let products = self.store.list_products(&ProductQuery::default()).await?;
        let names: HashMap<ProductId, &str> = products.iter().map(|p| (p.id_typed(), p.name())).collect();

        let total_quantity = products.iter().map(Product::current_qty).fold(0u64, u64::saturating_add);
        let total_value = products.iter().map(Product::total_value).sum();

        let mut low: Vec<&Product> = products.iter().filter(|p| p.is_low_stock()).collect();
        low.sort_by_key(|p| p.current_qty());
        let out_of_stock_count = products.iter().filter(|p| p.is_out_of_stock()).count();

        let today = MovementFilter::all().since(start_of_day(now, self.settings.offset));
        let (today_in, today_out) = self.in_out(&today).await?;

        let window_days = self.settings.window_days.clamp(1, MAX_WINDOW_DAYS);
        let window = MovementFilter::all().since(now - Duration::days(window_days));
        let (window_in, window_out) = self.in_out(&window).await?;

        let name_of = |id: ProductId| names.get(&id).map(|n| n.to_string()).unwrap_or_default();

        let mut most_active: Vec<ProductActivity> = self
            .store
            .aggregate(&window, GroupBy::PRODUCT, false)
            .await?
            .into_iter()
            .filter_map(|r| r.key.product_id.map(|id| (id, r.total)))
            .map(|(id, total)| ProductActivity { product_id: id, name: name_of(id), total })
            .collect();
        most_active.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.name.cmp(&b.name)));
        most_active.truncate(self.settings.active_limit);

        let mut decreasing: Vec<ProductActivity> = self
            .store
            .aggregate(&window, GroupBy::PRODUCT, true)
            .await?
            .into_iter()
            .filter(|r| r.total < 0)
            .filter_map(|r| r.key.product_id.map(|id| (id, r.total)))
            .map(|(id, total)| ProductActivity { product_id: id, name: name_of(id), total })
            .collect();
        decreasing.sort_by(|a, b| a.total.cmp(&b.total).then_with(|| a.name.cmp(&b.name)));
        decreasing.truncate(self.settings.decreasing_limit);

        let mut popular_reasons: Vec<ReasonCount> = self
            .store
            .aggregate(&window, GroupBy::REASON_AND_TYPE, false)
            .await?
            .into_iter()
            .filter_map(|r| match (r.key.reason, r.key.move_type) {
                (Some(reason), Some(move_type)) => Some(ReasonCount { reason, move_type, total: r.total }),
                _ => None,
            })
            .collect();
        popular_reasons.sort_by(|a, b| b.total.cmp(&a.total));

        let recent = self
            .store
            .list_movements(&MovementFilter::all(), self.settings.recent_limit)
            .await?
            .into_iter()
            .map(|m| {
                let product_name = name_of(m.product_id);
                RecentMovement {
                    summary: m.summary(&product_name),
                    product_name,
                    movement: m,
                }
            })
            .collect();

        Ok(Dashboard {
            generated_at: now,
            total_products: products.len(),
            total_quantity,
            total_value,
            today_in,
            today_out,
            low_stock_count: low.len(),
            low_stock: low.into_iter().map(StockLevel::from).collect(),
            out_of_stock_count,
            window_days,
            most_active,
            decreasing,
            window_in,
            window_out,
            window_net: window_in - window_out,
            popular_reasons,
            recent,
        })
    }

    /// End-of-month quantities for every product, reconstructed backwards
    /// from the live quantities with one grouped aggregate.
    #[instrument(skip(self), fields(month = %month), err)]
    pub async fn monthly_snapshot(&self, month: ReportMonth) -> LedgerResult<MonthlySnapshot> {
        let cutoff = month.cutoff(self.settings.offset)?;
        let products = self.store.list_products(&ProductQuery::default()).await?;

        let net_after: HashMap<ProductId, i64> = self
            .store
            .aggregate(&MovementFilter::all().after(cutoff), GroupBy::PRODUCT, true)
            .await?
            .into_iter()
            .filter_map(|r| r.key.product_id.map(|id| (id, r.total)))
            .collect();

        let rows = products
            .iter()
            .map(|p| SnapshotRow::for_product(p, net_after.get(&p.id_typed()).copied().unwrap_or(0)))
            .collect::<Vec<_>>();

        tracing::debug!(rows = rows.len(), %cutoff, "monthly snapshot built");
        Ok(MonthlySnapshot { month, cutoff, rows })
    }

    /// Raw inbound and outbound totals for `filter`.
    async fn in_out(&self, filter: &MovementFilter) -> LedgerResult<(i64, i64)> {
        let rows = self
            .store
            .aggregate(filter, GroupBy { move_type: true, ..GroupBy::NONE }, false)
            .await?;
        let total = |t: MoveType| {
            rows.iter()
                .find(|r| r.key.move_type == Some(t))
                .map_or(0, |r| r.total)
        };
        Ok((total(MoveType::In), total(MoveType::Out)))
    }
}
