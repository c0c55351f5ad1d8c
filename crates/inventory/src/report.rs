//! Month cutoffs and end-of-month snapshot rows.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use stockroom_core::{DomainError, DomainResult};
use stockroom_products::Product;

use crate::projector::StockProjector;

/// How far back the default report month is taken from "now".
const DEFAULT_LOOKBACK_DAYS: i64 = 30;

/// A calendar month in the reporting timezone.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReportMonth {
    year: i32,
    month: u32,
}

impl ReportMonth {
    pub fn new(year: i32, month: u32) -> DomainResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(DomainError::validation("month", "must be between 1 and 12"));
        }
        if !(1..=9999).contains(&year) {
            return Err(DomainError::validation("year", "must be between 1 and 9999"));
        }
        Ok(Self { year, month })
    }

    /// The month containing `now - 30 days`, read in `offset`.
    pub fn preceding(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        let local = (now - Duration::days(DEFAULT_LOOKBACK_DAYS)).with_timezone(&offset);
        Self {
            year: local.year(),
            month: local.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Last instant of the month in `offset`: the start of the next month minus 1ns.
    pub fn cutoff(&self, offset: FixedOffset) -> DomainResult<DateTime<Utc>> {
        let (y, m) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        let next = NaiveDate::from_ymd_opt(y, m, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .and_then(|dt| offset.from_local_datetime(&dt).single())
            .ok_or_else(|| DomainError::invariant(format!("no month start for {y}-{m:02}")))?;
        Ok(next.with_timezone(&Utc) - Duration::nanoseconds(1))
    }

    /// e.g. `"2025-09"`.
    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    /// Download name without extension, e.g. `"ay-sonu-stoklari_2025-09"`.
    pub fn file_stem(&self) -> String {
        format!("ay-sonu-stoklari_{}", self.label())
    }

    /// Name of the workbook download.
    pub fn file_name(&self) -> String {
        format!("{}.xlsx", self.file_stem())
    }
}

impl core::fmt::Display for ReportMonth {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.label())
    }
}

/// Local midnight of the day containing `now`, as a UTC instant.
pub fn start_of_day(now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
    let local = now.with_timezone(&offset).date_naive();
    local
        .and_hms_opt(0, 0, 0)
        .and_then(|dt| offset.from_local_datetime(&dt).single())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now)
}

/// One line of the end-of-month stock report. Field names are the column headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotRow {
    #[serde(rename = "Ürün")]
    pub name: String,
    #[serde(rename = "Kategori")]
    pub category: String,
    #[serde(rename = "Min Stok")]
    pub min_stock: u64,
    #[serde(rename = "Palet")]
    pub pallet_size: u32,
    #[serde(rename = "Birim Fiyat")]
    pub unit_price: Decimal,
    #[serde(rename = "ASOF Stok")]
    pub as_of_qty: u64,
    #[serde(rename = "Toplam Değer")]
    pub total_value: Decimal,
}

impl SnapshotRow {
    /// Row for `product`, given the net signed quantity recorded after the cutoff.
    pub fn for_product(product: &Product, net_after: i64) -> Self {
        let as_of_qty = StockProjector::as_of(product.current_qty(), net_after);
        Self {
            name: product.name().to_string(),
            category: product.category().label().to_string(),
            min_stock: product.min_stock(),
            pallet_size: product.pallet_size(),
            unit_price: product.unit_price(),
            as_of_qty,
            total_value: product.value_of(as_of_qty),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_core::ProductId;
    use stockroom_products::{Category, CreateProduct};

    fn istanbul() -> FixedOffset {
        FixedOffset::east_opt(3 * 3600).unwrap()
    }

    #[test]
    fn rejects_month_and_year_out_of_range() {
        assert_eq!(ReportMonth::new(2025, 13).unwrap_err().field(), Some("month"));
        assert_eq!(ReportMonth::new(2025, 0).unwrap_err().field(), Some("month"));
        assert_eq!(ReportMonth::new(0, 5).unwrap_err().field(), Some("year"));
        assert_eq!(ReportMonth::new(10_000, 5).unwrap_err().field(), Some("year"));
    }

    #[test]
    fn cutoff_is_last_nanosecond_of_local_month() {
        let cutoff = ReportMonth::new(2025, 9).unwrap().cutoff(istanbul()).unwrap();
        // 2025-10-01T00:00+03:00 is 2025-09-30T21:00Z.
        let next_start = Utc.with_ymd_and_hms(2025, 9, 30, 21, 0, 0).unwrap();
        assert_eq!(cutoff + Duration::nanoseconds(1), next_start);
    }

    #[test]
    fn december_cutoff_rolls_into_next_year() {
        let cutoff = ReportMonth::new(2024, 12).unwrap().cutoff(FixedOffset::east_opt(0).unwrap()).unwrap();
        assert_eq!(cutoff + Duration::nanoseconds(1), Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn year_9999_december_has_a_cutoff() {
        assert!(ReportMonth::new(9999, 12).unwrap().cutoff(istanbul()).is_ok());
    }

    #[test]
    fn default_month_looks_back_thirty_days() {
        let now = Utc.with_ymd_and_hms(2025, 10, 15, 9, 0, 0).unwrap();
        assert_eq!(ReportMonth::preceding(now, istanbul()), ReportMonth::new(2025, 9).unwrap());

        let now = Utc.with_ymd_and_hms(2025, 1, 20, 9, 0, 0).unwrap();
        assert_eq!(ReportMonth::preceding(now, istanbul()), ReportMonth::new(2024, 12).unwrap());
    }

    #[test]
    fn file_name_is_zero_padded() {
        let month = ReportMonth::new(2025, 3).unwrap();
        assert_eq!(month.file_stem(), "ay-sonu-stoklari_2025-03");
        assert_eq!(month.file_name(), "ay-sonu-stoklari_2025-03.xlsx");
    }

    #[test]
    fn start_of_day_uses_local_midnight() {
        // 22:30Z on the 4th is already 01:30 on the 5th in +03:00.
        let now = Utc.with_ymd_and_hms(2025, 9, 4, 22, 30, 0).unwrap();
        assert_eq!(start_of_day(now, istanbul()), Utc.with_ymd_and_hms(2025, 9, 4, 21, 0, 0).unwrap());
    }

    #[test]
    fn snapshot_row_values_the_as_of_quantity() {
        let mut p = Product::create(
            ProductId::new(),
            CreateProduct {
                name: "Dış Cephe Sıvası".to_string(),
                description: String::new(),
                category: Category::DecorativePlaster,
                unit_price: Decimal::new(1250, 2),
                min_stock: 5,
                pallet_size: 40,
            },
            Utc::now(),
        )
        .unwrap();
        p.set_projected_qty(80);

        let row = SnapshotRow::for_product(&p, 10);
        assert_eq!(row.as_of_qty, 70);
        assert_eq!(row.total_value, Decimal::new(87500, 2));
        assert_eq!(row.category, "Dekoratif Sıva");

        assert_eq!(SnapshotRow::for_product(&p, 200).as_of_qty, 0);
    }
}
