use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use stockroom_infra::{Catalog, InMemoryLedgerStore, Ledger, ReportSettings, Reporting};
use stockroom_inventory::{
    GroupBy, MoveType, MovementFilter, RecordMovement, ReportMonth, StockProjector, Unit,
};
use stockroom_products::{Category, CreateProduct, Product};
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn create_product(rt: &Runtime, catalog: &Catalog<InMemoryLedgerStore>, name: &str) -> Product {
    rt.block_on(catalog.create(CreateProduct {
        name: name.to_string(),
        description: String::new(),
        category: Category::Adhesive,
        unit_price: Decimal::new(995, 2),
        min_stock: 10,
        pallet_size: 64,
    }))
    .unwrap()
}

fn inbound(product: &Product, quantity: u64) -> RecordMovement {
    RecordMovement {
        product_id: product.id_typed(),
        move_type: MoveType::In,
        reason: "Satın Alma".to_string(),
        quantity,
        unit: Unit::Piece,
        note: String::new(),
        created_at: None,
    }
}

/// Seed `products` products with `per_product` movements each, spread over the last 60 days.
fn seeded(rt: &Runtime, products: usize, per_product: usize) -> InMemoryLedgerStore {
    let store = InMemoryLedgerStore::new();
    let catalog = Catalog::new(store.clone());
    let ledger = Ledger::new(store.clone());
    let start = Utc::now() - Duration::days(60);
    for i in 0..products {
        let p = create_product(rt, &catalog, &format!("Ürün {i:04}"));
        for j in 0..per_product {
            let mut cmd = inbound(&p, 1 + (j as u64 % 7));
            if j % 3 == 0 {
                cmd.move_type = MoveType::Out;
                cmd.reason = "Satış".to_string();
            }
            cmd.created_at = Some(start + Duration::minutes((j * 90) as i64));
            rt.block_on(ledger.record(cmd)).unwrap();
        }
    }
    store
}

fn bench_projector(c: &mut Criterion) {
    let mut group = c.benchmark_group("projector");
    group.bench_function("apply_delta", |b| {
        b.iter(|| StockProjector::apply_delta(black_box(1_000), black_box(-250)));
    });
    group.bench_function("as_of_clamped", |b| {
        b.iter(|| StockProjector::as_of(black_box(10), black_box(500)));
    });
    group.finish();
}

fn bench_record_latency(c: &mut Criterion) {
    let rt = runtime();
    let store = InMemoryLedgerStore::new();
    let catalog = Catalog::new(store.clone());
    let ledger = Ledger::new(store);
    let product = create_product(&rt, &catalog, "Bench Ürün");

    let mut group = c.benchmark_group("ledger_record");
    group.throughput(Throughput::Elements(1));
    group.bench_function("record_inbound", |b| {
        b.iter(|| rt.block_on(ledger.record(inbound(&product, black_box(5)))).unwrap());
    });
    group.finish();
}

fn bench_aggregate(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("ledger_aggregate");

    for per_product in [10usize, 100, 1000] {
        let store = seeded(&rt, 20, per_product);
        let ledger = Ledger::new(store);
        group.throughput(Throughput::Elements((20 * per_product) as u64));
        group.bench_with_input(
            BenchmarkId::new("signed_by_product", per_product),
            &per_product,
            |b, _| {
                b.iter(|| {
                    black_box(
                        rt.block_on(ledger.aggregate(&MovementFilter::all(), GroupBy::PRODUCT, true))
                            .unwrap(),
                    )
                });
            },
        );
    }
    group.finish();
}

fn bench_reports(c: &mut Criterion) {
    let rt = runtime();
    let store = seeded(&rt, 50, 200);
    let reporting = Reporting::new(store, ReportSettings::default());
    let month = ReportMonth::preceding(Utc::now(), ReportSettings::default().offset);
    let now = Utc::now();

    let mut group = c.benchmark_group("reports");
    group.bench_function("dashboard", |b| {
        b.iter(|| black_box(rt.block_on(reporting.dashboard(now)).unwrap()));
    });
    group.bench_function("monthly_snapshot_xlsx", |b| {
        b.iter(|| {
            let snapshot = rt.block_on(reporting.monthly_snapshot(month)).unwrap();
            black_box(snapshot.to_xlsx().unwrap())
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_projector,
    bench_record_latency,
    bench_aggregate,
    bench_reports
);
criterion_main!(benches);
