use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use warehouse_core::ProductId;
use warehouse_infra::{InMemoryWarehouseStore, OperationContext, WarehouseService};
use warehouse_inventory::{Article, BomLine, Product};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

/// `products` products over a shared pool of `articles` articles, 4 lines each.
fn seeded(
    rt: &tokio::runtime::Runtime,
    articles: usize,
    products: usize,
) -> WarehouseService<InMemoryWarehouseStore> {
    let service = WarehouseService::new(InMemoryWarehouseStore::new());
    let ctx = OperationContext::background();

    let rows: Vec<Article> = (0..articles)
        .map(|i| Article::new(format!("a{i:05}"), format!("article {i}"), i64::MAX / 2))
        .collect();
    let catalog: Vec<Product> = (0..products)
        .map(|p| {
            let bom = (0..4)
                .map(|k| BomLine::new(format!("a{:05}", (p * 7 + k * 13) % articles), (k + 1) as i64))
                .collect();
            Product::new(format!("p{p:05}"), format!("product {p}"), bom)
        })
        .collect();

    rt.block_on(async {
        service.upsert_articles(&ctx, &rows).await.unwrap();
        service.upsert_products(&ctx, &catalog).await.unwrap();
    });
    service
}

fn bench_sell_product(c: &mut Criterion) {
    let rt = runtime();
    let service = seeded(&rt, 64, 16);
    let ctx = OperationContext::background();
    let product = ProductId::from("p00003");

    let mut group = c.benchmark_group("sell_product");
    group.throughput(Throughput::Elements(1));
    group.bench_function("in_memory_4_lines", |b| {
        b.iter(|| {
            rt.block_on(async {
                black_box(service.sell_product(&ctx, &product).await.unwrap());
            })
        })
    });
    group.finish();
}

fn bench_list_products_with_stock(c: &mut Criterion) {
    let rt = runtime();
    let ctx = OperationContext::background();

    let mut group = c.benchmark_group("list_products_with_stock");
    for products in [16usize, 256, 2048] {
        let service = seeded(&rt, 512, products);
        group.throughput(Throughput::Elements(products as u64));
        group.bench_with_input(BenchmarkId::from_parameter(products), &products, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    black_box(service.list_products_with_stock(&ctx).await.unwrap());
                })
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sell_product, bench_list_products_with_stock);
criterion_main!(benches);
