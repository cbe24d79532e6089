use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use churnlens_ai_core::{explain, recommend, GbdtModel, Node, Tree};

const FEATURE_COUNT: usize = 46;
const TREE_COUNT: usize = 350;
const RECORD_COUNT: usize = 64;

/// Depth-2 trees cycling through the feature space, cover filled in
fn forest() -> GbdtModel {
    let trees = (0..TREE_COUNT)
        .map(|t| {
            let a = (t * 7 % FEATURE_COUNT) as i32;
            let b = (t * 13 % FEATURE_COUNT) as i32;
            Tree::new(
                vec![
                    Node::internal(0, a, 0.5, 1, 2).with_stats(100.0, 4.0),
                    Node::internal(1, b, 30.0, 3, 4).with_stats(60.0, 1.5),
                    Node::leaf(2, 0.12).with_stats(40.0, 0.0),
                    Node::leaf(3, -0.08).with_stats(35.0, 0.0),
                    Node::leaf(4, 0.03).with_stats(25.0, 0.0),
                ],
                0.08,
            )
        })
        .collect();
    GbdtModel::new(trees, -1.1, FEATURE_COUNT)
}

fn records() -> Vec<Vec<f64>> {
    (0..RECORD_COUNT)
        .map(|r| {
            (0..FEATURE_COUNT)
                .map(|f| if (r + f) % 3 == 0 { 1.0 } else { (r * f % 70) as f64 })
                .collect()
        })
        .collect()
}

fn benchmark_explain(c: &mut Criterion) {
    let model = churnlens_ai_core::ChurnModel::Gbdt(forest());
    let names: Vec<String> = (0..FEATURE_COUNT).map(|i| format!("feature_{i}")).collect();
    let rows = records();

    let mut group = c.benchmark_group("explain");
    group.throughput(Throughput::Elements(RECORD_COUNT as u64));
    group.bench_function("tree_shap_350_trees_top5", |b| {
        b.iter(|| {
            for row in &rows {
                let reasons = explain(&model, row, &names, 5).unwrap_or_default();
                criterion::black_box(recommend(&reasons, 3));
            }
        });
    });
    group.finish();
}

criterion_group!(benches, benchmark_explain);
criterion_main!(benches);
