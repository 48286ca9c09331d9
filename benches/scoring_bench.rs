use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gcnrec::algorithms::graph::SparseGraph;
use gcnrec::algorithms::{scorer, AggregationMode, LightGcn};

fn benchmark_scoring(c: &mut Criterion) {
    let model = LightGcn::new(1000, 5000, 64, 0, AggregationMode::Mean);
    let finals = model.final_embeddings();

    c.bench_function("score_items_5000x64", |b| {
        b.iter(|| {
            let scores = scorer::score_items(finals.users.row(0), finals.items.view());
            black_box(scores);
        });
    });

    let scores: Vec<f32> = (0..5000).map(|i| (i as f32 * 0.37).sin()).collect();
    c.bench_function("top_k_ranked_5000", |b| {
        b.iter(|| {
            black_box(scorer::top_k_ranked(&scores, 10));
        });
    });
}

fn benchmark_propagation(c: &mut Criterion) {
    let num_users = 500;
    let num_items = 2000;
    let size = num_users + num_items;

    // Each user linked to a handful of items, symmetric weights
    let mut triplets = Vec::new();
    for user in 0..num_users {
        for k in 0..8 {
            let item = num_users + (user * 7 + k * 13) % num_items;
            triplets.push((user, item, 0.25));
            triplets.push((item, user, 0.25));
        }
    }
    let graph = SparseGraph::from_triplets(size, &triplets).unwrap();

    let model = LightGcn::new(num_users, num_items, 64, 3, AggregationMode::Mean)
        .with_graph(graph)
        .unwrap();

    c.bench_function("compute_final_embeddings_3_layers", |b| {
        b.iter(|| {
            black_box(model.compute_final_embeddings());
        });
    });
}

criterion_group!(benches, benchmark_scoring, benchmark_propagation);
criterion_main!(benches);
