//! Benchmarks for the hot paths called out in the concurrency model as
//! candidates for cooperative yielding past 4096 segments: BM25 index
//! build/score, RRF fusion, and salience-scored extraction.
//!
//! Run with: `cargo bench -p bertrag-core`

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use bertrag_core::bm25::Bm25Index;
use bertrag_core::retrieval::rrf::reciprocal_rank_fusion;
use bertrag_core::{ExtractionConfig, Segment, SegmentExtractor, SegmentType};

fn sample_segments(n: usize) -> Vec<Segment> {
    (0..n)
        .map(|i| {
            Segment::new(
                "bench-doc",
                i,
                0,
                64,
                SegmentType::Paragraph,
                0,
                None,
                format!("Segment {i} discusses widgets, gadgets, and factory throughput metrics."),
            )
        })
        .collect()
}

fn bench_bm25_build_and_score(c: &mut Criterion) {
    let segments = sample_segments(500);
    c.bench_function("bm25_build_and_score_500", |b| {
        b.iter(|| {
            let index = Bm25Index::build(&segments);
            black_box(index.score("widgets factory throughput"));
        })
    });
}

fn bench_rrf_fusion(c: &mut Criterion) {
    let dense: Vec<usize> = (0..500).collect();
    let bm25: Vec<usize> = (0..500).rev().collect();
    let salience: Vec<usize> = (0..500).collect();

    c.bench_function("rrf_fusion_three_rankings_500", |b| {
        b.iter(|| {
            black_box(reciprocal_rank_fusion(
                &[dense.clone(), bm25.clone(), salience.clone()],
                60.0,
            ));
        })
    });
}

fn bench_extraction(c: &mut Criterion) {
    let markdown = "# Report\n\n".to_string()
        + &(0..200)
            .map(|i| format!("Paragraph {i} describes widgets and their factory throughput in detail.\n\n"))
            .collect::<String>();
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let extractor = SegmentExtractor::new(None, ExtractionConfig::default());

    c.bench_function("extract_200_paragraphs_no_embedder", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let result = extractor
                    .extract(&markdown, "bench-doc", &tokio_util::sync::CancellationToken::new())
                    .await
                    .unwrap();
                black_box(result.total_segments());
            });
        })
    });
}

criterion_group!(benches, bench_bm25_build_and_score, bench_rrf_fusion, bench_extraction);
criterion_main!(benches);
