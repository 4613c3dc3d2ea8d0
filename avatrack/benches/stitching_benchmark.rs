//! Benchmarks for matching, propagation and agreement scoring

use avatrack::{
    AgreementScorer, AnnotationRecord, Bbox, BoxMatcher, Detection, IdentityPropagator,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

fn create_test_detections(n_videos: usize, n_frames: u32, per_frame: usize) -> Vec<Detection> {
    let mut records = Vec::with_capacity(n_videos * n_frames as usize * per_frame);
    for video in 0..n_videos {
        for frame in 0..n_frames {
            for person in 0..per_frame {
                let x = 0.05 + person as f64 * 0.15;
                let drift = frame as f64 * 0.0005;
                records.push(Detection::new(
                    format!("video_{:03}", video),
                    frame,
                    Bbox::new(x + drift, 0.1, x + 0.1 + drift, 0.6),
                    (person % 5) as u32 + 1,
                ));
            }
        }
    }
    records
}

fn bench_match_records(c: &mut Criterion) {
    let without = create_test_detections(4, 30, 5);
    let with: Vec<Detection> = without
        .iter()
        .enumerate()
        .filter(|(i, _)| i % 2 == 0)
        .map(|(i, d)| d.clone().with_person_id((i % 5) as i64 + 1))
        .collect();

    c.bench_function("match_records_600x300", |b| {
        b.iter(|| BoxMatcher::match_records(black_box(&with), black_box(&without)))
    });
}

fn bench_propagation_various_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagation_various_record_counts");

    for &n_frames in &[10u32, 50, 100, 500] {
        let records = create_test_detections(2, n_frames, 5);

        group.bench_with_input(
            BenchmarkId::new("frames", n_frames),
            &records,
            |b, records| {
                b.iter_batched(
                    || records.clone(),
                    |mut records| {
                        let _stats = IdentityPropagator::sort_and_run(black_box(&mut records))
                            .unwrap();
                    },
                    criterion::BatchSize::SmallInput,
                )
            },
        );
    }
    group.finish();
}

fn bench_annotation_agreement(c: &mut Criterion) {
    let set_a: Vec<AnnotationRecord> = create_test_detections(3, 100, 4)
        .into_iter()
        .enumerate()
        .map(|(i, d)| {
            AnnotationRecord::new(
                d.video_name,
                d.frame_index as f64,
                d.bbox,
                d.action_label,
                (i % 4) as i64,
            )
        })
        .collect();
    let set_b: Vec<AnnotationRecord> = set_a
        .iter()
        .map(|r| {
            let mut shifted = r.clone();
            shifted.bbox.x1 += 0.01;
            shifted
        })
        .collect();
    let scorer = AgreementScorer::default();

    c.bench_function("annotation_agreement_1200_rows", |b| {
        b.iter(|| scorer.annotation_agreement(black_box(&set_a), black_box(&set_b), None))
    });
}

criterion_group!(
    benches,
    bench_match_records,
    bench_propagation_various_sizes,
    bench_annotation_agreement
);
criterion_main!(benches);
