//! Benchmarks for graph building and request planning
//!
//! Run with: cargo bench

use cebaf_graph::graph::{ChannelNaming, GraphNode, NodeKind, NodeList};
use cebaf_graph::sampler::plan_chunks;
use cebaf_graph::types::DateSpan;
use cebaf_graph::Element;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// A beamline of `count` nodes with one setpoint every `stride` nodes
fn beamline(count: usize, stride: usize) -> Vec<GraphNode> {
    let naming = ChannelNaming::default();
    (0..count)
        .map(|i| {
            let kind = if i % stride == 0 {
                NodeKind::Setpoint
            } else {
                NodeKind::Readback
            };
            GraphNode::new(
                Element::new(format!("E{:05}", i), "T").with_property("S", i.to_string()),
                kind,
                "T",
                vec![".A".to_string(), ".B".to_string()],
                &naming,
            )
        })
        .collect()
}

fn bench_link(c: &mut Criterion) {
    let mut group = c.benchmark_group("link");

    for count in [100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("nodes", count), &count, |b, &count| {
            let nodes = beamline(count, 4);
            b.iter(|| {
                let mut list = NodeList::new(nodes.clone());
                list.link();
                black_box(list.edges(3).len())
            });
        });
    }

    group.finish();
}

fn bench_plan_chunks(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_chunks");
    let tz = chrono_tz::America::New_York;

    for (label, end, interval) in [
        ("day_1h", "2021-11-08 00:00", "1h"),
        ("year_1h", "2022-11-01 00:00", "1h"),
        ("month_1m", "2021-12-01 00:00", "1m"),
    ] {
        let span = DateSpan::parse("2021-11-01 00:00", end, interval).unwrap();
        group.bench_function(label, |b| {
            b.iter(|| black_box(plan_chunks(&span, 10_000, 100, tz).unwrap().len()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_link, bench_plan_chunks);
criterion_main!(benches);
