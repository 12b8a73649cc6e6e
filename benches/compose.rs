//! Benchmarks for include normalization and deep-merging.
//!
//! These benchmarks measure the hot paths of one resolution pass:
//! normalizing `include` declarations of various sizes and folding parsed
//! fragments into the aggregate configuration.

use ci_compose::location;
use ci_compose::merge::deep_merge;
use ci_compose::variables::Variables;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_yaml::{Mapping, Value};

/// Small declaration: one include of each kind.
const MIXED_INCLUDES: &str = r#"
- "https://example.com/ci.yml"
- local: templates/build.yml
- template: Auto-DevOps.yml
- project: group/shared
  ref: main
  file:
    - a.yml
    - b.yml
"#;

fn include_list(count: usize) -> String {
    let mut declaration = String::new();
    for i in 0..count {
        declaration.push_str(&format!("- local: part{i}.yml\n"));
    }
    declaration
}

fn fragment(index: usize) -> Mapping {
    serde_yaml::from_str(&format!(
        "job{index}:\n  stage: test\n  script: [echo {index}]\nshared:\n  key{index}: {index}\n"
    ))
    .unwrap()
}

fn bench_normalize(c: &mut Criterion) {
    let variables = Variables::from_pairs([("GROUP", "shared")]);
    let mixed: Value = serde_yaml::from_str(MIXED_INCLUDES).unwrap();

    c.bench_function("normalize_mixed_includes", |b| {
        b.iter(|| location::normalize(black_box(&mixed), &variables).unwrap())
    });

    let mut group = c.benchmark_group("normalize_include_list");
    for size in [10, 50] {
        let declaration: Value = serde_yaml::from_str(&include_list(size)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &declaration, |b, decl| {
            b.iter(|| location::normalize(black_box(decl), &variables).unwrap())
        });
    }
    group.finish();
}

fn bench_deep_merge(c: &mut Criterion) {
    let fragments: Vec<Mapping> = (0..20).map(fragment).collect();

    c.bench_function("deep_merge_twenty_fragments", |b| {
        b.iter(|| {
            let mut merged = Mapping::new();
            for fragment in &fragments {
                deep_merge(&mut merged, black_box(fragment));
            }
            merged
        })
    });
}

criterion_group!(benches, bench_normalize, bench_deep_merge);
criterion_main!(benches);
