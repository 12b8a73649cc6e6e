//! Budget, duplicate, size, and deadline enforcement.
//!
//! ## Test Scenarios
//!
//! 1. Include-count budget at and past the boundary
//! 2. Duplicate detection and its (project, sha) scoping
//! 3. Total fetched-size ceiling
//! 4. Execution deadline behavior

mod common;

use std::time::Duration;

use ci_compose::context::ExpandAttrs;
use ci_compose::error::Error;
use ci_compose::fetch::InstanceSettings;
use common::{build_context, compose, default_context, InMemoryRemote, InMemoryRepository, InMemoryTemplates};

fn repository_with_files(count: usize) -> InMemoryRepository {
    let mut repository = InMemoryRepository::new();
    for i in 0..count {
        repository.add_file("group/app", &format!("part{i}.yml"), &format!("key{i}: {i}\n"));
    }
    repository
}

fn include_list(count: usize) -> String {
    let mut values = String::from("include:\n");
    for i in 0..count {
        values.push_str(&format!("  - part{i}.yml\n"));
    }
    values
}

#[test]
fn test_fifty_unique_includes_succeed() {
    let result = compose(
        &include_list(50),
        default_context(repository_with_files(50)),
    )
    .unwrap();

    assert_eq!(result.len(), 50);
}

#[test]
fn test_fifty_one_unique_includes_exceed_budget() {
    let error = compose(
        &include_list(51),
        default_context(repository_with_files(51)),
    )
    .unwrap_err();

    // None of the entries is a duplicate; the budget alone rejects it
    assert!(matches!(error, Error::TooManyIncludes { max: 50 }));
}

#[test]
fn test_same_location_twice_is_duplicate() {
    let mut repository = InMemoryRepository::new();
    repository.add_file("group/app", "a.yml", "a: 1\n");

    let error = compose(
        "include:\n  - local: a.yml\n  - local: a.yml\n",
        default_context(repository),
    )
    .unwrap_err();

    assert!(matches!(error, Error::DuplicateInclude { .. }));
    assert!(error.to_string().contains("a.yml"));
}

#[test]
fn test_same_path_from_different_projects_is_not_duplicate() {
    let mut repository = InMemoryRepository::new();
    // Both projects include their own `common.yml`; the expansion keys
    // differ by context project, so this is not a cycle.
    repository.add_file("group/one", "entry.yml", "include: common.yml\none: 1\n");
    repository.add_file("group/one", "common.yml", "common_one: 1\n");
    repository.add_file("group/two", "entry.yml", "include: common.yml\ntwo: 2\n");
    repository.add_file("group/two", "common.yml", "common_two: 2\n");

    let values = "\
include:
  - project: group/one
    file: entry.yml
  - project: group/two
    file: entry.yml
";
    let result = compose(values, default_context(repository)).unwrap();

    assert_eq!(result.len(), 4);
}

#[test]
fn test_same_include_with_different_inputs_is_not_duplicate() {
    let mut repository = InMemoryRepository::new();
    repository.add_file(
        "group/app",
        "component.yml",
        "spec:\n  inputs:\n    name:\n---\n$[[ inputs.name ]]:\n  stage: test\n",
    );

    let values = "\
include:
  - local: component.yml
    inputs:
      name: alpha
  - local: component.yml
    inputs:
      name: beta
";
    let result = compose(values, default_context(repository)).unwrap();

    assert_eq!(result.len(), 2);
}

#[test]
fn test_mutated_context_shares_budget() {
    let settings = InstanceSettings {
        max_includes: 1,
        ..InstanceSettings::default()
    };
    let context = build_context(
        InMemoryRepository::new(),
        InMemoryRemote::new(),
        InMemoryTemplates::new(),
        &settings,
    );
    let derived = context.mutate(ExpandAttrs {
        project: Some("group/other".to_string()),
        sha: Some("cafebabe".to_string()),
    });

    let spec = ci_compose::location::IncludeSpec {
        local: Some("a.yml".to_string()),
        ..Default::default()
    };
    context.verify_duplicates(&spec).unwrap();

    // The sibling context draws from the same expansion set
    let error = derived.verify_duplicates(&spec).unwrap_err();
    assert!(matches!(error, Error::TooManyIncludes { .. }));
}

#[test]
fn test_total_size_ceiling() {
    let mut repository = InMemoryRepository::new();
    repository.add_file("group/app", "big.yml", &format!("data: {}\n", "x".repeat(64)));
    repository.add_file("group/app", "more.yml", &format!("more: {}\n", "y".repeat(64)));

    let settings = InstanceSettings {
        max_total_yaml_size_bytes: 100,
        ..InstanceSettings::default()
    };
    let context = build_context(
        repository,
        InMemoryRemote::new(),
        InMemoryTemplates::new(),
        &settings,
    );
    let error = compose("include:\n  - big.yml\n  - more.yml\n", context).unwrap_err();

    assert!(matches!(error, Error::TotalSizeExceeded { max_bytes: 100 }));
}

#[test]
fn test_no_deadline_never_times_out() {
    let mut repository = InMemoryRepository::new();
    repository.add_file("group/app", "a.yml", "a: 1\n");

    let context = default_context(repository);
    // No deadline was ever set on this context
    compose("include: a.yml\n", context).unwrap();
}

#[test]
fn test_zero_deadline_times_out() {
    let mut repository = InMemoryRepository::new();
    repository.add_file("group/app", "a.yml", "a: 1\n");

    let context = default_context(repository);
    context.set_deadline(Some(Duration::ZERO)).unwrap();
    std::thread::sleep(Duration::from_millis(2));

    let error = compose("include: a.yml\n", context).unwrap_err();
    assert!(matches!(error, Error::Timeout));
}

#[test]
fn test_generous_deadline_passes() {
    let mut repository = InMemoryRepository::new();
    repository.add_file("group/app", "a.yml", "a: 1\n");

    let context = default_context(repository);
    context
        .set_deadline(Some(Duration::from_secs(30)))
        .unwrap();

    compose("include: a.yml\n", context).unwrap();
}
