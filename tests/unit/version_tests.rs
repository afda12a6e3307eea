//! Unit tests for version constraint checks.

use stackpm::version::{Comparator, VersionConstraint, extract_version, parse_version, satisfies_version};

#[test]
fn runtime_requirements() {
    assert!(satisfies_version("20.11.1", ">=18"));
    assert!(!satisfies_version("16.20.2", ">=18"));
    assert!(satisfies_version("3.11.9", "<3.12"));
    assert!(!satisfies_version("3.12.0", "<3.12"));
}

#[test]
fn parsed_constraint() {
    let constraint = VersionConstraint::parse(">=1.2").unwrap();
    assert_eq!(constraint.comparator, Comparator::GreaterOrEqual);
    assert_eq!(constraint.version, [1, 2, 0]);
    assert!(VersionConstraint::parse(">=1.2 <2").is_none());
    assert!(VersionConstraint::parse(">= 1.2").is_none());
}

#[test]
fn permissive_fallbacks() {
    assert!(satisfies_version("1.0.0", ">=1 <2"));
    assert!(satisfies_version("main", "=1.0.0"));
    assert_eq!(parse_version("main"), None);
}

#[test]
fn version_from_tool_output() {
    assert_eq!(extract_version("SQLite version 3.45.0 2024-01-15").as_deref(), Some("3.45.0"));
    assert_eq!(extract_version("v20.11.1").as_deref(), Some("20.11.1"));
}
