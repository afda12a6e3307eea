//! Unit tests for package identifiers.

use stackpm::core::{
    NpmSpec, PackageId, PackageKind, StackpmError, create_package_id, parse_package_id, sanitize_name,
};

#[test]
fn parse_and_create_round_trip() {
    for id in ["stack:github", "runtime:node", "binary:sqlite", "agent:claude", "prompt:review", "npm:@scope/tool@1.2.3"] {
        let parsed = parse_package_id(id).unwrap();
        assert_eq!(create_package_id(parsed.kind, &parsed.name), id);
        assert_eq!(parsed.to_string(), id);
    }
}

#[test]
fn malformed_ids_are_rejected() {
    for id in ["ripgrep", "binary:", "tool:ripgrep", "", "binary:..", "runtime:.", "npm:..@1"] {
        let err = parse_package_id(id).unwrap_err();
        assert!(matches!(err, StackpmError::InvalidPackageId { .. }), "{id}: {err}");
    }
}

#[test]
fn kind_directories() {
    let dirs: Vec<&str> = PackageKind::ALL.iter().map(|k| k.directory()).collect();
    assert_eq!(dirs, vec!["stacks", "runtimes", "binaries", "agents", "prompts", "npm"]);
}

#[test]
fn scoped_npm_names() {
    let spec = NpmSpec::parse("@modelcontextprotocol/server-github@0.6.2");
    assert_eq!(spec.name, "@modelcontextprotocol/server-github");
    assert_eq!(spec.version, "0.6.2");
    assert_eq!(NpmSpec::parse("@scope/tool").version, "latest");

    assert_eq!(sanitize_name(&spec.name), "modelcontextprotocol__server-github");
    let id = PackageId::new(PackageKind::Npm, "@modelcontextprotocol/server-github@0.6.2");
    assert_eq!(id.sanitized_name(), "modelcontextprotocol__server-github");
}

#[test]
fn ids_serialize_as_strings() {
    let id = PackageId::new(PackageKind::Agent, "claude");
    assert_eq!(serde_json::to_string(&id).unwrap(), "\"agent:claude\"");
    let back: PackageId = serde_json::from_str("\"agent:claude\"").unwrap();
    assert_eq!(back, id);
    assert!(serde_json::from_str::<PackageId>("\"claude\"").is_err());
}
