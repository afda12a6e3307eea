use serde_json::json;
use stackpm::platform::{
    InstallSource, MatchedKey, get_supported_platforms, is_platform_supported, resolve_install,
    validate_resolved_install,
};
use stackpm::test_utils::ManifestFixture;

use crate::common::ManifestBuilder;

/// The sqlite manifest resolves differently on every platform.
#[test]
fn test_sqlite_across_platforms() {
    let sqlite = ManifestFixture::sqlite();

    let mac = resolve_install(&sqlite, "darwin-x64");
    assert_eq!(mac.matched_key, MatchedKey::Os("darwin".to_string()));
    assert_eq!(mac.to_value()["_matchedKey"], "darwin");
    assert_eq!(mac.source(), Some("system"));
    assert_eq!(mac.get("preinstalled"), Some(&json!(true)));

    let windows = resolve_install(&sqlite, "win32-x64");
    assert_eq!(windows.matched_key, MatchedKey::Exact("win32-x64".to_string()));
    assert_eq!(windows.source(), Some("download"));
    assert_eq!(windows.get_str("delivery"), Some("remote"));

    let bsd = resolve_install(&sqlite, "freebsd-x64");
    assert_eq!(bsd.matched_key, MatchedKey::Default);
    assert_eq!(bsd.to_value()["_matchedKey"], "default");
    assert_eq!(bsd.source(), Some("system"));
}

#[test]
fn test_sqlite_support_and_validation() {
    let sqlite = ManifestFixture::sqlite();

    assert_eq!(get_supported_platforms(&sqlite), vec!["darwin", "linux", "win32-x64"]);
    assert!(is_platform_supported(&sqlite, "linux-arm64"));
    assert!(is_platform_supported(&sqlite, "win32-x64"));
    assert!(!is_platform_supported(&sqlite, "win32-arm64"));
    assert!(!is_platform_supported(&sqlite, "freebsd-x64"));

    for key in ["darwin-arm64", "linux-x64", "win32-x64"] {
        let report = validate_resolved_install(&resolve_install(&sqlite, key), &sqlite);
        assert!(report.valid, "{key}: {:?}", report.errors);
    }

    let windows = resolve_install(&sqlite, "win32-x64").materialize(&sqlite).unwrap();
    match windows {
        Some(InstallSource::Download { url, extract, .. }) => {
            assert!(url.ends_with(".zip"));
            assert_eq!(extract.and_then(|e| e.format).as_deref(), Some("zip"));
        }
        other => panic!("expected a download source, got {other:?}"),
    }
}

/// Validation collects every problem instead of stopping at the first.
#[test]
fn test_validation_collects_errors() {
    let manifest = ManifestBuilder::new("runtime", "deno")
        .install_field("source", json!("download"))
        .build();

    let report = validate_resolved_install(&resolve_install(&manifest, "linux-x64"), &manifest);

    assert!(!report.valid);
    assert!(report.errors.iter().any(|e| e.contains("url")));
    assert!(report.errors.iter().any(|e| e.contains("checksum")));
    assert!(report.errors.iter().any(|e| e.contains("bins")));
}

#[test]
fn test_latest_version_only_warns() {
    let manifest = ManifestBuilder::new("agent", "claude")
        .version("latest")
        .bins(&["claude"])
        .npm("@anthropic-ai/claude-code")
        .build();

    let report = validate_resolved_install(&resolve_install(&manifest, "darwin-arm64"), &manifest);

    assert!(report.valid, "{:?}", report.errors);
    assert!(!report.warnings.is_empty());
}

#[test]
fn test_content_packages_need_no_source() {
    for kind in ["stack", "prompt"] {
        let manifest = ManifestBuilder::new(kind, "bundle").build();
        let report = validate_resolved_install(&resolve_install(&manifest, "linux-x64"), &manifest);
        assert!(report.valid, "{kind}: {:?}", report.errors);
    }
}
