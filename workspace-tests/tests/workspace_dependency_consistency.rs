use proptest::prelude::*;
use std::fs;
use std::path::Path;

const MEMBERS: &[&str] = &["ctf-common", "admin-api", "public-app", "workspace-tests"];

fn read_manifest(path: &str) -> Result<toml::Table, String> {
    let content = fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path, e))?;
    content
        .parse::<toml::Table>()
        .map_err(|e| format!("Failed to parse {}: {}", path, e))
}

/// Names declared under `[workspace.dependencies]` in the root manifest
fn workspace_dependencies() -> Vec<String> {
    let root = read_manifest("../Cargo.toml").unwrap();
    root["workspace"]["dependencies"]
        .as_table()
        .map(|deps| deps.keys().cloned().collect())
        .unwrap_or_default()
}

fn inherits_from_workspace(entry: &toml::Value) -> bool {
    entry.get("workspace")
        .and_then(toml::Value::as_bool)
        .unwrap_or(false)
}

/// (section, dependency name, inherits) for every dependency in a member
fn member_dependencies(manifest: &toml::Table) -> Vec<(String, String, bool)> {
    let mut found = Vec::new();
    let mut collect = |section: &str, table: Option<&toml::Value>| {
        if let Some(deps) = table.and_then(toml::Value::as_table) {
            for (name, entry) in deps {
                found.push((section.to_string(), name.clone(), inherits_from_workspace(entry)));
            }
        }
    };

    for section in ["dependencies", "dev-dependencies", "build-dependencies"] {
        collect(section, manifest.get(section));
    }
    if let Some(targets) = manifest.get("target").and_then(toml::Value::as_table) {
        for (cfg, target) in targets {
            collect(&format!("target.{}.dependencies", cfg), target.get("dependencies"));
        }
    }
    found
}

proptest! {
    /// Any member using a crate that the root declares must inherit it
    #[test]
    fn shared_dependencies_inherit_workspace_versions(
        member in prop::sample::select(MEMBERS.to_vec())
    ) {
        let path = format!("../{}/Cargo.toml", member);
        let manifest = read_manifest(&path).map_err(TestCaseError::fail)?;
        let shared = workspace_dependencies();

        for (section, name, inherits) in member_dependencies(&manifest) {
            if shared.contains(&name) {
                prop_assert!(
                    inherits,
                    "{} declares '{}' in [{}] without `workspace = true`",
                    member,
                    name,
                    section
                );
            }
        }
    }
}

#[test]
fn test_root_lists_every_member() {
    let root = read_manifest("../Cargo.toml").unwrap();
    let members: Vec<&str> = root["workspace"]["members"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(toml::Value::as_str)
        .collect();

    assert_eq!(members, MEMBERS);
    assert_eq!(root["workspace"]["resolver"].as_str(), Some("2"));
}

#[test]
fn test_service_crates_have_lib_and_bin() {
    for service in ["admin-api", "public-app"] {
        let manifest = read_manifest(&format!("../{}/Cargo.toml", service)).unwrap();
        assert!(Path::new(&format!("../{}/src/lib.rs", service)).exists());
        assert!(Path::new(&format!("../{}/src/main.rs", service)).exists());

        let bins = manifest["bin"].as_array().unwrap();
        assert_eq!(bins[0]["name"].as_str(), Some(service));
    }
    assert!(Path::new("../ctf-common/src/lib.rs").exists());
}

#[test]
fn test_inheritance_detection() {
    let manifest: toml::Table = r#"
[package]
name = "sample"

[dependencies]
tokio = { workspace = true }
serde.workspace = true
regex = "1.10"

[target.'cfg(unix)'.dependencies]
nix = "0.29"
"#
    .parse()
    .unwrap();

    let deps = member_dependencies(&manifest);
    let lookup = |name: &str| deps.iter().find(|(_, n, _)| n == name).map(|(_, _, i)| *i);

    assert_eq!(lookup("tokio"), Some(true));
    assert_eq!(lookup("serde"), Some(true));
    assert_eq!(lookup("regex"), Some(false));
    assert_eq!(lookup("nix"), Some(false));
}

#[test]
fn test_gateway_runtime_dependencies_stay_lean() {
    let manifest = read_manifest("../public-app/Cargo.toml").unwrap();
    let deps = manifest["dependencies"].as_table().unwrap();
    let dev = manifest["dev-dependencies"].as_table().unwrap();

    assert!(!deps.contains_key("serde_json"));
    assert!(dev.contains_key("serde_json"));

    let features: Vec<&str> = deps["tower-http"]["features"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(toml::Value::as_str)
        .collect();
    assert!(!features.contains(&"cors"));
    assert!(features.contains(&"fs"));
}
