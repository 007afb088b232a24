//! Integration tests for the xrsplice binary

use std::process::{Command, Output};

fn xrsplice(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_xrsplice"))
        .args(args)
        .env_remove("XRSPLICE_CONFIG")
        .env_remove("XRSPLICE_LOG_LEVEL")
        .env_remove("XRSPLICE_SESSION_MODE")
        .env_remove("XRSPLICE_DISABLE_INTERCEPTS")
        .output()
        .expect("Failed to execute xrsplice")
}

#[test]
fn test_manifest_to_stdout() {
    let temp = tempfile::tempdir().unwrap();
    let library = temp.path().join("libxrsplice_layer.so");
    std::fs::write(&library, b"").unwrap();

    let output = xrsplice(&["manifest", "--library-path", library.to_str().unwrap(), "--implicit"]);
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["api_layer"]["name"], "XR_APILAYER_XRSPLICE_passthrough");
    assert_eq!(
        json["api_layer"]["disable_environment"],
        "DISABLE_XRSPLICE_PASSTHROUGH"
    );
    assert!(json["api_layer"]["library_path"]
        .as_str()
        .unwrap()
        .ends_with("libxrsplice_layer.so"));
}

#[test]
fn test_manifest_relative_library_path() {
    let temp = tempfile::tempdir().unwrap();
    let library = temp.path().join("lib/libxrsplice_layer.so");
    std::fs::create_dir_all(library.parent().unwrap()).unwrap();
    std::fs::write(&library, b"").unwrap();
    let manifest = temp.path().join("XrApiLayer_xrsplice.json");

    let output = xrsplice(&[
        "manifest",
        "--library-path",
        library.to_str().unwrap(),
        "--output",
        manifest.to_str().unwrap(),
        "--relative",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&manifest).unwrap()).unwrap();
    assert_eq!(json["api_layer"]["library_path"], "./lib/libxrsplice_layer.so");
    assert!(json["api_layer"].get("disable_environment").is_none());
}

#[test]
fn test_functions_lists_table() {
    let output = xrsplice(&["functions"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("xrGetInstanceProcAddr"));
    assert!(stdout.contains("override"));
    assert!(stdout.contains("xrGetSystemProperties"));
}

#[test]
fn test_config_default_outputs_toml() {
    let output = xrsplice(&["config", "--default"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("[logging]"));
    assert!(stdout.contains("[sessions]"));
    assert!(stdout.contains("mode = \"multi\""));
}

#[test]
fn test_config_reads_explicit_file() {
    let env = xrsplice_config::testing::TestEnvironment::new().unwrap();
    env.write_config("[sessions]\nmode = \"single\"\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_xrsplice"))
        .arg("config")
        .envs(env.layer_env())
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("mode = \"single\""));
    assert!(stdout.contains("found"));
}
