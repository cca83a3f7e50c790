// Integration tests for the buildfacts binary
use std::process::{Command, Output};

fn buildfacts(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_buildfacts"))
        .args(args)
        .env_remove("BUILDFACTS_PROPERTIES_FILE")
        .env("RUST_LOG", "off")
        .output()
        .expect("Failed to run binary")
}

#[test]
fn test_keys_lists_every_property() {
    let output = buildfacts(&["keys"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.lines().any(|line| line == "BUILDFACTS_INCLUDE_GIT_INFO"));
    assert!(stdout.lines().any(|line| line == "SOURCE_DATE_EPOCH"));
    assert!(!stdout.lines().any(|line| line == "OUT_DIR"));
}

#[test]
fn test_render_with_overrides() {
    let output = buildfacts(&[
        "render",
        "--timestamp",
        "2024-05-01T12:00:00Z",
        "--set",
        "BUILDFACTS_CONFIGURATION=Release",
        "--set",
        "BUILDFACTS_INCLUDE_GIT_INFO=true",
        "--set",
        "BUILDFACTS_GIT_COMMIT_ID=abcdef1234567890",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("pub const BuildAt: &'static str = \"2024-05-01T12:00:00.000000000Z\";"));
    assert!(stdout.contains("pub const Configuration: &'static str = \"Release\";"));
    assert!(stdout.contains("pub const ShortCommitHash: &'static str = \"abcdef1\";"));
}

#[test]
fn test_render_into_directory() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().join("generated");
    let output = buildfacts(&["render", "--out-dir", out_dir.to_str().unwrap()]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    assert!(out_dir.join("build_information.rs").is_file());
    assert!(out_dir.join("build_facts.rs").is_file());
    assert!(!out_dir.join("git_information.rs").exists());
}

#[test]
fn test_facts_as_json_from_properties_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("props.yml");
    std::fs::write(
        &file,
        "OPT_LEVEL: 3\nCARGO_PKG_NAME: demo\nBUILDFACTS_INCLUDE_GIT_INFO: true\nGIT_BRANCH: main\n",
    )
    .unwrap();

    let output = buildfacts(&[
        "facts",
        "--properties",
        file.to_str().unwrap(),
        "--set",
        "CARGO_PKG_NAME=override",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["build"]["configuration"], "Release");
    assert_eq!(json["build"]["is_release_build"], true);
    assert_eq!(json["build"]["assembly_name"], "override");
    assert_eq!(json["git"]["branch"], "main");
}

#[test]
fn test_rejects_malformed_override() {
    let output = buildfacts(&["render", "--set", "no-equals-sign"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("KEY=VALUE"));
}
