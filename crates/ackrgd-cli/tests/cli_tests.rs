//! Integration tests for the ackrgd binary

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn ackrgd(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ackrgd"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute ackrgd")
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "graphs.yaml",
        "graphs:\n  - service: s3\n    version: 1.2.3\n",
    );
    write(
        dir.path(),
        "rendered/s3/templates/service-account.yaml",
        "apiVersion: v1\nkind: ServiceAccount\nmetadata:\n  name: ack-s3-controller\n",
    );
    write(
        dir.path(),
        "rendered/s3/crds/buckets.yaml",
        "apiVersion: apiextensions.k8s.io/v1\nkind: CustomResourceDefinition\nmetadata:\n  name: buckets.s3.services.k8s.aws\nspec:\n  group: s3.services.k8s.aws\n  names:\n    kind: Bucket\n",
    );
    dir
}

fn arg(dir: &TempDir, rel: &str) -> String {
    dir.path().join(rel).display().to_string()
}

#[test]
fn test_generates_graphs() {
    let dir = fixture();
    let output = ackrgd(&[
        "--graphs",
        &arg(&dir, "graphs.yaml"),
        "--rendered",
        &arg(&dir, "rendered"),
        "--out",
        &arg(&dir, "out"),
        "--defaults-example",
    ]);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("s3"));
    assert!(dir.path().join("out/ack/s3-crds.yaml").exists());
    assert!(dir.path().join("out/ack/s3-ctrl.yaml").exists());
    assert!(dir.path().join("out/ack/s3-defaults.yaml").exists());

    let ctrl = fs::read_to_string(dir.path().join("out/ack/s3-ctrl.yaml")).unwrap();
    assert!(ctrl.contains("name: ack-s3-ctrl.kro.run"));
    assert!(ctrl.contains("${schema.spec.name}"));
}

#[test]
fn test_missing_rendered_chart_fails_with_service() {
    let dir = fixture();
    fs::remove_dir_all(dir.path().join("rendered/s3")).unwrap();

    let output = ackrgd(&[
        "--graphs",
        &arg(&dir, "graphs.yaml"),
        "--rendered",
        &arg(&dir, "rendered"),
        "--out",
        &arg(&dir, "out"),
    ]);

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("s3"));
}

#[test]
fn test_invalid_graphs_file() {
    let dir = fixture();
    write(dir.path(), "graphs.yaml", "graphs:\n  - service: s3\n");

    let output = ackrgd(&[
        "--graphs",
        &arg(&dir, "graphs.yaml"),
        "--rendered",
        &arg(&dir, "rendered"),
    ]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("graphs[0].version"));
}

#[test]
fn test_zero_concurrency_is_usage_error() {
    let dir = fixture();
    let output = ackrgd(&[
        "--graphs",
        &arg(&dir, "graphs.yaml"),
        "--rendered",
        &arg(&dir, "rendered"),
        "--concurrency",
        "0",
    ]);
    assert_eq!(output.status.code(), Some(64));
}
