use std::path::Path;
use std::process::{Command, Output};

fn histrag(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_histrag"))
        .current_dir(dir)
        .env("APP_EMBEDDING__USE_FAKE", "true")
        .env("APP_EMBEDDING__FAKE_DIM", "64")
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("run histrag")
}

const HISTORY: &str = "José Rizal was born on June 19, 1861 in Calamba, Laguna.\n\n\
The Katipunan was founded in 1892 by Andrés Bonifacio.";

#[test]
fn missing_source_without_index_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let out = histrag(dir.path(), &["index", "--document", "missing.pdf", "--index", "idx", "--chunks", "chunks.json"]);
    assert!(!out.status.success());
    assert_eq!(out.status.code(), Some(4));
    assert!(!dir.path().join("idx").exists());
}

#[test]
fn index_builds_then_reloads() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("history.txt"), HISTORY).unwrap();
    let args = ["index", "--document", "history.txt", "--index", "idx", "--chunks", "chunks.json"];

    let first = histrag(dir.path(), &args);
    assert!(first.status.success(), "stderr: {}", String::from_utf8_lossy(&first.stderr));
    let stdout = String::from_utf8_lossy(&first.stdout);
    assert!(stdout.contains("Index ready: 1 chunks (fake:xxh64:d64)"), "{stdout}");

    std::fs::remove_file(dir.path().join("history.txt")).unwrap();
    let second = histrag(dir.path(), &args);
    assert!(second.status.success());
    let chunks: Vec<String> = serde_json::from_slice(&std::fs::read(dir.path().join("chunks.json")).unwrap()).unwrap();
    assert_eq!(chunks.len(), 1);
}

#[test]
fn corrupt_manifest_exits_with_corrupt_index_status() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("history.txt"), HISTORY).unwrap();
    let args = ["index", "--document", "history.txt", "--index", "idx", "--chunks", "chunks.json"];
    assert!(histrag(dir.path(), &args).status.success());

    std::fs::write(dir.path().join("idx").join("manifest.json"), "{}").unwrap();
    assert_eq!(histrag(dir.path(), &args).status.code(), Some(3));
}

#[test]
fn non_positive_top_n_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let out = Command::new(env!("CARGO_BIN_EXE_histrag"))
        .current_dir(dir.path())
        .env("APP_EMBEDDING__USE_FAKE", "true")
        .env("APP_GENERATION__API_KEY", "sk-test")
        .args(["ask", "Who was Rizal?", "--top-n", "-3"])
        .output()
        .expect("run histrag");
    assert_eq!(out.status.code(), Some(1));
}
