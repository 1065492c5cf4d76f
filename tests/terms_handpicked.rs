// tests/terms_handpicked.rs
// Hand-picked queries for the term extractor and file-reference injection.

use trendscout::file_refs::inject_file_references;
use trendscout::terms::extract;

#[test]
fn conversational_queries_reduce_to_topics() {
    assert_eq!(
        extract("Could you tell me about the most trendy things in WebAssembly?"),
        "webassembly"
    );
    assert_eq!(extract("What's new with Postgres and SQL tools"), "new with postgres sql");
    assert_eq!(extract("Go vs Rust vs Java"), "go rust java");
}

#[test]
fn stop_word_only_query_is_empty() {
    assert_eq!(extract("what about the news"), "");
}

#[test]
fn injected_project_file_contributes_terms() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("project.json"),
        r#"{"Context": "edge inference", "Tools": [{"Name": "onnx"}, {"Name": "wasmtime"}]}"#,
    )
    .unwrap();

    let q = inject_file_references("trends for @project.json", dir.path());
    assert_eq!(extract(&q), "edge inference onnx wasmtime");
}

#[test]
fn missing_file_reference_leaves_notice() {
    let dir = tempfile::tempdir().unwrap();
    let q = inject_file_references("kotlin @nowhere.json", dir.path());
    assert_eq!(q, "kotlin [File nowhere.json not found]");
    assert_eq!(extract(&q), "kotlin file nowhere json not found");
}
