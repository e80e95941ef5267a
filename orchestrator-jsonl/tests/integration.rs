use orchestrator_jsonl::JsonlUsageSink;
use std::path::PathBuf;
use std::time::Duration;
use tiered_orchestrator::{UsageRecord, UsageSink};

#[tokio::test]
async fn writes_json_lines() {
    let path = PathBuf::from(format!("/tmp/orchestrator-jsonl-test-{}.log", std::process::id()));
    let _ = std::fs::remove_file(&path);
    let sink = JsonlUsageSink::new(path.to_string_lossy().to_string());

    sink.record(UsageRecord {
        user_id: None,
        session_id: None,
        api_name: "reddit_api".to_string(),
        tier: 3,
        cost_units: 1,
        latency: Some(Duration::from_millis(120)),
        success: true,
        error: None,
    })
    .await;

    let contents = std::fs::read_to_string(&path).expect("file");
    assert!(contents.contains("reddit_api"));

    let _ = std::fs::remove_file(&path);
}
