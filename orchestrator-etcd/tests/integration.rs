use orchestrator_etcd::EtcdHaltStore;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tiered_orchestrator::{HaltRecord, HaltStore, Intent};

// Requires etcd running. If TIERED_ORCHESTRATOR_TEST_ETCD_ENDPOINT is unset, the test skips.
#[tokio::test]
async fn round_trips_halt_record_through_etcd() {
    let Some(endpoint) = std::env::var("TIERED_ORCHESTRATOR_TEST_ETCD_ENDPOINT").ok() else {
        eprintln!("skipping: set TIERED_ORCHESTRATOR_TEST_ETCD_ENDPOINT (e.g. http://127.0.0.1:2379)");
        return;
    };
    let client = etcd_client::Client::connect([endpoint.as_str()], None)
        .await
        .unwrap_or_else(|e| panic!("Failed to connect to etcd at '{}': {}", endpoint, e));

    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let prefix = format!("halt_test/{nanos}");
    let store = EtcdHaltStore::new(prefix.clone(), client).expect("valid store");

    let session_id = "session-integration";
    assert!(store.get(session_id).await.unwrap().is_none());

    let record = HaltRecord {
        intent: Intent::Product,
        query: "vacuum".to_string(),
        requested_products: vec![],
        accumulated_items: vec![],
        accumulated_snippets: vec![],
        sources_used_so_far: vec!["amazon_affiliate".to_string()],
        tier_reached: 2,
        pending_consent_type: "account_toggle".to_string(),
    };

    store.set(session_id, &record, Duration::from_secs(600)).await.expect("set failed");
    let fetched = store.get(session_id).await.unwrap().expect("record should exist");
    assert_eq!(fetched, record);

    store.delete(session_id).await.expect("delete failed");
    assert!(store.get(session_id).await.unwrap().is_none());
}
