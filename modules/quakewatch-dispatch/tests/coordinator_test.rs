//! Free-text routing in interactive mode.

use std::sync::Arc;

use serde_json::json;

use quakewatch_common::TaskIdentity;
use quakewatch_dispatch::coordinator::CONVERSATIONAL_REPLY;
use quakewatch_dispatch::fixtures::{self, record, FixtureFeed, RecordingChannel, ScriptedGenerator};
use quakewatch_dispatch::{Coordinator, Dispatcher, Reply, Route, TaskOutput};
use quakewatch_store::MemoryStore;

fn coordinator(generator: Arc<ScriptedGenerator>) -> Coordinator {
    let store = Arc::new(MemoryStore::new().with_table(
        "citizen",
        &["email", "name"],
        vec![json!({"email": "a@x.com", "name": "A"})],
    ));
    let feed = Arc::new(FixtureFeed::new(record("2024-01-01", "08:00:00", "1.0,99.0")));
    let deps = fixtures::deps(feed, store, generator.clone(), Arc::new(RecordingChannel::new()));
    Coordinator::new(generator, Arc::new(Dispatcher::standard(&deps)))
}

#[tokio::test]
async fn greeting_is_answered_without_generation() {
    let generator = Arc::new(ScriptedGenerator::new("Alert"));
    let coordinator = coordinator(generator.clone());

    assert_eq!(coordinator.route("Halo!").await, Route::Conversational);
    assert_eq!(coordinator.route("   ").await, Route::Conversational);
    assert!(generator.calls().is_empty());

    let reply = coordinator.handle("selamat pagi").await;
    assert_eq!(reply, Reply::Conversational(CONVERSATIONAL_REPLY.to_string()));
}

#[tokio::test]
async fn routed_request_is_dispatched() {
    let generator = Arc::new(
        ScriptedGenerator::new("unused")
            .on("Route the request", "RecipientQuery")
            .on("PostgreSQL", "SELECT email, name FROM citizen"),
    );
    let coordinator = coordinator(generator.clone());

    let reply = coordinator.handle("siapa saja warga yang terdaftar?").await;

    let Reply::Completed(result) = reply else {
        panic!("expected a completed task, got {reply:?}");
    };
    assert_eq!(result.task, TaskIdentity::RecipientQuery);
    let TaskOutput::Rows(rows) = &result.output else {
        panic!("expected rows");
    };
    assert_eq!(rows[0]["email"], "a@x.com");
    assert_eq!(generator.calls_matching("Route the request"), 1);
}

#[tokio::test]
async fn ambiguous_or_failed_routing_is_conversational() {
    let ambiguous = coordinator(Arc::new(ScriptedGenerator::new("Alert, or maybe Report")));
    assert_eq!(ambiguous.route("kirim sesuatu").await, Route::Conversational);

    let failing = coordinator(Arc::new(
        ScriptedGenerator::new("Alert").fail_on("Route the request", "rate limited"),
    ));
    assert_eq!(failing.route("kirim peringatan").await, Route::Conversational);
}

#[tokio::test]
async fn failed_task_is_reported_in_the_reply() {
    let generator = Arc::new(
        ScriptedGenerator::new("unused")
            .on("Route the request", "RecipientQuery")
            .on("PostgreSQL", "DROP TABLE citizen"),
    );
    let reply = coordinator(generator).handle("hapus semua warga").await;

    assert!(matches!(
        &reply,
        Reply::Failed { task: TaskIdentity::RecipientQuery, .. }
    ));
    assert!(reply.to_string().starts_with("RecipientQuery failed: query translation rejected"));
}
