//! End-to-end task flows over the in-memory store and fixture collaborators.

use std::sync::Arc;

use serde_json::json;

use quakewatch_common::{
    AudienceKind, DeliveryStatus, NewsArticle, NewsDigest, QuakeError, TaskIdentity,
};
use quakewatch_dispatch::fixtures::{
    self, record, FixtureFeed, FixtureNews, RecordingChannel, ScriptedGenerator,
};
use quakewatch_dispatch::reference::ReferenceLibrary;
use quakewatch_dispatch::{Dispatcher, TaskOutput};
use quakewatch_store::MemoryStore;

fn store() -> Arc<MemoryStore> {
    Arc::new(
        MemoryStore::new()
            .with_table(
                "citizen",
                &["email", "name"],
                vec![json!({"email": "a@x.com", "name": "A"})],
            )
            .with_table(
                "org",
                &["email", "name"],
                vec![json!({"email": "bpbd@x.com", "name": "BPBD Sumut"})],
            ),
    )
}

fn generator() -> Arc<ScriptedGenerator> {
    Arc::new(
        ScriptedGenerator::new("Gempa M5.2 terjadi. Sumber: BMKG.")
            .on("`citizen`", "```sql\nSELECT email, name FROM citizen;\n```")
            .on("`org`", "SELECT email, name FROM org"),
    )
}

#[tokio::test]
async fn alert_reaches_the_single_citizen_and_stores_one_event() {
    let store = store();
    let channel = Arc::new(RecordingChannel::new());
    let feed = Arc::new(FixtureFeed::new(record("2024-01-01", "08:00:00", "1.0,99.0")));
    let deps = fixtures::deps(feed, store.clone(), generator(), channel.clone());
    let dispatcher = Dispatcher::standard(&deps);

    let result = dispatcher.dispatch(TaskIdentity::Alert, "").await.unwrap();

    let TaskOutput::Jobs(jobs) = result.output else {
        panic!("expected jobs, got {:?}", result.output);
    };
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].recipient.address, "a@x.com");
    assert_eq!(jobs[0].recipient.display_name, "A");
    assert_eq!(jobs[0].recipient.audience, AudienceKind::Citizen);
    assert_eq!(jobs[0].status, DeliveryStatus::Sent);

    let events = store.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_date, "2024-01-01");
    assert_eq!(events[0].event_time, "08:00:00");
    assert_eq!(events[0].coordinates, "1.0,99.0");

    let sent = channel.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "a@x.com");
    assert_eq!(sent[0].subject, "PERINGATAN GEMPA BUMI");
}

#[tokio::test]
async fn repeated_alerts_keep_one_stored_event() {
    let store = store();
    let feed = Arc::new(FixtureFeed::new(record("2024-01-01", "08:00:00", "1.0,99.0")));
    let deps = fixtures::deps(feed, store.clone(), generator(), Arc::new(RecordingChannel::new()));
    let dispatcher = Dispatcher::standard(&deps);

    dispatcher.dispatch(TaskIdentity::Alert, "").await.unwrap();
    dispatcher.dispatch(TaskIdentity::Alert, "").await.unwrap();

    assert_eq!(store.event_count(), 1);
}

#[tokio::test]
async fn report_is_grounded_in_news_and_reference() {
    let generator = generator();
    let channel = Arc::new(RecordingChannel::new());
    let feed = Arc::new(FixtureFeed::new(record("2024-01-01", "08:00:00", "1.0,99.0")));
    let mut deps = fixtures::deps(feed, store(), generator.clone(), channel.clone());
    deps.news = Arc::new(FixtureNews::new(NewsDigest {
        query: "Gempa Hari Ini".into(),
        answer: Some("Warga Medan merasakan guncangan.".into()),
        articles: vec![NewsArticle {
            title: "Gempa guncang Sumut".into(),
            url: "https://news.example/sumut".into(),
            content: "Beberapa rumah retak.".into(),
            published_date: None,
        }],
    }));
    deps.reference = Arc::new(ReferenceLibrary::from_text(
        "Saat gempa, lindungi kepala.\n\nBanjir: naik ke tempat tinggi.",
    ));
    let dispatcher = Dispatcher::standard(&deps);

    let result = dispatcher.dispatch(TaskIdentity::Report, "").await.unwrap();

    let TaskOutput::Jobs(jobs) = result.output else {
        panic!("expected jobs");
    };
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].recipient.address, "bpbd@x.com");
    assert_eq!(jobs[0].recipient.audience, AudienceKind::Organization);
    assert_eq!(channel.sent()[0].subject, "LAPORAN GEMPA BUMI");

    let (_, report_prompt) = generator
        .calls()
        .into_iter()
        .find(|(system, _)| system.contains("situation reports"))
        .expect("report prompt was sent");
    assert!(report_prompt.contains("Recipient: BPBD Sumut"));
    assert!(report_prompt.contains("Warga Medan merasakan guncangan."));
    assert!(report_prompt.contains("Saat gempa, lindungi kepala."));
    assert!(!report_prompt.contains("Banjir"));
}

#[tokio::test]
async fn empty_feed_fails_alert_with_no_data() {
    let channel = Arc::new(RecordingChannel::new());
    let deps = fixtures::deps(
        Arc::new(FixtureFeed::empty()),
        store(),
        generator(),
        channel.clone(),
    );
    let dispatcher = Dispatcher::standard(&deps);

    let err = dispatcher.dispatch(TaskIdentity::Alert, "").await.unwrap_err();

    assert_eq!(err, QuakeError::prerequisite(TaskIdentity::DataFetch, QuakeError::NoData));
    assert!(channel.sent().is_empty());
}

#[tokio::test]
async fn news_failure_blocks_report_but_not_alert() {
    let feed = Arc::new(FixtureFeed::new(record("2024-01-01", "08:00:00", "1.0,99.0")));
    let mut deps = fixtures::deps(feed, store(), generator(), Arc::new(RecordingChannel::new()));
    let outage = QuakeError::upstream("tavily", "429 Too Many Requests");
    deps.news = Arc::new(FixtureNews::failing(outage.clone()));
    let dispatcher = Dispatcher::standard(&deps);

    assert!(dispatcher.dispatch(TaskIdentity::Alert, "").await.is_ok());
    let err = dispatcher.dispatch(TaskIdentity::Report, "").await.unwrap_err();
    assert_eq!(err, QuakeError::prerequisite(TaskIdentity::NewsFetch, outage));
}

#[tokio::test]
async fn store_outage_surfaces_from_data_fetch() {
    let feed = Arc::new(FixtureFeed::new(record("2024-01-01", "08:00:00", "1.0,99.0")));
    let deps = fixtures::deps(
        feed,
        Arc::new(MemoryStore::new().unavailable()),
        generator(),
        Arc::new(RecordingChannel::new()),
    );
    let dispatcher = Dispatcher::standard(&deps);

    let err = dispatcher.dispatch(TaskIdentity::DataFetch, "").await.unwrap_err();
    assert!(matches!(err, QuakeError::StoreUnavailable(_)));
}
