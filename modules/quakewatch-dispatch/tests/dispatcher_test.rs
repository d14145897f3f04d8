//! Prerequisite ordering and failure propagation.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use quakewatch_common::{QuakeError, QuakeResult, TaskIdentity};
use quakewatch_dispatch::graph::{Step, TaskGraph};
use quakewatch_dispatch::{Dispatcher, Handler, Inputs, TaskOutput};

/// Records every call in a shared log and returns a fixed result.
struct StubHandler {
    log: Arc<Mutex<Vec<TaskIdentity>>>,
    result: QuakeResult<TaskOutput>,
}

impl StubHandler {
    fn ok(log: &Arc<Mutex<Vec<TaskIdentity>>>, output: TaskOutput) -> Arc<Self> {
        Arc::new(Self {
            log: log.clone(),
            result: Ok(output),
        })
    }

    fn failing(log: &Arc<Mutex<Vec<TaskIdentity>>>, error: QuakeError) -> Arc<Self> {
        Arc::new(Self {
            log: log.clone(),
            result: Err(error),
        })
    }
}

#[async_trait]
impl Handler for StubHandler {
    async fn run(&self, step: &Step, _inputs: &Inputs, _request: &str) -> QuakeResult<TaskOutput> {
        self.log.lock().unwrap().push(step.task);
        self.result.clone()
    }
}

struct SlowHandler;

#[async_trait]
impl Handler for SlowHandler {
    async fn run(&self, _step: &Step, _inputs: &Inputs, _request: &str) -> QuakeResult<TaskOutput> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(TaskOutput::Rows(vec![]))
    }
}

fn stubbed(log: &Arc<Mutex<Vec<TaskIdentity>>>) -> Dispatcher {
    Dispatcher::new(TaskGraph::standard(), Duration::from_secs(5))
        .with_handler(
            TaskIdentity::DataFetch,
            StubHandler::ok(log, TaskOutput::Rows(vec![])),
        )
        .with_handler(
            TaskIdentity::NewsFetch,
            StubHandler::ok(log, TaskOutput::Rows(vec![])),
        )
        .with_handler(
            TaskIdentity::RecipientQuery,
            StubHandler::ok(log, TaskOutput::Rows(vec![])),
        )
        .with_handler(TaskIdentity::Alert, StubHandler::ok(log, TaskOutput::Jobs(vec![])))
        .with_handler(TaskIdentity::Report, StubHandler::ok(log, TaskOutput::Jobs(vec![])))
}

#[tokio::test]
async fn prerequisites_run_in_declared_order_before_the_task() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let dispatcher = stubbed(&log);

    let result = dispatcher.dispatch(TaskIdentity::Report, "").await.unwrap();

    assert_eq!(result.task, TaskIdentity::Report);
    assert_eq!(result.output, TaskOutput::Jobs(vec![]));
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            TaskIdentity::DataFetch,
            TaskIdentity::NewsFetch,
            TaskIdentity::RecipientQuery,
            TaskIdentity::Report,
        ]
    );
}

#[tokio::test]
async fn failed_prerequisite_stops_the_composite_task() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let stub_error = QuakeError::upstream("bmkg", "503 Service Unavailable");
    let dispatcher = stubbed(&log).with_handler(
        TaskIdentity::DataFetch,
        StubHandler::failing(&log, stub_error.clone()),
    );

    let err = dispatcher.dispatch(TaskIdentity::Alert, "").await.unwrap_err();

    assert_eq!(
        err,
        QuakeError::PrerequisiteFailure {
            task: TaskIdentity::DataFetch,
            source: Box::new(stub_error.clone()),
        }
    );
    assert_eq!(err.root_cause(), &stub_error);
    assert_eq!(*log.lock().unwrap(), vec![TaskIdentity::DataFetch]);
}

#[tokio::test]
async fn simple_tasks_skip_prerequisites() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let dispatcher = stubbed(&log);

    dispatcher
        .dispatch(TaskIdentity::RecipientQuery, "who lives in Sleman?")
        .await
        .unwrap();

    assert_eq!(*log.lock().unwrap(), vec![TaskIdentity::RecipientQuery]);
}

#[tokio::test]
async fn leaf_errors_surface_unchanged() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let dispatcher = stubbed(&log)
        .with_handler(TaskIdentity::NewsFetch, StubHandler::failing(&log, QuakeError::NoData));

    let err = dispatcher.dispatch(TaskIdentity::NewsFetch, "").await.unwrap_err();
    assert_eq!(err, QuakeError::NoData);
}

#[tokio::test]
async fn slow_handler_times_out() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let dispatcher = Dispatcher::new(TaskGraph::standard(), Duration::from_millis(50))
        .with_handler(TaskIdentity::DataFetch, StubHandler::ok(&log, TaskOutput::Rows(vec![])))
        .with_handler(TaskIdentity::RecipientQuery, Arc::new(SlowHandler))
        .with_handler(TaskIdentity::Alert, StubHandler::ok(&log, TaskOutput::Jobs(vec![])));

    let err = dispatcher.dispatch(TaskIdentity::Alert, "").await.unwrap_err();

    match err {
        QuakeError::PrerequisiteFailure { task, source } => {
            assert_eq!(task, TaskIdentity::RecipientQuery);
            assert!(matches!(*source, QuakeError::Timeout { ref operation, .. } if operation == "RecipientQuery"));
        }
        other => panic!("expected prerequisite failure, got {other:?}"),
    }
    assert_eq!(*log.lock().unwrap(), vec![TaskIdentity::DataFetch]);
}

#[tokio::test]
async fn unregistered_handler_is_a_config_error() {
    let dispatcher = Dispatcher::new(TaskGraph::standard(), Duration::from_secs(5));
    let err = dispatcher.dispatch(TaskIdentity::DataFetch, "").await.unwrap_err();
    assert!(matches!(err, QuakeError::Config(msg) if msg.contains("DataFetch")));
}
