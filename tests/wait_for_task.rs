mod common;

use std::time::Duration;

use meilisearch_async_client::{ClientError, MeiliClient, TaskStatus, WaitOptions};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer};

use common::{api_error, task};

fn fast_options(timeout: Duration) -> WaitOptions {
    WaitOptions::default()
        .with_timeout(timeout)
        .with_interval(Duration::from_millis(5))
        .with_interval_step(Duration::from_millis(5))
}

#[tokio::test]
async fn polls_until_task_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tasks/3"))
        .respond_with(task(3, "processing", None))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tasks/3"))
        .respond_with(task(3, "succeeded", None))
        .expect(1)
        .mount(&server)
        .await;

    let client = MeiliClient::new(server.uri()).expect("valid url");
    let finished = client
        .wait_for_task_with(3, &fast_options(Duration::from_secs(2)))
        .await
        .expect("task finished");
    assert_eq!(finished.status, TaskStatus::Succeeded);
}

#[tokio::test]
async fn failed_task_is_returned_not_raised() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tasks/9"))
        .respond_with(task(9, "failed", None))
        .mount(&server)
        .await;

    let client = MeiliClient::new(server.uri()).expect("valid url");
    let finished = client
        .wait_for_task_with(9, &fast_options(Duration::from_secs(2)))
        .await
        .expect("terminal status");
    assert_eq!(finished.status, TaskStatus::Failed);
    assert!(matches!(
        finished.into_result(),
        Err(ClientError::TaskFailed(_))
    ));
}

#[tokio::test]
async fn gives_up_after_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tasks/4"))
        .respond_with(task(4, "enqueued", None))
        .mount(&server)
        .await;

    let client = MeiliClient::new(server.uri()).expect("valid url");
    let error = client
        .wait_for_task_with(4, &fast_options(Duration::from_millis(100)))
        .await
        .expect_err("never finishes");
    match error {
        ClientError::Timeout { task_uid, elapsed } => {
            assert_eq!(task_uid, 4);
            assert!(elapsed >= Duration::from_millis(100));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn unknown_task_surfaces_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tasks/404"))
        .respond_with(api_error(404, "task_not_found", "Task `404` not found."))
        .expect(1)
        .mount(&server)
        .await;

    let client = MeiliClient::new(server.uri()).expect("valid url");
    let error = client
        .wait_for_task_with(404, &fast_options(Duration::from_secs(2)))
        .await
        .expect_err("missing task");
    assert_eq!(
        error.api_code(),
        Some(&meilisearch_async_client::ErrorCode::TaskNotFound)
    );
}

#[tokio::test]
async fn slow_server_cannot_stretch_the_deadline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tasks/1"))
        .respond_with(task(1, "processing", None).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let client = MeiliClient::new(server.uri()).expect("valid url");
    let started = std::time::Instant::now();
    let error = client
        .wait_for_task_with(1, &fast_options(Duration::from_millis(200)))
        .await
        .expect_err("server too slow");
    assert!(matches!(error, ClientError::Timeout { task_uid: 1, .. }));
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "waited {:?}",
        started.elapsed()
    );
}
