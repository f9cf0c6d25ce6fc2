mod common;

use axum::http::StatusCode;
use common::*;
use healthagent::healthagent_core::{AgentError, HealthStatus, StatusTable};
use healthagent::{ReportTrigger, Reporter};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn reporter_for(upstreams: Vec<reqwest::Url>) -> Reporter {
    let config = test_config(upstreams);
    Reporter::new(Arc::new(plain_client(&config)))
}

#[tokio::test]
async fn report_stops_at_first_accepting_upstream() {
    let a = MockUpstream::spawn(&[]).await;
    let b = MockUpstream::spawn(&[]).await;
    let c = MockUpstream::spawn(&[]).await;
    a.fail_posts_with(StatusCode::INTERNAL_SERVER_ERROR);

    let reporter = reporter_for(vec![a.url.clone(), b.url.clone(), c.url.clone()]);
    let table = StatusTable::with_len(1);
    table.set(0, HealthStatus::new(true, true));

    assert_ok!(reporter.report(&table, ReportTrigger::Change(0)).await);

    assert_eq!(a.posts().len(), 1);
    assert_eq!(b.posts().len(), 1);
    assert!(c.requests().is_empty());
}

#[tokio::test]
async fn report_sends_full_snapshot_with_agent_name() {
    let upstream = MockUpstream::spawn(&[]).await;
    let reporter = reporter_for(vec![upstream.url.clone()]);

    let table = StatusTable::with_len(3);
    table.set(2, HealthStatus::new(true, true).with_detail("endpoint", "10.0.0.3:80"));

    assert_ok!(reporter.report(&table, ReportTrigger::Change(2)).await);

    let posts = upstream.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].agent_name.as_deref(), Some("test-agent"));

    let statuses = posts[0].statuses();
    assert_eq!(statuses.len(), 3);
    assert!(!statuses[0].healthy);
    assert!(!statuses[1].healthy);
    assert!(statuses[2].healthy && statuses[2].did_change);
    assert_eq!(
        statuses[2].details.get("endpoint").and_then(|v| v.as_str()),
        Some("10.0.0.3:80")
    );
}

#[tokio::test]
async fn report_fails_only_after_every_upstream_failed() {
    let rejecting = MockUpstream::spawn(&[]).await;
    rejecting.fail_posts_with(StatusCode::SERVICE_UNAVAILABLE);
    let down = MockUpstream::unreachable();

    let reporter = reporter_for(vec![down, rejecting.url.clone()]);
    let table = StatusTable::with_len(1);

    let err = assert_err!(reporter.report(&table, ReportTrigger::KeepAlive).await);
    match err {
        AgentError::UpstreamsExhausted { attempted, last } => {
            assert_eq!(attempted, 2);
            assert!(matches!(
                *last,
                AgentError::UpstreamRejected { status: 503, .. }
            ));
        }
        other => panic!("expected UpstreamsExhausted, got {other:?}"),
    }
    assert_eq!(rejecting.posts().len(), 1);
}

#[tokio::test]
async fn failed_attempts_still_reset_the_keep_alive_clock() {
    let reporter = reporter_for(vec![MockUpstream::unreachable()]);
    let table = StatusTable::with_len(0);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(reporter.clock().since_last_attempt() >= Duration::from_millis(300));

    assert_err!(reporter.report(&table, ReportTrigger::KeepAlive).await);
    assert!(reporter.clock().since_last_attempt() < Duration::from_millis(300));
}
