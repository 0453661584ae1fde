mod common;
use common::{query_param, TestApp};

use mold_mcp::services::job_poller::{CancelSignal, JobStatus, PollOptions};
use serde_json::json;
use std::time::Duration;

fn status(code: i64) -> serde_json::Value {
    json!({"queryasyncjobresultresponse": {"jobid": "job-1", "jobstatus": code, "jobresult": {"n": code}}})
}

fn fast() -> PollOptions {
    PollOptions {
        interval_ms: 10,
        timeout_ms: 1_000,
    }
}

#[tokio::test]
async fn wait_returns_first_terminal_response() {
    let t = TestApp::new();
    t.transport.push_json(status(0));
    t.transport.push_json(status(0));
    t.transport.push_json(status(1));

    let handle = t
        .app
        .poller
        .wait("job-1", fast(), &CancelSignal::new())
        .await
        .expect("job completes");
    assert_eq!(handle.status, JobStatus::Succeeded);
    assert_eq!(handle.raw_result["queryasyncjobresultresponse"]["jobresult"]["n"], 1);

    let urls = t.transport.urls();
    assert_eq!(urls.len(), 3);
    for url in &urls {
        assert_eq!(query_param(url, "command").as_deref(), Some("queryAsyncJobResult"));
        assert_eq!(query_param(url, "jobid").as_deref(), Some("job-1"));
    }
}

#[tokio::test]
async fn failed_job_is_terminal_and_not_an_error() {
    let t = TestApp::new();
    t.transport.push_json(status(2));
    let handle = t
        .app
        .poller
        .wait("job-1", fast(), &CancelSignal::new())
        .await
        .expect("failed jobs still return");
    assert_eq!(handle.status, JobStatus::Failed);
}

#[tokio::test]
async fn pending_forever_times_out() {
    let t = TestApp::new();
    t.transport.push_json(status(0));
    let err = t
        .app
        .poller
        .wait(
            "job-1",
            PollOptions {
                interval_ms: 10,
                timeout_ms: 60,
            },
            &CancelSignal::new(),
        )
        .await
        .expect_err("must time out");
    assert_eq!(err.code(), "JOB_TIMEOUT");
    assert!(t.transport.urls().len() >= 2);
}

#[tokio::test]
async fn platform_error_during_poll_propagates() {
    let t = TestApp::new();
    t.transport.push(530, "{\"errortext\":\"job not found\"}");
    let err = t
        .app
        .poller
        .wait("job-1", fast(), &CancelSignal::new())
        .await
        .expect_err("must fail");
    assert_eq!(err.code(), "API_HTTP");
}

#[tokio::test]
async fn cancel_aborts_a_tracked_wait() {
    let t = TestApp::new();
    t.transport.push_json(status(0));
    let poller = t.app.poller.clone();
    let waiter = tokio::spawn(async move {
        poller
            .wait_tracked(
                "job-1",
                PollOptions {
                    interval_ms: 20,
                    timeout_ms: 10_000,
                },
            )
            .await
    });

    let mut registered = false;
    for _ in 0..100 {
        if t.app.poller.active_waits() == vec!["job-1".to_string()] {
            registered = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(registered, "wait never registered");
    assert!(t.app.poller.cancel("job-1"));

    let err = tokio::time::timeout(Duration::from_secs(2), waiter)
        .await
        .expect("wait ends promptly")
        .expect("join")
        .expect_err("canceled");
    assert_eq!(err.code(), "JOB_WAIT_CANCELED");
    assert!(t.app.poller.active_waits().is_empty());
    assert!(!t.app.poller.cancel("job-1"));
}

async fn until_registered(t: &TestApp, job_id: &str) {
    for _ in 0..100 {
        if t.app.poller.active_waits() == vec![job_id.to_string()] {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("wait on {} never registered", job_id);
}

fn slow() -> PollOptions {
    PollOptions {
        interval_ms: 20,
        timeout_ms: 10_000,
    }
}

#[tokio::test]
async fn aborted_wait_is_unregistered() {
    let t = TestApp::new();
    t.transport.push_json(status(0));
    let poller = t.app.poller.clone();
    let waiter = tokio::spawn(async move { poller.wait_tracked("job-1", slow()).await });
    until_registered(&t, "job-1").await;

    waiter.abort();
    let joined = waiter.await;
    assert!(joined.expect_err("aborted").is_cancelled());
    assert!(t.app.poller.active_waits().is_empty());
    assert!(!t.app.poller.cancel("job-1"));
}

#[tokio::test]
async fn wait_after_cancel_starts_fresh() {
    let t = TestApp::new();
    t.transport.push_json(status(0));
    let poller = t.app.poller.clone();
    let waiter = tokio::spawn(async move { poller.wait_tracked("job-1", slow()).await });
    until_registered(&t, "job-1").await;
    assert!(t.app.poller.cancel("job-1"));
    let err = waiter.await.expect("join").expect_err("canceled");
    assert_eq!(err.code(), "JOB_WAIT_CANCELED");

    t.transport.push_json(status(1));
    let polls_before = t.transport.urls().len();
    let handle = t
        .app
        .poller
        .wait_tracked("job-1", fast())
        .await
        .expect("second wait polls normally");
    assert_eq!(handle.status, JobStatus::Succeeded);
    assert!(t.transport.urls().len() > polls_before);
    assert!(t.app.poller.active_waits().is_empty());
}

#[tokio::test]
async fn fixed_stop_tool_waits_when_asked() {
    let t = TestApp::new();
    t.transport
        .push_json(json!({"stopvirtualmachineresponse": {"jobid": "job-1"}}));
    t.transport.push_json(status(0));
    t.transport.push_json(status(1));

    let payload = t
        .app
        .registry
        .execute(
            "mold_stopVirtualMachine",
            json!({"id": "vm-1", "forced": true, "_wait": "true", "_intervalMs": 10, "_timeoutMs": "1000"}),
        )
        .await
        .expect("tool call");
    assert_eq!(payload["result"]["queryasyncjobresultresponse"]["jobstatus"], 1);

    let urls = t.transport.urls();
    assert_eq!(t.transport.commands(), vec![
        "stopVirtualMachine",
        "queryAsyncJobResult",
        "queryAsyncJobResult",
    ]);
    assert_eq!(query_param(&urls[0], "forced").as_deref(), Some("true"));
    assert!(query_param(&urls[0], "_wait").is_none());
    assert!(query_param(&urls[0], "_intervalMs").is_none());
}

#[tokio::test]
async fn without_wait_the_start_response_comes_back() {
    let t = TestApp::new();
    t.transport
        .push_json(json!({"startvirtualmachineresponse": {"jobid": "job-7"}}));
    let payload = t
        .app
        .registry
        .execute("mold_startVirtualMachine", json!({"id": "vm-1"}))
        .await
        .expect("tool call");
    assert_eq!(payload["result"]["startvirtualmachineresponse"]["jobid"], "job-7");
    assert_eq!(t.transport.commands(), vec!["startVirtualMachine"]);
}

#[tokio::test]
async fn wait_for_job_tool_returns_raw_status() {
    let t = TestApp::new();
    t.transport.push_json(status(1));
    let payload = t
        .app
        .registry
        .execute("mold_waitForJob", json!({"jobid": "job-1", "intervalMs": 10}))
        .await
        .expect("tool call");
    assert_eq!(payload["result"], status(1));
}
