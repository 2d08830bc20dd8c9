mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{applicant, offering, order, Provider};
use onest_adapter::clock::SystemClock;
use onest_adapter::dispatch::{
    Callback, CallbackDispatcher, DeliveryOutcome, DispatchError, HttpCallbackDispatcher,
};
use onest_adapter::network::ActionKind;
use onest_adapter::seeker::{seeker_router, SeekerInbox};
use onest_adapter::storage::InMemoryCallbackInbox;
use serde_json::json;
use tokio::net::TcpListener;

/// Serve a seeker on an ephemeral port, returning its base URL and inbox.
async fn spawn_seeker() -> (String, Arc<SeekerInbox>) {
    let inbox = Arc::new(SeekerInbox::new(
        Arc::new(InMemoryCallbackInbox::default()),
        Arc::new(SystemClock),
    ));
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("ephemeral port");
    let address = listener.local_addr().expect("bound address");
    let router = seeker_router(inbox.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("seeker serves");
    });
    (format!("http://{address}"), inbox)
}

fn retarget(mut callback: Callback, base: &str) -> Callback {
    callback.url = Callback::target(base, callback.action);
    callback
}

fn dispatcher() -> HttpCallbackDispatcher {
    HttpCallbackDispatcher::new(Duration::from_secs(5)).expect("http client")
}

#[tokio::test]
async fn seeker_acknowledges_and_records_provider_callbacks() {
    let (base, inbox) = spawn_seeker().await;
    let provider = Provider::new(vec![offering("J1", 4, json!({}))]);

    let on_search = provider
        .exchange(ActionKind::Search, "T1", json!({ "intent": {} }))
        .await
        .expect("search acknowledged");
    let on_init = provider
        .exchange(ActionKind::Init, "T1", order("J1", Some(applicant(26))))
        .await
        .expect("init acknowledged");

    let http = dispatcher();
    for callback in [on_search, on_init] {
        let outcome = http
            .deliver(&retarget(callback, &base))
            .await
            .expect("seeker reachable");
        assert_eq!(outcome, DeliveryOutcome::Acknowledged);
    }

    let history = inbox.history("T1").expect("inbox readable");
    let actions: Vec<ActionKind> = history.iter().map(|received| received.action).collect();
    assert_eq!(actions, vec![ActionKind::Search, ActionKind::Init]);
    assert_eq!(history[1].envelope.context.action, "on_init");
    assert_eq!(history[1].envelope.context.bpp_id, "bpp.example");
}

#[tokio::test]
async fn seeker_nack_is_reported_as_a_rejection() {
    let (base, inbox) = spawn_seeker().await;
    let provider = Provider::new(vec![offering("J1", 4, json!({}))]);

    let mut on_select = provider
        .exchange(ActionKind::Select, "T2", order("J1", None))
        .await
        .expect("select acknowledged");
    on_select.body.context.transaction_id.clear();

    let outcome = dispatcher()
        .deliver(&retarget(on_select, &base))
        .await
        .expect("seeker reachable");

    match outcome {
        DeliveryOutcome::Rejected(error) => {
            assert_eq!(error.code, "30004");
            assert!(error.paths.contains("transaction_id"));
        }
        other => panic!("expected a NACK, got {other:?}"),
    }
    assert!(inbox.history("T2").expect("inbox readable").is_empty());
}

#[tokio::test]
async fn unreachable_seeker_is_a_transport_failure() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("ephemeral port");
    let address = listener.local_addr().expect("bound address");
    drop(listener);

    let provider = Provider::new(vec![offering("J1", 4, json!({}))]);
    let on_search = provider
        .exchange(ActionKind::Search, "T3", json!({ "intent": {} }))
        .await
        .expect("search acknowledged");

    let err = dispatcher()
        .deliver(&retarget(on_search, &format!("http://{address}")))
        .await
        .expect_err("nothing listening");
    assert!(matches!(err, DispatchError::Transport(_)));
}
