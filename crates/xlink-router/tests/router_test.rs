//! End-to-end routing against the in-memory venue.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;
use xlink_core::{
    ActionType, ClientOrderId, Line, MockVenue, OrderEventKind, OrderSide, PathType, Price,
    RecordingCallback, RouteFeature, RouteFeatures, SelectedLine, Signal, Size, Transport,
    VenueAdapter, VenueKind,
};
use xlink_router::{DispatchOutcome, LineRouter, RouterConfig, LOGIN_FAILED_REASON};

fn signal(cid: &str) -> Signal {
    let mut s = Signal::limit(
        "ETHUSDT",
        ClientOrderId::from(cid),
        OrderSide::Sell,
        Price::new(dec!(1800)),
        Size::new(dec!(0.5)),
    );
    s.order_id = Some("oid-1".to_string());
    s
}

fn setup(mock: MockVenue) -> (Arc<MockVenue>, Arc<RecordingCallback>, LineRouter) {
    let mock = Arc::new(mock);
    let callback = Arc::new(RecordingCallback::new());
    let router = LineRouter::new(mock.clone(), callback.clone(), RouterConfig::default()).unwrap();
    (mock, callback, router)
}

#[tokio::test]
async fn test_rest_dispatch_uses_selected_line() {
    let (mock, callback, router) = setup(MockVenue::new("mock_usdt_swap", VenueKind::Swap));
    router
        .switch_line(ActionType::Cancel, SelectedLine::new(Line::REST_COLO))
        .await
        .unwrap();

    let outcome = router.cancel_order_select(signal("c1")).wait().await.unwrap();

    let expected = RouteFeature::new(ActionType::Cancel, Transport::Rest, PathType::Colo);
    assert_eq!(outcome, DispatchOutcome::Sent(expected));
    let dispatched = mock.dispatched();
    assert_eq!(dispatched.len(), 1);
    assert_eq!(dispatched[0].0, expected);
    assert!(callback.events().is_empty());
}

#[tokio::test]
async fn test_colo_dispatch_falls_back_to_normal() {
    let features = RouteFeatures::ALL.without(RouteFeature::new(
        ActionType::Place,
        Transport::Rest,
        PathType::Colo,
    ));
    let mock = Arc::new(MockVenue::new("mock_usdt_swap", VenueKind::Swap).with_features(features));
    let config = RouterConfig {
        initial_line: Some("client:rs;link:colo".to_string()),
        ..RouterConfig::default()
    };
    let router = LineRouter::new(mock.clone(), Arc::new(RecordingCallback::new()), config).unwrap();

    let place = router.place_order_select(signal("c2")).wait().await.unwrap();
    assert_eq!(
        place,
        DispatchOutcome::Sent(RouteFeature::new(ActionType::Place, Transport::Rest, PathType::Normal))
    );

    let amend = router.amend_order_select(signal("c2")).wait().await.unwrap();
    assert_eq!(
        amend,
        DispatchOutcome::Sent(RouteFeature::new(ActionType::Amend, Transport::Rest, PathType::Colo))
    );
    assert_eq!(mock.dispatched().len(), 2);
}

#[tokio::test]
async fn test_streaming_dispatch_logs_in_first() {
    let mock = MockVenue::new("mock_usdt_swap", VenueKind::Swap);
    mock.set_login_on_create(true);
    let (mock, callback, router) = setup(mock);
    router
        .set_all(SelectedLine::new(Line::STREAM_NORMAL))
        .await
        .unwrap();

    let outcome = router.place_order_select(signal("c3")).wait().await.unwrap();

    assert_eq!(
        outcome,
        DispatchOutcome::Sent(RouteFeature::new(
            ActionType::Place,
            Transport::Streaming,
            PathType::Normal
        ))
    );
    assert!(mock.stream_logged_in(PathType::Normal));
    assert!(callback.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_login_failure_emits_events_per_action() {
    let (mock, callback, router) = setup(MockVenue::new("mock_usdt_swap", VenueKind::Swap));
    router
        .set_all(SelectedLine::new(Line::STREAM_COLO))
        .await
        .unwrap();

    let place = router.place_order_select(signal("p1"));
    let amend = router.amend_order_select(signal("a1"));
    let cancel = router.cancel_order_select(signal("x1"));

    for handle in [place, amend, cancel] {
        assert_eq!(
            handle.wait().await.unwrap(),
            DispatchOutcome::LoginFailed(PathType::Colo)
        );
    }

    let mut events = callback.events();
    events.sort_by(|a, b| a.client_id.as_str().cmp(b.client_id.as_str()));
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].client_id.as_str(), "a1");
    assert_eq!(events[0].kind, OrderEventKind::AmendFail);
    assert_eq!(events[1].client_id.as_str(), "p1");
    assert_eq!(events[1].kind, OrderEventKind::Error);
    assert!(events.iter().all(|e| e.reason == LOGIN_FAILED_REASON));
    assert!(mock.dispatched().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_pending_login_does_not_block_rest_signals() {
    let (mock, _callback, router) = setup(MockVenue::new("mock_usdt_swap", VenueKind::Swap));
    router
        .switch_line(ActionType::Place, SelectedLine::new(Line::STREAM_NORMAL))
        .await
        .unwrap();

    let streaming = router.place_order_select(signal("s1"));
    let rest = router.place_order_select(signal("r1").pinned_to_rest());

    let outcome = rest
        .wait_with_deadline(Duration::from_millis(100))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        DispatchOutcome::Sent(RouteFeature::new(ActionType::Place, Transport::Rest, PathType::Normal))
    );
    assert!(!streaming.is_finished());
    assert_eq!(mock.dispatched().len(), 1);

    assert_eq!(
        streaming.wait().await.unwrap(),
        DispatchOutcome::LoginFailed(PathType::Normal)
    );
}

#[tokio::test]
async fn test_batch_colo_falls_back_to_normal() {
    let features = RouteFeatures::ALL.without(RouteFeature::new(
        ActionType::Amend,
        Transport::Rest,
        PathType::Colo,
    ));
    let mock = Arc::new(MockVenue::new("mock_usdt_swap", VenueKind::Swap).with_features(features));
    let config = RouterConfig {
        initial_line: Some("client:rs;link:colo".to_string()),
        ..RouterConfig::default()
    };
    let router = LineRouter::new(mock.clone(), Arc::new(RecordingCallback::new()), config).unwrap();

    let outcome = router
        .amend_batch_select(vec![signal("b1"), signal("b2")])
        .wait()
        .await
        .unwrap();

    let expected = RouteFeature::new(ActionType::Amend, Transport::Rest, PathType::Normal);
    assert_eq!(outcome, DispatchOutcome::Sent(expected));
    let batches = mock.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].0, expected);
    let cids: Vec<_> = batches[0].1.iter().map(|s| s.client_id.as_str()).collect();
    assert_eq!(cids, vec!["b1", "b2"]);
    assert!(mock.dispatched().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_batch_login_failure_reports_first_signal() {
    let (mock, callback, router) = setup(MockVenue::new("mock_usdt_swap", VenueKind::Swap));
    router
        .set_all(SelectedLine::new(Line::STREAM_NORMAL))
        .await
        .unwrap();

    let place = router.place_batch_select(vec![signal("p1"), signal("p2")]);
    let cancel = router.cancel_batch_select(vec![signal("x1"), signal("x2")]);
    assert_eq!(
        place.wait().await.unwrap(),
        DispatchOutcome::LoginFailed(PathType::Normal)
    );
    assert_eq!(
        cancel.wait().await.unwrap(),
        DispatchOutcome::LoginFailed(PathType::Normal)
    );

    let events = callback.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].client_id.as_str(), "p1");
    assert_eq!(events[0].kind, OrderEventKind::Error);
    assert_eq!(events[0].reason, LOGIN_FAILED_REASON);
    assert!(mock.batches().is_empty());
}

#[tokio::test]
async fn test_batch_pinned_to_rest_and_empty_batch() {
    let mock = MockVenue::new("mock_usdt_swap", VenueKind::Swap);
    let (mock, callback, router) = setup(mock);
    router
        .switch_line(ActionType::Place, SelectedLine::new(Line::STREAM_COLO))
        .await
        .unwrap();

    let outcome = router
        .place_batch_select(vec![signal("r1").pinned_to_rest(), signal("r2")])
        .wait()
        .await
        .unwrap();
    assert_eq!(
        outcome,
        DispatchOutcome::Sent(RouteFeature::new(ActionType::Place, Transport::Rest, PathType::Colo))
    );

    let empty = router.cancel_batch_select(Vec::new()).wait().await.unwrap();
    assert_eq!(empty, DispatchOutcome::Empty);
    assert_eq!(mock.batches().len(), 1);
    assert!(callback.events().is_empty());
}
