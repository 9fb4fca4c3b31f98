use latency_core::dashboard::{Dashboard, DashboardConfig};
use latency_core::error::SourceError;
use latency_core::poller::{poll_once, spawn_poller, PollOutcome};
use latency_core::store::{FiltersPatch, LayerPatch};
use latency_core::trends::{TimeRange, TrendKey, TrendPhase, NO_DATA_MESSAGE};
use latency_core::ViewStore;
use latency_devkit::{RadarPayload, TestHarness};
use std::sync::Arc;
use std::time::Duration;

fn mounted_store(harness: &TestHarness) -> ViewStore {
    let store = ViewStore::new(Arc::clone(&harness.catalog));
    store.mount();
    store
}

fn dashboard(harness: &TestHarness) -> Dashboard<latency_devkit::MockSource> {
    Dashboard::mount(Arc::clone(&harness.catalog), Arc::clone(&harness.source), DashboardConfig::default())
}

fn unavailable() -> SourceError {
    SourceError::Status { status: 503, body: "unavailable".into() }
}

#[tokio::test]
async fn test_poll_success_replaces_edges() {
    let harness = TestHarness::new();
    let store = mounted_store(&harness);
    harness.source.push_latest(Ok(RadarPayload::latest(&[Some(0.08), Some(0.12), None])));

    let outcome = poll_once(&*harness.source, &store).await;
    assert!(matches!(outcome, PollOutcome::Replaced(3)));
    let latencies: Vec<f64> = store.edges().iter().map(|e| e.latency_ms()).collect();
    assert_eq!(latencies, vec![120.0, 140.0, 160.0]);
}

#[tokio::test]
async fn test_failed_poll_keeps_previous_edges() {
    let harness = TestHarness::new();
    let store = mounted_store(&harness);
    harness
        .source
        .push_latest(Ok(RadarPayload::latest(&[Some(0.1)])))
        .push_latest(Err(unavailable()))
        .push_latest(Ok(RadarPayload::latest(&[None, None])));

    poll_once(&*harness.source, &store).await;
    let before = store.edges();
    assert_eq!(before.len(), 3);

    assert!(matches!(poll_once(&*harness.source, &store).await, PollOutcome::Failed(_)));
    assert_eq!(store.edges(), before);

    assert!(matches!(poll_once(&*harness.source, &store).await, PollOutcome::NoData));
    assert_eq!(store.edges(), before);
}

#[tokio::test(start_paused = true)]
async fn test_poller_ticks_and_counts_outcomes() {
    let harness = TestHarness::new();
    let store = mounted_store(&harness);
    harness
        .source
        .push_latest(Ok(RadarPayload::latest(&[Some(0.1)])))
        .push_latest(Err(unavailable()));

    let poller = spawn_poller(Arc::clone(&harness.source), store.clone(), Duration::from_secs(10));
    assert!(harness.wait_until(Duration::from_secs(1), || store.edges().len() == 3).await);
    let before = store.edges();

    assert!(harness.wait_until(Duration::from_secs(15), || poller.stats().polls_failed == 1).await);
    assert_eq!(store.edges(), before);
    let stats = poller.stats();
    assert_eq!(stats.polls_ok, 1);
    assert!(stats.last_success.is_some());
    poller.stop();
}

#[tokio::test(start_paused = true)]
async fn test_at_most_one_poll_in_flight() {
    let harness = TestHarness::new();
    let store = mounted_store(&harness);
    let gate = harness.source.hold_latest();
    harness.source.push_latest(Ok(RadarPayload::latest(&[Some(0.2)])));

    let poller = spawn_poller(Arc::clone(&harness.source), store.clone(), Duration::from_secs(1));
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(harness.source.latest_calls(), 1);

    gate.release(Ok(RadarPayload::latest(&[Some(0.1)])));
    assert!(harness.wait_until(Duration::from_secs(3), || harness.source.latest_calls() >= 2).await);
    assert!(harness.wait_until(Duration::from_secs(1), || store.edges().first().map(|e| e.latency_ms()) == Some(200.0)).await);
    poller.stop();
}

#[tokio::test(start_paused = true)]
async fn test_response_after_unmount_does_not_mutate() {
    let harness = TestHarness::new();
    let store = mounted_store(&harness);
    let gate = harness.source.hold_latest();

    let poller = spawn_poller(Arc::clone(&harness.source), store.clone(), Duration::from_secs(10));
    assert!(harness.wait_until(Duration::from_secs(1), || harness.source.latest_calls() == 1).await);

    store.unmount();
    gate.release(Ok(RadarPayload::latest(&[Some(0.1)])));

    assert!(harness.wait_until(Duration::from_secs(1), || poller.is_finished()).await);
    assert!(store.edges().is_empty());
}

#[tokio::test]
async fn test_stale_trend_response_is_discarded() {
    let harness = TestHarness::new();
    let dashboard = dashboard(&harness);

    let slow = harness.source.hold_pair();
    dashboard.select_host(Some("binance.com")).unwrap();
    assert!(harness.wait_until(Duration::from_secs(1), || harness.source.pair_queries().len() == 1).await);

    harness.source.push_pair(Ok(RadarPayload::pair(&[Some(0.05), Some(0.07)])));
    dashboard.set_pair(1, 2).unwrap();
    let current = TrendKey { source: 1, dest: 2, range: TimeRange::FifteenMinutes };
    assert!(
        harness
            .wait_until(Duration::from_secs(1), || dashboard.store().trend().phase == TrendPhase::Success)
            .await
    );

    slow.release(Ok(RadarPayload::pair(&[Some(0.9)])));
    dashboard.settle().await;

    let trend = dashboard.store().trend();
    assert_eq!(trend.key, Some(current));
    let values: Vec<_> = trend.samples.iter().map(|s| s.latency_ms).collect();
    assert_eq!(values, vec![Some(50.0), Some(70.0)]);

    let queries = harness.source.pair_queries();
    assert_eq!((queries[0].src_asn, queries[0].dst_asn), (13335, 16509));
    assert_eq!((queries[1].src_asn, queries[1].dst_asn), (16509, 264777));
}

#[tokio::test]
async fn test_malformed_trend_payload_is_error() {
    let harness = TestHarness::new();
    let dashboard = dashboard(&harness);
    harness.source.push_pair(Ok(RadarPayload::pair_without_values(4)));

    dashboard.select_host(Some("okx.com")).unwrap();
    dashboard.settle().await;

    let panel = dashboard.view().trend_panel.unwrap();
    assert_eq!(panel.phase, TrendPhase::Error);
    assert_eq!(panel.error.as_deref(), Some(NO_DATA_MESSAGE));
    assert!(panel.samples.is_empty());
    assert_eq!(panel.summary, None);
}

#[tokio::test]
async fn test_trend_transport_failure_message() {
    let harness = TestHarness::new();
    let dashboard = dashboard(&harness);
    harness.source.push_pair(Err(SourceError::Transport("connection reset".into())));

    dashboard.select_host(Some("bybit.com")).unwrap();
    dashboard.settle().await;

    let trend = dashboard.store().trend();
    assert_eq!(trend.phase, TrendPhase::Error);
    assert!(trend.error.unwrap().starts_with("Error fetching data:"));
}

#[tokio::test]
async fn test_reselecting_host_after_error_retries() {
    let harness = TestHarness::new();
    let dashboard = dashboard(&harness);
    harness
        .source
        .push_pair(Err(SourceError::Transport("connection reset".into())))
        .push_pair(Ok(RadarPayload::pair(&[Some(0.04), Some(0.06)])));

    dashboard.select_host(Some("binance.com")).unwrap();
    dashboard.settle().await;
    assert_eq!(dashboard.store().trend().phase, TrendPhase::Error);

    dashboard.select_host(Some("binance.com")).unwrap();
    dashboard.settle().await;

    assert_eq!(harness.source.pair_queries().len(), 2);
    let trend = dashboard.store().trend();
    assert_eq!(trend.phase, TrendPhase::Success);
    assert_eq!(trend.error, None);
    let values: Vec<_> = trend.samples.iter().map(|s| s.latency_ms).collect();
    assert_eq!(values, vec![Some(40.0), Some(60.0)]);
}

#[tokio::test]
async fn test_time_range_change_refetches() {
    let harness = TestHarness::new();
    let dashboard = dashboard(&harness);
    harness
        .source
        .push_pair(Ok(RadarPayload::pair(&[Some(0.1)])))
        .push_pair(Ok(RadarPayload::pair(&[Some(0.1), Some(0.3)])));

    dashboard.select_host(Some("binance.com")).unwrap();
    dashboard.settle().await;
    dashboard.update_filters(FiltersPatch { time_range: Some(TimeRange::OneDay), ..Default::default() });
    dashboard.settle().await;

    let queries = harness.source.pair_queries();
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[1].agg_interval, "1h");

    let panel = dashboard.view().trend_panel.unwrap();
    assert_eq!(panel.title, "Latency Trend: Binance → OKX");
    let summary = panel.summary.unwrap();
    assert_eq!((summary.min, summary.max, summary.avg), (100.0, 300.0, 200.0));

    // filtre texte seul : pas de nouvelle requête
    dashboard.update_filters(FiltersPatch { text_query: Some("bin".into()), ..Default::default() });
    dashboard.settle().await;
    assert_eq!(harness.source.pair_queries().len(), 2);
}

#[tokio::test]
async fn test_unmount_stops_trend_updates() {
    let harness = TestHarness::new();
    let dashboard = dashboard(&harness);
    let gate = harness.source.hold_pair();

    dashboard.select_host(Some("binance.com")).unwrap();
    assert!(harness.wait_until(Duration::from_secs(1), || harness.source.pair_queries().len() == 1).await);

    dashboard.unmount();
    gate.release(Ok(RadarPayload::pair(&[Some(0.1)])));
    dashboard.settle().await;

    assert!(!dashboard.store().is_mounted());
    assert_eq!(dashboard.store().trend().phase, TrendPhase::Loading);
}

#[tokio::test(start_paused = true)]
async fn test_layer_toggles_gate_the_view() {
    let harness = TestHarness::new();
    harness.source.push_latest(Ok(RadarPayload::latest(&[Some(0.3)])));
    harness.source.push_pair(Ok(RadarPayload::pair(&[Some(0.1)])));
    let dashboard = dashboard(&harness);
    assert!(harness.wait_until(Duration::from_secs(1), || dashboard.store().edges().len() == 3).await);

    dashboard.select_host(Some("okx.com")).unwrap();
    dashboard.settle().await;

    let view = dashboard.view();
    assert_eq!(view.arcs.len(), 3);
    assert_eq!(view.regions.len(), 4);
    assert!(view.trend_panel.is_some());
    let pulses = dashboard.pulses(1_000.0);
    assert_eq!(pulses.len(), 3);
    assert!(pulses.iter().all(|p| p.positions.len() == 5));

    dashboard.update_filters(FiltersPatch {
        layers: Some(LayerPatch { realtime: Some(false), historical: Some(false), regions: Some(false) }),
        ..Default::default()
    });
    let view = dashboard.view();
    assert!(view.arcs.is_empty());
    assert!(view.regions.is_empty());
    assert!(view.trend_panel.is_none());
    assert_eq!(view.edges_total, 3);
    assert!(dashboard.pulses(1_000.0).is_empty());
}

#[tokio::test]
async fn test_close_trends_keeps_pair_and_deselect_goes_idle() {
    let harness = TestHarness::new();
    let dashboard = dashboard(&harness);
    harness.source.push_pair(Ok(RadarPayload::pair(&[Some(0.1)])));

    dashboard.select_host(Some("binance.com")).unwrap();
    dashboard.settle().await;
    assert!(dashboard.close_trends());
    let view = dashboard.view();
    assert!(view.trend_panel.is_none());
    assert_eq!(view.filters.selected_pair, Some((0, 1)));

    dashboard.select_host(None).unwrap();
    assert_eq!(dashboard.store().trend().phase, TrendPhase::Idle);
    assert_eq!(dashboard.view().selected_host, None);
}

#[tokio::test]
async fn test_record_frame_updates_fps() {
    let harness = TestHarness::new();
    let dashboard = dashboard(&harness);

    assert_eq!(dashboard.record_frame(1_000.0), None);
    assert_eq!(dashboard.record_frame(1_016.0), Some(62.5));
    assert_eq!(dashboard.record_frame(1_016.0), None);
    assert_eq!(dashboard.view().fps, 62.5);
}
