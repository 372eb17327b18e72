//! tickwatch Integration Tests
//!
//! End-to-end checks across the public API:
//! - Sampling under concurrent readers
//! - Region reports and the health report payload
//! - Dispatcher lifecycle and scheduled firing
//! - Webhook delivery against a local HTTP endpoint

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;

use tickwatch::adapters::{RecordingSink, SharedHostStatus, StaticRegionProvider};
use tickwatch::capacity::RegionOccupancy;
use tickwatch::config::{ConfigCorrection, MonitorConfig};
use tickwatch::domain::{RegionId, RegionSnapshot};
use tickwatch::{AppContext, DispatcherPhase, Error};

const TRUSTED_URL: &str = "https://discord.com/api/webhooks/42/token";

fn regions() -> Arc<StaticRegionProvider> {
    Arc::new(StaticRegionProvider::new(vec![
        RegionSnapshot::new(
            RegionId::with_default_namespace("overworld"),
            RegionOccupancy::new(5, 289, 70),
        ),
        RegionSnapshot::new(
            RegionId::with_default_namespace("the_nether"),
            RegionOccupancy::new(10, 0, 70),
        ),
    ]))
}

fn context(config: MonitorConfig) -> AppContext {
    AppContext::builder(config.validate(), regions()).build()
}

fn enabled(cron: &str) -> MonitorConfig {
    MonitorConfig {
        enable_send_webhook: true,
        webhook_url: TRUSTED_URL.to_string(),
        webhook_cron_expression: cron.to_string(),
        ..Default::default()
    }
}

// =============================================================================
// Sampling
// =============================================================================

mod sampling_tests {
    use super::*;
    use tickwatch::sampling::{RateMetrics, SampleWindow, DEFAULT_NOMINAL_CYCLE};

    #[test]
    fn test_window_scenario() {
        let window = Arc::new(SampleWindow::new(100, DEFAULT_NOMINAL_CYCLE));
        for _ in 0..150 {
            window.record(50_000_000);
        }

        let rates = RateMetrics::new(window, 20);
        assert_eq!(rates.mean_cycle_millis(), 50.0);
        assert_eq!(rates.rate(), 20.0);
    }

    #[test]
    fn test_readers_never_block_or_exceed_nominal() {
        let ctx = context(MonitorConfig::default());
        let window = ctx.window();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for i in 0..20_000u64 {
                    window.record(((i % 7) as i64 + 1) * 10_000_000);
                }
            });

            for _ in 0..4 {
                let rates = ctx.rates();
                scope.spawn(move || {
                    for _ in 0..2_000 {
                        let snapshot = rates.snapshot();
                        assert!(snapshot.rate <= 20.0);
                        assert!(snapshot.mean_cycle_millis.is_finite());
                        assert!(snapshot.sample_count <= 100);
                    }
                });
            }
        });

        assert_eq!(window.len(), 100);
    }

    #[test]
    fn test_timer_feeds_shared_window() {
        let ctx = context(MonitorConfig::default());
        let timer = ctx.timer();

        let start = timer.start();
        std::thread::sleep(Duration::from_millis(5));
        let elapsed = timer.finish(start);

        assert!(elapsed >= Duration::from_millis(5));
        assert_eq!(ctx.window().len(), 1);
        assert!(ctx.rates().mean_cycle_millis() >= 5.0);
    }
}

// =============================================================================
// Reports
// =============================================================================

mod report_tests {
    use super::*;

    #[test]
    fn test_region_report_text() {
        let report = context(MonitorConfig::default())
            .assembler()
            .build_all_regions(false);

        assert_eq!(
            report.render(),
            "Mob cap of all dimensions\n\
             [Overworld]\n  5/70\n\
             [Nether]\n  10/0\n\
             \x20 Warning: no spawnable chunks are loaded, the cap is 0"
        );
    }

    #[test]
    fn test_unknown_region_is_surfaced() {
        let assembler = context(MonitorConfig::default()).assembler();
        assert_matches!(
            assembler.build_single_region("minecraft:the_end", true),
            Err(Error::RegionNotFound(name)) if name == "minecraft:the_end"
        );
        assert!(assembler.build_single_region("OVERWORLD", true).is_ok());
    }

    #[test]
    fn test_payload_wire_shape() {
        let host = Arc::new(SharedHostStatus::new());
        host.set(2, 10);
        let ctx = AppContext::builder(MonitorConfig::default().validate(), regions())
            .host(host)
            .build();

        let json = serde_json::to_value(ctx.assembler().build_payload()).unwrap();

        assert_eq!(json["username"], "ServerUtils");
        let embed = &json["embeds"][0];
        assert_eq!(embed["title"], "Server Status");
        assert_eq!(embed["color"], 5_814_783);
        assert_eq!(embed["footer"]["text"], "serverutils");
        assert!(embed["timestamp"].as_str().unwrap().ends_with('Z'));

        let fields = embed["fields"].as_array().unwrap();
        assert_eq!(fields.len(), 4);
        assert!(fields.iter().all(|f| f["inline"] == true));
        assert_eq!(fields[0]["value"], "2 / 10");
    }

    #[test]
    fn test_japanese_locale() {
        let payload = context(MonitorConfig {
            locale: "ja_JP".to_string(),
            ..Default::default()
        })
        .assembler()
        .build_payload();

        assert!(payload.field("稼働時間").is_some());
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

mod dispatcher_tests {
    use super::*;
    use tickwatch::Dispatcher;

    #[tokio::test]
    async fn test_bad_cron_falls_back_and_runs() {
        let ctx = context(enabled("bad"));
        assert_matches!(
            ctx.config().corrections(),
            [ConfigCorrection::CronExpressionReset { from }] if from == "bad"
        );

        let dispatcher = Dispatcher::new();
        let state = dispatcher.initialize_with_sink(&ctx, Arc::new(RecordingSink::new()));

        assert!(state.running);
        assert_eq!(state.schedule_expression.as_deref(), Some("0 0 0 * * ?"));
        dispatcher.shutdown();
    }

    #[tokio::test]
    async fn test_untrusted_url_stays_stopped() {
        let ctx = context(MonitorConfig {
            enable_send_webhook: true,
            webhook_url: "http://evil.example.com/x".to_string(),
            ..Default::default()
        });
        assert!(!ctx.config().get().enable_send_webhook);
        assert!(ctx.config().get().webhook_url.is_empty());

        let dispatcher = Dispatcher::new();
        let state = dispatcher.initialize(&ctx);

        assert_eq!(state.phase, DispatcherPhase::Stopped);
        assert!(!state.running);
    }

    #[tokio::test]
    async fn test_restart_leaves_single_job() {
        let ctx = context(enabled("* * * * * ?"));
        let sink = Arc::new(RecordingSink::new());
        let dispatcher = Dispatcher::new();

        dispatcher.initialize_with_sink(&ctx, sink.clone());
        dispatcher.shutdown();
        let state = dispatcher.initialize_with_sink(&ctx, sink.clone());
        assert!(state.running);

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        dispatcher.shutdown();

        let deliveries = sink.deliveries();
        assert!(
            (2..=5).contains(&deliveries.len()),
            "unexpected delivery count {}",
            deliveries.len()
        );
        for pair in deliveries.windows(2) {
            let gap = pair[1].received_at - pair[0].received_at;
            assert!(gap >= Duration::from_millis(500), "duplicate firing, gap {:?}", gap);
        }
    }

    #[tokio::test]
    async fn test_shutdown_stops_firing() {
        let ctx = context(enabled("* * * * * ?"));
        let sink = Arc::new(RecordingSink::new());
        let dispatcher = Dispatcher::new();

        dispatcher.initialize_with_sink(&ctx, sink.clone());
        dispatcher.shutdown();
        tokio::time::sleep(Duration::from_millis(2_200)).await;

        assert!(sink.len() <= 1);
    }

    #[tokio::test]
    async fn test_reload_restarts_with_new_schedule() {
        let ctx = context(enabled("0 0 0 * * ?"));
        let dispatcher = Dispatcher::new();
        let sink = Arc::new(RecordingSink::new());
        let first = dispatcher.initialize_with_sink(&ctx, sink.clone());

        let reloaded = ctx.reload(enabled("0 30 6 ? * MON-FRI"));
        let second = dispatcher.initialize_with_sink(&reloaded, sink);

        assert!(second.running);
        assert_ne!(first.job_id, second.job_id);
        assert_eq!(second.schedule_expression.as_deref(), Some("0 30 6 ? * MON-FRI"));
        dispatcher.shutdown();
    }

    #[tokio::test]
    async fn test_failed_delivery_does_not_stop_schedule() {
        let ctx = context(enabled("* * * * * ?"));
        let dispatcher = Dispatcher::new();
        dispatcher.initialize_with_sink(&ctx, Arc::new(RecordingSink::failing(500)));

        tokio::time::sleep(Duration::from_millis(2_500)).await;

        assert!(dispatcher.state().running);
        assert!(dispatcher.stats().failures >= 1);
        assert_eq!(dispatcher.stats().successes, 0);
        dispatcher.shutdown();
    }
}

// =============================================================================
// Webhook Delivery
// =============================================================================

mod delivery_tests {
    use super::*;
    use std::convert::Infallible;
    use std::net::SocketAddr;

    use http_body_util::{BodyExt, Full};
    use hyper::body::{Bytes, Incoming};
    use hyper::header::{HeaderName, CONTENT_TYPE, USER_AGENT};
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response, StatusCode};
    use hyper_util::rt::TokioIo;
    use parking_lot::Mutex;
    use tokio::net::TcpListener;

    use tickwatch::adapters::WebhookSink;
    use tickwatch::domain::ReportSink;
    use tickwatch::Dispatcher;

    #[derive(Debug, Clone)]
    struct Captured {
        user_agent: String,
        content_type: String,
        body: serde_json::Value,
    }

    /// Local endpoint answering every request with `status`
    async fn spawn_endpoint(status: StatusCode) -> (SocketAddr, Arc<Mutex<Vec<Captured>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let captured = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::clone(&captured);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let store = Arc::clone(&store);
                let service = service_fn(move |req: Request<Incoming>| {
                    let store = Arc::clone(&store);
                    async move {
                        let header = |name: HeaderName| {
                            req.headers()
                                .get(name)
                                .and_then(|v| v.to_str().ok())
                                .unwrap_or_default()
                                .to_string()
                        };
                        let user_agent = header(USER_AGENT);
                        let content_type = header(CONTENT_TYPE);
                        let body = req.into_body().collect().await.unwrap().to_bytes();

                        store.lock().push(Captured {
                            user_agent,
                            content_type,
                            body: serde_json::from_slice(&body).unwrap_or_default(),
                        });

                        let mut response = Response::new(Full::new(Bytes::new()));
                        *response.status_mut() = status;
                        Ok::<_, Infallible>(response)
                    }
                });

                tokio::spawn(async move {
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        (addr, captured)
    }

    fn payload() -> tickwatch::WebhookPayload {
        context(MonitorConfig::default()).assembler().build_payload()
    }

    #[tokio::test]
    async fn test_successful_delivery() {
        let (addr, captured) = spawn_endpoint(StatusCode::NO_CONTENT).await;
        let sink = WebhookSink::with_url(
            &format!("http://{}/api/webhooks/1/secret", addr),
            "ServerUtils",
            Duration::from_secs(5),
        )
        .unwrap();

        sink.send(&payload()).await.unwrap();

        let captured = captured.lock().clone();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].user_agent, "ServerUtils-Webhook");
        assert!(captured[0].content_type.starts_with("application/json"));
        assert_eq!(captured[0].body["username"], "ServerUtils");
        assert_eq!(captured[0].body["embeds"][0]["title"], "Server Status");
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let (addr, _) = spawn_endpoint(StatusCode::INTERNAL_SERVER_ERROR).await;
        let sink = WebhookSink::with_url(
            &format!("http://{}/hook", addr),
            "ServerUtils",
            Duration::from_secs(5),
        )
        .unwrap();

        assert_matches!(
            sink.send(&payload()).await,
            Err(Error::DeliveryStatus { status: 500 })
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        // Bind then drop to get a port nobody listens on
        let addr = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();
        let sink = WebhookSink::with_url(
            &format!("http://{}/hook/secret", addr),
            "ServerUtils",
            Duration::from_secs(5),
        )
        .unwrap();

        let err = sink.send(&payload()).await.unwrap_err();
        assert!(err.is_delivery());
        assert_matches!(err, Error::DeliveryTransport(_));
        assert!(!err.to_string().contains("secret"));
    }

    #[tokio::test]
    async fn test_dispatcher_delivers_over_http() {
        let (addr, captured) = spawn_endpoint(StatusCode::OK).await;
        let base = format!("http://{}/", addr);
        let ctx = context(MonitorConfig {
            enable_send_webhook: true,
            webhook_url: format!("{}api/webhooks/7/abc", base),
            trusted_url_prefixes: vec![base],
            sender_name: "Lobby".to_string(),
            ..Default::default()
        });

        let dispatcher = Dispatcher::new();
        let state = dispatcher.initialize(&ctx);
        assert!(state.running);
        assert_eq!(state.sink.as_deref(), Some("webhook at 127.0.0.1"));

        dispatcher.deliver_now().await.unwrap();
        dispatcher.shutdown();

        let captured = captured.lock().clone();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].user_agent, "Lobby-Webhook");
        assert_eq!(captured[0].body["username"], "Lobby");
    }
}
