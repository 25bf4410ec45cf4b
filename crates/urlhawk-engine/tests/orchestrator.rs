//! Orchestrator behavior with stub probes: completeness, fault isolation,
//! deadline handling, and the concurrency cap.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use urlhawk_core::config::{HawkConfig, ProbeSettings, ScanConfig};
use urlhawk_core::{Outcome, Target};
use urlhawk_engine::{probe_fn, EngineError, NetClients, Orchestrator, ProbeContext, Registry};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn orchestrator(registry: Registry, config: ScanConfig) -> Orchestrator {
    let net = NetClients::new(ProbeSettings::default()).unwrap();
    Orchestrator::new(Arc::new(registry), Arc::new(net), config)
}

fn scan_config(max_duration_ms: u64, enforce_deadline: bool) -> ScanConfig {
    ScanConfig {
        max_duration_ms,
        enforce_deadline,
        deadline_grace_ms: 50,
        max_concurrent_probes: 0,
    }
}

async fn explode(_ctx: ProbeContext, _target: Target) -> Outcome {
    panic!("boom")
}

async fn waits_for_deadline(ctx: ProbeContext, _target: Target) -> Outcome {
    ctx.deadline.expired().await;
    Outcome::error("Lookup timed out")
}

async fn ignores_deadline(_ctx: ProbeContext, _target: Target) -> Outcome {
    tokio::time::sleep(Duration::from_millis(600)).await;
    Outcome::list(vec!["late".to_string()])
}

fn echo_registry(names: &[&str]) -> Registry {
    let mut registry = Registry::new();
    for name in names {
        let label = name.to_string();
        registry
            .register(
                name,
                "echoes its own name",
                probe_fn(move |_, _| {
                    let label = label.clone();
                    async move { Outcome::list(vec![label]) }
                }),
            )
            .unwrap();
    }
    registry
}

#[tokio::test]
async fn test_one_entry_per_probe_plus_url() {
    let orchestrator = orchestrator(echo_registry(&["a", "b", "c"]), ScanConfig::default());
    let result = orchestrator.scan("example.com/").await;

    assert_eq!(result.url.as_str(), "http://example.com");
    assert_eq!(result.len(), 3);
    assert_eq!(result.get("b").and_then(Outcome::as_list), Some(&["b".to_string()][..]));

    let json = serde_json::to_value(&result).unwrap();
    let object = json.as_object().unwrap();
    assert_eq!(object.len(), 4);
    assert_eq!(object["url"], "http://example.com");
    assert_eq!(object["a"], serde_json::json!(["a"]));
}

#[tokio::test]
async fn test_panicking_probe_is_isolated() {
    let mut registry = echo_registry(&["healthy"]);
    registry.register("crashy", "panics", probe_fn(explode)).unwrap();

    let result = orchestrator(registry, ScanConfig::default()).scan("example.com").await;

    assert_eq!(
        result.get("crashy").and_then(Outcome::error_message),
        Some("Plugin execution crashed: boom")
    );
    assert_eq!(result.get("healthy").and_then(Outcome::as_list).map(<[String]>::len), Some(1));
    assert_eq!(result.error_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_concurrent_writers() {
    let names: Vec<String> = (0..50).map(|i| format!("probe_{i:02}")).collect();
    let mut registry = Registry::new();
    for name in &names {
        let label = name.clone();
        registry
            .register(
                name,
                "yields then echoes",
                probe_fn(move |_, _| {
                    let label = label.clone();
                    async move {
                        tokio::task::yield_now().await;
                        Outcome::list(vec![label])
                    }
                }),
            )
            .unwrap();
    }

    let result = orchestrator(registry, ScanConfig::default()).scan("example.com").await;

    assert_eq!(result.len(), 50);
    for name in &names {
        assert_eq!(
            result.get(name).and_then(Outcome::as_list),
            Some(&[name.clone()][..]),
            "{name} missing or wrong"
        );
    }
}

#[tokio::test]
async fn test_cooperative_probe_returns_within_budget() {
    let mut registry = Registry::new();
    registry.register("patient", "waits", probe_fn(waits_for_deadline)).unwrap();
    let orchestrator = orchestrator(registry, scan_config(8_000, false));

    let start = Instant::now();
    let result = orchestrator
        .scan_with("example.com", Duration::from_millis(150))
        .await;

    assert!(start.elapsed() < Duration::from_millis(150 + 300));
    assert_eq!(
        result.get("patient").and_then(Outcome::error_message),
        Some("Lookup timed out")
    );
}

#[tokio::test]
async fn test_non_cooperative_probe_overruns_without_hard_bound() {
    let mut registry = Registry::new();
    registry.register("stubborn", "sleeps", probe_fn(ignores_deadline)).unwrap();
    let orchestrator = orchestrator(registry, scan_config(100, false));

    let start = Instant::now();
    let result = orchestrator.scan("example.com").await;

    assert!(start.elapsed() >= Duration::from_millis(600));
    assert_eq!(result.get("stubborn").and_then(Outcome::as_list).map(<[String]>::len), Some(1));
}

#[tokio::test]
async fn test_hard_bound_marks_stragglers_timed_out() {
    let mut registry = echo_registry(&["quick"]);
    registry.register("stubborn", "sleeps", probe_fn(ignores_deadline)).unwrap();
    let orchestrator = orchestrator(registry, scan_config(100, true));

    let start = Instant::now();
    let result = orchestrator.scan("example.com").await;

    assert!(start.elapsed() < Duration::from_millis(500));
    assert_eq!(result.len(), 2);
    assert_eq!(result.get("stubborn").and_then(Outcome::error_message), Some("timed out"));
    assert!(result.get("quick").and_then(Outcome::as_list).is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_max_concurrent_probes_caps_in_flight() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut registry = Registry::new();
    for i in 0..6 {
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&peak);
        registry
            .register(
                &format!("slow_{i}"),
                "tracks concurrency",
                probe_fn(move |_, _| {
                    let in_flight = Arc::clone(&in_flight);
                    let peak = Arc::clone(&peak);
                    async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(40)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Outcome::Empty
                    }
                }),
            )
            .unwrap();
    }

    let config = ScanConfig {
        max_concurrent_probes: 2,
        ..ScanConfig::default()
    };
    let result = orchestrator(registry, config).scan("example.com").await;

    assert_eq!(result.len(), 6);
    assert_eq!(result.error_count(), 0);
    assert!(peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_run_probe_single() {
    let orchestrator = orchestrator(echo_registry(&["a", "b"]), ScanConfig::default());

    let outcome = orchestrator.run_probe("b", "example.com").await.unwrap();
    assert_eq!(outcome, Outcome::list(vec!["b".to_string()]));

    let err = orchestrator.run_probe("nope", "example.com").await.unwrap_err();
    assert!(matches!(err, EngineError::UnknownProbe { name } if name == "nope"));
}

#[tokio::test]
async fn test_run_probe_with_explicit_budget() {
    let mut registry = Registry::new();
    registry.register("patient", "waits", probe_fn(waits_for_deadline)).unwrap();
    let orchestrator = orchestrator(registry, scan_config(8_000, false));

    let start = Instant::now();
    let outcome = orchestrator
        .run_probe_with("patient", "example.com", Duration::from_millis(100))
        .await
        .unwrap();

    assert!(start.elapsed() < Duration::from_millis(100 + 300));
    assert_eq!(outcome.error_message(), Some("Lookup timed out"));
}

#[tokio::test]
async fn test_reregistration_overwrites() {
    let mut registry = echo_registry(&["dup"]);
    registry
        .register("dup", "replacement", probe_fn(|_, _| async { Outcome::Empty }))
        .unwrap();

    let result = orchestrator(registry, ScanConfig::default()).scan("example.com").await;

    assert_eq!(result.len(), 1);
    assert_eq!(result.get("dup"), Some(&Outcome::Empty));
}

/// A port with nothing listening on it.
fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_builtin_scan_against_local_target() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.env"))
        .respond_with(ResponseTemplate::new(200).set_body_string("DB_PASSWORD=secret"))
        .mount(&server)
        .await;

    // Keep every probe on the loopback interface.
    let mut config = HawkConfig::default();
    config.scan.max_duration_ms = 3_000;
    config.probes.geo_endpoint = server.uri();
    config.probes.archive_endpoint = server.uri();
    config.probes.whois_server = Some(format!("127.0.0.1:{}", closed_port()));
    config.probes.tls_port = closed_port();
    config.probes.ports = vec![server.address().port()];

    let orchestrator = Orchestrator::from_config(&config).unwrap();
    let start = Instant::now();
    let result = orchestrator.scan(&server.uri()).await;
    assert!(start.elapsed() < Duration::from_millis(3_000 + 500));

    let json = serde_json::to_value(&result).unwrap();
    let object = json.as_object().unwrap();
    assert_eq!(object.len(), 14, "unexpected keys: {:?}", object.keys());
    assert_eq!(object["url"], json!(server.uri()));
    assert_eq!(object["exposed_files"], json!(["/.env"]));
    assert_eq!(
        object["missing_headers"],
        json!([
            "X-Frame-Options",
            "Content-Security-Policy",
            "Strict-Transport-Security"
        ])
    );
    assert_eq!(object["dns_records"]["A/AAAA"], json!(["127.0.0.1"]));
    assert_eq!(
        object["open_ports"],
        json!([server.address().port().to_string()])
    );
    assert_eq!(
        object["ssl_certificate"],
        json!({"error": "No SSL/TLS on port 443 (or timed out)"})
    );
}
