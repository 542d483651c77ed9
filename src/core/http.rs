//! HTTP routing engine backed by a butterfly-route query server
//!
//! Talks to the `/health` and `/route` endpoints of `butterfly-route serve`.
//! Requests are async (reqwest) but the [`RoutingEngine`] contract is
//! blocking, so the engine owns a small tokio runtime and blocks on it from
//! the resolver's worker threads.

use std::future::Future;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;
use tokio::runtime::Runtime;

use crate::core::coords::CoordinatePair;
use crate::core::engine::{RoutingEngine, NO_ROUTE};
use crate::core::error::{Error, Result};

/// Connection settings for the routing server
#[derive(Debug, Clone)]
pub struct HttpEngineConfig {
    /// Server root, e.g. `http://localhost:3000`
    pub base_url: String,

    /// Transport mode passed to `/route` (car, bike or foot)
    pub mode: String,

    /// Overall timeout of a single request
    pub request_timeout: Duration,

    /// TCP connect timeout
    pub connect_timeout: Duration,

    /// Retries after a network error before giving up on a pair
    pub max_retries: u32,

    /// First retry delay, doubled on every further attempt
    pub retry_base_delay: Duration,

    /// Worker threads of the internal runtime
    pub runtime_threads: usize,
}

impl Default for HttpEngineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            mode: "foot".to_string(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(1000),
            runtime_threads: 2,
        }
    }
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    distance_m: f64,
}

/// Execute an operation with retry logic for network errors
async fn retry_on_network_error<F, Fut, T>(
    max_retries: u32,
    base_delay: Duration,
    operation: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(Error::NetworkError(msg)) if attempt < max_retries => {
                attempt += 1;
                let delay = base_delay * (1 << (attempt - 1));
                warn!(
                    "Network error (attempt {attempt}): {msg}. Retrying in {}ms...",
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

fn build_client(config: &HttpEngineConfig) -> Result<Client> {
    ClientBuilder::new()
        .tcp_keepalive(Duration::from_secs(60))
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(32)
        .timeout(config.request_timeout)
        .connect_timeout(config.connect_timeout)
        .user_agent(format!("butterfly-walk/{}", env!("BUTTERFLY_VERSION")))
        .build()
        .map_err(|e| Error::EngineSetup(format!("could not build HTTP client: {e}")))
}

/// Check that the server answers `/health` with status "ok"
async fn probe_health(client: &Client, config: &HttpEngineConfig) -> Result<()> {
    let url = format!("{}/health", config.base_url.trim_end_matches('/'));
    let url = url.as_str();

    let health = retry_on_network_error(config.max_retries, config.retry_base_delay, || async move {
        let response = client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpError(format!("health check returned {status}")));
        }
        Ok::<_, Error>(response.json::<HealthResponse>().await?)
    })
    .await?;

    if health.status != "ok" {
        return Err(Error::EngineSetup(format!(
            "routing server reports status '{}'",
            health.status
        )));
    }
    Ok(())
}

/// Query `/route` for one pair and return the raw distance in meters
async fn route_distance(
    client: &Client,
    config: &HttpEngineConfig,
    pair: CoordinatePair,
) -> Result<f64> {
    let url = format!("{}/route", config.base_url.trim_end_matches('/'));
    let url = url.as_str();
    let mode = config.mode.as_str();

    let body = retry_on_network_error(config.max_retries, config.retry_base_delay, || async move {
        let response = client
            .get(url)
            .query(&[
                ("src_lon", pair.from_lon.to_string()),
                ("src_lat", pair.from_lat.to_string()),
                ("dst_lon", pair.to_lon.to_string()),
                ("dst_lat", pair.to_lat.to_string()),
                ("mode", mode.to_string()),
            ])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::HttpError(format!("route request returned {status}: {text}")));
        }
        Ok::<_, Error>(response.json::<RouteResponse>().await?)
    })
    .await?;

    Ok(body.distance_m)
}

fn to_meters(distance: f64) -> i64 {
    if distance.is_finite() && distance >= 0.0 {
        distance as i64
    } else {
        NO_ROUTE
    }
}

/// Routing engine that delegates to a running butterfly-route server.
pub struct HttpRoutingEngine {
    config: HttpEngineConfig,
    runtime: Option<Runtime>,
    client: Option<Client>,
    setup_duration: Option<Duration>,
}

impl HttpRoutingEngine {
    pub fn new(config: HttpEngineConfig) -> Self {
        Self {
            config,
            runtime: None,
            client: None,
            setup_duration: None,
        }
    }

    /// Engine for a server at `base_url` with default settings
    pub fn with_base_url(base_url: &str) -> Self {
        Self::new(HttpEngineConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        })
    }

    pub fn config(&self) -> &HttpEngineConfig {
        &self.config
    }

    /// How long [`RoutingEngine::setup`] took, once it has succeeded
    pub fn setup_duration(&self) -> Option<Duration> {
        self.setup_duration
    }

    pub fn is_set_up(&self) -> bool {
        self.runtime.is_some() && self.client.is_some()
    }
}

impl RoutingEngine for HttpRoutingEngine {
    fn setup(&mut self) -> Result<()> {
        if self.is_set_up() {
            return Ok(());
        }

        let start = Instant::now();
        info!("Connecting to routing server at {}", self.config.base_url);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.runtime_threads.max(1))
            .thread_name("butterfly-walk-http")
            .enable_all()
            .build()
            .map_err(|e| Error::EngineSetup(format!("could not start async runtime: {e}")))?;

        let client = {
            let _guard = runtime.enter();
            build_client(&self.config)?
        };

        runtime
            .block_on(probe_health(&client, &self.config))
            .map_err(|e| match e {
                Error::EngineSetup(msg) => Error::EngineSetup(msg),
                other => Error::EngineSetup(format!(
                    "routing server at {} is not reachable: {other}",
                    self.config.base_url
                )),
            })?;

        let elapsed = start.elapsed();
        info!("Routing server ready after {:.3}s", elapsed.as_secs_f64());

        self.runtime = Some(runtime);
        self.client = Some(client);
        self.setup_duration = Some(elapsed);
        Ok(())
    }

    fn resolve(&self, pair: &CoordinatePair) -> i64 {
        let (Some(runtime), Some(client)) = (&self.runtime, &self.client) else {
            error!("Routing engine used before setup, cannot route {pair}");
            return NO_ROUTE;
        };

        match runtime.block_on(route_distance(client, &self.config, *pair)) {
            Ok(distance) => to_meters(distance),
            Err(e) => {
                debug!("No route for {pair}: {e}");
                NO_ROUTE
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: String) -> HttpEngineConfig {
        HttpEngineConfig {
            base_url,
            max_retries: 1,
            retry_base_delay: Duration::from_millis(10),
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(1),
            ..Default::default()
        }
    }

    async fn mount_health(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": "ok", "version": "2.0.0"})),
            )
            .mount(server)
            .await;
    }

    #[test]
    fn test_to_meters() {
        assert_eq!(to_meters(123.9), 123);
        assert_eq!(to_meters(0.0), 0);
        assert_eq!(to_meters(-5.0), NO_ROUTE);
        assert_eq!(to_meters(f64::INFINITY), NO_ROUTE);
        assert_eq!(to_meters(f64::NAN), NO_ROUTE);
    }

    #[test]
    fn test_resolve_before_setup_returns_sentinel() {
        let engine = HttpRoutingEngine::with_base_url("http://127.0.0.1:9");
        assert_eq!(engine.config().base_url, "http://127.0.0.1:9");
        assert_eq!(engine.config().mode, "foot");
        assert!(!engine.is_set_up());
        assert_eq!(engine.resolve(&CoordinatePair::new(1.0, 1.0, 2.0, 2.0)), NO_ROUTE);
    }

    #[tokio::test]
    async fn test_probe_health_ok() {
        let server = MockServer::start().await;
        mount_health(&server).await;

        let config = test_config(server.uri());
        let client = build_client(&config).unwrap();
        assert!(probe_health(&client, &config).await.is_ok());
    }

    #[tokio::test]
    async fn test_probe_health_rejects_bad_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "loading"})))
            .mount(&server)
            .await;

        let config = test_config(server.uri());
        let client = build_client(&config).unwrap();
        let err = probe_health(&client, &config).await.unwrap_err();
        assert!(matches!(err, Error::EngineSetup(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_route_distance_sends_lon_lat_and_mode() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/route"))
            .and(query_param("src_lat", "62.895169"))
            .and(query_param("src_lon", "27.68291"))
            .and(query_param("dst_lat", "62.895512"))
            .and(query_param("dst_lon", "27.676259"))
            .and(query_param("mode", "foot"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "duration_s": 290.5,
                "distance_m": 412.7,
                "geometry": {"polyline6": ""}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = test_config(server.uri());
        let client = build_client(&config).unwrap();
        let pair = CoordinatePair::new(62.895169, 27.682910, 62.895512, 27.676259);
        let d = route_distance(&client, &config, pair).await.unwrap();
        assert_eq!(d, 412.7);
    }

    #[tokio::test]
    async fn test_route_distance_http_error_is_not_retried() {
        let server = MockServer::start().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        Mock::given(method("GET"))
            .and(path("/route"))
            .respond_with(move |_: &wiremock::Request| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"error": "Could not snap source to road network"}))
            })
            .mount(&server)
            .await;

        let config = test_config(server.uri());
        let client = build_client(&config).unwrap();
        let err = route_distance(&client, &config, CoordinatePair::new(0.0, 0.0, 0.1, 0.1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HttpError(_)), "got {err:?}");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_on_network_error_gives_up_after_max_retries() {
        let attempts = AtomicUsize::new(0);
        let result: Result<()> = retry_on_network_error(2, Duration::from_millis(1), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::NetworkError("connection refused".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(Error::NetworkError(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_engine_setup_and_resolve_against_server() {
        // The mock server needs a runtime of its own; the engine brings another one
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(async {
            let server = MockServer::start().await;
            mount_health(&server).await;
            Mock::given(method("GET"))
                .and(path("/route"))
                .and(query_param("dst_lat", "2"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "duration_s": 10.0,
                    "distance_m": 2.9
                })))
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path("/route"))
                .and(query_param("dst_lat", "3"))
                .respond_with(ResponseTemplate::new(500))
                .mount(&server)
                .await;
            server
        });

        let mut engine = HttpRoutingEngine::new(test_config(server.uri()));
        engine.setup().unwrap();
        assert!(engine.is_set_up());
        assert!(engine.setup_duration().is_some());

        assert_eq!(engine.resolve(&CoordinatePair::new(1.0, 1.0, 2.0, 2.0)), 2);
        assert_eq!(engine.resolve(&CoordinatePair::new(1.0, 1.0, 3.0, 3.0)), NO_ROUTE);

        drop(engine);
        drop(server);
    }

    #[test]
    fn test_engine_setup_fails_without_server() {
        let mut engine = HttpRoutingEngine::new(HttpEngineConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            max_retries: 0,
            connect_timeout: Duration::from_millis(200),
            request_timeout: Duration::from_millis(500),
            ..Default::default()
        });
        let err = engine.setup().unwrap_err();
        assert!(matches!(err, Error::EngineSetup(_)), "got {err:?}");
        assert!(!engine.is_set_up());
    }
}
