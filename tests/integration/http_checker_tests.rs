use super::*;
use stock_watcher::config::HttpConfig;
use stock_watcher::models::CycleOutcome;
use stock_watcher::plugins::checkers::HttpStockChecker;
use stock_watcher::plugins::reporters::ChannelReporter;
use stock_watcher::{RunLoop, StockStatus};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USER_AGENT: &str = "StockWatcherTest/1.0";

fn http_checker(request_timeout_secs: u64) -> HttpStockChecker {
    let config = HttpConfig {
        request_timeout_secs,
        connect_timeout_secs: 1,
        ..HttpConfig::default()
    };
    HttpStockChecker::new(USER_AGENT, &config, StructuredDataExtractor::default())
        .expect("checker builds")
}

fn item_url(server: &MockServer) -> url::Url {
    url::Url::parse(&format!("{}/item", server.uri())).expect("mock server URL")
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8")
}

#[tokio::test]
async fn test_in_stock_page() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/item"))
        .and(header("user-agent", USER_AGENT))
        .respond_with(html(product_page("https://schema.org/InStock")))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = http_checker(5).check(&item_url(&server)).await;
    assert_eq!(outcome.status(), Some(StockStatus::InStock));

    Ok(())
}

#[tokio::test]
async fn test_page_without_structured_data_is_unknown() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html("<html><body>Loading...</body></html>".to_string()))
        .mount(&server)
        .await;

    let outcome = http_checker(5).check(&item_url(&server)).await;
    assert_eq!(outcome.status(), Some(StockStatus::Unknown));

    Ok(())
}

#[tokio::test]
async fn test_rate_limit_carries_retry_after() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .mount(&server)
        .await;

    let outcome = http_checker(5).check(&item_url(&server)).await;
    assert_eq!(
        outcome,
        CycleOutcome::RateLimited {
            retry_after: Some(Duration::from_secs(30))
        }
    );

    Ok(())
}

#[tokio::test]
async fn test_unexpected_status() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let checker = http_checker(5);
    let err = checker.fetch(&item_url(&server)).await.unwrap_err();
    assert_eq!(err, CheckError::UnexpectedStatus(503));

    Ok(())
}

#[tokio::test]
async fn test_slow_response_times_out() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html(product_page("InStock")).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let outcome = http_checker(1).check(&item_url(&server)).await;
    assert_eq!(outcome.label(), "timeout");

    Ok(())
}

#[tokio::test]
async fn test_connection_refused_is_network_error() -> anyhow::Result<()> {
    // Grab a free port, then release it so nothing is listening
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);
    let url = url::Url::parse(&format!("http://127.0.0.1:{}/item", port))?;

    let outcome = http_checker(5).check(&url).await;
    assert_eq!(outcome.label(), "network_error");

    Ok(())
}

#[tokio::test]
async fn test_run_loop_against_live_server() -> anyhow::Result<()> {
    let server = MockServer::start().await;

    // Mounted mocks are tried in order; each early one answers once
    Mock::given(method("GET"))
        .respond_with(html(product_page("https://schema.org/InStock")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(html(product_page("https://schema.org/OutOfStock")))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let (reporter, mut receiver) = ChannelReporter::channel();
    let sleeper = RecordingSleeper::new(3, cancel.clone());
    let config = test_monitor_config(item_url(&server).as_str(), Strategy::Http);

    let stats = RunLoop::new(config, Box::new(http_checker(5)), Arc::new(reporter), cancel)
        .with_sleeper(sleeper.clone())
        .run()
        .await;

    let outcomes: Vec<MonitorEvent> = drain_events(&mut receiver)
        .into_iter()
        .filter(|event| *event != MonitorEvent::Checking)
        .collect();
    assert_eq!(
        outcomes,
        vec![
            MonitorEvent::InStock,
            MonitorEvent::RateLimited,
            MonitorEvent::OutOfStock,
            MonitorEvent::ShuttingDown,
        ]
    );
    assert_eq!(sleeper.sleeps(), vec![POLL_INTERVAL, COOLDOWN, POLL_INTERVAL]);
    assert_eq!(stats.run_count, 3);

    let requests = server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 3);

    Ok(())
}
