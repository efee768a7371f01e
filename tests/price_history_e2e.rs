use httpmock::MockServer;
use rust_decimal::Decimal;

use price_watch::analyzer::Validity;
use price_watch::config::Config;
use price_watch::data::{PriceHistoryClient, request_body};

// Mock endpoint serving the shape the real GraphQL endpoint returns.
const HISTORY: &str = r#"{
  "data": {
    "priceHistory": {
      "points": [
        {"amountIncl": 100.0, "amountExcl": 92.5, "type": "PRICE", "validFrom": "2024-04-01T00:00:00Z", "__typename": "PriceHistoryPoint"},
        {"amountIncl": null, "amountExcl": null, "type": null, "validFrom": "2024-04-02T00:00:00Z", "__typename": "PriceHistoryPoint"},
        {"amountIncl": 100.0, "amountExcl": 92.5, "type": "PRICE", "validFrom": "2024-04-03T00:00:00Z", "__typename": "PriceHistoryPoint"},
        {"amountIncl": 100.0, "amountExcl": 92.5, "type": "PRICE", "validFrom": "2024-04-04T00:00:00Z", "__typename": "PriceHistoryPoint"},
        {"amountIncl": 10.0, "amountExcl": 9.25, "type": "DEAL", "validFrom": "2024-04-05T00:00:00Z", "__typename": "PriceHistoryPoint"}
      ],
      "__typename": "PriceHistory"
    }
  }
}"#;

fn config_for(server: &MockServer, product_id: u64) -> Config {
    Config {
        product_id,
        endpoint: server.url("/api/graphql/pdp-price-history"),
        ..Config::default()
    }
}

#[tokio::test]
async fn check_once_against_mock_endpoint() {
    let server = MockServer::start();
    let m = server.mock(|when, then| {
        when.method(httpmock::Method::POST)
            .path("/api/graphql/pdp-price-history")
            .json_body(request_body(1234));
        then.status(200).header("content-type", "application/json").body(HISTORY);
    });

    let config = config_for(&server, 1234);
    let client = PriceHistoryClient::new(&config).unwrap();
    let analysis = price_watch::check_once(&config, &client).await.unwrap();

    assert_eq!(analysis.average, Some(Decimal::new(775, 1)));
    assert_eq!(analysis.events.len(), 1);
    assert_eq!(analysis.events[0].price, Decimal::from(10));
    let tags: Vec<_> = analysis.segments.iter().map(|s| s.validity).collect();
    assert_eq!(tags, vec![Validity::Valid, Validity::Invalid, Validity::Valid]);
    m.assert();
}

#[tokio::test]
async fn chart_command_writes_raw_and_chart_files() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(httpmock::Method::POST).path("/api/graphql/pdp-price-history");
        then.status(200).body(HISTORY);
    });

    let dir = tempfile::tempdir().unwrap();
    let config = Config { output_dir: dir.path().to_path_buf(), ..config_for(&server, 55) };
    let client = PriceHistoryClient::new(&config).unwrap();
    let out = price_watch::run_chart(&config, &client).await.unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("55.json")).unwrap()).unwrap();
    assert_eq!(raw["data"]["priceHistory"]["points"].as_array().unwrap().len(), 5);

    let chart: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out.chart_path).unwrap()).unwrap();
    assert_eq!(chart["product_id"], 55);
    assert_eq!(chart["lines"].as_array().unwrap().len(), 3);
    assert_eq!(chart["lines"][1]["color"], "red");
    assert_eq!(out.document.y_max, Some(Decimal::from(150)));

    assert_eq!(out.png_path, dir.path().join("55.png"));
    assert!(std::fs::read(&out.png_path).unwrap().starts_with(b"\x89PNG"));
}

#[tokio::test]
async fn server_error_surfaces_status() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(httpmock::Method::POST).path("/api/graphql/pdp-price-history");
        then.status(500).body("oops");
    });

    let config = config_for(&server, 1);
    let client = PriceHistoryClient::new(&config).unwrap();
    let err = price_watch::check_once(&config, &client).await.unwrap_err();
    assert!(format!("{err:#}").contains("status code: 500"));
}

#[tokio::test]
async fn chart_is_not_written_for_malformed_batch() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(httpmock::Method::POST).path("/api/graphql/pdp-price-history");
        then.status(200).body(
            r#"{"data":{"priceHistory":{"points":[{"amountIncl":1,"validFrom":"2024-04-01"}]}}}"#,
        );
    });

    let dir = tempfile::tempdir().unwrap();
    let config = Config { output_dir: dir.path().to_path_buf(), ..config_for(&server, 8) };
    let client = PriceHistoryClient::new(&config).unwrap();
    assert!(price_watch::run_chart(&config, &client).await.is_err());
    assert!(!dir.path().join("8.chart.json").exists());
    assert!(!dir.path().join("8.png").exists());
}
