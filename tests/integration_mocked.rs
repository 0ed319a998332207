/// Integration tests with mocked external APIs
/// Tests provider clients, normalization, and the collector's fallback
/// contract without hitting real external services
use site_audit_api::collector::DataCollector;
use site_audit_api::config::Config;
use site_audit_api::models::DataSource;
use site_audit_api::provider::{LiveProvider, SeoDataProvider};
use site_audit_api::services::{DataForSeoService, FirecrawlService};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper function to create test config pointing both providers at mocks
fn create_test_config(dataforseo_base_url: String, firecrawl_base_url: String) -> Config {
    Config {
        database_url: "postgresql://test".to_string(),
        port: 8080,
        dataforseo_base_url,
        dataforseo_login: Some("test_login".to_string()),
        dataforseo_password: Some("test_pass".to_string()),
        firecrawl_base_url,
        firecrawl_api_key: Some("test_key".to_string()),
        provider_timeout_secs: 5,
        worker_count: 1,
        staleness_hours: 24,
        sweep_interval_secs: 900,
        report_dir: "reports".to_string(),
        completion_webhook_url: None,
    }
}

#[tokio::test]
async fn test_backlinks_summary_success() {
    let mock_server = MockServer::start().await;

    let mock_response = serde_json::json!({
        "status_code": 20000,
        "tasks": [{
            "status_code": 20000,
            "result": [{
                "target": "acme.test",
                "backlinks": 15230,
                "referring_domains": 412,
                "rank": 56
            }]
        }]
    });

    Mock::given(method("POST"))
        .and(path("/v3/backlinks/summary/live"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&mock_response))
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri(), mock_server.uri());
    let service = DataForSeoService::new(&config);

    let data = service.backlinks_summary("acme.test").await.unwrap();
    assert_eq!(data.source, DataSource::Live);
    assert_eq!(data.total_backlinks, 15230);
    assert_eq!(data.referring_domains, 412);
    assert_eq!(data.domain_authority, 56);
}

#[tokio::test]
async fn test_backlinks_summary_missing_fields_default() {
    let mock_server = MockServer::start().await;

    // Provider omitted every metric field; normalization fills defaults
    let mock_response = serde_json::json!({
        "tasks": [{ "result": [{ "target": "acme.test" }] }]
    });

    Mock::given(method("POST"))
        .and(path("/v3/backlinks/summary/live"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&mock_response))
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri(), mock_server.uri());
    let service = DataForSeoService::new(&config);

    let data = service.backlinks_summary("acme.test").await.unwrap();
    assert_eq!(data.total_backlinks, 0);
    assert_eq!(data.referring_domains, 0);
    assert_eq!(data.domain_authority, 0);
}

#[tokio::test]
async fn test_backlinks_summary_api_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3/backlinks/summary/live"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri(), mock_server.uri());
    let service = DataForSeoService::new(&config);

    let result = service.backlinks_summary("acme.test").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_backlinks_summary_empty_result() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3/backlinks/summary/live"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "tasks": [] })),
        )
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri(), mock_server.uri());
    let service = DataForSeoService::new(&config);

    let result = service.backlinks_summary("acme.test").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_ranked_keywords_normalization() {
    let mock_server = MockServer::start().await;

    let mock_response = serde_json::json!({
        "tasks": [{
            "result": [{
                "items": [
                    {
                        "keyword_data": {
                            "keyword": "power tools",
                            "keyword_info": { "search_volume": 12000 },
                            "keyword_properties": { "keyword_difficulty": 62 }
                        },
                        "ranked_serp_element": { "serp_item": { "rank_absolute": 4 } }
                    },
                    {
                        "keyword_data": {
                            "keyword": "drill bits",
                            "keyword_info": { "search_volume": 3400 }
                        }
                    }
                ]
            }]
        }]
    });

    Mock::given(method("POST"))
        .and(path("/v3/dataforseo_labs/google/ranked_keywords/live"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&mock_response))
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri(), mock_server.uri());
    let service = DataForSeoService::new(&config);

    let data = service.ranked_keywords("acme.test", &[]).await.unwrap();
    assert_eq!(data.tracked_keywords.len(), 2);
    assert_eq!(data.tracked_keywords[0].keyword, "power tools");
    assert_eq!(data.tracked_keywords[0].position, Some(4));
    assert_eq!(data.tracked_keywords[0].search_volume, 12000);
    assert_eq!(data.tracked_keywords[0].difficulty, 62);
    // Missing fields default rather than fail
    assert_eq!(data.tracked_keywords[1].position, None);
    assert_eq!(data.tracked_keywords[1].difficulty, 0);
    assert_eq!(data.ranking_distribution.total(), 2);
}

#[tokio::test]
async fn test_ranked_keywords_unseen_targets_appear_unranked() {
    let mock_server = MockServer::start().await;

    let mock_response = serde_json::json!({
        "tasks": [{ "result": [{ "items": [] }] }]
    });

    Mock::given(method("POST"))
        .and(path("/v3/dataforseo_labs/google/ranked_keywords/live"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&mock_response))
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri(), mock_server.uri());
    let service = DataForSeoService::new(&config);

    let targets = vec!["tool rental".to_string()];
    let data = service.ranked_keywords("acme.test", &targets).await.unwrap();

    assert_eq!(data.tracked_keywords.len(), 1);
    assert_eq!(data.tracked_keywords[0].keyword, "tool rental");
    assert_eq!(data.tracked_keywords[0].position, None);
    assert_eq!(data.ranking_distribution.unranked, 1);
}

#[tokio::test]
async fn test_firecrawl_map_success() {
    let mock_server = MockServer::start().await;

    let links: Vec<String> = (0..25)
        .map(|i| format!("https://acme.test/page-{}", i))
        .collect();
    let mock_response = serde_json::json!({ "success": true, "links": links });

    Mock::given(method("POST"))
        .and(path("/v1/map"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&mock_response))
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri(), mock_server.uri());
    let service = FirecrawlService::new(&config);

    let data = service.map_site("acme.test").await.unwrap();
    assert_eq!(data.source, DataSource::Live);
    assert_eq!(data.pages_discovered, 25);
    // Only a representative sample is kept
    assert_eq!(data.pages.len(), 10);
}

#[tokio::test]
async fn test_firecrawl_map_no_pages_is_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/map"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "success": true, "links": [] })),
        )
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri(), mock_server.uri());
    let service = FirecrawlService::new(&config);

    assert!(service.map_site("acme.test").await.is_err());
}

#[tokio::test]
async fn test_firecrawl_social_detection() {
    let mock_server = MockServer::start().await;

    let mock_response = serde_json::json!({
        "data": {
            "links": [
                "https://acme.test/about",
                "https://www.facebook.com/acmetools",
                "https://www.linkedin.com/company/acme-tools",
                "mailto:ops@acme.test"
            ]
        }
    });

    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&mock_response))
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri(), mock_server.uri());
    let service = FirecrawlService::new(&config);

    let data = service
        .scrape_social("Acme Tools", "https://acme.test")
        .await
        .unwrap();

    let present: Vec<&str> = data
        .platforms
        .iter()
        .filter(|p| p.present)
        .map(|p| p.platform.as_str())
        .collect();
    assert_eq!(present, vec!["facebook", "linkedin"]);

    let absent = data.platforms.iter().find(|p| p.platform == "youtube").unwrap();
    assert!(!absent.present);
    assert!(absent.profile_url.is_none());
}

#[tokio::test]
async fn test_collector_falls_back_when_provider_errors() {
    let mock_server = MockServer::start().await;

    // Every endpoint rejects; the collector must still return section data
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("quota exhausted"))
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri(), mock_server.uri());
    let provider: Arc<dyn SeoDataProvider> = Arc::new(LiveProvider::new(&config));
    let collector = DataCollector::new(provider, Duration::from_secs(2));

    let collected = collector.collect_performance("acme.test").await;
    assert!(collected.fallback_reason.is_some());
    assert_eq!(collected.data.source, DataSource::Synthetic);

    // Fallback safety: keyword data still satisfies the schema
    let collected = collector.collect_keywords("acme.test", &[]).await;
    assert!(collected.fallback_reason.is_some());
    assert!(!collected.data.tracked_keywords.is_empty());
    assert_eq!(
        collected.data.ranking_distribution.total(),
        collected.data.tracked_keywords.len() as u32
    );
}

#[tokio::test]
async fn test_collector_times_out_slow_provider() {
    let mock_server = MockServer::start().await;

    let mock_response = serde_json::json!({
        "tasks": [{ "result": [{ "backlinks": 1, "referring_domains": 1, "rank": 1 }] }]
    });

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(&mock_response)
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri(), mock_server.uri());
    let provider: Arc<dyn SeoDataProvider> = Arc::new(LiveProvider::new(&config));
    let collector = DataCollector::new(provider, Duration::from_millis(50));

    let collected = collector.collect_backlinks("acme.test").await;
    let reason = collected.fallback_reason.expect("should have timed out");
    assert!(reason.contains("timed out"));
    assert_eq!(collected.data.source, DataSource::Synthetic);
}

#[tokio::test]
async fn test_concurrent_provider_requests() {
    let mock_server = MockServer::start().await;

    let mock_response = serde_json::json!({
        "tasks": [{ "result": [{ "backlinks": 10, "referring_domains": 2, "rank": 5 }] }]
    });

    Mock::given(method("POST"))
        .and(path("/v3/backlinks/summary/live"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&mock_response))
        .expect(10)
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri(), mock_server.uri());

    let mut handles = vec![];
    for i in 0..10 {
        let config_clone = config.clone();
        let handle = tokio::spawn(async move {
            let service = DataForSeoService::new(&config_clone);
            service.backlinks_summary(&format!("site-{}.test", i)).await
        });
        handles.push(handle);
    }

    for handle in handles {
        let result = handle.await.unwrap();
        assert!(result.is_ok());
    }
}
