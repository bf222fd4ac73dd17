//! Collector tests against a local axum app that answers like the
//! MediaWiki query API.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use travelrag::collector::{fetch_article, run_collect};
use travelrag::config::Config;
use travelrag::corpus::parse_article;
use travelrag::progress::NoProgress;

const USER_AGENT: &str = "TravelRagTest/1.0 (collector tests)";

#[derive(Debug, Clone)]
struct RecordedRequest {
    site: &'static str,
    params: HashMap<String, String>,
    user_agent: Option<String>,
}

#[derive(Clone, Default)]
struct MockWiki {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockWiki {
    fn record(&self, site: &'static str, params: HashMap<String, String>, headers: &HeaderMap) {
        let user_agent = headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.requests.lock().unwrap().push(RecordedRequest {
            site,
            params,
            user_agent,
        });
    }

    fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

fn page_response(site: &str, title: &str) -> (StatusCode, Json<Value>) {
    match title {
        "Paris" => (
            StatusCode::OK,
            Json(json!({
                "batchcomplete": "",
                "query": {"pages": {"22989": {
                    "pageid": 22989,
                    "ns": 0,
                    "title": "Paris",
                    "extract": format!("Paris is the capital of France. Seen from {}.", site),
                    "fullurl": format!("https://en.{}.org/wiki/Paris", site.to_lowercase())
                }}}
            })),
        ),
        "Broken" => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "database unavailable"})),
        ),
        other => (
            StatusCode::OK,
            Json(json!({
                "batchcomplete": "",
                "query": {"pages": {"-1": {"ns": 0, "title": other, "missing": ""}}}
            })),
        ),
    }
}

async fn wikipedia_api(
    State(mock): State<MockWiki>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let title = params.get("titles").cloned().unwrap_or_default();
    mock.record("Wikipedia", params, &headers);
    page_response("Wikipedia", &title)
}

async fn wikivoyage_api(
    State(mock): State<MockWiki>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let title = params.get("titles").cloned().unwrap_or_default();
    mock.record("Wikivoyage", params, &headers);
    page_response("Wikivoyage", &title)
}

async fn start_mock_wiki(mock: MockWiki) -> (u16, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let app = Router::new()
        .route("/wikipedia/w/api.php", get(wikipedia_api))
        .route("/wikivoyage/w/api.php", get(wikivoyage_api))
        .with_state(mock);
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    (port, handle)
}

fn collector_config(tmp: &TempDir, port: u16, wikipedia: &[&str], wikivoyage: &[&str]) -> Config {
    let mut config = Config::minimal();
    config.data.dir = tmp.path().join("travel_data");
    config.collector.user_agent = USER_AGENT.to_string();
    config.collector.delay_ms = 0;
    config.collector.timeout_secs = 5;
    config.collector.wikipedia_api = format!("http://127.0.0.1:{}/wikipedia/w/api.php", port);
    config.collector.wikivoyage_api = format!("http://127.0.0.1:{}/wikivoyage/w/api.php", port);
    config.collector.wikipedia = wikipedia.iter().map(|s| s.to_string()).collect();
    config.collector.wikivoyage = wikivoyage.iter().map(|s| s.to_string()).collect();
    config
}

fn written_files(config: &Config) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(&config.data.dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_collect_writes_found_pages_and_skips_the_rest() {
    let tmp = TempDir::new().unwrap();
    let mock = MockWiki::default();
    let (port, handle) = start_mock_wiki(mock.clone()).await;
    let config = collector_config(&tmp, port, &["Atlantis"], &["Paris", "Broken"]);

    run_collect(&config, &NoProgress).await.unwrap();

    assert_eq!(written_files(&config), vec!["Wikivoyage_Paris.txt"]);

    let raw = std::fs::read_to_string(config.data.dir.join("Wikivoyage_Paris.txt")).unwrap();
    let article = parse_article("Wikivoyage_Paris.txt", &raw);
    assert_eq!(article.site, "Wikivoyage");
    assert_eq!(article.title, "Paris");
    assert_eq!(
        article.source_url.as_deref(),
        Some("https://en.wikivoyage.org/wiki/Paris")
    );
    assert!(article.fetched_at.is_some());
    assert!(article.body.contains("capital of France"));

    // One request per title, Wikipedia first, no retries.
    let requests = mock.requests();
    let order: Vec<(&str, &str)> = requests
        .iter()
        .map(|r| (r.site, r.params["titles"].as_str()))
        .collect();
    assert_eq!(
        order,
        vec![
            ("Wikipedia", "Atlantis"),
            ("Wikivoyage", "Paris"),
            ("Wikivoyage", "Broken"),
        ]
    );

    for r in &requests {
        assert_eq!(r.user_agent.as_deref(), Some(USER_AGENT));
        assert_eq!(r.params["action"], "query");
        assert_eq!(r.params["prop"], "extracts|info");
        assert_eq!(r.params["inprop"], "url");
        assert_eq!(r.params["explaintext"], "1");
        assert_eq!(r.params["redirects"], "1");
        assert_eq!(r.params["format"], "json");
    }

    handle.abort();
}

#[tokio::test]
async fn test_collect_fails_when_nothing_downloaded() {
    let tmp = TempDir::new().unwrap();
    let mock = MockWiki::default();
    let (port, handle) = start_mock_wiki(mock.clone()).await;
    let config = collector_config(&tmp, port, &["Atlantis"], &["Broken"]);

    let err = run_collect(&config, &NoProgress).await.unwrap_err();
    assert!(
        format!("{:#}", err).contains("No articles were downloaded"),
        "{:#}",
        err
    );
    assert!(written_files(&config).is_empty());
    assert_eq!(mock.requests().len(), 2);

    handle.abort();
}

#[tokio::test]
async fn test_fetch_article_outcomes() {
    let mock = MockWiki::default();
    let (port, handle) = start_mock_wiki(mock.clone()).await;
    let api = format!("http://127.0.0.1:{}/wikipedia/w/api.php", port);
    let client = reqwest::Client::new();

    let found = fetch_article(&client, "Wikipedia", &api, "Paris")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.site, "Wikipedia");
    assert_eq!(found.title, "Paris");
    assert_eq!(
        found.url.as_deref(),
        Some("https://en.wikipedia.org/wiki/Paris")
    );

    let missing = fetch_article(&client, "Wikipedia", &api, "Atlantis")
        .await
        .unwrap();
    assert!(missing.is_none());

    let err = fetch_article(&client, "Wikipedia", &api, "Broken")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("500"), "{}", err);

    assert_eq!(mock.requests().len(), 3);

    handle.abort();
}
