//! Client and loader behaviour against a mock World Bank API.

use serde_json::{json, Value};
use std::time::Duration;
use wdi_db::{
    CountryCode, DbPool, IndicatorQuery, IndicatorRepository, SqliteIndicatorRepository,
    WdiWriter, YearRange,
};
use wdi_ingestion::{ApiError, LoadConfig, Loader, RetryPolicy, WorldBankClient};
use wdi_telemetry::{AuditRecord, Metrics};
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GDP: &str = "NY.GDP.MKTP.CD";
const DEBT: &str = "DT.DOD.DECT.CD";

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        backoff: 0.0,
        request_timeout: Duration::from_secs(5),
        page_pause: Duration::ZERO,
    }
}

fn client(server: &MockServer, max_attempts: u32) -> WorldBankClient {
    WorldBankClient::new(&server.uri(), fast_retry(max_attempts), Metrics::new().unwrap()).unwrap()
}

fn page(page: u64, pages: u64, items: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!([{ "page": page, "pages": pages }, items]))
}

fn load_config(years: (i32, i32)) -> LoadConfig {
    let countries = ["ARG", "BRA"]
        .iter()
        .map(|c| c.parse::<CountryCode>().unwrap())
        .collect();
    let mut config = LoadConfig::new(countries, YearRange::new(years.0, years.1).unwrap());
    config.pause = Duration::ZERO;
    config
}

async fn mount_topics(server: &MockServer, topics: Value) {
    Mock::given(method("GET"))
        .and(path("/topic"))
        .respond_with(page(1, 1, topics))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_failed_requests_are_retried_before_paging_on() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/topic/3/indicator"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/topic/3/indicator"))
        .and(query_param("page", "1"))
        .respond_with(page(1, 2, json!([{ "id": "A", "name": "first" }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/topic/3/indicator"))
        .and(query_param("page", "2"))
        .respond_with(page(2, 2, json!([{ "id": "B", "name": "second" }])))
        .mount(&server)
        .await;

    let records = client(&server, 3).list_indicators_for_topic("3").await.unwrap();

    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["A", "B"]);
    assert_eq!(server.received_requests().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_retries_stop_after_max_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/topic"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client(&server, 3).list_topics().await.unwrap_err();

    assert!(
        matches!(err, ApiError::Status(status) if status.as_u16() == 503),
        "unexpected error: {err}"
    );
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_api_message_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"/indicator/NOT\.A\.CODE$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "message": [{ "id": "120", "key": "Invalid value" }] }
        ])))
        .mount(&server)
        .await;

    let countries = vec!["ARG".parse::<CountryCode>().unwrap()];
    let err = client(&server, 3)
        .fetch_series("NOT.A.CODE", &countries, 2000, 2020)
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Api(_)), "unexpected error: {err}");
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_load_without_matching_topic_fails() {
    let server = MockServer::start().await;
    mount_topics(
        &server,
        json!([{ "id": "1", "value": "Agriculture & Rural Development" }]),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let db = DbPool::new(dir.path().join("wdi.db").to_str().unwrap())
        .await
        .unwrap();
    db.migrate().await.unwrap();

    let loader = Loader::new(
        client(&server, 1),
        WdiWriter::new(db.clone()),
        Metrics::new().unwrap(),
        load_config((2019, 2020)),
    );
    let err = loader.run().await.unwrap_err();

    assert!(
        err.to_string().contains("no World Bank topic"),
        "unexpected error: {err:#}"
    );
    let repo = SqliteIndicatorRepository::new(db);
    assert!(repo.indicators().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failing_indicator_is_skipped() {
    let server = MockServer::start().await;
    mount_topics(
        &server,
        json!([
            { "id": "3", "value": "Economy & Growth" },
            { "id": "20", "value": "External Debt" }
        ]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/topic/3/indicator"))
        .respond_with(page(1, 1, json!([{ "id": GDP, "name": "GDP (current US$)" }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/topic/20/indicator"))
        .respond_with(page(1, 1, json!([{ "id": DEBT, "name": "External debt stocks" }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"/indicator/NY\.GDP\.MKTP\.CD$"))
        .and(query_param("date", "2019:2020"))
        .respond_with(page(
            1,
            1,
            json!([
                { "countryiso3code": "ARG", "country": { "value": "Argentina" },
                  "date": "2020", "value": 400.0 },
                { "countryiso3code": "ARG", "country": { "value": "Argentina" },
                  "date": "2019", "value": 450.0 },
                { "countryiso3code": "BRA", "country": { "value": "Brazil" },
                  "date": "2020", "value": null }
            ]),
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"/indicator/DT\.DOD\.DECT\.CD$"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db = DbPool::new(dir.path().join("wdi.db").to_str().unwrap())
        .await
        .unwrap();
    db.migrate().await.unwrap();
    let audit_path = dir.path().join("audit.jsonl");
    let mut config = load_config((2019, 2020));
    config.audit_path = Some(audit_path.clone());

    let loader = Loader::new(
        client(&server, 2),
        WdiWriter::new(db.clone()),
        Metrics::new().unwrap(),
        config,
    );
    let report = loader.run().await.unwrap();

    assert_eq!(report.topic_ids, vec!["3", "20"]);
    assert_eq!(report.indicators, 2);
    assert_eq!(report.indicators_failed, 1);
    assert_eq!(report.observations, 3);

    let repo = SqliteIndicatorRepository::new(db);
    assert_eq!(repo.indicators().await.unwrap().len(), 2);
    let query = IndicatorQuery::new(["ARG", "BRA"], GDP, 2019, 2020).unwrap();
    let rows: Vec<(String, i32, Option<f64>)> = repo
        .fetch(&query)
        .await
        .unwrap()
        .into_iter()
        .map(|p| (p.country_iso3, p.year, p.value))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("ARG".to_string(), 2019, Some(450.0)),
            ("ARG".to_string(), 2020, Some(400.0)),
            ("BRA".to_string(), 2020, None),
        ]
    );

    let audit = std::fs::read_to_string(&audit_path).unwrap();
    let records: Vec<AuditRecord<Value>> = audit
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let kinds: Vec<&str> = records.iter().map(|r| r.kind.as_str()).collect();
    assert_eq!(kinds, vec!["indicator_failed", "indicator_loaded", "load_completed"]);
    assert_eq!(records[0].payload["indicator_code"], DEBT);
    assert_eq!(records[1].payload["non_null"], 2);
    assert_eq!(records[2].payload["indicators_failed"], 1);
}
