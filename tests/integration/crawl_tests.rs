//! Integration tests for the crawler
//!
//! These tests use wiremock to serve a small division site and test
//! the full crawl cycle end-to-end, from the province index to SQLite.

use division_crawler::config::{load_config_with_hash, Config, FetchFailurePolicy};
use division_crawler::crawler::{run_crawl, TruncationReason};
use division_crawler::output::ProvinceOutcome;
use division_crawler::storage::{ProvinceStatus, RunStatus, SqliteStorage, Storage};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Writes a configuration file pointing at the mock server and loads it
fn create_test_config(dir: &Path, base_url: &str, policy: &str) -> (Config, String) {
    let db_path = dir.join("divisions.db");
    let toml = format!(
        r#"
[crawler]
root-url = "{base_url}/2021/index.html"
workers = 2
queue-capacity = 4
on-fetch-failure = "{policy}"

[fetch]
timeout-secs = 2
max-attempts = 2
retry-delay-ms = 10

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[output]
database-path = "{}"
"#,
        db_path.display()
    );

    let config_path = dir.join("config.toml");
    std::fs::write(&config_path, toml).expect("Failed to write config");
    load_config_with_hash(&config_path).expect("Failed to load config")
}

async fn mount_page(server: &MockServer, page_path: &str, rows: &str) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            format!(
                "<html><head><meta charset=\"utf-8\"></head><body><table>{}</table></body></html>",
                rows
            ),
            "text/html; charset=utf-8",
        ))
        .mount(server)
        .await;
}

const BEIJING_VILLAGES: &str = r#"<tr class="villagetr"><td>110107001001</td><td>111</td><td>八宝山社区居委会</td></tr>
    <tr class="villagetr"><td>110107001002</td><td>111</td><td>玉泉西里社区居委会</td></tr>"#;

/// Serves two provinces:
///
/// - 11 北京市: one "市辖区" city whose page lists towns directly
/// - 65 新疆维吾尔自治区: 乌鲁木齐市 with one full county, one county whose
///   page is missing and one county without a link; 克拉玛依市 without a link
async fn mount_division_site(server: &MockServer, beijing_villages: &str) {
    mount_page(
        server,
        "/2021/index.html",
        r#"<tr class="provincetr">
            <td><a href="11.html">北京市<br/></a></td>
            <td><a href="65.html">新疆维吾尔自治区<br/></a></td>
        </tr>"#,
    )
    .await;

    // Beijing
    mount_page(
        server,
        "/2021/11.html",
        r#"<tr class="citytr"><td><a href="11/1101.html">110100000000</a></td><td><a href="11/1101.html">市辖区</a></td></tr>"#,
    )
    .await;
    mount_page(
        server,
        "/2021/11/1101.html",
        r#"<tr class="towntr"><td><a href="01/110107001.html">110107001000</a></td><td><a href="01/110107001.html">八宝山街道办事处</a></td></tr>"#,
    )
    .await;
    mount_page(server, "/2021/11/01/110107001.html", beijing_villages).await;

    // Xinjiang
    mount_page(
        server,
        "/2021/65.html",
        r#"<tr class="citytr"><td><a href="65/6501.html">650100000000</a></td><td><a href="65/6501.html">乌鲁木齐市</a></td></tr>
           <tr class="citytr"><td>650200000000</td><td>克拉玛依市</td></tr>"#,
    )
    .await;
    mount_page(
        server,
        "/2021/65/6501.html",
        r#"<tr class="countytr"><td>650101000000</td><td>市辖区</td></tr>
           <tr class="countytr"><td><a href="01/650102.html">650102000000</a></td><td><a href="01/650102.html">天山区</a></td></tr>
           <tr class="countytr"><td><a href="01/650103.html">650103000000</a></td><td><a href="01/650103.html">沙依巴克区</a></td></tr>"#,
    )
    .await;
    mount_page(
        server,
        "/2021/65/01/650102.html",
        r#"<tr class="towntr"><td><a href="02/650102001.html">650102001000</a></td><td><a href="02/650102001.html">燕儿窝街道</a></td></tr>"#,
    )
    .await;
    mount_page(
        server,
        "/2021/65/01/02/650102001.html",
        r#"<tr class="villagetr"><td>650102001001</td><td>111</td><td>燕儿窝南社区</td></tr>
           <tr class="villagetr"><td>650102001002</td><td>111</td><td>燕儿窝北社区</td></tr>
           <tr class="villagetr"><td>650102001003</td><td>220</td><td>水磨沟村</td></tr>"#,
    )
    .await;
    // 65/01/650103.html is not mounted: wiremock answers 404
}

#[tokio::test]
async fn test_full_crawl_two_provinces() {
    let mock_server = MockServer::start().await;
    mount_division_site(&mock_server, BEIJING_VILLAGES).await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let (config, hash) = create_test_config(dir.path(), &mock_server.uri(), "truncate");
    let db_path = config.output.database_path.clone();

    let summary = run_crawl(config, &hash).await.expect("Crawl failed");

    assert_eq!(summary.provinces.len(), 2);
    assert_eq!(summary.total_villages(), 5);
    assert!(!summary.has_failures());

    let beijing = &summary.provinces[0];
    assert_eq!(beijing.code, "11");
    assert!(matches!(
        beijing.outcome,
        ProvinceOutcome::Complete { villages: 2 }
    ));

    let xinjiang = &summary.provinces[1];
    assert_eq!(xinjiang.code, "65");
    match &xinjiang.outcome {
        ProvinceOutcome::Partial {
            villages,
            truncations,
        } => {
            assert_eq!(*villages, 3);
            assert_eq!(truncations.len(), 1);
            assert_eq!(truncations[0].parent_code, "650103");
            assert!(matches!(
                &truncations[0].reason,
                TruncationReason::Fetch(failure) if failure.attempts == 2
            ));
        }
        other => panic!("Expected partial outcome, got {:?}", other),
    }

    // Verify persisted rows
    let storage = SqliteStorage::new(Path::new(&db_path)).expect("Failed to open storage");
    assert_eq!(storage.count_divisions().unwrap(), 5);

    let rows = storage.load_divisions("11").unwrap();
    assert_eq!(rows.len(), 2);
    let first = &rows[0];
    assert_eq!(first.division_id, "110107001001");
    assert_eq!(first.village_code, first.division_id);
    assert_eq!(first.city_code, "1101");
    assert_eq!(first.city_name, "北京市");
    assert_eq!(first.county_code, "1101");
    assert_eq!(first.county_name, "北京市");
    assert_eq!(first.town_code, "110107001");
    assert_eq!(first.town_name, "八宝山街道办事处");
    assert_eq!(first.region_type, "111");
    assert_eq!(
        first.address_name,
        "北京市北京市北京市八宝山街道办事处北京市"
    );
    assert!(first.active);

    let rows = storage.load_divisions("65").unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.county_code == "650102"));
    assert!(rows
        .iter()
        .all(|r| r.division_id.starts_with(&r.town_code)));
    assert_eq!(rows[2].region_type, "220");

    // Verify run bookkeeping
    let run = storage.get_run(summary.run_id).unwrap();
    assert_eq!(run.status, RunStatus::CompletedWithErrors);
    assert_eq!(run.config_hash, hash);

    let results = storage.get_province_results(summary.run_id).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].status, ProvinceStatus::Complete);
    assert_eq!(results[1].status, ProvinceStatus::Partial);
    assert_eq!(results[1].truncations, 1);
}

#[tokio::test]
async fn test_second_crawl_is_idempotent() {
    let mock_server = MockServer::start().await;
    mount_division_site(&mock_server, BEIJING_VILLAGES).await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let (config, hash) = create_test_config(dir.path(), &mock_server.uri(), "truncate");
    let db_path = config.output.database_path.clone();

    let first_run = run_crawl(config.clone(), &hash).await.unwrap();
    let storage = SqliteStorage::new(Path::new(&db_path)).unwrap();
    let beijing_before = storage.load_divisions("11").unwrap();
    let xinjiang_before = storage.load_divisions("65").unwrap();
    let count_before = storage.count_divisions().unwrap();
    drop(storage);

    let second_run = run_crawl(config, &hash).await.unwrap();
    assert_ne!(first_run.run_id, second_run.run_id);

    let storage = SqliteStorage::new(Path::new(&db_path)).unwrap();
    assert_eq!(storage.count_divisions().unwrap(), count_before);
    assert_eq!(storage.load_divisions("11").unwrap(), beijing_before);
    assert_eq!(storage.load_divisions("65").unwrap(), xinjiang_before);
}

#[tokio::test]
async fn test_abort_policy_fails_province() {
    let mock_server = MockServer::start().await;
    mount_division_site(&mock_server, BEIJING_VILLAGES).await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let (config, hash) = create_test_config(dir.path(), &mock_server.uri(), "abort");
    assert_eq!(config.crawler.on_fetch_failure, FetchFailurePolicy::Abort);
    let db_path = config.output.database_path.clone();

    let summary = run_crawl(config, &hash).await.unwrap();

    assert!(summary.has_failures());
    assert_eq!(summary.count(ProvinceStatus::Complete), 1);
    assert_eq!(summary.count(ProvinceStatus::Failed), 1);
    assert!(matches!(
        summary.provinces[1].outcome,
        ProvinceOutcome::Failed(_)
    ));

    // Beijing is unaffected, nothing of Xinjiang was written
    let storage = SqliteStorage::new(Path::new(&db_path)).unwrap();
    assert_eq!(storage.load_divisions("11").unwrap().len(), 2);
    assert!(storage.load_divisions("65").unwrap().is_empty());

    let results = storage.get_province_results(summary.run_id).unwrap();
    assert_eq!(results[1].status, ProvinceStatus::Failed);
    assert!(results[1].error_message.is_some());
}

#[tokio::test]
async fn test_vanished_village_deactivated_on_complete_walk() {
    let mock_server = MockServer::start().await;
    mount_division_site(&mock_server, BEIJING_VILLAGES).await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let (config, hash) = create_test_config(dir.path(), &mock_server.uri(), "truncate");
    let db_path = config.output.database_path.clone();

    run_crawl(config.clone(), &hash).await.unwrap();

    // The next edition drops one Beijing village and keeps Xinjiang partial
    let next_edition = MockServer::start().await;
    mount_division_site(
        &next_edition,
        r#"<tr class="villagetr"><td>110107001001</td><td>111</td><td>八宝山社区居委会</td></tr>"#,
    )
    .await;
    let mut config = config;
    config.crawler.root_url = format!("{}/2021/index.html", next_edition.uri());

    run_crawl(config, &hash).await.unwrap();

    let storage = SqliteStorage::new(Path::new(&db_path)).unwrap();
    let beijing = storage.load_divisions("11").unwrap();
    assert_eq!(beijing.len(), 2);
    assert!(beijing[0].active);
    assert!(!beijing[1].active);

    // Partial walk: nothing deactivated
    assert!(storage
        .load_divisions("65")
        .unwrap()
        .iter()
        .all(|r| r.active));
}

#[tokio::test]
async fn test_blank_province_page_keeps_stored_villages() {
    let mock_server = MockServer::start().await;
    mount_division_site(&mock_server, BEIJING_VILLAGES).await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let (config, hash) = create_test_config(dir.path(), &mock_server.uri(), "truncate");
    let db_path = config.output.database_path.clone();

    run_crawl(config.clone(), &hash).await.unwrap();

    // The site answers 200 with a challenge page instead of the city table
    // Mounted first so it shadows the real city page
    let challenge = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2021/11.html"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "<html><body><table><tr><td>请开启JavaScript并刷新该页</td></tr></table></body></html>",
            "text/html; charset=utf-8",
        ))
        .expect(1)
        .mount(&challenge)
        .await;
    mount_division_site(&challenge, BEIJING_VILLAGES).await;
    let mut config = config;
    config.crawler.root_url = format!("{}/2021/index.html", challenge.uri());

    let summary = run_crawl(config, &hash).await.unwrap();

    let beijing = &summary.provinces[0];
    assert_eq!(beijing.code, "11");
    match &beijing.outcome {
        ProvinceOutcome::Partial {
            villages,
            truncations,
        } => {
            assert_eq!(*villages, 0);
            assert!(matches!(truncations[0].reason, TruncationReason::NoRows));
        }
        other => panic!("Expected partial outcome, got {:?}", other),
    }
    assert!(!summary.is_complete());

    let storage = SqliteStorage::new(Path::new(&db_path)).unwrap();
    let rows = storage.load_divisions("11").unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.active));
}

#[tokio::test]
async fn test_storage_failure_fails_only_that_province() {
    let mock_server = MockServer::start().await;
    mount_division_site(&mock_server, BEIJING_VILLAGES).await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let (config, hash) = create_test_config(dir.path(), &mock_server.uri(), "truncate");
    let db_path = config.output.database_path.clone();

    // Initialize the schema, then make every Xinjiang insert fail
    drop(SqliteStorage::new(Path::new(&db_path)).unwrap());
    let conn = rusqlite::Connection::open(&db_path).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER reject_xinjiang BEFORE INSERT ON all_division
         WHEN NEW.province_code = '65'
         BEGIN SELECT RAISE(ABORT, 'xinjiang rows rejected'); END;",
    )
    .unwrap();
    drop(conn);

    let summary = run_crawl(config, &hash).await.unwrap();

    assert!(summary.has_failures());
    assert!(matches!(
        summary.provinces[0].outcome,
        ProvinceOutcome::Complete { villages: 2 }
    ));
    match &summary.provinces[1].outcome {
        ProvinceOutcome::Failed(message) => assert!(message.contains("xinjiang rows rejected")),
        other => panic!("Expected failed outcome, got {:?}", other),
    }

    let storage = SqliteStorage::new(Path::new(&db_path)).unwrap();
    assert_eq!(storage.load_divisions("11").unwrap().len(), 2);
    assert!(storage.load_divisions("65").unwrap().is_empty());

    let results = storage.get_province_results(summary.run_id).unwrap();
    assert_eq!(results[0].status, ProvinceStatus::Complete);
    assert_eq!(results[1].status, ProvinceStatus::Failed);
    assert!(results[1]
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("xinjiang rows rejected"));
    assert_eq!(
        storage.get_run(summary.run_id).unwrap().status,
        RunStatus::CompletedWithErrors
    );
}
