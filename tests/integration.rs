use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use product_catalog::config::Config;
use product_catalog::db;
use product_catalog::schema;

const PRODUCTS_CSV: &str = "\
id,cost,category,name,brand,retail_price,department,sku,distribution_center_id
P1,10.00,Jeans,Slim Fit Jeans,Levi's,20.00,Men,SKU-1,1
P2,5.00,Jeans,Loose Jeans,Levi's,0.00,Men,SKU-2,1
P3,8.00,Tops,Linen Shirt,Acme,16.00,Women,SKU-3,2
";

fn catalog_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_catalog"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();
    fs::write(root.join("products.csv"), PRODUCTS_CSV).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/catalog.sqlite"

[ingest]
batch_size = 2

[query]
default_limit = 10
max_limit = 100

[server]
bind = "127.0.0.1:7341"
"#,
        root.display()
    );

    let config_path = config_dir.join("catalog.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_catalog(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = catalog_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run catalog binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn run_json(config_path: &Path, args: &[&str]) -> Value {
    let mut full = vec!["--json"];
    full.extend_from_slice(args);
    let (stdout, stderr, success) = run_catalog(config_path, &full);
    assert!(success, "{:?} failed: stdout={}, stderr={}", args, stdout, stderr);
    serde_json::from_str(&stdout)
        .unwrap_or_else(|e| panic!("invalid JSON from {:?}: {} ({})", args, e, stdout))
}

fn loaded_env() -> (TempDir, PathBuf) {
    let (tmp, config_path) = setup_test_env();
    let csv = tmp.path().join("products.csv");
    let (stdout, stderr, success) =
        run_catalog(&config_path, &["ingest", csv.to_str().unwrap()]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    (tmp, config_path)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_catalog(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/catalog.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_catalog(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_catalog(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_catalog(&tmp.path().join("nope.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_ingest_reports_rejections() {
    let (tmp, config_path) = setup_test_env();
    let csv = tmp.path().join("products.csv");

    let summary = run_json(&config_path, &["ingest", csv.to_str().unwrap()]);
    assert_eq!(summary["rows_seen"], 3);
    assert_eq!(summary["rows_loaded"], 2);
    assert_eq!(summary["departments_created"], 2);
    assert_eq!(summary["batches_committed"], 2);

    let rejected = summary["rows_rejected"].as_array().unwrap();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0]["key"], "P2");
    assert_eq!(rejected[0]["reason"], "retail_price is zero");
}

#[test]
fn test_reingest_rejects_every_existing_key() {
    let (tmp, config_path) = loaded_env();
    let csv = tmp.path().join("products.csv");

    let summary = run_json(&config_path, &["ingest", csv.to_str().unwrap()]);
    assert_eq!(summary["rows_loaded"], 0);
    let reasons: Vec<&str> = summary["rows_rejected"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["reason"].as_str().unwrap())
        .collect();
    assert_eq!(
        reasons,
        vec!["retail_price is zero", "duplicate product id", "duplicate product id"]
    );
}

#[test]
fn test_ingest_missing_file_fails() {
    let (tmp, config_path) = setup_test_env();
    let missing = tmp.path().join("missing.csv");

    let (_, stderr, success) = run_catalog(&config_path, &["ingest", missing.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("missing.csv"), "stderr: {}", stderr);
}

#[test]
fn test_departments_report_counts() {
    let (_tmp, config_path) = loaded_env();

    let departments = run_json(&config_path, &["departments"]);
    let summary: Vec<(String, i64)> = departments
        .as_array()
        .unwrap()
        .iter()
        .map(|d| {
            (
                d["name"].as_str().unwrap().to_string(),
                d["product_count"].as_i64().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![("Men".to_string(), 1), ("Women".to_string(), 1)]
    );

    let (stdout, _, success) = run_catalog(&config_path, &["departments"]);
    assert!(success);
    assert!(stdout.contains("Men"));
}

#[test]
fn test_statistics_after_load() {
    let (_tmp, config_path) = loaded_env();

    let stats = run_json(&config_path, &["stats"]);
    assert_eq!(stats["total_products"], 2);
    assert_eq!(stats["total_departments"], 2);
    assert_eq!(stats["top_categories"].as_array().unwrap().len(), 2);

    let stats = run_json(&config_path, &["stats", "--department-id", "1"]);
    assert_eq!(stats["department"]["name"], "Men");
    assert_eq!(stats["total_products"], 1);
}

#[test]
fn test_products_listing_and_detail() {
    let (_tmp, config_path) = loaded_env();

    let page = run_json(&config_path, &["products", "--search", "SHIRT"]);
    let products = page["products"].as_array().unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["id"], "P3");
    assert_eq!(products[0]["department"]["name"], "Women");

    let product = run_json(&config_path, &["product", "P1"]);
    assert_eq!(product["department"]["name"], "Men");
    let percentage: f64 = product["profit_margin_percentage"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(percentage, 50.0);
}

#[test]
fn test_empty_filter_result_pagination() {
    let (_tmp, config_path) = setup_test_env();
    run_catalog(&config_path, &["init"]);

    let page = run_json(&config_path, &["products", "--category", "Jeans"]);
    assert!(page["products"].as_array().unwrap().is_empty());
    assert_eq!(page["pagination"]["total_pages"], 0);
    assert_eq!(page["pagination"]["has_next"], false);
    assert_eq!(page["pagination"]["has_prev"], false);
}

#[test]
fn test_pages_cover_all_products_once() {
    let (_tmp, config_path) = loaded_env();

    let mut ids = Vec::new();
    for page in 1..=3 {
        let result = run_json(
            &config_path,
            &["products", "--limit", "1", "--page", &page.to_string()],
        );
        for p in result["products"].as_array().unwrap() {
            ids.push(p["id"].as_str().unwrap().to_string());
        }
        assert_eq!(result["pagination"]["total_pages"], 2);
    }
    assert_eq!(ids, vec!["P1", "P3"]);
}

#[test]
fn test_unknown_ids_fail_with_not_found() {
    let (_tmp, config_path) = loaded_env();

    let (_, stderr, success) = run_catalog(&config_path, &["product", "NOPE"]);
    assert!(!success);
    assert!(stderr.contains("product not found: NOPE"), "stderr: {}", stderr);

    let (_, stderr, success) = run_catalog(&config_path, &["products", "--department-id", "999"]);
    assert!(!success);
    assert!(stderr.contains("department not found: 999"), "stderr: {}", stderr);
}

#[test]
fn test_categories_and_brands() {
    let (_tmp, config_path) = loaded_env();

    let categories = run_json(&config_path, &["categories"]);
    assert_eq!(categories, serde_json::json!(["Jeans", "Tops"]));

    let brands = run_json(&config_path, &["brands"]);
    assert_eq!(brands, serde_json::json!(["Acme", "Levi's"]));
}

#[test]
fn test_verify_after_load() {
    let (_tmp, config_path) = loaded_env();

    let (stdout, stderr, success) = run_catalog(&config_path, &["verify"]);
    assert!(success, "verify failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("orphans:         0"));
    assert!(stdout.contains("ok"));
}

#[tokio::test]
async fn test_migrate_legacy_database() {
    let (tmp, config_path) = setup_test_env();

    let config = Config::with_db_path(tmp.path().join("data/catalog.sqlite"));
    let pool = db::connect(&config).await.unwrap();
    schema::install_legacy_schema(&pool).await.unwrap();
    for (id, department) in [("L1", "Men"), ("L2", "Women"), ("L3", "")] {
        sqlx::query(
            "INSERT INTO products (id, cost, category, name, brand, retail_price, department, sku, distribution_center_id, created_at)
             VALUES (?, 4.5, 'Jeans', 'Legacy Jeans', 'Acme', 9.0, ?, 'SKU', 1, '2024-05-01 10:00:00')",
        )
        .bind(id)
        .bind(department)
        .execute(&pool)
        .await
        .unwrap();
    }
    pool.close().await;

    let summary = run_json(&config_path, &["migrate"]);
    assert_eq!(summary["status"], "completed");
    assert_eq!(summary["rows_before"], 3);
    assert_eq!(summary["rows_migrated"], 2);
    assert_eq!(summary["rows_rejected"][0]["id"], "L3");
    assert_eq!(summary["verification"]["orphans"], 0);
    assert_eq!(summary["verification"]["count_matches"], true);

    let again = run_json(&config_path, &["migrate"]);
    assert_eq!(again["status"], "already_normalized");

    let product = run_json(&config_path, &["product", "L2"]);
    assert_eq!(product["department"]["name"], "Women");
    assert_eq!(product["created_at"], "2024-05-01T10:00:00Z");
}
