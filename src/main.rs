//! # Product Catalog CLI (`catalog`)
//!
//! Loads, migrates and queries the product catalog.
//!
//! ## Usage
//!
//! ```bash
//! catalog --config ./config/catalog.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `catalog init` | Create the SQLite database and schema |
//! | `catalog ingest <csv>` | Load a CSV product export in batches |
//! | `catalog migrate` | Move a legacy database to the normalized layout |
//! | `catalog departments` | List departments with product counts |
//! | `catalog department <id>` | Show one department |
//! | `catalog products` | List products with filters and pagination |
//! | `catalog product <id>` | Show one product |
//! | `catalog stats` | Catalog or department statistics |
//! | `catalog categories` | Distinct categories |
//! | `catalog brands` | Distinct brands |
//! | `catalog verify` | Post-load health check |
//! | `catalog serve` | Start the HTTP API |
//!
//! Every read command accepts `--json` for machine-readable output. Logs go
//! to stderr; set `RUST_LOG` or pass `--verbose` for more detail.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use product_catalog::config::{self, Config};
use product_catalog::ingest::{self, IngestSummary};
use product_catalog::migrate::{self, MigrationStatus, MigrationSummary};
use product_catalog::models::{DepartmentId, ProductWithDepartment};
use product_catalog::query::{self, PageRequest, ProductFilters, ProductPage};
use product_catalog::schema::ProductsLayout;
use product_catalog::server;
use product_catalog::stats::{self, AggregateStats, CatalogHealth, TopEntry};
use product_catalog::store::CatalogStore;

/// Product catalog: batch ingestion, department migration, queries and
/// statistics over SQLite.
#[derive(Parser)]
#[command(
    name = "catalog",
    about = "Normalized product catalog over SQLite",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/catalog.toml")]
    config: PathBuf,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Debug-level logging.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent. A legacy database is detected and left for `migrate`.
    Init,

    /// Load a CSV product export.
    ///
    /// Rows failing validation are reported and skipped; products are never
    /// overwritten, so re-loading the same file rejects every row.
    Ingest {
        /// CSV file with a header row.
        path: PathBuf,

        /// Rows per transaction (overrides `[ingest] batch_size`).
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Migrate a legacy database (department names on products) to the
    /// normalized layout.
    Migrate,

    /// List departments with their product counts.
    Departments,

    /// Show one department.
    Department { id: DepartmentId },

    /// List products.
    Products {
        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        brand: Option<String>,

        /// Department name.
        #[arg(long, conflicts_with = "department_id")]
        department: Option<String>,

        /// Department id; scopes the listing and fails if unknown.
        #[arg(long)]
        department_id: Option<DepartmentId>,

        /// Case-insensitive substring of the product name.
        #[arg(long)]
        search: Option<String>,

        #[arg(long)]
        page: Option<i64>,

        #[arg(long)]
        limit: Option<i64>,
    },

    /// Show one product.
    Product { id: String },

    /// Aggregate statistics, catalog-wide or for one department.
    Stats {
        #[arg(long)]
        department_id: Option<DepartmentId>,

        /// Number of top categories, brands and departments.
        #[arg(long)]
        top: Option<i64>,

        /// Also list the products with the largest margin.
        #[arg(long)]
        margins: Option<i64>,
    },

    /// List distinct categories.
    Categories,

    /// List distinct brands.
    Brands,

    /// Check counts and referential integrity after a load.
    Verify,

    /// Start the HTTP API on `[server] bind`.
    Serve,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("product_catalog=debug,catalog=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("product_catalog=info,catalog=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut cfg = config::load_config(&cli.config)?;
    let json = cli.json;

    match cli.command {
        Commands::Init => {
            let store = open(&cfg).await?;
            match store.layout().await? {
                ProductsLayout::Legacy => {
                    println!("Database has the legacy layout; run `catalog migrate`.")
                }
                _ => println!("Database initialized successfully."),
            }
        }
        Commands::Ingest { path, batch_size } => {
            if let Some(size) = batch_size {
                cfg.ingest.batch_size = size;
            }
            let store = open(&cfg).await?;
            if store.layout().await? == ProductsLayout::Legacy {
                bail!("database has the legacy layout; run `catalog migrate` before ingesting");
            }
            let summary = ingest::ingest_file(&store, &path, &cfg.ingest)
                .await
                .with_context(|| format!("ingestion of {} failed", path.display()))?;
            emit(json, &summary, print_ingest_summary)?;
        }
        Commands::Migrate => {
            let store = CatalogStore::new(product_catalog::db::connect(&cfg).await?);
            let summary = migrate::migrate_departments(&store)
                .await
                .context("migration failed")?;
            emit(json, &summary, print_migration_summary)?;
            if !summary.succeeded() {
                bail!(
                    "migration verification failed; the backup table {} is authoritative",
                    migrate::BACKUP_TABLE
                );
            }
        }
        Commands::Departments => {
            let store = open(&cfg).await?;
            let departments = query::list_departments(&store).await?;
            emit(json, &departments, |list| {
                if list.is_empty() {
                    println!("No departments.");
                }
                for d in list {
                    println!("{:>5}  {:<30} {:>8} products", d.id, d.name, d.product_count);
                }
            })?;
        }
        Commands::Department { id } => {
            let store = open(&cfg).await?;
            let department = query::get_department(&store, id).await?;
            emit(json, &department, |d| {
                println!("{} (id {})", d.name, d.id);
                println!("  products: {}", d.product_count);
                println!("  created:  {}", d.created_at);
                println!("  updated:  {}", d.updated_at);
            })?;
        }
        Commands::Products {
            category,
            brand,
            department,
            department_id,
            search,
            page,
            limit,
        } => {
            let store = open(&cfg).await?;
            let filters = ProductFilters {
                category,
                brand,
                department_id: None,
                department_name: department,
                search,
            };
            let request = PageRequest { page, limit };
            match department_id {
                Some(id) => {
                    let result =
                        query::list_department_products(&store, id, &filters, request, &cfg.query)
                            .await?;
                    emit(json, &result, |r| {
                        println!("Department: {}", r.department_name);
                        print_products(&r.products);
                        print_pagination(&r.pagination);
                    })?;
                }
                None => {
                    let result = query::list_products(&store, &filters, request, &cfg.query).await?;
                    emit(json, &result, |r: &ProductPage| {
                        print_products(&r.products);
                        print_pagination(&r.pagination);
                    })?;
                }
            }
        }
        Commands::Product { id } => {
            let store = open(&cfg).await?;
            let product = query::get_product(&store, &id).await?;
            emit(json, &product, print_product_detail)?;
        }
        Commands::Stats {
            department_id,
            top,
            margins,
        } => {
            let store = open(&cfg).await?;
            let top_n = top.unwrap_or(cfg.stats.top_n);
            let result = match department_id {
                Some(id) => stats::get_department_statistics(&store, id, top_n).await?,
                None => stats::get_statistics(&store, top_n).await?,
            };
            let top_products = match margins {
                Some(n) => Some(stats::top_margins(&store, n).await?),
                None => None,
            };

            if json {
                let value = match &top_products {
                    Some(products) => serde_json::json!({ "stats": result, "top_margins": products }),
                    None => serde_json::to_value(&result)?,
                };
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                print_stats(&result);
                if let Some(products) = &top_products {
                    println!();
                    println!("Highest margins:");
                    for p in products {
                        println!(
                            "  {:<12} {:<30} {:>10.2} ({}%)",
                            p.id,
                            p.name,
                            p.profit_margin,
                            percentage(p)
                        );
                    }
                }
            }
        }
        Commands::Categories => {
            let store = open(&cfg).await?;
            let categories = query::list_categories(&store).await?;
            emit(json, &categories, |list| list.iter().for_each(|c| println!("{}", c)))?;
        }
        Commands::Brands => {
            let store = open(&cfg).await?;
            let brands = query::list_brands(&store).await?;
            emit(json, &brands, |list| list.iter().for_each(|b| println!("{}", b)))?;
        }
        Commands::Verify => {
            let store = open(&cfg).await?;
            let health = stats::verify_catalog(&store).await?;
            emit(json, &health, print_health)?;
            if !health.is_healthy() {
                bail!("catalog verification failed");
            }
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

async fn open(cfg: &Config) -> Result<CatalogStore> {
    CatalogStore::open(cfg)
        .await
        .with_context(|| format!("failed to open catalog at {}", cfg.db.path.display()))
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        text(value);
    }
    Ok(())
}

fn percentage(p: &ProductWithDepartment) -> String {
    p.profit_margin_percentage
        .map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| "n/a".to_string())
}

fn print_products(products: &[ProductWithDepartment]) {
    if products.is_empty() {
        println!("No products.");
        return;
    }
    for p in products {
        println!(
            "{:<12} {:<30} {:<16} {:<16} {:>10.2}  {}",
            p.id, p.name, p.category, p.brand, p.retail_price, p.department.name
        );
    }
}

fn print_pagination(p: &query::Pagination) {
    println!();
    println!(
        "Page {} of {} ({} products, {} per page)",
        p.page, p.total_pages, p.total_count, p.limit
    );
}

fn print_product_detail(p: &ProductWithDepartment) {
    println!("{}: {}", p.id, p.name);
    println!("  brand:        {}", p.brand);
    println!("  category:     {}", p.category);
    println!("  department:   {} (id {})", p.department.name, p.department.id);
    println!("  sku:          {}", p.sku);
    println!("  dist. center: {}", p.distribution_center_id);
    println!("  cost:         {:.2}", p.cost);
    println!("  retail price: {:.2}", p.retail_price);
    println!("  margin:       {:.2} ({}%)", p.profit_margin, percentage(p));
    println!("  created:      {}", p.created_at);
}

fn print_top(title: &str, entries: &[TopEntry]) {
    println!("  {}:", title);
    for e in entries {
        println!("    {:<30} {:>8}", e.name, e.count);
    }
}

fn print_stats(s: &AggregateStats) {
    match &s.department {
        Some(d) => println!("Statistics for {} (id {})", d.name, d.id),
        None => println!("Catalog statistics"),
    }
    println!("  products:    {}", s.total_products);
    println!("  categories:  {}", s.total_categories);
    println!("  brands:      {}", s.total_brands);
    println!("  departments: {}", s.total_departments);

    let fmt = |v: Option<rust_decimal::Decimal>| {
        v.map(|d| format!("{:.2}", d)).unwrap_or_else(|| "-".to_string())
    };
    println!(
        "  price:       avg {} / min {} / max {}",
        fmt(s.price_stats.average_price),
        fmt(s.price_stats.min_price),
        fmt(s.price_stats.max_price)
    );
    print_top("top categories", &s.top_categories);
    print_top("top brands", &s.top_brands);
    print_top("top departments", &s.top_departments);
}

fn print_ingest_summary(s: &IngestSummary) {
    println!("Ingestion complete.");
    println!("  rows seen:           {}", s.rows_seen);
    println!("  rows loaded:         {}", s.rows_loaded);
    println!("  rows rejected:       {}", s.rejected_count());
    println!("  departments created: {}", s.departments_created);
    println!("  batches committed:   {}", s.batches_committed);
    for r in &s.rows_rejected {
        println!("    line {:>6}  {:<16} {}", r.line, r.key, r.reason);
    }
}

fn print_migration_summary(s: &MigrationSummary) {
    match s.status {
        MigrationStatus::AlreadyNormalized => {
            println!("Catalog already normalized ({} products); nothing to do.", s.rows_before);
            return;
        }
        MigrationStatus::Completed => println!("Migration complete."),
        MigrationStatus::VerificationFailed => println!("Migration FAILED verification."),
    }
    println!("  rows before:         {}", s.rows_before);
    println!("  rows migrated:       {}", s.rows_migrated);
    println!("  rows rejected:       {}", s.rows_rejected.len());
    println!("  departments created: {}", s.departments_created);
    if let Some(backup) = &s.backup_table {
        println!("  backup table:        {}", backup);
    }
    if let Some(v) = &s.verification {
        println!("  orphans:             {}", v.orphans);
        println!("  name mismatches:     {}", v.name_mismatches);
        println!("  counts match:        {}", v.count_matches);
    }
    for r in &s.rows_rejected {
        println!("    {:<16} {}", r.id, r.reason);
    }
}

fn print_health(h: &CatalogHealth) {
    println!("Catalog verification");
    println!("  products:        {}", h.products);
    println!("  departments:     {}", h.departments);
    println!("  invalid prices:  {}", h.invalid_prices);
    println!("  linked products: {}", h.linked_products);
    println!("  orphans:         {}", h.orphans);
    println!(
        "  status:          {}",
        if h.is_healthy() { "ok" } else { "FAILED" }
    );
}
