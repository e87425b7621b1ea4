//! Batch ingestion pipeline.
//!
//! Streams a CSV product export into the catalog in fixed-size batches:
//! source row → [`ProductRecord`] validation → department resolution →
//! product insert. Each batch is one transaction. A bad row only removes
//! itself from its batch; a storage failure rolls the batch back and it is
//! retried once before the run is aborted.
//!
//! Products are inserted, never upserted: re-running against a store that
//! already holds the same ids rejects every conflicting row.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

use crate::config::IngestConfig;
use crate::error::{CatalogError, CatalogResult};
use crate::models::{DepartmentId, ProductRecord, RawProduct};
use crate::store::{insert_product_with, upsert_department_with, CatalogStore};

/// Columns every source file must provide. Extra columns are ignored.
pub const REQUIRED_COLUMNS: [&str; 9] = [
    "id",
    "cost",
    "category",
    "name",
    "brand",
    "retail_price",
    "department",
    "sku",
    "distribution_center_id",
];

/// A source row that was not loaded, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowRejection {
    /// Product id, or `line <n>` when the row has no usable id.
    pub key: String,
    /// 1-based line in the source file.
    pub line: u64,
    pub reason: String,
}

/// End-of-run report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestSummary {
    pub rows_seen: u64,
    pub rows_loaded: u64,
    pub rows_rejected: Vec<RowRejection>,
    pub departments_created: u64,
    pub batches_committed: u64,
}

impl IngestSummary {
    pub fn rejected_count(&self) -> u64 {
        self.rows_rejected.len() as u64
    }
}

// ============ Source reader ============

/// One row read from the source, validated or not.
#[derive(Debug)]
struct SourceRow {
    line: u64,
    key: String,
    parsed: CatalogResult<ProductRecord>,
}

/// Streaming CSV reader that hands out bounded batches.
struct ProductSource<R: Read> {
    reader: csv::Reader<R>,
    columns: [usize; REQUIRED_COLUMNS.len()],
    record: csv::StringRecord,
    done: bool,
}

impl<R: Read> ProductSource<R> {
    fn new(inner: R) -> CatalogResult<Self> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(inner);
        let headers = reader.headers()?.clone();

        let mut columns = [0usize; REQUIRED_COLUMNS.len()];
        for (slot, name) in columns.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| {
                    CatalogError::Source(format!("missing required column: {}", name))
                })?;
        }

        Ok(Self {
            reader,
            columns,
            record: csv::StringRecord::new(),
            done: false,
        })
    }

    /// Read up to `size` rows. An empty batch means the source is exhausted.
    fn next_batch(&mut self, size: usize) -> CatalogResult<Vec<SourceRow>> {
        let mut batch = Vec::with_capacity(size);
        while !self.done && batch.len() < size {
            match self.reader.read_record(&mut self.record) {
                Ok(true) => {
                    let line = self.record.position().map(|p| p.line()).unwrap_or(0);
                    batch.push(self.parse_current(line));
                }
                Ok(false) => self.done = true,
                Err(err) => {
                    if let csv::ErrorKind::Io(_) = err.kind() {
                        return Err(err.into());
                    }
                    // Malformed record: reject it and keep reading.
                    let line = err.position().map(|p| p.line()).unwrap_or(0);
                    batch.push(SourceRow {
                        line,
                        key: format!("line {}", line),
                        parsed: Err(CatalogError::validation("record", err.to_string())),
                    });
                }
            }
        }
        Ok(batch)
    }

    fn field(&self, column: usize) -> &str {
        self.record.get(self.columns[column]).unwrap_or("").trim()
    }

    fn parse_current(&self, line: u64) -> SourceRow {
        let id = self.field(0).to_string();
        let key = if id.is_empty() {
            format!("line {}", line)
        } else {
            id.clone()
        };
        let parsed = self.raw_product(id).and_then(ProductRecord::new);
        SourceRow { line, key, parsed }
    }

    fn raw_product(&self, id: String) -> CatalogResult<RawProduct> {
        Ok(RawProduct {
            id,
            cost: parse_decimal("cost", self.field(1))?,
            category: self.field(2).to_string(),
            name: self.field(3).to_string(),
            brand: self.field(4).to_string(),
            retail_price: parse_decimal("retail_price", self.field(5))?,
            department: self.field(6).to_string(),
            sku: self.field(7).to_string(),
            distribution_center_id: parse_integer("distribution_center_id", self.field(8))?,
        })
    }
}

pub(crate) fn parse_decimal(field: &str, value: &str) -> CatalogResult<Decimal> {
    if value.is_empty() {
        return Err(CatalogError::validation(field, "is missing"));
    }
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .map_err(|_| CatalogError::validation(field, "is not a number"))
}

/// Integers may arrive as `3` or `3.0`; anything fractional is rejected.
pub(crate) fn parse_integer(field: &str, value: &str) -> CatalogResult<i64> {
    let number = parse_decimal(field, value)?;
    if !number.fract().is_zero() {
        return Err(CatalogError::validation(field, "must be a positive integer"));
    }
    number
        .to_i64()
        .ok_or_else(|| CatalogError::validation(field, "is out of range"))
}

/// Human-readable rejection reason, e.g. `retail_price is zero`.
pub(crate) fn rejection_reason(err: &CatalogError) -> String {
    match err {
        CatalogError::Validation { field, message } => format!("{} {}", field, message),
        CatalogError::Integrity(msg) if msg.contains("UNIQUE") => {
            "duplicate product id".to_string()
        }
        CatalogError::Integrity(msg) if msg.contains("FOREIGN KEY") => {
            "unknown department".to_string()
        }
        other => other.to_string(),
    }
}

// ============ Pipeline ============

/// Ingest a CSV file into the catalog.
pub async fn ingest_file(
    store: &CatalogStore,
    path: &Path,
    options: &IngestConfig,
) -> CatalogResult<IngestSummary> {
    let file = std::fs::File::open(path)
        .map_err(|e| CatalogError::Source(format!("{}: {}", path.display(), e)))?;
    info!(source = %path.display(), batch_size = options.batch_size, "starting ingestion");
    ingest_reader(store, file, options).await
}

/// Ingest CSV data from any reader.
pub async fn ingest_reader<R: Read>(
    store: &CatalogStore,
    input: R,
    options: &IngestConfig,
) -> CatalogResult<IngestSummary> {
    if options.batch_size == 0 {
        return Err(CatalogError::validation("batch_size", "must be > 0"));
    }

    let mut source = ProductSource::new(input)?;
    let mut summary = IngestSummary::default();
    let mut departments: HashMap<String, DepartmentId> = HashMap::new();

    loop {
        let batch = source.next_batch(options.batch_size)?;
        if batch.is_empty() {
            break;
        }
        summary.rows_seen += batch.len() as u64;

        let mut valid = Vec::with_capacity(batch.len());
        for row in batch {
            match row.parsed {
                Ok(record) => valid.push((row.line, record)),
                Err(err) => reject(
                    &mut summary,
                    options,
                    RowRejection {
                        key: row.key,
                        line: row.line,
                        reason: rejection_reason(&err),
                    },
                ),
            }
        }

        let batch_no = summary.batches_committed + 1;
        let outcome = retry_once(batch_no, || apply_batch(store, &valid, &departments))
            .await
            .inspect_err(|err| {
                warn!(
                    batch = batch_no,
                    rows_loaded = summary.rows_loaded,
                    error = %err,
                    "batch failed; aborting ingestion"
                )
            })?;

        summary.rows_loaded += outcome.loaded;
        summary.departments_created += outcome.created.len() as u64;
        summary.batches_committed += 1;
        departments.extend(outcome.created);
        for rejection in outcome.rejected {
            reject(&mut summary, options, rejection);
        }

        info!(
            batch = batch_no,
            loaded = outcome.loaded,
            total_loaded = summary.rows_loaded,
            total_rejected = summary.rejected_count(),
            "committed batch"
        );
    }

    let unlogged = summary
        .rejected_count()
        .saturating_sub(options.max_rejections_logged as u64);
    if unlogged > 0 {
        warn!(count = unlogged, "further rejected rows not logged individually");
    }
    info!(
        rows_seen = summary.rows_seen,
        rows_loaded = summary.rows_loaded,
        rows_rejected = summary.rejected_count(),
        departments_created = summary.departments_created,
        "ingestion finished"
    );

    Ok(summary)
}

fn reject(summary: &mut IngestSummary, options: &IngestConfig, rejection: RowRejection) {
    if summary.rows_rejected.len() < options.max_rejections_logged {
        warn!(
            key = %rejection.key,
            line = rejection.line,
            reason = %rejection.reason,
            "row rejected"
        );
    }
    summary.rows_rejected.push(rejection);
}

/// Run `attempt`, and run it a second time if it failed with a storage
/// error. Other errors are returned as they are.
async fn retry_once<T, F, Fut>(batch_no: u64, mut attempt: F) -> CatalogResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CatalogResult<T>>,
{
    match attempt().await {
        Err(err) if err.is_storage() => {
            warn!(batch = batch_no, error = %err, "batch rolled back, retrying once");
            attempt().await
        }
        result => result,
    }
}

/// What one committed batch changed.
struct BatchOutcome {
    loaded: u64,
    rejected: Vec<RowRejection>,
    /// Departments first created by this batch.
    created: HashMap<String, DepartmentId>,
}

/// Apply one batch in a single transaction.
///
/// Constraint violations reject only their row; SQLite aborts just the
/// failing statement, so the rest of the transaction stays intact. Any
/// other error drops the transaction, rolling the whole batch back.
async fn apply_batch(
    store: &CatalogStore,
    rows: &[(u64, ProductRecord)],
    known: &HashMap<String, DepartmentId>,
) -> CatalogResult<BatchOutcome> {
    let mut tx = store.pool().begin().await?;
    let mut outcome = BatchOutcome {
        loaded: 0,
        rejected: Vec::new(),
        created: HashMap::new(),
    };
    let mut seen: HashMap<&str, DepartmentId> = HashMap::new();

    for (line, record) in rows {
        let name = record.department();
        let department_id = match known.get(name).or_else(|| seen.get(name)) {
            Some(id) => *id,
            None => {
                let (id, inserted) = upsert_department_with(&mut *tx, name).await?;
                if inserted {
                    outcome.created.insert(name.to_string(), id);
                }
                seen.insert(name, id);
                id
            }
        };

        match insert_product_with(&mut *tx, record, department_id).await {
            Ok(()) => outcome.loaded += 1,
            Err(err @ CatalogError::Integrity(_)) => outcome.rejected.push(RowRejection {
                key: record.id().to_string(),
                line: *line,
                reason: rejection_reason(&err),
            }),
            Err(err) => return Err(err),
        }
    }

    tx.commit().await?;
    Ok(outcome)
}
