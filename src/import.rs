// 📥 Bulk Import Coordinator
// parse → validate → duplicate check → insert, with a three-way partition of rows
//
// Row-level problems never abort the batch. The call itself fails only for
// unusable input (ParseError). A store that becomes unusable, or the overall
// deadline passing, stops store work; the rows not yet attempted are still
// reported, as failed with a "not attempted" reason.

use crate::attributes::FieldRegistry;
use crate::db::{RecordId, RecordStore};
use crate::entities::{compose_key, EntityKind};
use crate::error::{join_messages, FieldError, ImportError, InsertError, ParseError, StoreError};
use crate::parser::CsvParser;
use crate::schema::{SchemaValidator, ValidationOutcome};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// Overall deadline of one import call
pub const DEFAULT_IMPORT_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_ACTOR: &str = "csv_importer";

// ============================================================================
// RESULT TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportedRow {
    pub row_number: usize,
    pub natural_key: String,
    pub id: RecordId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// Rule violations, in field declaration order
    Validation(Vec<FieldError>),
    /// Per-row store failure
    Store(StoreError),
    /// Skipped after the store became unusable or the deadline passed
    NotAttempted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedRow {
    pub row_number: usize,
    /// Unknown for rows that failed validation
    pub natural_key: Option<String>,
    pub reason: FailureReason,
}

impl FailedRow {
    /// Single report line for the row
    pub fn message(&self) -> String {
        match &self.reason {
            FailureReason::Validation(errors) => join_messages(errors),
            FailureReason::Store(error) => error.to_string(),
            FailureReason::NotAttempted => "not attempted".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DuplicateReason {
    /// Key already in the store; the id is absent when the lookup failed
    AlreadyExists { existing_id: Option<RecordId> },
    /// Key used by an earlier row of the same batch
    RepeatedInBatch { first_row: usize },
}

impl DuplicateReason {
    pub fn as_str(&self) -> &'static str {
        "already exists"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateRow {
    pub row_number: usize,
    pub natural_key: String,
    pub reason: DuplicateReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImportAbort {
    StoreUnavailable { row_number: usize, error: StoreError },
    TimedOut { elapsed: Duration },
}

/// ImportResult - every data row lands in exactly one of the three lists
///
/// Each list keeps input row order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportResult {
    pub kind: EntityKind,
    pub successful: Vec<ImportedRow>,
    pub failed: Vec<FailedRow>,
    pub duplicates: Vec<DuplicateRow>,
    pub abort: Option<ImportAbort>,
}

impl ImportResult {
    pub fn new(kind: EntityKind) -> Self {
        ImportResult {
            kind,
            successful: Vec::new(),
            failed: Vec::new(),
            duplicates: Vec::new(),
            abort: None,
        }
    }

    pub fn total_rows(&self) -> usize {
        self.successful.len() + self.failed.len() + self.duplicates.len()
    }

    pub fn summary(&self) -> ImportSummary {
        let validation_failures = self
            .failed
            .iter()
            .filter(|f| matches!(f.reason, FailureReason::Validation(_)))
            .count();

        let outcome = match &self.abort {
            Some(ImportAbort::StoreUnavailable { .. }) => ImportOutcome::StoreUnavailable,
            Some(ImportAbort::TimedOut { .. }) => ImportOutcome::TimedOut,
            None if self.successful.len() == self.total_rows() => ImportOutcome::AllImported,
            None if !self.successful.is_empty() => ImportOutcome::Partial,
            None if validation_failures == self.total_rows() => ImportOutcome::AllInvalid,
            None if self.failed.is_empty() => ImportOutcome::NothingNew,
            None => ImportOutcome::Partial,
        };

        ImportSummary {
            kind: self.kind,
            total_rows: self.total_rows(),
            successful: self.successful.len(),
            failed: self.failed.len(),
            duplicates: self.duplicates.len(),
            outcome,
        }
    }
}

/// Call-level classification for the report header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportOutcome {
    AllImported,
    /// Some rows need attention
    Partial,
    /// Every row failed validation
    AllInvalid,
    /// Nothing failed, but every row was a duplicate
    NothingNew,
    StoreUnavailable,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub kind: EntityKind,
    pub total_rows: usize,
    pub successful: usize,
    pub failed: usize,
    pub duplicates: usize,
    pub outcome: ImportOutcome,
}

// ============================================================================
// BULK IMPORTER
// ============================================================================

pub struct BulkImporter<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    timeout: Duration,
    parser: CsvParser,
    validator: SchemaValidator<'a>,
}

impl<'a, S: RecordStore + ?Sized> BulkImporter<'a, S> {
    pub fn new(store: &'a S, timeout: Duration) -> Self {
        BulkImporter {
            store,
            timeout,
            parser: CsvParser::new(),
            validator: SchemaValidator::with_registry(FieldRegistry::global()),
        }
    }

    /// Builder: validate against custom rule tables
    pub fn with_registry(mut self, registry: &'a FieldRegistry) -> Self {
        self.validator = SchemaValidator::with_registry(registry);
        self
    }

    /// Builder: read a different delimiter
    pub fn with_parser(mut self, parser: CsvParser) -> Self {
        self.parser = parser;
        self
    }

    /// Import one CSV text of a kind
    ///
    /// `existing_keys` are natural keys already known to be stored; they are
    /// compared after key normalization. The store's unique constraint stays
    /// the source of truth, so a stale or empty set is still correct.
    pub fn bulk_import(
        &self,
        kind: EntityKind,
        text: &str,
        existing_keys: &HashSet<String>,
        actor: &str,
    ) -> Result<ImportResult, ImportError> {
        if !self.parser.has_header(text) {
            return Err(ParseError::MissingHeader.into());
        }

        let rows = self.parser.parse(text);
        if rows.is_empty() {
            return Err(ParseError::NoDataRows.into());
        }

        log::info!("Importing {} {} rows as {}", rows.len(), kind, actor);

        let mut batch = Batch {
            store: self.store,
            kind,
            actor,
            timeout: self.timeout,
            started: Instant::now(),
            existing: existing_keys.iter().map(|k| compose_key(&[k])).collect(),
            seen: HashMap::new(),
            result: ImportResult::new(kind),
        };

        for outcome in self.validator.validate(kind, &rows) {
            batch.classify(outcome);
        }

        let result = batch.result;
        let summary = result.summary();
        log::info!(
            "Import of {} finished: {} imported, {} failed, {} duplicates ({:?})",
            kind,
            summary.successful,
            summary.failed,
            summary.duplicates,
            summary.outcome
        );

        Ok(result)
    }
}

/// Import with the default deadline
pub fn bulk_import<S: RecordStore + ?Sized>(
    store: &S,
    kind: EntityKind,
    text: &str,
    existing_keys: &HashSet<String>,
    actor: &str,
) -> Result<ImportResult, ImportError> {
    BulkImporter::new(store, DEFAULT_IMPORT_TIMEOUT).bulk_import(kind, text, existing_keys, actor)
}

// ============================================================================
// BATCH STATE
// ============================================================================

/// Per-call state while rows are classified in order
struct Batch<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    kind: EntityKind,
    actor: &'a str,
    timeout: Duration,
    started: Instant,
    existing: HashSet<String>,
    /// Natural key → first row that imported it or found it stored
    seen: HashMap<String, usize>,
    result: ImportResult,
}

impl<'a, S: RecordStore + ?Sized> Batch<'a, S> {
    fn classify(&mut self, outcome: ValidationOutcome) {
        let (row_number, record) = match outcome {
            ValidationOutcome::Invalid { row_number, errors } => {
                log::debug!("Row {} invalid: {}", row_number, join_messages(&errors));
                self.result.failed.push(FailedRow {
                    row_number,
                    natural_key: None,
                    reason: FailureReason::Validation(errors),
                });
                return;
            }
            ValidationOutcome::Valid { row_number, record } => (row_number, record),
        };

        let key = record.natural_key();

        if self.result.abort.is_some() {
            self.not_attempted(row_number, key);
            return;
        }

        if let Some(&first_row) = self.seen.get(&key) {
            log::debug!("Row {} repeats key '{}' of row {}", row_number, key, first_row);
            self.duplicate(row_number, key, DuplicateReason::RepeatedInBatch { first_row });
            return;
        }

        if self.existing.contains(&key) {
            if self.deadline_passed() {
                self.not_attempted(row_number, key);
                return;
            }
            let existing_id = self.lookup(row_number, &key);
            self.seen.insert(key.clone(), row_number);
            self.duplicate(row_number, key, DuplicateReason::AlreadyExists { existing_id });
            return;
        }

        if self.deadline_passed() {
            self.not_attempted(row_number, key);
            return;
        }

        match self.store.insert(self.kind, &record, self.actor) {
            Ok(id) => {
                log::debug!("Row {} imported as {}", row_number, id);
                self.seen.insert(key.clone(), row_number);
                self.result.successful.push(ImportedRow {
                    row_number,
                    natural_key: key,
                    id,
                });
            }
            Err(InsertError::DuplicateKey { .. }) => {
                let existing_id = if self.deadline_passed() {
                    None
                } else {
                    self.lookup(row_number, &key)
                };
                self.seen.insert(key.clone(), row_number);
                self.duplicate(row_number, key, DuplicateReason::AlreadyExists { existing_id });
            }
            Err(InsertError::Store(error)) => {
                self.store_failure(row_number, error.clone());
                self.result.failed.push(FailedRow {
                    row_number,
                    natural_key: Some(key),
                    reason: FailureReason::Store(error),
                });
            }
        }
    }

    /// Id of the stored record holding `key`, `None` when the lookup fails
    fn lookup(&mut self, row_number: usize, key: &str) -> Option<RecordId> {
        match self.store.find_by_natural_key(self.kind, key) {
            Ok(id) => id,
            Err(error) => {
                self.store_failure(row_number, error);
                None
            }
        }
    }

    fn store_failure(&mut self, row_number: usize, error: StoreError) {
        if error.is_fatal() {
            log::error!("Store unusable at row {}, stopping store work: {}", row_number, error);
            self.result.abort = Some(ImportAbort::StoreUnavailable { row_number, error });
        } else {
            log::warn!("Store failure on row {}: {}", row_number, error);
        }
    }

    /// Checked before every store call; records the abort once
    fn deadline_passed(&mut self) -> bool {
        let elapsed = self.started.elapsed();
        if elapsed < self.timeout {
            return false;
        }
        if self.result.abort.is_none() {
            log::warn!(
                "Import of {} timed out after {:?}, remaining rows not attempted",
                self.kind,
                elapsed
            );
            self.result.abort = Some(ImportAbort::TimedOut { elapsed });
        }
        true
    }

    fn duplicate(&mut self, row_number: usize, natural_key: String, reason: DuplicateReason) {
        self.result.duplicates.push(DuplicateRow {
            row_number,
            natural_key,
            reason,
        });
    }

    fn not_attempted(&mut self, row_number: usize, natural_key: String) {
        self.result.failed.push(FailedRow {
            row_number,
            natural_key: Some(natural_key),
            reason: FailureReason::NotAttempted,
        });
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::entities::NormalizedRecord;
    use crate::error::StoreErrorKind;
    use crate::risk::RiskLevel;
    use std::cell::Cell;

    const WARD_HEADER: &str = "ward_name,area_km2,population_density,coordinates";

    fn create_test_csv(rows: &[&str]) -> String {
        let mut text = WARD_HEADER.to_string();
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        text
    }

    fn run(store: &SqliteStore, text: &str) -> ImportResult {
        bulk_import(store, EntityKind::Ward, text, &HashSet::new(), "tester").unwrap()
    }

    fn row_numbers<T>(rows: &[T], number: impl Fn(&T) -> usize) -> Vec<usize> {
        rows.iter().map(number).collect()
    }

    /// Store whose inserts start failing after `ok_inserts` successes
    struct FailingStore {
        inner: SqliteStore,
        ok_inserts: usize,
        inserts: Cell<usize>,
        kind: StoreErrorKind,
    }

    impl FailingStore {
        fn new(ok_inserts: usize, kind: StoreErrorKind) -> Self {
            FailingStore {
                inner: SqliteStore::open_in_memory().unwrap(),
                ok_inserts,
                inserts: Cell::new(0),
                kind,
            }
        }
    }

    impl RecordStore for FailingStore {
        fn find_by_natural_key(
            &self,
            kind: EntityKind,
            key: &str,
        ) -> Result<Option<RecordId>, StoreError> {
            self.inner.find_by_natural_key(kind, key)
        }

        fn insert(
            &self,
            kind: EntityKind,
            record: &NormalizedRecord,
            actor: &str,
        ) -> Result<RecordId, InsertError> {
            let attempt = self.inserts.get();
            self.inserts.set(attempt + 1);
            if attempt >= self.ok_inserts {
                return Err(StoreError::new(self.kind, "connection reset").into());
            }
            self.inner.insert(kind, record, actor)
        }
    }

    #[test]
    fn test_scenario_duplicate_and_missing_name() {
        let store = SqliteStore::open_in_memory().unwrap();
        let text = create_test_csv(&[
            "Ward A,5.0,9000,\"10.77,106.70\"",
            "Ward A,5.0,9000,\"10.77,106.70\"",
            ",3.0,4000,\"10.80,106.71\"",
        ]);

        let result = run(&store, &text);

        assert_eq!(result.successful.len(), 1);
        assert_eq!(result.successful[0].row_number, 2);
        assert_eq!(result.successful[0].natural_key, "ward a");

        assert_eq!(result.duplicates.len(), 1);
        assert_eq!(result.duplicates[0].row_number, 3);
        assert_eq!(
            result.duplicates[0].reason,
            DuplicateReason::RepeatedInBatch { first_row: 2 }
        );
        assert_eq!(result.duplicates[0].reason.as_str(), "already exists");

        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].row_number, 4);
        assert_eq!(result.failed[0].message(), "ward_name: is required");

        assert_eq!(store.count(EntityKind::Ward).unwrap(), 1);
        assert_eq!(result.summary().outcome, ImportOutcome::Partial);
    }

    #[test]
    fn test_unquoted_coordinates_fail_validation() {
        let store = SqliteStore::open_in_memory().unwrap();
        let text = create_test_csv(&["Ward A,5.0,9000,10.77,106.70"]);

        let result = run(&store, &text);

        assert_eq!(result.failed.len(), 1);
        assert!(result.failed[0].message().starts_with("coordinates:"));
        assert_eq!(result.summary().outcome, ImportOutcome::AllInvalid);
    }

    #[test]
    fn test_second_import_moves_rows_to_duplicates() {
        let store = SqliteStore::open_in_memory().unwrap();
        let text = create_test_csv(&[
            "Ward 1,1.0,1000,\"10.1,106.1\"",
            "Ward 2,2.0,2000,\"10.2,106.2\"",
            "Ward 3,-3.0,3000,\"10.3,106.3\"",
        ]);

        let first = run(&store, &text);
        let second = run(&store, &text);

        println!("First: {:?}\nSecond: {:?}", first.summary(), second.summary());

        assert_eq!(first.successful.len(), 2);
        assert!(second.successful.is_empty());
        assert_eq!(second.duplicates.len(), first.successful.len());
        assert_eq!(store.count(EntityKind::Ward).unwrap(), 2);

        for (dup, ok) in second.duplicates.iter().zip(&first.successful) {
            assert_eq!(dup.row_number, ok.row_number);
            assert_eq!(
                dup.reason,
                DuplicateReason::AlreadyExists { existing_id: Some(ok.id.clone()) }
            );
        }
        assert_eq!(second.summary().outcome, ImportOutcome::Partial);
    }

    #[test]
    fn test_existing_keys_skip_the_insert() {
        let store = SqliteStore::open_in_memory().unwrap();
        let text = create_test_csv(&["Ward 1,1.0,1000,\"10.1,106.1\""]);
        let first = run(&store, &text);

        let existing = store.natural_keys(EntityKind::Ward).unwrap();
        let store = FailingStore {
            inner: store,
            ok_inserts: 0,
            inserts: Cell::new(0),
            kind: StoreErrorKind::Unavailable,
        };

        let result = bulk_import(&store, EntityKind::Ward, &text, &existing, "tester").unwrap();

        assert_eq!(store.inserts.get(), 0, "pre-fetched key must not reach insert");
        assert_eq!(
            result.duplicates[0].reason,
            DuplicateReason::AlreadyExists { existing_id: Some(first.successful[0].id.clone()) }
        );
        assert_eq!(result.summary().outcome, ImportOutcome::NothingNew);
    }

    #[test]
    fn test_existing_keys_are_normalized() {
        let store = SqliteStore::open_in_memory().unwrap();
        let existing: HashSet<String> = ["  WARD  1 ".to_string()].into_iter().collect();
        let text = create_test_csv(&["Ward 1,1.0,1000,\"10.1,106.1\""]);

        let result = bulk_import(&store, EntityKind::Ward, &text, &existing, "tester").unwrap();

        assert!(result.successful.is_empty());
        assert_eq!(
            result.duplicates[0].reason,
            DuplicateReason::AlreadyExists { existing_id: None }
        );
        assert_eq!(store.count(EntityKind::Ward).unwrap(), 0);
    }

    #[test]
    fn test_partition_is_complete_and_ordered() {
        let store = SqliteStore::open_in_memory().unwrap();
        let text = create_test_csv(&[
            "Ward 1,1.0,1000,\"10.1,106.1\"",
            "Ward 2,abc,2000,\"10.2,106.2\"",
            "ward 1,1.0,1000,\"10.1,106.1\"",
            "Ward 4,4.0,4000,\"10.4,106.4\"",
            ",,,",
            "Ward 4,4.0,4000,\"10.4,106.4\"",
            "Ward 7,7.0,7000,\"10.7,106.7\"",
        ]);

        let result = run(&store, &text);

        assert_eq!(result.total_rows(), 7);
        assert_eq!(row_numbers(&result.successful, |r| r.row_number), vec![2, 5, 8]);
        assert_eq!(row_numbers(&result.failed, |r| r.row_number), vec![3, 6]);
        assert_eq!(row_numbers(&result.duplicates, |r| r.row_number), vec![4, 7]);
        assert_eq!(
            result.failed[1].message(),
            "ward_name: is required; area_km2: is required; population_density: is required; coordinates: is required"
        );
    }

    #[test]
    fn test_empty_input_is_a_parse_error() {
        let store = SqliteStore::open_in_memory().unwrap();

        let err = bulk_import(&store, EntityKind::Ward, "\n  \n", &HashSet::new(), "tester");
        assert_eq!(err.unwrap_err(), ImportError::Parse(ParseError::MissingHeader));

        let err = bulk_import(&store, EntityKind::Ward, WARD_HEADER, &HashSet::new(), "tester");
        assert_eq!(err.unwrap_err(), ImportError::Parse(ParseError::NoDataRows));
    }

    #[test]
    fn test_unavailable_store_stops_store_work() {
        let store = FailingStore::new(1, StoreErrorKind::Unavailable);
        let text = create_test_csv(&[
            "Ward 1,1.0,1000,\"10.1,106.1\"",
            "Ward 2,2.0,2000,\"10.2,106.2\"",
            "Ward 3,3.0,3000,\"10.3,106.3\"",
            "Ward 4,-4.0,4000,\"10.4,106.4\"",
        ]);

        let result = bulk_import(&store, EntityKind::Ward, &text, &HashSet::new(), "tester").unwrap();

        assert_eq!(store.inserts.get(), 2, "no insert after the store failed");
        assert_eq!(row_numbers(&result.successful, |r| r.row_number), vec![2]);
        assert_eq!(result.total_rows(), 4);

        let reasons: Vec<&FailureReason> = result.failed.iter().map(|f| &f.reason).collect();
        assert!(matches!(reasons[0], FailureReason::Store(e) if e.is_fatal()));
        assert_eq!(reasons[1], &FailureReason::NotAttempted);
        assert!(matches!(reasons[2], FailureReason::Validation(_)));
        assert_eq!(result.failed[1].message(), "not attempted");

        match &result.abort {
            Some(ImportAbort::StoreUnavailable { row_number, .. }) => assert_eq!(*row_number, 3),
            other => panic!("expected store abort, got {:?}", other),
        }
        assert_eq!(result.summary().outcome, ImportOutcome::StoreUnavailable);
    }

    #[test]
    fn test_non_fatal_store_error_fails_only_that_row() {
        let store = FailingStore::new(1, StoreErrorKind::Constraint);
        let text = create_test_csv(&[
            "Ward 1,1.0,1000,\"10.1,106.1\"",
            "Ward 2,2.0,2000,\"10.2,106.2\"",
            "Ward 3,3.0,3000,\"10.3,106.3\"",
        ]);

        let result = bulk_import(&store, EntityKind::Ward, &text, &HashSet::new(), "tester").unwrap();

        assert_eq!(store.inserts.get(), 3);
        assert!(result.abort.is_none());
        assert_eq!(row_numbers(&result.failed, |r| r.row_number), vec![3, 4]);
        assert_eq!(result.failed[0].natural_key.as_deref(), Some("ward 2"));
        assert_eq!(
            result.failed[0].message(),
            "store constraint error: connection reset"
        );
    }

    #[test]
    fn test_timeout_reports_rows_as_not_attempted() {
        let store = SqliteStore::open_in_memory().unwrap();
        let text = create_test_csv(&[
            "Ward 1,1.0,1000,\"10.1,106.1\"",
            "Ward 2,,2000,\"10.2,106.2\"",
            "Ward 3,3.0,3000,\"10.3,106.3\"",
        ]);

        let result = BulkImporter::new(&store, Duration::ZERO)
            .bulk_import(EntityKind::Ward, &text, &HashSet::new(), "tester")
            .unwrap();

        assert!(result.successful.is_empty());
        assert_eq!(result.total_rows(), 3);
        assert_eq!(result.failed[0].reason, FailureReason::NotAttempted);
        assert!(matches!(result.failed[1].reason, FailureReason::Validation(_)));
        assert_eq!(result.failed[2].reason, FailureReason::NotAttempted);
        assert!(matches!(result.abort, Some(ImportAbort::TimedOut { .. })));
        assert_eq!(result.summary().outcome, ImportOutcome::TimedOut);
        assert_eq!(store.count(EntityKind::Ward).unwrap(), 0);
    }

    #[test]
    fn test_weather_rows_keyed_by_ward_and_date() {
        let store = SqliteStore::open_in_memory().unwrap();
        let text = "ward_name,observed_on,rainfall_mm,temperature_c,humidity_pct\n\
                    Ward 1,2024-09-15,10,30,80\n\
                    Ward 1,15/09/2024,12,31,82\n\
                    Ward 1,2024-09-16,0,29,75";

        let result =
            bulk_import(&store, EntityKind::WeatherObservation, text, &HashSet::new(), "tester").unwrap();

        assert_eq!(row_numbers(&result.successful, |r| r.row_number), vec![2, 4]);
        assert_eq!(result.duplicates[0].natural_key, "ward 1|2024-09-15");
    }

    #[test]
    fn test_trailing_space_name_is_trimmed_and_imported() {
        let store = SqliteStore::open_in_memory().unwrap();
        let text = create_test_csv(&[
            "Ward A,5.0,9000,\"10.77,106.70\"",
            "Ward A,5.0,9000,\"10.77,106.70\"",
            "\"Ward \",3.0,4000,\"10.80,106.71\"",
        ]);

        let result = run(&store, &text);

        assert_eq!(row_numbers(&result.successful, |r| r.row_number), vec![2, 4]);
        assert_eq!(result.successful[1].natural_key, "ward");
        assert_eq!(result.duplicates.len(), 1);
        assert!(result.failed.is_empty());

        let wards = store.wards().unwrap();
        assert_eq!(wards[1].ward_name, "Ward");
    }

    #[test]
    fn test_drainage_assets_keyed_by_asset_code() {
        let store = SqliteStore::open_in_memory().unwrap();
        let text = "asset_code,ward_name,asset_type,length_m,status\n\
                    DR-001,Ward 1,culvert,120,in_service\n\
                    dr-001 ,Ward 2,culvert,80,in_service\n\
                    DR-002,Ward 1,culvert,60,Đang bảo trì";

        let result =
            bulk_import(&store, EntityKind::DrainageAsset, text, &HashSet::new(), "tester").unwrap();

        assert_eq!(row_numbers(&result.successful, |r| r.row_number), vec![2, 4]);
        assert_eq!(result.successful[0].natural_key, "dr-001");
        assert_eq!(result.successful[1].natural_key, "dr-002");
        assert_eq!(result.duplicates[0].row_number, 3);
        assert_eq!(
            result.duplicates[0].reason,
            DuplicateReason::RepeatedInBatch { first_row: 2 }
        );
        assert_eq!(store.count(EntityKind::DrainageAsset).unwrap(), 2);
    }

    #[test]
    fn test_structures_keyed_by_structure_name() {
        let store = SqliteStore::open_in_memory().unwrap();
        let text = "structure_name,ward_name,structure_type,length_m,width_m,status,coordinates\n\
                    Cau Ong Lanh,Ward 1,bridge,150,12,in_service,\"10.76,106.69\"\n\
                    CAU  ONG LANH,Ward 1,bridge,150,12,in_service,\"10.76,106.69\"\n\
                    Cau Kieu,Ward 1,bridge,90,10,in_service,\"10.79,106.68\"";

        let result = bulk_import(
            &store,
            EntityKind::RoadBridgeStructure,
            text,
            &HashSet::new(),
            "tester",
        )
        .unwrap();

        assert_eq!(row_numbers(&result.successful, |r| r.row_number), vec![2, 4]);
        assert_eq!(result.successful[0].natural_key, "cau ong lanh");
        assert_eq!(result.duplicates[0].row_number, 3);
        assert_eq!(result.duplicates[0].natural_key, "cau ong lanh");
    }

    #[test]
    fn test_risk_index_rows_keyed_by_ward_and_date() {
        let store = SqliteStore::open_in_memory().unwrap();
        let text = "ward_name,assessed_on,exposure,susceptibility,resilience\n\
                    Ward 1,2024-10-01,2,5,2\n\
                    ward 1,01/10/2024,1,1,1\n\
                    Ward 1,2024-10-02,1,0.5,";

        let result =
            bulk_import(&store, EntityKind::RiskIndexRecord, text, &HashSet::new(), "tester").unwrap();

        assert_eq!(row_numbers(&result.successful, |r| r.row_number), vec![2, 4]);
        assert_eq!(result.successful[0].natural_key, "ward 1|2024-10-01");
        assert_eq!(result.duplicates[0].row_number, 3);
        assert_eq!(result.duplicates[0].natural_key, "ward 1|2024-10-01");

        let stored = store.records(EntityKind::RiskIndexRecord).unwrap();
        let scores: Vec<_> = stored
            .iter()
            .filter_map(|s| match &s.record {
                NormalizedRecord::RiskIndexRecord(r) => Some(r.score()),
                _ => None,
            })
            .collect();
        assert_eq!(scores[0].index, 3.5);
        assert_eq!(scores[0].level, RiskLevel::High);
        assert_eq!(scores[1].index, 1.5);
        assert_eq!(scores[1].level, RiskLevel::Low);
    }

    #[test]
    fn test_all_imported_summary_and_audit_actor() {
        let store = SqliteStore::open_in_memory().unwrap();
        let text = create_test_csv(&["Ward 1,1.0,1000,\"10.1,106.1\""]);

        let result =
            bulk_import(&store, EntityKind::Ward, &text, &HashSet::new(), "planner@hcmc").unwrap();

        let summary = result.summary();
        assert_eq!(summary.outcome, ImportOutcome::AllImported);
        assert_eq!(summary.total_rows, 1);

        let events = store
            .events_for(EntityKind::Ward, &result.successful[0].id)
            .unwrap();
        assert_eq!(events[0].actor, "planner@hcmc");
    }

    #[test]
    fn test_result_serializes_for_presentation() {
        let store = SqliteStore::open_in_memory().unwrap();
        let text = create_test_csv(&[
            "Ward 1,1.0,1000,\"10.1,106.1\"",
            "Ward 1,1.0,1000,\"10.1,106.1\"",
            ",1.0,1000,\"10.1,106.1\"",
        ]);

        let json = serde_json::to_value(run(&store, &text)).unwrap();

        assert_eq!(json["kind"], "ward");
        assert_eq!(json["successful"][0]["row_number"], 2);
        assert_eq!(json["duplicates"][0]["reason"]["type"], "repeated_in_batch");
        assert_eq!(json["failed"][0]["reason"]["type"], "validation");
        assert_eq!(json["failed"][0]["reason"]["detail"][0]["field"], "ward_name");
        assert!(json["abort"].is_null());
    }
}
