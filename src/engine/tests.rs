//! Tests for engine module

use super::*;
use crate::client::{FieldDescriptor, ObjectSchema, QueryPage};
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

// ============================================================================
// Fake API
// ============================================================================

enum BulkBehavior {
    Pages(Vec<Vec<Record>>),
    Unsupported,
    Fail,
    FailAfterFirst(Vec<Record>),
}

struct FakeApi {
    schema: Option<ObjectSchema>,
    bulk: BulkBehavior,
    standard: Vec<QueryPage>,
    queries: Mutex<Vec<String>>,
    describes: AtomicUsize,
    standard_calls: AtomicUsize,
}

impl FakeApi {
    fn new(bulk: BulkBehavior) -> Self {
        Self {
            schema: Some(ObjectSchema {
                name: "Account".to_string(),
                fields: vec![
                    FieldDescriptor::new("Id", "id"),
                    FieldDescriptor::new("Name", "string"),
                    FieldDescriptor::new("BillingAddress", "address"),
                    FieldDescriptor::new("BillingCity", "string").within("BillingAddress"),
                    FieldDescriptor::new("LastModifiedDate", "datetime"),
                ],
            }),
            bulk,
            standard: Vec::new(),
            queries: Mutex::new(Vec::new()),
            describes: AtomicUsize::new(0),
            standard_calls: AtomicUsize::new(0),
        }
    }

    fn with_standard(mut self, pages: Vec<QueryPage>) -> Self {
        self.standard = pages;
        self
    }

    fn without_object(mut self) -> Self {
        self.schema = None;
        self
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    fn page_at(&self, index: usize) -> Result<QueryPage> {
        self.standard_calls.fetch_add(1, Ordering::SeqCst);
        self.standard
            .get(index)
            .cloned()
            .ok_or_else(|| Error::remote("query", "no such page"))
    }
}

#[async_trait]
impl SalesforceApi for FakeApi {
    async fn describe_object(&self, object: &str) -> Result<ObjectSchema> {
        self.describes.fetch_add(1, Ordering::SeqCst);
        self.schema.clone().ok_or_else(|| Error::ObjectNotFound {
            object: object.to_string(),
        })
    }

    fn bulk_query<'a>(&'a self, _object: &str, soql: &str) -> PageStream<'a> {
        self.queries.lock().unwrap().push(soql.to_string());
        let items: Vec<Result<Vec<Record>>> = match &self.bulk {
            BulkBehavior::Pages(pages) => pages.iter().cloned().map(Ok).collect(),
            BulkBehavior::Unsupported => vec![Err(Error::BulkUnsupported {
                message: "FeatureNotEnabled: Async API not enabled".to_string(),
            })],
            BulkBehavior::Fail => vec![Err(Error::remote("bulk query", "HTTP 500"))],
            BulkBehavior::FailAfterFirst(first) => vec![
                Ok(first.clone()),
                Err(Error::remote("bulk query", "HTTP 500")),
            ],
        };
        stream::iter(items).boxed()
    }

    async fn query(&self, soql: &str) -> Result<QueryPage> {
        self.queries.lock().unwrap().push(soql.to_string());
        self.page_at(0)
    }

    async fn query_more(&self, next_records_url: &str) -> Result<QueryPage> {
        let index = next_records_url
            .rsplit('-')
            .next()
            .and_then(|n| n.parse().ok())
            .unwrap_or(usize::MAX);
        self.page_at(index)
    }
}

// ============================================================================
// Fixtures
// ============================================================================

const JAN_1_2024_MS: i64 = 1_704_067_200_000;

fn obj(value: serde_json::Value) -> Record {
    match value {
        serde_json::Value::Object(map) => map,
        _ => panic!("not an object"),
    }
}

/// Bulk records with `LastModifiedDate` one minute apart, starting after Jan 1
fn bulk_page(start: usize, count: usize) -> Vec<Record> {
    (start..start + count)
        .map(|i| {
            obj(json!({
                "attributes": {"type": "Account"},
                "Id": format!("001{i:05}"),
                "Name": format!("Account {i}"),
                "BillingCity": "Paris",
                "LastModifiedDate": JAN_1_2024_MS + (i as i64 + 1) * 60_000
            }))
        })
        .collect()
}

fn standard_page(start: usize, count: usize, next: Option<&str>) -> QueryPage {
    let records = (start..start + count)
        .map(|i| {
            let modified = format!("2024-01-02T{:02}:{:02}:00.000+0000", i / 60, i % 60);
            obj(json!({
                "attributes": {"type": "Account", "url": format!("/sobjects/Account/001{i:05}")},
                "Id": format!("001{i:05}"),
                "Name": format!("Account {i}"),
                "BillingCity": null,
                "LastModifiedDate": modified
            }))
        })
        .collect();
    QueryPage {
        done: next.is_none(),
        records,
        next_records_url: next.map(str::to_string),
        total_size: Some(100),
    }
}

fn merge_spec() -> StreamSpec {
    StreamSpec::merge("account", "Account", "LastModifiedDate")
}

fn assert_non_decreasing(records: &[Record], field: &str) {
    for pair in records.windows(2) {
        let (prev, next) = (pair[0][field].as_str(), pair[1][field].as_str());
        assert!(prev <= next, "{field} went backwards: {prev:?} then {next:?}");
    }
}

async fn drain(extraction: &mut Extraction<'_>) -> (Vec<Record>, Option<Error>) {
    let mut records = Vec::new();
    while let Some(item) = extraction.next().await {
        match item {
            Ok(record) => records.push(record),
            Err(e) => return (records, Some(e)),
        }
    }
    (records, None)
}

// ============================================================================
// Bulk Path
// ============================================================================

#[tokio::test]
async fn test_incremental_bulk_extraction() {
    let api = FakeApi::new(BulkBehavior::Pages(vec![
        bulk_page(0, 100),
        bulk_page(100, 100),
        bulk_page(200, 50),
    ]));
    let engine = ExtractionEngine::new(api);

    let mut extraction = engine.extract(&merge_spec(), Some("2024-01-01T00:00:00.000000Z"));
    let (records, err) = drain(&mut extraction).await;

    assert!(err.is_none());
    assert_eq!(records.len(), 250);
    assert_eq!(
        engine.api().queries(),
        vec![
            "SELECT Id, Name, BillingCity, LastModifiedDate FROM Account \
             WHERE LastModifiedDate > 2024-01-01T00:00:00.000000Z \
             ORDER BY LastModifiedDate ASC"
                .to_string()
        ]
    );

    let date = regex::Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{6}Z$").unwrap();
    for record in &records {
        assert!(!record.contains_key("attributes"));
        let value = record["LastModifiedDate"].as_str().unwrap();
        assert!(date.is_match(value), "unexpected datetime {value}");
    }

    assert_non_decreasing(&records, "LastModifiedDate");
    assert_eq!(records[0]["Id"], "00100000");
    assert_eq!(records[249]["Id"], "00100249");
    assert_eq!(records[0]["LastModifiedDate"], "2024-01-01T00:01:00.000000Z");

    assert_eq!(extraction.progress(), Progress::Completed);
    assert_eq!(extraction.stats().pages, 3);
    assert_eq!(extraction.stats().path, Some(QueryPath::Bulk));
    assert_eq!(extraction.records_emitted(), 250);
    assert_eq!(
        extraction.completed_cursor(),
        Some(format_canonical(
            &chrono::DateTime::from_timestamp_millis(JAN_1_2024_MS + 250 * 60_000).unwrap()
        ))
        .as_deref()
    );
}

#[tokio::test]
async fn test_full_extraction_ignores_last_value() {
    let api = FakeApi::new(BulkBehavior::Pages(vec![bulk_page(0, 3)]));
    let engine = ExtractionEngine::new(api);
    let spec = StreamSpec::replace("account", "Account");

    let mut extraction = engine.extract(&spec, Some("2024-01-01T00:00:00.000000Z"));
    let (records, err) = drain(&mut extraction).await;

    assert!(err.is_none());
    assert_eq!(records.len(), 3);
    assert_eq!(
        engine.api().queries(),
        vec!["SELECT Id, Name, BillingCity, LastModifiedDate FROM Account".to_string()]
    );
    assert_eq!(extraction.cursor_field(), None);
    assert_eq!(extraction.completed_cursor(), None);
}

#[tokio::test]
async fn test_result_cap_applied() {
    let api = FakeApi::new(BulkBehavior::Pages(vec![]));
    let engine = ExtractionEngine::new(api)
        .with_config(ExtractionConfig::new().with_result_cap(crate::types::ResultCap::Limit(10)));

    let mut extraction = engine.extract(&merge_spec(), None);
    let (records, err) = drain(&mut extraction).await;

    assert!(err.is_none());
    assert!(records.is_empty());
    assert!(engine.api().queries()[0].ends_with("FROM Account LIMIT 10"));
}

#[tokio::test]
async fn test_empty_result_keeps_previous_cursor() {
    let api = FakeApi::new(BulkBehavior::Pages(vec![]));
    let engine = ExtractionEngine::new(api);

    let mut extraction = engine.extract(&merge_spec(), Some("2024-03-01T00:00:00.000000Z"));
    let (records, _) = drain(&mut extraction).await;

    assert!(records.is_empty());
    assert_eq!(extraction.progress(), Progress::Completed);
    assert_eq!(
        extraction.completed_cursor(),
        Some("2024-03-01T00:00:00.000000Z")
    );
}

#[tokio::test]
async fn test_cursor_seed_is_canonicalized() {
    let mut page = bulk_page(0, 1);
    page[0].insert("LastModifiedDate".to_string(), json!(JAN_1_2024_MS + 500));
    let api = FakeApi::new(BulkBehavior::Pages(vec![page]));
    let engine = ExtractionEngine::new(api);

    let mut extraction = engine.extract(&merge_spec(), Some("2024-01-01T00:00:00Z"));
    let (records, err) = drain(&mut extraction).await;

    assert!(err.is_none());
    assert_eq!(records[0]["LastModifiedDate"], "2024-01-01T00:00:00.500000Z");
    assert_eq!(
        extraction.completed_cursor(),
        Some("2024-01-01T00:00:00.500000Z")
    );
}

#[tokio::test]
async fn test_non_canonical_seed_kept_canonical_when_empty() {
    let api = FakeApi::new(BulkBehavior::Pages(vec![]));
    let engine = ExtractionEngine::new(api);

    let mut extraction = engine.extract(&merge_spec(), Some("2024-03-01T00:00:00Z"));
    let (records, _) = drain(&mut extraction).await;

    assert!(records.is_empty());
    assert!(engine.api().queries()[0].contains("> 2024-03-01T00:00:00Z"));
    assert_eq!(
        extraction.completed_cursor(),
        Some("2024-03-01T00:00:00.000000Z")
    );
}

#[tokio::test]
async fn test_extraction_is_lazy() {
    let api = FakeApi::new(BulkBehavior::Pages(vec![bulk_page(0, 1)]));
    let engine = ExtractionEngine::new(api);

    let extraction = engine.extract(&merge_spec(), None);
    assert_eq!(engine.api().describes.load(Ordering::SeqCst), 0);
    drop(extraction);
    assert!(engine.api().queries().is_empty());
}

#[tokio::test]
async fn test_cursor_unavailable_before_drain() {
    let api = FakeApi::new(BulkBehavior::Pages(vec![bulk_page(0, 5)]));
    let engine = ExtractionEngine::new(api);

    let mut extraction = engine.extract(&merge_spec(), None);
    let first = extraction.next().await.unwrap().unwrap();
    assert_eq!(first["Id"], "00100000");
    assert_eq!(extraction.progress(), Progress::Running);
    assert_eq!(extraction.completed_cursor(), None);
}

// ============================================================================
// Fallback
// ============================================================================

#[tokio::test]
async fn test_fallback_to_standard_query() {
    let api = FakeApi::new(BulkBehavior::Unsupported).with_standard(vec![
        standard_page(0, 60, Some("/services/data/v59.0/query/01gXX-1")),
        standard_page(60, 40, None),
    ]);
    let engine = ExtractionEngine::new(api);

    let mut extraction = engine.extract(&merge_spec(), None);
    let (records, err) = drain(&mut extraction).await;

    assert!(err.is_none());
    assert_eq!(records.len(), 100);
    assert_eq!(engine.api().standard_calls.load(Ordering::SeqCst), 2);

    let queries = engine.api().queries();
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[0], queries[1]);

    assert_non_decreasing(&records, "LastModifiedDate");
    assert_eq!(records[0]["LastModifiedDate"], "2024-01-02T00:00:00.000000Z");
    assert_eq!(records[59]["LastModifiedDate"], "2024-01-02T00:59:00.000000Z");
    assert_eq!(records[60]["LastModifiedDate"], "2024-01-02T01:00:00.000000Z");
    assert_eq!(records[99]["Id"], "00100099");
    assert!(records.iter().all(|r| !r.contains_key("attributes")));
    assert_eq!(extraction.stats().path, Some(QueryPath::Standard));
    assert_eq!(extraction.stats().pages, 2);
    assert_eq!(
        extraction.completed_cursor(),
        Some("2024-01-02T01:39:00.000000Z")
    );
}

#[tokio::test]
async fn test_bulk_and_standard_records_identical() {
    let epoch = 1_705_314_600_000_i64;
    let bulk_record = obj(json!({
        "attributes": {"type": "Account"},
        "Id": "001A",
        "Name": "Acme",
        "BillingCity": "Paris",
        "LastModifiedDate": epoch
    }));
    let standard_record = obj(json!({
        "attributes": {"type": "Account", "url": "/sobjects/Account/001A"},
        "Id": "001A",
        "Name": "Acme",
        "BillingCity": "Paris",
        "LastModifiedDate": "2024-01-15T10:30:00.000+0000"
    }));

    let bulk_engine = ExtractionEngine::new(FakeApi::new(BulkBehavior::Pages(vec![vec![
        bulk_record,
    ]])));
    let standard_engine =
        ExtractionEngine::new(FakeApi::new(BulkBehavior::Unsupported).with_standard(vec![
            QueryPage {
                done: true,
                records: vec![standard_record],
                next_records_url: None,
                total_size: Some(1),
            },
        ]));

    let spec = merge_spec();
    let (from_bulk, _) = drain(&mut bulk_engine.extract(&spec, None)).await;
    let (from_standard, _) = drain(&mut standard_engine.extract(&spec, None)).await;

    assert_eq!(
        serde_json::to_string(&from_bulk).unwrap(),
        serde_json::to_string(&from_standard).unwrap()
    );
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_bulk_failure_does_not_fall_back() {
    let api = FakeApi::new(BulkBehavior::Fail).with_standard(vec![standard_page(0, 5, None)]);
    let engine = ExtractionEngine::new(api);

    let mut extraction = engine.extract(&merge_spec(), None);
    let (records, err) = drain(&mut extraction).await;

    assert!(records.is_empty());
    let err = err.unwrap();
    assert!(matches!(
        err,
        Error::StreamFailed { stage: Stage::Bulk, ref object, .. } if object == "Account"
    ));
    assert!(matches!(err.root(), Error::RemoteUnavailable { .. }));
    assert_eq!(engine.api().standard_calls.load(Ordering::SeqCst), 0);
    assert_eq!(extraction.progress(), Progress::Failed);
    assert_eq!(extraction.completed_cursor(), None);
    assert!(extraction.next().await.is_none());
}

#[tokio::test]
async fn test_failure_after_first_page() {
    let api = FakeApi::new(BulkBehavior::FailAfterFirst(bulk_page(0, 10)));
    let engine = ExtractionEngine::new(api);

    let mut extraction = engine.extract(&merge_spec(), None);
    let (records, err) = drain(&mut extraction).await;

    assert_eq!(records.len(), 10);
    assert!(matches!(
        err,
        Some(Error::StreamFailed { stage: Stage::Bulk, .. })
    ));
    assert_eq!(extraction.completed_cursor(), None);
}

#[tokio::test]
async fn test_unknown_object() {
    let api = FakeApi::new(BulkBehavior::Pages(vec![])).without_object();
    let engine = ExtractionEngine::new(api);

    let mut extraction = engine.extract(&StreamSpec::replace("nope", "Nope__c"), None);
    let (records, err) = drain(&mut extraction).await;

    assert!(records.is_empty());
    let err = err.unwrap();
    assert!(matches!(err, Error::StreamFailed { stage: Stage::Describe, .. }));
    assert!(matches!(err.root(), Error::ObjectNotFound { .. }));
    assert!(engine.api().queries().is_empty());
}

#[tokio::test]
async fn test_normalization_failure() {
    let mut bad = bulk_page(0, 1);
    bad[0].insert("LastModifiedDate".to_string(), json!("not a date"));
    let api = FakeApi::new(BulkBehavior::Pages(vec![bad]));
    let engine = ExtractionEngine::new(api);

    let mut extraction = engine.extract(&merge_spec(), None);
    let (records, err) = drain(&mut extraction).await;

    assert!(records.is_empty());
    let err = err.unwrap();
    assert!(matches!(err, Error::StreamFailed { stage: Stage::Normalize, .. }));
    assert!(matches!(err.root(), Error::Normalization { .. }));
}

#[tokio::test]
async fn test_standard_failure_mid_pagination() {
    let api = FakeApi::new(BulkBehavior::Unsupported).with_standard(vec![standard_page(
        0,
        20,
        Some("/services/data/v59.0/query/01gXX-7"),
    )]);
    let engine = ExtractionEngine::new(api);

    let mut extraction = engine.extract(&merge_spec(), None);
    let (records, err) = drain(&mut extraction).await;

    assert_eq!(records.len(), 20);
    assert!(matches!(
        err,
        Some(Error::StreamFailed { stage: Stage::Standard, .. })
    ));
}

#[tokio::test]
async fn test_standard_page_without_next_url_fails() {
    let mut truncated = standard_page(0, 1, None);
    truncated.done = false;
    let api = FakeApi::new(BulkBehavior::Unsupported).with_standard(vec![truncated]);
    let engine = ExtractionEngine::new(api);

    let mut extraction = engine.extract(&merge_spec(), None);
    let (records, err) = drain(&mut extraction).await;

    assert!(records.is_empty());
    let err = err.unwrap();
    assert!(matches!(err, Error::StreamFailed { stage: Stage::Standard, .. }));
    assert!(matches!(err.root(), Error::RemoteUnavailable { .. }));
    assert_eq!(extraction.progress(), Progress::Failed);
    assert_eq!(extraction.completed_cursor(), None);
}
