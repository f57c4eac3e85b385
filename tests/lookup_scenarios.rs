use std::io::Cursor;
use std::sync::Arc;

use secref::config::IngestConfig;
use secref::{
    Getter, IndexError, JsonLinesSource, MemoryIndex, PersistentIndex, SecurityRecord,
    run_ingestion,
};

const FEED: &str = r#"{"cusip":"037833100","isin":"US0378331005","ticker":"AAPL","entity_id":"HWUPKR0MPOU8FGXBT394","issue_type_code":"EQ"}
{"cusip":"594918104","isin":"US5949181045","sedol":"2046251","ticker":"MSFT","issue_type_code":"EQ"}
{"cusip":"912828ZQ6","issue_type_code":"UL","coupon_rate":"0.25","maturity_date":"2025-05-15"}
"#;

fn ingest_config() -> IngestConfig {
    IngestConfig {
        workers: 3,
        batch_size: 2,
        queue_capacity: 8,
    }
}

fn load_persistent(dir: &tempfile::TempDir) -> Arc<PersistentIndex> {
    let index = Arc::new(PersistentIndex::open(dir.path().join("secref.redb")).unwrap());
    let source = JsonLinesSource::from_reader(Cursor::new(FEED));
    let report = run_ingestion(index.clone(), source, &ingest_config()).unwrap();
    assert_eq!(report.stats.records_stored, 3);
    index
}

#[test]
fn test_end_to_end_lookup_by_every_kind() {
    let dir = tempfile::tempdir().unwrap();
    let index = load_persistent(&dir);

    let found = index
        .get(&["US0378331005", "2046251", "000000000", "912828ZQ6"])
        .unwrap();

    assert_eq!(found.len(), 4);
    assert_eq!(found[0].cusip(), "037833100");
    assert_eq!(found[0].ticker(), "AAPL");
    assert_eq!(found[0].legal_entity_id(), "HWUPKR0MPOU8FGXBT394");
    assert_eq!(found[1].cusip(), "594918104");
    assert!(found[2].is_empty());
    assert_eq!(
        serde_json::to_string(&found[2]).unwrap(),
        "{}",
        "a miss serializes as an empty object"
    );
    assert_eq!(found[3].description(), "Treasury/Long-Term  0.25% 2025/05/15");
}

#[test]
fn test_engines_answer_identically() {
    let dir = tempfile::tempdir().unwrap();
    let persistent = load_persistent(&dir);
    let memory = MemoryIndex::from_persistent(&persistent).unwrap();

    let keys = [
        "037833100",
        "US5949181045",
        "2046251",
        "XX0000000000",
        "",
        "037833100",
        "912828ZQ6",
    ];
    assert_eq!(persistent.get(&keys).unwrap(), memory.get(&keys).unwrap());
}

#[test]
fn test_length_dispatch_never_crosses_key_spaces() {
    // A nine character key is only ever a CUSIP, even when the same string was
    // stored as another record's ISIN or SEDOL field.
    let records = vec![
        SecurityRecord::new("111111111", "ABCDEFGHI", "", "", "", "EQ", "", ""),
        SecurityRecord::new("222222222", "", "JKLMNOPQR", "", "", "EQ", "", ""),
    ];

    let dir = tempfile::tempdir().unwrap();
    let persistent = Arc::new(PersistentIndex::open(dir.path().join("d.redb")).unwrap());
    run_ingestion(persistent.clone(), records.clone(), &ingest_config()).unwrap();
    let memory = MemoryIndex::from_records(records).unwrap();

    let engines: [&dyn Getter; 2] = [&*persistent, &memory];
    for engine in engines {
        let found = engine.get(&["ABCDEFGHI", "JKLMNOPQR", "111111111"]).unwrap();
        assert!(found[0].is_empty());
        assert!(found[1].is_empty());
        assert_eq!(found[2].cusip(), "111111111");
    }
}

#[test]
fn test_memory_build_rejects_unsorted_input() {
    let records = vec![
        SecurityRecord::new("594918104", "", "", "", "", "EQ", "", ""),
        SecurityRecord::new("037833100", "", "", "", "", "EQ", "", ""),
    ];
    match MemoryIndex::from_records(records) {
        Err(IndexError::OutOfOrder { previous, key }) => {
            assert_eq!(previous, "594918104");
            assert_eq!(key, "037833100");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("unsorted input must be rejected"),
    }
}

#[test]
fn test_reingest_overwrites_by_cusip() {
    let dir = tempfile::tempdir().unwrap();
    let index = load_persistent(&dir);

    let update = vec![SecurityRecord::new(
        "037833100",
        "US0378331005",
        "",
        "AAPL",
        "",
        "XX",
        "",
        "",
    )];
    run_ingestion(index.clone(), update, &ingest_config()).unwrap();

    let found = index.get(&["037833100"]).unwrap();
    assert_eq!(found[0].description(), "Description not available");
    assert_eq!(index.stats().unwrap().details, 3);
}
