//! Dataset file loading tests

use sbws_common::dataset::{load_records, save_records};
use sbws_common::{DiarizedSegment, Error, Label, Record};
use tempfile::TempDir;

#[test]
fn test_save_then_load_keeps_transcript_presence() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("train.json");

    let records = vec![
        Record::new("IRS scammer gets owned", "scambait", "Baiter", 900)
            .with_label(Label::Call)
            .with_transcription(vec![
                DiarizedSegment::new(0, 0.0, 3.5, "hello this is the irs"),
                DiarizedSegment::new(1, 3.5, 6.0, "hi"),
            ]),
        Record::new("Travel vlog", "travelling europe", "Wanderer", 120_000)
            .with_label(Label::NotCall),
    ];

    save_records(&path, &records).unwrap();
    let loaded = load_records(&path).unwrap();

    assert_eq!(loaded, records);
    assert!(loaded[0].transcript().is_some());
    assert!(loaded[1].transcript().is_none());
}

#[test]
fn test_load_rejects_malformed_record() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.jsonl");
    std::fs::write(
        &path,
        r#"{"title":"x","desc":"","channel_name":"c","views":1,"transcription":[{"speaker":0,"start_time":1.0,"end_time":2.0,"text":"hi"}]}"#,
    )
    .unwrap();

    // Transcript without its flattened block violates the record schema
    let err = load_records(&path).unwrap_err();
    assert!(matches!(err, Error::VoterInput(_)), "got: {:?}", err);
}

#[test]
fn test_load_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = load_records(&dir.path().join("missing.json")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
