use super::*;
use time::OffsetDateTime;

fn ai(object: &str, confidence: f64) -> Assertion {
    Assertion::try_new(
        "s",
        "p",
        object,
        Rating::Positive,
        Intelligence::Ai,
        confidence,
        Phase::Discovery,
    )
    .unwrap()
}

fn ni(object: &str, rating: Rating) -> Assertion {
    Assertion::try_new("s", "p", object, rating, Intelligence::Ni, 0.1, Phase::Review).unwrap()
}

#[test]
fn identifier_validation() {
    assert!(validate_identifier("name").is_ok());
    assert!(validate_identifier("file_size2").is_ok());
    let long = "a".repeat(49);
    for bad in ["", "Name", "2size", "size-x", "drop table", long.as_str()] {
        assert_eq!(
            validate_identifier(bad).unwrap_err(),
            SchemaError::InvalidName(bad.to_string())
        );
    }
}

#[test]
fn descriptor_rejects_duplicate_fields() {
    let err = SchemaDescriptor::try_new(&[("name", FieldType::String), ("name", FieldType::Integer)])
        .unwrap_err();
    assert_eq!(err, SchemaError::DuplicateField("name".to_string()));
}

#[test]
fn descriptor_check_enforces_arity_and_types() {
    let schema =
        SchemaDescriptor::try_new(&[("name", FieldType::String), ("size", FieldType::Integer)]).unwrap();
    assert_eq!(schema.position("size"), Some(1));

    assert!(schema.check(&["a.txt".into(), 120i64.into()]).is_ok());
    assert!(schema.check(&[Value::Null, Value::Null]).is_ok());
    assert_eq!(
        schema.check(&["a.txt".into()]).unwrap_err(),
        SchemaError::ArityMismatch {
            expected: 2,
            actual: 1
        }
    );
    assert_eq!(
        schema.check(&["a.txt".into(), true.into()]).unwrap_err(),
        SchemaError::TypeMismatch {
            field: "size".to_string(),
            expected: FieldType::Integer,
            actual: "boolean"
        }
    );
}

#[test]
fn row_reader_reads_positionally() {
    let stamp = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
    let mut row = RowReader::new(vec![
        "x".into(),
        Value::Null,
        false.into(),
        stamp.into(),
    ]);
    assert_eq!(row.text().unwrap(), Some("x".to_string()));
    assert_eq!(row.integer().unwrap(), None);
    assert_eq!(row.boolean().unwrap(), Some(false));
    assert_eq!(row.timestamp().unwrap(), Some(stamp));
    assert_eq!(row.remaining(), 0);
    assert!(row.finish().is_ok());

    let mut short = RowReader::new(vec![1i64.into()]);
    assert!(matches!(short.text(), Err(SchemaError::TypeMismatch { .. })));

    let long = RowReader::new(vec![1i64.into()]);
    assert!(matches!(long.finish(), Err(SchemaError::ArityMismatch { .. })));
}

#[test]
fn factory_dispatches_on_kind() {
    let factory = NodeFactory::new().register("label", |meta: NodeMeta, row: &mut RowReader| {
        Ok((meta, row.text()?.unwrap_or_default()))
    });
    assert!(factory.contains("label"));
    assert_eq!(factory.kinds().collect::<Vec<_>>(), vec!["label"]);

    let meta = NodeMeta::assigned(2, ROOT_ID, 0);
    let (built_meta, text) = factory.build("label", meta, vec!["hello".into()]).unwrap();
    assert_eq!(built_meta, meta);
    assert_eq!(text, "hello");

    assert_eq!(
        factory.build("other", meta, Vec::new()).unwrap_err(),
        SchemaError::UnknownKind("other".to_string())
    );
    assert!(matches!(
        factory.build("label", meta, vec!["a".into(), "b".into()]),
        Err(SchemaError::ArityMismatch { .. })
    ));
}

#[test]
fn assertion_rejects_out_of_range_confidence() {
    for confidence in [-0.1, 1.5, f64::NAN] {
        assert!(matches!(
            Assertion::try_new("s", "p", "o", Rating::Positive, Intelligence::Ai, confidence, Phase::Import),
            Err(SchemaError::InvalidConfidence(_))
        ));
    }
}

#[test]
fn human_assertion_overrides_confident_machine() {
    let candidates = vec![ai("o1", 0.9), ni("o2", Rating::Positive)];
    assert_eq!(resolve(&candidates).map(|a| a.object.as_str()), Some("o2"));
}

#[test]
fn first_human_assertion_short_circuits() {
    let candidates = vec![
        ni("first", Rating::Positive),
        ni("second", Rating::Positive),
    ];
    assert_eq!(resolve(&candidates).map(|a| a.object.as_str()), Some("first"));
}

#[test]
fn highest_confidence_machine_assertion_wins_without_human() {
    let candidates = vec![
        ai("low", 0.2),
        ai("high", 0.8),
        ai("tie", 0.8),
        ni("negative", Rating::Negative),
    ];
    assert_eq!(resolve(&candidates).map(|a| a.object.as_str()), Some("high"));
}

#[test]
fn no_positive_assertion_yields_nothing() {
    let candidates = vec![ni("o", Rating::Negative)];
    assert!(resolve(&candidates).is_none());
    assert!(resolve(std::iter::empty()).is_none());
}

#[test]
fn retraction_flips_rating_and_keeps_triple() {
    let original = ai("o", 0.7);
    let retraction = original.retraction(Intelligence::Ni, 1.0).unwrap();
    assert_eq!(retraction.rating, Rating::Negative);
    assert_eq!(retraction.object, "o");
    assert!(retraction.is_human());
}

#[test]
fn assertion_serializes_provenance_tags() {
    let json = serde_json::to_string(&ni("o", Rating::Positive).with_timestamp_ms(42)).unwrap();
    assert!(json.contains("\"intelligence\":\"NI\""));
    assert!(json.contains("\"phase\":\"review\""));
    assert!(json.contains("\"timestamp_ms\":42"));
}

#[test]
fn phases_are_totally_ordered() {
    let mut sorted = Phase::ALL.to_vec();
    sorted.sort();
    assert_eq!(sorted, Phase::ALL.to_vec());
    assert!(Phase::Import < Phase::Review);
}

#[test]
fn settings_overrides_and_derived_paths() {
    let settings = Settings::with_data_dir("/tmp/arbor")
        .apply_overrides(|key| match key {
            CONTENT_CACHE_ENV => Some("yes".to_string()),
            MAX_CASCADE_DEPTH_ENV => Some("4".to_string()),
            COUNTER_DIR_ENV => Some("  ".to_string()),
            _ => None,
        })
        .unwrap();
    assert!(settings.content_cache);
    assert_eq!(settings.max_cascade_depth, 4);
    assert_eq!(settings.database_path(), std::path::PathBuf::from("/tmp/arbor/arbor.db"));
    assert_eq!(settings.cache_root(), std::path::PathBuf::from("/tmp/arbor/cache"));
    assert_eq!(settings.counter_root(), std::path::PathBuf::from("/tmp/arbor/counters"));

    let err = Settings::default()
        .apply_overrides(|key| (key == CONTENT_CACHE_ENV).then(|| "maybe".to_string()))
        .unwrap_err();
    assert!(matches!(err, SettingsError::InvalidValue { key: CONTENT_CACHE_ENV, .. }));
}

#[test]
fn settings_json_keeps_defaults_for_missing_keys() {
    let settings: Settings = serde_json::from_str(r#"{"content_cache": true}"#).unwrap();
    assert!(settings.content_cache);
    assert_eq!(settings.max_cascade_depth, Settings::default().max_cascade_depth);
}

#[test]
fn validate_catches_confidence_set_after_construction() {
    let mut assertion = ai("o", 0.5);
    assert!(assertion.validate().is_ok());
    assertion.confidence = 7.5;
    assert_eq!(assertion.validate(), Err(SchemaError::InvalidConfidence(7.5)));

    let parsed: Assertion = serde_json::from_str(
        r#"{"subject":"s","predicate":"p","object":"o","rating":"Positive","intelligence":"AI","confidence":-1.0,"phase":"import","timestamp_ms":1}"#,
    )
    .unwrap();
    assert!(matches!(parsed.validate(), Err(SchemaError::InvalidConfidence(_))));
}
