use chrono::NaiveDate;
use nexushub_core::db::open_db_in_memory;
use nexushub_core::domain::{company, contact, deal};
use nexushub_core::transfer::ImportFailure;
use nexushub_core::{
    fields, FieldErrorKind, FieldValue, ListFilter, RecordRepository, RecordTransfer, RepoConfig,
    RepoError, SqliteRecordRepository, TenantId, TransferError,
};
use std::collections::BTreeMap;
use uuid::Uuid;

fn new_tenant() -> TenantId {
    TenantId::new(Uuid::new_v4())
}

fn row(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(column, value)| (column.to_string(), value.to_string()))
        .collect()
}

#[test]
fn export_then_import_reproduces_field_values_with_new_ids() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRecordRepository::try_new(&conn, &deal::SCHEMA).unwrap();
    let transfer = RecordTransfer::new(&repo);
    let tenant = new_tenant();
    let company_id = Uuid::new_v4();

    let first = repo
        .create(
            tenant,
            fields! {
                "name" => "Renewal, 2025",
                "company_id" => company_id,
                "value" => 1500.5,
                "probability" => 40_i64,
                "stage" => "proposal",
                "expected_close_date" => NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
                "tags" => FieldValue::tags(["enterprise", "q1"]),
                "notes" => "Said \"yes\" on the call\nfollow up",
            },
        )
        .unwrap();
    let second = repo
        .create(
            tenant,
            fields! {
                "name" => "Pilot",
                "company_id" => company_id,
                "value" => 2_000_i64,
                "notes" => "  indented note ",
            },
        )
        .unwrap();

    let exported = transfer.export(tenant, &ListFilter::new()).unwrap();
    assert_eq!(
        exported.headers,
        deal::SCHEMA
            .export_fields
            .iter()
            .map(|name| name.to_string())
            .collect::<Vec<_>>()
    );
    assert_eq!(exported.rows.len(), 2);

    let result = transfer.import_rows(tenant, &exported.rows_as_maps());
    assert_eq!(result.total_rows, 2);
    assert_eq!(result.created_count(), 2);
    assert!(result.failures.is_empty());

    let originals = [first, second];
    for imported_id in result.created_ids() {
        assert!(originals.iter().all(|original| original.id != imported_id));
        let imported = repo.get(tenant, imported_id, false).unwrap();
        let original = originals
            .iter()
            .find(|original| original.text("name") == imported.text("name"))
            .unwrap();
        for field in deal::SCHEMA.export_fields {
            assert_eq!(
                imported.get(field),
                original.get(field),
                "field {field} differs after round-trip"
            );
        }
    }
}

#[test]
fn csv_round_trip_preserves_quoted_cells() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRecordRepository::try_new(&conn, &contact::SCHEMA).unwrap();
    let transfer = RecordTransfer::new(&repo);
    let source = new_tenant();
    let target = new_tenant();

    repo.create(
        source,
        fields! {
            "first_name" => "Ana",
            "last_name" => "O'Neil, Jr.",
            "email" => "ana@example.com",
            "notes" => "line one\nline \"two\"",
            "title" => "  Head of R&D ",
            "tags" => FieldValue::tags(["vip", "partner"]),
            "birthday" => NaiveDate::from_ymd_opt(1990, 12, 1).unwrap(),
            "rating" => 5_i64,
        },
    )
    .unwrap();

    let csv = transfer.export_csv(source, &ListFilter::new()).unwrap();
    assert!(csv.starts_with("first_name,last_name,email,"));
    assert!(csv.contains("\"O'Neil, Jr.\""));
    assert!(csv.contains("partner;vip"));

    let result = transfer.import_csv(target, &csv).unwrap();
    assert_eq!(result.created_count(), 1);

    let imported = repo.get(target, result.created_ids()[0], false).unwrap();
    assert_eq!(imported.text("last_name"), Some("O'Neil, Jr."));
    assert_eq!(imported.text("notes"), Some("line one\nline \"two\""));
    assert_eq!(imported.text("title"), Some("  Head of R&D "));
    assert_eq!(
        imported.get("tags"),
        Some(&FieldValue::tags(["partner", "vip"]))
    );
    assert_eq!(imported.get("rating"), Some(&FieldValue::Integer(5)));
}

#[test]
fn company_export_reimports_into_the_same_tenant() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRecordRepository::try_new(&conn, &company::SCHEMA).unwrap();
    let transfer = RecordTransfer::new(&repo);
    let tenant = new_tenant();
    repo.create(tenant, fields! { "name" => "Acme", "status" => "lead" })
        .unwrap();

    let csv = transfer.export_csv(tenant, &ListFilter::new()).unwrap();
    let result = transfer.import_csv(tenant, &csv).unwrap();

    assert!(result.failures.is_empty(), "{:?}", result.failures);
    assert_eq!(result.created_count(), 1);
    let acme = repo
        .count(tenant, &ListFilter::new().eq("status", "lead"))
        .unwrap();
    assert_eq!(acme, 2);
}

#[test]
fn tags_holding_the_delimiter_are_rejected_so_exports_split_cleanly() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRecordRepository::try_new(&conn, &contact::SCHEMA).unwrap();
    let transfer = RecordTransfer::new(&repo);
    let tenant = new_tenant();

    let err = repo
        .create(
            tenant,
            fields! {
                "first_name" => "Rae",
                "last_name" => "Dee",
                "tags" => FieldValue::tags(["r&d;ops"]),
            },
        )
        .unwrap_err();
    match err {
        RepoError::Validation(validation) => assert!(matches!(
            validation.kind_of("tags"),
            Some(FieldErrorKind::InvalidValue(_))
        )),
        other => panic!("unexpected error: {other}"),
    }

    let created = repo
        .create(
            tenant,
            fields! {
                "first_name" => "Rae",
                "last_name" => "Dee",
                "tags" => FieldValue::tags(["r&d", "ops"]),
            },
        )
        .unwrap();
    let patched = repo.update(
        tenant,
        created.id,
        fields! { "tags" => FieldValue::tags(["a;b"]) },
    );
    assert!(matches!(patched, Err(RepoError::Validation(_))));

    let exported = transfer.export(tenant, &ListFilter::new()).unwrap();
    let result = transfer.import_rows(tenant, &exported.rows_as_maps());
    let imported = repo.get(tenant, result.created_ids()[0], false).unwrap();
    assert_eq!(imported.get("tags"), created.get("tags"));
}

#[test]
fn bad_rows_are_reported_and_good_rows_created() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRecordRepository::try_new(&conn, &contact::SCHEMA).unwrap();
    let transfer = RecordTransfer::new(&repo);
    let tenant = new_tenant();

    let rows = vec![
        row(&[("first_name", "Ada"), ("last_name", "Lovelace"), ("email", "ada@example.com")]),
        row(&[("first_name", "Nameless"), ("email", "nameless@example.com")]),
        row(&[("first_name", "Grace"), ("last_name", "Hopper"), ("email", "ada@example.com")]),
        row(&[("first_name", "Alan"), ("last_name", "Turing"), ("rating", "eleven")]),
        row(&[("first_name", "Linus"), ("last_name", "Torvalds"), ("internal_id", "ignored")]),
    ];

    let result = transfer.import_rows(tenant, &rows);

    assert_eq!(result.total_rows, 5);
    assert_eq!(result.created_count(), 2);
    assert_eq!(result.failed_count(), 3);
    let created_rows: Vec<_> = result.created.iter().map(|created| created.row).collect();
    assert_eq!(created_rows, vec![1, 5]);

    let failed_rows: Vec<_> = result.failures.iter().map(|failure| failure.row).collect();
    assert_eq!(failed_rows, vec![2, 3, 4]);

    let kinds: Vec<_> = result
        .failures
        .iter()
        .map(|failure| match &failure.reason {
            ImportFailure::Fields(errors) => (errors[0].field.clone(), errors[0].kind.clone()),
            other => panic!("unexpected failure: {other}"),
        })
        .collect();
    assert_eq!(kinds[0], ("last_name".to_string(), FieldErrorKind::Missing));
    assert_eq!(kinds[1], ("email".to_string(), FieldErrorKind::Duplicate));
    assert_eq!(kinds[2].0, "rating");
    assert!(matches!(kinds[2].1, FieldErrorKind::InvalidValue(_)));

    assert_eq!(repo.count(tenant, &ListFilter::new()).unwrap(), 2);
}

#[test]
fn ambiguous_dates_are_rejected_not_guessed() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRecordRepository::try_new(&conn, &contact::SCHEMA).unwrap();
    let transfer = RecordTransfer::new(&repo);
    let tenant = new_tenant();

    let rows = vec![
        row(&[("first_name", "A"), ("last_name", "One"), ("birthday", "03/04/2024")]),
        row(&[("first_name", "B"), ("last_name", "Two"), ("birthday", "2024-02-30")]),
        row(&[("first_name", "C"), ("last_name", "Three"), ("birthday", "2024/04/03")]),
        row(&[("first_name", "D"), ("last_name", "Four"), ("birthday", "20240403")]),
    ];

    let result = transfer.import_rows(tenant, &rows);

    assert_eq!(result.created_count(), 2);
    for failure in &result.failures {
        match &failure.reason {
            ImportFailure::Fields(errors) => {
                assert_eq!(errors[0].field, "birthday");
                assert!(matches!(errors[0].kind, FieldErrorKind::InvalidValue(_)));
            }
            other => panic!("unexpected failure: {other}"),
        }
    }

    let expected = FieldValue::Date(NaiveDate::from_ymd_opt(2024, 4, 3).unwrap());
    for created in &result.created {
        let record = repo.get(tenant, created.id, false).unwrap();
        assert_eq!(record.get("birthday"), Some(&expected));
    }
}

#[test]
fn parse_failures_also_name_missing_required_fields() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRecordRepository::try_new(&conn, &contact::SCHEMA).unwrap();
    let transfer = RecordTransfer::new(&repo);

    let result = transfer.import_rows(
        new_tenant(),
        &[row(&[("first_name", "Solo"), ("do_not_contact", "maybe")])],
    );

    match &result.failures[0].reason {
        ImportFailure::Fields(errors) => {
            let names: Vec<_> = errors.iter().map(|error| error.field.as_str()).collect();
            assert_eq!(names, vec!["do_not_contact", "last_name"]);
        }
        other => panic!("unexpected failure: {other}"),
    }
}

#[test]
fn ragged_csv_row_is_a_row_failure() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRecordRepository::try_new(&conn, &contact::SCHEMA).unwrap();
    let transfer = RecordTransfer::new(&repo);

    let csv = "first_name,last_name\r\nAda,Lovelace\r\nGrace\r\n\r\nAlan,Turing\r\n";
    let result = transfer.import_csv(new_tenant(), csv).unwrap();

    assert_eq!(result.total_rows, 3);
    assert_eq!(result.created_count(), 2);
    assert_eq!(result.failures[0].row, 2);
    match &result.failures[0].reason {
        ImportFailure::Malformed(message) => assert!(message.contains("line 3")),
        other => panic!("unexpected failure: {other}"),
    }
}

#[test]
fn malformed_csv_document_fails_whole_import() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRecordRepository::try_new(&conn, &contact::SCHEMA).unwrap();
    let transfer = RecordTransfer::new(&repo);
    let tenant = new_tenant();

    let csv = "first_name,last_name\nAda,\"Lovelace\n";
    let err = transfer.import_csv(tenant, csv).unwrap_err();
    match err {
        TransferError::Csv { line, .. } => assert_eq!(line, 2),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(repo.count(tenant, &ListFilter::new()).unwrap(), 0);
}

#[test]
fn export_respects_filter_and_tenant() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRecordRepository::try_new(&conn, &contact::SCHEMA).unwrap();
    let transfer = RecordTransfer::new(&repo);
    let tenant = new_tenant();
    let other = new_tenant();

    repo.create(tenant, fields! { "first_name" => "Kept", "last_name" => "Lead", "lead_status" => "new" })
        .unwrap();
    repo.create(tenant, fields! { "first_name" => "Skipped", "last_name" => "Lead" })
        .unwrap();
    repo.create(other, fields! { "first_name" => "Foreign", "last_name" => "Lead", "lead_status" => "new" })
        .unwrap();

    let table = transfer
        .export(tenant, &ListFilter::new().eq("lead_status", "new"))
        .unwrap();
    assert_eq!(table.rows.len(), 1);
    assert_eq!(table.rows[0][0], "Kept");

    let rejected = transfer.export(tenant, &ListFilter::new().eq("notes", "x"));
    assert!(matches!(rejected, Err(TransferError::Repo(_))));
}

#[test]
fn export_pages_through_every_record() {
    let conn = open_db_in_memory().unwrap();
    let config = RepoConfig {
        export_batch_size: 3,
        ..RepoConfig::default()
    };
    let repo = SqliteRecordRepository::with_config(&conn, &contact::SCHEMA, config).unwrap();
    let transfer = RecordTransfer::new(&repo);
    let tenant = new_tenant();
    for index in 0..10 {
        repo.create(
            tenant,
            fields! { "first_name" => format!("P{index}"), "last_name" => "Batch" },
        )
        .unwrap();
    }

    let table = transfer.export(tenant, &ListFilter::new()).unwrap();
    assert_eq!(table.rows.len(), 10);
}

#[test]
fn custom_tag_delimiter_is_used_both_ways() {
    let conn = open_db_in_memory().unwrap();
    let config = RepoConfig {
        tag_delimiter: '|',
        ..RepoConfig::default()
    };
    let repo = SqliteRecordRepository::with_config(&conn, &contact::SCHEMA, config).unwrap();
    let transfer = RecordTransfer::new(&repo);
    let tenant = new_tenant();

    let result = transfer.import_rows(
        tenant,
        &[row(&[("first_name", "Pipe"), ("last_name", "Tags"), ("tags", "b | a|b")])],
    );
    let record = repo.get(tenant, result.created_ids()[0], false).unwrap();
    assert_eq!(record.get("tags"), Some(&FieldValue::tags(["a", "b"])));

    let csv = transfer.export_csv(tenant, &ListFilter::new()).unwrap();
    assert!(csv.contains("a|b"));
}
