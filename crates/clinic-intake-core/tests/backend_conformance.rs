//! The SQLite and spreadsheet backends must be observably interchangeable.

use clinic_intake_core::audit::AuditLogger;
use clinic_intake_core::db::Database;
use clinic_intake_core::models::{
    AttemptStatus, AuditAction, ClientStatus, CriteriaAction, EntityType, NewAuditEntry, NewClient,
    NewCriteria, NewEmailTemplate, NewOutreachAttempt, NewReferralClinic, Operator, TemplateType,
    Workflow,
};
use clinic_intake_core::sheets::SheetsBackend;
use clinic_intake_core::store::{
    patch_from_value, Backend, ClientStore, ClinicStore, CriteriaStore, OutreachStore, SettingsStore,
    StoreError, TemplateStore,
};
use clinic_intake_sheets::{FileWorkbook, MemoryWorkbook};
use serde_json::json;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn backends() -> Vec<Box<dyn Backend>> {
    vec![
        Box::new(Database::open_in_memory().unwrap()),
        Box::new(SheetsBackend::new(MemoryWorkbook::new())),
    ]
}

fn criteria(name: &str, priority: i32) -> NewCriteria {
    NewCriteria {
        name: name.to_string(),
        description: Some(format!("{} rule", name)),
        field: "presentingConcerns".to_string(),
        operator: Operator::ContainsAny,
        value: "anxiety, panic".to_string(),
        action: CriteriaAction::FlagReview,
        priority,
        is_active: true,
    }
}

/// What a backend exposes after a fixed sequence of writes, minus ids and
/// timestamps.
#[derive(Debug, PartialEq)]
struct Observed {
    client_names: Vec<String>,
    updated_phone: Option<String>,
    closed_names: Vec<String>,
    criteria_names: Vec<String>,
    attempt_numbers: Vec<u32>,
    sent_statuses: Vec<AttemptStatus>,
    clinic_specialties: Vec<String>,
    template_subject: Option<String>,
    settings: Vec<(String, String)>,
    duplicate_attempt_rejected: bool,
    duplicate_template_rejected: bool,
    missing_update_is_none: bool,
}

fn exercise(backend: &dyn Backend) -> anyhow::Result<Observed> {
    let ada = backend.create_client(NewClient {
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        presenting_concerns: Some("Panic attacks".into()),
        ..Default::default()
    })?;
    let grace = backend.create_client(NewClient {
        first_name: "Grace".into(),
        last_name: "Hopper".into(),
        ..Default::default()
    })?;

    let updated = backend
        .update_client(&ada.id, &patch_from_value(json!({"phone": "555-0100"}))?)?
        .expect("client exists");

    let mut closed = grace.clone();
    closed.status = ClientStatus::ClosedOther;
    closed.closed_date = Some("2024-03-01T10:00:00+00:00".into());
    closed.closed_from_workflow = Some(Workflow::Evaluation);
    backend.save_client(&closed)?;

    backend.create_criteria(criteria("Later", 5), Some("admin".into()))?;
    backend.create_criteria(criteria("First", 1), Some("admin".into()))?;
    backend.create_criteria(criteria("Tie", 5), None)?;

    let attempts = backend.initialize_outreach_for_client(&ada.id, 3)?;
    backend.update_outreach_attempt(&attempts[0].id, &patch_from_value(json!({"status": "sent"}))?)?;
    let duplicate_attempt_rejected = matches!(
        backend.create_outreach_attempt(NewOutreachAttempt::pending(&ada.id, 2)),
        Err(StoreError::Validation(_))
    );

    let clinic = backend.create_clinic(NewReferralClinic {
        practice_name: "Harbor Counseling".into(),
        specialties: vec!["trauma".into(), "anxiety".into(), "trauma".into()],
        ..Default::default()
    })?;

    let template = NewEmailTemplate {
        template_type: TemplateType::InitialOutreach,
        name: "Welcome".into(),
        subject: "Hello {{firstName}}".into(),
        body: "Body".into(),
        is_active: true,
    };
    backend.create_template(template.clone(), None)?;
    let duplicate_template_rejected = matches!(
        backend.create_template(template, None),
        Err(StoreError::Validation(_))
    );

    backend.set_setting("outreachAttemptCount", "4", None)?;
    backend.set_setting("outreachAttemptCount", "5", Some("admin".into()))?;
    backend.set_setting("anotherKey", "x", None)?;

    let missing_update_is_none = backend
        .update_criteria("missing", &patch_from_value(json!({"priority": 1}))?)?
        .is_none();

    Ok(Observed {
        client_names: backend.list_clients()?.iter().map(|c| c.full_name()).collect(),
        updated_phone: updated.phone,
        closed_names: backend
            .list_closed_clients(Some(Workflow::Evaluation))?
            .iter()
            .map(|c| c.full_name())
            .collect(),
        criteria_names: backend.list_criteria()?.into_iter().map(|c| c.name).collect(),
        attempt_numbers: backend
            .list_outreach_for_client(&ada.id)?
            .iter()
            .map(|a| a.attempt_number)
            .collect(),
        sent_statuses: backend
            .list_outreach_for_client(&ada.id)?
            .iter()
            .map(|a| a.status)
            .collect(),
        clinic_specialties: backend
            .get_clinic(&clinic.id)?
            .map(|c| c.specialties)
            .unwrap_or_default(),
        template_subject: backend
            .get_template_by_type(TemplateType::InitialOutreach)?
            .map(|t| t.subject),
        settings: backend
            .list_settings()?
            .into_iter()
            .map(|s| (s.key, s.value))
            .collect(),
        duplicate_attempt_rejected,
        duplicate_template_rejected,
        missing_update_is_none,
    })
}

#[test]
fn test_backends_agree() {
    init_logging();
    let observed: Vec<Observed> = backends()
        .iter()
        .map(|b| exercise(b.as_ref()).unwrap())
        .collect();

    let expected = Observed {
        client_names: vec!["Ada Lovelace".into(), "Grace Hopper".into()],
        updated_phone: Some("555-0100".into()),
        closed_names: vec!["Grace Hopper".into()],
        criteria_names: vec!["First".into(), "Later".into(), "Tie".into()],
        attempt_numbers: vec![1, 2, 3],
        sent_statuses: vec![AttemptStatus::Sent, AttemptStatus::Pending, AttemptStatus::Pending],
        clinic_specialties: vec!["anxiety".into(), "trauma".into()],
        template_subject: Some("Hello {{firstName}}".into()),
        settings: vec![
            ("anotherKey".into(), "x".into()),
            ("outreachAttemptCount".into(), "5".into()),
        ],
        duplicate_attempt_rejected: true,
        duplicate_template_rejected: true,
        missing_update_is_none: true,
    };
    for o in &observed {
        assert_eq!(o, &expected);
    }
}

#[test]
fn test_closed_clients_most_recent_first() {
    for backend in backends() {
        for (name, date) in [
            ("Old", "2024-01-01T00:00:00+00:00"),
            ("New", "2024-06-01T00:00:00+00:00"),
            ("Mid", "2024-03-01T00:00:00+00:00"),
        ] {
            let mut client = backend
                .create_client(NewClient {
                    first_name: name.into(),
                    ..Default::default()
                })
                .unwrap();
            client.status = ClientStatus::ClosedNoContact;
            client.closed_date = Some(date.into());
            client.closed_from_workflow = Some(Workflow::Outreach);
            backend.save_client(&client).unwrap();
        }
        backend
            .create_client(NewClient {
                first_name: "Open".into(),
                ..Default::default()
            })
            .unwrap();

        let names: Vec<String> = backend
            .list_closed_clients(None)
            .unwrap()
            .into_iter()
            .map(|c| c.first_name)
            .collect();
        assert_eq!(names, vec!["New", "Mid", "Old"], "{}", backend.backend_name());
        assert!(backend
            .list_closed_clients(Some(Workflow::Scheduling))
            .unwrap()
            .is_empty());
    }
}

#[test]
fn test_file_backed_stores_persist() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("clinic.db");
    let wb_path = dir.path().join("workbook.json");

    let id_db = {
        let db = Database::open(&db_path).unwrap();
        db.create_client(NewClient {
            first_name: "Ada".into(),
            ..Default::default()
        })
        .unwrap()
        .id
    };
    let id_wb = {
        let sheets = SheetsBackend::new(FileWorkbook::open(&wb_path).unwrap());
        sheets
            .create_client(NewClient {
                first_name: "Ada".into(),
                ..Default::default()
            })
            .unwrap()
            .id
    };

    let db = Database::open(&db_path).unwrap();
    assert_eq!(db.get_client(&id_db).unwrap().unwrap().first_name, "Ada");
    let sheets = SheetsBackend::new(FileWorkbook::open(&wb_path).unwrap());
    assert_eq!(sheets.get_client(&id_wb).unwrap().unwrap().first_name, "Ada");
}

#[test]
fn test_created_records_read_back_whole() -> anyhow::Result<()> {
    init_logging();
    for backend in backends() {
        let name = backend.backend_name();

        // Blank form answers arrive as empty strings, not as missing fields
        let client = backend.create_client(NewClient {
            first_name: "Ada".into(),
            email: Some(String::new()),
            phone: Some("\"555\"".into()),
            insurance_provider: Some(String::new()),
            ..Default::default()
        })?;
        assert_eq!(backend.get_client(&client.id)?, Some(client.clone()), "{}", name);
        let updated = backend
            .update_client(&client.id, &patch_from_value(json!({"additionalInfo": ""}))?)?
            .expect("client exists");
        assert_eq!(updated.additional_info.as_deref(), Some(""), "{}", name);
        assert_eq!(backend.get_client(&client.id)?, Some(updated), "{}", name);

        let mut rule = criteria("Blank", 3);
        rule.description = Some(String::new());
        let created = backend.create_criteria(rule, Some(String::new()))?;
        assert_eq!(backend.get_criteria(&created.id)?, Some(created.clone()), "{}", name);
        let updated = backend
            .update_criteria(&created.id, &patch_from_value(json!({"priority": 9, "description": "x"}))?)?
            .expect("criteria exists");
        assert_eq!(backend.get_criteria(&created.id)?, Some(updated), "{}", name);
        assert!(backend.delete_criteria(&created.id)?);
        assert!(!backend.delete_criteria(&created.id)?, "{}", name);

        let clinic = backend.create_clinic(NewReferralClinic {
            practice_name: "Harbor Counseling".into(),
            website: Some(String::new()),
            specialties: vec!["anxiety".into(), "trauma".into()],
            ..Default::default()
        })?;
        assert_eq!(backend.get_clinic(&clinic.id)?, Some(clinic.clone()), "{}", name);
        assert!(backend.delete_clinic(&clinic.id)?);
        assert!(!backend.delete_clinic(&clinic.id)?, "{}", name);

        let template = backend.create_template(
            NewEmailTemplate {
                template_type: TemplateType::Closure,
                name: "Closing".into(),
                subject: String::new(),
                body: "Take care".into(),
                is_active: false,
            },
            Some(String::new()),
        )?;
        assert_eq!(backend.get_template(&template.id)?, Some(template.clone()), "{}", name);
        assert!(backend.delete_template(&template.id)?);
        assert!(!backend.delete_template(&template.id)?, "{}", name);

        let mut pending = NewOutreachAttempt::pending(&client.id, 1);
        pending.notes = Some(String::new());
        let attempt = backend.create_outreach_attempt(pending)?;
        assert_eq!(backend.get_outreach_attempt(&attempt.id)?, Some(attempt.clone()), "{}", name);
        let updated = backend
            .update_outreach_attempt(&attempt.id, &patch_from_value(json!({"emailSubject": ""}))?)?
            .expect("attempt exists");
        assert_eq!(backend.get_outreach_attempt(&attempt.id)?, Some(updated), "{}", name);
        assert!(backend.delete_outreach_attempt(&attempt.id)?);
        assert!(!backend.delete_outreach_attempt(&attempt.id)?, "{}", name);
    }
    Ok(())
}

#[test]
fn test_audit_chain_with_blank_actor_email() -> anyhow::Result<()> {
    init_logging();
    for backend in backends() {
        let logger = AuditLogger::new(backend.as_ref());
        for entity_id in ["c-1", "c-2"] {
            let written = logger.log(NewAuditEntry {
                actor_id: "staff-1".into(),
                actor_email: Some(String::new()),
                action: AuditAction::Create,
                entity_type: EntityType::Client,
                entity_id: entity_id.into(),
                previous_value: None,
                new_value: Some(json!({"firstName": "", "note": "\"quoted\""})),
            })?;
            assert_eq!(written.actor_email.as_deref(), Some(""));
        }
        let report = logger.verify_chain()?;
        assert!(report.is_intact(), "{}: {:?}", backend.backend_name(), report.first_break);
        assert_eq!(report.entries, 2);
    }
    Ok(())
}
