//! End-to-end intake workflow through the service, on both backends.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use clinic_intake_core::config::ClinicConfig;
use clinic_intake_core::db::Database;
use clinic_intake_core::models::{
    AuditAction, Client, ClientStatus, CriteriaAction, NewClient, NewCriteria, NewEmailTemplate,
    Operator, SentEmail, TemplateType, Workflow,
};
use clinic_intake_core::service::{Actor, ClientDocumentHook, IntakeService, ServiceError};
use clinic_intake_core::sheets::SheetsBackend;
use clinic_intake_core::store::{patch_from_value, Backend};
use clinic_intake_sheets::MemoryWorkbook;
use serde_json::json;

fn services() -> Vec<IntakeService> {
    let _ = env_logger::builder().is_test(true).try_init();
    let backends: Vec<Box<dyn Backend>> = vec![
        Box::new(Database::open_in_memory().unwrap()),
        Box::new(SheetsBackend::new(MemoryWorkbook::new())),
    ];
    backends
        .into_iter()
        .map(|b| IntakeService::new(b, &ClinicConfig::default()).unwrap())
        .collect()
}

fn admin() -> Actor {
    Actor::admin("admin-1").with_email("admin@clinic.example")
}

fn staff() -> Actor {
    Actor::staff("staff-7").with_email("frontdesk@clinic.example")
}

fn rule(name: &str, field: &str, operator: Operator, value: &str, action: CriteriaAction, priority: i32) -> NewCriteria {
    NewCriteria {
        name: name.into(),
        description: None,
        field: field.into(),
        operator,
        value: value.into(),
        action,
        priority,
        is_active: true,
    }
}

#[test]
fn test_intake_to_follow_up() -> anyhow::Result<()> {
    for service in services() {
        let name = service.backend().backend_name();
        service.create_criteria(
            &admin(),
            rule("Urgent", "suicideAttemptRecent", Operator::InList, "Yes, yes", CriteriaAction::FlagUrgent, 1),
        )?;
        service.create_criteria(
            &admin(),
            rule("Insurance review", "insuranceProvider", Operator::NotExists, "", CriteriaAction::FlagReview, 10),
        )?;
        service.create_template(
            &admin(),
            NewEmailTemplate {
                template_type: TemplateType::InitialOutreach,
                name: "Welcome".into(),
                subject: "Scheduling with {{requestedClinician}}".into(),
                body: "Hi {{firstName}},".into(),
                is_active: true,
            },
        )?;

        let client = service.create_client(
            &staff(),
            NewClient {
                first_name: "Maria".into(),
                last_name: "Garcia".into(),
                email: Some("maria@example.org".into()),
                requested_clinician: Some("Dr. Chen".into()),
                suicide_attempt_recent: Some("No".into()),
                ..Default::default()
            },
        )?;

        let evaluated = service.evaluate_client(&staff(), &client.id)?.value;
        assert_eq!(evaluated.status, ClientStatus::EvaluationFlagged, "{}", name);
        assert_eq!(evaluated.evaluation_score.as_deref(), Some("flag_review"), "{}", name);

        service.change_status(&staff(), &client.id, ClientStatus::PendingOutreach)?;
        let attempts = service.initialize_outreach(&staff(), &client.id)?;
        assert_eq!(attempts.len(), 3, "{}", name);

        let email = service.render_template(TemplateType::InitialOutreach, &client.id, &BTreeMap::new())?;
        assert_eq!(email.subject, "Scheduling with Dr. Chen");
        assert_eq!(email.body, "Hi Maria,");

        service.record_outreach_sent(
            &staff(),
            &attempts[0].id,
            SentEmail {
                subject: Some(email.subject),
                body: Some(email.body),
                message_id: None,
            },
        )?;
        service.record_outreach_sent(&staff(), &attempts[1].id, SentEmail::default())?;
        service.record_outreach_sent(&staff(), &attempts[2].id, SentEmail::default())?;

        let client = service.get_client(&client.id)?;
        assert_eq!(client.status, ClientStatus::FollowUp2, "{}", name);
        assert!(client.initial_outreach_date.is_some());
        assert!(client.follow_up_2_date.is_some());

        let closed = service
            .close_client(&staff(), &client.id, ClientStatus::ClosedNoContact, Some("no reply".into()))?
            .value;
        assert_eq!(closed.closed_from_workflow, Some(Workflow::Outreach));
        let listed = service.list_closed_clients(Some(Workflow::Outreach))?;
        assert_eq!(listed.len(), 1, "{}", name);

        let reopened = service.reopen_client(&admin(), &client.id, Some("called in".into()))?.value;
        assert_eq!(reopened.status, ClientStatus::PendingOutreach);
        assert_eq!(reopened.reopen_history.len(), 1);

        let report = service.verify_audit_chain(&admin())?;
        assert!(report.is_intact(), "{}", name);
        // criteria x2, template, client create, evaluate, status, outreach init,
        // three sends, close, reopen
        assert_eq!(report.entries, 12, "{}", name);
    }
    Ok(())
}

#[test]
fn test_duplicate_intake_detected() -> anyhow::Result<()> {
    for service in services() {
        let intake = NewClient {
            first_name: "Sam".into(),
            last_name: "Lee".into(),
            phone: Some("(555) 010-0200".into()),
            ..Default::default()
        };
        let original = service.create_client(&staff(), intake.clone())?;
        let mut again = intake;
        again.phone = Some("555.010.0200".into());
        let repeat = service.create_client(&staff(), again)?;

        let outcome = service.preview_evaluation(&repeat.id)?;
        let finding = outcome.duplicate.expect("duplicate found");
        assert_eq!(finding.client_id, original.id);

        let evaluated = service.evaluate_client(&staff(), &repeat.id)?.value;
        assert_eq!(evaluated.duplicate_of_client_id.as_deref(), Some(original.id.as_str()));

        let marked = service
            .mark_duplicate(&staff(), &repeat.id, Some(&original.id))?
            .value;
        assert_eq!(marked.status, ClientStatus::Duplicate);
        assert!(service.evaluate_client(&staff(), &original.id)?.value.duplicate_of_client_id.is_none());
    }
    Ok(())
}

#[test]
fn test_error_kinds() {
    for service in services() {
        assert!(matches!(
            service.get_client("missing"),
            Err(ServiceError::NotFound { .. })
        ));
        assert!(matches!(
            service.create_criteria(
                &staff(),
                rule("x", "age", Operator::Exists, "", CriteriaAction::Flag, 1)
            ),
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.create_criteria(
                &admin(),
                rule("x", "notAField", Operator::Exists, "", CriteriaAction::Flag, 1)
            ),
            Err(ServiceError::Validation(_))
        ));
        let client = service
            .create_client(
                &staff(),
                NewClient {
                    first_name: "Ada".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(matches!(
            service.update_client(&staff(), &client.id, &patch_from_value(json!({"shoeSize": 9})).unwrap()),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            service.reopen_client(&staff(), &client.id, None),
            Err(ServiceError::InvalidTransition(_))
        ));
    }
}

#[test]
fn test_narrow_whitelist_rejects_stored_criteria() -> anyhow::Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("clinic.db");

    let client_id = {
        let service = IntakeService::new(Box::new(Database::open(&path)?), &ClinicConfig::default())?;
        service.create_criteria(&admin(), rule("Email", "email", Operator::Exists, "", CriteriaAction::Flag, 1))?;
        let client = service.create_client(
            &staff(),
            NewClient {
                first_name: "Ada".into(),
                ..Default::default()
            },
        )?;
        assert!(service.preview_evaluation(&client.id).is_ok());
        client.id
    };

    // Same data, reopened with a narrower field whitelist
    let config = ClinicConfig::from_toml_str("[evaluation]\nallowed_fields = [\"age\"]")?;
    let narrow = IntakeService::new(Box::new(Database::open(&path)?), &config)?;
    assert!(matches!(
        narrow.preview_evaluation(&client_id),
        Err(ServiceError::Validation(_))
    ));
    assert!(matches!(
        narrow.create_criteria(&admin(), rule("Email", "email", Operator::Exists, "", CriteriaAction::Flag, 2)),
        Err(ServiceError::Validation(_))
    ));
    Ok(())
}

/// Records every client it is shown; fails on request.
struct RecordingHook {
    seen: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl ClientDocumentHook for RecordingHook {
    fn client_changed(&self, client: &Client) -> Result<(), String> {
        self.seen.lock().unwrap().push(client.id.clone());
        if self.fail {
            Err("document store offline".into())
        } else {
            Ok(())
        }
    }
}

#[test]
fn test_document_hook() -> anyhow::Result<()> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let service = IntakeService::new(Box::new(Database::open_in_memory()?), &ClinicConfig::default())?
        .with_document_hook(Box::new(RecordingHook {
            seen: seen.clone(),
            fail: true,
        }));

    let client = service.create_client(
        &staff(),
        NewClient {
            first_name: "Ada".into(),
            ..Default::default()
        },
    )?;
    let result = service.change_status(&staff(), &client.id, ClientStatus::PendingEvaluation)?;
    assert_eq!(result.value.status, ClientStatus::PendingEvaluation);
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(service.get_client(&client.id)?.status, ClientStatus::PendingEvaluation);
    assert_eq!(seen.lock().unwrap().as_slice(), &[client.id.clone()]);

    let audit = service.audit_history(&admin(), clinic_intake_core::models::EntityType::Client, &client.id)?;
    assert_eq!(audit.last().map(|e| e.action), Some(AuditAction::StatusChange));
    Ok(())
}
