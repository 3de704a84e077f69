//! Client (intake) models and lifecycle rules.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{Entity, EntityType};

/// Client lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    New,
    PendingEvaluation,
    EvaluationComplete,
    EvaluationFlagged,
    PendingOutreach,
    OutreachSent,
    #[serde(rename = "follow_up_1")]
    FollowUp1,
    #[serde(rename = "follow_up_2")]
    FollowUp2,
    Replied,
    ReadyToSchedule,
    Scheduled,
    Completed,
    PendingReferral,
    Referred,
    ClosedNoContact,
    ClosedOther,
    Duplicate,
}

impl ClientStatus {
    pub const ALL: [ClientStatus; 17] = [
        ClientStatus::New,
        ClientStatus::PendingEvaluation,
        ClientStatus::EvaluationComplete,
        ClientStatus::EvaluationFlagged,
        ClientStatus::PendingOutreach,
        ClientStatus::OutreachSent,
        ClientStatus::FollowUp1,
        ClientStatus::FollowUp2,
        ClientStatus::Replied,
        ClientStatus::ReadyToSchedule,
        ClientStatus::Scheduled,
        ClientStatus::Completed,
        ClientStatus::PendingReferral,
        ClientStatus::Referred,
        ClientStatus::ClosedNoContact,
        ClientStatus::ClosedOther,
        ClientStatus::Duplicate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClientStatus::New => "new",
            ClientStatus::PendingEvaluation => "pending_evaluation",
            ClientStatus::EvaluationComplete => "evaluation_complete",
            ClientStatus::EvaluationFlagged => "evaluation_flagged",
            ClientStatus::PendingOutreach => "pending_outreach",
            ClientStatus::OutreachSent => "outreach_sent",
            ClientStatus::FollowUp1 => "follow_up_1",
            ClientStatus::FollowUp2 => "follow_up_2",
            ClientStatus::Replied => "replied",
            ClientStatus::ReadyToSchedule => "ready_to_schedule",
            ClientStatus::Scheduled => "scheduled",
            ClientStatus::Completed => "completed",
            ClientStatus::PendingReferral => "pending_referral",
            ClientStatus::Referred => "referred",
            ClientStatus::ClosedNoContact => "closed_no_contact",
            ClientStatus::ClosedOther => "closed_other",
            ClientStatus::Duplicate => "duplicate",
        }
    }

    /// Closure statuses (set together with `closedDate`).
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            ClientStatus::ClosedNoContact | ClientStatus::ClosedOther | ClientStatus::Duplicate
        )
    }

    /// Position in the forward workflow. Closure statuses have no stage.
    ///
    /// The referral branch sits beside scheduling: a client can be referred
    /// out from any point up to and including `replied`.
    pub fn stage(&self) -> Option<u8> {
        let stage = match self {
            ClientStatus::New => 0,
            ClientStatus::PendingEvaluation => 1,
            ClientStatus::EvaluationComplete | ClientStatus::EvaluationFlagged => 2,
            ClientStatus::PendingOutreach => 3,
            ClientStatus::OutreachSent => 4,
            ClientStatus::FollowUp1 => 5,
            ClientStatus::FollowUp2 => 6,
            ClientStatus::Replied => 7,
            ClientStatus::ReadyToSchedule | ClientStatus::PendingReferral => 8,
            ClientStatus::Scheduled | ClientStatus::Referred => 9,
            ClientStatus::Completed => 10,
            ClientStatus::ClosedNoContact | ClientStatus::ClosedOther | ClientStatus::Duplicate => {
                return None
            }
        };
        Some(stage)
    }

    /// Workflow a status belongs to; used to file closures and to reopen.
    pub fn workflow(&self) -> Option<Workflow> {
        match self {
            ClientStatus::New
            | ClientStatus::PendingEvaluation
            | ClientStatus::EvaluationComplete
            | ClientStatus::EvaluationFlagged => Some(Workflow::Evaluation),
            ClientStatus::PendingOutreach
            | ClientStatus::OutreachSent
            | ClientStatus::FollowUp1
            | ClientStatus::FollowUp2
            | ClientStatus::Replied => Some(Workflow::Outreach),
            ClientStatus::ReadyToSchedule | ClientStatus::Scheduled | ClientStatus::Completed => {
                Some(Workflow::Scheduling)
            }
            ClientStatus::PendingReferral | ClientStatus::Referred => Some(Workflow::Referral),
            ClientStatus::ClosedNoContact | ClientStatus::ClosedOther | ClientStatus::Duplicate => {
                None
            }
        }
    }

    /// Whether a plain forward transition from `self` to `next` is allowed.
    ///
    /// Closure, duplicate and reopen are separate paths and never pass here.
    pub fn can_advance_to(&self, next: ClientStatus) -> bool {
        match (self.stage(), next.stage()) {
            (Some(current), Some(target)) => {
                // Jumping between the scheduling and referral branches is not forward
                let crosses_branch = matches!(
                    (self.workflow(), next.workflow()),
                    (Some(Workflow::Scheduling), Some(Workflow::Referral))
                        | (Some(Workflow::Referral), Some(Workflow::Scheduling))
                );
                target >= current && !crosses_branch
            }
            _ => false,
        }
    }
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClientStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Unknown client status: {}", s))
    }
}

/// Workflow a client was in when it was closed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Workflow {
    Evaluation,
    Outreach,
    Scheduling,
    Referral,
}

impl Workflow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Workflow::Evaluation => "evaluation",
            Workflow::Outreach => "outreach",
            Workflow::Scheduling => "scheduling",
            Workflow::Referral => "referral",
        }
    }

    /// Status a reopened client re-enters the workflow with.
    pub fn entry_status(&self) -> ClientStatus {
        match self {
            Workflow::Evaluation => ClientStatus::PendingEvaluation,
            Workflow::Outreach => ClientStatus::PendingOutreach,
            Workflow::Scheduling => ClientStatus::ReadyToSchedule,
            Workflow::Referral => ClientStatus::PendingReferral,
        }
    }
}

impl FromStr for Workflow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "evaluation" => Ok(Workflow::Evaluation),
            "outreach" => Ok(Workflow::Outreach),
            "scheduling" => Ok(Workflow::Scheduling),
            "referral" => Ok(Workflow::Referral),
            _ => Err(format!("Unknown workflow: {}", s)),
        }
    }
}

/// One reopen of a closed client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReopenEvent {
    pub reopened_at: String,
    pub reopened_by: String,
    pub reason: Option<String>,
    pub previous_status: ClientStatus,
    pub previous_closed_date: Option<String>,
    pub previous_closed_reason: Option<String>,
}

/// Intake submission: identity plus the answers captured by the intake form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NewClient {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub age: Option<String>,
    pub payment_type: Option<String>,
    pub insurance_provider: Option<String>,
    pub insurance_member_id: Option<String>,
    pub requested_clinician: Option<String>,
    pub presenting_concerns: Option<String>,
    pub suicide_attempt_recent: Option<String>,
    pub psychiatric_hospitalization: Option<String>,
    pub additional_info: Option<String>,
    pub intake_source: Option<String>,
}

/// A client record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: String,
    pub status: ClientStatus,

    // Identity
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,

    // Intake answers
    pub age: Option<String>,
    pub payment_type: Option<String>,
    pub insurance_provider: Option<String>,
    pub insurance_member_id: Option<String>,
    pub requested_clinician: Option<String>,
    pub presenting_concerns: Option<String>,
    pub suicide_attempt_recent: Option<String>,
    pub psychiatric_hospitalization: Option<String>,
    pub additional_info: Option<String>,
    pub intake_source: Option<String>,

    // Evaluation
    pub evaluation_score: Option<String>,
    pub evaluation_notes: Option<String>,
    #[serde(default)]
    pub matched_criteria_ids: Vec<String>,
    #[serde(default)]
    pub is_duplicate: bool,
    pub duplicate_of_client_id: Option<String>,
    pub evaluated_at: Option<String>,

    // Communication
    pub initial_outreach_date: Option<String>,
    pub follow_up_1_date: Option<String>,
    pub follow_up_2_date: Option<String>,
    pub last_contact_date: Option<String>,
    pub replied_date: Option<String>,

    // Scheduling
    pub assigned_clinician: Option<String>,
    pub scheduled_date: Option<String>,

    // Referral
    pub referral_clinic_id: Option<String>,
    pub referral_date: Option<String>,

    // Closure
    pub closed_date: Option<String>,
    pub closed_reason: Option<String>,
    pub closed_from_workflow: Option<Workflow>,
    #[serde(default)]
    pub reopen_history: Vec<ReopenEvent>,

    pub created_at: String,
    pub updated_at: String,
}

impl Client {
    /// Create a client from an intake submission.
    pub fn new(intake: NewClient) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: ClientStatus::New,
            first_name: intake.first_name,
            last_name: intake.last_name,
            email: intake.email,
            phone: intake.phone,
            date_of_birth: intake.date_of_birth,
            age: intake.age,
            payment_type: intake.payment_type,
            insurance_provider: intake.insurance_provider,
            insurance_member_id: intake.insurance_member_id,
            requested_clinician: intake.requested_clinician,
            presenting_concerns: intake.presenting_concerns,
            suicide_attempt_recent: intake.suicide_attempt_recent,
            psychiatric_hospitalization: intake.psychiatric_hospitalization,
            additional_info: intake.additional_info,
            intake_source: intake.intake_source,
            evaluation_score: None,
            evaluation_notes: None,
            matched_criteria_ids: Vec::new(),
            is_duplicate: false,
            duplicate_of_client_id: None,
            evaluated_at: None,
            initial_outreach_date: None,
            follow_up_1_date: None,
            follow_up_2_date: None,
            last_contact_date: None,
            replied_date: None,
            assigned_clinician: None,
            scheduled_date: None,
            referral_clinic_id: None,
            referral_date: None,
            closed_date: None,
            closed_reason: None,
            closed_from_workflow: None,
            reopen_history: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Display name.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    /// Terminal until reopened.
    pub fn is_closed(&self) -> bool {
        self.closed_date.is_some()
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

impl Entity for Client {
    const ENTITY_TYPE: EntityType = EntityType::Client;
    // Lifecycle fields only move through the service's transition paths
    const IMMUTABLE_FIELDS: &'static [&'static str] = &[
        "id",
        "createdAt",
        "status",
        "closedDate",
        "closedFromWorkflow",
        "reopenHistory",
    ];

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_client() {
        let client = Client::new(NewClient {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            ..Default::default()
        });
        assert_eq!(client.status, ClientStatus::New);
        assert_eq!(client.id.len(), 36);
        assert_eq!(client.full_name(), "Ada Lovelace");
        assert!(!client.is_closed());
        assert_eq!(client.created_at, client.updated_at);
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&ClientStatus::FollowUp1).unwrap(),
            "\"follow_up_1\""
        );
        for status in ClientStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(status.as_str().parse::<ClientStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_forward_transitions() {
        use ClientStatus::*;
        assert!(New.can_advance_to(PendingEvaluation));
        assert!(EvaluationComplete.can_advance_to(EvaluationFlagged));
        assert!(OutreachSent.can_advance_to(FollowUp2));
        assert!(Replied.can_advance_to(PendingReferral));

        assert!(!FollowUp1.can_advance_to(OutreachSent));
        assert!(!Scheduled.can_advance_to(Referred));
        assert!(!New.can_advance_to(ClosedOther));
        assert!(!Duplicate.can_advance_to(New));
    }

    #[test]
    fn test_workflow_entry_status() {
        assert_eq!(
            ClientStatus::FollowUp2.workflow().unwrap().entry_status(),
            ClientStatus::PendingOutreach
        );
        assert_eq!(ClientStatus::ClosedNoContact.workflow(), None);
    }

    #[test]
    fn test_client_json_is_camel_case() {
        let client = Client::new(NewClient::default());
        let value = serde_json::to_value(&client).unwrap();
        assert!(value.get("firstName").is_some());
        assert!(value.get("follow_up_1_date").is_none());
        assert!(value.get("followUp1Date").is_some());
        assert_eq!(value["isDuplicate"], false);
    }
}
