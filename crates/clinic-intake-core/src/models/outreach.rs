//! Outreach attempt models.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{ClientStatus, Entity, EntityType};

/// Kind of contact attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttemptType {
    InitialOutreach,
    FollowUp,
}

impl AttemptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptType::InitialOutreach => "initial_outreach",
            AttemptType::FollowUp => "follow_up",
        }
    }
}

/// Attempt status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Pending,
    Scheduled,
    Sent,
    Replied,
    Skipped,
    Failed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Pending => "pending",
            AttemptStatus::Scheduled => "scheduled",
            AttemptStatus::Sent => "sent",
            AttemptStatus::Replied => "replied",
            AttemptStatus::Skipped => "skipped",
            AttemptStatus::Failed => "failed",
        }
    }
}

impl FromStr for AttemptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AttemptStatus::Pending),
            "scheduled" => Ok(AttemptStatus::Scheduled),
            "sent" => Ok(AttemptStatus::Sent),
            "replied" => Ok(AttemptStatus::Replied),
            "skipped" => Ok(AttemptStatus::Skipped),
            "failed" => Ok(AttemptStatus::Failed),
            _ => Err(format!("Unknown attempt status: {}", s)),
        }
    }
}

/// Input for a single outreach attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewOutreachAttempt {
    pub client_id: String,
    pub attempt_number: u32,
    pub attempt_type: AttemptType,
    #[serde(default)]
    pub scheduled_date: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewOutreachAttempt {
    /// Pending attempt `number` of a client's sequence. Attempt 1 is the initial outreach.
    pub fn pending(client_id: &str, number: u32) -> Self {
        Self {
            client_id: client_id.to_string(),
            attempt_number: number,
            attempt_type: if number == 1 {
                AttemptType::InitialOutreach
            } else {
                AttemptType::FollowUp
            },
            scheduled_date: None,
            notes: None,
        }
    }
}

/// Email metadata recorded when an attempt is sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SentEmail {
    pub subject: Option<String>,
    pub body: Option<String>,
    pub message_id: Option<String>,
}

/// One contact event in a client's follow-up sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutreachAttempt {
    pub id: String,
    pub client_id: String,
    pub attempt_number: u32,
    pub attempt_type: AttemptType,
    pub status: AttemptStatus,
    pub scheduled_date: Option<String>,
    pub sent_date: Option<String>,
    pub email_subject: Option<String>,
    pub email_body: Option<String>,
    pub email_message_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl OutreachAttempt {
    /// Create a pending attempt.
    pub fn new(input: NewOutreachAttempt) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            client_id: input.client_id,
            attempt_number: input.attempt_number,
            attempt_type: input.attempt_type,
            status: AttemptStatus::Pending,
            scheduled_date: input.scheduled_date,
            sent_date: None,
            email_subject: None,
            email_body: None,
            email_message_id: None,
            notes: input.notes,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Client status reached once this attempt has been sent.
    pub fn client_status_after_send(&self) -> ClientStatus {
        match self.attempt_number {
            0 | 1 => ClientStatus::OutreachSent,
            2 => ClientStatus::FollowUp1,
            _ => ClientStatus::FollowUp2,
        }
    }
}

impl Entity for OutreachAttempt {
    const ENTITY_TYPE: EntityType = EntityType::OutreachAttempt;
    const IMMUTABLE_FIELDS: &'static [&'static str] =
        &["id", "createdAt", "clientId", "attemptNumber"];

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_attempt_types() {
        assert_eq!(
            NewOutreachAttempt::pending("c", 1).attempt_type,
            AttemptType::InitialOutreach
        );
        assert_eq!(
            NewOutreachAttempt::pending("c", 3).attempt_type,
            AttemptType::FollowUp
        );
    }

    #[test]
    fn test_status_after_send() {
        let mut attempt = OutreachAttempt::new(NewOutreachAttempt::pending("c", 1));
        assert_eq!(attempt.status, AttemptStatus::Pending);
        assert_eq!(attempt.client_status_after_send(), ClientStatus::OutreachSent);
        attempt.attempt_number = 2;
        assert_eq!(attempt.client_status_after_send(), ClientStatus::FollowUp1);
        attempt.attempt_number = 5;
        assert_eq!(attempt.client_status_after_send(), ClientStatus::FollowUp2);
    }
}
