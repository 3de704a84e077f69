//! Email template models and placeholder rendering.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use super::{Client, Entity, EntityType};

/// Workflow stage a template is used for. One template per type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TemplateType {
    InitialOutreach,
    #[serde(rename = "follow_up_1")]
    FollowUp1,
    #[serde(rename = "follow_up_2")]
    FollowUp2,
    Referral,
    SchedulingConfirmation,
    Closure,
}

impl TemplateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateType::InitialOutreach => "initial_outreach",
            TemplateType::FollowUp1 => "follow_up_1",
            TemplateType::FollowUp2 => "follow_up_2",
            TemplateType::Referral => "referral",
            TemplateType::SchedulingConfirmation => "scheduling_confirmation",
            TemplateType::Closure => "closure",
        }
    }

    /// Template used for outreach attempt `number`.
    pub fn for_attempt(number: u32) -> Self {
        match number {
            0 | 1 => TemplateType::InitialOutreach,
            2 => TemplateType::FollowUp1,
            _ => TemplateType::FollowUp2,
        }
    }
}

impl FromStr for TemplateType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initial_outreach" => Ok(TemplateType::InitialOutreach),
            "follow_up_1" => Ok(TemplateType::FollowUp1),
            "follow_up_2" => Ok(TemplateType::FollowUp2),
            "referral" => Ok(TemplateType::Referral),
            "scheduling_confirmation" => Ok(TemplateType::SchedulingConfirmation),
            "closure" => Ok(TemplateType::Closure),
            _ => Err(format!("Unknown template type: {}", s)),
        }
    }
}

/// Input for a new email template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewEmailTemplate {
    #[serde(rename = "type")]
    pub template_type: TemplateType,
    pub name: String,
    pub subject: String,
    pub body: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// A stored email template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmailTemplate {
    pub id: String,
    #[serde(rename = "type")]
    pub template_type: TemplateType,
    pub name: String,
    pub subject: String,
    pub body: String,
    pub is_active: bool,
    pub updated_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Subject and body after placeholder substitution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedEmail {
    pub subject: String,
    pub body: String,
}

impl EmailTemplate {
    /// Create a template.
    pub fn new(input: NewEmailTemplate, updated_by: Option<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            template_type: input.template_type,
            name: input.name,
            subject: input.subject,
            body: input.body,
            is_active: input.is_active,
            updated_by,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Render subject and body with `{{placeholder}}` substitution.
    pub fn render(&self, values: &BTreeMap<String, String>) -> RenderedEmail {
        RenderedEmail {
            subject: render_placeholders(&self.subject, values),
            body: render_placeholders(&self.body, values),
        }
    }
}

impl Entity for EmailTemplate {
    const ENTITY_TYPE: EntityType = EntityType::EmailTemplate;
    const IMMUTABLE_FIELDS: &'static [&'static str] = &["id", "createdAt", "type"];

    fn id(&self) -> &str {
        &self.id
    }
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z][A-Za-z0-9_]*)\s*\}\}").expect("placeholder pattern is valid")
    })
}

/// Replace known `{{name}}` placeholders; unknown ones are left as written.
pub fn render_placeholders(text: &str, values: &BTreeMap<String, String>) -> String {
    placeholder_pattern()
        .replace_all(text, |caps: &Captures| match values.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Placeholder values drawn from a client record.
pub fn client_placeholders(client: &Client) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    values.insert("firstName".to_string(), client.first_name.clone());
    values.insert("lastName".to_string(), client.last_name.clone());
    values.insert("fullName".to_string(), client.full_name());

    let optional = [
        ("email", &client.email),
        ("phone", &client.phone),
        ("requestedClinician", &client.requested_clinician),
        ("assignedClinician", &client.assigned_clinician),
        ("scheduledDate", &client.scheduled_date),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            values.insert(key.to_string(), value.clone());
        }
    }
    values
}
