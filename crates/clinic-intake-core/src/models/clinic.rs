//! Referral clinic models and the clinic-wide custom field configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Entity, EntityType};

/// Input type of a custom field (drives form rendering and validation).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CustomFieldType {
    Text,
    Email,
    Phone,
    Url,
    Textarea,
}

/// Definition of one custom clinic field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomFieldDefinition {
    pub key: String,
    pub label: String,
    pub field_type: CustomFieldType,
    #[serde(default)]
    pub required: bool,
}

/// Process-wide set of custom fields every referral clinic carries.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReferralClinicsConfig {
    #[serde(default)]
    pub custom_fields: Vec<CustomFieldDefinition>,
}

impl ReferralClinicsConfig {
    /// Check the definitions themselves: keys non-empty and unique.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for field in &self.custom_fields {
            if field.key.trim().is_empty() {
                return Err("Custom field key cannot be empty".into());
            }
            if !seen.insert(field.key.as_str()) {
                return Err(format!("Duplicate custom field key: {}", field.key));
            }
        }
        Ok(())
    }

    /// Check a clinic's custom values against the definitions.
    ///
    /// Returns every problem found, not just the first.
    pub fn validate_values(&self, values: &BTreeMap<String, String>) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();

        for key in values.keys() {
            if !self.custom_fields.iter().any(|f| &f.key == key) {
                problems.push(format!("Unknown custom field: {}", key));
            }
        }

        for field in &self.custom_fields {
            let value = values.get(&field.key).map(|v| v.trim()).unwrap_or("");
            if value.is_empty() {
                if field.required {
                    problems.push(format!("Missing required custom field: {}", field.label));
                }
                continue;
            }
            let well_formed = match field.field_type {
                CustomFieldType::Email => value.contains('@'),
                CustomFieldType::Phone => value.chars().filter(|c| c.is_ascii_digit()).count() >= 7,
                CustomFieldType::Url => value.starts_with("http://") || value.starts_with("https://"),
                CustomFieldType::Text | CustomFieldType::Textarea => true,
            };
            if !well_formed {
                problems.push(format!("Invalid value for {}: {}", field.label, value));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}

/// Input for a new referral clinic.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NewReferralClinic {
    pub practice_name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub specialties: Vec<String>,
    pub accepted_insurance: Vec<String>,
    pub notes: Option<String>,
    pub custom_fields: BTreeMap<String, String>,
}

/// A practice clients can be referred out to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReferralClinic {
    pub id: String,
    pub practice_name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    #[serde(default)]
    pub specialties: Vec<String>,
    #[serde(default)]
    pub accepted_insurance: Vec<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl ReferralClinic {
    /// Create a clinic. Specialties are kept as a sorted set.
    pub fn new(input: NewReferralClinic) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            practice_name: input.practice_name,
            contact_name: input.contact_name,
            email: input.email,
            phone: input.phone,
            address: input.address,
            website: input.website,
            specialties: normalize_set(input.specialties),
            accepted_insurance: input.accepted_insurance,
            notes: input.notes,
            custom_fields: input.custom_fields,
            is_active: true,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Case-insensitive specialty lookup.
    pub fn has_specialty(&self, specialty: &str) -> bool {
        self.specialties
            .iter()
            .any(|s| s.eq_ignore_ascii_case(specialty.trim()))
    }

    /// Re-apply set semantics after a patch.
    pub fn normalize(&mut self) {
        self.specialties = normalize_set(std::mem::take(&mut self.specialties));
    }
}

fn normalize_set(values: Vec<String>) -> Vec<String> {
    let mut set: Vec<String> = values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    set.sort();
    set.dedup();
    set
}

impl Entity for ReferralClinic {
    const ENTITY_TYPE: EntityType = EntityType::ReferralClinic;

    fn id(&self) -> &str {
        &self.id
    }
}
