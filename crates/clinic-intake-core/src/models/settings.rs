//! Key/value settings.

use serde::{Deserialize, Serialize};

/// Number of outreach attempts pre-created per client (string-encoded integer).
pub const OUTREACH_ATTEMPT_COUNT: &str = "outreachAttemptCount";

/// JSON-encoded [`ReferralClinicsConfig`](super::ReferralClinicsConfig).
pub const REFERRAL_CLINICS_CONFIG: &str = "referralClinicsConfig";

pub const DEFAULT_OUTREACH_ATTEMPT_COUNT: u32 = 3;

/// Upper bound on pre-created outreach attempts.
pub const MAX_OUTREACH_ATTEMPT_COUNT: u32 = 10;

/// A stored setting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub updated_at: String,
    pub updated_by: Option<String>,
}

impl Setting {
    pub fn new(key: &str, value: &str, updated_by: Option<String>) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
            updated_at: chrono::Utc::now().to_rfc3339(),
            updated_by,
        }
    }
}

/// Parse the `outreachAttemptCount` setting value.
pub fn parse_outreach_attempt_count(value: &str) -> Result<u32, String> {
    let count: u32 = value
        .trim()
        .parse()
        .map_err(|_| format!("{} must be a whole number, got {:?}", OUTREACH_ATTEMPT_COUNT, value))?;
    if count == 0 || count > MAX_OUTREACH_ATTEMPT_COUNT {
        return Err(format!(
            "{} must be between 1 and {}, got {}",
            OUTREACH_ATTEMPT_COUNT, MAX_OUTREACH_ATTEMPT_COUNT, count
        ));
    }
    Ok(count)
}
