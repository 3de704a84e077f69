//! Typed accessor for the client fields criteria may test.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::models::Client;

use super::{EvaluationError, EvaluationResult};

/// Client fields available to evaluation criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ClientField {
    FirstName,
    LastName,
    Email,
    Phone,
    Age,
    PaymentType,
    InsuranceProvider,
    RequestedClinician,
    PresentingConcerns,
    SuicideAttemptRecent,
    PsychiatricHospitalization,
    AdditionalInfo,
}

impl ClientField {
    pub const ALL: [ClientField; 12] = [
        ClientField::FirstName,
        ClientField::LastName,
        ClientField::Email,
        ClientField::Phone,
        ClientField::Age,
        ClientField::PaymentType,
        ClientField::InsuranceProvider,
        ClientField::RequestedClinician,
        ClientField::PresentingConcerns,
        ClientField::SuicideAttemptRecent,
        ClientField::PsychiatricHospitalization,
        ClientField::AdditionalInfo,
    ];

    /// Wire name of the field.
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientField::FirstName => "firstName",
            ClientField::LastName => "lastName",
            ClientField::Email => "email",
            ClientField::Phone => "phone",
            ClientField::Age => "age",
            ClientField::PaymentType => "paymentType",
            ClientField::InsuranceProvider => "insuranceProvider",
            ClientField::RequestedClinician => "requestedClinician",
            ClientField::PresentingConcerns => "presentingConcerns",
            ClientField::SuicideAttemptRecent => "suicideAttemptRecent",
            ClientField::PsychiatricHospitalization => "psychiatricHospitalization",
            ClientField::AdditionalInfo => "additionalInfo",
        }
    }

    /// Read the field off a client. Absent optional answers read as None.
    pub fn read<'a>(&self, client: &'a Client) -> Option<&'a str> {
        match self {
            ClientField::FirstName => Some(client.first_name.as_str()),
            ClientField::LastName => Some(client.last_name.as_str()),
            ClientField::Email => client.email.as_deref(),
            ClientField::Phone => client.phone.as_deref(),
            ClientField::Age => client.age.as_deref(),
            ClientField::PaymentType => client.payment_type.as_deref(),
            ClientField::InsuranceProvider => client.insurance_provider.as_deref(),
            ClientField::RequestedClinician => client.requested_clinician.as_deref(),
            ClientField::PresentingConcerns => client.presenting_concerns.as_deref(),
            ClientField::SuicideAttemptRecent => client.suicide_attempt_recent.as_deref(),
            ClientField::PsychiatricHospitalization => client.psychiatric_hospitalization.as_deref(),
            ClientField::AdditionalInfo => client.additional_info.as_deref(),
        }
    }
}

impl fmt::Display for ClientField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientField {
    type Err = EvaluationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClientField::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| EvaluationError::FieldNotAllowed(s.to_string()))
    }
}

/// Set of client fields a caller permits criteria to reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldWhitelist {
    fields: BTreeSet<ClientField>,
}

impl Default for FieldWhitelist {
    fn default() -> Self {
        Self::all()
    }
}

impl FieldWhitelist {
    /// Every evaluable client field.
    pub fn all() -> Self {
        Self {
            fields: ClientField::ALL.into_iter().collect(),
        }
    }

    /// Whitelist from wire names; any unknown name is rejected.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> EvaluationResult<Self> {
        let fields = names
            .iter()
            .map(|name| name.as_ref().parse::<ClientField>())
            .collect::<EvaluationResult<BTreeSet<_>>>()?;
        Ok(Self { fields })
    }

    pub fn contains(&self, field: ClientField) -> bool {
        self.fields.contains(&field)
    }

    /// Resolve a criteria field name, rejecting anything outside the whitelist.
    pub fn resolve(&self, name: &str) -> EvaluationResult<ClientField> {
        let field: ClientField = name.parse()?;
        if self.contains(field) {
            Ok(field)
        } else {
            Err(EvaluationError::FieldNotAllowed(name.to_string()))
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = ClientField> + '_ {
        self.fields.iter().copied()
    }
}
