//! Sheet layouts. Column names are the entities' camelCase JSON keys.

use clinic_intake_sheets::{Column, SheetSchema};

pub const CLIENTS: SheetSchema = SheetSchema {
    name: "Clients",
    columns: &[
        Column::text("id"),
        Column::text("status"),
        Column::text("firstName"),
        Column::text("lastName"),
        Column::optional("email"),
        Column::optional("phone"),
        Column::optional("dateOfBirth"),
        Column::optional("age"),
        Column::optional("paymentType"),
        Column::optional("insuranceProvider"),
        Column::optional("insuranceMemberId"),
        Column::optional("requestedClinician"),
        Column::optional("presentingConcerns"),
        Column::optional("suicideAttemptRecent"),
        Column::optional("psychiatricHospitalization"),
        Column::optional("additionalInfo"),
        Column::optional("intakeSource"),
        Column::optional("evaluationScore"),
        Column::optional("evaluationNotes"),
        Column::json("matchedCriteriaIds"),
        Column::json("isDuplicate"),
        Column::optional("duplicateOfClientId"),
        Column::optional("evaluatedAt"),
        Column::optional("initialOutreachDate"),
        Column::optional("followUp1Date"),
        Column::optional("followUp2Date"),
        Column::optional("lastContactDate"),
        Column::optional("repliedDate"),
        Column::optional("assignedClinician"),
        Column::optional("scheduledDate"),
        Column::optional("referralClinicId"),
        Column::optional("referralDate"),
        Column::optional("closedDate"),
        Column::optional("closedReason"),
        Column::optional("closedFromWorkflow"),
        Column::json("reopenHistory"),
        Column::text("createdAt"),
        Column::text("updatedAt"),
    ],
};

pub const CRITERIA: SheetSchema = SheetSchema {
    name: "EvaluationCriteria",
    columns: &[
        Column::text("id"),
        Column::text("name"),
        Column::optional("description"),
        Column::text("field"),
        Column::text("operator"),
        Column::text("value"),
        Column::text("action"),
        Column::json("priority"),
        Column::json("isActive"),
        Column::optional("createdBy"),
        Column::text("createdAt"),
        Column::text("updatedAt"),
    ],
};

pub const OUTREACH: SheetSchema = SheetSchema {
    name: "OutreachAttempts",
    columns: &[
        Column::text("id"),
        Column::text("clientId"),
        Column::json("attemptNumber"),
        Column::text("attemptType"),
        Column::text("status"),
        Column::optional("scheduledDate"),
        Column::optional("sentDate"),
        Column::optional("emailSubject"),
        Column::optional("emailBody"),
        Column::optional("emailMessageId"),
        Column::optional("notes"),
        Column::text("createdAt"),
        Column::text("updatedAt"),
    ],
};

pub const CLINICS: SheetSchema = SheetSchema {
    name: "ReferralClinics",
    columns: &[
        Column::text("id"),
        Column::text("practiceName"),
        Column::optional("contactName"),
        Column::optional("email"),
        Column::optional("phone"),
        Column::optional("address"),
        Column::optional("website"),
        Column::json("specialties"),
        Column::json("acceptedInsurance"),
        Column::optional("notes"),
        Column::json("customFields"),
        Column::json("isActive"),
        Column::text("createdAt"),
        Column::text("updatedAt"),
    ],
};

pub const TEMPLATES: SheetSchema = SheetSchema {
    name: "EmailTemplates",
    columns: &[
        Column::text("id"),
        Column::text("type"),
        Column::text("name"),
        Column::text("subject"),
        Column::text("body"),
        Column::json("isActive"),
        Column::optional("updatedBy"),
        Column::text("createdAt"),
        Column::text("updatedAt"),
    ],
};

pub const SETTINGS: SheetSchema = SheetSchema {
    name: "Settings",
    columns: &[
        Column::text("key"),
        Column::text("value"),
        Column::text("updatedAt"),
        Column::optional("updatedBy"),
    ],
};

pub const AUDIT_LOG: SheetSchema = SheetSchema {
    name: "AuditLog",
    columns: &[
        Column::text("id"),
        Column::text("timestamp"),
        Column::text("actorId"),
        Column::optional("actorEmail"),
        Column::text("action"),
        Column::text("entityType"),
        Column::text("entityId"),
        Column::json("previousValue"),
        Column::json("newValue"),
        Column::optional("previousHash"),
        Column::text("entryHash"),
    ],
};
