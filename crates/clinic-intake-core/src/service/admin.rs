use std::collections::BTreeMap;

use super::{require_admin, snapshot, Actor, IntakeService, ServiceError, ServiceResult};
use crate::models::{
    client_placeholders, parse_outreach_attempt_count, AuditAction, EmailTemplate, EntityType,
    NewEmailTemplate, NewReferralClinic, ReferralClinic, ReferralClinicsConfig, RenderedEmail,
    Setting, TemplateType, OUTREACH_ATTEMPT_COUNT, REFERRAL_CLINICS_CONFIG,
};
use crate::store::{apply_patch, Patch};

impl IntakeService {
    // =========================================================================
    // Referral clinics
    // =========================================================================

    pub fn list_clinics(&self) -> ServiceResult<Vec<ReferralClinic>> {
        Ok(self.backend.list_clinics()?)
    }

    pub fn get_clinic(&self, id: &str) -> ServiceResult<ReferralClinic> {
        self.backend
            .get_clinic(id)?
            .ok_or_else(|| ServiceError::not_found(EntityType::ReferralClinic, id))
    }

    pub fn create_clinic(&self, actor: &Actor, input: NewReferralClinic) -> ServiceResult<ReferralClinic> {
        if input.practice_name.trim().is_empty() {
            return Err(ServiceError::Validation("practice name is required".into()));
        }
        self.check_custom_fields(&input.custom_fields)?;

        let created = self.backend.create_clinic(input)?;
        self.audit(
            actor,
            AuditAction::Create,
            EntityType::ReferralClinic,
            &created.id,
            None,
            Some(snapshot(&created)?),
        )?;
        Ok(created)
    }

    pub fn update_clinic(&self, actor: &Actor, id: &str, patch: &Patch) -> ServiceResult<ReferralClinic> {
        let before = self.get_clinic(id)?;
        let merged = apply_patch(&before, patch)?;
        if merged.practice_name.trim().is_empty() {
            return Err(ServiceError::Validation("practice name is required".into()));
        }
        self.check_custom_fields(&merged.custom_fields)?;

        let after = self
            .backend
            .update_clinic(id, patch)?
            .ok_or_else(|| ServiceError::not_found(EntityType::ReferralClinic, id))?;
        self.audit(
            actor,
            AuditAction::Update,
            EntityType::ReferralClinic,
            id,
            Some(snapshot(&before)?),
            Some(snapshot(&after)?),
        )?;
        Ok(after)
    }

    pub fn delete_clinic(&self, actor: &Actor, id: &str) -> ServiceResult<()> {
        require_admin(actor, "delete referral clinics")?;
        let before = self.get_clinic(id)?;
        if !self.backend.delete_clinic(id)? {
            return Err(ServiceError::not_found(EntityType::ReferralClinic, id));
        }
        self.audit(
            actor,
            AuditAction::Delete,
            EntityType::ReferralClinic,
            id,
            Some(snapshot(&before)?),
            None,
        )
    }

    /// Custom field definitions shared by every clinic.
    pub fn referral_clinics_config(&self) -> ServiceResult<ReferralClinicsConfig> {
        match self.backend.get_setting(REFERRAL_CLINICS_CONFIG)? {
            Some(setting) => parse_clinics_config(&setting.value),
            None => Ok(ReferralClinicsConfig::default()),
        }
    }

    pub fn set_referral_clinics_config(
        &self,
        actor: &Actor,
        config: &ReferralClinicsConfig,
    ) -> ServiceResult<Setting> {
        let value = serde_json::to_string(config)?;
        self.set_setting(actor, REFERRAL_CLINICS_CONFIG, &value)
    }

    fn check_custom_fields(&self, values: &BTreeMap<String, String>) -> ServiceResult<()> {
        self.referral_clinics_config()?
            .validate_values(values)
            .map_err(|problems| ServiceError::Validation(problems.join("; ")))
    }

    // =========================================================================
    // Email templates
    // =========================================================================

    pub fn list_templates(&self) -> ServiceResult<Vec<EmailTemplate>> {
        Ok(self.backend.list_templates()?)
    }

    pub fn get_template(&self, template_type: TemplateType) -> ServiceResult<EmailTemplate> {
        self.backend
            .get_template_by_type(template_type)?
            .ok_or_else(|| ServiceError::not_found(EntityType::EmailTemplate, template_type.as_str()))
    }

    pub fn create_template(&self, actor: &Actor, input: NewEmailTemplate) -> ServiceResult<EmailTemplate> {
        require_admin(actor, "manage email templates")?;
        if input.name.trim().is_empty() || input.subject.trim().is_empty() {
            return Err(ServiceError::Validation("template name and subject are required".into()));
        }

        let created = self.backend.create_template(input, Some(actor.id.clone()))?;
        self.audit(
            actor,
            AuditAction::Create,
            EntityType::EmailTemplate,
            &created.id,
            None,
            Some(snapshot(&created)?),
        )?;
        Ok(created)
    }

    pub fn update_template(&self, actor: &Actor, id: &str, patch: &Patch) -> ServiceResult<EmailTemplate> {
        require_admin(actor, "manage email templates")?;
        let before = self
            .backend
            .get_template(id)?
            .ok_or_else(|| ServiceError::not_found(EntityType::EmailTemplate, id))?;

        let mut patch = patch.clone();
        patch.insert("updatedBy".into(), actor.id.clone().into());
        let after = self
            .backend
            .update_template(id, &patch)?
            .ok_or_else(|| ServiceError::not_found(EntityType::EmailTemplate, id))?;
        self.audit(
            actor,
            AuditAction::Update,
            EntityType::EmailTemplate,
            id,
            Some(snapshot(&before)?),
            Some(snapshot(&after)?),
        )?;
        Ok(after)
    }

    pub fn delete_template(&self, actor: &Actor, id: &str) -> ServiceResult<()> {
        require_admin(actor, "manage email templates")?;
        let before = self
            .backend
            .get_template(id)?
            .ok_or_else(|| ServiceError::not_found(EntityType::EmailTemplate, id))?;
        if !self.backend.delete_template(id)? {
            return Err(ServiceError::not_found(EntityType::EmailTemplate, id));
        }
        self.audit(
            actor,
            AuditAction::Delete,
            EntityType::EmailTemplate,
            id,
            Some(snapshot(&before)?),
            None,
        )
    }

    /// Render the active template of `template_type` for a client.
    ///
    /// `extras` (e.g. `clinicianName`) override client-derived values.
    pub fn render_template(
        &self,
        template_type: TemplateType,
        client_id: &str,
        extras: &BTreeMap<String, String>,
    ) -> ServiceResult<RenderedEmail> {
        let template = self.get_template(template_type)?;
        if !template.is_active {
            return Err(ServiceError::Validation(format!(
                "{} template is inactive",
                template_type.as_str()
            )));
        }
        let client = self.get_client(client_id)?;

        let mut values = client_placeholders(&client);
        values.extend(extras.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(template.render(&values))
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub fn list_settings(&self) -> ServiceResult<Vec<Setting>> {
        Ok(self.backend.list_settings()?)
    }

    pub fn get_setting(&self, key: &str) -> ServiceResult<Setting> {
        self.backend
            .get_setting(key)?
            .ok_or_else(|| ServiceError::not_found(EntityType::Setting, key))
    }

    /// Insert or replace a setting. Known keys are validated.
    pub fn set_setting(&self, actor: &Actor, key: &str, value: &str) -> ServiceResult<Setting> {
        require_admin(actor, "change settings")?;
        if key.trim().is_empty() {
            return Err(ServiceError::Validation("setting key is required".into()));
        }
        match key {
            OUTREACH_ATTEMPT_COUNT => {
                parse_outreach_attempt_count(value).map_err(ServiceError::Validation)?;
            }
            REFERRAL_CLINICS_CONFIG => {
                parse_clinics_config(value)?;
            }
            _ => {}
        }

        let before = self.backend.get_setting(key)?;
        let after = self.backend.set_setting(key, value, Some(actor.id.clone()))?;
        let action = if before.is_some() {
            AuditAction::Update
        } else {
            AuditAction::Create
        };
        self.audit(
            actor,
            action,
            EntityType::Setting,
            key,
            before.as_ref().map(snapshot).transpose()?,
            Some(snapshot(&after)?),
        )?;
        log::info!("Setting {} changed by {}", key, actor.id);
        Ok(after)
    }

    pub fn delete_setting(&self, actor: &Actor, key: &str) -> ServiceResult<()> {
        require_admin(actor, "change settings")?;
        let before = self.get_setting(key)?;
        self.backend.delete_setting(key)?;
        self.audit(
            actor,
            AuditAction::Delete,
            EntityType::Setting,
            key,
            Some(snapshot(&before)?),
            None,
        )
    }
}

fn parse_clinics_config(value: &str) -> ServiceResult<ReferralClinicsConfig> {
    let config: ReferralClinicsConfig = serde_json::from_str(value)
        .map_err(|e| ServiceError::Validation(format!("{} is not valid: {}", REFERRAL_CLINICS_CONFIG, e)))?;
    config.validate().map_err(ServiceError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::models::{CustomFieldDefinition, CustomFieldType};
    use crate::store::patch_from_value;
    use serde_json::json;

    fn clinic(name: &str) -> NewReferralClinic {
        NewReferralClinic {
            practice_name: name.into(),
            specialties: vec!["trauma".into(), "anxiety".into(), "trauma".into()],
            ..Default::default()
        }
    }

    fn config() -> ReferralClinicsConfig {
        ReferralClinicsConfig {
            custom_fields: vec![
                CustomFieldDefinition {
                    key: "fax".into(),
                    label: "Fax".into(),
                    field_type: CustomFieldType::Phone,
                    required: true,
                },
                CustomFieldDefinition {
                    key: "portal".into(),
                    label: "Portal".into(),
                    field_type: CustomFieldType::Url,
                    required: false,
                },
            ],
        }
    }

    #[test]
    fn test_clinic_custom_fields_validated() {
        let service = service();
        service.set_referral_clinics_config(&admin(), &config()).unwrap();
        assert_eq!(service.referral_clinics_config().unwrap(), config());

        let err = service.create_clinic(&staff(), clinic("Harbor")).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ref m) if m.contains("Fax")));

        let mut input = clinic("Harbor");
        input.custom_fields.insert("fax".into(), "555-010-0300".into());
        let created = service.create_clinic(&staff(), input).unwrap();
        assert_eq!(created.specialties, vec!["anxiety".to_string(), "trauma".to_string()]);

        let unknown = patch_from_value(json!({"customFields": {"fax": "555-010-0300", "color": "blue"}})).unwrap();
        assert!(matches!(
            service.update_clinic(&staff(), &created.id, &unknown),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn test_clinic_lifecycle() {
        let service = service();
        let created = service.create_clinic(&staff(), clinic("Harbor")).unwrap();
        let updated = service
            .update_clinic(&staff(), &created.id, &patch_from_value(json!({"phone": "555-0199"})).unwrap())
            .unwrap();
        assert_eq!(updated.phone.as_deref(), Some("555-0199"));

        assert!(matches!(
            service.delete_clinic(&staff(), &created.id),
            Err(ServiceError::Forbidden(_))
        ));
        service.delete_clinic(&admin(), &created.id).unwrap();
        assert!(service.list_clinics().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_clinics_config_rejected() {
        let service = service();
        assert!(matches!(
            service.set_setting(&admin(), REFERRAL_CLINICS_CONFIG, "{not json"),
            Err(ServiceError::Validation(_))
        ));
        let mut duplicate_keys = config();
        duplicate_keys.custom_fields[1].key = "fax".into();
        assert!(matches!(
            service.set_referral_clinics_config(&admin(), &duplicate_keys),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn test_render_template_for_client() {
        let service = service();
        service
            .create_template(
                &admin(),
                NewEmailTemplate {
                    template_type: TemplateType::InitialOutreach,
                    name: "Welcome".into(),
                    subject: "Hello {{firstName}}".into(),
                    body: "{{clinicianName}} will contact you. {{unknownThing}}".into(),
                    is_active: true,
                },
            )
            .unwrap();
        let client = service.create_client(&staff(), intake("Ada", "Lovelace")).unwrap();

        let mut extras = BTreeMap::new();
        extras.insert("clinicianName".to_string(), "Dr. Rivera".to_string());
        let rendered = service
            .render_template(TemplateType::InitialOutreach, &client.id, &extras)
            .unwrap();
        assert_eq!(rendered.subject, "Hello Ada");
        assert_eq!(rendered.body, "Dr. Rivera will contact you. {{unknownThing}}");

        assert!(matches!(
            service.render_template(TemplateType::Closure, &client.id, &extras),
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[test]
    fn test_templates_admin_only_and_unique() {
        let service = service();
        let input = NewEmailTemplate {
            template_type: TemplateType::Referral,
            name: "Referral".into(),
            subject: "Referral".into(),
            body: "body".into(),
            is_active: true,
        };
        assert!(matches!(
            service.create_template(&staff(), input.clone()),
            Err(ServiceError::Forbidden(_))
        ));
        let created = service.create_template(&admin(), input.clone()).unwrap();
        assert!(matches!(
            service.create_template(&admin(), input),
            Err(ServiceError::Validation(_))
        ));

        let updated = service
            .update_template(&admin(), &created.id, &patch_from_value(json!({"isActive": false})).unwrap())
            .unwrap();
        assert!(!updated.is_active);
        assert_eq!(updated.updated_by.as_deref(), Some("admin-1"));

        service.delete_template(&admin(), &created.id).unwrap();
        assert!(matches!(
            service.delete_template(&admin(), &created.id),
            Err(ServiceError::NotFound { .. })
        ));
        let deletes = service
            .audit_history(&admin(), EntityType::EmailTemplate, &created.id)
            .unwrap()
            .into_iter()
            .filter(|e| e.action == AuditAction::Delete)
            .count();
        assert_eq!(deletes, 1);
    }

    #[test]
    fn test_settings() {
        let service = service();
        assert!(matches!(
            service.set_setting(&staff(), OUTREACH_ATTEMPT_COUNT, "5"),
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.set_setting(&admin(), OUTREACH_ATTEMPT_COUNT, "11"),
            Err(ServiceError::Validation(_))
        ));

        service.set_setting(&admin(), OUTREACH_ATTEMPT_COUNT, "5").unwrap();
        service.set_setting(&admin(), OUTREACH_ATTEMPT_COUNT, "6").unwrap();
        assert_eq!(service.get_setting(OUTREACH_ATTEMPT_COUNT).unwrap().value, "6");
        assert_eq!(service.outreach_attempt_count().unwrap(), 6);

        let actions: Vec<AuditAction> = service
            .audit_history(&admin(), EntityType::Setting, OUTREACH_ATTEMPT_COUNT)
            .unwrap()
            .iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(actions, vec![AuditAction::Create, AuditAction::Update]);

        service.delete_setting(&admin(), OUTREACH_ATTEMPT_COUNT).unwrap();
        assert!(matches!(
            service.get_setting(OUTREACH_ATTEMPT_COUNT),
            Err(ServiceError::NotFound { .. })
        ));
    }
}
