//! Referral clinic database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{parse_json, Database};
use crate::models::{NewReferralClinic, ReferralClinic};
use crate::store::{apply_patch, ClinicStore, Patch, StoreError, StoreResult};

const COLUMNS: &str = "id, practice_name, contact_name, email, phone, address, website, \
                       specialties, accepted_insurance, notes, custom_fields, is_active, \
                       created_at, updated_at";

impl Database {
    fn insert_clinic(&self, clinic: &ReferralClinic) -> StoreResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO referral_clinics ({}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                COLUMNS
            ),
            params![
                clinic.id,
                clinic.practice_name,
                clinic.contact_name,
                clinic.email,
                clinic.phone,
                clinic.address,
                clinic.website,
                serde_json::to_string(&clinic.specialties)?,
                serde_json::to_string(&clinic.accepted_insurance)?,
                clinic.notes,
                serde_json::to_string(&clinic.custom_fields)?,
                clinic.is_active,
                clinic.created_at,
                clinic.updated_at,
            ],
        )?;
        Ok(())
    }
}

impl ClinicStore for Database {
    fn list_clinics(&self) -> StoreResult<Vec<ReferralClinic>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM referral_clinics ORDER BY rowid", COLUMNS))?;
        let rows = stmt.query_map([], ClinicRow::read)?;

        let mut clinics = Vec::new();
        for row in rows {
            clinics.push(row?.try_into()?);
        }
        Ok(clinics)
    }

    fn get_clinic(&self, id: &str) -> StoreResult<Option<ReferralClinic>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM referral_clinics WHERE id = ?", COLUMNS),
                [id],
                ClinicRow::read,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    fn create_clinic(&self, input: NewReferralClinic) -> StoreResult<ReferralClinic> {
        let clinic = ReferralClinic::new(input);
        self.insert_clinic(&clinic)?;
        Ok(clinic)
    }

    fn update_clinic(&self, id: &str, patch: &Patch) -> StoreResult<Option<ReferralClinic>> {
        let Some(current) = self.get_clinic(id)? else {
            return Ok(None);
        };
        let mut updated = apply_patch(&current, patch)?;
        updated.normalize();

        self.conn.execute(
            r#"
            UPDATE referral_clinics SET
                practice_name = ?2,
                contact_name = ?3,
                email = ?4,
                phone = ?5,
                address = ?6,
                website = ?7,
                specialties = ?8,
                accepted_insurance = ?9,
                notes = ?10,
                custom_fields = ?11,
                is_active = ?12,
                updated_at = ?13
            WHERE id = ?1
            "#,
            params![
                updated.id,
                updated.practice_name,
                updated.contact_name,
                updated.email,
                updated.phone,
                updated.address,
                updated.website,
                serde_json::to_string(&updated.specialties)?,
                serde_json::to_string(&updated.accepted_insurance)?,
                updated.notes,
                serde_json::to_string(&updated.custom_fields)?,
                updated.is_active,
                updated.updated_at,
            ],
        )?;
        Ok(Some(updated))
    }

    fn delete_clinic(&self, id: &str) -> StoreResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM referral_clinics WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct ClinicRow {
    id: String,
    practice_name: String,
    contact_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    website: Option<String>,
    specialties: String,
    accepted_insurance: String,
    notes: Option<String>,
    custom_fields: String,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

impl ClinicRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            practice_name: row.get(1)?,
            contact_name: row.get(2)?,
            email: row.get(3)?,
            phone: row.get(4)?,
            address: row.get(5)?,
            website: row.get(6)?,
            specialties: row.get(7)?,
            accepted_insurance: row.get(8)?,
            notes: row.get(9)?,
            custom_fields: row.get(10)?,
            is_active: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }
}

impl TryFrom<ClinicRow> for ReferralClinic {
    type Error = StoreError;

    fn try_from(row: ClinicRow) -> Result<Self, Self::Error> {
        Ok(ReferralClinic {
            id: row.id,
            practice_name: row.practice_name,
            contact_name: row.contact_name,
            email: row.email,
            phone: row.phone,
            address: row.address,
            website: row.website,
            specialties: parse_json("referral_clinics.specialties", &row.specialties)?,
            accepted_insurance: parse_json("referral_clinics.accepted_insurance", &row.accepted_insurance)?,
            notes: row.notes,
            custom_fields: parse_json("referral_clinics.custom_fields", &row.custom_fields)?,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::patch_from_value;
    use serde_json::json;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn input(name: &str) -> NewReferralClinic {
        NewReferralClinic {
            practice_name: name.into(),
            specialties: vec!["Trauma".into(), "EMDR".into(), "Trauma".into()],
            custom_fields: [("intakeFax".to_string(), "555-0199".to_string())].into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_and_get_clinic() {
        let db = setup_db();
        let created = db.create_clinic(input("Harbor Counseling")).unwrap();

        let fetched = db.get_clinic(&created.id).unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.specialties.len(), 2);
        assert_eq!(fetched.custom_fields.get("intakeFax").map(String::as_str), Some("555-0199"));
    }

    #[test]
    fn test_update_keeps_order_and_set_semantics() {
        let db = setup_db();
        let first = db.create_clinic(input("First")).unwrap();
        db.create_clinic(input("Second")).unwrap();

        let patch = patch_from_value(json!({"specialties": ["Couples", "couples ", "Grief"]})).unwrap();
        let updated = db.update_clinic(&first.id, &patch).unwrap().unwrap();
        assert!(updated.has_specialty("grief"));

        let names: Vec<_> = db.list_clinics().unwrap().into_iter().map(|c| c.practice_name).collect();
        assert_eq!(names, vec!["First", "Second"]);
        assert_eq!(db.get_clinic(&first.id).unwrap().unwrap(), updated);
    }

    #[test]
    fn test_delete_clinic() {
        let db = setup_db();
        let created = db.create_clinic(input("Harbor")).unwrap();
        assert!(db.delete_clinic(&created.id).unwrap());
        assert!(!db.delete_clinic(&created.id).unwrap());
    }
}
