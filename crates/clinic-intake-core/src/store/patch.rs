//! Partial-merge updates over an entity's JSON form.

use serde_json::{Map, Value};

use crate::models::Entity;

use super::{StoreError, StoreResult};

/// Partial update: camelCase field name → new value.
pub type Patch = Map<String, Value>;

/// Merge `patch` into `current`. Only supplied keys change.
///
/// Immutable keys, keys the entity does not have and values of the wrong
/// type are validation errors. `updatedAt` is refreshed when present.
pub fn apply_patch<T: Entity>(current: &T, patch: &Patch) -> StoreResult<T> {
    let mut value = serde_json::to_value(current)?;
    let object = value
        .as_object_mut()
        .ok_or_else(|| StoreError::Corrupt(format!("{} is not a JSON object", current.id())))?;

    for (key, new_value) in patch {
        if T::IMMUTABLE_FIELDS.contains(&key.as_str()) {
            return Err(StoreError::Validation(format!("{} cannot be changed", key)));
        }
        if !object.contains_key(key) {
            return Err(StoreError::Validation(format!("Unknown field: {}", key)));
        }
        object.insert(key.clone(), new_value.clone());
    }

    if object.contains_key("updatedAt") {
        object.insert(
            "updatedAt".to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );
    }

    serde_json::from_value(value).map_err(|e| StoreError::Validation(format!("Invalid update: {}", e)))
}

/// Build a patch from a JSON object literal.
pub fn patch_from_value(value: Value) -> StoreResult<Patch> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Validation(format!(
            "Update must be a JSON object, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Client, NewClient};
    use serde_json::json;

    fn client() -> Client {
        Client::new(NewClient {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: Some("ada@example.org".into()),
            ..Default::default()
        })
    }

    #[test]
    fn test_only_supplied_fields_change() {
        let original = client();
        let patch = patch_from_value(json!({"phone": "555-0100", "email": null})).unwrap();
        let updated = apply_patch(&original, &patch).unwrap();

        assert_eq!(updated.phone.as_deref(), Some("555-0100"));
        assert_eq!(updated.email, None);
        assert_eq!(updated.first_name, "Ada");
        assert_eq!(updated.id, original.id);
        assert_eq!(updated.created_at, original.created_at);
    }

    #[test]
    fn test_immutable_and_unknown_fields_rejected() {
        let original = client();
        for patch in [json!({"id": "other"}), json!({"status": "closed_other"}), json!({"nickname": "A"})] {
            let err = apply_patch(&original, &patch_from_value(patch).unwrap()).unwrap_err();
            assert!(matches!(err, StoreError::Validation(_)));
        }
    }

    #[test]
    fn test_mistyped_value_rejected() {
        let patch = patch_from_value(json!({"isDuplicate": "yes"})).unwrap();
        assert!(matches!(
            apply_patch(&client(), &patch),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_patch_must_be_object() {
        assert!(patch_from_value(json!(["firstName"])).is_err());
    }
}
