//! Domain models for the clinic intake system.

mod audit;
mod client;
mod clinic;
mod criteria;
mod outreach;
mod settings;
mod template;

pub use audit::*;
pub use client::*;
pub use clinic::*;
pub use criteria::*;
pub use outreach::*;
pub use settings::*;
pub use template::*;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A stored entity with an id and a camelCase JSON form.
pub trait Entity: Serialize + DeserializeOwned + Clone {
    /// Entity type recorded in audit entries.
    const ENTITY_TYPE: EntityType;

    /// JSON keys a partial update may not change.
    const IMMUTABLE_FIELDS: &'static [&'static str] = &["id", "createdAt"];

    fn id(&self) -> &str;
}
