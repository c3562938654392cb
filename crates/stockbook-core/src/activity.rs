//! # Activity Entries
//!
//! Builds the audit record written alongside every mutation.
//!
//! ## Metadata Shape
//! ```text
//! create  →  { "after":  <record> }
//! update  →  { "before": <record>, "after": <record>,
//!              "changes": { "<field>": { "from": .., "to": .. }, .. } }
//! delete  →  { "before": <record> }
//! ```
//!
//! `updated_at` is left out of `changes`: it differs on every update.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use ts_rs::TS;

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Create,
    Update,
    Delete,
}

/// Table an activity entry or change event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Product,
    Manufacturer,
    Category,
    Customer,
    Booking,
    User,
}

impl EntityType {
    pub const ALL: [EntityType; 6] = [
        EntityType::Product,
        EntityType::Manufacturer,
        EntityType::Category,
        EntityType::Customer,
        EntityType::Booking,
        EntityType::User,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            EntityType::Product => "product",
            EntityType::Manufacturer => "manufacturer",
            EntityType::Category => "category",
            EntityType::Customer => "customer",
            EntityType::Booking => "booking",
            EntityType::User => "user",
        }
    }

    /// Table name in the database.
    pub const fn table(&self) -> &'static str {
        match self {
            EntityType::Product => "products",
            EntityType::Manufacturer => "manufacturers",
            EntityType::Category => "categories",
            EntityType::Customer => "customers",
            EntityType::Booking => "bookings",
            EntityType::User => "users",
        }
    }

    /// Accepts either the entity name or its table name.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_lowercase();
        EntityType::ALL
            .into_iter()
            .find(|e| e.as_str() == value || e.table() == value)
    }
}

// =============================================================================
// Activity Entry
// =============================================================================

/// An activity record before it is stamped with id, user, and time.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEntry {
    pub action_type: ActionType,
    pub entity_type: EntityType,
    pub entity_id: Option<String>,
    pub description: String,
    pub metadata: Value,
}

impl ActivityEntry {
    pub fn created(
        entity_type: EntityType,
        entity_id: impl Into<String>,
        description: impl Into<String>,
        after: Value,
    ) -> Self {
        ActivityEntry {
            action_type: ActionType::Create,
            entity_type,
            entity_id: Some(entity_id.into()),
            description: description.into(),
            metadata: json!({ "after": after }),
        }
    }

    pub fn updated(
        entity_type: EntityType,
        entity_id: impl Into<String>,
        description: impl Into<String>,
        before: Value,
        after: Value,
    ) -> Self {
        let changes = diff_changes(&before, &after);
        ActivityEntry {
            action_type: ActionType::Update,
            entity_type,
            entity_id: Some(entity_id.into()),
            description: description.into(),
            metadata: json!({ "before": before, "after": after, "changes": changes }),
        }
    }

    pub fn deleted(
        entity_type: EntityType,
        entity_id: impl Into<String>,
        description: impl Into<String>,
        before: Value,
    ) -> Self {
        ActivityEntry {
            action_type: ActionType::Delete,
            entity_type,
            entity_id: Some(entity_id.into()),
            description: description.into(),
            metadata: json!({ "before": before }),
        }
    }

    /// Entry for an operation spanning many records (CSV import).
    pub fn bulk(
        action_type: ActionType,
        entity_type: EntityType,
        description: impl Into<String>,
        metadata: Value,
    ) -> Self {
        ActivityEntry {
            action_type,
            entity_type,
            entity_id: None,
            description: description.into(),
            metadata,
        }
    }
}

/// Field-level differences between two JSON objects.
///
/// Keys present on either side are compared; a key missing on one side
/// shows as `null` there. Non-object inputs yield an empty map.
pub fn diff_changes(before: &Value, after: &Value) -> Map<String, Value> {
    let mut changes = Map::new();
    let (Some(before), Some(after)) = (before.as_object(), after.as_object()) else {
        return changes;
    };

    let keys = before.keys().chain(after.keys().filter(|k| !before.contains_key(*k)));
    for key in keys {
        if key == "updated_at" {
            continue;
        }
        let from = before.get(key).unwrap_or(&Value::Null);
        let to = after.get(key).unwrap_or(&Value::Null);
        if from != to {
            changes.insert(key.clone(), json!({ "from": from, "to": to }));
        }
    }

    changes
}

// =============================================================================
// Unit Tests
// =============================================================================
