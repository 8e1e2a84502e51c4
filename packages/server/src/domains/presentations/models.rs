//! Templates, decks, and their immutable spec versions.
//!
//! Templates and decks point at a current version; versions reference
//! their parent by id. A tree, not a graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A presentation template owned by a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub current_version_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Template {
    pub fn new(tenant_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            name: name.into(),
            current_version_id: None,
            created_at: Utc::now(),
        }
    }
}

/// An immutable snapshot of a template spec.
///
/// The `spec` field holds whatever the storage layer handed back: the
/// document object, JSON text, or a base64-of-JSON string. Consumers
/// normalize before use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateVersion {
    pub id: String,
    pub tenant_id: String,
    pub template_id: String,
    pub version_number: i32,
    pub spec: serde_json::Value,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl TemplateVersion {
    pub fn new(
        tenant_id: impl Into<String>,
        template_id: impl Into<String>,
        version_number: i32,
        spec: serde_json::Value,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            template_id: template_id.into(),
            version_number,
            spec,
            created_by: created_by.into(),
            created_at: Utc::now(),
        }
    }
}

/// A deck: a template bound to concrete content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deck {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub current_version_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Deck {
    pub fn new(tenant_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            name: name.into(),
            current_version_id: None,
            created_at: Utc::now(),
        }
    }
}

/// An immutable snapshot of a bound deck spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeckVersion {
    pub id: String,
    pub tenant_id: String,
    pub deck_id: String,
    pub version_number: i32,
    pub spec: serde_json::Value,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl DeckVersion {
    pub fn new(
        tenant_id: impl Into<String>,
        deck_id: impl Into<String>,
        version_number: i32,
        spec: serde_json::Value,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            deck_id: deck_id.into(),
            version_number,
            spec,
            created_by: created_by.into(),
            created_at: Utc::now(),
        }
    }
}
