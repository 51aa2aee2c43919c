// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Entity data providers: where merge values come from.
//
// The HR/payroll system owns employee records; the workflow only needs a
// flat `field -> value` view of one entity at generation time.

use std::collections::HashMap;
use std::path::Path;

use docseal_core::error::{DocsealError, Result};
use docseal_core::types::EntityData;
use serde_json::Value;
use tracing::{debug, info, instrument};

/// Source of entity field values.
pub trait EntityProvider: Send + Sync {
    /// Field values for `entity_id`, `EntityNotFound` if unknown.
    fn get_entity(&self, entity_id: &str) -> Result<EntityData>;
}

/// Provider over a fixed set of entities, typically loaded from JSON.
#[derive(Debug, Clone, Default)]
pub struct StaticEntityProvider {
    entities: HashMap<String, EntityData>,
}

impl StaticEntityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, id: impl Into<String>, data: EntityData) -> Self {
        self.entities.insert(id.into(), data);
        self
    }

    /// Parse `{"EMP001": {"name": "Ahmed Ali", "salary": 15000}, ...}`.
    ///
    /// Strings, numbers and booleans become text; nested values and nulls
    /// are rejected.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let parsed: HashMap<String, serde_json::Map<String, Value>> = serde_json::from_str(raw)?;
        let mut entities = HashMap::with_capacity(parsed.len());
        for (id, fields) in parsed {
            let mut data = EntityData::new();
            for (field, value) in fields {
                let text = match value {
                    Value::String(s) => s,
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    Value::Null | Value::Array(_) | Value::Object(_) => {
                        return Err(DocsealError::BadRequest(format!(
                            "entity {id} field {field} is not a scalar"
                        )));
                    }
                };
                data.insert(field, text);
            }
            entities.insert(id, data);
        }
        Ok(Self { entities })
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let provider = Self::from_json_str(&raw)?;
        info!(count = provider.entities.len(), "entities loaded");
        Ok(provider)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl EntityProvider for StaticEntityProvider {
    fn get_entity(&self, entity_id: &str) -> Result<EntityData> {
        debug!(entity_id, "entity lookup");
        self.entities
            .get(entity_id)
            .cloned()
            .ok_or_else(|| DocsealError::EntityNotFound(entity_id.to_owned()))
    }
}
