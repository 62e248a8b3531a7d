#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::path::Path;

use adaptive_kernel_contracts::guardrail::GuardrailId;
use adaptive_kernel_contracts::{AdaptiveRefuse, ReasonId};
use serde::Deserialize;

use crate::canonicalize::refuse;

pub const DEFAULT_REGISTRY_JSON: &str = include_str!("../artifacts/guardrails_v3.json");

#[derive(Debug, Deserialize)]
struct RegistryDocument {
    version: String,
    guardrails: Vec<RegistryEntryDocument>,
}

#[derive(Debug, Deserialize)]
struct RegistryEntryDocument {
    id: String,
    title: String,
    category: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardrailEntry {
    pub title: String,
    pub category: String,
}

/// Closed, versioned guardrail vocabulary. Built once, then shared read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardrailRegistry {
    version: String,
    entries: BTreeMap<GuardrailId, GuardrailEntry>,
}

impl GuardrailRegistry {
    pub fn load_default() -> Result<Self, AdaptiveRefuse> {
        Self::load_from_str(DEFAULT_REGISTRY_JSON)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, AdaptiveRefuse> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            invalid(format!("cannot read registry {}: {err}", path.display()))
        })?;
        Self::load_from_str(&text)
    }

    pub fn load_from_str(text: &str) -> Result<Self, AdaptiveRefuse> {
        let doc: RegistryDocument = serde_json::from_str(text)
            .map_err(|err| invalid(format!("registry document rejected: {err}")))?;

        if doc.version.trim().is_empty() {
            return Err(invalid("version must not be blank"));
        }
        if doc.guardrails.is_empty() {
            return Err(invalid("guardrails must not be empty"));
        }

        let mut entries = BTreeMap::new();
        for entry in doc.guardrails {
            let id = GuardrailId::parse(&entry.id)
                .map_err(|_| invalid(format!("id {:?} does not match AMG-###", entry.id)))?;
            if entry.title.trim().is_empty() {
                return Err(invalid(format!("{id} title must not be blank")));
            }
            if entry.category.trim().is_empty() {
                return Err(invalid(format!("{id} category must not be blank")));
            }
            let previous = entries.insert(
                id,
                GuardrailEntry {
                    title: entry.title,
                    category: entry.category,
                },
            );
            if previous.is_some() {
                return Err(invalid(format!("duplicate id {id}")));
            }
        }

        tracing::debug!(
            version = doc.version.as_str(),
            entries = entries.len(),
            "guardrail registry loaded"
        );
        Ok(Self {
            version: doc.version,
            entries,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: GuardrailId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn get(&self, id: GuardrailId) -> Option<&GuardrailEntry> {
        self.entries.get(&id)
    }

    /// Succeeds only if every id is registered. The first unknown id rejects
    /// the whole batch.
    pub fn require_all<'a, I>(&self, ids: I) -> Result<(), AdaptiveRefuse>
    where
        I: IntoIterator<Item = &'a GuardrailId>,
    {
        for id in ids {
            if !self.entries.contains_key(id) {
                return Err(refuse(
                    ReasonId::AcV3GuardrailUnknown,
                    format!("{id} is not in registry {}", self.version),
                ));
            }
        }
        Ok(())
    }

    /// Edge variant for externally supplied text ids; a malformed id is as
    /// unknown as an absent one.
    pub fn require_all_str<'a, I>(&self, ids: I) -> Result<Vec<GuardrailId>, AdaptiveRefuse>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut parsed = Vec::new();
        for raw in ids {
            let id = GuardrailId::parse(raw).map_err(|_| {
                refuse(
                    ReasonId::AcV3GuardrailUnknown,
                    format!("{raw:?} is not a guardrail id"),
                )
            })?;
            parsed.push(id);
        }
        self.require_all(&parsed)?;
        Ok(parsed)
    }

    /// Titles for the supplied ids only; unknown ids are simply absent.
    pub fn titles_for<'a, I>(&self, ids: I) -> BTreeMap<GuardrailId, String>
    where
        I: IntoIterator<Item = &'a GuardrailId>,
    {
        ids.into_iter()
            .filter_map(|id| self.entries.get(id).map(|e| (*id, e.title.clone())))
            .collect()
    }
}

fn invalid(message: impl Into<String>) -> AdaptiveRefuse {
    refuse(ReasonId::AcV3GuardrailRegistryInvalid, message)
}
