//! Validation catalog for managing the registered checks.

use crate::core::config::PipelineConfig;
use crate::core::error::CatalogError;
use crate::core::types::{CheckType, Severity, ValidationCategory};
use crate::validation::check::CheckFn;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Immutable description of a check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    /// Unique identifier (e.g., "preflight_duplicate_headers")
    pub id: String,
    /// Stage the check belongs to
    pub category: ValidationCategory,
    /// Human-readable name
    pub name: String,
    /// What the check verifies
    pub description: String,
    /// Declared severity; `None` is the informational tier
    pub severity: Option<Severity>,
    /// Kind of rule
    #[serde(rename = "type")]
    pub check_type: Option<CheckType>,
}

impl Validation {
    /// Create a description with no severity or type.
    pub fn new(
        id: impl Into<String>,
        category: ValidationCategory,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            category,
            name: name.into(),
            description: String::new(),
            severity: None,
            check_type: None,
        }
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the severity.
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Set the check type.
    pub fn check_type(mut self, check_type: CheckType) -> Self {
        self.check_type = Some(check_type);
        self
    }
}

/// Catalog entry: description plus evaluation function.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    /// The check description.
    pub validation: Validation,
    /// The evaluation function.
    pub check: CheckFn,
}

#[derive(Default)]
struct CatalogIndex {
    /// Entries in registration order, keyed by id.
    entries: IndexMap<String, CatalogEntry>,
    /// Member ids per category, in registration order.
    by_category: HashMap<ValidationCategory, Vec<String>>,
    /// Bumped on every edit.
    revision: u64,
}

impl CatalogIndex {
    fn rebuild(&mut self) {
        self.by_category.clear();
        for (id, entry) in &self.entries {
            self.by_category
                .entry(entry.validation.category)
                .or_default()
                .push(id.clone());
        }
        self.revision += 1;
    }

    fn members(&self, category: ValidationCategory) -> impl Iterator<Item = &CatalogEntry> {
        self.by_category
            .get(&category)
            .into_iter()
            .flatten()
            .filter_map(|id| self.entries.get(id))
    }
}

/// Registry of all checks, indexed by category.
///
/// The catalog is shared behind an `Arc` and edited through `&self`. Every
/// edit takes the write lock and rebuilds the category index before releasing
/// it, so readers see either the old or the new catalog, never a mix.
pub struct ValidationCatalog {
    index: RwLock<CatalogIndex>,
}

impl ValidationCatalog {
    /// Create a new empty catalog.
    pub fn new() -> Self {
        Self {
            index: RwLock::new(CatalogIndex::default()),
        }
    }

    /// Create a catalog pre-populated with the built-in checks.
    pub fn with_builtins(config: &PipelineConfig) -> Self {
        let catalog = Self::new();
        crate::catalog::builtin::register_all(&catalog, config);
        catalog
    }

    /// Register a check.
    ///
    /// Fails if the id is taken or the check consumes a different input
    /// variant than its category supplies.
    pub fn register(
        &self,
        validation: Validation,
        check: impl Into<CheckFn>,
    ) -> Result<(), CatalogError> {
        let check = check.into();
        ensure_input_matches(&validation, validation.category, &check)?;

        let mut index = self.index.write();
        if index.entries.contains_key(&validation.id) {
            return Err(CatalogError::DuplicateId(validation.id));
        }
        log::trace!("registered check '{}' in {}", validation.id, validation.category);
        index
            .entries
            .insert(validation.id.clone(), CatalogEntry { validation, check });
        index.rebuild();
        Ok(())
    }

    /// Move a check to another category.
    ///
    /// Returns the updated description. The check keeps its position in
    /// registration order, which decides its place within the new category.
    pub fn reassign_category(
        &self,
        id: &str,
        category: ValidationCategory,
    ) -> Result<Validation, CatalogError> {
        let mut index = self.index.write();
        let entry = index
            .entries
            .get_mut(id)
            .ok_or_else(|| CatalogError::UnknownCheck(id.to_string()))?;
        ensure_input_matches(&entry.validation, category, &entry.check)?;

        let previous = entry.validation.category;
        entry.validation.category = category;
        let updated = entry.validation.clone();
        index.rebuild();

        log::info!("reassigned check '{}' from {} to {}", id, previous, category);
        Ok(updated)
    }

    /// Descriptions of the checks in a category, in catalog order.
    pub fn checks_for_category(&self, category: ValidationCategory) -> Vec<Validation> {
        let index = self.index.read();
        index.members(category).map(|e| e.validation.clone()).collect()
    }

    /// Full entries of a category, in catalog order.
    pub fn entries_for_category(&self, category: ValidationCategory) -> Vec<CatalogEntry> {
        let index = self.index.read();
        index.members(category).cloned().collect()
    }

    /// Number of checks in a category.
    pub fn count_for_category(&self, category: ValidationCategory) -> usize {
        self.index
            .read()
            .by_category
            .get(&category)
            .map_or(0, Vec::len)
    }

    /// Get a check description by id.
    pub fn get(&self, id: &str) -> Option<Validation> {
        self.index.read().entries.get(id).map(|e| e.validation.clone())
    }

    /// Check if a check is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.index.read().entries.contains_key(id)
    }

    /// Search checks by id, name or description.
    pub fn search(&self, query: &str) -> Vec<Validation> {
        let query = query.to_lowercase();
        self.index
            .read()
            .entries
            .values()
            .map(|e| &e.validation)
            .filter(|v| {
                v.id.to_lowercase().contains(&query)
                    || v.name.to_lowercase().contains(&query)
                    || v.description.to_lowercase().contains(&query)
            })
            .cloned()
            .collect()
    }

    /// Descriptions grouped by category, in stage order.
    pub fn grouped_by_category(&self) -> IndexMap<ValidationCategory, Vec<Validation>> {
        let index = self.index.read();
        ValidationCategory::all()
            .iter()
            .map(|&c| (c, index.members(c).map(|e| e.validation.clone()).collect()))
            .collect()
    }

    /// Edit counter, bumped on every registration or reassignment.
    pub fn revision(&self) -> u64 {
        self.index.read().revision
    }

    /// Get the total number of registered checks.
    pub fn len(&self) -> usize {
        self.index.read().entries.len()
    }

    /// Check if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.index.read().entries.is_empty()
    }
}

impl Default for ValidationCatalog {
    fn default() -> Self {
        Self::with_builtins(&PipelineConfig::default())
    }
}

fn ensure_input_matches(
    validation: &Validation,
    category: ValidationCategory,
    check: &CheckFn,
) -> Result<(), CatalogError> {
    if check.input_kind() == category.input_kind() {
        Ok(())
    } else {
        Err(CatalogError::InputMismatch {
            id: validation.id.clone(),
            category,
            check: check.input_kind(),
            category_input: category.input_kind(),
        })
    }
}
