//! Selection resolution: operator choices → resolved, option-bound picks
//!
//! The resolver maps raw ordered choice keys (by index or by name) back to
//! catalog records and binds per-option answers collected through the
//! `OperatorPrompt` collaborator. Resolution is deterministic: output order
//! always equals input choice order, never catalog order. A choice that
//! matches no record still yields a `Selection` so the invocation builder
//! can forward the raw key; rejecting it is the external engine's job.

use std::collections::HashMap;

use anyhow::Result;
use indexmap::IndexMap;

use crate::core::catalog::{OptionSchema, PatchRecord};

/// A raw operator choice key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChoiceKey {
    /// Positional selection against `PatchRecord::index`.
    Index(u32),
    /// Exact (case-sensitive) selection against `PatchRecord::name`.
    Name(String),
}

/// An answer for a single option prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionAnswer {
    /// Operator declined to set the option; no flag is emitted.
    Skip,
    /// Raw textual input, possibly empty.
    Input(String),
}

/// One resolved operator choice.
///
/// `option_values` preserves insertion order; a `None` value is the explicit
/// null marker (emit `-O<key>` without a value), distinct from a key being
/// absent (emit nothing).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub key: ChoiceKey,
    /// The matched record, if any; `None` passes the raw key through.
    pub record: Option<PatchRecord>,
    pub option_values: IndexMap<String, Option<String>>,
}

/// Operator-interaction surface the resolver depends on.
///
/// Implementations prompt a human (or replay scripted answers in tests);
/// the resolver itself stays pure.
pub trait OperatorPrompt {
    /// Pick patches from the active catalog, in the operator's order.
    fn choose_patches(&mut self, catalog: &[PatchRecord]) -> Result<Vec<ChoiceKey>>;

    /// Answer one option prompt for a selected patch.
    fn option_answer(&mut self, patch: &PatchRecord, option: &OptionSchema)
    -> Result<OptionAnswer>;
}

/// Translate a raw option answer into a recorded value.
///
/// Empty input falls back to the schema default when one exists; with no
/// default it becomes the explicit null marker. `None` means the option is
/// not recorded at all.
pub fn bind_option_answer(
    schema: &OptionSchema,
    answer: OptionAnswer,
) -> Option<Option<String>> {
    match answer {
        OptionAnswer::Skip => None,
        OptionAnswer::Input(text) => {
            if text.is_empty() {
                match &schema.default {
                    Some(default) => Some(Some(default.clone())),
                    None => Some(None),
                }
            } else {
                Some(Some(text))
            }
        }
    }
}

/// Resolve raw choices against a catalog and bind option answers.
///
/// Lookup maps are built once per pass, restricted to records that carry the
/// respective key. Options are only prompted for resolved records that
/// declare an option schema.
pub fn resolve_selections(
    catalog: &[PatchRecord],
    choices: &[ChoiceKey],
    prompt: &mut dyn OperatorPrompt,
) -> Result<Vec<Selection>> {
    let by_index: HashMap<u32, &PatchRecord> = catalog
        .iter()
        .filter_map(|r| r.index.map(|i| (i, r)))
        .collect();
    let by_name: HashMap<&str, &PatchRecord> = catalog
        .iter()
        .filter_map(|r| r.name.as_deref().filter(|n| !n.is_empty()).map(|n| (n, r)))
        .collect();

    let mut selections = Vec::with_capacity(choices.len());

    for choice in choices {
        let record = match choice {
            ChoiceKey::Index(i) => by_index.get(i).copied(),
            ChoiceKey::Name(n) => by_name.get(n.as_str()).copied(),
        };

        let mut option_values: IndexMap<String, Option<String>> = IndexMap::new();
        if let Some(record) = record {
            for schema in &record.options {
                let answer = prompt.option_answer(record, schema)?;
                if let Some(value) = bind_option_answer(schema, answer) {
                    option_values.insert(schema.key.clone(), value);
                }
            }
        }

        selections.push(Selection {
            key: choice.clone(),
            record: record.cloned(),
            option_values,
        });
    }

    Ok(selections)
}

/// Choices for the records the engine enables by default, index-keyed where
/// possible.
pub fn default_choices(catalog: &[PatchRecord]) -> Vec<ChoiceKey> {
    catalog
        .iter()
        .filter(|r| r.enabled == Some(true))
        .filter_map(|r| match (r.index, r.name.as_ref()) {
            (Some(i), _) => Some(ChoiceKey::Index(i)),
            (None, Some(n)) => Some(ChoiceKey::Name(n.clone())),
            (None, None) => None,
        })
        .collect()
}
