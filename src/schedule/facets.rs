use crate::schedule::model::{FacetOption, ScheduleEntry};
use crate::schedule::normalize::{day_label, PLACEHOLDER};

use std::collections::HashSet;

use serde::Serialize;

/// Value of the option that disables a filter.
pub const ALL: &str = "All";
/// Category facet value for entries without a usable category.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Selectable options for each filter, always led by the `All` option.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Facets {
    pub parties: Vec<FacetOption>,
    pub days: Vec<FacetOption>,
    pub statuses: Vec<FacetOption>,
    pub categories: Vec<FacetOption>,
}

impl Facets {
    pub fn derive(entries: &[ScheduleEntry]) -> Self {
        Facets {
            parties: with_all("All parties", party_options(entries)),
            days: with_all("All days", day_options(entries)),
            statuses: with_all(
                "All statuses",
                unique(entries.iter().map(|entry| entry.status.as_str()))
                    .map(|status| option(status, status))
                    .collect(),
            ),
            categories: with_all(
                "All categories",
                unique(entries.iter().map(ScheduleEntry::category_key))
                    .map(|category| option(category, category))
                    .collect(),
            ),
        }
    }
}

fn party_options(entries: &[ScheduleEntry]) -> Vec<FacetOption> {
    let mut seen = HashSet::new();
    let mut options = Vec::new();

    for entry in entries {
        let Some(id) = entry.responsible_party_id.as_deref() else {
            continue;
        };
        if !seen.insert(id) {
            continue;
        }

        let names = [
            entry.responsible_party_first_name.as_deref(),
            entry.responsible_party_last_name.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|name| *name != PLACEHOLDER)
        .collect::<Vec<_>>()
        .join(" ");

        let label = if names.is_empty() {
            id.to_string()
        } else {
            format!("{id} - {names}")
        };
        options.push(option(id, &label));
    }

    options
}

// most recent day first
fn day_options(entries: &[ScheduleEntry]) -> Vec<FacetOption> {
    let mut days: Vec<_> = entries
        .iter()
        .filter_map(|entry| entry.day_key)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    days.sort_unstable_by(|a, b| b.cmp(a));

    days.into_iter()
        .map(|day| option(&day.to_string(), &day_label(day)))
        .collect()
}

fn unique<'a>(values: impl Iterator<Item = &'a str>) -> impl Iterator<Item = &'a str> {
    let mut seen = HashSet::new();
    values.filter(move |value| seen.insert(*value))
}

fn with_all(label: &str, mut options: Vec<FacetOption>) -> Vec<FacetOption> {
    options.insert(0, option(ALL, label));
    options
}

fn option(value: &str, label: &str) -> FacetOption {
    FacetOption {
        value: value.to_string(),
        label: label.to_string(),
    }
}
