use crate::schedule::facets::{Facets, ALL};
use crate::schedule::model::{DayGroup, ScheduleEntry};
use crate::schedule::normalize::day_label;

use std::{borrow::Borrow, collections::BTreeMap, fmt, str::FromStr};

use chrono::NaiveDate;
use serde::Serialize;

/// One filter's current choice: everything, or a single facet value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection<T> {
    All,
    Only(T),
}

impl<T> Default for Selection<T> {
    fn default() -> Self {
        Selection::All
    }
}

impl<T> Selection<T> {
    pub fn matches<U>(&self, value: Option<&U>) -> bool
    where
        T: Borrow<U>,
        U: PartialEq + ?Sized,
    {
        match self {
            Selection::All => true,
            Selection::Only(wanted) => {
                value.is_some_and(|value| <T as Borrow<U>>::borrow(wanted) == value)
            }
        }
    }
}

impl<T: FromStr> FromStr for Selection<T> {
    type Err = T::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == ALL {
            Ok(Selection::All)
        } else {
            s.parse().map(Selection::Only)
        }
    }
}

impl<T: fmt::Display> fmt::Display for Selection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::All => f.write_str(ALL),
            Selection::Only(value) => value.fmt(f),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSelection {
    pub party: Selection<String>,
    pub day: Selection<NaiveDate>,
    pub status: Selection<String>,
    pub category: Selection<String>,
}

impl FilterSelection {
    /// An entry passes when every non-`All` filter equals its field.
    pub fn accepts(&self, entry: &ScheduleEntry) -> bool {
        self.party.matches(entry.responsible_party_id.as_deref())
            && self.day.matches(entry.day_key.as_ref())
            && self.status.matches(Some(entry.status.as_str()))
            && self.category.matches(Some(entry.category_key()))
    }
}

pub fn filter_entries<'a>(
    entries: &'a [ScheduleEntry],
    selection: &FilterSelection,
) -> Vec<&'a ScheduleEntry> {
    entries
        .iter()
        .filter(|entry| selection.accepts(entry))
        .collect()
}

/// Groups entries by day, earliest day first. Entries without a day key are
/// left out; order inside a day is the input order.
pub fn group_by_day<'a>(entries: impl IntoIterator<Item = &'a ScheduleEntry>) -> Vec<DayGroup> {
    let mut groups: BTreeMap<NaiveDate, Vec<ScheduleEntry>> = BTreeMap::new();
    for entry in entries {
        if let Some(day) = entry.day_key {
            groups.entry(day).or_default().push(entry.clone());
        }
    }

    groups
        .into_iter()
        .map(|(day, entries)| DayGroup {
            day,
            label: day_label(day),
            entries,
        })
        .collect()
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BoardView {
    pub entries: Vec<ScheduleEntry>,
    pub facets: Facets,
    pub filtered_count: usize,
    pub days: Vec<DayGroup>,
}

/// Holds one loaded schedule and the user's filter choices.
///
/// Facets are derived when the entries are replaced and kept until the next
/// replacement; changing the selection never touches them.
#[derive(Debug, Clone)]
pub struct ScheduleBoard {
    entries: Vec<ScheduleEntry>,
    facets: Facets,
    selection: FilterSelection,
}

impl Default for ScheduleBoard {
    fn default() -> Self {
        ScheduleBoard {
            entries: Vec::new(),
            facets: Facets::derive(&[]),
            selection: FilterSelection::default(),
        }
    }
}

impl ScheduleBoard {
    pub fn replace_entries(&mut self, entries: Vec<ScheduleEntry>) {
        self.facets = Facets::derive(&entries);
        self.entries = entries;
    }

    pub fn select(&mut self, selection: FilterSelection) {
        self.selection = selection;
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    pub fn facets(&self) -> &Facets {
        &self.facets
    }

    pub fn filtered(&self) -> Vec<&ScheduleEntry> {
        filter_entries(&self.entries, &self.selection)
    }

    pub fn view(&self) -> BoardView {
        let filtered = self.filtered();
        BoardView {
            entries: self.entries.clone(),
            facets: self.facets.clone(),
            filtered_count: filtered.len(),
            days: group_by_day(filtered),
        }
    }
}
