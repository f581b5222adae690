use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schedule::facets::UNKNOWN_CATEGORY;
use crate::schedule::lenient;
use crate::schedule::normalize::PLACEHOLDER;

/// `(alias, key)` pairs for the older spellings some endpoints still send.
/// See `lenient::fold_aliases`.
pub const OWNER_ALIASES: [(&str, &str); 1] = [("brandmasterLast", "brandmasterLastName")];
pub const ENTRY_ALIASES: [(&str, &str); 5] = [
    ("idAction", "actionId"),
    ("shopID", "shopId"),
    ("actionSince", "since"),
    ("actionUntil", "until"),
    ("actionStatus", "status"),
];

#[derive(Deserialize, Debug, Default)]
pub struct RawOwner {
    #[serde(
        rename(deserialize = "brandmasterId"),
        default,
        deserialize_with = "lenient::integer"
    )]
    pub owner_id: Option<i64>,
    #[serde(
        rename(deserialize = "brandmasterLogin"),
        default,
        deserialize_with = "lenient::text"
    )]
    pub login: Option<String>,
    #[serde(
        rename(deserialize = "brandmasterName"),
        default,
        deserialize_with = "lenient::text"
    )]
    pub first_name: Option<String>,
    #[serde(
        rename(deserialize = "brandmasterLastName"),
        default,
        deserialize_with = "lenient::text"
    )]
    pub last_name: Option<String>,
    /// Filled from the payload separately so a broken owner keeps its entries.
    #[serde(skip)]
    pub actions: Vec<Value>,
}

#[derive(Deserialize, Debug, Default)]
pub struct RawEntry {
    #[serde(
        rename(deserialize = "actionId"),
        default,
        deserialize_with = "lenient::integer"
    )]
    pub action_id: Option<i64>,
    #[serde(
        rename(deserialize = "shopId"),
        default,
        deserialize_with = "lenient::integer"
    )]
    pub shop_id: Option<i64>,
    #[serde(
        rename(deserialize = "shopName"),
        default,
        deserialize_with = "lenient::text"
    )]
    pub shop_name: Option<String>,
    #[serde(
        rename(deserialize = "shopAddress"),
        default,
        deserialize_with = "lenient::text"
    )]
    pub shop_address: Option<String>,
    #[serde(
        rename(deserialize = "eventName"),
        default,
        deserialize_with = "lenient::text"
    )]
    pub event_name: Option<String>,
    #[serde(default)]
    pub since: Option<Value>,
    #[serde(default)]
    pub until: Option<Value>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub status: Option<String>,
    #[serde(rename(deserialize = "createdAt"), default)]
    pub created_at: Option<Value>,
}

/// One top-level element of a schedule payload.
#[derive(Debug)]
pub enum RawRecord {
    /// A responsible party with its nested entries (supervisor view).
    Owner(RawOwner),
    /// A bare entry with no responsible party (self-service view).
    Entry(RawEntry),
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub id: i64,
    pub location_id: Option<i64>,
    pub location_name: String,
    pub location_address: String,
    pub category_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: String,
    pub responsible_party_id: Option<String>,
    pub responsible_party_first_name: Option<String>,
    pub responsible_party_last_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    /// Calendar date of `start_time` in the display timezone, `None` when the
    /// start could not be parsed.
    pub day_key: Option<NaiveDate>,
}

impl ScheduleEntry {
    /// The value this entry is matched against in the category facet.
    pub fn category_key(&self) -> &str {
        if self.category_name.trim().is_empty() || self.category_name == PLACEHOLDER {
            UNKNOWN_CATEGORY
        } else {
            &self.category_name
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FacetOption {
    pub value: String,
    pub label: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DayGroup {
    pub day: NaiveDate,
    pub label: String,
    pub entries: Vec<ScheduleEntry>,
}
