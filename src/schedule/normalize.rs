use crate::schedule::lenient::{fold_aliases, take_list};
use crate::schedule::model::{
    RawEntry, RawOwner, RawRecord, ScheduleEntry, ENTRY_ALIASES, OWNER_ALIASES,
};

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Id given to entries whose source id is missing or not an integer.
pub const INVALID_ID: i64 = -1;
/// Shown in place of any missing display string.
pub const PLACEHOLDER: &str = "—";
/// Status given to entries that carry none.
pub const UNKNOWN_STATUS: &str = "UNKNOWN";
/// Substituted for timestamps that fail to parse.
pub const EPOCH_SENTINEL: DateTime<Utc> = DateTime::<Utc>::UNIX_EPOCH;

// tried in order after RFC 3339; offset-less values are local to the display zone
const LOCAL_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

struct Party {
    id: String,
    first_name: String,
    last_name: String,
}

impl Party {
    fn from_owner(owner: &RawOwner) -> Option<Self> {
        let id = owner
            .login
            .clone()
            .or_else(|| owner.owner_id.map(|id| id.to_string()))?;

        Some(Party {
            id,
            first_name: or_placeholder(owner.first_name.clone()),
            last_name: or_placeholder(owner.last_name.clone()),
        })
    }
}

/// Splits the top-level payload elements into owners and bare entries.
/// Elements that don't fit either shape become an empty entry so they still
/// show up (with sentinel values) instead of vanishing.
pub fn classify_records(values: Vec<Value>) -> Vec<RawRecord> {
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| match value {
            Value::Object(object) if object.contains_key("actions") => {
                RawRecord::Owner(raw_owner(object, index))
            }
            other => RawRecord::Entry(raw_entry(other, index)),
        })
        .collect()
}

// the actions are taken out before decoding, so even an owner whose own
// fields can't be read keeps its entries
fn raw_owner(mut object: Map<String, Value>, index: usize) -> RawOwner {
    fold_aliases(&mut object, &OWNER_ALIASES);
    let actions = take_list(&mut object, "actions");

    let mut owner: RawOwner =
        serde_json::from_value(Value::Object(object)).unwrap_or_else(|err| {
            warn!(index, %err, "owner record could not be read, using defaults");
            RawOwner::default()
        });
    owner.actions = actions;
    owner
}

fn raw_entry(mut value: Value, index: usize) -> RawEntry {
    if let Value::Object(object) = &mut value {
        fold_aliases(object, &ENTRY_ALIASES);
    }
    serde_json::from_value(value).unwrap_or_else(|err| {
        warn!(index, %err, "schedule entry could not be read, using defaults");
        RawEntry::default()
    })
}

/// Flattens owners and bare entries into one list in source order.
/// Never fails; broken fields fall back to the constants above.
pub fn normalize(records: Vec<RawRecord>, tz: Tz) -> Vec<ScheduleEntry> {
    let mut entries = Vec::new();

    for record in records {
        match record {
            RawRecord::Owner(owner) => {
                let party = Party::from_owner(&owner);
                for (index, value) in owner.actions.into_iter().enumerate() {
                    let raw = raw_entry(value, index);
                    entries.push(normalize_entry(raw, party.as_ref(), tz));
                }
            }
            RawRecord::Entry(raw) => entries.push(normalize_entry(raw, None, tz)),
        }
    }

    entries
}

fn normalize_entry(raw: RawEntry, party: Option<&Party>, tz: Tz) -> ScheduleEntry {
    let id = raw.action_id.unwrap_or_else(|| {
        debug!("schedule entry without a usable id");
        INVALID_ID
    });

    let start = raw.since.as_ref().and_then(|value| parse_instant(value, tz));
    if start.is_none() {
        debug!(id, since = ?raw.since, "start time unparseable, entry left out of day groups");
    }

    let end = raw
        .until
        .as_ref()
        .and_then(|value| parse_instant(value, tz))
        .unwrap_or_else(|| {
            debug!(id, until = ?raw.until, "end time unparseable");
            EPOCH_SENTINEL
        });

    ScheduleEntry {
        id,
        location_id: raw.shop_id,
        location_name: or_placeholder(raw.shop_name),
        location_address: or_placeholder(raw.shop_address),
        category_name: or_placeholder(raw.event_name),
        start_time: start.unwrap_or(EPOCH_SENTINEL),
        end_time: end,
        status: raw.status.unwrap_or_else(|| UNKNOWN_STATUS.to_string()),
        responsible_party_id: party.map(|party| party.id.clone()),
        responsible_party_first_name: party.map(|party| party.first_name.clone()),
        responsible_party_last_name: party.map(|party| party.last_name.clone()),
        created_at: raw
            .created_at
            .as_ref()
            .and_then(|value| parse_instant(value, tz)),
        day_key: start.map(|instant| day_key(instant, tz)),
    }
}

fn or_placeholder(value: Option<String>) -> String {
    value.unwrap_or_else(|| PLACEHOLDER.to_string())
}

/// Reads a date-like JSON value: RFC 3339 text, an offset-less date-time in
/// `tz`, a bare date (UTC midnight) or epoch milliseconds.
pub fn parse_instant(value: &Value, tz: Tz) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_instant_str(s.trim(), tz),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn parse_instant_str(s: &str, tz: Tz) -> Option<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(s) {
        return Some(instant.to_utc());
    }

    for format in LOCAL_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return local_instant(naive, tz);
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// a wall time skipped by a DST jump is moved forward past the gap
fn local_instant(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| {
            let shifted = naive.checked_add_signed(TimeDelta::hours(1))?;
            tz.from_local_datetime(&shifted).earliest()
        })
        .map(|local| local.to_utc())
}

pub fn day_key(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

pub fn day_label(day: NaiveDate) -> String {
    day.format("%-d %B %Y").to_string()
}
