use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;

/// A fact as it travels over the bus, signature `(iiissisasii)`.
///
/// Field order: id, start time, end time (0 while ongoing), description, activity name,
/// activity id, category, tags, date, duration in seconds. All timestamps are local wall
/// time encoded as seconds since the epoch, as if they were UTC.
pub type FactRecord = (i32, i32, i32, String, String, i32, String, Vec<String>, i32, i32);

/// A single entry of tracked time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fact {
    pub id: i32,
    pub name: String,
    pub activity_id: i32,
    pub start_time: NaiveDateTime,
    /// `None` while the fact is still being tracked.
    pub end_time: Option<NaiveDateTime>,
    pub date: NaiveDate,
    /// Tracked duration in seconds.
    pub delta: i64,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub description: Option<String>,
}

impl Fact {
    pub fn is_ongoing(&self) -> bool {
        self.end_time.is_none()
    }
}

impl From<FactRecord> for Fact {
    fn from(record: FactRecord) -> Self {
        let (id, start, end, description, name, activity_id, category, tags, date, delta) = record;
        Fact {
            id,
            name,
            activity_id,
            start_time: naive_from_wire(start).unwrap_or_default(),
            end_time: if end == 0 { None } else { naive_from_wire(end) },
            date: naive_from_wire(date).map(|date| date.date()).unwrap_or_default(),
            delta: i64::from(delta),
            tags,
            category: non_empty(category),
            description: non_empty(description),
        }
    }
}

/// An activity known to the tracker, as returned by `GetActivities`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activity {
    pub name: String,
    pub category: Option<String>,
}

impl From<(String, String)> for Activity {
    fn from((name, category): (String, String)) -> Self {
        Activity { name, category: non_empty(category) }
    }
}

impl std::fmt::Display for Activity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.category {
            Some(category) => write!(f, "{}@{}", self.name, category),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Decode a list of wire records, keeping the order the service sent them in.
pub fn facts_from_wire(records: Vec<FactRecord>) -> Vec<Fact> {
    records.into_iter().map(Fact::from).collect()
}

/// The fact that is currently being tracked. Only the last fact of a list can be ongoing.
pub fn ongoing_fact(facts: &[Fact]) -> Option<&Fact> {
    facts.last().filter(|fact| fact.is_ongoing())
}

/// Sum of the durations of all given facts, in seconds.
pub fn total_delta(facts: &[Fact]) -> i64 {
    facts.iter().map(|fact| fact.delta).sum()
}

/// Format a number of seconds as `H:MM`.
pub fn format_duration(total_seconds: i64) -> String {
    let total_minutes = total_seconds.max(0) / 60;
    format!("{}:{:02}", total_minutes / 60, total_minutes % 60)
}

/// Encode a wall-clock time the way hamster expects it on the bus.
pub fn naive_to_wire(time: NaiveDateTime) -> i64 {
    time.and_utc().timestamp()
}

fn naive_from_wire(seconds: i32) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(i64::from(seconds), 0).map(|time| time.naive_utc())
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
