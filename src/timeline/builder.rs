use chrono::{DateTime, NaiveDate, TimeZone};
use serde::Serialize;

use crate::db::models::FocusSession;

/// A completed session as shown on the timeline. `duration` is in seconds.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry {
    pub id: String,
    pub start_time: i64,
    pub end_time: i64,
    pub duration: u64,
}

/// Whole calendar days without any session. `duration` counts days.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GapEntry {
    pub id: String,
    pub start_time: i64,
    pub end_time: i64,
    pub duration: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TimelineItem {
    Session(SessionEntry),
    Gap(GapEntry),
}

impl TimelineItem {
    pub fn id(&self) -> &str {
        match self {
            TimelineItem::Session(entry) => &entry.id,
            TimelineItem::Gap(entry) => &entry.id,
        }
    }

    pub fn start_time(&self) -> i64 {
        match self {
            TimelineItem::Session(entry) => entry.start_time,
            TimelineItem::Gap(entry) => entry.start_time,
        }
    }
}

/// Builds the history view: completed sessions, most recent first, with gap
/// entries wherever more than one calendar day separates two sessions (or
/// the latest session and `now`).
///
/// Calendar days are taken in `now`'s time zone, so day boundaries fall on
/// local midnight. A gap's day count excludes the two boundary days: a
/// session yesterday and one today have no gap between them.
pub fn build_timeline<Tz: TimeZone>(
    sessions: &[FocusSession],
    now: &DateTime<Tz>,
) -> Vec<TimelineItem> {
    let tz = now.timezone();
    let today = now.date_naive();

    let mut completed: Vec<&FocusSession> = sessions.iter().filter(|s| s.is_completed()).collect();
    completed.sort_by(|a, b| {
        b.start_time
            .cmp(&a.start_time)
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut items = Vec::with_capacity(completed.len() * 2 + 1);

    if let Some(latest) = completed.first() {
        let latest_end = end_of(latest);
        if let Some(days) = local_day(&tz, latest_end).map(|day| days_between(day, today)) {
            if days > 1 {
                items.push(TimelineItem::Gap(GapEntry {
                    id: format!("gap-{latest_end}-now"),
                    start_time: latest_end,
                    end_time: now.timestamp_millis(),
                    duration: (days - 1) as u64,
                }));
            }
        }
    }

    for (index, newer) in completed.iter().enumerate() {
        items.push(TimelineItem::Session(SessionEntry {
            id: newer.id.clone(),
            start_time: newer.start_time,
            end_time: end_of(newer),
            duration: newer.duration,
        }));

        let Some(older) = completed.get(index + 1) else {
            continue;
        };

        let older_end = end_of(older);
        let days = match (local_day(&tz, older_end), local_day(&tz, newer.start_time)) {
            (Some(older_day), Some(newer_day)) => days_between(older_day, newer_day),
            _ => continue,
        };

        if days > 1 {
            items.push(TimelineItem::Gap(GapEntry {
                id: format!("gap-{older_end}-{}", newer.start_time),
                // Overlapping sessions must not break the ordering.
                start_time: older_end.clamp(older.start_time, newer.start_time),
                end_time: newer.start_time,
                duration: (days - 1) as u64,
            }));
        }
    }

    items
}

fn end_of(session: &FocusSession) -> i64 {
    session.end_time.unwrap_or(session.start_time)
}

fn local_day<Tz: TimeZone>(tz: &Tz, timestamp_ms: i64) -> Option<NaiveDate> {
    tz.timestamp_millis_opt(timestamp_ms)
        .earliest()
        .map(|dt| dt.date_naive())
}

fn days_between(earlier: NaiveDate, later: NaiveDate) -> i64 {
    (later - earlier).num_days()
}
