//! Aggregate statistics over stored events.
//!
//! All day boundaries are local calendar days. `today` is passed in rather
//! than read from the clock.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use anyhow::{anyhow, Result};
use chrono::{Days, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::storage::{EventStore, StoredEvent};

const RULE_WIDTH: usize = 60;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatisticsSummary {
    pub total_events: u64,
    pub today_events: u64,
    pub yesterday_events: u64,
    /// Events from seven days ago through today, inclusive.
    pub week_events: u64,
    pub first_event: Option<NaiveDateTime>,
    pub last_event: Option<NaiveDateTime>,
    /// Days since the first event, counting both ends. 0 with no events.
    pub tracking_days: i64,
}

fn day_start(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

fn day_end(date: NaiveDate) -> NaiveDateTime {
    day_start(date + Duration::days(1)) - Duration::microseconds(1)
}

fn count_between(store: &dyn EventStore, first: NaiveDate, last: NaiveDate) -> Result<u64> {
    Ok(store.events_between(day_start(first), day_end(last))?.len() as u64)
}

/// Number of events on one local date.
pub fn events_on(store: &dyn EventStore, date: NaiveDate) -> Result<u64> {
    count_between(store, date, date)
}

pub fn summary(store: &dyn EventStore, today: NaiveDate) -> Result<StatisticsSummary> {
    let yesterday = today - Duration::days(1);
    let bounds = store.first_and_last()?;
    let tracking_days = match bounds {
        Some((first, _)) => (today - first.date()).num_days() + 1,
        None => 0,
    };

    Ok(StatisticsSummary {
        total_events: store.total_events()?,
        today_events: count_between(store, today, today)?,
        yesterday_events: count_between(store, yesterday, yesterday)?,
        week_events: count_between(store, today - Duration::days(7), today)?,
        first_event: bounds.map(|(first, _)| first),
        last_event: bounds.map(|(_, last)| last),
        tracking_days,
    })
}

/// Per-day counts for the `days` days ending today, zero-filled.
pub fn daily_counts(
    store: &dyn EventStore,
    today: NaiveDate,
    days: u32,
) -> Result<BTreeMap<NaiveDate, u64>> {
    let mut out = BTreeMap::new();
    if days == 0 {
        return Ok(out);
    }
    let first = today
        .checked_sub_days(Days::new(u64::from(days) - 1))
        .ok_or_else(|| anyhow!("{} days before {} is out of range", days, today))?;
    let mut date = first;
    while date <= today {
        out.insert(date, 0);
        date += Duration::days(1);
    }
    for event in store.events_between(day_start(first), day_end(today))? {
        *out.entry(event.timestamp.date()).or_insert(0) += 1;
    }
    Ok(out)
}

/// Per-hour counts for one local date.
pub fn hourly_counts(store: &dyn EventStore, date: NaiveDate) -> Result<[u64; 24]> {
    let mut out = [0u64; 24];
    for event in store.events_between(day_start(date), day_end(date))? {
        out[event.timestamp.hour() as usize] += 1;
    }
    Ok(out)
}

/// Plain-text report printed by `shame_stats`.
pub fn render_report(
    summary: &StatisticsSummary,
    daily: &BTreeMap<NaiveDate, u64>,
    hourly: &[u64; 24],
    recent: &[StoredEvent],
) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let thin = "-".repeat(RULE_WIDTH);
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(out, "{rule}\nPHONE SHAMER - STATISTICS\n{rule}\n");

    let _ = writeln!(out, "SUMMARY\n{thin}");
    let _ = writeln!(out, "Total Events:         {}", summary.total_events);
    let _ = writeln!(out, "Today's Events:       {}", summary.today_events);
    let _ = writeln!(out, "Yesterday's Events:   {}", summary.yesterday_events);
    let _ = writeln!(out, "This Week's Events:   {}", summary.week_events);
    let _ = writeln!(out, "Days Tracking:        {}", summary.tracking_days);
    if let Some(first) = summary.first_event {
        let _ = writeln!(out, "First Detection:      {}", first.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(last) = summary.last_event {
        let _ = writeln!(out, "Last Detection:       {}", last.format("%Y-%m-%d %H:%M:%S"));
    }
    out.push('\n');

    let _ = writeln!(out, "DAILY BREAKDOWN (Last {} Days)\n{thin}", daily.len());
    for (date, count) in daily.iter().rev() {
        let bar = "#".repeat((*count).min(RULE_WIDTH as u64) as usize);
        let _ = writeln!(out, "{}:  {:3} events  {}", date, count, bar);
    }
    out.push('\n');

    let _ = writeln!(out, "HOURLY BREAKDOWN (Today)\n{thin}");
    for (row_index, counts) in hourly.chunks(4).enumerate() {
        let cells: Vec<String> = counts
            .iter()
            .enumerate()
            .map(|(col, count)| format!("{:02}:00 ({:2})", row_index * 4 + col, count))
            .collect();
        let _ = writeln!(out, "{}", cells.join("  "));
    }
    out.push('\n');

    let _ = writeln!(out, "RECENT EVENTS (Last {})\n{thin}", recent.len());
    if recent.is_empty() {
        let _ = writeln!(out, "No events recorded yet.");
    }
    for event in recent {
        let id = event.event_id.to_string();
        let _ = writeln!(
            out,
            "{} - Event {}... - {} frames",
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            &id[..8],
            event.frame_count
        );
    }
    let _ = writeln!(out, "\n{rule}");
    out
}
