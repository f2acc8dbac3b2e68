use std::{collections::HashMap, future, sync::Arc};

use anyhow::Result;
use chrono::{Duration, NaiveDate};
use futures::{stream, Stream, StreamExt};

use crate::utils::percentage::Percentage;

use super::{
    entities::{Session, STOP_CATEGORY},
    store::SessionStore,
};

/// Time spent on one category within some window.
#[derive(Debug, PartialEq)]
pub struct CategoryUsage {
    pub category: Arc<str>,
    pub duration: Duration,
}

/// Per-category usage of one day plus the total tracked time of that day.
#[derive(Debug)]
pub struct DayBreakdown {
    pub date: NaiveDate,
    pub usages: Vec<CategoryUsage>,
    pub tracked: Duration,
}

/// Long-range statistics of one category.
#[derive(Debug)]
pub struct CategoryTotals {
    pub category: Arc<str>,
    pub total: Duration,
    pub days_active: u32,
    pub average_per_day: Duration,
    pub max_day: Duration,
}

/// Returns unique categories of a day with their tracked time, largest first,
/// plus the total tracked duration. Categories below `min_percentage` of the
/// total are dropped from the listing but still count towards the total.
pub fn analyze_day(
    sessions: Vec<Session>,
    min_percentage: Percentage,
) -> (Vec<CategoryUsage>, Duration) {
    let mut map = HashMap::<Arc<str>, Duration>::new();

    let mut tracked = Duration::zero();

    for session in sessions {
        tracked += session.duration;
        *map.entry(session.category).or_insert_with(Duration::zero) += session.duration;
    }

    let threshold = tracked * (*min_percentage as i32) / 100;

    let mut usages = map
        .into_iter()
        .filter(|(_, duration)| *duration >= threshold && !duration.is_zero())
        .map(|(category, duration)| CategoryUsage { category, duration })
        .collect::<Vec<_>>();
    usages.sort_by(|a, b| b.duration.cmp(&a.duration));
    (usages, tracked)
}

/// Streams per-day session lists between two dates (both inclusive). Days are
/// prefetched with a small buffer instead of loading the whole range at once.
pub fn day_stream(
    storage: impl SessionStore + Send + Sync,
    from: NaiveDate,
    to: NaiveDate,
) -> impl Stream<Item = (NaiveDate, Result<Vec<Session>>)> {
    let storage = Arc::new(storage);

    date_range(from, to)
        .map(move |day| {
            let storage = storage.clone();
            async move { (day, storage.sessions_for(day).await) }
        })
        .buffered(4)
}

/// Returns a stream of dates between start (inclusive) and end (inclusive).
fn date_range(start: NaiveDate, end: NaiveDate) -> impl Stream<Item = NaiveDate> {
    stream::unfold((start, end), |(mut current, end)| {
        future::ready({
            if current <= end {
                let last_current = current;
                current = current.succ_opt().expect("End of time should never happen");
                Some((last_current, (current, end)))
            } else {
                None
            }
        })
    })
}

/// Per-day breakdowns for an inclusive date range. Days without any tracked
/// time are omitted.
pub async fn range_breakdown(
    storage: impl SessionStore + Send + Sync,
    from: NaiveDate,
    to: NaiveDate,
    min_percentage: Percentage,
) -> Result<Vec<DayBreakdown>> {
    let mut days = vec![];
    let stream = day_stream(storage, from, to);
    let mut stream = std::pin::pin!(stream);

    while let Some((date, sessions)) = stream.next().await {
        let (usages, tracked) = analyze_day(sessions?, min_percentage);
        if tracked.is_zero() {
            continue;
        }
        days.push(DayBreakdown {
            date,
            usages,
            tracked,
        });
    }
    Ok(days)
}

/// Comprehensive statistics per category for the `days_back` days leading up
/// to `today`. The sentinel category is not a real activity and is excluded.
pub async fn category_totals(
    storage: impl SessionStore + Send + Sync,
    categories: &[Arc<str>],
    days_back: u32,
    today: NaiveDate,
) -> Result<Vec<CategoryTotals>> {
    let from = today - Duration::days(days_back as i64);

    let mut totals = categories
        .iter()
        .filter(|c| c.as_ref() != STOP_CATEGORY)
        .map(|category| CategoryTotals {
            category: category.clone(),
            total: Duration::zero(),
            days_active: 0,
            average_per_day: Duration::zero(),
            max_day: Duration::zero(),
        })
        .collect::<Vec<_>>();

    let mut days_scanned = 0i32;
    let stream = day_stream(storage, from, today);
    let mut stream = std::pin::pin!(stream);

    while let Some((_, sessions)) = stream.next().await {
        days_scanned += 1;
        let (usages, _) = analyze_day(sessions?, Percentage::zero());
        for usage in usages {
            let Some(entry) = totals
                .iter_mut()
                .find(|t| t.category == usage.category)
            else {
                continue;
            };
            entry.total += usage.duration;
            entry.days_active += 1;
            entry.max_day = entry.max_day.max(usage.duration);
        }
    }

    if days_scanned > 0 {
        for entry in &mut totals {
            entry.average_per_day = entry.total / days_scanned;
        }
    }

    totals.sort_by(|a, b| b.total.cmp(&a.total));
    Ok(totals)
}
