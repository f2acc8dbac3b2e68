use std::fmt::Display;

use ansi_term::Colour;
use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, ValueEnum};

use crate::{
    tracker::{
        entities::Session,
        stats::{category_totals, range_breakdown, CategoryTotals, DayBreakdown},
        store::{JsonStore, SessionStore},
        StartOutcome, Tracker,
    },
    utils::{
        percentage::{duration_percentage, Percentage},
        time::{format_hhmm, format_hours},
    },
};

use super::Args;

pub fn show_status<S: SessionStore>(tracker: &Tracker<S>) {
    match (tracker.current(), tracker.current_duration()) {
        (Some(open), Some(elapsed)) => println!(
            "Active: {} ({})",
            Colour::Green.bold().paint(open.category.as_ref()),
            format_hhmm(elapsed)
        ),
        _ => println!("No active session"),
    }
}

pub fn show_start_outcome(category: &str, outcome: &StartOutcome) {
    match outcome {
        StartOutcome::Started { previous } => {
            if let Some(previous) = previous {
                show_stopped(Some(previous));
            }
            println!("Started: {category}");
        }
        StartOutcome::Stopped { previous } => show_stopped(previous.as_ref()),
    }
}

pub fn show_stopped(stopped: Option<&Session>) {
    match stopped {
        Some(session) => println!(
            "Stopped: {} - Duration: {}",
            session.category,
            format_hhmm(session.duration)
        ),
        None => println!("No active session to stop"),
    }
}

pub fn show_categories<S: SessionStore>(tracker: &Tracker<S>) {
    println!("Available categories:");
    for category in tracker.categories() {
        println!("  {category}");
    }
}

pub fn show_history(sessions: &[Session]) {
    if sessions.is_empty() {
        println!("No session history");
        return;
    }

    println!("Last {} sessions:", sessions.len());
    for session in sessions.iter().rev() {
        let start = session.start.with_timezone(&Local);
        println!(
            "  {} - {} ({})",
            start.format("%Y-%m-%d %H:%M"),
            session.category,
            format_hhmm(session.duration)
        );
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct StatsCommand {
    #[arg(
        long,
        help = "Single day to summarize. Examples are \"yesterday\", \"3 days ago\", \"15/03/2025\""
    )]
    date: Option<String>,
    #[arg(
        long = "start",
        short,
        help = "Start of the range. Examples are \"yesterday\", \"3 days ago\", \"15/03/2025\""
    )]
    start_date: Option<String>,
    #[arg(
        long = "end",
        short,
        help = "End of the range. Examples are \"yesterday\", \"3 days ago\", \"15/03/2025\""
    )]
    end_date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
    #[arg(
        long,
        help = "Show per-category totals over the scanned period instead of per-day breakdowns"
    )]
    totals: bool,
    #[arg(
        long = "days-back",
        default_value_t = 365,
        help = "How many days back --totals scans"
    )]
    days_back: u32,
    #[arg(short = 'p', long = "percentage", help = "Filter categories to have at least specified percentage of a day", default_value_t = Percentage::zero())]
    min_percentage: Percentage,
}

/// Command to process `stats`. Summarizes tracked time either per day over a
/// date range, or per category over a trailing window.
pub async fn process_stats_command(
    storage: JsonStore,
    StatsCommand {
        date,
        start_date,
        end_date,
        date_style,
        totals,
        days_back,
        min_percentage,
    }: StatsCommand,
) -> Result<()> {
    if totals {
        let config = storage.load_config().await?;
        let today = Local::now().date_naive();
        let totals = category_totals(&storage, &config.categories, days_back, today).await?;
        show_totals(&totals, days_back);
        return Ok(());
    }

    let (from, to) = parse_range(date, start_date, end_date, date_style)?;
    let days = range_breakdown(&storage, from, to, min_percentage).await?;

    if days.is_empty() {
        println!("No activity in the selected period");
        return Ok(());
    }
    for day in &days {
        show_day(day);
    }
    Ok(())
}

/// Also provides sensible defaults: with no dates given, today is summarized.
fn parse_range(
    date: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    date_style: DateStyle,
) -> Result<(NaiveDate, NaiveDate)> {
    let now = Local::now();
    let dialect: chrono_english::Dialect = date_style.into();

    if let Some(date) = date {
        let day = parse_day(&date, now, dialect)?;
        return Ok((day, day));
    }

    let from = match start_date {
        Some(v) => parse_day(&v, now, dialect)?,
        None => now.date_naive(),
    };
    let to = match end_date {
        Some(v) => parse_day(&v, now, dialect)?,
        None => now.date_naive(),
    };
    Ok((from, to))
}

fn parse_day(
    value: &str,
    now: DateTime<Local>,
    dialect: chrono_english::Dialect,
) -> Result<NaiveDate> {
    match parse_date_string(value, now, dialect) {
        Ok(v) => Ok(v.with_timezone(&Local).date_naive()),
        Err(e) => Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Failed to validate date '{value}': {e}"),
            )
            .into()),
    }
}

fn show_day(day: &DayBreakdown) {
    println!("{}", day.date.format("%Y-%m-%d"));
    for usage in &day.usages {
        println!(
            "  {}%\t{}\t{}",
            *duration_percentage(usage.duration, day.tracked) as i32,
            format_hours(usage.duration),
            usage.category
        );
    }
    println!("  total\t{}", format_hours(day.tracked));
    println!();
}

fn show_totals(totals: &[CategoryTotals], days_back: u32) {
    println!("Totals over the last {days_back} days:");
    for entry in totals {
        println!(
            "  {}\t{}\t{} active days\tavg {}/day\tmax {}",
            entry.category,
            format_hours(entry.total),
            entry.days_active,
            format_hours(entry.average_per_day),
            format_hours(entry.max_day)
        );
    }
}
