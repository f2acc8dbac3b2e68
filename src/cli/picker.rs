use std::{io::Write, sync::Arc};

use ansi_term::Colour;
use anyhow::Result;
use tokio::io::{stdin, AsyncBufReadExt, BufReader};

use crate::{
    tracker::{store::SessionStore, Tracker},
    utils::time::format_hhmm,
};

use super::report;

/// Terminal stand-in for the original picker window: shows the current
/// session, lists categories, reads a selection and starts it.
pub async fn run_picker<S: SessionStore>(tracker: &mut Tracker<S>) -> Result<()> {
    match (tracker.current(), tracker.current_duration()) {
        (Some(open), Some(elapsed)) => {
            println!("Current: {} ({})", open.category, format_hhmm(elapsed))
        }
        _ => println!("No active session"),
    }
    println!();

    let categories = tracker.categories().to_vec();
    let current_category = tracker.current().map(|open| open.category.clone());
    for (index, category) in categories.iter().enumerate() {
        if current_category.as_ref() == Some(category) {
            println!(
                "  {} {}",
                index + 1,
                Colour::Green.bold().paint(category.as_ref())
            );
        } else {
            println!("  {} {category}", index + 1);
        }
    }

    print!("Select category (number or name, empty cancels): ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    BufReader::new(stdin()).read_line(&mut line).await?;

    let Some(selection) = parse_selection(line.trim(), &categories) else {
        println!("No selection made");
        return Ok(());
    };
    let selection = selection.to_string();

    let outcome = tracker.start(&selection).await?;
    report::show_start_outcome(&selection, &outcome);
    Ok(())
}

/// Accepts a 1-based index or a category name, case-insensitive.
fn parse_selection<'a>(input: &str, categories: &'a [Arc<str>]) -> Option<&'a str> {
    if input.is_empty() {
        return None;
    }
    if let Ok(index) = input.parse::<usize>() {
        return categories
            .get(index.checked_sub(1)?)
            .map(|category| category.as_ref());
    }
    categories
        .iter()
        .find(|category| category.eq_ignore_ascii_case(input))
        .map(|category| category.as_ref())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::parse_selection;

    fn categories() -> Vec<Arc<str>> {
        vec!["programming".into(), "wasted".into(), "stop".into()]
    }

    #[test]
    fn test_parse_selection_by_index() {
        let categories = categories();
        assert_eq!(parse_selection("1", &categories), Some("programming"));
        assert_eq!(parse_selection("3", &categories), Some("stop"));
        assert_eq!(parse_selection("0", &categories), None);
        assert_eq!(parse_selection("4", &categories), None);
    }

    #[test]
    fn test_parse_selection_by_name() {
        let categories = categories();
        assert_eq!(parse_selection("wasted", &categories), Some("wasted"));
        assert_eq!(parse_selection("WASTED", &categories), Some("wasted"));
        assert_eq!(parse_selection("unknown", &categories), None);
        assert_eq!(parse_selection("", &categories), None);
    }
}
