//! Terminal output formatting.

use colored::{ColoredString, Colorize};
use serde_json::Value;
use unicode_width::UnicodeWidthStr;

use relic_analytics::{
    CategoryShare, CausalPattern, CompletionRecord, EntityComparison, StageCompletion,
};
use relic_graph::QueryResult;

const MAX_CELL_WIDTH: usize = 40;

/// Print a result envelope as a column-aligned table.
pub fn print_result_table(result: &QueryResult) {
    if !result.success {
        print_failure(result);
        return;
    }
    if result.data.is_empty() {
        println!("{}", "No results.".dimmed());
        return;
    }

    let columns: Vec<&str> = result.data[0].keys().map(String::as_str).collect();
    let mut widths: Vec<usize> = columns
        .iter()
        .map(|c| UnicodeWidthStr::width(*c))
        .collect();
    for row in &result.data {
        for (i, column) in columns.iter().enumerate() {
            let cell = cell_text(row.get(*column));
            widths[i] = widths[i].max(UnicodeWidthStr::width(cell.as_str())).min(MAX_CELL_WIDTH);
        }
    }

    let header: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| pad_right(c, widths[i]))
        .collect();
    let header = header.join("  ");
    println!("{}", header.bold());
    println!("{}", "─".repeat(UnicodeWidthStr::width(header.as_str())));

    for row in &result.data {
        let line: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| pad_right(&truncate(&cell_text(row.get(*c)), widths[i]), widths[i]))
            .collect();
        println!("{}", line.join("  "));
    }

    println!();
    println!("{} row(s)", result.count);
}

/// Print a failure envelope.
pub fn print_failure(result: &QueryResult) {
    let reason = result.meta.error.as_deref().unwrap_or("unknown error");
    println!("{} {}", "Query failed:".red().bold(), reason);
    if let Some(cypher) = &result.meta.cypher {
        println!("{}", cypher.dimmed());
    }
}

/// Print one completion record.
pub fn print_completion(record: &CompletionRecord) {
    println!(
        "{} {}",
        record.scope_id.cyan().bold(),
        format!("({} records)", record.total_records).dimmed()
    );
    println!(
        "  {} / {} fields populated",
        record.completed_fields, record.total_fields
    );
    println!("  {}: {}", "Completion".bold(), rate_colored(record.completion_rate));
}

/// Print stage completion as a table.
pub fn print_stages(stages: &[StageCompletion]) {
    if stages.is_empty() {
        println!("{}", "No stages configured.".dimmed());
        return;
    }

    println!(
        "{:<14} {:<12} {:>8} {:>10} {:>8}",
        "Stage", "Entity", "Records", "Fields", "Rate"
    );
    println!("{}", "─".repeat(58));
    for stage in stages {
        let completion = &stage.completion;
        println!(
            "{:<14} {:<12} {:>8} {:>10} {:>8}",
            stage.stage,
            stage.entity,
            completion.total_records,
            format!("{}/{}", completion.completed_fields, completion.total_fields),
            rate_colored(completion.completion_rate)
        );
    }
}

/// Print ranked causal patterns.
pub fn print_patterns(patterns: &[CausalPattern]) {
    if patterns.is_empty() {
        println!("{}", "No causal patterns found.".dimmed());
        return;
    }

    println!(
        "{:<4} {:<30} {:<24} {:<16} {:>6}",
        "#", "Primary cause", "Secondary", "Category", "Freq"
    );
    println!("{}", "─".repeat(84));
    for (i, pattern) in patterns.iter().enumerate() {
        let secondary = pattern.secondary_cause.as_deref().unwrap_or("-");
        println!(
            "{:<4} {:<30} {:<24} {:<16} {:>6}",
            i + 1,
            truncate(&pattern.primary_cause, 28),
            truncate(secondary, 22),
            truncate(&pattern.category, 14),
            pattern.frequency
        );
    }
    println!();
    println!("{} pattern(s)", patterns.len());
}

/// Print a distribution breakdown with share bars.
pub fn print_shares(shares: &[CategoryShare]) {
    if shares.is_empty() {
        println!("{}", "No categories found.".dimmed());
        return;
    }

    for share in shares {
        let bar_len = (share.percentage / 5.0).round() as usize;
        println!(
            "{:<24} {:>10.1} {:>6.1}% {}",
            truncate(&share.category, 22),
            share.amount,
            share.percentage,
            "█".repeat(bar_len.min(20)).cyan()
        );
    }
}

/// Print a target-vs-peers comparison.
pub fn print_comparison(comparison: &EntityComparison) {
    println!(
        "{} {}",
        comparison.target_id.cyan().bold(),
        format!("({})", comparison.metric).dimmed()
    );
    println!("  {}: {:.1}", "Target".bold(), comparison.target_value);
    println!(
        "  {}: {:.1} across {} peer(s)",
        "Peer mean".bold(),
        comparison.peer_mean,
        comparison.peer_count
    );
    println!(
        "  {}: {}",
        "Percentile".bold(),
        format!("{:.1}", comparison.percentile_rank).yellow()
    );
}

fn rate_colored(rate: f64) -> ColoredString {
    let text = format!("{rate:.1}%");
    if rate >= 80.0 {
        text.green()
    } else if rate >= 50.0 {
        text.yellow()
    } else {
        text.red()
    }
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None => String::new(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Pad a plain string to a given visual width (right-padded).
fn pad_right(s: &str, width: usize) -> String {
    let visual = UnicodeWidthStr::width(s);
    if visual >= width {
        s.to_string()
    } else {
        format!("{}{}", s, " ".repeat(width - visual))
    }
}

/// Truncate a string respecting visual width.
fn truncate(s: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(s) <= max_width {
        return s.to_string();
    }
    if max_width <= 1 {
        return "…".repeat(max_width);
    }
    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = UnicodeWidthStr::width(c.to_string().as_str());
        if used + w > max_width - 1 {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}
