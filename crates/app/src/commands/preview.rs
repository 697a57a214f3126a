//! The `quiz preview` command: build a round without opening a session and
//! show why each question was picked.

use std::io::Write;

use anyhow::Result;

use quiz_core::selection::RoundDiagnostic;
use services::{PracticeRequest, PracticeService};

pub async fn execute(service: &PracticeService, request: &PracticeRequest, json: bool) -> Result<()> {
    let rows = service.preview(request).await?;
    let mut stdout = std::io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut stdout, &rows)?;
        writeln!(stdout)?;
    } else {
        write_table(&mut stdout, &rows)?;
    }
    Ok(())
}

pub fn write_table<W: Write>(out: &mut W, rows: &[RoundDiagnostic]) -> Result<()> {
    if rows.is_empty() {
        writeln!(out, "No eligible questions.")?;
        return Ok(());
    }
    writeln!(
        out,
        "{:<14} {:<5} {:<20} {:>7} {:>4} {:>4} {:>5} {:<15} {:>4} {}",
        "question", "type", "topic", "weight", "att", "wrong", "rate", "familiarity", "prio", "forced"
    )?;
    for row in rows {
        writeln!(
            out,
            "{:<14} {:<5} {:<20} {:>7.2} {:>4} {:>4} {:>5.2} {:<15} {:>4} {}",
            row.question_id.as_str(),
            row.kind.as_str(),
            truncate(&row.topic, 20),
            row.weight,
            row.attempts,
            row.wrong,
            row.wrong_rate,
            row.familiarity.as_str(),
            row.teacher_priority,
            if row.force_repeat { "yes" } else { "" }
        )?;
    }
    Ok(())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max.saturating_sub(1)).collect();
    short.push('~');
    short
}
