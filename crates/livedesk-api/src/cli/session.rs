//! Session listing CLI command.

use anyhow::Result;
use chrono::{DateTime, Utc};
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use livedesk_core::chat::repository::ChatRepository;
use livedesk_types::chat::SessionStatus;

use crate::state::AppState;

/// List chat sessions, optionally filtered by status.
///
/// The CLI runs in the operator context, so it lists across all staff
/// rather than applying the per-staff visibility rule.
pub async fn list_sessions(state: &AppState, status: Option<String>, json: bool) -> Result<()> {
    let status_filter = match status {
        Some(s) => Some(s.parse::<SessionStatus>().map_err(|e| anyhow::anyhow!(e))?),
        None => None,
    };

    let sessions = state
        .lifecycle
        .repo()
        .list_all_sessions(status_filter)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!();
        println!(
            "  {} No sessions found.",
            style("i").blue().bold()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Id").fg(Color::White),
        Cell::new("Subject").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Customer").fg(Color::White),
        Cell::new("Staff").fg(Color::White),
        Cell::new("Last Message").fg(Color::White),
    ]);

    for session in &sessions {
        let status_cell = match session.status {
            SessionStatus::Waiting => Cell::new("● waiting").fg(Color::Yellow),
            SessionStatus::Active => Cell::new("● active").fg(Color::Green),
            SessionStatus::Closed => Cell::new("◌ closed").fg(Color::DarkGrey),
        };

        let subject = ellipsize(session.subject.as_deref().unwrap_or("(no subject)"), 40);

        let staff = match session.admin_user_id {
            Some(id) => short_id(&id.to_string()),
            None => "-".to_string(),
        };

        table.add_row(vec![
            Cell::new(short_id(&session.id.to_string())),
            Cell::new(subject),
            status_cell,
            Cell::new(short_id(&session.customer_user_id.to_string())),
            Cell::new(staff),
            Cell::new(format_relative_time(&session.last_message_at)),
        ]);
    }

    println!();
    println!("{table}");
    println!(
        "  {}",
        style(format!("{} session(s)", sessions.len())).dim()
    );
    println!();

    Ok(())
}

/// Shorten subjects for the table, cutting on a char boundary so
/// multi-byte customer text never splits mid-character.
fn ellipsize(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}

/// First id segment, enough to disambiguate in a terminal listing.
fn short_id(id: &str) -> String {
    id.split('-').next().unwrap_or(id).to_string()
}

fn format_relative_time(dt: &DateTime<Utc>) -> String {
    let delta = Utc::now().signed_duration_since(*dt);
    if delta.num_seconds() < 60 {
        "just now".to_string()
    } else if delta.num_minutes() < 60 {
        format!("{}m ago", delta.num_minutes())
    } else if delta.num_hours() < 24 {
        format!("{}h ago", delta.num_hours())
    } else {
        format!("{}d ago", delta.num_days())
    }
}
