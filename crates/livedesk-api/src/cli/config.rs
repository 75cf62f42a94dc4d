//! Chat settings CLI commands backed by the system parameter store.
//!
//! `config list` shows both the stored raw value and the effective value
//! after parsing and range clamping, so an operator can see when a stored
//! `poll_interval_seconds = 120` is actually running as 60.

use anyhow::Result;
use clap::Subcommand;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use livedesk_core::settings::{load_chat_settings, ParameterStore};
use livedesk_types::config::ChatSettings;

use crate::state::AppState;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show a single chat setting.
    Get {
        /// Setting key (e.g., poll_interval_seconds).
        key: String,
    },

    /// Store a chat setting.
    Set {
        /// Setting key (e.g., auto_forward_chat).
        key: String,
        /// Raw value (numbers, or yes/no for flags).
        value: String,
    },

    /// Show all chat settings with stored and effective values.
    List,
}

/// Dispatch a `config` subcommand.
pub async fn run(state: &AppState, action: ConfigCommand, json: bool) -> Result<()> {
    match action {
        ConfigCommand::Get { key } => get(state, &key, json).await,
        ConfigCommand::Set { key, value } => set(state, &key, &value, json).await,
        ConfigCommand::List => list(state, json).await,
    }
}

fn check_key(key: &str) -> Result<()> {
    if !ChatSettings::KEYS.contains(&key) {
        anyhow::bail!(
            "unknown setting '{}'; known keys: {}",
            key,
            ChatSettings::KEYS.join(", ")
        );
    }
    Ok(())
}

async fn get(state: &AppState, key: &str, json: bool) -> Result<()> {
    check_key(key)?;
    let stored = state
        .params
        .get_parameter(ChatSettings::NAMESPACE, key)
        .await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "key": key, "value": stored }))?
        );
        return Ok(());
    }

    match stored {
        Some(value) => println!("{value}"),
        None => println!("{}", style("(unset, default applies)").dim()),
    }
    Ok(())
}

async fn set(state: &AppState, key: &str, value: &str, json: bool) -> Result<()> {
    check_key(key)?;

    // Dry-run the parse so a typo'd value is rejected instead of stored.
    let mut probe = ChatSettings::default();
    if !probe.apply_raw(key, value) {
        anyhow::bail!("invalid value '{value}' for setting '{key}'");
    }

    state
        .params
        .set_parameter(ChatSettings::NAMESPACE, key, value)
        .await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "key": key, "value": value }))?
        );
        return Ok(());
    }

    println!(
        "  {} {} = {}",
        style("✓").green().bold(),
        style(key).bold(),
        value
    );
    Ok(())
}

async fn list(state: &AppState, json: bool) -> Result<()> {
    let effective = load_chat_settings(&state.params).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&effective)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Key").fg(Color::White),
        Cell::new("Stored").fg(Color::White),
        Cell::new("Effective").fg(Color::White),
    ]);

    for key in ChatSettings::KEYS {
        let stored = state
            .params
            .get_parameter(ChatSettings::NAMESPACE, key)
            .await?;
        let effective_value = match key {
            "poll_interval_seconds" => effective.poll_interval_seconds.to_string(),
            "long_poll_timeout_seconds" => effective.long_poll_timeout_seconds.to_string(),
            "auto_forward_chat" => yes_no(effective.auto_forward_chat),
            "ask_before_forward" => yes_no(effective.ask_before_forward),
            "forward_delay_minutes" => effective.forward_delay_minutes.to_string(),
            "max_chat_history_days" => effective.max_chat_history_days.to_string(),
            _ => unreachable!("KEYS and the match arms move together"),
        };

        let stored_cell = match stored {
            Some(value) => Cell::new(value),
            None => Cell::new("(unset)").fg(Color::DarkGrey),
        };
        table.add_row(vec![Cell::new(key), stored_cell, Cell::new(effective_value)]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

fn yes_no(flag: bool) -> String {
    if flag { "yes" } else { "no" }.to_string()
}
