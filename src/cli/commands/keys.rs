use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::cli::KeysAction;
use crate::cli::context::Settings;
use crate::cli::commands::provider_helpers;
use crate::cli::output;
use crate::core::errors::{ProtectorError, Result};
use crate::core::models::key_record::KeyStatus;
use crate::core::services::key_ring_provider::KeyRingProvider;

/// Execute the `data-protector keys` command.
pub fn execute(settings: &Settings, action: &KeysAction) -> Result<()> {
    let provider = provider_helpers::build_provider(settings)?;
    let rings = provider.ring_provider(provider.options().application.as_deref())?;
    if !rings.store().is_persistent() {
        output::warning("No key location configured; keys only live for this command.");
    }

    match action {
        KeysAction::List => execute_list(&rings),
        KeysAction::Rotate => execute_rotate(&rings),
        KeysAction::Revoke { id } => execute_revoke(&rings, id),
    }
}

/// List every record in the configured ring, newest first.
fn execute_list(rings: &KeyRingProvider) -> Result<()> {
    let mut records = rings.store().list_all()?;

    if records.is_empty() {
        output::warning("No keys yet.");
        println!("  A key is generated on the first protect, or run 'data-protector keys rotate'.");
        return Ok(());
    }

    records.sort_by(|a, b| b.generation.cmp(&a.generation));
    let now = Utc::now();
    let current = records
        .iter()
        .filter(|r| r.is_eligible_at(now))
        .map(|r| r.generation)
        .max();

    output::header(&format!(
        "Keys in {} ({})",
        rings.store().location(),
        records.len()
    ));
    for record in &records {
        let marker = if Some(record.generation) == current {
            " (current)"
        } else {
            ""
        };
        println!(
            "  • {}  gen {:<4} {:<8} active {}  expires {}{marker}",
            record.id,
            record.generation,
            record.status,
            format_time(&record.activation_at),
            record
                .expiration_at
                .as_ref()
                .map(format_time)
                .unwrap_or_else(|| "never".into()),
        );
    }

    Ok(())
}

/// Generate a new active key now.
fn execute_rotate(rings: &KeyRingProvider) -> Result<()> {
    let record = rings.rotate()?;

    output::success(&format!(
        "Generated key {} (generation {})",
        record.id, record.generation
    ));
    println!("  Existing payloads stay readable; new payloads use this key.");
    Ok(())
}

/// Mark a key revoked so payloads protected with it are rejected.
fn execute_revoke(rings: &KeyRingProvider, id: &Uuid) -> Result<()> {
    let store = rings.store();

    let record = store
        .get(id)?
        .ok_or(ProtectorError::UnknownKey { id: *id })?;
    if record.status == KeyStatus::Revoked {
        output::warning(&format!("Key {id} is already revoked."));
        return Ok(());
    }

    store.put(&record.with_status(KeyStatus::Revoked))?;
    info!(key_id = %id, generation = record.generation, "revoked key");

    output::success(&format!("Revoked key {id}"));
    if record.status == KeyStatus::Active {
        println!("  It was the active key; a new one is generated on the next protect.");
    }
    Ok(())
}

fn format_time(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
