//! `recordstore` command line: inspect and maintain a store.

use crate::core::config::{CONFIG_FILE_NAME, StoreConfig};
use crate::core::model::Model;
use crate::core::store::Store;
use crate::core::time;
use crate::entities::{GuildProfile, Supporter};
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "recordstore",
    version = env!("CARGO_PKG_VERSION"),
    about = "Inspect and maintain a record store"
)]
pub struct Cli {
    /// Config file (TOML). Defaults to ./recordstore.toml when present.
    #[clap(long)]
    pub config: Option<PathBuf>,
    /// Storage URI overriding the config: `sqlite://<path>` or a directory.
    #[clap(long)]
    pub uri: Option<String>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the active backend and collection directories.
    Info,
    /// Supporter records.
    Supporter {
        #[clap(subcommand)]
        action: SupporterAction,
    },
    /// Guild profile records.
    Guild {
        #[clap(subcommand)]
        action: RecordAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum RecordAction {
    /// Print one record by id.
    Get { id: String },
    /// Print the first record whose FIELD equals VALUE (JSON, or a plain string).
    Find { field: String, value: String },
    /// Print every record.
    List,
    /// Delete a record by id.
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum SupporterAction {
    #[clap(flatten)]
    Record(RecordAction),
    /// Back a guild. The supporter must exist and be valid at NOW (RFC 3339).
    AddGuild {
        id: String,
        guild: String,
        #[clap(long)]
        now: String,
    },
    /// Stop backing a guild.
    RemoveGuild { id: String, guild: String },
    /// List guilds backed by supporters valid at NOW (RFC 3339).
    ValidGuilds {
        #[clap(long)]
        now: String,
    },
}

fn load_config(cli: &Cli) -> Result<StoreConfig> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
    let mut config = StoreConfig::load(&path)
        .with_context(|| format!("failed to load config: {}", path.display()))?;
    if let Some(uri) = &cli.uri {
        config.database.uri = uri.clone();
    }
    Ok(config)
}

/// CLI values are JSON when they parse as JSON, plain strings otherwise.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn view<M: Model>(model: &M) -> Value {
    Value::Object(model.record().data().clone())
}

fn run_record_action<M: Model>(store: &Store, action: &RecordAction) -> Result<Value> {
    let kind = M::COLLECTION;
    match action {
        RecordAction::Get { id } => {
            let found = store.get::<M>(id)?;
            Ok(json!({ "collection": kind, "record": found.as_ref().map(view) }))
        }
        RecordAction::Find { field, value } => {
            let found = store.get_by::<M>(field, parse_value(value))?;
            Ok(json!({ "collection": kind, "record": found.as_ref().map(view) }))
        }
        RecordAction::List => {
            let all = store.get_all::<M>()?;
            let records: Vec<Value> = all.iter().map(view).collect();
            Ok(json!({ "collection": kind, "count": records.len(), "records": records }))
        }
        RecordAction::Delete { id } => {
            let Some(found) = store.get::<M>(id)? else {
                bail!("no record {} in {}", id, kind);
            };
            store.delete(&found)?;
            Ok(json!({ "collection": kind, "deleted": id }))
        }
    }
}

/// Add `guild` to a valid supporter's backing, refusing guilds that another
/// valid supporter already backs.
fn back_guild(store: &Store, id: &str, guild: &str, now: &str) -> Result<Supporter> {
    let mut supporter = match store.get::<Supporter>(id)? {
        Some(supporter) if supporter.is_valid(now) => supporter,
        _ => bail!("{} must be a valid patron to back a guild", id),
    };
    if !supporter.has_capacity() {
        bail!(
            "supporter {} already backs the maximum of {} guilds",
            id,
            supporter.max_guilds()
        );
    }
    if supporter.guilds().iter().any(|g| g == guild) {
        bail!("guild {} is already backed by {}", guild, id);
    }
    if Supporter::valid_guilds(store, now)?.iter().any(|g| g == guild) {
        bail!("guild {} is already backed by another patron", guild);
    }
    supporter.add_guild(guild);
    store.save(&mut supporter)?;
    Ok(supporter)
}

fn run_supporter_action(store: &Store, action: &SupporterAction) -> Result<Value> {
    match action {
        SupporterAction::Record(action) => run_record_action::<Supporter>(store, action),
        SupporterAction::AddGuild { id, guild, now } => {
            let supporter = back_guild(store, id, guild, now)?;
            Ok(json!({ "supporter": view(&supporter) }))
        }
        SupporterAction::RemoveGuild { id, guild } => {
            let Some(mut supporter) = store.get::<Supporter>(id)? else {
                bail!("no supporter {}", id);
            };
            if !supporter.remove_guild(guild) {
                bail!("guild {} is not backed by {}", guild, id);
            }
            store.save(&mut supporter)?;
            Ok(json!({ "supporter": view(&supporter) }))
        }
        SupporterAction::ValidGuilds { now } => {
            let guilds = Supporter::valid_guilds(store, now)?;
            Ok(json!({ "guilds": guilds }))
        }
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Info => "info",
        Command::Supporter { .. } => "supporter",
        Command::Guild { .. } => "guild",
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let store = Store::new(load_config(&cli)?);

    let result = match &cli.command {
        Command::Info => {
            let config = store.config();
            Ok(json!({
                "backend": store.backend_kind().as_str(),
                "uri": config.database.uri,
                "folders": {
                    "supporters": store.folder_paths::<Supporter>(),
                    "guilds": store.folder_paths::<GuildProfile>(),
                },
                "audit_log": config.audit_log,
            }))
        }
        Command::Supporter { action } => run_supporter_action(&store, action),
        Command::Guild { action } => run_record_action::<GuildProfile>(&store, action),
    };

    let extra = result?;
    let envelope = time::command_envelope(command_name(&cli.command), "ok", extra);
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}
