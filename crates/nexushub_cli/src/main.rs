//! Operator CLI over the NexusHub record store.
//!
//! # Responsibility
//! - Open a migrated database and run tenant-scoped transfer and lifecycle
//!   commands against any registered entity.
//! - Print machine-readable JSON summaries on stdout.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};
use nexushub_core::schema::registry;
use nexushub_core::{
    default_log_level, init_logging, open_db, EntitySchema, ListFilter, RecordRepository,
    RecordTransfer, RepoConfig, SqliteRecordRepository, TenantId,
};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "nexushub", version)]
#[command(about = "Tenant-scoped record store maintenance")]
struct Cli {
    /// SQLite database file; created and migrated when missing
    #[arg(long, env = "NEXUSHUB_DB", value_name = "PATH", default_value = "nexushub.db")]
    db: PathBuf,

    /// Absolute directory for rolling log files; logging is off when unset
    #[arg(long, env = "NEXUSHUB_LOG_DIR", value_name = "DIR")]
    log_dir: Option<String>,

    /// trace|debug|info|warn|error
    #[arg(long, env = "NEXUSHUB_LOG_LEVEL")]
    log_level: Option<String>,

    /// JSON file with repository settings
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Overrides `max_page_size` from the config file
    #[arg(long)]
    max_page_size: Option<u32>,

    /// Overrides `tag_delimiter` from the config file
    #[arg(long)]
    tag_delimiter: Option<char>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lists registered entities and their exportable fields
    Entities,
    /// Prints the core version and a health probe
    Ping,
    /// Imports a CSV file; one record per data row
    Import {
        #[arg(long, env = "NEXUSHUB_TENANT")]
        tenant: Uuid,
        entity: String,
        file: PathBuf,
    },
    /// Exports active records as CSV
    Export {
        #[arg(long, env = "NEXUSHUB_TENANT")]
        tenant: Uuid,
        entity: String,
        /// Free-text search over the entity's searchable fields
        #[arg(long)]
        search: Option<String>,
        /// Output file; stdout when omitted
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Soft-deletes records by id
    Delete {
        #[arg(long, env = "NEXUSHUB_TENANT")]
        tenant: Uuid,
        entity: String,
        #[arg(required = true)]
        ids: Vec<Uuid>,
    },
    /// Restores a soft-deleted record
    Restore {
        #[arg(long, env = "NEXUSHUB_TENANT")]
        tenant: Uuid,
        entity: String,
        id: Uuid,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir)?;
    }

    let result = run(&cli);
    match &result {
        Ok(()) => info!("event=cli_command module=cli status=ok db={}", cli.db.display()),
        Err(err) => error!("event=cli_command module=cli status=error error={err:#}"),
    }
    result
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Entities => {
            for schema in registry::all() {
                println!("{}\t{}", schema.entity, schema.export_fields.join(","));
            }
            Ok(())
        }
        Command::Ping => {
            println!("nexushub_core ping={}", nexushub_core::ping());
            println!("nexushub_core version={}", nexushub_core::core_version());
            Ok(())
        }
        Command::Import {
            tenant,
            entity,
            file,
        } => {
            let text = fs::read_to_string(file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let conn = open_db(&cli.db)?;
            let repo = repository(&conn, entity, load_config(cli)?)?;
            let result = RecordTransfer::new(&repo).import_csv(TenantId::new(*tenant), &text)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Command::Export {
            tenant,
            entity,
            search,
            output,
        } => {
            let conn = open_db(&cli.db)?;
            let repo = repository(&conn, entity, load_config(cli)?)?;
            let mut filter = ListFilter::new();
            if let Some(text) = search {
                filter = filter.search(text.as_str());
            }
            let csv = RecordTransfer::new(&repo).export_csv(TenantId::new(*tenant), &filter)?;
            match output {
                Some(path) => fs::write(path, csv)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => print!("{csv}"),
            }
            Ok(())
        }
        Command::Delete {
            tenant,
            entity,
            ids,
        } => {
            let conn = open_db(&cli.db)?;
            let repo = repository(&conn, entity, load_config(cli)?)?;
            let result = repo.bulk_delete(TenantId::new(*tenant), ids);
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Command::Restore { tenant, entity, id } => {
            let conn = open_db(&cli.db)?;
            let repo = repository(&conn, entity, load_config(cli)?)?;
            let record = repo.restore(TenantId::new(*tenant), *id)?;
            println!("restored {} {}", record.entity, record.id);
            Ok(())
        }
    }
}

fn lookup_entity(name: &str) -> Result<&'static EntitySchema> {
    registry::lookup(name).ok_or_else(|| {
        let known: Vec<_> = registry::all().iter().map(|schema| schema.entity).collect();
        anyhow!("unknown entity `{name}`; expected one of: {}", known.join(", "))
    })
}

fn repository<'conn>(
    conn: &'conn rusqlite::Connection,
    entity: &str,
    config: RepoConfig,
) -> Result<SqliteRecordRepository<'conn>> {
    let schema = lookup_entity(entity)?;
    Ok(SqliteRecordRepository::with_config(conn, schema, config)?)
}

fn load_config(cli: &Cli) -> Result<RepoConfig> {
    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => RepoConfig::default(),
    };
    if let Some(max_page_size) = cli.max_page_size {
        config.max_page_size = max_page_size;
    }
    if let Some(delimiter) = cli.tag_delimiter {
        config.tag_delimiter = delimiter;
    }
    if let Err(err) = config.validate() {
        bail!("invalid configuration: {err}");
    }
    Ok(config)
}

fn read_config(path: &Path) -> Result<RepoConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    Ok(RepoConfig::from_json_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::{load_config, lookup_entity, Cli, Command};
    use clap::{CommandFactory, Parser};
    use std::io::Write;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn delete_requires_at_least_one_id() {
        let tenant = uuid::Uuid::new_v4().to_string();
        let result = Cli::try_parse_from(["nexushub", "delete", "--tenant", &tenant, "company"]);
        assert!(result.is_err());
    }

    #[test]
    fn export_parses_search_and_output() {
        let tenant = uuid::Uuid::new_v4().to_string();
        let cli = Cli::try_parse_from([
            "nexushub",
            "--db",
            "/tmp/crm.db",
            "export",
            "--tenant",
            &tenant,
            "contact",
            "--search",
            "ada",
            "-o",
            "out.csv",
        ])
        .unwrap();
        match cli.command {
            Command::Export {
                entity,
                search,
                output,
                ..
            } => {
                assert_eq!(entity, "contact");
                assert_eq!(search.as_deref(), Some("ada"));
                assert_eq!(output.unwrap().to_str(), Some("out.csv"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn unknown_entity_lists_known_ones() {
        let err = lookup_entity("invoice").unwrap_err();
        assert!(err.to_string().contains("company"));
    }

    #[test]
    fn flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_page_size": 50, "default_page_size": 10}}"#).unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = Cli::try_parse_from([
            "nexushub",
            "--config",
            &path,
            "--max-page-size",
            "20",
            "--tag-delimiter",
            "|",
            "entities",
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.max_page_size, 20);
        assert_eq!(config.default_page_size, 10);
        assert_eq!(config.tag_delimiter, '|');
    }

    #[test]
    fn invalid_override_is_rejected() {
        let cli = Cli::try_parse_from(["nexushub", "--tag-delimiter", ",", "entities"]).unwrap();
        assert!(load_config(&cli).is_err());
    }
}
