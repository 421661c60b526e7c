//! Command-line entry point for the person enrichment service.
//!
//! # Responsibility
//! - Expose create/update/delete/get/list over the core service.
//! - Print results as JSON and map failures to stable exit codes.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::debug;
use person_core::db::open_db;
use person_core::{
    core_version, init_logging, Enricher, HttpLookupClient, PersonFilter, PersonId, PersonInput,
    PersonService, ServiceConfig, ServiceError,
};
use serde::Serialize;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "person", version, about = "Enrich and store person records")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Enrich and store a new person.
    Create(NameArgs),
    /// Re-enrich and overwrite an existing person.
    Update {
        id: PersonId,
        #[command(flatten)]
        names: NameArgs,
    },
    /// Delete a person by id.
    Delete { id: PersonId },
    /// Show one person by id.
    Get { id: PersonId },
    /// List persons, newest first.
    List(ListArgs),
    /// Print the core library version.
    Version,
}

#[derive(Debug, Args)]
struct NameArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    surname: String,
    #[arg(long)]
    patronymic: Option<String>,
}

impl NameArgs {
    fn into_input(self) -> PersonInput {
        PersonInput {
            name: self.name,
            surname: self.surname,
            patronymic: self.patronymic,
        }
    }
}

#[derive(Debug, Args)]
struct ListArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    surname: Option<String>,
    #[arg(long)]
    patronymic: Option<String>,
    #[arg(long)]
    gender: Option<String>,
    #[arg(long)]
    nationality: Option<String>,
    #[arg(long)]
    min_age: Option<u32>,
    #[arg(long)]
    max_age: Option<u32>,
    #[arg(long, default_value_t = 1)]
    page: u32,
    #[arg(long, default_value_t = 0)]
    page_size: u32,
}

impl ListArgs {
    fn into_filter(self) -> PersonFilter {
        PersonFilter {
            name: self.name,
            surname: self.surname,
            patronymic: self.patronymic,
            gender: self.gender,
            nationality: self.nationality,
            min_age: self.min_age,
            max_age: self.max_age,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_code_for(&err)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Command::Version = cli.command {
        println!("person_core version={}", core_version());
        return Ok(());
    }

    let config = ServiceConfig::from_env().context("failed to load configuration")?;
    init_logging(&config.log_level, config.log_dir.as_deref())
        .context("failed to initialize logging")?;
    debug!("event=cli_start module=cli status=ok command={:?}", cli.command);

    let conn = open_db(&config.db_path)
        .with_context(|| format!("failed to open database `{}`", config.db_path.display()))?;
    let client = HttpLookupClient::new(config.endpoints.clone())
        .context("failed to build lookup client")?;
    let enricher = Enricher::new(client).with_budget(config.enrich_timeout);
    let service = PersonService::new(&conn, enricher)
        .with_operation_timeout(config.operation_timeout)
        .with_page_limits(config.page_limits);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    match cli.command {
        Command::Create(names) => {
            let person = runtime.block_on(service.create_person(&names.into_input()))?;
            print_json(&person)
        }
        Command::Update { id, names } => {
            let person = runtime.block_on(service.update_person(id, &names.into_input()))?;
            print_json(&person)
        }
        Command::Delete { id } => {
            service.delete_person(id)?;
            println!("deleted {id}");
            Ok(())
        }
        Command::Get { id } => match service.get_person(id)? {
            Some(person) => print_json(&person),
            None => Err(ServiceError::NotFound(id).into()),
        },
        Command::List(args) => print_json(&service.list_persons(args.into_filter())?),
        Command::Version => Ok(()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render JSON")?;
    println!("{rendered}");
    Ok(())
}

fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<ServiceError>() {
        Some(ServiceError::Validation(_)) => ExitCode::from(2),
        Some(ServiceError::NotFound(_)) => ExitCode::from(3),
        Some(ServiceError::Enrichment(_)) => ExitCode::from(4),
        Some(ServiceError::Persistence(_)) | None => ExitCode::FAILURE,
    }
}
