//! Command-line front end for the quote store.
//!
//! # Responsibility
//! - Map subcommands onto `QuoteService` calls.
//! - Keep output line-oriented and stable for scripting.

use clap::{crate_description, crate_name, crate_version, Arg, ArgMatches, Command};
use log::info;
use quote_core::{init_logging, ClusterConfig, Quote, QuoteService, ServiceConfig, DEFAULT_BUCKET};
use std::error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let matches = app().get_matches();
    match run(&matches) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn app() -> Command {
    Command::new(crate_name!())
        .about(crate_description!())
        .version(crate_version!())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("data_dir")
                .long("data-dir")
                .value_name("DIR")
                .global(true)
                .help("Directory holding bucket files; omit to run in memory"),
        )
        .arg(
            Arg::new("bucket")
                .long("bucket")
                .value_name("NAME")
                .default_value(DEFAULT_BUCKET)
                .global(true)
                .help("Bucket to open"),
        )
        .arg(
            Arg::new("log_dir")
                .long("log-dir")
                .value_name("DIR")
                .global(true)
                .help("Absolute directory for rolling log files"),
        )
        .arg(
            Arg::new("log_level")
                .long("log-level")
                .value_name("LEVEL")
                .default_value(quote_core::default_log_level())
                .global(true)
                .help("trace|debug|info|warn|error"),
        )
        .subcommand(
            Command::new("add")
                .about("Store a quote, replacing any quote with the same name")
                .arg(Arg::new("name").value_name("NAME").required(true))
                .arg(Arg::new("quote").value_name("QUOTE").required(true)),
        )
        .subcommand(
            Command::new("get")
                .about("Print the quote stored for a name")
                .arg(Arg::new("name").value_name("NAME").required(true)),
        )
        .subcommand(Command::new("list").about("Print every stored quote"))
}

fn run(matches: &ArgMatches) -> Result<ExitCode, Box<dyn error::Error>> {
    if let Some(log_dir) = matches.get_one::<String>("log_dir") {
        let level = matches
            .get_one::<String>("log_level")
            .map_or("info", String::as_str);
        init_logging(level, log_dir)?;
    }

    let config = service_config(matches);
    let service = QuoteService::start(&config)?;
    info!(
        "event=cli_command module=cli status=start command={}",
        matches.subcommand_name().unwrap_or("none")
    );
    let outcome = run_command(&service, matches);
    service.shutdown();
    outcome
}

fn service_config(matches: &ArgMatches) -> ServiceConfig {
    let cluster = matches
        .get_one::<String>("data_dir")
        .map_or(ClusterConfig::InMemory, ClusterConfig::directory);
    let bucket = matches
        .get_one::<String>("bucket")
        .cloned()
        .unwrap_or_else(|| DEFAULT_BUCKET.to_string());
    ServiceConfig { cluster, bucket }
}

fn run_command(
    service: &QuoteService,
    matches: &ArgMatches,
) -> Result<ExitCode, Box<dyn error::Error>> {
    match matches.subcommand() {
        Some(("add", sub)) => {
            let quote = Quote::new(required(sub, "name")?, required(sub, "quote")?);
            if service.upsert_quote(&quote)? {
                println!("stored");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("conflict");
                Ok(ExitCode::FAILURE)
            }
        }
        Some(("get", sub)) => match service.get_quote(required(sub, "name")?)? {
            Some(quote) => {
                println!("{}: {}", quote.name, quote.quote);
                Ok(ExitCode::SUCCESS)
            }
            None => {
                println!("not found");
                Ok(ExitCode::FAILURE)
            }
        },
        Some(("list", _)) => {
            for quote in service.fetch_all_quotes()? {
                println!("{}: {}", quote.name, quote.quote);
            }
            Ok(ExitCode::SUCCESS)
        }
        _ => Err("unknown subcommand".into()),
    }
}

fn required<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a str, String> {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .ok_or_else(|| format!("missing argument `{id}`"))
}
