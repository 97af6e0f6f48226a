use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use tasksync_config::ConfigManager;
use tasksync_core::Version;

mod commands;

fn build_cli() -> Command {
    Command::new("tasksync")
        .version(env!("CARGO_PKG_VERSION"))
        .author("TaskSync Developers")
        .about("Versioned task sync server and maintenance tool")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("DIR")
                .help("Directory holding config.toml (defaults to the platform config dir)")
                .global(true),
        )
        .arg(
            Arg::new("database")
                .short('d')
                .long("database")
                .value_name("PATH")
                .help("Path to the database file, overriding the config")
                .global(true),
        )
        .subcommand(Command::new("init").about("Create the database, apply migrations and provision accounts"))
        .subcommand(
            Command::new("account")
                .about("Resolve an identity to its account, creating it on first use")
                .arg(Arg::new("identity").required(true).value_name("IDENTITY").help("Verified identity, e.g. an e-mail address")),
        )
        .subcommand(
            Command::new("pull")
                .about("Show the changes of an account after a watermark")
                .arg(Arg::new("identity").required(true).value_name("IDENTITY").help("Account identity"))
                .arg(
                    Arg::new("since")
                        .short('s')
                        .long("since")
                        .value_name("N")
                        .help("Watermark from the previous pull")
                        .value_parser(clap::value_parser!(i64))
                        .default_value("0"),
                )
                .arg(
                    Arg::new("gzip")
                        .short('z')
                        .long("gzip")
                        .help("Write the gzip-encoded response body to stdout")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("push")
                .about("Apply a file of edits on behalf of an account")
                .arg(Arg::new("identity").required(true).value_name("IDENTITY").help("Account identity"))
                .arg(Arg::new("file").required(true).value_name("FILE").help("JSON array of edits, or {\"tasks\": [...]}")),
        )
        .subcommand(
            Command::new("request")
                .about("Dispatch a raw protocol request and print the reply")
                .arg(Arg::new("identity").required(true).value_name("IDENTITY").help("Signed-in identity"))
                .arg(Arg::new("name").required(true).value_name("NAME").help("Request name, e.g. tasks or save"))
                .arg(Arg::new("arguments").value_name("JSON").help("Request arguments").default_value("{}")),
        )
        .subcommand(
            Command::new("config")
                .about("Inspect or create the configuration file")
                .subcommand_required(true)
                .subcommand(Command::new("show").about("Print the effective configuration"))
                .subcommand(Command::new("init").about("Write a default config file if none exists"))
                .subcommand(Command::new("validate").about("Check the config file for invalid values")),
        )
}

fn config_manager(matches: &ArgMatches) -> Result<ConfigManager> {
    let manager = match matches.get_one::<String>("config") {
        Some(dir) => ConfigManager::with_directory(PathBuf::from(dir)),
        None => ConfigManager::new(),
    };
    manager.context("Failed to locate configuration directory")
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("Argument <{}> is required", name))
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();

    let manager = config_manager(&matches)?;
    let config = manager
        .load_with_env_overrides()
        .with_context(|| format!("Failed to load {}", manager.config_path().display()))?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.server.log_level.to_string()),
    )
    .init();

    if let Some(("config", sub_matches)) = matches.subcommand() {
        return match sub_matches.subcommand() {
            Some(("show", _)) => commands::show_config(&manager, &config),
            Some(("init", _)) => commands::init_config(&manager),
            Some(("validate", _)) => commands::validate_config(&manager),
            _ => Ok(()),
        };
    }

    let db_path = matches
        .get_one::<String>("database")
        .map(PathBuf::from)
        .unwrap_or_else(|| manager.database_path(&config));

    let Some((name, sub_matches)) = matches.subcommand() else {
        build_cli().print_help()?;
        return Ok(());
    };

    let engine = commands::open_engine(&config, &db_path)
        .await
        .context("Failed to initialize database")?;

    let result = match name {
        "init" => commands::init(&engine, &db_path).await,
        "account" => commands::show_account(&engine, required(sub_matches, "identity")?).await,
        "pull" => {
            let since = sub_matches.get_one::<i64>("since").copied().unwrap_or(0);
            commands::pull(
                &engine,
                required(sub_matches, "identity")?,
                Version::from_raw(since),
                sub_matches.get_flag("gzip") && config.sync.gzip_responses,
            )
            .await
        }
        "push" => {
            commands::push(
                &engine,
                required(sub_matches, "identity")?,
                required(sub_matches, "file")?,
                &commands::retry_policy(&config.sync),
            )
            .await
            .map(|_| ())
        }
        "request" => {
            commands::request(
                &engine,
                required(sub_matches, "identity")?,
                required(sub_matches, "name")?,
                required(sub_matches, "arguments")?,
            )
            .await
        }
        _ => {
            build_cli().print_help()?;
            Ok(())
        }
    };

    engine.store().clone().close().await;
    result
}
