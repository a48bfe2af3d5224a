use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use csvstudio::{
    AppConfig, CacheManager, CatalogStore, ConfigManager, ConnectionError, ConnectionManager,
    QueryHistory, TableLoader, Workbench,
};
use csvstudio_cli::{Args, Command};
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the log filter
const LOG_ENV: &str = "CSVSTUDIO_LOG";

const SHELL_PROMPT: &str = "csvstudio> ";

fn init_logging(verbose: bool) {
    let default = if verbose {
        "csvstudio=debug"
    } else {
        "csvstudio=warn"
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(io::stderr)
        .init();
}

fn config_manager(args: &Args) -> Result<ConfigManager> {
    match &args.config_dir {
        Some(dir) => Ok(ConfigManager::with_dir(dir.clone())),
        None => ConfigManager::new(csvstudio::APP_NAME),
    }
}

fn run_maintenance(args: &Args) -> Result<()> {
    if args.clear_cache {
        match CacheManager::new(csvstudio::APP_NAME) {
            Ok(cache) => {
                cache.clear_all()?;
                println!("Cache cleared successfully");
            }
            Err(_e) => println!("No cache to clear"),
        }
    }

    if args.generate_config {
        let path = config_manager(args)?.write_default_config(args.force)?;
        println!("Wrote default configuration to {}", path.display());
    }

    Ok(())
}

fn open_history(config: &AppConfig) -> QueryHistory {
    let cache = if config.query.enable_history {
        CacheManager::new(csvstudio::APP_NAME).ok()
    } else {
        None
    };
    QueryHistory::open(cache, config.query.history_limit)
}

fn print_notices(bench: &mut Workbench) {
    for notice in bench.take_notices() {
        eprintln!("{}", notice);
    }
}

/// Print the last query outcome. Returns false when it was an error.
fn print_outcome(bench: &Workbench) -> bool {
    match bench.last_outcome() {
        Some(Ok(result)) => {
            if !result.is_empty() {
                println!("{}", result.frame);
            }
            true
        }
        Some(Err(e)) => {
            eprintln!("Error: {}", e);
            false
        }
        None => true,
    }
}

/// Run one statement; query errors are reported, not propagated.
fn run_query(bench: &mut Workbench, history: &mut QueryHistory, sql: &str) -> Result<bool> {
    match bench.run(sql) {
        Ok(()) => {
            history.record(sql);
            print_notices(bench);
            Ok(print_outcome(bench))
        }
        Err(ConnectionError::Query(e)) => {
            print_notices(bench);
            eprintln!("Error: {}", e);
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

fn print_tables(bench: &Workbench) -> Result<()> {
    for table in bench.tables()? {
        println!("{}", table);
    }
    Ok(())
}

fn print_schema(bench: &Workbench, table: &str) -> Result<()> {
    for column in bench.describe(table)? {
        println!("{}\t{}", column.name, column.data_type);
    }
    Ok(())
}

fn publish(bench: &mut Workbench) -> Result<bool> {
    let report = bench.publish()?;
    print_notices(bench);
    Ok(report.is_success())
}

fn shell(bench: &mut Workbench, history: &mut QueryHistory) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("{}", SHELL_PROMPT);
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let result = match input.split_once(char::is_whitespace).unwrap_or((input, "")) {
            (".quit", _) | (".exit", _) => break,
            (".tables", _) => print_tables(bench),
            (".schema", table) => print_schema(bench, table.trim()),
            (".reload", _) => bench.reload().map(|_| ()).map_err(Into::into),
            (".publish", _) => publish(bench).map(|_| ()),
            (".history", _) => {
                for entry in history.entries() {
                    println!("{}", entry);
                }
                Ok(())
            }
            (cmd, _) if cmd.starts_with('.') => Err(eyre!(
                "unknown command {} (try .tables, .schema TABLE, .reload, .publish, .history, .quit)",
                cmd
            )),
            _ => run_query(bench, history, input).map(|_| ()),
        };

        print_notices(bench);
        if let Err(e) = result {
            eprintln!("Error: {}", e);
        }
    }
    Ok(())
}

fn run(args: Args) -> Result<bool> {
    let config = AppConfig::load(&config_manager(&args)?)?;
    std::env::set_var(
        "POLARS_FMT_MAX_ROWS",
        config.query.max_display_rows.to_string(),
    );

    let catalog_path = args
        .catalog
        .clone()
        .unwrap_or_else(|| config.catalog.path.clone());
    let catalog = CatalogStore::open(catalog_path)?;
    let loader = TableLoader::new((&config.loading).into());
    let mut bench = Workbench::new(ConnectionManager::new(catalog, loader));
    let mut history = open_history(&config);

    let command = args
        .command
        .ok_or_else(|| eyre!("No command given. Run with --help for usage."))?;

    let success = match command {
        Command::Add { name, path } => {
            let added = bench.add_connection(&name, &path);
            print_notices(&mut bench);
            added?;
            true
        }
        Command::List => {
            for (name, path) in bench.manager().connections() {
                println!("{}\t{}", name, path.display());
            }
            true
        }
        Command::Tables { name } => {
            bench.select(&name)?;
            print_notices(&mut bench);
            print_tables(&bench)?;
            true
        }
        Command::Describe { name, table } => {
            bench.select(&name)?;
            print_notices(&mut bench);
            print_schema(&bench, &table)?;
            true
        }
        Command::Query { name, sql } => {
            bench.select(&name)?;
            print_notices(&mut bench);
            run_query(&mut bench, &mut history, &sql)?
        }
        Command::Reload { name } => {
            bench.select(&name)?;
            bench.take_notices();
            let report = bench.reload()?;
            print_notices(&mut bench);
            report.failures.is_empty()
        }
        Command::Publish { name } => {
            bench.select(&name)?;
            print_notices(&mut bench);
            publish(&mut bench)?
        }
        Command::Shell { name } => {
            bench.select(&name)?;
            print_notices(&mut bench);
            shell(&mut bench, &mut history)?;
            true
        }
    };

    Ok(success)
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.is_maintenance() {
        return run_maintenance(&args);
    }

    color_eyre::install()?;
    init_logging(args.verbose);

    match run(args) {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
