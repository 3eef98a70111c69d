use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use dcp_import::config::ImportConfig;
use dcp_import::connection::ConnectionSettings;
use dcp_import::db;
use dcp_import::error::ImportError;
use dcp_import::import::{Journal, run_import};

#[derive(Parser, Debug)]
#[command(
    name = "dcp-import",
    about = "Import externalized dynamic component presentations into the broker database"
)]
struct Args {
    /// Database server, as `host` or `host:port`.
    server: Option<String>,

    /// Database user name.
    username: Option<String>,

    /// Database password.
    password: Option<String>,

    /// Database name.
    database: Option<String>,

    /// Root directory holding the `pub<id>/dcp/...` tree.
    path: Option<PathBuf>,

    /// Full `postgres://` URL; replaces server, username, password and database.
    #[arg(long)]
    database_url: Option<String>,

    /// Number of candidates imported concurrently.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Journal file (defaults to `dcp-import.log` next to the executable).
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Skip the confirmation prompt.
    #[arg(long, short = 'y')]
    yes: bool,
}

fn prompt(label: &str) -> io::Result<String> {
    print!("[.] {}: ", label);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn value_or_prompt(value: Option<String>, label: &str) -> io::Result<String> {
    match value {
        Some(value) => Ok(value),
        None => prompt(label),
    }
}

fn collect_settings(args: &mut Args) -> io::Result<(ConnectionSettings, PathBuf)> {
    let settings = match args.database_url.take() {
        Some(url) => ConnectionSettings::Url(url),
        None => ConnectionSettings::Fields {
            server: value_or_prompt(args.server.take(), "Server")?,
            username: value_or_prompt(args.username.take(), "Username")?,
            password: value_or_prompt(args.password.take(), "Password")?,
            database: value_or_prompt(args.database.take(), "Database")?,
        },
    };

    let path = match args.path.take() {
        Some(path) => path,
        None => PathBuf::from(prompt("DCP Path")?),
    };

    Ok((settings, path))
}

#[tokio::main]
async fn main() -> Result<(), ImportError> {
    dcp_import::init_logger();

    println!("[i] Dynamic Component Presentation Importer");

    let mut args = Args::parse();
    let (settings, path) = collect_settings(&mut args)?;

    let mut config = ImportConfig::from_env(path)?;
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(log_file) = args.log_file.take() {
        config.log_path = log_file;
    }
    let config = config.validated()?;

    println!();
    println!("[i] Connecting to:");
    println!("{}", settings);
    println!("    DCP Path:\t{}", config.root_path.display());
    println!();

    if !args.yes {
        println!("Press enter to confirm, CTRL+C to cancel");
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
    }

    if !config.root_exists() {
        println!("[!] {}", ImportError::MissingRootPath(config.root_path.clone()));
        return Ok(());
    }

    let journal = Arc::new(Journal::open(&config.log_path).await?);
    log::info!("journaling outcomes to {}", journal.path().display());

    let options = settings.connect_options()?;
    println!(
        "[i] Connecting to \"{}\", Database \"{}\".",
        options.get_host(),
        options.get_database().unwrap_or_default()
    );

    let pool = match db::connect(options, config.concurrency).await {
        Ok(pool) => pool,
        Err(e) => {
            println!("[!] {}", e);
            println!("[!] Unable to connect to database");
            return Ok(());
        }
    };

    match db::check_server(&pool, config.tables.db_info.as_deref()).await {
        Ok(Some(info)) => println!(
            "[i] Connected to \"{}\", Version \"{}\".",
            info.description, info.version
        ),
        Ok(None) => {}
        Err(e) => {
            println!("[!] {}", e);
            println!("[!] Unable to connect to database");
            pool.close().await;
            return Ok(());
        }
    }

    let result = run_import(&pool, &config, journal).await;
    pool.close().await;

    let stats = result?;
    println!("[i] Import finished: {}", stats);
    if stats.failed() > 0 {
        println!(
            "[!] {} candidates failed, see {}",
            stats.failed(),
            config.log_path.display()
        );
    }

    Ok(())
}
