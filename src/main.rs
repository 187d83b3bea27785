mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use config::Config;
use fedi_rest::api::auth::REDIRECT_NONE;
use fedi_rest::{
    describe_error, AppRegistrar, AuthClient, Client, ClientConfig, Collection, Entity, Scope,
    TimelineKind,
};
use serde_json::Value;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Command-line client for Mastodon-compatible instances
#[derive(Parser, Debug)]
#[command(name = "fedi", version, about, long_about = None)]
struct Args {
    /// Instance host, e.g. mastodon.social
    #[arg(long, global = true)]
    host: Option<String>,

    /// Bearer token for the instance
    #[arg(long, global = true)]
    token: Option<String>,

    /// Send every lookup to the server
    #[arg(long, global = true)]
    no_cache: bool,

    /// Print the cache contents after the command
    #[arg(long, global = true)]
    dump_cache: bool,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show this instance, or another one by hostname
    Instance { server: Option<String> },
    /// Check whether a server speaks the Mastodon API
    Probe { server: String },
    /// Show an account (the authenticated one by default)
    Account { id: Option<String> },
    /// List every follower of an account
    Followers { id: Option<String> },
    /// List every account an account follows
    Following { id: Option<String> },
    /// Show a status
    Status { id: String },
    /// Show a timeline page: home, public, local, tag:NAME or list:ID
    Timeline { kind: String },
    /// Search accounts
    Search {
        query: String,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Register this application on the instance
    Register {
        #[arg(long, default_value = "fedi")]
        name: String,
        #[arg(long, default_value = REDIRECT_NONE)]
        redirect_uri: String,
        /// Space-separated scopes
        #[arg(long, default_value = "read write follow")]
        scopes: String,
    },
    /// Obtain and save an access token
    Login {
        /// Authorization code shown after visiting the authorize URL
        code: Option<String>,
        #[arg(long, requires = "password")]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(err) => {
            eprintln!("Cannot open log file {:?}: {}", log_path, err);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("fedi started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("fedi").join("fedi.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".fedi").join("fedi.log");
    }
    PathBuf::from("fedi.log")
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    if let Err(err) = run(args).await {
        match err.downcast_ref::<fedi_rest::Error>() {
            Some(api_error) => eprintln!("Error: {}", describe_error(api_error)),
            None => eprintln!("Error: {err:#}"),
        }
        tracing::error!("{err:?}");
        std::process::exit(1);
    }
}

fn print(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_collection<T: Entity>(collection: &Collection<T>) -> Result<()> {
    print(&collection.export()?)
}

fn connect(args: &Args, config: &Config) -> Result<Client> {
    let host = config
        .effective_host(args.host.as_deref())
        .context("No instance configured; pass --host or set FEDI_HOST")?;

    let mut client_config =
        ClientConfig::for_instance(&host)?.with_cache(config.use_cache && !args.no_cache);
    if let Some(token) = config.effective_token(args.token.as_deref()) {
        client_config = client_config.with_access_token(token);
    }
    Ok(Client::new(client_config)?)
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::load();

    match &args.command {
        Command::Register {
            name,
            redirect_uri,
            scopes,
        } => return register(&args, &mut config, name, redirect_uri, scopes).await,
        Command::Login {
            code,
            username,
            password,
        } => {
            return login(
                &mut config,
                code.as_deref(),
                username.as_deref(),
                password.as_deref(),
            )
            .await
        }
        _ => {}
    }

    let client = connect(&args, &config)?;

    match &args.command {
        Command::Instance { server } => {
            print(&client.instance(server.as_deref()).export().await?)?;
        }
        Command::Probe { server } => {
            let instance = client.instance(Some(server));
            let mastodon = instance.is_mastodon().await?;
            print(&serde_json::json!({ "host": server, "mastodon": mastodon }))?;
        }
        Command::Account { id } => {
            let account = client.account(id.as_deref());
            let mut record = account.export().await?;
            record["qualified_name"] = Value::from(account.qualified_name().await?);
            print(&record)?;
        }
        Command::Followers { id } => {
            print_collection(&*client.followers(id.as_deref()).await?)?;
        }
        Command::Following { id } => {
            print_collection(&*client.following(id.as_deref()).await?)?;
        }
        Command::Status { id } => {
            print(&client.status(id).export().await?)?;
        }
        Command::Timeline { kind } => {
            let kind: TimelineKind = kind.parse()?;
            print(&client.timeline(&kind).export().await?)?;
        }
        Command::Search { query, limit } => {
            print_collection(&*client.search_accounts(query, *limit).await?)?;
        }
        Command::Register { .. } | Command::Login { .. } => {}
    }

    if args.dump_cache {
        let snapshot = client.cache_snapshot(false).await?;
        eprintln!("{}", serde_json::to_string_pretty(&snapshot.export()?)?);
    }

    Ok(())
}

async fn register(
    args: &Args,
    config: &mut Config,
    name: &str,
    redirect_uri: &str,
    scopes: &str,
) -> Result<()> {
    let host = config
        .effective_host(args.host.as_deref())
        .context("No instance given; pass --host")?;
    let scopes = scopes
        .split_whitespace()
        .map(str::parse)
        .collect::<fedi_rest::Result<Vec<Scope>>>()?;

    let registration = AppRegistrar::for_instance(&host)?.register(name, redirect_uri, &scopes);
    let app = registration.resolve().await?.clone();
    config.set_application(&app)?;

    let auth = AuthClient::for_application(app)?;
    println!("Registered {} on {}", name, auth.application().host);
    println!("Authorize at: {}", auth.authorize_url(None, None)?);
    println!("Then run: fedi login <code>");
    Ok(())
}

async fn login(
    config: &mut Config,
    code: Option<&str>,
    username: Option<&str>,
    password: Option<&str>,
) -> Result<()> {
    let Some(app) = config.application()? else {
        bail!("No application registered; run `fedi register --host <instance>` first");
    };
    let auth = AuthClient::for_application(app)?;

    let token = match (code, username, password) {
        (Some(code), _, _) => auth.exchange_code(code).await?,
        (None, Some(username), Some(password)) => auth.login(username, password, None).await?,
        _ => bail!("Pass an authorization code, or --username and --password"),
    };

    config.set_token(&token)?;
    println!("Logged in to {}", auth.application().host);
    Ok(())
}
