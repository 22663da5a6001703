use chrono::{Local, NaiveDate};
use clap::Parser;

use garmin_export::auth::{Authenticator, TerminalPrompt};
use garmin_export::config::{
    self, ActivityKind, ExportConfig, TokenStore, DEFAULT_CHUNK_DAYS, TOKEN_STORE_ENV,
};
use garmin_export::error::format_user_error;
use garmin_export::export::Exporter;

#[derive(Parser)]
#[command(name = "garmin-export")]
#[command(author, version, about = "Fetch data from Garmin Connect.", long_about = None)]
struct Cli {
    /// Start date in YYYY-MM-DD format
    #[arg(value_parser = parse_date_arg)]
    start_date: NaiveDate,

    /// End date in YYYY-MM-DD format (default: today)
    #[arg(long, alias = "end_date", value_parser = parse_date_arg)]
    end_date: Option<NaiveDate>,

    /// Number of days to load per request window
    #[arg(long, default_value_t = DEFAULT_CHUNK_DAYS, value_parser = clap::value_parser!(u32).range(1..))]
    days: u32,

    /// Logger level
    #[arg(long, alias = "log_level", value_enum, ignore_case = true, default_value = "INFO")]
    log_level: LogLevel,

    /// Garmin Connect username
    #[arg(long)]
    username: Option<String>,

    /// Garmin Connect password
    #[arg(long)]
    password: Option<String>,

    /// Only export activities of this type
    #[arg(long, value_enum)]
    activity_type: Option<ActivityKind>,

    /// Token store directory
    #[arg(long, env = TOKEN_STORE_ENV)]
    tokenstore: Option<String>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum LogLevel {
    #[value(name = "DEBUG")]
    Debug,
    #[value(name = "INFO")]
    Info,
    #[value(name = "WARNING")]
    Warning,
    #[value(name = "ERROR")]
    Error,
}

impl LogLevel {
    fn filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

fn parse_date_arg(value: &str) -> Result<NaiveDate, String> {
    config::parse_date(value).map_err(|e| e.to_string())
}

fn init_logging(level: LogLevel) {
    // Keep HTTP internals quiet unless explicitly asked for
    let directives = format!("{},hyper=warn,reqwest=warn", level.filter());
    let env_filter = tracing_subscriber::EnvFilter::try_new(directives)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
}

#[tokio::main]
async fn main() -> garmin_export::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    let end = cli.end_date.unwrap_or_else(|| Local::now().date_naive());
    let export_config = ExportConfig::new(cli.start_date, end)
        .with_chunk_days(cli.days)?
        .with_activity_type(cli.activity_type);

    let store = TokenStore::new(config::token_store_dir(cli.tokenstore.as_deref())?);
    let authenticator = Authenticator::new(store);

    let session = match authenticator
        .authenticate(cli.username, cli.password, &mut TerminalPrompt)
        .await
    {
        Ok(session) => session,
        Err(e) => {
            tracing::error!("{}", format_user_error(&e));
            std::process::exit(1);
        }
    };
    tracing::debug!(user = session.display_name(), "logged in");

    match Exporter::new(&session, &export_config).run().await {
        Ok(summary) => {
            tracing::info!("Export finished. {}", summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("{}", format_user_error(&e));
            std::process::exit(1);
        }
    }
}
