/// Version injected at compile time via MESHCONF_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("MESHCONF_VERSION") {
    Some(v) => v,
    None => "dev",
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use meshconf::config::Config;
use meshconf::kube::http::format_api_error;
use meshconf::resource::{get_istio_api, parse_json_for_create, ResourceKind};
use meshconf::{ConfigError, IstioConfigCriteria, IstioConfigService};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Inspect and edit Istio configuration
#[derive(Parser, Debug)]
#[command(name = "meshconf", version = VERSION, about, long_about = None)]
struct Args {
    /// Kubernetes API server URL
    #[arg(long, global = true)]
    api_server: Option<String>,

    /// Bearer token for the API server
    #[arg(long, global = true)]
    token: Option<String>,

    /// Namespace to operate on
    #[arg(short, long, global = true)]
    namespace: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    /// Run in read-only mode (block all write operations)
    #[arg(long, global = true)]
    readonly: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List Istio configuration in a namespace
    List {
        /// Comma-separated kinds to include (all when omitted)
        #[arg(long, default_value = "")]
        objects: String,

        /// Print a name/age table instead of the full bundle
        #[arg(long)]
        summary: bool,
    },
    /// Show one object and your permissions on it
    Get {
        object_type: String,
        name: String,
        /// Adapter or template subtype (e.g. stdios, metrics)
        #[arg(long, default_value = "")]
        subtype: String,
    },
    /// Create an object from a JSON or YAML file
    Create {
        object_type: String,
        #[arg(short, long)]
        file: PathBuf,
        #[arg(long, default_value = "")]
        subtype: String,
    },
    /// Merge-patch an object with a JSON or YAML file
    Update {
        object_type: String,
        name: String,
        #[arg(short, long)]
        file: PathBuf,
        #[arg(long, default_value = "")]
        subtype: String,
    },
    /// Delete an object
    Delete {
        object_type: String,
        name: String,
        #[arg(long, default_value = "")]
        subtype: String,
    },
    /// Print the API group that manages a kind
    Api { object_type: String },
    /// Save the default namespace
    UseNamespace { namespace: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
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

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

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

    tracing::info!("meshconf {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("meshconf").join("meshconf.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".meshconf").join("meshconf.log");
    }
    PathBuf::from("meshconf.log")
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let _log_guard = match setup_logging(args.log_level) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Warning: logging disabled: {err:#}");
            None
        },
    };

    if let Err(err) = run(args).await {
        eprintln!("Error: {}", describe_error(&err));
        std::process::exit(1);
    }
}

fn describe_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ConfigError>() {
        Some(ConfigError::Upstream(inner)) => format_api_error(inner),
        Some(ConfigError::ObjectFetch { source, .. }) => format_api_error(source),
        Some(config_err) => config_err.to_string(),
        None => format_api_error(err),
    }
}

async fn run(args: Args) -> Result<()> {
    if let Command::UseNamespace { namespace } = &args.command {
        Config::save_namespace(namespace)?;
        println!("Default namespace set to {}", namespace);
        return Ok(());
    }

    let config = Config::load().with_overrides(args.api_server.as_deref(), args.token.as_deref());
    let namespace = args
        .namespace
        .clone()
        .unwrap_or_else(|| config.effective_namespace());

    if args.readonly && is_write(&args.command) {
        anyhow::bail!("Write operations are disabled in read-only mode");
    }

    if let Command::Api { object_type } = &args.command {
        match get_istio_api(object_type) {
            Some(api) => println!("{}", api),
            None => anyhow::bail!("{} is not managed by Istio", object_type),
        }
        return Ok(());
    }

    let client = config.build_client()?;
    tracing::info!("Using API server: {}, namespace: {}", client.api_server(), namespace);
    let service = IstioConfigService::new(Arc::new(client));

    match args.command {
        Command::List { objects, summary } => {
            let criteria = IstioConfigCriteria::from_object_types(&namespace, &objects)?;
            let list = service.get_istio_config_list(&criteria).await?;
            if summary {
                print_summary(&list);
            } else {
                emit(&list, args.output)?;
            }
        },
        Command::Get {
            object_type,
            name,
            subtype,
        } => {
            let details = service
                .get_istio_config_details(&namespace, &object_type, &subtype, &name)
                .await?;
            emit(&details, args.output)?;
        },
        Command::Create {
            object_type,
            file,
            subtype,
        } => {
            let api = managing_api(&object_type)?;
            let body = read_json_file(&file)?;
            let json = parse_json_for_create(&object_type, &subtype, body.as_bytes())?;
            let details = service
                .create_istio_config_detail(api, &namespace, &object_type, &subtype, &json)
                .await?;
            emit(&details, args.output)?;
        },
        Command::Update {
            object_type,
            name,
            file,
            subtype,
        } => {
            let api = managing_api(&object_type)?;
            let patch = read_json_file(&file)?;
            let details = service
                .update_istio_config_detail(api, &namespace, &object_type, &subtype, &name, &patch)
                .await?;
            emit(&details, args.output)?;
        },
        Command::Delete {
            object_type,
            name,
            subtype,
        } => {
            let api = managing_api(&object_type)?;
            service
                .delete_istio_config_detail(api, &namespace, &object_type, &subtype, &name)
                .await?;
            println!("Deleted {} {}", object_type, name);
        },
        Command::Api { .. } | Command::UseNamespace { .. } => {},
    }

    Ok(())
}

fn is_write(command: &Command) -> bool {
    matches!(
        command,
        Command::Create { .. } | Command::Update { .. } | Command::Delete { .. }
    )
}

fn managing_api(object_type: &str) -> Result<&'static str> {
    get_istio_api(object_type)
        .ok_or_else(|| ConfigError::UnsupportedKind(object_type.to_string()).into())
}

/// Read a JSON or YAML document and return it as JSON text
fn read_json_file(path: &Path) -> Result<String> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;

    if serde_json::from_str::<serde_json::Value>(&content).is_ok() {
        return Ok(content);
    }

    let value: serde_json::Value = serde_yaml::from_str(&content)
        .with_context(|| format!("{:?} is neither JSON nor YAML", path))?;
    Ok(serde_json::to_string(&value)?)
}

fn emit<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    };
    println!("{}", rendered);
    Ok(())
}

fn print_summary(list: &meshconf::models::IstioConfigList) {
    let now = chrono::Utc::now();
    println!("{:<20} {:<40} {:>6}", "KIND", "NAME", "AGE");
    for kind in ResourceKind::ALL {
        let Some(items) = list.metadata_of(kind) else {
            continue;
        };
        for meta in items {
            println!("{:<20} {:<40} {:>6}", kind.as_str(), meta.name, meta.age(now));
        }
    }
}
