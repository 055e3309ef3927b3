use std::path::PathBuf;

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    pulse_config::{PulseConfig, template},
    pulse_metrics::{MetricsRecorderConfig, StoreOptions, init_metrics},
    tracing::{debug, info},
    tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "pulse", about = "Metrics registry and query gateway", version)]
struct Cli {
    /// Config file (default: $PULSE_CONFIG, ./pulse.toml, then the user config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override `server.bind`.
    #[arg(long, global = true)]
    bind: Option<String>,

    /// Override `server.port`.
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Log filter, e.g. `debug` or `info,pulse_query=trace`. Takes precedence over RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, env = "PULSE_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway (default).
    Serve,
    /// Send a command line, e.g. `matchers`, to a running gateway.
    Query {
        #[arg(trailing_var_arg = true)]
        line: Vec<String>,
    },
    /// Configuration helpers.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print a documented config file with default values.
    Template,
    /// Load and validate the config, then print where it came from.
    Check,
}

fn init_logging(cli: &Cli) {
    let filter = match &cli.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let registry = tracing_subscriber::registry().with(filter);
    if cli.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<PulseConfig> {
    let mut config = pulse_config::discover_and_load(cli.config.as_deref())?;
    if let Some(bind) = &cli.bind {
        config.server.bind = bind.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.validate()?;
    Ok(config)
}

async fn serve(config: PulseConfig) -> anyhow::Result<()> {
    let metrics = init_metrics(MetricsRecorderConfig {
        install_global: true,
        options: StoreOptions {
            emit_created: config.metrics.emit_created,
        },
    })?;
    pulse_gateway::server::start_gateway(config, metrics).await
}

async fn query(config: &PulseConfig, line: &[String]) -> anyhow::Result<()> {
    let url = format!("http://{}/api/metrics/query", config.listen_addr());
    let q = line.join(" ");
    debug!(url = %url, q = %q, "sending metrics query");
    let body = reqwest::Client::new()
        .get(&url)
        .query(&[("q", q.as_str())])
        .send()
        .await
        .with_context(|| format!("failed to reach gateway at {url}"))?
        .error_for_status()?
        .text()
        .await?;
    println!("{body}");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before clap reads env-backed flags.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(&cli);

    match &cli.command {
        None | Some(Commands::Serve) => {
            let config = load_config(&cli)?;
            info!(addr = %config.listen_addr(), "starting pulse");
            serve(config).await
        },
        Some(Commands::Query { line }) => query(&load_config(&cli)?, line).await,
        Some(Commands::Config { action }) => match action {
            ConfigAction::Template => {
                let port = cli.port.unwrap_or(PulseConfig::default().server.port);
                print!("{}", template::default_config_template(port));
                Ok(())
            },
            ConfigAction::Check => {
                let source = pulse_config::find_config(cli.config.as_deref());
                load_config(&cli)?;
                match source {
                    Some(path) => println!("{}: ok", path.display()),
                    None => println!("no config file found, defaults are valid"),
                }
                Ok(())
            },
        },
    }
}
