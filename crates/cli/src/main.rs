use anyhow::Context;
use base64::Engine;
use clap::{Parser, Subcommand};
use pushlite::gateway::{ApiError, SendAccepted, SendParams};

#[derive(Parser)]
#[command(name = "pushlite")]
#[command(about = "pushlite CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config with a generated API token.
    Init {
        /// Config file path (default: PUSHLITE_CONFIG_PATH or ~/.pushlite/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the push API and relay until Ctrl+C. Pushes are delivered to notificationUmoList.
    Serve {
        /// Config file path (default: PUSHLITE_CONFIG_PATH or ~/.pushlite/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// API port (default from config or 9966)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Print the API token, generating and saving one if none is configured.
    Token {
        /// Config file path (default: PUSHLITE_CONFIG_PATH or ~/.pushlite/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Submit a push to a running service (uses the configured port and token).
    Push {
        /// Config file path (default: PUSHLITE_CONFIG_PATH or ~/.pushlite/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Message text
        #[arg(long)]
        content: Option<String>,

        /// Image URL, or a local file to send inline
        #[arg(long, value_name = "URL|PATH")]
        image: Option<String>,

        /// URL that receives the delivery outcome
        #[arg(long, value_name = "URL")]
        callback_url: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("pushlite {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("serve failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Token { config }) => {
            if let Err(e) = run_token(config) {
                log::error!("token failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Push {
            config,
            content,
            image,
            callback_url,
        }) => {
            if let Err(e) = run_push(config, content, image, callback_url).await {
                log::error!("push failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(pushlite::config::default_config_path);
    let dir = pushlite::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, path) = pushlite::config::load_config(config_path)?;
    if let Some(p) = port {
        config.api.port = p;
    }
    log::info!("starting push relay on {}", config.api.bind_addr());
    pushlite::service::run_service(config, path).await
}

fn run_token(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let (mut config, path) = pushlite::config::load_config(config_path)?;
    if pushlite::config::ensure_api_token(&mut config, &path)? {
        eprintln!("generated new token in {}", path.display());
    }
    let token = pushlite::config::resolve_api_token(&config)
        .ok_or_else(|| anyhow::anyhow!("no api token configured"))?;
    println!("{}", token);
    Ok(())
}

/// URLs pass through; anything else is read from disk and base64-encoded.
fn image_field(image: &str) -> anyhow::Result<String> {
    if pushlite::relay::image::is_remote_reference(image) {
        return Ok(image.to_string());
    }
    let bytes = std::fs::read(image).with_context(|| format!("reading image {}", image))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

async fn run_push(
    config_path: Option<std::path::PathBuf>,
    content: Option<String>,
    image: Option<String>,
    callback_url: Option<String>,
) -> anyhow::Result<()> {
    let (config, _) = pushlite::config::load_config(config_path)?;
    let token = pushlite::config::resolve_api_token(&config)
        .ok_or_else(|| anyhow::anyhow!("no api token configured; run `pushlite token` first"))?;
    let host = match config.api.host.trim() {
        "0.0.0.0" | "" => "127.0.0.1",
        "::" => "[::1]",
        h => h,
    };
    let url = format!("http://{}:{}/send", host, config.api.port);

    let params = SendParams {
        message_id: None,
        content,
        image: image.as_deref().map(image_field).transpose()?,
        callback_url,
    };
    let res = reqwest::Client::new()
        .post(&url)
        .bearer_auth(token)
        .json(&params)
        .send()
        .await?;
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    if !status.is_success() {
        let reason = serde_json::from_str::<ApiError>(&body)
            .map(|e| e.error)
            .unwrap_or(body);
        anyhow::bail!("{} {}", status, reason);
    }
    let accepted: SendAccepted = serde_json::from_str(&body)?;
    println!("{} {}", accepted.status, accepted.message_id);
    Ok(())
}
