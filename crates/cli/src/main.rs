use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "askbot")]
#[command(about = "Question-answering Telegram bot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Write a default config file if none exists.
    Init {
        /// Config file path (default: ASKBOT_CONFIG_PATH or ~/.askbot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the bot: polling mode, or webhook mode when WEBHOOK_URL is set. Requires API_URL and the BOT_TOKEN secret.
    Serve {
        /// Config file path (default: ASKBOT_CONFIG_PATH or ~/.askbot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from PORT, config, or 8080)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Send one 'Context | Question' message to the inference service and print the reply. No Telegram needed.
    Ask {
        /// Config file path (default: ASKBOT_CONFIG_PATH or ~/.askbot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Message text, e.g. "The sky is blue. | What color is the sky?"
        text: String,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("askbot {}", env!("CARGO_PKG_VERSION"));
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
        Some(Commands::Ask { config, text }) => {
            if let Err(e) = run_ask(config, &text).await {
                log::error!("ask failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(askbot::config::default_config_path);
    if askbot::config::init_config(&path)? {
        println!("wrote default config to {}", path.display());
    } else {
        println!("config already exists at {}", path.display());
    }
    Ok(())
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (config, path) = askbot::config::load_config(config_path)?;
    let mut settings = askbot::config::Settings::resolve(&config)?;
    if let Some(p) = port {
        settings.port = p;
    }
    log::info!("starting askbot with config {}", path.display());
    askbot::gateway::run_gateway(settings).await
}

async fn run_ask(config_path: Option<std::path::PathBuf>, text: &str) -> anyhow::Result<()> {
    let (config, _) = askbot::config::load_config(config_path)?;
    let settings = askbot::config::Settings::resolve(&config)?;
    let relay = askbot::gateway::build_relay(&settings)?;
    println!("{}", relay.handle_text(text).await);
    Ok(())
}
