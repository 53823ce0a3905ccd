//! Binary entrypoint for the meshchat CLI.
//!
//! Commands:
//! - `start` - run the interactive chat node
//! - `init` - create a starter `config.toml`
//! - `status` - print a summary of the persisted node state
//!
//! See the library crate docs for module-level details: `meshchat::`.
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{info, warn};

use meshchat::channels::ChannelRegistry;
use meshchat::config::Config;
use meshchat::console::{ConsoleMux, FileEndpoint, StdioEndpoint};
use meshchat::contacts::ContactStore;
use meshchat::mesh::DisconnectedTransport;
use meshchat::node::ChatNode;
use meshchat::prefs::NodePrefs;

#[derive(Parser)]
#[command(name = "meshchat")]
#[command(about = "A secure chat terminal for mesh radio networks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive chat node
    Start {
        /// Data directory override (defaults to the configured one)
        #[arg(short, long)]
        data_dir: Option<String>,
    },
    /// Initialize a new configuration file
    Init,
    /// Show a summary of the persisted node state
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config early to configure logging (except for Init, which writes
    // the default config later).
    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Start { data_dir } => {
            let config = match pre_config {
                Some(c) => c,
                None => Config::load(&cli.config).await?,
            };
            info!("Starting meshchat v{}", env!("CARGO_PKG_VERSION"));
            let data_dir = data_dir.unwrap_or_else(|| config.node.data_dir.clone());
            run_node(&config, Path::new(&data_dir)).await?;
        }
        Commands::Init => {
            info!("Initializing new meshchat configuration");
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::Status => {
            let config = match pre_config {
                Some(c) => c,
                None => Config::load(&cli.config).await?,
            };
            show_status(&config);
        }
    }

    Ok(())
}

/// Boot the node and drive the cooperative loop until Ctrl-C.
async fn run_node(config: &Config, data_dir: &Path) -> Result<()> {
    let mut mux = ConsoleMux::new(Box::new(StdioEndpoint::new()));
    for (i, path) in config.console.aux_ports.iter().enumerate() {
        let label = format!("aux{}", i);
        mux.push(Box::new(FileEndpoint::new(&label, path.into())));
    }

    // No radio driver is linked into this build; the node still runs as a
    // console (prefs, channels, contacts all work) with sends failing.
    warn!("no radio driver attached; continuing without device");
    let mut node = ChatNode::boot(data_dir, DisconnectedTransport, mux)?;
    node.show_welcome();
    node.check_public_channel();

    let advert_delay = Duration::from_millis(config.node.advert_delay_ms);
    let started = tokio::time::Instant::now();
    let mut advert_sent = !config.node.advert_on_start;

    let mut ticker = tokio::time::interval(Duration::from_millis(config.console.poll_interval_ms));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                node.tick();
                if node.reboot_requested() {
                    node.reboot();
                }
                if !advert_sent && started.elapsed() >= advert_delay {
                    node.send_boot_advert();
                    advert_sent = true;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }
    Ok(())
}

fn show_status(config: &Config) {
    let data_dir = Path::new(&config.node.data_dir);
    let prefs = NodePrefs::load(&data_dir.join("node_prefs"));
    let contacts = ContactStore::load(&data_dir.join("contacts"));
    let registry = ChannelRegistry::initialize(&prefs);

    println!("meshchat v{}", env!("CARGO_PKG_VERSION"));
    println!("data dir:  {}", data_dir.display());
    println!("node name: {}", prefs.node_name);
    println!(
        "radio:     {:.3} MHz, bw {:.1} kHz, sf {}, cr {}, tx {} dBm",
        prefs.freq_mhz, prefs.bandwidth_khz, prefs.spreading_factor, prefs.coding_rate, prefs.tx_power_dbm
    );
    println!("contacts:  {}", contacts.len());
    println!("channels:");
    for (idx, ch) in registry.iter() {
        println!(
            "  [{}] {}{}",
            idx,
            ch.name,
            if ch.muted { " (muted)" } else { "" }
        );
    }
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // Base level from CLI verbosity overrides config
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    if let Some(file) = config.as_ref().and_then(|c| c.logging.file.clone()) {
        if let Ok(f) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file)
        {
            let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));

            // Log lines go to the file; they only also reach the console
            // when stderr is not a terminal (they would garble the prompt).
            let is_tty = atty::is(atty::Stream::Stderr);

            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if let Ok(mut guard) = write_mutex.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if is_tty {
                    Ok(())
                } else {
                    writeln!(fmt, "{}", line)
                }
            });
        } else {
            builder.format(|fmt, record| {
                writeln!(
                    fmt,
                    "{} [{}] {}",
                    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                    record.level(),
                    record.args()
                )
            });
        }
    } else {
        builder.format(|fmt, record| {
            writeln!(
                fmt,
                "{} [{}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                record.level(),
                record.args()
            )
        });
    }
    let _ = builder.try_init();
}
