//! wgx: WireGuard config toolkit
//!
//! Command-line entry point. Reads canonical configs from a file or stdin,
//! writes results to stdout and logs to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{Level, debug, info};
use tracing_subscriber::FmtSubscriber;
use wgx_conf::{BatchTemplate, Format, KeyPair, KeyProvider, X25519KeyProvider};

/// Generate, normalize and convert WireGuard configurations
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// More logging (debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Less logging (warnings only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a canonical config and print it as JSON
    Parse {
        /// Config file (stdin when omitted)
        file: Option<PathBuf>,
    },

    /// Parse and re-emit a canonical config
    Generate {
        /// Config file (stdin when omitted)
        file: Option<PathBuf>,
    },

    /// Convert a canonical config to a client format
    Transform {
        /// surge, mihomo or sing-box
        #[arg(short, long)]
        format: Format,

        /// Config file (stdin when omitted)
        file: Option<PathBuf>,
    },

    /// Offset a comma-separated address list
    Increment {
        /// e.g. "10.0.0.1/24, fd00::1/64"
        list: String,

        #[arg(allow_negative_numbers = true)]
        delta: i64,
    },

    /// Derive configs for a batch of peers
    Derive {
        /// TOML template; flags below override it
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// Address list of the first peer
        #[arg(short, long)]
        address: Option<String>,

        /// Number of peers
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Endpoint of peer N for the Nth occurrence ("" for none)
        #[arg(short, long = "endpoint")]
        endpoints: Vec<String>,
    },

    /// Generate a key pair, or derive the public key of an existing one
    Keygen {
        /// Base64 private key to reuse
        #[arg(long)]
        from_private: Option<String>,

        /// Also print a fresh pre-shared key
        #[arg(long)]
        preshared: bool,
    },
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            Ok(text)
        }
    }
}

fn derive(
    template: Option<&Path>,
    address: Option<String>,
    count: Option<usize>,
    endpoints: Vec<String>,
) -> Result<String> {
    let mut batch = match template {
        Some(path) => BatchTemplate::from_toml_file(path)?,
        None => BatchTemplate::default(),
    };
    if let Some(address) = address {
        batch.address = address;
    }
    if let Some(count) = count {
        batch.quantity = count;
    }
    if !endpoints.is_empty() {
        batch.endpoints = endpoints;
    }
    debug!("Batch template: {:?}", batch);

    let configs = wgx_conf::derive_configs(&batch, &mut X25519KeyProvider)?;

    let blocks: Vec<String> = configs
        .iter()
        .enumerate()
        .map(|(index, config)| format!("# peer-{}\n{}", index, config))
        .collect();
    Ok(blocks.join("\n"))
}

fn keygen(from_private: Option<&str>, preshared: bool) -> Result<String> {
    let mut provider = X25519KeyProvider;
    let pair = match from_private {
        Some(private) => KeyPair::from_private_base64(private).context("Invalid private key")?,
        None => provider.generate_key_pair(),
    };

    let mut out = format!("PrivateKey = {}\nPublicKey = {}\n", pair.private, pair.public);
    if preshared {
        out.push_str(&format!("PresharedKey = {}\n", provider.generate_preshared_key()));
    }
    Ok(out)
}

fn run(command: Command) -> Result<String> {
    match command {
        Command::Parse { file } => {
            let config = wgx_conf::parse(&read_input(file.as_deref())?);
            let mut json = serde_json::to_string_pretty(&config)?;
            json.push('\n');
            Ok(json)
        }
        Command::Generate { file } => Ok(wgx_conf::generate(&wgx_conf::parse(&read_input(
            file.as_deref(),
        )?))),
        Command::Transform { format, file } => {
            let text = read_input(file.as_deref())?;
            info!("Converting to {}", format);
            let mut out = wgx_conf::transform(format, &text)?;
            if !out.ends_with('\n') {
                out.push('\n');
            }
            Ok(out)
        }
        Command::Increment { list, delta } => {
            Ok(format!("{}\n", wgx_conf::increment_batch(&list, delta)?))
        }
        Command::Derive {
            template,
            address,
            count,
            endpoints,
        } => derive(template.as_deref(), address, count, endpoints),
        Command::Keygen {
            from_private,
            preshared,
        } => keygen(from_private.as_deref(), preshared),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::WARN
    } else {
        Level::INFO
    };

    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let output = run(args.command)?;
    print!("{}", output);
    Ok(())
}
