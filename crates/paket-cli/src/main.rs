//! paket: inspect and unpack encrypted paket containers
//!
//! Commands:
//!   list                     - names in the index with their sizes
//!   len                      - total original / encrypted bytes
//!   verify [NAME...]         - decrypt and check SHA-256 digests
//!   extract NAME [--out P]   - write one entry to a file or stdout
//!   extract-all DIR          - unpack every entry in parallel
//!
//! The container key is read from PAKET_KEY or prompted for; it is never
//! taken from the config file.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rayon::prelude::*;
use secrecy::SecretSlice;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tracing::info;

use paket::{ContainerReader, Index, Mode, ReaderOptions};
use paket_core::config::PaketConfig;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "paket",
    version,
    about = "Read encrypted paket containers",
    long_about = "paket: list, verify and extract entries of a single-file encrypted container"
)]
struct Cli {
    /// Path to paket.toml configuration file
    #[arg(long, short = 'c', env = "PAKET_CONFIG", default_value = "paket.toml")]
    config: PathBuf,

    /// Container file (overrides config)
    #[arg(long, env = "PAKET_CONTAINER")]
    container: Option<PathBuf>,

    /// JSON index file (overrides config)
    #[arg(long, env = "PAKET_INDEX")]
    index: Option<PathBuf>,

    /// Cipher mode (overrides config)
    #[arg(long)]
    mode: Option<Mode>,

    /// Container key; prompted for when unset
    #[arg(long, env = "PAKET_KEY", hide_env_values = true)]
    key: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "PAKET_LOG")]
    log: Option<String>,

    /// Log format (json, text)
    #[arg(long, env = "PAKET_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List every entry with original and encrypted sizes
    List,

    /// Show total original and encrypted bytes
    Len,

    /// Decrypt entries and compare against their stored digests
    Verify {
        /// Entries to check (default: all)
        names: Vec<String>,
    },

    /// Write one entry to a file, or to stdout
    Extract {
        name: String,
        /// Output file (default: stdout)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
        /// Write the stored ciphertext instead of decrypting
        #[arg(long)]
        raw: bool,
    },

    /// Unpack every entry into a directory
    #[command(name = "extract-all")]
    ExtractAll {
        /// Destination directory (created if missing)
        dir: PathBuf,
    },
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = PaketConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading config: {}", cli.config.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.logging.level.clone());
    let format = cli.log_format.clone().unwrap_or(match config.logging.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, &format);

    let reader = open_reader(&cli, &config)?;
    let result = match &cli.command {
        Commands::List => cmd_list(&reader),
        Commands::Len => cmd_len(&reader),
        Commands::Verify { names } => cmd_verify(&reader, names),
        Commands::Extract { name, out, raw } => cmd_extract(&reader, name, out.as_deref(), *raw),
        Commands::ExtractAll { dir } => cmd_extract_all(&reader, dir),
    };
    reader.close().context("closing container")?;
    result
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so `extract` can stream to stdout
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn open_reader(cli: &Cli, config: &PaketConfig) -> Result<ContainerReader> {
    let mut config = config.clone();
    if let Some(path) = &cli.container {
        config.container.path = path.clone();
    }
    if let Some(path) = &cli.index {
        config.container.index = path.clone();
    }
    if let Some(mode) = cli.mode {
        config.container.mode = mode;
    }

    let index = Index::load(&config.container.index)
        .with_context(|| format!("loading index: {}", config.container.index.display()))?;
    let key = resolve_key(cli.key.as_deref())?;

    let reader = ContainerReader::open(ReaderOptions::from_config(&config, key, index))
        .with_context(|| format!("opening container: {}", config.container.path.display()))?;
    Ok(reader)
}

fn resolve_key(key: Option<&str>) -> Result<SecretSlice<u8>> {
    let key = match key {
        Some(k) => k.to_string(),
        None => rpassword::prompt_password("Container key: ").context("reading container key")?,
    };
    if key.is_empty() {
        anyhow::bail!("container key is empty");
    }
    Ok(SecretSlice::from(key.into_bytes()))
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn cmd_list(reader: &ContainerReader) -> Result<()> {
    if reader.is_closed() {
        anyhow::bail!("container is closed");
    }
    for (name, record) in reader.index().iter() {
        println!(
            "{:>10}  {:>10}  {}",
            fmt_bytes(record.original_len),
            fmt_bytes(record.encrypted_len),
            name
        );
    }
    Ok(())
}

fn cmd_len(reader: &ContainerReader) -> Result<()> {
    let (original, encrypted) = reader.get_len()?;
    let mode = reader.mode();
    let integrity = if mode.is_aead() { "authenticated" } else { "digest-checked" };
    println!("mode:      {mode} (tag {}, {integrity})", mode.tag());
    println!("entries:   {}", reader.index().len());
    println!("original:  {original} ({})", fmt_bytes(original));
    println!("encrypted: {encrypted} ({})", fmt_bytes(encrypted));
    Ok(())
}

fn cmd_verify(reader: &ContainerReader, names: &[String]) -> Result<()> {
    let targets: Vec<String> = if names.is_empty() {
        reader.names()?.into_iter().map(str::to_string).collect()
    } else {
        names.to_vec()
    };

    let mut failed = 0usize;
    for name in &targets {
        let retrieved = reader
            .get_file(name, true, true)
            .with_context(|| format!("reading {name}"))?;
        if retrieved.hash_match {
            println!("ok        {name}");
        } else {
            println!("MISMATCH  {name}");
            failed += 1;
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} entries failed verification", targets.len());
    }
    info!(entries = targets.len(), "verification passed");
    Ok(())
}

fn cmd_extract(reader: &ContainerReader, name: &str, out: Option<&Path>, raw: bool) -> Result<()> {
    let retrieved = reader
        .get_file(name, !raw, true)
        .with_context(|| format!("reading {name}"))?;
    if !retrieved.hash_match {
        tracing::warn!(name, "digest mismatch, writing anyway");
    }

    match out {
        Some(path) => std::fs::write(path, &retrieved.data)
            .with_context(|| format!("writing {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&retrieved.data).context("writing to stdout")?;
            stdout.flush().context("flushing stdout")?;
        }
    }
    Ok(())
}

fn cmd_extract_all(reader: &ContainerReader, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let names = reader.names()?;

    let written: Vec<u64> = names
        .par_iter()
        .map(|name| -> Result<u64> {
            let dest = output_path(dir, name)?;
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            let data = reader
                .get_file_parallel(name)
                .with_context(|| format!("reading {name}"))?;
            std::fs::write(&dest, &data).with_context(|| format!("writing {}", dest.display()))?;
            Ok(data.len() as u64)
        })
        .collect::<Result<_>>()?;

    let total: u64 = written.iter().sum();
    println!("Extracted {} entries ({}) into {}", written.len(), fmt_bytes(total), dir.display());
    Ok(())
}

/// Map an index name onto a path under `dir`, refusing anything that escapes it.
fn output_path(dir: &Path, name: &str) -> Result<PathBuf> {
    let rel = Path::new(name);
    let escapes = rel
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes || name.is_empty() {
        anyhow::bail!("refusing to extract entry with unsafe name: {name:?}");
    }
    Ok(dir.join(rel))
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
