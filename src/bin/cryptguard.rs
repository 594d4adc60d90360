//! CryptGuard CLI: time-windowed file encryption
//!
//! Usage:
//!   cryptguard keygen
//!   cryptguard seal    --in <FILE> [--out <FILE>] [--mime <TYPE>] [--unlock-at <RFC3339>] [--expire-at <RFC3339>]
//!   cryptguard open    --in <FILE> (--key <HEX> | --key-file <PATH>) [--out <PATH>] [--owner <ID> --accessor <ID>]
//!   cryptguard inspect <FILE>

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context as _};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cryptguard_envelope::config::{Config, LogFormat};
use cryptguard_envelope::notify::{HttpNotifier, TracingNotifier};
use cryptguard_envelope::{
    inspect, AccessNotice, AccessWindow, CryptGuard, Notifier, OpenOutcome, SealRequest,
    SymmetricKey, SEALED_FILE_SUFFIX,
};

#[derive(Parser)]
#[command(name = "cryptguard", version, about = "Time-windowed AES-256-GCM file encryption")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a fresh 64-character key
    Keygen,

    /// Encrypt a file; prints the key on stdout
    Seal {
        #[arg(long = "in")]
        input: PathBuf,
        /// Defaults to <FILE>.encrypted
        #[arg(long = "out")]
        output: Option<PathBuf>,
        /// Stored MIME type (default: empty)
        #[arg(long, default_value = "")]
        mime: String,
        /// Stored original name (default: input file name)
        #[arg(long)]
        name: Option<String>,
        /// Refuse decryption before this instant (RFC 3339)
        #[arg(long)]
        unlock_at: Option<DateTime<Utc>>,
        /// Refuse decryption after this instant (RFC 3339)
        #[arg(long)]
        expire_at: Option<DateTime<Utc>>,
    },

    /// Decrypt a file
    Open {
        #[arg(long = "in")]
        input: PathBuf,
        #[arg(long, env = "CRYPTGUARD_KEY", hide_env_values = true, conflicts_with = "key_file")]
        key: Option<String>,
        #[arg(long)]
        key_file: Option<PathBuf>,
        /// Defaults to the stored original name in the current directory
        #[arg(long = "out")]
        output: Option<PathBuf>,
        /// Notify this owner identity on success
        #[arg(long, requires = "accessor")]
        owner: Option<String>,
        /// Identity reported as the accessor
        #[arg(long, requires = "owner")]
        accessor: Option<String>,
    },

    /// Show envelope metadata (no decryption)
    Inspect { file: PathBuf },
}

fn init_tracing(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = Config::from_env();
    init_tracing(config.log_format);

    match run(cli.command, &config).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: &Config) -> anyhow::Result<ExitCode> {
    match command {
        Command::Keygen => {
            let key = SymmetricKey::generate()?;
            println!("{}", key.to_hex());
            Ok(ExitCode::SUCCESS)
        }
        Command::Seal {
            input,
            output,
            mime,
            name,
            unlock_at,
            expire_at,
        } => cmd_seal(config, &input, output, &mime, name, unlock_at, expire_at),
        Command::Open {
            input,
            key,
            key_file,
            output,
            owner,
            accessor,
        } => {
            let key = match (key, key_file) {
                (Some(k), _) => k,
                (None, Some(path)) => fs::read_to_string(&path)
                    .with_context(|| format!("read {}", path.display()))?,
                (None, None) => bail!("missing --key or --key-file"),
            };
            let notice = owner.zip(accessor).map(|(o, a)| AccessNotice::new(o, a));
            cmd_open(config, &input, &key, output, notice).await
        }
        Command::Inspect { file } => cmd_inspect(&file),
    }
}

fn cmd_seal(
    config: &Config,
    input: &Path,
    output: Option<PathBuf>,
    mime: &str,
    name: Option<String>,
    unlock_at: Option<DateTime<Utc>>,
    expire_at: Option<DateTime<Utc>>,
) -> anyhow::Result<ExitCode> {
    let plaintext = fs::read(input).with_context(|| format!("read {}", input.display()))?;
    let original_name = match name {
        Some(n) => n,
        None => input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("input path has no file name")?,
    };

    let guard = CryptGuard::new().with_binding(config.binding);
    let request = SealRequest::new(&plaintext, &original_name, mime)
        .with_window(AccessWindow::new(unlock_at, expire_at));
    let sealed = guard.seal(&request)?;

    let out_path = output.unwrap_or_else(|| {
        let mut p = input.as_os_str().to_owned();
        p.push(SEALED_FILE_SUFFIX);
        PathBuf::from(p)
    });
    fs::write(&out_path, &sealed.envelope)
        .with_context(|| format!("write {}", out_path.display()))?;

    eprintln!(
        "sealed {} -> {} ({} bytes plaintext -> {} bytes envelope)",
        input.display(),
        out_path.display(),
        plaintext.len(),
        sealed.envelope.len()
    );
    eprintln!("keep this key; it is the only way to open the file:");
    println!("{}", sealed.key.to_hex());

    Ok(ExitCode::SUCCESS)
}

async fn cmd_open(
    config: &Config,
    input: &Path,
    key: &str,
    output: Option<PathBuf>,
    notice: Option<AccessNotice>,
) -> anyhow::Result<ExitCode> {
    let envelope = fs::read(input).with_context(|| format!("read {}", input.display()))?;

    let mut delivery = None;
    let notifier: Arc<dyn Notifier> = match &config.notify_url {
        Some(url) if notice.is_some() => match HttpNotifier::spawn(url.clone()) {
            Ok((notifier, handle)) => {
                delivery = Some(handle);
                Arc::new(notifier)
            }
            Err(e) => {
                tracing::warn!(error = %e, "http notifier unavailable, logging access instead");
                Arc::new(TracingNotifier)
            }
        },
        _ => Arc::new(TracingNotifier),
    };

    let guard = CryptGuard::new()
        .with_binding(config.binding)
        .with_notifier(notifier);

    let outcome = match &notice {
        Some(notice) => guard.open_with_notice(&envelope, key, notice),
        None => guard.open(&envelope, key),
    }?;

    // Closing the queue lets the delivery task finish once it drains.
    drop(guard);

    let result = write_opened(input, output, outcome);

    // Only after the result is out: give queued notifications a chance to
    // go before the runtime shuts down.
    if let Some(handle) = delivery {
        let _ = handle.await;
    }
    result
}

fn write_opened(
    input: &Path,
    output: Option<PathBuf>,
    outcome: OpenOutcome,
) -> anyhow::Result<ExitCode> {
    let opened = match outcome {
        OpenOutcome::Opened(opened) => opened,
        OpenOutcome::Refused(refusal) => {
            eprintln!("{}", refusal);
            return Ok(ExitCode::from(2));
        }
    };

    let out_path = output.unwrap_or_else(|| safe_output_name(&opened.original_name));
    if out_path == input {
        bail!("output path would overwrite input, pass --out");
    }
    fs::write(&out_path, &opened.plaintext)
        .with_context(|| format!("write {}", out_path.display()))?;

    eprintln!(
        "opened {} -> {} ({} bytes, {})",
        input.display(),
        out_path.display(),
        opened.plaintext.len(),
        if opened.mime_type.is_empty() { "unknown type" } else { opened.mime_type.as_str() }
    );
    eprintln!("{}", opened.access);

    Ok(ExitCode::SUCCESS)
}

/// Only the final path component of a stored name is used, so a crafted
/// header cannot write outside the current directory.
fn safe_output_name(original_name: &str) -> PathBuf {
    Path::new(original_name)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("decrypted.bin"))
}

fn cmd_inspect(file: &Path) -> anyhow::Result<ExitCode> {
    let envelope = fs::read(file).with_context(|| format!("read {}", file.display()))?;
    let info = inspect(&envelope).context("invalid envelope")?;

    println!("CryptGuard Envelope");
    println!("===================");
    println!("Original Name:   {}", info.original_name);
    println!("MIME Type:       {}", info.mime_type);
    println!("Time-Locked:     {}", if info.time_locked { "yes" } else { "no" });
    match info.expires_at {
        Some(at) => println!("Expires At:      {}", at.to_rfc3339()),
        None => println!("Expires At:      never"),
    }
    println!();
    println!("Total Size:      {} bytes", info.envelope_len);
    println!("Metadata Size:   {} bytes", info.metadata_len);
    println!("Plaintext Size:  {} bytes", info.plaintext_len);
    if info.nonce_copy_mismatch {
        println!("Warning:         metadata nonce copy does not match envelope nonce");
    }

    Ok(ExitCode::SUCCESS)
}
