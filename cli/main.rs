use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use sealstore::config::Config;
use sealstore::managed::ManagedKeyUploader;
use sealstore::object_store::ObjectStore;
use sealstore::s3::S3ObjectStore;
use sealstore::service::{EncryptionService, OperationResult};
use sealstore::util::format_file_size;
use sealstore::vault::EncryptedVault;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// SealStore - password (AES-256-CBC) and managed-key protected file storage
#[derive(Parser)]
#[command(name = "sealstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Encryption password for client-side operations
    #[arg(long, global = true, env = "ENCRYPTION_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt a local file into a container
    Encrypt {
        input: PathBuf,
        output: PathBuf,
    },

    /// Decrypt a local container and verify its integrity
    Decrypt {
        input: PathBuf,
        output: PathBuf,
    },

    /// Encrypt a file locally and upload the container
    Upload {
        file: PathBuf,

        /// Object name (defaults to the input filename)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Download a container and decrypt it
    Download {
        name: String,

        /// Output file path (defaults to the object name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Upload a file encrypted server-side with the configured managed key
    KmsUpload {
        file: PathBuf,

        /// Object key (defaults to a random prefix plus the filename)
        #[arg(short, long)]
        key: Option<String>,

        /// Extra user metadata as key=value
        #[arg(short, long)]
        meta: Option<String>,
    },

    /// List stored objects
    List {
        #[arg(short, long, default_value = "")]
        prefix: String,

        /// Only show client-side encrypted containers
        #[arg(short, long)]
        encrypted: bool,
    },

    /// Check that the configured bucket is reachable
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured logging
    // Use RUST_LOG environment variable to control log level (e.g., RUST_LOG=info,sealstore=debug)
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!(command = ?cli.command, "SealStore starting");

    let config = cli.config.as_deref();
    let password = cli.password.as_deref();

    match cli.command {
        Commands::Encrypt { input, output } => {
            cmd_encrypt(&input, &output, require_password(password)?).await
        }
        Commands::Decrypt { input, output } => {
            cmd_decrypt(&input, &output, require_password(password)?).await
        }
        Commands::Upload { file, name } => {
            cmd_upload(config, &file, name.as_deref(), require_password(password)?).await
        }
        Commands::Download { name, output } => {
            cmd_download(config, &name, output.as_ref(), require_password(password)?).await
        }
        Commands::KmsUpload { file, key, meta } => {
            cmd_kms_upload(config, &file, key, meta.as_deref()).await
        }
        Commands::List { prefix, encrypted } => cmd_list(config, &prefix, encrypted).await,
        Commands::Status => cmd_status(config).await,
    }
}

fn require_password(password: Option<&str>) -> Result<&str> {
    password.context("a password is required: pass --password or set ENCRYPTION_PASSWORD")
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_store(config_path: Option<&str>) -> Result<(Config, Arc<dyn ObjectStore>)> {
    let cfg = Config::load_with_env(config_path)?;
    let store = S3ObjectStore::new(cfg.clone()).context("building S3 client")?;
    Ok((cfg, Arc::new(store)))
}

fn file_name(path: &Path) -> Result<String> {
    Ok(path
        .file_name()
        .context("input file has no filename")?
        .to_string_lossy()
        .to_string())
}

/// Encrypt a local file
async fn cmd_encrypt(input: &Path, output: &Path, password: &str) -> Result<()> {
    let spinner = create_spinner(&format!("Encrypting {}...", input.display()));
    let result = EncryptionService::new()
        .encrypt_file(input, output, password)
        .await;
    spinner.finish_and_clear();

    print_json(&result)?;
    match result {
        OperationResult::Success(report) => {
            eprintln!(
                "Encrypted {} -> {} ({} -> {})",
                input.display(),
                output.display(),
                format_file_size(report.original_size),
                format_file_size(report.encrypted_size)
            );
            Ok(())
        }
        OperationResult::Failure(failure) => bail!("encryption failed: {}", failure.error),
    }
}

/// Decrypt a local container
async fn cmd_decrypt(input: &Path, output: &Path, password: &str) -> Result<()> {
    let spinner = create_spinner(&format!("Decrypting {}...", input.display()));
    let result = EncryptionService::new()
        .decrypt_file(input, output, password)
        .await;
    spinner.finish_and_clear();

    print_json(&result)?;
    match result {
        OperationResult::Success(report) if report.integrity_check => {
            eprintln!(
                "Decrypted {} bytes -> {}",
                report.decrypted_size,
                output.display()
            );
            Ok(())
        }
        OperationResult::Success(_) => bail!(
            "integrity check failed: {} does not match its stored hash",
            output.display()
        ),
        OperationResult::Failure(failure) => bail!("decryption failed: {}", failure.error),
    }
}

/// Encrypt locally and upload
async fn cmd_upload(
    config_path: Option<&str>,
    file: &Path,
    name: Option<&str>,
    password: &str,
) -> Result<()> {
    let (_cfg, store) = open_store(config_path)?;
    let vault = EncryptedVault::new(store);

    let name = match name {
        Some(n) => n.to_string(),
        None => file_name(file)?,
    };
    let content = fs::read(file)
        .await
        .with_context(|| format!("reading {:?}", file))?;

    let spinner = create_spinner(&format!("Encrypting and uploading {}...", name));
    let summary = vault.upload_encrypted(&name, &content, password).await?;
    spinner.finish_with_message(format!(
        "Uploaded {} ({} -> {})",
        summary.key,
        format_file_size(summary.original_size),
        format_file_size(summary.encrypted_size)
    ));

    print_json(&summary)
}

/// Download and decrypt
async fn cmd_download(
    config_path: Option<&str>,
    name: &str,
    output: Option<&PathBuf>,
    password: &str,
) -> Result<()> {
    let (_cfg, store) = open_store(config_path)?;
    let vault = EncryptedVault::new(store);

    let spinner = create_spinner(&format!("Downloading {}...", name));
    let file = vault.download_decrypted(name, password).await?;
    spinner.finish_and_clear();

    if !file.report.integrity_check {
        bail!(
            "integrity check failed for {}: expected {}, got {}",
            name,
            file.report.original_hash,
            file.report.decrypted_hash
        );
    }

    let output = output.cloned().unwrap_or_else(|| PathBuf::from(name));
    fs::write(&output, &file.content)
        .await
        .with_context(|| format!("writing to {:?}", output))?;

    eprintln!("Decrypted {} bytes -> {:?}", file.content.len(), output);
    Ok(())
}

/// Upload with server-side managed-key encryption
async fn cmd_kms_upload(
    config_path: Option<&str>,
    file: &Path,
    key: Option<String>,
    meta: Option<&str>,
) -> Result<()> {
    let (cfg, store) = open_store(config_path)?;
    let kms_key_id = cfg
        .kms_key_id
        .clone()
        .context("no managed key configured: set kms_key_id or KMS_KEY_ID")?;
    let uploader = ManagedKeyUploader::new(store, kms_key_id);

    if !uploader.verify_bucket_access().await {
        bail!("bucket access verification failed for {}", cfg.bucket);
    }

    let extra = match meta {
        Some(pair) => {
            let (k, v) = pair
                .split_once('=')
                .context("metadata must be given as key=value")?;
            Some((k.to_string(), v.to_string()))
        }
        None => None,
    };

    let filename = file_name(file)?;
    let content = fs::read(file)
        .await
        .with_context(|| format!("reading {:?}", file))?;

    let spinner = create_spinner(&format!("Uploading {}...", filename));
    let receipt = uploader.upload_named(&filename, content, key, extra).await?;
    spinner.finish_with_message(format!(
        "Uploaded {} ({}) with managed key {}",
        receipt.key,
        format_file_size(receipt.size),
        uploader.kms_key_id()
    ));
    print_json(&receipt)
}

/// List objects
async fn cmd_list(config_path: Option<&str>, prefix: &str, encrypted: bool) -> Result<()> {
    let (_cfg, store) = open_store(config_path)?;

    let objects = if encrypted {
        EncryptedVault::new(store).list_encrypted(prefix).await?
    } else {
        store.list(prefix).await?
    };

    if objects.is_empty() {
        println!("No objects found");
        return Ok(());
    }

    println!("{:<48} {:>12} {:<28}", "KEY", "SIZE", "LAST MODIFIED");
    println!("{}", "-".repeat(90));
    for obj in &objects {
        println!(
            "{:<48} {:>12} {:<28}",
            obj.key,
            format_file_size(obj.size),
            obj.last_modified.as_deref().unwrap_or("-")
        );
    }
    println!();
    println!("{} object(s)", objects.len());
    Ok(())
}

/// Show configuration and check bucket access
async fn cmd_status(config_path: Option<&str>) -> Result<()> {
    let cfg = Config::load_with_env(config_path)?;
    let store = S3ObjectStore::new(cfg.clone()).context("building S3 client")?;

    println!("SealStore Status");
    println!();
    println!("Configuration:");
    println!("  Bucket:        {}", store.bucket());
    println!("  Region:        {}", cfg.region);
    println!(
        "  Endpoint:      {}",
        cfg.endpoint.as_deref().unwrap_or("(provider default)")
    );
    println!(
        "  Managed key:   {}",
        cfg.kms_key_id.as_deref().unwrap_or("(not configured)")
    );
    println!();

    match store.check_access().await {
        Ok(()) => println!("Bucket Access:   OK"),
        Err(e) => {
            println!("Bucket Access:   FAILED");
            bail!(e);
        }
    }
    Ok(())
}
