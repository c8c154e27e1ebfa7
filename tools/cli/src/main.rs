//! CryptoFacade CLI - Command line access to the default provider.
//!
//! This tool lists the available algorithms, hashes files and encrypts or
//! decrypts files with AES-GCM in the flat `nonce || ciphertext || tag` form.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;
use zeroize::Zeroizing;

use cryptofacade_common::KeyFormat;
use cryptofacade_crypto::{ids, AeadAlgorithm, AeadKey, Cipher, DigestAlgorithm, EncodableKey};
use cryptofacade_provider::{create_default_registry, Provider};

/// Read size for streamed hashing.
const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Parser)]
#[command(name = "cryptofacade")]
#[command(about = "CryptoFacade - Hashing and authenticated encryption")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Run asynchronous work on this many dedicated worker threads.
    #[arg(short, long, global = true)]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the algorithms of the default provider.
    Algorithms,

    /// Hash a file.
    Hash {
        /// Digest name, e.g. SHA-256 or BLAKE2b-512.
        #[arg(short, long, default_value = "SHA-256")]
        algorithm: String,

        /// File to hash.
        file: PathBuf,
    },

    /// Generate an AES-GCM key and print it as base64.
    Keygen {
        /// Key size in bits: 128, 192 or 256.
        #[arg(short, long, default_value_t = 256)]
        bits: usize,
    },

    /// Encrypt a file with AES-GCM.
    Encrypt {
        /// Base64 encoded raw key.
        #[arg(short, long)]
        key: String,

        /// Plaintext file.
        #[arg(short, long)]
        input: PathBuf,

        /// Destination for the ciphertext.
        #[arg(short, long)]
        output: PathBuf,

        /// Associated data authenticated alongside the file.
        #[arg(long)]
        aad: Option<String>,
    },

    /// Decrypt a file produced by `encrypt`.
    Decrypt {
        /// Base64 encoded raw key.
        #[arg(short, long)]
        key: String,

        /// Ciphertext file.
        #[arg(short, long)]
        input: PathBuf,

        /// Destination for the plaintext.
        #[arg(short, long)]
        output: PathBuf,

        /// Associated data given at encryption time.
        #[arg(long)]
        aad: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let provider = open_provider(cli.workers)?;

    match cli.command {
        Commands::Algorithms => cmd_algorithms(&provider),

        Commands::Hash { algorithm, file } => cmd_hash(&provider, &algorithm, &file),

        Commands::Keygen { bits } => cmd_keygen(&provider, bits).await,

        Commands::Encrypt {
            key,
            input,
            output,
            aad,
        } => cmd_encrypt(&provider, &key, &input, &output, aad.as_deref()).await,

        Commands::Decrypt {
            key,
            input,
            output,
            aad,
        } => cmd_decrypt(&provider, &key, &input, &output, aad.as_deref()).await,
    }
}

/// Resolve the default provider, optionally backed by worker threads.
fn open_provider(workers: Option<usize>) -> Result<Arc<Provider>> {
    let config = match workers {
        Some(threads) => json!({ "execution": { "mode": "workers", "threads": threads } }),
        None => Value::Null,
    };
    let provider = create_default_registry()
        .resolve_default(config)
        .context("No crypto provider available")?;
    debug!(provider = %provider.name(), "Provider ready");
    Ok(provider)
}

/// List supported algorithms.
fn cmd_algorithms(provider: &Provider) -> Result<()> {
    println!("Provider: {}", provider.name());
    println!("Executor: {}", provider.state().executor().name());
    println!("Algorithms:");
    for name in provider.algorithm_names() {
        println!("  {}", name);
    }

    let missing: Vec<_> = ids::DIGESTS
        .iter()
        .filter(|id| !provider.supports(*id))
        .map(|id| id.name())
        .collect();
    if !missing.is_empty() {
        println!("Not available: {}", missing.join(", "));
    }

    Ok(())
}

/// Hash a file in fixed-size chunks.
fn cmd_hash(provider: &Provider, algorithm: &str, file: &Path) -> Result<()> {
    let id = ids::digest_by_name(algorithm)
        .with_context(|| format!("Unknown digest: {}", algorithm))?;
    let digest: Arc<dyn DigestAlgorithm> = provider.get(&id).context("Digest unavailable")?;
    let hasher = digest.hasher().create()?;

    let mut reader = File::open(file)
        .with_context(|| format!("Failed to open {}", file.display()))?;
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut function = hasher.hash_function()?;
    loop {
        let read = reader
            .read(&mut buffer)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        if read == 0 {
            break;
        }
        function.update(&buffer[..read])?;
    }
    let hash = function.complete()?;

    println!("{}  {}", hex::encode(hash), file.display());
    Ok(())
}

/// Generate a fresh AES-GCM key.
async fn cmd_keygen(provider: &Provider, bits: usize) -> Result<()> {
    let algorithm: Arc<dyn AeadAlgorithm> = provider.get(&ids::AES_GCM)?;
    let generator = algorithm
        .key_generator()
        .configure(|b| {
            b.key_size(bits);
        })
        .context("Unsupported key size")?;
    let key = generator.generate_async().await?;
    let raw = Zeroizing::new(key.encode(KeyFormat::Raw)?);

    info!("Generated {}-bit AES-GCM key", key.key_size());
    println!("{}", BASE64.encode(raw.as_slice()));
    Ok(())
}

/// Build an AES-GCM cipher from a base64 key.
fn load_cipher(provider: &Provider, key: &str) -> Result<Cipher> {
    let raw = Zeroizing::new(BASE64.decode(key.trim()).context("Key is not valid base64")?);
    let algorithm: Arc<dyn AeadAlgorithm> = provider.get(&ids::AES_GCM)?;
    let key: Arc<dyn AeadKey> = algorithm
        .key_decoder()
        .decode(KeyFormat::Raw, &raw)
        .context("Invalid AES-GCM key")?;
    Ok(key.cipher().create()?)
}

/// Encrypt a file.
async fn cmd_encrypt(
    provider: &Provider,
    key: &str,
    input: &Path,
    output: &Path,
    aad: Option<&str>,
) -> Result<()> {
    let cipher = load_cipher(provider, key)?;
    let plaintext = Zeroizing::new(
        tokio::fs::read(input)
            .await
            .with_context(|| format!("Failed to read {}", input.display()))?,
    );

    let sealed = cipher
        .encrypt_async(&plaintext, aad.map(str::as_bytes))
        .await
        .context("Encryption failed")?;
    tokio::fs::write(output, &sealed)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!(
        "Encrypted {} bytes into {} bytes",
        plaintext.len(),
        sealed.len()
    );
    Ok(())
}

/// Decrypt a file.
async fn cmd_decrypt(
    provider: &Provider,
    key: &str,
    input: &Path,
    output: &Path,
    aad: Option<&str>,
) -> Result<()> {
    let cipher = load_cipher(provider, key)?;
    let sealed = tokio::fs::read(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let plaintext = Zeroizing::new(
        cipher
            .decrypt_async(&sealed, aad.map(str::as_bytes))
            .await
            .context("Decryption failed")?,
    );
    tokio::fs::write(output, plaintext.as_slice())
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!("Decrypted {} bytes", plaintext.len());
    Ok(())
}
