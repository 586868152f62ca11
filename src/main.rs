//! OSSL Bridge command-line front end
//!
//! Bootstraps the bridge and exercises it from the shell.
//!
//! ```bash
//! # Module constants and registered exception classes
//! ossl-bridge info
//!
//! # Lowercase hex dump of a file
//! ossl-bridge hex cert.der
//!
//! # Decrypt a PEM private key (prompts for the passphrase)
//! ossl-bridge read-key key.pem
//!
//! # Re-encrypt a key as PKCS#8 with AES-256-CBC
//! ossl-bridge encrypt-key key.pem --out key.p8.pem
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use openssl::symm::Cipher;
use tracing_subscriber::EnvFilter;

use ossl_bridge::bootstrap::{Bootstrap, Ossl};
use ossl_bridge::configs::AppConfig;
use ossl_bridge::{hex, pkey, Value};

#[derive(Parser)]
#[command(name = "ossl-bridge")]
#[command(version)]
#[command(about = "Host-language glue for OpenSSL")]
struct Cli {
    /// Configuration file (defaults to ./config.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Turn on the bridge's debug flag and debug logging
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print module constants and exception classes
    Info,

    /// Print a file as lowercase hex
    Hex {
        /// File to encode
        file: PathBuf,
    },

    /// Decrypt a PEM private key
    ReadKey {
        /// Encrypted PEM file
        pem: PathBuf,
    },

    /// Re-encrypt a PEM private key as PKCS#8 (AES-256-CBC)
    EncryptKey {
        /// PEM file to read
        pem: PathBuf,

        /// Where to write the encrypted key
        #[arg(short, long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref())?;
    let ossl = Bootstrap::with_defaults(config)
        .run()
        .context("Failed to initialize OpenSSL bridge")?;
    if cli.debug {
        ossl.module().call("debug=", &[Value::Bool(true)])?;
    }

    match cli.command {
        Commands::Info => print_info(&ossl),
        Commands::Hex { file } => {
            let data = fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            println!("{}", hex::string_to_hex(&data)?);
        }
        Commands::ReadKey { pem } => {
            let data = fs::read(&pem).with_context(|| format!("Failed to read {}", pem.display()))?;
            let key = pkey::read_private_key(&ossl, &data, &ossl.passphrase_bridge())
                .with_context(|| format!("Failed to decrypt {}", pem.display()))?;
            println!("✓ Private key decrypted ({:?}, {} bits)", key.id(), key.bits());
        }
        Commands::EncryptKey { pem, out } => {
            let data = fs::read(&pem).with_context(|| format!("Failed to read {}", pem.display()))?;
            let bridge = ossl.passphrase_bridge();
            let key = pkey::read_private_key(&ossl, &data, &bridge)
                .with_context(|| format!("Failed to decrypt {}", pem.display()))?;
            println!("✓ Private key loaded");

            let encrypted = pkey::write_private_key(&ossl, &key, Cipher::aes_256_cbc(), &bridge)
                .context("Failed to encrypt private key")?;
            fs::write(&out, encrypted)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            println!("✓ Encrypted private key written to '{}'", out.display());
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::from_file(path),
        None if Path::new("config.toml").exists() => AppConfig::load(),
        None => Ok(AppConfig::default()),
    }
}

fn print_info(ossl: &Ossl) {
    let module = ossl.module();
    println!("=== {} ===", module.name());
    for name in module.constants() {
        match module.const_get(name) {
            Some(Value::String(s)) => println!("{}::{} = {:?}", module.name(), name, s),
            Some(Value::Integer(i)) => println!("{}::{} = 0x{:x}", module.name(), name, i),
            Some(other) => println!("{}::{} = {:?}", module.name(), name, other),
            None => {}
        }
    }

    println!("\nException classes:");
    for class in module.classes() {
        println!("  {:?}", class);
    }

    println!("\nSubsystems:");
    for kind in ossl.subsystems() {
        println!("  ✓ {}", kind);
    }
}
