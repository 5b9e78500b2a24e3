//! Ed25519 keypair generation for signing model directories.
//!
//! Writes the base64 signing seed (mode 0600 on Unix) for `sign_model` and,
//! optionally, the base64 verifying key for `GROWTHCHECK_MODEL_PUBKEY_B64_FILE`.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin generate_keypair -- --out-seed key.b64 --out-pub key.pub.b64
//! ```

use std::fs::OpenOptions;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose;
use base64::Engine;
use clap::Parser;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

#[derive(Debug, Parser)]
#[command(name = "generate_keypair", about = "Generate an Ed25519 model-signing keypair")]
struct Args {
    /// Where to write the base64 signing seed
    #[arg(long)]
    out_seed: PathBuf,

    /// Where to write the base64 verifying key
    #[arg(long)]
    out_pub: Option<PathBuf>,

    /// Overwrite existing files
    #[arg(long)]
    force: bool,
}

fn write_line(path: &Path, contents: &str, mode: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let mut opts = OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    opts.mode(mode);
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = opts
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    file.write_all(contents.as_bytes())?;
    file.write_all(b"\n")?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    for path in std::iter::once(&args.out_seed).chain(args.out_pub.as_ref()) {
        if path.exists() && !args.force {
            bail!("Refusing to overwrite existing file {}. Use --force.", path.display());
        }
    }

    let mut seed = Zeroizing::new([0u8; 32]);
    OsRng.fill_bytes(&mut seed[..]);

    let signing_key = SigningKey::from_bytes(&seed);
    let seed_b64 = Zeroizing::new(general_purpose::STANDARD.encode(&seed[..]));
    let pub_b64 = general_purpose::STANDARD.encode(signing_key.verifying_key().as_bytes());

    write_line(&args.out_seed, &seed_b64, 0o600)?;
    println!("Wrote signing seed (base64) to {}", args.out_seed.display());

    if let Some(pub_path) = &args.out_pub {
        // Public key is non-secret; allow read access.
        write_line(pub_path, &pub_b64, 0o644)?;
        println!("Wrote verifying key (base64) to {}", pub_path.display());
    }

    // Print only non-secret material.
    println!("Verifying key (base64): {pub_b64}");
    Ok(())
}
