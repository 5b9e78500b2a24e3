//! Model signing utility for Growthcheck model directories.
//!
//! Writes a manifest (`manifest.json`) binding the SHA-256 of every model
//! artifact, and an Ed25519 signature over it (`model.sig`).
//!
//! # Usage
//!
//! ```bash
//! GROWTHCHECK_MODEL_SIGNING_KEY_B64_FILE=key.b64 \
//!     cargo run --bin sign_model -- models [--serial <n>] [--include standards.json]
//! ```
//!
//! The signing key is a base64 32-byte Ed25519 seed. The matching verifying
//! key is printed in base64, ready for `GROWTHCHECK_MODEL_PUBKEY_B64_FILE`.

use std::collections::BTreeMap;
use std::env;
use std::fs;
#[cfg(unix)]
use std::os::unix::io::FromRawFd;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose;
use base64::Engine;
use clap::Parser;
use ed25519_dalek::{Signature, Signer, SigningKey};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use growthcheck::adapters::artifacts::{
    sha256_hex, SignedManifest, MANIFEST_FILE, REQUIRED_ARTIFACTS, SIGNATURE_FILE,
};

const KEY_FD_ENV: &str = "GROWTHCHECK_MODEL_SIGNING_KEY_B64_FD";
const KEY_FILE_ENV: &str = "GROWTHCHECK_MODEL_SIGNING_KEY_B64_FILE";
const KEY_DEV_ENV: &str = "GROWTHCHECK_MODEL_SIGNING_KEY_B64";

#[derive(Debug, Parser)]
#[command(name = "sign_model", about = "Sign a Growthcheck model directory")]
struct Args {
    /// Directory holding classifier.json, labels.json and regressor.json
    model_dir: PathBuf,

    /// Monotonic release counter (defaults to the current Unix time)
    #[arg(long)]
    serial: Option<u64>,

    /// Extra files in the directory to bind (e.g. a standards table)
    #[arg(long)]
    include: Vec<String>,
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct Seed([u8; 32]);

fn trimmed_secret(raw: &str) -> Result<Zeroizing<String>> {
    let secret = raw.trim_end_matches(['\n', '\r']).to_string();
    if secret.is_empty() {
        bail!("Empty signing key");
    }
    Ok(Zeroizing::new(secret))
}

fn read_signing_seed_b64() -> Result<Zeroizing<String>> {
    #[cfg(unix)]
    if let Ok(fd_str) = env::var(KEY_FD_ENV) {
        let fd: i32 = fd_str.trim().parse().context("Invalid key FD")?;
        if fd <= 2 {
            bail!("Refusing to read signing key from stdio FD");
        }
        // SAFETY: take ownership of FD for one-time secret read.
        let mut file = unsafe { fs::File::from_raw_fd(fd) };
        let mut buf = Zeroizing::new(String::new());
        use std::io::Read;
        file.read_to_string(&mut buf)
            .context("Failed reading signing key from FD")?;
        return trimmed_secret(&buf);
    }

    if let Ok(path) = env::var(KEY_FILE_ENV) {
        let content = Zeroizing::new(
            fs::read_to_string(path.trim()).context("Failed reading signing key file")?,
        );
        return trimmed_secret(&content);
    }

    // Dev-only fallback for convenience.
    if cfg!(debug_assertions) {
        if let Ok(v) = env::var(KEY_DEV_ENV) {
            return trimmed_secret(&Zeroizing::new(v));
        }
    }

    bail!(
        "Missing signing key. Provide {KEY_FD_ENV} or {KEY_FILE_ENV} \
         ({KEY_DEV_ENV} is accepted only in debug builds)."
    )
}

fn read_signing_seed() -> Result<Seed> {
    let b64 = read_signing_seed_b64()?;
    let raw = Zeroizing::new(
        general_purpose::STANDARD
            .decode(b64.trim())
            .context("Invalid base64 in signing key")?,
    );

    if raw.len() != 32 {
        bail!(
            "Signing key seed must be 32 bytes after base64 decode (got {})",
            raw.len()
        );
    }

    let mut seed = [0u8; 32];
    seed.copy_from_slice(&raw);
    Ok(Seed(seed))
}

fn bind_files(model_dir: &Path, extra: &[String]) -> Result<BTreeMap<String, String>> {
    let mut files = BTreeMap::new();
    for rel in REQUIRED_ARTIFACTS.iter().copied().chain(extra.iter().map(String::as_str)) {
        if Path::new(rel).components().count() != 1 {
            bail!("{rel:?} must be a plain file name inside the model directory");
        }
        let path = model_dir.join(rel);
        let bytes = fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        files.insert(rel.to_string(), sha256_hex(&bytes));
    }
    Ok(files)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let files = bind_files(&args.model_dir, &args.include)?;

    let created_at = chrono::Utc::now().timestamp();
    let serial = args
        .serial
        .unwrap_or_else(|| u64::try_from(created_at).unwrap_or(1));

    let manifest = SignedManifest {
        version: 1,
        serial: Some(serial),
        created_at: Some(created_at),
        files,
    };
    let manifest_bytes =
        serde_json::to_vec_pretty(&manifest).context("Failed to serialize manifest.json")?;

    let seed = read_signing_seed()?;
    let signing_key = SigningKey::from_bytes(&seed.0);
    drop(seed);

    let manifest_path = args.model_dir.join(MANIFEST_FILE);
    fs::write(&manifest_path, &manifest_bytes)
        .with_context(|| format!("Failed to write {}", manifest_path.display()))?;

    let sig: Signature = signing_key.sign(&manifest_bytes);
    let sig_path = args.model_dir.join(SIGNATURE_FILE);
    fs::write(&sig_path, sig.to_bytes())
        .with_context(|| format!("Failed to write {}", sig_path.display()))?;

    println!("Signed manifest: {}", manifest_path.display());
    println!("Wrote signature: {}", sig_path.display());
    println!(
        "Verifying key (base64): {}",
        general_purpose::STANDARD.encode(signing_key.verifying_key().as_bytes())
    );

    Ok(())
}
