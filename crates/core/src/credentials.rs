//! Long-lived push-signing key pair (VAPID), kept in a single JSON file.
//!
//! Keys are P-256. The private key is the raw 32-byte scalar and the public
//! key is the 65-byte uncompressed point, both base64url without padding,
//! which is the form browsers expect for `applicationServerKey`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use p256::ecdsa::SigningKey;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::SecretKey;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub const CREDENTIALS_FILE: &str = "vapid_keys.json";

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("credentials file io: {0}")]
    Io(#[from] std::io::Error),
    #[error("credentials file is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid key material: {0}")]
    InvalidKey(String),
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushCredentials {
    pub private_key: String,
    pub public_key: String,
}

impl std::fmt::Debug for PushCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushCredentials")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

impl PushCredentials {
    pub fn generate() -> Self {
        let secret = SecretKey::random(&mut OsRng);
        let public = secret.public_key().to_encoded_point(false);
        Self {
            private_key: URL_SAFE_NO_PAD.encode(secret.to_bytes()),
            public_key: URL_SAFE_NO_PAD.encode(public.as_bytes()),
        }
    }

    pub fn signing_key(&self) -> Result<SigningKey, CredentialsError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(self.private_key.trim_end_matches('='))
            .map_err(|err| CredentialsError::InvalidKey(err.to_string()))?;
        let secret =
            SecretKey::from_slice(&bytes).map_err(|err| CredentialsError::InvalidKey(err.to_string()))?;
        Ok(SigningKey::from(secret))
    }

    fn is_usable(&self) -> bool {
        !self.public_key.is_empty() && self.signing_key().is_ok()
    }
}

pub fn credentials_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CREDENTIALS_FILE)
}

pub fn load(data_dir: &Path) -> Result<PushCredentials, CredentialsError> {
    let data = fs::read(credentials_path(data_dir))?;
    let credentials: PushCredentials = serde_json::from_slice(&data)?;
    if !credentials.is_usable() {
        return Err(CredentialsError::InvalidKey(
            "stored key pair is incomplete".to_string(),
        ));
    }
    Ok(credentials)
}

/// Load the stored key pair, or generate and persist a new one when the file
/// is absent or unreadable.
///
/// A failure to persist is logged and the fresh keys are still returned; they
/// will simply be regenerated on the next start.
pub fn load_or_generate(data_dir: &Path) -> PushCredentials {
    match load(data_dir) {
        Ok(credentials) => {
            info!("push credentials loaded from file");
            return credentials;
        }
        Err(CredentialsError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            warn!(target: "security", error = %err, "stored push credentials unusable, regenerating");
        }
    }

    let credentials = PushCredentials::generate();
    match store(data_dir, &credentials) {
        Ok(path) => info!(
            path = %path.display(),
            public_key = %credentials.public_key,
            "push credentials generated and saved"
        ),
        Err(err) => warn!(
            target: "security",
            error = %err,
            "failed to persist push credentials; they will be regenerated on restart"
        ),
    }
    credentials
}

fn store(data_dir: &Path, credentials: &PushCredentials) -> Result<PathBuf, CredentialsError> {
    fs::create_dir_all(data_dir)?;
    let path = credentials_path(data_dir);
    let data = serde_json::to_vec_pretty(credentials)?;

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(&path)?;
    // `mode` only applies on creation; an existing file keeps its bits.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(&data)?;
    file.sync_all()?;
    Ok(path)
}
