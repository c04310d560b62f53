//! Web Push delivery: VAPID authorization (RFC 8292) and `aes128gcm`
//! payload encryption (RFC 8188 / RFC 8291), posted with reqwest.

use std::time::Duration;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Nonce};
use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use hkdf::Hkdf;
use p256::ecdsa::{signature::Signer, Signature};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use rand::RngCore;
use reqwest::Url;
use serde_json::json;
use sha2::Sha256;

use super::{PushError, PushGateway, PushOptions, PushResponse, PushTarget};
use notice_core::credentials::PushCredentials;

/// Record size advertised in the content-coding header. The whole payload
/// goes in one record.
const RECORD_SIZE: u32 = 4096;
const SALT_LEN: usize = 16;
const AUTH_SECRET_LEN: usize = 16;
const PUBLIC_KEY_LEN: usize = 65;
/// 16-byte tag plus the 1-byte padding delimiter.
const RECORD_OVERHEAD: usize = 17;
const JWT_LIFETIME_HOURS: i64 = 12;

#[derive(Clone)]
pub struct WebPushGateway {
    client: reqwest::Client,
}

impl WebPushGateway {
    pub fn new(timeout: Duration) -> Result<Self, PushError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| PushError::Transport(Box::new(err)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PushGateway for WebPushGateway {
    async fn send(
        &self,
        payload: &[u8],
        target: &PushTarget<'_>,
        options: &PushOptions<'_>,
    ) -> Result<PushResponse, PushError> {
        let authorization =
            vapid_authorization(target.endpoint, options.subject, options.credentials, Utc::now())?;
        let body = encrypt(payload, target.p256dh, target.auth)?;

        let response = self
            .client
            .post(target.endpoint)
            .header("TTL", options.ttl_secs.to_string())
            .header("Content-Encoding", "aes128gcm")
            .header("Content-Type", "application/octet-stream")
            .header("Authorization", authorization)
            .body(body)
            .send()
            .await
            .map_err(|err| PushError::Transport(Box::new(err)))?;

        Ok(PushResponse {
            status: response.status().as_u16(),
        })
    }
}

/// `vapid t=<jwt>, k=<public key>` for the endpoint's origin.
pub fn vapid_authorization(
    endpoint: &str,
    subject: &str,
    credentials: &PushCredentials,
    now: DateTime<Utc>,
) -> Result<String, PushError> {
    let url = Url::parse(endpoint).map_err(|err| PushError::InvalidEndpoint(err.to_string()))?;
    if url.scheme() != "https" {
        return Err(PushError::InvalidEndpoint("endpoint must use https".to_string()));
    }
    let audience = url.origin().ascii_serialization();

    let header = URL_SAFE_NO_PAD.encode(br#"{"typ":"JWT","alg":"ES256"}"#);
    let claims = json!({
        "aud": audience,
        "exp": (now + chrono::Duration::hours(JWT_LIFETIME_HOURS)).timestamp(),
        "sub": subject,
    });
    let claims = URL_SAFE_NO_PAD.encode(claims.to_string());
    let signing_input = format!("{header}.{claims}");

    let key = credentials
        .signing_key()
        .map_err(|err| PushError::Signing(err.to_string()))?;
    let signature: Signature = key.sign(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(signature.to_bytes());

    Ok(format!(
        "vapid t={signing_input}.{signature}, k={}",
        credentials.public_key
    ))
}

/// Encrypt `plaintext` for one subscriber with a fresh ephemeral key and salt.
pub fn encrypt(plaintext: &[u8], p256dh: &str, auth: &str) -> Result<Vec<u8>, PushError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let server_key = SecretKey::random(&mut OsRng);
    encrypt_with(plaintext, p256dh, auth, &server_key, &salt)
}

fn encrypt_with(
    plaintext: &[u8],
    p256dh: &str,
    auth: &str,
    server_key: &SecretKey,
    salt: &[u8; SALT_LEN],
) -> Result<Vec<u8>, PushError> {
    if plaintext.len() + RECORD_OVERHEAD > RECORD_SIZE as usize {
        return Err(PushError::Encryption);
    }

    let ua_public_bytes = decode_key(p256dh)?;
    let auth_secret = decode_key(auth)?;
    if auth_secret.len() != AUTH_SECRET_LEN {
        return Err(PushError::InvalidKeys(format!(
            "auth secret must be {AUTH_SECRET_LEN} bytes"
        )));
    }
    let ua_public = PublicKey::from_sec1_bytes(&ua_public_bytes)
        .map_err(|_| PushError::InvalidKeys("p256dh is not a P-256 point".to_string()))?;
    let ua_public_bytes = ua_public.to_encoded_point(false);

    let server_public = server_key.public_key().to_encoded_point(false);
    let shared = p256::ecdh::diffie_hellman(server_key.to_nonzero_scalar(), ua_public.as_affine());

    let (cek, nonce) = content_keys(
        shared.raw_secret_bytes(),
        &auth_secret,
        ua_public_bytes.as_bytes(),
        server_public.as_bytes(),
        salt,
    )?;

    let mut record = Vec::with_capacity(plaintext.len() + 1);
    record.extend_from_slice(plaintext);
    record.push(0x02);

    let cipher = Aes128Gcm::new_from_slice(&cek).map_err(|_| PushError::Encryption)?;
    let ciphertext = cipher
        .encrypt(&Nonce::from(nonce), record.as_slice())
        .map_err(|_| PushError::Encryption)?;

    let mut body = Vec::with_capacity(SALT_LEN + 5 + PUBLIC_KEY_LEN + ciphertext.len());
    body.extend_from_slice(salt);
    body.extend_from_slice(&RECORD_SIZE.to_be_bytes());
    body.push(PUBLIC_KEY_LEN as u8);
    body.extend_from_slice(server_public.as_bytes());
    body.extend_from_slice(&ciphertext);
    Ok(body)
}

/// Derive the content-encryption key and nonce from the ECDH secret.
fn content_keys(
    ecdh_secret: &[u8],
    auth_secret: &[u8],
    ua_public: &[u8],
    server_public: &[u8],
    salt: &[u8],
) -> Result<([u8; 16], [u8; 12]), PushError> {
    let mut key_info = Vec::with_capacity(14 + ua_public.len() + server_public.len());
    key_info.extend_from_slice(b"WebPush: info\0");
    key_info.extend_from_slice(ua_public);
    key_info.extend_from_slice(server_public);

    let mut ikm = [0u8; 32];
    Hkdf::<Sha256>::new(Some(auth_secret), ecdh_secret)
        .expand(&key_info, &mut ikm)
        .map_err(|_| PushError::Encryption)?;

    let prk = Hkdf::<Sha256>::new(Some(salt), &ikm);
    let mut cek = [0u8; 16];
    let mut nonce = [0u8; 12];
    prk.expand(b"Content-Encoding: aes128gcm\0", &mut cek)
        .map_err(|_| PushError::Encryption)?;
    prk.expand(b"Content-Encoding: nonce\0", &mut nonce)
        .map_err(|_| PushError::Encryption)?;
    Ok((cek, nonce))
}

/// Browsers hand out base64url keys, some clients pad or use the standard
/// alphabet.
fn decode_key(value: &str) -> Result<Vec<u8>, PushError> {
    let trimmed = value.trim().trim_end_matches('=');
    URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
        .map_err(|err| PushError::InvalidKeys(err.to_string()))
}
