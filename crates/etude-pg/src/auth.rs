//! SCRAM-SHA-256 authentication for PostgreSQL (RFC 5802 / RFC 7677).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{PgError, PgResult};

type HmacSha256 = Hmac<Sha256>;

/// SASL mechanism name sent in SASLInitialResponse.
pub const MECHANISM: &str = "SCRAM-SHA-256";

/// SCRAM-SHA-256 client state machine.
pub struct ScramClient {
    username: String,
    password: String,
    nonce: String,
    client_first_bare: String,
    auth_message: String,
    salted_password: [u8; 32],
}

impl ScramClient {
    pub fn new(username: &str, password: &str) -> Self {
        let mut buf = [0u8; 18];
        rand::thread_rng().fill_bytes(&mut buf);
        Self::with_nonce(username, password, &STANDARD.encode(buf))
    }

    /// Create a client with a fixed nonce.
    pub fn with_nonce(username: &str, password: &str, nonce: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            nonce: nonce.to_string(),
            client_first_bare: String::new(),
            auth_message: String::new(),
            salted_password: [0u8; 32],
        }
    }

    /// Build the client-first-message to send in SASLInitialResponse.
    pub fn client_first_message(&mut self) -> Vec<u8> {
        self.client_first_bare = format!("n={},r={}", escape_saslname(&self.username), self.nonce);
        format!("n,,{}", self.client_first_bare).into_bytes()
    }

    /// Process the server-first-message and produce the client-final-message.
    pub fn process_server_first(&mut self, server_first: &[u8]) -> PgResult<Vec<u8>> {
        let server_first = std::str::from_utf8(server_first)
            .map_err(|_| auth_error("Invalid UTF-8 in server-first-message"))?;

        let mut server_nonce = None;
        let mut salt = None;
        let mut iterations = None;
        for part in server_first.split(',') {
            if let Some(val) = part.strip_prefix("r=") {
                server_nonce = Some(val);
            } else if let Some(val) = part.strip_prefix("s=") {
                salt = Some(
                    STANDARD
                        .decode(val)
                        .map_err(|_| auth_error("Invalid salt encoding"))?,
                );
            } else if let Some(val) = part.strip_prefix("i=") {
                iterations = Some(
                    val.parse::<u32>()
                        .map_err(|_| auth_error("Invalid iteration count"))?,
                );
            }
        }

        let server_nonce = server_nonce.ok_or_else(|| auth_error("Missing server nonce"))?;
        let salt = salt.ok_or_else(|| auth_error("Missing salt"))?;
        let iterations = iterations
            .filter(|&i| i > 0)
            .ok_or_else(|| auth_error("Missing iteration count"))?;

        if !server_nonce.starts_with(&self.nonce) {
            return Err(auth_error("Server nonce doesn't start with client nonce"));
        }

        self.salted_password = hi(self.password.as_bytes(), &salt, iterations)?;

        // "biws" is base64("n,,"): no channel binding.
        let client_final_without_proof = format!("c=biws,r={}", server_nonce);
        self.auth_message = format!(
            "{},{},{}",
            self.client_first_bare, server_first, client_final_without_proof
        );

        let client_key = hmac_sha256(&self.salted_password, b"Client Key")?;
        let stored_key = to_array(&Sha256::digest(client_key));
        let client_signature = hmac_sha256(&stored_key, self.auth_message.as_bytes())?;

        let mut client_proof = [0u8; 32];
        for (i, byte) in client_proof.iter_mut().enumerate() {
            *byte = client_key[i] ^ client_signature[i];
        }

        log::trace!("SCRAM: sending client-final-message");
        Ok(format!(
            "{},p={}",
            client_final_without_proof,
            STANDARD.encode(client_proof)
        )
        .into_bytes())
    }

    /// Verify the server-final-message.
    pub fn verify_server_final(&self, server_final: &[u8]) -> PgResult<()> {
        let server_final = std::str::from_utf8(server_final)
            .map_err(|_| auth_error("Invalid UTF-8 in server-final"))?;
        if let Some(err) = server_final.strip_prefix("e=") {
            return Err(PgError::Auth(format!("Server rejected SCRAM exchange: {}", err)));
        }

        let verifier = server_final
            .split(',')
            .find_map(|part| part.strip_prefix("v="))
            .ok_or_else(|| auth_error("Missing v= in server-final"))?;
        let received = STANDARD
            .decode(verifier)
            .map_err(|_| auth_error("Invalid server signature encoding"))?;

        let server_key = hmac_sha256(&self.salted_password, b"Server Key")?;
        let mut mac = new_mac(&server_key)?;
        mac.update(self.auth_message.as_bytes());
        mac.verify_slice(&received)
            .map_err(|_| auth_error("Server signature mismatch"))
    }
}

fn auth_error(msg: &str) -> PgError {
    PgError::Auth(msg.to_string())
}

/// `=` and `,` must be escaped in a SCRAM username.
fn escape_saslname(name: &str) -> String {
    name.replace('=', "=3D").replace(',', "=2C")
}

fn new_mac(key: &[u8]) -> PgResult<HmacSha256> {
    <HmacSha256 as Mac>::new_from_slice(key).map_err(|_| auth_error("Invalid HMAC key"))
}

fn hmac_sha256(key: &[u8], message: &[u8]) -> PgResult<[u8; 32]> {
    let mut mac = new_mac(key)?;
    mac.update(message);
    Ok(to_array(&mac.finalize().into_bytes()))
}

fn to_array(digest: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(digest);
    out
}

/// PBKDF2-HMAC-SHA256 with a single output block (Hi in RFC 5802).
fn hi(password: &[u8], salt: &[u8], iterations: u32) -> PgResult<[u8; 32]> {
    let mut salt_1 = salt.to_vec();
    salt_1.extend_from_slice(&1u32.to_be_bytes());

    let mut u = hmac_sha256(password, &salt_1)?;
    let mut result = u;
    for _ in 1..iterations {
        u = hmac_sha256(password, &u)?;
        for (r, b) in result.iter_mut().zip(u) {
            *r ^= b;
        }
    }
    Ok(result)
}
