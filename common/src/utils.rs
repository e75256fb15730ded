// common/src/utils.rs
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Setup tracing for consistent logging across crates
///
/// `RUST_LOG` overrides the default INFO level.
pub fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("tracing subscriber already installed: {}", e);
    }
}

/// Generate a random alphanumeric token of specified length
pub fn generate_secure_token(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// One-time token binding a login attempt to its eventual callback message
pub fn generate_correlation_token() -> String {
    generate_secure_token(32)
}

/// Hash a string using SHA-256
pub fn hash_string(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();
    format!("{:x}", result)
}

/// Short stable fingerprint for values that must not appear in logs (phone numbers)
pub fn fingerprint(input: &str) -> String {
    let mut hash = hash_string(input);
    hash.truncate(12);
    hash
}
