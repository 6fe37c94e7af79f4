//! Shared utilities for the drillsmith codebase

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use sha2::{Digest, Sha256};

/// A string wrapper that masks its contents in Debug/Display output.
/// Prevents accidental logging of API keys and other secrets.
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Intentionally access the raw secret value (for headers, URLs, etc.)
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<&str> for SecretString {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Hex-encoded sha-256 of arbitrary text. Used to detect retries that return
/// byte-identical LLM output.
pub fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Truncate `text` to at most `max_bytes`, backing up to a char boundary.
/// Judge stdout/stderr snippets are bounded before they travel upward.
pub fn truncate_bytes(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…[truncated]", &text[..end])
}

/// Per-run context: the caller-assigned activity id, a seedable id source,
/// and the cancellation flag checked at every suspension point.
///
/// All randomness in the pipeline flows through here so tests can seed it and
/// get byte-identical output.
pub struct RunContext {
    activity_id: String,
    rng: Mutex<StdRng>,
    cancelled: AtomicBool,
}

impl RunContext {
    pub fn new(activity_id: impl Into<String>) -> Self {
        Self {
            activity_id: activity_id.into(),
            rng: Mutex::new(
                StdRng::try_from_rng(&mut rand::rngs::SysRng)
                    .expect("unexpected failure from SysRng"),
            ),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Deterministic context for tests and reproducible runs.
    pub fn seeded(activity_id: impl Into<String>, seed: u64) -> Self {
        Self {
            activity_id: activity_id.into(),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn activity_id(&self) -> &str {
        &self.activity_id
    }

    /// Mint an opaque id like `prob-1a2b3c4d`.
    pub fn next_id(&self, prefix: &str) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        format!("{}-{:08x}", prefix, rng.random::<u32>())
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_string_hides_in_debug_and_display() {
        let secret = SecretString::new("sk-live-abc123".to_string());
        assert_eq!(format!("{:?}", secret), "***");
        assert_eq!(format!("{}", secret), "***");
        assert_eq!(secret.expose(), "sk-live-abc123");
    }

    #[test]
    fn test_secret_string_partial_eq() {
        let secret: SecretString = "key".to_string().into();
        assert!(secret == "key");
    }

    #[test]
    fn test_sha256_hex_is_stable() {
        let a = sha256_hex("hello");
        let b = sha256_hex("hello");
        let c = sha256_hex("hello ");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_truncate_bytes_short_input_untouched() {
        assert_eq!(truncate_bytes("abc", 10), "abc");
    }

    #[test]
    fn test_truncate_bytes_respects_char_boundary() {
        // 'é' is two bytes; cutting mid-char must back up
        let out = truncate_bytes("équation", 1);
        assert!(out.ends_with("…[truncated]"));
    }

    #[test]
    fn test_seeded_context_is_reproducible() {
        let a = RunContext::seeded("act-1", 42);
        let b = RunContext::seeded("act-1", 42);
        assert_eq!(a.next_id("prob"), b.next_id("prob"));
        assert_eq!(a.next_id("prob"), b.next_id("prob"));
    }

    #[test]
    fn test_cancellation_flag() {
        let ctx = RunContext::seeded("act-1", 1);
        assert!(!ctx.is_cancelled());
        ctx.cancel();
        assert!(ctx.is_cancelled());
    }
}
