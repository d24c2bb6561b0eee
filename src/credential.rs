//! Run-as credentials for launching a process under another identity.

use std::fmt;

/// A mutable secret buffer.
///
/// The bytes are zeroed on clear and on drop, and `Debug` never prints them.
/// This is the narrow secret-storage primitive the engine consumes; it holds
/// the run-as password between `set_password` and launch.
#[derive(Default)]
pub struct Secret {
    bytes: Vec<u8>,
}

impl Secret {
    /// Create an empty secret.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the secret contents.
    ///
    /// An empty input clears any existing secret. The previous contents are
    /// zeroed before being released either way.
    pub fn set(&mut self, value: &str) {
        self.clear();
        self.bytes.extend_from_slice(value.as_bytes());
    }

    /// Zero and discard the secret contents.
    pub fn clear(&mut self) {
        for b in self.bytes.iter_mut() {
            // volatile write so the zeroing is not optimized away
            unsafe { std::ptr::write_volatile(b, 0) };
        }
        self.bytes.clear();
    }

    /// True when a non-empty secret is held.
    pub fn is_set(&self) -> bool {
        !self.bytes.is_empty()
    }

    /// Expose the secret for launch-parameter construction.
    ///
    /// Callers must not copy the value into longer-lived storage.
    pub fn expose(&self) -> &[u8] {
        &self.bytes
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_set() {
            write!(f, "Secret(***)")
        } else {
            write!(f, "Secret(unset)")
        }
    }
}

/// Optional run-as username/domain/password for process launch.
///
/// Credentials are applied to the launch parameters only when username,
/// domain, and a non-empty secret are all present simultaneously; otherwise
/// the process launches under the caller's own identity.
#[derive(Debug, Default)]
pub struct Credentials {
    username: Option<String>,
    domain: Option<String>,
    secret: Secret,
}

impl Credentials {
    /// Create empty credentials.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or clear the run-as username. Empty clears.
    pub fn set_username(&mut self, username: &str) {
        self.username = if username.is_empty() {
            None
        } else {
            Some(username.to_string())
        };
    }

    /// Set or clear the run-as domain. Empty clears.
    pub fn set_domain(&mut self, domain: &str) {
        self.domain = if domain.is_empty() {
            None
        } else {
            Some(domain.to_string())
        };
    }

    /// Set or clear the password.
    ///
    /// An empty string clears any existing secret and succeeds even when no
    /// secret was previously set.
    pub fn set_password(&mut self, password: &str) {
        if password.is_empty() {
            self.secret.clear();
        } else {
            self.secret.set(password);
        }
    }

    /// The run-as username, if set.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// The run-as domain, if set.
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    /// True when username, domain, and a non-empty secret are all present.
    pub fn is_complete(&self) -> bool {
        self.username.is_some() && self.domain.is_some() && self.secret.is_set()
    }

    /// Clear all three fields, zeroing the secret.
    pub fn clear(&mut self) {
        self.username = None;
        self.domain = None;
        self.secret.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_set_and_clear() {
        let mut secret = Secret::new();
        assert!(!secret.is_set());
        secret.set("hunter2");
        assert!(secret.is_set());
        assert_eq!(secret.expose(), b"hunter2");
        secret.clear();
        assert!(!secret.is_set());
        assert!(secret.expose().is_empty());
    }

    #[test]
    fn test_secret_debug_redacts() {
        let mut secret = Secret::new();
        secret.set("topsecret");
        let rendered = format!("{:?}", secret);
        assert!(!rendered.contains("topsecret"));
    }

    #[test]
    fn test_empty_password_clears() {
        let mut creds = Credentials::new();
        creds.set_password("pw");
        creds.set_password("");
        assert!(!creds.is_complete());
    }

    #[test]
    fn test_clear_with_no_prior_secret_is_fine() {
        let mut creds = Credentials::new();
        creds.set_password("");
        assert!(!creds.is_complete());
    }

    #[test]
    fn test_complete_requires_all_three() {
        let mut creds = Credentials::new();
        creds.set_username("svc-runner");
        assert!(!creds.is_complete());
        creds.set_domain("lab");
        assert!(!creds.is_complete());
        creds.set_password("pw");
        assert!(creds.is_complete());

        creds.set_username("");
        assert!(!creds.is_complete());
    }
}
