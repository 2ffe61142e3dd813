//! Authenticated sessions
//!
//! A [`SessionProvider`] turns credentials into a [`Session`]: a cookie-bearing
//! HTTP client plus the account uid the booking API expects. Every login builds
//! its own client and cookie jar, so repeated or concurrent runs never share
//! state.

pub mod cas;
pub mod profile;

pub use cas::CasSessionProvider;
pub use profile::UserProfile;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

use crate::config::Credentials;
use crate::error::{ErrorCategory, SeatErrorTrait};
use crate::utils::retry::Classified;

/// Errors raised while establishing a session
#[derive(Error, Debug)]
pub enum AuthError {
    /// The identity provider rejected the credentials
    #[error("credentials rejected: {0}")]
    InvalidCredentials(String),

    /// The identity provider or the library site could not serve the request
    #[error("login service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Login went through but no session cookie was issued
    #[error("session cookie {0} not found after login")]
    SessionMissing(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The user profile could not be read after login
    #[error("user profile unavailable: {0}")]
    Profile(String),
}

impl SeatErrorTrait for AuthError {
    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidCredentials(_))
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Http(_) => ErrorCategory::Network,
            _ => ErrorCategory::Auth,
        }
    }
}

impl AuthError {
    /// Wrong credentials are never retried, everything else may be transient
    pub fn classify(self) -> Classified<Self> {
        Classified::by_recoverability(self)
    }
}

/// An authenticated client handle
#[derive(Debug, Clone)]
pub struct Session {
    client: Client,
    uid: String,
    display_name: Option<String>,
    session_id: Option<String>,
}

impl Session {
    pub fn new(client: Client, uid: impl Into<String>) -> Self {
        Self {
            client,
            uid: uid.into(),
            display_name: None,
            session_id: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    /// Client carrying the session cookies
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Account uid used as the booker
    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }
}

/// Produces authenticated sessions from credentials
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Run the full sign-on exchange and return a usable session
    async fn login(&self, credentials: &Credentials) -> Result<Session, AuthError>;

    /// Confirm the credentials work, discarding the session
    async fn validate(&self, credentials: &Credentials) -> Result<(), AuthError> {
        self.login(credentials).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_auth_errors() {
        assert!(AuthError::InvalidCredentials("wrong password".into())
            .classify()
            .is_fatal());
        assert!(!AuthError::ServiceUnavailable("502".into())
            .classify()
            .is_fatal());
        assert!(!AuthError::SessionMissing("PHPSESSID".into())
            .classify()
            .is_fatal());
    }

    #[test]
    fn test_session_accessors() {
        let session = Session::new(Client::new(), "10086")
            .with_display_name("Alice")
            .with_session_id("abc");
        assert_eq!(session.uid(), "10086");
        assert_eq!(session.display_name(), Some("Alice"));
        assert_eq!(session.session_id(), Some("abc"));
    }

    struct CountingProvider(std::sync::atomic::AtomicU32);

    #[async_trait]
    impl SessionProvider for CountingProvider {
        async fn login(&self, _credentials: &Credentials) -> Result<Session, AuthError> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(Session::new(Client::new(), "1"))
        }
    }

    #[tokio::test]
    async fn test_validate_defaults_to_login() {
        let provider = CountingProvider(std::sync::atomic::AtomicU32::new(0));
        provider
            .validate(&Credentials::new("id", "pw"))
            .await
            .unwrap();
        assert_eq!(provider.0.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
