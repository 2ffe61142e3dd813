//! CAS single sign-on against the campus identity provider
//!
//! The exchange is the usual CAS form dance:
//!
//! 1. GET the login page and collect the hidden form fields (`execution`, `lt`, ...)
//! 2. POST them back together with the username and password
//! 3. follow the ticket redirects to the library site, which sets `PHPSESSID`
//! 4. read the user profile to learn the uid used for bookings
//!
//! Each login builds a fresh [`reqwest::Client`] around its own cookie jar, so
//! redirects always land in the jar of the session being created.

use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use super::profile::fetch_profile;
use super::{AuthError, Session, SessionProvider};
use crate::config::{ClientConfig, Credentials};

/// Cookie issued by the library site once the CAS ticket is accepted
pub const SESSION_COOKIE: &str = "PHPSESSID";

const MAX_REDIRECTS: usize = 10;

/// The CAS login form as served to the browser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    /// Absolute URL the form posts to
    pub action: String,
    /// Hidden inputs to echo back
    pub hidden: Vec<(String, String)>,
    /// Name of the username input
    pub username_field: String,
    /// Name of the password input
    pub password_field: String,
    /// Error banner text shown above the form, if any
    pub error_message: Option<String>,
}

impl LoginForm {
    /// Find the login form in a page; `None` when the page has no password input
    pub fn parse(html: &str, page_url: &Url) -> Option<Self> {
        let doc = Html::parse_document(html);

        let form_selector = Selector::parse("form").ok()?;
        let password_selector = Selector::parse("input[type=password]").ok()?;
        let hidden_selector = Selector::parse("input[type=hidden]").ok()?;
        let text_selector = Selector::parse("input[type=text], input:not([type])").ok()?;

        let form = doc
            .select(&form_selector)
            .find(|form| form.select(&password_selector).next().is_some())?;

        let password_field = form
            .select(&password_selector)
            .next()
            .and_then(|input| input.value().attr("name"))
            .unwrap_or("password")
            .to_string();

        let username_field = form
            .select(&text_selector)
            .filter_map(|input| input.value().attr("name"))
            .next()
            .unwrap_or("username")
            .to_string();

        let hidden = form
            .select(&hidden_selector)
            .filter_map(|input| {
                let name = input.value().attr("name")?;
                let value = input.value().attr("value").unwrap_or_default();
                Some((name.to_string(), value.to_string()))
            })
            .collect();

        let action = form
            .value()
            .attr("action")
            .filter(|a| !a.trim().is_empty())
            .and_then(|a| page_url.join(a).ok())
            .unwrap_or_else(|| page_url.clone())
            .to_string();

        let error_message = Selector::parse("#errormsg, #msg, .error, .errors, .alert-danger")
            .ok()
            .and_then(|sel| doc.select(&sel).next())
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|text| !text.is_empty());

        Some(Self {
            action,
            hidden,
            username_field,
            password_field,
            error_message,
        })
    }

    /// Form fields for a submission with the given credentials
    pub fn fields(&self, credentials: &Credentials) -> Vec<(String, String)> {
        let mut fields = self.hidden.clone();
        fields.push((self.username_field.clone(), credentials.school_id.clone()));
        fields.push((self.password_field.clone(), credentials.password.clone()));
        if !fields.iter().any(|(name, _)| name == "_eventId") {
            fields.push(("_eventId".to_string(), "submit".to_string()));
        }
        fields
    }
}

/// Session provider speaking CAS to the campus SSO
#[derive(Debug, Clone)]
pub struct CasSessionProvider {
    config: ClientConfig,
}

impl CasSessionProvider {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    fn build_client(&self, jar: Arc<Jar>) -> Result<Client, AuthError> {
        Ok(Client::builder()
            .cookie_provider(jar)
            .timeout(self.config.request_timeout())
            .user_agent(self.config.user_agent.clone())
            .redirect(Policy::limited(MAX_REDIRECTS))
            .gzip(true)
            .build()?)
    }

    fn login_url(&self) -> Result<Url, AuthError> {
        Url::parse(&self.config.sso_login_url).map_err(|e| {
            AuthError::ServiceUnavailable(format!(
                "invalid SSO login URL '{}': {e}",
                self.config.sso_login_url
            ))
        })
    }

    fn library_url(&self) -> Result<Url, AuthError> {
        Url::parse(&self.config.library_base_url).map_err(|e| {
            AuthError::ServiceUnavailable(format!(
                "invalid library URL '{}': {e}",
                self.config.library_base_url
            ))
        })
    }
}

/// Map a non-success status from the identity provider
fn status_error(status: StatusCode, stage: &str) -> Option<AuthError> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Some(AuthError::InvalidCredentials(format!(
            "{stage} answered {status}"
        )))
    } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Some(AuthError::ServiceUnavailable(format!(
            "{stage} answered {status}"
        )))
    } else if !status.is_success() {
        Some(AuthError::ServiceUnavailable(format!(
            "{stage} answered unexpected {status}"
        )))
    } else {
        None
    }
}

/// Pull one cookie value out of a jar for `url`
fn cookie_value(jar: &Jar, url: &Url, name: &str) -> Option<String> {
    let header = jar.cookies(url)?;
    let header = header.to_str().ok()?;
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

#[async_trait]
impl SessionProvider for CasSessionProvider {
    async fn login(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let login_url = self.login_url()?;
        let library_url = self.library_url()?;

        let jar = Arc::new(Jar::default());
        let client = self.build_client(Arc::clone(&jar))?;

        debug!(url = %login_url, "Fetching SSO login form");
        let page = client.get(login_url.clone()).send().await?;
        if let Some(err) = status_error(page.status(), "login page") {
            return Err(err);
        }
        let page_url = page.url().clone();
        let html = page.text().await?;

        let form = LoginForm::parse(&html, &page_url).ok_or_else(|| {
            AuthError::ServiceUnavailable("login form not found on SSO page".to_string())
        })?;

        debug!(action = %form.action, hidden_fields = form.hidden.len(), "Submitting SSO login form");
        let response = client
            .post(&form.action)
            .form(&form.fields(credentials))
            .send()
            .await?;
        if let Some(err) = status_error(response.status(), "login submission") {
            return Err(err);
        }
        let landed_on = response.url().clone();
        let body = response.text().await?;

        // Landing on a page that still asks for a password means the SSO refused us.
        if let Some(again) = LoginForm::parse(&body, &landed_on) {
            let reason = again
                .error_message
                .unwrap_or_else(|| "login form returned again".to_string());
            return Err(AuthError::InvalidCredentials(reason));
        }

        let session_id = cookie_value(&jar, &library_url, SESSION_COOKIE)
            .ok_or_else(|| AuthError::SessionMissing(SESSION_COOKIE.to_string()))?;

        let profile = fetch_profile(&client, &self.config.library_base_url).await?;
        info!(
            school_id = %credentials.school_id,
            uid = %profile.uid,
            "SSO login succeeded"
        );

        let mut session = Session::new(client, profile.uid).with_session_id(session_id);
        if let Some(name) = profile.nickname.or(profile.name) {
            session = session.with_display_name(name);
        }
        Ok(session)
    }
}
