//! Account profile lookup after login

use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use super::AuthError;

/// Endpoint that answers with the signed-in user's profile
pub const PROFILE_PATH: &str = "/Seat/Index/searchSeats?LAB_JSON=1";

/// The signed-in account as reported by the library site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub uid: String,
    pub name: Option<String>,
    pub nickname: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProfileEnvelope {
    #[serde(rename = "DATA", default)]
    data: Value,
}

/// Ids show up both as strings and as numbers
fn value_to_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Decode a profile response body
pub fn parse_profile(body: &str) -> Result<UserProfile, AuthError> {
    let envelope: ProfileEnvelope = serde_json::from_str(body)
        .map_err(|e| AuthError::Profile(format!("failed to decode user info json: {e}")))?;

    let uid = value_to_string(envelope.data.get("uid"))
        .ok_or_else(|| AuthError::Profile("user uid not found in response".to_string()))?;

    Ok(UserProfile {
        uid,
        name: value_to_string(envelope.data.get("uname")),
        nickname: value_to_string(envelope.data.get("unickname")),
    })
}

/// Fetch the profile with an already authenticated client
///
/// The endpoint only answers POST, even though nothing is submitted.
pub async fn fetch_profile(client: &Client, library_base_url: &str) -> Result<UserProfile, AuthError> {
    let url = format!("{}{PROFILE_PATH}", library_base_url.trim_end_matches('/'));

    let response = client
        .post(&url)
        .header(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded;charset=UTF-8"),
        )
        .send()
        .await?;

    let status = response.status();
    if status.is_server_error() {
        return Err(AuthError::ServiceUnavailable(format!(
            "profile endpoint returned {status}"
        )));
    }

    let body = response.text().await?;
    parse_profile(&body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_profile_string_uid() {
        let profile =
            parse_profile(r#"{"DATA":{"uid":"123456","uname":"22050101","unickname":"Alice"}}"#)
                .unwrap();
        assert_eq!(profile.uid, "123456");
        assert_eq!(profile.nickname.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_parse_profile_numeric_uid() {
        let profile = parse_profile(r#"{"DATA":{"uid":98765}}"#).unwrap();
        assert_eq!(profile.uid, "98765");
        assert!(profile.name.is_none());
    }

    #[test]
    fn test_parse_profile_missing_uid() {
        let err = parse_profile(r#"{"DATA":{"uid":""}}"#).unwrap_err();
        assert!(err.to_string().contains("uid not found"));

        let err = parse_profile(r#"{"CODE":"error","DATA":[]}"#).unwrap_err();
        assert!(matches!(err, AuthError::Profile(_)));
    }

    #[test]
    fn test_parse_profile_not_json() {
        assert!(parse_profile("<html>login</html>").is_err());
    }
}
