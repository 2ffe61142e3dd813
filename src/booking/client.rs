//! HTTP booking client for the library seat API

use async_trait::async_trait;
use chrono::Utc;
use md5::{Digest, Md5};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, REFERER, USER_AGENT};
use tracing::debug;

use super::response::decode_body;
use super::{AcquisitionClient, AttemptOutcome, BookingRequest};
use crate::config::ClientConfig;
use crate::session::Session;

/// Booking endpoint, relative to the library base URL
pub const BOOK_PATH: &str = "/Seat/Index/bookSeats?LAB_JSON=1";

/// `api-token` header value: hex MD5 of the `api_time` field
pub fn api_token(api_time: &str) -> String {
    let digest = Md5::digest(api_time.as_bytes());
    format!("{digest:x}")
}

/// Form fields of one booking request
pub fn booking_form(request: &BookingRequest, uid: &str, api_time: i64) -> Vec<(&'static str, String)> {
    vec![
        ("beginTime", request.reservation.begin.timestamp().to_string()),
        ("duration", request.reservation.duration.as_secs().to_string()),
        ("seats[0]", request.seat_id.to_string()),
        ("seatBookers[0]", uid.to_string()),
        ("is_recommend", "1".to_string()),
        ("api_time", api_time.to_string()),
    ]
}

/// Acquisition client posting to the seat booking endpoint
#[derive(Debug, Clone)]
pub struct HttpBookingClient {
    book_url: String,
    referer: String,
    user_agent: String,
}

impl HttpBookingClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self::with_base_url(&config.library_base_url, &config.user_agent)
    }

    /// Client against an explicit base URL (used by tests with mock servers)
    pub fn with_base_url(base_url: &str, user_agent: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            book_url: format!("{base}{BOOK_PATH}"),
            referer: format!("{base}/"),
            user_agent: user_agent.to_string(),
        }
    }

    fn build_headers(&self, api_time: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded;charset=UTF-8"),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));

        if let Ok(token) = HeaderValue::from_str(&api_token(api_time)) {
            headers.insert(HeaderName::from_static("api-token"), token);
        }
        if let Ok(ua) = HeaderValue::from_str(&self.user_agent) {
            headers.insert(USER_AGENT, ua);
        }
        if let Ok(referer) = HeaderValue::from_str(&self.referer) {
            headers.insert(REFERER, referer);
        }

        headers
    }
}

#[async_trait]
impl AcquisitionClient for HttpBookingClient {
    async fn attempt(&self, session: &Session, request: &BookingRequest) -> AttemptOutcome {
        let api_time = Utc::now().timestamp();
        let form = booking_form(request, session.uid(), api_time);

        debug!(seat_id = request.seat_id, api_time, "Sending booking request");
        let response = match session
            .client()
            .post(&self.book_url)
            .headers(self.build_headers(&api_time.to_string()))
            .form(&form)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return AttemptOutcome::TransportFailure(e.to_string()),
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return AttemptOutcome::TransportFailure(format!(
                    "failed to read response body: {e}"
                ))
            }
        };

        if status.is_server_error() && body.trim().is_empty() {
            return AttemptOutcome::TransportFailure(format!("server answered {status}"));
        }

        decode_body(&body)
    }
}
