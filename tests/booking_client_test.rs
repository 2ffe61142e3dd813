//! Integration tests for HttpBookingClient using wiremock

use chrono::{Local, TimeZone};
use seat_killer::booking::{
    AcquisitionClient, AttemptOutcome, BookingRequest, HttpBookingClient, Reservation,
};
use seat_killer::session::Session;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BOOK_PATH: &str = "/Seat/Index/bookSeats";

fn request() -> BookingRequest {
    BookingRequest {
        seat_id: 14601,
        reservation: Reservation::new(
            Local.with_ymd_and_hms(2026, 3, 4, 8, 0, 0).unwrap(),
            Duration::from_secs(10 * 3600),
        ),
    }
}

fn session() -> Session {
    Session::new(reqwest::Client::new(), "777")
}

async fn attempt_against(mock_server: &MockServer) -> AttemptOutcome {
    let client = HttpBookingClient::with_base_url(&mock_server.uri(), "seat-killer-test");
    client.attempt(&session(), &request()).await
}

/// Test an accepted booking and the request shape
#[tokio::test]
async fn test_booking_accepted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(BOOK_PATH))
        .and(header_exists("api-token"))
        .and(header("user-agent", "seat-killer-test"))
        .and(body_string_contains("seats%5B0%5D=14601"))
        .and(body_string_contains("seatBookers%5B0%5D=777"))
        .and(body_string_contains("duration=36000"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"CODE":"ok","MESSAGE":"预约成功","DATA":{"bookingId":"B-9001"}}"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    let outcome = attempt_against(&mock_server).await;
    assert_eq!(
        outcome,
        AttemptOutcome::Success {
            confirmation: "B-9001".to_string()
        }
    );
}

/// Test a well-formed refusal
#[tokio::test]
async fn test_booking_rejected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(BOOK_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"CODE":"error","MESSAGE":"该座位已被预约","DATA":[]}"#),
        )
        .mount(&mock_server)
        .await;

    match attempt_against(&mock_server).await {
        AttemptOutcome::ServerRejected { code, message } => {
            assert_eq!(code, "error");
            assert_eq!(message, "该座位已被预约");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

/// Test that a gateway error page is reported as malformed
#[tokio::test]
async fn test_html_error_page_is_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(BOOK_PATH))
        .respond_with(
            ResponseTemplate::new(502)
                .set_body_string("<html><body><h1>502 Bad Gateway</h1></body></html>"),
        )
        .mount(&mock_server)
        .await;

    assert!(matches!(
        attempt_against(&mock_server).await,
        AttemptOutcome::MalformedResponse(_)
    ));
}

/// Test that an empty server error is a transport failure
#[tokio::test]
async fn test_empty_server_error_is_transport_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(BOOK_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    assert!(matches!(
        attempt_against(&mock_server).await,
        AttemptOutcome::TransportFailure(_)
    ));
}

/// Test that an unreachable server is a transport failure
#[tokio::test]
async fn test_connection_refused_is_transport_failure() {
    // Reserve a free port, then release it so nothing is listening there
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = HttpBookingClient::with_base_url(&format!("http://127.0.0.1:{port}"), "seat-killer-test");
    let outcome = client.attempt(&session(), &request()).await;
    assert!(matches!(outcome, AttemptOutcome::TransportFailure(_)));
}
