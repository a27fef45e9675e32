//! Integration tests for the HTTP command transport, driven through the axum
//! router without opening a socket.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use driver_agent::application::command_router::CommandRouter;
use driver_agent::application::executor::AutomationExecutor;
use driver_agent::infrastructure::automation::simulated::{AutomationCall, DeviceHandle, SimulatedDevice};
use driver_agent::infrastructure::network::command_server::{self, TOKEN_HEADER};
use driver_agent::infrastructure::network::stream_server::StreamControl;
use driver_agent::infrastructure::screen_capture::simulated::SimulatedScreen;
use driver_agent::infrastructure::screen_capture::FrameEncoder;
use driver_core::{CommandResponse, DeviceCapabilities};
use tower::util::ServiceExt;

const APP: &str = "com.example.app";

fn app() -> (Router, DeviceHandle) {
    let info = SimulatedDevice::default_info();
    let device = SimulatedDevice::new(info.clone(), &[APP]);
    let handle = device.handle();
    let router = CommandRouter::new(
        Arc::new(DeviceCapabilities::compute(&info, 47000).expect("caps")),
        Box::new(device),
        Arc::new(SimulatedScreen::new(40, 80)),
        FrameEncoder::new(60, 20, 40),
        vec![APP.to_string()],
        StreamControl::new(),
    );
    let (_executor, executor) =
        AutomationExecutor::spawn(router, Some(Duration::from_secs(5))).expect("spawn");
    (command_server::router(executor), handle)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn command(app: &Router, request: Request<Body>) -> (StatusCode, CommandResponse) {
    let (status, bytes) = send(app, request).await;
    let response: CommandResponse = serde_json::from_slice(&bytes).unwrap();
    (status, response)
}

#[tokio::test]
async fn test_driver_start_over_http_returns_token() {
    // Arrange
    let (app, _device) = app();

    // Act
    let (status, response) = command(
        &app,
        Request::builder()
            .method("POST")
            .uri("/driver")
            .header("user-agent", "client-a")
            .body(Body::from("start"))
            .unwrap(),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert!(response.is_success(), "{response:?}");
    assert!(response.field("token").and_then(|t| t.as_str()).is_some());
}

#[tokio::test]
async fn test_token_header_and_user_agent_are_forwarded() {
    // Arrange: client-a owns the device
    let (app, _device) = app();
    let (_, started) = command(
        &app,
        Request::builder()
            .method("POST")
            .uri("/driver")
            .header("user-agent", "client-a")
            .body(Body::from("start"))
            .unwrap(),
    )
    .await;
    let token = started.field("token").and_then(|t| t.as_str()).unwrap().to_string();

    // Act
    let (_, with_token) = command(
        &app,
        Request::builder()
            .method("POST")
            .uri("/app")
            .header(TOKEN_HEADER, &token)
            .body(Body::from("list"))
            .unwrap(),
    )
    .await;
    let (status, without_token) = command(
        &app,
        Request::builder()
            .method("POST")
            .uri("/app")
            .body(Body::from("list"))
            .unwrap(),
    )
    .await;

    // Assert: command failures still travel as HTTP 200
    assert!(with_token.is_success(), "{with_token:?}");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(without_token.status, "-20");
    assert!(without_token.message.contains("client-a"));
}

#[tokio::test]
async fn test_missing_user_agent_records_unknown_owner() {
    let (app, _device) = app();
    command(
        &app,
        Request::builder()
            .method("POST")
            .uri("/driver")
            .body(Body::from("start"))
            .unwrap(),
    )
    .await;

    let (_, rejected) = command(
        &app,
        Request::builder()
            .method("POST")
            .uri("/info")
            .body(Body::from("device"))
            .unwrap(),
    )
    .await;

    assert_eq!(rejected.status, "-20");
    assert!(rejected.message.contains(command_server::UNKNOWN_CLIENT));
}

#[tokio::test]
async fn test_unknown_path_is_404_bad_route() {
    let (app, _device) = app();

    let (status, response) = command(
        &app,
        Request::builder()
            .method("POST")
            .uri("/keyboard")
            .body(Body::from("press"))
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(response.status, "-10");
    assert!(response.message.contains("keyboard"));
}

#[tokio::test]
async fn test_non_utf8_body_is_400() {
    let (app, device) = app();

    let (status, _) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/element")
            .body(Body::from(vec![0xff, 0xfe, 0x00]))
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(device.calls().is_empty());
}

#[tokio::test]
async fn test_crlf_body_reaches_device() {
    // Arrange
    let (app, device) = app();
    command(
        &app,
        Request::builder()
            .method("POST")
            .uri("/app")
            .body(Body::from(format!("start\r\n{APP}\r\n")))
            .unwrap(),
    )
    .await;

    // Act
    let (_, response) = command(
        &app,
        Request::builder()
            .method("POST")
            .uri("/element")
            .body(Body::from("input\r\npixel\r\nhello\r\n"))
            .unwrap(),
    )
    .await;

    // Assert
    assert!(response.is_success(), "{response:?}");
    assert!(device
        .calls()
        .contains(&AutomationCall::TypeText("hello".to_string())));
}

#[tokio::test]
async fn test_get_on_known_route_is_rejected() {
    let (app, _device) = app();

    let (status, _) = send(
        &app,
        Request::builder()
            .method("GET")
            .uri("/driver")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_screenshot_over_http_carries_base64_png() {
    let (app, _device) = app();

    let (_, response) = command(
        &app,
        Request::builder()
            .method("POST")
            .uri("/screenshot")
            .body(Body::from("png"))
            .unwrap(),
    )
    .await;

    assert!(response.is_success(), "{response:?}");
    assert_eq!(response.field("format").and_then(|f| f.as_str()), Some("png"));
    let data = response.field("data").and_then(|d| d.as_str()).unwrap();
    // Base64 of the PNG signature starts with "iVBORw0KGgo".
    assert!(data.starts_with("iVBORw0KGgo"), "{}", &data[..16.min(data.len())]);
}
