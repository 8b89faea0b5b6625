use std::collections::BTreeMap;

use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, Echo};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(body.to_string())
        .unwrap()
}

// --- echo ---

#[tokio::test]
async fn echo_reports_method_query_and_body() {
    let resp = app()
        .oneshot(request("POST", "/echo?c=2&b=1", "a=1"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "POST");
    assert_eq!(echo.path, "/echo");
    assert_eq!(echo.query.as_deref(), Some("c=2&b=1"));
    assert_eq!(echo.body, "a=1");
}

#[tokio::test]
async fn echo_reports_headers() {
    let req = Request::builder()
        .uri("/echo")
        .header(http::header::USER_AGENT, "agent/1")
        .header("x-custom", "v")
        .body(String::new())
        .unwrap();
    let resp = app().oneshot(req).await.unwrap();

    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.header("user-agent"), Some("agent/1"));
    assert_eq!(echo.header("X-Custom"), Some("v"));
}

#[tokio::test]
async fn echo_accepts_any_method() {
    let resp = app().oneshot(request("DELETE", "/echo", "")).await.unwrap();
    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "DELETE");
}

// --- status ---

#[tokio::test]
async fn status_returns_requested_code() {
    let resp = app().oneshot(request("GET", "/status/418", "")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(&body_bytes(resp).await[..], b"status 418");
}

#[tokio::test]
async fn status_rejects_non_numeric_code() {
    let resp = app().oneshot(request("GET", "/status/abc", "")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- redirect ---

#[tokio::test]
async fn redirect_points_at_echo() {
    let resp = app().oneshot(request("GET", "/redirect", "")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(resp.headers()[http::header::LOCATION], "/echo");
}

// --- cookies ---

#[tokio::test]
async fn set_cookies_emits_one_header_per_pair() {
    let resp = app()
        .oneshot(request("GET", "/cookies/set?a=1&b=2", ""))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let set: Vec<&str> = resp
        .headers()
        .get_all(http::header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap())
        .collect();
    assert_eq!(set, vec!["a=1; Path=/", "b=2; Path=/"]);
}

#[tokio::test]
async fn cookies_lists_request_cookies() {
    let req = Request::builder()
        .uri("/cookies")
        .header(http::header::COOKIE, "a=1; b=2")
        .body(String::new())
        .unwrap();
    let resp = app().oneshot(req).await.unwrap();

    let cookies: BTreeMap<String, String> = body_json(resp).await;
    assert_eq!(cookies.get("a").map(String::as_str), Some("1"));
    assert_eq!(cookies.get("b").map(String::as_str), Some("2"));
}

#[tokio::test]
async fn cookies_empty_without_header() {
    let resp = app().oneshot(request("GET", "/cookies", "")).await.unwrap();
    let cookies: BTreeMap<String, String> = body_json(resp).await;
    assert!(cookies.is_empty());
}

// --- delay ---

#[tokio::test]
async fn delay_completes() {
    let resp = app().oneshot(request("GET", "/delay/10", "")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(&body_bytes(resp).await[..], b"done");
}

// --- compressed ---

#[tokio::test]
async fn compressed_serves_plain_text_unless_deflate_is_accepted() {
    let resp = app().oneshot(request("GET", "/compressed", "")).await.unwrap();
    assert!(resp.headers().get(http::header::CONTENT_ENCODING).is_none());
    assert_eq!(&body_bytes(resp).await[..], mock_server::DEFLATED_TEXT.as_bytes());

    let req = Request::builder()
        .uri("/compressed")
        .header(http::header::ACCEPT_ENCODING, "gzip, deflate")
        .body(String::new())
        .unwrap();
    let resp = app().oneshot(req).await.unwrap();
    assert_eq!(resp.headers()[http::header::CONTENT_ENCODING], "deflate");
    assert_eq!(&body_bytes(resp).await[..], &mock_server::DEFLATED_BODY[..]);
}
