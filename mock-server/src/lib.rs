use std::collections::BTreeMap;
use std::time::Duration;

use axum::{
    extract::{Path, Query},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{AppendHeaders, IntoResponse},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// What the server saw of a request, returned by `/echo`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    /// Header name (lowercase) to every value received, in order.
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: String,
}

impl Echo {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

pub fn app() -> Router {
    Router::new()
        .route("/echo", any(echo))
        .route("/status/{code}", any(status))
        .route("/redirect", get(redirect))
        .route("/cookies", get(list_cookies))
        .route("/cookies/set", get(set_cookies))
        .route("/delay/{millis}", get(delay))
        .route("/compressed", get(compressed))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: String) -> Json<Echo> {
    let mut seen: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in &headers {
        seen.entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    Json(Echo {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers: seen,
        body,
    })
}

async fn status(Path(code): Path<u16>) -> (StatusCode, String) {
    let code = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    (code, format!("status {}", code.as_u16()))
}

async fn redirect() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, "/echo")], "moved")
}

/// Sets one cookie per query pair.
async fn set_cookies(Query(pairs): Query<Vec<(String, String)>>) -> impl IntoResponse {
    let cookies: Vec<(header::HeaderName, String)> = pairs
        .into_iter()
        .map(|(name, value)| (header::SET_COOKIE, format!("{name}={value}; Path=/")))
        .collect();
    (StatusCode::OK, AppendHeaders(cookies), "cookies set")
}

/// Cookies sent with the request, by name.
async fn list_cookies(headers: HeaderMap) -> Json<BTreeMap<String, String>> {
    let cookies = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
    Json(cookies)
}

async fn delay(Path(millis): Path<u64>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(millis)).await;
    "done"
}

/// zlib stream of `DEFLATED_TEXT`.
pub const DEFLATED_BODY: [u8; 21] = [
    120, 156, 203, 72, 205, 201, 201, 87, 72, 73, 77, 203, 73, 44, 73, 5, 0, 35, 12, 5, 10,
];
pub const DEFLATED_TEXT: &str = "hello deflate";

/// Answers with a deflate body only when the client accepts deflate.
async fn compressed(headers: HeaderMap) -> impl IntoResponse {
    let accepts_deflate = headers
        .get_all(header::ACCEPT_ENCODING)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|coding| coding.trim().eq_ignore_ascii_case("deflate"));
    if accepts_deflate {
        ([(header::CONTENT_ENCODING, "deflate")], DEFLATED_BODY.to_vec()).into_response()
    } else {
        DEFLATED_TEXT.into_response()
    }
}
