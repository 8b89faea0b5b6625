//! The configurable blocking HTTP client.
//!
//! # Design
//! `FetchClient` owns an option store, a header store, cookie bookkeeping
//! and at most one transport handle. `get` / `post` / `put` only rewrite
//! the method options and then call `execute`, which is the single place a
//! request leaves the process. `prepare` turns the stores into a plain
//! `HttpRequest` without I/O, so request building can be checked without a
//! server.
//!
//! Failures below HTTP do not make `execute` return `Err`. They are recorded
//! and read back through `error`, `status_code` and `transfer_info`, the way
//! a caller inspects a finished transfer. Misuse (no URL, bad header line)
//! is an `Err` raised before the handle is touched.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use url::Url;
use uuid::Uuid;

use crate::config::{ClientConfig, HandlePolicy};
use crate::cookie::{CookieJar, CookieManager};
use crate::error::{ClientError, Result};
use crate::headers::{split_line, HeaderEntry, HeaderStore};
use crate::http::{encode_form, encode_multipart, merge_query, HttpMethod, HttpRequest, HttpResponse, Payload};
use crate::info::TransferInfo;
use crate::options::{OptionKey, OptionStore, RequestOption};
use crate::transport::{TransportHandle, TransportSettings};

/// Blocking HTTP client with mutable options, headers and cookie state.
///
/// One instance performs one request at a time; every mutating call takes
/// `&mut self`. The transport handle is released when the client is
/// dropped.
#[derive(Debug)]
pub struct FetchClient {
    config: ClientConfig,
    options: OptionStore,
    headers: HeaderStore,
    cookies: CookieManager,
    handle: Option<TransportHandle>,
    response: Option<Vec<u8>>,
    info: Option<TransferInfo>,
}

impl Default for FetchClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchClient {
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        let mut options = OptionStore::new();
        options.set_all(config.initial_options());
        let mut headers = HeaderStore::new();
        headers.set_all(config.default_headers.iter().cloned(), true);
        Self {
            config,
            options,
            headers,
            cookies: CookieManager::new(),
            handle: None,
            response: None,
            info: None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Options
    // ------------------------------------------------------------------

    pub fn set_option(&mut self, option: RequestOption) {
        self.options.set(option);
    }

    pub fn set_options<I: IntoIterator<Item = RequestOption>>(&mut self, options: I) {
        self.options.set_all(options);
    }

    pub fn get_option(&self, key: OptionKey) -> Result<&RequestOption> {
        self.options.get(key)
    }

    pub fn all_options(&self) -> &OptionStore {
        &self.options
    }

    pub fn unset_option(&mut self, key: OptionKey) {
        self.options.unset(key);
    }

    pub fn unset_options(&mut self, keys: &[OptionKey]) {
        self.options.unset_all(keys);
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.options.set(RequestOption::Url(url.into()));
    }

    pub fn url(&self) -> Option<&str> {
        self.options.text(OptionKey::Url)
    }

    pub fn set_user_agent(&mut self, user_agent: impl Into<String>) {
        self.options.set(RequestOption::UserAgent(user_agent.into()));
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.options.text(OptionKey::UserAgent)
    }

    pub fn set_referer(&mut self, referer: impl Into<String>) {
        self.options.set(RequestOption::Referer(referer.into()));
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.options.set(RequestOption::Timeout(timeout));
    }

    pub fn set_connect_timeout(&mut self, timeout: Duration) {
        self.options.set(RequestOption::ConnectTimeout(timeout));
    }

    /// Set the total and the connect timeout to the same value.
    pub fn set_timeouts(&mut self, timeout: Duration) {
        self.set_timeout(timeout);
        self.set_connect_timeout(timeout);
    }

    /// Advertise `encoding` in `Accept-Encoding`. The transport decodes
    /// gzip only; other codings are returned as received.
    pub fn set_encoding(&mut self, encoding: impl Into<String>) {
        self.options.set(RequestOption::Encoding(encoding.into()));
    }

    pub fn verbose_on(&mut self) {
        self.options.set(RequestOption::Verbose(true));
    }

    pub fn verbose_off(&mut self) {
        self.options.set(RequestOption::Verbose(false));
    }

    /// Capture outgoing headers for `request_headers`.
    pub fn request_header_on(&mut self) {
        self.options.set(RequestOption::HeaderOut(true));
    }

    pub fn request_header_off(&mut self) {
        self.options.set(RequestOption::HeaderOut(false));
    }

    /// Prepend the response status line and headers to the returned body.
    ///
    /// Redirects are followed inside the transport, so only the final
    /// response's head is included.
    pub fn response_header_on(&mut self) {
        self.options.set(RequestOption::IncludeResponseHeader(true));
    }

    pub fn response_header_off(&mut self) {
        self.options.set(RequestOption::IncludeResponseHeader(false));
    }

    pub fn ssl_verify_off(&mut self) {
        self.ssl_verify_host_off();
        self.ssl_verify_peer_off();
    }

    pub fn ssl_verify_host_off(&mut self) {
        self.options.set(RequestOption::SslVerifyHost(false));
    }

    pub fn ssl_verify_peer_off(&mut self) {
        self.options.set(RequestOption::SslVerifyPeer(false));
    }

    pub fn follow_location_on(&mut self) {
        self.options.set(RequestOption::FollowLocation(true));
    }

    pub fn follow_location_off(&mut self) {
        self.options.set(RequestOption::FollowLocation(false));
    }

    // ------------------------------------------------------------------
    // Headers
    // ------------------------------------------------------------------

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.set(name, value);
    }

    /// Add a pre-formatted header line that is sent verbatim.
    pub fn push_raw_header(&mut self, line: impl Into<String>) {
        self.headers.push_literal(line);
    }

    pub fn set_headers<I>(&mut self, headers: I, replace: bool)
    where
        I: IntoIterator,
        I::Item: Into<HeaderEntry>,
    {
        self.headers.set_all(headers, replace);
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.headers.set("Content-Type", content_type);
    }

    pub fn headers(&self) -> &HeaderStore {
        &self.headers
    }

    // ------------------------------------------------------------------
    // Cookies
    // ------------------------------------------------------------------

    /// Assign the cookie file; it must already exist.
    pub fn assign_cookie_path(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        self.cookies.assign_path(path, &mut self.options)
    }

    pub fn cookie_path(&self) -> Option<&Path> {
        self.cookies.path()
    }

    pub fn enable_cookie(&mut self) -> Result<()> {
        self.cookies.enable(&mut self.options)
    }

    pub fn disable_cookie(&mut self) {
        self.cookies.disable(&mut self.options);
    }

    pub fn cleanup_cookie(&self) -> Result<()> {
        self.cookies.cleanup()
    }

    // ------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------

    /// GET `url`, with `params` placed in front of any query it already has.
    pub fn get(&mut self, url: &str, params: &[(&str, &str)]) -> Result<String> {
        self.options.unset_all(&OptionKey::METHOD);
        self.set_url(merge_query(url, params));
        self.options.set(RequestOption::HttpGet(true));
        self.execute()
    }

    pub fn post(&mut self, url: &str, payload: impl Into<Payload>) -> Result<String> {
        self.options.unset_all(&OptionKey::METHOD);
        self.options.set(RequestOption::Post(true));
        self.options.set(RequestOption::PostFields(payload.into()));
        self.set_url(url);
        self.execute()
    }

    pub fn put(&mut self, url: &str, payload: impl Into<Payload>) -> Result<String> {
        self.options.unset_all(&OptionKey::METHOD);
        self.options.set(RequestOption::PostFields(payload.into()));
        self.options.set(RequestOption::CustomRequest("PUT".to_string()));
        self.set_url(url);
        self.execute()
    }

    /// Build the request the current options and headers describe.
    pub fn prepare(&self) -> Result<HttpRequest> {
        let url = match self.url() {
            Some(url) if !url.trim().is_empty() => url.to_string(),
            _ => return Err(ClientError::precondition("no URL set")),
        };

        let method = match self.options.text(OptionKey::CustomRequest) {
            Some(name) => {
                ureq::http::Method::from_bytes(name.as_bytes())
                    .map_err(|_| ClientError::invalid(format!("invalid request method {name:?}")))?;
                HttpMethod::from_name(name)
            }
            None if self.options.flag(OptionKey::Post) => HttpMethod::Post,
            None => HttpMethod::Get,
        };

        let mut headers = self.headers.serialize();
        for line in &headers {
            split_line(line)?;
        }
        let mut add_default = |name: &str, value: &str| {
            if !self.headers.contains(name) {
                headers.push(format!("{name}: {value}"));
            }
        };
        if let Some(user_agent) = self.options.text(OptionKey::UserAgent) {
            add_default("User-Agent", user_agent);
        }
        if let Some(referer) = self.options.text(OptionKey::Referer) {
            add_default("Referer", referer);
        }
        if let Some(encoding) = self.options.text(OptionKey::Encoding) {
            if !encoding.is_empty() {
                add_default("Accept-Encoding", encoding);
            }
        }

        let body = match (&method, self.options.payload()) {
            (HttpMethod::Get, _) | (_, None) => None,
            (_, Some(payload)) => {
                let (content_type, bytes) = self.encode_payload(payload);
                if let Some(content_type) = content_type {
                    add_default("Content-Type", &content_type);
                }
                Some(bytes)
            }
        };

        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
        })
    }

    fn encode_payload(&self, payload: &Payload) -> (Option<String>, Vec<u8>) {
        match payload {
            Payload::Raw(body) => (None, body.clone().into_bytes()),
            Payload::Form(fields) if self.config.encode_payload => (
                Some("application/x-www-form-urlencoded".to_string()),
                encode_form(fields).into_bytes(),
            ),
            Payload::Form(fields) => {
                let boundary = format!("------------------------{}", Uuid::new_v4().simple());
                let (content_type, body) = encode_multipart(fields, &boundary);
                (Some(content_type), body)
            }
        }
    }

    /// Perform the configured request and return the response body.
    ///
    /// A transport failure yields an empty body; check `error` or
    /// `check_transport` afterwards.
    pub fn execute(&mut self) -> Result<String> {
        let mut request = self.prepare()?;
        let parsed_url = Url::parse(&request.url).ok();
        let now = chrono::Utc::now().timestamp();

        if let (Some(path), Some(url)) = (self.options.path(OptionKey::CookieFile), &parsed_url) {
            if let Some(cookie) = CookieJar::load(path).header_for(url, now) {
                request.headers.push(format!("Cookie: {cookie}"));
            }
        }

        let verbose = self.options.flag(OptionKey::Verbose);
        if verbose {
            tracing::debug!(target: "fetch_core::wire", "> {} {}", request.method, request.url);
            for line in &request.headers {
                tracing::debug!(target: "fetch_core::wire", "> {line}");
            }
        }

        let settings = TransportSettings::from_options(&self.options);
        let handle = self.transport(settings);
        tracing::info!(handle = handle.id(), method = %request.method, url = %request.url, "sending request");

        let started = Instant::now();
        let outcome = handle.send(&request);
        let elapsed = started.elapsed();

        let mut info = TransferInfo {
            url: request.url.clone(),
            method: request.method.to_string(),
            total_time_ms: elapsed.as_millis() as u64,
            size_upload: request.body.as_ref().map_or(0, |b| b.len() as u64),
            request_headers: self.options.flag(OptionKey::HeaderOut).then(|| request.headers.clone()),
            ..TransferInfo::default()
        };

        let body = match outcome {
            Ok(response) => {
                if verbose {
                    tracing::debug!(target: "fetch_core::wire", "< {}", response.status_line);
                    for (key, value) in &response.headers {
                        tracing::debug!(target: "fetch_core::wire", "< {key}: {value}");
                    }
                }
                tracing::info!(status = response.status, elapsed_ms = info.total_time_ms, "response received");
                self.store_cookies(&response, now);
                self.fill_info(&mut info, &response);
                if self.options.flag(OptionKey::IncludeResponseHeader) {
                    let mut out = response.head().into_bytes();
                    out.extend_from_slice(&response.body);
                    out
                } else {
                    response.body
                }
            }
            Err(err) => {
                let message = match err {
                    ClientError::TransportFailure(message) => message,
                    other => other.to_string(),
                };
                tracing::warn!(url = %request.url, error = %message, "transport failure");
                info.error = message;
                Vec::new()
            }
        };

        let text = String::from_utf8_lossy(&body).into_owned();
        self.response = Some(body);
        self.info = Some(info);
        Ok(text)
    }

    /// Handle for the next request, opened or replaced per the handle policy.
    fn transport(&mut self, settings: TransportSettings) -> &TransportHandle {
        let reusable = self.config.handle_policy == HandlePolicy::Reuse
            && self.handle.as_ref().is_some_and(|h| *h.settings() == settings);
        if !reusable {
            // Release the stale handle before opening its replacement.
            self.handle = None;
        }
        self.handle.get_or_insert_with(|| TransportHandle::open(settings))
    }

    fn store_cookies(&self, response: &HttpResponse, now: i64) {
        let Some(jar_path) = self.options.path(OptionKey::CookieJar) else {
            return;
        };
        let Ok(url) = Url::parse(&response.effective_url) else {
            return;
        };
        let mut jar = CookieJar::load(jar_path);
        let stored = jar.store_response_cookies(response.header_values("set-cookie"), &url, now);
        if let Err(err) = jar.save(jar_path) {
            tracing::warn!(path = %jar_path.display(), error = %err, "could not write cookie jar");
        } else if stored > 0 {
            tracing::debug!(path = %jar_path.display(), stored, "cookie jar updated");
        }
    }

    fn fill_info(&self, info: &mut TransferInfo, response: &HttpResponse) {
        info.status = Some(response.status);
        info.effective_url = response.effective_url.clone();
        info.content_type = response.header("content-type").map(str::to_string);
        info.size_download = response.body.len() as u64;
        info.header_size = response.head().len() as u64;
        info.redirected = Url::parse(&info.url).map_or(false, |u| u.as_str() != info.effective_url);
    }

    /// Release the transport handle now instead of on drop.
    pub fn close(&mut self) {
        self.handle = None;
    }

    pub fn has_transport(&self) -> bool {
        self.handle.is_some()
    }

    // ------------------------------------------------------------------
    // Results
    // ------------------------------------------------------------------

    /// HTTP status of the last execution; `None` before any execution or
    /// when no response arrived.
    pub fn status_code(&self) -> Option<u16> {
        self.info.as_ref().and_then(|info| info.status)
    }

    /// Transport error of the last execution; empty on success.
    pub fn error(&self) -> &str {
        self.info.as_ref().map_or("", |info| info.error.as_str())
    }

    /// `Err(TransportFailure)` when the last execution failed below HTTP.
    pub fn check_transport(&self) -> Result<()> {
        match self.error() {
            "" => Ok(()),
            message => Err(ClientError::TransportFailure(message.to_string())),
        }
    }

    /// Raw body of the last execution.
    pub fn response(&self) -> Option<&[u8]> {
        self.response.as_deref()
    }

    pub fn response_text(&self) -> Option<String> {
        self.response.as_deref().map(|b| String::from_utf8_lossy(b).into_owned())
    }

    /// Outgoing header lines of the last execution; only recorded when
    /// header echo was on.
    pub fn request_headers(&self) -> Option<&[String]> {
        self.info.as_ref()?.request_headers.as_deref()
    }

    /// Method the current options select.
    pub fn method(&self) -> HttpMethod {
        if self.options.flag(OptionKey::Post) {
            HttpMethod::Post
        } else if self.options.flag(OptionKey::HttpGet) {
            HttpMethod::Get
        } else if let Some(name) = self.options.text(OptionKey::CustomRequest) {
            HttpMethod::from_name(name)
        } else {
            HttpMethod::Unknown
        }
    }

    pub fn transfer_info(&self) -> Option<&TransferInfo> {
        self.info.as_ref()
    }
}

impl Drop for FetchClient {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            tracing::trace!(handle = handle.id(), "client dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> FetchClient {
        FetchClient::new()
    }

    #[test]
    fn option_round_trip() {
        let mut c = client();
        c.set_option(RequestOption::Referer("http://a".into()));
        c.set_referer("http://b");
        assert_eq!(
            c.get_option(OptionKey::Referer).unwrap(),
            &RequestOption::Referer("http://b".into())
        );
        c.unset_option(OptionKey::Referer);
        assert!(matches!(c.get_option(OptionKey::Referer), Err(ClientError::NotFound(_))));
    }

    #[test]
    fn set_timeouts_sets_both() {
        let mut c = client();
        c.set_timeouts(Duration::from_secs(7));
        assert_eq!(c.all_options().duration(OptionKey::Timeout), Some(Duration::from_secs(7)));
        assert_eq!(
            c.all_options().duration(OptionKey::ConnectTimeout),
            Some(Duration::from_secs(7))
        );
    }

    #[test]
    fn defaults_come_from_config() {
        let c = client();
        assert_eq!(c.user_agent(), Some("curl"));
        assert_eq!(c.headers().get("Connection"), Some("keep-alive"));
        assert!(c.headers().get("Accept").is_some());
        assert_eq!(c.method(), HttpMethod::Unknown);
    }

    #[test]
    fn execute_without_url_fails_before_opening_a_handle() {
        let mut c = client();
        let err = c.execute().unwrap_err();
        assert!(matches!(err, ClientError::PreconditionFailed(_)));
        assert!(!c.has_transport());
        assert_eq!(c.status_code(), None);
    }

    #[test]
    fn blank_url_is_rejected() {
        let mut c = client();
        c.set_url("   ");
        assert!(matches!(c.prepare(), Err(ClientError::PreconditionFailed(_))));
    }

    #[test]
    fn prepare_adds_option_headers_after_stored_headers() {
        let mut c = client();
        c.set_headers([("Accept", "text/plain")], true);
        c.set_url("http://example.com/");
        c.set_referer("http://example.com/start");
        let req = c.prepare().unwrap();
        assert_eq!(
            req.headers,
            vec![
                "Accept: text/plain",
                "User-Agent: curl",
                "Referer: http://example.com/start",
                "Accept-Encoding: gzip",
            ]
        );
        assert_eq!(req.method, HttpMethod::Get);
        assert!(req.body.is_none());
    }

    #[test]
    fn explicit_user_agent_header_wins() {
        let mut c = client();
        c.set_header("User-Agent", "custom");
        c.set_url("http://example.com/");
        let req = c.prepare().unwrap();
        assert_eq!(req.header("user-agent"), Some("custom"));
        assert_eq!(req.headers.iter().filter(|l| l.starts_with("User-Agent")).count(), 1);
    }

    #[test]
    fn malformed_literal_header_is_invalid_argument() {
        let mut c = client();
        c.push_raw_header("not a header");
        c.set_url("http://example.com/");
        assert!(matches!(c.prepare(), Err(ClientError::InvalidArgument(_))));
    }

    #[test]
    fn bad_custom_method_is_invalid_argument() {
        let mut c = client();
        c.set_url("http://example.com/");
        c.set_option(RequestOption::CustomRequest("BAD METHOD".into()));
        assert!(matches!(c.prepare(), Err(ClientError::InvalidArgument(_))));
    }

    #[test]
    fn form_payload_urlencoded_when_configured() {
        let mut c = FetchClient::with_config(ClientConfig {
            encode_payload: true,
            ..ClientConfig::default()
        });
        c.set_url("http://example.com/");
        c.set_option(RequestOption::Post(true));
        c.set_option(RequestOption::PostFields(Payload::from([("a", "1"), ("b", "x y")])));
        let req = c.prepare().unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.body.as_deref(), Some(&b"a=1&b=x+y"[..]));
        assert_eq!(req.header("content-type"), Some("application/x-www-form-urlencoded"));
    }

    #[test]
    fn form_payload_multipart_otherwise() {
        let mut c = client();
        c.set_url("http://example.com/");
        c.set_option(RequestOption::Post(true));
        c.set_option(RequestOption::PostFields(Payload::from([("a", "1")])));
        let req = c.prepare().unwrap();
        let content_type = req.header("content-type").unwrap();
        assert!(content_type.starts_with("multipart/form-data; boundary="));
        let body = String::from_utf8(req.body.unwrap()).unwrap();
        assert!(body.contains("name=\"a\"\r\n\r\n1\r\n"));
    }

    #[test]
    fn raw_payload_passes_through_and_caller_content_type_wins() {
        let mut c = client();
        c.set_content_type("application/json");
        c.set_url("http://example.com/");
        c.set_option(RequestOption::CustomRequest("PUT".into()));
        c.set_option(RequestOption::PostFields(Payload::from(r#"{"a":1}"#)));
        let req = c.prepare().unwrap();
        assert_eq!(req.method, HttpMethod::Put);
        assert_eq!(req.body.as_deref(), Some(&br#"{"a":1}"#[..]));
        assert_eq!(req.header("content-type"), Some("application/json"));
    }

    #[test]
    fn get_ignores_leftover_payload() {
        let mut c = client();
        c.set_url("http://example.com/");
        c.set_option(RequestOption::HttpGet(true));
        c.set_option(RequestOption::PostFields(Payload::from("x")));
        assert!(c.prepare().unwrap().body.is_none());
    }

    #[test]
    fn method_reports_options() {
        let mut c = client();
        c.set_option(RequestOption::CustomRequest("DELETE".into()));
        assert_eq!(c.method(), HttpMethod::Custom("DELETE".into()));
        c.set_option(RequestOption::HttpGet(true));
        assert_eq!(c.method(), HttpMethod::Get);
        c.set_option(RequestOption::Post(true));
        assert_eq!(c.method(), HttpMethod::Post);
    }

    #[test]
    fn check_transport_before_any_request_is_ok() {
        let c = client();
        assert!(c.check_transport().is_ok());
        assert_eq!(c.error(), "");
        assert!(c.request_headers().is_none());
        assert!(c.response().is_none());
    }
}
