//! The live transport handle: a `ureq::Agent` configured from the option
//! store.
//!
//! # Design
//! An agent bakes in its timeouts, redirect limit and TLS settings, so the
//! handle remembers the `TransportSettings` it was built from and the
//! client compares them before each request to decide whether the handle
//! can be reused. Status codes are never turned into errors
//! (`http_status_as_error(false)`): a 404 or 500 is a response like any
//! other. Only failures below HTTP come back as `TransportFailure`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use ureq::tls::TlsConfig;
use ureq::typestate::WithBody;
use ureq::{Agent, Body, RequestBuilder, ResponseExt};

use crate::error::{ClientError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::options::{OptionKey, OptionStore};

const DEFAULT_MAX_REDIRECTS: u32 = 10;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// The subset of options an agent is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    pub connect_timeout: Option<Duration>,
    pub timeout: Option<Duration>,
    /// `0` disables redirect following.
    pub max_redirects: u32,
    pub verify_tls: bool,
}

impl TransportSettings {
    pub fn from_options(options: &OptionStore) -> Self {
        let max_redirects = if options.flag(OptionKey::FollowLocation) {
            options.max_redirects().unwrap_or(DEFAULT_MAX_REDIRECTS)
        } else {
            0
        };
        Self {
            connect_timeout: non_zero(options.duration(OptionKey::ConnectTimeout)),
            timeout: non_zero(options.duration(OptionKey::Timeout)),
            max_redirects,
            verify_tls: options.flag_or(OptionKey::SslVerifyPeer, true)
                && options.flag_or(OptionKey::SslVerifyHost, true),
        }
    }
}

// A zero timeout means "no timeout".
fn non_zero(duration: Option<Duration>) -> Option<Duration> {
    duration.filter(|d| !d.is_zero())
}

/// Exclusively owned connection state of one client.
pub struct TransportHandle {
    id: u64,
    agent: Agent,
    settings: TransportSettings,
}

impl TransportHandle {
    pub fn open(settings: TransportSettings) -> Self {
        let mut builder = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_connect(settings.connect_timeout)
            .timeout_global(settings.timeout)
            .max_redirects(settings.max_redirects);
        if !settings.verify_tls {
            builder = builder.tls_config(TlsConfig::builder().disable_verification(true).build());
        }
        let agent = builder.build().new_agent();

        let id = NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(handle = id, ?settings, "transport handle opened");
        Self { id, agent, settings }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }

    /// Perform one blocking exchange and buffer the whole response.
    pub fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let url = request.url.as_str();
        let body = request.body.as_deref();
        let result = match &request.method {
            HttpMethod::Get | HttpMethod::Unknown => {
                with_headers(self.agent.get(url), &request.headers).call()
            }
            HttpMethod::Post => send_body(with_headers(self.agent.post(url), &request.headers), body),
            HttpMethod::Put => send_body(with_headers(self.agent.put(url), &request.headers), body),
            HttpMethod::Custom(name) => {
                let mut builder = ureq::http::Request::builder().method(name.as_str()).uri(url);
                for line in &request.headers {
                    if let Some((key, value)) = line.split_once(':') {
                        builder = builder.header(key.trim(), value.trim());
                    }
                }
                let req = builder.body(body.unwrap_or_default()).map_err(transport_failure)?;
                self.agent.run(req)
            }
        };
        let mut response = result.map_err(transport_failure)?;

        let status = response.status();
        let status_line = format!(
            "{:?} {} {}",
            response.version(),
            status.as_u16(),
            status.canonical_reason().unwrap_or_default()
        )
        .trim_end()
        .to_string();
        let headers = response
            .headers()
            .iter()
            .map(|(key, value)| {
                (key.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned())
            })
            .collect();
        let effective_url = response.get_uri().to_string();
        let body = response.body_mut().read_to_vec().map_err(transport_failure)?;

        Ok(HttpResponse {
            status: status.as_u16(),
            status_line,
            headers,
            body,
            effective_url,
        })
    }
}

impl fmt::Debug for TransportHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportHandle")
            .field("id", &self.id)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        tracing::debug!(handle = self.id, "transport handle released");
    }
}

fn with_headers<B>(mut builder: RequestBuilder<B>, lines: &[String]) -> RequestBuilder<B> {
    for line in lines {
        if let Some((key, value)) = line.split_once(':') {
            builder = builder.header(key.trim(), value.trim());
        }
    }
    builder
}

fn send_body(
    builder: RequestBuilder<WithBody>,
    body: Option<&[u8]>,
) -> std::result::Result<ureq::http::Response<Body>, ureq::Error> {
    match body {
        Some(bytes) => builder.send(bytes),
        None => builder.send_empty(),
    }
}

fn transport_failure(err: impl fmt::Display) -> ClientError {
    ClientError::TransportFailure(err.to_string())
}
