//! Constructor-time client configuration.
//!
//! # Design
//! A `ClientConfig` seeds the option and header stores when a client is
//! built; after that every value can be changed through the client's
//! setters. `Profile` presets capture the three flavours of defaults the
//! client is commonly used with. Configs deserialize from JSON with every
//! field optional, so a file only needs to name what it changes.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};
use crate::options::RequestOption;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 6.1) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/30.0.1599.66 Safari/537.36";

/// When the transport handle is (re)built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlePolicy {
    /// Build the handle on first use and keep it for later requests. It is
    /// rebuilt only when a timeout, redirect or TLS option changes.
    #[default]
    Reuse,
    /// Build a fresh handle for every request.
    PerRequest,
}

/// Named default sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// `curl` user agent, redirects followed, form payloads sent as multipart.
    Basic,
    /// Desktop browser user agent and headers, form payloads url-encoded.
    Browser,
    /// Strict TLS, no compression negotiation, a fresh handle per request.
    Fetcher,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub user_agent: String,
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
    pub follow_location: bool,
    pub max_redirects: u32,
    pub verify_tls: bool,
    /// Sent as `Accept-Encoding` when set.
    pub encoding: Option<String>,
    pub default_headers: Vec<(String, String)>,
    /// Url-encode form payloads; otherwise they go out as multipart.
    pub encode_payload: bool,
    pub handle_policy: HandlePolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::profile(Profile::Basic)
    }
}

impl ClientConfig {
    pub fn profile(profile: Profile) -> Self {
        match profile {
            Profile::Basic => Self {
                user_agent: "curl".to_string(),
                connect_timeout_secs: 20,
                timeout_secs: 20,
                follow_location: true,
                max_redirects: 10,
                verify_tls: true,
                encoding: Some("gzip".to_string()),
                default_headers: headers(&[
                    ("Connection", "keep-alive"),
                    (
                        "Accept",
                        "text/html,application/json,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
                    ),
                    ("Accept-Language", "en-US,en;q=0.5"),
                ]),
                encode_payload: false,
                handle_policy: HandlePolicy::Reuse,
            },
            Profile::Browser => Self {
                user_agent: BROWSER_USER_AGENT.to_string(),
                connect_timeout_secs: 20,
                timeout_secs: 20,
                follow_location: false,
                max_redirects: 10,
                verify_tls: true,
                encoding: Some("gzip".to_string()),
                default_headers: headers(&[
                    ("Connection", "keep-alive"),
                    (
                        "Accept",
                        "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
                    ),
                    ("Accept-Language", "en-US,en;q=0.5"),
                ]),
                encode_payload: true,
                handle_policy: HandlePolicy::PerRequest,
            },
            Profile::Fetcher => Self {
                user_agent: "Curl Wrapper".to_string(),
                connect_timeout_secs: 20,
                timeout_secs: 20,
                follow_location: false,
                max_redirects: 10,
                verify_tls: true,
                encoding: None,
                default_headers: headers(&[
                    ("Connection", "keep-alive"),
                    ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
                    ("Accept-Language", "en-US,en;q=0.5"),
                ]),
                encode_payload: true,
                handle_policy: HandlePolicy::PerRequest,
            },
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ClientError::Config(e.to_string()))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Options a new client starts with.
    pub fn initial_options(&self) -> Vec<RequestOption> {
        let mut options = vec![
            RequestOption::UserAgent(self.user_agent.clone()),
            RequestOption::ConnectTimeout(Duration::from_secs(self.connect_timeout_secs)),
            RequestOption::Timeout(Duration::from_secs(self.timeout_secs)),
            RequestOption::FollowLocation(self.follow_location),
            RequestOption::MaxRedirects(self.max_redirects),
            RequestOption::SslVerifyPeer(self.verify_tls),
            RequestOption::SslVerifyHost(self.verify_tls),
        ];
        if let Some(encoding) = &self.encoding {
            options.push(RequestOption::Encoding(encoding.clone()));
        }
        options
    }
}

fn headers(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}
