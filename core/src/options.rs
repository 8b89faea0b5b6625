//! Transport-level request options.
//!
//! # Design
//! Each option is a variant of `RequestOption` carrying a payload of the
//! type that option needs, and `OptionKey` is the bare discriminant used to
//! query or remove it. The store is keyed by `OptionKey`, so setting an
//! option twice keeps only the last value. Values are never checked
//! against each other: a total timeout shorter than the connect timeout is
//! accepted and handed to the transport as-is.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};
use crate::http::Payload;

/// Identifier of a request option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKey {
    Url,
    UserAgent,
    Referer,
    ConnectTimeout,
    Timeout,
    FollowLocation,
    MaxRedirects,
    SslVerifyPeer,
    SslVerifyHost,
    Verbose,
    /// Capture the outgoing request headers for `FetchClient::request_headers`.
    HeaderOut,
    /// Prepend the response status line and headers to the returned body.
    IncludeResponseHeader,
    /// Content encodings to negotiate, sent as `Accept-Encoding`.
    Encoding,
    HttpGet,
    Post,
    PostFields,
    CustomRequest,
    /// File cookies are read from before a request.
    CookieFile,
    /// File received cookies are written to after a request.
    CookieJar,
}

impl OptionKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionKey::Url => "url",
            OptionKey::UserAgent => "user_agent",
            OptionKey::Referer => "referer",
            OptionKey::ConnectTimeout => "connect_timeout",
            OptionKey::Timeout => "timeout",
            OptionKey::FollowLocation => "follow_location",
            OptionKey::MaxRedirects => "max_redirects",
            OptionKey::SslVerifyPeer => "ssl_verify_peer",
            OptionKey::SslVerifyHost => "ssl_verify_host",
            OptionKey::Verbose => "verbose",
            OptionKey::HeaderOut => "header_out",
            OptionKey::IncludeResponseHeader => "include_response_header",
            OptionKey::Encoding => "encoding",
            OptionKey::HttpGet => "http_get",
            OptionKey::Post => "post",
            OptionKey::PostFields => "post_fields",
            OptionKey::CustomRequest => "custom_request",
            OptionKey::CookieFile => "cookie_file",
            OptionKey::CookieJar => "cookie_jar",
        }
    }

    /// Options that select the request method; cleared before every
    /// `get` / `post` / `put`.
    pub const METHOD: [OptionKey; 4] = [
        OptionKey::HttpGet,
        OptionKey::Post,
        OptionKey::PostFields,
        OptionKey::CustomRequest,
    ];
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An option together with its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOption {
    Url(String),
    UserAgent(String),
    Referer(String),
    ConnectTimeout(Duration),
    Timeout(Duration),
    FollowLocation(bool),
    MaxRedirects(u32),
    SslVerifyPeer(bool),
    SslVerifyHost(bool),
    Verbose(bool),
    HeaderOut(bool),
    IncludeResponseHeader(bool),
    Encoding(String),
    HttpGet(bool),
    Post(bool),
    PostFields(Payload),
    CustomRequest(String),
    CookieFile(PathBuf),
    CookieJar(PathBuf),
}

impl RequestOption {
    pub fn key(&self) -> OptionKey {
        match self {
            RequestOption::Url(_) => OptionKey::Url,
            RequestOption::UserAgent(_) => OptionKey::UserAgent,
            RequestOption::Referer(_) => OptionKey::Referer,
            RequestOption::ConnectTimeout(_) => OptionKey::ConnectTimeout,
            RequestOption::Timeout(_) => OptionKey::Timeout,
            RequestOption::FollowLocation(_) => OptionKey::FollowLocation,
            RequestOption::MaxRedirects(_) => OptionKey::MaxRedirects,
            RequestOption::SslVerifyPeer(_) => OptionKey::SslVerifyPeer,
            RequestOption::SslVerifyHost(_) => OptionKey::SslVerifyHost,
            RequestOption::Verbose(_) => OptionKey::Verbose,
            RequestOption::HeaderOut(_) => OptionKey::HeaderOut,
            RequestOption::IncludeResponseHeader(_) => OptionKey::IncludeResponseHeader,
            RequestOption::Encoding(_) => OptionKey::Encoding,
            RequestOption::HttpGet(_) => OptionKey::HttpGet,
            RequestOption::Post(_) => OptionKey::Post,
            RequestOption::PostFields(_) => OptionKey::PostFields,
            RequestOption::CustomRequest(_) => OptionKey::CustomRequest,
            RequestOption::CookieFile(_) => OptionKey::CookieFile,
            RequestOption::CookieJar(_) => OptionKey::CookieJar,
        }
    }

    fn as_flag(&self) -> Option<bool> {
        match self {
            RequestOption::FollowLocation(on)
            | RequestOption::SslVerifyPeer(on)
            | RequestOption::SslVerifyHost(on)
            | RequestOption::Verbose(on)
            | RequestOption::HeaderOut(on)
            | RequestOption::IncludeResponseHeader(on)
            | RequestOption::HttpGet(on)
            | RequestOption::Post(on) => Some(*on),
            _ => None,
        }
    }

    fn as_text(&self) -> Option<&str> {
        match self {
            RequestOption::Url(s)
            | RequestOption::UserAgent(s)
            | RequestOption::Referer(s)
            | RequestOption::Encoding(s)
            | RequestOption::CustomRequest(s) => Some(s),
            _ => None,
        }
    }
}

/// Keyed collection of `RequestOption`s.
#[derive(Debug, Clone, Default)]
pub struct OptionStore {
    entries: BTreeMap<OptionKey, RequestOption>,
}

impl OptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, option: RequestOption) {
        self.entries.insert(option.key(), option);
    }

    pub fn set_all<I: IntoIterator<Item = RequestOption>>(&mut self, options: I) {
        for option in options {
            self.set(option);
        }
    }

    pub fn get(&self, key: OptionKey) -> Result<&RequestOption> {
        self.entries.get(&key).ok_or(ClientError::NotFound(key))
    }

    pub fn all(&self) -> &BTreeMap<OptionKey, RequestOption> {
        &self.entries
    }

    pub fn contains(&self, key: OptionKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn unset(&mut self, key: OptionKey) -> Option<RequestOption> {
        self.entries.remove(&key)
    }

    pub fn unset_all(&mut self, keys: &[OptionKey]) {
        for key in keys {
            self.entries.remove(key);
        }
    }

    /// Boolean option value; absent options read as `false`.
    pub fn flag(&self, key: OptionKey) -> bool {
        self.entries.get(&key).and_then(RequestOption::as_flag).unwrap_or(false)
    }

    /// Boolean option value, or `default` when the option is absent.
    pub fn flag_or(&self, key: OptionKey, default: bool) -> bool {
        self.entries.get(&key).and_then(RequestOption::as_flag).unwrap_or(default)
    }

    pub fn text(&self, key: OptionKey) -> Option<&str> {
        self.entries.get(&key).and_then(RequestOption::as_text)
    }

    pub fn duration(&self, key: OptionKey) -> Option<Duration> {
        match self.entries.get(&key)? {
            RequestOption::ConnectTimeout(d) | RequestOption::Timeout(d) => Some(*d),
            _ => None,
        }
    }

    pub fn path(&self, key: OptionKey) -> Option<&Path> {
        match self.entries.get(&key)? {
            RequestOption::CookieFile(p) | RequestOption::CookieJar(p) => Some(p),
            _ => None,
        }
    }

    pub fn max_redirects(&self) -> Option<u32> {
        match self.entries.get(&OptionKey::MaxRedirects)? {
            RequestOption::MaxRedirects(n) => Some(*n),
            _ => None,
        }
    }

    pub fn payload(&self) -> Option<&Payload> {
        match self.entries.get(&OptionKey::PostFields)? {
            RequestOption::PostFields(payload) => Some(payload),
            _ => None,
        }
    }
}
