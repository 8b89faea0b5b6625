//! Configurable blocking HTTP client.
//!
//! # Overview
//! `FetchClient` accumulates request options, headers and cookie settings,
//! then performs one fully buffered GET / POST / PUT at a time over `ureq`
//! and keeps the outcome around for inspection.
//!
//! # Design
//! - Options are a typed map (`OptionKey` → `RequestOption`); last write wins.
//! - Headers keep insertion order; literal lines pass through verbatim.
//! - `prepare` builds a plain-data `HttpRequest` with no I/O; `execute` is
//!   the only place the network is touched.
//! - Transport failures are recorded, not returned: read them back through
//!   `status_code`, `error` and `transfer_info`.
//! - Differences between client flavours live in `ClientConfig` / `Profile`.

pub mod client;
pub mod config;
pub mod cookie;
pub mod error;
pub mod headers;
pub mod http;
pub mod info;
pub mod options;
pub mod transport;

pub use client::FetchClient;
pub use config::{ClientConfig, HandlePolicy, Profile};
pub use cookie::{Cookie, CookieJar};
pub use error::{ClientError, Result};
pub use headers::{HeaderEntry, HeaderStore};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Payload};
pub use info::TransferInfo;
pub use options::{OptionKey, OptionStore, RequestOption};
