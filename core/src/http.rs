//! HTTP request and response types described as plain data.
//!
//! # Design
//! `FetchClient::prepare` turns the option and header stores into an
//! `HttpRequest` without touching the network, and the transport turns the
//! wire response back into an `HttpResponse`. Everything between those two
//! points is the only place I/O happens, which keeps request building
//! deterministic and easy to test.
//!
//! Query strings and form bodies are encoded with `url::form_urlencoded`
//! (spaces become `+`, as browsers and most server frameworks expect).

use std::fmt;

use url::form_urlencoded;

/// HTTP method of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    /// Any other method selected through a custom-request override.
    Custom(String),
    /// No method option is set; rendered as `ETC`.
    Unknown,
}

impl HttpMethod {
    /// Map a custom-request override onto a method, folding the ones the
    /// client knows natively.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "GET" => HttpMethod::Get,
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            other => HttpMethod::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Custom(name) => name,
            HttpMethod::Unknown => "ETC",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body handed to `post` / `put`.
///
/// `Raw` is sent verbatim. `Form` is a list of fields whose wire encoding
/// depends on `ClientConfig::encode_payload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Form(Vec<(String, String)>),
    Raw(String),
}

impl Default for Payload {
    fn default() -> Self {
        Payload::Form(Vec::new())
    }
}

impl Payload {
    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Form(fields) => fields.is_empty(),
            Payload::Raw(body) => body.is_empty(),
        }
    }
}

impl From<&str> for Payload {
    fn from(body: &str) -> Self {
        Payload::Raw(body.to_string())
    }
}

impl From<String> for Payload {
    fn from(body: String) -> Self {
        Payload::Raw(body)
    }
}

impl<K: Into<String>, V: Into<String>> From<Vec<(K, V)>> for Payload {
    fn from(fields: Vec<(K, V)>) -> Self {
        Payload::Form(fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for Payload {
    fn from(fields: [(K, V); N]) -> Self {
        Payload::Form(fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A request ready to go on the wire.
///
/// `headers` holds complete header lines (`Name: value`) in send order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<String>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// First header value with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }
}

/// A fully buffered response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Status line as received, e.g. `HTTP/1.1 200 OK`.
    pub status_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// URL of the final response after any redirects.
    pub effective_url: String,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Status line and header block as they would appear on the wire,
    /// terminated by the blank line.
    pub fn head(&self) -> String {
        let mut head = format!("{}\r\n", self.status_line);
        for (key, value) in &self.headers {
            head.push_str(&format!("{key}: {value}\r\n"));
        }
        head.push_str("\r\n");
        head
    }
}

/// Form-encode a list of fields (`a=1&b=two+words`).
pub fn encode_form<K: AsRef<str>, V: AsRef<str>>(fields: &[(K, V)]) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in fields {
        serializer.append_pair(key.as_ref(), value.as_ref());
    }
    serializer.finish()
}

/// Merge `params` into the query of `url`.
///
/// The URL is split on its first `?`; the encoded params go first and the
/// query that was already there follows: `base?params&existing`.
pub fn merge_query<K: AsRef<str>, V: AsRef<str>>(url: &str, params: &[(K, V)]) -> String {
    if params.is_empty() {
        return url.to_string();
    }
    let encoded = encode_form(params);
    match url.split_once('?') {
        Some((base, existing)) if !existing.is_empty() => format!("{base}?{encoded}&{existing}"),
        Some((base, _)) => format!("{base}?{encoded}"),
        None => format!("{url}?{encoded}"),
    }
}

/// Encode fields as a `multipart/form-data` body, returning the content
/// type (with boundary) and the body.
pub fn encode_multipart(fields: &[(String, String)], boundary: &str) -> (String, Vec<u8>) {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    body.push_str(&format!("--{boundary}--\r\n"));
    (format!("multipart/form-data; boundary={boundary}"), body.into_bytes())
}
