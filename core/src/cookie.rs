//! Cookie persistence.
//!
//! # Design
//! `CookieManager` tracks the single cookie path a client may use and keeps
//! the `CookieFile` / `CookieJar` options in step with it. Both options point
//! at the same file once cookies are enabled.
//!
//! `CookieJar` is the on-disk format: the Netscape cookie file that curl and
//! most tooling read and write. One cookie per line, seven tab-separated
//! fields (`domain`, `include_subdomains`, `path`, `secure`, `expires`,
//! `name`, `value`). Lines starting with `#` are comments except the
//! `#HttpOnly_` domain prefix. An expiry of `0` marks a session cookie.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use url::{Host, Url};

use crate::error::{ClientError, Result};
use crate::options::{OptionKey, OptionStore, RequestOption};

const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

/// Path bookkeeping for a client's cookie file.
#[derive(Debug, Clone, Default)]
pub struct CookieManager {
    path: Option<PathBuf>,
    enabled: bool,
}

impl CookieManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Assign the cookie file. The file must already exist.
    ///
    /// When cookies are enabled the options follow the new path.
    pub fn assign_path(&mut self, path: impl Into<PathBuf>, options: &mut OptionStore) -> Result<()> {
        let path = path.into();
        if !path.is_file() {
            return Err(ClientError::invalid(format!(
                "cookie path is not an existing file: {}",
                path.display()
            )));
        }
        if self.enabled {
            point_options_at(&path, options);
        }
        self.path = Some(path);
        Ok(())
    }

    /// Send and store cookies through the assigned file.
    pub fn enable(&mut self, options: &mut OptionStore) -> Result<()> {
        if self.enabled {
            return Ok(());
        }
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| ClientError::precondition("assign a cookie file before enabling cookies"))?;
        point_options_at(path, options);
        self.enabled = true;
        tracing::debug!(path = %path.display(), "cookies enabled");
        Ok(())
    }

    /// Forget the cookie path and clear both cookie options.
    pub fn disable(&mut self, options: &mut OptionStore) {
        self.path = None;
        self.enabled = false;
        options.unset_all(&[OptionKey::CookieFile, OptionKey::CookieJar]);
    }

    /// Delete the assigned cookie file if it exists.
    pub fn cleanup(&self) -> Result<()> {
        match &self.path {
            Some(path) if path.is_file() => {
                fs::remove_file(path)?;
                tracing::debug!(path = %path.display(), "cookie file removed");
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn point_options_at(path: &Path, options: &mut OptionStore) {
    options.set(RequestOption::CookieFile(path.to_path_buf()));
    options.set(RequestOption::CookieJar(path.to_path_buf()));
}

/// A single stored cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    /// Host the cookie belongs to, without a leading dot.
    pub domain: String,
    pub include_subdomains: bool,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    /// Unix seconds; `None` is a session cookie.
    pub expires: Option<i64>,
    pub name: String,
    pub value: String,
}

impl Cookie {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires.is_some_and(|exp| exp <= now)
    }

    pub fn matches(&self, url: &Url, now: i64) -> bool {
        let host = url.host_str().unwrap_or("");
        let domain_ok = host.eq_ignore_ascii_case(&self.domain)
            || (self.include_subdomains
                && host.len() > self.domain.len()
                && host.to_ascii_lowercase().ends_with(&format!(".{}", self.domain.to_ascii_lowercase())));
        domain_ok
            && path_matches(url.path(), &self.path)
            && (!self.secure || url.scheme() == "https")
            && !self.is_expired(now)
    }

    /// Parse a `Set-Cookie` header received from `url`.
    ///
    /// Returns `None` for a malformed header or a `Domain` the request host
    /// does not belong to.
    pub fn parse_set_cookie(header: &str, url: &Url, now: i64) -> Option<Self> {
        let host = url.host_str()?.to_ascii_lowercase();
        let ip_host = !matches!(url.host(), Some(Host::Domain(_)));
        let mut parts = header.split(';');
        let (name, value) = parts.next()?.trim().split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let mut cookie = Cookie {
            domain: host.clone(),
            include_subdomains: false,
            path: default_path(url.path()),
            secure: false,
            http_only: false,
            expires: None,
            name: name.to_string(),
            value: value.trim().trim_matches('"').to_string(),
        };
        let mut max_age = None;

        for attr in parts {
            let attr = attr.trim();
            let (key, val) = match attr.split_once('=') {
                Some((k, v)) => (k.trim().to_ascii_lowercase(), v.trim()),
                None => (attr.to_ascii_lowercase(), ""),
            };
            match key.as_str() {
                "domain" if !val.is_empty() => {
                    let domain = val.trim_start_matches('.').to_ascii_lowercase();
                    if domain == host {
                        cookie.include_subdomains = !ip_host;
                    } else if ip_host || !host.ends_with(&format!(".{domain}")) {
                        return None;
                    } else {
                        cookie.include_subdomains = true;
                    }
                    cookie.domain = domain;
                }
                "path" if val.starts_with('/') => cookie.path = val.to_string(),
                "expires" => {
                    if let Some(secs) = parse_cookie_date(val) {
                        cookie.expires = Some(secs);
                    }
                }
                "max-age" => max_age = val.parse::<i64>().ok(),
                "secure" => cookie.secure = true,
                "httponly" => cookie.http_only = true,
                _ => {}
            }
        }

        // Max-Age takes precedence over Expires.
        if let Some(secs) = max_age {
            cookie.expires = Some(if secs <= 0 { 0 } else { now + secs });
        }
        Some(cookie)
    }

    fn to_line(&self) -> String {
        let domain = if self.include_subdomains {
            format!(".{}", self.domain)
        } else {
            self.domain.clone()
        };
        format!(
            "{}{}\t{}\t{}\t{}\t{}\t{}\t{}",
            if self.http_only { HTTP_ONLY_PREFIX } else { "" },
            domain,
            flag(self.include_subdomains),
            self.path,
            flag(self.secure),
            self.expires.unwrap_or(0),
            self.name,
            self.value
        )
    }

    fn from_line(line: &str) -> Option<Self> {
        let (http_only, line) = match line.strip_prefix(HTTP_ONLY_PREFIX) {
            Some(rest) => (true, rest),
            None => (false, line),
        };
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 7 {
            return None;
        }
        let expires = fields[4].trim().parse::<i64>().ok()?;
        Some(Cookie {
            domain: fields[0].trim_start_matches('.').to_string(),
            include_subdomains: fields[1].eq_ignore_ascii_case("TRUE"),
            path: fields[2].to_string(),
            secure: fields[3].eq_ignore_ascii_case("TRUE"),
            http_only,
            expires: (expires != 0).then_some(expires),
            name: fields[5].to_string(),
            value: fields[6..].join("\t"),
        })
    }
}

fn flag(on: bool) -> &'static str {
    if on {
        "TRUE"
    } else {
        "FALSE"
    }
}

/// Unix seconds for an `Expires` value in RFC 1123, Netscape
/// (`Thu, 01-Jan-1970 00:00:01 GMT`), RFC 850 or asctime form.
fn parse_cookie_date(value: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc).timestamp());
    }
    const FORMATS: [&str; 4] = [
        "%a, %d-%b-%Y %H:%M:%S GMT",
        "%a, %d-%b-%y %H:%M:%S GMT",
        "%A, %d-%b-%y %H:%M:%S GMT",
        "%a %b %e %H:%M:%S %Y",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|dt| dt.and_utc().timestamp())
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    request_path == cookie_path
        || (request_path.starts_with(cookie_path)
            && (cookie_path.ends_with('/') || request_path[cookie_path.len()..].starts_with('/')))
}

/// Directory of the request path, used when `Set-Cookie` names no `Path`.
fn default_path(request_path: &str) -> String {
    match request_path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => request_path[..idx].to_string(),
    }
}

/// In-memory view of a Netscape cookie file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a cookie file. A missing or unreadable file is an empty jar.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => Self::parse(&text),
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "cookie file not readable, starting empty");
                Self::new()
            }
        }
    }

    pub fn parse(text: &str) -> Self {
        let cookies = text
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .filter(|line| !line.starts_with('#') || line.starts_with(HTTP_ONLY_PREFIX))
            .filter_map(Cookie::from_line)
            .collect();
        Self { cookies }
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.to_netscape())
    }

    pub fn to_netscape(&self) -> String {
        let mut out = String::from("# Netscape HTTP Cookie File\n\n");
        for cookie in &self.cookies {
            out.push_str(&cookie.to_line());
            out.push('\n');
        }
        out
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Add or replace a cookie. Expired cookies delete their stored match.
    pub fn insert(&mut self, cookie: Cookie, now: i64) {
        self.cookies.retain(|c| {
            !(c.name == cookie.name && c.path == cookie.path && c.domain.eq_ignore_ascii_case(&cookie.domain))
        });
        if !cookie.is_expired(now) {
            self.cookies.push(cookie);
        }
    }

    /// Store every `Set-Cookie` value received from `url`.
    pub fn store_response_cookies<'a, I>(&mut self, set_cookies: I, url: &Url, now: i64) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut stored = 0;
        for header in set_cookies {
            if let Some(cookie) = Cookie::parse_set_cookie(header, url, now) {
                self.insert(cookie, now);
                stored += 1;
            }
        }
        stored
    }

    /// Value for a `Cookie` request header, if any stored cookie applies.
    pub fn header_for(&self, url: &Url, now: i64) -> Option<String> {
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .filter(|c| c.matches(url, now))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();
        (!pairs.is_empty()).then(|| pairs.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn enable_without_path_fails() {
        let mut manager = CookieManager::new();
        let mut options = OptionStore::new();
        let err = manager.enable(&mut options).unwrap_err();
        assert!(matches!(err, ClientError::PreconditionFailed(_)));
        assert!(!options.contains(OptionKey::CookieFile));
    }

    #[test]
    fn assign_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = CookieManager::new();
        let mut options = OptionStore::new();
        let err = manager
            .assign_path(dir.path().join("absent.txt"), &mut options)
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument(_)));
        assert!(manager.path().is_none());
    }

    #[test]
    fn enable_sets_both_options_and_is_idempotent() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut manager = CookieManager::new();
        let mut options = OptionStore::new();
        manager.assign_path(file.path(), &mut options).unwrap();
        manager.enable(&mut options).unwrap();
        manager.enable(&mut options).unwrap();
        assert_eq!(options.path(OptionKey::CookieFile), Some(file.path()));
        assert_eq!(options.path(OptionKey::CookieJar), Some(file.path()));
        assert!(manager.is_enabled());
    }

    #[test]
    fn disable_clears_everything_even_when_never_enabled() {
        let mut manager = CookieManager::new();
        let mut options = OptionStore::new();
        manager.disable(&mut options);

        let file = tempfile::NamedTempFile::new().unwrap();
        manager.assign_path(file.path(), &mut options).unwrap();
        manager.enable(&mut options).unwrap();
        manager.disable(&mut options);
        assert!(manager.path().is_none());
        assert!(!options.contains(OptionKey::CookieFile));
        assert!(!options.contains(OptionKey::CookieJar));
    }

    #[test]
    fn cleanup_removes_file_and_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.txt");
        fs::write(&path, "").unwrap();
        let mut manager = CookieManager::new();
        let mut options = OptionStore::new();
        manager.assign_path(&path, &mut options).unwrap();
        manager.cleanup().unwrap();
        assert!(!path.exists());
        manager.cleanup().unwrap();
    }

    #[test]
    fn parse_set_cookie_with_attributes() {
        let cookie = Cookie::parse_set_cookie(
            "sid=abc; Domain=.example.com; Path=/app; Secure; HttpOnly; Max-Age=60",
            &url("https://www.example.com/app/login"),
            NOW,
        )
        .unwrap();
        assert_eq!(cookie.domain, "example.com");
        assert!(cookie.include_subdomains);
        assert_eq!(cookie.path, "/app");
        assert!(cookie.secure && cookie.http_only);
        assert_eq!(cookie.expires, Some(NOW + 60));
    }

    #[test]
    fn parse_set_cookie_defaults_to_request_host_and_directory() {
        let cookie =
            Cookie::parse_set_cookie("a=1", &url("http://example.com/docs/page"), NOW).unwrap();
        assert_eq!(cookie.domain, "example.com");
        assert!(!cookie.include_subdomains);
        assert_eq!(cookie.path, "/docs");
        assert_eq!(cookie.expires, None);
    }

    #[test]
    fn parse_expires_date() {
        let cookie = Cookie::parse_set_cookie(
            "a=1; Expires=Wed, 21 Oct 2015 07:28:00 GMT",
            &url("http://example.com/"),
            NOW,
        )
        .unwrap();
        assert_eq!(cookie.expires, Some(1_445_412_480));
        assert!(cookie.is_expired(NOW));
    }

    #[test]
    fn parse_expires_netscape_dash_form() {
        let cookie = Cookie::parse_set_cookie(
            "a=1; Expires=Wed, 21-Oct-2015 07:28:00 GMT",
            &url("http://example.com/"),
            NOW,
        )
        .unwrap();
        assert_eq!(cookie.expires, Some(1_445_412_480));
        assert_eq!(parse_cookie_date("Sunday, 06-Nov-94 08:49:37 GMT"), Some(784_111_777));
        assert_eq!(parse_cookie_date("Sun Nov  6 08:49:37 1994"), Some(784_111_777));
        assert_eq!(parse_cookie_date("not a date"), None);
    }

    #[test]
    fn dash_form_expiry_in_the_past_deletes_stored_cookie() {
        let site = url("http://example.com/");
        let mut jar = CookieJar::new();
        jar.store_response_cookies(["sid=abc; Path=/"], &site, NOW);
        assert_eq!(jar.header_for(&site, NOW).as_deref(), Some("sid=abc"));

        jar.store_response_cookies(["sid=; Path=/; Expires=Thu, 01-Jan-1970 00:00:01 GMT"], &site, NOW);
        assert!(jar.is_empty());
        assert_eq!(jar.header_for(&site, NOW), None);
    }

    #[test]
    fn foreign_domain_attribute_is_rejected() {
        let mut jar = CookieJar::new();
        let stored = jar.store_response_cookies(
            ["sid=evil; Domain=bank.example; Path=/"],
            &url("http://attacker.test/"),
            NOW,
        );
        assert_eq!(stored, 0);
        assert!(jar.is_empty());
        assert_eq!(jar.header_for(&url("http://bank.example/"), NOW), None);

        // A suffix that is not on a label boundary is foreign too.
        assert!(Cookie::parse_set_cookie("a=1; Domain=ample.com", &url("http://example.com/"), NOW).is_none());
    }

    #[test]
    fn domain_attribute_for_parent_or_own_host_is_kept() {
        let parent =
            Cookie::parse_set_cookie("a=1; Domain=example.com", &url("http://www.example.com/"), NOW)
                .unwrap();
        assert_eq!(parent.domain, "example.com");
        assert!(parent.include_subdomains);
        assert!(parent.matches(&url("http://api.example.com/"), NOW));

        let own = Cookie::parse_set_cookie("a=1; Domain=EXAMPLE.com", &url("http://example.com/"), NOW)
            .unwrap();
        assert_eq!(own.domain, "example.com");
    }

    #[test]
    fn ip_host_only_accepts_its_own_address_as_domain() {
        let ip = url("http://127.0.0.1/");
        assert!(Cookie::parse_set_cookie("a=1; Domain=bank.example", &ip, NOW).is_none());
        assert!(Cookie::parse_set_cookie("a=1; Domain=0.0.1", &ip, NOW).is_none());

        let own = Cookie::parse_set_cookie("a=1; Domain=127.0.0.1", &ip, NOW).unwrap();
        assert_eq!(own.domain, "127.0.0.1");
        assert!(!own.include_subdomains);
    }

    #[test]
    fn netscape_file_round_trips_through_text() {
        let text = "# Netscape HTTP Cookie File\n\
                    .example.com\tTRUE\t/\tFALSE\t0\tsid\tabc\n\
                    #HttpOnly_example.org\tFALSE\t/x\tTRUE\t1800000000\ttok\tv\n\
                    # a comment\n\
                    broken line\n";
        let jar = CookieJar::parse(text);
        assert_eq!(jar.len(), 2);
        assert!(jar.cookies()[1].http_only);
        assert_eq!(CookieJar::parse(&jar.to_netscape()), jar);
    }

    #[test]
    fn header_for_selects_matching_cookies() {
        let mut jar = CookieJar::new();
        let origin = url("http://example.com/");
        jar.store_response_cookies(
            ["a=1; Path=/", "b=2; Path=/admin", "c=3; Secure; Path=/"],
            &origin,
            NOW,
        );
        assert_eq!(jar.header_for(&url("http://example.com/index"), NOW).as_deref(), Some("a=1"));
        assert_eq!(
            jar.header_for(&url("http://example.com/admin/x"), NOW).as_deref(),
            Some("a=1; b=2")
        );
        assert_eq!(
            jar.header_for(&url("https://example.com/"), NOW).as_deref(),
            Some("a=1; c=3")
        );
        assert_eq!(jar.header_for(&url("http://other.com/"), NOW), None);
    }

    #[test]
    fn subdomain_cookies_need_the_flag() {
        let mut jar = CookieJar::new();
        jar.store_response_cookies(["host=1"], &url("http://example.com/"), NOW);
        jar.store_response_cookies(["wide=1; Domain=example.com"], &url("http://example.com/"), NOW);
        assert_eq!(
            jar.header_for(&url("http://api.example.com/"), NOW).as_deref(),
            Some("wide=1")
        );
    }

    #[test]
    fn expired_cookie_replaces_and_deletes() {
        let mut jar = CookieJar::new();
        let origin = url("http://example.com/");
        jar.store_response_cookies(["a=1; Path=/"], &origin, NOW);
        jar.store_response_cookies(["a=gone; Path=/; Max-Age=0"], &origin, NOW);
        assert!(jar.is_empty());
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CookieJar::load(&dir.path().join("nope")).is_empty());
    }
}
