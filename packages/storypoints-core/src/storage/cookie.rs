/// Cookie jar backend, the last resort of the fallback chain.
///
/// One `name=value; expires=<date>` line per setting. Values are
/// percent-escaped and cookies live for 364 days.
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use super::{SettingsStore, StorageError};

pub const COOKIE_LIFETIME_DAYS: i64 = 364;

/// Characters left unescaped, as a browser's `escape()` does.
const COOKIE_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'@')
    .remove(b'*')
    .remove(b'_')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'/');

const EXPIRES_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Cookie {
    value: String,
    expires: Option<DateTime<Utc>>,
}

pub struct CookieStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CookieStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn read_jar(&self) -> Result<BTreeMap<String, Cookie>, StorageError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(content.lines().filter_map(parse_cookie).collect())
    }

    fn write_jar(&self, jar: &BTreeMap<String, Cookie>) -> Result<(), StorageError> {
        let mut content = String::new();
        for (name, cookie) in jar {
            content.push_str(&format_cookie(name, cookie));
            content.push('\n');
        }
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        fs::write(&self.path, content)?;
        Ok(())
    }
}

fn parse_cookie(line: &str) -> Option<(String, Cookie)> {
    let mut parts = line.split(';');
    let (name, raw_value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let value = percent_decode_str(raw_value.trim())
        .decode_utf8_lossy()
        .to_string();
    let expires = parts
        .filter_map(|attr| attr.trim().strip_prefix("expires="))
        .find_map(|date| DateTime::parse_from_rfc2822(date.trim()).ok())
        .map(|date| date.with_timezone(&Utc));
    Some((name.to_string(), Cookie { value, expires }))
}

fn format_cookie(name: &str, cookie: &Cookie) -> String {
    let value = utf8_percent_encode(&cookie.value, COOKIE_VALUE).to_string();
    match cookie.expires {
        Some(expires) => format!("{}={}; expires={}", name, value, expires.format(EXPIRES_FORMAT)),
        None => format!("{}={}", name, value),
    }
}

impl SettingsStore for CookieStore {
    fn name(&self) -> &str {
        "cookie"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let now = Utc::now();
        Ok(self
            .read_jar()?
            .remove(key)
            .filter(|cookie| cookie.expires.map_or(true, |expires| expires > now))
            .map(|cookie| cookie.value))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StorageError::Unavailable("cookie jar lock poisoned".to_string()))?;
        let mut jar = self.read_jar()?;
        jar.insert(
            key.to_string(),
            Cookie {
                value: value.to_string(),
                expires: Some(Utc::now() + Duration::days(COOKIE_LIFETIME_DAYS)),
            },
        );
        self.write_jar(&jar)
    }
}
