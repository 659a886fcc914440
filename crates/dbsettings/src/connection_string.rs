//! `key=value;` connection string parsing and rendering.
//!
//! Follows the SQL Server client conventions: keys are case-insensitive and
//! have synonyms, values may be quoted with `'` or `"` (a doubled quote inside
//! a quoted value is a literal quote), and the last occurrence of a key wins.

use std::error::Error;
use std::fmt;

pub const DATA_SOURCE: &str = "Data Source";
pub const INITIAL_CATALOG: &str = "Initial Catalog";
pub const INTEGRATED_SECURITY: &str = "Integrated Security";
pub const USER_ID: &str = "User ID";
pub const PASSWORD: &str = "Password";

/// Render order for the well-known keys; anything else follows in insertion order.
const CANONICAL_ORDER: &[&str] = &[
    DATA_SOURCE,
    INITIAL_CATALOG,
    INTEGRATED_SECURITY,
    USER_ID,
    PASSWORD,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStringError {
    message: String,
}

impl ConnectionStringError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ConnectionStringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for ConnectionStringError {}

/// Structured view of a connection string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStringBuilder {
    pairs: Vec<(String, String)>,
}

impl ConnectionStringBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a connection string into its key/value pairs.
    pub fn parse(input: &str) -> Result<Self, ConnectionStringError> {
        let mut builder = Self::new();
        let chars: Vec<char> = input.chars().collect();
        let mut pos = 0;

        loop {
            while pos < chars.len() && (chars[pos].is_whitespace() || chars[pos] == ';') {
                pos += 1;
            }
            if pos >= chars.len() {
                break;
            }

            let key_start = pos;
            while pos < chars.len() && chars[pos] != '=' && chars[pos] != ';' {
                pos += 1;
            }
            let key: String = chars[key_start..pos].iter().collect();
            let key = key.trim();
            if pos >= chars.len() || chars[pos] == ';' {
                return Err(ConnectionStringError::new(format!(
                    "Expected '=' after key '{}'",
                    key
                )));
            }
            if key.is_empty() {
                return Err(ConnectionStringError::new("Empty key before '='"));
            }
            pos += 1;

            while pos < chars.len() && chars[pos].is_whitespace() {
                pos += 1;
            }

            let value = if pos < chars.len() && (chars[pos] == '"' || chars[pos] == '\'') {
                let (value, next) = read_quoted(&chars, pos, key)?;
                pos = next;
                while pos < chars.len() && chars[pos].is_whitespace() {
                    pos += 1;
                }
                if pos < chars.len() && chars[pos] != ';' {
                    return Err(ConnectionStringError::new(format!(
                        "Unexpected text after quoted value of '{}'",
                        key
                    )));
                }
                value
            } else {
                let value_start = pos;
                while pos < chars.len() && chars[pos] != ';' {
                    pos += 1;
                }
                let raw: String = chars[value_start..pos].iter().collect();
                raw.trim().to_string()
            };

            builder.set(key, value);
        }

        Ok(builder)
    }

    /// Get a value by key or any of its synonyms.
    pub fn get(&self, key: &str) -> Option<&str> {
        let key = canonical_key(key);
        self.pairs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
            .map(|(_, v)| v.as_str())
    }

    /// Set a value, replacing any existing value under the same key.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let key = canonical_key(key);
        let value = value.into();
        match self
            .pairs
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
        {
            Some(pair) => pair.1 = value,
            None => self.pairs.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let key = canonical_key(key);
        let idx = self
            .pairs
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(&key))?;
        Some(self.pairs.remove(idx).1)
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn data_source(&self) -> Option<&str> {
        self.get(DATA_SOURCE)
    }

    pub fn set_data_source(&mut self, value: impl Into<String>) {
        self.set(DATA_SOURCE, value);
    }

    pub fn initial_catalog(&self) -> Option<&str> {
        self.get(INITIAL_CATALOG)
    }

    pub fn set_initial_catalog(&mut self, value: impl Into<String>) {
        self.set(INITIAL_CATALOG, value);
    }

    /// Whether Windows integrated authentication is requested (default `false`).
    pub fn integrated_security(&self) -> Result<bool, ConnectionStringError> {
        match self.get(INTEGRATED_SECURITY) {
            None => Ok(false),
            Some(raw) => parse_bool(raw).ok_or_else(|| {
                ConnectionStringError::new(format!(
                    "Invalid value for '{}': {}",
                    INTEGRATED_SECURITY, raw
                ))
            }),
        }
    }

    pub fn set_integrated_security(&mut self, enabled: bool) {
        self.set(INTEGRATED_SECURITY, if enabled { "True" } else { "False" });
    }

    pub fn user_id(&self) -> Option<&str> {
        self.get(USER_ID)
    }

    pub fn set_user_id(&mut self, value: impl Into<String>) {
        self.set(USER_ID, value);
    }

    pub fn password(&self) -> Option<&str> {
        self.get(PASSWORD)
    }

    pub fn set_password(&mut self, value: impl Into<String>) {
        self.set(PASSWORD, value);
    }
}

impl fmt::Display for ConnectionStringBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let known = CANONICAL_ORDER
            .iter()
            .filter_map(|key| self.pairs.iter().find(|(k, _)| k == key));
        let others = self
            .pairs
            .iter()
            .filter(|(k, _)| !CANONICAL_ORDER.contains(&k.as_str()));

        let mut first = true;
        for (key, value) in known.chain(others) {
            if !first {
                f.write_str(";")?;
            }
            first = false;
            write!(f, "{}={}", key, quote_value(value))?;
        }
        Ok(())
    }
}

fn read_quoted(
    chars: &[char],
    start: usize,
    key: &str,
) -> Result<(String, usize), ConnectionStringError> {
    let quote = chars[start];
    let mut value = String::new();
    let mut pos = start + 1;

    while pos < chars.len() {
        if chars[pos] == quote {
            if pos + 1 < chars.len() && chars[pos + 1] == quote {
                value.push(quote);
                pos += 2;
                continue;
            }
            return Ok((value, pos + 1));
        }
        value.push(chars[pos]);
        pos += 1;
    }

    Err(ConnectionStringError::new(format!(
        "Unterminated quoted value for '{}'",
        key
    )))
}

fn canonical_key(key: &str) -> String {
    let trimmed = key.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "data source" | "server" | "address" | "addr" | "network address" => {
            DATA_SOURCE.to_string()
        }
        "initial catalog" | "database" => INITIAL_CATALOG.to_string(),
        "integrated security" | "trusted_connection" => INTEGRATED_SECURITY.to_string(),
        "user id" | "uid" | "user" => USER_ID.to_string(),
        "password" | "pwd" => PASSWORD.to_string(),
        _ => trimmed.to_string(),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "sspi" => Some(true),
        "false" | "no" => Some(false),
        _ => None,
    }
}

fn quote_value(value: &str) -> String {
    let needs_quotes = value.contains(';')
        || value.starts_with('"')
        || value.starts_with('\'')
        || value.trim() != value;
    if !needs_quotes {
        return value.to_string();
    }
    if !value.contains('"') {
        format!("\"{}\"", value)
    } else if !value.contains('\'') {
        format!("'{}'", value)
    } else {
        format!("\"{}\"", value.replace('"', "\"\""))
    }
}
