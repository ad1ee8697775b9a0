//! Provider credentials and the http client options built from them.
use anyhow::{anyhow, Context, Result};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::RecipeError;

pub const EARTHDATA_LOGIN_HOST: &str = "urs.earthdata.nasa.gov";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub account: Option<String>,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            account: None,
        }
    }
}

// The password must never end up in logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("account", &self.account)
            .finish()
    }
}

pub trait CredentialStore {
    fn lookup(&self, host: &str) -> Result<Credentials, RecipeError>;
}

/// Credentials parsed from a netrc file.
#[derive(Debug, Default, Clone)]
pub struct Netrc {
    machines: Vec<(String, Credentials)>,
    default: Option<Credentials>,
}

impl Netrc {
    /// Resolves the netrc location: an explicit path wins, then `$NETRC`, then
    /// `~/.netrc`.
    pub fn locate(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        if let Some(path) = std::env::var_os("NETRC") {
            return Ok(PathBuf::from(path));
        }
        let home = dirs::home_dir().ok_or(anyhow!("Unable to determine home directory"))?;
        Ok(home.join(".netrc"))
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Error reading netrc file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut lexer = Lexer::new(content);
        let mut netrc = Self::default();
        let mut entries: Vec<(Option<String>, HashMap<&str, String>)> = vec![];
        while let Some(token) = lexer.keyword() {
            match token.as_str() {
                "machine" => {
                    let host = lexer.value().ok_or(anyhow!("netrc: 'machine' without a host"))?;
                    entries.push((Some(host), HashMap::new()));
                }
                "default" => entries.push((None, HashMap::new())),
                "macdef" => lexer.skip_macro(),
                "login" | "user" | "password" | "account" => {
                    let field = match token.as_str() {
                        "user" => "login",
                        "password" => "password",
                        "account" => "account",
                        _ => "login",
                    };
                    let value = lexer
                        .value()
                        .ok_or(anyhow!("netrc: '{}' without a value", token))?;
                    let (_, fields) = entries
                        .last_mut()
                        .ok_or(anyhow!("netrc: '{}' outside of a machine entry", token))?;
                    fields.insert(field, value);
                }
                other => return Err(anyhow!("netrc: unexpected token '{}'", other)),
            }
        }

        for (host, mut fields) in entries {
            let credentials = Credentials {
                username: fields.remove("login").unwrap_or_default(),
                password: fields.remove("password").unwrap_or_default(),
                account: fields.remove("account"),
            };
            match host {
                Some(host) => netrc.machines.push((host, credentials)),
                None => netrc.default = netrc.default.or(Some(credentials)),
            }
        }

        Ok(netrc)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.machines.iter().map(|(h, _)| h.as_str())
    }
}

/// Splits netrc content into tokens. `#` starts a comment only where a
/// keyword is expected; values are read raw and may be double quoted.
struct Lexer {
    chars: Vec<char>,
    pos: usize,
}

impl Lexer {
    fn new(content: &str) -> Self {
        Self {
            chars: content.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.peek() {
            self.pos += 1;
            if c == '\n' {
                break;
            }
        }
    }

    fn keyword(&mut self) -> Option<String> {
        loop {
            self.skip_whitespace();
            if self.peek() == Some('#') {
                self.skip_line();
                continue;
            }
            return self.word();
        }
    }

    fn value(&mut self) -> Option<String> {
        self.skip_whitespace();
        self.word()
    }

    fn word(&mut self) -> Option<String> {
        let mut word = String::new();
        if self.peek()? == '"' {
            self.pos += 1;
            while let Some(c) = self.peek() {
                self.pos += 1;
                match c {
                    '"' => break,
                    '\\' => {
                        if let Some(escaped) = self.peek() {
                            word.push(escaped);
                            self.pos += 1;
                        }
                    }
                    c => word.push(c),
                }
            }
            return Some(word);
        }
        while let Some(c) = self.peek().filter(|c| !c.is_whitespace()) {
            self.pos += 1;
            if c == '\\' {
                if let Some(escaped) = self.peek() {
                    word.push(escaped);
                    self.pos += 1;
                }
            } else {
                word.push(c);
            }
        }
        Some(word)
    }

    /// A macro body runs from the line after `macdef <name>` to the next
    /// blank line.
    fn skip_macro(&mut self) {
        self.skip_line();
        loop {
            let start = self.pos;
            self.skip_line();
            let line = &self.chars[start..self.pos];
            if line.iter().all(|c| c.is_whitespace()) {
                break;
            }
        }
    }
}

impl CredentialStore for Netrc {
    fn lookup(&self, host: &str) -> Result<Credentials, RecipeError> {
        self.machines
            .iter()
            .find(|(h, _)| h == host)
            .map(|(_, c)| c.clone())
            .or_else(|| self.default.clone())
            .ok_or_else(|| RecipeError::CredentialNotFound(host.to_string()))
    }
}

/// A fixed set of credentials, for callers that already hold them.
#[derive(Debug, Default, Clone)]
pub struct StaticCredentials {
    entries: HashMap<String, Credentials>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, host: &str, credentials: Credentials) -> Self {
        self.entries.insert(host.to_string(), credentials);
        self
    }
}

impl CredentialStore for StaticCredentials {
    fn lookup(&self, host: &str) -> Result<Credentials, RecipeError> {
        self.entries
            .get(host)
            .cloned()
            .ok_or_else(|| RecipeError::CredentialNotFound(host.to_string()))
    }
}

/// Options handed to the http client of the stages that open remote files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    host: String,
    credentials: Option<Credentials>,
    trust_env: bool,
}

impl ClientOptions {
    pub fn new(host: &str, credentials: Credentials, trust_env: bool) -> Self {
        Self {
            host: host.to_string(),
            credentials: Some(credentials),
            trust_env,
        }
    }

    pub fn anonymous(host: &str, trust_env: bool) -> Self {
        Self {
            host: host.to_string(),
            credentials: None,
            trust_env,
        }
    }

    pub fn from_store(
        store: &impl CredentialStore,
        host: &str,
        trust_env: bool,
    ) -> Result<Self, RecipeError> {
        let credentials = store.lookup(host)?;
        Ok(Self::new(host, credentials, trust_env))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn trust_env(&self) -> bool {
        self.trust_env
    }

    /// Fails unless both halves of the basic-auth pair are present.
    pub fn require_auth(&self) -> Result<&Credentials, RecipeError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(RecipeError::MissingCredentials("username and password"))?;
        if credentials.username.is_empty() {
            return Err(RecipeError::MissingCredentials("username"));
        }
        if credentials.password.is_empty() {
            return Err(RecipeError::MissingCredentials("password"));
        }
        Ok(credentials)
    }
}

/// Serialized options name the credential host and user, never the password.
impl Serialize for ClientOptions {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(serde::Serialize)]
        struct AuthRef<'a> {
            host: &'a str,
            username: &'a str,
        }

        let auth = self.credentials.as_ref().map(|c| AuthRef {
            host: &self.host,
            username: &c.username,
        });
        let mut state = serializer.serialize_struct("ClientOptions", 2)?;
        state.serialize_field("auth", &auth)?;
        state.serialize_field("trust_env", &self.trust_env)?;
        state.end()
    }
}
