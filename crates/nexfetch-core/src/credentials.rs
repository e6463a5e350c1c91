//! Credential resolution: turn configured auth fields into a Basic auth value.
//!
//! Secret backends stay outside the core. A password of the form
//! `gcp_secret!<id>` is looked up through the injected [`SecretStore`].

use crate::error::{FetchError, Result};
use anyhow::Context;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::process::Command;

/// Password prefix marking a reference into the secret store.
pub const SECRET_PREFIX: &str = "gcp_secret!";

/// Placeholder replaced by the secret id in [`CommandSecretStore`] arguments.
pub const SECRET_ID_PLACEHOLDER: &str = "{id}";

/// How the caller wants to authenticate against the repository.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum CredentialSpec {
    #[default]
    None,
    UsernamePassword { username: String, password: String },
    PreEncodedBasicAuthToken(String),
}

impl std::fmt::Debug for CredentialSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialSpec::None => write!(f, "None"),
            CredentialSpec::UsernamePassword { username, .. } => {
                write!(f, "UsernamePassword({}/***)", username)
            }
            CredentialSpec::PreEncodedBasicAuthToken(_) => write!(f, "PreEncodedBasicAuthToken(***)"),
        }
    }
}

fn non_empty(v: Option<&str>) -> Option<&str> {
    v.filter(|s| !s.is_empty())
}

impl CredentialSpec {
    /// Build a spec from raw optional fields. Empty strings count as absent.
    ///
    /// A full username/password pair together with a token is a conflict; a
    /// lone username or password is incomplete.
    pub fn from_fields(
        username: Option<&str>,
        password: Option<&str>,
        basic_auth: Option<&str>,
    ) -> Result<Self> {
        match (non_empty(username), non_empty(password), non_empty(basic_auth)) {
            (Some(_), Some(_), Some(_)) => Err(FetchError::ConflictingCredentials),
            (Some(u), Some(p), None) => Ok(CredentialSpec::UsernamePassword {
                username: u.to_string(),
                password: p.to_string(),
            }),
            (Some(_), None, _) | (None, Some(_), _) => Err(FetchError::IncompleteCredentials),
            (None, None, Some(t)) => Ok(CredentialSpec::PreEncodedBasicAuthToken(t.to_string())),
            (None, None, None) => Ok(CredentialSpec::None),
        }
    }
}

/// Narrow capability for fetching secret material by identifier.
pub trait SecretStore {
    fn fetch_secret(&self, id: &str) -> anyhow::Result<Vec<u8>>;
}

/// Store that refuses every lookup; for callers without a secret backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSecretStore;

impl SecretStore for NoSecretStore {
    fn fetch_secret(&self, id: &str) -> anyhow::Result<Vec<u8>> {
        anyhow::bail!("no secret store configured (requested {})", id)
    }
}

/// Runs an external command per lookup and captures its stdout as the secret.
///
/// `{id}` in any argument is replaced with the secret identifier, e.g.
/// `["gcloud", "secrets", "versions", "access", "latest", "--secret={id}"]`.
/// One trailing newline is stripped from the output.
#[derive(Debug, Clone)]
pub struct CommandSecretStore {
    argv: Vec<String>,
}

impl CommandSecretStore {
    pub fn new(argv: Vec<String>) -> anyhow::Result<Self> {
        if argv.is_empty() {
            anyhow::bail!("secret command must not be empty");
        }
        Ok(Self { argv })
    }
}

impl SecretStore for CommandSecretStore {
    fn fetch_secret(&self, id: &str) -> anyhow::Result<Vec<u8>> {
        let args: Vec<String> = self.argv[1..]
            .iter()
            .map(|a| a.replace(SECRET_ID_PLACEHOLDER, id))
            .collect();
        tracing::debug!(program = %self.argv[0], "running secret command");
        let output = Command::new(&self.argv[0])
            .args(&args)
            .output()
            .with_context(|| format!("failed to run {}", self.argv[0]))?;
        if !output.status.success() {
            anyhow::bail!(
                "{} exited with {}: {}",
                self.argv[0],
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        let mut secret = output.stdout;
        if secret.last() == Some(&b'\n') {
            secret.pop();
            if secret.last() == Some(&b'\r') {
                secret.pop();
            }
        }
        Ok(secret)
    }
}

/// Reads secrets from environment variables; the id is the variable name.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn fetch_secret(&self, id: &str) -> anyhow::Result<Vec<u8>> {
        let value = std::env::var(id).with_context(|| format!("environment variable {} not set", id))?;
        Ok(value.into_bytes())
    }
}

fn resolve_password(password: &str, store: &dyn SecretStore) -> Result<String> {
    let Some(id) = password.strip_prefix(SECRET_PREFIX) else {
        return Ok(password.to_string());
    };
    tracing::debug!("will read password from secret store");
    let bytes = store
        .fetch_secret(id)
        .map_err(|e| FetchError::SecretResolution {
            id: id.to_string(),
            source: e.into(),
        })?;
    String::from_utf8(bytes).map_err(|e| FetchError::SecretResolution {
        id: id.to_string(),
        source: Box::new(e),
    })
}

/// Resolve a spec into the value that follows `Basic ` in the Authorization header.
pub fn resolve(spec: &CredentialSpec, store: &dyn SecretStore) -> Result<Option<String>> {
    match spec {
        CredentialSpec::None => Ok(None),
        CredentialSpec::UsernamePassword { username, password } => {
            tracing::debug!("will use username/password authentication ({}/***)", username);
            let password = resolve_password(password, store)?;
            Ok(Some(STANDARD.encode(format!("{}:{}", username, password))))
        }
        CredentialSpec::PreEncodedBasicAuthToken(token) => {
            tracing::debug!("will use authentication with base64 token");
            STANDARD
                .decode(token)
                .map_err(FetchError::InvalidCredentialFormat)?;
            Ok(Some(token.clone()))
        }
    }
}
