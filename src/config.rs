//! Credential loading and validation.
//!
//! Credentials come from `HUBBLE_CREDENTIALS` (standard base64 of
//! `org:token` or `org:token:board`) or from the `HUBBLE_ORG_ID` and
//! `HUBBLE_API_TOKEN` pair. Variable lookup is injected so the loader can
//! be tested without touching the process environment.

use crate::boards;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

/// Where to create or copy credentials.
pub const CREDENTIALS_URL: &str = "https://dash.hubble.com/developer/api-tokens";

/// Base64 `org:token[:board]` blob.
pub const CREDENTIALS_VAR: &str = "HUBBLE_CREDENTIALS";
/// Plain organization ID.
pub const ORG_ID_VAR: &str = "HUBBLE_ORG_ID";
/// Plain API token.
pub const API_TOKEN_VAR: &str = "HUBBLE_API_TOKEN";

/// Minimum API token length.
const MIN_TOKEN_LEN: usize = 32;

/// Errors from loading or validating credentials.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// The organization ID is not a UUID.
    #[error("org_id must be a UUID (xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx): {reason}")]
    InvalidOrgId {
        /// What was wrong.
        reason: String,
    },

    /// The API token is not a hex string of sufficient length.
    #[error("api_token is invalid: {reason}")]
    InvalidApiToken {
        /// What was wrong.
        reason: String,
    },

    /// A board embedded in the credentials is not in the catalog.
    #[error("unknown board '{board}'")]
    UnknownBoard {
        /// The unrecognised identifier.
        board: String,
    },

    /// A credential variable was set but could not be used.
    #[error("invalid credentials from {source_var}: {inner}")]
    FromVariable {
        /// The variable the credentials came from.
        source_var: &'static str,
        /// The underlying problem.
        inner: Box<ConfigError>,
    },
}

impl ConfigError {
    /// Get an actionable suggestion for fixing this error.
    pub fn fix_suggestion(&self) -> String {
        match self {
            Self::UnknownBoard { .. } => format!(
                "Use one of: {}",
                boards::BOARDS.iter().map(|b| b.id).collect::<Vec<_>>().join(", ")
            ),
            Self::FromVariable { inner, .. } => inner.fix_suggestion(),
            Self::InvalidOrgId { .. } | Self::InvalidApiToken { .. } => {
                format!("Copy your Org ID and API token from {CREDENTIALS_URL}")
            }
        }
    }

    fn from_var(source_var: &'static str, inner: ConfigError) -> Self {
        Self::FromVariable {
            source_var,
            inner: Box::new(inner),
        }
    }
}

/// Organization credentials and an optional preselected board.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Organization ID (a UUID).
    pub org_id: String,
    /// API token (hex).
    pub api_token: String,
    /// Board identifier, when the credentials named one.
    pub board: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("org_id", &self.org_id)
            .field("api_token", &"***")
            .field("board", &self.board)
            .finish()
    }
}

impl Credentials {
    /// Validate an org ID and token pair.
    ///
    /// ```rust
    /// use hubble_install::config::Credentials;
    ///
    /// let creds = Credentials::new(
    ///     "0f61efd0-24a7-4a2e-ae0f-8549d14ed901",
    ///     "eb31d24113fadb77c6d89d65a8007c0e",
    /// );
    /// assert!(creds.is_ok());
    /// assert!(Credentials::new("not-a-uuid", "eb31d24113fadb77c6d89d65a8007c0e").is_err());
    /// ```
    pub fn new(org_id: impl Into<String>, api_token: impl Into<String>) -> Result<Self, ConfigError> {
        let org_id = org_id.into().trim().to_string();
        let api_token = api_token.into().trim().to_string();
        validate_org_id(&org_id)?;
        validate_api_token(&api_token)?;
        Ok(Self {
            org_id,
            api_token,
            board: None,
        })
    }

    /// Load credentials from the environment through `lookup`.
    ///
    /// Returns `Ok(None)` when no usable credentials are configured, in
    /// which case the caller should prompt. A `HUBBLE_CREDENTIALS` value
    /// that does not decode to at least two fields is ignored.
    pub fn from_lookup<F>(lookup: F) -> Result<Option<Self>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(creds) = get(CREDENTIALS_VAR).and_then(|blob| decode_blob(&blob)) {
            let (org_id, api_token, board) = creds;
            let mut creds = Self::new(org_id, api_token)
                .map_err(|e| ConfigError::from_var(CREDENTIALS_VAR, e))?;
            if let Some(board) = board.filter(|b| !b.is_empty()) {
                let found = boards::find(&board).ok_or_else(|| {
                    ConfigError::from_var(CREDENTIALS_VAR, ConfigError::UnknownBoard { board })
                })?;
                creds.board = Some(found.id.to_string());
            }
            return Ok(Some(creds));
        }

        match (get(ORG_ID_VAR), get(API_TOKEN_VAR)) {
            (Some(org_id), Some(api_token)) => Self::new(org_id, api_token)
                .map(Some)
                .map_err(|e| ConfigError::from_var(ORG_ID_VAR, e)),
            _ => Ok(None),
        }
    }

    /// Load credentials from the process environment.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

fn decode_blob(blob: &str) -> Option<(String, String, Option<String>)> {
    let bytes = STANDARD.decode(blob.trim()).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    let mut parts = text.splitn(3, ':').map(|part| part.trim().to_string());
    let org_id = parts.next().filter(|p| !p.is_empty())?;
    let api_token = parts.next().filter(|p| !p.is_empty())?;
    Some((org_id, api_token, parts.next()))
}

/// Check that `org_id` is a hyphenated UUID.
pub fn validate_org_id(org_id: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| Err(ConfigError::InvalidOrgId { reason });
    if org_id.len() != 36 {
        return invalid(format!("expected 36 characters, got {}", org_id.len()));
    }
    for (index, c) in org_id.chars().enumerate() {
        let hyphen_slot = matches!(index, 8 | 13 | 18 | 23);
        if hyphen_slot && c != '-' {
            return invalid(format!("expected '-' at position {index}"));
        }
        if !hyphen_slot && !c.is_ascii_hexdigit() {
            return invalid(format!("invalid character '{c}'"));
        }
    }
    Ok(())
}

/// Check that `api_token` is a hex string of at least 32 characters.
pub fn validate_api_token(api_token: &str) -> Result<(), ConfigError> {
    if api_token.len() < MIN_TOKEN_LEN {
        return Err(ConfigError::InvalidApiToken {
            reason: format!(
                "too short (expected at least {MIN_TOKEN_LEN} hex characters, got {})",
                api_token.len()
            ),
        });
    }
    if let Some(c) = api_token.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(ConfigError::InvalidApiToken {
            reason: format!("must be hexadecimal (found '{c}')"),
        });
    }
    Ok(())
}
