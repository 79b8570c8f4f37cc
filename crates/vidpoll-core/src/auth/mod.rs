//! Authentication module - credential discovery
//!
//! Locates an authorized-user token file and extracts the bearer token used
//! for `videos.list` calls. Token refresh is not handled: an expired token
//! surfaces as a fatal 401 on the first fetch.
//!
//! Search order:
//!
//! 1. Explicit path (`--credentials`)
//! 2. `$VIDPOLL_CREDENTIALS`
//! 3. `config/token.json`
//! 4. `credentials.json`

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::utils::expand_path;

/// Environment variable naming a credentials file
pub const CREDENTIALS_ENV: &str = "VIDPOLL_CREDENTIALS";

/// Default credential files, relative to the working directory
pub const DEFAULT_CREDENTIAL_PATHS: [&str; 2] = ["config/token.json", "credentials.json"];

/// Authorized-user token file (as written by Google's OAuth helpers)
///
/// Both spellings may be present; `token` wins.
#[derive(Debug, Deserialize)]
struct TokenFile {
    token: Option<String>,
    access_token: Option<String>,
}

impl TokenFile {
    fn bearer(self) -> Option<String> {
        [self.token, self.access_token]
            .into_iter()
            .flatten()
            .map(|t| t.trim().to_string())
            .find(|t| !t.is_empty())
    }
}

/// A usable credential and where it came from
#[derive(Clone)]
pub struct Credentials {
    pub access_token: String,
    pub source: PathBuf,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"****")
            .field("source", &self.source)
            .finish()
    }
}

/// Candidate credential paths in priority order
pub fn credential_candidates(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(path) = explicit {
        candidates.push(expand_path(path));
    }
    if let Ok(p) = std::env::var(CREDENTIALS_ENV) {
        if !p.trim().is_empty() {
            candidates.push(expand_path(Path::new(&p)));
        }
    }
    candidates.extend(DEFAULT_CREDENTIAL_PATHS.iter().map(PathBuf::from));
    candidates
}

/// First existing path among `candidates`
pub fn find_credentials_path(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|p| p.is_file()).cloned()
}

/// Read and parse a token file
pub fn load_credentials(path: &Path) -> Result<Credentials> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::auth(format!("cannot read credentials {}: {}", path.display(), e))
    })?;
    let file: TokenFile = serde_json::from_str(&content).map_err(|e| {
        log::error!("[auth] Failed to parse credentials {}: {}", path.display(), e);
        Error::auth(format!("invalid credentials file {}: {}", path.display(), e))
    })?;

    let token = file
        .bearer()
        .ok_or_else(|| {
            Error::auth(format!("no access token in {}", path.display()))
        })?;

    log::debug!("[auth] Loaded credentials from {}", path.display());
    Ok(Credentials {
        access_token: token,
        source: path.to_path_buf(),
    })
}

/// Discover credentials using the standard search order
///
/// An explicit path that does not exist is an error rather than a reason to
/// fall through to the defaults.
pub fn discover_credentials(explicit: Option<&Path>) -> Result<Credentials> {
    if let Some(path) = explicit {
        let expanded = expand_path(path);
        if !expanded.is_file() {
            return Err(Error::auth(format!(
                "credentials file not found: {}",
                expanded.display()
            )));
        }
        return load_credentials(&expanded);
    }

    let candidates = credential_candidates(None);
    match find_credentials_path(&candidates) {
        Some(path) => load_credentials(&path),
        None => {
            let searched: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
            log::warn!("[auth] No credentials found in {:?}", searched);
            Err(Error::auth(format!(
                "no credentials found; put an authorized token at one of: {}",
                searched.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_token_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, r#"{"token": "ya29.abc", "refresh_token": "1//x"}"#).unwrap();

        let creds = load_credentials(&path).unwrap();
        assert_eq!(creds.access_token, "ya29.abc");
        assert_eq!(creds.source, path);
    }

    #[test]
    fn test_load_access_token_alias() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, r#"{"access_token": "ya29.def"}"#).unwrap();

        assert_eq!(load_credentials(&path).unwrap().access_token, "ya29.def");
    }

    #[test]
    fn test_both_token_fields_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(
            &path,
            r#"{"token": "ya29.abc", "access_token": "ya29.old", "expiry": "2024-05-01T00:00:00Z"}"#,
        )
        .unwrap();

        assert_eq!(load_credentials(&path).unwrap().access_token, "ya29.abc");
    }

    #[test]
    fn test_blank_token_falls_back_to_access_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, r#"{"token": "", "access_token": "ya29.def"}"#).unwrap();

        assert_eq!(load_credentials(&path).unwrap().access_token, "ya29.def");
    }

    #[test]
    fn test_missing_token_is_auth_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, r#"{"client_id": "x", "token": "  "}"#).unwrap();

        let err = load_credentials(&path).unwrap_err();
        assert!(matches!(err, Error::AuthenticationUnavailable(_)));
    }

    #[test]
    fn test_invalid_json_is_auth_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "{{").unwrap();

        assert!(matches!(
            load_credentials(&path),
            Err(Error::AuthenticationUnavailable(_))
        ));
    }

    #[test]
    fn test_find_first_existing_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        let present = dir.path().join("present.json");
        std::fs::write(&present, r#"{"token": "t"}"#).unwrap();

        let found = find_credentials_path(&[missing, present.clone()]);
        assert_eq!(found, Some(present));
    }

    #[test]
    fn test_find_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(find_credentials_path(&[dir.path().join("nope.json")]), None);
    }

    #[test]
    fn test_explicit_missing_path_is_auth_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_credentials(Some(&dir.path().join("nope.json"))).unwrap_err();
        assert!(matches!(err, Error::AuthenticationUnavailable(_)));
    }

    #[test]
    fn test_candidates_include_defaults_last() {
        let candidates = credential_candidates(Some(Path::new("/tmp/explicit.json")));
        assert_eq!(candidates[0], PathBuf::from("/tmp/explicit.json"));
        assert!(candidates.ends_with(&[
            PathBuf::from("config/token.json"),
            PathBuf::from("credentials.json")
        ]));
    }

    #[test]
    fn test_debug_masks_token() {
        let creds = Credentials {
            access_token: "secret".to_string(),
            source: PathBuf::from("token.json"),
        };
        assert!(!format!("{:?}", creds).contains("secret"));
    }
}
