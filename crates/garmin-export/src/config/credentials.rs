use crate::client::{OAuth1Token, OAuth2Token};
use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

const OAUTH1_FILENAME: &str = "oauth1_token.json";
const OAUTH2_FILENAME: &str = "oauth2_token.json";

/// Directory holding the OAuth token pair between runs.
///
/// The layout matches garth's `dump`/`resume`, so a directory written by the
/// Python tooling can be reused as-is.
#[derive(Debug, Clone)]
pub struct TokenStore {
    dir: PathBuf,
}

impl TokenStore {
    /// Point the store at `dir`. Nothing is created until tokens are saved.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save_oauth1(&self, token: &OAuth1Token) -> Result<()> {
        self.write_json(OAUTH1_FILENAME, &serde_json::to_string_pretty(token)?)
    }

    pub fn load_oauth1(&self) -> Result<Option<OAuth1Token>> {
        let path = self.dir.join(OAUTH1_FILENAME);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    pub fn save_oauth2(&self, token: &OAuth2Token) -> Result<()> {
        self.write_json(OAUTH2_FILENAME, &serde_json::to_string_pretty(token)?)
    }

    pub fn load_oauth2(&self) -> Result<Option<OAuth2Token>> {
        let path = self.dir.join(OAUTH2_FILENAME);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    pub fn save_tokens(&self, oauth1: &OAuth1Token, oauth2: &OAuth2Token) -> Result<()> {
        self.save_oauth1(oauth1)?;
        self.save_oauth2(oauth2)
    }

    /// Load both tokens, returns None if either is missing
    pub fn load_tokens(&self) -> Result<Option<(OAuth1Token, OAuth2Token)>> {
        match (self.load_oauth1()?, self.load_oauth2()?) {
            (Some(o1), Some(o2)) => Ok(Some((o1, o2))),
            _ => Ok(None),
        }
    }

    pub fn has_tokens(&self) -> bool {
        self.dir.join(OAUTH1_FILENAME).exists() && self.dir.join(OAUTH2_FILENAME).exists()
    }

    /// Remove both token files, leaving the directory in place
    pub fn clear(&self) -> Result<()> {
        for name in [OAUTH1_FILENAME, OAUTH2_FILENAME] {
            let path = self.dir.join(name);
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    fn write_json(&self, name: &str, json: &str) -> Result<()> {
        super::ensure_dir(&self.dir)?;
        let path = self.dir.join(name);
        fs::write(&path, json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}
