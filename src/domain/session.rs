use serde::{Deserialize, Serialize};

use crate::app::{Result, SluiceError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
}

impl Cookie {
    /// Parse a JSON array of cookies. An empty list is treated as malformed:
    /// it can never authenticate anything.
    pub fn parse_list(raw: &str) -> Result<Vec<Cookie>> {
        let cookies: Vec<Cookie> = serde_json::from_str(raw)
            .map_err(|e| SluiceError::CredentialParse(e.to_string()))?;
        Self::validate(cookies)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Vec<Cookie>> {
        let cookies: Vec<Cookie> = serde_json::from_value(value)
            .map_err(|e| SluiceError::CredentialParse(e.to_string()))?;
        Self::validate(cookies)
    }

    fn validate(cookies: Vec<Cookie>) -> Result<Vec<Cookie>> {
        if cookies.is_empty() {
            return Err(SluiceError::CredentialParse("empty cookie list".into()));
        }
        if let Some(bad) = cookies.iter().find(|c| c.name.trim().is_empty()) {
            return Err(SluiceError::CredentialParse(format!(
                "cookie without name (value {:?})",
                bad.value
            )));
        }
        Ok(cookies)
    }
}

/// Authentication state of one source instance.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub identity: String,
    pub cookies: Vec<Cookie>,
    pub authenticated: bool,
}

impl Session {
    pub fn new(identity: &str) -> Self {
        Self {
            identity: identity.to_string(),
            cookies: Vec::new(),
            authenticated: false,
        }
    }
}
