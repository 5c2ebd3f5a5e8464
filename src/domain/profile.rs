use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    #[serde(alias = "username")]
    pub handle: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub profile_image_url_https: Option<String>,
    pub profile_image_url: Option<String>,
    pub biography: Option<String>,
}

impl Profile {
    /// First non-empty avatar candidate, in priority order.
    pub fn avatar_url(&self) -> Option<&str> {
        [
            self.avatar.as_deref(),
            self.profile_image_url_https.as_deref(),
            self.profile_image_url.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
    }
}
