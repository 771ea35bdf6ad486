use serde::Deserialize;

/// Site-wide settings, read from the Rocket configuration (`Rocket.toml` or
/// `ROCKET_*` environment variables).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL used for links in emails, without a trailing slash.
    pub public_url: String,
    /// Name used to sign emails.
    pub site_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            public_url: "http://localhost:8000".to_string(),
            site_name: "Events".to_string(),
        }
    }
}

impl AppConfig {
    pub fn event_url(&self, slug: &str) -> String {
        format!("{}/events/{slug}", self.public_url.trim_end_matches('/'))
    }
}
