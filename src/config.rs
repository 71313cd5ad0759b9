// src/config.rs
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
    #[serde(default = "default_site_name")]
    pub site_name: String,
    #[serde(default = "default_site_url")]
    pub site_url: String,
    // SMTP is optional; without it outgoing mail is logged and dropped.
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default)]
    pub smtp_username: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
    #[serde(default)]
    pub from_email: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_token_ttl_hours() -> i64 {
    24
}

fn default_site_name() -> String {
    "NewsDesk".to_string()
}

fn default_site_url() -> String {
    "http://127.0.0.1:8080".to_string()
}
