use std::{net, time};

use serde::Deserialize;

#[derive(Deserialize)]
pub struct Config {
    pub db: Db,
    pub http: Http,
    pub jwt: Jwt,

    /// Absent section means the inference endpoints are unavailable: the
    /// triage gate always uses its keyword fallback and invoice scanning
    /// reports itself as not configured.
    pub inference: Option<Inference>,
}

#[derive(Deserialize)]
pub struct Db {
    pub url: String,
}

#[derive(Deserialize)]
pub struct Http {
    pub server: Server,
    pub cors: Cors,
}

#[derive(Deserialize)]
pub struct Server {
    pub addr: net::SocketAddr,
}

#[derive(Deserialize)]
pub struct Cors {
    pub allowed_origins: Vec<String>,
}

#[derive(Deserialize)]
pub struct Jwt {
    pub secret: String,
    #[serde(with = "humantime_serde")]
    pub expiration_time: time::Duration,
}

#[derive(Clone, Deserialize)]
pub struct Inference {
    /// Complaint triage endpoint: POST `{issue}` -> `{valid, summary, mins}`.
    pub chat_url: String,

    /// Invoice scan endpoint: POST `{imageBase64, mimeType}`
    /// -> `{items, supplier}`.
    pub invoice_url: String,

    pub api_key: String,

    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: time::Duration,
}

fn default_timeout() -> time::Duration {
    time::Duration::from_secs(10)
}
