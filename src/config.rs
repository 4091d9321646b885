// src/config.rs
use std::{env, fmt, str::FromStr};

use crate::error::ConfigError;

pub const DEFAULT_INDEX: &str = "rag";
pub const DEFAULT_NAMESPACE: &str = "ns1";
pub const DEFAULT_TOP_K: usize = 5;

#[derive(Clone)]
pub struct Config {
    pub pinecone_api_key: String,
    pub gemini_api_key: String,
    pub pinecone_index: String,
    pub pinecone_namespace: String,
    pub pinecone_index_host: Option<String>,
    pub pinecone_control_url: String,
    pub gemini_base_url: String,
    pub embedding_model: String,
    pub chat_model: String,
    pub top_k: usize,
    pub bind_addr: String,
    pub static_dir: String,
    pub stream_tokens: bool,
}

// Keys stay out of the logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("pinecone_index", &self.pinecone_index)
            .field("pinecone_namespace", &self.pinecone_namespace)
            .field("pinecone_index_host", &self.pinecone_index_host)
            .field("pinecone_control_url", &self.pinecone_control_url)
            .field("gemini_base_url", &self.gemini_base_url)
            .field("embedding_model", &self.embedding_model)
            .field("chat_model", &self.chat_model)
            .field("top_k", &self.top_k)
            .field("bind_addr", &self.bind_addr)
            .field("static_dir", &self.static_dir)
            .field("stream_tokens", &self.stream_tokens)
            .finish()
    }
}

impl Config {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from any variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));
        let or = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());

        Ok(Self {
            pinecone_api_key: required("PINECONE_API_KEY")?,
            gemini_api_key: required("GEMINI_API_KEY")?,
            pinecone_index: or("PINECONE_INDEX", DEFAULT_INDEX),
            pinecone_namespace: or("PINECONE_NAMESPACE", DEFAULT_NAMESPACE),
            pinecone_index_host: get("PINECONE_INDEX_HOST"),
            pinecone_control_url: or("PINECONE_CONTROL_URL", "https://api.pinecone.io"),
            gemini_base_url: or("GEMINI_BASE_URL", "https://generativelanguage.googleapis.com"),
            embedding_model: or("GEMINI_EMBEDDING_MODEL", "embedding-001"),
            chat_model: or("GEMINI_CHAT_MODEL", "gemini-pro"),
            top_k: parse_top_k(get("RETRIEVAL_TOP_K"))?,
            bind_addr: or("BIND_ADDR", "0.0.0.0:3000"),
            static_dir: or("STATIC_DIR", "public"),
            stream_tokens: parse_flag(get("STREAM_TOKENS"), "STREAM_TOKENS")?,
        })
    }
}

fn parse<T: FromStr>(raw: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { name, value }),
    }
}

fn parse_top_k(raw: Option<String>) -> Result<usize, ConfigError> {
    let top_k = parse(raw.clone(), "RETRIEVAL_TOP_K", DEFAULT_TOP_K)?;
    if top_k == 0 {
        return Err(ConfigError::Invalid { name: "RETRIEVAL_TOP_K", value: raw.unwrap_or_default() });
    }
    Ok(top_k)
}

fn parse_flag(raw: Option<String>, name: &'static str) -> Result<bool, ConfigError> {
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(_) => Err(ConfigError::Invalid { name, value: raw.unwrap_or_default() }),
    }
}
