//! Connection settings for the storage service.

use std::time::Duration;

use url::Url;

use crate::error::Error;

pub const URL_VAR: &str = "DOCSTORE_URL";
pub const TOKEN_VAR: &str = "DOCSTORE_TOKEN";
pub const TIMEOUT_VAR: &str = "DOCSTORE_TIMEOUT_SECS";
pub const PAGE_SIZE_VAR: &str = "DOCSTORE_PAGE_SIZE";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Service root, e.g. `https://storage.example.org/api/v1/`. Always ends
    /// with a slash so endpoints join below it.
    pub base_url: Url,
    pub access_token: String,
    pub timeout: Duration,
    /// Page size for listings; the service default when `None`.
    pub page_size: Option<u32>,
}

impl GatewayConfig {
    pub fn new(base_url: &str, access_token: impl Into<String>) -> Result<Self, Error> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            access_token: access_token.into(),
            timeout: DEFAULT_TIMEOUT,
            page_size: None,
        })
    }

    /// Read `DOCSTORE_URL`, `DOCSTORE_TOKEN`, `DOCSTORE_TIMEOUT_SECS` and
    /// `DOCSTORE_PAGE_SIZE`.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let base_url = lookup(URL_VAR).ok_or_else(|| missing(URL_VAR))?;
        let token = lookup(TOKEN_VAR).ok_or_else(|| missing(TOKEN_VAR))?;
        let mut config = Self::new(&base_url, token)?;

        if let Some(raw) = lookup(TIMEOUT_VAR) {
            config.timeout = Duration::from_secs(parse_number(TIMEOUT_VAR, &raw)?);
        }
        if let Some(raw) = lookup(PAGE_SIZE_VAR) {
            config.page_size = Some(parse_number(PAGE_SIZE_VAR, &raw)?);
        }

        Ok(config)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = token.into();
        self
    }
}

fn normalize_base_url(raw: &str) -> Result<Url, Error> {
    let mut url = Url::parse(raw)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn missing(var: &str) -> Error {
    Error::Config {
        message: format!("{} is not set", var),
    }
}

fn parse_number<T: std::str::FromStr>(var: &str, raw: &str) -> Result<T, Error> {
    raw.trim().parse().map_err(|_| Error::Config {
        message: format!("{} must be a positive integer, got {:?}", var, raw),
    })
}
