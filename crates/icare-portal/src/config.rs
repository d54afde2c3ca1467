//! Portal endpoints and form field names.
//!
//! Everything that is specific to the live iCare deployment lives here so
//! that the drivers and extractors never hard-code a URL or a field name.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::{IcareError, IcareResult};

/// Base URL of the live Fairfax County iCare portal.
pub const DEFAULT_BASE_URL: &str = "https://icare.fairfaxcounty.gov";

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                                  AppleWebKit/537.36 (KHTML, like Gecko) \
                                  Chrome/131.0.0.0 Safari/537.36";

/// Names of the search form inputs the portal expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormFieldNames {
    pub number: String,
    pub street: String,
    pub suffix: String,
    pub unit: String,
    pub map_number: String,
    pub action: String,
    pub action_value: String,
    pub page_number: String,
    pub page_size: String,
    /// The page-size dropdown is posted alongside the hidden page size.
    pub page_size_select: String,
}

impl Default for FormFieldNames {
    fn default() -> Self {
        Self {
            number: "inpNumber".into(),
            street: "inpStreet".into(),
            suffix: "inpSuffix1".into(),
            unit: "inpUnit".into(),
            map_number: "inpParid".into(),
            action: "hdAction".into(),
            action_value: "Search".into(),
            page_number: "PageNum".into(),
            page_size: "PageSize".into(),
            page_size_select: "selPageSize".into(),
        }
    }
}

/// Where the portal lives and how to talk to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub base_url: String,
    /// Address search page; both the session entry point and the POST target.
    pub address_search_path: String,
    /// Map-number (PARID) search page.
    pub map_search_path: String,
    pub timeout_ms: u64,
    pub user_agent: String,
    pub fields: FormFieldNames,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            address_search_path: "/ffxcare/search/CommonSearch.aspx?mode=ADDRESS".into(),
            map_search_path: "/ffxcare/search/CommonSearch.aspx?mode=PARID".into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            user_agent: DEFAULT_USER_AGENT.into(),
            fields: FormFieldNames::default(),
        }
    }
}

impl PortalConfig {
    /// Same paths and field names, rooted at a different host.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Apply `ICARE_BASE_URL` and `ICARE_TIMEOUT_MS` overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(base) = std::env::var("ICARE_BASE_URL") {
            if !base.trim().is_empty() {
                config.base_url = base.trim().to_string();
            }
        }

        if let Some(ms) = std::env::var("ICARE_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            config.timeout_ms = ms;
        }

        config
    }

    pub fn address_search_url(&self) -> IcareResult<Url> {
        self.join(&self.address_search_path)
    }

    pub fn map_search_url(&self) -> IcareResult<Url> {
        self.join(&self.map_search_path)
    }

    /// Host that every detail link must point at.
    pub fn portal_host(&self) -> IcareResult<String> {
        let base = self.base()?;
        base.host_str()
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| config_error(format!("base URL '{}' has no host", self.base_url)))
    }

    fn base(&self) -> IcareResult<Url> {
        Url::parse(&self.base_url)
            .map_err(|e| config_error(format!("base URL '{}': {e}", self.base_url)))
    }

    fn join(&self, path: &str) -> IcareResult<Url> {
        self.base()?
            .join(path)
            .map_err(|e| config_error(format!("path '{path}': {e}")))
    }
}

fn config_error(message: String) -> IcareError {
    IcareError::PortalError {
        status: None,
        message: format!("invalid portal configuration: {message}"),
    }
}
