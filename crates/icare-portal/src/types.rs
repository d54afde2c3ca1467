//! Core data types for portal searches, tax summaries and engine errors.

use serde::{Deserialize, Serialize};

use crate::currency::Money;

/// Placeholder used when a portal value is absent or cannot be read.
pub const NOT_AVAILABLE: &str = "N/A";

/// Default number of results requested per search page.
pub const DEFAULT_PAGE_SIZE: &str = "15";

/// An address search as supplied by the caller.
///
/// `street` is optional at the type level so that an *absent* street can be
/// told apart from an *empty* one: absence is rejected, while `Some("")`
/// matches every street.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub number: String,
    pub street: Option<String>,
    #[serde(default)]
    pub suffix: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default = "default_page_size")]
    pub page_size: String,
}

fn default_page_size() -> String {
    DEFAULT_PAGE_SIZE.to_string()
}

impl SearchQuery {
    /// Start a query for the given street name.
    pub fn street(street: impl Into<String>) -> Self {
        Self {
            street: Some(street.into()),
            page_size: default_page_size(),
            ..Self::default()
        }
    }

    pub fn number(mut self, number: impl Into<String>) -> Self {
        self.number = number.into();
        self
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn page_size(mut self, page_size: impl Into<String>) -> Self {
        self.page_size = page_size.into();
        self
    }

    /// The portal indexes street names and suffixes in upper case.
    pub fn to_portal_case(&self) -> Self {
        Self {
            number: self.number.trim().to_string(),
            street: self.street.as_ref().map(|s| s.trim().to_uppercase()),
            suffix: self.suffix.trim().to_uppercase(),
            unit: self.unit.trim().to_string(),
            page_size: self.page_size.clone(),
        }
    }

    /// Check the query before any network traffic happens.
    pub fn validate(&self) -> IcareResult<&str> {
        let street = self
            .street
            .as_deref()
            .ok_or_else(|| IcareError::InvalidQuery("street is required".to_string()))?;

        let page_size = self.page_size.trim();
        if !page_size.is_empty() && page_size.parse::<u32>().map_or(true, |n| n == 0) {
            return Err(IcareError::InvalidQuery(format!(
                "page_size must be a positive integer, got '{}'",
                self.page_size
            )));
        }

        Ok(street)
    }

    /// The page size to send, falling back to the default when blank.
    pub fn effective_page_size(&self) -> &str {
        match self.page_size.trim() {
            "" => DEFAULT_PAGE_SIZE,
            size => size,
        }
    }
}

/// One row of the portal's search results grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRecord {
    #[serde(rename = "Map #")]
    pub map_number: String,
    #[serde(rename = "Owner")]
    pub owner: String,
    #[serde(rename = "Property Address")]
    pub property_address: String,
    #[serde(rename = "Last Sale")]
    pub last_sale: String,
    #[serde(rename = "DetailURL")]
    pub detail_url: String,
}

/// A currency cell that either parsed or was kept as raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Amount {
    Parsed(Money),
    Unparsable { raw: String },
}

impl Amount {
    pub fn value(&self) -> Option<Money> {
        match self {
            Amount::Parsed(m) => Some(*m),
            Amount::Unparsable { .. } => None,
        }
    }

    /// Display form: the re-formatted currency, or the sentinel.
    pub fn display(&self) -> String {
        match self {
            Amount::Parsed(m) => m.to_string(),
            Amount::Unparsable { .. } => NOT_AVAILABLE.to_string(),
        }
    }
}

/// Tax figures for one billing period (or the synthetic total row).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxPeriod {
    pub year: String,
    pub label: String,
    pub amount_paid: Amount,
    pub balance_due: Amount,
}

/// Wire form of [`TaxPeriod`].
#[derive(Serialize)]
struct TaxPeriodJson {
    year: String,
    label: String,
    amount_paid: String,
    balance_due: String,
    amount_paid_decimal: Option<f64>,
    balance_due_decimal: Option<f64>,
}

impl Serialize for TaxPeriod {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        TaxPeriodJson {
            year: self.year.clone(),
            label: self.label.clone(),
            amount_paid: self.amount_paid.display(),
            balance_due: self.balance_due.display(),
            amount_paid_decimal: self.amount_paid.value().map(Money::to_f64),
            balance_due_decimal: self.balance_due.value().map(Money::to_f64),
        }
        .serialize(serializer)
    }
}

/// Which currency column of the summary table a warning refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountColumn {
    AmountPaid,
    BalanceDue,
}

/// A field-level problem that did not prevent the summary from being built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaxWarning {
    /// A currency cell could not be parsed; its field carries the sentinel.
    UnparsableAmount {
        year: String,
        column: AmountColumn,
        raw: String,
    },
    /// The portal's own total row disagrees with the sum of the periods.
    TotalMismatch {
        column: AmountColumn,
        reported: String,
        computed: String,
    },
}

/// Parsed contents of a property's tax summary panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaxSummary {
    pub title: String,
    pub stub_number: String,
    pub tax_year_code: String,
    pub periods: Vec<TaxPeriod>,
    pub total: TaxPeriod,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<TaxWarning>,
}

/// Errors that can occur while talking to or reading the portal.
#[derive(thiserror::Error, Debug)]
pub enum IcareError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid detail URL: {0}")]
    InvalidDetailUrl(String),

    #[error("Portal unreachable: {0}")]
    PortalUnreachable(#[source] reqwest::Error),

    #[error("Portal error: {message}")]
    PortalError {
        status: Option<u16>,
        message: String,
    },

    #[error("Malformed portal page: {0}")]
    MalformedPortalPage(String),

    #[error("No tax data is published for this property")]
    TaxDataUnavailable,
}

impl IcareError {
    /// Whether restarting the whole operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IcareError::PortalUnreachable(_) | IcareError::PortalError { .. }
        )
    }

    /// Stable machine-readable name of the error class.
    pub fn code(&self) -> &'static str {
        match self {
            IcareError::InvalidQuery(_) => "invalid_query",
            IcareError::InvalidDetailUrl(_) => "invalid_detail_url",
            IcareError::PortalUnreachable(_) => "portal_unreachable",
            IcareError::PortalError { .. } => "portal_error",
            IcareError::MalformedPortalPage(_) => "malformed_portal_page",
            IcareError::TaxDataUnavailable => "tax_data_unavailable",
        }
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        IcareError::MalformedPortalPage(msg.into())
    }
}

impl From<reqwest::Error> for IcareError {
    fn from(e: reqwest::Error) -> Self {
        IcareError::PortalUnreachable(e)
    }
}

/// Convenience result type.
pub type IcareResult<T> = Result<T, IcareError>;
