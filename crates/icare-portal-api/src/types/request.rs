//! Request bodies and query parameters.

use icare_portal::SearchQuery;
use serde::{Deserialize, Deserializer};

/// Body of `POST /search/address`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressSearchRequest {
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub suffix: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub page_size: Option<String>,
}

impl AddressSearchRequest {
    /// Engine query in the portal's casing. Street and suffix are upper-cased;
    /// an absent street stays absent.
    pub fn into_query(self) -> SearchQuery {
        let mut query = SearchQuery {
            number: self.number.unwrap_or_default(),
            street: self.street,
            suffix: self.suffix.unwrap_or_default(),
            unit: self.unit.unwrap_or_default(),
            ..SearchQuery::default()
        };
        if let Some(page_size) = self.page_size {
            query.page_size = page_size;
        }
        query.to_portal_case()
    }
}

/// Body of `POST /search/map-number`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MapNumberRequest {
    #[serde(default)]
    pub map_number: String,
}

/// Query string of `GET /tax-summary`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaxSummaryParams {
    pub detail_url: Option<String>,
}

/// Accept `"50"` and `50` alike.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    }))
}
