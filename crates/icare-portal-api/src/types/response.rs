//! Response bodies.

use icare_portal::{PropertyRecord, TaxSummary};
use serde::Serialize;

/// Body of both search endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub count: usize,
    pub results: Vec<PropertyRecord>,
}

impl SearchResponse {
    pub fn new(results: Vec<PropertyRecord>) -> Self {
        Self {
            success: true,
            count: results.len(),
            results,
        }
    }
}

/// Body of `GET /tax-summary`: the summary's fields plus `success`.
#[derive(Debug, Clone, Serialize)]
pub struct TaxSummaryResponse {
    pub success: bool,
    #[serde(flatten)]
    pub summary: TaxSummary,
}

impl From<TaxSummary> for TaxSummaryResponse {
    fn from(summary: TaxSummary) -> Self {
        Self {
            success: true,
            summary,
        }
    }
}
