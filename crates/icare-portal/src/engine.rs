//! The three portal operations, each self-contained.
//!
//! An [`Engine`] holds only immutable configuration, so it can be shared
//! freely (`Arc<Engine>`) across concurrent requests. Every call builds its
//! own session and cookie jar and drops them before returning.

use tracing::info;

use crate::config::PortalConfig;
use crate::detail;
use crate::results::extract_results;
use crate::search::{self, normalize_map_number};
use crate::session;
use crate::tax::extract_tax_summary;
use crate::types::{IcareResult, PropertyRecord, SearchQuery, TaxSummary};

/// Entry point for searches and tax lookups against one portal.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: PortalConfig,
}

impl Engine {
    pub fn new(config: PortalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    /// Search by street address.
    ///
    /// Fails with `InvalidQuery` before touching the network when the
    /// street is absent.
    pub async fn search(&self, query: &SearchQuery) -> IcareResult<Vec<PropertyRecord>> {
        query.validate()?;
        let entry_url = self.config.address_search_url()?;

        let session = session::acquire(&self.config, &entry_url).await?;
        let page = search::search_address(&session, &self.config.fields, query).await?;
        drop(session);

        let records = extract_results(&page.html, &page.url)?;
        info!(
            street = query.street.as_deref().unwrap_or_default(),
            count = records.len(),
            "address search complete"
        );
        Ok(records)
    }

    /// Search by map number (parcel id), e.g. `0812 03 0026` or `0812030026`.
    pub async fn search_map_number(&self, map_number: &str) -> IcareResult<Vec<PropertyRecord>> {
        let map_number = normalize_map_number(map_number)?;
        let entry_url = self.config.map_search_url()?;

        let session = session::acquire(&self.config, &entry_url).await?;
        let page = search::search_map_number(&session, &self.config.fields, &map_number).await?;
        drop(session);

        let records = extract_results(&page.html, &page.url)?;
        info!(%map_number, count = records.len(), "map number search complete");
        Ok(records)
    }

    /// Fetch and parse the tax summary behind a search result's detail link.
    pub async fn tax_summary(&self, detail_url: &str) -> IcareResult<TaxSummary> {
        let page = detail::fetch_detail(&self.config, detail_url).await?;
        let summary = extract_tax_summary(&page.html)?;
        info!(
            url = %page.url,
            periods = summary.periods.len(),
            warnings = summary.warnings.len(),
            "tax summary complete"
        );
        Ok(summary)
    }
}
