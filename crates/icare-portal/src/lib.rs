//! icare-portal: session-replaying client and HTML extractors for the
//! Fairfax County iCare property portal.
//!
//! ```no_run
//! # async fn run() -> icare_portal::IcareResult<()> {
//! use icare_portal::{Engine, PortalConfig, SearchQuery};
//!
//! let engine = Engine::new(PortalConfig::default());
//! let records = engine.search(&SearchQuery::street("MAIN").suffix("ST")).await?;
//! if let Some(first) = records.first() {
//!     let summary = engine.tax_summary(&first.detail_url).await?;
//!     println!("{} owes {}", first.owner, summary.total.balance_due.display());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod currency;
pub mod detail;
pub mod engine;
pub mod html;
pub mod http_client;
pub mod results;
pub mod search;
pub mod session;
pub mod tax;
pub mod types;

pub use config::{FormFieldNames, PortalConfig};
pub use currency::Money;
pub use engine::Engine;
pub use results::extract_results;
pub use tax::extract_tax_summary;
pub use types::*;
