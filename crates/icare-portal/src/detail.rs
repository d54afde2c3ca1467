//! Property detail and tax page retrieval.
//!
//! Detail links come out of a search results page but may be followed long
//! after that search finished, so every fetch starts its own session from
//! the search entry page before touching the link.

use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::config::PortalConfig;
use crate::http_client::PortalResponse;
use crate::session;
use crate::types::{IcareError, IcareResult};

const TAX_MODE: &str = "tax_details";

/// Raw HTML of a property's tax page and the URL it was served from.
#[derive(Debug, Clone)]
pub struct TaxPage {
    pub url: Url,
    pub html: String,
}

/// Check that a detail link is an absolute http(s) URL on the portal host.
pub fn validate_detail_url(config: &PortalConfig, raw: &str) -> IcareResult<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(IcareError::InvalidDetailUrl("detail URL is empty".to_string()));
    }

    let url = Url::parse(raw)
        .map_err(|e| IcareError::InvalidDetailUrl(format!("'{raw}' is not a URL: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(IcareError::InvalidDetailUrl(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }

    let expected = config.portal_host()?;
    match url.host_str() {
        Some(host) if host.eq_ignore_ascii_case(&expected) => Ok(url),
        Some(host) => Err(IcareError::InvalidDetailUrl(format!(
            "host '{host}' is not the portal host '{expected}'"
        ))),
        None => Err(IcareError::InvalidDetailUrl(format!("'{raw}' has no host"))),
    }
}

/// Fetch the tax details page behind a search result's detail link.
pub async fn fetch_detail(config: &PortalConfig, detail_url: &str) -> IcareResult<TaxPage> {
    let detail_url = validate_detail_url(config, detail_url)?;
    let entry_url = config.address_search_url()?;

    let session = session::acquire(config, &entry_url).await?;
    let profile = expect_form(session.http().get(&detail_url).await?)?;

    if is_tax_mode(&profile.final_url) {
        return Ok(TaxPage {
            url: profile.final_url,
            html: profile.body,
        });
    }

    let tax_url = tax_link(&profile.body, &profile.final_url)
        .unwrap_or_else(|| with_tax_mode(&profile.final_url));
    debug!(%tax_url, "following tax details link");

    let tax = expect_form(session.http().get(&tax_url).await?)?;
    Ok(TaxPage {
        url: tax.final_url,
        html: tax.body,
    })
}

/// Every datalet page is a form; a bare notice page means the session expired.
fn expect_form(resp: PortalResponse) -> IcareResult<PortalResponse> {
    if session::has_form(&resp.body) {
        return Ok(resp);
    }
    warn!(final_url = %resp.final_url, "detail response carries no form");
    Err(IcareError::PortalError {
        status: Some(resp.status),
        message: "detail response carried no form; the portal session likely expired".to_string(),
    })
}

/// The side-menu link to the tax details view, resolved against `base`.
fn tax_link(html: &str, base: &Url) -> Option<Url> {
    let document = Html::parse_document(html);
    let link_sel = Selector::parse("div#sidemenu a[href*='mode=tax_details'], a[href*='mode=tax_details']")
        .expect("tax link selector is valid");
    document
        .select(&link_sel)
        .filter_map(|a| a.value().attr("href"))
        .find_map(|href| base.join(href.trim()).ok())
}

fn is_tax_mode(url: &Url) -> bool {
    url.query_pairs()
        .any(|(k, v)| k.eq_ignore_ascii_case("mode") && v.eq_ignore_ascii_case(TAX_MODE))
}

/// Same URL with its `mode` query parameter set to the tax view.
fn with_tax_mode(url: &Url) -> Url {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !k.eq_ignore_ascii_case("mode"))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut tax_url = url.clone();
    tax_url
        .query_pairs_mut()
        .clear()
        .extend_pairs(pairs)
        .append_pair("mode", TAX_MODE);
    tax_url
}
