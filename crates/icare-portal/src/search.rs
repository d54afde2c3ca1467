//! Search form submission.

use tracing::{debug, warn};
use url::Url;

use crate::config::FormFieldNames;
use crate::session::{self, SessionContext};
use crate::types::{IcareError, IcareResult, SearchQuery, DEFAULT_PAGE_SIZE};

/// Raw HTML of a search response and the URL it was served from.
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub url: Url,
    pub html: String,
}

/// Submit an address search using the session's cookies and hidden fields.
pub async fn search_address(
    session: &SessionContext,
    fields: &FormFieldNames,
    query: &SearchQuery,
) -> IcareResult<SearchPage> {
    let street = query.validate()?;
    let page_size = query.effective_page_size();

    let overrides = [
        (fields.number.as_str(), query.number.as_str()),
        (fields.street.as_str(), street),
        (fields.suffix.as_str(), query.suffix.as_str()),
        (fields.unit.as_str(), query.unit.as_str()),
    ];
    submit(session, fields, &overrides, page_size).await
}

/// Submit a map-number (parcel id) search.
pub async fn search_map_number(
    session: &SessionContext,
    fields: &FormFieldNames,
    map_number: &str,
) -> IcareResult<SearchPage> {
    let overrides = [(fields.map_number.as_str(), map_number)];
    submit(session, fields, &overrides, DEFAULT_PAGE_SIZE).await
}

async fn submit(
    session: &SessionContext,
    fields: &FormFieldNames,
    criteria: &[(&str, &str)],
    page_size: &str,
) -> IcareResult<SearchPage> {
    let mut overrides = criteria.to_vec();
    overrides.extend([
        (fields.action.as_str(), fields.action_value.as_str()),
        (fields.page_number.as_str(), "1"),
        (fields.page_size.as_str(), page_size),
        (fields.page_size_select.as_str(), page_size),
    ]);
    let payload = session.hidden_fields().merged_with(&overrides);

    let url = session.entry_url();
    let resp = session.http().post_form(url, &payload).await?;

    if !session::has_form(&resp.body) {
        warn!(final_url = %resp.final_url, "search response carries no form");
        return Err(IcareError::PortalError {
            status: Some(resp.status),
            message: "search response carried no form; the portal session likely expired"
                .to_string(),
        });
    }

    debug!(final_url = %resp.final_url, bytes = resp.body.len(), "search submitted");
    Ok(SearchPage {
        url: resp.final_url,
        html: resp.body,
    })
}

/// Normalize a map number the way the portal indexes it.
///
/// Ten bare digits become `#### ## ####`; anything else is passed through
/// trimmed. Blank input is rejected.
pub fn normalize_map_number(raw: &str) -> IcareResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(IcareError::InvalidQuery("map number is required".to_string()));
    }

    let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.len() == 10 && compact.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(format!(
            "{} {} {}",
            &compact[0..4],
            &compact[4..6],
            &compact[6..10]
        ));
    }

    Ok(trimmed.to_string())
}
