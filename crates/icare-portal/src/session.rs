//! Session acquisition: cookies plus the hidden form state of the entry page.
//!
//! The portal is an ASP.NET WebForms application. Every POST must replay the
//! hidden inputs (view state, event validation and whatever else the page
//! carries) from the page load that preceded it, using the same cookies.

use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::config::PortalConfig;
use crate::http_client::{PortalClient, PortalResponse};
use crate::types::{IcareError, IcareResult};

/// Hidden inputs harvested from a form, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HiddenFields(Vec<(String, String)>);

impl HiddenFields {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy the fields and apply overrides, replacing same-named entries.
    pub fn merged_with(&self, overrides: &[(&str, &str)]) -> Vec<(String, String)> {
        let mut params = self.0.clone();
        for &(key, val) in overrides {
            if let Some(existing) = params.iter_mut().find(|(n, _)| n == key) {
                existing.1 = val.to_string();
            } else {
                params.push((key.to_string(), val.to_string()));
            }
        }
        params
    }
}

/// State for exactly one logical operation against the portal.
///
/// Not `Clone`: a context is created by [`acquire`], used by one search or
/// one detail fetch, then dropped.
pub struct SessionContext {
    http: PortalClient,
    entry_url: Url,
    hidden_fields: HiddenFields,
}

impl SessionContext {
    pub fn http(&self) -> &PortalClient {
        &self.http
    }

    /// The page the session was started from.
    pub fn entry_url(&self) -> &Url {
        &self.entry_url
    }

    pub fn hidden_fields(&self) -> &HiddenFields {
        &self.hidden_fields
    }
}

/// Load the entry page with a fresh cookie jar and harvest its hidden fields.
pub async fn acquire(config: &PortalConfig, entry_url: &Url) -> IcareResult<SessionContext> {
    let http = PortalClient::new(config)?;
    let PortalResponse { body, .. } = http.get(entry_url).await?;

    let hidden_fields = harvest_hidden_fields(&body).inspect_err(|e| {
        warn!(%entry_url, error = %e, "entry page has unexpected shape");
    })?;
    debug!(%entry_url, hidden = hidden_fields.len(), "session acquired");

    Ok(SessionContext {
        http,
        entry_url: entry_url.clone(),
        hidden_fields,
    })
}

/// Collect every `type="hidden"` input inside the page's forms.
///
/// The set of names is not fixed; whatever the portal emits is replayed.
pub fn harvest_hidden_fields(html: &str) -> IcareResult<HiddenFields> {
    let document = Html::parse_document(html);
    let form_sel = Selector::parse("form").expect("form selector is valid");
    let input_sel = Selector::parse("input[name]").expect("input selector is valid");

    let mut forms = document.select(&form_sel).peekable();
    if forms.peek().is_none() {
        return Err(IcareError::malformed("no form found on the portal page"));
    }

    let mut fields = Vec::new();
    for form in forms {
        for input in form.select(&input_sel) {
            let is_hidden = input
                .value()
                .attr("type")
                .is_some_and(|t| t.eq_ignore_ascii_case("hidden"));
            let name = input.value().attr("name").unwrap_or_default();
            if !is_hidden || name.is_empty() {
                continue;
            }
            if fields.iter().any(|(n, _): &(String, String)| n == name) {
                continue;
            }
            let value = input.value().attr("value").unwrap_or_default();
            fields.push((name.to_string(), value.to_string()));
        }
    }

    if fields.is_empty() {
        return Err(IcareError::malformed(
            "portal form carries no hidden session fields",
        ));
    }

    Ok(HiddenFields(fields))
}

/// Whether a page still contains a form at all.
///
/// The portal answers an expired session with a bare notice page.
pub(crate) fn has_form(html: &str) -> bool {
    let document = Html::parse_document(html);
    let form_sel = Selector::parse("form").expect("form selector is valid");
    document.select(&form_sel).next().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENTRY_PAGE: &str = r#"
        <html><body>
          <form name="frmMain" method="post" action="CommonSearch.aspx?mode=ADDRESS">
            <input type="hidden" name="__VIEWSTATE" value="dDwtMTA4" />
            <input type="HIDDEN" name="__EVENTVALIDATION" value="wEWAgL" />
            <input type="hidden" name="hdAction" value="" />
            <input type="hidden" value="orphan" />
            <input type="text" name="inpStreet" value="" />
            <input type="submit" name="btSearch" value="Search" />
          </form>
        </body></html>
    "#;

    #[test]
    fn test_harvest_only_hidden_inputs() {
        let fields = harvest_hidden_fields(ENTRY_PAGE).unwrap();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields.get("__VIEWSTATE"), Some("dDwtMTA4"));
        assert_eq!(fields.get("__EVENTVALIDATION"), Some("wEWAgL"));
        assert_eq!(fields.get("hdAction"), Some(""));
        assert_eq!(fields.get("inpStreet"), None);
    }

    #[test]
    fn test_no_form_is_malformed() {
        let err = harvest_hidden_fields("<html><body><p>Down for maintenance</p></body></html>")
            .unwrap_err();
        assert!(matches!(err, IcareError::MalformedPortalPage(_)));
    }

    #[test]
    fn test_form_without_hidden_fields_is_malformed() {
        let html = r#"<form><input type="text" name="q" /></form>"#;
        assert!(matches!(
            harvest_hidden_fields(html),
            Err(IcareError::MalformedPortalPage(_))
        ));
    }

    #[test]
    fn test_merge_overrides_and_appends() {
        let fields = harvest_hidden_fields(ENTRY_PAGE).unwrap();
        let params = fields.merged_with(&[("hdAction", "Search"), ("inpStreet", "MAIN")]);
        assert_eq!(params.len(), 4);
        assert_eq!(params[0].0, "__VIEWSTATE");
        assert!(params.contains(&("hdAction".to_string(), "Search".to_string())));
        assert_eq!(params[3], ("inpStreet".to_string(), "MAIN".to_string()));
        // The harvested set itself is untouched.
        assert_eq!(fields.get("hdAction"), Some(""));
    }

    #[test]
    fn test_has_form() {
        assert!(has_form(ENTRY_PAGE));
        assert!(!has_form("<p>Your session has expired.</p>"));
    }
}
