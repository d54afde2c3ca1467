//! Async HTTP client bound to a single portal session.
//!
//! Each client owns its own cookie jar, so two clients never see each
//! other's session cookies. No retries: a failed step surfaces at once.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use tracing::debug;
use url::Url;

use crate::config::PortalConfig;
use crate::types::{IcareError, IcareResult};

/// A successful (2xx) response from the portal.
#[derive(Debug, Clone)]
pub struct PortalResponse {
    /// Final URL after redirects.
    pub final_url: Url,
    pub status: u16,
    pub body: String,
}

/// HTTP client carrying one session's cookies.
pub struct PortalClient {
    client: reqwest::Client,
    jar: Arc<Jar>,
    timeout: Duration,
}

impl PortalClient {
    /// Build a client with a fresh, empty cookie jar.
    pub fn new(config: &PortalConfig) -> IcareResult<Self> {
        let jar = Arc::new(Jar::default());
        let timeout = Duration::from_millis(config.timeout_ms);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(config.user_agent.as_str())
            .cookie_provider(Arc::clone(&jar))
            .build()?;

        Ok(Self {
            client,
            jar,
            timeout,
        })
    }

    /// The cookie jar backing this client.
    pub fn cookies(&self) -> &Arc<Jar> {
        &self.jar
    }

    pub async fn get(&self, url: &Url) -> IcareResult<PortalResponse> {
        debug!(%url, "GET");
        let resp = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await?;
        Self::finish(url, resp).await
    }

    /// POST url-encoded form fields, preserving their order.
    pub async fn post_form(
        &self,
        url: &Url,
        form_fields: &[(String, String)],
    ) -> IcareResult<PortalResponse> {
        debug!(%url, fields = form_fields.len(), "POST");
        let resp = self
            .client
            .post(url.clone())
            .timeout(self.timeout)
            .header("Referer", url.as_str())
            .form(form_fields)
            .send()
            .await?;
        Self::finish(url, resp).await
    }

    async fn finish(url: &Url, r: reqwest::Response) -> IcareResult<PortalResponse> {
        let status = r.status();
        let final_url = r.url().clone();

        if !status.is_success() {
            return Err(IcareError::PortalError {
                status: Some(status.as_u16()),
                message: format!("{url} answered {status}"),
            });
        }

        let body = r.text().await?;
        debug!(%final_url, status = status.as_u16(), bytes = body.len(), "response");

        Ok(PortalResponse {
            final_url,
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_portal_client_creation() {
        let client = PortalClient::new(&PortalConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_clients_do_not_share_jars() {
        let config = PortalConfig::default();
        let a = PortalClient::new(&config).unwrap();
        let b = PortalClient::new(&config).unwrap();
        assert!(!Arc::ptr_eq(a.cookies(), b.cookies()));
    }
}
