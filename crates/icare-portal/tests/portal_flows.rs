//! End-to-end flows against a mock portal.
//!
//! Every test stands up a wiremock server that plays the portal's part:
//! an entry page issuing a session cookie and view state, a search POST
//! that only answers when both are replayed, and datalet pages.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use icare_portal::{Engine, IcareError, PortalConfig, SearchQuery};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const SEARCH_PATH: &str = "/ffxcare/search/CommonSearch.aspx";
const DATALET_PATH: &str = "/ffxcare/Datalets/Datalet.aspx";
const SESSION_COOKIE: &str = "ASP.NET_SessionId=abc123";

const ENTRY_PAGE: &str = include_str!("fixtures/entry_page.html");
const TWO_ROWS: &str = include_str!("fixtures/search_results_two_rows.html");
const NO_ROWS: &str = include_str!("fixtures/search_results_empty.html");
const EXPIRED: &str = include_str!("fixtures/session_expired.html");
const PROFILE: &str = include_str!("fixtures/profile_page.html");
const TAX_DETAILS: &str = include_str!("fixtures/tax_details.html");
const TAX_UNAVAILABLE: &str = include_str!("fixtures/tax_details_unavailable.html");

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn engine_for(server: &MockServer) -> Engine {
    Engine::new(PortalConfig::with_base_url(server.uri()))
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(body)
}

async fn mount_entry(server: &MockServer, mode: &str) {
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("mode", mode))
        .respond_with(
            html(ENTRY_PAGE).insert_header("set-cookie", "ASP.NET_SessionId=abc123; path=/; HttpOnly"),
        )
        .mount(server)
        .await;
}

fn detail_url(server: &MockServer, query: &str) -> String {
    format!("{}{DATALET_PATH}?{query}", server.uri())
}

async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|r| r.len())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Address search
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_address_search_replays_session_state() {
    let server = MockServer::start().await;
    mount_entry(&server, "ADDRESS").await;

    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .and(header("cookie", SESSION_COOKIE))
        .and(body_string_contains("__VIEWSTATE=dDwtMTA4NjE2"))
        .and(body_string_contains("__EVENTVALIDATION=wEWBgKm8"))
        .and(body_string_contains("__VIEWSTATEGENERATOR=C2EE9ABB"))
        .and(body_string_contains("hdAction=Search"))
        .and(body_string_contains("inpNumber=123"))
        .and(body_string_contains("inpStreet=MAIN"))
        .and(body_string_contains("inpSuffix1=ST"))
        .and(body_string_contains("PageSize=15"))
        .respond_with(html(TWO_ROWS))
        .expect(1)
        .mount(&server)
        .await;

    let query = SearchQuery::street("MAIN").number("123").suffix("ST");
    let records = engine_for(&server).search(&query).await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].owner, "DOE JOHN & MARY");
    assert_eq!(records[0].property_address, "123 MAIN ST");
    assert_eq!(records[0].map_number, "0812 03 0026");
    assert_eq!(records[0].last_sale, "06/30/2015");
    assert_eq!(records[0].detail_url, detail_url(&server, "sIndex=0&idx=1"));

    assert_eq!(records[1].owner, "SMITH JANE");
    assert_eq!(records[1].last_sale, "N/A");
    assert_eq!(records[1].detail_url, detail_url(&server, "sIndex=0&idx=2"));
}

#[tokio::test]
async fn test_empty_street_is_submitted_as_is() {
    let server = MockServer::start().await;
    mount_entry(&server, "ADDRESS").await;

    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .and(body_string_contains("inpStreet=&"))
        .respond_with(html(NO_ROWS))
        .expect(1)
        .mount(&server)
        .await;

    let records = engine_for(&server)
        .search(&SearchQuery::street(""))
        .await
        .unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_absent_street_fails_before_any_request() {
    let server = MockServer::start().await;
    mount_entry(&server, "ADDRESS").await;

    let err = engine_for(&server)
        .search(&SearchQuery::default())
        .await
        .unwrap_err();

    assert!(matches!(err, IcareError::InvalidQuery(_)));
    assert_eq!(request_count(&server).await, 0);
}

#[tokio::test]
async fn test_repeated_search_gives_same_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(html(ENTRY_PAGE))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(html(TWO_ROWS))
        .expect(2)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let query = SearchQuery::street("MAIN");
    let first = engine.search(&query).await.unwrap();
    let second = engine.search(&query).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_expired_session_page_is_portal_error() {
    let server = MockServer::start().await;
    mount_entry(&server, "ADDRESS").await;
    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(html(EXPIRED))
        .mount(&server)
        .await;

    let err = engine_for(&server)
        .search(&SearchQuery::street("MAIN"))
        .await
        .unwrap_err();
    assert!(matches!(err, IcareError::PortalError { .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_entry_page_failure_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .mount(&server)
        .await;

    let err = engine_for(&server)
        .search(&SearchQuery::street("MAIN"))
        .await
        .unwrap_err();
    assert!(matches!(err, IcareError::PortalError { status: Some(503), .. }));
}

#[tokio::test]
async fn test_entry_page_without_form_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(html("<html><body><h1>Scheduled maintenance</h1></body></html>"))
        .mount(&server)
        .await;

    let err = engine_for(&server)
        .search(&SearchQuery::street("MAIN"))
        .await
        .unwrap_err();
    assert!(matches!(err, IcareError::MalformedPortalPage(_)));
}

#[tokio::test]
async fn test_unreachable_portal() {
    let uri = {
        let server = MockServer::start().await;
        server.uri()
    };
    // The server is gone; nothing listens on its port any more.
    let engine = Engine::new(PortalConfig::with_base_url(uri));

    let err = engine.search(&SearchQuery::street("MAIN")).await.unwrap_err();
    assert!(matches!(err, IcareError::PortalUnreachable(_)));
    assert_eq!(err.code(), "portal_unreachable");
}

// ---------------------------------------------------------------------------
// Map number search
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_map_number_search_normalizes_input() {
    let server = MockServer::start().await;
    mount_entry(&server, "PARID").await;

    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .and(header("cookie", SESSION_COOKIE))
        .and(body_string_contains("inpParid=0812+03+0026"))
        .respond_with(html(TWO_ROWS))
        .expect(1)
        .mount(&server)
        .await;

    let records = engine_for(&server)
        .search_map_number("0812030026")
        .await
        .unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].map_number, "0812 03 0026");
}

#[tokio::test]
async fn test_blank_map_number_is_rejected() {
    let server = MockServer::start().await;
    let err = engine_for(&server).search_map_number("  ").await.unwrap_err();
    assert!(matches!(err, IcareError::InvalidQuery(_)));
    assert_eq!(request_count(&server).await, 0);
}

// ---------------------------------------------------------------------------
// Session isolation
// ---------------------------------------------------------------------------

/// Hands every visitor its own cookie and a view state bound to it.
struct IssuingEntry {
    next: AtomicUsize,
}

impl Respond for IssuingEntry {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        html(&ENTRY_PAGE.replace("dDwtMTA4NjE2", &format!("state{n}")))
            .insert_header("set-cookie", format!("ASP.NET_SessionId=s{n}; path=/"))
    }
}

/// Answers with results only when cookie and view state belong together.
struct CheckingSearch;

impl Respond for CheckingSearch {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let session = request
            .headers
            .get("cookie")
            .and_then(|v| v.to_str().ok())
            .and_then(|cookies| {
                cookies
                    .split(';')
                    .find_map(|c| c.trim().strip_prefix("ASP.NET_SessionId=s"))
                    .map(String::from)
            });
        let body = String::from_utf8_lossy(&request.body);

        match session {
            Some(n) if body.contains(&format!("__VIEWSTATE=state{n}&")) => html(TWO_ROWS),
            _ => html(EXPIRED),
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_searches_keep_sessions_apart() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(IssuingEntry {
            next: AtomicUsize::new(0),
        })
        .expect(8)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(CheckingSearch)
        .expect(8)
        .mount(&server)
        .await;

    let engine = Arc::new(engine_for(&server));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.search(&SearchQuery::street("MAIN")).await })
        })
        .collect();

    for handle in handles {
        let records = handle.await.unwrap().unwrap();
        assert_eq!(records.len(), 2);
    }
}

// ---------------------------------------------------------------------------
// Tax summary
// ---------------------------------------------------------------------------

async fn mount_datalets(server: &MockServer, tax_page: &str) {
    Mock::given(method("GET"))
        .and(path(DATALET_PATH))
        .and(query_param("mode", "tax_details"))
        .and(header("cookie", SESSION_COOKIE))
        .respond_with(html(tax_page))
        .with_priority(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(DATALET_PATH))
        .respond_with(html(PROFILE))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_tax_summary_through_side_menu() {
    let server = MockServer::start().await;
    mount_entry(&server, "ADDRESS").await;
    mount_datalets(&server, TAX_DETAILS).await;

    let summary = engine_for(&server)
        .tax_summary(&detail_url(&server, "sIndex=0&idx=1"))
        .await
        .unwrap();

    assert_eq!(summary.title, "Tax Summary");
    assert_eq!(summary.stub_number, "7301234");
    assert_eq!(summary.tax_year_code, "2024");
    assert!(summary.warnings.is_empty(), "{:?}", summary.warnings);

    assert_eq!(summary.periods.len(), 2);
    assert_eq!(summary.periods[0].year, "2024");
    assert_eq!(summary.periods[0].label, "Real Estate");
    assert_eq!(summary.periods[0].amount_paid.display(), "$5,234.50");
    assert_eq!(summary.periods[0].balance_due.display(), "$0.00");
    assert_eq!(summary.periods[1].year, "2023");
    assert_eq!(summary.periods[1].amount_paid.display(), "$5,100.00");

    assert_eq!(summary.total.amount_paid.display(), "$10,334.50");
    assert_eq!(
        summary.total.amount_paid.value().map(|m| m.cents()),
        Some(1_033_450)
    );
    assert_eq!(summary.total.balance_due.display(), "$0.00");

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["total"]["amount_paid_decimal"], 10334.5);
    assert_eq!(json["periods"][0]["balance_due"], "$0.00");
}

#[tokio::test]
async fn test_tax_link_is_fetched_directly() {
    let server = MockServer::start().await;
    mount_entry(&server, "ADDRESS").await;
    Mock::given(method("GET"))
        .and(path(DATALET_PATH))
        .and(query_param("mode", "tax_details"))
        .respond_with(html(TAX_DETAILS))
        .expect(1)
        .mount(&server)
        .await;

    let summary = engine_for(&server)
        .tax_summary(&detail_url(&server, "mode=tax_details&sIndex=0&idx=1"))
        .await
        .unwrap();
    assert_eq!(summary.periods.len(), 2);
}

#[tokio::test]
async fn test_property_without_tax_panel() {
    let server = MockServer::start().await;
    mount_entry(&server, "ADDRESS").await;
    mount_datalets(&server, TAX_UNAVAILABLE).await;

    let err = engine_for(&server)
        .tax_summary(&detail_url(&server, "sIndex=0&idx=3"))
        .await
        .unwrap_err();
    assert!(matches!(err, IcareError::TaxDataUnavailable));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_foreign_detail_url_fails_before_any_request() {
    let server = MockServer::start().await;
    mount_entry(&server, "ADDRESS").await;

    let err = engine_for(&server)
        .tax_summary("https://evil.example.com/ffxcare/Datalets/Datalet.aspx?idx=1")
        .await
        .unwrap_err();
    assert!(matches!(err, IcareError::InvalidDetailUrl(_)));
    assert_eq!(request_count(&server).await, 0);
}

#[tokio::test]
async fn test_missing_datalet_is_portal_error() {
    let server = MockServer::start().await;
    mount_entry(&server, "ADDRESS").await;
    Mock::given(method("GET"))
        .and(path(DATALET_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = engine_for(&server)
        .tax_summary(&detail_url(&server, "sIndex=0&idx=99"))
        .await
        .unwrap_err();
    assert!(matches!(err, IcareError::PortalError { status: Some(404), .. }));
}

#[tokio::test]
async fn test_expired_session_on_datalet_is_portal_error() {
    let server = MockServer::start().await;
    mount_entry(&server, "ADDRESS").await;
    Mock::given(method("GET"))
        .and(path(DATALET_PATH))
        .respond_with(html(EXPIRED))
        .expect(1)
        .mount(&server)
        .await;

    let err = engine_for(&server)
        .tax_summary(&detail_url(&server, "sIndex=0&idx=1"))
        .await
        .unwrap_err();
    assert!(matches!(err, IcareError::PortalError { status: Some(200), .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_expired_session_on_tax_page_is_portal_error() {
    let server = MockServer::start().await;
    mount_entry(&server, "ADDRESS").await;
    mount_datalets(&server, EXPIRED).await;

    let err = engine_for(&server)
        .tax_summary(&detail_url(&server, "sIndex=0&idx=1"))
        .await
        .unwrap_err();
    assert!(matches!(err, IcareError::PortalError { .. }));
}
