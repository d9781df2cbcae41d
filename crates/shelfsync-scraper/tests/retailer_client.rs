//! Integration tests for `RetailerClient` against a `wiremock` storefront.
//!
//! Each test stands up its own mock server, so no real network traffic is
//! made. Covers session acquisition, region and department discovery, and
//! listing pagination including its failure modes.

use std::time::Duration;

use futures::TryStreamExt;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shelfsync_core::{Category, RegionId, StoreType};
use shelfsync_scraper::{
    HttpTransport, RawItem, RetailerClient, RetailerSettings, ScraperError, SessionError,
};

const SESSION_PATH: &str = "/api/v1/fulfilment/my/pickup-addresses";
const PRODUCTS_PATH: &str = "/api/v1/products";

fn test_client(server: &MockServer) -> RetailerClient {
    test_client_with_retries(server, 0)
}

fn test_client_with_retries(server: &MockServer, max_retries: u32) -> RetailerClient {
    let transport = HttpTransport::new(5, "shelfsync-test/0.1", max_retries, 0)
        .expect("failed to build test transport");
    RetailerClient::new(
        transport,
        RetailerSettings {
            base_url: server.uri(),
            page_size: 2,
            max_pages: 50,
            inter_page_delay: Duration::ZERO,
        },
    )
}

fn category(slug: &str) -> Category {
    Category {
        id: 1,
        label: "Fruit & Veg".to_owned(),
        slug: slug.to_owned(),
        store_type: StoreType::Woolworths,
    }
}

fn product_entry(sku: &str) -> serde_json::Value {
    json!({
        "type": "Product",
        "sku": sku,
        "name": format!("Product {sku}"),
        "brand": "woolworths",
        "images": {"big": format!("https://img.test/{sku}.jpg")},
        "price": {
            "originalPrice": 4.5,
            "salePrice": 3.0,
            "canShowOriginalPrice": true,
            "canShowSalePrice": true
        },
        "quantity": {"max": 20.0}
    })
}

fn banner_entry() -> serde_json::Value {
    json!({"type": "PromoTile", "name": "Half price this week"})
}

fn listing_page(entries: Vec<serde_json::Value>) -> serde_json::Value {
    let total = entries.len();
    json!({"products": {"items": entries, "totalItems": total}})
}

fn session_response(region_id: i64) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .append_header(
            "set-cookie",
            format!("ASP.NET_SessionId=sess-{region_id}; path=/; HttpOnly").as_str(),
        )
        .append_header("set-cookie", format!("aga=region-{region_id}; path=/").as_str())
        .set_body_json(json!({"context": {"fulfilment": {"address": "1 Queen Street"}}}))
}

async fn mount_session(server: &MockServer, region_id: i64) {
    Mock::given(method("PUT"))
        .and(path(SESSION_PATH))
        .and(body_json(json!({"addressId": region_id})))
        .respond_with(session_response(region_id))
        .mount(server)
        .await;
}

fn skus(items: &[RawItem]) -> Vec<&str> {
    items.iter().map(|i| i.sku.as_str()).collect()
}

// ---------------------------------------------------------------------------
// Session acquisition
// ---------------------------------------------------------------------------

#[tokio::test]
async fn acquire_session_reads_both_cookies() {
    let server = MockServer::start().await;
    mount_session(&server, 42).await;

    let session = test_client(&server)
        .acquire_session(RegionId(42))
        .await
        .expect("session should be acquired");

    assert_eq!(session.region_id(), RegionId(42));
    assert_eq!(session.address(), Some("1 Queen Street"));
    assert_eq!(
        session.cookie_header(),
        "ASP.NET_SessionId=sess-42; aga=region-42"
    );
}

#[tokio::test]
async fn acquire_session_without_region_cookie_is_missing_token() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(SESSION_PATH))
        .respond_with(
            ResponseTemplate::new(200).append_header("set-cookie", "ASP.NET_SessionId=s; path=/"),
        )
        .mount(&server)
        .await;

    let err = test_client(&server)
        .acquire_session(RegionId(5))
        .await
        .unwrap_err();

    assert!(
        matches!(err, SessionError::MissingToken { cookie: "aga", .. }),
        "expected MissingToken(aga), got: {err:?}"
    );
    assert_eq!(err.region_id(), RegionId(5));
}

#[tokio::test]
async fn acquire_session_failure_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(SESSION_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let err = test_client(&server)
        .acquire_session(RegionId(9))
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            SessionError::Transport {
                source: ScraperError::UnexpectedStatus { status: 500, .. },
                ..
            }
        ),
        "expected Transport(500), got: {err:?}"
    );
}

#[tokio::test]
async fn acquire_session_tolerates_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(SESSION_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "ASP.NET_SessionId=s")
                .append_header("set-cookie", "aga=r"),
        )
        .mount(&server)
        .await;

    let session = test_client(&server)
        .acquire_session(RegionId(1))
        .await
        .expect("credentials alone are enough");
    assert!(session.address().is_none());
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_regions_flattens_store_areas() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/addresses/pickup-addresses"))
        .and(header("x-requested-with", "OnlineShopping.WebApp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "storeAreas": [
                {"storeAddresses": [{"id": 10, "name": "Ponsonby"}]},
                {"storeAddresses": [{"id": 11, "name": "Kilbirnie"}, {"id": 10, "name": "Ponsonby"}]}
            ]
        })))
        .mount(&server)
        .await;

    let regions = test_client(&server).list_regions().await.unwrap();
    let ids: Vec<i64> = regions.iter().map(|r| r.id.0).collect();
    assert_eq!(ids, vec![10, 11]);
}

#[tokio::test]
async fn list_categories_reads_shell_departments() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/shell"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "specials": [
                {"id": 1, "label": "Fruit & Veg", "url": "fruit-veg"},
                {"id": 2, "label": "Bakery", "url": "/shop/browse/bakery"},
                {"id": 3, "label": "Broken", "url": ""}
            ]
        })))
        .mount(&server)
        .await;

    let categories = test_client(&server).list_categories().await.unwrap();
    let slugs: Vec<&str> = categories.iter().map(|c| c.slug.as_str()).collect();
    assert_eq!(slugs, vec!["fruit-veg", "bakery"]);
    assert!(categories
        .iter()
        .all(|c| c.store_type == StoreType::Woolworths));
}

// ---------------------------------------------------------------------------
// Listing pagination
// ---------------------------------------------------------------------------

async fn mount_page(server: &MockServer, page: u32, entries: Vec<serde_json::Value>) {
    Mock::given(method("GET"))
        .and(path(PRODUCTS_PATH))
        .and(query_param("page", page.to_string().as_str()))
        .and(header("cookie", "ASP.NET_SessionId=sess-42; aga=region-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_page(entries)))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn category_items_walks_until_empty_page() {
    let server = MockServer::start().await;
    mount_session(&server, 42).await;
    mount_page(&server, 1, vec![product_entry("1"), product_entry("2")]).await;
    mount_page(&server, 2, vec![product_entry("3")]).await;
    mount_page(&server, 3, vec![]).await;

    let client = test_client(&server);
    let session = client.acquire_session(RegionId(42)).await.unwrap();
    let items: Vec<RawItem> = client
        .category_items(&session, &category("fruit-veg"))
        .try_collect()
        .await
        .unwrap();

    assert_eq!(skus(&items), vec!["1", "2", "3"]);

    let listing_calls = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == PRODUCTS_PATH)
        .count();
    assert_eq!(listing_calls, 3);
}

#[tokio::test]
async fn page_of_only_banners_ends_the_walk() {
    let server = MockServer::start().await;
    mount_session(&server, 42).await;
    mount_page(&server, 1, vec![banner_entry(), product_entry("7")]).await;
    mount_page(&server, 2, vec![banner_entry(), banner_entry()]).await;

    let client = test_client(&server);
    let session = client.acquire_session(RegionId(42)).await.unwrap();
    let items: Vec<RawItem> = client
        .category_items(&session, &category("bakery"))
        .try_collect()
        .await
        .unwrap();

    assert_eq!(skus(&items), vec!["7"]);
}

#[tokio::test]
async fn failed_page_fails_the_category() {
    let server = MockServer::start().await;
    mount_session(&server, 42).await;
    mount_page(&server, 1, vec![product_entry("1")]).await;
    Mock::given(method("GET"))
        .and(path(PRODUCTS_PATH))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let session = client.acquire_session(RegionId(42)).await.unwrap();
    let result: Result<Vec<RawItem>, _> = client
        .category_items(&session, &category("fruit-veg"))
        .try_collect()
        .await;

    assert!(
        matches!(
            result,
            Err(ScraperError::UnexpectedStatus { status: 502, .. })
        ),
        "expected 502 to propagate, got: {result:?}"
    );
}

#[tokio::test]
async fn malformed_page_is_deserialize_error() {
    let server = MockServer::start().await;
    mount_session(&server, 42).await;
    Mock::given(method("GET"))
        .and(path(PRODUCTS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let session = client.acquire_session(RegionId(42)).await.unwrap();
    let result: Result<Vec<RawItem>, _> = client
        .category_items(&session, &category("fruit-veg"))
        .try_collect()
        .await;

    assert!(matches!(result, Err(ScraperError::Deserialize { .. })));
}

#[tokio::test]
async fn search_items_uses_search_target() {
    let server = MockServer::start().await;
    mount_session(&server, 42).await;
    Mock::given(method("GET"))
        .and(path(PRODUCTS_PATH))
        .and(query_param("target", "search"))
        .and(query_param("search", "milk"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_page(vec![
            product_entry("282765"),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PRODUCTS_PATH))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_page(vec![])))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let session = client.acquire_session(RegionId(42)).await.unwrap();
    let items: Vec<RawItem> = client
        .search_items(&session, "milk")
        .try_collect()
        .await
        .unwrap();

    assert_eq!(skus(&items), vec!["282765"]);
}

#[tokio::test]
async fn listing_retries_after_429_and_succeeds() {
    let server = MockServer::start().await;
    mount_session(&server, 42).await;
    Mock::given(method("GET"))
        .and(path(PRODUCTS_PATH))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PRODUCTS_PATH))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_page(vec![
            product_entry("5"),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PRODUCTS_PATH))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_page(vec![])))
        .mount(&server)
        .await;

    let client = test_client_with_retries(&server, 1);
    let session = client.acquire_session(RegionId(42)).await.unwrap();
    let items: Vec<RawItem> = client
        .category_items(&session, &category("fruit-veg"))
        .try_collect()
        .await
        .unwrap();

    assert_eq!(skus(&items), vec!["5"]);
}
