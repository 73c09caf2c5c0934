//! Parts and Product Query Integration Tests
//!
//! Runs the DAOs end to end against the in-process store, seeded with a
//! small catalogue:
//!
//! - `P1`: a book with eight chapters
//! - `P2`: a book with three chapters and two creative works, one with
//!   format `document` and one with format `hyperlink`
//! - four books carrying availability channels, for rule queries
//!
//! ## Running
//!
//! ```bash
//! cargo test -p pcm-store --test parts_queries
//! ```

use mongodb::bson::{Bson, Document, doc};
use pcm_core::{AvailabilityChannel, SortOrder};
use pcm_store::{
    ErrorKind, MemoryStore, PARTS_QUERY_FAILED, PartsDao, ProductDao, Projection,
    RuleQueryRequest, StoreBackend,
};
use serde_json::json;

// ============================================================================
// Fixtures
// ============================================================================

fn chapter(id: &str, position: i32) -> Document {
    doc! {
        "_id": id,
        "type": "chapter",
        "position": position,
        "isFree": position == 1,
        "title": format!("Chapter {}", position),
    }
}

async fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();

    let p1_parts: Vec<Bson> = (1..=8)
        .map(|i| Bson::Document(chapter(&format!("P1-C{}", i), i)))
        .collect();
    store
        .insert_one("parts", doc! { "_id": "P1", "parts": p1_parts })
        .await;

    store
        .insert_one(
            "parts",
            doc! {
                "_id": "P2",
                "parts": [
                    chapter("P2-C1", 1),
                    { "_id": "P2-W1", "type": "creativeWork", "position": 2 },
                    chapter("P2-C2", 3),
                    { "_id": "P2-W2", "type": "creativeWork", "position": 4 },
                    chapter("P2-C3", 5),
                ],
            },
        )
        .await;

    store
        .insert_many(
            "creativeworks",
            vec![
                doc! { "_id": "P2-W1", "type": "creativeWork", "format": "document" },
                doc! { "_id": "P2-W2", "type": "creativeWork", "format": "hyperlink" },
            ],
        )
        .await;

    store
        .insert_many(
            "books",
            vec![
                doc! {
                    "_id": "B1",
                    "type": "book",
                    "subject": "maths",
                    "title": "Algebra",
                    "availability": [
                        { "name": "UBX", "status": ["SELLABLE"] },
                        { "name": "SALES", "status": ["PRE_ORDER"] },
                        { "name": "EBK", "status": ["SELLABLE"] },
                    ],
                    "prices": [
                        { "price": 10.0, "currency": "GBP", "priceTypeCode": "BYO" },
                        { "price": 12.0, "currency": "USD", "priceTypeCode": "BYO" },
                        { "price": 99.0, "currency": "EUR", "priceTypeCode": "BYO" },
                    ],
                },
                doc! {
                    "_id": "B2",
                    "type": "book",
                    "subject": "maths",
                    "title": "Geometry",
                    "availability": [{ "name": "SALES", "status": ["SELLABLE"] }],
                    "prices": [
                        { "price": 20.0, "currency": "GBP", "priceTypeCode": "BYO" },
                        { "price": 5.0, "currency": "GBP", "priceTypeCode": "INST" },
                    ],
                },
                doc! {
                    "_id": "B3",
                    "type": "book",
                    "subject": "maths",
                    "title": "Topology",
                    "availability": [{ "name": "UBX", "status": ["SELLABLE"] }],
                },
                doc! {
                    "_id": "B4",
                    "type": "book",
                    "subject": "art",
                    "title": "Colour",
                    "availability": [{ "name": "UBX", "status": ["SELLABLE"] }],
                },
            ],
        )
        .await;

    store
}

async fn parts_dao() -> PartsDao<StoreBackend> {
    PartsDao::new(StoreBackend::from(seeded_store().await))
}

async fn product_dao() -> ProductDao<StoreBackend> {
    ProductDao::new(StoreBackend::from(seeded_store().await))
}

fn ids(parts: &[pcm_core::HasPart]) -> Vec<&str> {
    parts.iter().map(|p| p.id_str()).collect()
}

fn none() -> Projection {
    Projection::default()
}

// ============================================================================
// Parts: Absence
// ============================================================================

#[tokio::test]
async fn test_missing_parent_is_empty_not_error() {
    let dao = parts_dao().await;

    let parts = dao
        .get_has_parts("nonexistent", Some(0), Some(10), &none(), None, None)
        .await
        .unwrap();
    assert!(parts.is_none());

    assert_eq!(dao.get_has_parts_count("nonexistent", None, None).await.unwrap(), 0);
    assert_eq!(
        dao.get_has_parts_count("nonexistent", Some("chapter"), None)
            .await
            .unwrap(),
        0
    );
    assert!(dao.get_all_parts_count("nonexistent").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_everything_filtered_out_is_none() {
    let dao = parts_dao().await;
    let parts = dao
        .get_has_parts("P1", None, None, &none(), Some("creativeWork"), None)
        .await
        .unwrap();
    assert!(parts.is_none());
}

// ============================================================================
// Parts: Paging
// ============================================================================

#[tokio::test]
async fn test_limit_returns_prefix() {
    let dao = parts_dao().await;

    let all = dao
        .get_has_parts("P1", None, None, &none(), None, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(all.len(), 8);

    let page = dao
        .get_has_parts("P1", Some(0), Some(4), &none(), None, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(page.len(), 4);
    assert_eq!(ids(&page), ids(&all[..4]));
}

#[tokio::test]
async fn test_offset_and_limit_slice_in_array_order() {
    let dao = parts_dao().await;

    let all = dao
        .get_has_parts("P1", None, None, &none(), None, None)
        .await
        .unwrap()
        .unwrap();

    for (k, m) in [(0, 8), (1, 2), (3, 5), (6, 2), (7, 1)] {
        let slice = dao
            .get_has_parts("P1", Some(k), Some(m), &none(), None, None)
            .await
            .unwrap()
            .unwrap();
        let (k, m) = (k as usize, m as usize);
        assert_eq!(ids(&slice), ids(&all[k..k + m]), "offset {} limit {}", k, m);
    }

    let shifted = dao
        .get_has_parts("P1", Some(1), Some(2), &none(), None, None)
        .await
        .unwrap()
        .unwrap();
    let head = dao
        .get_has_parts("P1", Some(0), Some(3), &none(), None, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(shifted[0].id, head[1].id);
}

#[tokio::test]
async fn test_offset_past_end_is_none() {
    let dao = parts_dao().await;
    let parts = dao
        .get_has_parts("P1", Some(20), Some(5), &none(), None, None)
        .await
        .unwrap();
    assert!(parts.is_none());
}

#[tokio::test]
async fn test_negative_limit_is_a_query_failure() {
    let dao = parts_dao().await;
    let err = dao
        .get_has_parts("P1", None, Some(-1), &none(), None, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QueryFailure);
    assert_eq!(err.to_string(), PARTS_QUERY_FAILED);
}

// ============================================================================
// Parts: Filters
// ============================================================================

#[tokio::test]
async fn test_part_type_is_case_insensitive() {
    let dao = parts_dao().await;

    let lower = dao
        .get_has_parts("P2", None, None, &none(), Some("chapter"), None)
        .await
        .unwrap()
        .unwrap();
    let upper = dao
        .get_has_parts("P2", None, None, &none(), Some("CHAPTER"), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ids(&lower), vec!["P2-C1", "P2-C2", "P2-C3"]);
    assert_eq!(ids(&lower), ids(&upper));
}

#[tokio::test]
async fn test_part_type_is_matched_in_full() {
    let dao = parts_dao().await;
    let parts = dao
        .get_has_parts("P2", None, None, &none(), Some("chap"), None)
        .await
        .unwrap();
    assert!(parts.is_none());
}

#[tokio::test]
async fn test_creative_work_format_is_joined() {
    let dao = parts_dao().await;

    let works = dao
        .get_has_parts("P2", Some(0), Some(10), &none(), Some("creativeWork"), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ids(&works), vec!["P2-W1", "P2-W2"]);
    assert_eq!(works[0].format.as_deref(), Some("document"));
    assert_eq!(works[1].format.as_deref(), Some("hyperlink"));

    let documents = dao
        .get_has_parts(
            "P2",
            Some(0),
            Some(10),
            &none(),
            Some("creativeWork"),
            Some("document"),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ids(&documents), vec!["P2-W1"]);
}

#[tokio::test]
async fn test_format_match_is_case_sensitive() {
    let dao = parts_dao().await;
    let parts = dao
        .get_has_parts("P2", None, None, &none(), Some("creativeWork"), Some("Document"))
        .await
        .unwrap();
    assert!(parts.is_none());
}

#[tokio::test]
async fn test_projection_keeps_requested_fields() {
    let dao = parts_dao().await;
    let projection = Projection::new(["parts._id", "parts.position"]);

    let parts = dao
        .get_has_parts("P1", Some(0), Some(2), &projection, None, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].position, Some(1));
    assert!(parts[0].title.is_none());
    assert!(parts[0].is_free.is_none());
}

async fn loosely_typed_dao() -> PartsDao<MemoryStore> {
    let store = MemoryStore::new();
    store
        .insert_one(
            "parts",
            doc! {
                "_id": "P3",
                "parts": [
                    { "_id": "P3-C1", "type": "chapter", "position": 1, "pageStart": 1, "pageEnd": 20, "title": "T", "doi": "10.1/x" },
                    { "_id": "P3-C2", "type": "chapter", "position": 2, "pageStart": "xi", "pageEnd": "xx" },
                ],
            },
        )
        .await;
    PartsDao::new(store)
}

#[tokio::test]
async fn test_numeric_page_numbers_are_returned() {
    let dao = loosely_typed_dao().await;
    let parts = dao
        .get_has_parts("P3", None, None, &none(), None, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ids(&parts), vec!["P3-C1", "P3-C2"]);
    assert_eq!(parts[0].page_start, Some(json!(1)));
    assert_eq!(parts[0].page_end, Some(json!(20)));
    assert_eq!(parts[1].page_start, Some(json!("xi")));
    assert_eq!(parts[0].extra.get("doi"), Some(&json!("10.1/x")));
}

#[tokio::test]
async fn test_projection_of_title_alone_has_no_id() {
    let dao = loosely_typed_dao().await;
    let parts = dao
        .get_has_parts("P3", Some(0), Some(1), &Projection::new(["parts.title"]), None, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(serde_json::to_value(&parts).unwrap(), json!([{ "title": "T" }]));
}

#[tokio::test]
async fn test_projection_keeps_unmodelled_field() {
    let dao = loosely_typed_dao().await;
    let parts = dao
        .get_has_parts("P3", Some(0), Some(1), &Projection::new(["parts.doi"]), None, None)
        .await
        .unwrap()
        .unwrap();
    assert!(parts[0].id.is_none());
    assert_eq!(serde_json::to_value(&parts).unwrap(), json!([{ "doi": "10.1/x" }]));
}

// ============================================================================
// Parts: Counts
// ============================================================================

#[tokio::test]
async fn test_counts() {
    let dao = parts_dao().await;

    assert_eq!(dao.get_has_parts_count("P1", None, None).await.unwrap(), 8);
    assert_eq!(dao.get_has_parts_count("P2", None, None).await.unwrap(), 5);
    assert_eq!(
        dao.get_has_parts_count("P2", Some("Chapter"), None).await.unwrap(),
        3
    );
    assert_eq!(
        dao.get_has_parts_count("P2", Some("creativeWork"), Some("hyperlink"))
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_unfiltered_and_filtered_counts_agree() {
    let dao = parts_dao().await;

    let direct = dao.get_has_parts_count("P1", None, None).await.unwrap();
    let piped = dao.get_has_parts_count("P1", Some("chapter"), None).await.unwrap();
    assert_eq!(direct, piped);

    // Empty strings are treated as absent filters.
    let empty = dao.get_has_parts_count("P1", Some(""), Some("")).await.unwrap();
    assert_eq!(direct, empty);
}

#[tokio::test]
async fn test_all_parts_count_by_type() {
    let dao = parts_dao().await;

    let mut counts = dao.get_all_parts_count("P2").await.unwrap();
    counts.sort_by(|a, b| a.part_type.cmp(&b.part_type));

    assert_eq!(counts.len(), 2);
    assert_eq!(counts[0].part_type.as_deref(), Some("chapter"));
    assert_eq!(counts[0].count, 3);
    assert_eq!(counts[1].part_type.as_deref(), Some("creativeWork"));
    assert_eq!(counts[1].count, 2);

    let total: u64 = counts.iter().map(|c| c.count).sum();
    assert_eq!(total, dao.get_has_parts_count("P2", None, None).await.unwrap());
}

// ============================================================================
// Products: Rule Queries
// ============================================================================

fn maths() -> serde_json::Value {
    json!({ "subject": "maths" })
}

#[tokio::test]
async fn test_rules_sorted_descending_by_default() {
    let dao = product_dao().await;
    let request = RuleQueryRequest {
        product_type: "book".into(),
        rules: maths(),
        ..RuleQueryRequest::default()
    };

    let products = dao.get_products_by_rule(&request).await.unwrap();
    let ids: Vec<&str> = products.iter().map(|p| p.get_str("_id").unwrap()).collect();
    assert_eq!(ids, vec!["B3", "B2", "B1"]);
}

#[tokio::test]
async fn test_rules_paging_and_projection() {
    let dao = product_dao().await;
    let request = RuleQueryRequest {
        product_type: "Book".into(),
        rules: maths(),
        projections: Some(json!(["title"])),
        offset: Some(1),
        limit: Some(1),
        sort_order: SortOrder::Asc,
        ..RuleQueryRequest::default()
    };

    let products = dao.get_products_by_rule(&request).await.unwrap();
    assert_eq!(products, vec![doc! { "_id": "B2", "title": "Geometry" }]);
}

#[tokio::test]
async fn test_availability_list_filters_channel_entries() {
    let dao = product_dao().await;
    let request = RuleQueryRequest {
        product_type: "book".into(),
        rules: maths(),
        projections: Some(json!(["title"])),
        availability: vec![
            AvailabilityChannel { name: "UBX".into() },
            AvailabilityChannel { name: "EBK".into() },
        ],
        ..RuleQueryRequest::default()
    };

    let products = dao.get_products_by_rule(&request).await.unwrap();
    assert_eq!(products.len(), 3);

    for product in &products {
        let channels = product.get_array("availability").unwrap();
        for channel in channels {
            let name = channel.as_document().unwrap().get_str("name").unwrap();
            assert!(name == "UBX" || name == "EBK", "unexpected channel {}", name);
        }
    }

    let b1 = products.iter().find(|p| p.get_str("_id").ok() == Some("B1")).unwrap();
    assert_eq!(b1.get_array("availability").unwrap().len(), 2);
    let b2 = products.iter().find(|p| p.get_str("_id").ok() == Some("B2")).unwrap();
    assert!(b2.get_array("availability").unwrap().is_empty());
}

#[tokio::test]
async fn test_availability_name_projects_first_match() {
    let dao = product_dao().await;
    let request = RuleQueryRequest {
        product_type: "book".into(),
        rules: json!({ "_id": "B1" }),
        projections: Some(json!(["title"])),
        availability_name: Some("SALES".into()),
        ..RuleQueryRequest::default()
    };

    let products = dao.get_products_by_rule(&request).await.unwrap();
    assert_eq!(products.len(), 1);
    let channels = products[0].get_array("availability").unwrap();
    assert_eq!(channels.len(), 1);
    assert_eq!(
        channels[0].as_document().unwrap().get_str("name").unwrap(),
        "SALES"
    );
}

#[tokio::test]
async fn test_invalid_projection_propagates() {
    let dao = product_dao().await;
    let request = RuleQueryRequest {
        product_type: "book".into(),
        projections: Some(json!({ "title": 1 })),
        ..RuleQueryRequest::default()
    };
    let err = dao.get_products_by_rule(&request).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidProjection);
}

// ============================================================================
// Products: Prices
// ============================================================================

#[tokio::test]
async fn test_prices_grouped_by_currency_and_type() {
    let dao = product_dao().await;

    let prices = dao
        .get_products_price_by_rules("book", &maths())
        .await
        .unwrap();

    assert_eq!(prices.len(), 2);
    assert_eq!(prices[0].currency, "GBP");
    assert_eq!(prices[0].price_type_code, "BYO");
    assert_eq!(prices[0].price, 30.0);
    assert_eq!(prices[0].product_count, 2);

    assert_eq!(prices[1].currency, "USD");
    assert_eq!(prices[1].price, 12.0);
    assert_eq!(prices[1].product_count, 1);
}

#[tokio::test]
async fn test_prices_for_no_matches_is_empty() {
    let dao = product_dao().await;
    let prices = dao
        .get_products_price_by_rules("book", &json!({ "subject": "history" }))
        .await
        .unwrap();
    assert!(prices.is_empty());
}
