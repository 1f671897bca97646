//! End-to-end scenarios run through `SearchEngine::search` against an
//! in-memory catalog, covering the literal request/response shapes the
//! executor is expected to produce.

use nominatim_search_core::catalog::memory::MemoryCatalog;
use nominatim_search_core::catalog::{CatalogRow, PlaceRow};
use nominatim_search_core::search::SearchDetails;
use nominatim_search_core::SearchEngine;
use serde_json::json;

const NO_PREPROCESSING: &str = "query-preprocessing: []\n";

fn word(word_id: i64, token: &str, row_type: &str) -> CatalogRow {
	CatalogRow {
		word_id,
		word_token: token.to_string(),
		word: Some(token.to_string()),
		row_type: row_type.to_string(),
		info: None,
	}
}

fn place(place_id: i64, class: &str, type_: &str, rank_address: i32, country: &str, name_tokens: Vec<i64>) -> PlaceRow {
	PlaceRow {
		place_id,
		osm_type: "N".into(),
		osm_id: place_id,
		class: class.into(),
		type_: type_.into(),
		rank_address,
		rank_search: rank_address,
		importance: 0.5,
		country_code: Some(country.into()),
		postcode: None,
		housenumber: None,
		centroid: (0.0, 0.0),
		bbox_area: 0.01,
		geometry_wkb: vec![],
		name_tokens,
	}
}

#[tokio::test]
async fn housenumber_and_postcode_resolve_to_one_place() {
	let catalog = MemoryCatalog::new()
		.with_word(word(2, "downing", "w"))
		.with_word(word(3, "street", "w"))
		.with_word(word(4, "london", "w"))
		.with_word(word(5, "sw1a", "P"))
		.with_place(PlaceRow {
			housenumber: Some("10".into()),
			postcode: Some("sw1a".into()),
			rank_address: 30,
			..place(1, "building", "house", 30, "gb", vec![2, 3, 4])
		});

	let engine = SearchEngine::setup(&catalog, NO_PREPROCESSING).await.unwrap();
	let details = SearchDetails::default();
	let results = engine.search("10 Downing Street, London SW1A", &details, &catalog).await.unwrap();

	assert_eq!(results.len(), 1);
	assert_eq!(results[0].housenumber.as_deref(), Some("10"));
	assert!(results[0].rank_address >= 26);
}

#[tokio::test]
async fn bare_country_name_yields_country_search() {
	let catalog = MemoryCatalog::new().with_word(word(1, "de", "C")).with_place(place(100, "boundary", "administrative", 5, "de", vec![]));

	let engine = SearchEngine::setup(&catalog, NO_PREPROCESSING).await.unwrap();
	let mut details = SearchDetails::default();
	details.min_rank = 5;
	details.max_rank = 25;
	let results = engine.search("de", &details, &catalog).await.unwrap();

	assert_eq!(results.len(), 1);
	assert_eq!(results[0].place_id, 100);
}

#[tokio::test]
async fn bare_postcode_resolves_to_postal_boundary() {
	let catalog = MemoryCatalog::new().with_word(word(1, "sw1a", "P")).with_place(PlaceRow {
		postcode: Some("sw1a".into()),
		..place(7, "boundary", "postal_code", 11, "gb", vec![])
	});

	let engine = SearchEngine::setup(&catalog, NO_PREPROCESSING).await.unwrap();
	let details = SearchDetails::default();
	let results = engine.search("SW1A", &details, &catalog).await.unwrap();

	assert_eq!(results.len(), 1);
	assert_eq!(results[0].postcode.as_deref(), Some("sw1a"));
}

#[tokio::test]
async fn category_word_near_point_finds_direct_placex_match() {
	let catalog = MemoryCatalog::new().with_word(CatalogRow {
		word_id: 1,
		word_token: "restaurant".into(),
		word: Some("restaurant".into()),
		row_type: "S".into(),
		info: Some(json!({"class": "amenity", "type": "restaurant", "op": "near"})),
	});
	let catalog = catalog.with_place(place(50, "amenity", "restaurant", 30, "gb", vec![]));

	let engine = SearchEngine::setup(&catalog, NO_PREPROCESSING).await.unwrap();
	let mut details = SearchDetails::default();
	details.near = Some((0.0, 0.0));
	details.near_radius = Some(0.001);
	let results = engine.search("restaurant", &details, &catalog).await.unwrap();

	assert_eq!(results.len(), 1);
	assert_eq!(results[0].place_id, 50);

	let mut far_details = SearchDetails::default();
	far_details.near = Some((10.0, 10.0));
	far_details.near_radius = Some(0.001);
	let far_results = engine.search("restaurant", &far_details, &catalog).await.unwrap();
	assert!(far_results.is_empty());
}

#[tokio::test]
async fn excluded_place_id_is_dropped_from_results() {
	let catalog = MemoryCatalog::new()
		.with_word(word(2, "main", "w"))
		.with_word(word(3, "st", "w"))
		.with_word(word(4, "springfield", "w"))
		.with_word(word(5, "12345", "P"))
		.with_place(PlaceRow {
			housenumber: Some("7".into()),
			postcode: Some("12345".into()),
			rank_address: 30,
			..place(10, "building", "house", 30, "us", vec![2, 3, 4])
		});

	let engine = SearchEngine::setup(&catalog, NO_PREPROCESSING).await.unwrap();

	let details = SearchDetails::default();
	let results = engine.search("Main St 7, 12345 Springfield", &details, &catalog).await.unwrap();
	assert!(results.iter().any(|r| r.place_id == 10));

	let mut excluding = SearchDetails::default();
	excluding.excluded.push(10);
	let results = engine.search("Main St 7, 12345 Springfield", &excluding, &catalog).await.unwrap();
	assert!(results.iter().all(|r| r.place_id != 10));
}
