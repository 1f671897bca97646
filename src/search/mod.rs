//! Search builder and executor (component 5-6, `spec.md` §4.6-4.8): turns
//! a [`TokenAssignment`] into one or more catalog searches, and runs a
//! sorted batch of searches against a shared [`SearchDetails`].

mod details;
mod result;

pub use details::{GeometryOutput, LayerMask, SearchDetails};
pub use result::SearchResult;

use crate::assignment::TokenAssignment;
use crate::catalog::{Catalog, CatalogQuery, PlaceRow};
use crate::cnf;
use crate::err::Error;
use crate::query::{QueryStruct, Token, TokenList, TokenRange, TokenType};

#[derive(Debug, Clone)]
pub struct CountrySearch {
	pub penalty: f64,
	pub codes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PostcodeSearch {
	pub penalty: f64,
	pub postcodes: Vec<String>,
	pub country_codes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PlaceSearch {
	pub penalty: f64,
	pub name_token_ids: Vec<i64>,
	pub housenumber: Option<String>,
	pub postcode: Option<String>,
	pub country_codes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PoiSearch {
	pub penalty: f64,
	pub categories: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct NearSearch {
	pub penalty: f64,
	pub categories: Vec<(String, String)>,
	pub inner: Box<Search>,
}

/// One candidate catalog search produced by [`build_search`].
#[derive(Debug, Clone)]
pub enum Search {
	Country(CountrySearch),
	Postcode(PostcodeSearch),
	Place(PlaceSearch),
	Poi(PoiSearch),
	Near(NearSearch),
}

impl Search {
	pub fn penalty(&self) -> f64 {
		match self {
			Search::Country(s) => s.penalty,
			Search::Postcode(s) => s.penalty,
			Search::Place(s) => s.penalty,
			Search::Poi(s) => s.penalty,
			Search::Near(s) => s.penalty,
		}
	}

	/// Tie-break priority used by the executor's sort (`spec.md` §4.6).
	pub fn priority(&self) -> u8 {
		match self {
			Search::Country(_) => 0,
			Search::Postcode(_) | Search::Place(_) | Search::Poi(_) => 1,
			Search::Near(_) => 2,
		}
	}

	pub fn lookup<'a>(&'a self, details: &'a SearchDetails, catalog: &'a dyn Catalog) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<SearchResult>, Error>> + 'a>> {
		Box::pin(async move {
			match self {
				Search::Country(s) => lookup_country(s, catalog).await,
				Search::Postcode(s) => lookup_postcode(s, details, catalog).await,
				Search::Place(s) => lookup_place(s, catalog).await,
				Search::Poi(s) => lookup_poi(s, details, catalog).await,
				Search::Near(s) => lookup_near(s, details, catalog).await,
			}
		})
	}
}

fn find_tokens<'q>(query: &'q QueryStruct, range: TokenRange, ttype: TokenType) -> Option<&'q TokenList> {
	query.nodes[range.start].starting.iter().find(|tl| tl.ttype == ttype && tl.range == range)
}

fn tokens_of<'q>(query: &'q QueryStruct, range: TokenRange, ttype: TokenType) -> &'q [Token] {
	find_tokens(query, range, ttype).map(|tl| tl.tokens.as_slice()).unwrap_or(&[])
}

/// Compile one [`TokenAssignment`] into the single [`Search`] it most
/// directly represents. Real Nominatim can fan one assignment out into
/// several concurrently-tried searches (e.g. a postcode search *and* a
/// place search for the same tokens); this builder picks the primary
/// one per assignment, which is recorded as a scope reduction.
pub fn build_search(assignment: &TokenAssignment, query: &QueryStruct) -> Option<Search> {
	let country_codes: Vec<String> = assignment.country.map(|r| tokens_of(query, r, TokenType::Country).iter().map(|t| t.word_token.clone()).collect()).unwrap_or_default();

	if assignment.address.is_empty() && assignment.name.is_none() {
		if let Some(postcode_range) = assignment.postcode {
			let postcodes = tokens_of(query, postcode_range, TokenType::Postcode).iter().map(|t| t.word_token.clone()).collect();
			return Some(Search::Postcode(PostcodeSearch {
				penalty: assignment.penalty,
				postcodes,
				country_codes,
			}));
		}
		if let Some(category_range) = assignment.near_item {
			let categories = tokens_of(query, category_range, TokenType::NearItem).iter().map(|t| t.category()).collect();
			return Some(Search::Poi(PoiSearch {
				penalty: assignment.penalty,
				categories,
			}));
		}
		if assignment.country.is_some() {
			return Some(Search::Country(CountrySearch {
				penalty: assignment.penalty,
				codes: country_codes,
			}));
		}
		return None;
	}

	let mut name_token_ids = Vec::new();
	if let Some(name_range) = assignment.name {
		name_token_ids.extend(tokens_of(query, name_range, TokenType::Partial).iter().map(|t| t.token));
	}
	for addr_range in &assignment.address {
		name_token_ids.extend(tokens_of(query, *addr_range, TokenType::Partial).iter().map(|t| t.token));
	}

	let housenumber = assignment.housenumber.and_then(|r| tokens_of(query, r, TokenType::Housenumber).first()).map(|t| t.word_token.clone());
	let postcode = assignment.postcode.and_then(|r| tokens_of(query, r, TokenType::Postcode).first()).map(|t| t.word_token.clone());

	let place = PlaceSearch {
		penalty: assignment.penalty,
		name_token_ids,
		housenumber,
		postcode,
		country_codes: country_codes.clone(),
	};

	let category_range = assignment.qualifier.or(assignment.near_item);
	let category_ttype = if assignment.qualifier.is_some() {
		TokenType::Qualifier
	} else {
		TokenType::NearItem
	};
	if let Some(range) = category_range {
		let categories = tokens_of(query, range, category_ttype).iter().map(|t| t.category()).collect();
		return Some(Search::Near(NearSearch {
			penalty: assignment.penalty,
			categories,
			inner: Box::new(Search::Place(place)),
		}));
	}

	Some(Search::Place(place))
}

fn place_row_to_result(row: &PlaceRow, accuracy: f64) -> SearchResult {
	SearchResult {
		place_id: row.place_id,
		osm_type: row.osm_type.clone(),
		osm_id: row.osm_id,
		class: row.class.clone(),
		type_: row.type_.clone(),
		rank_address: row.rank_address,
		rank_search: row.rank_search,
		accuracy,
		housenumber: row.housenumber.clone(),
		postcode: row.postcode.clone(),
		country_code: row.country_code.clone(),
		centroid: row.centroid,
		bbox_area: row.bbox_area,
		geometry_wkb: row.geometry_wkb.clone(),
	}
}

async fn lookup_country(search: &CountrySearch, catalog: &dyn Catalog) -> Result<Vec<SearchResult>, Error> {
	let rows = catalog
		.execute_places(CatalogQuery::CountryGrid {
			codes: search.codes.clone(),
		})
		.await?;
	Ok(rows.iter().map(|r| place_row_to_result(r, search.penalty)).collect())
}

/// Groups matching rows by postcode and, within each group, prefers a
/// materialized PLACEX postal-boundary row (`class=boundary`,
/// `type=postal_code`) over the raw postcode row, falling back to
/// whatever rows the catalog did return when no boundary row exists
/// (`spec.md` §4.7 "PostcodeSearch specifics").
async fn lookup_postcode(search: &PostcodeSearch, details: &SearchDetails, catalog: &dyn Catalog) -> Result<Vec<SearchResult>, Error> {
	let rows = catalog
		.execute_places(CatalogQuery::PostcodeLookup {
			postcodes: search.postcodes.clone(),
		})
		.await?;

	let matching: Vec<&PlaceRow> = rows
		.iter()
		.filter(|r| search.country_codes.is_empty() || r.country_code.as_deref().map(|c| search.country_codes.iter().any(|cc| cc.eq_ignore_ascii_case(c))).unwrap_or(false))
		.collect();

	let mut by_postcode: std::collections::HashMap<String, Vec<&PlaceRow>> = std::collections::HashMap::new();
	for row in matching {
		let key = row.postcode.as_deref().unwrap_or_default().to_ascii_lowercase();
		by_postcode.entry(key).or_default().push(row);
	}

	let mut results = Vec::new();
	for group in by_postcode.into_values() {
		let boundary: Vec<&PlaceRow> = group.iter().filter(|r| r.class == "boundary" && r.type_ == "postal_code").copied().collect();
		let preferred = if boundary.is_empty() { group } else { boundary };
		for row in preferred {
			let accuracy = search.penalty + details.viewbox_containment_penalty(row.centroid);
			results.push(place_row_to_result(row, accuracy));
		}
	}
	Ok(results)
}

async fn lookup_place(search: &PlaceSearch, catalog: &dyn Catalog) -> Result<Vec<SearchResult>, Error> {
	let rows = catalog
		.execute_places(CatalogQuery::NameSearch {
			name_token_ids: search.name_token_ids.clone(),
			country_codes: search.country_codes.clone(),
		})
		.await?;

	let mut results: Vec<SearchResult> = Vec::new();
	for row in &rows {
		let mut accuracy = search.penalty;
		let postcode_penalty = match (&search.postcode, &row.postcode) {
			(Some(wanted), Some(actual)) if wanted.eq_ignore_ascii_case(actual) => 0.0,
			(Some(_), _) => cnf::POSTCODE_DISTANCE_PENALTY_CAP,
			_ => 0.0,
		};
		accuracy += postcode_penalty;

		match (&search.housenumber, &row.housenumber) {
			(Some(wanted), Some(actual)) if wanted == actual => {
				results.push(place_row_to_result(row, accuracy));
			}
			(Some(_), _) => {
				// No housenumber match on the parent place: fall back to a
				// synthetic street-level result (`spec.md` §4.7).
				results.push(place_row_to_result(row, accuracy + cnf::MISSING_HOUSENUMBER_PENALTY));
			}
			(None, _) => results.push(place_row_to_result(row, accuracy)),
		}
	}
	Ok(results)
}

async fn lookup_poi(search: &PoiSearch, details: &SearchDetails, catalog: &dyn Catalog) -> Result<Vec<SearchResult>, Error> {
	let (near, radius) = match (details.near, details.near_radius) {
		(Some(n), Some(r)) => (n, r),
		(Some(n), None) => (n, cnf::NEAR_SEARCH_EXPANSION_WITHOUT_TABLE),
		_ => return Ok(Vec::new()),
	};

	let mut results = Vec::new();
	for (class, type_) in &search.categories {
		let rows = catalog
			.execute_places(CatalogQuery::ClassType {
				class: class.clone(),
				type_: type_.clone(),
				near,
				radius_deg: radius,
			})
			.await?;
		results.extend(rows.iter().map(|r| place_row_to_result(r, search.penalty)));
	}
	Ok(results)
}

/// `r0.rank_address`-driven address-rank window (`spec.md` §4.7).
fn near_rank_window(rank_address: i32) -> (i32, i32) {
	if rank_address == 0 {
		(0, 0)
	} else if rank_address < 26 {
		(1, (rank_address + 4).min(25))
	} else {
		(26, 30)
	}
}

async fn lookup_near(search: &NearSearch, details: &SearchDetails, catalog: &dyn Catalog) -> Result<Vec<SearchResult>, Error> {
	let mut anchors = search.inner.lookup(details, catalog).await?;
	if anchors.is_empty() {
		return Ok(Vec::new());
	}
	anchors.sort_by(|a, b| a.accuracy.partial_cmp(&b.accuracy).unwrap().then(a.rank_search.cmp(&b.rank_search)));

	let best = anchors[0].clone();
	let (lo, hi) = near_rank_window(best.rank_address);
	let accuracy_cap = best.accuracy + cnf::NEAR_SEARCH_ACCURACY_SLACK;

	let mut candidates: Vec<SearchResult> = anchors
		.into_iter()
		.filter(|r| r.accuracy <= accuracy_cap && r.bbox_area < cnf::NEAR_SEARCH_MAX_BBOX_AREA && r.rank_address >= lo && r.rank_address <= hi)
		.collect();
	candidates.truncate(cnf::NEAR_SEARCH_ANCHOR_COUNT);

	let mut results = Vec::new();
	for anchor in &candidates {
		let has_class_table = catalog.get_class_table(&search.categories.first().map(|c| c.0.clone()).unwrap_or_default(), &search.categories.first().map(|c| c.1.clone()).unwrap_or_default()).await?.is_some();
		let expansion = if has_class_table {
			cnf::NEAR_SEARCH_EXPANSION_WITH_TABLE
		} else {
			cnf::NEAR_SEARCH_EXPANSION_WITHOUT_TABLE
		};

		for (class, type_) in &search.categories {
			let rows = catalog
				.execute_places(CatalogQuery::ClassType {
					class: class.clone(),
					type_: type_.clone(),
					near: anchor.centroid,
					radius_deg: expansion,
				})
				.await?;
			results.extend(rows.iter().map(|r| place_row_to_result(r, search.penalty)));
		}
	}
	Ok(results)
}

/// Sort searches by `(penalty, priority)` and run them sequentially
/// against a shared catalog, merging, filtering and ranking results
/// (`spec.md` §4.7-4.8).
pub async fn execute(searches: Vec<Search>, details: &SearchDetails, catalog: &dyn Catalog) -> Result<Vec<SearchResult>, Error> {
	let mut searches = searches;
	searches.sort_by(|a, b| a.penalty().partial_cmp(&b.penalty()).unwrap().then(a.priority().cmp(&b.priority())));

	let mut results = Vec::new();
	let mut last_error = None;
	let mut any_succeeded = searches.is_empty();

	for search in &searches {
		match search.lookup(details, catalog).await {
			Ok(rows) => {
				any_succeeded = true;
				results.extend(rows);
			}
			Err(e) if e.is_recoverable_in_executor() => {
				warn!(error = %e, "search failed, continuing with remaining searches");
				last_error = Some(e);
			}
			Err(e) => return Err(e),
		}
		if results.len() >= details.max_results {
			break;
		}
	}

	if !any_succeeded {
		if let Some(e) = last_error {
			return Err(e);
		}
	}

	results.retain(|r| details.admits(r));

	let mut best: std::collections::HashMap<i64, SearchResult> = std::collections::HashMap::new();
	for r in results {
		best.entry(r.place_id).and_modify(|existing| if r.accuracy < existing.accuracy { *existing = r.clone() }).or_insert(r);
	}
	let mut results: Vec<SearchResult> = best.into_values().collect();
	results.sort_by(|a, b| a.accuracy.partial_cmp(&b.accuracy).unwrap().then(a.rank_search.cmp(&b.rank_search)).then(a.place_id.cmp(&b.place_id)));
	results.truncate(details.max_results);

	Ok(results)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::catalog::memory::MemoryCatalog;
	use crate::catalog::PlaceRow;

	fn row(place_id: i64, rank_address: i32, name_tokens: Vec<i64>) -> PlaceRow {
		PlaceRow {
			place_id,
			osm_type: "N".into(),
			osm_id: place_id,
			class: "place".into(),
			type_: "town".into(),
			rank_address,
			rank_search: rank_address,
			importance: 0.5,
			country_code: Some("de".into()),
			postcode: None,
			housenumber: None,
			centroid: (13.4, 52.5),
			bbox_area: 0.01,
			geometry_wkb: vec![],
			name_tokens,
		}
	}

	#[tokio::test]
	async fn place_search_requires_all_name_tokens() {
		let catalog = MemoryCatalog::new().with_place(row(1, 16, vec![10, 11]));
		let search = PlaceSearch {
			penalty: 0.0,
			name_token_ids: vec![10, 11],
			housenumber: None,
			postcode: None,
			country_codes: vec![],
		};
		let results = lookup_place(&search, &catalog).await.unwrap();
		assert_eq!(results.len(), 1);
		assert_eq!(results[0].place_id, 1);
	}

	#[tokio::test]
	async fn missing_housenumber_adds_penalty() {
		let catalog = MemoryCatalog::new().with_place(row(1, 30, vec![10]));
		let search = PlaceSearch {
			penalty: 0.0,
			name_token_ids: vec![10],
			housenumber: Some("7".into()),
			postcode: None,
			country_codes: vec![],
		};
		let results = lookup_place(&search, &catalog).await.unwrap();
		assert_eq!(results[0].accuracy, cnf::MISSING_HOUSENUMBER_PENALTY);
	}

	fn postcode_row(place_id: i64, class: &str, type_: &str, postcode: &str) -> PlaceRow {
		PlaceRow {
			class: class.into(),
			type_: type_.into(),
			postcode: Some(postcode.into()),
			..row(place_id, 11, vec![])
		}
	}

	#[tokio::test]
	async fn postcode_search_prefers_the_placex_boundary_row() {
		let catalog = MemoryCatalog::new().with_place(postcode_row(1, "building", "house", "12345")).with_place(postcode_row(2, "boundary", "postal_code", "12345"));
		let search = PostcodeSearch {
			penalty: 0.0,
			postcodes: vec!["12345".into()],
			country_codes: vec![],
		};
		let results = lookup_postcode(&search, &SearchDetails::default(), &catalog).await.unwrap();
		assert_eq!(results.len(), 1);
		assert_eq!(results[0].place_id, 2);
	}

	#[tokio::test]
	async fn postcode_search_falls_back_to_raw_row_without_a_boundary() {
		let catalog = MemoryCatalog::new().with_place(postcode_row(1, "building", "house", "12345"));
		let search = PostcodeSearch {
			penalty: 0.0,
			postcodes: vec!["12345".into()],
			country_codes: vec![],
		};
		let results = lookup_postcode(&search, &SearchDetails::default(), &catalog).await.unwrap();
		assert_eq!(results.len(), 1);
		assert_eq!(results[0].place_id, 1);
	}

	#[tokio::test]
	async fn postcode_search_applies_viewbox_containment_penalty() {
		let catalog = MemoryCatalog::new().with_place(postcode_row(1, "boundary", "postal_code", "12345"));
		let search = PostcodeSearch {
			penalty: 0.2,
			postcodes: vec!["12345".into()],
			country_codes: vec![],
		};
		let mut details = SearchDetails::default();
		details.viewbox = Some((0.0, 0.0, 1.0, 1.0));
		let results = lookup_postcode(&search, &details, &catalog).await.unwrap();
		assert_eq!(results[0].accuracy, 0.2 + 1.0);
	}

	#[test]
	fn near_rank_window_thresholds() {
		assert_eq!(near_rank_window(0), (0, 0));
		assert_eq!(near_rank_window(10), (1, 14));
		assert_eq!(near_rank_window(25), (1, 25));
		assert_eq!(near_rank_window(26), (26, 30));
	}
}
