//! One ranked hit returned to the caller (`spec.md` §4.8).

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
	pub place_id: i64,
	pub osm_type: String,
	pub osm_id: i64,
	pub class: String,
	pub type_: String,
	pub rank_address: i32,
	pub rank_search: i32,
	/// `search.penalty` plus any category/postcode rerank penalty
	/// accumulated while building this result. Lower is better.
	pub accuracy: f64,
	pub housenumber: Option<String>,
	pub postcode: Option<String>,
	pub country_code: Option<String>,
	pub centroid: (f64, f64),
	pub bbox_area: f64,
	pub geometry_wkb: Vec<u8>,
}
