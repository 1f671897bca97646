//! The catalog capability set (`spec.md` §6, design note "catalog
//! abstraction"): the seam between this crate and the persistent place
//! store, which is out of scope here and referenced only by interface.

pub mod memory;

use crate::err::Error;
use async_trait::async_trait;
use serde_json::Value as Json;

/// One row returned by a catalog word-table or place-table lookup.
/// Field names mirror the columns the tokenizer and search builder read
/// (`spec.md` §3, §4.3, §4.6); unused columns for a given query are left
/// `None`.
#[derive(Debug, Clone, Default)]
pub struct CatalogRow {
	pub word_id: i64,
	pub word_token: String,
	pub word: Option<String>,
	/// One of `W`, `w`, `H`, `P`, `C`, `S` (`spec.md` §4.3 step 6).
	pub row_type: String,
	pub info: Option<Json>,
}

/// A place row as stored in `placex`/`search_name` and friends, trimmed to
/// the fields the executor and result ranking need.
#[derive(Debug, Clone)]
pub struct PlaceRow {
	pub place_id: i64,
	pub osm_type: String,
	pub osm_id: i64,
	pub class: String,
	pub type_: String,
	pub rank_address: i32,
	pub rank_search: i32,
	pub importance: f64,
	pub country_code: Option<String>,
	pub postcode: Option<String>,
	pub housenumber: Option<String>,
	pub centroid: (f64, f64),
	pub bbox_area: f64,
	/// Well-known-binary geometry, always populated (`spec.md` §4.8).
	pub geometry_wkb: Vec<u8>,
	/// Catalog word ids that make up this place's searchable name and
	/// address terms, standing in for a `search_name` table row.
	pub name_tokens: Vec<i64>,
}

/// A query sent to [`Catalog::execute`]. Kept as a small tagged enum
/// rather than a free-form SQL string so a test double can answer without
/// parsing SQL; a production implementation backs this onto a SQL builder
/// (design note "catalog abstraction").
#[derive(Debug, Clone)]
pub enum CatalogQuery {
	WordLookup {
		words: Vec<String>,
	},
	Place {
		place_ids: Vec<i64>,
	},
	CountryGrid {
		codes: Vec<String>,
	},
	PostcodeLookup {
		postcodes: Vec<String>,
	},
	ClassType {
		class: String,
		type_: String,
		near: (f64, f64),
		radius_deg: f64,
	},
	/// Stand-in for the `search_name`/PLACEX join a `PlaceSearch`
	/// performs: every returned place must carry all of `name_token_ids`
	/// among its name/address terms.
	NameSearch {
		name_token_ids: Vec<i64>,
		country_codes: Vec<String>,
	},
}

/// The capability set every search implementation receives: structured
/// queries, process-wide properties, a factory-memoized cache, and lookup
/// of dynamic class/type companion tables.
#[async_trait]
pub trait Catalog: Send + Sync {
	async fn execute(&self, query: CatalogQuery) -> Result<Vec<CatalogRow>, Error>;

	async fn execute_places(&self, query: CatalogQuery) -> Result<Vec<PlaceRow>, Error>;

	async fn get_property(&self, name: &str) -> Result<Option<String>, Error>;

	/// Name of the dynamic `place_classtype_{class}_{type}` companion
	/// table, if the catalog has materialized one for this class/type.
	async fn get_class_table(&self, class: &str, type_: &str) -> Result<Option<String>, Error>;
}
