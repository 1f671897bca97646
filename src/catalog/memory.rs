//! An in-memory [`Catalog`] test double.
//!
//! Mirrors the teacher's own `Datastore::new("memory")` test harness
//! (`idx/ft/analyzer/mod.rs` tests): no real database, just enough state to
//! drive unit and end-to-end tests deterministically.

use super::{Catalog, CatalogQuery, CatalogRow, PlaceRow};
use crate::err::Error;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
pub struct MemoryCatalog {
	words: Vec<CatalogRow>,
	places: Vec<PlaceRow>,
	properties: HashMap<String, String>,
	class_tables: HashMap<(String, String), String>,
	/// Calls made to [`Catalog::execute`], retained for assertions in
	/// tests that need to verify a search actually ran.
	calls: RwLock<Vec<String>>,
}

impl MemoryCatalog {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_word(mut self, row: CatalogRow) -> Self {
		self.words.push(row);
		self
	}

	pub fn with_place(mut self, row: PlaceRow) -> Self {
		self.places.push(row);
		self
	}

	pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.properties.insert(name.into(), value.into());
		self
	}

	pub fn with_class_table(mut self, class: impl Into<String>, type_: impl Into<String>, table: impl Into<String>) -> Self {
		self.class_tables.insert((class.into(), type_.into()), table.into());
		self
	}

	pub fn call_log(&self) -> Vec<String> {
		self.calls.read().unwrap().clone()
	}

	fn log(&self, what: impl Into<String>) {
		self.calls.write().unwrap().push(what.into());
	}
}

fn haversine_deg(a: (f64, f64), b: (f64, f64)) -> f64 {
	((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

#[async_trait]
impl Catalog for MemoryCatalog {
	async fn execute(&self, query: CatalogQuery) -> Result<Vec<CatalogRow>, Error> {
		match query {
			CatalogQuery::WordLookup {
				words,
			} => {
				self.log(format!("word_lookup:{}", words.join(",")));
				Ok(self.words.iter().filter(|r| words.contains(&r.word_token)).cloned().collect())
			}
			other => Err(Error::Internal(format!("execute() does not handle {other:?} — use execute_places"))),
		}
	}

	async fn execute_places(&self, query: CatalogQuery) -> Result<Vec<PlaceRow>, Error> {
		match query {
			CatalogQuery::Place {
				place_ids,
			} => {
				self.log(format!("place:{place_ids:?}"));
				Ok(self.places.iter().filter(|p| place_ids.contains(&p.place_id)).cloned().collect())
			}
			CatalogQuery::CountryGrid {
				codes,
			} => {
				self.log(format!("country_grid:{codes:?}"));
				Ok(self
					.places
					.iter()
					.filter(|p| p.country_code.as_deref().map(|c| codes.iter().any(|code| code.eq_ignore_ascii_case(c))).unwrap_or(false))
					.cloned()
					.collect())
			}
			CatalogQuery::PostcodeLookup {
				postcodes,
			} => {
				self.log(format!("postcode:{postcodes:?}"));
				Ok(self
					.places
					.iter()
					.filter(|p| p.postcode.as_deref().map(|pc| postcodes.iter().any(|q| q.eq_ignore_ascii_case(pc))).unwrap_or(false))
					.cloned()
					.collect())
			}
			CatalogQuery::ClassType {
				class,
				type_,
				near,
				radius_deg,
			} => {
				self.log(format!("class_type:{class}/{type_}"));
				Ok(self
					.places
					.iter()
					.filter(|p| p.class == class && p.type_ == type_ && haversine_deg(p.centroid, near) <= radius_deg)
					.cloned()
					.collect())
			}
			CatalogQuery::NameSearch {
				name_token_ids,
				country_codes,
			} => {
				self.log(format!("name_search:{name_token_ids:?}"));
				Ok(self
					.places
					.iter()
					.filter(|p| name_token_ids.iter().all(|id| p.name_tokens.contains(id)))
					.filter(|p| country_codes.is_empty() || p.country_code.as_deref().map(|c| country_codes.iter().any(|code| code.eq_ignore_ascii_case(c))).unwrap_or(false))
					.cloned()
					.collect())
			}
			CatalogQuery::WordLookup {
				..
			} => Err(Error::Internal("execute_places() does not handle WordLookup — use execute".into())),
		}
	}

	async fn get_property(&self, name: &str) -> Result<Option<String>, Error> {
		Ok(self.properties.get(name).cloned())
	}

	async fn get_class_table(&self, class: &str, type_: &str) -> Result<Option<String>, Error> {
		Ok(self.class_tables.get(&(class.to_string(), type_.to_string())).cloned())
	}
}
