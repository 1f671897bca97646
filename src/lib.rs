//! Forward-search core for a place geocoder.
//!
//! Pipeline: normalize the raw query text, run the configured
//! preprocessing steps, tokenize and score candidate tokens against the
//! catalog, enumerate admissible token-type assignments, compile each
//! into one or more searches, and execute the sorted batch.

#[macro_use]
extern crate tracing;

pub mod analyzer;
pub mod assignment;
pub mod catalog;
pub mod cnf;
pub mod err;
pub mod preprocessing;
pub mod query;
pub mod search;
pub mod text;

pub use err::Error;

use analyzer::QueryAnalyzer;
use catalog::Catalog;
use once_cell::sync::OnceCell;
use preprocessing::config::TokenizerConfig;
use query::{Phrase, PhraseType};
use search::{SearchDetails, SearchResult};
use std::sync::Arc;
use text::{TextRules, Transliterator};

/// Process-wide, init-once cache of the one [`SearchEngine`] a process
/// serves (`spec.md` §5 "Shared resource"): normalizer/transliterator
/// setup runs once no matter how many requests race to call
/// [`SearchEngine::cached`].
static ENGINE_CACHE: OnceCell<Arc<SearchEngine>> = OnceCell::new();

/// A ready-to-use query analyzer plus the preprocessing pipeline it was
/// built with. One instance is set up per catalog connection and reused
/// across requests (`spec.md` §5 "Shared resource").
pub struct SearchEngine {
	analyzer: QueryAnalyzer,
}

impl SearchEngine {
	/// Load the transliteration rules and `icu_tokenizer.yaml`
	/// configuration from the catalog and build an engine ready to serve
	/// requests.
	pub async fn setup(catalog: &dyn Catalog, tokenizer_config_yaml: &str) -> Result<Self, Error> {
		let translit_rules = catalog.get_property("tokenizer_import_transliteration").await?.unwrap_or_default();
		let transliterator: Box<dyn TextRules> = Box::new(Transliterator::new(translit_rules));

		let tokenizer_config = TokenizerConfig::from_yaml(tokenizer_config_yaml)?;
		let pipeline = preprocessing::build_pipeline(&tokenizer_config)?;

		Ok(Self {
			analyzer: QueryAnalyzer::new(transliterator, pipeline),
		})
	}

	/// Like [`Self::setup`], but memoizes the result process-wide: the
	/// first caller pays the setup cost, later callers get a cheap clone
	/// of the cached `Arc`.
	pub async fn cached(catalog: &dyn Catalog, tokenizer_config_yaml: &str) -> Result<Arc<SearchEngine>, Error> {
		if let Some(engine) = ENGINE_CACHE.get() {
			return Ok(engine.clone());
		}
		let engine = Arc::new(Self::setup(catalog, tokenizer_config_yaml).await?);
		// Another task may have won the race; either way something is cached.
		let _ = ENGINE_CACHE.set(engine.clone());
		Ok(ENGINE_CACHE.get().cloned().unwrap_or(engine))
	}

	/// Run one search request end to end (`spec.md` §6 "Request
	/// surface"): normalize, tokenize, enumerate assignments, build and
	/// execute searches, return a ranked (possibly empty) result list.
	pub async fn search(&self, query: &str, details: &SearchDetails, catalog: &dyn Catalog) -> Result<Vec<SearchResult>, Error> {
		debug!(query, "running search");

		let phrases = split_into_phrases(query);
		if phrases.is_empty() {
			return Ok(Vec::new());
		}

		let token_query = self.analyzer.analyze_query(phrases, catalog).await?;
		if token_query.is_empty() {
			return Ok(Vec::new());
		}

		let assignments = assignment::yield_token_assignments(&token_query);
		trace!(count = assignments.len(), "enumerated token assignments");
		let searches: Vec<search::Search> = assignments.iter().filter_map(|a| search::build_search(a, &token_query)).collect();

		if searches.is_empty() {
			return Ok(Vec::new());
		}

		let results = search::execute(searches, details, catalog).await?;
		debug!(count = results.len(), "search complete");
		Ok(results)
	}
}

/// Split the raw query on commas into normalized phrases
/// (`spec.md` §4.1): each comma-delimited segment becomes one
/// [`Phrase`] with [`PhraseType::Any`].
fn split_into_phrases(query: &str) -> Vec<Phrase> {
	query
		.split(',')
		.map(text::normalize)
		.filter(|s| !s.is_empty())
		.map(|s| Phrase::new(s, PhraseType::Any))
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::catalog::memory::MemoryCatalog;

	#[test_log::test]
	fn splits_on_commas_and_normalizes() {
		let phrases = split_into_phrases("Main St , Springfield");
		assert_eq!(phrases.len(), 2);
		assert_eq!(phrases[0].text, "main st");
		assert_eq!(phrases[1].text, "springfield");
	}

	#[test_log::test(tokio::test)]
	async fn empty_query_returns_no_results() {
		let catalog = MemoryCatalog::new();
		let config = "query-preprocessing: []\n";
		let engine = SearchEngine::setup(&catalog, config).await.unwrap();
		let details = SearchDetails::default();
		let results = engine.search("", &details, &catalog).await.unwrap();
		assert!(results.is_empty());
	}
}
