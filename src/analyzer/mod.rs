//! Tokenizer and analyzer (component 3, `spec.md` §4.3-4.4): turns
//! preprocessed phrases into a populated [`QueryStruct`], looking up
//! candidate tokens in the catalog and scoring them.

mod rematch;

use crate::catalog::{Catalog, CatalogQuery, CatalogRow};
use crate::cnf;
use crate::err::Error;
use crate::preprocessing::Pipeline;
use crate::query::{BreakType, Phrase, QueryStruct, Token, TokenRange, TokenType};
use crate::text::TextRules;
use std::collections::HashMap;

/// Transliterated form of a single term, alongside the normalized text
/// of the word it came out of and the break penalty that follows it.
#[derive(Debug, Clone)]
struct QueryPart {
	term: String,
	normalized: String,
}

/// Word-token text to the ranges it can be looked up at, plus the base
/// penalty accumulated by the break sequence spanning that range.
pub type WordLookup = HashMap<String, Vec<(TokenRange, f64)>>;

/// Build every contiguous word-token candidate starting at or after
/// `start`, up to [`cnf::WORD_WINDOW_MAX_LEN`] terms wide.
fn extract_words(terms: &[QueryPart], start: usize, breaks: &[f64], words: &mut WordLookup) {
	let total = terms.len();
	let base_penalty = crate::query::break_penalty(BreakType::Word);
	for first in start..total {
		let mut word = terms[first].term.clone();
		let mut penalty = base_penalty;
		words.entry(word.clone()).or_default().push((TokenRange::new(first, first + 1), penalty));
		for last in (first + 1)..total.min(first + cnf::WORD_WINDOW_MAX_LEN) {
			word.push(' ');
			word.push_str(&terms[last].term);
			penalty += breaks[last - 1];
			words.entry(word.clone()).or_default().push((TokenRange::new(first, last + 1), penalty));
		}
	}
}

fn token_from_catalog_row(row: &CatalogRow, base_penalty: f64, ttype: TokenType) -> Token {
	let count = row.info.as_ref().and_then(|i| i.get("count")).and_then(|v| v.as_i64()).unwrap_or(1);
	let addr_count = row.info.as_ref().and_then(|i| i.get("addr_count")).and_then(|v| v.as_i64()).unwrap_or(1);

	let mut penalty = base_penalty;
	match row.row_type.as_str() {
		"w" => penalty += 0.3,
		"W" => {
			if row.word_token.chars().count() == 1 && row.word.as_deref() == Some(row.word_token.as_str()) {
				penalty += if row.word.as_deref().unwrap_or_default().chars().all(|c| c.is_ascii_digit()) {
					0.2
				} else {
					0.3
				};
			}
		}
		"H" => {
			penalty += row.word_token.chars().filter(|&c| c != ' ' && !c.is_ascii_digit()).count() as f64 * 0.1;
			if row.word_token.chars().all(|c| !c.is_ascii_digit()) {
				// `chars().count() - 1` matches the original's
				// `len(word_token) - 1` exactly, including going negative
				// for an empty `word_token` (vacuously all-non-digit).
				penalty += 0.2 * (row.word_token.chars().count() as f64 - 1.0);
			}
		}
		"C" => {
			if row.word_token.chars().count() == 1 {
				penalty += 0.3;
			}
		}
		_ => {}
	}

	let raw_lookup = match &row.info {
		None => row.word.clone().unwrap_or_default(),
		Some(info) => info.get("lookup").and_then(|v| v.as_str()).map(|s| s.to_string()).unwrap_or_else(|| row.word.clone().unwrap_or_default()),
	};
	let lookup_word = if !raw_lookup.is_empty() {
		raw_lookup.split('@').next().unwrap_or(&raw_lookup).to_string()
	} else {
		row.word_token.clone()
	};

	Token {
		token: row.word_id,
		lookup_word,
		word_token: row.word_token.clone(),
		ttype,
		penalty,
		count: count.max(1),
		addr_count: addr_count.max(1),
		info: row.info.clone(),
	}
}

fn db_token_type(row_type: &str) -> Option<TokenType> {
	match row_type {
		"W" => Some(TokenType::Word),
		"w" => Some(TokenType::Partial),
		"H" => Some(TokenType::Housenumber),
		"P" => Some(TokenType::Postcode),
		"C" => Some(TokenType::Country),
		_ => None,
	}
}

/// Turns phrases into a populated token graph.
pub struct QueryAnalyzer {
	transliterator: Box<dyn TextRules>,
	pipeline: Pipeline,
}

impl QueryAnalyzer {
	pub fn new(transliterator: Box<dyn TextRules>, pipeline: Pipeline) -> Self {
		Self {
			transliterator,
			pipeline,
		}
	}

	pub async fn analyze_query(&self, phrases: Vec<Phrase>, catalog: &dyn Catalog) -> Result<QueryStruct, Error> {
		let phrases = self.pipeline.run(phrases);
		let mut query = QueryStruct::new(phrases);
		if query.is_empty() {
			return Ok(query);
		}

		let (parts, breaks, words) = self.split_query(&mut query);

		let word_tokens: Vec<String> = words.keys().cloned().collect();
		if !word_tokens.is_empty() {
			let rows = catalog
				.execute(CatalogQuery::WordLookup {
					words: word_tokens,
				})
				.await?;
			for row in &rows {
				let Some(ranges) = words.get(&row.word_token) else {
					continue;
				};
				for (trange, base_penalty) in ranges {
					if row.row_type == "S" {
						let is_near_op = row.info.as_ref().and_then(|i| i.get("op")).and_then(|v| v.as_str()).map(|op| op == "in" || op == "near").unwrap_or(false);
						if is_near_op {
							if trange.start == 0 {
								let token = token_from_catalog_row(row, *base_penalty, TokenType::NearItem);
								query.add_token(*trange, TokenType::NearItem, token);
							}
						} else if trange.start == 0 && trange.end == query.num_token_slots() {
							let token = token_from_catalog_row(row, *base_penalty, TokenType::NearItem);
							query.add_token(*trange, TokenType::NearItem, token);
						} else {
							let token = token_from_catalog_row(row, *base_penalty, TokenType::Qualifier);
							query.add_token(*trange, TokenType::Qualifier, token);
						}
					} else if let Some(ttype) = db_token_type(&row.row_type) {
						let token = token_from_catalog_row(row, *base_penalty, ttype);
						query.add_token(*trange, ttype, token);
					}
				}
			}
		}

		self.add_extra_tokens(&mut query, &parts);
		self.rerank_tokens(&mut query, &parts);

		Ok(query)
	}

	/// Transliterate each phrase's words into terms, growing the break
	/// graph as it goes, and collect the catalog word-lookup candidates.
	fn split_query(&self, query: &mut QueryStruct) -> (Vec<QueryPart>, Vec<f64>, WordLookup) {
		let mut parts = Vec::new();
		let mut breaks = Vec::new();
		let mut phrase_start = 0usize;
		let mut words = WordLookup::new();

		let phrase_types: Vec<_> = query.source.iter().map(|p| p.ptype).collect();
		let phrase_texts: Vec<_> = query.source.iter().map(|p| p.text.clone()).collect();

		for (ptype, text) in phrase_types.into_iter().zip(phrase_texts) {
			if let Some(last) = query.nodes.last_mut() {
				last.ptype = ptype;
			}

			for (word, breakchar) in split_words(&text) {
				if word.is_empty() {
					continue;
				}
				let trans = self.transliterator.apply(&word);
				if trans.is_empty() {
					continue;
				}
				for term in trans.split(' ') {
					if term.is_empty() {
						continue;
					}
					parts.push(QueryPart {
						term: term.to_string(),
						normalized: word.clone(),
					});
					breaks.push(crate::query::break_penalty(BreakType::Token));
					query.add_node(BreakType::Token, ptype);
				}
				let btype = break_type_for_char(breakchar);
				if let Some(last) = query.nodes.last_mut() {
					last.btype = Some(btype);
				}
				if let Some(last_penalty) = breaks.last_mut() {
					*last_penalty = crate::query::break_penalty(btype);
				}
			}

			extract_words(&parts, phrase_start, &breaks, &mut words);
			phrase_start = parts.len();
		}

		if let Some(last) = query.nodes.last_mut() {
			last.btype = Some(BreakType::End);
		}

		(parts, breaks, words)
	}

	/// Synthesize housenumber tokens for short digit runs the catalog
	/// has no word row for (`spec.md` §4.3 step 7).
	fn add_extra_tokens(&self, query: &mut QueryStruct, parts: &[QueryPart]) {
		for (i, part) in parts.iter().enumerate() {
			let is_short_digits = part.term.len() <= cnf::EXTRA_HOUSENUMBER_MAX_DIGITS && !part.term.is_empty() && part.term.chars().all(|c| c.is_ascii_digit());
			if is_short_digits && !query.nodes[i].has_tokens(i + 1, TokenType::Housenumber) {
				let token = Token {
					token: 0,
					lookup_word: part.term.clone(),
					word_token: part.term.clone(),
					ttype: TokenType::Housenumber,
					penalty: cnf::EXTRA_HOUSENUMBER_PENALTY,
					count: 1,
					addr_count: 1,
					info: None,
				};
				query.add_token(TokenRange::new(i, i + 1), TokenType::Housenumber, token);
			}
		}
	}

	/// Cross-token penalty adjustments that depend on sibling tokens at
	/// the same break node (`spec.md` §4.4).
	fn rerank_tokens(&self, query: &mut QueryStruct, parts: &[QueryPart]) {
		for node_idx in 0..query.nodes.len() {
			let snapshot: Vec<(TokenType, usize, f64, String)> = query.nodes[node_idx]
				.starting
				.iter()
				.map(|tl| {
					let first = tl.tokens.first();
					(tl.ttype, tl.range.end, first.map(|t| t.penalty).unwrap_or(0.0), first.map(|t| t.lookup_word.clone()).unwrap_or_default())
				})
				.collect();

			for (ttype, end, first_penalty, first_lookup) in snapshot {
				match ttype {
					TokenType::Postcode => {
						for repl in query.nodes[node_idx].starting.iter_mut() {
							if repl.range.end == end && repl.ttype != TokenType::Postcode && (repl.ttype != TokenType::Housenumber || first_lookup.chars().count() > 4) {
								repl.add_penalty(0.39);
							}
						}
					}
					TokenType::Housenumber if first_lookup.chars().count() <= 3 => {
						if first_lookup.chars().any(|c| c.is_ascii_digit()) {
							let delta = 0.5 - first_penalty;
							for repl in query.nodes[node_idx].starting.iter_mut() {
								if repl.range.end == end && repl.ttype != TokenType::Housenumber {
									repl.add_penalty(delta);
								}
							}
						}
					}
					TokenType::Country | TokenType::Partial => {}
					_ => {
						if node_idx >= parts.len() {
							continue;
						}
						let mut norm = parts[node_idx].normalized.clone();
						let token_break = query.nodes[node_idx].btype != Some(BreakType::Token);
						for part in parts.iter().take(end).skip(node_idx + 1) {
							if token_break {
								norm.push_str("  ");
								norm.push_str(&part.normalized);
							}
						}
						for repl in query.nodes[node_idx].starting.iter_mut() {
							if repl.ttype == ttype && repl.range.end == end {
								for token in repl.tokens.iter_mut() {
									token.penalty += rematch::edit_distance(&token.lookup_word, &norm);
								}
							}
						}
					}
				}
			}
		}
	}
}

fn break_type_for_char(c: char) -> BreakType {
	match c {
		' ' => BreakType::Word,
		':' => BreakType::SoftPhrase,
		'-' => BreakType::Part,
		_ => BreakType::Phrase,
	}
}

/// Split `text` on `[ :-]`, pairing each word with the delimiter that
/// follows it (the trailing word is paired with a phrase break).
fn split_words(text: &str) -> Vec<(String, char)> {
	let mut result = Vec::new();
	let mut current = String::new();
	for c in text.chars() {
		if c == ' ' || c == ':' || c == '-' {
			result.push((std::mem::take(&mut current), c));
		} else {
			current.push(c);
		}
	}
	result.push((current, ','));
	result
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::catalog::memory::MemoryCatalog;
	use crate::catalog::CatalogRow;
	use crate::preprocessing::Pipeline;
	use crate::query::PhraseType;
	use crate::text::IdentityRules;
	use serde_json::json;

	fn analyzer() -> QueryAnalyzer {
		QueryAnalyzer::new(Box::new(IdentityRules), Pipeline::new())
	}

	#[tokio::test]
	async fn splits_on_space_and_looks_up_words() {
		let catalog = MemoryCatalog::new().with_word(CatalogRow {
			word_id: 1,
			word_token: "berlin".into(),
			word: Some("berlin".into()),
			row_type: "W".into(),
			info: Some(json!({"count": 5, "addr_count": 2})),
		});
		let query = analyzer().analyze_query(vec![Phrase::new("berlin", PhraseType::Any)], &catalog).await.unwrap();
		assert_eq!(query.num_token_slots(), 1);
		let tl = query.nodes[0].starting.iter().find(|tl| tl.ttype == TokenType::Word).unwrap();
		assert_eq!(tl.tokens[0].word_token, "berlin");
	}

	#[tokio::test]
	async fn synthesizes_housenumber_for_bare_digits() {
		let catalog = MemoryCatalog::new();
		let query = analyzer().analyze_query(vec![Phrase::new("12", PhraseType::Any)], &catalog).await.unwrap();
		let tl = query.nodes[0].starting.iter().find(|tl| tl.ttype == TokenType::Housenumber).unwrap();
		assert_eq!(tl.tokens[0].word_token, "12");
		assert_eq!(tl.tokens[0].penalty, cnf::EXTRA_HOUSENUMBER_PENALTY);
	}

	#[tokio::test]
	async fn empty_query_yields_empty_struct() {
		let catalog = MemoryCatalog::new();
		let query = analyzer().analyze_query(vec![], &catalog).await.unwrap();
		assert!(query.is_empty());
	}
}
