//! Candidate lexical matches (`spec.md` §3 "Token").

use super::TokenRange;
use serde_json::Value as CatalogInfo;

/// Role a token may play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
	Word,
	Partial,
	Housenumber,
	Postcode,
	Country,
	NearItem,
	Qualifier,
}

/// A candidate lexical match for a contiguous token range.
#[derive(Debug, Clone)]
pub struct Token {
	/// Stable catalog identifier (0 for synthetic tokens that have no
	/// backing row).
	pub token: i64,
	/// Normalized, catalog-comparable form.
	pub lookup_word: String,
	/// The raw word-token string as stored/looked-up in the catalog.
	pub word_token: String,
	pub ttype: TokenType,
	pub penalty: f64,
	pub count: i64,
	pub addr_count: i64,
	/// Opaque catalog metadata (class/type for categories, `lookup`
	/// overrides, `count`/`addr_count` before they are floored, ...).
	pub info: Option<CatalogInfo>,
}

impl Token {
	pub fn add_penalty(&mut self, amount: f64) {
		self.penalty += amount;
	}

	/// `(class, type)` for a category token. Panics if called on a token
	/// with no `info` payload, mirroring the original's `assert self.info`.
	pub fn category(&self) -> (String, String) {
		let info = self.info.as_ref().expect("category() called on a token without info");
		let class = info.get("class").and_then(|v| v.as_str()).unwrap_or("").to_string();
		let type_ = info.get("type").and_then(|v| v.as_str()).unwrap_or("").to_string();
		(class, type_)
	}
}

/// Tokens sharing both range and type at a node.
#[derive(Debug, Clone)]
pub struct TokenList {
	pub range: TokenRange,
	pub ttype: TokenType,
	pub tokens: Vec<Token>,
}

impl TokenList {
	pub fn end(&self) -> usize {
		self.range.end
	}

	pub fn add_penalty(&mut self, amount: f64) {
		for token in self.tokens.iter_mut() {
			token.add_penalty(amount);
		}
	}
}
