//! Generic regex-based text substitution (`spec.md` §4.2, step `regex_replace`).
//!
//! One compiled [`Replacement`] is an ordered `(pattern, replacement)` pair.
//! Each step applies every replacement to every phrase's text in turn; a
//! phrase whose text is blank after all replacements is dropped, the same
//! as a phrase that was empty on input.

use super::Preprocessor;
use crate::err::{Error, UsageError};
use crate::query::Phrase;
use regex::Regex;

#[derive(Debug)]
pub struct Replacement {
	pattern: Regex,
	replace: String,
}

impl Replacement {
	pub fn compile(pattern: impl AsRef<str>, replace: impl Into<String>) -> Result<Self, Error> {
		let pattern = pattern.as_ref();
		let compiled = Regex::new(pattern).map_err(|e| {
			Error::Usage(UsageError::BadPattern {
				pattern: pattern.to_string(),
				message: e.to_string(),
			})
		})?;
		Ok(Self {
			pattern: compiled,
			replace: replace.into(),
		})
	}
}

pub struct RegexReplace {
	replacements: Vec<Replacement>,
}

impl RegexReplace {
	pub fn new(replacements: Vec<Replacement>) -> Self {
		Self {
			replacements,
		}
	}
}

impl Preprocessor for RegexReplace {
	fn apply(&self, phrases: Vec<Phrase>) -> Vec<Phrase> {
		phrases
			.into_iter()
			.filter_map(|phrase| {
				let mut text = phrase.text;
				for rule in &self.replacements {
					text = rule.pattern.replace_all(&text, rule.replace.as_str()).into_owned();
				}
				let trimmed = text.trim();
				if trimmed.is_empty() {
					None
				} else {
					Some(Phrase::new(trimmed.to_string(), phrase.ptype))
				}
			})
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::query::PhraseType;

	#[test]
	fn applies_replacements_in_order() {
		let step = RegexReplace::new(vec![Replacement::compile(r"\bSt\.", "Street").unwrap(), Replacement::compile(r"\s+", " ").unwrap()]);
		let out = step.apply(vec![Phrase::new("Main  St.", PhraseType::Any)]);
		assert_eq!(out[0].text, "Main Street");
	}

	#[test]
	fn drops_phrases_emptied_by_replacement() {
		let step = RegexReplace::new(vec![Replacement::compile(r"^x+$", "").unwrap()]);
		let out = step.apply(vec![Phrase::new("xxx", PhraseType::Any), Phrase::new("keep", PhraseType::Any)]);
		assert_eq!(out.len(), 1);
		assert_eq!(out[0].text, "keep");
	}

	#[test]
	fn rejects_bad_pattern() {
		let err = Replacement::compile("(unclosed", "x").unwrap_err();
		assert!(matches!(err, Error::Usage(UsageError::BadPattern { .. })));
	}
}
