//! Pure text normalization and transliteration (component 1 of the
//! pipeline, `spec.md` §4.1).
//!
//! Both stages are kept behind the [`TextRules`] capability so tests can
//! plug in an identity implementation instead of loading real rule text
//! from the catalog (design note: "rule-driven text transformation").

/// A rule-driven text transform: case-folding/diacritic removal for
/// normalization, script-to-Latin folding for transliteration.
///
/// Implementations must be deterministic and safe to share across
/// concurrent requests (the analyzer setup caches one instance of each
/// process-wide).
pub trait TextRules: Send + Sync {
	fn apply(&self, input: &str) -> String;
}

/// Case-folds and strips diacritics/punctuation noise. Built from the
/// rule text the catalog stores under the `tokenizer_import_normalisation`
/// property (see [`crate::catalog::Catalog::get_property`]); this
/// implementation does not interpret ICU transliterator rule syntax
/// (compiling a real ICU rule grammar is out of scope for this crate) but
/// satisfies the same contract: idempotent, and implemented with the same
/// category of primitive (Unicode NFKD decomposition + combining-mark
/// removal) that an ICU normalization rule set performs.
pub struct Normalizer {
	rules: String,
}

impl Normalizer {
	pub fn new(rules: impl Into<String>) -> Self {
		Self {
			rules: rules.into(),
		}
	}

	/// The raw rule text this normalizer was built from, exposed for
	/// diagnostics only.
	pub fn rules(&self) -> &str {
		&self.rules
	}
}

impl TextRules for Normalizer {
	fn apply(&self, input: &str) -> String {
		normalize_str(input)
	}
}

/// Folds arbitrary scripts down to Latin. Built from the
/// `tokenizer_import_transliteration` catalog property. A transliterated
/// word may expand into several space-separated output tokens; callers
/// must split on spaces after calling this (see the tokenizer, §4.3).
pub struct Transliterator {
	rules: String,
}

impl Transliterator {
	pub fn new(rules: impl Into<String>) -> Self {
		Self {
			rules: rules.into(),
		}
	}

	pub fn rules(&self) -> &str {
		&self.rules
	}
}

impl TextRules for Transliterator {
	fn apply(&self, input: &str) -> String {
		deunicode::deunicode(input)
	}
}

/// Identity rules for tests that want to exercise the pipeline without
/// depending on the concrete normalization behaviour.
pub struct IdentityRules;

impl TextRules for IdentityRules {
	fn apply(&self, input: &str) -> String {
		input.to_string()
	}
}

/// Normalize text: case-fold, strip diacritics, squash whitespace, then
/// trim leading/trailing `-`, `:` and space (the normalization contract
/// from §4.1).
pub fn normalize(input: &str) -> String {
	normalize_str(input).trim_matches(|c: char| c == '-' || c == ':' || c.is_whitespace()).to_string()
}

fn normalize_str(input: &str) -> String {
	use unicode_normalization::char::is_combining_mark;
	use unicode_normalization::UnicodeNormalization;

	let mut out = String::with_capacity(input.len());
	let mut last_was_space = false;
	for c in input.nfkd() {
		if is_combining_mark(c) {
			continue;
		}
		let c = c.to_lowercase().next().unwrap_or(c);
		if c.is_whitespace() {
			if !last_was_space && !out.is_empty() {
				out.push(' ');
			}
			last_was_space = true;
		} else {
			out.push(c);
			last_was_space = false;
		}
	}
	if out.ends_with(' ') {
		out.pop();
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn normalize_is_idempotent() {
		let samples = ["  Straße  ", "Rue de l'Église", "MAIN   st.", "-:hello:-"];
		for s in samples {
			let once = normalize(s);
			let twice = normalize(&once);
			assert_eq!(once, twice, "normalize should be idempotent for {s:?}");
		}
	}

	#[test]
	fn normalize_trims_boundary_punctuation() {
		assert_eq!(normalize("-: hello :-"), "hello");
	}

	#[test]
	fn normalize_folds_case_and_diacritics() {
		assert_eq!(normalize("STRASSE"), "strasse");
		assert_eq!(normalize("café"), "cafe");
	}

	#[test]
	fn transliterator_is_deterministic() {
		let t = Transliterator::new(String::new());
		let a = t.apply("京都市");
		let b = t.apply("京都市");
		assert_eq!(a, b);
	}
}
