//! Query preprocessors (component 2, `spec.md` §4.2): a configurable,
//! ordered pipeline of `Vec<Phrase> -> Vec<Phrase>` rewriters.

pub mod config;
pub mod regex_replace;

use crate::err::Error;
use crate::query::Phrase;

/// One preprocessing step. The built-in regex replacer is
/// [`regex_replace::RegexReplace`]; additional steps (e.g. the Japanese
/// segmenter `spec.md` mentions in passing) can be added by implementing
/// this trait and wiring a new branch into [`build_pipeline`].
pub trait Preprocessor: Send + Sync {
	fn apply(&self, phrases: Vec<Phrase>) -> Vec<Phrase>;
}

/// An ordered, left-to-right composed pipeline of independent steps.
#[derive(Default)]
pub struct Pipeline {
	steps: Vec<Box<dyn Preprocessor>>,
}

impl Pipeline {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&mut self, step: Box<dyn Preprocessor>) {
		self.steps.push(step);
	}

	pub fn run(&self, mut phrases: Vec<Phrase>) -> Vec<Phrase> {
		for step in &self.steps {
			phrases = step.apply(phrases);
		}
		phrases
	}
}

/// Build a [`Pipeline`] from a parsed [`config::TokenizerConfig`].
pub fn build_pipeline(cfg: &config::TokenizerConfig) -> Result<Pipeline, Error> {
	let mut pipeline = Pipeline::new();
	for step_cfg in &cfg.query_preprocessing {
		let step = step_cfg.build()?;
		pipeline.push(step);
	}
	Ok(pipeline)
}
