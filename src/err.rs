//! Crate-wide error type.
//!
//! Errors fall into three families (see the error-handling design):
//! configuration mistakes surface as [`Error::Usage`] and are fatal at
//! startup, catalog I/O failures surface as [`Error::Catalog`] and are
//! handled per-search by the executor, and invariant violations surface as
//! [`Error::Internal`] and always propagate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
	#[error("usage error: {0}")]
	Usage(#[from] UsageError),

	#[error("catalog error: {0}")]
	Catalog(#[from] CatalogError),

	#[error("internal error: {0}")]
	Internal(String),
}

#[derive(Error, Debug)]
pub enum UsageError {
	#[error("unknown preprocessing step '{0}'")]
	UnknownStep(String),
	#[error("invalid regular expression '{pattern}': {message}")]
	BadPattern {
		pattern: String,
		message: String,
	},
	#[error("invalid configuration document: {0}")]
	BadConfig(String),
}

#[derive(Error, Debug)]
pub enum CatalogError {
	#[error("catalog query failed: {0}")]
	Query(String),
	#[error("catalog property '{0}' is not set")]
	MissingProperty(String),
	#[error("catalog transport error: {0}")]
	Transport(String),
}

impl Error {
	/// True for failures that should cause one search's lookup to be
	/// skipped rather than the whole request to fail.
	pub fn is_recoverable_in_executor(&self) -> bool {
		matches!(self, Error::Catalog(_))
	}
}
