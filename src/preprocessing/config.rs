//! The `icu_tokenizer.yaml` configuration document (`spec.md` §6).

use super::regex_replace::{RegexReplace, Replacement};
use super::Preprocessor;
use crate::err::{Error, UsageError};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct TokenizerConfig {
	#[serde(rename = "query-preprocessing", default)]
	pub query_preprocessing: Vec<PreprocessingStepConfig>,
}

impl TokenizerConfig {
	pub fn from_yaml(text: &str) -> Result<Self, Error> {
		serde_yaml::from_str(text).map_err(|e| Error::Usage(UsageError::BadConfig(e.to_string())))
	}
}

/// A single `{step: <plugin-name>, ...fields}` entry. The `step` key is
/// validated up front — missing or non-string fails fast with a message
/// `serde_yaml` folds into [`UsageError::BadConfig`] (§7) once it escapes
/// the deserializer — and the remaining fields are kept as a generic YAML
/// mapping for the step to interpret itself.
#[derive(Debug)]
pub struct PreprocessingStepConfig {
	pub step: String,
	pub fields: serde_yaml::Mapping,
}

impl<'de> Deserialize<'de> for PreprocessingStepConfig {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		let mut mapping = serde_yaml::Mapping::deserialize(deserializer)?;
		let step_key = serde_yaml::Value::String("step".to_string());
		let step_value = mapping.remove(&step_key).ok_or_else(|| serde::de::Error::custom("preprocessing rule is missing the 'step' attribute"))?;
		let step = step_value.as_str().ok_or_else(|| serde::de::Error::custom("'step' attribute must be a simple string"))?.to_string();
		Ok(PreprocessingStepConfig {
			step,
			fields: mapping,
		})
	}
}

impl PreprocessingStepConfig {
	pub fn build(&self) -> Result<Box<dyn Preprocessor>, Error> {
		match self.step.as_str() {
			"regex_replace" => {
				let replacements = self.field_array("replacements")?;
				let mut pairs = Vec::with_capacity(replacements.len());
				for item in replacements {
					let pattern = mapping_str(&item, "pattern").ok_or_else(|| Error::Usage(UsageError::BadConfig("replacement entry missing 'pattern'".into())))?;
					let replace = mapping_str(&item, "replace").unwrap_or_default();
					pairs.push(Replacement::compile(pattern, replace)?);
				}
				Ok(Box::new(RegexReplace::new(pairs)))
			}
			other => Err(Error::Usage(UsageError::UnknownStep(other.to_string()))),
		}
	}

	fn field_array(&self, key: &str) -> Result<Vec<serde_yaml::Mapping>, Error> {
		let key_value = serde_yaml::Value::String(key.to_string());
		let value = self.fields.get(&key_value).ok_or_else(|| Error::Usage(UsageError::BadConfig(format!("'{key}' field is required"))))?;
		let seq = value.as_sequence().ok_or_else(|| Error::Usage(UsageError::BadConfig(format!("'{key}' must be a list"))))?;
		seq.iter()
			.map(|v| v.as_mapping().cloned().ok_or_else(|| Error::Usage(UsageError::BadConfig(format!("'{key}' entries must be mappings")))))
			.collect()
	}
}

fn mapping_str(mapping: &serde_yaml::Mapping, key: &str) -> Option<String> {
	mapping.get(&serde_yaml::Value::String(key.to_string())).and_then(|v| v.as_str()).map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_missing_step() {
		let yaml = "query-preprocessing:\n  - replacements: []\n";
		let err = TokenizerConfig::from_yaml(yaml).unwrap_err();
		assert!(matches!(err, Error::Usage(UsageError::BadConfig(_))));
	}

	#[test]
	fn rejects_non_string_step() {
		let yaml = "query-preprocessing:\n  - step: 5\n";
		let err = TokenizerConfig::from_yaml(yaml).unwrap_err();
		assert!(matches!(err, Error::Usage(UsageError::BadConfig(_))));
	}

	#[test]
	fn parses_regex_replace_step() {
		let yaml = "query-preprocessing:\n  - step: regex_replace\n    replacements:\n      - pattern: '\\\\bSt\\\\.'\n        replace: 'Street'\n";
		let cfg = TokenizerConfig::from_yaml(yaml).unwrap();
		assert_eq!(cfg.query_preprocessing.len(), 1);
		assert_eq!(cfg.query_preprocessing[0].step, "regex_replace");
		cfg.query_preprocessing[0].build().unwrap();
	}
}
