use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::PreproError;
use crate::PreproResult;
use crate::ProcessSettings;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] = ["prepro.toml", ".prepro.toml", ".config/prepro.toml"];

/// Configuration loaded from a `prepro.toml` file.
///
/// ```toml
/// setup = ["build/setup.lua"]
///
/// [options]
/// debug = false
/// version = "1.2.0"
///
/// [process]
/// uncomment = true
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct PreproConfig {
	/// Lua scripts run in the environment before any file is included. A
	/// table returned by a script is merged into the environment. Paths are
	/// relative to the project root.
	#[serde(default)]
	pub setup: Vec<PathBuf>,
	/// Values merged into the `options` namespace of the environment.
	#[serde(default)]
	pub options: toml::Table,
	/// Defaults for post-processing the generated text.
	#[serde(default)]
	pub process: ProcessConfig,
}

/// The `[process]` section.
#[derive(Debug, Default, Deserialize)]
pub struct ProcessConfig {
	/// Strip comments from the generated text.
	#[serde(default)]
	pub uncomment: bool,
}

impl PreproConfig {
	/// Resolve the config path from known discovery candidates.
	#[must_use]
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if no config file exists.
	pub fn load(root: &Path) -> PreproResult<Option<PreproConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		let content = std::fs::read_to_string(&config_path)?;
		let config = Self::parse(&content)?;
		tracing::debug!(path = %config_path.display(), "loaded config");

		Ok(Some(config))
	}

	/// Parse config file content.
	pub fn parse(content: &str) -> PreproResult<PreproConfig> {
		toml::from_str(content).map_err(|e| PreproError::ConfigParse(e.to_string()))
	}

	/// The `[options]` table as JSON, ready to merge into the environment.
	pub fn options_json(&self) -> serde_json::Value {
		toml_table_to_json(&self.options)
	}

	/// Process settings carrying the config defaults.
	pub fn process_settings(&self) -> ProcessSettings {
		ProcessSettings {
			uncomment: self.process.uncomment,
		}
	}
}

fn toml_table_to_json(table: &toml::Table) -> serde_json::Value {
	let map = table
		.iter()
		.map(|(key, value)| (key.clone(), toml_to_json(value)))
		.collect();
	serde_json::Value::Object(map)
}

/// Convert a `toml::Value` to a `serde_json::Value`. Integers stay integers
/// so they arrive in Lua as integers; datetimes become strings.
fn toml_to_json(value: &toml::Value) -> serde_json::Value {
	match value {
		toml::Value::String(s) => serde_json::Value::String(s.clone()),
		toml::Value::Integer(i) => serde_json::Value::from(*i),
		toml::Value::Float(f) => {
			serde_json::Number::from_f64(*f)
				.map_or_else(|| serde_json::Value::String(f.to_string()), serde_json::Value::Number)
		}
		toml::Value::Boolean(b) => serde_json::Value::Bool(*b),
		toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
		toml::Value::Array(items) => serde_json::Value::Array(items.iter().map(toml_to_json).collect()),
		toml::Value::Table(table) => toml_table_to_json(table),
	}
}

/// Parse a command line override of the form `key.path=value` into an
/// object ready to merge into `options`. Dotted keys nest. Values are read
/// as booleans, numbers or quoted strings where they parse as such and as
/// bare strings otherwise.
///
/// ```rust
/// use prepro_core::parse_option_override;
///
/// let value = parse_option_override("build.debug=true").unwrap();
/// assert_eq!(value, serde_json::json!({ "build": { "debug": true } }));
/// ```
pub fn parse_option_override(input: &str) -> PreproResult<serde_json::Value> {
	let Some((key, raw)) = input.split_once('=') else {
		return Err(PreproError::InvalidOption(input.to_string()));
	};

	let key = key.trim();
	if key.is_empty() || key.split('.').any(str::is_empty) {
		return Err(PreproError::InvalidOption(input.to_string()));
	}

	let mut value = parse_override_value(raw.trim());
	for segment in key.rsplit('.') {
		let mut map = serde_json::Map::new();
		map.insert(segment.to_string(), value);
		value = serde_json::Value::Object(map);
	}

	Ok(value)
}

fn parse_override_value(raw: &str) -> serde_json::Value {
	match raw {
		"true" => return serde_json::Value::Bool(true),
		"false" => return serde_json::Value::Bool(false),
		_ => {}
	}

	if let Ok(integer) = raw.parse::<i64>() {
		return serde_json::Value::from(integer);
	}

	if let Some(number) = raw.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
		return serde_json::Value::Number(number);
	}

	let quoted = raw.len() >= 2
		&& ((raw.starts_with('"') && raw.ends_with('"')) || (raw.starts_with('\'') && raw.ends_with('\'')));
	if quoted {
		if let Some(unquoted) = crate::lexer::unquote(raw) {
			return serde_json::Value::String(unquoted);
		}
	}

	serde_json::Value::String(raw.to_string())
}
