use std::collections::BTreeMap;
use std::fmt::Display;

use float_cmp::approx_eq;

use crate::lexer::Token;
use crate::lexer::tokenize;

/// A single value inside a settings literal.
#[derive(Debug, Clone)]
pub enum SettingValue {
	Boolean(bool),
	Number(f64),
	String(String),
}

impl Eq for SettingValue {}
impl PartialEq for SettingValue {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Boolean(a), Self::Boolean(b)) => a == b,
			(Self::Number(a), Self::Number(b)) => approx_eq!(f64, *a, *b),
			(Self::String(a), Self::String(b)) => a == b,
			_ => false,
		}
	}
}

impl SettingValue {
	/// Interpret the value as a flag. Strings are truthy when they spell
	/// `"true"`, numbers when they are non-zero.
	pub fn as_bool(&self) -> bool {
		match self {
			Self::Boolean(b) => *b,
			Self::String(s) => s == "true",
			Self::Number(n) => *n != 0.0,
		}
	}
}

impl Display for SettingValue {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Boolean(b) => write!(f, "{b}"),
			Self::Number(n) => write!(f, "{n}"),
			Self::String(s) => write!(f, "{s:?}"),
		}
	}
}

/// Parsed settings literal, keyed by setting name.
pub type SettingsMap = BTreeMap<String, SettingValue>;

/// Parse the settings literal of an include directive.
///
/// ```text
/// settings := '{' [ entry (',' entry)* [','] ] '}'
/// entry    := key (':' | '=') value
/// key      := identifier | quoted-string
/// value    := 'true' | 'false' | number | quoted-string
/// ```
///
/// The literal is never evaluated, so a settings object cannot run code.
pub fn parse_settings(source: &str) -> Result<SettingsMap, String> {
	let tokens = tokenize(source)?;
	let mut iter = tokens.into_iter().peekable();
	let mut map = SettingsMap::new();

	match iter.next() {
		Some(Token::BraceOpen) => {}
		Some(other) => return Err(format!("expected `{{`, found {}", other.describe())),
		None => return Err("empty settings literal".to_string()),
	}

	loop {
		let key = match iter.next() {
			Some(Token::BraceClose) => break,
			Some(Token::Ident(name) | Token::String(name)) => name,
			Some(other) => return Err(format!("expected a key, found {}", other.describe())),
			None => return Err("unterminated settings literal, expected `}`".to_string()),
		};

		match iter.next() {
			Some(Token::Assign) => {}
			Some(other) => {
				return Err(format!(
					"expected `:` after key `{key}`, found {}",
					other.describe()
				));
			}
			None => return Err(format!("missing value for key `{key}`")),
		}

		let value = match iter.next() {
			Some(Token::Boolean(b)) => SettingValue::Boolean(b),
			Some(Token::Number(n)) => SettingValue::Number(n),
			Some(Token::String(s)) => SettingValue::String(s),
			Some(other) => {
				return Err(format!(
					"unsupported value for key `{key}`: {}",
					other.describe()
				));
			}
			None => return Err(format!("missing value for key `{key}`")),
		};
		map.insert(key, value);

		match iter.next() {
			Some(Token::Comma) => {}
			Some(Token::BraceClose) => break,
			Some(other) => {
				return Err(format!(
					"expected `,` or `}}` after value, found {}",
					other.describe()
				));
			}
			None => return Err("unterminated settings literal, expected `}`".to_string()),
		}
	}

	if let Some(extra) = iter.next() {
		return Err(format!(
			"unexpected {} after settings literal",
			extra.describe()
		));
	}

	Ok(map)
}

/// Settings attached to an include, either passed by the caller or written
/// as the second argument of an include directive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeSettings {
	entries: SettingsMap,
}

impl IncludeSettings {
	/// Build settings from a parsed literal.
	pub fn from_map(entries: SettingsMap) -> Self {
		for key in entries.keys() {
			if !Self::is_known(key) {
				tracing::warn!(key = %key, "ignoring unknown include setting");
			}
		}
		Self { entries }
	}

	/// Settings with `evaluate` switched on.
	pub fn evaluating() -> Self {
		let mut entries = SettingsMap::new();
		entries.insert("evaluate".to_string(), SettingValue::Boolean(true));
		Self { entries }
	}

	fn is_known(key: &str) -> bool {
		matches!(key, "evaluate")
	}

	/// Execute the statement buffer right after this include completes.
	pub fn evaluate(&self) -> bool {
		self.entries.get("evaluate").is_some_and(SettingValue::as_bool)
	}

	/// Settings for a nested include. Everything except `evaluate` is
	/// forwarded; `evaluate` only applies to the include it was written on.
	/// The nested directive's own entries override forwarded ones.
	#[must_use]
	pub fn forward(&self, nested: &IncludeSettings) -> IncludeSettings {
		let mut entries = self.entries.clone();
		entries.remove("evaluate");
		for (key, value) in &nested.entries {
			entries.insert(key.clone(), value.clone());
		}
		IncludeSettings { entries }
	}
}

/// Settings recognised by `process`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessSettings {
	/// Strip comments from the generated text.
	pub uncomment: bool,
}
