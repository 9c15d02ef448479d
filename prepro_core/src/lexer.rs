use logos::Logos;
use snailquote::unescape;

/// Raw tokens produced by logos for the settings literal of an include
/// directive, e.g. `{ evaluate: true, name = 'core' }`.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub(crate) enum RawToken {
	#[token("{")]
	BraceOpen,
	#[token("}")]
	BraceClose,
	#[token(",")]
	Comma,
	#[token(":")]
	Colon,
	#[token("=")]
	Equals,
	#[token("true")]
	True,
	#[token("false")]
	False,
	#[regex(r"[a-zA-Z_$][a-zA-Z0-9_$]*")]
	Ident,
	#[regex(r#""([^"\\]|\\.)*""#)]
	DoubleQuotedString,
	#[regex(r"'([^'\\]|\\.)*'")]
	SingleQuotedString,
	#[regex(r"-?[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?")]
	Number,
}

/// A token with its decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
	BraceOpen,
	BraceClose,
	Comma,
	/// `:` or `=`, both separate a key from its value.
	Assign,
	Boolean(bool),
	Ident(String),
	String(String),
	Number(f64),
}

impl Token {
	/// Human readable name used in parse errors.
	pub(crate) fn describe(&self) -> String {
		match self {
			Self::BraceOpen => "`{`".to_string(),
			Self::BraceClose => "`}`".to_string(),
			Self::Comma => "`,`".to_string(),
			Self::Assign => "`:`".to_string(),
			Self::Boolean(b) => format!("`{b}`"),
			Self::Ident(name) => format!("identifier `{name}`"),
			Self::String(s) => format!("string {s:?}"),
			Self::Number(n) => format!("number `{n}`"),
		}
	}
}

/// Tokenize a settings literal. Fails on the first byte sequence that is not
/// part of the settings grammar.
pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, String> {
	let mut tokens = Vec::new();

	for (result, span) in RawToken::lexer(source).spanned() {
		let slice = &source[span.clone()];
		let Ok(raw) = result else {
			return Err(format!(
				"unexpected character `{slice}` at offset {}",
				span.start
			));
		};

		let token = match raw {
			RawToken::BraceOpen => Token::BraceOpen,
			RawToken::BraceClose => Token::BraceClose,
			RawToken::Comma => Token::Comma,
			RawToken::Colon | RawToken::Equals => Token::Assign,
			RawToken::True => Token::Boolean(true),
			RawToken::False => Token::Boolean(false),
			RawToken::Ident => Token::Ident(slice.to_string()),
			RawToken::DoubleQuotedString | RawToken::SingleQuotedString => {
				Token::String(unquote(slice).ok_or_else(|| format!("invalid string {slice}"))?)
			}
			RawToken::Number => {
				Token::Number(
					slice
						.parse::<f64>()
						.map_err(|e| format!("invalid number `{slice}`: {e}"))?,
				)
			}
		};
		tokens.push(token);
	}

	Ok(tokens)
}

/// Strip the surrounding quotes of a string token and resolve escapes.
/// Single quoted strings are rewritten into double quoted form first so both
/// flavours share the same escape rules.
pub(crate) fn unquote(slice: &str) -> Option<String> {
	let inner = &slice[1..slice.len() - 1];
	if !inner.contains('\\') {
		return Some(inner.to_string());
	}

	if slice.starts_with('"') {
		return unescape(slice).ok();
	}

	let mut double_quoted = String::with_capacity(slice.len() + 2);
	double_quoted.push('"');
	let mut chars = inner.chars();
	while let Some(c) = chars.next() {
		match c {
			'\\' => {
				match chars.next() {
					Some('\'') => double_quoted.push('\''),
					Some(next) => {
						double_quoted.push('\\');
						double_quoted.push(next);
					}
					None => return None,
				}
			}
			'"' => double_quoted.push_str("\\\""),
			c => double_quoted.push(c),
		}
	}
	double_quoted.push('"');

	unescape(&double_quoted).ok()
}
