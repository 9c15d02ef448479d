use std::ops::Range;

/// Marker that turns a whole line into a directive.
pub const DIRECTIVE_MARKER: &str = "/*#*/";

/// Marker that introduces an inline value substitution. When it is preceded
/// by `/` (written as `/*#=*/`) the substitution sits outside of a comment.
pub const VALUE_MARKER: &str = "*#=*";

/// Where an inline substitution appears, which decides how strings render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerContext {
	/// `*#=* expr`: the value lands inside a comment and is written raw.
	InsideComment,
	/// `/*#=*/ expr`: the value lands in code and strings are quoted.
	OutsideComment,
}

/// An inline substitution found in a content line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution<'a> {
	/// Byte range in the line replaced by the rendered value, covering the
	/// marker and the expression.
	pub range: Range<usize>,
	/// The expression text: either a dotted path or a parenthesized
	/// expression including its parentheses.
	pub expression: &'a str,
	pub context: MarkerContext,
}

/// An include directive: `include('path'[, { settings }]);`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDirective<'a> {
	/// The path exactly as written between the quotes.
	pub path: &'a str,
	/// The raw settings literal, parsed later by the settings parser.
	pub settings: Option<&'a str>,
}

/// The classification of one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind<'a> {
	/// `/*#*/ include(...)`
	Include(IncludeDirective<'a>),
	/// `/*#*/ <statement>` with any other payload.
	Statement(&'a str),
	/// A line copied to the output, with its substitutions in left-to-right
	/// order. Plain lines have none.
	Content(Vec<Substitution<'a>>),
}

/// Split text into lines on `\r\n`, `\n` or `\r`. A trailing line break
/// yields a final empty line so that joining with `\n` restores it.
pub fn split_lines(content: &str) -> Vec<&str> {
	let bytes = content.as_bytes();
	let mut lines = Vec::new();
	let mut start = 0;
	let mut index = 0;

	while index < bytes.len() {
		match bytes[index] {
			b'\n' => {
				lines.push(&content[start..index]);
				index += 1;
				start = index;
			}
			b'\r' => {
				lines.push(&content[start..index]);
				index += if bytes.get(index + 1) == Some(&b'\n') { 2 } else { 1 };
				start = index;
			}
			_ => index += 1,
		}
	}

	lines.push(&content[start..]);
	lines
}

/// Classify a single line.
pub fn classify_line(line: &str) -> LineKind<'_> {
	let Some(payload) = line.trim_start().strip_prefix(DIRECTIVE_MARKER) else {
		return LineKind::Content(find_substitutions(line));
	};
	let payload = payload.trim_start();

	match parse_include(payload.trim_end()) {
		Some(include) => LineKind::Include(include),
		None => LineKind::Statement(payload),
	}
}

/// Match `include('<path>'[, <settings>]);` with an optional trailing `;`.
/// Anything that does not fit the shape returns `None` and is treated as an
/// ordinary statement.
fn parse_include(payload: &str) -> Option<IncludeDirective<'_>> {
	let inner = payload.strip_prefix("include(")?;
	let inner = inner.strip_suffix(';').unwrap_or(inner).trim_end();
	let inner = inner.strip_suffix(')')?.trim();

	let quote = inner.chars().next().filter(|c| matches!(c, '\'' | '"'))?;
	let close = inner[1..].find(quote)? + 1;
	let path = &inner[1..close];
	if path.is_empty() {
		return None;
	}

	let rest = inner[close + 1..].trim_start();
	if rest.is_empty() {
		return Some(IncludeDirective {
			path,
			settings: None,
		});
	}

	let settings = rest.strip_prefix(',')?.trim();
	if settings.is_empty() {
		return None;
	}

	Some(IncludeDirective {
		path,
		settings: Some(settings),
	})
}

/// Find every inline substitution in a content line, left to right.
pub fn find_substitutions(line: &str) -> Vec<Substitution<'_>> {
	let bytes = line.as_bytes();
	let mut substitutions = Vec::new();
	let mut search_from = 0;

	while let Some(found) = line[search_from..].find(VALUE_MARKER) {
		let marker = search_from + found;
		let outside = marker > 0 && bytes[marker - 1] == b'/';
		let start = if outside { marker - 1 } else { marker };

		let mut cursor = marker + VALUE_MARKER.len();
		if bytes.get(cursor) == Some(&b'/') {
			cursor += 1;
		}
		while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
			cursor += 1;
		}

		let end = if bytes.get(cursor) == Some(&b'(') {
			closing_paren(bytes, cursor).map_or(bytes.len(), |close| close + 1)
		} else {
			let mut end = cursor;
			while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || matches!(bytes[end], b'_' | b'.')) {
				end += 1;
			}
			end
		};

		substitutions.push(Substitution {
			range: start..end,
			expression: &line[cursor..end],
			context: if outside {
				MarkerContext::OutsideComment
			} else {
				MarkerContext::InsideComment
			},
		});

		search_from = end.max(marker + VALUE_MARKER.len());
	}

	substitutions
}

/// Find the parenthesis closing the one at `open`, honouring nesting and
/// skipping over quoted strings.
fn closing_paren(bytes: &[u8], open: usize) -> Option<usize> {
	let mut depth = 0usize;
	let mut quote: Option<u8> = None;
	let mut index = open;

	while index < bytes.len() {
		let byte = bytes[index];
		if let Some(q) = quote {
			if byte == b'\\' {
				index += 1;
			} else if byte == q {
				quote = None;
			}
		} else {
			match byte {
				b'\'' | b'"' => quote = Some(byte),
				b'(' => depth += 1,
				b')' => {
					depth -= 1;
					if depth == 0 {
						return Some(index);
					}
				}
				_ => {}
			}
		}
		index += 1;
	}

	None
}

/// Replace each substitution's range with its rendered value.
pub fn splice(line: &str, substitutions: &[Substitution<'_>], rendered: &[String]) -> String {
	let mut result = String::with_capacity(line.len());
	let mut last = 0;

	for (substitution, value) in substitutions.iter().zip(rendered) {
		result.push_str(&line[last..substitution.range.start]);
		result.push_str(value);
		last = substitution.range.end;
	}
	result.push_str(&line[last..]);

	result
}
