use crate::ProcessSettings;

/// Join emitted lines into the final text and apply post-processing.
pub fn assemble_output(lines: &[String], settings: &ProcessSettings) -> String {
	let mut text = lines.join("\n");

	if settings.uncomment {
		text = strip_comments(&text);
	}

	collapse_trailing_blank_lines(&text)
}

/// Collapse a run of blank lines at the very end of `text` into a single
/// line break.
pub fn collapse_trailing_blank_lines(text: &str) -> String {
	let content_end = text.trim_end().len();
	let tail = &text[content_end..];

	match tail.find('\n') {
		Some(newline) => format!("{}\n", &text[..content_end + newline]),
		None => text.to_string(),
	}
}

enum ScanState {
	Code,
	String(char),
	LineComment,
	BlockComment,
}

/// Remove `/* ... */` and `// ...` comments that sit outside of string
/// literals. Lines that only held a comment are removed entirely.
///
/// Single and double quoted strings end at the line break, and a `'` directly
/// after a letter or digit is an apostrophe rather than a string opener.
pub fn strip_comments(text: &str) -> String {
	let mut lines: Vec<String> = Vec::new();
	let mut current = String::new();
	let mut stripped_on_line = false;
	let mut state = ScanState::Code;
	let mut chars = text.chars().peekable();

	let mut finish_line = |current: &mut String, stripped: bool| {
		let line = std::mem::take(current);
		if !stripped {
			lines.push(line);
		} else if !line.trim().is_empty() {
			lines.push(line.trim_end().to_string());
		}
	};

	while let Some(c) = chars.next() {
		if c == '\n' {
			// Only template literals span lines.
			if matches!(state, ScanState::LineComment | ScanState::String('\'' | '"')) {
				state = ScanState::Code;
			}
			finish_line(&mut current, stripped_on_line);
			stripped_on_line = matches!(state, ScanState::BlockComment);
			continue;
		}

		match state {
			ScanState::Code => {
				match (c, chars.peek()) {
					('/', Some('*')) => {
						chars.next();
						state = ScanState::BlockComment;
						stripped_on_line = true;
					}
					('/', Some('/')) => {
						chars.next();
						state = ScanState::LineComment;
						stripped_on_line = true;
					}
					('\'', _) if current.chars().next_back().is_some_and(char::is_alphanumeric) => {
						current.push(c);
					}
					('"' | '\'' | '`', _) => {
						state = ScanState::String(c);
						current.push(c);
					}
					_ => current.push(c),
				}
			}
			ScanState::String(quote) => {
				current.push(c);
				if c == '\\' {
					if let Some(&next) = chars.peek() {
						if next != '\n' {
							current.push(next);
							chars.next();
						}
					}
				} else if c == quote {
					state = ScanState::Code;
				}
			}
			ScanState::LineComment => {}
			ScanState::BlockComment => {
				if c == '*' && chars.peek() == Some(&'/') {
					chars.next();
					state = ScanState::Code;
				}
			}
		}
	}

	finish_line(&mut current, stripped_on_line);
	lines.join("\n")
}
