use crate::MarkerContext;
use crate::Value;

/// Render an evaluated substitution for splicing into a line.
///
/// - Numbers use whichever of the decimal and exponential forms is strictly
///   shorter, preferring decimal on a tie.
/// - Strings are quoted and escaped when the marker sits outside of a
///   comment, and inserted raw inside one.
/// - Everything else uses its default textual form.
pub fn render_value(value: &Value, context: MarkerContext) -> String {
	match value {
		Value::Nil => "nil".to_string(),
		Value::Boolean(b) => b.to_string(),
		Value::Integer(i) => format_integer(*i),
		Value::Number(n) => format_number(*n),
		Value::String(s) => {
			match context {
				MarkerContext::OutsideComment => quote_string(s),
				MarkerContext::InsideComment => s.clone(),
			}
		}
		Value::Other(text) => text.clone(),
	}
}

/// Format an integer, switching to exponential notation when shorter.
pub fn format_integer(value: i64) -> String {
	shortest(value.to_string(), format!("{value:e}"))
}

/// Format a float, switching to exponential notation when shorter.
pub fn format_number(value: f64) -> String {
	if value.is_nan() {
		return "nan".to_string();
	}
	if value.is_infinite() {
		return if value > 0.0 { "inf" } else { "-inf" }.to_string();
	}
	// Adding positive zero turns `-0.0` into `0.0` and leaves everything
	// else unchanged.
	let value = value + 0.0;

	shortest(value.to_string(), format!("{value:e}"))
}

/// Pick the exponential form when it is strictly shorter. Positive exponents
/// are written with an explicit `+`, e.g. `1e+21`.
fn shortest(decimal: String, exponential: String) -> String {
	let exponential = match exponential.split_once('e') {
		Some((mantissa, exponent)) if !exponent.starts_with('-') => {
			format!("{mantissa}e+{exponent}")
		}
		_ => exponential,
	};

	if exponential.len() < decimal.len() {
		exponential
	} else {
		decimal
	}
}

/// Quote a string so it can be spliced into source code as a literal.
fn quote_string(value: &str) -> String {
	serde_json::to_string(value).unwrap_or_else(|_| format!("{value:?}"))
}
