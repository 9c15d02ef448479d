use std::fmt::Display;

/// A value produced by evaluating an inline substitution.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	Nil,
	Boolean(bool),
	Integer(i64),
	Number(f64),
	String(String),
	/// Any other value, already converted to its default textual form.
	Other(String),
}

/// A failure reported by the evaluator. `line` is the 1-indexed line inside
/// the evaluated chunk when the interpreter reports one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalFailure {
	pub message: String,
	pub line: Option<usize>,
}

impl Display for EvalFailure {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.message)
	}
}

pub type EvalResult<T> = Result<T, EvalFailure>;

/// The embedded language the preprocessor executes directives in.
///
/// Implementations own the environment: every call sees the effects of all
/// previous calls on the same evaluator.
pub trait Evaluator {
	/// Evaluate a single expression and return its value.
	fn evaluate(&self, expression: &str) -> EvalResult<Value>;

	/// Generate one line of code that appends `line` verbatim to the output
	/// sequence when executed. The generated code must not contain line
	/// breaks.
	fn emit_statement(&self, line: &str) -> String;

	/// Reset the output sequence, execute `program` and return the lines it
	/// emitted. `chunk` names the program in diagnostics.
	fn execute(&self, program: &str, chunk: &str) -> EvalResult<Vec<String>>;

	/// Execute `program` for its side effects only.
	fn run(&self, program: &str, chunk: &str) -> EvalResult<()>;

	/// Deep merge `config` into the reserved `options` namespace.
	fn merge_options(&self, config: &serde_json::Value) -> EvalResult<()>;

	/// Deep merge `config` into the root of the environment.
	fn merge_environment(&self, config: &serde_json::Value) -> EvalResult<()>;
}
