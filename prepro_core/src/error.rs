use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum PreproError {
	#[error(transparent)]
	#[diagnostic(code(prepro::io_error))]
	Io(#[from] std::io::Error),

	#[error("file not found: `{path}`")]
	#[diagnostic(
		code(prepro::file_not_found),
		help("check the path; relative paths resolve from the current directory")
	)]
	FileNotFound { path: String },

	#[error("included file not found: `{path}` (included from {file}:{line})")]
	#[diagnostic(
		code(prepro::missing_include),
		help("include paths resolve relative to the directory of the including file")
	)]
	MissingInclude {
		path: String,
		file: String,
		line: usize,
	},

	#[error("include cycle detected: `{path}` is already being included (from {file}:{line})")]
	#[diagnostic(
		code(prepro::include_cycle),
		help("remove the include that points back to a file higher up the include chain")
	)]
	IncludeCycle {
		path: String,
		file: String,
		line: usize,
	},

	#[error("invalid include settings at {file}:{line}: {reason}")]
	#[diagnostic(
		code(prepro::invalid_settings),
		help("settings are written as `{{ key: value, ... }}` with boolean, number or quoted string values")
	)]
	InvalidSettings {
		file: String,
		line: usize,
		reason: String,
	},

	#[error("failed to evaluate substitution at {file}:{line}: {message}")]
	#[diagnostic(code(prepro::evaluation))]
	Evaluation {
		file: String,
		line: usize,
		message: String,
	},

	#[error("failed to execute statement from {file}:{line}: {message}")]
	#[diagnostic(code(prepro::execution))]
	Execution {
		file: String,
		line: usize,
		message: String,
	},

	#[error("script error: {0}")]
	#[diagnostic(code(prepro::script))]
	Script(String),

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(prepro::config_parse),
		help("check that prepro.toml is valid TOML with `setup`, [options] and/or [process] entries")
	)]
	ConfigParse(String),

	#[error("invalid option override: `{0}`")]
	#[diagnostic(
		code(prepro::invalid_option),
		help("pass overrides as `key=value`, e.g. `--option debug=true` or `--option build.name=\"dev\"`")
	)]
	InvalidOption(String),
}

pub type PreproResult<T> = Result<T, PreproError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
