use std::path::Component;
use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;

use derive_more::Deref;
use derive_more::DerefMut;
use mlua::Lua;
use mlua::Table;

use crate::EvalFailure;
use crate::Evaluator;
use crate::IncludeDirective;
use crate::IncludeSettings;
use crate::LineKind;
use crate::LuaEvaluator;
use crate::PreproError;
use crate::PreproResult;
use crate::ProcessSettings;
use crate::Substitution;
use crate::classify_line;
use crate::config::PreproConfig;
use crate::format::render_value;
use crate::output::assemble_output;
use crate::parse_settings;
use crate::parser::splice;
use crate::parser::split_lines;

/// Chunk name the statement buffer executes under.
const BUFFER_CHUNK: &str = "buffer";

/// The file and 1-indexed line a statement was generated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
	pub file: Rc<Path>,
	pub line: usize,
}

impl Origin {
	fn file_display(&self) -> String {
		self.file.display().to_string()
	}
}

/// One generated statement. Its code never spans more than one line, so the
/// statement's index in the buffer is also its line in the executed chunk.
#[derive(Debug, Clone)]
pub struct Statement {
	pub code: String,
	pub origin: Origin,
}

/// Generated statements awaiting execution, in input order across all
/// included files.
#[derive(Debug, Default, Deref, DerefMut)]
pub struct StatementBuffer(Vec<Statement>);

impl StatementBuffer {
	/// The buffer as a single program, one statement per line.
	pub fn program(&self) -> String {
		self.iter()
			.map(|statement| statement.code.as_str())
			.collect::<Vec<_>>()
			.join("\n")
	}

	/// Find the statement that produced a line of [`Self::program`]. Lines
	/// past the end (Lua reports `<eof>` errors there) map to the last
	/// statement.
	pub fn origin_of_line(&self, line: usize) -> Option<&Origin> {
		self.get(line.saturating_sub(1))
			.or_else(|| self.last())
			.map(|statement| &statement.origin)
	}
}

/// A file on the include stack together with the directory its relative
/// includes resolve from.
#[derive(Debug, Clone)]
struct IncludeFrame {
	file: Rc<Path>,
	dir: PathBuf,
}

/// A preprocessing session.
///
/// The session owns one evaluation environment for its whole lifetime.
/// Files are scanned with [`Prepro::include`], which fills the statement
/// buffer, and [`Prepro::process`] executes the buffer and returns the
/// generated text.
///
/// ```rust,no_run
/// use prepro_core::Prepro;
///
/// let mut prepro = Prepro::new()?;
/// prepro.set_options(&serde_json::json!({ "debug": false }))?;
/// prepro.include("src/index.js")?;
/// let text = prepro.process()?;
/// # Ok::<(), prepro_core::PreproError>(())
/// ```
#[derive(Debug)]
pub struct Prepro<E: Evaluator = LuaEvaluator> {
	evaluator: E,
	buffer: StatementBuffer,
	frames: Vec<IncludeFrame>,
	flushed: Vec<String>,
}

impl Prepro<LuaEvaluator> {
	/// Create a session backed by a fresh Lua environment.
	pub fn new() -> PreproResult<Self> {
		let evaluator = LuaEvaluator::new().map_err(|failure| PreproError::Script(failure.message))?;
		Ok(Self::with_evaluator(evaluator))
	}

	/// Create a session and apply a loaded configuration. Setup scripts are
	/// resolved relative to `root`.
	pub fn from_config(config: &PreproConfig, root: &Path) -> PreproResult<Self> {
		let mut prepro = Self::new()?;
		prepro.set_options(&config.options_json())?;

		for script in &config.setup {
			prepro.setup_script(root.join(script))?;
		}

		Ok(prepro)
	}

	/// Run an initializer with access to the environment. A table it returns
	/// is deep-merged into the environment root.
	pub fn setup<F>(&mut self, initializer: F) -> PreproResult<()>
	where
		F: FnOnce(&Lua, &Table) -> mlua::Result<Option<Table>>,
	{
		let result = initializer(self.evaluator.lua(), self.evaluator.environment())
			.map_err(|e| PreproError::Script(e.to_string()))?;

		if let Some(table) = result {
			self.evaluator
				.merge_table_into_environment(&table)
				.map_err(|failure| PreproError::Script(failure.message))?;
		}

		Ok(())
	}

	/// Run a Lua file in the environment, merging a returned table into the
	/// environment root like [`Prepro::setup`].
	pub fn setup_script(&mut self, path: impl AsRef<Path>) -> PreproResult<()> {
		let path = normalize_path(path.as_ref());
		let source = read_source(&path)?;
		tracing::debug!(file = %path.display(), "running setup script");

		let returned = self
			.evaluator
			.run_file(&source, &path.display().to_string())
			.map_err(|failure| script_error(&path, &failure))?;

		if let Some(table) = returned {
			self.evaluator
				.merge_table_into_environment(&table)
				.map_err(|failure| PreproError::Script(failure.message))?;
		}

		Ok(())
	}
}

impl<E: Evaluator> Prepro<E> {
	/// Create a session around any evaluator.
	pub fn with_evaluator(evaluator: E) -> Self {
		Self {
			evaluator,
			buffer: StatementBuffer::default(),
			frames: Vec::new(),
			flushed: Vec::new(),
		}
	}

	/// The evaluator owning the environment.
	pub fn evaluator(&self) -> &E {
		&self.evaluator
	}

	/// Statements collected since the last [`Prepro::process`].
	pub fn buffer(&self) -> &StatementBuffer {
		&self.buffer
	}

	/// Deep merge `config` into the `options` namespace of the environment.
	pub fn set_options(&mut self, config: &serde_json::Value) -> PreproResult<()> {
		self.evaluator
			.merge_options(config)
			.map_err(|failure| PreproError::Script(failure.message))
	}

	/// Deep merge `config` into the root of the environment.
	pub fn merge_environment(&mut self, config: &serde_json::Value) -> PreproResult<()> {
		self.evaluator
			.merge_environment(config)
			.map_err(|failure| PreproError::Script(failure.message))
	}

	/// Scan a file into the statement buffer, expanding nested includes.
	pub fn include(&mut self, path: impl AsRef<Path>) -> PreproResult<()> {
		self.include_with(path, &IncludeSettings::default())
	}

	/// Like [`Prepro::include`] with explicit settings. A failed include
	/// leaves no statements or flushed lines behind.
	pub fn include_with(
		&mut self,
		path: impl AsRef<Path>,
		settings: &IncludeSettings,
	) -> PreproResult<()> {
		let path = normalize_path(path.as_ref());
		let buffered = self.buffer.len();
		let flushed = self.flushed.len();

		let result = self.include_file(&path, settings, None);
		if result.is_err() {
			self.buffer.truncate(buffered);
			self.flushed.truncate(flushed);
		}

		result
	}

	/// Execute the statement buffer and return the generated text.
	pub fn process(&mut self) -> PreproResult<String> {
		self.process_with(&ProcessSettings::default())
	}

	/// Like [`Prepro::process`] with explicit settings. The buffer is empty
	/// afterwards, whether execution succeeded or not.
	pub fn process_with(&mut self, settings: &ProcessSettings) -> PreproResult<String> {
		let buffer = std::mem::take(&mut self.buffer);
		let mut lines = std::mem::take(&mut self.flushed);
		tracing::debug!(
			statements = buffer.len(),
			flushed = lines.len(),
			"processing statement buffer"
		);

		lines.extend(self.execute_buffer(&buffer)?);
		Ok(assemble_output(&lines, settings))
	}

	/// Include a file and process it in one step.
	pub fn preprocess_file(
		&mut self,
		path: impl AsRef<Path>,
		settings: &ProcessSettings,
	) -> PreproResult<String> {
		self.include(path)?;
		self.process_with(settings)
	}

	/// Include and process a file, then run the generated text in the
	/// environment.
	pub fn evaluate(&mut self, path: impl AsRef<Path>) -> PreproResult<()> {
		let path = path.as_ref();
		let text = self.preprocess_file(path, &ProcessSettings::default())?;

		self.evaluator
			.run(&text, &path.display().to_string())
			.map_err(|failure| script_error(path, &failure))
	}

	fn include_file(
		&mut self,
		path: &Path,
		settings: &IncludeSettings,
		from: Option<&Origin>,
	) -> PreproResult<()> {
		if let Some(origin) = from {
			if self.frames.iter().any(|frame| *frame.file == *path) {
				return Err(PreproError::IncludeCycle {
					path: path.display().to_string(),
					file: origin.file_display(),
					line: origin.line,
				});
			}
		}

		let source = match std::fs::read_to_string(path) {
			Ok(source) => source,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				let path = path.display().to_string();
				return Err(match from {
					Some(origin) => {
						PreproError::MissingInclude {
							path,
							file: origin.file_display(),
							line: origin.line,
						}
					}
					None => PreproError::FileNotFound { path },
				});
			}
			Err(e) => return Err(e.into()),
		};

		tracing::debug!(
			file = %path.display(),
			depth = self.frames.len(),
			"including file"
		);

		let file: Rc<Path> = Rc::from(path);
		self.frames.push(IncludeFrame {
			file: Rc::clone(&file),
			dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
		});
		let result = self.scan(&file, &source, settings);
		self.frames.pop();
		result?;

		if settings.evaluate() {
			self.flush()?;
		}

		Ok(())
	}

	fn scan(&mut self, file: &Rc<Path>, source: &str, settings: &IncludeSettings) -> PreproResult<()> {
		for (index, line) in split_lines(source).into_iter().enumerate() {
			let origin = Origin {
				file: Rc::clone(file),
				line: index + 1,
			};

			match classify_line(line) {
				LineKind::Include(directive) => {
					tracing::trace!(line = origin.line, path = directive.path, "include directive");
					self.include_directive(&directive, settings, &origin)?;
				}
				LineKind::Statement(code) => {
					tracing::trace!(line = origin.line, "statement");
					self.buffer.push(Statement {
						code: code.to_string(),
						origin,
					});
				}
				LineKind::Content(substitutions) => {
					let text = if substitutions.is_empty() {
						line.to_string()
					} else {
						self.substitute(line, &substitutions, &origin)?
					};

					self.buffer.push(Statement {
						code: self.evaluator.emit_statement(&text),
						origin,
					});
				}
			}
		}

		Ok(())
	}

	fn include_directive(
		&mut self,
		directive: &IncludeDirective<'_>,
		settings: &IncludeSettings,
		origin: &Origin,
	) -> PreproResult<()> {
		let nested = match directive.settings {
			Some(literal) => {
				let entries = parse_settings(literal).map_err(|reason| {
					PreproError::InvalidSettings {
						file: origin.file_display(),
						line: origin.line,
						reason,
					}
				})?;
				IncludeSettings::from_map(entries)
			}
			None => IncludeSettings::default(),
		};

		let base = self
			.frames
			.last()
			.map(|frame| frame.dir.clone())
			.unwrap_or_default();
		let target = normalize_path(&base.join(directive.path));

		self.include_file(&target, &settings.forward(&nested), Some(origin))
	}

	fn substitute(
		&self,
		line: &str,
		substitutions: &[Substitution<'_>],
		origin: &Origin,
	) -> PreproResult<String> {
		let mut rendered = Vec::with_capacity(substitutions.len());

		for substitution in substitutions {
			if substitution.expression.trim().is_empty() {
				return Err(PreproError::Evaluation {
					file: origin.file_display(),
					line: origin.line,
					message: "missing expression after substitution marker".to_string(),
				});
			}

			let value = self
				.evaluator
				.evaluate(substitution.expression)
				.map_err(|failure| {
					PreproError::Evaluation {
						file: origin.file_display(),
						line: origin.line,
						message: failure.message,
					}
				})?;
			rendered.push(render_value(&value, substitution.context));
		}

		Ok(splice(line, substitutions, &rendered))
	}

	/// Execute what has been buffered so far and keep the emitted lines for
	/// the next [`Prepro::process`].
	fn flush(&mut self) -> PreproResult<()> {
		let buffer = std::mem::take(&mut self.buffer);
		tracing::debug!(statements = buffer.len(), "flushing statement buffer");

		let lines = self.execute_buffer(&buffer)?;
		self.flushed.extend(lines);
		Ok(())
	}

	fn execute_buffer(&self, buffer: &StatementBuffer) -> PreproResult<Vec<String>> {
		self.evaluator
			.execute(&buffer.program(), BUFFER_CHUNK)
			.map_err(|failure| {
				match failure.line.and_then(|line| buffer.origin_of_line(line)) {
					Some(origin) => {
						PreproError::Execution {
							file: origin.file_display(),
							line: origin.line,
							message: failure.message,
						}
					}
					None => PreproError::Script(failure.message),
				}
			})
	}
}

fn read_source(path: &Path) -> PreproResult<String> {
	std::fs::read_to_string(path).map_err(|e| {
		if e.kind() == std::io::ErrorKind::NotFound {
			PreproError::FileNotFound {
				path: path.display().to_string(),
			}
		} else {
			e.into()
		}
	})
}

fn script_error(path: &Path, failure: &EvalFailure) -> PreproError {
	match failure.line {
		Some(line) => PreproError::Script(format!("{}:{line}: {}", path.display(), failure.message)),
		None => PreproError::Script(format!("{}: {}", path.display(), failure.message)),
	}
}

/// Lexically normalize a path: drop `.` components and fold `..` into the
/// preceding component where there is one. The file system is not touched.
pub fn normalize_path(path: &Path) -> PathBuf {
	let mut normalized = PathBuf::new();

	for component in path.components() {
		match component {
			Component::CurDir => {}
			Component::ParentDir => {
				match normalized.components().next_back() {
					Some(Component::Normal(_)) => {
						normalized.pop();
					}
					Some(Component::RootDir | Component::Prefix(_)) => {}
					_ => normalized.push(".."),
				}
			}
			other => normalized.push(other.as_os_str()),
		}
	}

	if normalized.as_os_str().is_empty() {
		PathBuf::from(".")
	} else {
		normalized
	}
}
