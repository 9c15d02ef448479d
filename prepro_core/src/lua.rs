//! The Lua 5.4 evaluator backing every session.
//!
//! The environment is a table whose metatable falls back to the Lua globals,
//! so the standard library stays reachable while every definition made by a
//! directive lands in the environment itself. Two names are reserved inside
//! it:
//!
//! - `options`: configuration merged in through
//!   [`Evaluator::merge_options`].
//! - `out`: the output sequence. Generated statements append to it and it is
//!   reset before each execution.

use mlua::Function;
use mlua::Lua;
use mlua::LuaSerdeExt;
use mlua::Table;
use mlua::Value as LuaValue;

use crate::evaluator::EvalFailure;
use crate::evaluator::EvalResult;
use crate::evaluator::Evaluator;
use crate::evaluator::Value;

/// Name of the configuration namespace inside the environment.
pub const OPTIONS_NAMESPACE: &str = "options";

/// Name of the output sequence inside the environment.
pub const OUTPUT_SEQUENCE: &str = "out";

/// Chunk name used for inline substitutions.
const SUBSTITUTION_CHUNK: &str = "substitution";

/// A Lua interpreter plus the environment table all code runs against.
pub struct LuaEvaluator {
	lua: Lua,
	env: Table,
}

impl std::fmt::Debug for LuaEvaluator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LuaEvaluator").finish_non_exhaustive()
	}
}

impl LuaEvaluator {
	/// Create a fresh interpreter with an empty environment.
	pub fn new() -> EvalResult<Self> {
		let lua = Lua::new();
		let env: Table = lua
			.load("return setmetatable({}, { __index = _G })")
			.set_name("=environment")
			.eval()
			.map_err(|e| failure(&e, "environment"))?;

		let evaluator = Self { lua, env };
		evaluator
			.init_namespaces()
			.map_err(|e| failure(&e, "environment"))?;

		Ok(evaluator)
	}

	fn init_namespaces(&self) -> mlua::Result<()> {
		self.env.raw_set(OPTIONS_NAMESPACE, self.lua.create_table()?)?;
		self.env.raw_set(OUTPUT_SEQUENCE, self.lua.create_table()?)?;
		Ok(())
	}

	/// The underlying interpreter.
	pub fn lua(&self) -> &Lua {
		&self.lua
	}

	/// The environment table directives execute against.
	pub fn environment(&self) -> &Table {
		&self.env
	}

	/// Deep merge a Lua table into the environment root.
	pub fn merge_table_into_environment(&self, source: &Table) -> EvalResult<()> {
		merge_tables(&self.lua, &self.env, source).map_err(|e| failure(&e, "setup"))
	}

	/// Run a Lua file in the environment. A table returned by the file is
	/// handed back to the caller.
	pub fn run_file(&self, source: &str, name: &str) -> EvalResult<Option<Table>> {
		let value: LuaValue = self
			.lua
			.load(source)
			.set_name(format!("={name}"))
			.set_environment(self.env.clone())
			.eval()
			.map_err(|e| failure(&e, name))?;

		match value {
			LuaValue::Table(table) => Ok(Some(table)),
			_ => Ok(None),
		}
	}

	fn options_table(&self) -> mlua::Result<Table> {
		if let LuaValue::Table(options) = self.env.raw_get::<LuaValue>(OPTIONS_NAMESPACE)? {
			return Ok(options);
		}

		let options = self.lua.create_table()?;
		self.env.raw_set(OPTIONS_NAMESPACE, options.clone())?;
		Ok(options)
	}

	fn merge_json(&self, target: &Table, config: &serde_json::Value) -> mlua::Result<()> {
		match self.lua.to_value(config)? {
			LuaValue::Table(source) => merge_tables(&self.lua, target, &source),
			_ => {
				Err(mlua::Error::runtime(
					"configuration to merge must be an object",
				))
			}
		}
	}

	fn convert(&self, value: LuaValue) -> mlua::Result<Value> {
		let converted = match value {
			LuaValue::Nil => Value::Nil,
			LuaValue::Boolean(b) => Value::Boolean(b),
			LuaValue::Integer(i) => Value::Integer(i),
			LuaValue::Number(n) => Value::Number(n),
			LuaValue::String(s) => Value::String(s.to_string_lossy()),
			LuaValue::Table(table) => {
				match self.lua.from_value::<serde_json::Value>(LuaValue::Table(table.clone())) {
					Ok(json) => Value::Other(json.to_string()),
					Err(_) => Value::Other(self.tostring(LuaValue::Table(table))?),
				}
			}
			other => Value::Other(self.tostring(other)?),
		};

		Ok(converted)
	}

	fn tostring(&self, value: LuaValue) -> mlua::Result<String> {
		let tostring: Function = self.lua.globals().get("tostring")?;
		tostring.call::<String>(value)
	}

	fn collect_output(&self) -> mlua::Result<Vec<String>> {
		let out: Table = self.env.raw_get(OUTPUT_SEQUENCE)?;
		let mut lines = Vec::with_capacity(out.raw_len());
		for value in out.sequence_values::<LuaValue>() {
			let line = match value? {
				LuaValue::String(s) => s.to_string_lossy(),
				other => self.tostring(other)?,
			};
			lines.push(line);
		}
		Ok(lines)
	}
}

impl Evaluator for LuaEvaluator {
	fn evaluate(&self, expression: &str) -> EvalResult<Value> {
		let value: LuaValue = self
			.lua
			.load(format!("return {expression}"))
			.set_name(format!("={SUBSTITUTION_CHUNK}"))
			.set_environment(self.env.clone())
			.eval()
			.map_err(|e| failure(&e, SUBSTITUTION_CHUNK))?;

		self.convert(value)
			.map_err(|e| failure(&e, SUBSTITUTION_CHUNK))
	}

	fn emit_statement(&self, line: &str) -> String {
		format!(
			"{OUTPUT_SEQUENCE}[#{OUTPUT_SEQUENCE} + 1] = {}",
			lua_quote(line)
		)
	}

	fn execute(&self, program: &str, chunk: &str) -> EvalResult<Vec<String>> {
		let out = self.lua.create_table().map_err(|e| failure(&e, chunk))?;
		self.env
			.raw_set(OUTPUT_SEQUENCE, out)
			.map_err(|e| failure(&e, chunk))?;

		self.run(program, chunk)?;
		self.collect_output().map_err(|e| failure(&e, chunk))
	}

	fn run(&self, program: &str, chunk: &str) -> EvalResult<()> {
		self.lua
			.load(program)
			.set_name(format!("={chunk}"))
			.set_environment(self.env.clone())
			.exec()
			.map_err(|e| failure(&e, chunk))
	}

	fn merge_options(&self, config: &serde_json::Value) -> EvalResult<()> {
		self.options_table()
			.and_then(|options| self.merge_json(&options, config))
			.map_err(|e| failure(&e, OPTIONS_NAMESPACE))
	}

	fn merge_environment(&self, config: &serde_json::Value) -> EvalResult<()> {
		self.merge_json(&self.env, config)
			.map_err(|e| failure(&e, "environment"))
	}
}

/// Recursively merge `source` into `target`. Plain object tables merge key
/// by key; sequences and scalars replace whatever was there.
fn merge_tables(lua: &Lua, target: &Table, source: &Table) -> mlua::Result<()> {
	for pair in source.pairs::<LuaValue, LuaValue>() {
		let (key, value) = pair?;

		if let LuaValue::Table(incoming) = &value {
			if is_plain_object(lua, incoming) {
				let existing = target.raw_get::<LuaValue>(key.clone())?;
				if let LuaValue::Table(existing) = existing {
					if is_plain_object(lua, &existing) {
						merge_tables(lua, &existing, incoming)?;
						continue;
					}
				}

				// Copy so that later merges never write through to the source.
				let copy = lua.create_table()?;
				merge_tables(lua, &copy, incoming)?;
				target.raw_set(key, copy)?;
				continue;
			}
		}

		target.raw_set(key, value)?;
	}

	Ok(())
}

/// Tables without a sequence part count as plain objects, unless they carry
/// the array marker that serde conversion attaches to (possibly empty)
/// arrays.
fn is_plain_object(lua: &Lua, table: &Table) -> bool {
	table.raw_len() == 0 && table.metatable() != Some(lua.array_metatable())
}

/// Quote `text` as a single-line Lua string literal.
pub fn lua_quote(text: &str) -> String {
	let mut quoted = String::with_capacity(text.len() + 2);
	quoted.push('"');

	for c in text.chars() {
		match c {
			'\\' => quoted.push_str("\\\\"),
			'"' => quoted.push_str("\\\""),
			'\n' => quoted.push_str("\\n"),
			'\r' => quoted.push_str("\\r"),
			'\t' => quoted.push_str("\\t"),
			c if c.is_ascii_control() => quoted.push_str(&format!("\\{:03}", c as u32)),
			c => quoted.push(c),
		}
	}

	quoted.push('"');
	quoted
}

/// Convert an interpreter error into an [`EvalFailure`], pulling out the
/// line inside `chunk` when Lua reports one.
fn failure(error: &mlua::Error, chunk: &str) -> EvalFailure {
	let message = match error {
		mlua::Error::RuntimeError(message) => message.clone(),
		mlua::Error::SyntaxError { message, .. } => message.clone(),
		other => other.to_string(),
	};
	let message = message.lines().next().unwrap_or_default().to_string();
	let (line, message) = strip_chunk_location(&message, chunk);
	EvalFailure { message, line }
}

/// Lua prefixes errors with `<chunk>:<line>:`. Remove that prefix and return
/// the line number separately.
pub(crate) fn strip_chunk_location(message: &str, chunk: &str) -> (Option<usize>, String) {
	let prefix = format!("{chunk}:");
	let Some(start) = message.find(&prefix) else {
		return (None, message.to_string());
	};

	let after = &message[start + prefix.len()..];
	let digits = after.chars().take_while(char::is_ascii_digit).count();
	if digits == 0 || !after[digits..].starts_with(':') {
		return (None, message.to_string());
	}

	let line = after[..digits].parse().ok();
	let rest = after[digits + 1..].trim_start();
	let stripped = format!("{}{rest}", &message[..start]);

	(line, stripped)
}
