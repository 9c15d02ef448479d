//! `prepro_core` is the engine behind the `prepro` preprocessor. It scans text
//! files line by line for directives hidden in comments, runs the embedded
//! code against a persistent Lua environment, and reassembles the output.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Source file
//!   → Line classifier (directive, include, content with inline substitutions)
//!   → Directive processor (nested includes, eager substitutions, statement buffer)
//!   → Output assembler (runs the buffer in the environment, collects `out`)
//!   → Post-processing (optional comment stripping, trailing blank lines)
//! ```
//!
//! ## Directive Syntax
//!
//! - `/*#*/ <statement>`: a Lua statement appended to the statement buffer.
//!   Lua control flow wraps the lines between directives, so `/*#*/ if
//!   options.debug then` … `/*#*/ end` keeps or drops the lines in between.
//! - `/*#*/ include('path/to/file.js', { evaluate: true });`: scan another
//!   file in place. Paths resolve relative to the including file.
//! - `/*#=*/ options.version` or `/*#=*/ (1 + 2)`: substitute a value in
//!   code; strings are quoted.
//! - `*#=* options.version`: substitute a value inside a comment; strings are
//!   inserted raw.
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading from `prepro.toml` and command line
//!   option overrides.
//!
//! ## Key Types
//!
//! - [`Prepro`]: A session owning the environment, the statement buffer and
//!   the include stack.
//! - [`Evaluator`]: The interface to the embedded language, implemented by
//!   [`LuaEvaluator`].
//! - [`LineKind`]: The classification of one input line.
//! - [`IncludeSettings`] / [`ProcessSettings`]: Settings for include and
//!   process calls.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use prepro_core::Prepro;
//! use prepro_core::ProcessSettings;
//!
//! let mut prepro = Prepro::new().unwrap();
//! prepro
//! 	.set_options(&serde_json::json!({ "debug": true }))
//! 	.unwrap();
//! let text = prepro
//! 	.preprocess_file("src/main.js", &ProcessSettings::default())
//! 	.unwrap();
//! println!("{text}");
//! ```

pub use config::*;
pub use engine::*;
pub use error::*;
pub use evaluator::*;
pub use format::*;
pub use lua::LuaEvaluator;
pub use lua::OPTIONS_NAMESPACE;
pub use lua::OUTPUT_SEQUENCE;
pub use output::*;
pub use parser::*;
pub use settings::*;

pub mod config;
mod engine;
#[allow(unused_assignments)]
mod error;
mod evaluator;
mod format;
pub(crate) mod lexer;
mod lua;
mod output;
mod parser;
mod settings;

#[cfg(test)]
mod __fixtures;
