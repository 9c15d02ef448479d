use std::path::PathBuf;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Preprocess text files with Lua directives hidden in comments.",
	long_about = "prepro is a line-oriented preprocessor. Directives live inside comments, so the \
	              annotated source stays valid in its own language.\n\nDirectives:\n  /*#*/ \
	              <statement>        Run a Lua statement; control flow wraps the lines between \
	              directives\n  /*#*/ include('file')   Splice another file in place\n  /*#=*/ \
	              expr             Substitute a value in code (strings are quoted)\n  *#=* expr   \
	              Substitute a value in a comment (strings are raw)\n\nQuick start:\n  prepro \
	              process src/index.js        Print the generated text\n  prepro check \
	              src/index.js dist/index.js  Verify a generated file is up to date\n  prepro run \
	              build.lua                 Preprocess and execute a Lua script"
)]
pub struct PreproCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to the project root directory. `prepro.toml` is discovered here
	/// and setup scripts resolve relative to it.
	#[arg(long, short, global = true)]
	pub path: Option<PathBuf>,

	/// Enable verbose output.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

/// Option overrides shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct OptionArgs {
	/// Override a value in the `options` namespace, e.g. `--option debug=true`
	/// or `--option build.name="dev"`. Dotted keys nest. Can be repeated;
	/// later overrides win.
	#[arg(long = "option", short = 'O', value_name = "KEY=VALUE")]
	pub overrides: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Preprocess a file and print or write the generated text.
	///
	/// Scans the file and every file it includes, executes the collected
	/// statements and prints the result to stdout. Use `--output` to write
	/// it to a file instead.
	Process {
		/// The file to preprocess.
		file: PathBuf,

		/// Write the generated text to this file instead of stdout.
		#[arg(long, short)]
		output: Option<PathBuf>,

		/// Strip `/* */` and `//` comments from the generated text.
		#[arg(long, default_value_t = false)]
		uncomment: bool,

		#[command(flatten)]
		options: OptionArgs,
	},
	/// Check that a generated file matches what preprocessing produces now.
	///
	/// Exits with a non-zero status code when the expected file is stale.
	/// Ideal for CI pipelines that commit generated output.
	Check {
		/// The file to preprocess.
		file: PathBuf,

		/// The previously generated file to compare against.
		expected: PathBuf,

		/// Show a unified diff between the expected file and the freshly
		/// generated text.
		#[arg(long, default_value_t = false)]
		diff: bool,

		/// Output format for the check result. Use `text` for human-readable
		/// output or `json` for programmatic consumption.
		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,

		/// Strip `/* */` and `//` comments from the generated text.
		#[arg(long, default_value_t = false)]
		uncomment: bool,

		#[command(flatten)]
		options: OptionArgs,
	},
	/// Preprocess a Lua script, then execute the result in the same
	/// environment.
	Run {
		/// The Lua script to preprocess and run.
		file: PathBuf,

		#[command(flatten)]
		options: OptionArgs,
	},
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text output with colors and formatting.
	Text,
	/// JSON output for programmatic consumption.
	Json,
}
