use std::path::Path;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use owo_colors::OwoColorize;
use prepro_cli::Commands;
use prepro_cli::OptionArgs;
use prepro_cli::OutputFormat;
use prepro_cli::PreproCli;
use prepro_core::Prepro;
use prepro_core::PreproConfig;
use prepro_core::ProcessSettings;
use prepro_core::parse_option_override;
use similar::ChangeTag;
use similar::TextDiff;
use tracing_subscriber::EnvFilter;

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,bold) => {
		if color_enabled() {
			format!("{}", $text.bold())
		} else {
			format!("{}", $text)
		}
	};
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn main() {
	let args = PreproCli::parse();

	// Respect NO_COLOR env var and --no-color flag.
	let use_color = !args.no_color && std::env::var_os("NO_COLOR").is_none();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	init_tracing(args.verbose, use_color);

	let result = match &args.command {
		Some(Commands::Process {
			file,
			output,
			uncomment,
			options,
		}) => run_process(&args, file, output.as_deref(), *uncomment, options),
		Some(Commands::Check {
			file,
			expected,
			diff,
			format,
			uncomment,
			options,
		}) => run_check(&args, file, expected, *diff, *format, *uncomment, options),
		Some(Commands::Run { file, options }) => run_script(&args, file, options),
		None => {
			eprintln!("No subcommand specified. Run `prepro --help` for usage.");
			process::exit(1);
		}
	};

	if let Err(e) = result {
		match e.downcast::<prepro_core::PreproError>() {
			Ok(prepro_err) => {
				let report: miette::Report = (*prepro_err).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(2);
	}
}

/// Log to stderr. `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool, use_color: bool) {
	let default_directive = if verbose {
		"prepro_core=debug,prepro=debug"
	} else {
		"warn"
	};
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.without_time()
		.init();
}

fn resolve_root(args: &PreproCli) -> PathBuf {
	args.path
		.clone()
		.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// Build a session from the discovered config and the command line
/// overrides. Returns the session together with the config defaults for
/// processing.
fn open_session(args: &PreproCli, options: &OptionArgs) -> CliResult<(Prepro, ProcessSettings)> {
	let root = resolve_root(args);
	let config = PreproConfig::load(&root)?;

	if args.verbose {
		match PreproConfig::resolve_path(&root) {
			Some(path) => eprintln!("Using config: {}", path.display()),
			None => eprintln!("No config file found in {}", root.display()),
		}
	}

	let (mut prepro, settings) = match config {
		Some(config) => (Prepro::from_config(&config, &root)?, config.process_settings()),
		None => (Prepro::new()?, ProcessSettings::default()),
	};

	for raw in &options.overrides {
		let value = parse_option_override(raw)?;
		tracing::debug!(option = %raw, "applying option override");
		prepro.set_options(&value)?;
	}

	Ok((prepro, settings))
}

fn run_process(
	args: &PreproCli,
	file: &Path,
	output: Option<&Path>,
	uncomment: bool,
	options: &OptionArgs,
) -> CliResult<()> {
	let (mut prepro, mut settings) = open_session(args, options)?;
	settings.uncomment |= uncomment;

	let text = prepro.preprocess_file(file, &settings)?;

	match output {
		Some(path) => {
			if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
				std::fs::create_dir_all(parent)?;
			}
			std::fs::write(path, &text)?;
			if args.verbose {
				eprintln!("Wrote {}", path.display());
			}
		}
		None => {
			print!("{text}");
		}
	}

	Ok(())
}

fn run_check(
	args: &PreproCli,
	file: &Path,
	expected: &Path,
	show_diff: bool,
	format: OutputFormat,
	uncomment: bool,
	options: &OptionArgs,
) -> CliResult<()> {
	let (mut prepro, mut settings) = open_session(args, options)?;
	settings.uncomment |= uncomment;

	let generated = prepro.preprocess_file(file, &settings)?;
	let current = match std::fs::read_to_string(expected) {
		Ok(current) => Some(current),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
		Err(e) => return Err(e.into()),
	};
	let up_to_date = current.as_deref() == Some(generated.as_str());

	match format {
		OutputFormat::Json => {
			let output = serde_json::json!({
				"ok": up_to_date,
				"file": file.display().to_string(),
				"expected": expected.display().to_string(),
				"missing": current.is_none(),
			});
			println!("{output}");
		}
		OutputFormat::Text => {
			if up_to_date {
				println!("Check passed: {} is up to date.", expected.display());
			} else {
				match &current {
					Some(_) => eprintln!("Check failed: {} is out of date.", expected.display()),
					None => eprintln!("Check failed: {} does not exist.", expected.display()),
				}

				if show_diff {
					eprintln!();
					eprintln!("{}", colored!(format!("--- {}", expected.display()), bold));
					eprintln!("{}", colored!(format!("+++ {}", file.display()), bold));
					print_diff(current.as_deref().unwrap_or_default(), &generated);
				}

				eprintln!();
				eprintln!(
					"Run `prepro process {} -o {}` to regenerate it.",
					file.display(),
					expected.display()
				);
			}
		}
	}

	if !up_to_date {
		process::exit(1);
	}

	Ok(())
}

fn run_script(args: &PreproCli, file: &Path, options: &OptionArgs) -> CliResult<()> {
	let (mut prepro, _) = open_session(args, options)?;
	prepro.evaluate(file)?;

	Ok(())
}

fn print_diff(current: &str, expected: &str) {
	let diff = TextDiff::from_lines(current, expected);
	for change in diff.iter_all_changes() {
		let line = change.to_string_lossy();
		let line = line.trim_end_matches('\n');
		match change.tag() {
			ChangeTag::Delete => {
				eprintln!("  {}", colored!(format!("-{line}"), red));
			}
			ChangeTag::Insert => {
				eprintln!("  {}", colored!(format!("+{line}"), green));
			}
			ChangeTag::Equal => {
				eprintln!("   {line}");
			}
		}
	}
}
