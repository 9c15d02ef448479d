use std::path::Path;
use std::path::PathBuf;

use crate::Prepro;
use crate::PreproResult;
use crate::ProcessSettings;

/// Write `content` to `relative` under `root`, creating parent directories.
pub(crate) fn write_file(root: &Path, relative: &str, content: &str) -> PathBuf {
	let path = root.join(relative);
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).expect("failed to create fixture directory");
	}
	std::fs::write(&path, content).expect("failed to write fixture file");
	path
}

/// Preprocess a single in-memory source with a fresh session.
pub(crate) fn preprocess_source(content: &str) -> PreproResult<String> {
	let tmp = tempfile::tempdir()?;
	let entry = write_file(tmp.path(), "main.js", content);
	let mut prepro = Prepro::new()?;
	prepro.preprocess_file(&entry, &ProcessSettings::default())
}

/// Preprocess an in-memory source after merging `options`.
pub(crate) fn preprocess_with_options(
	content: &str,
	options: &serde_json::Value,
) -> PreproResult<String> {
	let tmp = tempfile::tempdir()?;
	let entry = write_file(tmp.path(), "main.js", content);
	let mut prepro = Prepro::new()?;
	prepro.set_options(options)?;
	prepro.preprocess_file(&entry, &ProcessSettings::default())
}

/// Preprocess an in-memory source with an existing session.
pub(crate) fn preprocess_in(prepro: &mut Prepro, content: &str) -> PreproResult<String> {
	let tmp = tempfile::tempdir()?;
	let entry = write_file(tmp.path(), "main.js", content);
	prepro.preprocess_file(&entry, &ProcessSettings::default())
}
