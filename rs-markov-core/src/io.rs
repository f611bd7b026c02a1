use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::{env, fs};

use crate::error::{MarkovError, Result};

/// Reads a training corpus and returns one example per line.
///
/// - Reads the entire file into memory
/// - Splits on `\n` / `\r\n`
/// - Trims surrounding whitespace of every line
pub fn read_file<P: AsRef<Path>>(filename: P) -> Result<Vec<String>> {
	let path = filename.as_ref();
	let mut contents = String::new();
	File::open(path)
		.and_then(|mut file| file.read_to_string(&mut contents))
		.map_err(|err| MarkovError::io(err, Some(path.to_path_buf())))?;
	Ok(contents.lines().map(|line| line.trim().to_owned()).collect())
}

/// Extracts the base filename without extension.
///
/// Examples:
/// - `"./data/names.txt"` → `"names"`
/// - `"names.txt"` → `"names"`
pub fn get_filename<P: AsRef<Path>>(input_path: P) -> Result<String> {
	let path = input_path.as_ref();
	let stem = path.file_stem().ok_or_else(|| {
		MarkovError::io(
			std::io::Error::new(std::io::ErrorKind::InvalidInput, "Path has no filename"),
			Some(path.to_path_buf()),
		)
	})?;

	Ok(stem.to_string_lossy().to_string())
}

/// Lists all files with a given extension in a directory.
///
/// Returns file names only (no paths), sorted.
pub fn list_files<P: AsRef<Path>>(dir: P, extension: &str) -> Result<Vec<String>> {
	let dir = dir.as_ref();
	let to_error = |err: std::io::Error| MarkovError::io(err, Some(dir.to_path_buf()));
	let mut files = Vec::new();

	for entry in fs::read_dir(dir).map_err(to_error)? {
		let path = entry.map_err(to_error)?.path();

		if path.is_file() && path.extension() == Some(std::ffi::OsStr::new(extension)) {
			if let Some(name) = path.file_name() {
				files.push(name.to_string_lossy().to_string());
			}
		}
	}

	files.sort();
	Ok(files)
}

/// Current working directory, `"."` if it cannot be resolved.
pub fn working_dir() -> std::path::PathBuf {
	env::current_dir().unwrap_or_else(|_| ".".into())
}
