use std::{
	fs::File,
	io::{self, Read},
	path::{Path, PathBuf},
};

/// Reads a text file and returns all its lines as a `Vec<String>`.
///
/// - Reads the entire file into memory
/// - Splits on `\n` / `\r\n`
pub(crate) fn read_file<P: AsRef<Path>>(filename: P) -> io::Result<Vec<String>> {
	let mut contents = String::new();
	File::open(filename)?.read_to_string(&mut contents)?;
	Ok(contents.lines().map(str::to_owned).collect())
}

/// Builds an output path based on an input path and a new extension.
///
/// Example:
/// `data/english.txt` + `"json"` → `data/english.json`
pub(crate) fn build_output_path<P: AsRef<Path>>(
	input_path: P,
	output_extension: &str,
) -> io::Result<PathBuf> {
	let input_path = input_path.as_ref();

	let parent = input_path.parent().unwrap_or_else(|| Path::new("."));
	let file_stem = input_path
		.file_stem()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Input path has no filename"))?;

	let mut output = PathBuf::from(parent);
	output.push(file_stem);
	output.set_extension(output_extension);

	Ok(output)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn output_path_replaces_the_extension() {
		let path = build_output_path("data/english.txt", "json").unwrap();
		assert_eq!(path, PathBuf::from("data/english.json"));
		assert!(build_output_path("", "json").is_err());
	}

	#[test]
	fn read_file_splits_lines() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("corpus.txt");
		std::fs::write(&path, "Alpha beta\r\ngamma\n").unwrap();
		assert_eq!(read_file(&path).unwrap(), vec!["Alpha beta", "gamma"]);
	}
}
