//! Turning command-line set arguments into labelled inputs.

use std::fs;
use std::path::{Path, PathBuf};

use ncd_core::InputItem;
use thiserror::Error;

/// Label given to a literal string argument.
pub const LITERAL_LABEL: &str = "literal";

/// How a set argument is interpreted.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SetSpec {
    /// Every regular file in a directory, sorted by file name.
    Dir(PathBuf),
    /// A single file.
    File(PathBuf),
    /// A newline-separated list of file paths.
    List(PathBuf),
    /// The argument text itself.
    Literal(String),
}

/// Input loading errors.
#[derive(Debug, Error)]
pub enum InputError {
    /// A file or directory could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// A list file names a path that does not exist.
    #[error("listed path does not exist: {0}")]
    MissingListedPath(String),
}

/// Classifies `arg`. With `list` the argument is always a list file; otherwise
/// existing directories and files win and anything else is a literal.
#[must_use]
pub fn detect_set_spec(arg: &str, list: bool) -> SetSpec {
    let path = Path::new(arg);
    if list {
        return SetSpec::List(path.to_path_buf());
    }
    match fs::metadata(path) {
        Ok(md) if md.is_dir() => SetSpec::Dir(path.to_path_buf()),
        Ok(md) if md.is_file() => SetSpec::File(path.to_path_buf()),
        _ => SetSpec::Literal(arg.to_owned()),
    }
}

/// Reads every item of a set.
pub fn load_set(spec: &SetSpec) -> Result<Vec<InputItem>, InputError> {
    match spec {
        SetSpec::Dir(dir) => {
            let mut files = fs::read_dir(dir)
                .map_err(|source| read_error(dir, source))?
                .filter_map(Result::ok)
                .filter(|entry| entry.file_type().is_ok_and(|ft| ft.is_file()))
                .map(|entry| entry.path())
                .collect::<Vec<_>>();
            files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
            files.iter().map(|path| load_file(path)).collect()
        }
        SetSpec::File(path) => Ok(vec![load_file(path)?]),
        SetSpec::List(list) => {
            let raw = fs::read_to_string(list).map_err(|source| read_error(list, source))?;
            raw.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(|line| {
                    let path = Path::new(line);
                    if !path.exists() {
                        return Err(InputError::MissingListedPath(line.to_owned()));
                    }
                    load_file(path)
                })
                .collect()
        }
        SetSpec::Literal(text) => Ok(vec![InputItem::new(LITERAL_LABEL, text.as_bytes())]),
    }
}

fn load_file(path: &Path) -> Result<InputItem, InputError> {
    let bytes = fs::read(path).map_err(|source| read_error(path, source))?;
    Ok(InputItem::new(label_for(path), bytes))
}

fn label_for(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .map_or_else(|| path.to_string_lossy().into_owned(), str::to_owned)
}

fn read_error(path: &Path, source: std::io::Error) -> InputError {
    InputError::Read {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "ncd-inputs-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time")
                .as_nanos()
        ));
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn directory_items_are_sorted_and_skip_subdirectories() {
        let dir = temp_dir("dir");
        fs::write(dir.join("b.txt"), "bravo").expect("write b");
        fs::write(dir.join("a.txt"), "alpha").expect("write a");
        fs::create_dir(dir.join("nested")).expect("mkdir");

        let spec = detect_set_spec(dir.to_str().expect("utf8"), false);
        assert_eq!(spec, SetSpec::Dir(dir.clone()));
        let items = load_set(&spec).expect("load dir");
        let labels: Vec<_> = items.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, ["a.txt", "b.txt"]);
        assert_eq!(items[0].bytes, b"alpha");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn list_file_skips_comments_and_blank_lines() {
        let dir = temp_dir("list");
        let one = dir.join("one.txt");
        fs::write(&one, "1").expect("write one");
        let list = dir.join("set.list");
        fs::write(&list, format!("# header\n\n  {}  \n", one.display())).expect("write list");

        let items = load_set(&detect_set_spec(list.to_str().expect("utf8"), true)).expect("load");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].label, "one.txt");

        fs::write(&list, "definitely/not/here.txt\n").expect("rewrite list");
        let err = load_set(&SetSpec::List(list)).unwrap_err();
        assert!(matches!(err, InputError::MissingListedPath(ref p) if p == "definitely/not/here.txt"));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn unknown_path_is_a_literal() {
        let spec = detect_set_spec("hello world", false);
        assert_eq!(spec, SetSpec::Literal("hello world".to_owned()));
        let items = load_set(&spec).expect("literal");
        assert_eq!(items, vec![InputItem::new("literal", "hello world")]);
    }

    #[test]
    fn single_file_is_labelled_by_name() {
        let dir = temp_dir("file");
        let path = dir.join("sample.bin");
        fs::write(&path, [0_u8, 1, 2]).expect("write");
        let items = load_set(&detect_set_spec(path.to_str().expect("utf8"), false)).expect("load");
        assert_eq!(items, vec![InputItem::new("sample.bin", vec![0_u8, 1, 2])]);
        let _ = fs::remove_dir_all(dir);
    }
}
