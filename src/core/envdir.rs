//! # Env-dir loader.
//!
//! An optional directory whose regular files become extra environment
//! variables for every worker: the filename is the variable name, the file
//! contents the value, interpreted as raw bytes with trailing newlines
//! stripped. Non-regular entries are skipped. Entries are applied in
//! filename order, after the inheritance variables, so they win on
//! collision.
//!
//! Read failures are advisory: the caller publishes an event and starts the
//! worker without the variables.

use std::ffi::OsString;
use std::io;
use std::os::unix::ffi::OsStringExt;
use std::path::Path;

/// Loads the variables from `dir`, sorted by filename.
pub(crate) fn load(dir: &Path) -> io::Result<Vec<(OsString, OsString)>> {
    let mut vars = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.metadata()?.is_file() {
            continue;
        }
        let mut value = std::fs::read(entry.path())?;
        while value.last() == Some(&b'\n') {
            value.pop();
        }
        vars.push((entry.file_name(), OsString::from_vec(value)));
    }

    vars.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_files_as_variables() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("APP_MODE"), "production\n").unwrap();
        std::fs::write(dir.path().join("EMPTY"), "").unwrap();
        std::fs::write(dir.path().join("MULTILINE"), "a\nb\n\n").unwrap();

        let vars = load(dir.path()).unwrap();
        assert_eq!(
            vars,
            vec![
                ("APP_MODE".into(), "production".into()),
                ("EMPTY".into(), "".into()),
                ("MULTILINE".into(), "a\nb".into()),
            ]
        );
    }

    #[test]
    fn skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("subdir")).unwrap();
        std::fs::write(dir.path().join("KEY"), "value").unwrap();

        let vars = load(dir.path()).unwrap();
        assert_eq!(vars.len(), 1);
        assert_eq!(vars[0].0, OsString::from("KEY"));
    }

    #[test]
    fn missing_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("nope")).is_err());
    }
}
