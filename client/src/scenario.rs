//! Scenario file loading.
//!
//! Scenarios are YAML with two accepted shapes: a bare list of lines, or a
//! list under a `lines` key. A file that fails YAML parsing is read as plain
//! text, one command per line.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("scenario '{0}' contains no lines")]
    Empty(String),
}

/// An ordered list of user commands to replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub name: String,
    pub lines: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScenarioFile {
    Keyed { lines: Vec<String> },
    Flat(Vec<String>),
}

/// Lists scenario files (`*.yaml` / `*.yml`) in `dir`, sorted by name.
#[must_use]
pub fn available_scenarios(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == "yaml" || ext == "yml")
        })
        .collect();
    files.sort();
    files
}

/// Loads one scenario file.
pub fn load_scenario(path: &Path) -> Result<Scenario, ScenarioError> {
    let content = fs::read_to_string(path)?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("scenario")
        .to_string();

    let lines = match serde_yaml::from_str::<ScenarioFile>(&content) {
        Ok(ScenarioFile::Keyed { lines } | ScenarioFile::Flat(lines)) => lines,
        Err(_) => content.lines().map(str::to_string).collect(),
    };

    let lines: Vec<String> = lines
        .into_iter()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();

    if lines.is_empty() {
        return Err(ScenarioError::Empty(name));
    }
    Ok(Scenario { name, lines })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_scenario(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).expect("create scenario file");
        file.write_all(content.as_bytes()).expect("write scenario");
        path
    }

    #[test]
    fn loads_keyed_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_scenario(
            dir.path(),
            "keyed.yaml",
            "lines:\n  - hello\n  - what time is it\n  - goodbye\n",
        );

        let scenario = load_scenario(&path).expect("load failed");
        assert_eq!(scenario.name, "keyed.yaml");
        assert_eq!(scenario.lines, ["hello", "what time is it", "goodbye"]);
    }

    #[test]
    fn loads_flat_list() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_scenario(dir.path(), "flat.yml", "- hello\n- goodbye\n");

        let scenario = load_scenario(&path).expect("load failed");
        assert_eq!(scenario.lines, ["hello", "goodbye"]);
    }

    #[test]
    fn falls_back_to_plain_text() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_scenario(
            dir.path(),
            "plain.yaml",
            "turn on the lights\n\n  say: something with a colon\n",
        );

        let scenario = load_scenario(&path).expect("load failed");
        assert_eq!(
            scenario.lines,
            ["turn on the lights", "say: something with a colon"]
        );
    }

    #[test]
    fn empty_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_scenario(dir.path(), "empty.yaml", "\n\n");

        assert!(matches!(
            load_scenario(&path),
            Err(ScenarioError::Empty(name)) if name == "empty.yaml"
        ));
    }

    #[test]
    fn discovery_filters_and_sorts() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_scenario(dir.path(), "b.yaml", "- x\n");
        write_scenario(dir.path(), "a.yml", "- x\n");
        write_scenario(dir.path(), "notes.txt", "not a scenario");

        let found = available_scenarios(dir.path());
        let names: Vec<_> = found
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();
        assert_eq!(names, ["a.yml", "b.yaml"]);
    }

    #[test]
    fn missing_directory_yields_nothing() {
        assert!(available_scenarios(Path::new("/nonexistent/scenarios")).is_empty());
    }
}
