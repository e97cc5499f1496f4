//! Compile-command database.
//!
//! Loads a CMake-style `compile_commands.json` and answers "how is this
//! file compiled". Files absent from the database can still get a
//! best-effort context synthesized from a build target's flags; files with
//! neither are simply not analyzable, which disables intelligence for them
//! and nothing else.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::project::daemon::TargetInfo;

/// How one file is compiled: the argv of its compiler invocation and the
/// directory it runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileContext {
    pub directory: PathBuf,
    pub arguments: Vec<String>,
}

impl CompileContext {
    /// Best-effort context for a file with no database entry, built from a
    /// build target's flags. Mirrors what the build would do closely enough
    /// for analysis, not for an actual compile.
    pub fn synthesize(file: &Path, directory: &Path, target: &TargetInfo) -> Self {
        let mut arguments = vec!["cc".to_string()];
        arguments.extend(target.compile_options.iter().cloned());
        for def in &target.compile_definitions {
            arguments.push(format!("-D{}", def));
        }
        for dir in &target.include_directories {
            arguments.push(format!("-I{}", dir));
        }
        arguments.push("-c".to_string());
        arguments.push(file.to_string_lossy().into_owned());
        Self {
            directory: directory.to_path_buf(),
            arguments,
        }
    }
}

/// Errors loading the database.
#[derive(Debug)]
pub enum ProjectError {
    IoError(String),
    ParseError(String),
}

impl std::fmt::Display for ProjectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectError::IoError(msg) => write!(f, "IO error: {}", msg),
            ProjectError::ParseError(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for ProjectError {}

#[derive(Debug, Deserialize)]
struct RawEntry {
    directory: String,
    file: String,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    arguments: Option<Vec<String>>,
}

/// Registered compile commands, keyed by absolute file path.
#[derive(Debug, Default)]
pub struct CompileCommandIndex {
    root: PathBuf,
    entries: HashMap<PathBuf, CompileContext>,
}

impl CompileCommandIndex {
    /// Load `compile_commands.json` from disk.
    pub fn load(path: &Path) -> Result<Self, ProjectError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ProjectError::IoError(format!("failed to read {:?}: {}", path, e)))?;
        let root = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        Self::parse(&content, root)
    }

    /// Parse database text. `root` anchors relative entry paths and is the
    /// working directory used for synthesized contexts.
    pub fn parse(content: &str, root: PathBuf) -> Result<Self, ProjectError> {
        let raw: Vec<RawEntry> = serde_json::from_str(content)
            .map_err(|e| ProjectError::ParseError(format!("invalid compile commands: {}", e)))?;

        let mut entries = HashMap::new();
        for entry in raw {
            let directory = absolutize(&root, Path::new(&entry.directory));
            let file = absolutize(&directory, Path::new(&entry.file));
            let arguments = match (entry.arguments, entry.command) {
                (Some(args), _) if !args.is_empty() => args,
                (_, Some(cmd)) => split_command_line(&cmd),
                _ => continue,
            };
            if arguments.is_empty() {
                continue;
            }
            entries.insert(file, CompileContext { directory, arguments });
        }

        tracing::debug!("loaded {} compile commands under {:?}", entries.len(), root);
        Ok(Self { root, entries })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered compile command for a file, if the database has one.
    pub fn lookup(&self, file: &Path) -> Option<CompileContext> {
        let key = absolutize(&self.root, file);
        self.entries.get(&key).cloned()
    }
}

fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Split a `command` string into argv words, honoring quotes and
/// backslash escapes the way compile databases produced by CMake use them.
fn split_command_line(command: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = command.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                } else if c == '\\' && q == '"' {
                    match chars.next() {
                        Some(escaped) => current.push(escaped),
                        None => current.push('\\'),
                    }
                } else {
                    current.push(c);
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    in_word = true;
                }
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        current.push(escaped);
                    }
                    in_word = true;
                }
                c if c.is_whitespace() => {
                    if in_word {
                        words.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                c => {
                    current.push(c);
                    in_word = true;
                }
            },
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {
            "directory": "/proj/build",
            "file": "../src/main.c",
            "command": "cc -DDEBUG=1 -I../include -c ../src/main.c"
        },
        {
            "directory": "/proj/build",
            "file": "/proj/src/util.c",
            "arguments": ["cc", "-O2", "-c", "/proj/src/util.c"]
        }
    ]"#;

    #[test]
    fn parse_resolves_relative_files() {
        let index = CompileCommandIndex::parse(SAMPLE, PathBuf::from("/proj")).unwrap();
        assert_eq!(index.len(), 2);
        let ctx = index.lookup(Path::new("/proj/build/../src/main.c")).unwrap();
        assert_eq!(ctx.directory, PathBuf::from("/proj/build"));
        assert_eq!(ctx.arguments[0], "cc");
        assert!(ctx.arguments.contains(&"-DDEBUG=1".to_string()));
    }

    #[test]
    fn arguments_form_wins_over_command() {
        let index = CompileCommandIndex::parse(SAMPLE, PathBuf::from("/proj")).unwrap();
        let ctx = index.lookup(Path::new("/proj/src/util.c")).unwrap();
        assert_eq!(ctx.arguments, vec!["cc", "-O2", "-c", "/proj/src/util.c"]);
    }

    #[test]
    fn lookup_unknown_file_is_none() {
        let index = CompileCommandIndex::parse(SAMPLE, PathBuf::from("/proj")).unwrap();
        assert!(index.lookup(Path::new("/proj/src/missing.c")).is_none());
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = CompileCommandIndex::parse("not json", PathBuf::from("/proj")).unwrap_err();
        assert!(matches!(err, ProjectError::ParseError(_)));
    }

    #[test]
    fn split_command_line_handles_quotes() {
        assert_eq!(
            split_command_line(r#"cc -DNAME="two words" 'single quoted' plain"#),
            vec!["cc", "-DNAME=two words", "single quoted", "plain"]
        );
    }

    #[test]
    fn split_command_line_handles_escapes() {
        assert_eq!(
            split_command_line(r#"cc -DPATH=with\ space"#),
            vec!["cc", "-DPATH=with space"]
        );
    }

    #[test]
    fn synthesize_builds_argv_from_target() {
        let target = TargetInfo {
            name: "app".to_string(),
            output_path: "/proj/build/app".to_string(),
            compile_definitions: vec!["DEBUG=1".to_string()],
            compile_options: vec!["-O0".to_string()],
            include_directories: vec!["/proj/include".to_string()],
        };
        let ctx = CompileContext::synthesize(
            Path::new("/proj/src/new.c"),
            Path::new("/proj/build"),
            &target,
        );
        assert_eq!(ctx.directory, PathBuf::from("/proj/build"));
        assert_eq!(
            ctx.arguments,
            vec![
                "cc",
                "-O0",
                "-DDEBUG=1",
                "-I/proj/include",
                "-c",
                "/proj/src/new.c"
            ]
        );
    }
}
