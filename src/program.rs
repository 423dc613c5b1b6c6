//! Participant programs.

use std::{
    fmt,
    hash::Hash,
    path::{Path, PathBuf},
};

/// How a program is run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    /// Interpreted python script.
    Script,
    /// Native executable.
    Native,
}

/// An accepted (or candidate) participant program.
#[derive(Debug, Clone)]
pub struct Program {
    /// Display name. Several programs may share it.
    pub name: String,
    /// Path to the artifact.
    pub path: PathBuf,
    /// How the artifact is run.
    pub kind: ProgramKind,
    /// Extra arguments given to the program after its path.
    pub args: Vec<String>,
}

impl PartialEq for Program {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.path == other.path && self.args == other.args
    }
}

impl Eq for Program {}

impl Hash for Program {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.path.hash(state);
        self.args.hash(state);
    }
}

impl Program {
    /// Build a program from its artifact path. `.py` files are scripts, anything else is native.
    ///
    /// The name is the file name without its `.py` suffix.
    pub fn from_path(path: impl Into<PathBuf>) -> Program {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let (name, kind) = match file_name.strip_suffix(".py") {
            Some(stem) => (stem.to_owned(), ProgramKind::Script),
            None => (file_name, ProgramKind::Native),
        };
        Program {
            name,
            path,
            kind,
            args: vec![],
        }
    }

    /// Same program with another display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Program {
        self.name = name.into();
        self
    }

    /// Same program with extra arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Program
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_script(&self) -> bool {
        self.kind == ProgramKind::Script
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
