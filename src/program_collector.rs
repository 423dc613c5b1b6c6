//! Listing of accepted submissions, the on-disk program pool.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use tracing::{info, instrument, warn};

use crate::program::Program;

/// The directories holding accepted submissions.
///
/// Pool membership is derived from the filesystem every time [`ProgramStore::collect_programs`]
/// is called; there is no other index.
#[derive(Debug, Clone)]
pub struct ProgramStore {
    script_dir: PathBuf,
    native_dir: PathBuf,
}

impl ProgramStore {
    pub fn new(script_dir: impl Into<PathBuf>, native_dir: impl Into<PathBuf>) -> Self {
        Self {
            script_dir: script_dir.into(),
            native_dir: native_dir.into(),
        }
    }

    /// Read `ARENA_SCRIPT_DIR` and `ARENA_NATIVE_DIR`, defaulting to `./python-submissions` and
    /// `./executable-submissions`.
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("ARENA_SCRIPT_DIR").unwrap_or_else(|_| "./python-submissions".into()),
            std::env::var("ARENA_NATIVE_DIR")
                .unwrap_or_else(|_| "./executable-submissions".into()),
        )
    }

    /// Every accepted program, sorted by name.
    ///
    /// Scripts are the `.py` files of the script directory, except `.temp.py` ones. Native
    /// programs are the files of the native directory, except `.temp` ones. A missing directory
    /// contributes nothing.
    #[instrument]
    pub fn collect_programs(&self) -> anyhow::Result<Vec<Program>> {
        let mut programs = collect_dir(&self.script_dir, |name| {
            name.ends_with(".py") && !name.ends_with(".temp.py")
        })?;
        programs.extend(collect_dir(&self.native_dir, |name| !name.ends_with(".temp"))?);
        programs.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
        info!(programs = ?programs.iter().map(|p| &p.name).collect::<Vec<_>>());
        Ok(programs)
    }
}

fn collect_dir(dir: &Path, accept: impl Fn(&str) -> bool) -> anyhow::Result<Vec<Program>> {
    if !dir.exists() {
        warn!("'{}' does not exist, no program collected from it", dir.display());
        return Ok(vec![]);
    }

    let entries =
        fs::read_dir(dir).with_context(|| format!("could not list '{}'", dir.display()))?;

    let mut programs = vec![];
    for entry in entries {
        let Ok(entry) = entry else {
            warn!("one entry cannot be read in '{}'", dir.display());
            continue;
        };
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            warn!("name error: {:?}", entry.file_name());
            continue;
        };
        if accept(&name) {
            programs.push(Program::from_path(entry.path()));
        }
    }
    Ok(programs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::ProgramKind;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pick-arena-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn lists_accepted_artifacts_only() {
        let scripts = temp_dir("scripts");
        let natives = temp_dir("natives");
        for name in ["b.py", "a.py", "pending.temp.py", "notes.txt"] {
            fs::write(scripts.join(name), "").unwrap();
        }
        for name in ["c", "d.temp"] {
            fs::write(natives.join(name), "").unwrap();
        }
        fs::create_dir_all(natives.join("subdir")).unwrap();

        let store = ProgramStore::new(&scripts, &natives);
        let programs = store.collect_programs().unwrap();
        let names = programs.iter().map(|p| p.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(programs[0].kind, ProgramKind::Script);
        assert_eq!(programs[2].kind, ProgramKind::Native);

        fs::remove_dir_all(scripts).unwrap();
        fs::remove_dir_all(natives).unwrap();
    }

    #[test]
    fn missing_directories_are_empty() {
        let store = ProgramStore::new("/definitely/not/here", "/nor/here");
        assert!(store.collect_programs().unwrap().is_empty());
    }
}
