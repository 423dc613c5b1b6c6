use std::{
    path::Path,
    sync::atomic::{AtomicU32, Ordering},
};

use anyhow::{anyhow, Context};
use tracing::{instrument, trace};

use crate::{
    cgroup_manager::LimitedProcess,
    configuration::{memory_limit_bytes, Configuration, IsolationMode},
    program::Program,
};

/// Where the artifact is mounted inside a container.
const CONTAINER_PROGRAM_PATH: &str = "/app/program";

/// Turns a [`Program`] into a running process, optionally isolated.
#[derive(Debug, Clone)]
pub struct Launcher {
    isolation: IsolationMode,
    python: String,
    script_image: String,
    native_image: String,
    memory_limit_mb: Option<u64>,
}

impl Launcher {
    pub fn from_config(config: &Configuration) -> Self {
        Self {
            isolation: config.isolation,
            python: config.python.clone(),
            script_image: config.script_image.clone(),
            native_image: config.native_image.clone(),
            memory_limit_mb: config.memory_limit_mb,
        }
    }

    #[instrument(skip_all, fields(program = %program.name, isolation = ?self.isolation))]
    pub fn launch(&self, program: &Program) -> anyhow::Result<LimitedProcess> {
        match self.isolation {
            IsolationMode::None => {
                let (command, args) = self.host_command(program)?;
                trace!(command, ?args);
                LimitedProcess::launch_without_container(&command, &args)
            }
            IsolationMode::Cgroup => {
                let (command, args) = self.host_command(program)?;
                let max_memory = match self.memory_limit_mb {
                    Some(mb) => memory_limit_bytes(mb)
                        .with_context(|| format!("memory limit of {mb} MB is too large"))?,
                    None => 0,
                };
                trace!(command, ?args, max_memory);
                LimitedProcess::launch(&command, &args, max_memory)
            }
            IsolationMode::Docker => {
                let (name, args) = self.container_command(program)?;
                trace!(name, ?args);
                LimitedProcess::launch_in_container("docker", &args, name)
            }
        }
    }

    fn host_command(&self, program: &Program) -> anyhow::Result<(String, Vec<String>)> {
        let path = path_string(program.path())?;
        if !program.path().is_file() {
            return Err(anyhow!("'{path}' is not a file"));
        }
        Ok(if program.is_script() {
            let mut args = vec![path];
            args.extend(program.args.iter().cloned());
            (self.python.clone(), args)
        } else {
            (path, program.args.clone())
        })
    }

    fn container_command(&self, program: &Program) -> anyhow::Result<(String, Vec<String>)> {
        static COUNTER: AtomicU32 = AtomicU32::new(1);

        let absolute = program
            .path()
            .canonicalize()
            .with_context(|| format!("artifact '{}' not found", program.path().display()))?;
        let absolute = path_string(&absolute)?;
        let name = format!(
            "pick-arena-{}-{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        );

        let mut args = [
            "run",
            "--rm",
            "-i",
            "--init",
            "--network",
            "none",
            "--name",
        ]
        .map(str::to_owned)
        .to_vec();
        args.push(name.clone());
        args.push("-v".to_owned());
        args.push(format!("{absolute}:{CONTAINER_PROGRAM_PATH}:ro"));
        if program.is_script() {
            args.push(self.script_image.clone());
            args.push("python".to_owned());
        } else {
            args.push(self.native_image.clone());
        }
        args.push(CONTAINER_PROGRAM_PATH.to_owned());
        args.extend(program.args.iter().cloned());
        Ok((name, args))
    }
}

fn path_string(path: &Path) -> anyhow::Result<String> {
    path.to_str()
        .map(str::to_owned)
        .ok_or_else(|| anyhow!("path is not a valid string: {path:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_command_is_isolated() {
        let launcher = Launcher::from_config(&Configuration::new());
        // the test binary itself is a convenient existing file
        let exe = std::env::current_exe().unwrap();
        let program = Program::from_path(&exe).with_args(["fixed", "2"]);
        let (name, args) = launcher.container_command(&program).unwrap();

        assert!(name.starts_with("pick-arena-"));
        let joined = args.join(" ");
        assert!(joined.starts_with("run --rm -i --init --network none --name pick-arena-"));
        assert!(joined.contains(":/app/program:ro ubuntu:latest /app/program fixed 2"));
    }

    #[test]
    fn scripts_run_through_the_interpreter() {
        let launcher = Launcher::from_config(&Configuration::new().with_python("python3.12"));
        let dir = std::env::temp_dir().join(format!("pick-arena-launcher-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let script = dir.join("bot.py");
        std::fs::write(&script, "print(1)\n").unwrap();

        let (command, args) = launcher.host_command(&Program::from_path(&script)).unwrap();
        assert_eq!(command, "python3.12");
        assert_eq!(args, vec![script.to_str().unwrap().to_owned()]);

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn oversized_memory_limit_is_refused_before_launch() {
        let launcher = Launcher::from_config(
            &Configuration::new()
                .with_isolation(IsolationMode::Cgroup)
                .with_memory_limit_mb(Some(u64::MAX)),
        );
        let exe = std::env::current_exe().unwrap();
        let err = launcher.launch(&Program::from_path(exe)).unwrap_err();
        assert!(err.to_string().contains("too large"), "{err:#}");
    }

    #[test]
    fn missing_artifact_is_an_error() {
        let launcher = Launcher::from_config(&Configuration::new());
        assert!(launcher
            .launch(&Program::from_path("/no/such/program"))
            .is_err());
    }
}
