//! Creation and teardown of participant processes.
//!
//! Every process gets its three standard streams piped. It can be launched directly, inside a
//! network-less container (through the `docker` CLI), or inside a dedicated cgroup on Linux.

#[cfg(target_os = "linux")]
mod cgroup_manager_linux;

#[cfg(target_os = "linux")]
pub use cgroup_manager_linux::*;

#[cfg(not(target_os = "linux"))]
mod cgroup_manager_stub;

#[cfg(not(target_os = "linux"))]
pub use cgroup_manager_stub::*;

use std::{
    process::{Child, Command, ExitStatus, Stdio},
    time::Duration,
};

use anyhow::Context;
use tracing::{debug, warn};

/// Maximum number of pids inside a participant cgroup.
const MAX_PIDS: i64 = 100;

/// How long a killed cgroup may take to empty itself.
const CLEANUP_DURATION: Duration = Duration::from_millis(100);

fn create_process(command: &str, args: &[String]) -> anyhow::Result<Child> {
    Command::new(command)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("command '{command}' not found"))
}

/// Ask the container runtime to kill `name`. Never waits for it.
fn kill_container(name: &str) {
    let spawned = Command::new("docker")
        .args(["kill", name])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
    match spawned {
        Ok(mut child) => {
            std::thread::spawn(move || {
                let _ = child.wait();
            });
        }
        Err(e) => debug!("could not run 'docker kill {name}': {e}"),
    }
}

/// A participant process, killed on drop.
#[derive(Debug)]
pub struct LimitedProcess {
    pub child: Child,
    cgroup: Option<LimitedCgroup>,
    container: Option<String>,
    cleaned_up: bool,
}

impl LimitedProcess {
    /// Launch `command` inside a fresh cgroup.
    ///
    /// * `max_memory` - Maximum available memory in Bytes. Non-positive means no restriction.
    pub fn launch(command: &str, args: &[String], max_memory: i64) -> anyhow::Result<LimitedProcess> {
        let cgroup = LimitedCgroup::create(max_memory, MAX_PIDS).context("could not create cgroup")?;
        let mut child = match create_process(command, args) {
            Ok(child) => child,
            Err(e) => {
                cgroup.delete();
                return Err(e.context("could not create process in cgroup"));
            }
        };
        if let Err(e) = cgroup.add_process(&child) {
            let kill = child.kill();
            let _ = child.wait();
            cgroup.delete();
            return Err(match kill {
                Ok(()) => e.context("could not add process to cgroup"),
                Err(err) => e.context(format!(
                    "could not add process to cgroup, and process could not be killed either ({err})"
                )),
            });
        }

        Ok(LimitedProcess {
            child,
            cgroup: Some(cgroup),
            container: None,
            cleaned_up: false,
        })
    }

    pub fn launch_without_container(command: &str, args: &[String]) -> anyhow::Result<LimitedProcess> {
        let child = create_process(command, args).context("could not create process")?;

        Ok(LimitedProcess {
            child,
            cgroup: None,
            container: None,
            cleaned_up: false,
        })
    }

    /// Launch a container runtime client. `container_name` must be the name given to the
    /// container on the command line, so that it can be killed on teardown.
    pub fn launch_in_container(
        command: &str,
        args: &[String],
        container_name: String,
    ) -> anyhow::Result<LimitedProcess> {
        let child = create_process(command, args).context("could not start container")?;

        Ok(LimitedProcess {
            child,
            cgroup: None,
            container: Some(container_name),
            cleaned_up: false,
        })
    }

    /// Exit status if the process already exited.
    pub fn try_wait(&mut self) -> Option<ExitStatus> {
        self.child.try_wait().ok().flatten()
    }

    /// Kill the process (and its container or cgroup). Calling it again does nothing.
    pub fn try_kill(&mut self) -> anyhow::Result<()> {
        if self.cleaned_up {
            return Ok(());
        }
        self.cleaned_up = true;

        if let Some(name) = self.container.take() {
            kill_container(&name);
        }

        let killed = match self.cgroup.take() {
            Some(cgroup) => {
                let res = cgroup.kill(self.child.id(), CLEANUP_DURATION);
                // at this point the process is dead or unkillable, the cgroup is removed either way
                cgroup.delete();
                res
            }
            None => Ok(()),
        };

        let direct = if self.try_wait().is_none() {
            self.child.kill().context("could not kill process")
        } else {
            Ok(())
        };
        // reap, the process was sent SIGKILL
        let _ = self.child.wait();

        killed.and(direct)
    }
}

impl Drop for LimitedProcess {
    fn drop(&mut self) {
        if let Err(e) = self.try_kill() {
            warn!("could not kill process {} on drop: {e:#}", self.child.id());
        }
    }
}
