use std::{
    process::Child,
    sync::atomic::{AtomicU32, Ordering},
    time::{Duration, Instant},
};

use anyhow::Context;
use cgroups_rs::Cgroup;

pub fn get_current_user_id() -> anyhow::Result<String> {
    let output = std::process::Command::new("id")
        .arg("-u")
        .output()
        .context("Could not launch 'id -u'")?;
    let stdout = output.stdout;
    let untrimed_id = std::str::from_utf8(&stdout).context("id is not a valid string")?;
    Ok(untrimed_id.trim().to_string())
}

pub fn get_cgroup_path(user_id: &str, group_name: &str) -> String {
    format!("user.slice/user-{user_id}.slice/user@{user_id}.service/{group_name}")
}

/// A cgroup owned by one participant process.
#[derive(Debug)]
pub struct LimitedCgroup {
    cgroup: Cgroup,
}

impl LimitedCgroup {
    /// Create a uniquely named cgroup.
    ///
    /// * `max_memory` - Maximum available memory in Bytes. Non-positive means no restriction.
    /// * `max_pids` - Maximum number of PIDS inside the cgroup at any time. Non-positive means no restriction.
    pub fn create(max_memory: i64, max_pids: i64) -> anyhow::Result<LimitedCgroup> {
        static COUNTER: AtomicU32 = AtomicU32::new(1);
        let user_id = get_current_user_id().context("could not get user id")?;
        let group_name = format!(
            "PICK_ARENA_{}_{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        let path = get_cgroup_path(&user_id, &group_name);

        let mut builder = cgroups_rs::cgroup_builder::CgroupBuilder::new(&path);
        if max_memory > 0 {
            builder = builder.memory().memory_hard_limit(max_memory).done();
        }
        if max_pids > 0 {
            builder = builder
                .pid()
                .maximum_number_of_processes(cgroups_rs::MaxValue::Value(max_pids))
                .done();
        }
        let cgroup = builder
            .build(cgroups_rs::hierarchies::auto())
            .context("could not create cgroup")?;
        Ok(LimitedCgroup { cgroup })
    }

    pub fn add_process(&self, child: &Child) -> anyhow::Result<()> {
        let pid = child.id() as u64;
        self.cgroup
            .add_task_by_tgid(cgroups_rs::CgroupPid { pid })
            .context("could not add process to cgroup")
    }

    /// Kill every member and wait up to `max_duration` for `pid` to leave the cgroup.
    pub fn kill(&self, pid: u32, max_duration: Duration) -> anyhow::Result<()> {
        self.cgroup.kill().context("could not kill cgroup")?;
        let deadline = Instant::now() + max_duration;
        while self.cgroup.tasks().iter().any(|cpid| cpid.pid == pid as u64) {
            if Instant::now() > deadline {
                anyhow::bail!("process cleanup timed out");
            }
            std::thread::sleep(std::cmp::min(Duration::from_millis(10), max_duration / 10));
        }
        Ok(())
    }

    pub fn delete(&self) {
        if let Err(e) = self.cgroup.delete() {
            // Oh well... Whatever...
            tracing::warn!("Failed to remove cgroup. If this happens a lot, it may slow down the computer. {e}");
        }
    }
}
