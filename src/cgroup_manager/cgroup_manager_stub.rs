use std::{process::Child, time::Duration};

use anyhow::bail;

/// Cgroups do not exist here: no value of this type can be built.
#[derive(Debug)]
pub enum LimitedCgroup {}

impl LimitedCgroup {
    pub fn create(_max_memory: i64, _max_pids: i64) -> anyhow::Result<LimitedCgroup> {
        bail!("cgroups only available on linux")
    }

    pub fn add_process(&self, _child: &Child) -> anyhow::Result<()> {
        match *self {}
    }

    pub fn kill(&self, _pid: u32, _max_duration: Duration) -> anyhow::Result<()> {
        match *self {}
    }

    pub fn delete(&self) {
        match *self {}
    }
}
