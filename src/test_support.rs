// containerdbtool/src/test_support.rs
//! A scriptable stand-in for the `docker` CLI used by unit tests.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use tempfile::TempDir;

use crate::container::{ContainerRef, Docker};

const PROBE_ARG: &str = "__probe__";
const ETXTBSY: i32 = 26;

/// Writes a `/bin/sh` script named `docker` into a temporary directory.
///
/// The script appends its arguments to `calls.log` and then runs `body`,
/// which typically is a `case "$1" in ... esac` answering `ps`, `inspect`,
/// `cp` and `exec`.
pub struct FakeDocker {
    dir: TempDir,
    program: PathBuf,
}

impl FakeDocker {
    pub fn new(body: &str) -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let log = dir.path().join("calls.log");
        let program = dir.path().join("docker");
        let script = format!(
            "#!/bin/sh\n[ \"$1\" = \"{PROBE_ARG}\" ] && exit 0\nprintf '%s\\n' \"$*\" >> '{}'\n{}\n",
            log.display(),
            body
        );
        fs::write(&program, script)?;
        fs::set_permissions(&program, fs::Permissions::from_mode(0o755))?;

        // Another test thread may still hold the freshly written file open
        // across a fork; wait until the script is executable.
        for _ in 0..50 {
            match std::process::Command::new(&program).arg(PROBE_ARG).status() {
                Err(e) if e.raw_os_error() == Some(ETXTBSY) => sleep(Duration::from_millis(20)),
                _ => break,
            }
        }

        Ok(Self { dir, program })
    }

    pub fn docker(&self) -> Docker {
        Docker::new(&self.program)
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Every recorded invocation, one space-joined argument list per call.
    pub fn calls(&self) -> anyhow::Result<Vec<String>> {
        let log = self.dir.path().join("calls.log");
        if !log.exists() {
            return Ok(Vec::new());
        }
        Ok(fs::read_to_string(log)?
            .lines()
            .map(str::to_string)
            .collect())
    }
}

pub fn container(name: &str) -> ContainerRef {
    ContainerRef {
        id: format!("{name}-id"),
        name: name.to_string(),
        image: "postgres:16".to_string(),
        status: "running".to_string(),
    }
}
