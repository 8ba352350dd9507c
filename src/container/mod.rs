// containerdbtool/src/container/mod.rs
pub(crate) mod docker;
pub(crate) mod locator;

pub use docker::Docker;

use std::fmt;

/// A running container as reported by the container runtime.
///
/// `id` identifies the instance for the duration of one invocation only; it
/// is never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRef {
    pub id: String,
    pub name: String,
    pub image: String,
    pub status: String,
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {}, {})", self.name, self.image, self.short_id(), self.status)
    }
}

impl ContainerRef {
    /// First 12 characters of the id, as `docker ps` prints it.
    pub fn short_id(&self) -> &str {
        self.id.get(..12).unwrap_or(&self.id)
    }
}
