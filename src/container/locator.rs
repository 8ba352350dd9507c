// containerdbtool/src/container/locator.rs
use tracing::{debug, info};

use super::{ContainerRef, Docker};
use crate::errors::{AppError, NotFoundKind, Result};

/// Keeps the containers whose image name contains `hint`, ignoring case.
pub fn filter_by_image(containers: Vec<ContainerRef>, hint: &str) -> Vec<ContainerRef> {
    let hint = hint.to_lowercase();
    containers
        .into_iter()
        .filter(|c| c.image.to_lowercase().contains(&hint))
        .collect()
}

/// Zero candidates is `NotFound`, one is returned, more are `Ambiguous`.
pub fn select_single(mut candidates: Vec<ContainerRef>, hint: &str) -> Result<ContainerRef> {
    match candidates.len() {
        0 => Err(AppError::NotFound {
            kind: NotFoundKind::Container,
            name: format!("image matching '{}'", hint),
        }),
        1 => Ok(candidates.remove(0)),
        _ => Err(AppError::Ambiguous {
            hint: hint.to_string(),
            candidates,
        }),
    }
}

/// Locates the single running container whose image matches `hint`.
///
/// Without a hint every running container is a candidate.
pub async fn locate_by_hint(docker: &Docker, hint: Option<&str>) -> Result<ContainerRef> {
    let running = docker.list_running().await?;
    debug!(count = running.len(), "listed running containers");

    let (candidates, hint) = match hint {
        Some(hint) => (filter_by_image(running, hint), hint),
        None => (running, "*"),
    };
    let container = select_single(candidates, hint)?;
    info!(container = %container.name, "located container by image");
    Ok(container)
}

/// Resolves an explicit container name or id, falling back to
/// `default_name`, and checks that it is running. No fuzzy matching.
pub async fn locate_explicit(
    docker: &Docker,
    explicit: Option<&str>,
    default_name: &str,
) -> Result<ContainerRef> {
    let wanted = explicit.unwrap_or(default_name);
    match docker.inspect_running(wanted).await? {
        Some(container) => {
            info!(container = %container.name, "using container");
            Ok(container)
        }
        None => Err(AppError::NotFound {
            kind: NotFoundKind::Container,
            name: wanted.to_string(),
        }),
    }
}
