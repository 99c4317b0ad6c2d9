use crate::config::CompanionConfig;
use crate::violation::CompanionError;
use std::thread::{Builder, JoinHandle};

/// Spawn `body` on a thread named and sized per `config`.
pub(crate) fn spawn_named<F>(
    config: &CompanionConfig,
    body: F,
) -> Result<JoinHandle<()>, CompanionError>
where
    F: FnOnce() + Send + 'static,
{
    let mut builder = Builder::new().name(config.thread_name().to_owned());

    if let Some(bytes) = config.stack_size() {
        builder = builder.stack_size(bytes);
    }

    builder.spawn(body).map_err(|source| CompanionError::Spawn {
        name: config.thread_name().to_owned(),
        source,
    })
}
