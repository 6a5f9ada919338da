use crate::backend::backend::BackendInner;
use crate::backend::clock::{Clock, RealClock};
use crate::backend::options::{BackendOptions, BackendOptionsValidated, OptionsError};
use crate::backend::{Backend, Role};
use crate::instrumentation::InstrumentationHandle;
use crate::persistence::{PersistedDataFactory, PersistenceError};
use crate::tree::TreeLoadError;
use crate::types::Code;
use std::convert::TryFrom;
use std::sync::Arc;

/// Suggests the connection string of the current primary, if one is known.
pub type RedirectProvider = Arc<dyn Fn() -> Option<String> + Send + Sync>;

pub struct BackendConfig {
    pub logger: slog::Logger,
    pub factory: Arc<dyn PersistedDataFactory>,
    pub options: BackendOptions,
    /// Defaults to the system clock.
    pub clock: Option<Arc<dyn Clock>>,
    pub instrumentation: InstrumentationHandle,
    pub redirect: Option<RedirectProvider>,
}

impl BackendConfig {
    pub fn new(logger: slog::Logger, factory: Arc<dyn PersistedDataFactory>) -> Self {
        BackendConfig {
            logger,
            factory,
            options: BackendOptions::default(),
            clock: None,
            instrumentation: None,
            redirect: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackendCreationError {
    #[error("Illegal options for configuring backend: {0}")]
    IllegalOptions(#[from] OptionsError),
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Persistence failure")]
    Persistence(#[from] PersistenceError),
    #[error("Stored records do not form a tree")]
    TreeLoad(#[from] TreeLoadError),
    #[error("Can't move from {from:?} to {to:?}")]
    InvalidTransition { from: Role, to: Role },
    #[error("Backend was stopped and can't be restarted")]
    Terminated,
    #[error("Timed out catching up with the store")]
    CatchUpTimeout,
    #[error("Maintenance transaction failed with {0}")]
    Commit(Code),
}

pub fn try_create_backend(config: BackendConfig) -> Result<Backend, BackendCreationError> {
    let options = BackendOptionsValidated::try_from(config.options)?;
    let clock = config.clock.unwrap_or_else(|| Arc::new(RealClock));

    slog::info!(
        config.logger,
        "Creating backend over store '{}' with {:?}",
        config.factory.core().name(),
        options
    );

    let inner = BackendInner::new(
        config.logger,
        config.factory,
        options,
        clock,
        config.instrumentation,
        config.redirect,
    );

    Ok(Backend::from_inner(Arc::new(inner)))
}
