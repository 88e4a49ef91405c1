// SPDX-License-Identifier: MIT

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Storage(#[from] annobatch_storage::StorageError),

    #[error(transparent)]
    Adapter(#[from] annobatch_adapters::AdapterError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("service {service} failed to become healthy after {attempts} attempts")]
    ServiceUnhealthy { service: String, attempts: u32 },

    #[error("file {path} exceeded its retry budget of {max_attempts} attempts")]
    RetryBudgetExhausted { path: String, max_attempts: u32 },

    #[error("scheduler shut down before all files were processed")]
    ShutDownEarly,

    #[error("instance pool is shut down")]
    PoolShutDown,
}
