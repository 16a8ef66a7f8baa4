//! Vintage resolution: the earliest date a user contributed to a repository.
//!
//! A vintage is computed at most once per (user, repository) pair and then
//! served from a [`VintageStore`]. Computation walks three upstream sources
//! in order (repository metadata, a one-commit probe before creation, weekly
//! contributor statistics) and may defer itself through a [`TaskScheduler`]
//! while statistics are still being generated upstream.

mod db_store;
mod record;
mod resolver;
mod scheduler;
mod store;

pub use db_store::DbVintageStore;
pub use record::{Vintage, VintageKey, VintageRecord, VintageResolution};
pub use resolver::{
    DEFAULT_RETRY_DELAY, DEFAULT_VINTAGE_CONCURRENCY, VintageError, VintageFailure, VintageOptions,
    VintageReport, VintageResolver, VintageStage,
};
pub use scheduler::{
    ComputeVintageTask, DeferredQueue, DeferredTaskWorker, ScheduleError, TaskHandler,
    TaskScheduler, deferred_queue,
};
pub use store::{MemoryVintageStore, VintageStore, VintageStoreError};
