//! Repository implementations over the Postgres store.

pub mod job_repo;
pub mod media_store;

pub use job_repo::{JobRepo, PgJobStore};
pub use media_store::MediaStore;
