//! Row models mirrored from the externally owned store.

pub mod job;
pub mod reference;
