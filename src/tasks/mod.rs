//! Background Tasks Module
//!
//! Contains background tasks that run periodically while a store is alive.
//!
//! # Tasks
//! - Sweep: Evicts expired cache entries at the configured interval

mod sweeper;

pub(crate) use sweeper::Sweeper;
