//! Platform helpers for the client tasks.

pub mod task_pin;
