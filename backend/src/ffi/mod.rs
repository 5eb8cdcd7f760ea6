//! Python bindings
//!
//! Exposes the ledger to a Python-driven land-use simulation. Only built
//! with the `pyo3` feature.

pub mod account;
