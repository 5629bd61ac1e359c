//! End-to-end tests for logtally live under `tests/`; this crate has no
//! library code of its own.
