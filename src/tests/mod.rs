//! Crate-level behavior tests.
//!
//! `client_tests` drives whole calls through a scripted transport;
//! `throughput_tests` checks the admission-rate guarantees of the shared
//! limiter under concurrency. Both run on the paused tokio clock, so
//! every timing assertion is exact rather than tolerance-tuned.
