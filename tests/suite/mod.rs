//! Integration test modules

mod cli;
mod concurrency;
mod scenario;
mod store_failures;
