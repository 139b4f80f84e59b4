//! Client code for the fintrack offline cache.
//!
//! This crate provides the HTTP fetch layer and the cache controller that
//! decides, per request, between the cache generation and the network.

pub mod controller;
pub mod fetch;

pub use controller::{
    CacheController, ControllerConfig, Disposition, InstallReport, PrecacheError, PrecacheItem, Request, RequestMode,
    Source, WorkerState,
};

pub use fetch::{FetchConfig, FetchError, FetchRequest, Fetcher, HttpFetcher};
pub use reqwest::Method;
