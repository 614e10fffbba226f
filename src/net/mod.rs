// SPDX-License-Identifier: MPL-2.0

mod connectivity;
mod fetch;

pub use connectivity::{Connectivity, probe};
pub use fetch::{Body, Fetch, FormPart, HttpFetcher, PartValue, Request, Response, ResponseSource};
pub use reqwest::{Method, StatusCode};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}
