use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const USER_AGENT: &str = concat!("power_terminal/", env!("CARGO_PKG_VERSION"));
const ACCEPT_TABLE: &str = "text/csv, text/plain;q=0.9, */*;q=0.1";

static CLIENT: OnceCell<Client> = OnceCell::new();

/// Shared blocking client for player table downloads.
pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_TABLE));
        Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .context("build player table http client")
    })
}
