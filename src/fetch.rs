extern crate reqwest;

use crate::result;

const USER_AGENT: &str = concat!("mbtadash/", env!("CARGO_PKG_VERSION"), " (MBTA arrival board)");

// Anything that can turn a URL into a response body. Tests hand in closures.
pub trait Fetcher {
    fn get(&self, url: &str) -> result::DashResult<String>;
}

impl<F> Fetcher for F where F: Fn(&str) -> result::DashResult<String> {
    fn get(&self, url: &str) -> result::DashResult<String> {
        return self(url);
    }
}

pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: std::time::Duration) -> result::DashResult<HttpFetcher> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        return Ok(HttpFetcher{client: client});
    }
}

impl Fetcher for HttpFetcher {
    fn get(&self, url: &str) -> result::DashResult<String> {
        debug!("Fetching {}", url);
        let response = self.client.get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()?
            .error_for_status()?;
        return Ok(response.text()?);
    }
}
