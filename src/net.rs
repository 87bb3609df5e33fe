// src/net.rs
//
// One authenticated HTTP context per run. All outbound traffic funnels
// through `Session`, which owns the cookie-keeping agent and applies the
// retry/backoff policy for page fetches.

use std::fmt::Display;
use std::io::Read;
use std::thread;
use std::time::Duration;

use log::{debug, warn};

use crate::config::consts::{
    FETCH_BACKOFF_BASE_MS, FETCH_BACKOFF_TOTAL_MS, FETCH_MAX_TRIES, REQUEST_TIMEOUT_SECS,
    USER_AGENT,
};
use crate::error::EnhanceError;

/// Abstraction the orchestrator fetches pages through. `Session` is the
/// real implementation; tests substitute counting stubs.
pub trait PageFetcher {
    fn get(&mut self, url: &str) -> Result<String, EnhanceError>;
}

/// Authenticated HTTP context: cookie jar plus identity headers.
/// Created once by the login flow, read-only for the rest of the run.
pub struct Session {
    agent: ureq::Agent,
    user_agent: String,
    // Cookies imported from an external browser; the agent's own jar only
    // sees cookies set over this session's responses.
    cookie_header: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_user_agent(USER_AGENT)
    }

    pub fn with_user_agent(user_agent: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(user_agent)
            .build();
        Self {
            agent,
            user_agent: user_agent.to_string(),
            cookie_header: None,
        }
    }

    /// Session seeded with cookies captured outside this process
    /// (interactive browser login).
    pub fn with_cookies(user_agent: &str, cookies: &[(String, String)]) -> Self {
        let header = cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        let mut session = Self::with_user_agent(user_agent);
        if !header.is_empty() {
            session.cookie_header = Some(header);
        }
        session
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        let mut req = self
            .agent
            .request(method, url)
            .set("Accept-Language", "en-US");
        if let Some(cookies) = &self.cookie_header {
            req = req.set("Cookie", cookies);
        }
        req
    }

    /// Single GET, no retry. The login flow uses this where a failure should
    /// surface immediately as an auth problem.
    pub fn get_once(&self, url: &str) -> Result<ureq::Response, ureq::Error> {
        self.request("GET", url).call()
    }

    /// GET with retry/backoff, returning the response body.
    pub fn fetch(&self, url: &str) -> Result<String, EnhanceError> {
        let response = with_retry(url, || self.get_once(url))?;
        response
            .into_string()
            .map_err(|e| EnhanceError::Network(format!("reading body of {url}: {e}")))
    }

    /// GET with retry/backoff, returning raw bytes (challenge images).
    pub fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, EnhanceError> {
        let response = with_retry(url, || self.get_once(url))?;
        let mut buf = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut buf)
            .map_err(|e| EnhanceError::Network(format!("reading body of {url}: {e}")))?;
        Ok(buf)
    }

    /// Submit a form with the method the page declared. No retry: form
    /// submissions are not idempotent from the server's point of view.
    pub fn send_form(
        &self,
        method: &str,
        url: &str,
        fields: &[(String, String)],
    ) -> Result<ureq::Response, ureq::Error> {
        let pairs: Vec<(&str, &str)> = fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        self.request(&method.to_ascii_uppercase(), url)
            .send_form(&pairs)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl PageFetcher for Session {
    fn get(&mut self, url: &str) -> Result<String, EnhanceError> {
        self.fetch(url)
    }
}

/// Run `op` until it succeeds, with exponential backoff between attempts.
/// Bounded both by attempt count and by total time slept; whatever error the
/// final attempt produced is escalated as a network failure.
fn with_retry<T, E: Display>(
    url: &str,
    mut op: impl FnMut() -> Result<T, E>,
) -> Result<T, EnhanceError> {
    let total_budget = Duration::from_millis(FETCH_BACKOFF_TOTAL_MS);
    let mut delay = Duration::from_millis(FETCH_BACKOFF_BASE_MS);
    let mut slept = Duration::ZERO;
    for attempt in 1.. {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if attempt < FETCH_MAX_TRIES && slept < total_budget => {
                warn!("attempt {attempt} for {url} failed ({e}), retrying in {delay:?}");
                thread::sleep(delay);
                slept += delay;
                delay *= 2;
            }
            Err(e) => {
                debug!("giving up on {url} after {attempt} attempts");
                return Err(EnhanceError::Network(format!("GET {url}: {e}")));
            }
        }
    }
    unreachable!("retry loop always returns")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_gives_up_after_the_attempt_budget() {
        let mut calls = 0;
        let result: Result<(), _> = with_retry("http://x", || {
            calls += 1;
            Err::<(), _>("boom")
        });
        assert!(matches!(result, Err(EnhanceError::Network(_))));
        assert_eq!(calls, FETCH_MAX_TRIES);
    }

    #[test]
    fn retry_returns_the_first_success() {
        let mut calls = 0;
        let result = with_retry("http://x", || {
            calls += 1;
            if calls < 2 { Err("flaky") } else { Ok(calls) }
        });
        assert_eq!(result.unwrap(), 2);
    }

    #[test]
    fn browser_cookies_become_one_header() {
        let session = Session::with_cookies(
            "ua",
            &[
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
            ],
        );
        assert_eq!(session.cookie_header.as_deref(), Some("a=1; b=2"));
    }
}
