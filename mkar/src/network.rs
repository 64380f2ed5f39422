//! Fetching NETWORK-prop entries from their recorded URL.
//!
//! Grounded on `oodle_loader`'s use of `ureq` elsewhere in this codebase's
//! dependency stack, generalized here behind a trait object so the unpacker
//! doesn't hard-code a single HTTP client. Download failure is non-fatal:
//! the unpacker falls back to writing the URL text itself, so `fetch`
//! reports success as a `bool` rather than a `Result`.

use std::path::Path;

/// Retrieves the bytes behind a NETWORK entry's URL and writes them to
/// `dest`. Returns `false` on any failure (network error, non-2xx response,
/// write error) so the caller can fall back to writing the URL text.
pub trait Fetcher {
    fn fetch(&mut self, url: &str, dest: &Path) -> bool;
}

/// Never fetches; every NETWORK entry falls back to its URL text.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopFetcher;

impl Fetcher for NoopFetcher {
    fn fetch(&mut self, _url: &str, _dest: &Path) -> bool {
        false
    }
}

#[cfg(feature = "network")]
#[derive(Debug, Clone)]
pub struct UreqFetcher {
    agent: ureq::Agent,
}

#[cfg(feature = "network")]
impl Default for UreqFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "network")]
impl UreqFetcher {
    pub fn new() -> Self {
        let mut builder = ureq::AgentBuilder::new();
        let proxy_url = std::env::var("http_proxy")
            .or_else(|_| std::env::var("HTTP_PROXY"))
            .or_else(|_| std::env::var("https_proxy"))
            .or_else(|_| std::env::var("HTTPS_PROXY"));
        if let Ok(proxy_url) = proxy_url {
            if let Ok(proxy) = ureq::Proxy::new(&proxy_url) {
                builder = builder.proxy(proxy);
            }
        }
        UreqFetcher {
            agent: builder.build(),
        }
    }
}

#[cfg(feature = "network")]
impl Fetcher for UreqFetcher {
    fn fetch(&mut self, url: &str, dest: &Path) -> bool {
        let attempt = || -> Result<(), Box<dyn std::error::Error>> {
            let response = self.agent.get(url).call()?;
            let mut body = Vec::new();
            response.into_reader().read_to_end(&mut body)?;
            std::fs::write(dest, body)?;
            Ok(())
        };
        attempt().is_ok()
    }
}

#[cfg(feature = "network")]
use std::io::Read;
