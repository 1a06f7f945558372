//
// src/proxy/mod.rs
//
mod fetcher;
mod prober;
mod proxy;
mod selector;

pub use fetcher::{with_idle_timeout, BodyStream, FetchError, Fetched, Fetcher, HttpFetcher};
pub use prober::{qualifies, HttpProber, ProbeOutcome, ProbeResult, Prober};
pub use proxy::{Proxy, ProxyError, RemoteAddr};
pub use selector::HostSelector;
