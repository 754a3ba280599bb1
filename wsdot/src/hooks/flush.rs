//! Cache flush date polling.
//!
//! Every API domain exposes a sentinel endpoint returning the time its
//! static data last changed. One task per domain polls it and hands each
//! value to the cache, which invalidates `STATIC` entries when it moves.

use std::fmt;
use std::sync::Weak;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};
use wsdot_define::{ApiMetadata, CacheStrategy, EndpointMeta, NoInput};

use super::cache::CacheInner;
use crate::client::ApiClient;
use crate::endpoint::Endpoint;
use crate::error::ConfigError;

/// Function name used for every domain's flush date endpoint.
pub const CACHE_FLUSH_FUNCTION: &str = "cacheFlushDate";

/// Owns a polling task; aborts it when dropped.
pub(crate) struct FlushWatcher {
    api: String,
    task: JoinHandle<()>,
}

impl fmt::Debug for FlushWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlushWatcher")
            .field("api", &self.api)
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

impl Drop for FlushWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Builds the typed flush date accessor for `api`, if it has one.
///
/// ## Errors
///
/// Returns [`ConfigError`] if the flush path is not a valid template.
pub fn flush_endpoint(api: &ApiMetadata) -> Option<Result<Endpoint<NoInput, DateTime<Utc>>, ConfigError>> {
    let path = api.cache_flush_path.as_ref()?;
    let meta = EndpointMeta::new::<NoInput, DateTime<Utc>>(CACHE_FLUSH_FUNCTION, path.clone())
        .with_description("Time the domain's static data last changed");
    Some(Endpoint::new(api.clone(), CacheStrategy::Static, meta))
}

pub(crate) fn spawn(
    cache: Weak<CacheInner>,
    client: ApiClient,
    api: &ApiMetadata,
    interval: Duration,
) -> Result<FlushWatcher, ConfigError> {
    let endpoint = match flush_endpoint(api) {
        Some(endpoint) => endpoint?,
        None => {
            return Err(ConfigError::UnknownFunction {
                group: api.name.clone(),
                name: CACHE_FLUSH_FUNCTION.to_string(),
            });
        }
    };
    let api_name = api.name.clone();

    let task = tokio::spawn({
        let api_name = api_name.clone();
        async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let result = endpoint.fetch(&client, None).await;
                let Some(cache) = cache.upgrade() else {
                    debug!(api = %api_name, "cache dropped; flush watcher exiting");
                    break;
                };
                cache.evict_idle();
                match result {
                    Ok(date) => {
                        debug!(api = %api_name, %date, "cache flush date polled");
                        cache.record_flush_date(&api_name, date);
                    }
                    Err(err) => {
                        warn!(api = %api_name, error = %err, "cache flush date poll failed");
                    }
                }
            }
        }
    });

    Ok(FlushWatcher {
        api: api_name,
        task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_flush_path_means_no_endpoint() {
        let api = ApiMetadata::new("wsdot-traffic", "https://example.test/traffic");
        assert!(flush_endpoint(&api).is_none());
    }

    #[test]
    fn flush_endpoint_is_typed_as_a_date() {
        let api = ApiMetadata::new("wsf-vessels", "https://example.test/vessels")
            .with_cache_flush_path("/cacheflushdate");
        let endpoint = flush_endpoint(&api).unwrap().unwrap();
        assert_eq!(endpoint.function_name(), CACHE_FLUSH_FUNCTION);
        assert_eq!(endpoint.meta().endpoint, "/cacheflushdate");
    }
}
