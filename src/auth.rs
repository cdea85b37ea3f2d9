// Access gate
// Pre-dispatch step that either lets every request through or validates and
// meters the API key carried in a request header.

use axum::http::{HeaderMap, HeaderName};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::{
    error::{ApiError, ApiResult},
    store::ApiKeyStore,
};

/// Outcome of a successful pass through the gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// No key was presented, or gating is off
    Anonymous,
    /// Key accepted; `usage` is the counter after this request
    Metered { owner_id: String, usage: i64 },
}

#[derive(Clone)]
pub enum AccessGate {
    /// Every request passes
    Open,
    /// Requests carrying a key are validated and counted against a quota
    Metered(KeyMeter),
}

#[derive(Clone)]
pub struct KeyMeter {
    keys: Arc<dyn ApiKeyStore>,
    header: HeaderName,
    quota: i64,
}

impl AccessGate {
    pub fn metered(keys: Arc<dyn ApiKeyStore>, header: HeaderName, quota: i64) -> Self {
        AccessGate::Metered(KeyMeter { keys, header, quota })
    }

    /// Header name the gate reads, if any
    pub fn header_name(&self) -> Option<&HeaderName> {
        match self {
            AccessGate::Open => None,
            AccessGate::Metered(meter) => Some(&meter.header),
        }
    }

    pub async fn check(&self, headers: &HeaderMap) -> ApiResult<Access> {
        match self {
            AccessGate::Open => Ok(Access::Anonymous),
            AccessGate::Metered(meter) => meter.check(headers).await,
        }
    }
}

impl KeyMeter {
    async fn check(&self, headers: &HeaderMap) -> ApiResult<Access> {
        let Some(value) = headers.get(&self.header) else {
            return Ok(Access::Anonymous);
        };

        // A header that is not visible ASCII cannot match any stored key
        let key = value.to_str().map_err(|_| ApiError::InvalidApiKey)?;

        let record = self
            .keys
            .find_by_key(key)
            .await
            .map_err(|e| internal_fault("lookup", e))?
            .ok_or(ApiError::InvalidApiKey)?;

        if record.is_exhausted(self.quota) {
            info!("API key of owner {} is over quota ({} uses)", record.owner_id, record.usage);
            return Err(ApiError::QuotaExceeded { quota: self.quota });
        }

        let usage = match self.keys.increment_usage(&record, self.quota).await {
            Ok(usage) => usage,
            Err(ApiError::QuotaExceeded { quota }) => {
                info!("API key of owner {} reached its quota concurrently", record.owner_id);
                return Err(ApiError::QuotaExceeded { quota });
            }
            Err(e) => return Err(internal_fault("transaction", e)),
        };

        debug!("API key of owner {} used {}/{} times", record.owner_id, usage, self.quota);
        Ok(Access::Metered {
            owner_id: record.owner_id,
            usage,
        })
    }
}

/// Any storage fault while gating becomes a 500
fn internal_fault(stage: &str, err: ApiError) -> ApiError {
    error!("API key {} failed: {}", stage, err);
    match err {
        ApiError::Database(_) | ApiError::Internal(_) => err,
        other => ApiError::Internal(anyhow::anyhow!("API key {} failed: {}", stage, other)),
    }
}
