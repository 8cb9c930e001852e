//! Admission layer: credential validation, permissions, rate limiting.
//!
//! Credentials are static records loaded at process start (TOML file plus
//! demo keys outside production) and treated as read-only afterwards.
//! Validation results — positive and negative — are cached for five minutes
//! keyed by a SHA-256 hash of the credential, so the hot path never touches
//! the credential table. The same hash identifies the caller's rate-limit
//! bucket.

pub mod rate_limit;

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{ServiceError, ServiceResult};
use rate_limit::{FallbackLimiter, LimitOutcome};

/// Validation cache TTL (5 minutes).
const CACHE_TTL: Duration = Duration::from_secs(300);

/// Permission levels a credential may carry. Admin implies everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
    Admin,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Admin => "admin",
        }
    }
}

/// Static credential record, read-only during operation.
#[derive(Debug, Clone, Deserialize)]
pub struct Credential {
    pub display_name: String,
    pub permissions: HashSet<Permission>,
    /// Per-minute limit; falls back to the service default when absent.
    #[serde(default)]
    pub rate_limit_per_minute: Option<u32>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl Credential {
    pub fn grants(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission) || self.permissions.contains(&Permission::Admin)
    }
}

/// TOML file shape for credential records.
#[derive(Debug, Deserialize)]
struct CredentialFile {
    #[serde(rename = "credential", default)]
    credentials: Vec<CredentialEntry>,
}

#[derive(Debug, Deserialize)]
struct CredentialEntry {
    key: String,
    #[serde(flatten)]
    credential: Credential,
}

/// Read-only credential table keyed by the opaque API key.
#[derive(Debug, Default)]
pub struct CredentialStore {
    records: HashMap<String, Credential>,
}

impl CredentialStore {
    /// Load credentials: optional TOML file, plus demo keys when the
    /// environment installs them.
    pub fn load(path: Option<&str>, install_demo_keys: bool) -> anyhow::Result<Self> {
        let mut records = HashMap::new();

        if install_demo_keys {
            records.insert(
                "heatguard-api-key-demo-12345".to_string(),
                Credential {
                    display_name: "Demo API Key".to_string(),
                    permissions: [Permission::Read, Permission::Write, Permission::Admin]
                        .into_iter()
                        .collect(),
                    rate_limit_per_minute: Some(1000),
                    active: true,
                    expires_at: None,
                },
            );
            records.insert(
                "heatguard-readonly-key-67890".to_string(),
                Credential {
                    display_name: "Read-Only API Key".to_string(),
                    permissions: [Permission::Read].into_iter().collect(),
                    rate_limit_per_minute: Some(500),
                    active: true,
                    expires_at: None,
                },
            );
        }

        if let Some(path) = path {
            let raw = std::fs::read_to_string(path)?;
            let file: CredentialFile = toml::from_str(&raw)?;
            for entry in file.credentials {
                records.insert(entry.key, entry.credential);
            }
        }

        info!(credentials = records.len(), "Loaded API credential table");
        Ok(Self { records })
    }

    pub fn get(&self, key: &str) -> Option<&Credential> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Identity attached to an admitted request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// SHA-256 hex of the presented credential; used for cache and
    /// rate-limit keys, never logged alongside the raw key.
    pub credential_hash: String,
    pub display_name: String,
    pub permissions: HashSet<Permission>,
    pub rate_limit_per_minute: u32,
}

impl AuthContext {
    pub fn grants(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission) || self.permissions.contains(&Permission::Admin)
    }
}

/// Cached validation outcome; negative results cache too.
enum CacheEntry {
    Valid(AuthContext),
    Invalid(String),
}

struct TimedEntry {
    entry: CacheEntry,
    cached_at: Instant,
}

/// Rate-limit counters surfaced as response headers.
#[derive(Debug, Clone, Copy)]
pub struct RateStatus {
    pub limit: u32,
    pub remaining: u32,
    pub reset_epoch_secs: i64,
}

/// Front door for every authenticated request.
pub struct AdmissionController {
    store: CredentialStore,
    cache: Mutex<HashMap<String, TimedEntry>>,
    limiter: FallbackLimiter,
    default_rate_limit: u32,
}

impl AdmissionController {
    pub fn new(store: CredentialStore, limiter: FallbackLimiter, default_rate_limit: u32) -> Self {
        Self { store, cache: Mutex::new(HashMap::new()), limiter, default_rate_limit }
    }

    /// SHA-256 hex digest of a credential.
    pub fn hash_credential(key: &str) -> String {
        let digest = Sha256::digest(key.as_bytes());
        format!("{digest:x}")
    }

    /// Validate a presented credential, consulting the cache first.
    pub fn validate(&self, presented: Option<&str>) -> ServiceResult<AuthContext> {
        let key = presented
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ServiceError::Unauthenticated("API key is required".into()))?;

        let hash = Self::hash_credential(key);

        if let Ok(cache) = self.cache.lock() {
            if let Some(timed) = cache.get(&hash) {
                if timed.cached_at.elapsed() < CACHE_TTL {
                    return match &timed.entry {
                        CacheEntry::Valid(ctx) => Ok(ctx.clone()),
                        CacheEntry::Invalid(reason) => {
                            Err(ServiceError::Unauthenticated(reason.clone()))
                        }
                    };
                }
            }
        }

        let outcome = self.validate_uncached(key, &hash);
        let entry = match &outcome {
            Ok(ctx) => CacheEntry::Valid(ctx.clone()),
            Err(ServiceError::Unauthenticated(reason)) => CacheEntry::Invalid(reason.clone()),
            Err(err) => CacheEntry::Invalid(err.to_string()),
        };
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(hash, TimedEntry { entry, cached_at: Instant::now() });
        }
        outcome
    }

    fn validate_uncached(&self, key: &str, hash: &str) -> ServiceResult<AuthContext> {
        let credential = self
            .store
            .get(key)
            .ok_or_else(|| ServiceError::Unauthenticated("Invalid API key".into()))?;

        if !credential.active {
            return Err(ServiceError::Unauthenticated("API key is deactivated".into()));
        }
        if let Some(expires_at) = credential.expires_at {
            if Utc::now() > expires_at {
                return Err(ServiceError::Unauthenticated("API key has expired".into()));
            }
        }

        debug!(name = %credential.display_name, "API key validated");
        Ok(AuthContext {
            credential_hash: hash.to_string(),
            display_name: credential.display_name.clone(),
            permissions: credential.permissions.clone(),
            rate_limit_per_minute: credential
                .rate_limit_per_minute
                .unwrap_or(self.default_rate_limit),
        })
    }

    /// Demand a permission from a validated context.
    pub fn require_permission(
        &self,
        ctx: &AuthContext,
        permission: Permission,
    ) -> ServiceResult<()> {
        if ctx.grants(permission) {
            Ok(())
        } else {
            warn!(
                name = %ctx.display_name,
                permission = permission.as_str(),
                "Permission denied"
            );
            Err(ServiceError::Forbidden(permission.as_str().to_string()))
        }
    }

    /// Consume one slot of the caller's sliding window.
    pub async fn check_rate_limit(&self, ctx: &AuthContext) -> ServiceResult<RateStatus> {
        let outcome = self
            .limiter
            .check(&ctx.credential_hash, ctx.rate_limit_per_minute)
            .await
            .map_err(|err| ServiceError::Internal(format!("rate limiter failure: {err}")))?;

        match outcome {
            LimitOutcome::Allowed { limit, remaining, reset_epoch_secs } => {
                Ok(RateStatus { limit, remaining, reset_epoch_secs })
            }
            LimitOutcome::Limited { limit, reset_epoch_secs } => {
                warn!(name = %ctx.display_name, limit, "Rate limit exceeded");
                Err(ServiceError::RateLimited { limit, reset_epoch_secs })
            }
        }
    }

    /// Full admission flow: credential, permission, rate limit.
    pub async fn admit(
        &self,
        presented: Option<&str>,
        permission: Permission,
    ) -> ServiceResult<(AuthContext, RateStatus)> {
        let ctx = self.validate(presented)?;
        self.require_permission(&ctx, permission)?;
        let status = self.check_rate_limit(&ctx).await?;
        Ok((ctx, status))
    }

    /// Whether the shared rate-limit store is active.
    pub fn uses_shared_store(&self) -> bool {
        self.limiter.has_shared_store()
    }

    /// Number of loaded credentials (health surface).
    pub fn credential_count(&self) -> usize {
        self.store.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_controller() -> AdmissionController {
        let store = CredentialStore::load(None, true).unwrap();
        AdmissionController::new(store, FallbackLimiter::in_memory(), 100)
    }

    #[test]
    fn valid_demo_key_passes() {
        let controller = demo_controller();
        let ctx = controller.validate(Some("heatguard-api-key-demo-12345")).unwrap();
        assert_eq!(ctx.display_name, "Demo API Key");
        assert_eq!(ctx.rate_limit_per_minute, 1000);
        assert!(ctx.grants(Permission::Write));
    }

    #[test]
    fn missing_key_is_unauthenticated() {
        let controller = demo_controller();
        assert!(matches!(
            controller.validate(None),
            Err(ServiceError::Unauthenticated(_))
        ));
        assert!(matches!(
            controller.validate(Some("  ")),
            Err(ServiceError::Unauthenticated(_))
        ));
    }

    #[test]
    fn unknown_key_is_unauthenticated_and_cached() {
        let controller = demo_controller();
        for _ in 0..2 {
            assert!(matches!(
                controller.validate(Some("bogus")),
                Err(ServiceError::Unauthenticated(_))
            ));
        }
    }

    #[test]
    fn readonly_key_lacks_write() {
        let controller = demo_controller();
        let ctx = controller.validate(Some("heatguard-readonly-key-67890")).unwrap();
        assert!(ctx.grants(Permission::Read));
        assert!(!ctx.grants(Permission::Write));
        assert!(matches!(
            controller.require_permission(&ctx, Permission::Write),
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[test]
    fn admin_implies_all() {
        let credential = Credential {
            display_name: "root".into(),
            permissions: [Permission::Admin].into_iter().collect(),
            rate_limit_per_minute: None,
            active: true,
            expires_at: None,
        };
        assert!(credential.grants(Permission::Read));
        assert!(credential.grants(Permission::Write));
        assert!(credential.grants(Permission::Admin));
    }

    #[test]
    fn expired_key_is_rejected() {
        let mut store = CredentialStore::default();
        store.records.insert(
            "old-key".into(),
            Credential {
                display_name: "Expired".into(),
                permissions: [Permission::Read].into_iter().collect(),
                rate_limit_per_minute: None,
                active: true,
                expires_at: Some(Utc::now() - chrono::Duration::hours(1)),
            },
        );
        let controller = AdmissionController::new(store, FallbackLimiter::in_memory(), 100);
        assert!(matches!(
            controller.validate(Some("old-key")),
            Err(ServiceError::Unauthenticated(_))
        ));
    }

    #[test]
    fn deactivated_key_is_rejected() {
        let mut store = CredentialStore::default();
        store.records.insert(
            "off-key".into(),
            Credential {
                display_name: "Disabled".into(),
                permissions: [Permission::Read].into_iter().collect(),
                rate_limit_per_minute: None,
                active: false,
                expires_at: None,
            },
        );
        let controller = AdmissionController::new(store, FallbackLimiter::in_memory(), 100);
        assert!(matches!(
            controller.validate(Some("off-key")),
            Err(ServiceError::Unauthenticated(_))
        ));
    }

    #[tokio::test]
    async fn zero_rate_limit_rejects_all() {
        let mut store = CredentialStore::default();
        store.records.insert(
            "throttled".into(),
            Credential {
                display_name: "Throttled".into(),
                permissions: [Permission::Read].into_iter().collect(),
                rate_limit_per_minute: Some(0),
                active: true,
                expires_at: None,
            },
        );
        let controller = AdmissionController::new(store, FallbackLimiter::in_memory(), 100);
        let err = controller.admit(Some("throttled"), Permission::Read).await.unwrap_err();
        assert!(matches!(err, ServiceError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn full_admission_returns_rate_status() {
        let controller = demo_controller();
        let (ctx, status) = controller
            .admit(Some("heatguard-api-key-demo-12345"), Permission::Read)
            .await
            .unwrap();
        assert_eq!(status.limit, 1000);
        assert!(status.remaining < 1000);
        assert!(!ctx.credential_hash.is_empty());
    }

    #[test]
    fn credential_file_parses() {
        let raw = r#"
            [[credential]]
            key = "site-a-key"
            display_name = "Site A"
            permissions = ["read", "write"]
            rate_limit_per_minute = 250

            [[credential]]
            key = "site-b-key"
            display_name = "Site B"
            permissions = ["read"]
            active = false
        "#;
        let file: CredentialFile = toml::from_str(raw).unwrap();
        assert_eq!(file.credentials.len(), 2);
        assert_eq!(file.credentials[0].credential.rate_limit_per_minute, Some(250));
        assert!(!file.credentials[1].credential.active);
    }
}
