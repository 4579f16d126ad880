use std::sync::Arc;

use dashmap::DashMap;

use crate::config::Config;
use crate::engine::{EngineError, NoPromos, PromoLookup};
use crate::limits::*;
use crate::notify::NotifyHub;
use crate::reaper;
use crate::service::{BookingService, InMemoryStore};

/// One tenant's state: its store and the service on top of it.
pub struct Tenant {
    pub store: Arc<InMemoryStore>,
    pub service: Arc<BookingService>,
}

/// Manages per-tenant services. Each tenant gets its own store, notify hub
/// and reaper.
pub struct TenantManager {
    tenants: DashMap<String, Arc<Tenant>>,
    config: Config,
    promos: Arc<dyn PromoLookup>,
}

impl TenantManager {
    pub fn new(config: Config) -> Self {
        Self {
            tenants: DashMap::new(),
            config,
            promos: Arc::new(NoPromos),
        }
    }

    /// Promo codes honoured by every tenant created afterwards.
    pub fn with_promos(mut self, promos: Arc<dyn PromoLookup>) -> Self {
        self.promos = promos;
        self
    }

    pub fn promos(&self) -> &dyn PromoLookup {
        self.promos.as_ref()
    }

    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }

    /// Get or lazily create the tenant with the given name.
    pub fn get_or_create(&self, tenant: &str) -> Result<Arc<Tenant>, EngineError> {
        if tenant.len() > MAX_TENANT_NAME_LEN {
            return Err(EngineError::LimitExceeded("tenant name too long"));
        }
        let safe_name: String = tenant
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        if safe_name.is_empty() {
            return Err(EngineError::InvalidInput("empty tenant name".into()));
        }
        if let Some(existing) = self.tenants.get(&safe_name) {
            return Ok(existing.value().clone());
        }
        if self.tenants.len() >= self.config.max_tenants {
            return Err(EngineError::LimitExceeded("too many tenants"));
        }

        let entry = self.tenants.entry(safe_name).or_insert_with(|| {
            let store = Arc::new(InMemoryStore::new());
            let service = Arc::new(
                BookingService::new(store.clone(), Arc::new(NotifyHub::new()))
                    .with_promos(self.promos.clone())
                    .with_search_options(self.config.search_options())
                    .with_hold(self.config.hold),
            );
            tokio::spawn(reaper::run_reaper(service.clone(), self.config.sweep_interval));
            tracing::info!("tenant {tenant} created");
            Arc::new(Tenant { store, service })
        });
        let tenant = entry.value().clone();
        drop(entry);
        metrics::gauge!(crate::observability::TENANTS_ACTIVE).set(self.tenants.len() as f64);
        Ok(tenant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use rust_decimal_macros::dec;
    use tokio_test::assert_ok;
    use ulid::Ulid;

    use crate::model::*;

    fn config(max_tenants: usize) -> Config {
        Config {
            max_tenants,
            ..Config::default()
        }
    }

    fn facility(id: Ulid) -> FacilityConfig {
        FacilityConfig {
            id,
            name: "Hall".into(),
            open_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            close_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            slot_duration_minutes: 60,
            pricing: PricingConfig {
                base_price_per_hour: dec!(50),
                currency: "GBP".into(),
            },
        }
    }

    #[tokio::test]
    async fn tenant_isolation() {
        let tm = TenantManager::new(config(8));
        let a = tm.get_or_create("tenant_a").unwrap();
        let b = tm.get_or_create("tenant_b").unwrap();

        let fid = Ulid::new();
        a.store.put_facility(facility(fid));

        let d = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let now = d.and_hms_opt(8, 0, 0).unwrap().and_utc();
        let map = a.service.availability(fid, &DateRange::new(d, d), now).await.unwrap();
        assert_eq!(map.total_slots, 8);

        // Tenant B never heard of the facility
        let err = b.service.availability(fid, &DateRange::new(d, d), now).await.unwrap_err();
        assert_eq!(err, EngineError::NotFound(fid));
    }

    #[tokio::test]
    async fn tenant_same_service_returned() {
        let tm = TenantManager::new(config(8));
        let t1 = tm.get_or_create("foo").unwrap();
        let t2 = tm.get_or_create("foo").unwrap();
        assert!(Arc::ptr_eq(&t1, &t2));
        assert_eq!(tm.len(), 1);
    }

    #[tokio::test]
    async fn tenant_name_sanitized() {
        let tm = TenantManager::new(config(8));
        let evil = tm.get_or_create("../evil").unwrap();
        let plain = tm.get_or_create("evil").unwrap();
        assert!(Arc::ptr_eq(&evil, &plain));

        // Empty after sanitization
        let result = tm.get_or_create("../..");
        assert!(matches!(result, Err(EngineError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn tenant_name_too_long() {
        let tm = TenantManager::new(config(8));
        let long_name = "x".repeat(MAX_TENANT_NAME_LEN + 1);
        let err = tm.get_or_create(&long_name).err().unwrap();
        assert!(err.to_string().contains("tenant name too long"));
        assert!(tm.get_or_create(&"x".repeat(MAX_TENANT_NAME_LEN)).is_ok());
    }

    #[tokio::test]
    async fn tenant_count_limit() {
        let tm = TenantManager::new(config(4));
        for i in 0..4 {
            assert_ok!(tm.get_or_create(&format!("t{i}")));
        }
        let err = tm.get_or_create("one_more").err().unwrap();
        assert!(err.to_string().contains("too many tenants"));
        // existing tenants are still reachable
        assert_ok!(tm.get_or_create("t0"));
    }
}
