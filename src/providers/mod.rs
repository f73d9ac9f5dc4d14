mod cdn;
mod compute;
mod load_balancer;
mod openstack;

pub use cdn::{CdnProvision, CdnSpec};
pub use compute::{ComputeProvision, ComputeSpec};
pub use load_balancer::{LoadBalancerProvision, LoadBalancerSpec};
pub use openstack::OpenStackGate;

use serde_json::Value;

pub const PROVIDER_SIMULATED: &str = "simulated";
pub const PROVIDER_SIMULATED_FALLBACK: &str = "simulated-fallback";
pub const PROVIDER_OPENSTACK_OCTAVIA: &str = "openstack-octavia";

/// Provider selection happens once at boot: either the OpenStack gate is
/// configured or every call takes the simulated path. Calls through the
/// OpenStack variant that fail degrade to `simulated-fallback` results of
/// identical shape; nothing propagates to the caller.
#[derive(Debug, Clone)]
pub enum Provider {
    Simulated,
    OpenStack(OpenStackGate),
}

#[derive(Debug, Clone)]
pub struct ProviderSet {
    provider: Provider,
}

impl ProviderSet {
    #[must_use]
    pub fn from_env(http: reqwest::Client) -> Self {
        let provider = match OpenStackGate::from_env(http) {
            Some(gate) => Provider::OpenStack(gate),
            None => Provider::Simulated,
        };
        Self { provider }
    }

    #[must_use]
    pub fn simulated() -> Self {
        Self {
            provider: Provider::Simulated,
        }
    }

    #[must_use]
    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        matches!(self.provider, Provider::OpenStack(_))
    }

    pub async fn provision_load_balancer(&self, spec: &LoadBalancerSpec) -> LoadBalancerProvision {
        load_balancer::provision(&self.provider, spec).await
    }

    pub async fn delete_load_balancer(&self, openstack_id: Option<&str>) -> Value {
        load_balancer::delete(&self.provider, openstack_id).await
    }

    #[must_use]
    pub fn load_balancer_metrics(&self, name: &str) -> Value {
        load_balancer::metrics(name)
    }

    pub async fn provision_cdn_distribution(&self, spec: &CdnSpec) -> CdnProvision {
        cdn::provision(&self.provider, spec).await
    }

    #[must_use]
    pub fn delete_cdn_distribution(&self, distribution_id: &str) -> Value {
        cdn::delete(&self.provider, distribution_id)
    }

    #[must_use]
    pub fn cdn_distribution_metrics(&self, name: &str) -> Value {
        cdn::metrics(name)
    }

    pub async fn provision_compute_instance(&self, spec: &ComputeSpec) -> ComputeProvision {
        compute::provision(&self.provider, spec).await
    }

    pub async fn delete_compute_instance(&self, openstack_id: Option<&str>) -> Value {
        compute::delete(&self.provider, openstack_id).await
    }

    #[must_use]
    pub fn compute_instance_metrics(&self, name: &str) -> Value {
        compute::metrics(name)
    }
}

/// Deterministic seed shared by the synthetic metric formulas: the byte sum
/// of the name, reduced by the formula's modulus. Stable across restarts so
/// dashboards do not jitter.
#[must_use]
pub(crate) fn metric_seed(name: &str, modulus: u32) -> u32 {
    let sum: u32 = name.chars().map(|ch| ch as u32).sum();
    sum % modulus
}

/// Synthetic DNS labels look like `<slug>-<6-hex-of-uuid>.<suffix>`.
#[must_use]
pub(crate) fn synthetic_host(name: &str, suffix: &str) -> String {
    let slug = name.to_lowercase().replace(' ', "-");
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    format!("{slug}-{}.{suffix}", &nonce[..6])
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
