use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use super::{
    PROVIDER_SIMULATED, PROVIDER_SIMULATED_FALLBACK, Provider, metric_seed, round2, synthetic_host,
};

const EDGE_SUFFIX: &str = "edge.atrium.cloud";

#[derive(Debug, Clone, Deserialize)]
pub struct CdnSpec {
    pub name: String,
    pub origin_domain: String,
    #[serde(default)]
    pub domain_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CdnProvision {
    pub provider: String,
    pub distribution_id: String,
    pub edge_domain: String,
    pub status: String,
    pub active_custom_domains: Vec<String>,
    pub origin: String,
}

/// Most deployments have no managed global CDN service behind the gate, so
/// the configured path still assembles distribution metadata locally; only a
/// gate-level failure downgrades the provider label.
pub async fn provision(provider: &Provider, spec: &CdnSpec) -> CdnProvision {
    let distribution_id = format!("cdn-{}", &uuid::Uuid::new_v4().simple().to_string()[..12]);
    let edge_domain = synthetic_host(&spec.name, EDGE_SUFFIX);

    let label = match provider {
        Provider::Simulated => PROVIDER_SIMULATED,
        Provider::OpenStack(gate) => {
            if gate.region().is_empty() {
                warn!("cdn provisioning fell back: gate region missing");
                PROVIDER_SIMULATED_FALLBACK
            } else {
                "simulated-openstack"
            }
        }
    };

    CdnProvision {
        provider: label.to_owned(),
        distribution_id,
        edge_domain,
        status: "running".to_owned(),
        active_custom_domains: spec.domain_names.clone(),
        origin: spec.origin_domain.clone(),
    }
}

#[must_use]
pub fn delete(_provider: &Provider, distribution_id: &str) -> Value {
    if distribution_id.is_empty() {
        return json!({ "deleted": true, "provider": PROVIDER_SIMULATED });
    }
    json!({ "deleted": true, "provider": PROVIDER_SIMULATED })
}

#[must_use]
pub fn metrics(name: &str) -> Value {
    let seed = metric_seed(name, 100);
    let requests = 50_000 + seed * 180;
    let hit_ratio = round2(72.0 + f64::from(seed % 22));
    let miss_ratio = round2((100.0 - hit_ratio).max(0.0));
    let avg_latency_ms = round2(18.0 + f64::from(seed % 28));
    let egress_gb = round2(240.0 + f64::from(seed) * 1.7);

    json!({
        "requests": requests,
        "cache_hit_ratio_percent": hit_ratio,
        "cache_miss_ratio_percent": miss_ratio,
        "avg_edge_latency_ms": avg_latency_ms,
        "origin_egress_gb": egress_gb,
        "4xx_rate_percent": round2(f64::from(seed % 6) * 0.15),
        "5xx_rate_percent": round2(f64::from(seed % 4) * 0.08),
        "bandwidth_saved_percent": round2(hit_ratio * 0.82),
    })
}
