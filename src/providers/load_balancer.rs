use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use super::{
    PROVIDER_OPENSTACK_OCTAVIA, PROVIDER_SIMULATED, PROVIDER_SIMULATED_FALLBACK, Provider,
    metric_seed, round2, synthetic_host,
};

const DNS_SUFFIX: &str = "lb.atrium.cloud";

#[derive(Debug, Clone, Deserialize)]
pub struct LoadBalancerSpec {
    pub name: String,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default)]
    pub subnets: Vec<String>,
}

fn default_scheme() -> String {
    "internet-facing".to_owned()
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadBalancerProvision {
    pub provider: String,
    pub dns_name: String,
    pub status: String,
    pub vip_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openstack_id: Option<String>,
}

pub async fn provision(provider: &Provider, spec: &LoadBalancerSpec) -> LoadBalancerProvision {
    let dns_name = synthetic_host(&spec.name, DNS_SUFFIX);

    let Provider::OpenStack(gate) = provider else {
        return simulated(PROVIDER_SIMULATED, dns_name);
    };

    let description = format!("Atrium {} LB", spec.scheme);
    let vip_subnet = spec.subnets.first().map(String::as_str);
    match gate
        .create_load_balancer(&spec.name, &description, vip_subnet)
        .await
    {
        Ok(created) => {
            let lb = created.get("loadbalancer").cloned().unwrap_or(created);
            LoadBalancerProvision {
                provider: PROVIDER_OPENSTACK_OCTAVIA.to_owned(),
                dns_name,
                status: "running".to_owned(),
                vip_address: lb
                    .get("vip_address")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
                openstack_id: lb.get("id").and_then(Value::as_str).map(str::to_owned),
            }
        }
        Err(error) => {
            warn!("load balancer provisioning failed, using simulated fallback: {error}");
            simulated(PROVIDER_SIMULATED_FALLBACK, dns_name)
        }
    }
}

pub async fn delete(provider: &Provider, openstack_id: Option<&str>) -> Value {
    let Some(openstack_id) = openstack_id.filter(|id| !id.is_empty()) else {
        return json!({ "provider": PROVIDER_SIMULATED, "deleted": true });
    };

    let Provider::OpenStack(gate) = provider else {
        return json!({ "provider": PROVIDER_SIMULATED, "deleted": true });
    };

    match gate.delete_load_balancer(openstack_id).await {
        Ok(_) => json!({ "provider": PROVIDER_OPENSTACK_OCTAVIA, "deleted": true }),
        Err(error) => {
            warn!("load balancer deletion fallback: {error}");
            json!({ "provider": PROVIDER_SIMULATED_FALLBACK, "deleted": true })
        }
    }
}

/// Synthetic gauges until a telemetry pipeline is connected. Seeded by the
/// name so repeated reads agree.
#[must_use]
pub fn metrics(name: &str) -> Value {
    let seed = metric_seed(name, 50);
    json!({
        "latency_ms_p50": 25 + seed,
        "latency_ms_p95": 55 + seed,
        "request_rate_rps": 120 + seed * 3,
        "error_rate_percent": round2(f64::from(seed % 5) * 0.2),
        "healthy_targets": (3 + seed % 4).max(1),
        "unhealthy_targets": if seed % 6 == 0 { 1 } else { 0 },
        "throughput_mbps": 80 + seed * 2,
    })
}

fn simulated(provider: &str, dns_name: String) -> LoadBalancerProvision {
    let nonce = uuid::Uuid::new_v4().as_u128();
    LoadBalancerProvision {
        provider: provider.to_owned(),
        dns_name,
        status: "running".to_owned(),
        vip_address: format!("10.0.{}.{}", nonce % 200, (nonce >> 8) % 250),
        openstack_id: None,
    }
}
