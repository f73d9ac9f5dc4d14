use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use super::{
    PROVIDER_SIMULATED, PROVIDER_SIMULATED_FALLBACK, Provider, metric_seed, round2, synthetic_host,
};

const DNS_SUFFIX: &str = "compute.atrium.cloud";

#[derive(Debug, Clone, Deserialize)]
pub struct ComputeSpec {
    pub name: String,
    #[serde(default = "default_flavor")]
    pub flavor: String,
    #[serde(default)]
    pub image: String,
}

fn default_flavor() -> String {
    "standard.small".to_owned()
}

#[derive(Debug, Clone, Serialize)]
pub struct ComputeProvision {
    pub provider: String,
    pub instance_id: String,
    pub hostname: String,
    pub status: String,
    pub flavor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openstack_id: Option<String>,
}

pub async fn provision(provider: &Provider, spec: &ComputeSpec) -> ComputeProvision {
    let instance_id = format!("vm-{}", &uuid::Uuid::new_v4().simple().to_string()[..12]);
    let hostname = synthetic_host(&spec.name, DNS_SUFFIX);

    let Provider::OpenStack(gate) = provider else {
        return simulated(PROVIDER_SIMULATED, instance_id, hostname, &spec.flavor);
    };

    match gate.create_server(&spec.name, &spec.flavor, &spec.image).await {
        Ok(created) => {
            let server = created.get("server").cloned().unwrap_or(created);
            ComputeProvision {
                provider: "openstack-nova".to_owned(),
                instance_id,
                hostname,
                status: "running".to_owned(),
                flavor: spec.flavor.clone(),
                openstack_id: server.get("id").and_then(Value::as_str).map(str::to_owned),
            }
        }
        Err(error) => {
            warn!("compute provisioning failed, using simulated fallback: {error}");
            simulated(PROVIDER_SIMULATED_FALLBACK, instance_id, hostname, &spec.flavor)
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

    match gate.delete_server(openstack_id).await {
        Ok(_) => json!({ "provider": "openstack-nova", "deleted": true }),
        Err(error) => {
            warn!("compute deletion fallback: {error}");
            json!({ "provider": PROVIDER_SIMULATED_FALLBACK, "deleted": true })
        }
    }
}

/// Seed-derived gauges standing in for a telemetry agent.
#[must_use]
pub fn metrics(name: &str) -> Value {
    let seed = metric_seed(name, 60);
    json!({
        "cpu_percent": 5 + seed,
        "memory_percent": 20 + seed,
        "disk_read_iops": 40 + seed * 12,
        "disk_write_iops": 25 + seed * 9,
        "network_in_mbps": round2(4.0 + f64::from(seed) * 0.8),
        "network_out_mbps": round2(2.0 + f64::from(seed) * 0.5),
    })
}

fn simulated(
    provider: &str,
    instance_id: String,
    hostname: String,
    flavor: &str,
) -> ComputeProvision {
    ComputeProvision {
        provider: provider.to_owned(),
        instance_id,
        hostname,
        status: "running".to_owned(),
        flavor: flavor.to_owned(),
        openstack_id: None,
    }
}
