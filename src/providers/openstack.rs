use std::time::Duration;

use serde_json::{Value, json};
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Minimal OpenStack consumption layer. Credentials come exclusively from
/// the `OS_*` environment; the gate is configured only when the auth triple
/// is complete. Every call authenticates against Keystone and issues one
/// service request; any failure surfaces as an `Err` the facade turns into a
/// simulated-fallback result.
#[derive(Debug, Clone)]
pub struct OpenStackGate {
    http: reqwest::Client,
    auth_url: String,
    username: String,
    password: String,
    project_name: String,
    region_name: String,
    user_domain_name: String,
    project_domain_name: String,
    cloud_profile: String,
}

impl OpenStackGate {
    #[must_use]
    pub fn from_env(http: reqwest::Client) -> Option<Self> {
        let auth_url = env_nonempty("OS_AUTH_URL")?;
        let username = env_nonempty("OS_USERNAME")?;
        let password = env_nonempty("OS_PASSWORD")?;

        Some(Self {
            http,
            auth_url,
            username,
            password,
            project_name: env_nonempty("OS_PROJECT_NAME").unwrap_or_default(),
            region_name: env_nonempty("OS_REGION_NAME").unwrap_or_else(|| "RegionOne".to_owned()),
            user_domain_name: env_nonempty("OS_USER_DOMAIN_NAME")
                .unwrap_or_else(|| "Default".to_owned()),
            project_domain_name: env_nonempty("OS_PROJECT_DOMAIN_NAME")
                .unwrap_or_else(|| "Default".to_owned()),
            cloud_profile: env_nonempty("OS_CLOUD").unwrap_or_else(|| "atrium".to_owned()),
        })
    }

    #[must_use]
    pub fn region(&self) -> &str {
        &self.region_name
    }

    #[must_use]
    pub fn cloud_profile(&self) -> &str {
        &self.cloud_profile
    }

    pub async fn create_load_balancer(
        &self,
        name: &str,
        description: &str,
        vip_subnet_id: Option<&str>,
    ) -> Result<Value, String> {
        let body = json!({
            "loadbalancer": {
                "name": name,
                "description": description,
                "vip_subnet_id": vip_subnet_id,
                "admin_state_up": true,
            }
        });
        self.service_request(
            reqwest::Method::POST,
            "load-balancer",
            "/v2/lbaas/loadbalancers",
            Some(body),
        )
        .await
    }

    pub async fn delete_load_balancer(&self, openstack_id: &str) -> Result<Value, String> {
        self.service_request(
            reqwest::Method::DELETE,
            "load-balancer",
            &format!("/v2/lbaas/loadbalancers/{openstack_id}"),
            None,
        )
        .await
    }

    pub async fn create_server(&self, name: &str, flavor: &str, image: &str) -> Result<Value, String> {
        let body = json!({
            "server": {
                "name": name,
                "flavorRef": flavor,
                "imageRef": image,
            }
        });
        self.service_request(reqwest::Method::POST, "compute", "/v2.1/servers", Some(body))
            .await
    }

    pub async fn delete_server(&self, openstack_id: &str) -> Result<Value, String> {
        self.service_request(
            reqwest::Method::DELETE,
            "compute",
            &format!("/v2.1/servers/{openstack_id}"),
            None,
        )
        .await
    }

    /// Keystone password authentication. Returns the token plus the service
    /// catalog from the response body.
    async fn authenticate(&self) -> Result<(String, Value), String> {
        let body = json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "name": self.username,
                            "domain": { "name": self.user_domain_name },
                            "password": self.password,
                        }
                    }
                },
                "scope": {
                    "project": {
                        "name": self.project_name,
                        "domain": { "name": self.project_domain_name },
                    }
                }
            }
        });

        let url = format!("{}/v3/auth/tokens", self.auth_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .json(&body)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|error| format!("keystone request failed: {error}"))?;

        if !response.status().is_success() {
            return Err(format!("keystone returned {}", response.status()));
        }

        let token = response
            .headers()
            .get("x-subject-token")
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
            .ok_or_else(|| "keystone response missing subject token".to_owned())?;
        let catalog = response
            .json::<Value>()
            .await
            .map_err(|error| format!("keystone response unreadable: {error}"))?;

        Ok((token, catalog))
    }

    async fn service_request(
        &self,
        method: reqwest::Method,
        service_type: &str,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, String> {
        let (token, catalog) = self.authenticate().await?;
        let endpoint = endpoint_for(&catalog, service_type, &self.region_name)
            .ok_or_else(|| format!("no {service_type} endpoint in catalog"))?;

        let url = format!("{}{path}", endpoint.trim_end_matches('/'));
        debug!("openstack {method} {url}");

        let mut request = self
            .http
            .request(method, &url)
            .header("X-Auth-Token", token)
            .timeout(REQUEST_TIMEOUT);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|error| format!("service request failed: {error}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("service returned {status}"));
        }

        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        response
            .json::<Value>()
            .await
            .map_err(|error| format!("service response unreadable: {error}"))
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// Pick the public endpoint for a service type from a Keystone catalog,
/// preferring the configured region.
fn endpoint_for(catalog: &Value, service_type: &str, region: &str) -> Option<String> {
    let services = catalog.get("token")?.get("catalog")?.as_array()?;
    let service = services
        .iter()
        .find(|entry| entry.get("type").and_then(Value::as_str) == Some(service_type))?;
    let endpoints = service.get("endpoints")?.as_array()?;

    let pick = |require_region: bool| {
        endpoints.iter().find_map(|endpoint| {
            let interface = endpoint.get("interface").and_then(Value::as_str)?;
            if interface != "public" {
                return None;
            }
            if require_region
                && endpoint.get("region").and_then(Value::as_str) != Some(region)
            {
                return None;
            }
            endpoint.get("url").and_then(Value::as_str).map(str::to_owned)
        })
    };

    pick(true).or_else(|| pick(false))
}
