use super::Infrastructure;
use crate::director::DirectorClient;
use crate::error::{LemurError, Result};
use crate::member::Member;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub(crate) struct Credentials {
    pub identity_endpoint: String,
    pub tenant: String,
    pub username: String,
    pub password: String,
    pub region: Option<String>,
}

// ---------------------------------------------------------------------------
// Keystone v2 token response
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access: Access,
}

#[derive(Debug, Deserialize)]
struct Access {
    token: Token,
    #[serde(rename = "serviceCatalog", default)]
    service_catalog: Vec<Service>,
}

#[derive(Debug, Deserialize)]
struct Token {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Service {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    endpoints: Vec<Endpoint>,
}

#[derive(Debug, Deserialize)]
struct Endpoint {
    #[serde(default)]
    region: Option<String>,
    #[serde(rename = "publicURL")]
    public_url: String,
}

struct Session {
    token: String,
    compute_endpoints: Vec<String>,
}

/// Members come from the director; destruction stops the server through Nova.
pub struct OpenStackInfrastructure {
    director: DirectorClient,
    credentials: Credentials,
    client: Client,
}

impl OpenStackInfrastructure {
    pub(crate) fn new(
        director: DirectorClient,
        credentials: Credentials,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            director,
            credentials,
            client,
        })
    }

    fn authenticate(&self) -> Result<Session> {
        let url = format!(
            "{}/tokens",
            self.credentials.identity_endpoint.trim_end_matches('/')
        );
        let body = serde_json::json!({
            "auth": {
                "tenantName": self.credentials.tenant,
                "passwordCredentials": {
                    "username": self.credentials.username,
                    "password": self.credentials.password,
                }
            }
        });
        let response = self.client.post(&url).json(&body).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(LemurError::Infrastructure(format!(
                "keystone authentication returned {status}"
            )));
        }
        let token: TokenResponse = response.json()?;

        let region = self.credentials.region.as_deref();
        let compute_endpoints: Vec<String> = token
            .access
            .service_catalog
            .into_iter()
            .filter(|s| s.kind == "compute")
            .flat_map(|s| s.endpoints)
            .filter(|e| region.is_none() || e.region.as_deref() == region)
            .map(|e| e.public_url.trim_end_matches('/').to_string())
            .collect();
        if compute_endpoints.is_empty() {
            return Err(LemurError::Infrastructure(
                "no compute endpoint in service catalog".to_string(),
            ));
        }

        Ok(Session {
            token: token.access.token.id,
            compute_endpoints,
        })
    }

    fn stop(&self, session: &Session, member: &Member) -> Result<()> {
        let mut stopped = false;
        for endpoint in &session.compute_endpoints {
            let url = format!("{endpoint}/servers/{}/action", member.id);
            let response = self
                .client
                .post(&url)
                .header("X-Auth-Token", &session.token)
                .json(&serde_json::json!({ "os-stop": null }))
                .send()?;
            match response.status() {
                s if s.is_success() => {
                    debug!(member = %member, endpoint = %endpoint, "server stop accepted");
                    stopped = true;
                }
                // Server lives in another region.
                StatusCode::NOT_FOUND => {}
                s => {
                    return Err(LemurError::Infrastructure(format!(
                        "POST {url} returned {s}"
                    )))
                }
            }
        }
        if stopped {
            Ok(())
        } else {
            Err(LemurError::Infrastructure(
                "server not found in any region".to_string(),
            ))
        }
    }
}

impl Infrastructure for OpenStackInfrastructure {
    fn members(&self) -> Result<Vec<Member>> {
        self.director.members()
    }

    fn destroy(&self, member: &Member) -> Result<()> {
        self.authenticate()
            .and_then(|session| self.stop(&session, member))
            .map_err(|e| LemurError::Destruction {
                member: member.to_string(),
                reason: e.to_string(),
            })
    }
}
