//! Client for the deployment director that knows which VMs make up each deployment.

use crate::config::DirectorConfig;
use crate::error::{LemurError, Result};
use crate::member::Member;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct Deployment {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Vm {
    #[serde(alias = "vm_cid")]
    cid: String,
    job: String,
    #[serde(default)]
    index: Option<u32>,
}

pub struct DirectorClient {
    client: Client,
    base: Url,
    username: Option<String>,
    password: Option<String>,
}

impl DirectorClient {
    pub fn new(config: &DirectorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.skip_ssl_validation)
            .build()?;
        let base = Url::parse(&config.uri).map_err(|e| {
            LemurError::InvalidConfig(format!("director uri '{}': {e}", config.uri))
        })?;
        if base.cannot_be_a_base() {
            return Err(LemurError::InvalidConfig(format!(
                "director uri '{}' cannot carry a path",
                config.uri
            )));
        }
        Ok(Self {
            client,
            base,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    pub fn deployments(&self) -> Result<Vec<String>> {
        let deployments: Vec<Deployment> = self.fetch(&["deployments"])?;
        Ok(deployments.into_iter().map(|d| d.name).collect())
    }

    pub fn members_of(&self, deployment: &str) -> Result<Vec<Member>> {
        let vms: Vec<Vm> = self.fetch(&["deployments", deployment, "vms"])?;
        Ok(vms
            .into_iter()
            .map(|vm| {
                let name = match vm.index {
                    Some(index) => format!("{}/{index}", vm.job),
                    None => vm.job.clone(),
                };
                Member::new(vm.cid, deployment, vm.job, name)
            })
            .collect())
    }

    /// Every VM across every deployment.
    pub fn members(&self) -> Result<Vec<Member>> {
        let mut members = Vec::new();
        for deployment in self.deployments()? {
            members.extend(self.members_of(&deployment)?);
        }
        debug!(count = members.len(), "director enumerated members");
        Ok(members)
    }

    /// `segments` are appended to the director uri, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn fetch<T: serde::de::DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let url = self.endpoint(segments);
        let response = self.authorize(self.client.get(url.clone())).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(LemurError::Director(format!("GET {url} returned {status}")));
        }
        Ok(response.json()?)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.username {
            Some(user) => request.basic_auth(user, self.password.as_deref()),
            None => request,
        }
    }
}
