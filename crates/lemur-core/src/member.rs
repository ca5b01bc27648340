use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// One unit of the managed fleet, as reported by an infrastructure backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub deployment: String,
    pub job: String,
    pub name: String,
}

impl Member {
    pub fn new(
        id: impl Into<String>,
        deployment: impl Into<String>,
        job: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            deployment: deployment.into(),
            job: job.into(),
            name: name.into(),
        }
    }

    /// True when either the deployment or the job equals `name`, ignoring case.
    pub fn matches(&self, name: &str) -> bool {
        self.deployment.eq_ignore_ascii_case(name) || self.job.eq_ignore_ascii_case(name)
    }
}

// Ordered by name; the remaining fields only break ties so that Ord agrees with Eq.
impl Ord for Member {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.deployment.cmp(&other.deployment))
            .then_with(|| self.job.cmp(&other.job))
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for Member {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}/{}, id={})",
            self.name, self.deployment, self.job, self.id
        )
    }
}
