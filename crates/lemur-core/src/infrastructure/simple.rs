use super::Infrastructure;
use crate::error::Result;
use crate::member::Member;
use tracing::info;

/// Fixed roster from configuration. Destroying a member only logs it.
#[derive(Debug, Default)]
pub struct SimpleInfrastructure {
    members: Vec<Member>,
}

impl SimpleInfrastructure {
    pub fn new(members: Vec<Member>) -> Self {
        Self { members }
    }
}

impl Infrastructure for SimpleInfrastructure {
    fn members(&self) -> Result<Vec<Member>> {
        Ok(self.members.clone())
    }

    fn destroy(&self, member: &Member) -> Result<()> {
        info!(member = %member, "simple infrastructure destroy");
        Ok(())
    }
}
