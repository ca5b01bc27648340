use crate::error::Result;
use crate::member::Member;
use crate::precedence::Precedence;
use rand::Rng;
use std::collections::HashMap;
use tracing::info;

/// Decides whether a member dies this run.
pub trait FateEngine: Send + Sync {
    fn should_destroy(&self, member: &Member) -> Result<bool>;
}

/// Source of uniform draws in `[0, 1)`.
pub trait RandomSource: Send + Sync {
    fn next_f64(&self) -> f64;
}

/// Thread-local `rand` generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_f64(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Whitelist/blacklist filtering followed by a weighted coin flip.
pub struct RandomFateEngine {
    whitelist: Vec<String>,
    blacklist: Vec<String>,
    default_probability: f64,
    probabilities: HashMap<String, f64>,
    random: Box<dyn RandomSource>,
}

impl RandomFateEngine {
    pub fn new(
        whitelist: Vec<String>,
        blacklist: Vec<String>,
        default_probability: f64,
        probabilities: HashMap<String, f64>,
        random: Box<dyn RandomSource>,
    ) -> Self {
        info!(whitelist = %whitelist.join(","), "fate engine whitelist");
        info!(blacklist = %blacklist.join(","), "fate engine blacklist");
        info!(default_probability, "fate engine default probability");
        Self {
            whitelist,
            blacklist,
            default_probability,
            probabilities,
            random,
        }
    }

    pub fn from_config(config: &crate::config::Config, random: Box<dyn RandomSource>) -> Self {
        Self::new(
            config.whitelist.clone(),
            config.blacklist.clone(),
            config.default_probability,
            config.probabilities.clone(),
            random,
        )
    }

    fn is_whitelisted(&self, member: &Member) -> bool {
        self.whitelist.is_empty() || self.whitelist.iter().any(|name| member.matches(name))
    }

    fn is_blacklisted(&self, member: &Member) -> bool {
        self.blacklist.iter().any(|name| member.matches(name))
    }

    fn probability(&self, name: &str) -> Option<f64> {
        self.probabilities.get(name).copied()
    }

    /// Job override, then deployment override, then the default.
    pub fn resolve_probability(&self, member: &Member) -> Result<f64> {
        Precedence::new()
            .candidate(|| self.probability(&member.job))
            .candidate(|| self.probability(&member.deployment))
            .value(self.default_probability)
            .get()
    }
}

impl FateEngine for RandomFateEngine {
    fn should_destroy(&self, member: &Member) -> Result<bool> {
        if !self.is_whitelisted(member) || self.is_blacklisted(member) {
            return Ok(false);
        }

        let probability = self.resolve_probability(member)?;
        Ok(self.random.next_f64() < probability)
    }
}
