//! Lazy first-present-value resolution over an ordered list of candidates.
//!
//! ```rust,ignore
//! let probability = Precedence::new()
//!     .candidate(|| overrides.get("router").copied())
//!     .candidate(|| overrides.get("cf-prod").copied())
//!     .value(0.2)
//!     .get()?;
//! ```

use crate::error::{LemurError, Result};

/// Whether a resolved value counts as present. Blank values are skipped.
pub trait Present {
    fn is_present(&self) -> bool;
}

impl Present for String {
    fn is_present(&self) -> bool {
        !self.trim().is_empty()
    }
}

impl Present for &str {
    fn is_present(&self) -> bool {
        !self.trim().is_empty()
    }
}

impl Present for f64 {
    fn is_present(&self) -> bool {
        !self.is_nan()
    }
}

impl Present for f32 {
    fn is_present(&self) -> bool {
        !self.is_nan()
    }
}

type Candidate<'a, T> = Box<dyn FnOnce() -> Option<T> + 'a>;

/// Ordered candidates evaluated in turn until one yields a present value.
pub struct Precedence<'a, T> {
    candidates: Vec<Candidate<'a, T>>,
}

impl<T> Default for Precedence<'_, T> {
    fn default() -> Self {
        Self {
            candidates: Vec::new(),
        }
    }
}

impl<'a, T: Present + 'a> Precedence<'a, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a deferred candidate. It is only called if every earlier candidate was absent.
    pub fn candidate(mut self, f: impl FnOnce() -> Option<T> + 'a) -> Self {
        self.candidates.push(Box::new(f));
        self
    }

    /// Add a literal candidate.
    pub fn value(self, value: T) -> Self {
        self.candidate(move || Some(value))
    }

    pub fn get(self) -> Result<T> {
        self.candidates
            .into_iter()
            .find_map(|candidate| candidate().filter(|v| v.is_present()))
            .ok_or(LemurError::NoCandidate)
    }

    /// Resolve and convert the chosen value with `f`.
    pub fn get_with<R>(self, f: impl FnOnce(T) -> R) -> Result<R> {
        self.get().map(f)
    }
}
