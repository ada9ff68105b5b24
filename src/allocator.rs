//! Short code allocation
//!
//! The allocator picks a code for a new link: either the caller's alias, or a
//! freshly generated code that is not present in the store yet. All checks
//! here are advisory reads. The link table's insert-if-absent is what finally
//! guarantees uniqueness, so a code returned from here can still lose a race
//! at insert time.

use std::sync::Arc;

use rand::{distr::Alphanumeric, Rng};
use tracing::{debug, warn};

use crate::error::ServiceError;
use crate::repository::Repository;

/// Length of system-generated short codes
pub const GENERATED_CODE_LEN: usize = 8;

/// Source of candidate short codes
pub trait CodeGenerator: Send + Sync + 'static {
    fn generate(&self) -> String;
}

/// Generates fixed-length codes over `[A-Za-z0-9]` from the thread-local RNG
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(GENERATED_CODE_LEN)
            .map(char::from)
            .collect()
    }
}

pub struct CodeAllocator {
    repo: Arc<dyn Repository>,
    generator: Arc<dyn CodeGenerator>,
    max_attempts: usize,
}

impl CodeAllocator {
    pub fn new(
        repo: Arc<dyn Repository>,
        generator: Arc<dyn CodeGenerator>,
        max_attempts: usize,
    ) -> Self {
        Self {
            repo,
            generator,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Returns a code for a new link
    ///
    /// With `Some(alias)` the alias is returned unless it already exists, in
    /// which case the result is [`ServiceError::AliasTaken`]. With `None` a
    /// random code is generated until an unused one is found, giving up with
    /// [`ServiceError::Persistence`] after the configured number of attempts.
    pub async fn allocate(&self, custom_alias: Option<&str>) -> Result<String, ServiceError> {
        match custom_alias {
            Some(alias) => self.claim_alias(alias).await,
            None => self.generate_unused().await,
        }
    }

    async fn claim_alias(&self, alias: &str) -> Result<String, ServiceError> {
        if self.repo.link_exists(alias).await? {
            return Err(ServiceError::AliasTaken(alias.to_string()));
        }
        Ok(alias.to_string())
    }

    async fn generate_unused(&self) -> Result<String, ServiceError> {
        for attempt in 1..=self.max_attempts {
            let candidate = self.generator.generate();
            if !self.repo.link_exists(&candidate).await? {
                return Ok(candidate);
            }
            debug!(attempt, short_code = %candidate, "generated code collided, retrying");
        }

        warn!(
            attempts = self.max_attempts,
            "no unused short code found; generator or table is saturated"
        );
        Err(ServiceError::Persistence(format!(
            "no unused short code after {} attempts",
            self.max_attempts
        )))
    }
}
