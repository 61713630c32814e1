//! Local committer identity, used to show "You" as the author.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::cache::{DEFAULT_CACHE_SIZE, SharedLru};
use crate::git::runner::{CONFIG_TIMEOUT, GitCommand, GitRunner};
use crate::models::UserIdentity;

pub struct IdentityResolver {
    runner: Arc<dyn GitRunner>,
    cache: SharedLru<PathBuf, Option<UserIdentity>>,
}

impl IdentityResolver {
    pub fn new(runner: Arc<dyn GitRunner>) -> Self {
        Self {
            runner,
            cache: SharedLru::new(DEFAULT_CACHE_SIZE),
        }
    }

    /// `user.name` and `user.email` for the repository at `cwd`.
    ///
    /// Both are queried concurrently. A partial identity is useless for
    /// matching, so a missing value yields `None`; the answer is cached either
    /// way until `clear`.
    pub async fn current_user(&self, cwd: &Path) -> Option<UserIdentity> {
        let key = cwd.to_path_buf();
        if let Some(cached) = self.cache.get(&key) {
            return cached;
        }

        let (name, email) = tokio::join!(
            self.config_value(cwd, "user.name"),
            self.config_value(cwd, "user.email")
        );
        let identity = match (name, email) {
            (Some(name), Some(email)) => Some(UserIdentity { name, email }),
            _ => None,
        };
        debug!(cwd = %cwd.display(), identity = ?identity, "resolved current git user");
        self.cache.set(key, identity.clone());
        identity
    }

    async fn config_value(&self, cwd: &Path, key: &str) -> Option<String> {
        let command = GitCommand::new(cwd, ["config", key]).with_timeout(CONFIG_TIMEOUT);
        self.runner
            .run(&command)
            .await
            .ok()
            .map(|stdout| stdout.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    pub fn set_limit(&self, limit: usize) {
        self.cache.set_limit(limit);
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}
