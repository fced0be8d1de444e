use crate::domains::git::GitOps;
use crate::domains::rules::{HookContext, HookRunner, RuleSet, select_evictions};
use crate::domains::sessions::entity::{EnrichedSession, Session, SessionState};
use crate::domains::sessions::lifecycle::bootstrapper::{
    BootstrapConfig, WorkingCopyBootstrapper, rename_dir,
};
use crate::domains::sessions::lifecycle::finalizer::SessionFinalizer;
use crate::domains::sessions::lifecycle::recycler::{RecycleContext, Recycler};
use crate::domains::sessions::lifecycle::spawner::Spawner;
use crate::domains::sessions::lifecycle::teardown::SessionTeardown;
use crate::domains::sessions::repository::SessionStore;
use crate::domains::sessions::utils::SessionUtils;
use crate::domains::settings::HiveConfig;
use crate::errors::{HiveError, is_cancelled};
use crate::infrastructure::executor::{CommandExecutor, OutputSinks};
use anyhow::{Context, Result, anyhow};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct SessionCreationParams<'a> {
    pub name: &'a str,
    /// Detected from `source` (or the current directory) when absent.
    pub remote: Option<&'a str>,
    /// Checkout that rule copy patterns are resolved against.
    pub source: Option<&'a Path>,
    pub prompt: Option<&'a str>,
    pub use_batch_spawn: bool,
}

/// Orchestrates session creation, recycling, deletion and pruning.
pub struct SessionManager {
    config: HiveConfig,
    rules: RuleSet,
    store: Arc<dyn SessionStore>,
    git: Arc<dyn GitOps>,
    executor: Arc<dyn CommandExecutor>,
    sinks: OutputSinks,
    utils: SessionUtils,
}

impl SessionManager {
    pub fn new(
        config: HiveConfig,
        store: Arc<dyn SessionStore>,
        git: Arc<dyn GitOps>,
        executor: Arc<dyn CommandExecutor>,
        sinks: OutputSinks,
    ) -> Result<Self> {
        let rules = RuleSet::compile(&config.rules)?;
        let utils = SessionUtils::new(config.repos_dir(), config.context_dir());
        debug!(
            "Session manager ready: {} rules, data dir {}",
            rules.len(),
            config.data_dir.display()
        );
        Ok(Self {
            config,
            rules,
            store,
            git,
            executor,
            sinks,
            utils,
        })
    }

    pub fn config(&self) -> &HiveConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    fn teardown(&self) -> SessionTeardown<'_> {
        SessionTeardown::new(self.store.as_ref())
    }

    async fn detect_remote(
        &self,
        cancel: &CancellationToken,
        source: Option<&Path>,
    ) -> Result<String> {
        let dir = match source {
            Some(dir) => dir.to_path_buf(),
            None => std::env::current_dir()
                .map_err(|e| HiveError::io("read current directory", ".", e))?,
        };
        let remote = self
            .git
            .remote_url(cancel, &dir)
            .await
            .with_context(|| format!("Failed to detect git remote in {}", dir.display()))?;
        info!("Detected remote {remote} from {}", dir.display());
        Ok(remote)
    }

    pub async fn create_session(
        &self,
        cancel: &CancellationToken,
        params: SessionCreationParams<'_>,
    ) -> Result<Session> {
        if !SessionUtils::validate_session_name(params.name) {
            return Err(anyhow!("Invalid session name '{}'", params.name));
        }

        let remote = match params.remote.map(str::trim).filter(|r| !r.is_empty()) {
            Some(remote) => remote.to_string(),
            None => self.detect_remote(cancel, params.source).await?,
        };
        let name = params.name.trim();
        let slug = SessionUtils::slugify(name);
        info!("Creating session '{name}' for {remote}");

        let working_copy = WorkingCopyBootstrapper::new(
            self.store.as_ref(),
            self.git.as_ref(),
            &self.utils,
            self.config.auto_delete_corrupted,
        )
        .bootstrap(
            cancel,
            BootstrapConfig {
                name,
                slug: &slug,
                remote: &remote,
            },
        )
        .await
        .with_context(|| format!("Failed to prepare a working copy for '{name}'"))?;

        let finalizer = SessionFinalizer::new(self.store.as_ref());
        let hook_context = {
            let session = working_copy.session();
            let info = SessionUtils::remote_info(&remote);
            HookContext {
                path: session.path.display().to_string(),
                name: session.name.clone(),
                slug: session.slug.clone(),
                id: session.id.clone(),
                remote: remote.clone(),
                owner: info.owner,
                repo: info.repo,
            }
        };
        let hooks = HookRunner {
            rules: &self.rules,
            executor: self.executor.as_ref(),
            sinks: &self.sinks,
        };
        if let Err(e) = hooks
            .apply(
                cancel,
                &remote,
                params.source,
                &working_copy.session().path,
                &hook_context,
            )
            .await
        {
            finalizer.abandon(&working_copy).await;
            return Err(e.context(format!("Failed to apply rules for session '{name}'")));
        }

        let session = match finalizer.finalize_creation(working_copy.clone()) {
            Ok(session) => session,
            Err(e) => {
                finalizer.abandon(&working_copy).await;
                return Err(e);
            }
        };

        let spawn_commands = if params.use_batch_spawn {
            &self.config.commands.batch_spawn
        } else {
            &self.config.commands.spawn
        };
        Spawner {
            commands: spawn_commands,
            executor: self.executor.as_ref(),
            sinks: &self.sinks,
        }
        .spawn(
            cancel,
            &session,
            &self.utils.context_dir(&remote),
            params.prompt,
        )
        .await?;

        Ok(session)
    }

    pub async fn recycle_session(&self, cancel: &CancellationToken, id: &str) -> Result<Session> {
        let session = self
            .store
            .get(id)
            .with_context(|| format!("Failed to recycle session '{id}'"))?;

        if session.state != SessionState::Active {
            return Err(HiveError::InvalidSessionState {
                session_id: id.to_string(),
                current_state: session.state.to_string(),
                expected_state: SessionState::Active.to_string(),
            }
            .into());
        }

        if let Err(e) = self.git.is_valid_repo(cancel, &session.path).await {
            if is_cancelled(&e) {
                return Err(e);
            }
            let reason = format!("{e:#}");
            self.teardown()
                .mark_corrupted(cancel, &session, &reason, self.config.auto_delete_corrupted)
                .await?;
            return Err(HiveError::Corrupted {
                session_id: id.to_string(),
                reason,
            }
            .into());
        }

        let default_branch = self
            .git
            .default_branch(cancel, &session.path)
            .await
            .with_context(|| format!("Failed to resolve default branch for session '{id}'"))?;

        Recycler {
            commands: &self.config.commands.recycle,
            executor: self.executor.as_ref(),
            sinks: &self.sinks,
        }
        .run(
            cancel,
            &session.path,
            &RecycleContext {
                path: session.path.display().to_string(),
                id: session.id.clone(),
                remote: session.remote.clone(),
                default_branch,
            },
        )
        .await
        .with_context(|| format!("Failed to recycle session '{id}'"))?;

        let target = self.utils.recycle_path(&session.remote, &session.id);
        rename_dir(cancel, &session.path, &target).await?;

        let mut recycled = session.clone();
        recycled.path = target;
        recycled.state = SessionState::Recycled;
        recycled.touch();
        if let Err(e) = self.store.save(&recycled) {
            if let Err(rollback) =
                rename_dir(&CancellationToken::new(), &recycled.path, &session.path).await
            {
                warn!("Failed to restore session '{id}' after a failed save: {rollback:#}");
            }
            return Err(e.context(format!("Failed to persist recycled session '{id}'")));
        }
        info!("Recycled session '{id}' into {}", recycled.path.display());

        match self.enforce_retention(cancel, &recycled.remote).await {
            Ok(evicted) if evicted > 0 => {
                info!("Evicted {evicted} recycled sessions for {}", recycled.remote);
            }
            Ok(_) => {}
            Err(e) if is_cancelled(&e) => return Err(e),
            Err(e) => warn!("Retention sweep for {} failed: {e:#}", recycled.remote),
        }

        Ok(recycled)
    }

    pub async fn delete_session(&self, cancel: &CancellationToken, id: &str) -> Result<()> {
        let session = self
            .store
            .get(id)
            .with_context(|| format!("Failed to delete session '{id}'"))?;
        self.teardown().delete(cancel, &session).await
    }

    /// Delete recycled sessions for `remote` beyond its retention limit, oldest first.
    pub async fn enforce_retention(
        &self,
        cancel: &CancellationToken,
        remote: &str,
    ) -> Result<usize> {
        let limit = self.rules.max_recycled(remote);
        let recycled: Vec<Session> = self
            .store
            .list()?
            .into_iter()
            .filter(|session| session.is_recyclable_for(remote))
            .collect();
        debug!(
            "Retention for {remote}: {} recycled, limit {limit}",
            recycled.len()
        );
        self.delete_each(cancel, select_evictions(recycled, limit))
            .await
    }

    /// Delete every corrupted session, then every recycled one (`all`) or those beyond each
    /// remote's retention limit. Returns how many were deleted.
    pub async fn prune(&self, cancel: &CancellationToken, all: bool) -> Result<usize> {
        let sessions = self.store.list()?;
        let (corrupted, recycled): (Vec<Session>, Vec<Session>) = sessions
            .into_iter()
            .filter(|session| session.state != SessionState::Active)
            .partition(|session| session.state == SessionState::Corrupted);

        let mut deleted = self.delete_each(cancel, corrupted).await?;

        if all {
            deleted += self.delete_each(cancel, recycled).await?;
        } else {
            let mut by_remote: BTreeMap<String, Vec<Session>> = BTreeMap::new();
            for session in recycled {
                by_remote
                    .entry(session.remote.clone())
                    .or_default()
                    .push(session);
            }
            for (remote, sessions) in by_remote {
                let limit = self.rules.max_recycled(&remote);
                deleted += self
                    .delete_each(cancel, select_evictions(sessions, limit))
                    .await?;
            }
        }

        info!("Pruned {deleted} sessions");
        Ok(deleted)
    }

    /// Per-item fault tolerant delete; only cancellation stops the sweep.
    async fn delete_each(
        &self,
        cancel: &CancellationToken,
        sessions: Vec<Session>,
    ) -> Result<usize> {
        let teardown = self.teardown();
        let mut deleted = 0;
        for session in sessions {
            match teardown.delete(cancel, &session).await {
                Ok(()) => deleted += 1,
                Err(e) if is_cancelled(&e) => return Err(e),
                Err(e) => warn!("Skipping session '{}': {e:#}", session.id),
            }
        }
        Ok(deleted)
    }

    pub fn get_session(&self, id: &str) -> Result<Session> {
        self.store.get(id)
    }

    pub fn list_sessions(&self) -> Result<Vec<Session>> {
        self.store.list()
    }

    /// Sessions with best-effort git status; failed queries leave fields empty.
    pub async fn list_enriched_sessions(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<EnrichedSession>> {
        let sessions = self.store.list()?;
        let mut enriched = Vec::with_capacity(sessions.len());

        for session in sessions {
            if !session.expects_directory() || !session.path.exists() {
                enriched.push(EnrichedSession {
                    session,
                    branch: None,
                    is_clean: None,
                    diff_stats: None,
                });
                continue;
            }

            let branch = self.git.branch(cancel, &session.path).await;
            let is_clean = self.git.is_clean(cancel, &session.path).await;
            let diff_stats = self.git.diff_stats(cancel, &session.path).await;
            let failures = [
                branch.as_ref().err(),
                is_clean.as_ref().err(),
                diff_stats.as_ref().err(),
            ];
            for result in failures.into_iter().flatten() {
                if is_cancelled(result) {
                    return Err(HiveError::cancelled("list sessions").into());
                }
                debug!("Git status query failed for '{}': {result:#}", session.id);
            }

            enriched.push(EnrichedSession {
                session,
                branch: branch.ok(),
                is_clean: is_clean.ok(),
                diff_stats: diff_stats.ok(),
            });
        }

        Ok(enriched)
    }
}
