//! # Polling remote-branch observer.
//!
//! [`GitObserver`] watches `<remote>/<branch>` of a local clone. Every poll it
//! fetches the branch with the `git` executable, resolves the remote-tracking ref
//! with gix, and reports a `Modified` event when the tip commit moved. With
//! [`GitObserver::pull`] enabled the worktree is fast-forwarded before the event is sent.
//!
//! Credentials come from git's own configuration (credential helpers, ssh agent)
//! unless [`GitObserver::with_basic_auth`] is set. Basic auth reaches git as an
//! `http.extraHeader` through `GIT_CONFIG_*` environment variables (git 2.31+),
//! so the secret never shows up in the process arguments.
//!
//! ## Events
//! - `Modified(GitChange)` remote tip moved
//! - `Error` fetch, ref lookup or pull failed; polling continues with the last known tip

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::poll::{PollConfig, send_all};
use crate::error::ObserverError;
use crate::events::Event;
use crate::observers::Observer;

/// Tip of the watched remote branch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GitChange {
    pub remote: String,
    pub branch: String,
    /// Hex commit id.
    pub commit: String,
}

/// HTTP basic credentials for fetch and pull.
#[derive(Clone)]
struct BasicAuth {
    username: String,
    password: String,
}

impl BasicAuth {
    fn header(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Authorization: Basic {token}")
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Observes a remote branch of a local repository by polling.
#[derive(Clone, Debug)]
pub struct GitObserver {
    repo: PathBuf,
    remote: String,
    branch: String,
    pull: bool,
    auth: Option<BasicAuth>,
    poll: PollConfig,
}

impl GitObserver {
    /// Watches `origin/<branch>` of the clone at `repo`.
    pub fn new(repo: impl Into<PathBuf>, branch: impl Into<String>, poll: PollConfig) -> Self {
        Self {
            repo: repo.into(),
            remote: "origin".to_string(),
            branch: branch.into(),
            pull: false,
            auth: None,
            poll,
        }
    }

    /// Uses `remote` instead of `origin` (empty keeps `origin`).
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        let remote = remote.into();
        if !remote.is_empty() {
            self.remote = remote;
        }
        self
    }

    /// Fast-forwards the worktree whenever the remote tip moves.
    pub fn pull(mut self, enabled: bool) -> Self {
        self.pull = enabled;
        self
    }

    /// Authenticates fetch and pull against an HTTP(S) remote.
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.auth = Some(BasicAuth {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    fn tracking_ref(&self) -> String {
        format!("refs/remotes/{}/{}", self.remote, self.branch)
    }

    /// Resolves the remote-tracking ref to a commit id.
    async fn remote_tip(&self) -> Result<String, ObserverError> {
        let repo = self.repo.clone();
        let reference = self.tracking_ref();
        tokio::task::spawn_blocking(move || {
            let repo = gix::open(&repo).map_err(ObserverError::git)?;
            let id = repo
                .rev_parse_single(reference.as_str())
                .map_err(ObserverError::git)?;
            Ok::<_, ObserverError>(id.detach().to_string())
        })
        .await
        .map_err(ObserverError::git)?
    }

    async fn fetch(&self) -> Result<(), ObserverError> {
        self.git(&["fetch", "--quiet", self.remote.as_str(), self.branch.as_str()])
            .await
    }

    async fn fast_forward(&self) -> Result<(), ObserverError> {
        self.git(&["pull", "--ff-only", "--quiet", self.remote.as_str(), self.branch.as_str()])
            .await
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(gix::path::env::exe_invocation());
        cmd.args(args).current_dir(&self.repo).kill_on_drop(true);
        if let Some(auth) = &self.auth {
            cmd.env("GIT_CONFIG_COUNT", "1")
                .env("GIT_CONFIG_KEY_0", "http.extraHeader")
                .env("GIT_CONFIG_VALUE_0", auth.header());
        }
        cmd
    }

    async fn git(&self, args: &[&str]) -> Result<(), ObserverError> {
        let out = self
            .command(args)
            .output()
            .await
            .map_err(|e| ObserverError::io(&self.repo, e))?;
        if out.status.success() {
            Ok(())
        } else {
            Err(ObserverError::git(format!(
                "git {} failed ({}): {}",
                args.first().copied().unwrap_or_default(),
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            )))
        }
    }

    /// One poll: fetch, compare, optionally pull. Returns the new tip if it moved.
    async fn check(&self, last: &str) -> Result<Option<String>, ObserverError> {
        self.fetch().await?;
        let tip = self.remote_tip().await?;
        if tip == last {
            return Ok(None);
        }
        if self.pull {
            self.fast_forward().await?;
        }
        Ok(Some(tip))
    }

    fn change(&self, commit: String) -> GitChange {
        GitChange {
            remote: self.remote.clone(),
            branch: self.branch.clone(),
            commit,
        }
    }
}

#[async_trait]
impl Observer for GitObserver {
    type Item = GitChange;

    fn name(&self) -> &str {
        "git"
    }

    async fn watch(
        &self,
        ctx: CancellationToken,
    ) -> Result<mpsc::Receiver<Event<GitChange>>, ObserverError> {
        let mut last = self
            .poll
            .setup(self.name(), &ctx, || self.remote_tip())
            .await?;
        debug!(repo = %self.repo.display(), reference = %self.tracking_ref(), commit = %last, "tracking");

        let (tx, rx) = self.poll.channel();
        let me = self.clone();
        tokio::spawn(async move {
            while me.poll.tick(&ctx).await {
                let event = match me.check(&last).await {
                    Ok(None) => continue,
                    Ok(Some(tip)) => {
                        info!(reference = %me.tracking_ref(), from = %last, to = %tip, "remote branch moved");
                        last = tip.clone();
                        Event::modified(me.change(tip))
                    }
                    Err(e) => {
                        warn!(repo = %me.repo.display(), error = %e, "poll failed");
                        Event::error(e.to_string())
                    }
                };
                if !send_all(&tx, &ctx, vec![event]).await {
                    break;
                }
            }
        });
        Ok(rx)
    }

    async fn list(&self) -> Result<Vec<GitChange>, ObserverError> {
        let tip = self.remote_tip().await.map_err(|e| ObserverError::List {
            observer: self.name().to_string(),
            error: e.to_string(),
        })?;
        Ok(vec![self.change(tip)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::RetryPolicy;
    use std::time::Duration;

    fn fast() -> PollConfig {
        PollConfig::every(Duration::from_millis(20)).with_retry(RetryPolicy::once())
    }

    #[test]
    fn remote_defaults_to_origin() {
        let obs = GitObserver::new("/repo", "main", fast()).with_remote("");
        assert_eq!(obs.tracking_ref(), "refs/remotes/origin/main");
        let obs = obs.with_remote("upstream");
        assert_eq!(obs.tracking_ref(), "refs/remotes/upstream/main");
    }

    fn env_of(cmd: &Command) -> Vec<(String, String)> {
        cmd.as_std()
            .get_envs()
            .filter_map(|(k, v)| Some((k.to_str()?.to_string(), v?.to_str()?.to_string())))
            .collect()
    }

    #[test]
    fn basic_auth_is_passed_as_an_extra_header() {
        let obs = GitObserver::new("/repo", "main", fast()).with_basic_auth("user", "secret");
        let cmd = obs.command(&["fetch", "--quiet", "origin", "main"]);

        let env = env_of(&cmd);
        assert!(env.contains(&("GIT_CONFIG_COUNT".to_string(), "1".to_string())));
        assert!(env.contains(&("GIT_CONFIG_KEY_0".to_string(), "http.extraHeader".to_string())));
        assert!(env.contains(&(
            "GIT_CONFIG_VALUE_0".to_string(),
            "Authorization: Basic dXNlcjpzZWNyZXQ=".to_string()
        )));

        let args: Vec<_> = cmd.as_std().get_args().collect();
        assert!(args.iter().all(|a| !a.to_string_lossy().contains("secret")));
        assert!(!format!("{obs:?}").contains("secret"));
    }

    #[test]
    fn no_auth_leaves_the_environment_alone() {
        let cmd = GitObserver::new("/repo", "main", fast()).command(&["fetch"]);
        assert!(env_of(&cmd).is_empty());
    }

    #[tokio::test]
    async fn non_repository_fails_setup_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let obs = GitObserver::new(dir.path(), "main", fast());
        let err = obs.watch(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ObserverError::Setup { .. }));
        assert!(matches!(obs.list().await, Err(ObserverError::List { .. })));
    }
}
