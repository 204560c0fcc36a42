//! In-memory forge and git doubles shared by the integration tests.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reposync_core::branch::{DEFAULT_BRANCH_PATTERN, DEFAULT_BRANCH_TEMPLATE};
use reposync_core::{BranchPolicy, FileBinding, FileBindings, Identity, RepositoryTarget};
use reposync_forge::{
    CreatedComment, CreatedPullRequest, Forge, ForgeError, ForgeUser, NewPullRequest,
    PullRequestHead, PullRequestState,
};
use reposync_sync::{
    CancelSignal, ChangeKind, GitBackend, GitError, StatusEntry, TaskContext, TaskSettings,
};
use walkdir::WalkDir;

pub fn target(s: &str) -> RepositoryTarget {
    s.parse().expect("target")
}

pub fn policy() -> BranchPolicy {
    BranchPolicy::new(DEFAULT_BRANCH_PATTERN, DEFAULT_BRANCH_TEMPLATE).expect("policy")
}

pub fn bindings(pairs: &[(&str, &str)]) -> FileBindings {
    FileBindings::new(
        pairs
            .iter()
            .map(|(s, d)| FileBinding::new(*s, *d))
            .collect(),
    )
    .expect("bindings")
}

pub fn settings(source_root: &Path, workspace_root: &Path, bindings: FileBindings) -> TaskSettings {
    TaskSettings {
        source_root: source_root.to_path_buf(),
        workspace_root: workspace_root.to_path_buf(),
        bindings,
        dry_run: false,
        commit_message: "chore: sync shared files".to_owned(),
        pr_title: "Sync shared files".to_owned(),
        branch_policy: policy(),
        base_branches: vec!["main".to_owned(), "master".to_owned()],
        author: Identity::new("sync-bot", "sync-bot@example.com"),
    }
}

pub fn context(
    forge: &Arc<FakeForge>,
    git: &Arc<FakeGit>,
    settings: TaskSettings,
    cancel: CancelSignal,
) -> TaskContext {
    TaskContext {
        forge: forge.clone(),
        git: git.clone(),
        settings: Arc::new(settings),
        cancel,
    }
}

fn failure(command: &str) -> GitError {
    GitError::Failed {
        command: command.to_owned(),
        status: "exit status: 128".to_owned(),
        stderr: "fatal: simulated failure".to_owned(),
    }
}

// ---------------------------------------------------------------------------
// Forge
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForgeCall {
    List(String),
    CreatePullRequest(String, NewPullRequest),
    Comment(String, u64, String),
    User,
}

#[derive(Debug, Default)]
pub struct FakeForge {
    pub open: Mutex<HashMap<String, Vec<PullRequestHead>>>,
    pub fail_list: Mutex<HashSet<String>>,
    pub fail_create: Mutex<bool>,
    pub fail_comment: Mutex<bool>,
    pub list_delay: Mutex<Option<Duration>>,
    pub user_email: Option<String>,
    pub calls: Mutex<Vec<ForgeCall>>,
    next_number: AtomicU64,
}

impl FakeForge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_number: AtomicU64::new(100),
            ..Self::default()
        })
    }

    pub fn with_open(self: &Arc<Self>, repo: &str, prs: Vec<PullRequestHead>) -> Arc<Self> {
        self.open.lock().unwrap().insert(repo.to_owned(), prs);
        self.clone()
    }

    pub fn fail_listing(&self, repo: &str) {
        self.fail_list.lock().unwrap().insert(repo.to_owned());
    }

    pub fn calls(&self) -> Vec<ForgeCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<(String, NewPullRequest)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ForgeCall::CreatePullRequest(repo, pr) => Some((repo, pr)),
                _ => None,
            })
            .collect()
    }

    pub fn comments(&self) -> Vec<(String, u64, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ForgeCall::Comment(repo, n, body) => Some((repo, n, body)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Forge for FakeForge {
    async fn list_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        _state: PullRequestState,
    ) -> Result<Vec<PullRequestHead>, ForgeError> {
        let full = format!("{owner}/{repo}");
        self.calls.lock().unwrap().push(ForgeCall::List(full.clone()));
        let delay = *self.list_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_list.lock().unwrap().contains(&full) {
            return Err(ForgeError::Unexpected {
                operation: "listing pull requests",
                detail: "simulated outage".to_owned(),
            });
        }
        Ok(self
            .open
            .lock()
            .unwrap()
            .get(&full)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        request: &NewPullRequest,
    ) -> Result<CreatedPullRequest, ForgeError> {
        let full = format!("{owner}/{repo}");
        self.calls
            .lock()
            .unwrap()
            .push(ForgeCall::CreatePullRequest(full.clone(), request.clone()));
        if *self.fail_create.lock().unwrap() {
            return Err(ForgeError::Unexpected {
                operation: "creating pull request",
                detail: "simulated outage".to_owned(),
            });
        }
        let number = self.next_number.fetch_add(1, Ordering::SeqCst);
        Ok(CreatedPullRequest {
            number,
            url: format!("https://github.test/{full}/pull/{number}"),
        })
    }

    async fn create_comment(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        body: &str,
    ) -> Result<CreatedComment, ForgeError> {
        let full = format!("{owner}/{repo}");
        self.calls.lock().unwrap().push(ForgeCall::Comment(
            full.clone(),
            issue_number,
            body.to_owned(),
        ));
        if *self.fail_comment.lock().unwrap() {
            return Err(ForgeError::Unexpected {
                operation: "creating comment",
                detail: "simulated outage".to_owned(),
            });
        }
        Ok(CreatedComment {
            url: format!("https://github.test/{full}/pull/{issue_number}#issuecomment-1"),
        })
    }

    async fn authenticated_user(&self) -> Result<ForgeUser, ForgeError> {
        self.calls.lock().unwrap().push(ForgeCall::User);
        Ok(ForgeUser {
            login: "octo".to_owned(),
            id: 42,
            name: None,
            email: self.user_email.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Git
// ---------------------------------------------------------------------------

pub type Snapshot = BTreeMap<PathBuf, Vec<u8>>;

/// Clones are plain directories seeded with `files`; status compares the
/// tree with what was last cloned or committed.
#[derive(Debug, Default)]
pub struct FakeGit {
    pub files: Mutex<HashMap<String, Vec<(String, String)>>>,
    pub remote_branches: Vec<String>,
    pub default_branch: Option<String>,
    pub fail_clone: Mutex<HashSet<String>>,
    pub fail_push: Mutex<bool>,
    pub fail_checkout: Mutex<bool>,
    pub clone_delay: Option<Duration>,
    pub calls: Mutex<Vec<String>>,
    pub baselines: Mutex<HashMap<PathBuf, Snapshot>>,
}

impl FakeGit {
    pub fn new() -> Self {
        Self {
            remote_branches: vec!["main".to_owned()],
            default_branch: Some("main".to_owned()),
            ..Self::default()
        }
    }

    pub fn seed(self, repo: &str, files: &[(&str, &str)]) -> Self {
        self.files.lock().unwrap().insert(
            repo.to_owned(),
            files
                .iter()
                .map(|(p, c)| ((*p).to_owned(), (*c).to_owned()))
                .collect(),
        );
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, verb: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.split(' ').next() == Some(verb))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn snapshot(root: &Path) -> Snapshot {
        WalkDir::new(root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let rel = e.path().strip_prefix(root).expect("prefix").to_path_buf();
                (rel, fs::read(e.path()).expect("read"))
            })
            .collect()
    }
}

#[async_trait]
impl GitBackend for FakeGit {
    async fn clone_repository(
        &self,
        target: &RepositoryTarget,
        dest: &Path,
    ) -> Result<(), GitError> {
        self.record(format!("clone {target}"));
        if let Some(delay) = self.clone_delay {
            tokio::time::sleep(delay).await;
        }
        fs::create_dir_all(dest).expect("mkdir clone");
        if self.fail_clone.lock().unwrap().contains(&target.full_name()) {
            fs::write(dest.join("partial"), "x").expect("partial");
            return Err(failure("clone"));
        }
        let files = self
            .files
            .lock()
            .unwrap()
            .get(&target.full_name())
            .cloned()
            .unwrap_or_default();
        for (path, contents) in files {
            let path = dest.join(path);
            fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
            fs::write(path, contents).expect("seed");
        }
        self.baselines
            .lock()
            .unwrap()
            .insert(dest.to_path_buf(), Self::snapshot(dest));
        Ok(())
    }

    async fn create_branch(&self, _repo: &Path, branch: &str) -> Result<(), GitError> {
        self.record(format!("create_branch {branch}"));
        if *self.fail_checkout.lock().unwrap() {
            return Err(failure("checkout -b"));
        }
        Ok(())
    }

    async fn checkout_remote_branch(&self, _repo: &Path, branch: &str) -> Result<(), GitError> {
        self.record(format!("checkout {branch}"));
        if *self.fail_checkout.lock().unwrap() {
            return Err(failure("checkout -B"));
        }
        Ok(())
    }

    async fn stage_all(&self, _repo: &Path) -> Result<(), GitError> {
        self.record("stage".to_owned());
        Ok(())
    }

    async fn commit(&self, repo: &Path, message: &str, author: &Identity) -> Result<(), GitError> {
        self.record(format!("commit {author} {message}"));
        self.baselines
            .lock()
            .unwrap()
            .insert(repo.to_path_buf(), Self::snapshot(repo));
        Ok(())
    }

    async fn force_push(&self, _repo: &Path, branch: &str) -> Result<(), GitError> {
        self.record(format!("push {branch}"));
        if *self.fail_push.lock().unwrap() {
            return Err(failure("push"));
        }
        Ok(())
    }

    async fn status(&self, repo: &Path) -> Result<Vec<StatusEntry>, GitError> {
        self.record("status".to_owned());
        let baseline = self
            .baselines
            .lock()
            .unwrap()
            .get(repo)
            .cloned()
            .unwrap_or_default();
        let current = Self::snapshot(repo);
        let mut entries = Vec::new();
        for (path, data) in &current {
            match baseline.get(path) {
                None => entries.push(StatusEntry::new(ChangeKind::Untracked, path)),
                Some(old) if old != data => {
                    entries.push(StatusEntry::new(ChangeKind::Modified, path))
                }
                Some(_) => {}
            }
        }
        for path in baseline.keys().filter(|p| !current.contains_key(*p)) {
            entries.push(StatusEntry::new(ChangeKind::Deleted, path));
        }
        Ok(entries)
    }

    async fn remote_branch_exists(&self, _repo: &Path, branch: &str) -> Result<bool, GitError> {
        Ok(self.remote_branches.iter().any(|b| b == branch))
    }

    async fn remote_default_branch(&self, _repo: &Path) -> Result<Option<String>, GitError> {
        Ok(self.default_branch.clone())
    }
}
