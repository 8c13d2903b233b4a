//! In-memory stand-ins for the external services, shared by unit tests.

use crate::api::Clean;
use crate::error::ServiceError;
use crate::github::{RefUpdate, Tree, TreeItem, VersionControl};
use crate::models::{Article, BLOB_MODE, CommitTreeEntry, StoreKey};
use crate::scrapers::Extract;
use crate::store::{ListPage, ObjectStore};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

fn failure(service: &'static str) -> ServiceError {
    ServiceError::Status {
        service,
        status: 500,
    }
}

/// Extraction fake keyed by source URL. Unknown URLs fail with a 404.
#[derive(Debug, Default)]
pub struct FakeExtractor {
    responses: HashMap<String, Result<Vec<Article>, u16>>,
    calls: Mutex<Vec<String>>,
}

impl FakeExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_articles(mut self, source_url: &str, articles: Vec<Article>) -> Self {
        self.responses.insert(source_url.to_string(), Ok(articles));
        self
    }

    pub fn with_status(mut self, source_url: &str, status: u16) -> Self {
        self.responses.insert(source_url.to_string(), Err(status));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Extract for FakeExtractor {
    async fn extract(&self, source_url: &str) -> Result<Vec<Article>, ServiceError> {
        self.calls.lock().unwrap().push(source_url.to_string());
        match self.responses.get(source_url) {
            Some(Ok(articles)) => Ok(articles.clone()),
            Some(Err(status)) => Err(ServiceError::Status {
                service: "extract",
                status: *status,
            }),
            None => Err(ServiceError::Status {
                service: "extract",
                status: 404,
            }),
        }
    }
}

/// Cleaning fake that answers `[{prompt}]{content}` and records every call.
#[derive(Debug, Default)]
pub struct FakeCleaner {
    fail_all: bool,
    failing_prompts: HashSet<String>,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeCleaner {
    pub fn tagging() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    pub fn failing_prompt(mut self, prompt: &str) -> Self {
        self.failing_prompts.insert(prompt.to_string());
        self
    }

    /// Inputs sent with any of `prompts`, in call order.
    pub fn inputs_for(&self, prompts: &[&str]) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(prompt, _)| prompts.contains(&prompt.as_str()))
            .map(|(_, content)| content.clone())
            .collect()
    }
}

impl Clean for FakeCleaner {
    async fn clean(&self, content: &str, prompt: &str) -> Result<String, ServiceError> {
        self.calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), content.to_string()));
        if self.fail_all || self.failing_prompts.contains(prompt) {
            return Err(failure("clean"));
        }
        Ok(format!("[{prompt}]{content}"))
    }
}

/// Object store fake with configurable page size and failure injection.
#[derive(Debug)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    page_size: usize,
    failing_categories: HashSet<String>,
    failing_gets: HashSet<String>,
    fail_list: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_page_size(1000)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            page_size: page_size.max(1),
            failing_categories: HashSet::new(),
            failing_gets: HashSet::new(),
            fail_list: false,
        }
    }

    /// Puts for this category label fail.
    pub fn failing_category(mut self, label: &str) -> Self {
        self.failing_categories.insert(label.to_string());
        self
    }

    pub fn failing_get(mut self, key: &str) -> Self {
        self.failing_gets.insert(key.to_string());
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn insert(&self, key: &str, bytes: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), bytes.to_vec());
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }
}

impl ObjectStore for MemoryStore {
    async fn put(&self, key: &StoreKey, bytes: Vec<u8>) -> Result<(), ServiceError> {
        if self.failing_categories.contains(&key.category) {
            return Err(failure("store"));
        }
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn list_page(
        &self,
        prefix: &str,
        continuation: Option<&str>,
    ) -> Result<ListPage, ServiceError> {
        if self.fail_list {
            return Err(failure("store"));
        }
        let offset: usize = continuation.and_then(|t| t.parse().ok()).unwrap_or(0);
        let matching: Vec<String> = self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        let end = (offset + self.page_size).min(matching.len());
        let keys = matching.get(offset..end).map(<[String]>::to_vec).unwrap_or_default();
        let next_continuation_token = (end < matching.len()).then(|| end.to_string());
        Ok(ListPage {
            keys,
            next_continuation_token,
        })
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, ServiceError> {
        if self.failing_gets.contains(key) {
            return Err(failure("store"));
        }
        self.object(key).ok_or(ServiceError::Status {
            service: "store",
            status: 404,
        })
    }
}

#[derive(Debug, Clone)]
struct CommitObject {
    tree: String,
    parent: Option<String>,
    message: String,
}

#[derive(Debug)]
struct RepoState {
    head: String,
    commits: HashMap<String, CommitObject>,
    trees: HashMap<String, BTreeMap<String, Vec<u8>>>,
    next_id: usize,
    races: usize,
    ref_updates: usize,
}

impl RepoState {
    fn id(&mut self, kind: &str) -> String {
        self.next_id += 1;
        format!("{kind}-{}", self.next_id)
    }

    fn commit(&mut self, files: BTreeMap<String, Vec<u8>>, parent: String, message: &str) -> String {
        let tree = self.id("tree");
        self.trees.insert(tree.clone(), files);
        let sha = self.id("commit");
        self.commits.insert(
            sha.clone(),
            CommitObject {
                tree,
                parent: Some(parent),
                message: message.to_string(),
            },
        );
        sha
    }
}

/// Git repository fake with a single branch.
///
/// `racing(n)` makes the next `n` tree fetches also advance the branch with
/// an unrelated commit, as a concurrent writer would.
#[derive(Debug)]
pub struct MemoryRepo {
    state: Mutex<RepoState>,
    failing_step: Option<&'static str>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        let mut trees = HashMap::new();
        trees.insert(
            "tree-0".to_string(),
            BTreeMap::from([("README.md".to_string(), b"daily news\n".to_vec())]),
        );
        let mut commits = HashMap::new();
        commits.insert(
            "commit-0".to_string(),
            CommitObject {
                tree: "tree-0".to_string(),
                parent: None,
                message: "init".to_string(),
            },
        );
        Self {
            state: Mutex::new(RepoState {
                head: "commit-0".to_string(),
                commits,
                trees,
                next_id: 0,
                races: 0,
                ref_updates: 0,
            }),
            failing_step: None,
        }
    }

    pub fn racing(self, times: usize) -> Self {
        self.state.lock().unwrap().races = times;
        self
    }

    /// Make one of `head`, `tree`, `create_tree`, `create_commit`, `update_ref` fail.
    pub fn failing(mut self, step: &'static str) -> Self {
        self.failing_step = Some(step);
        self
    }

    pub fn head_sha(&self) -> String {
        self.state.lock().unwrap().head.clone()
    }

    pub fn ref_updates(&self) -> usize {
        self.state.lock().unwrap().ref_updates
    }

    pub fn commit_exists(&self, sha: &str) -> bool {
        self.state.lock().unwrap().commits.contains_key(sha)
    }

    pub fn head_message(&self) -> String {
        let state = self.state.lock().unwrap();
        state.commits[&state.head].message.clone()
    }

    pub fn head_parent(&self) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.commits[&state.head].parent.clone()
    }

    /// Files reachable from the branch head.
    pub fn files_at_head(&self) -> BTreeMap<String, Vec<u8>> {
        let state = self.state.lock().unwrap();
        let tree = &state.commits[&state.head].tree;
        state.trees[tree].clone()
    }

    fn check(&self, step: &'static str) -> Result<(), ServiceError> {
        if self.failing_step == Some(step) {
            Err(failure("github"))
        } else {
            Ok(())
        }
    }
}

impl VersionControl for MemoryRepo {
    fn branch(&self) -> &str {
        "main"
    }

    async fn head(&self) -> Result<String, ServiceError> {
        self.check("head")?;
        Ok(self.head_sha())
    }

    async fn tree(&self, commit: &str) -> Result<Tree, ServiceError> {
        self.check("tree")?;
        let mut state = self.state.lock().unwrap();
        let sha = state
            .commits
            .get(commit)
            .map(|c| c.tree.clone())
            .ok_or(ServiceError::Status {
                service: "github",
                status: 404,
            })?;
        let files = state.trees[&sha].clone();
        let items = files
            .keys()
            .map(|path| TreeItem {
                path: path.clone(),
                mode: BLOB_MODE.to_string(),
                kind: "blob".to_string(),
                sha: None,
            })
            .collect();

        if state.races > 0 {
            state.races -= 1;
            let mut moved = files.clone();
            moved.insert("external.md".to_string(), b"someone else".to_vec());
            let head = state.head.clone();
            let moved_head = state.commit(moved, head, "concurrent writer");
            state.head = moved_head;
        }

        Ok(Tree {
            sha,
            items,
            truncated: false,
        })
    }

    async fn create_tree(
        &self,
        base_tree: &str,
        entries: &[CommitTreeEntry],
    ) -> Result<String, ServiceError> {
        self.check("create_tree")?;
        let mut state = self.state.lock().unwrap();
        let mut files = state.trees.get(base_tree).cloned().ok_or(ServiceError::Status {
            service: "github",
            status: 404,
        })?;
        for entry in entries {
            files.insert(entry.path.clone(), entry.content.clone());
        }
        let sha = state.id("tree");
        state.trees.insert(sha.clone(), files);
        Ok(sha)
    }

    async fn create_commit(
        &self,
        message: &str,
        tree: &str,
        parent: &str,
    ) -> Result<String, ServiceError> {
        self.check("create_commit")?;
        let mut state = self.state.lock().unwrap();
        let sha = state.id("commit");
        state.commits.insert(
            sha.clone(),
            CommitObject {
                tree: tree.to_string(),
                parent: Some(parent.to_string()),
                message: message.to_string(),
            },
        );
        Ok(sha)
    }

    async fn update_ref(&self, commit: &str) -> Result<RefUpdate, ServiceError> {
        self.check("update_ref")?;
        let mut state = self.state.lock().unwrap();
        let parent = state.commits.get(commit).and_then(|c| c.parent.clone());
        if parent.as_deref() != Some(state.head.as_str()) {
            return Ok(RefUpdate::NotFastForward);
        }
        state.head = commit.to_string();
        state.ref_updates += 1;
        Ok(RefUpdate::Updated)
    }
}
