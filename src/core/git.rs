use git2::Repository;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("not a git repository: {}", path.display())]
    Repository {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    #[error("cannot resolve parent of '{commit}': {stderr}")]
    ResolveParent { commit: String, stderr: String },

    #[error("cannot list files changed by '{commit}': {stderr}")]
    ListChanges { commit: String, stderr: String },

    #[error("cannot diff '{commit}' against its parent: {stderr}")]
    Diff { commit: String, stderr: String },

    #[error("failed to run git")]
    Git(#[from] std::io::Error),

    #[error("git produced non-UTF-8 output")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// The two text blobs a review prompt is built from: the pre-change bodies of
/// every file the commit touched, and the commit's diff.
#[derive(Debug, Clone)]
pub struct CommitChanges {
    pub original_code: String,
    pub diff: String,
}

#[derive(Debug)]
pub struct ChangeExtractor {
    repo_dir: PathBuf,
    max_lines: usize,
}

impl ChangeExtractor {
    pub fn new(repo_path: impl AsRef<Path>, max_lines: usize) -> Result<Self, ExtractError> {
        let repo = Repository::discover(&repo_path).map_err(|source| ExtractError::Repository {
            path: repo_path.as_ref().to_path_buf(),
            source,
        })?;

        let repo_dir = repo
            .workdir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| repo_path.as_ref().to_path_buf());

        Ok(Self { repo_dir, max_lines })
    }

    /// Collects the pre-change file contents and the diff for `commit`
    /// against its first parent.
    ///
    /// Files the parent revision does not have contribute nothing to
    /// `original_code`. A commit whose diff comes back empty falls back to
    /// the full contents of any added files.
    pub fn extract(&self, commit: &str) -> Result<CommitChanges, ExtractError> {
        let parent = self.parent_of(commit)?;
        debug!("resolved parent {} for {}", parent, commit);

        let mut blocks = Vec::new();
        for path in self.changed_paths(&parent, commit)? {
            match self.file_at(&parent, &path) {
                Some(content) => blocks.push(format!(
                    "File: {}\n```\n{}\n```\n",
                    path,
                    clip_to_max_lines(&content, self.max_lines)
                )),
                None => debug!("{} absent at parent revision, skipping", path),
            }
        }
        let original_code = blocks.join("\n");

        let mut diff = self.git_expect(&["diff", "-U5", &parent, commit], |stderr| {
            ExtractError::Diff {
                commit: commit.to_string(),
                stderr,
            }
        })?;

        // An empty diff between two distinct revisions usually means the
        // commit only adds files; show those in full instead.
        if diff.is_empty() {
            let added = self.added_file_blocks(&parent, commit)?;
            if !added.is_empty() {
                diff = added;
            }
        }

        Ok(CommitChanges {
            original_code,
            diff,
        })
    }

    fn parent_of(&self, commit: &str) -> Result<String, ExtractError> {
        let stdout = self.git_expect(&["rev-parse", &format!("{commit}^")], |stderr| {
            ExtractError::ResolveParent {
                commit: commit.to_string(),
                stderr,
            }
        })?;
        Ok(stdout.trim().to_string())
    }

    fn changed_paths(&self, parent: &str, commit: &str) -> Result<Vec<String>, ExtractError> {
        let listing = self.git_expect(&["diff", "--name-only", parent, commit], |stderr| {
            ExtractError::ListChanges {
                commit: commit.to_string(),
                stderr,
            }
        })?;
        Ok(listing
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn added_file_blocks(&self, parent: &str, commit: &str) -> Result<String, ExtractError> {
        let listing = self.git_expect(
            &["diff", "--name-only", "--diff-filter=A", parent, commit],
            |stderr| ExtractError::ListChanges {
                commit: commit.to_string(),
                stderr,
            },
        )?;

        let mut blocks = Vec::new();
        for path in listing.lines().filter(|line| !line.is_empty()) {
            match self.file_at(commit, path) {
                Some(content) => blocks.push(format!("New file: {path}\n```\n{content}\n```\n")),
                None => debug!("could not fetch added file {}, skipping", path),
            }
        }
        Ok(blocks.join("\n"))
    }

    /// A file's content at a given revision, or `None` when the revision does
    /// not have that path (or the content is not text).
    fn file_at(&self, rev: &str, path: &str) -> Option<String> {
        let output = self.git(&["show", &format!("{rev}:{path}")]).ok()?;
        if !output.status.success() {
            return None;
        }
        String::from_utf8(output.stdout).ok()
    }

    fn git_expect(
        &self,
        args: &[&str],
        err: impl FnOnce(String) -> ExtractError,
    ) -> Result<String, ExtractError> {
        let output = self.git(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(err(stderr));
        }
        Ok(String::from_utf8(output.stdout)?)
    }

    fn git(&self, args: &[&str]) -> std::io::Result<std::process::Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.repo_dir)
            .output()
    }
}

fn clip_to_max_lines(content: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() <= max_lines {
        return content.to_string();
    }

    let omitted = lines.len() - max_lines;
    let mut clipped = lines[..max_lines].join("\n");
    clipped.push_str(&format!("\n... (skipped {omitted} lines)"));
    clipped
}
