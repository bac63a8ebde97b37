//! Git queries via the system `git` binary.

use std::path::PathBuf;
use std::process::Command;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::Error;

/// Hash of the empty tree, used as the diff base for root commits.
pub const EMPTY_TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

static INSERTIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) insertions?\(\+\)").unwrap());

static DELETIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) deletions?\(-\)").unwrap());

// scp-like remotes: git@github.com:owner/repo.git
static SCP_REMOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[^@/]+@)?([^:/]+):(.+)$").unwrap());

/// Metadata for a single commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub sha: String,
    /// Strict ISO 8601 committer date.
    pub date: String,
    /// Committer display name.
    pub author: String,
    pub message: String,
    /// Parent hashes in listed order; empty for a root commit.
    pub parents: Vec<String>,
}

/// Line counts from a diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub additions: u64,
    pub deletions: u64,
}

/// Version-control queries needed by the recorder.
pub trait Vcs {
    /// Full hash of the current HEAD commit.
    fn head_sha(&self) -> Result<String, Error>;

    /// Current branch name, `None` when HEAD is detached.
    fn current_branch(&self) -> Result<Option<String>, Error>;

    fn commit_info(&self, sha: &str) -> Result<CommitInfo, Error>;

    /// Diff stats from `base` to `sha`, excluding the given pathspecs.
    fn diff_stats(&self, base: &str, sha: &str, exclude: &[String]) -> Result<DiffStats, Error>;

    /// Configured URL for a remote, `None` if the remote does not exist.
    fn remote_url(&self, remote: &str) -> Result<Option<String>, Error>;
}

/// [`Vcs`] backed by the `git` command line.
#[derive(Debug, Clone)]
pub struct GitCli {
    root: PathBuf,
}

impl GitCli {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Top-level directory of the working tree containing `root`.
    pub fn toplevel(&self) -> Result<PathBuf, Error> {
        let top = self.run(&["rev-parse", "--show-toplevel"])?;
        if top.is_empty() {
            return Err(Error::other(format!(
                "{} is not inside a git working tree",
                self.root.display()
            )));
        }
        Ok(PathBuf::from(top))
    }

    /// Resolve a path inside the git directory, honoring worktrees and
    /// `core.hooksPath`.
    pub fn git_path(&self, relative: &str) -> Result<PathBuf, Error> {
        let path = PathBuf::from(self.run(&["rev-parse", "--git-path", relative])?);
        if path.is_absolute() {
            Ok(path)
        } else {
            Ok(self.root.join(path))
        }
    }

    /// Run git and return trimmed stdout, failing on non-zero exit.
    fn run(&self, args: &[&str]) -> Result<String, Error> {
        self.run_raw(args)?.ok_or_else(|| Error::Git {
            command: args.join(" "),
            stderr: "exited with non-zero status".to_string(),
        })
    }

    /// Run git, mapping a non-zero exit with empty stderr to `None`.
    ///
    /// Commands like `config --get` and `symbolic-ref -q` report "not
    /// found" that way.
    fn run_raw(&self, args: &[&str]) -> Result<Option<String>, Error> {
        debug!(args = ?args, "Running git");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()?;

        if output.status.success() {
            return Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()));
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.is_empty() {
            Ok(None)
        } else {
            Err(Error::Git {
                command: args.join(" "),
                stderr,
            })
        }
    }
}

impl Vcs for GitCli {
    fn head_sha(&self) -> Result<String, Error> {
        self.run(&["rev-parse", "HEAD"])
    }

    fn current_branch(&self) -> Result<Option<String>, Error> {
        let branch = self.run_raw(&["symbolic-ref", "--short", "-q", "HEAD"])?;
        Ok(branch.filter(|b| !b.is_empty()))
    }

    fn commit_info(&self, sha: &str) -> Result<CommitInfo, Error> {
        let output = self.run(&["show", "-s", "--format=%H%x00%cI%x00%cn%x00%P%x00%B", sha])?;
        parse_commit_info(&output)
    }

    fn diff_stats(&self, base: &str, sha: &str, exclude: &[String]) -> Result<DiffStats, Error> {
        let mut args = vec!["diff", "--shortstat", base, sha, "--", ":(top)"];
        args.extend(exclude.iter().map(String::as_str));
        let output = self.run(&args)?;
        Ok(parse_shortstat(&output))
    }

    fn remote_url(&self, remote: &str) -> Result<Option<String>, Error> {
        let key = format!("remote.{}.url", remote);
        let url = self.run_raw(&["config", "--get", key.as_str()])?;
        Ok(url.filter(|u| !u.is_empty()))
    }
}

/// Parse `show -s --format=%H%x00%cI%x00%cn%x00%P%x00%B` output.
pub fn parse_commit_info(output: &str) -> Result<CommitInfo, Error> {
    let mut fields = output.splitn(5, '\0');
    let mut next = |name: &str| {
        fields
            .next()
            .map(|f| f.trim().to_string())
            .ok_or_else(|| Error::metadata(format!("commit {} not found in git output", name)))
    };

    let sha = next("hash")?;
    let date = next("date")?;
    let author = next("committer")?;
    let parents = next("parents")?;
    let message = next("message")?;

    if sha.is_empty() || date.is_empty() {
        return Err(Error::metadata("empty commit hash or date"));
    }
    if author.is_empty() {
        return Err(Error::metadata(format!("no committer name for {}", sha)));
    }

    Ok(CommitInfo {
        sha,
        date,
        author,
        message,
        parents: parents.split_whitespace().map(str::to_string).collect(),
    })
}

/// Parse `diff --shortstat` output; empty output means no changes.
///
/// ```text
///  2 files changed, 10 insertions(+), 3 deletions(-)
/// ```
pub fn parse_shortstat(output: &str) -> DiffStats {
    let count = |re: &Regex| {
        re.captures(output)
            .and_then(|c| c[1].parse::<u64>().ok())
            .unwrap_or(0)
    };

    DiffStats {
        additions: count(&INSERTIONS),
        deletions: count(&DELETIONS),
    }
}

/// Turn a remote URL into an https base URL for web links.
///
/// Returns `None` for local paths and other non-web remotes.
pub fn web_base_url(remote: &str) -> Option<String> {
    let remote = remote.trim();

    let (host, path) = if let Some(rest) = remote
        .strip_prefix("https://")
        .or_else(|| remote.strip_prefix("http://"))
        .or_else(|| remote.strip_prefix("ssh://"))
        .or_else(|| remote.strip_prefix("git://"))
    {
        let (authority, path) = rest.split_once('/')?;
        let host = authority
            .rsplit_once('@')
            .map(|(_, h)| h)
            .unwrap_or(authority);
        // ssh://host:port/path
        let host = host.split(':').next().unwrap_or(host);
        (host.to_string(), path.to_string())
    } else if remote.contains("://") || remote.starts_with('/') || remote.starts_with('.') {
        return None;
    } else {
        let caps = SCP_REMOTE.captures(remote)?;
        (caps[1].to_string(), caps[2].to_string())
    };

    let path = path.trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    if host.is_empty() || path.is_empty() {
        return None;
    }

    Some(format!("https://{}/{}", host, path.trim_start_matches('/')))
}

/// Web URL of a commit on the given remote.
pub fn commit_url(remote: &str, sha: &str) -> Option<String> {
    web_base_url(remote).map(|base| format!("{}/commit/{}", base, sha))
}
