//! Git hook installation and management.

use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::Error;
use crate::git::GitCli;

/// Marker identifying our section of a hook script.
const HOOK_MARKER: &str = "commit-history recorder";

/// Post-commit hook script content.
const POST_COMMIT_HOOK: &str = r#"#!/bin/sh
# commit-history recorder (auto-installed)
# Appends this commit's metadata to the JSON history files

commit-history record || echo "commit-history: failed to record commit" >&2
"#;

/// Location of the post-commit hook, as git resolves it.
///
/// Follows `core.hooksPath` and linked worktrees.
pub fn post_commit_path(project_root: &Path) -> Result<PathBuf, Error> {
    GitCli::new(project_root).git_path("hooks/post-commit")
}

/// Check if our hook is already installed.
pub fn hook_installed(project_root: &Path) -> bool {
    post_commit_path(project_root)
        .and_then(|path| Ok(fs::read_to_string(path)?))
        .map(|content| content.contains(HOOK_MARKER))
        .unwrap_or(false)
}

/// Install the post-commit hook.
///
/// Returns `false` when the hook was already present.
pub fn install_hook(project_root: &Path) -> Result<bool, Error> {
    let path = post_commit_path(project_root).map_err(|e| {
        Error::other(format!(
            "{} is not a git repository: {}",
            project_root.display(),
            e
        ))
    })?;
    write_hook(&path)
}

/// Write or extend the hook script at `path`.
fn write_hook(path: &Path) -> Result<bool, Error> {
    if let Some(hooks_dir) = path.parent() {
        fs::create_dir_all(hooks_dir)?;
    }

    let final_content = if path.exists() {
        let existing = fs::read_to_string(path)?;

        if existing.contains(HOOK_MARKER) {
            return Ok(false);
        }

        // Append to existing hook, dropping our shebang
        let body = POST_COMMIT_HOOK.trim_start_matches("#!/bin/sh\n");
        format!("{}\n\n{}", existing.trim_end(), body)
    } else {
        POST_COMMIT_HOOK.to_string()
    };

    fs::write(path, &final_content)?;
    make_executable(path)?;
    info!(path = %path.display(), "Installed post-commit hook");

    Ok(true)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), Error> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), Error> {
    Ok(())
}

/// Uninstall the post-commit hook.
///
/// Returns `false` when there was nothing to remove.
pub fn uninstall_hook(project_root: &Path) -> Result<bool, Error> {
    remove_hook(&post_commit_path(project_root)?)
}

fn remove_hook(path: &Path) -> Result<bool, Error> {
    if !path.exists() {
        return Ok(false);
    }

    let content = fs::read_to_string(path)?;
    if !content.contains(HOOK_MARKER) {
        return Ok(false);
    }

    let cleaned = remove_recorder_section(&content);
    if cleaned.trim().is_empty() || cleaned.trim() == "#!/bin/sh" {
        fs::remove_file(path)?;
    } else {
        fs::write(path, format!("{}\n", cleaned.trim_end()))?;
    }
    info!(path = %path.display(), "Removed post-commit hook");

    Ok(true)
}

/// Remove our lines from hook content.
fn remove_recorder_section(content: &str) -> String {
    content
        .lines()
        .filter(|line| {
            !line.contains(HOOK_MARKER)
                && !line.contains("commit-history record")
                && !line.contains("Appends this commit's metadata")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
