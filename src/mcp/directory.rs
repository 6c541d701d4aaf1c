//! Working-directory emulation by command rewriting.
//!
//! Every remote command runs in a fresh shell, so "current directory" only
//! exists client-side. Two pure functions carry the whole algorithm:
//!
//! - [`rewrite_command`] turns `(tracked_dir, raw_command)` into the command
//!   actually dispatched, and reports whether it is a directory change.
//! - [`next_directory`] folds the execution result back into the tracked
//!   directory. Only a successful change that prints an absolute path moves
//!   the tracked directory; anything else leaves it where it was.
//!
//! ```text
//! tracked "/srv", "cd app"   ->  cd /srv/app && pwd         (directory change)
//! tracked "/srv", "cd /etc"  ->  cd /etc && pwd             (directory change)
//! tracked "/srv", "ls -la"   ->  cd /srv && ls -la
//! tracked "~",    "ls -la"   ->  ls -la
//! ```

/// Tracked directory of a fresh connection: the remote login directory.
pub const DEFAULT_HOME: &str = "~";

const CD_KEYWORD: &str = "cd ";
const PRINT_DIRECTORY: &str = "pwd";

/// A command after directory-context rewriting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub command: String,
    pub changes_directory: bool,
}

/// Rewrite `raw` so it runs in `tracked`.
pub fn rewrite_command(tracked: &str, raw: &str) -> Rewrite {
    let trimmed = raw.trim();

    if let Some(rest) = trimmed.strip_prefix(CD_KEYWORD) {
        let target = rest.trim();
        let destination = if is_anchored(target) {
            target.to_string()
        } else {
            join(tracked, target)
        };
        return Rewrite {
            command: format!("cd {} && {}", destination, PRINT_DIRECTORY),
            changes_directory: true,
        };
    }

    let command = if tracked == DEFAULT_HOME {
        raw.to_string()
    } else {
        format!("cd {} && {}", quote_path(tracked), raw)
    };

    Rewrite {
        command,
        changes_directory: false,
    }
}

/// Compute the tracked directory after a command completed with `exit_status`.
///
/// The last non-empty line of stdout is taken as the new directory when the
/// command was a directory change, succeeded, and printed an absolute path.
pub fn next_directory(
    tracked: &str,
    changes_directory: bool,
    exit_status: i32,
    stdout: &str,
) -> String {
    if !changes_directory || exit_status != 0 {
        return tracked.to_string();
    }

    stdout
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .rfind(|line| !line.trim().is_empty())
        .filter(|line| line.starts_with('/'))
        .map(str::to_string)
        .unwrap_or_else(|| tracked.to_string())
}

/// Absolute paths and the `-` / `~` shorthands are used as written.
fn is_anchored(target: &str) -> bool {
    target.starts_with('/') || target == "-" || target.starts_with('~')
}

fn join(base: &str, target: &str) -> String {
    let base = quote_path(base);
    if base.ends_with('/') {
        format!("{}{}", base, target)
    } else {
        format!("{}/{}", base, target)
    }
}

/// Quote a tracked directory for the shell unless it is made of safe characters.
///
/// A leading `~` is kept outside the quotes so the remote shell still expands it.
fn quote_path(path: &str) -> String {
    fn is_safe(c: char) -> bool {
        c.is_ascii_alphanumeric() || "/._-+,@%:=".contains(c)
    }

    if let Some(rest) = path.strip_prefix('~') {
        if rest.chars().all(is_safe) {
            return path.to_string();
        }
        if let Some(tail) = rest.strip_prefix('/') {
            return format!("~/{}", single_quote(tail));
        }
    }

    if !path.is_empty() && path.chars().all(is_safe) {
        path.to_string()
    } else {
        single_quote(path)
    }
}

fn single_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
