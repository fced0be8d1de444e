use std::fmt;
use std::path::Path;
use url::Url;

/// Coordinates of a repository derived from its remote URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteInfo {
    pub host: String,
    pub owner: String,
    pub repo: String,
}

impl fmt::Display for RemoteInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.is_empty() {
            write!(f, "{}/{}", self.owner, self.repo)
        } else {
            write!(f, "{}/{}/{}", self.host, self.owner, self.repo)
        }
    }
}

fn strip_git_suffix(path: &str) -> &str {
    let path = path.trim().trim_end_matches('/');
    path.strip_suffix(".git").unwrap_or(path)
}

fn split_owner_repo(path: &str) -> Option<(String, String)> {
    let path = strip_git_suffix(path.trim_start_matches('/'));
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let repo = segments.pop()?.trim();
    let owner = segments.pop().unwrap_or("").trim();
    if repo.is_empty() {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}

/// Parse any git remote form: `git@host:owner/repo.git`, `ssh://`, `https://`, `http://`,
/// `file://` and plain local paths.
///
/// Nested groups (`gitlab.com/group/sub/repo`) keep only the last two segments.
pub fn parse_remote(url: &str) -> Option<RemoteInfo> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }

    if !trimmed.contains("://")
        && let Some((user_host, path)) = trimmed.split_once(':')
        && user_host.contains('@')
        && !user_host.contains('/')
    {
        // scp-like: git@github.com:owner/repo.git
        let host = user_host
            .rsplit_once('@')
            .map(|(_, host)| host)
            .unwrap_or(user_host);
        let (owner, repo) = split_owner_repo(path)?;
        return Some(RemoteInfo {
            host: host.to_lowercase(),
            owner,
            repo,
        });
    }

    if let Ok(parsed) = Url::parse(trimmed) {
        return match parsed.scheme() {
            "https" | "http" | "ssh" | "git" => {
                let host = parsed.host_str()?.to_lowercase();
                let (owner, repo) = split_owner_repo(parsed.path())?;
                Some(RemoteInfo { host, owner, repo })
            }
            "file" => {
                let (owner, repo) = split_owner_repo(parsed.path())?;
                Some(RemoteInfo {
                    host: String::new(),
                    owner,
                    repo,
                })
            }
            _ => None,
        };
    }

    let path = Path::new(trimmed);
    let repo = path.file_name()?.to_str()?;
    let owner = path
        .parent()
        .and_then(|parent| parent.file_name())
        .and_then(|name| name.to_str())
        .unwrap_or("");
    let (owner, repo) = split_owner_repo(&format!("{owner}/{repo}"))?;
    Some(RemoteInfo {
        host: String::new(),
        owner,
        repo,
    })
}

/// Repository name used to prefix working copy directories, `repo` when unparseable.
pub fn repo_name(url: &str) -> String {
    parse_remote(url)
        .map(|info| info.repo)
        .unwrap_or_else(|| "repo".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(host: &str, owner: &str, repo: &str) -> Option<RemoteInfo> {
        Some(RemoteInfo {
            host: host.into(),
            owner: owner.into(),
            repo: repo.into(),
        })
    }

    #[test]
    fn parses_scp_like_remote() {
        assert_eq!(
            parse_remote("git@github.com:octo/robot.git"),
            info("github.com", "octo", "robot")
        );
    }

    #[test]
    fn parses_ssh_and_https_remotes() {
        assert_eq!(
            parse_remote("ssh://git@GitHub.com/acme/widgets.git"),
            info("github.com", "acme", "widgets")
        );
        assert_eq!(
            parse_remote("https://github.com/acme/widgets"),
            info("github.com", "acme", "widgets")
        );
        assert_eq!(
            parse_remote("http://git.example.com/acme/widgets.git/"),
            info("git.example.com", "acme", "widgets")
        );
    }

    #[test]
    fn nested_groups_keep_last_two_segments() {
        assert_eq!(
            parse_remote("https://gitlab.com/group/sub/project.git"),
            info("gitlab.com", "sub", "project")
        );
    }

    #[test]
    fn parses_file_urls_and_local_paths() {
        assert_eq!(
            parse_remote("file:///srv/git/team/tool.git"),
            info("", "team", "tool")
        );
        assert_eq!(parse_remote("/tmp/origin/app"), info("", "origin", "app"));
        assert_eq!(parse_remote("app.git"), info("", "", "app"));
    }

    #[test]
    fn rejects_empty_input() {
        assert_eq!(parse_remote("   "), None);
        assert_eq!(parse_remote("https://github.com/"), None);
    }

    #[test]
    fn repo_name_falls_back() {
        assert_eq!(repo_name("git@github.com:octo/robot.git"), "robot");
        assert_eq!(repo_name(""), "repo");
    }
}
