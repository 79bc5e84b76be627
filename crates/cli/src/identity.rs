//! Author identity for new migration files, read from git configuration

use git2::{Config, Repository};

use elif_migrate::manager::PLACEHOLDER_AUTHOR;

/// `Name <email>` from the repository's git config, then the user's global
/// config, else a placeholder the author is expected to fill in.
pub fn who_am_i() -> String {
    let repo_config = Repository::discover(".").and_then(|repo| repo.config()).ok();
    let global_config = Config::open_default().ok();

    [repo_config, global_config]
        .into_iter()
        .flatten()
        .find_map(|config| identity_from(&config))
        .unwrap_or_else(|| PLACEHOLDER_AUTHOR.to_string())
}

fn identity_from(config: &Config) -> Option<String> {
    let name = config.get_string("user.name").ok().filter(|s| !s.trim().is_empty());
    let email = config.get_string("user.email").ok().filter(|s| !s.trim().is_empty());
    format_identity(name.as_deref(), email.as_deref())
}

fn format_identity(name: Option<&str>, email: Option<&str>) -> Option<String> {
    match (name, email) {
        (Some(name), Some(email)) => Some(format!("{} <{}>", name.trim(), email.trim())),
        (Some(name), None) => Some(name.trim().to_string()),
        (None, Some(email)) => Some(email.trim().to_string()),
        (None, None) => None,
    }
}
