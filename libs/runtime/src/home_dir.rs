use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

/// Platform base directory the default subdirectory lives in.
fn platform_base() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        dirs::config_dir()
    }
    #[cfg(not(target_os = "windows"))]
    {
        dirs::home_dir()
    }
}

fn expand_tilde(raw: &str) -> Result<PathBuf> {
    let rest = raw.trim_start_matches('~');
    let rest = rest.trim_start_matches(['/', '\\']);
    let home = dirs::home_dir().context("cannot expand '~': home directory is unknown")?;
    Ok(if rest.is_empty() { home } else { home.join(rest) })
}

/// Resolve the server home directory into an absolute path.
///
/// `None` selects `<platform base>/<default_subdir>` (`$HOME` on Unix,
/// `%APPDATA%` on Windows). A leading `~` is expanded; other relative paths
/// are taken relative to the working directory. With `create`, the
/// directory is created if missing.
pub fn resolve_home_dir(
    configured: Option<String>,
    default_subdir: &str,
    create: bool,
) -> Result<PathBuf> {
    let path = match configured.as_deref().map(str::trim) {
        None | Some("") => platform_base()
            .context("cannot determine the platform home directory")?
            .join(default_subdir),
        Some(raw) if raw.starts_with('~') => expand_tilde(raw)?,
        Some(raw) if Path::new(raw).is_absolute() => PathBuf::from(raw),
        Some(raw) => std::env::current_dir()
            .context("cannot read the working directory")?
            .join(raw),
    };

    if create {
        std::fs::create_dir_all(&path)
            .with_context(|| format!("cannot create home directory {}", path.display()))?;
    } else if path.exists() && !path.is_dir() {
        bail!("home directory {} is not a directory", path.display());
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn absolute_path_is_kept_and_created() {
        let tmp = tempdir().unwrap();
        let target = tmp.path().join("a/b");
        let resolved =
            resolve_home_dir(Some(target.to_string_lossy().into()), ".x", true).unwrap();
        assert_eq!(resolved, target);
        assert!(target.is_dir());
    }

    #[test]
    fn relative_path_is_anchored_at_cwd() {
        let resolved = resolve_home_dir(Some("rel-home".into()), ".x", false).unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("rel-home"));
    }

    #[test]
    fn file_in_the_way_is_rejected() {
        let tmp = tempdir().unwrap();
        let file = tmp.path().join("plain");
        std::fs::write(&file, "x").unwrap();
        assert!(resolve_home_dir(Some(file.to_string_lossy().into()), ".x", false).is_err());
    }
}
