use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

/// Turn a bare path or `sqlite:` URL into an absolute `sqlite://` URL.
/// In-memory and already absolute URLs pass through unchanged.
pub fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with("sqlite::memory:")
        || trimmed.starts_with("sqlite://")
        || trimmed.starts_with("sqlite:file:")
    {
        return trimmed.to_string();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Make sure the database file and its directory exist, so the pool can open
/// it without `mode=rwc`.
pub fn prepare_sqlite_file(db_url: &str) -> Result<()> {
    if db_url.starts_with("sqlite::memory:") || db_url.starts_with("sqlite:file:") {
        return Ok(());
    }

    let Some(rest) = db_url.strip_prefix("sqlite://") else {
        bail!("unsupported database url: {db_url}");
    };
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() {
        bail!("database url has no path: {db_url}");
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_and_absolute_urls_pass_through() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            normalize_sqlite_url("sqlite:///tmp/quiz.sqlite3"),
            "sqlite:///tmp/quiz.sqlite3"
        );
    }

    #[test]
    fn relative_paths_become_absolute() {
        let url = normalize_sqlite_url("sqlite:data/quiz.sqlite3");
        assert!(url.starts_with("sqlite:///") || url.starts_with("sqlite://"));
        assert!(url.ends_with("data/quiz.sqlite3"));
        assert!(Path::new(url.trim_start_matches("sqlite://")).is_absolute());
    }

    #[test]
    fn prepare_creates_missing_file_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("nested").join("quiz.sqlite3");
        let url = format!("sqlite://{}", file.display());
        prepare_sqlite_file(&url).unwrap();
        assert!(file.exists());
        // second call is a no-op
        prepare_sqlite_file(&url).unwrap();
    }

    #[test]
    fn prepare_rejects_foreign_urls() {
        assert!(prepare_sqlite_file("postgres://localhost/quiz").is_err());
        assert!(prepare_sqlite_file("sqlite::memory:").is_ok());
    }
}
