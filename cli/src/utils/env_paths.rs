use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Load a `.env` file from the current directory, if there is one.
///
/// Variables already set in the environment win over the file.
pub fn load_dotenv() {
    if let Ok(current) = env::current_dir() {
        let env_file = current.join(".env");
        if env_file.exists() {
            dotenv::from_path(&env_file).ok();
        }
    }
}

/// Make a relative path absolute against the current directory.
pub fn resolve(path: &Path) -> Result<PathBuf> {
    resolve_with_base(path, None)
}

/// Like [`resolve`], against an explicit base directory.
pub fn resolve_with_base(path: &Path, base_dir: Option<&Path>) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let base = match base_dir {
        Some(base) => base.to_path_buf(),
        None => env::current_dir().context("Failed to get current directory")?,
    };
    Ok(base.join(path))
}

/// Directory for rolling log files, from `MAILGATE_LOG_DIR`.
pub fn log_dir() -> Option<PathBuf> {
    env::var_os("MAILGATE_LOG_DIR")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
}

/// Get the current environment (dev, staging, production)
pub fn get_environment() -> String {
    env::var("ENVIRONMENT")
        .unwrap_or_else(|_| env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Use a mutex to ensure tests don't interfere with each other's environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_resolve_relative() {
        let temp_dir = TempDir::new().unwrap();
        let resolved = resolve_with_base(Path::new("./config"), Some(temp_dir.path())).unwrap();
        assert_eq!(resolved, temp_dir.path().join("./config"));
    }

    #[test]
    fn test_resolve_absolute() {
        let temp_dir = TempDir::new().unwrap();
        let absolute = temp_dir.path().join("custom_config");
        assert_eq!(resolve(&absolute).unwrap(), absolute);
        assert_eq!(
            resolve_with_base(&absolute, Some(Path::new("/elsewhere"))).unwrap(),
            absolute
        );
    }

    #[test]
    fn test_log_dir() {
        let _guard = ENV_MUTEX.lock().unwrap();

        env::remove_var("MAILGATE_LOG_DIR");
        assert_eq!(log_dir(), None);

        env::set_var("MAILGATE_LOG_DIR", "");
        assert_eq!(log_dir(), None);

        env::set_var("MAILGATE_LOG_DIR", "/var/log/mailgate");
        assert_eq!(log_dir(), Some(PathBuf::from("/var/log/mailgate")));

        env::remove_var("MAILGATE_LOG_DIR");
    }

    #[test]
    fn test_get_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();

        // Test default
        env::remove_var("ENVIRONMENT");
        env::remove_var("APP_ENV");
        assert_eq!(get_environment(), "dev");

        // Test ENVIRONMENT var
        env::set_var("ENVIRONMENT", "production");
        assert_eq!(get_environment(), "production");

        // Test APP_ENV as fallback
        env::remove_var("ENVIRONMENT");
        env::set_var("APP_ENV", "staging");
        assert_eq!(get_environment(), "staging");

        // Clean up
        env::remove_var("ENVIRONMENT");
        env::remove_var("APP_ENV");
    }
}
