//! Path helpers for config file lookup

use std::path::PathBuf;

/// Resolve a user-supplied config path.
///
/// `~` and `~/...` expand to the home directory; relative paths are joined
/// onto the current directory; absolute paths pass through.
pub fn expand_path(path: &str) -> PathBuf {
    let path = path.trim();

    if path.is_empty() {
        return std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    }

    let expanded = match path.strip_prefix('~') {
        Some("") => dirs::home_dir().unwrap_or_else(|| PathBuf::from(path)),
        Some(rest) if rest.starts_with('/') || rest.starts_with('\\') => dirs::home_dir()
            .map(|home| home.join(&rest[1..]))
            .unwrap_or_else(|| PathBuf::from(path)),
        _ => PathBuf::from(path),
    };

    if expanded.is_relative() {
        std::env::current_dir()
            .map(|cwd| cwd.join(&expanded))
            .unwrap_or(expanded)
    } else {
        expanded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_absolute_path_unchanged() {
        assert_eq!(
            expand_path("/etc/promwrite.json"),
            PathBuf::from("/etc/promwrite.json")
        );
    }

    #[test]
    fn test_relative_path_becomes_absolute() {
        let result = expand_path("./promwrite.json");
        assert!(result.is_absolute());
        assert!(result.ends_with("promwrite.json"));
    }

    #[test]
    fn test_tilde_expands_to_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path("~"), home);
            assert_eq!(
                expand_path("~/.promwrite/promwrite.json"),
                home.join(".promwrite/promwrite.json")
            );
        }
    }

    #[test]
    fn test_tilde_user_is_not_expanded() {
        let result = expand_path("~other/file");
        assert!(result.ends_with("~other/file"));
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        let result = expand_path("  ./a.json  ");
        assert!(result.ends_with("a.json"));
    }
}
