use crate::error::ShellError;
use anyhow::Result;
use log::info;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Applies the proxy settings file given on the command line.
pub trait ConfigLoader {
    fn load(&self, path: &Path) -> Result<()>;
}

/// Reads a JSON settings file and checks that it is a JSON object.
///
/// The proxy engine consumes the settings; this loader only validates and reports what
/// it found.
#[derive(Debug, Default)]
pub struct JsonSettings;

impl ConfigLoader for JsonSettings {
    fn load(&self, path: &Path) -> Result<()> {
        let settings_error = |reason: String| ShellError::Settings {
            path: path.to_path_buf(),
            reason,
        };
        let text = fs::read_to_string(path).map_err(|e| settings_error(e.to_string()))?;
        let value: Value =
            serde_json::from_str(&text).map_err(|e| settings_error(e.to_string()))?;
        let sections = value
            .as_object()
            .ok_or_else(|| settings_error("top level is not a JSON object".to_string()))?;
        let names: Vec<&str> = sections.keys().map(String::as_str).collect();
        info!(
            "applied settings from {} ({} sections: {})",
            path.display(),
            names.len(),
            names.join(", ")
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file(tag: &str, content: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "proxy_shell_settings_{}_{}_{}.json",
            tag,
            std::process::id(),
            nanos
        ));
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_valid_settings_object() {
        let path = temp_file("ok", r#"{"listenPorts": [], "servers": []}"#);
        assert!(JsonSettings.load(&path).is_ok());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_rejects_non_object_and_garbage() {
        let list = temp_file("list", "[1, 2]");
        let garbage = temp_file("garbage", "{ not json");
        for path in [&list, &garbage] {
            let err = JsonSettings.load(path).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<ShellError>(),
                Some(ShellError::Settings { .. })
            ));
        }
        let _ = fs::remove_file(list);
        let _ = fs::remove_file(garbage);
    }

    #[test]
    fn test_missing_file_fails() {
        let missing = std::env::temp_dir().join("proxy_shell_missing_settings.json");
        assert!(JsonSettings.load(&missing).is_err());
    }
}
