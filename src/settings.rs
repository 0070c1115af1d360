//! Persistent application settings.
//!
//! Stored as plain `key=value` lines. Unknown keys are ignored and missing
//! keys keep their defaults, so old files keep loading after upgrades.

use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq)]
pub struct AppSettings {
    /// Python interpreter used for both collaborator scripts. Empty = bundled/default.
    pub python_executable: String,
    /// MTR download script. Empty = `src/main.py` next to the executable.
    pub automation_script: String,
    /// Signature collaborator script. Empty = `assinador/src/python_script.py`.
    pub signer_script: String,
    /// Working folder of the signature tool (inputs, outputs, signatures, positions).
    pub signer_base_dir: String,
    /// Language code (e.g. "en", "pt"). Empty string = auto-detect system language.
    pub language: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            python_executable: String::new(),
            automation_script: String::new(),
            signer_script: String::new(),
            signer_base_dir: String::new(),
            language: String::new(),
        }
    }
}

impl AppSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/mtrdesk/mtrdesk_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\MtrDesk\mtrdesk_settings.cfg
    /// On macOS:   ~/Library/Application Support/MtrDesk/mtrdesk_settings.cfg
    /// Fallback:   same directory as the executable.
    pub(crate) fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("mtrdesk");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("mtrdesk_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .unwrap_or_else(|_| exe_dir().to_string_lossy().into_owned());
            let config_dir = PathBuf::from(appdata).join("MtrDesk");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("mtrdesk_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            let config_dir = PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("MtrDesk");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("mtrdesk_settings.cfg"));
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            Some(exe_dir().join("mtrdesk_settings.cfg"))
        }
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "python_executable={}\n\
             automation_script={}\n\
             signer_script={}\n\
             signer_base_dir={}\n\
             language={}\n",
            self.python_executable,
            self.automation_script,
            self.signer_script,
            self.signer_base_dir,
            self.language,
        )
    }

    pub fn from_config_str(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim().to_string();
            match key.trim() {
                "python_executable" => s.python_executable = val,
                "automation_script" => s.automation_script = val,
                "signer_script" => s.signer_script = val,
                "signer_base_dir" => s.signer_base_dir = val,
                "language" => s.language = val,
                _ => {}
            }
        }
        s
    }

    /// Save settings to disk
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = self.save_to(&path) {
            crate::log_warn!("Could not save settings to {}: {}", path.display(), e);
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.to_config_string())
    }

    /// Load settings from disk (returns default if file missing or corrupt)
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_config_str(&content),
            Err(_) => Self::default(),
        }
    }

    // ------------------------------------------------------------------
    // Resolved paths
    // ------------------------------------------------------------------

    pub fn python_executable(&self) -> PathBuf {
        if !self.python_executable.is_empty() {
            return PathBuf::from(&self.python_executable);
        }
        default_python(&exe_dir())
    }

    pub fn automation_script(&self) -> PathBuf {
        if !self.automation_script.is_empty() {
            return PathBuf::from(&self.automation_script);
        }
        exe_dir().join("src").join("main.py")
    }

    pub fn signer_base_dir(&self) -> PathBuf {
        if !self.signer_base_dir.is_empty() {
            return PathBuf::from(&self.signer_base_dir);
        }
        exe_dir().join("assinador")
    }

    pub fn signer_script(&self) -> PathBuf {
        if !self.signer_script.is_empty() {
            return PathBuf::from(&self.signer_script);
        }
        self.signer_base_dir().join("src").join("python_script.py")
    }
}

/// Bundled portable interpreter on Windows, `python3` from PATH elsewhere.
fn default_python(base: &Path) -> PathBuf {
    if cfg!(target_os = "windows") {
        base.join("vendor").join("python-portable").join("python.exe")
    } else {
        PathBuf::from("python3")
    }
}

/// Directory containing the running executable (falls back to the CWD).
pub fn exe_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_and_malformed_lines_are_ignored() {
        let s = AppSettings::from_config_str(
            "language = pt\nnot a pair\ntheme_mode=dark\npython_executable=/opt/py/bin/python3\n",
        );
        assert_eq!(s.language, "pt");
        assert_eq!(s.python_executable, "/opt/py/bin/python3");
        assert_eq!(s.automation_script, "");
    }

    #[test]
    fn settings_survive_disk_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mtrdesk_settings.cfg");
        let s = AppSettings {
            python_executable: "/usr/bin/python3".into(),
            automation_script: "/srv/mtr/main.py".into(),
            signer_script: String::new(),
            signer_base_dir: "/srv/assinador".into(),
            language: "en".into(),
        };
        s.save_to(&path).unwrap();
        assert_eq!(AppSettings::load_from(&path), s);
        assert_eq!(
            AppSettings::load_from(&dir.path().join("missing.cfg")),
            AppSettings::default()
        );
    }

    #[test]
    fn signer_script_defaults_under_base_dir() {
        let s = AppSettings {
            signer_base_dir: "/srv/assinador".into(),
            ..Default::default()
        };
        assert_eq!(
            s.signer_script(),
            Path::new("/srv/assinador").join("src").join("python_script.py")
        );
        assert_eq!(s.signer_base_dir(), PathBuf::from("/srv/assinador"));
    }
}
