//! Configuration file support
//!
//! Loads settings from ~/.genhl.conf (or %USERPROFILE%\.genhl.conf on Windows)
//!
//! Format: simple key=value pairs, one per line
//! Lines starting with # are comments
//!
//! Example:
//! ```text
//! # genhl configuration
//! color = true
//! line-numbers = true
//! tab-width = 4
//! definitions-dir = ~/.local/share/genhl
//! styles = dsKeyword=(color:#0000ff) dsComment=(italic:false)
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration settings
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to emit colored output
    pub color: bool,
    /// Whether to show line numbers
    pub show_line_numbers: bool,
    /// Tab width for display
    pub tab_width: usize,
    /// Extra directory of `*.toml` language definitions
    pub definitions_dir: Option<PathBuf>,
    /// Basic attribute overrides, in the overrides string format
    pub styles: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            color: true,
            show_line_numbers: false,
            tab_width: 8,
            definitions_dir: None,
            styles: None,
        }
    }
}

fn home_dir() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        std::env::var("USERPROFILE").ok().map(PathBuf::from)
    }

    #[cfg(not(windows))]
    {
        std::env::var("HOME").ok().map(PathBuf::from)
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".genhl.conf"))
    }

    /// Load configuration from file
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Config::default(),
        }
    }

    /// Load configuration from a given file; a missing file gives the defaults
    pub fn load_from(path: &Path) -> Self {
        let mut config = Config::default();

        if let Ok(contents) = fs::read_to_string(path) {
            log::debug!("reading {}", path.display());
            let settings = Self::parse(&contents);
            config.apply(&settings);
        }

        config
    }

    /// Parse config file contents into key-value pairs
    fn parse(contents: &str) -> HashMap<String, String> {
        let mut settings = HashMap::new();

        for line in contents.lines() {
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // Parse key = value; override strings contain '=' themselves
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim().to_lowercase();
                let value = value.trim().to_string();
                settings.insert(key, value);
            }
        }

        settings
    }

    /// Apply settings from parsed config
    fn apply(&mut self, settings: &HashMap<String, String>) {
        if let Some(value) = settings.get("color") {
            self.color = parse_bool(value);
        }

        if let Some(value) = settings.get("line-numbers") {
            self.show_line_numbers = parse_bool(value);
        }

        if let Some(value) = settings.get("tab-width") {
            match value.parse::<usize>() {
                Ok(n) => self.tab_width = n.clamp(1, 16), // Between 1 and 16
                Err(_) => log::warn!("ignoring invalid tab-width '{}'", value),
            }
        }

        if let Some(value) = settings.get("definitions-dir") {
            self.definitions_dir = Some(expand_home(value));
        }

        if let Some(value) = settings.get("styles") {
            if !value.is_empty() {
                self.styles = Some(value.clone());
            }
        }

        for key in settings.keys() {
            if !matches!(key.as_str(), "color" | "line-numbers" | "tab-width" | "definitions-dir" | "styles") {
                log::warn!("unknown configuration key '{}'", key);
            }
        }
    }

    /// Save current configuration to file
    pub fn save(&self) -> std::io::Result<()> {
        if let Some(path) = Self::config_path() {
            self.save_to(&path)?;
        }
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        fs::write(path, self.to_file_string())
    }

    fn to_file_string(&self) -> String {
        let mut contents = format!(
            "# genhl configuration\n\
             # Generated automatically\n\n\
             color = {}\n\
             line-numbers = {}\n\
             tab-width = {}\n",
            self.color, self.show_line_numbers, self.tab_width
        );
        if let Some(dir) = &self.definitions_dir {
            contents.push_str(&format!("definitions-dir = {}\n", dir.display()));
        }
        if let Some(styles) = &self.styles {
            contents.push_str(&format!("styles = {}\n", styles));
        }
        contents
    }
}

/// Parse a boolean value from string
fn parse_bool(s: &str) -> bool {
    let s = s.to_lowercase();
    matches!(s.as_str(), "true" | "yes" | "on" | "1")
}

fn expand_home(value: &str) -> PathBuf {
    match value.strip_prefix("~/") {
        Some(rest) => home_dir().map_or_else(|| PathBuf::from(value), |home| home.join(rest)),
        None => PathBuf::from(value),
    }
}
