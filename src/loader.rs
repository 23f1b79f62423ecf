//! Template source loaders consulted for compilation, `extends`, `import`
//! and `include`.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::debug;

use crate::error::{Error, Result};

pub trait Loader: Send + Sync {
    /// Resolves a template name to its source text.
    fn load(&self, name: &str) -> Result<String>;
}

/// Treats the template name itself as the source.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringLoader;

impl Loader for StringLoader {
    fn load(&self, name: &str) -> Result<String> {
        Ok(name.to_string())
    }
}

/// Serves templates from an in-memory name → source map.
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    templates: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.templates.insert(name.into(), source.into());
    }
}

impl Loader for MemoryLoader {
    fn load(&self, name: &str) -> Result<String> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| Error::TemplateNotFound {
                name: name.to_string(),
            })
    }
}

/// Reads `<root>/<name><suffix>` from disk.
#[derive(Debug, Clone)]
pub struct FileLoader {
    root: PathBuf,
    suffix: String,
}

impl FileLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            suffix: String::new(),
        }
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }
}

impl Loader for FileLoader {
    fn load(&self, name: &str) -> Result<String> {
        let path = self.root.join(format!("{name}{}", self.suffix));
        debug!(path = %path.display(), "loading template from disk");
        std::fs::read_to_string(&path).map_err(|_| Error::TemplateNotFound {
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_loader_echoes_the_name() {
        assert_eq!(StringLoader.load("{{ x }}").unwrap(), "{{ x }}");
    }

    #[test]
    fn memory_loader_reports_missing_names() {
        let loader = MemoryLoader::new().with("base", "hello");
        assert_eq!(loader.load("base").unwrap(), "hello");
        assert!(matches!(
            loader.load("missing"),
            Err(Error::TemplateNotFound { ref name }) if name == "missing"
        ));
    }

    #[test]
    fn file_loader_appends_suffix() {
        let dir = std::env::temp_dir().join(format!("shimmypebble-loader-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("page.peb"), "from disk").unwrap();

        let loader = FileLoader::new(&dir).suffix(".peb");
        assert_eq!(loader.load("page").unwrap(), "from disk");
        assert!(loader.load("absent").is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
