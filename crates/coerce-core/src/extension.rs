//! Extension manifests.
//!
//! A manifest names one extension per line, followed by `;`-separated
//! directives:
//!
//! ```text
//! # comment            -- comment            // comment
//! primitive.int;index=13
//! my::Converter;priority=5;mode=strict
//! ```
//!
//! `index=N` sets the position (ascending, default 100) and `priority=N`
//! is `index=-N`. Other `key=value` pairs are handed to the extension's
//! factory; directives without `=` are ignored. A comment marker ends the
//! line. Bad lines are recorded and skipped.

use indexmap::IndexMap;
use std::path::Path;
use std::sync::Arc;

pub const DEFAULT_INDEX: i64 = 100;

const COMMENT_PREFIXES: [&str; 3] = ["#", "--", "//"];

/// Opaque `key=value` pairs of a manifest line.
pub type Metadata = IndexMap<String, String>;

/// Builds an extension from its metadata. `None` means the extension is
/// unavailable in this process and is skipped without error.
pub type Factory<T> = Arc<dyn Fn(&Metadata) -> Option<T> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    #[error("{origin}:{line}: unknown extension '{name}'")]
    UnknownExtension {
        origin: String,
        line: usize,
        name: String,
    },

    #[error("{origin}:{line}: invalid directive '{directive}'")]
    InvalidDirective {
        origin: String,
        line: usize,
        directive: String,
    },

    #[error("{origin}:{line}: missing extension name")]
    MissingName { origin: String, line: usize },

    #[error("{origin}: {message}")]
    Unreadable { origin: String, message: String },
}

/// A loaded manifest entry.
#[derive(Debug, Clone)]
pub struct Extension<T> {
    pub name: String,
    pub index: i64,
    pub properties: Metadata,
    pub instance: Option<T>,
}

impl<T> Extension<T> {
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn property_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.property(key).unwrap_or(default)
    }
}

/// Reads manifests and instantiates the extensions they name.
pub struct ExtensionLoader<T> {
    factories: IndexMap<String, Factory<T>>,
    extensions: Vec<Extension<T>>,
    errors: Vec<ManifestError>,
}

impl<T> Default for ExtensionLoader<T> {
    fn default() -> Self {
        Self {
            factories: IndexMap::new(),
            extensions: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl<T> ExtensionLoader<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `name` loadable.
    pub fn provide<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&Metadata) -> Option<T> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn is_provided(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Loaded extensions in index order.
    pub fn extensions(&self) -> &[Extension<T>] {
        &self.extensions
    }

    pub fn into_extensions(self) -> Vec<Extension<T>> {
        self.extensions
    }

    pub fn errors(&self) -> &[ManifestError] {
        &self.errors
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> &mut Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => self.load_str(&path.display().to_string(), &text),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "manifest unreadable");
                self.errors.push(ManifestError::Unreadable {
                    origin: path.display().to_string(),
                    message: e.to_string(),
                });
                self
            }
        }
    }

    /// Loads manifest text. `origin` names it in errors.
    pub fn load_str(&mut self, origin: &str, text: &str) -> &mut Self {
        for (number, line) in text.lines().enumerate() {
            if let Err(error) = self.load_line(origin, number + 1, line) {
                tracing::debug!(%error, "manifest line skipped");
                self.errors.push(error);
            }
        }
        self
    }

    fn load_line(&mut self, origin: &str, line: usize, raw: &str) -> Result<(), ManifestError> {
        let text = strip_comment(raw).trim();
        if text.is_empty() {
            return Ok(());
        }

        let mut parts = text.split(';').map(str::trim);
        let name = parts.next().unwrap_or_default();
        if name.is_empty() {
            return Err(ManifestError::MissingName {
                origin: origin.to_string(),
                line,
            });
        }

        let mut index = DEFAULT_INDEX;
        let mut properties = Metadata::new();
        for directive in parts.filter(|p| !p.is_empty()) {
            let invalid = || ManifestError::InvalidDirective {
                origin: origin.to_string(),
                line,
                directive: directive.to_string(),
            };
            let Some((key, value)) = directive.split_once('=') else {
                tracing::debug!(origin, line, directive, "directive without value ignored");
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            match key {
                "index" => index = value.parse().map_err(|_| invalid())?,
                "priority" => {
                    index = value
                        .parse::<i64>()
                        .ok()
                        .and_then(i64::checked_neg)
                        .ok_or_else(invalid)?;
                }
                _ => {
                    properties.insert(key.to_string(), value.to_string());
                }
            }
        }

        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ManifestError::UnknownExtension {
                origin: origin.to_string(),
                line,
                name: name.to_string(),
            })?;
        let Some(instance) = factory(&properties) else {
            tracing::debug!(extension = name, "extension unavailable, skipped");
            return Ok(());
        };

        let extension = Extension {
            name: name.to_string(),
            index,
            properties,
            instance: Some(instance),
        };
        let position = self
            .extensions
            .iter()
            .rposition(|e| e.index <= index)
            .map_or(0, |p| p + 1);
        self.extensions.insert(position, extension);
        Ok(())
    }
}

/// The line up to its first comment marker.
fn strip_comment(line: &str) -> &str {
    COMMENT_PREFIXES
        .iter()
        .filter_map(|prefix| line.find(prefix))
        .min()
        .map_or(line, |end| &line[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader() -> ExtensionLoader<String> {
        let mut loader = ExtensionLoader::new();
        for name in ["a", "b", "c", "d"] {
            loader.provide(name, move |meta: &Metadata| {
                Some(format!("{name}{}", meta.get("tag").map_or("", String::as_str)))
            });
        }
        loader.provide("off", |_: &Metadata| None);
        loader
    }

    fn names(loader: &ExtensionLoader<String>) -> Vec<&str> {
        loader.extensions().iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let mut loader = loader();
        loader.load_str("m", "# one\n\n  -- two\n// three\n  a  \n");
        assert_eq!(names(&loader), ["a"]);
        assert!(loader.errors().is_empty());
    }

    #[test]
    fn test_index_ordering_is_stable() {
        let mut loader = loader();
        loader.load_str("m", "a\nb;index=5\nc;index=100\nd;priority=1\n");
        assert_eq!(names(&loader), ["d", "b", "a", "c"]);
        assert_eq!(loader.extensions()[0].index, -1);
    }

    #[test]
    fn test_metadata_reaches_factory() {
        let mut loader = loader();
        loader.load_str("m", "a;tag=!;mode = strict\n");
        let ext = &loader.extensions()[0];
        assert_eq!(ext.instance.as_deref(), Some("a!"));
        assert_eq!(ext.property("mode"), Some("strict"));
        assert_eq!(ext.property_or("missing", "x"), "x");
    }

    #[test]
    fn test_errors_collected_and_loading_continues() {
        let mut loader = loader();
        loader.load_str("m", "zzz\na;index=x\nb;index=\n;index=1\nc\n");
        assert_eq!(names(&loader), ["c"]);
        assert_eq!(
            loader.errors(),
            &[
                ManifestError::UnknownExtension {
                    origin: "m".into(),
                    line: 1,
                    name: "zzz".into()
                },
                ManifestError::InvalidDirective {
                    origin: "m".into(),
                    line: 2,
                    directive: "index=x".into()
                },
                ManifestError::InvalidDirective {
                    origin: "m".into(),
                    line: 3,
                    directive: "index=".into()
                },
                ManifestError::MissingName {
                    origin: "m".into(),
                    line: 4
                },
            ]
        );
    }

    #[test]
    fn test_trailing_comments_stripped() {
        let mut loader = loader();
        loader.load_str("m", "a;index=5 # note\nb;tag=x -- note\nc // note\n");
        assert_eq!(names(&loader), ["a", "b", "c"]);
        assert_eq!(loader.extensions()[0].index, 5);
        assert_eq!(loader.extensions()[1].instance.as_deref(), Some("bx"));
        assert!(loader.errors().is_empty());
    }

    #[test]
    fn test_directive_without_value_ignored() {
        let mut loader = loader();
        loader.load_str("m", "a;junk;tag=!\n");
        assert_eq!(names(&loader), ["a"]);
        assert_eq!(loader.extensions()[0].instance.as_deref(), Some("a!"));
        assert!(loader.errors().is_empty());
    }

    #[test]
    fn test_priority_out_of_range() {
        let mut loader = loader();
        loader.load_str("m", "a;priority=-9223372036854775808\nb\n");
        assert_eq!(names(&loader), ["b"]);
        assert_eq!(
            loader.errors(),
            &[ManifestError::InvalidDirective {
                origin: "m".into(),
                line: 1,
                directive: "priority=-9223372036854775808".into()
            }]
        );
    }

    #[test]
    fn test_unavailable_extension_skipped_silently() {
        let mut loader = loader();
        loader.load_str("m", "off\na\n");
        assert_eq!(names(&loader), ["a"]);
        assert!(loader.errors().is_empty());
    }

    #[test]
    fn test_unreadable_file() {
        let mut loader = loader();
        loader.load_file("/nonexistent/x.manifest");
        assert!(matches!(
            loader.errors(),
            [ManifestError::Unreadable { .. }]
        ));
    }
}
