use std::path::{Path, PathBuf};
use semver::Version;
use serde::Deserialize;
use serde_json::{Map, Value};
use crate::error::ConfigurationError;

pub const DEPENDENCY_SECTIONS: [&str; 2] = ["dependencies", "optionalDependencies"];

/// The fields of a `package.json` this crate reads.
#[derive(Deserialize, Debug)]
struct Header {
    name: String,
    version: String,
}

/// A `package.json` file.
///
/// The whole JSON document is kept, in its original key order, so fields
/// this crate does not know about survive a rewrite.
#[derive(Debug, Clone)]
pub struct PackageDescriptor {
    pub path: PathBuf,
    pub name: String,
    pub version: Version,
    document: Map<String, Value>,
    original: String,
}

impl PackageDescriptor {
    /// Reads and validates a descriptor.
    ///
    /// # Errors
    /// [`ConfigurationError::InvalidFile`] if it can't be read or parsed,
    /// [`ConfigurationError::MalformedVersion`] if `version` is not semver.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<PackageDescriptor, ConfigurationError> {
        let path = path.as_ref().to_path_buf();
        let invalid = |message: String| ConfigurationError::InvalidFile {
            path: path.clone(),
            message,
        };
        let original = std::fs::read_to_string(&path).map_err(|e| invalid(e.to_string()))?;
        let document: Map<String, Value> = serde_json::from_str(&original).map_err(|e| invalid(e.to_string()))?;
        let header: Header = serde_json::from_value(Value::Object(document.clone()))
            .map_err(|e| invalid(e.to_string()))?;
        let version = Version::parse(&header.version).map_err(|source| ConfigurationError::MalformedVersion {
            path: path.clone(),
            version: header.version.clone(),
            source,
        })?;
        Ok(PackageDescriptor {
            path,
            name: header.name,
            version,
            document,
            original,
        })
    }

    /// The version range declared for `name`, from either dependency section.
    pub fn dependency(&self, name: &str) -> Option<&str> {
        DEPENDENCY_SECTIONS.iter().find_map(|section| {
            self.document
                .get(*section)
                .and_then(|deps| deps.get(name))
                .and_then(Value::as_str)
        })
    }

    pub fn set_version(&mut self, version: &Version) {
        self.version = version.clone();
        self.document.insert("version".to_string(), Value::String(version.to_string()));
    }

    /// Rewrites every existing entry for `name`; entries are never added.
    ///
    /// Returns whether an entry was found.
    pub fn update_dependency(&mut self, name: &str, range: &str) -> bool {
        let mut found = false;
        for section in DEPENDENCY_SECTIONS {
            if let Some(entry) = self
                .document
                .get_mut(section)
                .and_then(Value::as_object_mut)
                .and_then(|deps| deps.get_mut(name))
            {
                *entry = Value::String(range.to_string());
                found = true;
            }
        }
        found
    }

    /// The file contents: two-space indented JSON with a trailing newline.
    pub fn render(&self) -> String {
        let mut rendered = serde_json::to_string_pretty(&self.document).unwrap_or_default();
        rendered.push('\n');
        rendered
    }

    pub fn is_modified(&self) -> bool {
        self.render() != self.original
    }

    /// Writes the descriptor if its contents changed. Returns whether it did.
    pub fn save(&mut self) -> std::io::Result<bool> {
        let rendered = self.render();
        if rendered == self.original {
            return Ok(false);
        }
        std::fs::write(&self.path, &rendered)?;
        self.original = rendered;
        Ok(true)
    }
}
