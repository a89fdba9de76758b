use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// The composite identifier `short_name + "___" + sanitized_version`, where
/// `sanitized_version` replaces every `.` in the raw version with `_`.
///
/// Construction always sanitizes; there is no way to build a [`CollectionId`]
/// that embeds a raw, dotted version string.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectionId(String);

const SEPARATOR: &str = "___";

impl CollectionId {
    /// Builds a collection id from a short name and a raw (possibly dotted)
    /// version string, sanitizing the version as the registry and engine
    /// both expect.
    pub fn new(short_name: &str, raw_version: &str) -> Self {
        let sanitized = raw_version.replace('.', "_");
        CollectionId(format!("{short_name}{SEPARATOR}{sanitized}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits back into `(short_name, sanitized_version)`. Collection ids are
    /// always constructed with [`CollectionId::new`], so this never fails for
    /// a value that round-tripped through this type; it can fail for values
    /// parsed from untrusted input, hence the `Result`.
    pub fn split(&self) -> Result<(&str, &str), CollectionIdError> {
        self.0
            .split_once(SEPARATOR)
            .ok_or_else(|| CollectionIdError::MissingSeparator(self.0.clone()))
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CollectionId {
    type Err = CollectionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains(SEPARATOR) {
            Ok(CollectionId(s.to_string()))
        } else {
            Err(CollectionIdError::MissingSeparator(s.to_string()))
        }
    }
}

#[derive(Debug, Error)]
pub enum CollectionIdError {
    #[error("collection id `{0}` does not contain the `{SEPARATOR}` separator")]
    MissingSeparator(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_dotted_versions() {
        let id = CollectionId::new("MOD09GA", "6.1");
        assert_eq!(id.as_str(), "MOD09GA___6_1");
    }

    #[test]
    fn splits_back_into_parts() {
        let id = CollectionId::new("MOD09GA", "6.1");
        assert_eq!(id.split().unwrap(), ("MOD09GA", "6_1"));
    }

    #[test]
    fn from_str_requires_separator() {
        assert!(CollectionId::from_str("no-separator-here").is_err());
        assert!(CollectionId::from_str("MOD09GA___6_1").is_ok());
    }
}
