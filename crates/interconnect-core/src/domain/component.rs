//! `ComponentName`: identifies one component (a service) inside an application package.
//!
//! The flattened form is `package/class`.  When the class lives inside the
//! package namespace the short form `package/.Class` is accepted and expanded
//! to `package/package.Class`.
//!
//! ```rust
//! use interconnect_core::ComponentName;
//!
//! let name = ComponentName::parse("app.linkhub/.interconnect.InterconnectService").unwrap();
//! assert_eq!(name.package(), "app.linkhub");
//! assert_eq!(name.class(), "app.linkhub.interconnect.InterconnectService");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a flattened component name cannot be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ComponentNameError {
    /// The string has no `/` separating package and class.
    #[error("component name '{0}' is missing the '/' separator")]
    MissingSeparator(String),

    /// The package or class part is empty.
    #[error("component name '{0}' has an empty package or class")]
    EmptyPart(String),
}

/// A `(package, class)` pair naming a service component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ComponentName {
    package: String,
    class: String,
}

impl ComponentName {
    /// Builds a component name from its parts.
    ///
    /// A class starting with `.` is resolved relative to `package`.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentNameError::EmptyPart`] if either part is empty.
    pub fn new(
        package: impl Into<String>,
        class: impl Into<String>,
    ) -> Result<Self, ComponentNameError> {
        let package = package.into();
        let class = class.into();

        if package.is_empty() || class.is_empty() || class == "." {
            return Err(ComponentNameError::EmptyPart(format!("{package}/{class}")));
        }

        let class = if class.starts_with('.') {
            format!("{package}{class}")
        } else {
            class
        };

        Ok(Self { package, class })
    }

    /// Parses the flattened `package/class` form.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentNameError::MissingSeparator`] when there is no `/`,
    /// or [`ComponentNameError::EmptyPart`] when a side of it is empty.
    pub fn parse(flat: &str) -> Result<Self, ComponentNameError> {
        let (package, class) = flat
            .split_once('/')
            .ok_or_else(|| ComponentNameError::MissingSeparator(flat.to_string()))?;
        Self::new(package, class)
    }

    /// The application package that hosts the component.
    pub fn package(&self) -> &str {
        &self.package
    }

    /// The fully-qualified class name of the component.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Returns the `package/class` form, shortening the class to `.Suffix`
    /// when it lives inside the package namespace.
    pub fn flatten_short(&self) -> String {
        match self.class.strip_prefix(self.package.as_str()) {
            Some(rest) if rest.starts_with('.') => format!("{}/{}", self.package, rest),
            _ => self.to_string(),
        }
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.package, self.class)
    }
}

impl std::str::FromStr for ComponentName {
    type Err = ComponentNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ComponentName {
    type Error = ComponentNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ComponentName> for String {
    fn from(value: ComponentName) -> Self {
        value.to_string()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
