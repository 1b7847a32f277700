use std::{fmt, fmt::Write, str::FromStr};

use crate::{metadata::identity::PublicKeyToken, Error, Result};

/// Complete identity of an assembly: name, version, culture and public-key token.
///
/// # Examples
///
/// ```rust
/// use dotsign::metadata::identity::{AssemblyIdentity, AssemblyVersion};
///
/// let identity = AssemblyIdentity::new("Lib.Core", AssemblyVersion::new(1, 2, 0, 0), None, None);
/// assert_eq!(
///     identity.display_name(),
///     "Lib.Core, Version=1.2.0.0, Culture=neutral, PublicKeyToken=null"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssemblyIdentity {
    /// Simple assembly name (e.g., "mscorlib", "System.Core").
    pub name: String,

    /// Four-part version number.
    pub version: AssemblyVersion,

    /// Culture of a satellite assembly; `None` for culture-neutral assemblies.
    pub culture: Option<String>,

    /// Public-key token; `None` for assemblies without a strong name.
    pub public_key_token: Option<PublicKeyToken>,
}

/// Four-part version numbering for .NET assemblies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AssemblyVersion {
    /// Major version component.
    pub major: u16,
    /// Minor version component.
    pub minor: u16,
    /// Build version component.
    pub build: u16,
    /// Revision version component.
    pub revision: u16,
}

impl AssemblyIdentity {
    /// Create a new identity.
    pub fn new(
        name: impl Into<String>,
        version: AssemblyVersion,
        culture: Option<String>,
        public_key_token: Option<PublicKeyToken>,
    ) -> Self {
        Self {
            name: name.into(),
            version,
            culture,
            public_key_token,
        }
    }

    /// Parse an identity from its display name.
    ///
    /// ```text
    /// AssemblyName[, Version=Major.Minor.Build.Revision][, Culture=culture][, PublicKeyToken=token]
    /// ```
    ///
    /// Unknown components (e.g. `ProcessorArchitecture`) are ignored.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the name is empty or a component is invalid.
    pub fn parse(display_name: &str) -> Result<Self> {
        let mut parts = display_name.split(',').map(str::trim);

        let name = parts.next().unwrap_or_default().to_string();
        if name.is_empty() {
            return Err(malformed_error!("Assembly name cannot be empty"));
        }

        let mut version = AssemblyVersion::default();
        let mut culture = None;
        let mut public_key_token = None;

        for part in parts {
            if let Some(value) = part.strip_prefix("Version=") {
                version = AssemblyVersion::parse(value)?;
            } else if let Some(value) = part.strip_prefix("Culture=") {
                if value != "neutral" && !value.is_empty() {
                    culture = Some(value.to_string());
                }
            } else if let Some(value) = part.strip_prefix("PublicKeyToken=") {
                if value != "null" && !value.is_empty() {
                    public_key_token = Some(value.to_ascii_lowercase().parse()?);
                }
            }
        }

        Ok(Self {
            name,
            version,
            culture,
            public_key_token,
        })
    }

    /// The display name of this identity.
    ///
    /// Always lists version, culture and token, so the result is a stable key:
    /// `Name, Version=a.b.c.d, Culture=neutral, PublicKeyToken=null`.
    #[must_use]
    pub fn display_name(&self) -> String {
        let mut result = String::with_capacity(self.name.len() + 80);

        result.push_str(&self.name);

        let _ = write!(result, ", Version={}", self.version);
        let _ = write!(
            result,
            ", Culture={}",
            self.culture.as_deref().unwrap_or("neutral")
        );

        match &self.public_key_token {
            Some(token) => {
                let _ = write!(result, ", PublicKeyToken={}", token);
            }
            None => result.push_str(", PublicKeyToken=null"),
        }

        result
    }

    /// The simple assembly name.
    #[must_use]
    pub fn simple_name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if the identity carries a public-key token.
    #[must_use]
    pub fn is_strong_named(&self) -> bool {
        self.public_key_token.is_some()
    }

    /// Returns a copy of this identity carrying `token`.
    #[must_use]
    pub fn with_token(&self, token: PublicKeyToken) -> Self {
        Self {
            public_key_token: Some(token),
            ..self.clone()
        }
    }
}

impl AssemblyVersion {
    /// Create a new version.
    #[must_use]
    pub const fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Parse a version from one to four dot-separated components.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if a component is not a `u16`.
    pub fn parse(version_str: &str) -> Result<Self> {
        let parts: Vec<&str> = version_str.split('.').collect();

        if parts.len() > 4 {
            return Err(malformed_error!("Invalid version format: {}", version_str));
        }

        let mut components = [0u16; 4];
        for (i, part) in parts.iter().enumerate() {
            components[i] = part
                .parse::<u16>()
                .map_err(|_| malformed_error!("Invalid version component: {}", part))?;
        }

        Ok(Self::new(
            components[0],
            components[1],
            components[2],
            components[3],
        ))
    }
}

impl fmt::Display for AssemblyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

impl fmt::Display for AssemblyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for AssemblyVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl FromStr for AssemblyIdentity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
