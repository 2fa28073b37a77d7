//! Assembly identities and display names.
//!
//! Every module in a closure is keyed by the display name of the assembly it belongs to
//! (or, for the secondary modules of a multi-module assembly, by its file name). This module
//! parses and renders the standard .NET display-name format:
//!
//! ```text
//! Name, Version=1.2.3.4, Culture=neutral, PublicKeyToken=b77a5c561934e089
//! ```
//!
//! Only the simple name, version, culture and public key token take part in identity. Other
//! components (`ProcessorArchitecture=`, `Retargetable=`) are accepted and ignored.

use std::fmt::{self, Write};

use crate::Result;

/// A four-part assembly version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssemblyVersion {
    /// Major version component
    pub major: u16,
    /// Minor version component
    pub minor: u16,
    /// Build version component
    pub build: u16,
    /// Revision version component
    pub revision: u16,
}

impl AssemblyVersion {
    /// Create a version from its four components
    #[must_use]
    pub const fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Parse a dotted version string with one to four components.
    ///
    /// Missing trailing components default to zero.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if a component is not a valid `u16` or there are
    /// more than four components.
    pub fn parse(version_str: &str) -> Result<Self> {
        let parts: Vec<&str> = version_str.split('.').collect();
        if parts.len() > 4 {
            return Err(malformed_error!("Invalid version format: {}", version_str));
        }

        let mut components = [0u16; 4];
        for (i, part) in parts.iter().enumerate() {
            components[i] = part
                .trim()
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

/// The identity of an assembly as it appears in a display name.
///
/// Equality follows the loader's rules. The simple name and culture compare
/// case-insensitively. The version and public key token compare exactly.
#[derive(Debug, Clone)]
pub struct AssemblyIdentity {
    name: String,
    version: AssemblyVersion,
    culture: Option<String>,
    public_key_token: Option<[u8; 8]>,
}

impl AssemblyIdentity {
    /// Create an identity with a neutral culture and no public key token
    #[must_use]
    pub fn new(name: impl Into<String>, version: AssemblyVersion) -> Self {
        Self {
            name: name.into(),
            version,
            culture: None,
            public_key_token: None,
        }
    }

    /// Set the culture (`neutral` or an empty string clear it)
    #[must_use]
    pub fn with_culture(mut self, culture: impl Into<String>) -> Self {
        let culture = culture.into();
        self.culture = if culture.is_empty() || culture.eq_ignore_ascii_case("neutral") {
            None
        } else {
            Some(culture)
        };
        self
    }

    /// Set the public key token
    #[must_use]
    pub fn with_public_key_token(mut self, token: [u8; 8]) -> Self {
        self.public_key_token = Some(token);
        self
    }

    /// Parse an assembly display name.
    ///
    /// # Arguments
    /// * `display_name` - e.g. `"mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089"`
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the simple name is empty, the version is
    /// invalid or the public key token is not 16 hex digits.
    pub fn parse(display_name: &str) -> Result<Self> {
        let mut parts = display_name.split(',').map(str::trim);

        let name = parts.next().unwrap_or_default().to_string();
        if name.is_empty() {
            return Err(malformed_error!("Assembly name cannot be empty"));
        }

        let mut identity = Self::new(name, AssemblyVersion::default());
        for part in parts {
            let Some((key, value)) = part.split_once('=') else {
                return Err(malformed_error!(
                    "Invalid display name component '{}' in '{}'",
                    part,
                    display_name
                ));
            };

            match key.trim() {
                "Version" => identity.version = AssemblyVersion::parse(value.trim())?,
                "Culture" => identity = identity.with_culture(value.trim()),
                "PublicKeyToken" => {
                    let value = value.trim();
                    if !value.eq_ignore_ascii_case("null") && !value.is_empty() {
                        identity.public_key_token = Some(parse_token(value)?);
                    }
                }
                _ => {}
            }
        }

        Ok(identity)
    }

    /// The simple assembly name without version, culture or key.
    #[must_use]
    pub fn simple_name(&self) -> &str {
        &self.name
    }

    /// The assembly version
    #[must_use]
    pub fn version(&self) -> AssemblyVersion {
        self.version
    }

    /// The culture, `None` when neutral
    #[must_use]
    pub fn culture(&self) -> Option<&str> {
        self.culture.as_deref()
    }

    /// The public key token, if the assembly is strong-named
    #[must_use]
    pub fn public_key_token(&self) -> Option<[u8; 8]> {
        self.public_key_token
    }

    /// Render the full display name.
    ///
    /// The result always carries all four components, so two identities are equal
    /// exactly when their display names compare equal ignoring case.
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

        result.push_str(", PublicKeyToken=");
        match &self.public_key_token {
            Some(bytes) => {
                for byte in bytes {
                    let _ = write!(result, "{byte:02x}");
                }
            }
            None => result.push_str("null"),
        }

        result
    }
}

impl PartialEq for AssemblyIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
            && self.version == other.version
            && match (&self.culture, &other.culture) {
                (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                (None, None) => true,
                _ => false,
            }
            && self.public_key_token == other.public_key_token
    }
}

impl Eq for AssemblyIdentity {}

impl fmt::Display for AssemblyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

fn parse_token(value: &str) -> Result<[u8; 8]> {
    if value.len() != 16 || !value.is_ascii() {
        return Err(malformed_error!(
            "PublicKeyToken must be exactly 16 hex characters, got '{}'",
            value
        ));
    }

    let mut token = [0u8; 8];
    for (i, byte) in token.iter_mut().enumerate() {
        let pair = &value[i * 2..i * 2 + 2];
        *byte = u8::from_str_radix(pair, 16)
            .map_err(|_| malformed_error!("Invalid hex in PublicKeyToken '{}'", value))?;
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_display_name() {
        let identity = AssemblyIdentity::parse(
            "mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089",
        )
        .unwrap();

        assert_eq!(identity.simple_name(), "mscorlib");
        assert_eq!(identity.version(), AssemblyVersion::new(4, 0, 0, 0));
        assert_eq!(identity.culture(), None);
        assert_eq!(
            identity.public_key_token(),
            Some([0xb7, 0x7a, 0x5c, 0x56, 0x19, 0x34, 0xe0, 0x89])
        );
        assert_eq!(
            identity.display_name(),
            "mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089"
        );
    }

    #[test]
    fn parse_simple_name_only() {
        let identity = AssemblyIdentity::parse("Foo").unwrap();
        assert_eq!(identity.simple_name(), "Foo");
        assert_eq!(
            identity.display_name(),
            "Foo, Version=0.0.0.0, Culture=neutral, PublicKeyToken=null"
        );
    }

    #[test]
    fn parse_ignores_unknown_components() {
        let identity =
            AssemblyIdentity::parse("Lib, Version=1.2, ProcessorArchitecture=MSIL").unwrap();
        assert_eq!(identity.version(), AssemblyVersion::new(1, 2, 0, 0));
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!(AssemblyIdentity::parse("").is_err());
        assert!(AssemblyIdentity::parse("Lib, Version=1.x").is_err());
        assert!(AssemblyIdentity::parse("Lib, PublicKeyToken=abc").is_err());
        assert!(AssemblyIdentity::parse("Lib, Culture").is_err());
    }

    #[test]
    fn equality_ignores_name_case() {
        let a = AssemblyIdentity::parse("Foo, Version=1.0.0.0, Culture=en-US").unwrap();
        let b = AssemblyIdentity::parse("FOO, Version=1.0.0.0, Culture=EN-us").unwrap();
        let c = AssemblyIdentity::parse("Foo, Version=2.0.0.0, Culture=en-US").unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
