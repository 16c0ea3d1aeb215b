use serde::{Deserialize, Deserializer, Serialize};
use std::{ops::Deref, str::FromStr};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum NameError {
    #[error("component name must be between 3 and 64 characters")]
    Length,
    #[error("component name must be lowercase alphanumeric or underscore")]
    Char,
}

/// The stable identifier of a registered component kind.
/// It is a string with strict validation rules: `[a-z0-9_]{3,64}`.
/// Names are part of the wire contract - renaming one breaks existing areas.
#[derive(Serialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct ComponentName(String);

impl ComponentName {
    pub fn new(name: impl Into<String>) -> Result<Self, NameError> {
        let name = name.into();

        if name.len() < 3 || name.len() > 64 {
            return Err(NameError::Length);
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(NameError::Char);
        }
        Ok(Self(name))
    }
}

impl<'de> Deserialize<'de> for ComponentName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ComponentName::new(s).map_err(serde::de::Error::custom)
    }
}

impl AsRef<str> for ComponentName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ComponentName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for ComponentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ComponentName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComponentName::new(s)
    }
}

impl TryFrom<&str> for ComponentName {
    type Error = NameError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        ComponentName::new(s)
    }
}

macro_rules! new_numeric_id_type {
    ($type_name:ident) => {
        /// Database row identity, opaque to everything but the store
        #[derive(
            Serialize,
            Deserialize,
            Clone,
            Copy,
            Debug,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
        )]
        #[serde(transparent)]
        pub struct $type_name(i64);

        impl $type_name {
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            pub fn inner(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $type_name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $type_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

new_numeric_id_type!(AreaId);
new_numeric_id_type!(UserId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        ComponentName::new("time_trigger").unwrap();
        ComponentName::new("gmail_receive").unwrap();
        ComponentName::new("abc").unwrap();
        ComponentName::new("x2_y3").unwrap();
    }

    #[test]
    fn invalid_names() {
        assert_eq!(ComponentName::new("ab").unwrap_err(), NameError::Length);
        assert_eq!(
            ComponentName::new("a".repeat(65)).unwrap_err(),
            NameError::Length
        );
        assert_eq!(
            ComponentName::new("With Space").unwrap_err(),
            NameError::Char
        );
        assert_eq!(
            ComponentName::new("kebab-case").unwrap_err(),
            NameError::Char
        );
        assert_eq!(
            ComponentName::new("UPPER_CASE").unwrap_err(),
            NameError::Char
        );
    }

    #[test]
    fn invalid_name_deserialize() {
        let name: ComponentName = serde_json::from_str("\"print_reaction\"").unwrap();
        assert_eq!(name.as_ref(), "print_reaction");

        serde_json::from_str::<ComponentName>("\"NOT/A/NAME\"").unwrap_err();
    }
}
