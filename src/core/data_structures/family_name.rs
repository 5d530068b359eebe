/*!
 * Family Name
 * Bounded inline string for page family names
 */

use crate::core::limits::MAX_FAMILY_NAME_LEN;
use serde::{Deserialize, Serialize};
use smartstring::alias::String as SmartString;
use std::fmt;

/// Name of a registered page family
///
/// Holds at most `MAX_FAMILY_NAME_LEN - 1` bytes. Names up to 23 bytes (the
/// common case) are stored inline without a heap allocation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
#[repr(transparent)]
pub struct FamilyName {
    inner: SmartString,
}

impl FamilyName {
    /// Longest accepted name in bytes
    pub const MAX_LEN: usize = MAX_FAMILY_NAME_LEN - 1;

    /// Validate and wrap a name
    ///
    /// Returns the rejected name back when it is empty, too long, or
    /// contains a NUL byte.
    pub fn new(name: &str) -> Result<Self, String> {
        if name.is_empty() || name.len() > Self::MAX_LEN || name.contains('\0') {
            return Err(name.to_string());
        }
        Ok(Self {
            inner: SmartString::from(name),
        })
    }

    #[inline(always)]
    pub fn as_str(&self) -> &str {
        self.inner.as_str()
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Check if the name is stored inline (no heap allocation)
    #[inline]
    pub fn is_inline(&self) -> bool {
        self.inner.is_inline()
    }
}

impl TryFrom<String> for FamilyName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FamilyName::new(&value)
    }
}

impl From<FamilyName> for String {
    #[inline]
    fn from(name: FamilyName) -> Self {
        name.inner.into()
    }
}

impl AsRef<str> for FamilyName {
    #[inline(always)]
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::ops::Deref for FamilyName {
    type Target = str;

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl fmt::Display for FamilyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
