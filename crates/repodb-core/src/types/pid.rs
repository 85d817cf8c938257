use derive_more::{Deref, Display};
use serde::{Deserialize, Serialize};

///
/// Pid
///
/// Opaque repository identifier. Assigned by the storage client and immutable
/// once assigned; doubles as the search-index primary key.
///

#[derive(
    Clone, Debug, Deref, Deserialize, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[deref(forward)]
#[serde(transparent)]
pub struct Pid(String);

impl Pid {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Namespace prefix (`test` in `test:42`), if the identifier carries one.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.0.split_once(':').map(|(ns, _)| ns)
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for Pid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Pid {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Pid {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl PartialEq<str> for Pid {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Pid {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_is_prefix_before_colon() {
        assert_eq!(Pid::new("test:42").namespace(), Some("test"));
        assert_eq!(Pid::new("plain").namespace(), None);
    }

    #[test]
    fn serializes_as_bare_string() {
        let json = serde_json::to_string(&Pid::new("test:1")).unwrap();
        assert_eq!(json, "\"test:1\"");
    }
}
