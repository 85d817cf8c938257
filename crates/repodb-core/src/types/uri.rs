use crate::types::Pid;

///
/// UriTranslator
///
/// Pure, invertible mapping between repository identifiers and fully
/// qualified resource URIs. `uri_to_id(id_to_uri(p)) == Some(p)` must hold
/// for every identifier the storage client can mint.
///

pub trait UriTranslator {
    fn id_to_uri(&self, pid: &Pid) -> String;

    fn uri_to_id(&self, uri: &str) -> Option<Pid>;
}

///
/// BaseUriTranslator
///
/// Default translator: `<base>/<pid>`.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BaseUriTranslator {
    base: String,
}

impl BaseUriTranslator {
    #[must_use]
    pub fn new(base: impl Into<String>) -> Self {
        let mut base = base.into();
        while base.ends_with('/') {
            base.pop();
        }

        Self { base }
    }

    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }
}

impl UriTranslator for BaseUriTranslator {
    fn id_to_uri(&self, pid: &Pid) -> String {
        format!("{}/{}", self.base, pid)
    }

    fn uri_to_id(&self, uri: &str) -> Option<Pid> {
        let rest = uri.strip_prefix(self.base.as_str())?.strip_prefix('/')?;
        if rest.is_empty() {
            return None;
        }

        Some(Pid::new(rest))
    }
}
