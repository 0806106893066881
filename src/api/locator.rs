//! Resource locator
//!
//! Builds canonical resource paths of the form `base[/id][/action]`.

use std::borrow::Cow;
use std::fmt;

/// Identifier of a remote resource, assigned by the management API
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceId {
    Numeric(u64),
    Named(String),
}

impl ResourceId {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Named(name) if name.is_empty())
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(id) => write!(f, "{}", id),
            Self::Named(name) => f.write_str(name),
        }
    }
}

impl From<u64> for ResourceId {
    fn from(id: u64) -> Self {
        Self::Numeric(id)
    }
}

impl From<&str> for ResourceId {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

/// Identifier of an environment (a Docker, Kubernetes, Nomad or Edge endpoint)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnvironmentId(u64);

impl EnvironmentId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for EnvironmentId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<EnvironmentId> for ResourceId {
    fn from(id: EnvironmentId) -> Self {
        Self::Numeric(id.0)
    }
}

impl fmt::Display for EnvironmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Percent-encode a single path segment
pub fn encode_segment(segment: &str) -> Cow<'_, str> {
    urlencoding::encode(segment)
}

/// Build `base[/id][/action]`
///
/// The id is encoded as one segment. Each `/`-separated part of the action is
/// encoded on its own, so `"docker/volumes"` stays two segments. The base is
/// used verbatim.
pub fn build_url(base: &str, id: Option<&ResourceId>, action: Option<&str>) -> String {
    let mut url = base.to_string();

    if let Some(id) = id {
        url.push('/');
        url.push_str(&encode_segment(&id.to_string()));
    }

    if let Some(action) = action {
        for part in action.split('/') {
            url.push('/');
            url.push_str(&encode_segment(part));
        }
    }

    url
}

/// Append each segment to `base`, encoding every one whole
///
/// Unlike an action passed to [`build_url`], a `/` inside a segment is
/// encoded and never starts a new segment.
pub fn append_segments(base: &str, segments: &[&str]) -> String {
    let mut url = base.to_string();
    for segment in segments {
        url.push('/');
        url.push_str(&encode_segment(segment));
    }
    url
}

/// Whether URL parsing would collapse `segment` as `.` or `..`
///
/// Percent-encoded dots count too, since `encode_segment` leaves `.` as is
/// and parsers decode `%2e` before resolving.
pub fn is_dot_segment(segment: &str) -> bool {
    matches!(
        segment.to_ascii_lowercase().as_str(),
        "." | ".." | "%2e" | "%2e%2e" | ".%2e" | "%2e."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_only() {
        assert_eq!(build_url("/stacks", None, None), "/stacks");
    }

    #[test]
    fn test_base_and_id() {
        assert_eq!(build_url("/stacks", Some(&7u64.into()), None), "/stacks/7");
    }

    #[test]
    fn test_base_id_and_action() {
        assert_eq!(
            build_url("/stacks", Some(&7u64.into()), Some("images_status")),
            "/stacks/7/images_status"
        );
    }

    #[test]
    fn test_action_without_id() {
        assert_eq!(
            build_url("/nomad/endpoints/5", None, Some("dashboard")),
            "/nomad/endpoints/5/dashboard"
        );
    }

    #[test]
    fn test_reserved_characters_are_encoded() {
        let id = ResourceId::from("my volume/with?odd#chars");
        assert_eq!(
            build_url("/volumes", Some(&id), None),
            "/volumes/my%20volume%2Fwith%3Fodd%23chars"
        );
    }

    #[test]
    fn test_multi_segment_action() {
        assert_eq!(
            build_url("/endpoints", Some(&EnvironmentId::new(3).into()), Some("docker/volumes")),
            "/endpoints/3/docker/volumes"
        );
    }

    #[test]
    fn test_append_segments_keeps_slashes_inside() {
        assert_eq!(
            append_segments("/kubernetes/3/namespaces", &["ns", "applications", "Deployment", "a/b"]),
            "/kubernetes/3/namespaces/ns/applications/Deployment/a%2Fb"
        );
        assert_eq!(append_segments("/stacks", &[]), "/stacks");
    }

    #[test]
    fn test_dot_segments() {
        for segment in [".", "..", "%2e", "%2E%2e", ".%2E", "%2e."] {
            assert!(is_dot_segment(segment), "{}", segment);
        }
        for segment in ["", "...", "a.b", ".hidden", "%2e%2e%2e"] {
            assert!(!is_dot_segment(segment), "{}", segment);
        }
    }

    #[test]
    fn test_empty_named_id() {
        assert!(ResourceId::from("").is_empty());
        assert!(!ResourceId::from(0u64).is_empty());
    }
}
