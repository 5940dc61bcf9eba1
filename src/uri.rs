//! Protocol-tagged URIs for cross-document references.
//!
//! Source text spells a URI as `<proto>//<path>` (no colon); the canonical
//! *store form* used for equality and map keys is `<proto>://<path>` with an
//! optional type-path suffix. Paths are normalized at construction, so two
//! spellings of the same location compare equal.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

use crate::error::TruthError;

/// The registered protocol set. Anything outside this set does not parse as
/// a URI at the statement level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UriProtocol {
    File,
    Http,
    Https,
    Internal,
    None,
    Unknown,
}

impl UriProtocol {
    pub const ALL: [UriProtocol; 6] = [
        // Longest prefixes first so `https//` does not read as `http` + `s//`.
        UriProtocol::Internal,
        UriProtocol::Unknown,
        UriProtocol::Https,
        UriProtocol::Http,
        UriProtocol::File,
        UriProtocol::None,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            UriProtocol::File => "file",
            UriProtocol::Http => "http",
            UriProtocol::Https => "https",
            UriProtocol::Internal => "internal",
            UriProtocol::None => "none",
            UriProtocol::Unknown => "unknown",
        }
    }

    /// The spelling used in source text, e.g. `file//`.
    pub fn source_prefix(&self) -> String {
        format!("{}//", self.name())
    }

    /// Protocols whose URIs are suppressed in rendered fault reports.
    pub fn is_unaddressable(&self) -> bool {
        matches!(
            self,
            UriProtocol::Internal | UriProtocol::None | UriProtocol::Unknown
        )
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, UriProtocol::Http | UriProtocol::Https)
    }
}

impl Display for UriProtocol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A parsed, normalized URI: protocol, path segments, and an optional
/// type-path suffix addressing a type within the target document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KnownUri {
    protocol: UriProtocol,
    path: Vec<String>,
    type_path: Vec<String>,
}

impl KnownUri {
    pub fn new(protocol: UriProtocol, path: Vec<String>, type_path: Vec<String>) -> KnownUri {
        KnownUri {
            protocol,
            path: normalize(path),
            type_path,
        }
    }

    /// An internal URI for documents created directly from text.
    pub fn internal(name: &str) -> KnownUri {
        KnownUri {
            protocol: UriProtocol::Internal,
            path: vec![name.to_string()],
            type_path: Vec::new(),
        }
    }

    /// Parse either the source spelling (`file//a/b`) or the store spelling
    /// (`file://a/b`). A second `//` inside the path begins the type-path
    /// suffix: `file//a/b//Type/Sub`.
    pub fn parse(token: &str) -> Result<KnownUri, TruthError> {
        for protocol in UriProtocol::ALL {
            let rest = token
                .strip_prefix(&format!("{}://", protocol.name()))
                .or_else(|| token.strip_prefix(&protocol.source_prefix()));
            let Some(rest) = rest else {
                continue;
            };
            let (path_part, type_part) = match rest.split_once("//") {
                Some((p, t)) => (p, Some(t)),
                None => (rest, None),
            };
            let path: Vec<String> = path_part
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            let type_path: Vec<String> = type_part
                .map(|t| {
                    t.split('/')
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            if path.is_empty() && type_path.is_empty() {
                return Err(TruthError::InvalidUri(token.to_string()));
            }
            return Ok(KnownUri::new(protocol, path, type_path));
        }
        Err(TruthError::InvalidUri(token.to_string()))
    }

    pub fn protocol(&self) -> UriProtocol {
        self.protocol
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn type_path(&self) -> &[String] {
        &self.type_path
    }

    /// The canonical serialized form: `protocol://path[/typePath]`.
    pub fn store_string(&self) -> String {
        let mut out = format!("{}://{}", self.protocol.name(), self.path.join("/"));
        if !self.type_path.is_empty() {
            out.push('/');
            out.push_str(&self.type_path.join("/"));
        }
        out
    }

    /// Resolve this URI against the document that references it. Relative
    /// spellings (`file//./a`, `file//../a`) are joined onto the base's
    /// directory; everything else passes through unchanged.
    pub fn resolved_against(&self, base: &KnownUri) -> KnownUri {
        let relative = self
            .path
            .first()
            .map(|seg| seg == "." || seg == "..")
            .unwrap_or(false);
        if !relative || self.protocol != base.protocol {
            return self.clone();
        }
        let mut joined: Vec<String> = base
            .path
            .iter()
            .take(base.path.len().saturating_sub(1))
            .cloned()
            .collect();
        joined.extend(self.path.iter().cloned());
        KnownUri::new(self.protocol, joined, self.type_path.clone())
    }
}

impl Display for KnownUri {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.store_string())
    }
}

/// Resolve `.` and `..` components, preserving leading `..` segments. A `.`
/// in the leading position is kept: it is the marker that distinguishes a
/// relative URI from an absolute one until [`KnownUri::resolved_against`]
/// joins it onto a base.
fn normalize(segments: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(segments.len());
    for (idx, segment) in segments.into_iter().enumerate() {
        match segment.as_str() {
            "." if idx > 0 => {}
            "." => out.push(segment),
            ".." => {
                if out.last().map(|s| s != "..").unwrap_or(false) {
                    out.pop();
                } else {
                    out.push(segment);
                }
            }
            _ => out.push(segment),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source_form() {
        let uri = KnownUri::parse("file//a/b.truth").unwrap();
        assert_eq!(uri.protocol(), UriProtocol::File);
        assert_eq!(uri.path(), ["a", "b.truth"]);
        assert_eq!(uri.store_string(), "file://a/b.truth");
    }

    #[test]
    fn test_parse_store_form_round_trip() {
        let uri = KnownUri::parse("https://example.com/x").unwrap();
        assert_eq!(uri.protocol(), UriProtocol::Https);
        assert_eq!(
            KnownUri::parse(&uri.store_string()).unwrap(),
            uri,
        );
    }

    #[test]
    fn test_https_does_not_parse_as_http() {
        let uri = KnownUri::parse("https//host/doc").unwrap();
        assert_eq!(uri.protocol(), UriProtocol::Https);
    }

    #[test]
    fn test_type_path_suffix() {
        let uri = KnownUri::parse("file//dir/doc.truth//Product/Sku").unwrap();
        assert_eq!(uri.path(), ["dir", "doc.truth"]);
        assert_eq!(uri.type_path(), ["Product", "Sku"]);
        assert_eq!(uri.store_string(), "file://dir/doc.truth/Product/Sku");
    }

    #[test]
    fn test_normalization_equality() {
        let a = KnownUri::parse("file//dir/./sub/../doc").unwrap();
        let b = KnownUri::parse("file//dir/doc").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unregistered_protocol_rejected() {
        assert!(KnownUri::parse("ftp//host/doc").is_err());
        assert!(KnownUri::parse("plain-identifier").is_err());
    }

    #[test]
    fn test_relative_resolution() {
        let base = KnownUri::parse("file//net/docs/main.truth").unwrap();
        let rel = KnownUri::parse("file//./sibling.truth").unwrap();
        assert_eq!(
            rel.resolved_against(&base).store_string(),
            "file://net/docs/sibling.truth"
        );
        let up = KnownUri::parse("file//../shared.truth").unwrap();
        assert_eq!(
            up.resolved_against(&base).store_string(),
            "file://net/shared.truth"
        );
    }
}
