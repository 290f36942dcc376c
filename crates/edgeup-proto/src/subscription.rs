//! Subscription artifact codec and node entries

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Artifact is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Artifact is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Artifact I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Link schemes understood by the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeScheme {
    Vless,
    Vmess,
    Trojan,
    Hysteria2,
    Tuic,
}

impl NodeScheme {
    pub const ALL: [NodeScheme; 5] = [
        NodeScheme::Vless,
        NodeScheme::Vmess,
        NodeScheme::Trojan,
        NodeScheme::Hysteria2,
        NodeScheme::Tuic,
    ];

    /// Link prefix including `://`
    pub fn prefix(self) -> &'static str {
        match self {
            NodeScheme::Vless => "vless://",
            NodeScheme::Vmess => "vmess://",
            NodeScheme::Trojan => "trojan://",
            NodeScheme::Hysteria2 => "hysteria2://",
            NodeScheme::Tuic => "tuic://",
        }
    }
}

/// A single connection link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub struct NodeEntry {
    scheme: NodeScheme,
    link: String,
}

impl NodeEntry {
    /// Parse one artifact line; `None` unless it starts with a supported scheme
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        NodeScheme::ALL
            .iter()
            .find(|scheme| line.starts_with(scheme.prefix()))
            .map(|scheme| NodeEntry {
                scheme: *scheme,
                link: line.to_string(),
            })
    }

    pub fn scheme(&self) -> NodeScheme {
        self.scheme
    }

    pub fn as_str(&self) -> &str {
        &self.link
    }
}

impl From<NodeEntry> for String {
    fn from(entry: NodeEntry) -> Self {
        entry.link
    }
}

impl fmt::Display for NodeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.link)
    }
}

/// Plain link text; persisted as a single base64 blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionArtifact {
    text: String,
}

impl SubscriptionArtifact {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Join links into the artifact text, blank line between entries
    pub fn from_links<I, S>(links: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut text = String::from("\n");
        for link in links {
            text.push_str(link.as_ref());
            text.push_str("\n\n");
        }
        Self { text }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn encode(&self) -> String {
        BASE64.encode(self.text.as_bytes())
    }

    pub fn decode(encoded: &str) -> Result<Self, ArtifactError> {
        let bytes = BASE64.decode(encoded.trim())?;
        Ok(Self {
            text: String::from_utf8(bytes)?,
        })
    }

    /// Lines that carry a supported link scheme
    pub fn node_entries(&self) -> Vec<NodeEntry> {
        self.text.lines().filter_map(NodeEntry::parse).collect()
    }

    /// Replace `path` with the encoded artifact
    ///
    /// Written to a uniquely named sibling temp file first, so readers never
    /// observe a partial artifact and concurrent writers never share a
    /// temp path.
    pub fn persist(&self, path: &Path) -> Result<String, ArtifactError> {
        let encoded = self.encode();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(encoded.as_bytes())?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(encoded)
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let content = fs::read_to_string(path)?;
        Self::decode(&content)
    }
}

/// Where a hostname came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainSource {
    /// Taken from configuration (named tunnel)
    Configured,
    /// Scraped from the tunnel client's log (quick tunnel)
    Discovered,
}

/// Publicly reachable hostname of the tunnel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDomain {
    pub hostname: String,
    pub source: DomainSource,
}

impl DiscoveredDomain {
    pub fn configured(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            source: DomainSource::Configured,
        }
    }

    pub fn discovered(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            source: DomainSource::Discovered,
        }
    }
}

impl fmt::Display for DiscoveredDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hostname)
    }
}
