//! Object key schema for base translation files
//!
//! Keys look like `t-<tag>/<slug>/[<namespace>/]<locale>.json`. The part after
//! the slug (`[<namespace>/]<locale>.json`) is also the entry name used in the
//! archives exchanged between environments.

use crate::error::{LokalisointiError, Result};

const JSON_SUFFIX: &str = ".json";

/// Decoded components of an object key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    pub slug: String,
    pub namespace: Option<String>,
    pub locale: String,
}

impl ObjectKey {
    /// Archive entry name: `<namespace>/<locale>.json` or `<locale>.json`
    pub fn file_path(&self) -> String {
        file_path(self.namespace.as_deref(), &self.locale)
    }
}

/// Encodes and decodes object keys for one tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectKeyCodec {
    tag: String,
}

impl ObjectKeyCodec {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// First key segment, `t-<tag>`
    pub fn tag_segment(&self) -> String {
        format!("t-{}", self.tag)
    }

    /// Listing prefix covering every object of the tag
    pub fn prefix(&self) -> String {
        format!("t-{}/", self.tag)
    }

    pub fn encode(&self, slug: &str, namespace: Option<&str>, locale: &str) -> String {
        format!("t-{}/{}/{}", self.tag, slug, file_path(namespace, locale))
    }

    pub fn encode_key(&self, key: &ObjectKey) -> String {
        self.encode(&key.slug, key.namespace.as_deref(), &key.locale)
    }

    pub fn decode(&self, key: &str) -> Result<ObjectKey> {
        let segments: Vec<&str> = key.split('/').collect();
        let tag_segment = self.tag_segment();

        match segments.as_slice() {
            [tag, slug, rest @ ..] if *tag == tag_segment && !slug.is_empty() => {
                let (namespace, locale) = parse_file_segments(rest)
                    .map_err(|e| LokalisointiError::Parse(format!("object key '{}': {}", key, e)))?;
                Ok(ObjectKey {
                    slug: slug.to_string(),
                    namespace,
                    locale,
                })
            }
            _ => Err(LokalisointiError::Parse(format!(
                "object key '{}' does not start with '{}/<slug>/'",
                key, tag_segment
            ))),
        }
    }
}

/// `[<namespace>/]<locale>.json`
pub fn file_path(namespace: Option<&str>, locale: &str) -> String {
    match namespace {
        Some(ns) => format!("{}/{}{}", ns, locale, JSON_SUFFIX),
        None => format!("{}{}", locale, JSON_SUFFIX),
    }
}

/// Parse an archive entry name into (namespace, locale)
pub fn parse_file_path(path: &str) -> Result<(Option<String>, String)> {
    let segments: Vec<&str> = path.split('/').collect();
    parse_file_segments(&segments)
        .map_err(|e| LokalisointiError::Parse(format!("archive entry '{}': {}", path, e)))
}

fn parse_file_segments(segments: &[&str]) -> std::result::Result<(Option<String>, String), String> {
    let (namespace, filename) = match segments {
        [filename] => (None, *filename),
        [namespace, filename] if !namespace.is_empty() => (Some(namespace.to_string()), *filename),
        _ => {
            return Err(format!(
                "expected 1 or 2 path segments after the slug, found {}",
                segments.len()
            ))
        }
    };

    let locale = filename
        .strip_suffix(JSON_SUFFIX)
        .filter(|l| !l.is_empty())
        .ok_or_else(|| format!("'{}' is not a <locale>.json file", filename))?;

    Ok((namespace, locale.to_string()))
}
