//! Direct serving of base translation files with HTTP conditional semantics
//!
//! Files are served exactly as stored; overrides are not layered in here.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::Result;
use crate::storage::{BaseStore, Conditional, Conditions};
use crate::types::ObjectMetadata;

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Format a timestamp as an IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`)
pub fn format_http_date(at: &DateTime<Utc>) -> String {
    at.format(HTTP_DATE_FORMAT).to_string()
}

/// Parse an HTTP date header; unparseable values are ignored by callers
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, HTTP_DATE_FORMAT)
        .map(|naive| naive.and_utc())
        .or_else(|_| DateTime::parse_from_rfc2822(value).map(|dt| dt.with_timezone(&Utc)))
        .ok()
}

/// `Cache-Control` directive attached to served content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDirective {
    Public(Duration),
    NoCache,
}

impl CacheDirective {
    pub fn header_value(&self) -> String {
        match self {
            CacheDirective::Public(max_age) => format!("public, max-age={}", max_age.as_secs()),
            CacheDirective::NoCache => "no-cache".to_string(),
        }
    }
}

/// Outcome of serving one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileResponse {
    Fresh {
        content: Vec<u8>,
        etag: String,
        last_modified: DateTime<Utc>,
    },
    NotModified {
        etag: String,
        last_modified: DateTime<Utc>,
    },
    NotFound,
}

/// Serves single base files by slug, namespace and locale
#[derive(Clone)]
pub struct ConditionalCacheAdapter {
    base: Arc<BaseStore>,
    max_age: Duration,
}

impl ConditionalCacheAdapter {
    pub fn new(base: Arc<BaseStore>, max_age: Duration) -> Self {
        Self { base, max_age }
    }

    /// Directive sent with both 200 and 304 answers
    pub fn cache_directive(&self) -> CacheDirective {
        CacheDirective::Public(self.max_age)
    }

    pub async fn get_file(
        &self,
        slug: &str,
        namespace: Option<&str>,
        locale: &str,
        if_none_match: Option<&str>,
        if_modified_since: Option<DateTime<Utc>>,
    ) -> Result<FileResponse> {
        let key = self.base.codec().encode(slug, namespace, locale);
        let conditions = Conditions {
            if_none_match: if_none_match.map(String::from),
            if_modified_since,
        };

        match self.base.get_conditional(&key, &conditions).await {
            Ok(Conditional::Fresh(object)) => Ok(FileResponse::Fresh {
                content: object.content,
                etag: object.metadata.etag,
                last_modified: object.metadata.last_modified,
            }),
            Ok(Conditional::NotModified(metadata)) => Ok(FileResponse::NotModified {
                etag: metadata.etag,
                last_modified: metadata.last_modified,
            }),
            Ok(Conditional::NotFound) => Ok(FileResponse::NotFound),
            Err(e) => {
                tracing::warn!("Could not return localisation file {}: {}", key, e);
                Err(e)
            }
        }
    }

    /// Current validators of a file without its content
    pub async fn get_file_head(
        &self,
        slug: &str,
        namespace: Option<&str>,
        locale: &str,
    ) -> Result<Option<ObjectMetadata>> {
        let key = self.base.codec().encode(slug, namespace, locale);
        self.base.head(&key).await
    }
}
