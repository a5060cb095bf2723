//! Key construction and stored-reference decoding.
//!
//! Key format: `a_{assignment_id}/{uploader_id}/{filename}` for graded work,
//! `p_{portfolio_item_id}/{uploader_id}/{filename}` for portfolio entries.

use std::borrow::Cow;
use std::fmt::{Display, Formatter, Result as FmtResult};

use openlearn_core::models::{ContextRef, UserId};
use url::Url;

use crate::traits::{StorageError, StorageResult};

const GRADED_WORK_SEGMENT_PREFIX: &str = "a_";
const PORTFOLIO_SEGMENT_PREFIX: &str = "p_";

/// Bucket and key of one stored object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobAddress {
    pub bucket: String,
    pub key: String,
}

impl BlobAddress {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl Display for BlobAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Key prefix shared by every file a user uploads to one context, including
/// the trailing `/`.
pub fn key_prefix(context: ContextRef, uploader_id: UserId) -> String {
    match context {
        ContextRef::GradedWork(assignment_id) => format!(
            "{}{}/{}/",
            GRADED_WORK_SEGMENT_PREFIX, assignment_id, uploader_id
        ),
        ContextRef::PortfolioEntry(portfolio_item_id) => format!(
            "{}{}/{}/",
            PORTFOLIO_SEGMENT_PREFIX, portfolio_item_id, uploader_id
        ),
    }
}

/// Build the object key for an upload. The filename is used verbatim; run
/// [`validate_filename`] first.
pub fn build_key(context: ContextRef, uploader_id: UserId, filename: &str) -> String {
    format!("{}{}", key_prefix(context, uploader_id), filename)
}

/// Reject filenames that would break the key hierarchy.
pub fn validate_filename(filename: &str) -> StorageResult<()> {
    if filename.is_empty() || filename == "." || filename == ".." {
        return Err(StorageError::InvalidFilename(format!(
            "'{}' is not a valid filename",
            filename
        )));
    }

    if filename
        .chars()
        .any(|c| c == '/' || c == '\\' || c.is_control())
    {
        return Err(StorageError::InvalidFilename(
            "Filename must not contain path separators or control characters".to_string(),
        ));
    }

    Ok(())
}

/// Canonical stored reference for an address: `https://{host}/{bucket}/{key}`
/// with every path segment percent-encoded.
pub fn canonical_reference(host: &str, address: &BlobAddress) -> String {
    let key = address
        .key
        .split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/");

    format!(
        "https://{}/{}/{}",
        host.trim_end_matches('/'),
        urlencoding::encode(&address.bucket),
        key
    )
}

/// Recover bucket and key from a stored reference.
///
/// An `http(s)` URL yields the first path segment as bucket and the rest as
/// key. A URL naming a bucket but no key keeps that bucket with an empty
/// key, which every backend rejects. Anything else is read as a bare
/// `bucket/key` path whose leading segment is replaced by `default_bucket`.
/// This never fails.
///
/// Both segments are percent-decoded. A legacy reference stored unencoded
/// with a literal `%XX` in its filename therefore decodes to a different key
/// and reads as a missing object.
pub fn resolve(reference: &str, default_bucket: &str) -> BlobAddress {
    if let Some(address) = parse_url_reference(reference) {
        return address;
    }

    tracing::info!(
        reference = %reference,
        bucket = %default_bucket,
        "Stored reference is not a well-formed URL, falling back to default bucket"
    );
    fallback_address(reference, default_bucket)
}

fn parse_url_reference(reference: &str) -> Option<BlobAddress> {
    let url = Url::parse(reference).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }

    let path = url.path().strip_prefix('/').unwrap_or(url.path());
    let (bucket, key) = path.split_once('/')?;
    if bucket.is_empty() {
        return None;
    }

    Some(BlobAddress {
        bucket: percent_decode(bucket)?,
        key: percent_decode(key)?,
    })
}

fn percent_decode(value: &str) -> Option<String> {
    urlencoding::decode(value).ok().map(Cow::into_owned)
}

fn fallback_address(reference: &str, default_bucket: &str) -> BlobAddress {
    let trimmed = reference.trim();
    let path = trimmed
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(trimmed)
        .trim_start_matches('/');

    let key = match path.split_once('/') {
        Some((_, key)) => key,
        None => path,
    };

    BlobAddress::new(default_bucket, key)
}
