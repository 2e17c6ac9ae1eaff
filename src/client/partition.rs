//! Content-type partitions of a document.

use std::borrow::Cow;
use std::fmt;

use super::document::Document;

/// Interned content-type identifier used to route partitions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentType(Cow<'static, str>);

impl ContentType {
    /// The single type produced for documents without finer partitioning.
    pub const DEFAULT: ContentType = ContentType(Cow::Borrowed("__dftl_partition_content_type"));

    pub const fn from_static(name: &'static str) -> Self {
        ContentType(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ContentType {
    fn from(name: String) -> Self {
        ContentType(Cow::Owned(name))
    }
}

impl From<&'static str> for ContentType {
    fn from(name: &'static str) -> Self {
        ContentType::from_static(name)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A classified sub-range of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedRegion {
    pub offset: usize,
    pub length: usize,
    pub content_type: ContentType,
}

impl TypedRegion {
    pub fn new(offset: usize, length: usize, content_type: ContentType) -> Self {
        Self {
            offset,
            length,
            content_type,
        }
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// Splits a character range of a document into ordered typed regions.
///
/// Implementations return regions covering `[offset, offset + length)` in
/// order. For a zero-length range they return the partition containing
/// `offset`, so that every captured edit reaches some strategy.
pub trait Partitioner: Send {
    fn compute_partitioning(&self, document: &Document, offset: usize, length: usize) -> Vec<TypedRegion>;
}

/// Treats every range as a single partition of one content type.
#[derive(Debug, Clone)]
pub struct SinglePartitioner {
    content_type: ContentType,
}

impl SinglePartitioner {
    pub fn new(content_type: ContentType) -> Self {
        Self { content_type }
    }
}

impl Default for SinglePartitioner {
    fn default() -> Self {
        Self::new(ContentType::DEFAULT)
    }
}

impl Partitioner for SinglePartitioner {
    fn compute_partitioning(&self, _document: &Document, offset: usize, length: usize) -> Vec<TypedRegion> {
        vec![TypedRegion::new(offset, length, self.content_type.clone())]
    }
}
