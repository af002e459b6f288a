//! Edit traces
//!
//! A trace is a sequence of commits, each carrying its author and the edit
//! operations the commit applied. Traces are plain JSON so harness fixtures
//! can be generated from a repository's history or written by hand.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditOp {
    Insert,
    Delete,
}

/// One edit within a commit. `content` is only present for inserts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Edit {
    pub op: EditOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub index: usize,
}

impl Edit {
    pub fn insert(content: impl Into<String>, index: usize) -> Self {
        Self {
            op: EditOp::Insert,
            content: Some(content.into()),
            index,
        }
    }

    pub fn delete(index: usize) -> Self {
        Self {
            op: EditOp::Delete,
            content: None,
            index,
        }
    }
}

/// One commit's worth of edits, attributed to an author.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TraceCommit {
    pub hash: String,
    pub author: String,
    pub edits: Vec<Edit>,
}

/// A full edit trace in commit order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EditTrace {
    pub commits: Vec<TraceCommit>,
}

impl EditTrace {
    pub fn new(commits: Vec<TraceCommit>) -> Self {
        Self { commits }
    }

    /// Distinct authors in order of first appearance; the driver assigns
    /// peer ids in this order.
    pub fn authors(&self) -> Vec<&str> {
        let mut authors: Vec<&str> = Vec::new();
        for commit in &self.commits {
            if !authors.contains(&commit.author.as_str()) {
                authors.push(&commit.author);
            }
        }
        authors
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, TraceError> {
        serde_json::from_reader(reader).map_err(|e| TraceError::Parse(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, TraceError> {
        let file = File::open(path).map_err(|e| TraceError::Io(e.to_string()))?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn save(&self, path: &Path) -> Result<(), TraceError> {
        let file = File::create(path).map_err(|e| TraceError::Io(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| TraceError::Parse(e.to_string()))?;
        writer.flush().map_err(|e| TraceError::Io(e.to_string()))
    }
}
