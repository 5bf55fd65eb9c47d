//! Segment file naming
//!
//! All three files of a segment share one base name:
//! ```text
//! <table>-tmp-<generation>-Data.db     (under construction)
//! <table>-<generation>-Data.db         (permanent)
//! ```
//! The index and filter names are derived from the data name by swapping
//! the component suffix, so renaming must leave the data file for last.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Result, RingError};

use super::TEMPFILE_MARKER;

/// One of the three files making up a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Data,
    Index,
    Filter,
}

impl Component {
    fn suffix(self) -> &'static str {
        match self {
            Component::Data => "Data.db",
            Component::Index => "Index.db",
            Component::Filter => "Filter.db",
        }
    }

    fn from_suffix(s: &str) -> Option<Self> {
        match s {
            "Data.db" => Some(Component::Data),
            "Index.db" => Some(Component::Index),
            "Filter.db" => Some(Component::Filter),
            _ => None,
        }
    }
}

/// Identity of a segment: directory, table, generation and whether the
/// files still carry the temporary marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    dir: PathBuf,
    table: String,
    generation: u64,
    temporary: bool,
}

impl Descriptor {
    /// Descriptor for a new, temporary segment
    pub fn new(dir: impl Into<PathBuf>, table: impl Into<String>, generation: u64) -> Result<Self> {
        let table = table.into();
        if table.is_empty() || table.contains('-') {
            return Err(RingError::Config(format!(
                "table name must be non-empty and free of '-': {:?}",
                table
            )));
        }
        Ok(Self {
            dir: dir.into(),
            table,
            generation,
            temporary: true,
        })
    }

    /// Parse any component path of a segment
    pub fn from_path(path: &Path) -> Result<(Self, Component)> {
        let invalid = || RingError::Config(format!("not a segment file name: {}", path.display()));

        let name = path.file_name().and_then(|n| n.to_str()).ok_or_else(invalid)?;
        let parts: Vec<&str> = name.split('-').collect();
        let (table, temporary, generation, suffix) = match parts.as_slice() {
            [table, marker, generation, suffix] if *marker == TEMPFILE_MARKER => {
                (*table, true, *generation, *suffix)
            }
            [table, generation, suffix] => (*table, false, *generation, *suffix),
            _ => return Err(invalid()),
        };
        let generation = generation.parse().map_err(|_| invalid())?;
        let component = Component::from_suffix(suffix).ok_or_else(invalid)?;
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        Ok((
            Self {
                dir,
                table: table.to_string(),
                generation,
                temporary,
            },
            component,
        ))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    /// Same segment without the temporary marker
    pub fn as_permanent(&self) -> Self {
        Self {
            temporary: false,
            ..self.clone()
        }
    }

    pub fn path_for(&self, component: Component) -> PathBuf {
        let name = if self.temporary {
            format!(
                "{}-{}-{}-{}",
                self.table,
                TEMPFILE_MARKER,
                self.generation,
                component.suffix()
            )
        } else {
            format!("{}-{}-{}", self.table, self.generation, component.suffix())
        };
        self.dir.join(name)
    }

    pub fn data_path(&self) -> PathBuf {
        self.path_for(Component::Data)
    }

    pub fn index_path(&self) -> PathBuf {
        self.path_for(Component::Index)
    }

    pub fn filter_path(&self) -> PathBuf {
        self.path_for(Component::Filter)
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.data_path().display())
    }
}

/// File name with the temporary marker removed; unchanged if absent
pub(crate) fn strip_marker(path: &Path) -> PathBuf {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return path.to_path_buf();
    };
    let stripped = name.replacen(&format!("-{}", TEMPFILE_MARKER), "", 1);
    path.with_file_name(stripped)
}
