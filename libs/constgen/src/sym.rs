//! Symmetry constraint artifacts.
//!
//! A `.sym` artifact is plain text with one record per line. A line with two
//! or more whitespace-separated tokens pairs its first token with its second;
//! any further tokens are ignored. Lines with fewer tokens carry no constraint.

use std::fmt::Display;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use arcstr::ArcStr;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The file extension of symmetry artifacts.
pub const SYM_EXTENSION: &str = "sym";

/// Returns the artifact path of the circuit named `name` in `out_dir`.
pub fn sym_path(out_dir: impl AsRef<Path>, name: &str) -> PathBuf {
    out_dir.as_ref().join(format!("{name}.{SYM_EXTENSION}"))
}

/// One record of a symmetry artifact.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SymRecord {
    /// The instance name.
    pub inst: ArcStr,
    /// The name of the mirror-symmetric counterpart.
    ///
    /// [`None`] for self-symmetric instances.
    pub mirror: Option<ArcStr>,
}

impl SymRecord {
    /// A record pairing `inst` with its mirror image `mirror`.
    pub fn pair(inst: impl Into<ArcStr>, mirror: impl Into<ArcStr>) -> Self {
        Self {
            inst: inst.into(),
            mirror: Some(mirror.into()),
        }
    }

    /// A record for an instance symmetric with itself.
    pub fn single(inst: impl Into<ArcStr>) -> Self {
        Self {
            inst: inst.into(),
            mirror: None,
        }
    }
}

impl Display for SymRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.mirror {
            Some(mirror) => write!(f, "{} {}", self.inst, mirror),
            None => write!(f, "{}", self.inst),
        }
    }
}

/// Writes `records` as a symmetry artifact at `path`, creating parent directories.
pub fn write_sym_file(path: impl AsRef<Path>, records: &[SymRecord]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(path)?;
    for record in records {
        writeln!(file, "{record}")?;
    }
    Ok(())
}

/// A map from instance name to the name of its mirror-symmetric counterpart.
///
/// Scoped to a single circuit.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SymmetryMap {
    pairs: IndexMap<ArcStr, ArcStr>,
}

impl SymmetryMap {
    /// Creates a new, empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes the contents of a symmetry artifact.
    ///
    /// # Examples
    ///
    /// ```
    /// use constgen::sym::SymmetryMap;
    ///
    /// let map = SymmetryMap::decode("M2 M1\nM3\n\nM5 M4 extra\n");
    /// assert_eq!(map.len(), 2);
    /// assert_eq!(map.get("M2").map(|s| s.as_str()), Some("M1"));
    /// assert!(map.is_mirrored("M4"));
    /// assert!(!map.is_mirrored("M3"));
    /// ```
    pub fn decode(text: &str) -> Self {
        let mut map = Self::new();
        for line in text.lines() {
            let mut tokens = line.split_whitespace();
            if let (Some(inst), Some(mirror)) = (tokens.next(), tokens.next()) {
                map.insert(inst, mirror);
            }
        }
        map
    }

    /// Reads and decodes the symmetry artifact at `path`.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::decode(&fs::read_to_string(path)?))
    }

    /// Pairs `inst` with `mirror`, replacing any previous partner of `inst`.
    pub fn insert(&mut self, inst: impl Into<ArcStr>, mirror: impl Into<ArcStr>) {
        self.pairs.insert(inst.into(), mirror.into());
    }

    /// The counterpart of `inst`, if `inst` is a key of the map.
    pub fn get(&self, inst: &str) -> Option<&ArcStr> {
        self.pairs.get(inst)
    }

    /// Returns `true` if `inst` is the mirror image of some instance,
    /// i.e. appears as a value of the map.
    pub fn is_mirrored(&self, inst: &str) -> bool {
        self.pairs.values().any(|v| v.as_str() == inst)
    }

    /// The number of pairs.
    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns `true` if the map has no pairs.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Iterates over the pairs in artifact order.
    pub fn iter(&self) -> impl Iterator<Item = (&ArcStr, &ArcStr)> {
        self.pairs.iter()
    }
}
