//! Output directory layout and naming conventions
//!
//! For an input collection of annual grids the pipeline derives sibling
//! output directories suffixed `_binary`, `_reclass`, `_intermediate-tifs`,
//! `_intermediate-shapefiles`, `_final-tifs` and `_final-shapefiles`. Every
//! artifact key is `{prefix}{years_covered}_{stage-tag}{running_date}` under
//! one of those directories; `years_covered` and `running_date` are
//! caller-supplied free-text tags for traceability.

use crate::config::NamingTags;

/// The six derived output directories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageDir {
    Binary,
    Reclass,
    IntermediateTifs,
    IntermediateShapefiles,
    FinalTifs,
    FinalShapefiles,
}

impl StageDir {
    /// Directory suffix appended to the collection name
    pub fn suffix(&self) -> &'static str {
        match self {
            StageDir::Binary => "_binary",
            StageDir::Reclass => "_reclass",
            StageDir::IntermediateTifs => "_intermediate-tifs",
            StageDir::IntermediateShapefiles => "_intermediate-shapefiles",
            StageDir::FinalTifs => "_final-tifs",
            StageDir::FinalShapefiles => "_final-shapefiles",
        }
    }
}

/// Key builder for all persisted pipeline artifacts
#[derive(Debug, Clone)]
pub struct OutputNaming {
    collection: String,
    tags: NamingTags,
}

impl OutputNaming {
    pub fn new(collection: impl Into<String>, tags: NamingTags) -> Self {
        Self {
            collection: collection.into(),
            tags,
        }
    }

    /// Store key for an artifact: directory plus conventional file stem
    pub fn key(&self, dir: StageDir, stage_tag: &str) -> String {
        format!(
            "{}{}/{}{}_{}{}",
            self.collection,
            dir.suffix(),
            self.tags.prefix,
            self.tags.years_covered,
            stage_tag,
            self.tags.running_date,
        )
    }
}
