use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Canonical identifier of one unit of work (a product ID).
pub type ItemId = String;

/// One named transformation step of the pipeline.
///
/// The declaration order is the order stages appear in an item's chain and
/// is used wherever stages need a stable ordering (reports, maps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Acquire,
    Unpack,
    Correct,
    MaskClouds,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Acquire,
        Stage::Unpack,
        Stage::Correct,
        Stage::MaskClouds,
    ];

    /// Display name used in logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Acquire => "Acquire",
            Stage::Unpack => "Unpack",
            Stage::Correct => "Correct",
            Stage::MaskClouds => "MaskClouds",
        }
    }

    /// Key used for this stage in `[stage.<key>]` config sections.
    pub fn config_key(&self) -> &'static str {
        match self {
            Stage::Acquire => "acquire",
            Stage::Unpack => "unpack",
            Stage::Correct => "correct",
            Stage::MaskClouds => "mask_clouds",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "acquire" => Ok(Stage::Acquire),
            "unpack" => Ok(Stage::Unpack),
            "correct" => Ok(Stage::Correct),
            "mask_clouds" | "maskclouds" => Ok(Stage::MaskClouds),
            other => Err(format!(
                "invalid stage: {other} (expected \"acquire\", \"unpack\", \"correct\" or \"mask_clouds\")"
            )),
        }
    }
}

/// Value flowing along one edge of an item's chain.
///
/// The root stage receives the product identifier itself; every other stage
/// receives the path produced by its upstream stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageValue {
    Product(ItemId),
    Path(PathBuf),
}

impl StageValue {
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            StageValue::Path(p) => Some(p.as_path()),
            StageValue::Product(_) => None,
        }
    }
}

impl fmt::Display for StageValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageValue::Product(id) => write!(f, "product {id}"),
            StageValue::Path(p) => write!(f, "{}", p.display()),
        }
    }
}
