use super::protein::ProteinRecord;
use serde::Serialize;

/// Sequence Ontology roles attached to result sub-features.
pub const SO_RBS: &str = "http://identifiers.org/so/SO:0000139";
pub const SO_CDS: &str = "http://identifiers.org/so/SO:0000316";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InsulatorSide {
    Upstream,
    Downstream,
}

/// One alternative coding sequence at the CDS position.
#[derive(Debug, Clone, PartialEq)]
pub struct CdsOption {
    pub protein: ProteinRecord,
    /// Codons for every residue before the terminal stop.
    pub sequence: String,
}

/// A contiguous segment of a construct.
#[derive(Debug, Clone, PartialEq)]
pub enum Feature {
    Flanking {
        sequence: String,
        fixed: bool,
    },
    Insulator {
        sequence: String,
        fixed: bool,
        side: InsulatorSide,
    },
    Rbs {
        sequence: String,
        fixed: bool,
        target_rate: f64,
        target_dg: f64,
    },
    Cds {
        options: Vec<CdsOption>,
        fixed: bool,
    },
    Stop {
        sequence: String,
    },
    Suffix {
        sequence: String,
        fixed: bool,
    },
}

impl Feature {
    pub fn is_fixed(&self) -> bool {
        match self {
            Feature::Flanking { fixed, .. }
            | Feature::Insulator { fixed, .. }
            | Feature::Rbs { fixed, .. }
            | Feature::Cds { fixed, .. }
            | Feature::Suffix { fixed, .. } => *fixed,
            Feature::Stop { .. } => true,
        }
    }

    /// Sequence of the feature as it appears in the construct expressing CDS
    /// option `option`.
    pub fn sequence_for(&self, option: usize) -> &str {
        match self {
            Feature::Flanking { sequence, .. }
            | Feature::Insulator { sequence, .. }
            | Feature::Rbs { sequence, .. }
            | Feature::Stop { sequence }
            | Feature::Suffix { sequence, .. } => sequence,
            Feature::Cds { options, .. } => options
                .get(option)
                .map_or("", |o| o.sequence.as_str()),
        }
    }

    /// Mutable access to a single-sequence feature; `None` for the CDS.
    pub fn sequence_mut(&mut self) -> Option<&mut String> {
        match self {
            Feature::Flanking { sequence, .. }
            | Feature::Insulator { sequence, .. }
            | Feature::Rbs { sequence, .. }
            | Feature::Stop { sequence }
            | Feature::Suffix { sequence, .. } => Some(sequence),
            Feature::Cds { .. } => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Feature::Flanking { .. } => "Prefix",
            Feature::Insulator {
                side: InsulatorSide::Upstream,
                ..
            } => "5' Insulator",
            Feature::Insulator {
                side: InsulatorSide::Downstream,
                ..
            } => "3' Insulator",
            Feature::Rbs { .. } => "RBS",
            Feature::Cds { .. } => "CDS",
            Feature::Stop { .. } => "Stop",
            Feature::Suffix { .. } => "Suffix",
        }
    }

    pub fn role(&self) -> Option<&'static str> {
        match self {
            Feature::Rbs { .. } => Some(SO_RBS),
            Feature::Cds { .. } => Some(SO_CDS),
            _ => None,
        }
    }
}
