use super::feature::{CdsOption, Feature, InsulatorSide, SO_CDS};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConstructError {
    #[error("Construct has no {0} feature")]
    MissingFeature(&'static str),
    #[error("Construct has more than one {0} feature")]
    DuplicateFeature(&'static str),
    #[error("The RBS must be immediately followed by the CDS")]
    RbsNotFollowedByCds,
    #[error("The CDS feature has no coding options")]
    NoCdsOptions,
}

fn find_unique(
    features: &[Feature],
    name: &'static str,
    pred: fn(&Feature) -> bool,
) -> Result<usize, ConstructError> {
    let mut found = features.iter().enumerate().filter(|(_, f)| pred(f));
    let (index, _) = found.next().ok_or(ConstructError::MissingFeature(name))?;
    if found.next().is_some() {
        return Err(ConstructError::DuplicateFeature(name));
    }
    Ok(index)
}

/// A named stretch of an assembled construct, 1-based and inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub name: String,
    pub role: Option<&'static str>,
    pub start: usize,
    pub end: usize,
}

/// Ordered features of a DNA construct.
///
/// Holds exactly one RBS directly followed by exactly one CDS; the CDS carries
/// one or more alternative coding options that share every other feature.
#[derive(Debug, Clone, PartialEq)]
pub struct Construct {
    features: Vec<Feature>,
    rbs: usize,
    cds: usize,
}

impl Construct {
    pub fn new(features: Vec<Feature>) -> Result<Self, ConstructError> {
        let rbs = find_unique(&features, "RBS", |f| matches!(f, Feature::Rbs { .. }))?;
        let cds = find_unique(&features, "CDS", |f| matches!(f, Feature::Cds { .. }))?;
        if cds != rbs + 1 {
            return Err(ConstructError::RbsNotFollowedByCds);
        }
        if let Feature::Cds { options, .. } = &features[cds] {
            if options.is_empty() {
                return Err(ConstructError::NoCdsOptions);
            }
        }
        Ok(Self { features, rbs, cds })
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn rbs_index(&self) -> usize {
        self.rbs
    }

    pub fn cds_index(&self) -> usize {
        self.cds
    }

    /// The 5' insulator, when it sits directly before the RBS.
    pub fn upstream_insulator_index(&self) -> Option<usize> {
        let index = self.rbs.checked_sub(1)?;
        match &self.features[index] {
            Feature::Insulator {
                side: InsulatorSide::Upstream,
                ..
            } => Some(index),
            _ => None,
        }
    }

    pub fn feature_mut(&mut self, index: usize) -> Option<&mut Feature> {
        self.features.get_mut(index)
    }

    pub fn rbs_sequence(&self) -> &str {
        self.features[self.rbs].sequence_for(0)
    }

    pub fn cds_options(&self) -> &[CdsOption] {
        match &self.features[self.cds] {
            Feature::Cds { options, .. } => options,
            _ => &[],
        }
    }

    pub fn cds_options_mut(&mut self) -> &mut [CdsOption] {
        match &mut self.features[self.cds] {
            Feature::Cds { options, .. } => options,
            _ => &mut [],
        }
    }

    pub fn num_options(&self) -> usize {
        self.cds_options().len()
    }

    fn concat<'a>(&'a self, option: usize, features: impl Iterator<Item = &'a Feature>) -> String {
        features.map(|f| f.sequence_for(option)).collect()
    }

    /// Full sequence of the construct expressing `option`.
    pub fn sequence(&self, option: usize) -> String {
        self.concat(option, self.features.iter())
    }

    /// Everything except the prefix and suffix: the part of the construct the
    /// design is accountable for.
    pub fn mutable_region(&self, option: usize) -> String {
        self.concat(
            option,
            self.features
                .iter()
                .filter(|f| !matches!(f, Feature::Flanking { .. } | Feature::Suffix { .. })),
        )
    }

    /// The 5' insulator, RBS and CDS of `option`, with the offset of the
    /// intended start codon.
    pub fn scored_region(&self, option: usize) -> (String, usize) {
        let first = self.upstream_insulator_index().unwrap_or(self.rbs);
        let upstream = self.concat(option, self.features[first..self.cds].iter());
        let offset = upstream.len();
        (
            upstream + self.features[self.cds].sequence_for(option),
            offset,
        )
    }

    /// Annotated non-empty segments of the construct expressing `option`,
    /// as 1-based inclusive coordinates. The stop codon is reported as part of
    /// the CDS.
    pub fn segments(&self, option: usize) -> Vec<Segment> {
        let mut segments: Vec<Segment> = Vec::new();
        let mut position = 1;
        for (index, feature) in self.features.iter().enumerate() {
            let len = feature.sequence_for(option).len();
            if len == 0 {
                continue;
            }
            let end = position + len - 1;
            let joins_cds = matches!(feature, Feature::Stop { .. }) && index == self.cds + 1;
            match segments.last_mut() {
                Some(last) if joins_cds && last.role == Some(SO_CDS) => {
                    last.end = end;
                }
                _ => {
                    let name = match (index == self.cds, self.cds_options().get(option)) {
                        (true, Some(o)) => format!("{} (CDS)", o.protein.name),
                        _ => feature.display_name().to_string(),
                    };
                    segments.push(Segment {
                        name,
                        role: feature.role(),
                        start: position,
                        end,
                    });
                }
            }
            position = end + 1;
        }
        segments
    }
}
