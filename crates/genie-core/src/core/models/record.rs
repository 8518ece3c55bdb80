use super::construct::Segment;
use super::protein::ProteinRecord;
use serde::{Deserialize, Serialize};

const UNIPROT_LINK: &str = "http://identifiers.org/uniprot/";
const EC_CODE_LINK: &str = "http://identifiers.org/ec-code/";
const PLAIN_TEXT: &str = "text/plain";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: ParameterValue,
}

impl Parameter {
    fn text(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: ParameterValue::Text(value.to_string()),
        }
    }

    fn number(name: &str, value: f64) -> Self {
        Self {
            name: name.to_string(),
            value: ParameterValue::Number(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub name: String,
    pub description: String,
    pub links: Vec<String>,
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceData {
    pub content: String,
    pub mimetype: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordFeature {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub start: usize,
    pub end: usize,
}

impl From<Segment> for RecordFeature {
    fn from(segment: Segment) -> Self {
        Self {
            name: segment.name,
            role: segment.role.map(str::to_string),
            start: segment.start,
            end: segment.end,
        }
    }
}

/// Annotated result of a design, one per CDS option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DesignRecord {
    pub metadata: RecordMetadata,
    pub sequence_data: SequenceData,
    pub features: Vec<RecordFeature>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl DesignRecord {
    pub fn new(
        protein: &ProteinRecord,
        sequence: String,
        segments: Vec<Segment>,
        rate: f64,
        cai: f64,
    ) -> Self {
        let mut links = Vec::new();
        if let Some(accession) = protein.uniprot_id() {
            links.push(format!("{}{}", UNIPROT_LINK, accession));
        }
        links.extend(
            protein
                .ec_numbers
                .iter()
                .map(|ec| format!("{}{}", EC_CODE_LINK, ec)),
        );

        let mut parameters = Vec::new();
        if let Some(organism) = &protein.organism {
            parameters.push(Parameter::text("Organism", organism));
        }
        parameters.push(Parameter::text("Type", "PART"));
        parameters.push(Parameter::number("TIR", round2(rate)));
        parameters.push(Parameter::number("CAI", round2(cai)));

        let base = protein.description.as_deref().unwrap_or(&protein.name);
        let description = match &protein.organism {
            Some(organism) => format!("{} ({})", base, organism),
            None => base.to_string(),
        };

        Self {
            metadata: RecordMetadata {
                name: protein.name.clone(),
                description,
                links,
                parameters,
            },
            sequence_data: SequenceData {
                content: sequence,
                mimetype: PLAIN_TEXT.to_string(),
            },
            features: segments.into_iter().map(RecordFeature::from).collect(),
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterValue> {
        self.metadata
            .parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::feature::SO_RBS;
    use crate::core::models::protein::ProteinSequence;

    fn protein(id: &str) -> ProteinRecord {
        let mut record = ProteinRecord::new(id, ProteinSequence::parse(id, "MK").unwrap());
        record.name = "hslV".into();
        record.ec_numbers = vec!["3.4.25.2".into()];
        record
    }

    #[test]
    fn parameters_are_rounded_to_two_decimals() {
        let record = DesignRecord::new(&protein("x"), "ATG".into(), Vec::new(), 15012.3456, 0.71828);
        assert_eq!(record.parameter("TIR"), Some(&ParameterValue::Number(15012.35)));
        assert_eq!(record.parameter("CAI"), Some(&ParameterValue::Number(0.72)));
        assert_eq!(
            record.parameter("Type"),
            Some(&ParameterValue::Text("PART".into()))
        );
        assert!(record.parameter("Organism").is_none());
    }

    #[test]
    fn uniprot_and_ec_links_are_added() {
        let mut p = protein("P0A7B8");
        p.organism = Some("Escherichia coli".into());
        let record = DesignRecord::new(&p, "ATG".into(), Vec::new(), 1.0, 1.0);
        assert_eq!(
            record.metadata.links,
            vec![
                "http://identifiers.org/uniprot/P0A7B8".to_string(),
                "http://identifiers.org/ec-code/3.4.25.2".to_string(),
            ]
        );
        assert_eq!(record.metadata.description, "hslV (Escherichia coli)");
        assert_eq!(
            record.parameter("Organism"),
            Some(&ParameterValue::Text("Escherichia coli".into()))
        );
    }

    #[test]
    fn json_uses_kebab_case_and_omits_missing_roles() {
        let segments = vec![
            Segment {
                name: "Prefix".into(),
                role: None,
                start: 1,
                end: 3,
            },
            Segment {
                name: "RBS".into(),
                role: Some(SO_RBS),
                start: 4,
                end: 9,
            },
        ];
        let record = DesignRecord::new(&protein("x"), "GGGAGGAGG".into(), segments, 1.0, 1.0);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["sequence-data"]["content"], "GGGAGGAGG");
        assert!(json["features"][0].get("role").is_none());
        assert_eq!(json["features"][1]["role"], SO_RBS);
        assert_eq!(json["metadata"]["parameters"][1]["value"], 1.0);
    }
}
