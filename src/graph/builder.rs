//! Graph Builder
//!
//! Turns grouped CSV rows into capture nodes and relationships:
//!
//! ```text
//! Well -HAS_EMISSIONS-> Emissions -HAS_TYPE-> EmissionType (x4)
//!                                                -HAS_DATA-> newest reading
//!                                                   -NEXT_DATE-> older reading -> ...
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::warn;

use super::model::{
    CaptureGraph, CustomMetadata, EmissionTypeNode, Emissions, Measurement, PropertyMetadata,
    Reading, Relationship, RelationshipType, Well, ASSURANCE_LEVEL,
};
use crate::ingest::{EmissionType, RawRow, WellRows};

/// Builds the capture graph for one input file.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    source: String,
    verified_time: String,
}

impl GraphBuilder {
    /// `source` is stamped on unit metadata; `verified_time` is an ISO-8601
    /// timestamp shared by every metadata block of the run.
    pub fn new(source: impl Into<String>, verified_time: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            verified_time: verified_time.into(),
        }
    }

    /// Builder for `path`, using its file name as source and the current
    /// UTC time as verification time.
    pub fn for_file(path: &Path) -> Self {
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let verified_time = chrono::Utc::now()
            .format("%Y-%m-%dT%H:%M:%S%.6fZ")
            .to_string();
        Self::new(source, verified_time)
    }

    pub fn build(&self, wells: &[WellRows]) -> CaptureGraph {
        let mut well_records: Vec<Well> = Vec::with_capacity(wells.len());
        let mut emissions: Vec<Emissions> = Vec::with_capacity(wells.len());
        let mut type_nodes: Vec<EmissionTypeNode> = Vec::with_capacity(wells.len() * 4);
        let mut readings: Vec<Reading> = Vec::new();
        let mut seen: HashSet<(String, EmissionType, String)> = HashSet::new();

        for well in wells {
            well_records.push(Well {
                key: well.well_key.clone(),
                name: well.name().to_string(),
            });
            emissions.push(Emissions::for_well(&well.well_key));

            for emission_type in EmissionType::ALL {
                type_nodes.push(EmissionTypeNode::for_well(&well.well_key, emission_type));

                for row in &well.rows {
                    let Some(reading) = self.reading_from_row(&well.well_key, emission_type, row)
                    else {
                        continue;
                    };
                    let key = (
                        reading.well_key.clone(),
                        reading.emission_type,
                        reading.date.clone(),
                    );
                    if !seen.insert(key) {
                        warn!(
                            well = %reading.well_key,
                            emission_type = %emission_type,
                            date = %reading.date,
                            "Duplicate reading for date, keeping first"
                        );
                        continue;
                    }
                    readings.push(reading);
                }
            }
        }

        // Most recent first within each (well, type) group.
        readings.sort_by(|a, b| {
            (b.well_key.as_str(), b.emission_type.as_str(), b.date.as_str()).cmp(&(
                a.well_key.as_str(),
                a.emission_type.as_str(),
                a.date.as_str(),
            ))
        });

        let mut graph = CaptureGraph::default();
        graph.nodes.extend(well_records.iter().map(Well::to_node));
        graph.nodes.extend(emissions.iter().map(Emissions::to_node));
        graph.nodes.extend(type_nodes.iter().map(EmissionTypeNode::to_node));
        graph.nodes.extend(readings.iter().map(Reading::to_node));

        for (well, container) in well_records.iter().zip(&emissions) {
            graph.relationships.push(Relationship {
                source: well.node_ref(),
                target: container.node_ref(),
                rel_type: RelationshipType::HasEmissions,
            });
        }

        let containers: HashMap<&str, &Emissions> =
            emissions.iter().map(|e| (e.well_key.as_str(), e)).collect();
        let mut type_lookup: HashMap<(&str, EmissionType), &EmissionTypeNode> = HashMap::new();
        for node in &type_nodes {
            if let Some(container) = containers.get(node.well_key.as_str()) {
                graph.relationships.push(Relationship {
                    source: container.node_ref(),
                    target: node.node_ref(),
                    rel_type: RelationshipType::HasType,
                });
            }
            type_lookup.insert((node.well_key.as_str(), node.emission_type), node);
        }

        let mut chain_tail: HashMap<(&str, EmissionType), &Reading> = HashMap::new();
        for reading in &readings {
            let key = (reading.well_key.as_str(), reading.emission_type);
            match chain_tail.insert(key, reading) {
                Some(previous) => graph.relationships.push(Relationship {
                    source: previous.node_ref(),
                    target: reading.node_ref(),
                    rel_type: RelationshipType::NextDate,
                }),
                None => {
                    if let Some(type_node) = type_lookup.get(&key) {
                        graph.relationships.push(Relationship {
                            source: type_node.node_ref(),
                            target: reading.node_ref(),
                            rel_type: RelationshipType::HasData,
                        });
                    }
                }
            }
        }

        graph
    }

    /// Extract one reading; `None` when neither volume nor mass parses.
    fn reading_from_row(
        &self,
        well_key: &str,
        emission_type: EmissionType,
        row: &RawRow,
    ) -> Option<Reading> {
        let cols = emission_type.columns();
        let volume = self.measurement(row, "volume", cols.volume, cols.volume_unit);
        let mass = self.measurement(row, "mass", cols.mass, cols.mass_unit);
        if volume.is_none() && mass.is_none() {
            return None;
        }

        Some(Reading::new(well_key, emission_type, row.date(), volume, mass))
    }

    fn measurement(
        &self,
        row: &RawRow,
        field: &str,
        value_col: usize,
        unit_col: usize,
    ) -> Option<Measurement> {
        let raw = row.cell(value_col)?;
        let value = match parse_number(raw) {
            Some(v) => v,
            None => {
                warn!(
                    well = %row.well_key,
                    "Could not convert {} '{}' to number, skipping",
                    field,
                    raw
                );
                return None;
            }
        };

        let metadata = row.cell(unit_col).map(|units| PropertyMetadata {
            custom_metadata: CustomMetadata {
                units: units.to_string(),
            },
            source: self.source.clone(),
            assurance_level: ASSURANCE_LEVEL,
            verified_time: self.verified_time.clone(),
        });

        Some(Measurement { value, metadata })
    }
}

/// Finite float parse; NaN and infinities have no JSON representation.
fn parse_number(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}
