//! Capture graph records
//!
//! Typed entity records (wells, emissions containers, emission types,
//! readings) and the wire shapes the capture API accepts for nodes and
//! relationships.

use serde::{Deserialize, Serialize};

use crate::identity;
use crate::ingest::EmissionType;

/// Assurance level stamped on every unit-of-measure metadata block.
pub const ASSURANCE_LEVEL: u8 = 3;

/// Secondary label carried by every reading node.
pub const READING_LABEL: &str = "Emission";

// ============================================================================
// WIRE SHAPES
// ============================================================================

/// Property value as sent to the capture API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Number(f64),
    Text(String),
}

impl PropertyValue {
    fn is_empty(&self) -> bool {
        matches!(self, Self::Text(s) if s.is_empty())
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomMetadata {
    pub units: String,
}

/// Provenance and unit metadata attached to a measured property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyMetadata {
    pub custom_metadata: CustomMetadata,
    pub source: String,
    pub assurance_level: u8,
    pub verified_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    #[serde(rename = "type")]
    pub name: String,
    pub value: PropertyValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PropertyMetadata>,
}

/// Build a property list from ordered `(name, value, metadata)` fields,
/// skipping absent and empty values.
pub fn property_list<'a, I>(fields: I) -> Vec<Property>
where
    I: IntoIterator<Item = (&'a str, Option<PropertyValue>, Option<PropertyMetadata>)>,
{
    fields
        .into_iter()
        .filter_map(|(name, value, metadata)| {
            let value = value.filter(|v| !v.is_empty())?;
            Some(Property {
                name: name.to_string(),
                value,
                metadata,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub external_id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    pub properties: Vec<Property>,
}

/// Endpoint of a relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
    #[serde(rename = "type")]
    pub node_type: String,
    pub external_id: String,
}

impl NodeRef {
    pub fn new(node_type: impl Into<String>, external_id: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            external_id: external_id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    /// Well -> Emissions
    HasEmissions,
    /// Emissions -> EmissionType
    HasType,
    /// EmissionType -> most recent reading
    HasData,
    /// Reading -> next older reading
    NextDate,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HasEmissions => "HAS_EMISSIONS",
            Self::HasType => "HAS_TYPE",
            Self::HasData => "HAS_DATA",
            Self::NextDate => "NEXT_DATE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub source: NodeRef,
    pub target: NodeRef,
    #[serde(rename = "type")]
    pub rel_type: RelationshipType,
}

// ============================================================================
// ENTITY RECORDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Well {
    pub key: String,
    pub name: String,
}

impl Well {
    pub const NODE_TYPE: &'static str = "Well";

    /// Wells are addressed by their business key directly.
    pub fn node_ref(&self) -> NodeRef {
        NodeRef::new(Self::NODE_TYPE, self.key.as_str())
    }

    pub fn to_node(&self) -> Node {
        Node {
            external_id: self.key.clone(),
            node_type: Self::NODE_TYPE.to_string(),
            labels: Vec::new(),
            properties: property_list([("name", Some(self.name.as_str().into()), None)]),
        }
    }
}

/// Singleton emissions container under a well.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emissions {
    pub well_key: String,
    pub external_id: String,
}

impl Emissions {
    pub const NODE_TYPE: &'static str = "Emissions";

    pub fn for_well(well_key: &str) -> Self {
        Self {
            well_key: well_key.to_string(),
            external_id: identity::emissions_id(well_key),
        }
    }

    pub fn node_ref(&self) -> NodeRef {
        NodeRef::new(Self::NODE_TYPE, self.external_id.as_str())
    }

    pub fn to_node(&self) -> Node {
        Node {
            external_id: self.external_id.clone(),
            node_type: Self::NODE_TYPE.to_string(),
            labels: Vec::new(),
            properties: property_list([("name", Some("Emissions".into()), None)]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmissionTypeNode {
    pub well_key: String,
    pub emission_type: EmissionType,
    pub external_id: String,
}

impl EmissionTypeNode {
    pub const NODE_TYPE: &'static str = "EmissionType";

    pub fn for_well(well_key: &str, emission_type: EmissionType) -> Self {
        Self {
            well_key: well_key.to_string(),
            emission_type,
            external_id: identity::emission_type_id(well_key, emission_type.as_str()),
        }
    }

    pub fn node_ref(&self) -> NodeRef {
        NodeRef::new(Self::NODE_TYPE, self.external_id.as_str())
    }

    pub fn to_node(&self) -> Node {
        Node {
            external_id: self.external_id.clone(),
            node_type: Self::NODE_TYPE.to_string(),
            labels: Vec::new(),
            properties: property_list([(
                "name",
                Some(self.emission_type.as_str().into()),
                None,
            )]),
        }
    }
}

/// A measured quantity with optional unit metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub value: f64,
    pub metadata: Option<PropertyMetadata>,
}

/// One date-stamped observation for a well and emission type.
/// At least one of `volume` and `mass` is present.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub well_key: String,
    pub emission_type: EmissionType,
    pub date: String,
    pub volume: Option<Measurement>,
    pub mass: Option<Measurement>,
    pub external_id: String,
}

impl Reading {
    pub fn new(
        well_key: &str,
        emission_type: EmissionType,
        date: String,
        volume: Option<Measurement>,
        mass: Option<Measurement>,
    ) -> Self {
        let external_id = identity::derive_external_id(well_key, emission_type.as_str(), &date);
        Self {
            well_key: well_key.to_string(),
            emission_type,
            date,
            volume,
            mass,
            external_id,
        }
    }

    pub fn node_ref(&self) -> NodeRef {
        NodeRef::new(self.emission_type.as_str(), self.external_id.as_str())
    }

    pub fn to_node(&self) -> Node {
        let measured = |m: &Option<Measurement>| match m {
            Some(m) => (Some(PropertyValue::Number(m.value)), m.metadata.clone()),
            None => (None, None),
        };
        let (volume, volume_meta) = measured(&self.volume);
        let (mass, mass_meta) = measured(&self.mass);

        Node {
            external_id: self.external_id.clone(),
            node_type: self.emission_type.as_str().to_string(),
            labels: vec![READING_LABEL.to_string()],
            properties: property_list([
                ("date", Some(self.date.as_str().into()), None),
                ("volume", volume, volume_meta),
                ("mass", mass, mass_meta),
            ]),
        }
    }
}

/// Nodes and relationships ready for dispatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureGraph {
    pub nodes: Vec<Node>,
    pub relationships: Vec<Relationship>,
}

impl CaptureGraph {
    /// Node counts per type, in first-seen order.
    pub fn node_breakdown(&self) -> Vec<(String, usize)> {
        breakdown(self.nodes.iter().map(|n| n.node_type.as_str()))
    }

    /// Relationship counts per type, in first-seen order.
    pub fn relationship_breakdown(&self) -> Vec<(String, usize)> {
        breakdown(self.relationships.iter().map(|r| r.rel_type.as_str()))
    }
}

fn breakdown<'a>(types: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for t in types {
        match counts.iter_mut().find(|(name, _)| name == t) {
            Some((_, n)) => *n += 1,
            None => counts.push((t.to_string(), 1)),
        }
    }
    counts
}
