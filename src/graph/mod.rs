//! Capture Graph
//!
//! Entity records and the builder that derives them from grouped CSV rows.

pub mod builder;
pub mod model;

pub use builder::GraphBuilder;
pub use model::{
    CaptureGraph, Node, NodeRef, Property, PropertyMetadata, PropertyValue, Reading, Relationship,
    RelationshipType,
};
