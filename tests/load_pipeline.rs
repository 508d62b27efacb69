//! Integration tests for the CSV -> graph -> dispatch pipeline
//!
//! Each test writes a small spreadsheet fixture into a temp dir and runs the
//! loader against an in-process sink that records (or rejects) payloads.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Mutex;

use serde_json::{json, Value};
use tempfile::TempDir;

use emissions_loader::capture::{BatchDispatcher, CaptureError, CaptureKind, CaptureSink};
use emissions_loader::graph::RelationshipType;
use emissions_loader::identity::derive_external_id;
use emissions_loader::loader;

const HEADER: &str =
    "name,key,year,month,day,fv,fvu,fm,fmu,cv,cvu,cm,cmu,dv,dvu,dm,dmu,gv,gvu,gm,gmu";

/// One 21-column data row with the given cells filled in.
fn data_row(name: &str, key: &str, ymd: (&str, &str, &str), cells: &[(usize, &str)]) -> String {
    let mut cols = vec![String::new(); 21];
    cols[0] = name.to_string();
    cols[1] = key.to_string();
    cols[2] = ymd.0.to_string();
    cols[3] = ymd.1.to_string();
    cols[4] = ymd.2.to_string();
    for (idx, v) in cells {
        cols[*idx] = v.to_string();
    }
    cols.join(",")
}

fn write_fixture(rows: &[String]) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("wells_2024.csv");
    let mut content = String::from(HEADER);
    for r in rows {
        content.push('\n');
        content.push_str(r);
    }
    content.push('\n');
    std::fs::write(&path, content).expect("write fixture");
    (dir, path)
}

/// Records every payload; fails node batches whose first node id is listed.
#[derive(Default)]
struct RecordingSink {
    reject_node_batches: HashSet<String>,
    sent: Mutex<Vec<(CaptureKind, Value)>>,
}

impl RecordingSink {
    fn first_node_id(payload: &Value) -> Option<String> {
        payload["nodes"]
            .get(0)?
            .get("external_id")?
            .as_str()
            .map(str::to_string)
    }

    fn sent(&self, kind: CaptureKind) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, v)| v.clone())
            .collect()
    }
}

impl CaptureSink for RecordingSink {
    fn url(&self, kind: CaptureKind) -> String {
        format!("mock://capture{}", kind.path())
    }

    fn post(&self, kind: CaptureKind, payload: &Value) -> Result<Value, CaptureError> {
        self.sent.lock().unwrap().push((kind, payload.clone()));
        if let Some(id) = Self::first_node_id(payload) {
            if kind == CaptureKind::Nodes && self.reject_node_batches.contains(&id) {
                return Err(CaptureError::Status {
                    url: self.url(kind),
                    status: 500,
                    headers: vec![],
                    body: "{\"message\":\"internal\"}".into(),
                });
            }
        }
        Ok(json!({"status": "ok"}))
    }
}

fn all_nodes(sink: &RecordingSink) -> Vec<Value> {
    sink.sent(CaptureKind::Nodes)
        .into_iter()
        .flat_map(|p| p["nodes"].as_array().cloned().unwrap_or_default())
        .collect()
}

fn all_relationships(sink: &RecordingSink) -> Vec<Value> {
    sink.sent(CaptureKind::Relationships)
        .into_iter()
        .flat_map(|p| p.as_array().cloned().unwrap_or_default())
        .collect()
}

#[test]
fn test_flaring_reading_end_to_end() {
    let (_dir, path) = write_fixture(&[data_row(
        "WellA",
        "W1",
        ("2024", "3", "15"),
        &[(5, "100"), (6, "bbl"), (17, "50"), (18, "scf")],
    )]);
    let sink = RecordingSink::default();
    let report = loader::run(&path, &BatchDispatcher::new(250, 6), &sink).unwrap();

    assert_eq!(report.rows_read, 1);
    assert_eq!(report.wells, 1);
    assert!(report.all_batches_succeeded());

    let nodes = all_nodes(&sink);
    let flaring_id = derive_external_id("W1", "Flaring", "2024-03-15");
    let reading = nodes
        .iter()
        .find(|n| n["external_id"] == flaring_id.as_str())
        .expect("flaring reading sent");

    assert_eq!(reading["type"], "Flaring");
    assert_eq!(reading["labels"], json!(["Emission"]));
    let volume = reading["properties"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["type"] == "volume")
        .expect("volume property");
    assert_eq!(volume["value"], json!(100.0));
    assert_eq!(volume["metadata"]["custom_metadata"]["units"], "bbl");
    assert_eq!(volume["metadata"]["source"], "wells_2024.csv");
    assert_eq!(volume["metadata"]["assurance_level"], 3);
    assert!(volume["metadata"]["verified_time"]
        .as_str()
        .unwrap()
        .ends_with('Z'));

    let fuel_gas_id = derive_external_id("W1", "FuelGas", "2024-03-15");
    assert!(nodes.iter().any(|n| n["external_id"] == fuel_gas_id.as_str()));

    // Well + Emissions + 4 EmissionType + 2 readings
    assert_eq!(nodes.len(), 8);
    // HAS_EMISSIONS + 4 HAS_TYPE + 2 HAS_DATA
    assert_eq!(all_relationships(&sink).len(), 7);
}

#[test]
fn test_nodes_are_fully_sent_before_relationships() {
    let rows: Vec<String> = (1..=12)
        .map(|d| data_row("WellA", "W1", ("2024", "1", &d.to_string()), &[(9, "1.5")]))
        .collect();
    let (_dir, path) = write_fixture(&rows);
    let sink = RecordingSink::default();
    loader::run(&path, &BatchDispatcher::new(3, 4), &sink).unwrap();

    let order: Vec<CaptureKind> = sink.sent.lock().unwrap().iter().map(|(k, _)| *k).collect();
    let first_rel = order
        .iter()
        .position(|k| *k == CaptureKind::Relationships)
        .expect("relationships sent");
    assert!(order[..first_rel].iter().all(|k| *k == CaptureKind::Nodes));
    assert!(order[first_rel..].iter().all(|k| *k == CaptureKind::Relationships));
}

#[test]
fn test_type_nodes_and_chains_per_well() {
    let rows = vec![
        data_row("A", "WA", ("2023", "12", "1"), &[(5, "1")]),
        data_row("A", "WA", ("2024", "2", "1"), &[(5, "2"), (13, "9")]),
        data_row("B", "WB", ("2024", "1", "1"), &[]),
        data_row("A", "WA", ("2024", "1", "1"), &[(5, "3")]),
        "Short,WC,2024,1,1,5,bbl".to_string(),
    ];
    let (_dir, path) = write_fixture(&rows);
    let (graph, rows_read, wells) = loader::build_graph(&path).unwrap();

    assert_eq!(rows_read, 4);
    assert_eq!(wells, 2);
    let type_nodes = graph
        .nodes
        .iter()
        .filter(|n| n.node_type == "EmissionType")
        .count();
    assert_eq!(type_nodes, 8);

    // Flaring chain for WA: 2024-02-01 -> 2024-01-01 -> 2023-12-01
    let flaring = |d: &str| derive_external_id("WA", "Flaring", d);
    let mut next: HashMap<String, String> = HashMap::new();
    let mut heads = Vec::new();
    for rel in &graph.relationships {
        match rel.rel_type {
            RelationshipType::NextDate if rel.source.node_type == "Flaring" => {
                assert!(next
                    .insert(rel.source.external_id.clone(), rel.target.external_id.clone())
                    .is_none());
            }
            RelationshipType::HasData if rel.target.node_type == "Flaring" => {
                heads.push(rel.target.external_id.clone());
            }
            _ => {}
        }
    }
    assert_eq!(heads, vec![flaring("2024-02-01")]);
    assert_eq!(next.len(), 2);

    let mut walk = vec![heads[0].clone()];
    while let Some(n) = next.get(walk.last().unwrap()) {
        assert!(!walk.contains(n), "cycle in chain");
        walk.push(n.clone());
    }
    assert_eq!(
        walk,
        vec![
            flaring("2024-02-01"),
            flaring("2024-01-01"),
            flaring("2023-12-01")
        ]
    );

    // WB has no readings but still gets its four types and no HAS_DATA
    let wb_types: Vec<String> = ["Flaring", "ColdVentilation", "DieselFuel", "FuelGas"]
        .iter()
        .map(|t| emissions_loader::identity::emission_type_id("WB", t))
        .collect();
    assert!(graph
        .relationships
        .iter()
        .filter(|r| r.rel_type == RelationshipType::HasData)
        .all(|r| !wb_types.contains(&r.source.external_id)));
}

#[test]
fn test_rerun_reproduces_identities() {
    let rows = vec![
        data_row("A", "WA", ("2024", "1", "1"), &[(5, "1"), (7, "2"), (8, "t")]),
        data_row("A", "WA", ("2024", "1", "2"), &[(11, "4")]),
    ];
    let (_dir, path) = write_fixture(&rows);
    let (first, _, _) = loader::build_graph(&path).unwrap();
    let (second, _, _) = loader::build_graph(&path).unwrap();

    let ids = |g: &emissions_loader::graph::CaptureGraph| {
        g.nodes
            .iter()
            .map(|n| n.external_id.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(first.relationships, second.relationships);
}

#[test]
fn test_failed_node_batch_does_not_stop_siblings() {
    let rows: Vec<String> = ["W1", "W2", "W3"]
        .iter()
        .map(|k| data_row(k, k, ("2024", "1", "1"), &[]))
        .collect();
    let (_dir, path) = write_fixture(&rows);

    // 3 wells, no readings: 3 Well + 3 Emissions + 12 EmissionType nodes.
    // Batches of 3 nodes: the second batch is [Emissions W1, W2, W3].
    let sink = RecordingSink {
        reject_node_batches: HashSet::from([emissions_loader::identity::emissions_id("W1")]),
        ..Default::default()
    };
    let report = loader::run(&path, &BatchDispatcher::new(3, 2), &sink).unwrap();

    assert_eq!(report.nodes, 18);
    assert_eq!(report.node_batches.completed, 5);
    assert_eq!(report.node_batches.failed, 1);
    assert_eq!(sink.sent(CaptureKind::Nodes).len(), 6);
    assert_eq!(report.relationship_batches.failed, 0);
    assert!(!report.all_batches_succeeded());
}
