/// Remediation files and dump loading against a scratch directory.
///
/// Run with: cargo test --test report_files_tests

use agencycheck::{AnalyzerOptions, Check, Edition, analyze, load_file, snapshot_from_value};
use serde_json::{Value, json};
use std::fs;

fn infected_dump() -> Value {
    json!({"agency": {"arango": {
        "Plan": {
            "Databases": {"_system": {}},
            "Collections": {"_system": {
                "100": {},
                "200": {"name": "edges", "id": "200", "type": 3,
                        "shards": {"s1": ["PRMR-a", "PRMR-gone"]},
                        "indexes": [
                            {"id": "0", "type": "primary", "fields": ["_key"]},
                            {"id": "1", "type": "edge", "fields": ["_from", "_to"]}
                        ]}
            }},
            "Coordinators": {"CRDN-x": ""}
        },
        "Current": {
            "Collections": {"_system": {"200": {"s1": {"servers": ["PRMR-a", "PRMR-gone"]}}}},
            "Coordinators": {"CRDN-x": "a", "CRDN-old": "b"}
        },
        "Supervision": {"Health": {
            "PRMR-a": {"Status": "GOOD"},
            "PRMR-gone": {"Status": "FAILED"},
            "CRDN-x": {"Status": "GOOD"}
        }}
    }}})
}

#[test]
fn test_files_written_per_bad_family() {
    let dir = tempfile::tempdir().unwrap();
    let options = AnalyzerOptions::default()
        .edition(Edition::Enterprise)
        .output_dir(dir.path());
    let snapshot = snapshot_from_value(infected_dump()).unwrap();
    let report = analyze(&snapshot, &options).unwrap();
    assert!(report.infected);

    let written = report.write_remediation_files(&options.output_dir).unwrap();
    let mut names: Vec<String> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    names.sort();

    let mut expected: Vec<String> = report
        .suggestions()
        .iter()
        .map(|s| s.file.to_string())
        .collect();
    expected.sort();
    assert_eq!(names, expected);
    for name in [
        "zombies.json",
        "dead-primaries.json",
        "zombie-coordinators.json",
        "broken-edge-indexes.json",
        "sharding-strategy.json",
    ] {
        assert!(names.iter().any(|n| n == name), "{} missing", name);
    }

    // No temp files are left behind.
    assert!(
        fs::read_dir(dir.path())
            .unwrap()
            .all(|e| e.unwrap().path().extension().is_some_and(|x| x == "json"))
    );

    let zombies: Value =
        serde_json::from_slice(&fs::read(dir.path().join("zombies.json")).unwrap()).unwrap();
    assert_eq!(zombies["issues"], json!([{"database": "_system", "cid": "100"}]));
    assert_eq!(
        zombies["transactions"][0][0]["/arango/Plan/Collections/_system/100"],
        json!({"op": "delete"})
    );
    assert_eq!(
        zombies["transactions"][0][1]["/arango/Plan/Collections/_system/100/name"],
        json!({"oldEmpty": true})
    );

    let strategy: Value =
        serde_json::from_slice(&fs::read(dir.path().join("sharding-strategy.json")).unwrap())
            .unwrap();
    assert_eq!(strategy["issues"][0]["shardingStrategy"], json!("enterprise-compat"));
}

#[test]
fn test_report_json_shape() {
    let snapshot = snapshot_from_value(infected_dump()).unwrap();
    let report = analyze(&snapshot, &AnalyzerOptions::default()).unwrap();
    let value = report.to_json().unwrap();

    assert_eq!(value["infected"], json!(true));
    assert_eq!(value["checks"]["zombies"]["status"], json!("bad"));
    assert_eq!(value["checks"]["obsoleteCollections"]["status"], json!("good"));
    assert_eq!(
        value["checks"].as_object().unwrap().len(),
        Check::ALL.len() - 1
    );
    assert!(value["generatedAt"].is_string());
    assert_eq!(value["ledger"]["PRMR-gone"]["followers"], json!(1));
}

#[test]
fn test_dump_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agency.json");
    fs::write(&path, serde_json::to_vec(&json!([infected_dump()["agency"]])).unwrap()).unwrap();

    let from_file = load_file(&path).unwrap();
    let from_value = snapshot_from_value(infected_dump()).unwrap();
    assert_eq!(from_file, from_value);
}

#[test]
fn test_unrecognized_dump_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bogus.json");
    fs::write(&path, br#"{"hello": "world"}"#).unwrap();

    let err = load_file(&path).unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.code(), "INVALID_SNAPSHOT");
}
