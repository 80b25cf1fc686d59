//! End-to-end preparation runs on scratch directories

use std::fs;
use std::path::Path;

use mksa_common::config::{PathsConfig, TomlConfig};
use mksa_common::records::load_enhanced_records;
use mksa_prep::anonymize::unique_id;
use mksa_prep::pipeline::run_pipeline;
use mksa_prep::{ApiCredentials, PrepError};

const RAW_LOG: &str = "\
Timestamp,First Name,Last Name,Access Type
2019-08-28 10:15:00,Ada,Lovelace,Jacobs Wood Shop
2019-08-28 10:15:00,Ada,Lovelace,Jacobs Wood Shop
2019-09-03 14:00:00,Alan,Turing,Jacobs Vinyl Cutter and Inkjet
2019-12-19 09:00:00,Grace,Hopper,Jacobs Metal Shop
2020-03-20 11:00:00,Ada,Lovelace,Jacobs Laser Access
2019-07-01 12:00:00,Alan,Turing,Jacobs Wood Shop
";

const TERMS: &str = "\
Semester,Start,End
Fall 2019,2019-08-28,2019-12-20
Spring 2020,2020-01-21,2020-05-15
";

fn config_in(dir: &Path) -> TomlConfig {
    TomlConfig {
        paths: PathsConfig {
            raw_log: dir.join("log.csv"),
            anonymized_log: dir.join("out").join("anonymized_log.csv"),
            enhanced_log: dir.join("out").join("enhanced_log.csv"),
            terms_file: dir.join("terms.csv"),
            analysis_dir: dir.join("analysis"),
            image_dir: dir.join("img"),
        },
        ..TomlConfig::default()
    }
}

#[tokio::test]
async fn test_run_pipeline_with_cached_terms() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = config_in(dir.path());
    fs::write(&config.paths.raw_log, RAW_LOG).unwrap();
    fs::write(&config.paths.terms_file, TERMS).unwrap();

    let summary = run_pipeline(&config, &ApiCredentials::default(), false)
        .await
        .unwrap();

    // 6 rows: 1 duplicate, 1 in the COVID window, 1 in summer
    assert_eq!(summary.rows_in, 4);
    assert_eq!(summary.unassigned, 1);
    assert_eq!(summary.rows_out, 3);
    assert_eq!(summary.renamed, 1);

    let anonymized = fs::read_to_string(&config.paths.anonymized_log).unwrap();
    assert!(!anonymized.contains("Lovelace"));
    assert!(anonymized.contains(&unique_id("Ada", "Lovelace")));

    let records = load_enhanced_records(&config.paths.enhanced_log).unwrap();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.semester == "Fall 2019"));

    // Fall 2019 starts on a Wednesday; week 1 begins Monday 2019-08-26
    let weeks: Vec<u32> = records.iter().map(|r| r.semester_week).collect();
    assert_eq!(weeks, vec![1, 2, 17]);
    assert_eq!(records[1].access_type, "Jacobs Vinyl Cutter");
    assert_eq!(records[1].equipment_category, "Basic Prototyping");
    assert_eq!(records[2].equipment_category, "Metal Shop");
}

#[tokio::test]
async fn test_run_pipeline_uses_existing_anonymized_log() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut config = config_in(dir.path());
    config.exclusions.clear();
    fs::write(&config.paths.terms_file, TERMS).unwrap();
    fs::create_dir_all(dir.path().join("out")).unwrap();
    fs::write(
        &config.paths.anonymized_log,
        "Timestamp,Access Type,Unique ID\n2020-03-20 11:00:00,Jacobs Wood Shop,x\n",
    )
    .unwrap();

    let summary = run_pipeline(&config, &ApiCredentials::default(), false)
        .await
        .unwrap();
    assert_eq!(summary.rows_out, 1);

    let records = load_enhanced_records(&config.paths.enhanced_log).unwrap();
    assert_eq!(records[0].semester, "Spring 2020");
    assert_eq!(records[0].semester_week, 9);
}

#[tokio::test]
async fn test_run_pipeline_without_terms_or_credentials() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = config_in(dir.path());
    fs::write(&config.paths.raw_log, RAW_LOG).unwrap();

    let err = run_pipeline(&config, &ApiCredentials::default(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, PrepError::NoTerms(_)));
}

#[tokio::test]
async fn test_run_pipeline_without_input() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = config_in(dir.path());
    assert!(run_pipeline(&config, &ApiCredentials::default(), false)
        .await
        .is_err());
}
