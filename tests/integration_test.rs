//! Integration tests for wikibatch
//!
//! These tests walk the offline half of the pipeline end to end: metadata
//! CSV in, info records out, files renamed and description pages written.

use std::collections::BTreeMap;
use tempfile::TempDir;
use wikibatch::{
    common,
    config::{BatchConfig, MappingsConfig, TemplateParam},
    makeinfo::{CsvInfoMaker, InfoMaker, InfoRecord},
    mappings::{Counter, MappingEntry},
    prep,
};

const CSV_DATA: &str = "\
idno|title|description|date|photographer|keywords\n\
1921/A.1|Skeppet|Ett skepp i hamn|1921-09-17|Jansson, Eugen|fartyg;hamnar\n\
1921/A.2|Stranden|Barn vid stranden|trol. 1922|Jansson, Eugen|\n";

fn tp(param: &str, column: &str) -> TemplateParam {
    TemplateParam {
        param: param.to_string(),
        column: column.to_string(),
    }
}

fn batch_config() -> BatchConfig {
    BatchConfig {
        header: "idno|title|description|date|photographer|keywords".to_string(),
        key_columns: vec!["idno".to_string()],
        list_columns: vec!["keywords".to_string()],
        description_column: "description".to_string(),
        date_column: "date".to_string(),
        idno_column: "idno".to_string(),
        people_columns: vec!["photographer".to_string()],
        keyword_columns: vec!["keywords".to_string()],
        institution: "Example Museum".to_string(),
        info_template: "Photograph".to_string(),
        template_params: vec![
            tp("title", "title"),
            tp("description", "description"),
            tp("date", "date"),
            tp("photographer", "photographer"),
        ],
        footer_templates: vec!["{{PD-old-70}}".to_string()],
        base_meta_cat: "Media from the Example Museum".to_string(),
        batch_label: "2026-08".to_string(),
        ..BatchConfig::default()
    }
}

fn mappings_config(tmp: &TempDir) -> MappingsConfig {
    MappingsConfig {
        mapping_dir: tmp.path().join("connections"),
        wikitext_dir: tmp.path().join("connections"),
        ..MappingsConfig::default()
    }
}

fn seed_mappings(maker: &CsvInfoMaker) {
    let list = maker.mapping_list("People").unwrap();
    let mut entry = MappingEntry::new("Jansson, Eugen", 1);
    entry.creator = "{{Creator:Eugen Jansson}}".to_string();
    entry.category = vec!["Photographs by Eugen Jansson".to_string()];
    common::write_json(list.mapping_file(), &vec![entry]).unwrap();

    let list = maker.mapping_list("Keywords").unwrap();
    let mut entry = MappingEntry::new("fartyg", 1);
    entry.category = vec!["Ships".to_string()];
    common::write_json(list.mapping_file(), &vec![entry]).unwrap();
}

/// Full offline run: CSV to info records to prepared upload directory.
#[test]
fn test_make_info_and_prep_pipeline() {
    let tmp = TempDir::new().unwrap();
    let in_file = tmp.path().join("metadata.csv");
    std::fs::write(&in_file, CSV_DATA).unwrap();

    let mut maker = CsvInfoMaker::new(batch_config(), mappings_config(&tmp));
    seed_mappings(&maker);
    let json_file = maker.run(&in_file, None).unwrap();

    let records: BTreeMap<String, InfoRecord> = common::read_json(&json_file).unwrap();
    assert_eq!(records.len(), 2);
    let ship = &records["1921/A.1"];
    assert!(ship.info.contains("| photographer = {{Creator:Eugen Jansson}}"));
    assert!(ship.cats.contains(&"Ships".to_string()));
    assert_eq!(ship.filename, "Ett skepp i hamn - Example Museum - 1921-A.1");

    // lay out raw files named by the key column, slashes become directories
    let media_dir = tmp.path().join("media");
    std::fs::create_dir_all(media_dir.join("1921")).unwrap();
    std::fs::write(media_dir.join("1921/A.1.tif"), "tif bytes").unwrap();
    std::fs::write(media_dir.join("1921/A.2.jpg"), "jpg bytes").unwrap();

    // prep matches on the extension-less basename, so key the data that way
    let mut by_basename = BTreeMap::new();
    for (key, record) in &records {
        let basename = key.rsplit('/').next().unwrap().to_string();
        by_basename.insert(basename, record.clone());
    }
    let flat_data = tmp.path().join("flat.json");
    common::write_json(&flat_data, &by_basename).unwrap();

    let out_dir = tmp.path().join("prepared");
    let exts = vec![".tif".to_string(), ".jpg".to_string()];
    let summary = prep::run(&media_dir, &out_dir, &flat_data, &exts).unwrap();
    assert_eq!(summary.found, 2);
    assert_eq!(summary.matched, 2);

    let renamed = out_dir.join("Ett skepp i hamn - Example Museum - 1921-A.1.tif");
    assert!(renamed.is_file());
    let info = std::fs::read_to_string(
        out_dir.join("Ett skepp i hamn - Example Museum - 1921-A.1.info"),
    )
    .unwrap();
    assert!(info.contains("{{Photograph"));
    assert!(info.contains("{{PD-old-70}}"));
    assert!(info.contains("[[Category:Ships]]"));
    assert!(info.contains("[[Category:Media from the Example Museum: 2026-08]]"));

    // the emptied 1921 directory is cleaned up
    assert!(!media_dir.join("1921").exists());
}

/// Scraped list contents drive the merge that feeds the next list revision.
#[test]
fn test_mapping_list_update_cycle() {
    let tmp = TempDir::new().unwrap();
    let in_file = tmp.path().join("metadata.csv");
    std::fs::write(&in_file, CSV_DATA).unwrap();

    let mut maker = CsvInfoMaker::new(batch_config(), mappings_config(&tmp));
    maker.load_and_process(&in_file).unwrap();
    let counters = maker.harvest_counters();

    let people = maker.mapping_list("People").unwrap();
    let scraped = "{{mapping-row\n\
        | name = Jansson, Eugen\n\
        | frequency = 1\n\
        | creator = {{Creator:Eugen Jansson}}\n\
        | category = Photographs by Eugen Jansson\n\
        }}\n\
        {{mapping-row\n\
        | name = Gammal, Fotograf\n\
        | frequency = 3\n\
        | creator = {{Creator:Fotograf Gammal}}\n\
        }}\n";
    people.store_scraped(scraped).unwrap();

    let counter = counters.get("People").unwrap();
    assert_eq!(counter.most_common(), vec![("Jansson, Eugen".to_string(), 2)]);

    let (new_mappings, preserved) = people.mappings_merger(counter).unwrap();
    // the known photographer keeps the mapped data, with the new frequency
    assert_eq!(new_mappings.len(), 1);
    assert_eq!(new_mappings[0].0, 2);
    assert_eq!(new_mappings[0].1.creator, "{{Creator:Eugen Jansson}}");
    // the photographer absent from this batch survives as preserved
    assert_eq!(preserved.len(), 1);
    assert_eq!(preserved[0].name, "Gammal, Fotograf");

    let rendered = people.save_as_wikitext(&new_mappings, &preserved, "intro").unwrap();
    let wiki = std::fs::read_to_string(rendered).unwrap();
    assert!(wiki.starts_with("intro"));
    assert!(wiki.contains("===Preserved mappings==="));
    assert!(wiki.contains("| name = Gammal, Fotograf"));
}
