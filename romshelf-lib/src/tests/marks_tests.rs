use super::*;

use tempfile::TempDir;

fn sample_library(dir: &TempDir) -> Library {
    let xml = r#"<?xml version="1.0"?>
<gameList>
	<game id="10"><name>Mega Run</name></game>
	<game id="20"><name>Star Pilot</name></game>
</gameList>
"#;
    fs::write(dir.path().join("gamelist.xml"), xml).unwrap();
    Library::load(dir.path()).unwrap()
}

#[test]
fn test_load_missing_file_is_empty() {
    let marks = MarkSet::load(Path::new("/nonexistent/checked")).unwrap();
    assert!(marks.is_empty());
}

#[test]
fn test_load_tolerates_malformed_lines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("checked");
    fs::write(&path, "10|Mega Run\n\n   \n|no id here\n20\n").unwrap();

    let marks = MarkSet::load(&path).unwrap();
    assert_eq!(marks.len(), 2);
    assert!(marks.contains("10"));
    assert!(marks.contains("20"));
}

#[test]
fn test_save_writes_id_and_name() {
    let dir = TempDir::new().unwrap();
    let library = sample_library(&dir);

    let mut marks = MarkSet::new();
    marks.mark("20");
    marks.mark("10");

    let path = dir.path().join("checked");
    marks.save(&path, &library).unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    assert_eq!(contents, "10|Mega Run\n20|Star Pilot\n");
}

#[test]
fn test_save_load_round_trip() {
    let dir = TempDir::new().unwrap();
    let library = sample_library(&dir);

    let mut marks = MarkSet::new();
    marks.mark("10");
    let path = dir.path().join("checked");
    marks.save(&path, &library).unwrap();

    let loaded = MarkSet::load(&path).unwrap();
    assert_eq!(loaded.len(), 1);
    assert!(loaded.contains("10"));
}

#[test]
fn test_retain_known_drops_stale_ids() {
    let dir = TempDir::new().unwrap();
    let library = sample_library(&dir);

    let mut marks = MarkSet::new();
    marks.mark("10");
    marks.mark("999");

    let dropped = marks.retain_known(&library);
    assert_eq!(dropped, 1);
    assert!(marks.contains("10"));
    assert!(!marks.contains("999"));
}

#[test]
fn test_mark_unmark() {
    let mut marks = MarkSet::new();
    assert!(marks.mark("1"));
    assert!(!marks.mark("1"));
    assert!(marks.unmark("1"));
    assert!(!marks.unmark("1"));
    assert!(marks.is_empty());
}
