use super::*;

use tempfile::TempDir;

fn build_library(dir: &TempDir) -> Library {
    let xml = r#"<?xml version="1.0"?>
<gameList>
	<game id="1">
		<path>./roms/alpha.zip</path>
		<name>Alpha Quest</name>
		<system>snes</system>
		<image>./media/images/alpha.png</image>
		<video>./media/videos/alpha.mp4</video>
	</game>
	<game id="2">
		<path>./roms/beta.zip</path>
		<name>Beta Blaster</name>
	</game>
</gameList>
"#;
    fs::write(dir.path().join("gamelist.xml"), xml).unwrap();

    for rel in [
        "roms/alpha.zip",
        "roms/beta.zip",
        "media/images/alpha.png",
        "media/videos/alpha.mp4",
    ] {
        let full = dir.path().join(rel);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(&full, b"data").unwrap();
    }

    Library::load(dir.path()).unwrap()
}

#[test]
fn test_load_and_lookup() {
    let dir = TempDir::new().unwrap();
    let library = build_library(&dir);

    assert_eq!(library.len(), 2);
    assert_eq!(library.by_id("1").unwrap().name, "Alpha Quest");
    assert!(library.by_id("999").is_none());
}

#[test]
fn test_by_system_groups_and_buckets_unknown() {
    let dir = TempDir::new().unwrap();
    let library = build_library(&dir);

    let systems = library.by_system();
    assert_eq!(systems.len(), 2);
    assert_eq!(systems["snes"].len(), 1);
    assert_eq!(systems[UNKNOWN_SYSTEM][0].id, "2");
}

#[test]
fn test_delete_marked_removes_exactly_the_marked_entry() {
    let dir = TempDir::new().unwrap();
    let mut library = build_library(&dir);

    let mut marks = MarkSet::new();
    marks.mark("1");

    let summary = library.delete_marked(&marks).unwrap();
    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.files_removed, 3);
    assert!(summary.errors.is_empty());

    // XML node gone, sibling intact
    let games = gamelist::parse_gamelist(&library.gamelist_path()).unwrap();
    assert_eq!(games.len(), 1);
    assert_eq!(games[0].id, "2");

    // Exactly the marked entry's files removed
    assert!(!dir.path().join("roms/alpha.zip").exists());
    assert!(!dir.path().join("media/images/alpha.png").exists());
    assert!(!dir.path().join("media/videos/alpha.mp4").exists());
    assert!(dir.path().join("roms/beta.zip").exists());

    // In-memory view matches
    assert_eq!(library.len(), 1);
    assert!(library.by_id("1").is_none());

    // A backup was taken before the rewrite
    assert!(dir.path().join("gamelist.bak").exists());
}

#[test]
fn test_delete_marked_empty_set_is_noop() {
    let dir = TempDir::new().unwrap();
    let mut library = build_library(&dir);

    let summary = library.delete_marked(&MarkSet::new()).unwrap();
    assert_eq!(summary.deleted, 0);
    assert_eq!(library.len(), 2);
    // No backup for a no-op
    assert!(!dir.path().join("gamelist.bak").exists());
}

#[test]
fn test_delete_marked_missing_asset_is_not_an_error() {
    let dir = TempDir::new().unwrap();
    let mut library = build_library(&dir);
    fs::remove_file(dir.path().join("media/videos/alpha.mp4")).unwrap();

    let mut marks = MarkSet::new();
    marks.mark("1");

    let summary = library.delete_marked(&marks).unwrap();
    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.files_removed, 2);
    assert!(summary.errors.is_empty());
}

#[test]
fn test_apply_descriptions_updates_records() {
    let dir = TempDir::new().unwrap();
    let mut library = build_library(&dir);

    let updates: std::collections::HashMap<String, String> =
        [("2".to_string(), "Описание".to_string())].into();
    library.apply_descriptions(&updates);
    assert_eq!(library.by_id("2").unwrap().desc.as_deref(), Some("Описание"));
    assert!(library.by_id("1").unwrap().desc.is_none());
}
