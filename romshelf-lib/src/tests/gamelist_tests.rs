use super::*;

use std::io::Cursor;

use tempfile::TempDir;

const SAMPLE: &str = r#"<?xml version="1.0"?>
<gameList>
	<game id="1">
		<path>./roms/alpha.zip</path>
		<name>Alpha Quest</name>
		<desc>A quest of alphas.</desc>
		<rating>0.8</rating>
		<releasedate>19950601T000000</releasedate>
		<genre>RPG</genre>
		<players>1</players>
		<system>snes</system>
		<image>./media/images/alpha.png</image>
		<video>./media/videos/alpha.mp4</video>
	</game>
	<game id="2">
		<path>./roms/beta.zip</path>
		<name>Beta Blaster</name>
		<developer>Beta Soft</developer>
	</game>
	<game id="3">
		<path>./roms/gamma.zip</path>
		<name>Gamma Force</name>
		<desc/>
	</game>
</gameList>
"#;

fn parse_sample() -> Vec<GameRecord> {
    parse_gamelist_reader(Cursor::new(SAMPLE.as_bytes())).unwrap()
}

fn write_sample(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("gamelist.xml");
    fs::write(&path, SAMPLE).unwrap();
    path
}

#[test]
fn test_parse_all_fields() {
    let games = parse_sample();
    assert_eq!(games.len(), 3);

    let alpha = &games[0];
    assert_eq!(alpha.id, "1");
    assert_eq!(alpha.name, "Alpha Quest");
    assert_eq!(alpha.path.as_deref(), Some("./roms/alpha.zip"));
    assert_eq!(alpha.desc.as_deref(), Some("A quest of alphas."));
    assert_eq!(alpha.rating.as_deref(), Some("0.8"));
    assert_eq!(alpha.system.as_deref(), Some("snes"));
    assert_eq!(alpha.image.as_deref(), Some("./media/images/alpha.png"));
    assert_eq!(alpha.video.as_deref(), Some("./media/videos/alpha.mp4"));
}

#[test]
fn test_parse_missing_fields_are_none() {
    let games = parse_sample();
    let beta = &games[1];
    assert_eq!(beta.id, "2");
    assert!(beta.desc.is_none());
    assert!(beta.image.is_none());
    assert!(beta.video.is_none());
    assert!(beta.system.is_none());
}

#[test]
fn test_parse_missing_file_is_not_found() {
    let err = parse_gamelist(Path::new("/nonexistent/gamelist.xml")).unwrap_err();
    assert!(matches!(err, GamelistError::NotFound(_)));
}

#[test]
fn test_release_year() {
    let games = parse_sample();
    assert_eq!(games[0].release_year(), Some("1995"));
    assert_eq!(games[1].release_year(), None);
}

#[test]
fn test_release_year_non_ascii_date() {
    // A stray multibyte char in the date must not panic the slice
    let record = GameRecord {
        releasedate: Some("199я0601T000000".to_string()),
        ..Default::default()
    };
    assert_eq!(record.release_year(), None);

    let record = GameRecord {
        releasedate: Some("19я".to_string()),
        ..Default::default()
    };
    assert_eq!(record.release_year(), None);
}

#[test]
fn test_backup_numbering_never_overwrites() {
    let dir = TempDir::new().unwrap();
    let path = write_sample(&dir);

    let first = backup_gamelist(&path).unwrap();
    assert_eq!(first, dir.path().join("gamelist.bak"));

    fs::write(&path, "changed").unwrap();
    let second = backup_gamelist(&path).unwrap();
    assert_eq!(second, dir.path().join("gamelist.bak0"));

    let third = backup_gamelist(&path).unwrap();
    assert_eq!(third, dir.path().join("gamelist.bak1"));

    // First backup still holds the original content
    assert_eq!(fs::read_to_string(&first).unwrap(), SAMPLE);
    assert_eq!(fs::read_to_string(&second).unwrap(), "changed");
}

#[test]
fn test_remove_games_exact_nodes() {
    let dir = TempDir::new().unwrap();
    let path = write_sample(&dir);

    let ids: HashSet<String> = ["2".to_string()].into();
    let removed = remove_games(&path, &ids).unwrap();
    assert_eq!(removed, 1);

    let rewritten = fs::read_to_string(&path).unwrap();
    assert!(!rewritten.contains("Beta Blaster"));
    assert!(!rewritten.contains("Beta Soft"));
    assert!(rewritten.contains("Alpha Quest"));
    assert!(rewritten.contains("Gamma Force"));

    let games = parse_gamelist(&path).unwrap();
    assert_eq!(games.len(), 2);
}

#[test]
fn test_remove_games_unknown_id_is_noop() {
    let dir = TempDir::new().unwrap();
    let path = write_sample(&dir);

    let ids: HashSet<String> = ["999".to_string()].into();
    assert_eq!(remove_games(&path, &ids).unwrap(), 0);
    assert_eq!(parse_gamelist(&path).unwrap().len(), 3);
}

#[test]
fn test_set_descriptions_replaces_text() {
    let dir = TempDir::new().unwrap();
    let path = write_sample(&dir);

    let updates: HashMap<String, String> =
        [("1".to_string(), "Переведённое описание".to_string())].into();
    assert_eq!(set_descriptions(&path, &updates).unwrap(), 1);

    let games = parse_gamelist(&path).unwrap();
    assert_eq!(games[0].desc.as_deref(), Some("Переведённое описание"));
    // Other games untouched
    assert!(games[1].desc.is_none());
}

#[test]
fn test_set_descriptions_inserts_missing_element() {
    let dir = TempDir::new().unwrap();
    let path = write_sample(&dir);

    // Game 2 has no <desc> at all; game 3 has a self-closing <desc/>
    let updates: HashMap<String, String> = [
        ("2".to_string(), "Новый текст".to_string()),
        ("3".to_string(), "Ещё текст".to_string()),
    ]
    .into();
    assert_eq!(set_descriptions(&path, &updates).unwrap(), 2);

    let games = parse_gamelist(&path).unwrap();
    assert_eq!(games[1].desc.as_deref(), Some("Новый текст"));
    assert_eq!(games[2].desc.as_deref(), Some("Ещё текст"));
}

#[test]
fn test_set_descriptions_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = write_sample(&dir);

    let updates: HashMap<String, String> = [("1".to_string(), "Один раз".to_string())].into();
    set_descriptions(&path, &updates).unwrap();
    let once = fs::read_to_string(&path).unwrap();
    set_descriptions(&path, &updates).unwrap();
    let twice = fs::read_to_string(&path).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn test_unmodeled_tags_survive_rewrite() {
    let dir = TempDir::new().unwrap();
    let path = write_sample(&dir);

    let updates: HashMap<String, String> = [("1".to_string(), "x".to_string())].into();
    set_descriptions(&path, &updates).unwrap();

    let rewritten = fs::read_to_string(&path).unwrap();
    assert!(rewritten.contains("<developer>Beta Soft</developer>"));
}
