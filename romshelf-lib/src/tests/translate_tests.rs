use super::*;

use std::fs;
use std::sync::Mutex;

use tempfile::TempDir;

/// Scripted translator: pops responses front-to-back, records every call.
struct FakeTranslator {
    responses: Mutex<Vec<Result<String, String>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeTranslator {
    fn new(responses: Vec<Result<String, String>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Translator for FakeTranslator {
    fn translate(&self, text: &str, _source: &str, _target: &str) -> Result<String, TranslateError> {
        self.calls.lock().unwrap().push(text.to_string());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(TranslateError::bad_response("script exhausted"));
        }
        responses.remove(0).map_err(TranslateError::bad_response)
    }
}

fn item(id: &str, desc: &str) -> BatchItem {
    BatchItem {
        id: id.to_string(),
        desc: desc.to_string(),
    }
}

#[test]
fn test_is_translated_threshold() {
    // Past 30% Cyrillic reads as already translated
    assert!(is_translated("Очень хорошая игра"));
    assert!(is_translated("Игра про cats"));
    assert!(!is_translated("A great game about cats"));
    // Exactly at the boundary: 3 of 10 alphabetic chars is not past 30%
    assert!(!is_translated("при abcdefg"));
    assert!(!is_translated(""));
    assert!(!is_translated("12345 !!!"));
}

#[test]
fn test_needs_translation() {
    assert!(needs_translation("An English description"));
    assert!(!needs_translation("Русское описание"));
    assert!(!needs_translation(""));
    assert!(!needs_translation("   \n  "));
}

#[test]
fn test_batches_close_at_record_limit() {
    let items: Vec<BatchItem> = (0..25).map(|i| item(&i.to_string(), "short")).collect();
    let batches = build_batches(items);
    assert_eq!(batches.len(), 3);
    assert_eq!(batches[0].len(), BATCH_RECORD_LIMIT);
    assert_eq!(batches[1].len(), BATCH_RECORD_LIMIT);
    assert_eq!(batches[2].len(), 5);
}

#[test]
fn test_batches_close_at_char_limit() {
    // Two 2500-char items exceed 4000 together, so each gets its own batch
    let big = "x".repeat(2500);
    let batches = build_batches(vec![item("1", &big), item("2", &big)]);
    assert_eq!(batches.len(), 2);
}

#[test]
fn test_oversized_single_item_still_batched() {
    let huge = "x".repeat(6000);
    let batches = build_batches(vec![item("1", &huge)]);
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 1);
}

#[test]
fn test_encode_parse_round_trip() {
    let batch = vec![item("12", "First description"), item("34", "Second one")];
    let encoded = encode_batch(&batch);
    assert_eq!(encoded, "---12---\nFirst description\n---34---\nSecond one");

    let parts = parse_batch_response(&encoded);
    assert_eq!(parts.len(), 2);
    assert_eq!(parts["12"], "First description");
    assert_eq!(parts["34"], "Second one");
}

#[test]
fn test_parse_tolerates_padded_markers() {
    let response = "--- 12 ---\nПервый текст\nвторая строка\n---34---\nВторой";
    let parts = parse_batch_response(response);
    assert_eq!(parts["12"], "Первый текст\nвторая строка");
    assert_eq!(parts["34"], "Второй");
}

#[test]
fn test_parse_lost_marker_leaves_record_out() {
    // The service swallowed the second marker; that record just stays out
    let response = "---12---\nПервый\nВторой без маркера";
    let parts = parse_batch_response(response);
    assert_eq!(parts.len(), 1);
    assert_eq!(parts["12"], "Первый\nВторой без маркера");
}

#[test]
fn test_retry_succeeds_after_failures() {
    let fake = FakeTranslator::new(vec![
        Err("rate limited".to_string()),
        Err("rate limited".to_string()),
        Ok("перевод".to_string()),
    ]);
    let options = TranslateOptions::default();
    let result = translate_with_retry(&fake, "text", &options).unwrap();
    assert_eq!(result, "перевод");
    assert_eq!(fake.call_count(), 3);
}

#[test]
fn test_retry_gives_up_after_three_attempts() {
    let fake = FakeTranslator::new(vec![
        Err("down".to_string()),
        Err("down".to_string()),
        Err("down".to_string()),
        Ok("never reached".to_string()),
    ]);
    let options = TranslateOptions::default();
    assert!(translate_with_retry(&fake, "text", &options).is_err());
    assert_eq!(fake.call_count(), 3);
}

fn library_with_descs(dir: &TempDir) -> Library {
    let xml = r#"<?xml version="1.0"?>
<gameList>
	<game id="1"><name>Alpha</name><desc>An English description</desc></game>
	<game id="2"><name>Beta</name><desc>Уже переведено давно</desc></game>
	<game id="3"><name>Gamma</name><desc>Another English text</desc></game>
</gameList>
"#;
    fs::write(dir.path().join("gamelist.xml"), xml).unwrap();
    Library::load(dir.path()).unwrap()
}

#[test]
fn test_run_translation_updates_disk_and_memory() {
    let dir = TempDir::new().unwrap();
    let mut library = library_with_descs(&dir);

    // Records 1 and 3 need translation and fit one batch
    let fake = FakeTranslator::new(vec![Ok(
        "---1---\nПервое описание\n---3---\nТретье описание".to_string()
    )]);
    let summary = run_translation(&mut library, &fake, &TranslateOptions::default(), &|_| {})
        .unwrap();

    assert_eq!(summary.total, 2);
    assert_eq!(summary.translated, 2);
    assert!(summary.errors.is_empty());
    assert_eq!(fake.call_count(), 1);

    // Disk updated
    let games = gamelist::parse_gamelist(&library.gamelist_path()).unwrap();
    assert_eq!(games[0].desc.as_deref(), Some("Первое описание"));
    assert_eq!(games[1].desc.as_deref(), Some("Уже переведено давно"));
    assert_eq!(games[2].desc.as_deref(), Some("Третье описание"));

    // Memory matches disk
    assert_eq!(library.by_id("1").unwrap().desc.as_deref(), Some("Первое описание"));

    // Backup taken before the run
    assert!(dir.path().join("gamelist.bak").exists());
}

#[test]
fn test_run_translation_nothing_to_do() {
    let dir = TempDir::new().unwrap();
    let xml = r#"<?xml version="1.0"?>
<gameList>
	<game id="1"><name>Alpha</name><desc>Всё уже готово</desc></game>
</gameList>
"#;
    fs::write(dir.path().join("gamelist.xml"), xml).unwrap();
    let mut library = Library::load(dir.path()).unwrap();

    let fake = FakeTranslator::new(vec![]);
    let summary = run_translation(&mut library, &fake, &TranslateOptions::default(), &|_| {})
        .unwrap();
    assert_eq!(summary.total, 0);
    assert_eq!(fake.call_count(), 0);
    // No work means no backup either
    assert!(!dir.path().join("gamelist.bak").exists());
}

#[test]
fn test_run_translation_lost_marker_keeps_original_text() {
    let dir = TempDir::new().unwrap();
    let mut library = library_with_descs(&dir);

    // Response only carries record 1; record 3's marker was lost
    let fake = FakeTranslator::new(vec![Ok("---1---\nПервое описание".to_string())]);
    let summary = run_translation(&mut library, &fake, &TranslateOptions::default(), &|_| {})
        .unwrap();

    assert_eq!(summary.translated, 1);
    let games = gamelist::parse_gamelist(&library.gamelist_path()).unwrap();
    assert_eq!(games[0].desc.as_deref(), Some("Первое описание"));
    assert_eq!(games[2].desc.as_deref(), Some("Another English text"));
}
