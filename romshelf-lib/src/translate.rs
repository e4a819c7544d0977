//! Batched description translation.
//!
//! Groups untranslated descriptions into size-bounded batches, sends each
//! batch as one call to the translation service with id-tagged sections,
//! and splits the result back out by those tags. Batch failures fall back
//! to per-record calls so one bad batch never aborts the run. Accumulated
//! results are written back to the gamelist every few batches, so a crash
//! mid-run loses at most one save interval of work.

use std::collections::HashMap;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::TranslateError;
use crate::gamelist;
use crate::library::Library;
use crate::progress::SpeedTracker;

/// A batch closes before its combined text reaches this many characters.
pub const BATCH_CHAR_LIMIT: usize = 4000;

/// A batch never holds more than this many records.
pub const BATCH_RECORD_LIMIT: usize = 10;

/// Attempts per translation call before giving up on it.
const MAX_RETRIES: u32 = 3;

/// Pause between retry attempts.
const RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// Pause between batches, to stay under the service's rate limits.
const BATCH_PAUSE: Duration = Duration::from_millis(500);

/// Pause between per-record fallback calls.
const FALLBACK_PAUSE: Duration = Duration::from_secs(1);

/// Default for [`TranslateOptions::save_interval`].
pub const DEFAULT_SAVE_INTERVAL: usize = 50;

/// Translation capability. Blocking; implementations handle their own
/// transport but not retries (the pipeline owns retry policy).
pub trait Translator {
    fn translate(&self, text: &str, source: &str, target: &str)
    -> Result<String, TranslateError>;
}

/// Translator backed by the public Google endpoint (`translate_a/single`,
/// the same one the web widget uses). No API key required.
pub struct GoogleTranslator {
    client: reqwest::blocking::Client,
}

impl GoogleTranslator {
    pub fn new() -> Result<Self, TranslateError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }
}

impl Translator for GoogleTranslator {
    fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<String, TranslateError> {
        let response = self
            .client
            .get("https://translate.googleapis.com/translate_a/single")
            .query(&[
                ("client", "gtx"),
                ("sl", source),
                ("tl", target),
                ("dt", "t"),
                ("q", text),
            ])
            .send()?
            .error_for_status()?;

        // Response shape: [[["<translated>","<source>",...], ...], ...]
        // The first array holds one entry per sentence segment.
        let body: serde_json::Value = serde_json::from_str(&response.text()?)?;
        let segments = body
            .get(0)
            .and_then(|v| v.as_array())
            .ok_or_else(|| TranslateError::bad_response("unexpected response shape"))?;

        let mut out = String::new();
        for segment in segments {
            if let Some(piece) = segment.get(0).and_then(|v| v.as_str()) {
                out.push_str(piece);
            }
        }
        if out.is_empty() {
            return Err(TranslateError::bad_response("empty translation"));
        }
        Ok(out)
    }
}

/// Options controlling a translation run.
#[derive(Debug, Clone)]
pub struct TranslateOptions {
    /// Source language code passed to the service.
    pub source_lang: String,
    /// Target language code.
    pub target_lang: String,
    /// Gamelist is re-persisted after every this many batches.
    pub save_interval: usize,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            source_lang: "en".to_string(),
            target_lang: "ru".to_string(),
            save_interval: DEFAULT_SAVE_INTERVAL,
        }
    }
}

/// Progress information for callbacks.
#[derive(Debug, Clone)]
pub enum TranslateProgress {
    /// Batches formed, run starting.
    Started { total: usize, batches: usize },
    /// A batch finished (by whichever path).
    BatchDone {
        processed: usize,
        total: usize,
        /// Records per second over the recent window.
        speed: f64,
        eta: Option<Duration>,
    },
    /// A batch call failed after retries; switching to per-record calls.
    FallingBack { batch_index: usize },
    /// Accumulated results were written to the gamelist.
    Saved { processed: usize },
    /// Run complete.
    Done,
}

/// Summary of a translation run.
#[derive(Debug, Clone, Default)]
pub struct TranslateSummary {
    /// Records that received translated text.
    pub translated: usize,
    /// Records that needed translation when the run started.
    pub total: usize,
    /// Per-record failures; these never abort the run.
    pub errors: Vec<String>,
}

/// One record's worth of work inside a batch.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub id: String,
    pub desc: String,
}

/// True if the text already reads as target-language: more than 30% of its
/// alphabetic characters are Cyrillic. Empty text never needs translation,
/// and neither does anything past the threshold.
pub fn is_translated(text: &str) -> bool {
    let mut alphabetic = 0usize;
    let mut cyrillic = 0usize;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            alphabetic += 1;
            if ('\u{0400}'..='\u{04FF}').contains(&ch) {
                cyrillic += 1;
            }
        }
    }
    alphabetic > 0 && cyrillic as f64 / alphabetic as f64 > 0.3
}

/// Whether a description should be sent for translation.
pub fn needs_translation(text: &str) -> bool {
    !text.trim().is_empty() && !is_translated(text)
}

/// Greedy batcher: items join the current batch while the running character
/// total stays under [`BATCH_CHAR_LIMIT`] and the count under
/// [`BATCH_RECORD_LIMIT`]; otherwise the batch closes and a new one starts.
/// A single oversized item still gets a batch of its own.
pub fn build_batches(items: Vec<BatchItem>) -> Vec<Vec<BatchItem>> {
    let mut batches = Vec::new();
    let mut current: Vec<BatchItem> = Vec::new();
    let mut current_chars = 0usize;

    for item in items {
        let len = item.desc.chars().count();
        if current.is_empty()
            || (current_chars + len < BATCH_CHAR_LIMIT && current.len() < BATCH_RECORD_LIMIT)
        {
            current_chars += len;
            current.push(item);
        } else {
            batches.push(std::mem::take(&mut current));
            current_chars = len;
            current.push(item);
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// Serialize a batch as id-tagged sections:
///
/// ```text
/// ---<id>---
/// <desc>
/// ---<id>---
/// <desc>
/// ```
pub fn encode_batch(batch: &[BatchItem]) -> String {
    let mut parts = Vec::with_capacity(batch.len() * 2);
    for item in batch {
        parts.push(format!("---{}---", item.id));
        parts.push(item.desc.clone());
    }
    parts.join("\n")
}

/// Split a translated blob back into per-id texts.
///
/// Scans line by line for `---<id>---` markers; everything between two
/// markers belongs to the preceding id. The service sometimes pads the
/// markers with spaces or reflows them, so ids are matched after trimming
/// surrounding dashes and whitespace. Ids with no recognizable marker are
/// simply absent from the map and stay untranslated.
pub fn parse_batch_response(response: &str) -> HashMap<String, String> {
    let mut parts = HashMap::new();
    let mut current_id: Option<String> = None;
    let mut current_text: Vec<&str> = Vec::new();

    for line in response.lines() {
        let line = line.trim();
        if line.starts_with("---") && line.ends_with("---") && line.len() > 6 {
            if let Some(id) = current_id.take() {
                if !current_text.is_empty() {
                    parts.insert(id, current_text.join("\n").trim().to_string());
                }
            }
            current_id = Some(line.trim_matches('-').trim().to_string());
            current_text.clear();
        } else if current_id.is_some() && !line.is_empty() {
            current_text.push(line);
        }
    }
    if let Some(id) = current_id {
        if !current_text.is_empty() {
            parts.insert(id, current_text.join("\n").trim().to_string());
        }
    }
    parts
}

/// Call the translator with retries and fixed backoff.
fn translate_with_retry(
    translator: &dyn Translator,
    text: &str,
    options: &TranslateOptions,
) -> Result<String, TranslateError> {
    let mut last_err = None;
    for attempt in 0..MAX_RETRIES {
        match translator.translate(text, &options.source_lang, &options.target_lang) {
            Ok(t) => return Ok(t),
            Err(e) => {
                log::debug!("translation attempt {} failed: {e}", attempt + 1);
                last_err = Some(e);
                if attempt + 1 < MAX_RETRIES {
                    thread::sleep(RETRY_BACKOFF);
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| TranslateError::bad_response("no attempts made")))
}

/// Translate every description in the library that needs it.
///
/// Backs up the gamelist first, then works batch by batch. Results
/// accumulate in memory and are flushed to the XML every `save_interval`
/// batches and once at the end; re-flushing the accumulated map is
/// idempotent, so partial saves are safe. The in-memory library is updated
/// to match before returning.
pub fn run_translation(
    library: &mut Library,
    translator: &dyn Translator,
    options: &TranslateOptions,
    progress: &dyn Fn(TranslateProgress),
) -> Result<TranslateSummary, TranslateError> {
    let items: Vec<BatchItem> = library
        .records()
        .iter()
        .filter_map(|r| {
            let desc = r.desc.as_deref()?;
            needs_translation(desc).then(|| BatchItem {
                id: r.id.clone(),
                desc: desc.to_string(),
            })
        })
        .collect();

    let mut summary = TranslateSummary {
        total: items.len(),
        ..Default::default()
    };
    if items.is_empty() {
        progress(TranslateProgress::Done);
        return Ok(summary);
    }

    let xml_path = library.gamelist_path();
    gamelist::backup_gamelist(&xml_path)?;

    let batches = build_batches(items);
    progress(TranslateProgress::Started {
        total: summary.total,
        batches: batches.len(),
    });

    let mut updates: HashMap<String, String> = HashMap::new();
    let mut processed = 0usize;
    let mut tracker = SpeedTracker::new(Instant::now());
    let batch_count = batches.len();

    for (i, batch) in batches.into_iter().enumerate() {
        match run_batch(translator, &batch, options) {
            Ok(parts) => {
                for item in &batch {
                    match parts.get(&item.id) {
                        Some(text) => {
                            updates.insert(item.id.clone(), text.clone());
                            summary.translated += 1;
                        }
                        // Marker lost in translation: leave the text alone
                        None => log::warn!("no translated section for id {}", item.id),
                    }
                }
                processed += batch.len();
            }
            Err(e) => {
                log::warn!("batch {} failed ({e}), translating records individually", i + 1);
                progress(TranslateProgress::FallingBack { batch_index: i });
                for item in &batch {
                    match translate_with_retry(translator, &item.desc, options) {
                        Ok(text) => {
                            updates.insert(item.id.clone(), text);
                            summary.translated += 1;
                        }
                        Err(e) => summary.errors.push(format!("{}: {e}", item.id)),
                    }
                    processed += 1;
                    tracker.update(processed, Instant::now());
                    report_batch(progress, &tracker, processed, summary.total);
                    thread::sleep(FALLBACK_PAUSE);
                }
                // Don't lose fallback work if a later batch crashes us
                save_progress(&xml_path, &updates, processed, progress);
            }
        }

        tracker.update(processed, Instant::now());
        report_batch(progress, &tracker, processed, summary.total);

        if (i + 1) % options.save_interval.max(1) == 0 {
            save_progress(&xml_path, &updates, processed, progress);
        }
        if i + 1 < batch_count {
            thread::sleep(BATCH_PAUSE);
        }
    }

    if !updates.is_empty() {
        gamelist::set_descriptions(&xml_path, &updates)?;
        progress(TranslateProgress::Saved { processed });
        library.apply_descriptions(&updates);
    }
    progress(TranslateProgress::Done);

    log::info!(
        "translated {} of {} description(s), {} failure(s)",
        summary.translated,
        summary.total,
        summary.errors.len()
    );
    Ok(summary)
}

/// One batch through the service: encode, call with retries, parse.
fn run_batch(
    translator: &dyn Translator,
    batch: &[BatchItem],
    options: &TranslateOptions,
) -> Result<HashMap<String, String>, TranslateError> {
    let combined = encode_batch(batch);
    let translated = translate_with_retry(translator, &combined, options)?;
    Ok(parse_batch_response(&translated))
}

fn report_batch(
    progress: &dyn Fn(TranslateProgress),
    tracker: &SpeedTracker,
    processed: usize,
    total: usize,
) {
    progress(TranslateProgress::BatchDone {
        processed,
        total,
        speed: tracker.speed(),
        eta: tracker.eta(total.saturating_sub(processed)),
    });
}

/// Best-effort incremental save. A failed save is logged, not fatal; the
/// final save at the end of the run still gets its chance.
fn save_progress(
    xml_path: &std::path::Path,
    updates: &HashMap<String, String>,
    processed: usize,
    progress: &dyn Fn(TranslateProgress),
) {
    if updates.is_empty() {
        return;
    }
    match gamelist::set_descriptions(xml_path, updates) {
        Ok(_) => progress(TranslateProgress::Saved { processed }),
        Err(e) => log::warn!("incremental save failed: {e}"),
    }
}

#[cfg(test)]
#[path = "tests/translate_tests.rs"]
mod tests;
