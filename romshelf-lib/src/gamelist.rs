//! Reading and editing EmulationStation `gamelist.xml` files.
//!
//! Parsing pulls the fields romshelf cares about into [`GameRecord`]s.
//! Edits (deleting entries, rewriting descriptions) are surgical: the file
//! is streamed through a writer and only the targeted `<game>` elements are
//! touched, so tags we don't model (developer, publisher, ...) survive
//! untouched. Every destructive edit goes through a numbered backup first.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use crate::error::GamelistError;

/// One catalog entry from `gamelist.xml`.
///
/// `id` comes from the `<game id="...">` attribute and is the stable key
/// used by the mark store and the translation batcher. All asset paths are
/// relative to the library root, as EmulationStation writes them.
#[derive(Debug, Clone, Default)]
pub struct GameRecord {
    pub id: String,
    pub name: String,
    pub path: Option<String>,
    pub desc: Option<String>,
    pub rating: Option<String>,
    pub releasedate: Option<String>,
    pub genre: Option<String>,
    pub players: Option<String>,
    pub system: Option<String>,
    pub image: Option<String>,
    pub video: Option<String>,
}

impl GameRecord {
    /// Release year for display: parsed from the `YYYYMMDDTHHMMSS` ES date
    /// format, falling back to the first four characters.
    pub fn release_year(&self) -> Option<&str> {
        let date = self.releasedate.as_deref()?;
        // get(..4) also rejects a multibyte char straddling the cut
        let year = date.get(..4)?;
        year.bytes().all(|b| b.is_ascii_digit()).then_some(year)
    }
}

/// Parse a gamelist file into records.
///
/// A missing file or malformed XML is fatal — the rest of the application
/// has nothing to work with without it.
pub fn parse_gamelist(path: &Path) -> Result<Vec<GameRecord>, GamelistError> {
    if !path.exists() {
        return Err(GamelistError::NotFound(path.display().to_string()));
    }
    let file = fs::File::open(path)?;
    parse_gamelist_reader(BufReader::new(file))
}

/// Parse gamelist XML from any buffered reader.
pub fn parse_gamelist_reader<R: std::io::BufRead>(
    reader: R,
) -> Result<Vec<GameRecord>, GamelistError> {
    let mut xml = Reader::from_reader(reader);
    xml.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut games: Vec<GameRecord> = Vec::new();
    let mut current: Option<GameRecord> = None;
    let mut current_tag = String::new();

    loop {
        match xml.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                let tag_name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag_name == "game" {
                    let mut record = GameRecord::default();
                    for attr in e.attributes() {
                        let attr = attr?;
                        if attr.key.as_ref() == b"id" {
                            record.id = String::from_utf8_lossy(&attr.value).to_string();
                        }
                    }
                    current = Some(record);
                } else if current.is_some() {
                    current_tag = tag_name;
                }
            }
            Event::Text(ref e) => {
                if let Some(ref mut record) = current {
                    let text = e.unescape()?.to_string();
                    set_field(record, &current_tag, text);
                }
            }
            Event::End(ref e) => {
                let tag_name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag_name == "game" {
                    if let Some(record) = current.take() {
                        games.push(record);
                    }
                } else {
                    current_tag.clear();
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(games)
}

fn set_field(record: &mut GameRecord, tag: &str, text: String) {
    match tag {
        "path" => record.path = Some(text),
        "name" => record.name = text,
        "desc" => record.desc = Some(text),
        "rating" => record.rating = Some(text),
        "releasedate" => record.releasedate = Some(text),
        "genre" => record.genre = Some(text),
        "players" => record.players = Some(text),
        "system" => record.system = Some(text),
        "image" => record.image = Some(text),
        "video" => record.video = Some(text),
        _ => {}
    }
}

/// Create a numbered backup of the gamelist: `gamelist.bak`, then
/// `gamelist.bak0`, `gamelist.bak1`, ... — the first free suffix wins.
/// Existing backups are never overwritten.
pub fn backup_gamelist(path: &Path) -> Result<PathBuf, GamelistError> {
    let stem = path.with_extension("");
    let mut n: Option<u32> = None;
    loop {
        let bak = match n {
            None => stem.with_extension("bak"),
            Some(i) => stem.with_extension(format!("bak{i}")),
        };
        if !bak.exists() {
            fs::copy(path, &bak)?;
            log::debug!("gamelist backed up to {}", bak.display());
            return Ok(bak);
        }
        n = Some(n.map_or(0, |i| i + 1));
    }
}

/// Remove exactly the `<game>` elements whose id is in `ids`.
///
/// Everything else — formatting, unmodeled tags, comments — is streamed
/// through unchanged. The rewrite goes to a temp file which is renamed over
/// the original once complete.
pub fn remove_games(path: &Path, ids: &HashSet<String>) -> Result<usize, GamelistError> {
    rewrite(path, |event, ctx| match event {
        Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"game" => {
            if game_id(e).is_some_and(|id| ids.contains(&id)) {
                ctx.removed += 1;
                Action::SkipElement
            } else {
                Action::Keep
            }
        }
        _ => Action::Keep,
    })
}

/// Replace the `<desc>` text of each game in `updates`, inserting a
/// `<desc>` element for games that have none.
///
/// Applying the same update map more than once is a no-op after the first
/// application, which is what lets the translation pipeline re-persist its
/// accumulated results every few batches.
pub fn set_descriptions(
    path: &Path,
    updates: &HashMap<String, String>,
) -> Result<usize, GamelistError> {
    rewrite(path, |event, ctx| match event {
        Event::Start(e) if e.name().as_ref() == b"game" => {
            ctx.pending_desc = game_id(e).and_then(|id| updates.get(&id).cloned());
            Action::Keep
        }
        Event::Start(e) if e.name().as_ref() == b"desc" => match ctx.pending_desc.take() {
            Some(text) => {
                ctx.updated += 1;
                Action::ReplaceText(text)
            }
            None => Action::Keep,
        },
        Event::Empty(e) if e.name().as_ref() == b"desc" => match ctx.pending_desc.take() {
            // Self-closing <desc/> — expand it into a full element
            Some(text) => {
                ctx.updated += 1;
                Action::ReplaceEmptyDesc(text)
            }
            None => Action::Keep,
        },
        Event::End(e) if e.name().as_ref() == b"game" => match ctx.pending_desc.take() {
            // Game had no <desc> element — insert one before </game>
            Some(text) => {
                ctx.updated += 1;
                Action::InsertDesc(text)
            }
            None => Action::Keep,
        },
        _ => Action::Keep,
    })
}

/// What the edit callback wants done with the current event.
enum Action {
    Keep,
    /// Drop this start event and everything up to its matching end.
    SkipElement,
    /// Keep this start event but swap the element's text content.
    ReplaceText(String),
    /// Write a `<desc>` element, then this event.
    InsertDesc(String),
    /// Write a `<desc>` element instead of this event.
    ReplaceEmptyDesc(String),
}

/// Shared state threaded through one rewrite pass.
#[derive(Default)]
struct RewriteCtx {
    removed: usize,
    updated: usize,
    pending_desc: Option<String>,
}

/// Stream the file through an event filter into a temp file, then rename it
/// over the original. Returns removed+updated count from the context.
fn rewrite<F>(path: &Path, mut edit: F) -> Result<usize, GamelistError>
where
    F: FnMut(&Event<'_>, &mut RewriteCtx) -> Action,
{
    let file = fs::File::open(path)?;
    let mut xml = Reader::from_reader(BufReader::new(file));
    // No trim: pass whitespace through so untouched parts stay byte-identical.

    let tmp_path = path.with_extension("xml.tmp");
    let tmp = fs::File::create(&tmp_path)?;
    let mut writer = Writer::new(BufWriter::new(tmp));

    let mut ctx = RewriteCtx::default();
    let mut buf = Vec::new();
    // Depth of the element currently being skipped, if any
    let mut skip_depth: usize = 0;
    // Set when swapping out an element's text content
    let mut replacing_text = false;

    loop {
        let event = xml.read_event_into(&mut buf)?;
        if matches!(event, Event::Eof) {
            break;
        }

        if skip_depth > 0 {
            match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                _ => {}
            }
            buf.clear();
            continue;
        }

        if replacing_text {
            match event {
                // Drop the original text/CDATA
                Event::Text(_) | Event::CData(_) => {
                    buf.clear();
                    continue;
                }
                _ => replacing_text = false,
            }
        }

        match edit(&event, &mut ctx) {
            Action::Keep => {
                writer.write_event(event)?;
            }
            Action::SkipElement => match event {
                Event::Start(_) => skip_depth = 1,
                // An empty <game/> has no content to skip
                Event::Empty(_) => {}
                _ => {}
            },
            Action::ReplaceText(text) => {
                writer.write_event(event)?;
                writer.write_event(Event::Text(BytesText::new(&text)))?;
                replacing_text = true;
            }
            Action::InsertDesc(text) => {
                write_desc_element(&mut writer, &text)?;
                writer.write_event(event)?;
            }
            Action::ReplaceEmptyDesc(text) => {
                write_desc_element(&mut writer, &text)?;
            }
        }
        buf.clear();
    }

    drop(writer);
    fs::rename(&tmp_path, path)?;

    Ok(ctx.removed + ctx.updated)
}

fn write_desc_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    text: &str,
) -> Result<(), GamelistError> {
    writer.write_event(Event::Start(BytesStart::new("desc")))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new("desc")))?;
    Ok(())
}

/// Pull the `id` attribute off a `<game>` start tag.
fn game_id(e: &BytesStart<'_>) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == b"id" {
            return Some(String::from_utf8_lossy(&attr.value).to_string());
        }
    }
    None
}

#[cfg(test)]
#[path = "tests/gamelist_tests.rs"]
mod tests;
