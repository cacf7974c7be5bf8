use crate::libdeck::deck::{DeckSpec, Note};
use crate::libdeck::template::{ModelJson, SORT_FIELD};
use crate::libdeck::Result;
use log::{debug, error, info, warn};
use rusqlite::{params, Connection, DatabaseName};
use serde::Serialize;
use serde_json::json;
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

const SCHEMA_VERSION: i64 = 11;
const DEFAULT_DECK_ID: i64 = 1;
const DEFAULT_CONF_ID: i64 = 1;
const FIELD_SEPARATOR: &str = "\x1f";
const GUID_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!#$%&()*+,-./:;<=>?@[]^_`{|}~";

/// Deck and note type ids written into the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageIds {
    pub deck_id: i64,
    pub model_id: i64,
}

impl PackageIds {
    pub fn random() -> PackageIds {
        use rand::Rng;
        let mut rng = rand::rng();
        PackageIds {
            deck_id: rng.random_range(1 << 30..1 << 31),
            model_id: rng.random_range(1 << 30..1 << 31),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeckJson {
    id: i64,
    name: String,
    desc: String,
    #[serde(rename = "mod")]
    modified: i64,
    usn: i64,
    collapsed: bool,
    browser_collapsed: bool,
    conf: i64,
    #[serde(rename = "dyn")]
    dynamic: u8,
    extend_new: u32,
    extend_rev: u32,
    new_today: (i64, i64),
    rev_today: (i64, i64),
    lrn_today: (i64, i64),
    time_today: (i64, i64),
}

impl DeckJson {
    fn new(id: i64, name: &str, now: i64) -> DeckJson {
        DeckJson {
            id,
            name: name.to_string(),
            desc: String::new(),
            modified: now,
            usn: -1,
            collapsed: false,
            browser_collapsed: false,
            conf: DEFAULT_CONF_ID,
            dynamic: 0,
            extend_new: 10,
            extend_rev: 50,
            new_today: (0, 0),
            rev_today: (0, 0),
            lrn_today: (0, 0),
            time_today: (0, 0),
        }
    }
}

/// Builds the collection for `deck` in memory and saves it to `dest`.
pub(crate) fn create_db(dest: &Path, deck: &DeckSpec, ids: PackageIds) -> Result<()> {
    let now = Instant::now();
    let db = Connection::open_in_memory()?;
    init_db(&db)?;
    write_collection(&db, deck, ids)?;
    match db.backup(DatabaseName::Main, dest, None) {
        Ok(_) => {
            debug!(
                "[DB] Creating and Saving took {} ms.",
                now.elapsed().as_millis()
            );
            close_db(db)
        }
        Err(err) => {
            warn!("[DB] Failed to save collection: {}", err);
            close_db(db)?;
            Err(err.into())
        }
    }
}

pub(crate) fn close_db(connection: Connection) -> Result<()> {
    debug!("[DB] Closing Database");
    match connection.close() {
        Ok(_) => Ok(()),
        Err((conn, _)) => {
            error!("[DB] Cannot close connection. Retrying...");
            conn.close().map_err(|(_, err)| err.into())
        }
    }
}

fn init_db(conn: &Connection) -> Result<()> {
    info!("[DB INIT] Creating tables");
    conn.execute_batch(
        "CREATE TABLE col (
              id INTEGER PRIMARY KEY,
              crt INTEGER NOT NULL,
              mod INTEGER NOT NULL,
              scm INTEGER NOT NULL,
              ver INTEGER NOT NULL,
              dty INTEGER NOT NULL,
              usn INTEGER NOT NULL,
              ls INTEGER NOT NULL,
              conf TEXT NOT NULL,
              models TEXT NOT NULL,
              decks TEXT NOT NULL,
              dconf TEXT NOT NULL,
              tags TEXT NOT NULL
            );
        CREATE TABLE notes (
              id INTEGER PRIMARY KEY,
              guid TEXT NOT NULL,
              mid INTEGER NOT NULL,
              mod INTEGER NOT NULL,
              usn INTEGER NOT NULL,
              tags TEXT NOT NULL,
              flds TEXT NOT NULL,
              sfld INTEGER NOT NULL,
              csum INTEGER NOT NULL,
              flags INTEGER NOT NULL,
              data TEXT NOT NULL
            );
        CREATE TABLE cards (
              id INTEGER PRIMARY KEY,
              nid INTEGER NOT NULL,
              did INTEGER NOT NULL,
              ord INTEGER NOT NULL,
              mod INTEGER NOT NULL,
              usn INTEGER NOT NULL,
              type INTEGER NOT NULL,
              queue INTEGER NOT NULL,
              due INTEGER NOT NULL,
              ivl INTEGER NOT NULL,
              factor INTEGER NOT NULL,
              reps INTEGER NOT NULL,
              lapses INTEGER NOT NULL,
              left INTEGER NOT NULL,
              odue INTEGER NOT NULL,
              odid INTEGER NOT NULL,
              flags INTEGER NOT NULL,
              data TEXT NOT NULL
            );
        CREATE TABLE revlog (
              id INTEGER PRIMARY KEY,
              cid INTEGER NOT NULL,
              usn INTEGER NOT NULL,
              ease INTEGER NOT NULL,
              ivl INTEGER NOT NULL,
              lastIvl INTEGER NOT NULL,
              factor INTEGER NOT NULL,
              time INTEGER NOT NULL,
              type INTEGER NOT NULL
            );
        CREATE TABLE graves (
              usn INTEGER NOT NULL,
              oid INTEGER NOT NULL,
              type INTEGER NOT NULL
            );",
    )?;
    info!("[DB INIT] Created tables col, notes, cards, revlog, graves");
    conn.execute_batch(
        "CREATE INDEX ix_notes_usn ON notes (usn);
        CREATE INDEX ix_cards_usn ON cards (usn);
        CREATE INDEX ix_revlog_usn ON revlog (usn);
        CREATE INDEX ix_cards_nid ON cards (nid);
        CREATE INDEX ix_cards_sched ON cards (did, queue, due);
        CREATE INDEX ix_revlog_cid ON revlog (cid);
        CREATE INDEX ix_notes_csum ON notes (csum);",
    )?;
    info!("[DB INIT] Created indexes");
    Ok(())
}

fn write_collection(conn: &Connection, deck: &DeckSpec, ids: PackageIds) -> Result<()> {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default();
    let now = now_ms / 1000;

    let models = BTreeMap::from([(
        ids.model_id.to_string(),
        ModelJson::new(ids.model_id, ids.deck_id, now),
    )]);
    let decks = BTreeMap::from([
        (
            DEFAULT_DECK_ID.to_string(),
            DeckJson::new(DEFAULT_DECK_ID, "Default", now),
        ),
        (
            ids.deck_id.to_string(),
            DeckJson::new(ids.deck_id, &deck.name, now),
        ),
    ]);

    conn.execute(
        "INSERT INTO col(id, crt, mod, scm, ver, dty, usn, ls, conf, models, decks, dconf, tags) \
        VALUES (1, ?1, ?2, ?3, ?4, 0, 0, 0, ?5, ?6, ?7, ?8, '{}')",
        params![
            now,
            now_ms,
            now_ms,
            SCHEMA_VERSION,
            collection_conf(ids).to_string(),
            serde_json::to_string(&models)?,
            serde_json::to_string(&decks)?,
            deck_conf().to_string(),
        ],
    )?;
    debug!("[DB] Wrote collection row for deck {} ({})", deck.name, ids.deck_id);

    let mut insert_note = conn.prepare(
        "INSERT INTO notes(id, guid, mid, mod, usn, tags, flds, sfld, csum, flags, data) \
        VALUES (?1, ?2, ?3, ?4, -1, '', ?5, ?6, ?7, 0, '')",
    )?;
    let mut insert_card = conn.prepare(
        "INSERT INTO cards(id, nid, did, ord, mod, usn, type, queue, due, ivl, factor, reps, \
        lapses, left, odue, odid, flags, data) \
        VALUES (?1, ?2, ?3, 0, ?4, -1, 0, 0, ?5, 0, 0, 0, 0, 0, 0, 0, 0, '')",
    )?;
    for (idx, note) in deck.notes.iter().enumerate() {
        let idx = idx as i64;
        let note_id = now_ms + idx;
        let sort_field = decode_entities(&strip_html(&note.fields[SORT_FIELD]));
        insert_note.execute(params![
            note_id,
            guid_for(note),
            ids.model_id,
            now,
            note.fields.join(FIELD_SEPARATOR),
            sort_field,
            checksum(&sort_field),
        ])?;
        insert_card.execute(params![note_id, note_id, ids.deck_id, now, idx + 1])?;
    }
    info!("[DB] Wrote {} notes", deck.notes.len());
    Ok(())
}

fn collection_conf(ids: PackageIds) -> serde_json::Value {
    json!({
        "activeDecks": [ids.deck_id],
        "curDeck": ids.deck_id,
        "curModel": ids.model_id.to_string(),
        "newSpread": 0,
        "collapseTime": 1200,
        "timeLim": 0,
        "estTimes": true,
        "dueCounts": true,
        "sortType": "noteFld",
        "sortBackwards": false,
        "addToCur": true,
        "nextPos": 1,
    })
}

fn deck_conf() -> serde_json::Value {
    json!({
        "1": {
            "id": DEFAULT_CONF_ID,
            "name": "Default",
            "mod": 0,
            "usn": 0,
            "maxTaken": 60,
            "autoplay": true,
            "timer": 0,
            "replayq": true,
            "dyn": false,
            "new": {
                "bury": true,
                "delays": [1, 10],
                "initialFactor": 2500,
                "ints": [1, 4, 7],
                "order": 1,
                "perDay": 20,
                "separate": true,
            },
            "rev": {
                "bury": true,
                "ease4": 1.3,
                "fuzz": 0.05,
                "ivlFct": 1,
                "maxIvl": 36500,
                "minSpace": 1,
                "perDay": 100,
            },
            "lapse": {
                "delays": [10],
                "leechAction": 0,
                "leechFails": 8,
                "minInt": 1,
                "mult": 0,
            },
        }
    })
}

/// Stable note id derived from the field values, so re-importing a rebuilt
/// deck updates notes instead of duplicating them.
pub(crate) fn guid_for(note: &Note) -> String {
    let digest = Sha1::digest(note.fields.join(FIELD_SEPARATOR).as_bytes());
    let mut value = u64::from_be_bytes([
        digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
    ]);
    let base = GUID_ALPHABET.len() as u64;
    let mut guid = Vec::new();
    loop {
        guid.push(char::from(GUID_ALPHABET[(value % base) as usize]));
        value /= base;
        if value == 0 {
            break;
        }
    }
    guid.iter().rev().collect()
}

/// First 8 hex digits of the SHA-1 of `text`, as Anki stores in `csum`.
fn checksum(text: &str) -> i64 {
    let digest = Sha1::digest(text.as_bytes());
    i64::from(u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]))
}

fn strip_html(text: &str) -> String {
    let mut stripped = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => stripped.push(c),
            _ => {}
        }
    }
    stripped
}

/// Undoes the escaping applied when the note was built, so `sfld` and `csum`
/// hold the text Anki compares for duplicates.
fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}
