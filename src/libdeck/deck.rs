use crate::libdeck::question::{parse_line, QuestionRecord, OPTION_COUNT};
use crate::libdeck::template::{FIELD_COUNT, SINGLE_CHOICE};
use crate::libdeck::{Error, Result};
use log::{debug, info};
use std::path::Path;

pub const DEFAULT_DECK_NAME: &str = "Multiple Choice Questions";

const COMMENT_PREFIX: char = '#';
/// `\r\n`, bare `\r` and `\n` all end a line. The empty piece between `\r`
/// and `\n` is dropped as a blank line.
const LINE_BREAKS: [char; 2] = ['\r', '\n'];

/// Field values of one card, in note type order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub fields: [String; FIELD_COUNT],
}

impl Note {
    pub fn from_record(record: &QuestionRecord) -> Note {
        let mut options = record
            .options
            .iter()
            .map(|o| escape_html(o))
            .chain(std::iter::repeat(String::new()))
            .take(OPTION_COUNT);
        let mut next_option = || options.next().unwrap_or_default();

        Note {
            fields: [
                String::new(),
                escape_html(&record.question),
                SINGLE_CHOICE.to_string(),
                next_option(),
                next_option(),
                next_option(),
                next_option(),
                String::new(),
                record.answers(),
                String::new(),
                String::new(),
            ],
        }
    }

    pub fn question(&self) -> &str {
        &self.fields[1]
    }
    pub fn options(&self) -> &[String] {
        &self.fields[3..3 + OPTION_COUNT]
    }
    pub fn answers(&self) -> &str {
        &self.fields[8]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckSpec {
    pub name: String,
    pub notes: Vec<Note>,
}

impl DeckSpec {
    pub fn new(name: &str) -> DeckSpec {
        DeckSpec {
            name: name.to_string(),
            notes: Vec::new(),
        }
    }

    pub fn add(&mut self, record: &QuestionRecord) {
        let note = Note::from_record(record);
        debug!(
            "[Deck] Added {:?} {:?} ({})",
            note.question(),
            note.options(),
            note.answers()
        );
        self.notes.push(note);
    }
}

/// Runs every line through the parser and collects the ones that parse.
///
/// Lines starting with `#` are comments wherever they appear. Blank and
/// malformed lines are skipped without being reported.
pub fn build<I, S>(lines: I, deck_name: &str) -> DeckSpec
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut deck = DeckSpec::new(deck_name);
    for line in lines {
        let line = line.as_ref();
        if line.starts_with(COMMENT_PREFIX) {
            continue;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_line(line) {
            Some(record) => deck.add(&record),
            None => debug!("[Deck] Skipping line {:?}", line),
        }
    }
    deck
}

pub fn convert_file(path: &Path, deck_name: &str) -> Result<DeckSpec> {
    let content = std::fs::read_to_string(path).map_err(|source| Error::ReadInput {
        path: path.to_path_buf(),
        source,
    })?;
    let deck = build(content.split(LINE_BREAKS), deck_name);
    info!("[Deck] Read {} questions from {:?}", deck.notes.len(), path);
    Ok(deck)
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::io::Write;

    const FRANCE: &str = "Capital of France?<br>Paris<br>London<br>Berlin<br>Madrid\tParis";
    const MATH: &str = "2 + 2?<br>3<br>5<br>4<br>22\t4";

    #[test]
    fn builds_notes_in_field_order() {
        let deck = build([FRANCE], "Geo");
        assert_eq!(deck.name, "Geo");
        assert_eq!(deck.notes.len(), 1);
        assert_eq!(
            deck.notes[0].fields,
            [
                "",
                "Capital of France?",
                "2",
                "Paris",
                "London",
                "Berlin",
                "Madrid",
                "",
                "1 0 0 0",
                "",
                ""
            ]
            .map(String::from)
        );
    }

    #[test]
    fn skips_comments_anywhere() {
        let lines = [
            "#separator:tab",
            FRANCE,
            "# Capital of Spain?<br>Madrid<br>a<br>b<br>c\tMadrid",
            MATH,
            "#html:true",
        ];
        let deck = build(lines, DEFAULT_DECK_NAME);
        let questions: Vec<&str> = deck.notes.iter().map(Note::question).collect();
        assert_eq!(questions, vec!["Capital of France?", "2 + 2?"]);
    }

    #[test]
    fn indented_hash_is_not_a_comment() {
        let deck = build(["  #1?<br>a<br>b<br>c<br>d\tb"], DEFAULT_DECK_NAME);
        assert_eq!(deck.notes[0].question(), "#1?");
    }

    #[test]
    fn skips_blank_and_malformed_lines() {
        let lines = ["", "   ", "no tab here", "Q?<br>a<br>b\ta", MATH, "\r"];
        let deck = build(lines, DEFAULT_DECK_NAME);
        assert_eq!(deck.notes.len(), 1);
        assert_eq!(deck.notes[0].answers(), "0 0 1 0");
    }

    #[test]
    fn escapes_markup_in_question_and_options() {
        let deck = build(
            ["Is <b> bold?<br><script>alert(1)</script><br>a & b<br>\"q\"<br>it's\ta & b"],
            DEFAULT_DECK_NAME,
        );
        let note = &deck.notes[0];
        assert_eq!(note.question(), "Is &lt;b&gt; bold?");
        assert_eq!(
            note.options(),
            [
                "&lt;script&gt;alert(1)&lt;/script&gt;",
                "a &amp; b",
                "&quot;q&quot;",
                "it&#x27;s"
            ]
        );
        // The answer is matched before escaping.
        assert_eq!(note.answers(), "0 1 0 0");
    }

    #[test]
    fn pads_short_option_lists() {
        let record = QuestionRecord {
            question: "Q?".to_string(),
            options: vec!["yes".to_string(), "no".to_string()],
            correct_index: 1,
        };
        let note = Note::from_record(&record);
        assert_eq!(note.options(), ["yes", "no", "", ""]);
        assert_eq!(note.answers(), "0 1");
        assert_eq!(note.fields[7], "");
    }

    #[test]
    fn building_twice_gives_the_same_notes() {
        let lines = [FRANCE, "# comment", MATH, "bad"];
        assert_eq!(build(lines, "Same"), build(lines, "Same"));
    }

    #[test]
    fn converts_a_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "#separator:tab\r\n{FRANCE}\r\n\r\n{MATH}\n#tail").unwrap();

        let deck = convert_file(file.path(), "From file").unwrap();
        assert_eq!(deck.notes.len(), 2);
        assert_eq!(deck.notes[0].answers(), "1 0 0 0");
        assert_eq!(deck.notes[1].options(), ["3", "5", "4", "22"]);
    }

    #[test]
    fn converts_a_file_with_carriage_return_line_endings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "#separator:tab\r{FRANCE}\r{MATH}\r").unwrap();

        let deck = convert_file(file.path(), "Classic Mac").unwrap();
        assert_eq!(deck.notes.len(), 2);
        assert_eq!(deck.notes[1].answers(), "0 0 1 0");
    }

    #[test]
    fn missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.txt");
        match convert_file(&missing, DEFAULT_DECK_NAME) {
            Err(Error::ReadInput { path, .. }) => assert_eq!(path, missing),
            other => panic!("expected ReadInput, got {:?}", other),
        }
    }

    proptest! {
        #[test]
        fn escaped_text_has_no_raw_markup(text in ".*") {
            let escaped = escape_html(&text);
            prop_assert!(!escaped.contains(['<', '>', '"', '\'']));
            for (at, _) in escaped.match_indices('&') {
                let rest = &escaped[at..];
                prop_assert!(
                    ["&amp;", "&lt;", "&gt;", "&quot;", "&#x27;"]
                        .iter()
                        .any(|entity| rest.starts_with(entity)),
                    "bare ampersand in {:?}", escaped
                );
            }
        }

        #[test]
        fn comment_lines_never_produce_notes(
            bodies in prop::collection::vec("[^\r\n]{0,40}", 0..8),
        ) {
            let lines: Vec<String> = bodies.iter().map(|b| format!("#{b}")).collect();
            prop_assert!(build(&lines, DEFAULT_DECK_NAME).notes.is_empty());
        }

        #[test]
        fn every_note_has_four_options_and_four_answer_tokens(
            question in "[a-zA-Z0-9?]{1,12}",
            options in prop::collection::vec("[a-zA-Z0-9<&\"']{1,8}", 4..8),
            pick in 0usize..4,
        ) {
            let line = format!("{question}<br>{}\t{}", options.join("<br>"), options[pick]);
            let deck = build([line.as_str()], DEFAULT_DECK_NAME);
            prop_assert_eq!(deck.notes.len(), 1);
            let note = &deck.notes[0];
            prop_assert_eq!(note.options().len(), OPTION_COUNT);
            prop_assert_eq!(note.answers().split(' ').count(), OPTION_COUNT);
            prop_assert_eq!(note.answers().matches('1').count(), 1);
        }
    }
}
