use log::debug;

pub const OPTION_COUNT: usize = 4;

const FIELD_SEPARATOR: char = '\t';
const FRAGMENT_SEPARATOR: &str = "<br>";

/// One multiple-choice question as read from a single export line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionRecord {
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: usize,
}

impl QuestionRecord {
    /// Space separated `0`/`1` tokens, one per option, read by the card script.
    pub fn answers(&self) -> String {
        (0..self.options.len())
            .map(|i| if i == self.correct_index { "1" } else { "0" })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Parses `question<br>o1<br>o2<br>o3<br>o4\tcorrect`.
///
/// Returns `None` when the line does not have exactly one tab or carries
/// fewer than four options. When no option equals the correct answer the
/// first option is marked correct.
pub fn parse_line(line: &str) -> Option<QuestionRecord> {
    let parts: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
    let [block, correct] = parts.as_slice() else {
        debug!("[Parse] Expected 2 tab separated parts, got {}", parts.len());
        return None;
    };

    let fragments: Vec<&str> = block
        .split(FRAGMENT_SEPARATOR)
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect();
    if fragments.len() < OPTION_COUNT + 1 {
        debug!(
            "[Parse] Expected a question and {} options, got {} fragments",
            OPTION_COUNT,
            fragments.len()
        );
        return None;
    }

    let question = fragments[0].to_string();
    let options: Vec<String> = fragments[1..]
        .iter()
        .take(OPTION_COUNT)
        .map(|f| f.to_string())
        .collect();

    let correct = correct.trim();
    let correct_index = options
        .iter()
        .position(|opt| opt.trim() == correct)
        .unwrap_or_else(|| {
            debug!("[Parse] No option matches {:?}, marking option 1", correct);
            0
        });

    Some(QuestionRecord {
        question,
        options,
        correct_index,
    })
}
