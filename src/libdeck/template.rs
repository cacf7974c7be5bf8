//! The single-choice note type every generated card uses.
//!
//! The front/back templates and the stylesheet are the quiz widget shipped to
//! the reviewer. They shuffle the options and mark the selection at review
//! time, and are embedded verbatim.

use serde::Serialize;
use serde_json::Value;

pub const MODEL_NAME: &str = "AllInOne (kprim, mc, sc)";
pub const TEMPLATE_NAME: &str = "Card 1";

pub const FRONT: &str = include_str!("../../assets/front.html");
pub const BACK: &str = include_str!("../../assets/back.html");
pub const CSS: &str = include_str!("../../assets/style.css");

pub const FIELD_NAMES: [&str; FIELD_COUNT] = [
    "Title",
    "Question",
    "Q type",
    "Q_1",
    "Q_2",
    "Q_3",
    "Q_4",
    "Q_5",
    "Answers",
    "ShuffleOrder",
    "selected-option",
];
pub const FIELD_COUNT: usize = 11;

/// Index of the field the browser sorts on and the checksum is taken from.
pub const SORT_FIELD: usize = 1;

/// `Q type` value for single choice questions.
pub const SINGLE_CHOICE: &str = "2";

#[derive(Debug, Serialize)]
pub struct FieldJson {
    name: String,
    ord: usize,
    font: &'static str,
    media: Vec<String>,
    rtl: bool,
    size: u32,
    sticky: bool,
}

#[derive(Debug, Serialize)]
pub struct TemplateJson {
    name: &'static str,
    ord: usize,
    qfmt: &'static str,
    afmt: &'static str,
    bqfmt: &'static str,
    bafmt: &'static str,
    did: Option<i64>,
}

/// Note type entry as stored in the `models` column of the collection.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelJson {
    id: i64,
    name: &'static str,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(rename = "mod")]
    modified: i64,
    usn: i64,
    sortf: usize,
    did: i64,
    tmpls: Vec<TemplateJson>,
    flds: Vec<FieldJson>,
    css: &'static str,
    latex_pre: &'static str,
    latex_post: &'static str,
    tags: Vec<String>,
    vers: Vec<Value>,
    req: Vec<(usize, &'static str, Vec<usize>)>,
}

impl ModelJson {
    pub fn new(model_id: i64, deck_id: i64, now: i64) -> ModelJson {
        let flds = FIELD_NAMES
            .iter()
            .enumerate()
            .map(|(ord, name)| FieldJson {
                name: name.to_string(),
                ord,
                font: "Arial",
                media: vec![],
                rtl: false,
                size: 20,
                sticky: false,
            })
            .collect();

        ModelJson {
            id: model_id,
            name: MODEL_NAME,
            kind: 0,
            modified: now,
            usn: -1,
            sortf: SORT_FIELD,
            did: deck_id,
            tmpls: vec![TemplateJson {
                name: TEMPLATE_NAME,
                ord: 0,
                qfmt: FRONT,
                afmt: BACK,
                bqfmt: "",
                bafmt: "",
                did: None,
            }],
            flds,
            css: CSS,
            latex_pre: LATEX_PRE,
            latex_post: "\\end{document}",
            tags: vec![],
            vers: vec![],
            // The card renders whenever the question is filled in.
            req: vec![(0, "any", vec![SORT_FIELD])],
        }
    }
}

const LATEX_PRE: &str = "\\documentclass[12pt]{article}\n\\special{papersize=3in,5in}\n\\usepackage[utf8]{inputenc}\n\\usepackage{amssymb,amsmath}\n\\pagestyle{empty}\n\\setlength{\\parindent}{0in}\n\\begin{document}\n";
