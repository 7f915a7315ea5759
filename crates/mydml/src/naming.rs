//! Deterministic names for indexes, foreign keys and triggers.
//!
//! MySQL limits identifiers to [`MAX_IDENTIFIER_LENGTH`] bytes. Generated names
//! that exceed it are first abbreviated word by word using a fixed table; if
//! that is not enough, the name becomes `prefix` followed by a hex digest of
//! the full name, which is stable across runs and processes.

use sha2::{Digest, Sha256};

/// Maximum identifier length accepted by MySQL and MariaDB.
pub const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Word abbreviations applied before falling back to hashing.
static ABBREVIATIONS: &[(&str, &str)] = &[
    ("address", "addr"),
    ("admin", "adm"),
    ("aggregation", "aggr"),
    ("agreement", "agrt"),
    ("attribute", "attr"),
    ("bundle", "bndl"),
    ("calculation", "calc"),
    ("catalog", "cat"),
    ("category", "ctgr"),
    ("checkout", "chkt"),
    ("compare", "cmp"),
    ("customer", "cstr"),
    ("datetime", "dtime"),
    ("decimal", "dec"),
    ("directory", "dir"),
    ("downloadable", "dl"),
    ("element", "elm"),
    ("enterprise", "ent"),
    ("entity", "entt"),
    ("fieldset", "fset"),
    ("gallery", "glr"),
    ("index", "idx"),
    ("inventory", "inv"),
    ("label", "lbl"),
    ("layout", "lyt"),
    ("link", "lnk"),
    ("media", "mda"),
    ("minimal", "min"),
    ("newsletter", "nlttr"),
    ("notification", "ntfc"),
    ("option", "opt"),
    ("product", "prd"),
    ("query", "qr"),
    ("resource", "res"),
    ("search", "srch"),
    ("session", "sess"),
    ("shipping", "shpp"),
    ("status", "sts"),
    ("super", "spr"),
    ("title", "ttl"),
    ("user", "usr"),
    ("value", "val"),
    ("varchar", "vchr"),
    ("website", "ws"),
];

fn abbreviate_word(word: &str) -> Option<String> {
    let lower = word.to_ascii_lowercase();
    let (_, short) = ABBREVIATIONS.iter().find(|(long, _)| *long == lower)?;
    // Keep the casing style of the input word.
    if !word.is_empty() && word.chars().all(|c| !c.is_ascii_lowercase()) {
        Some(short.to_ascii_uppercase())
    } else {
        Some((*short).to_string())
    }
}

fn abbreviate(name: &str) -> String {
    name.split('_')
        .map(|word| abbreviate_word(word).unwrap_or_else(|| word.to_string()))
        .collect::<Vec<_>>()
        .join("_")
}

fn hashed(name: &str, prefix: &str, max_len: usize) -> String {
    let digest = Sha256::digest(name.as_bytes());
    let hex = hex::encode(&digest[..16]);
    // Leave at least one digest character when the prefix alone is too long.
    let mut keep = prefix.len().min(max_len.saturating_sub(1));
    while !prefix.is_char_boundary(keep) {
        keep -= 1;
    }
    let prefix = &prefix[..keep];
    let room = max_len - prefix.len();
    let hex = &hex[..room.min(hex.len())];
    format!("{prefix}{hex}")
}

/// Shorten `name` to at most `max_len` bytes.
///
/// Returns the name unchanged when it fits, otherwise the abbreviated name,
/// otherwise `prefix` plus a hex digest of the original name.
pub fn shorten(name: &str, max_len: usize, prefix: &str) -> String {
    if name.len() <= max_len {
        return name.to_string();
    }
    let short = abbreviate(name);
    if short.len() <= max_len {
        return short;
    }
    hashed(name, prefix, max_len)
}

/// Kind of index a name is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    Primary,
    Index,
    Unique,
    Fulltext,
}

impl IndexKind {
    /// Name prefix for this index kind.
    pub fn prefix(self) -> &'static str {
        match self {
            IndexKind::Primary => "PRIMARY",
            IndexKind::Index => "IDX_",
            IndexKind::Unique => "UNQ_",
            IndexKind::Fulltext => "FTI_",
        }
    }
}

/// Generate an index name for `table` over `columns`.
///
/// Primary keys are always named `PRIMARY`. Other kinds produce
/// `PREFIX_TABLE_COL1_COL2` in upper case, shortened to fit.
pub fn index_name(kind: IndexKind, table: &str, columns: &[&str]) -> String {
    if kind == IndexKind::Primary {
        return kind.prefix().to_string();
    }
    let mut body = table.to_string();
    for column in columns {
        body.push('_');
        body.push_str(column);
    }
    let full = format!("{}{}", kind.prefix(), body).to_ascii_uppercase();
    shorten(&full, MAX_IDENTIFIER_LENGTH, kind.prefix())
}

/// Generate a foreign key name from the referencing and referenced columns.
pub fn foreign_key_name(
    table: &str,
    column: &str,
    ref_table: &str,
    ref_column: &str,
) -> String {
    let full = format!("FK_{table}_{column}_{ref_table}_{ref_column}").to_ascii_uppercase();
    shorten(&full, MAX_IDENTIFIER_LENGTH, "FK_")
}

/// Generate a trigger name, e.g. `trg_sales_order_after_insert`.
pub fn trigger_name(table: &str, time: &str, event: &str) -> String {
    let full = format!("trg_{table}_{time}_{event}").to_ascii_lowercase();
    shorten(&full, MAX_IDENTIFIER_LENGTH, "trg_")
}
