//! Result rendering for the table, JSON and CSV formats

use comfy_table::{ContentArrangement, Table};
use followscout::{Candidate, Recommendations, ReferenceUsers};
use followscout_sdk::UserRef;

/// Longest bio shown in the table, in characters
pub const BIO_WIDTH: usize = 30;

const HEADER: [&str; 8] = [
    "login", "url", "bio", "location", "followers", "following", "repos", "shared",
];

#[derive(Clone, clap::ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

/// Cut `text` to at most `width` characters, never inside a character
pub fn truncate_chars(text: &str, width: usize) -> &str {
    match text.char_indices().nth(width) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn user_cells(user: &UserRef) -> Vec<String> {
    vec![
        user.login.clone(),
        user.html_url.clone(),
        truncate_chars(user.bio.as_deref().unwrap_or_default().trim(), BIO_WIDTH).to_string(),
        user.location.clone().unwrap_or_default(),
        user.followers.to_string(),
        user.following.to_string(),
        user.public_repos.to_string(),
    ]
}

pub fn reference_table(refs: &ReferenceUsers) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(&HEADER[..7]);
    table.add_row(user_cells(&refs.viewer));
    if !refs.is_same_identity() {
        table.add_row(user_cells(&refs.entry));
    }
    table
}

pub fn candidate_table(candidates: &[Candidate]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(HEADER);
    for candidate in candidates {
        let mut cells = user_cells(&candidate.user);
        cells.push(candidate.shared.to_string());
        table.add_row(cells);
    }
    table
}

/// Full JSON document: reference users, candidates, dropped lookups, stats
pub fn recommendations_json(refs: &ReferenceUsers, recs: &Recommendations) -> serde_json::Value {
    serde_json::json!({
        "viewer": refs.viewer,
        "entry": refs.entry,
        "candidates": recs.candidates,
        "failures": recs.failures,
        "stats": recs.stats,
    })
}

pub fn format_csv_value(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Header line followed by one line per candidate; bios are not truncated
pub fn candidate_csv(candidates: &[Candidate]) -> String {
    let mut out = HEADER.join(",");
    out.push('\n');
    for candidate in candidates {
        let user = &candidate.user;
        let cells = [
            user.login.clone(),
            user.html_url.clone(),
            user.bio.clone().unwrap_or_default(),
            user.location.clone().unwrap_or_default(),
            user.followers.to_string(),
            user.following.to_string(),
            user.public_repos.to_string(),
            candidate.shared.to_string(),
        ];
        let cells: Vec<String> = cells.iter().map(|c| format_csv_value(c)).collect();
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    out
}
