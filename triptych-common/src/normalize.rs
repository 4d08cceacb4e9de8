//! Identity normalization
//!
//! Every identity comparison (exposure deduplication, catalog artist matching)
//! goes through [`normalize`] so that cosmetic differences in punctuation,
//! case, and spacing never produce two identities for one artifact.
//!
//! "T.S. Eliot" and "T. S. Eliot" both normalize to "ts eliot".

/// Normalize a title or creator name for identity comparison
///
/// Lowercases, strips periods, collapses runs of whitespace to a single
/// space, and trims. Consecutive single-letter tokens (spaced initials) are
/// joined, so "t s eliot" becomes "ts eliot". Idempotent.
pub fn normalize(value: &str) -> String {
    let lowered = value.to_lowercase().replace('.', "");

    let mut tokens: Vec<String> = Vec::new();
    let mut previous_was_initial = false;
    for token in lowered.split_whitespace() {
        let is_initial = is_single_letter(token);
        match tokens.last_mut() {
            Some(last) if is_initial && previous_was_initial => last.push_str(token),
            _ => tokens.push(token.to_string()),
        }
        previous_was_initial = is_initial;
    }

    tokens.join(" ")
}

fn is_single_letter(token: &str) -> bool {
    let mut chars = token.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_alphabetic())
}

/// Canonical identifier for music and image artifacts: `title - creator`
pub fn canonical_identifier(title: &str, creator: &str) -> String {
    format!("{} - {}", normalize(title), normalize(creator))
}

/// Canonical identifier for a creator on its own (text author checks)
pub fn canonical_creator(creator: &str) -> String {
    normalize(creator)
}
