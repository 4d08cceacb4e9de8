//! Instructions sent with each generation role
//!
//! Every instruction ends with the exact JSON shape the caller parses.

use triptych_common::db::ArtifactKind;

const CURATOR_PREAMBLE: &str = "You curate one day of a themed sequence of cultural \
artifacts: one musical work, one visual artwork, one literary excerpt. Propose only real, \
well-documented works. Never propose anything listed under `avoid`, and do not reuse a \
creator listed under `recent_creators` for the same artifact type.";

const MUSIC_SHAPE: &str = r#"{"title": string, "artist": string, "composer": string|null, "performer": string|null, "album": string|null, "search_hint": string}"#;
const IMAGE_SHAPE: &str = r#"{"title": string, "artist": string, "year": string|null, "search_hint": string}"#;
const TEXT_SHAPE: &str = r#"{"title": string, "author": string, "excerpt": string, "search_hint": string}"#;

/// JSON shape of a single proposal of `kind`
pub fn proposal_shape(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Music => MUSIC_SHAPE,
        ArtifactKind::Image => IMAGE_SHAPE,
        ArtifactKind::Text => TEXT_SHAPE,
    }
}

pub fn propose_triple() -> String {
    format!(
        "{} Choose three artifacts that speak to the arc's theme at its current phase, \
         informed by the listener's recent insights. Respond with JSON only: \
         {{\"music\": {}, \"image\": {}, \"text\": {}}}",
        CURATOR_PREAMBLE, MUSIC_SHAPE, IMAGE_SHAPE, TEXT_SHAPE
    )
}

pub fn propose_alternative(kind: ArtifactKind) -> String {
    format!(
        "{} A proposed {} could not be used: either no verifiable reference was found or it \
         was shown recently. Propose one different {} for the same theme. Do not repeat any \
         entry under `failed`. Respond with JSON only: {}",
        CURATOR_PREAMBLE,
        kind,
        kind,
        proposal_shape(kind)
    )
}

pub const CHECK_COHERENCE: &str = "You review one day's three artifacts (music, image, text) \
for mutual coherence. Flag an artifact only when another artifact explicitly references \
something it does not deliver (for example the text names a painting that is not the \
image). A shared abstract theme is not a problem. Respond with JSON only: \
{\"coherent\": bool, \"issues\": [{\"artifact_type\": \"music\"|\"image\"|\"text\", \
\"problem\": string, \"suggested_fix\": string}]}";

pub fn propose_replacement(kind: ArtifactKind) -> String {
    format!(
        "{} The day's {} does not fit the other two artifacts, which stay as they are. \
         Propose one replacement {} that resolves the listed problems. Respond with JSON only: {}",
        CURATOR_PREAMBLE,
        kind,
        kind,
        proposal_shape(kind)
    )
}

pub const WRITE_FRAMING: &str = "Write a short framing (two to four sentences) that \
introduces today's three artifacts together, in the voice of a thoughtful curator, \
referring to each by title. Respond with JSON only: {\"framing\": string}";
