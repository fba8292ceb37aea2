//! Autoplay query derivation and candidate selection

use jamroom_common::Track;

/// Providers with a related-tracks ("mix") query
const MIX_SOURCES: &[&str] = &["youtube", "youtubemusic"];

const MIX_PREFIX: &str = "https://www.youtube.com/watch?v=";
const MIX_LIST_MARKER: &str = "&list=RD";

/// Related-tracks query for a track, if its provider supports one
pub fn related_query(track: &Track) -> Option<String> {
    if !MIX_SOURCES.contains(&track.source.as_str()) {
        return None;
    }
    related_query_for_id(&track.identifier)
}

/// Related-tracks query for a bare YouTube identifier
pub fn related_query_for_id(identifier: &str) -> Option<String> {
    if identifier.is_empty() {
        return None;
    }
    Some(format!(
        "{}{}{}{}",
        MIX_PREFIX, identifier, MIX_LIST_MARKER, identifier
    ))
}

/// Seed identifier encoded in a related-tracks query
pub fn parse_related_query(query: &str) -> Option<&str> {
    let rest = query.strip_prefix(MIX_PREFIX)?;
    let (seed, list) = rest.split_once(MIX_LIST_MARKER)?;
    (!seed.is_empty() && list == seed).then_some(seed)
}

/// First candidate whose identifier is not excluded
pub fn pick_candidate(candidates: Vec<Track>, exclude: &[&str]) -> Option<Track> {
    candidates
        .into_iter()
        .find(|track| !exclude.contains(&track.identifier.as_str()))
}
