use std::sync::Mutex;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::types::TrackMetadata;

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const SEARCH_URL: &str = "https://api.spotify.com/v1/search";
const SEARCH_LIMIT: &str = "10";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("spotify request failed: {0}")]
    Http(Box<ureq::Error>),
    #[error("spotify response is malformed: {0}")]
    Malformed(#[from] std::io::Error),
}

impl From<ureq::Error> for MetadataError {
    fn from(error: ureq::Error) -> Self {
        MetadataError::Http(Box::new(error))
    }
}

pub trait MetadataSource: Send + Sync {
    /// Look up canonical tags for a parsed (artist, title) pair.
    /// `Ok(None)` means the provider had no match.
    fn search(&self, artist: &str, title: &str) -> Result<Option<TrackMetadata>, MetadataError>;
}

/// Used when no provider credentials are configured; every entry then gets
/// tagged from its parsed identity alone.
pub struct NoMetadataSource;

impl MetadataSource for NoMetadataSource {
    fn search(&self, _artist: &str, _title: &str) -> Result<Option<TrackMetadata>, MetadataError> {
        Ok(None)
    }
}

/// Spotify Web API client using the client-credentials flow. The token is
/// fetched on first use and reused for the rest of the run.
pub struct SpotifyClient {
    agent: ureq::Agent,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<String>>,
}

impl SpotifyClient {
    pub fn new(client_id: String, client_secret: String, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();

        SpotifyClient {
            agent,
            client_id,
            client_secret,
            token: Mutex::new(None),
        }
    }

    fn token(&self) -> Result<String, MetadataError> {
        let mut cached = self
            .token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let response: TokenResponse = self
            .agent
            .post(TOKEN_URL)
            .send_form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])?
            .into_json()?;

        *cached = Some(response.access_token.clone());

        Ok(response.access_token)
    }
}

impl MetadataSource for SpotifyClient {
    fn search(&self, artist: &str, title: &str) -> Result<Option<TrackMetadata>, MetadataError> {
        let token = self.token()?;
        let query = format!("track:{title} artist:{artist}");

        let response: SearchResponse = self
            .agent
            .get(SEARCH_URL)
            .set("Authorization", &format!("Bearer {token}"))
            .query("type", "track")
            .query("limit", SEARCH_LIMIT)
            .query("q", &query)
            .call()?
            .into_json()?;

        Ok(best_match(response.tracks.items, artist).map(|track| to_metadata(track, artist)))
    }
}

/// Pick the candidate whose primary artist is closest to the parsed artist,
/// by Levenshtein similarity over lowercased names.
fn best_match(candidates: Vec<SpotifyTrack>, artist: &str) -> Option<SpotifyTrack> {
    let wanted = artist.trim().to_lowercase();
    let mut best: Option<(f64, SpotifyTrack)> = None;

    for candidate in candidates {
        let score = candidate
            .artists
            .first()
            .map(|a| levenshtein_percent(&a.name.to_lowercase(), &wanted))
            .unwrap_or(0.0);

        if best.as_ref().map_or(true, |(top, _)| score > *top) {
            best = Some((score, candidate));
        }
    }

    best.map(|(_, track)| track)
}

fn to_metadata(track: SpotifyTrack, fallback_artist: &str) -> TrackMetadata {
    let year = track
        .album
        .release_date
        .as_deref()
        .and_then(|date| date.get(..4))
        .and_then(|year| year.parse().ok());

    TrackMetadata {
        title: track.name,
        artist: track
            .artists
            .into_iter()
            .next()
            .map(|a| a.name)
            .unwrap_or_else(|| fallback_artist.to_string()),
        album: Some(track.album.name),
        year,
        cover_url: track.album.images.into_iter().next().map(|i| i.url),
    }
}

/// Levenshtein distance expressed as a similarity percentage, 100 meaning
/// the strings are equal. Two-row dynamic programming.
fn levenshtein_percent(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() && b.is_empty() {
        return 100.0;
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, char_a) in a.iter().enumerate() {
        current[0] = i + 1;

        for (j, char_b) in b.iter().enumerate() {
            let cost = usize::from(char_a != char_b);

            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }

        std::mem::swap(&mut previous, &mut current);
    }

    let distance = previous[b.len()];
    let longest = a.len().max(b.len());

    (1.0 - distance as f64 / longest as f64) * 100.0
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    tracks: TrackPage,
}

#[derive(Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Vec<SpotifyTrack>,
}

#[derive(Deserialize)]
struct SpotifyTrack {
    name: String,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
    album: SpotifyAlbum,
}

#[derive(Deserialize)]
struct SpotifyArtist {
    name: String,
}

#[derive(Deserialize)]
struct SpotifyAlbum {
    name: String,
    release_date: Option<String>,
    #[serde(default)]
    images: Vec<SpotifyImage>,
}

#[derive(Deserialize)]
struct SpotifyImage {
    url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_scores_equal_strings_at_one_hundred() {
        assert_eq!(levenshtein_percent("sum 41", "sum 41"), 100.0);
        assert_eq!(levenshtein_percent("", ""), 100.0);
    }

    #[test]
    fn it_scores_disjoint_strings_at_zero() {
        assert_eq!(levenshtein_percent("abc", "xyz"), 0.0);
        assert_eq!(levenshtein_percent("", "abc"), 0.0);
    }

    #[test]
    fn it_scores_partial_overlap_proportionally() {
        // kitten -> sitting is the classic distance of 3 over length 7
        let score = levenshtein_percent("kitten", "sitting");

        assert!((score - (1.0 - 3.0 / 7.0) * 100.0).abs() < 1e-9);
    }

    fn search_response(json: &str) -> SearchResponse {
        serde_json::from_str(json).unwrap()
    }

    const TWO_CANDIDATES: &str = r#"{
        "tracks": {
            "items": [
                {
                    "name": "In Too Deep",
                    "artists": [{ "name": "Some Cover Band" }],
                    "album": {
                        "name": "Covers Vol. 3",
                        "release_date": "2019-01-01",
                        "release_date_precision": "day",
                        "images": [{ "url": "https://i.scdn.co/image/cover" }]
                    }
                },
                {
                    "name": "In Too Deep",
                    "artists": [{ "name": "Sum 41" }],
                    "album": {
                        "name": "All Killer No Filler",
                        "release_date": "2001-05-08",
                        "release_date_precision": "day",
                        "images": [{ "url": "https://i.scdn.co/image/killer" }]
                    }
                }
            ]
        }
    }"#;

    #[test]
    fn it_picks_the_candidate_with_the_closest_artist() {
        let response = search_response(TWO_CANDIDATES);

        let best = best_match(response.tracks.items, "Sum 41").unwrap();

        assert_eq!(best.artists[0].name, "Sum 41");
        assert_eq!(best.album.name, "All Killer No Filler");
    }

    #[test]
    fn it_finds_nothing_in_an_empty_result_page() {
        assert!(best_match(vec![], "Sum 41").is_none());
    }

    #[test]
    fn it_maps_a_candidate_to_track_metadata() {
        let response = search_response(TWO_CANDIDATES);
        let best = best_match(response.tracks.items, "Sum 41").unwrap();

        let metadata = to_metadata(best, "Sum 41");

        assert_eq!(metadata.title, "In Too Deep");
        assert_eq!(metadata.artist, "Sum 41");
        assert_eq!(metadata.album.as_deref(), Some("All Killer No Filler"));
        assert_eq!(metadata.year, Some(2001));
        assert_eq!(
            metadata.cover_url.as_deref(),
            Some("https://i.scdn.co/image/killer")
        );
    }

    #[test]
    fn it_tolerates_missing_release_date_and_images() {
        let response = search_response(
            r#"{
                "tracks": {
                    "items": [{
                        "name": "Obscure",
                        "artists": [{ "name": "Nobody" }],
                        "album": { "name": "Bootleg" }
                    }]
                }
            }"#,
        );

        let metadata = to_metadata(best_match(response.tracks.items, "Nobody").unwrap(), "Nobody");

        assert_eq!(metadata.year, None);
        assert_eq!(metadata.cover_url, None);
    }

    #[test]
    fn it_answers_not_found_without_credentials() {
        let result = NoMetadataSource.search("Sum 41", "In Too Deep").unwrap();

        assert!(result.is_none());
    }
}
