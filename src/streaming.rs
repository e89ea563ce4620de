//! Client for the remote music-streaming API.
//!
//! Independent of the local catalog: it logs in, pulls a playlist's track
//! list and resolves per-track stream URLs. The actual HTTP exchange is
//! delegated to an [`HttpTransport`].

use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const MAX_NETWORK_TRACKS: usize = 100;
const HTTP_ATTEMPTS: usize = 2;
const AUDIO_URL_HINTS: &[&str] = &[".mp3", ".flac", ".m4a", ".wav", ".aac"];
const MESSAGE_KEYS: &[&str] = &["msg", "message", "error", "err_msg", "errmsg"];

#[derive(Debug, Error)]
pub enum StreamingError {
    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("HTTP status: {0}")]
    Status(u16),

    #[error("invalid JSON response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Rejected(String),

    #[error("{0} is empty")]
    MissingField(&'static str),

    #[error("track index {0} out of range")]
    TrackOutOfRange(usize),

    #[error("playlist has no playable track hash")]
    NoTracks,

    #[error("no stream URL in response")]
    NoStreamUrl,

    #[error("login finished without a session cookie")]
    MissingCookie,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
    /// Raw `Set-Cookie` header values.
    pub set_cookie: Vec<String>,
}

pub trait HttpTransport {
    fn get(&mut self, url: &str, cookie: &str) -> Result<HttpResponse, StreamingError>;
}

/// Session cookies, keyed case-insensitively and kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    pairs: Vec<(String, String)>,
}

impl CookieJar {
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Insert or replace one `key=value` pair.
    pub fn upsert(&mut self, pair: &str) {
        let Some((key, value)) = pair.split_once('=') else {
            return;
        };
        let key = key.trim();
        if key.is_empty() {
            return;
        }
        self.pairs
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(key));
        self.pairs.push((key.to_string(), value.trim().to_string()));
    }

    /// Merge a `Set-Cookie` header, ignoring attributes after the first `;`.
    pub fn merge_set_cookie(&mut self, header: &str) {
        for line in header.lines() {
            let pair = line.split(';').next().unwrap_or_default().trim();
            self.upsert(pair);
        }
    }

    pub fn header(&self) -> String {
        self.pairs
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkTrack {
    pub hash: String,
    pub title: String,
    pub artist: String,
    pub album_audio_id: String,
}

pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    with_scheme.trim_end_matches('/').to_string()
}

pub struct StreamingClient<T: HttpTransport> {
    transport: T,
    base_url: String,
    pub cookies: CookieJar,
    pub tracks: Vec<NetworkTrack>,
    max_tracks: usize,
}

impl<T: HttpTransport> StreamingClient<T> {
    pub fn new(transport: T, base_url: &str) -> Self {
        Self {
            transport,
            base_url: normalize_base_url(base_url),
            cookies: CookieJar::default(),
            tracks: Vec::new(),
            max_tracks: MAX_NETWORK_TRACKS,
        }
    }

    pub fn with_max_tracks(mut self, max_tracks: usize) -> Self {
        self.max_tracks = max_tracks;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn send_captcha(&mut self, phone: &str) -> Result<String, StreamingError> {
        let phone = required(phone, "phone")?;
        let (_, message) =
            self.call(&format!("/captcha/sent?mobile={phone}"), "Captcha API rejected")?;
        Ok(message.unwrap_or_else(|| String::from("Captcha sent")))
    }

    pub fn login(&mut self, phone: &str, code: &str) -> Result<String, StreamingError> {
        let phone = required(phone, "phone")?;
        let code = required(code, "captcha code")?;
        let (_, message) = self.call(
            &format!("/login/cellphone?mobile={phone}&code={code}"),
            "Login API rejected",
        )?;
        if self.cookies.is_empty() {
            return Err(StreamingError::MissingCookie);
        }
        info!("streaming login succeeded");
        Ok(message.unwrap_or_else(|| String::from("Login OK")))
    }

    /// Replace the track list with the tracks of `playlist_id`.
    pub fn load_playlist(&mut self, playlist_id: &str) -> Result<usize, StreamingError> {
        let playlist_id = required(playlist_id, "playlist id")?;
        let (root, _) = self.call(
            &format!(
                "/playlist/track/all/new?listid={playlist_id}&page=1&pagesize={}",
                self.max_tracks
            ),
            "Playlist API rejected",
        )?;

        self.tracks.clear();
        walk_tracks(&root, &mut self.tracks, self.max_tracks);
        if self.tracks.is_empty() {
            return Err(StreamingError::NoTracks);
        }
        info!(tracks = self.tracks.len(), "playlist loaded");
        Ok(self.tracks.len())
    }

    pub fn resolve_track_url(&mut self, index: usize) -> Result<String, StreamingError> {
        let track = self
            .tracks
            .get(index)
            .ok_or(StreamingError::TrackOutOfRange(index))?;
        let hash = required(&track.hash, "track hash")?.to_string();
        let album_audio_id = track.album_audio_id.trim().to_string();

        let mut path = format!("/song/url?hash={hash}&quality=128&free_part=1");
        if !album_audio_id.is_empty() {
            path.push_str(&format!("&album_audio_id={album_audio_id}"));
        }
        let (root, message) = self.call(&path, "Resolve API rejected")?;

        let mut best = None;
        let mut fallback = None;
        collect_urls(&root, &mut best, &mut fallback);
        best.or(fallback).ok_or_else(|| match message {
            Some(message) => StreamingError::Rejected(message),
            None => StreamingError::NoStreamUrl,
        })
    }

    fn call(
        &mut self,
        path_and_query: &str,
        rejected: &str,
    ) -> Result<(Value, Option<String>), StreamingError> {
        if self.base_url.is_empty() {
            return Err(StreamingError::MissingField("API base URL"));
        }
        let url = format!("{}{path_and_query}&ts={}", self.base_url, now_millis());
        let response = self.get_with_retry(&url)?;
        for header in &response.set_cookie {
            self.cookies.merge_set_cookie(header);
        }

        let root: Value = serde_json::from_str(&response.body)?;
        let (ok, message) = api_response_status(&root);
        if !ok {
            return Err(StreamingError::Rejected(
                message.unwrap_or_else(|| rejected.to_string()),
            ));
        }
        Ok((root, message))
    }

    fn get_with_retry(&mut self, url: &str) -> Result<HttpResponse, StreamingError> {
        let cookie = self.cookies.header();
        let mut last_error = StreamingError::Transport(String::from("no attempt made"));
        for attempt in 1..=HTTP_ATTEMPTS {
            match self.transport.get(url, &cookie) {
                Ok(response) if (200..300).contains(&response.status) => return Ok(response),
                Ok(response) => last_error = StreamingError::Status(response.status),
                Err(err) => last_error = err,
            }
            debug!(attempt, error = %last_error, "streaming request failed");
        }
        warn!(error = %last_error, "streaming request gave up");
        Err(last_error)
    }
}

fn required<'a>(value: &'a str, name: &'static str) -> Result<&'a str, StreamingError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StreamingError::MissingField(name));
    }
    Ok(trimmed)
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default()
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) if number.is_i64() || number.is_u64() => Some(number.to_string()),
        _ => None,
    }
}

fn first_field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find_map(scalar_text)
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => Some(text.trim().parse().unwrap_or(0)),
        _ => None,
    }
}

/// Whether an API envelope reports success, plus its message if any.
pub fn api_response_status(root: &Value) -> (bool, Option<String>) {
    let Value::Object(object) = root else {
        return (true, None);
    };
    let message = first_field(object, MESSAGE_KEYS).filter(|message| !message.is_empty());

    if let Some(status) = object.get("status").and_then(as_integer) {
        return (status == 1 || status == 200, message);
    }
    if let Some(Value::Bool(success)) = object.get("success") {
        return (*success, message);
    }
    if let Some(code) = object.get("error_code").and_then(as_integer) {
        return (code == 0, message);
    }
    if let Some(code) = object.get("code").and_then(as_integer) {
        return (matches!(code, 0 | 1 | 200), message);
    }
    (true, message)
}

fn push_track(object: &Map<String, Value>, tracks: &mut Vec<NetworkTrack>) {
    let Some(hash) = first_field(object, &["hash", "Hash", "audio_hash", "file_hash"])
        .map(|hash| hash.trim().to_string())
        .filter(|hash| !hash.is_empty())
    else {
        return;
    };
    if tracks.iter().any(|track| track.hash == hash) {
        return;
    }

    let title = first_field(object, &["filename", "songname", "song_name", "name"])
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| hash.clone());
    tracks.push(NetworkTrack {
        title,
        artist: first_field(object, &["author_name", "singername", "artist", "singer"])
            .unwrap_or_default(),
        album_audio_id: first_field(
            object,
            &["album_audio_id", "mixsongid", "audio_id", "audioid"],
        )
        .unwrap_or_default(),
        hash,
    });
}

/// Depth-first search for objects carrying a track hash.
pub fn walk_tracks(node: &Value, tracks: &mut Vec<NetworkTrack>, max_tracks: usize) {
    if tracks.len() >= max_tracks {
        return;
    }
    match node {
        Value::Object(object) => {
            push_track(object, tracks);
            for child in object.values() {
                walk_tracks(child, tracks, max_tracks);
                if tracks.len() >= max_tracks {
                    return;
                }
            }
        }
        Value::Array(items) => {
            for child in items {
                walk_tracks(child, tracks, max_tracks);
                if tracks.len() >= max_tracks {
                    return;
                }
            }
        }
        _ => {}
    }
}

pub fn looks_like_audio_url(url: &str) -> bool {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return false;
    }
    let lower = url.to_ascii_lowercase();
    AUDIO_URL_HINTS.iter().any(|hint| lower.contains(hint))
}

/// First audio-looking URL into `best`, first http(s) URL of any kind into `fallback`.
pub fn collect_urls(node: &Value, best: &mut Option<String>, fallback: &mut Option<String>) {
    match node {
        Value::String(text) => {
            if text.starts_with("http://") || text.starts_with("https://") {
                if fallback.is_none() {
                    *fallback = Some(text.clone());
                }
                if best.is_none() && looks_like_audio_url(text) {
                    *best = Some(text.clone());
                }
            }
        }
        Value::Object(object) => {
            for child in object.values() {
                collect_urls(child, best, fallback);
                if best.is_some() {
                    return;
                }
            }
        }
        Value::Array(items) => {
            for child in items {
                collect_urls(child, best, fallback);
                if best.is_some() {
                    return;
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct ScriptedTransport {
        responses: VecDeque<Result<HttpResponse, StreamingError>>,
        requests: Vec<(String, String)>,
    }

    impl ScriptedTransport {
        fn reply(mut self, status: u16, body: Value, set_cookie: &[&str]) -> Self {
            self.responses.push_back(Ok(HttpResponse {
                status,
                body: body.to_string(),
                set_cookie: set_cookie.iter().map(|value| value.to_string()).collect(),
            }));
            self
        }
    }

    impl HttpTransport for ScriptedTransport {
        fn get(&mut self, url: &str, cookie: &str) -> Result<HttpResponse, StreamingError> {
            self.requests.push((url.to_string(), cookie.to_string()));
            self.responses
                .pop_front()
                .unwrap_or_else(|| Err(StreamingError::Transport(String::from("no script"))))
        }
    }

    #[test]
    fn base_url_gets_scheme_and_loses_trailing_slash() {
        assert_eq!(normalize_base_url(" api.local:3000// "), "http://api.local:3000");
        assert_eq!(normalize_base_url("https://x.io/"), "https://x.io");
        assert_eq!(normalize_base_url("   "), "");
    }

    #[test]
    fn cookie_jar_replaces_keys_case_insensitively() {
        let mut jar = CookieJar::default();
        jar.upsert("token=abc");
        jar.upsert("userid=7");
        jar.merge_set_cookie("TOKEN=def; Path=/; HttpOnly\ndfid=x1; Max-Age=60");
        assert_eq!(jar.header(), "userid=7; TOKEN=def; dfid=x1");

        jar.upsert("=broken");
        jar.upsert("novalue");
        assert_eq!(jar.header(), "userid=7; TOKEN=def; dfid=x1");
    }

    #[test]
    fn api_status_rules() {
        assert_eq!(api_response_status(&json!({"status": 1})), (true, None));
        assert_eq!(
            api_response_status(&json!({"status": "0", "msg": "bad"})),
            (false, Some(String::from("bad")))
        );
        assert!(!api_response_status(&json!({"success": false})).0);
        assert!(api_response_status(&json!({"error_code": 0})).0);
        assert!(api_response_status(&json!({"code": 200})).0);
        assert!(!api_response_status(&json!({"code": 500})).0);
        assert!(api_response_status(&json!([1, 2])).0);
    }

    #[test]
    fn walk_collects_unique_hashes_up_to_limit() {
        let body = json!({
            "data": {
                "songs": [
                    {"hash": "H1", "filename": "One", "author_name": "A", "album_audio_id": 42},
                    {"hash": "H1", "filename": "Dup"},
                    {"Hash": "H2"},
                    {"hash": "H3", "name": "Three"}
                ]
            }
        });
        let mut tracks = Vec::new();
        walk_tracks(&body, &mut tracks, 2);

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].title, "One");
        assert_eq!(tracks[0].artist, "A");
        assert_eq!(tracks[0].album_audio_id, "42");
        assert_eq!(tracks[1].title, "H2");
    }

    #[test]
    fn collect_urls_prefers_audio_links() {
        let body = json!({"data": {"cover": "https://img/c.jpg", "play": ["https://cdn/a.MP3"]}});
        let mut best = None;
        let mut fallback = None;
        collect_urls(&body, &mut best, &mut fallback);
        assert_eq!(best.as_deref(), Some("https://cdn/a.MP3"));
        assert_eq!(fallback.as_deref(), Some("https://img/c.jpg"));
    }

    #[test]
    fn tracks_keep_document_order() {
        let body: Value =
            serde_json::from_str(r#"{"data":{"zlist":[{"hash":"Z"}],"alist":[{"hash":"A"}]}}"#)
                .expect("json");
        let mut tracks = Vec::new();
        walk_tracks(&body, &mut tracks, MAX_NETWORK_TRACKS);

        let hashes: Vec<_> = tracks.iter().map(|track| track.hash.as_str()).collect();
        assert_eq!(hashes, ["Z", "A"]);
    }

    #[test]
    fn fallback_url_is_first_in_document_order() {
        let body: Value =
            serde_json::from_str(r#"{"url":"https://cdn/main","backup":"https://cdn/backup"}"#)
                .expect("json");
        let mut best = None;
        let mut fallback = None;
        collect_urls(&body, &mut best, &mut fallback);

        assert_eq!(best, None);
        assert_eq!(fallback.as_deref(), Some("https://cdn/main"));
    }

    #[test]
    fn login_stores_cookies_and_sends_them_back() {
        let transport = ScriptedTransport::default()
            .reply(200, json!({"status": 1}), &["token=t1; Path=/"])
            .reply(
                200,
                json!({"status": 1, "data": {"info": [{"hash": "H1", "filename": "One"}]}}),
                &[],
            );
        let mut client = StreamingClient::new(transport, "api.local");

        client.login("13800000000", "1234").expect("login");
        assert_eq!(client.load_playlist("pl-1").expect("playlist"), 1);

        let requests = &client.transport.requests;
        assert!(requests[0].0.starts_with("http://api.local/login/cellphone?mobile=13800000000&code=1234&ts="));
        assert_eq!(requests[1].1, "token=t1");
        assert!(requests[1].0.contains("listid=pl-1&page=1&pagesize=100"));
    }

    #[test]
    fn login_without_cookie_fails() {
        let transport = ScriptedTransport::default().reply(200, json!({"status": 1}), &[]);
        let mut client = StreamingClient::new(transport, "api.local");
        assert!(matches!(
            client.login("1", "2"),
            Err(StreamingError::MissingCookie)
        ));
    }

    #[test]
    fn request_is_retried_once() {
        let transport = ScriptedTransport::default()
            .reply(502, json!({}), &[])
            .reply(200, json!({"status": 1, "msg": "sent"}), &[]);
        let mut client = StreamingClient::new(transport, "api.local");

        assert_eq!(client.send_captcha(" 138 ").expect("captcha"), "sent");
        assert_eq!(client.transport.requests.len(), 2);
    }

    #[test]
    fn rejection_message_is_surfaced() {
        let transport = ScriptedTransport::default()
            .reply(200, json!({"status": 0, "msg": "captcha expired"}), &[]);
        let mut client = StreamingClient::new(transport, "api.local");
        let err = client.login("1", "2").expect_err("rejected");
        assert_eq!(err.to_string(), "captcha expired");
    }

    #[test]
    fn resolve_track_url_adds_album_id() {
        let transport = ScriptedTransport::default().reply(
            200,
            json!({"status": 1, "url": ["https://cdn/x.flac"]}),
            &[],
        );
        let mut client = StreamingClient::new(transport, "https://api.local/");
        client.tracks.push(NetworkTrack {
            hash: String::from("H9"),
            title: String::from("Nine"),
            artist: String::new(),
            album_audio_id: String::from("77"),
        });

        assert_eq!(client.resolve_track_url(0).expect("url"), "https://cdn/x.flac");
        assert!(client.transport.requests[0].0.contains("hash=H9&quality=128&free_part=1&album_audio_id=77"));
        assert!(matches!(
            client.resolve_track_url(3),
            Err(StreamingError::TrackOutOfRange(3))
        ));
    }

    #[test]
    fn missing_base_url_is_reported() {
        let mut client = StreamingClient::new(ScriptedTransport::default(), "");
        assert!(matches!(
            client.send_captcha("1"),
            Err(StreamingError::MissingField("API base URL"))
        ));
    }
}
