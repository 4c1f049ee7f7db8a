use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use ytsub::{DownloadError, DownloaderConfig, SubtitleDownloader, DEFAULT_LANGUAGE_KEY};

const VIDEO_URL: &str = "http://youtu.be/5MgBikgcWnY";

const LANGUAGE_LIST: &str = r#"<?xml version="1.0" encoding="utf-8" ?>
<transcript_list docid="-5529196470566186617">
<track id="0" name="" lang_code="de" lang_original="Deutsch" lang_translated="German"/>
<track id="1" name="" lang_code="en" lang_original="English" lang_translated="English" lang_default="true"/>
<track id="2" name="" lang_code="ja" lang_original="日本語" lang_translated="Japanese"/>
</transcript_list>"#;

const TRANSCRIPT: &str = r#"<?xml version="1.0" encoding="utf-8" ?>
<transcript>
<text start="0.5" dur="1">first</text>
<text start="1.5" dur="2.0">it&amp;#39;s</text>
<text start="3.5" dur="1.25">third</text>
</transcript>"#;

/// Minimal HTTP/1.1 responder for the timedtext endpoint.
///
/// Answers `type=list` requests with `list_body` and every other request
/// with `track_body`, and records the request targets it sees.
struct TimedTextServer {
    endpoint: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl TimedTextServer {
    fn start(list_body: &'static str, track_body: &'static str) -> Self {
        Self::start_with_status(list_body, track_body, "200 OK")
    }

    fn start_with_status(
        list_body: &'static str,
        track_body: &'static str,
        track_status: &'static str,
    ) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let mut stream = match stream {
                    Ok(stream) => stream,
                    Err(_) => break,
                };

                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut request_line = String::new();
                if reader.read_line(&mut request_line).is_err() {
                    continue;
                }
                loop {
                    let mut header = String::new();
                    match reader.read_line(&mut header) {
                        Ok(0) => break,
                        Ok(_) if header == "\r\n" => break,
                        Ok(_) => {}
                        Err(_) => break,
                    }
                }

                let target = request_line
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or_default()
                    .to_string();
                let (status, body) = if target.contains("type=list") {
                    ("200 OK", list_body)
                } else {
                    (track_status, track_body)
                };
                seen.lock().unwrap().push(target);

                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: text/xml; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes());
                let _ = stream.flush();
            }
        });

        Self { endpoint, requests }
    }

    fn config(&self) -> DownloaderConfig {
        DownloaderConfig::default()
            .with_endpoint(self.endpoint.as_str())
            .with_timeout(Duration::from_secs(10))
            .with_system_proxy(false)
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[test]
fn test_construction_fetches_language_list() {
    let server = TimedTextServer::start(LANGUAGE_LIST, TRANSCRIPT);

    let downloader = SubtitleDownloader::with_config(VIDEO_URL, server.config()).unwrap();

    assert_eq!(downloader.url(), VIDEO_URL);
    assert_eq!(downloader.video_id(), "5MgBikgcWnY");
    assert_eq!(downloader.languages().len(), 4);
    assert_eq!(downloader.languages()["Deutsch"], "de");
    assert_eq!(downloader.languages()["日本語"], "ja");
    assert_eq!(downloader.languages()[DEFAULT_LANGUAGE_KEY], "en");
    assert_eq!(downloader.default_language(), Some("en"));

    assert_eq!(
        server.requests(),
        vec!["/api/timedtext?v=5MgBikgcWnY&type=list".to_string()]
    );
}

#[test]
fn test_download_default_track() {
    let server = TimedTextServer::start(LANGUAGE_LIST, TRANSCRIPT);
    let downloader = SubtitleDownloader::with_config(VIDEO_URL, server.config()).unwrap();

    let subtitle = downloader.download().unwrap();

    assert_eq!(subtitle.len(), 3);
    let indices: Vec<usize> = subtitle.iter().map(|line| line.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);

    let line = &subtitle.lines()[1];
    assert_eq!(line.start, Duration::from_millis(1500));
    assert_eq!(line.end, Duration::from_millis(3500));
    assert_eq!(line.text, "it's");

    assert_eq!(
        server.requests().last().map(String::as_str),
        Some("/api/timedtext?v=5MgBikgcWnY&lang=en")
    );
}

#[test]
fn test_download_is_not_cached() {
    let server = TimedTextServer::start(LANGUAGE_LIST, TRANSCRIPT);
    let downloader = SubtitleDownloader::with_config(VIDEO_URL, server.config()).unwrap();

    let first = downloader.download().unwrap();
    let second = downloader.download().unwrap();

    assert_eq!(first, second);
    assert_eq!(server.requests().len(), 3);
}

#[test]
fn test_download_without_default_requests_empty_language() {
    let list = r#"<transcript_list>
<track lang_code="fr" lang_original="Français"/>
</transcript_list>"#;
    let server = TimedTextServer::start(list, "<transcript></transcript>");
    let downloader = SubtitleDownloader::with_config(VIDEO_URL, server.config()).unwrap();

    assert_eq!(downloader.default_language(), None);

    let subtitle = downloader.download().unwrap();
    assert!(subtitle.is_empty());
    assert_eq!(
        server.requests().last().map(String::as_str),
        Some("/api/timedtext?v=5MgBikgcWnY&lang=")
    );
}

#[test]
fn test_download_malformed_timing_yields_no_subtitle() {
    let track = r#"<transcript>
<text start="0" dur="1">ok</text>
<text start="1" dur="soon">bad</text>
</transcript>"#;
    let server = TimedTextServer::start(LANGUAGE_LIST, track);
    let downloader = SubtitleDownloader::with_config(VIDEO_URL, server.config()).unwrap();

    match downloader.download() {
        Err(DownloadError::MalformedTiming { attribute, value }) => {
            assert_eq!(attribute, "dur");
            assert_eq!(value, "soon");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_construction_fails_on_malformed_language_list() {
    let server = TimedTextServer::start("<html><body>nope</body></html>", TRANSCRIPT);

    let result = SubtitleDownloader::with_config(VIDEO_URL, server.config());
    assert!(matches!(result, Err(DownloadError::MalformedResponse(_))));
}

#[test]
fn test_download_http_error_status() {
    let server = TimedTextServer::start_with_status(LANGUAGE_LIST, "", "404 Not Found");
    let downloader = SubtitleDownloader::with_config(VIDEO_URL, server.config()).unwrap();

    match downloader.download() {
        Err(DownloadError::HttpStatus { status, .. }) => assert_eq!(status, 404),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_construction_network_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let config = DownloaderConfig::default()
        .with_endpoint(endpoint)
        .with_timeout(Duration::from_secs(5))
        .with_system_proxy(false);

    let result = SubtitleDownloader::with_config(VIDEO_URL, config);
    assert!(matches!(result, Err(DownloadError::NetworkFailure(_))));
}

#[test]
fn test_construction_rejects_bad_url_before_network() {
    let server = TimedTextServer::start(LANGUAGE_LIST, TRANSCRIPT);

    let result =
        SubtitleDownloader::with_config("www.youtube.com/watch?v=5MgBikgcWnY", server.config());
    assert!(matches!(result, Err(DownloadError::InvalidUrl(_))));
    assert!(server.requests().is_empty());
}
