use crate::error::Result;
use crate::filter::{self, classify};
use crate::folders;
use crate::history::{HistoryKind, HistoryStore};
use crate::indexer::{MediaIndexer, Scan};
use crate::model::{FolderSummary, KindFilter, MediaKind, MediaRecord};
use crate::stream;
use crate::worker::Pending;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

/// What a browsing caller owns between scans: the last fetched batches and
/// the active filter and search. Folder lists and counts are computed on
/// demand from these and never stored.
#[derive(Debug)]
pub struct BrowseSession {
    indexer: MediaIndexer,
    histories: Arc<HistoryStore>,
    videos: Vec<MediaRecord>,
    audio: Vec<MediaRecord>,
    records: Vec<MediaRecord>,
    filter: KindFilter,
    query: Option<String>,
    last_error: Option<String>,
}

impl BrowseSession {
    pub fn new(indexer: MediaIndexer, histories: Arc<HistoryStore>, filter: KindFilter) -> Self {
        Self {
            indexer,
            histories,
            videos: Vec::new(),
            audio: Vec::new(),
            records: Vec::new(),
            filter,
            query: None,
            last_error: None,
        }
    }

    /// Starts a fresh fetch of one catalog on a worker thread.
    pub fn refresh(&self, kind: MediaKind) -> Pending<Scan> {
        let indexer = self.indexer.clone();
        Pending::spawn("index", move |_| indexer.index(kind))
    }

    pub fn refresh_all(&self) -> Pending<(Scan, Scan)> {
        let indexer = self.indexer.clone();
        Pending::spawn("index-all", move |token| {
            let videos = indexer.index(MediaKind::Video);
            if token.is_cancelled() {
                return (videos, Scan::empty(MediaKind::Audio));
            }
            (videos, indexer.index(MediaKind::Audio))
        })
    }

    /// Replaces the batch for the scan's kind. Returns whether the fetch
    /// succeeded; a failed fetch empties that batch.
    pub fn apply(&mut self, scan: Scan) -> bool {
        let complete = scan.is_complete();
        self.last_error = scan.error.as_ref().map(ToString::to_string);
        match scan.kind {
            MediaKind::Video => self.videos = scan.records,
            MediaKind::Audio => self.audio = scan.records,
        }
        self.rebuild();
        complete
    }

    /// Applies a pending scan once its worker has delivered. `Ok(None)`
    /// while it is still running, otherwise what [`Self::apply`] returns.
    pub fn poll(&mut self, pending: &Pending<Scan>) -> Result<Option<bool>> {
        Ok(pending.try_recv()?.map(|scan| self.apply(scan)))
    }

    /// Fetches both catalogs and waits for them.
    pub fn scan_blocking(&mut self) -> Result<bool> {
        let (videos, audio) = self.refresh_all().wait()?;
        let videos_ok = self.apply(videos);
        let video_error = self.last_error.take();
        let audio_ok = self.apply(audio);
        if self.last_error.is_none() {
            self.last_error = video_error;
        }
        Ok(videos_ok && audio_ok)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn filter(&self) -> KindFilter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: KindFilter) {
        self.filter = filter;
    }

    pub fn set_query(&mut self, query: Option<String>) {
        self.query = query.filter(|text| !text.trim().is_empty());
    }

    /// Video batch followed by the audio batch. A file listed by both
    /// catalogs appears once.
    pub fn records(&self) -> &[MediaRecord] {
        &self.records
    }

    pub fn folders(&self) -> Vec<FolderSummary> {
        folders::aggregate(&self.records, self.filter)
    }

    /// Aggregates on a worker thread over a snapshot of the current records.
    pub fn folders_in_background(&self) -> Pending<Vec<FolderSummary>> {
        let records = self.records.clone();
        let active = self.filter;
        Pending::spawn("aggregate", move |_| folders::aggregate(&records, active))
    }

    pub fn folder_items(&self, folder_id: i64) -> Vec<&MediaRecord> {
        folders::folder_items(&self.records, folder_id, self.filter)
    }

    pub fn search(&self) -> Vec<&MediaRecord> {
        filter::filter(&self.records, self.filter, self.query.as_deref())
    }

    /// Records a playback start in the history matching the record's
    /// classification and returns that classification.
    pub fn play(&self, record: &MediaRecord) -> Result<MediaKind> {
        record_playback(&self.histories, record)
    }

    pub fn play_in_background(&self, record: MediaRecord) -> Pending<Result<MediaKind>> {
        let histories = self.histories.clone();
        Pending::spawn("record-playback", move |_| {
            record_playback(&histories, &record)
        })
    }

    /// Validates a stream address, remembers it, and returns its title.
    pub fn play_stream(&self, input: &str) -> Result<String> {
        let url = stream::validate_stream_url(input)?;
        self.histories.record(HistoryKind::Stream, &url, None)?;
        Ok(stream::stream_title(&url))
    }

    pub fn histories(&self) -> &HistoryStore {
        &self.histories
    }

    fn rebuild(&mut self) {
        let mut seen: HashSet<String> = HashSet::new();
        self.records = self
            .videos
            .iter()
            .chain(self.audio.iter())
            .filter(|record| record.path.is_empty() || seen.insert(record.path.clone()))
            .cloned()
            .collect();
    }
}

fn record_playback(histories: &HistoryStore, record: &MediaRecord) -> Result<MediaKind> {
    let kind = classify(record);
    let outcome = match kind {
        MediaKind::Audio => histories.record(HistoryKind::Audio, &record.locator, None),
        MediaKind::Video => histories.record(
            HistoryKind::Video,
            &record.locator,
            Some(record.title.clone()),
        ),
    };
    if let Err(err) = &outcome {
        warn!(locator = %record.locator, error = %err, "failed to remember playback");
    }
    outcome.map(|()| kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ContentUriResolver, MemoryCatalog, RawRecord};
    use crate::history::HistoryCaps;
    use crate::kv::MemoryStore;

    fn raw(id: i64, path: &str, folder_id: Option<i64>, mime: Option<&str>) -> RawRecord {
        RawRecord {
            id,
            title: Some(crate::model::last_segment(path).to_string()),
            path: Some(path.to_string()),
            duration_ms: Some(1_000),
            size_bytes: Some(10),
            folder_id,
            folder_label: Some(String::from("Downloads")),
            mime_type: mime.map(str::to_string),
            date_added: Some(id),
        }
    }

    fn session(catalog: MemoryCatalog) -> BrowseSession {
        let indexer = MediaIndexer::new(Arc::new(catalog), Arc::new(ContentUriResolver::default()));
        let histories = Arc::new(HistoryStore::open(
            Arc::new(MemoryStore::new()),
            HistoryCaps::default(),
        ));
        BrowseSession::new(indexer, histories, KindFilter::VideoOnly)
    }

    fn sample_catalog() -> MemoryCatalog {
        MemoryCatalog::new()
            .with_records(
                MediaKind::Video,
                vec![
                    raw(1, "/s/Movies/a.mp4", Some(100), Some("video/mp4")),
                    raw(2, "/s/Movies/b.mkv", Some(100), None),
                    raw(3, "/s/Download/c.mp4", Some(200), Some("video/mp4")),
                ],
            )
            .with_records(
                MediaKind::Audio,
                vec![
                    raw(10, "/s/Music/x.mp3", None, Some("audio/mpeg")),
                    raw(11, "/s/Music/y.flac", None, None),
                    raw(12, "/s/Download/z.mp3", None, Some("audio/mpeg")),
                ],
            )
    }

    #[test]
    fn folder_view_is_recomputed_per_filter() {
        let mut session = session(sample_catalog());
        assert!(session.scan_blocking().expect("scan"));

        let video: Vec<(i64, usize)> = session
            .folders()
            .iter()
            .map(|folder| (folder.id, folder.item_count))
            .collect();
        assert_eq!(video, vec![(100, 2), (200, 1)]);

        session.set_filter(KindFilter::AudioOnly);
        let audio = session.folders();
        assert_eq!(audio.len(), 2);
        assert_eq!(audio[0].name, "Music");
        assert_eq!(audio[0].item_count, 2);

        session.set_filter(KindFilter::All);
        let total: usize = session.folders().iter().map(|f| f.item_count).sum();
        assert_eq!(total, 6);
    }

    #[test]
    fn polling_applies_a_finished_refresh() {
        let mut session = session(sample_catalog());
        let pending = session.refresh(MediaKind::Audio);
        let complete = loop {
            if let Some(complete) = session.poll(&pending).expect("poll") {
                break complete;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        };
        assert!(complete);
        assert_eq!(session.records().len(), 3);
    }

    #[test]
    fn background_aggregate_matches_foreground() {
        let mut session = session(sample_catalog());
        session.scan_blocking().expect("scan");
        let pending = session.folders_in_background();
        assert_eq!(pending.wait().expect("folders"), session.folders());
    }

    #[test]
    fn search_honours_filter_and_query() {
        let mut session = session(sample_catalog());
        session.scan_blocking().expect("scan");
        session.set_filter(KindFilter::All);
        session.set_query(Some(String::from("download")));
        assert_eq!(session.search().len(), 6);

        session.set_query(Some(String::from("Z.MP3")));
        let ids: Vec<i64> = session.search().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![12]);

        session.set_query(Some(String::from("   ")));
        assert_eq!(session.search().len(), 6);
    }

    #[test]
    fn unavailable_catalog_leaves_empty_state_and_error() {
        let mut session = session(MemoryCatalog::unavailable());
        assert!(!session.scan_blocking().expect("scan"));
        assert!(session.records().is_empty());
        assert!(session.folders().is_empty());
        assert!(session.last_error().is_some());
    }

    #[test]
    fn playback_routes_by_classification() {
        let mut session = session(sample_catalog());
        session.scan_blocking().expect("scan");

        let song = session
            .records()
            .iter()
            .find(|record| record.id == 10)
            .cloned()
            .expect("song");
        let clip = session
            .records()
            .iter()
            .find(|record| record.id == 1)
            .cloned()
            .expect("clip");

        assert_eq!(session.play(&song).expect("play"), MediaKind::Audio);
        assert_eq!(
            session.play_in_background(clip.clone()).wait().expect("done").expect("play"),
            MediaKind::Video
        );

        let audio = session.histories().list(HistoryKind::Audio);
        assert_eq!(audio[0].key, "content://media/external/audio/media/10");
        let last_video = session.histories().last(HistoryKind::Video).expect("video");
        assert_eq!(last_video.key, clip.locator);
        assert_eq!(last_video.title.as_deref(), Some("a.mp4"));
    }

    #[test]
    fn streams_are_validated_and_remembered() {
        let session = session(MemoryCatalog::new());
        assert_eq!(
            session.play_stream("https://tv.example.org/live/channel1").expect("play"),
            "channel1"
        );
        assert!(session.play_stream("ftp://files.example.org/a.mp4").is_err());
        assert_eq!(session.histories().list(HistoryKind::Stream).len(), 1);
    }

    #[test]
    fn same_file_in_both_catalogs_counts_once() {
        let catalog = MemoryCatalog::new()
            .with_records(
                MediaKind::Video,
                vec![raw(1, "/s/Clips/voice.m4a", Some(7), Some("audio/mp4"))],
            )
            .with_records(
                MediaKind::Audio,
                vec![raw(2, "/s/Clips/voice.m4a", None, Some("audio/mp4"))],
            );
        let mut session = session(catalog);
        session.scan_blocking().expect("scan");
        session.set_filter(KindFilter::AudioOnly);
        assert_eq!(session.records().len(), 1);
        assert_eq!(session.folders()[0].item_count, 1);
    }
}
