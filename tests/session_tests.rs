//! End-to-end tests for the session manager
//!
//! Drive the full start -> stop pipeline with a scripted audio source, a
//! canned transcriber, and an in-memory history store, and assert on the
//! events and records that come out.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use voicelog::{
    AudioChunk, AudioSource, CaptureError, DisplayEvent, EventKind, EventSink, HistoryEntry,
    HistoryStore, SessionError, SessionManager, SessionState, SourceFactory, StorageError,
    Transcriber, TranscriptionError,
};

/// Size of a WAV header with no samples
const WAV_HEADER_BYTES: usize = 44;

/// One scripted action for the fake audio source
#[derive(Clone)]
enum SourceStep {
    Chunk(Vec<i16>),
    Fail,
    Sleep(Duration),
}

struct ScriptedSource {
    script: Arc<Mutex<VecDeque<SourceStep>>>,
}

impl AudioSource for ScriptedSource {
    fn read_chunk(&mut self) -> Result<Option<AudioChunk>, CaptureError> {
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(SourceStep::Chunk(samples)) => Ok(Some(AudioChunk::new(samples))),
            Some(SourceStep::Fail) => Err(CaptureError::ReadTimedOut),
            Some(SourceStep::Sleep(duration)) => {
                thread::sleep(duration);
                Ok(None)
            }
            // Script exhausted: behave like a quiet device with no data.
            None => {
                thread::sleep(Duration::from_millis(2));
                Ok(None)
            }
        }
    }
}

#[derive(Clone)]
struct ScriptedFactory {
    script: Arc<Mutex<VecDeque<SourceStep>>>,
    available: bool,
    opens: Arc<AtomicUsize>,
}

impl ScriptedFactory {
    fn new(steps: Vec<SourceStep>) -> Self {
        Self {
            script: Arc::new(Mutex::new(steps.into())),
            available: true,
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn unavailable() -> Self {
        let mut factory = Self::new(Vec::new());
        factory.available = false;
        factory
    }

    fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl SourceFactory for ScriptedFactory {
    fn probe(&self) -> Result<(), CaptureError> {
        if self.available {
            Ok(())
        } else {
            Err(CaptureError::NoInputDevice)
        }
    }

    fn open(&self) -> Result<Box<dyn AudioSource>, CaptureError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if !self.available {
            return Err(CaptureError::NoInputDevice);
        }
        Ok(Box::new(ScriptedSource {
            script: self.script.clone(),
        }))
    }
}

/// Canned transcriber reply
#[derive(Clone)]
enum Reply {
    Text(String),
    NoSpeech,
    Unavailable(String),
}

#[derive(Clone)]
struct FakeTranscriber {
    reply: Reply,
    clip_sizes: Arc<Mutex<Vec<usize>>>,
}

impl FakeTranscriber {
    fn text(text: &str) -> Self {
        Self {
            reply: Reply::Text(text.to_string()),
            clip_sizes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn no_speech() -> Self {
        Self {
            reply: Reply::NoSpeech,
            clip_sizes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn unavailable(detail: &str) -> Self {
        Self {
            reply: Reply::Unavailable(detail.to_string()),
            clip_sizes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn clip_sizes(&self) -> Vec<usize> {
        self.clip_sizes.lock().unwrap().clone()
    }
}

impl Transcriber for FakeTranscriber {
    fn transcribe(&self, clip: &[u8]) -> Result<String, TranscriptionError> {
        self.clip_sizes.lock().unwrap().push(clip.len());
        match &self.reply {
            Reply::Text(text) => Ok(text.clone()),
            Reply::NoSpeech => Err(TranscriptionError::NoSpeechDetected),
            Reply::Unavailable(detail) => {
                Err(TranscriptionError::ServiceUnavailable(detail.clone()))
            }
        }
    }
}

/// History store keeping full (start, stop, text) tuples for assertions
#[derive(Clone, Default)]
struct MemoryStore {
    records: Arc<Mutex<Vec<(String, String, String)>>>,
    fail_appends: bool,
}

impl MemoryStore {
    fn new() -> Self {
        Self::default()
    }

    fn failing() -> Self {
        Self {
            fail_appends: true,
            ..Self::default()
        }
    }

    fn records(&self) -> Vec<(String, String, String)> {
        self.records.lock().unwrap().clone()
    }
}

impl HistoryStore for MemoryStore {
    fn append(
        &self,
        started_at: &str,
        stopped_at: &str,
        text: &str,
    ) -> Result<i64, StorageError> {
        if self.fail_appends {
            return Err(StorageError::LockPoisoned);
        }
        let mut records = self.records.lock().unwrap();
        records.push((started_at.to_string(), stopped_at.to_string(), text.to_string()));
        Ok(records.len() as i64)
    }

    fn list_all(&self) -> Result<Vec<HistoryEntry>, StorageError> {
        let mut entries: Vec<HistoryEntry> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .map(|(start, _, text)| HistoryEntry {
                started_at: start.clone(),
                text: text.clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Ok(entries)
    }
}

#[derive(Clone, Default)]
struct RecordingSink {
    events: Arc<Mutex<Vec<DisplayEvent>>>,
}

impl RecordingSink {
    fn new() -> Self {
        Self::default()
    }

    fn events(&self) -> Vec<DisplayEvent> {
        self.events.lock().unwrap().clone()
    }

    fn texts(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.text).collect()
    }
}

impl EventSink for RecordingSink {
    fn on_event(&self, event: DisplayEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn manager_with(
    factory: ScriptedFactory,
    transcriber: FakeTranscriber,
    store: MemoryStore,
    sink: RecordingSink,
) -> SessionManager {
    SessionManager::new(
        Arc::new(factory),
        Box::new(transcriber),
        Box::new(store),
        Box::new(sink),
    )
}

/// Give the capture worker time to drain its script
fn let_worker_run() {
    thread::sleep(Duration::from_millis(50));
}

#[test]
fn completed_cycle_appends_one_record_in_event_order() {
    let factory = ScriptedFactory::new(vec![
        SourceStep::Chunk(vec![1i16; 1024]),
        SourceStep::Chunk(vec![2i16; 1024]),
    ]);
    let transcriber = FakeTranscriber::text("hello world");
    let store = MemoryStore::new();
    let sink = RecordingSink::new();
    let mut manager = manager_with(
        factory,
        transcriber.clone(),
        store.clone(),
        sink.clone(),
    );

    manager.start().unwrap();
    assert_eq!(manager.state(), SessionState::Recording);
    let_worker_run();
    manager.stop().unwrap();
    assert_eq!(manager.state(), SessionState::Idle);

    // Exactly one record, stop not before start.
    let records = store.records();
    assert_eq!(records.len(), 1);
    let (start, stop, text) = &records[0];
    assert!(stop >= start);
    assert_eq!(text, "hello world");

    // The clip handed to the transcriber holds exactly the two chunks.
    assert_eq!(
        transcriber.clip_sizes(),
        vec![WAV_HEADER_BYTES + 2 * 1024 * 2]
    );

    // Started notice, transcript line, stopped notice, in that order.
    let events = sink.events();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].kind, EventKind::SystemNotice);
    assert_eq!(events[0].text, "Recording started...");
    assert_eq!(events[1].kind, EventKind::TranscriptLine);
    assert_eq!(events[1].text, "hello world");
    assert_eq!(events[2].kind, EventKind::SystemNotice);
    assert_eq!(events[2].text, "Recording stopped.");
}

#[test]
fn start_while_recording_is_a_noop() {
    let factory = ScriptedFactory::new(Vec::new());
    let sink = RecordingSink::new();
    let mut manager = manager_with(
        factory.clone(),
        FakeTranscriber::no_speech(),
        MemoryStore::new(),
        sink.clone(),
    );

    manager.start().unwrap();
    manager.start().unwrap();
    let_worker_run();

    // No second worker, no duplicate started notice.
    assert_eq!(factory.open_count(), 1);
    let started: Vec<String> = sink
        .texts()
        .into_iter()
        .filter(|t| t == "Recording started...")
        .collect();
    assert_eq!(started.len(), 1);

    manager.stop().unwrap();
}

#[test]
fn stop_while_idle_is_a_noop() {
    let store = MemoryStore::new();
    let sink = RecordingSink::new();
    let mut manager = manager_with(
        ScriptedFactory::new(Vec::new()),
        FakeTranscriber::no_speech(),
        store.clone(),
        sink.clone(),
    );

    manager.stop().unwrap();

    assert!(store.records().is_empty());
    assert!(sink.events().is_empty());
    assert_eq!(manager.state(), SessionState::Idle);
}

#[test]
fn no_speech_persists_exact_diagnostic_text() {
    let store = MemoryStore::new();
    let sink = RecordingSink::new();
    let mut manager = manager_with(
        ScriptedFactory::new(vec![SourceStep::Chunk(vec![3i16; 1024])]),
        FakeTranscriber::no_speech(),
        store.clone(),
        sink.clone(),
    );

    manager.start().unwrap();
    let_worker_run();
    manager.stop().unwrap();

    let records = store.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].2, "Could not understand audio.");

    let transcript_lines: Vec<DisplayEvent> = sink
        .events()
        .into_iter()
        .filter(|e| e.kind == EventKind::TranscriptLine)
        .collect();
    assert_eq!(transcript_lines.len(), 1);
    assert_eq!(transcript_lines[0].text, "Could not understand audio.");
}

#[test]
fn unreachable_service_persists_diagnostic_with_detail() {
    let store = MemoryStore::new();
    let mut manager = manager_with(
        ScriptedFactory::new(vec![SourceStep::Chunk(vec![4i16; 1024])]),
        FakeTranscriber::unavailable("connection refused"),
        store.clone(),
        RecordingSink::new(),
    );

    manager.start().unwrap();
    let_worker_run();
    manager.stop().unwrap();

    let records = store.records();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].2,
        "Could not reach recognition service: connection refused"
    );
}

#[test]
fn empty_capture_still_completes_the_pipeline() {
    let transcriber = FakeTranscriber::no_speech();
    let store = MemoryStore::new();
    let mut manager = manager_with(
        ScriptedFactory::new(Vec::new()),
        transcriber.clone(),
        store.clone(),
        RecordingSink::new(),
    );

    manager.start().unwrap();
    manager.stop().unwrap();

    // A header-only clip still goes through recognition and persistence.
    assert_eq!(transcriber.clip_sizes(), vec![WAV_HEADER_BYTES]);
    assert_eq!(store.records().len(), 1);
}

#[test]
fn degraded_session_finalizes_with_partial_buffer() {
    let transcriber = FakeTranscriber::text("partial take");
    let store = MemoryStore::new();
    let sink = RecordingSink::new();
    let mut manager = manager_with(
        ScriptedFactory::new(vec![
            SourceStep::Chunk(vec![5i16; 1024]),
            SourceStep::Fail,
            SourceStep::Fail,
            SourceStep::Fail,
        ]),
        transcriber.clone(),
        store.clone(),
        sink.clone(),
    );

    manager.start().unwrap();
    let_worker_run();
    manager.stop().unwrap();

    // The one chunk captured before the device died is still transcribed
    // and persisted.
    assert_eq!(transcriber.clip_sizes(), vec![WAV_HEADER_BYTES + 1024 * 2]);
    assert_eq!(store.records().len(), 1);
    assert!(sink
        .texts()
        .iter()
        .any(|t| t.contains("Audio device failed during capture")));
}

#[test]
fn device_unavailable_disables_start() {
    let factory = ScriptedFactory::unavailable();
    let store = MemoryStore::new();
    let sink = RecordingSink::new();
    let mut manager = manager_with(
        factory.clone(),
        FakeTranscriber::no_speech(),
        store.clone(),
        sink.clone(),
    );

    // One notice at construction, none repeated per start attempt.
    assert!(!manager.device_ready());
    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert!(events[0].text.contains("No microphone detected"));

    assert!(matches!(
        manager.start(),
        Err(SessionError::DeviceUnavailable)
    ));
    assert!(matches!(
        manager.start(),
        Err(SessionError::DeviceUnavailable)
    ));

    assert_eq!(factory.open_count(), 0);
    assert_eq!(manager.state(), SessionState::Idle);
    assert!(store.records().is_empty());
    assert_eq!(sink.events().len(), 1);
}

#[test]
fn storage_failure_surfaces_notice_without_aborting() {
    let sink = RecordingSink::new();
    let mut manager = manager_with(
        ScriptedFactory::new(vec![SourceStep::Chunk(vec![6i16; 1024])]),
        FakeTranscriber::text("unsaved words"),
        MemoryStore::failing(),
        sink.clone(),
    );

    manager.start().unwrap();
    let_worker_run();
    manager.stop().unwrap();

    let texts = sink.texts();
    // The transcript was still delivered before the failure notice, and
    // the pipeline ran to completion.
    assert!(texts.contains(&"unsaved words".to_string()));
    assert!(texts.iter().any(|t| t.contains("Transcript was not saved")));
    assert_eq!(texts.last().unwrap(), "Recording stopped.");
    assert_eq!(manager.state(), SessionState::Idle);
}

#[test]
fn hung_worker_is_reported_not_ignored() {
    let steps = vec![SourceStep::Sleep(Duration::from_millis(100)); 20];
    let sink = RecordingSink::new();
    let store = MemoryStore::new();
    let mut manager = manager_with(
        ScriptedFactory::new(steps),
        FakeTranscriber::no_speech(),
        store.clone(),
        sink.clone(),
    )
    .with_join_timeout(Duration::from_millis(25));

    manager.start().unwrap();
    thread::sleep(Duration::from_millis(10));

    let result = manager.stop();
    assert!(matches!(
        result,
        Err(SessionError::Capture(CaptureError::WorkerHung))
    ));
    assert!(sink
        .texts()
        .iter()
        .any(|t| t.contains("Recording could not be finalized")));
    assert!(store.records().is_empty());
    assert_eq!(manager.state(), SessionState::Idle);
}

#[test]
fn shutdown_finalizes_live_session_and_is_idempotent() {
    let store = MemoryStore::new();
    let sink = RecordingSink::new();
    let mut manager = manager_with(
        ScriptedFactory::new(vec![SourceStep::Chunk(vec![7i16; 1024])]),
        FakeTranscriber::text("last words"),
        store.clone(),
        sink.clone(),
    );

    manager.start().unwrap();
    let_worker_run();
    manager.shutdown().unwrap();

    assert_eq!(store.records().len(), 1);
    assert_eq!(store.records()[0].2, "last words");

    let events_after_first = sink.events().len();
    manager.shutdown().unwrap();
    manager.shutdown().unwrap();

    // Nothing new recorded or announced.
    assert_eq!(store.records().len(), 1);
    assert_eq!(sink.events().len(), events_after_first);
}

#[test]
fn list_history_delegates_to_the_store() {
    let store = MemoryStore::new();
    store
        .append("2024-02-01 09:00:00", "2024-02-01 09:01:00", "second")
        .unwrap();
    store
        .append("2024-01-01 09:00:00", "2024-01-01 09:01:00", "first")
        .unwrap();

    let manager = manager_with(
        ScriptedFactory::new(Vec::new()),
        FakeTranscriber::no_speech(),
        store,
        RecordingSink::new(),
    );

    let entries = manager.list_history().unwrap();
    let texts: Vec<&str> = entries.iter().map(|e| e.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second"]);
}
