//! Shared test utilities
//!
//! Recording fakes for every collaborator, so tests run without audio,
//! camera, browser or network.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use secrecy::SecretString;

use travis_voice::completion::{
    ChatRequest, ChatTransport, CompletionClient, CompletionError, HttpReply,
};
use travis_voice::config::{AssistantConfig, CompletionConfig, ListenConfig};
use travis_voice::desktop::{App, Desktop};
use travis_voice::vision::{CameraBackend, Display, FaceBox, FaceDetector, Frame, FrameSource};
use travis_voice::voice::{DetectorSettings, ListenError, ListenParams, SpeechRecognizer, Speaker};
use travis_voice::{Assistant, Components, Error, Result};

/// Shared, inspectable log
pub type Log<T> = Rc<RefCell<Vec<T>>>;

/// Recognizer returning scripted results, then timeouts
pub struct ScriptedRecognizer {
    script: VecDeque<std::result::Result<String, ListenError>>,
    pub params: Log<ListenParams>,
}

impl ScriptedRecognizer {
    pub fn new(script: Vec<std::result::Result<String, ListenError>>) -> Self {
        Self {
            script: script.into(),
            params: Rc::default(),
        }
    }
}

impl SpeechRecognizer for ScriptedRecognizer {
    fn listen(&mut self, params: ListenParams) -> std::result::Result<String, ListenError> {
        self.params.borrow_mut().push(params);
        self.script.pop_front().unwrap_or(Err(ListenError::Timeout))
    }
}

/// Speaker recording every utterance
#[derive(Default)]
pub struct RecordingSpeaker {
    pub spoken: Log<String>,
}

impl Speaker for RecordingSpeaker {
    fn speak(&mut self, text: &str) -> Result<()> {
        self.spoken.borrow_mut().push(text.to_string());
        Ok(())
    }
}

/// Desktop recording launches and URLs
#[derive(Default)]
pub struct RecordingDesktop {
    pub launched: Log<App>,
    pub urls: Log<String>,
    pub fail: bool,
}

impl Desktop for RecordingDesktop {
    fn launch(&mut self, app: App) -> Result<()> {
        if self.fail {
            return Err(Error::Launch(format!("{app:?} not installed")));
        }
        self.launched.borrow_mut().push(app);
        Ok(())
    }

    fn open_url(&mut self, url: &str) -> Result<()> {
        if self.fail {
            return Err(Error::Launch("no browser".to_string()));
        }
        self.urls.borrow_mut().push(url.to_string());
        Ok(())
    }
}

/// Transport counting calls and returning a canned reply
pub struct CountingTransport {
    reply: std::result::Result<HttpReply, CompletionError>,
    pub calls: Rc<Cell<usize>>,
    pub requests: Log<ChatRequest>,
}

impl CountingTransport {
    pub fn replying(status: u16, body: &str) -> Self {
        Self::with_reply(Ok(HttpReply {
            status,
            body: body.to_string(),
        }))
    }

    pub fn with_reply(reply: std::result::Result<HttpReply, CompletionError>) -> Self {
        Self {
            reply,
            calls: Rc::default(),
            requests: Rc::default(),
        }
    }
}

impl ChatTransport for CountingTransport {
    fn post(
        &self,
        _endpoint: &str,
        _api_key: &SecretString,
        request: &ChatRequest,
    ) -> std::result::Result<HttpReply, CompletionError> {
        self.calls.set(self.calls.get() + 1);
        self.requests.borrow_mut().push(request.clone());
        self.reply.clone()
    }
}

/// Completion settings with an optional credential
pub fn completion_config(api_key: Option<&str>) -> CompletionConfig {
    CompletionConfig {
        endpoint: "https://completion.invalid/v1/chat/completions".to_string(),
        model: "llama3-8b-8192".to_string(),
        max_tokens: 1024,
        api_key_env: "GROQ_API_KEY".to_string(),
        api_key: api_key.map(|k| SecretString::from(k.to_string())),
        timeout: Duration::from_secs(1),
    }
}

/// JSON body of a successful completion
pub fn completion_body(answer: &str) -> String {
    serde_json::json!({
        "choices": [{"message": {"role": "assistant", "content": answer}}]
    })
    .to_string()
}

/// Counters shared between a fake camera and its sessions
#[derive(Default, Clone)]
pub struct CameraCounters {
    pub opens: Rc<Cell<usize>>,
    pub releases: Rc<Cell<usize>>,
    pub windows: Log<String>,
    pub closes: Rc<Cell<usize>>,
    pub shown: Log<Frame>,
}

/// Camera backend serving solid frames
pub struct FakeCamera {
    pub counters: CameraCounters,
    pub open_fails: bool,
    pub model_fails: bool,
    /// Frames delivered before reads fail
    pub frames: usize,
    /// Quit after this many frames are shown
    pub quit_after: Option<usize>,
    pub faces: Vec<FaceBox>,
}

impl FakeCamera {
    pub fn new(frames: usize) -> Self {
        Self {
            counters: CameraCounters::default(),
            open_fails: false,
            model_fails: false,
            frames,
            quit_after: None,
            faces: Vec::new(),
        }
    }
}

struct FakeSource {
    remaining: usize,
    counters: CameraCounters,
}

impl FrameSource for FakeSource {
    fn read_frame(&mut self) -> Result<Frame> {
        if self.remaining == 0 {
            return Err(Error::Camera("end of stream".to_string()));
        }
        self.remaining -= 1;
        Ok(Frame::filled(16, 12, [10, 10, 10]))
    }

    fn release(&mut self) {
        self.counters.releases.set(self.counters.releases.get() + 1);
    }
}

struct FakeDisplay {
    counters: CameraCounters,
    quit_after: Option<usize>,
    shown: usize,
}

impl Display for FakeDisplay {
    fn show(&mut self, frame: &Frame) -> Result<()> {
        self.shown += 1;
        self.counters.shown.borrow_mut().push(frame.clone());
        Ok(())
    }

    fn quit_requested(&self) -> bool {
        self.quit_after.is_some_and(|n| self.shown >= n)
    }

    fn close(&mut self) {
        self.counters.closes.set(self.counters.closes.get() + 1);
    }
}

struct FixedFaces(Vec<FaceBox>);

impl FaceDetector for FixedFaces {
    fn detect(&mut self, _frame: &Frame) -> Vec<FaceBox> {
        self.0.clone()
    }
}

impl CameraBackend for FakeCamera {
    fn open_source(&mut self) -> Result<Box<dyn FrameSource>> {
        if self.open_fails {
            return Err(Error::Camera("device busy".to_string()));
        }
        self.counters.opens.set(self.counters.opens.get() + 1);
        Ok(Box::new(FakeSource {
            remaining: self.frames,
            counters: self.counters.clone(),
        }))
    }

    fn open_display(&mut self, title: &str, _width: u32, _height: u32) -> Result<Box<dyn Display>> {
        self.counters.windows.borrow_mut().push(title.to_string());
        Ok(Box::new(FakeDisplay {
            counters: self.counters.clone(),
            quit_after: self.quit_after,
            shown: 0,
        }))
    }

    fn load_detector(&mut self) -> Result<Box<dyn FaceDetector>> {
        if self.model_fails {
            return Err(Error::Camera("model missing".to_string()));
        }
        Ok(Box::new(FixedFaces(self.faces.clone())))
    }
}

/// Listen parameters matching the built-in defaults
pub fn listen_config() -> ListenConfig {
    ListenConfig {
        wake: ListenParams {
            timeout: Duration::from_secs(10),
            phrase_limit: None,
        },
        command: ListenParams {
            timeout: Duration::from_secs(5),
            phrase_limit: Some(Duration::from_secs(10)),
        },
        detector: DetectorSettings::default(),
    }
}

/// Assistant wired to recording fakes
pub struct Harness {
    pub assistant: Assistant,
    pub spoken: Log<String>,
    pub launched: Log<App>,
    pub urls: Log<String>,
    pub listens: Log<ListenParams>,
    pub completion_calls: Rc<Cell<usize>>,
    pub camera: CameraCounters,
}

impl Harness {
    /// Build with a scripted recognizer and a working completion backend
    pub fn new(script: Vec<std::result::Result<String, ListenError>>) -> Self {
        Self::build(
            script,
            Some("gsk-test"),
            CountingTransport::replying(200, &completion_body("Paris.")),
        )
    }

    pub fn build(
        script: Vec<std::result::Result<String, ListenError>>,
        api_key: Option<&str>,
        transport: CountingTransport,
    ) -> Self {
        let recognizer = ScriptedRecognizer::new(script);
        let speaker = RecordingSpeaker::default();
        let desktop = RecordingDesktop::default();
        let camera = FakeCamera::new(3);

        let harness_logs = (
            Rc::clone(&speaker.spoken),
            Rc::clone(&desktop.launched),
            Rc::clone(&desktop.urls),
            Rc::clone(&recognizer.params),
            Rc::clone(&transport.calls),
            camera.counters.clone(),
        );

        let components = Components {
            recognizer: Box::new(recognizer),
            speaker: Box::new(speaker),
            desktop: Box::new(desktop),
            camera: Box::new(camera),
            completion: CompletionClient::with_transport(
                completion_config(api_key),
                Box::new(transport),
            ),
        };

        let identity = AssistantConfig {
            name: "Travis".to_string(),
            wake_word: "travis".to_string(),
        };

        let (spoken, launched, urls, listens, completion_calls, camera) = harness_logs;
        Self {
            assistant: Assistant::new(components, &identity, listen_config())
                .with_retry_delay(Duration::ZERO),
            spoken,
            launched,
            urls,
            listens,
            completion_calls,
            camera,
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.borrow().clone()
    }
}
