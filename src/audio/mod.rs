use crate::registry::{MediaElement, MediaEvent, ReadyState};
use anyhow::{Context, Result};
use rodio::Source;
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
use std::collections::VecDeque;
#[cfg(unix)]
use std::ffi::CString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Shared system output every [`RodioElement`] connects its own sink to.
pub struct AudioOutput {
    stream: OutputStream,
    device: Option<String>,
}

impl AudioOutput {
    pub fn open(device: Option<&str>) -> Result<Self> {
        let mut stream = with_silenced_stderr(|| {
            let host = rodio::cpal::default_host();
            if let Some(requested) = device {
                let device = host
                    .output_devices()
                    .context("failed to enumerate output devices")?
                    .find(|candidate| candidate.name().ok().as_deref() == Some(requested))
                    .with_context(|| format!("audio output device not found: {requested}"))?;
                OutputStreamBuilder::from_device(device)
                    .context("failed to open selected output device")?
                    .with_error_callback(|_| {})
                    .open_stream_or_fallback()
                    .context("failed to start selected output stream")
            } else {
                OutputStreamBuilder::from_default_device()
                    .context("failed to open default system output stream")?
                    .with_error_callback(|_| {})
                    .open_stream_or_fallback()
                    .context("failed to start default output stream")
            }
        })?;
        stream.log_on_drop(false);
        Ok(Self {
            stream,
            device: device.map(ToOwned::to_owned),
        })
    }

    pub fn name(&self) -> String {
        self.device
            .clone()
            .unwrap_or_else(|| String::from("System default output (CPAL)"))
    }

    pub fn available_devices() -> Vec<String> {
        let mut outputs: Vec<String> = with_silenced_stderr(|| {
            rodio::cpal::default_host()
                .output_devices()
                .ok()
                .into_iter()
                .flatten()
                .filter_map(|device| device.name().ok())
                .collect()
        });
        outputs.sort_by_cached_key(|name| name.to_ascii_lowercase());
        outputs.dedup();
        outputs
    }

    fn connect(&self) -> Sink {
        Sink::connect_new(self.stream.mixer())
    }
}

/// One battle entry played through its own rodio sink.
pub struct RodioElement {
    output: Rc<AudioOutput>,
    path: PathBuf,
    sink: Option<Sink>,
    duration: Option<Duration>,
    ready: ReadyState,
    started: bool,
    ended: bool,
    events: VecDeque<MediaEvent>,
}

impl RodioElement {
    pub fn new(output: Rc<AudioOutput>, path: &Path) -> Self {
        Self {
            output,
            path: path.to_path_buf(),
            sink: None,
            duration: None,
            ready: ReadyState::HaveNothing,
            started: false,
            ended: false,
            events: VecDeque::new(),
        }
    }

    fn drained(&self) -> bool {
        self.started && self.sink.as_ref().is_none_or(Sink::empty)
    }
}

impl MediaElement for RodioElement {
    fn play(&mut self) -> Result<()> {
        if self.sink.is_none() || self.is_ended() {
            self.load()?;
        }
        let Some(sink) = &self.sink else {
            anyhow::bail!("no sink for {}", self.path.display());
        };
        if !sink.is_paused() {
            return Ok(());
        }

        sink.play();
        self.started = true;
        self.events.push_back(MediaEvent::Started);
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
    }

    fn load(&mut self) -> Result<()> {
        if let Some(previous) = self.sink.take() {
            previous.stop();
        }
        self.started = false;
        self.ended = false;
        self.ready = ReadyState::HaveNothing;

        let file = File::open(&self.path)
            .with_context(|| format!("failed to open clip {}", self.path.display()))?;
        let source = Decoder::try_from(file)
            .with_context(|| format!("failed to decode {}", self.path.display()))?;
        self.duration = source.total_duration();
        self.ready = ReadyState::HaveMetadata;

        let sink = self.output.connect();
        sink.pause();
        sink.append(source);
        self.sink = Some(sink);
        self.ready = ReadyState::HaveEnoughData;
        Ok(())
    }

    fn position(&self) -> Duration {
        self.sink.as_ref().map_or(Duration::ZERO, Sink::get_pos)
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }

    fn is_paused(&self) -> bool {
        self.sink.as_ref().is_none_or(Sink::is_paused)
    }

    fn is_ended(&self) -> bool {
        self.ended || self.drained()
    }

    fn ready_state(&self) -> ReadyState {
        self.ready
    }

    fn poll_event(&mut self) -> Option<MediaEvent> {
        if !self.ended && self.drained() {
            self.ended = true;
            self.events.push_back(MediaEvent::Ended);
        }
        self.events.pop_front()
    }
}

#[cfg(unix)]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    let saved = unsafe { libc::dup(libc::STDERR_FILENO) };
    if saved < 0 {
        return operation();
    }

    let devnull = CString::new("/dev/null")
        .ok()
        .map(|path| unsafe { libc::open(path.as_ptr(), libc::O_WRONLY) })
        .unwrap_or(-1);

    if devnull >= 0 {
        unsafe {
            libc::dup2(devnull, libc::STDERR_FILENO);
            libc::close(devnull);
        }
    }

    let result = operation();

    unsafe {
        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);
    }

    result
}

#[cfg(not(unix))]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    operation()
}

/// Silent element driven by the wall clock. Used when no output device can
/// be opened so sequencing still behaves as it would with sound.
pub struct NullElement {
    path: PathBuf,
    duration: Option<Duration>,
    ready: ReadyState,
    paused: bool,
    started_at: Option<Instant>,
    position_offset: Duration,
    ended_reported: bool,
    events: VecDeque<MediaEvent>,
}

impl NullElement {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            duration: None,
            ready: ReadyState::HaveNothing,
            paused: true,
            started_at: None,
            position_offset: Duration::ZERO,
            ended_reported: false,
            events: VecDeque::new(),
        }
    }

    fn estimate_duration(path: &Path) -> Option<Duration> {
        let file = File::open(path).ok()?;
        let source = Decoder::try_from(file).ok()?;
        source
            .total_duration()
            .filter(|duration| !duration.is_zero())
    }

    fn current_position(&self) -> Duration {
        let mut position = self.position_offset;
        if !self.paused
            && let Some(started_at) = self.started_at
        {
            position = position.saturating_add(started_at.elapsed());
        }
        if let Some(duration) = self.duration {
            return position.min(duration);
        }
        position
    }

    fn finished(&self) -> bool {
        let Some(duration) = self.duration else {
            return false;
        };
        self.started_at.is_some() && self.current_position() >= duration
    }
}

impl MediaElement for NullElement {
    fn play(&mut self) -> Result<()> {
        if self.ready == ReadyState::HaveNothing || self.finished() {
            self.load()?;
        }
        if !self.paused {
            return Ok(());
        }

        self.paused = false;
        self.started_at = Some(Instant::now());
        self.events.push_back(MediaEvent::Started);
        Ok(())
    }

    fn pause(&mut self) {
        if self.paused {
            return;
        }
        self.position_offset = self.current_position();
        self.paused = true;
    }

    fn load(&mut self) -> Result<()> {
        self.duration = Self::estimate_duration(&self.path);
        if self.duration.is_none() {
            warn!(path = %self.path.display(), "unknown clip duration, silent playback will not end");
        }
        self.ready = ReadyState::HaveEnoughData;
        self.paused = true;
        self.started_at = None;
        self.position_offset = Duration::ZERO;
        self.ended_reported = false;
        Ok(())
    }

    fn position(&self) -> Duration {
        self.current_position()
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn is_ended(&self) -> bool {
        self.finished()
    }

    fn ready_state(&self) -> ReadyState {
        self.ready
    }

    fn poll_event(&mut self) -> Option<MediaEvent> {
        if !self.ended_reported && self.finished() {
            self.ended_reported = true;
            self.events.push_back(MediaEvent::Ended);
        }
        self.events.pop_front()
    }
}
