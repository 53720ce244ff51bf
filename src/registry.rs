use crate::model::Clip;
use anyhow::Result;
use std::time::Duration;

/// Buffering level of a media element, ordered from "nothing known" to
/// "can play through".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ReadyState {
    #[default]
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

/// Lifecycle notifications a media element reports back to its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEvent {
    Started,
    Ended,
}

/// One playable media item. Implementations own their playback resources;
/// everything the sequencing logic needs is read through these signals.
pub trait MediaElement {
    /// Starts or resumes playback. Starting an element that is already
    /// playing is a no-op. A fresh start queues [`MediaEvent::Started`].
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self);
    /// Buffers the media from the beginning without starting playback.
    fn load(&mut self) -> Result<()>;
    fn position(&self) -> Duration;
    fn duration(&self) -> Option<Duration>;
    fn is_paused(&self) -> bool;
    fn is_ended(&self) -> bool;
    fn ready_state(&self) -> ReadyState;
    /// Pops the next pending lifecycle event, detecting end of media first.
    fn poll_event(&mut self) -> Option<MediaEvent>;
}

impl<M: MediaElement + ?Sized> MediaElement for Box<M> {
    fn play(&mut self) -> Result<()> {
        (**self).play()
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn load(&mut self) -> Result<()> {
        (**self).load()
    }

    fn position(&self) -> Duration {
        (**self).position()
    }

    fn duration(&self) -> Option<Duration> {
        (**self).duration()
    }

    fn is_paused(&self) -> bool {
        (**self).is_paused()
    }

    fn is_ended(&self) -> bool {
        (**self).is_ended()
    }

    fn ready_state(&self) -> ReadyState {
        (**self).ready_state()
    }

    fn poll_event(&mut self) -> Option<MediaEvent> {
        (**self).poll_event()
    }
}

/// An element counts as playing only once it has advanced past zero, is
/// neither paused nor ended, and has data beyond the current frame. Transient
/// states (unpaused but still buffering) are deliberately not "playing".
pub fn is_playing<M: MediaElement + ?Sized>(media: &M) -> bool {
    media.position() > Duration::ZERO
        && !media.is_paused()
        && !media.is_ended()
        && media.ready_state() > ReadyState::HaveCurrentData
}

#[derive(Debug)]
pub struct Entry<M> {
    index: usize,
    clip: Clip,
    media: M,
}

impl<M: MediaElement> Entry<M> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn clip(&self) -> &Clip {
        &self.clip
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    pub fn media_mut(&mut self) -> &mut M {
        &mut self.media
    }

    pub fn is_playing(&self) -> bool {
        is_playing(&self.media)
    }
}

/// Ordered, fixed set of entries for one battle. Holds no playback state of
/// its own: every query reads the elements live.
#[derive(Debug)]
pub struct PlaybackRegistry<M> {
    entries: Vec<Entry<M>>,
}

impl<M: MediaElement> PlaybackRegistry<M> {
    pub fn new(items: impl IntoIterator<Item = (Clip, M)>) -> Self {
        let entries = items
            .into_iter()
            .enumerate()
            .map(|(index, (clip, media))| Entry { index, clip, media })
            .collect();
        Self { entries }
    }

    pub fn list(&self) -> &[Entry<M>] {
        &self.entries
    }

    pub fn list_mut(&mut self) -> &mut [Entry<M>] {
        &mut self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Entry<M>> {
        self.entries.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Entry<M>> {
        self.entries.get_mut(index)
    }

    pub fn position_of(&self, clip_id: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.clip.id == clip_id)
    }

    pub fn any_playing(&self) -> bool {
        self.entries.iter().any(Entry::is_playing)
    }

    /// Drains pending lifecycle events from every element, in display order.
    pub fn poll_events(&mut self) -> Vec<(usize, MediaEvent)> {
        let mut events = Vec::new();
        for entry in &mut self.entries {
            while let Some(event) = entry.media.poll_event() {
                events.push((entry.index, event));
            }
        }
        events
    }

    pub fn pause_all(&mut self) {
        for entry in &mut self.entries {
            entry.media.pause();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Debug, Default)]
    struct StubElement {
        position: Duration,
        paused: bool,
        ended: bool,
        ready: ReadyState,
        events: VecDeque<MediaEvent>,
    }

    impl StubElement {
        fn playing() -> Self {
            Self {
                position: Duration::from_millis(500),
                paused: false,
                ended: false,
                ready: ReadyState::HaveEnoughData,
                events: VecDeque::new(),
            }
        }

        fn idle() -> Self {
            Self {
                paused: true,
                ..Self::default()
            }
        }
    }

    impl MediaElement for StubElement {
        fn play(&mut self) -> Result<()> {
            self.paused = false;
            self.events.push_back(MediaEvent::Started);
            Ok(())
        }

        fn pause(&mut self) {
            self.paused = true;
        }

        fn load(&mut self) -> Result<()> {
            self.ready = ReadyState::HaveEnoughData;
            Ok(())
        }

        fn position(&self) -> Duration {
            self.position
        }

        fn duration(&self) -> Option<Duration> {
            None
        }

        fn is_paused(&self) -> bool {
            self.paused
        }

        fn is_ended(&self) -> bool {
            self.ended
        }

        fn ready_state(&self) -> ReadyState {
            self.ready
        }

        fn poll_event(&mut self) -> Option<MediaEvent> {
            self.events.pop_front()
        }
    }

    fn clip(id: &str) -> Clip {
        Clip {
            id: id.to_string(),
            author: String::new(),
            title: id.to_string(),
            path: id.into(),
            notes: None,
        }
    }

    #[test]
    fn playing_requires_every_signal() {
        assert!(is_playing(&StubElement::playing()));

        let mut at_start = StubElement::playing();
        at_start.position = Duration::ZERO;
        assert!(!is_playing(&at_start));

        let mut paused = StubElement::playing();
        paused.paused = true;
        assert!(!is_playing(&paused));

        let mut ended = StubElement::playing();
        ended.ended = true;
        assert!(!is_playing(&ended));

        let mut buffering = StubElement::playing();
        buffering.ready = ReadyState::HaveCurrentData;
        assert!(!is_playing(&buffering));
    }

    #[test]
    fn empty_registry_degrades_to_false() {
        let mut registry: PlaybackRegistry<StubElement> = PlaybackRegistry::new(Vec::new());
        assert!(registry.is_empty());
        assert!(registry.list().is_empty());
        assert!(!registry.any_playing());
        assert!(registry.poll_events().is_empty());
        assert_eq!(registry.position_of("a.wav"), None);
    }

    #[test]
    fn any_playing_reads_elements_live() {
        let mut registry = PlaybackRegistry::new(vec![
            (clip("a.wav"), StubElement::idle()),
            (clip("b.wav"), StubElement::playing()),
        ]);
        assert!(registry.any_playing());

        registry.get_mut(1).expect("entry").media_mut().pause();
        assert!(!registry.any_playing());
    }

    #[test]
    fn entries_keep_insertion_order() {
        let registry = PlaybackRegistry::new(vec![
            (clip("z.wav"), StubElement::idle()),
            (clip("a.wav"), StubElement::idle()),
        ]);
        let ids: Vec<&str> = registry.list().iter().map(|e| e.clip().id.as_str()).collect();
        assert_eq!(ids, vec!["z.wav", "a.wav"]);
        assert_eq!(registry.position_of("a.wav"), Some(1));
        assert_eq!(registry.list()[1].index(), 1);
    }

    #[test]
    fn poll_events_tags_entry_index() {
        let mut registry = PlaybackRegistry::new(vec![
            (clip("a.wav"), StubElement::idle()),
            (clip("b.wav"), StubElement::idle()),
        ]);
        registry
            .get_mut(1)
            .expect("entry")
            .media_mut()
            .play()
            .expect("play");

        assert_eq!(registry.poll_events(), vec![(1, MediaEvent::Started)]);
        assert!(registry.poll_events().is_empty());
    }
}
