use crate::model::Settings;
use crate::registry::{MediaElement, MediaEvent, PlaybackRegistry};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const BASE_DELAY_MS: u64 = 100;

/// Listener controls, read by the caller right before every decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerControls {
    pub autoplay: bool,
    pub delay_slider: u32,
}

impl PlayerControls {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(BASE_DELAY_MS + u64::from(self.delay_slider) * 1_000)
    }
}

impl From<&Settings> for PlayerControls {
    fn from(settings: &Settings) -> Self {
        Self {
            autoplay: settings.autoplay,
            delay_slider: settings.delay_slider,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Idle,
    Playing(usize),
    AwaitingAdvance { next: usize, deadline: Instant },
}

/// Result of a deferred advance once its deadline passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Started(usize),
    AutoplayDisabled,
    AlreadyPlaying,
    Missing,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingAdvance {
    next: usize,
    due: Instant,
}

/// Autoplay sequencing over a [`PlaybackRegistry`].
///
/// Starting any entry pauses all others. Ending an entry, while autoplay is
/// on, preloads the following one and schedules its start after the delay.
/// Scheduled starts are never cancelled; they re-check autoplay and whether
/// anything is already playing when they fire, and do nothing if so.
#[derive(Debug, Default)]
pub struct Sequencer {
    active: Option<usize>,
    pending: Vec<PendingAdvance>,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<usize> {
        self.active
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn now_playing_markers(&self, len: usize) -> Vec<bool> {
        (0..len).map(|index| self.active == Some(index)).collect()
    }

    /// An entry that is actually playing wins over any pending advance.
    pub fn state<M: MediaElement>(&self, registry: &PlaybackRegistry<M>) -> SequencerState {
        let active_playing = self
            .active
            .filter(|index| registry.get(*index).is_some_and(|entry| entry.is_playing()));
        let playing = active_playing.or_else(|| {
            registry
                .list()
                .iter()
                .find(|entry| entry.is_playing())
                .map(|entry| entry.index())
        });
        if let Some(index) = playing {
            return SequencerState::Playing(index);
        }

        match self.pending.iter().min_by_key(|pending| pending.due) {
            Some(pending) => SequencerState::AwaitingAdvance {
                next: pending.next,
                deadline: pending.due,
            },
            None => SequencerState::Idle,
        }
    }

    pub fn on_entry_started<M: MediaElement>(
        &mut self,
        registry: &mut PlaybackRegistry<M>,
        index: usize,
    ) {
        for entry in registry.list_mut() {
            if entry.index() != index {
                entry.media_mut().pause();
            }
        }
        self.active = registry.get(index).map(|entry| entry.index());
        debug!(index, "entry started");
    }

    /// Returns the index of the entry scheduled to start, if any.
    pub fn on_entry_ended<M: MediaElement>(
        &mut self,
        registry: &mut PlaybackRegistry<M>,
        controls: PlayerControls,
        index: usize,
        now: Instant,
    ) -> Option<usize> {
        if !controls.autoplay {
            debug!(index, "entry ended with autoplay off");
            return None;
        }
        if registry.get(index).is_none() {
            debug!(index, "ended entry is no longer listed");
            return None;
        }

        let next = index + 1;
        let Some(entry) = registry.get_mut(next) else {
            info!(index, "reached end of battle");
            return None;
        };

        if let Err(err) = entry.media_mut().load() {
            warn!(next, "failed to preload next entry: {err:#}");
        }

        let delay = controls.delay();
        self.pending.push(PendingAdvance {
            next,
            due: now + delay,
        });
        debug!(index, next, delay_ms = delay.as_millis() as u64, "scheduled advance");
        Some(next)
    }

    /// Fires every scheduled advance whose deadline is at or before `now`.
    ///
    /// A freshly started element may still report position zero, so once one
    /// advance starts an entry the rest of the batch counts as already playing.
    pub fn tick<M: MediaElement>(
        &mut self,
        registry: &mut PlaybackRegistry<M>,
        controls: PlayerControls,
        now: Instant,
    ) -> Vec<AdvanceOutcome> {
        self.fire_due(registry, controls, now, false)
    }

    fn fire_due<M: MediaElement>(
        &mut self,
        registry: &mut PlaybackRegistry<M>,
        controls: PlayerControls,
        now: Instant,
        mut started: bool,
    ) -> Vec<AdvanceOutcome> {
        let (due, waiting): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|pending| pending.due <= now);
        self.pending = waiting;

        due.into_iter()
            .map(|pending| {
                if started {
                    debug!(next = pending.next, "advance abandoned, an entry just started");
                    return AdvanceOutcome::AlreadyPlaying;
                }
                let outcome = Self::fire(registry, controls, pending.next);
                started = matches!(outcome, AdvanceOutcome::Started(_));
                outcome
            })
            .collect()
    }

    /// One cooperative step: dispatch element events, fire due advances, then
    /// dispatch the start events those advances produced. A start dispatched
    /// in the same step suppresses every due advance.
    pub fn pump<M: MediaElement>(
        &mut self,
        registry: &mut PlaybackRegistry<M>,
        controls: PlayerControls,
        now: Instant,
    ) -> Vec<AdvanceOutcome> {
        let started = self.dispatch_events(registry, controls, now);
        let outcomes = self.fire_due(registry, controls, now, started);
        if !outcomes.is_empty() {
            self.dispatch_events(registry, controls, now);
        }
        outcomes
    }

    /// Returns `true` when any start event was handled.
    fn dispatch_events<M: MediaElement>(
        &mut self,
        registry: &mut PlaybackRegistry<M>,
        controls: PlayerControls,
        now: Instant,
    ) -> bool {
        let mut started = false;
        for (index, event) in registry.poll_events() {
            match event {
                MediaEvent::Started => {
                    self.on_entry_started(registry, index);
                    started = true;
                }
                MediaEvent::Ended => {
                    self.on_entry_ended(registry, controls, index, now);
                }
            }
        }
        started
    }

    fn fire<M: MediaElement>(
        registry: &mut PlaybackRegistry<M>,
        controls: PlayerControls,
        next: usize,
    ) -> AdvanceOutcome {
        if !controls.autoplay {
            debug!(next, "advance abandoned, autoplay turned off");
            return AdvanceOutcome::AutoplayDisabled;
        }
        if registry.any_playing() {
            debug!(next, "advance abandoned, something is already playing");
            return AdvanceOutcome::AlreadyPlaying;
        }
        let Some(entry) = registry.get_mut(next) else {
            return AdvanceOutcome::Missing;
        };

        match entry.media_mut().play() {
            Ok(()) => {
                info!(next, "autoplay started next entry");
                AdvanceOutcome::Started(next)
            }
            Err(err) => {
                warn!(next, "autoplay failed to start entry: {err:#}");
                AdvanceOutcome::Failed
            }
        }
    }
}
