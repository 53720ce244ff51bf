use crate::battle;
use crate::model::{Battle, Clip, MAX_DELAY_SLIDER, Settings};
use crate::registry::{MediaElement, PlaybackRegistry};
use crate::sequencer::{AdvanceOutcome, PlayerControls, Sequencer, SequencerState};
use crate::vote::{Ballot, Submission};
use std::time::Instant;
use tracing::info;

/// Everything one open battle page holds: its entries, the autoplay
/// sequencer, the listener's ballot and the controls shown next to them.
pub struct BattleSession<M: MediaElement> {
    pub battle_name: String,
    pub registry: PlaybackRegistry<M>,
    pub sequencer: Sequencer,
    pub ballot: Ballot,
    pub settings: Settings,
    pub selected: usize,
    pub dirty: bool,
    pub status: String,
}

impl<M: MediaElement> BattleSession<M> {
    pub fn from_battle(
        mut battle: Battle,
        settings: Settings,
        mut make_element: impl FnMut(&Clip) -> M,
    ) -> Self {
        let seed = settings
            .shuffle_seed
            .as_deref()
            .filter(|seed| !seed.is_empty())
            .unwrap_or(battle::DEFAULT_SHUFFLE_SEED);
        battle::shuffle_clips(&mut battle.clips, seed);

        let count = battle.clips.len();
        let registry = PlaybackRegistry::new(battle.clips.into_iter().map(|clip| {
            let element = make_element(&clip);
            (clip, element)
        }));
        info!(battle = %battle.name, entries = count, "opened battle");

        Self {
            ballot: Ballot::new(&battle.name),
            battle_name: battle.name,
            registry,
            sequencer: Sequencer::new(),
            settings,
            selected: 0,
            dirty: true,
            status: format!("Loaded {count} entries"),
        }
    }

    pub fn controls(&self) -> PlayerControls {
        PlayerControls::from(&self.settings)
    }

    pub fn state(&self) -> SequencerState {
        self.sequencer.state(&self.registry)
    }

    pub fn now_playing_markers(&self) -> Vec<bool> {
        self.sequencer.now_playing_markers(self.registry.len())
    }

    pub fn selected_clip(&self) -> Option<&Clip> {
        self.registry.get(self.selected).map(|entry| entry.clip())
    }

    pub fn select_next(&mut self) {
        if self.registry.is_empty() {
            return;
        }
        self.selected = (self.selected + 1).min(self.registry.len() - 1);
        self.dirty = true;
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
        self.dirty = true;
    }

    pub fn play_selected(&mut self) {
        let Some(entry) = self.registry.get_mut(self.selected) else {
            self.set_status("Nothing selected");
            return;
        };
        let label = entry.clip().label();
        match entry.media_mut().play() {
            Ok(()) => self.set_status(&format!("Playing {label}")),
            Err(err) => self.set_status(&format!("playback error: {err:#}")),
        }
    }

    /// Selects the entry with this file name and starts it.
    pub fn play_clip(&mut self, clip_id: &str) {
        let Some(index) = self.registry.position_of(clip_id) else {
            self.set_status(&format!("No entry named {clip_id}"));
            return;
        };
        self.selected = index;
        self.play_selected();
    }

    pub fn toggle_pause_selected(&mut self) {
        let Some(entry) = self.registry.get_mut(self.selected) else {
            self.set_status("Nothing selected");
            return;
        };
        if entry.is_playing() {
            entry.media_mut().pause();
            self.set_status("Paused");
        } else {
            self.play_selected();
        }
    }

    pub fn stop_all(&mut self) {
        self.registry.pause_all();
        self.dirty = true;
    }

    pub fn toggle_autoplay(&mut self) {
        self.set_autoplay(!self.settings.autoplay);
    }

    pub fn set_autoplay(&mut self, enabled: bool) {
        self.settings.autoplay = enabled;
        let label = if enabled { "on" } else { "off" };
        self.set_status(&format!("Autoplay {label}"));
    }

    pub fn adjust_delay(&mut self, delta: i32) {
        let next = self.settings.delay_slider.saturating_add_signed(delta);
        self.set_delay(next);
    }

    pub fn set_delay(&mut self, slider: u32) {
        self.settings.delay_slider = slider.min(MAX_DELAY_SLIDER);
        let label = self.delay_label();
        self.set_status(&format!("Delay {label}"));
    }

    /// The delay actually waited between entries, base offset included.
    pub fn delay_label(&self) -> String {
        format!("{:.1}s", self.controls().delay().as_secs_f64())
    }

    pub fn toggle_notes(&mut self) {
        self.settings.show_notes = !self.settings.show_notes;
        self.dirty = true;
    }

    pub fn vote_selected(&mut self, score: u8) -> Option<Submission> {
        let entry_id = self.selected_clip()?.id.clone();
        match self.ballot.cast(&entry_id, score) {
            Ok(submission) => {
                self.set_status(&format!("Voted {score} for {entry_id}"));
                Some(submission)
            }
            Err(err) => {
                self.set_status(&format!("vote error: {err:#}"));
                None
            }
        }
    }

    pub fn retract_votes(&mut self) -> Submission {
        self.set_status("Votes retracted");
        self.ballot.retract()
    }

    /// Advances playback bookkeeping; called once per UI loop iteration.
    pub fn tick(&mut self, now: Instant) {
        let active_before = self.sequencer.active();
        let pending_before = self.sequencer.pending_count();
        let controls = self.controls();
        let outcomes = self.sequencer.pump(&mut self.registry, controls, now);

        for outcome in outcomes {
            if let AdvanceOutcome::Started(index) = outcome
                && let Some(entry) = self.registry.get(index)
            {
                let label = entry.clip().label();
                self.set_status(&format!("Autoplay: {label}"));
            }
        }

        if self.sequencer.active() != active_before
            || self.sequencer.pending_count() != pending_before
        {
            self.dirty = true;
        }
    }

    fn set_status(&mut self, message: &str) {
        self.status = message.to_string();
        self.dirty = true;
    }
}
