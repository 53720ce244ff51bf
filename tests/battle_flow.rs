use anyhow::Result;
use battlr::model::{Battle, Clip, Settings};
use battlr::registry::{MediaElement, MediaEvent, ReadyState};
use battlr::sequencer::{AdvanceOutcome, SequencerState};
use battlr::session::BattleSession;
use battlr::vote::Submission;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct FakeElement {
    position: Duration,
    cold: bool,
    paused: bool,
    ended: bool,
    ready: ReadyState,
    loads: usize,
    events: VecDeque<MediaEvent>,
}

impl FakeElement {
    fn new() -> Self {
        Self {
            position: Duration::ZERO,
            cold: false,
            paused: true,
            ended: false,
            ready: ReadyState::HaveNothing,
            loads: 0,
            events: VecDeque::new(),
        }
    }

    /// Position only moves once playback time has passed.
    fn cold() -> Self {
        Self {
            cold: true,
            ..Self::new()
        }
    }

    fn advance_clock(&mut self) {
        if !self.paused {
            self.position += Duration::from_millis(40);
        }
    }

    fn finish(&mut self) {
        if self.paused {
            return;
        }
        self.paused = true;
        self.ended = true;
        self.events.push_back(MediaEvent::Ended);
    }
}

impl MediaElement for FakeElement {
    fn play(&mut self) -> Result<()> {
        if !self.paused {
            return Ok(());
        }
        self.paused = false;
        self.ended = false;
        self.ready = ReadyState::HaveEnoughData;
        if !self.cold {
            self.position = Duration::from_millis(40);
        }
        self.events.push_back(MediaEvent::Started);
        Ok(())
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn load(&mut self) -> Result<()> {
        self.loads += 1;
        self.position = Duration::ZERO;
        self.ready = ReadyState::HaveEnoughData;
        Ok(())
    }

    fn position(&self) -> Duration {
        self.position
    }

    fn duration(&self) -> Option<Duration> {
        Some(Duration::from_secs(90))
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

fn session(len: usize) -> BattleSession<FakeElement> {
    session_with(len, FakeElement::new)
}

fn cold_session(len: usize) -> BattleSession<FakeElement> {
    session_with(len, FakeElement::cold)
}

fn session_with(len: usize, make: fn() -> FakeElement) -> BattleSession<FakeElement> {
    let clips = (0..len)
        .map(|n| Clip {
            id: format!("author{n}-beat{n}.wav"),
            author: format!("author{n}"),
            title: format!("beat{n}"),
            path: format!("round/author{n}-beat{n}.wav").into(),
            notes: None,
        })
        .collect();
    let battle = Battle {
        name: String::from("round-1"),
        clips,
    };
    BattleSession::from_battle(battle, Settings::default(), |_| make())
}

fn media(session: &mut BattleSession<FakeElement>, index: usize) -> &mut FakeElement {
    session
        .registry
        .get_mut(index)
        .expect("entry")
        .media_mut()
}

fn playing_count(session: &BattleSession<FakeElement>) -> usize {
    session
        .registry
        .list()
        .iter()
        .filter(|entry| entry.is_playing())
        .count()
}

#[test]
fn selected_entry_plays_and_is_marked() {
    let mut session = session(3);
    let now = Instant::now();
    session.select_next();
    session.play_selected();
    session.tick(now);

    assert_eq!(session.state(), SequencerState::Playing(1));
    assert_eq!(session.now_playing_markers(), vec![false, true, false]);
    assert!(session.status.starts_with("Playing "));
}

#[test]
fn starting_another_entry_pauses_the_first() {
    let mut session = session(3);
    let now = Instant::now();
    session.play_selected();
    session.tick(now);

    session.select_next();
    session.select_next();
    session.play_selected();
    session.tick(now);

    assert!(media(&mut session, 0).is_paused());
    assert_eq!(session.state(), SequencerState::Playing(2));
    assert_eq!(playing_count(&session), 1);
}

#[test]
fn ended_entry_advances_after_delay() {
    let mut session = session(2);
    let now = Instant::now();
    session.set_delay(2);
    session.play_selected();
    session.tick(now);

    media(&mut session, 0).finish();
    session.tick(now);
    let deadline = now + Duration::from_millis(2_100);
    assert_eq!(
        session.state(),
        SequencerState::AwaitingAdvance { next: 1, deadline }
    );
    assert_eq!(media(&mut session, 1).loads, 1);

    session.tick(deadline - Duration::from_millis(1));
    assert!(media(&mut session, 1).is_paused());

    session.tick(deadline);
    assert_eq!(session.state(), SequencerState::Playing(1));
    let label = session.registry.get(1).expect("entry").clip().label();
    assert_eq!(session.status, format!("Autoplay: {label}"));
}

#[test]
fn turning_autoplay_off_in_the_window_keeps_silence() {
    let mut session = session(2);
    let now = Instant::now();
    session.play_selected();
    session.tick(now);
    media(&mut session, 0).finish();
    session.tick(now);

    session.toggle_autoplay();
    session.tick(now + Duration::from_secs(5));

    assert_eq!(playing_count(&session), 0);
    assert_eq!(session.state(), SequencerState::Idle);
}

#[test]
fn last_entry_ending_stops_the_sequence() {
    let mut session = session(2);
    let now = Instant::now();
    session.select_next();
    session.play_selected();
    session.tick(now);
    media(&mut session, 1).finish();
    session.tick(now);

    assert_eq!(session.sequencer.pending_count(), 0);
    assert_eq!(session.state(), SequencerState::Idle);
}

#[test]
fn manual_start_during_window_wins() {
    let mut session = session(3);
    let now = Instant::now();
    session.play_selected();
    session.tick(now);
    media(&mut session, 0).finish();
    session.tick(now);

    session.select_next();
    session.select_next();
    session.play_selected();
    session.tick(now + Duration::from_millis(10));
    session.tick(now + Duration::from_secs(3));

    assert_eq!(session.state(), SequencerState::Playing(2));
    assert!(media(&mut session, 1).is_paused());
}

#[test]
fn reenabling_autoplay_does_not_revive_a_finished_decision() {
    let mut session = session(3);
    let now = Instant::now();
    session.set_autoplay(false);
    session.play_selected();
    session.tick(now);
    media(&mut session, 0).finish();
    session.tick(now);

    session.set_autoplay(true);
    session.tick(now + Duration::from_secs(30));
    assert_eq!(session.sequencer.pending_count(), 0);
    assert_eq!(playing_count(&session), 0);
}

#[test]
fn autoplay_flicker_inside_the_window_still_advances() {
    let mut session = session(2);
    let now = Instant::now();
    session.play_selected();
    session.tick(now);
    media(&mut session, 0).finish();
    session.tick(now);

    session.toggle_autoplay();
    session.toggle_autoplay();
    session.tick(now + Duration::from_millis(1_100));
    assert_eq!(session.state(), SequencerState::Playing(1));
}

#[test]
fn header_state_follows_manual_start_inside_the_window() {
    let mut session = session(3);
    let now = Instant::now();
    session.play_selected();
    session.tick(now);
    media(&mut session, 0).finish();
    session.tick(now);

    session.selected = 2;
    session.play_selected();
    session.tick(now + Duration::from_millis(10));
    assert_eq!(session.sequencer.pending_count(), 1);
    assert_eq!(session.state(), SequencerState::Playing(2));
}

#[test]
fn play_clip_finds_entry_by_file_name() {
    let mut session = session(3);
    let now = Instant::now();
    session.play_clip("author2-beat2.wav");
    session.tick(now);

    let index = session
        .registry
        .position_of("author2-beat2.wav")
        .expect("listed");
    assert_eq!(session.selected, index);
    assert_eq!(session.state(), SequencerState::Playing(index));

    session.play_clip("missing.wav");
    assert_eq!(session.status, "No entry named missing.wav");
}

#[test]
fn delay_is_clamped_to_slider_range() {
    let mut session = session(1);
    session.set_delay(99);
    assert_eq!(session.settings.delay_slider, 10);
    assert_eq!(session.delay_label(), "10.1s");
    session.adjust_delay(-20);
    assert_eq!(session.settings.delay_slider, 0);
    assert_eq!(session.controls().delay(), Duration::from_millis(100));
    assert_eq!(session.delay_label(), "0.1s");
    session.set_delay(1);
    assert_eq!(session.delay_label(), "1.1s");
}

#[test]
fn votes_move_scores_between_entries() {
    let mut session = session(3);
    let first = session.selected_clip().expect("entry").id.clone();
    let submission = session.vote_selected(3).expect("vote");
    let Submission::Vote(request) = submission else {
        panic!("expected a vote");
    };
    assert_eq!(request.battle_name, "round-1");
    assert_eq!(request.entry_id, first);

    session.select_next();
    let second = session.selected_clip().expect("entry").id.clone();
    session.vote_selected(3).expect("vote");
    assert_eq!(session.ballot.score_for(&first), None);
    assert!(session.ballot.is_marked(&second, 3));

    assert!(session.vote_selected(7).is_none());
    assert!(session.status.starts_with("vote error"));

    assert!(matches!(session.retract_votes(), Submission::Unvote(_)));
    assert_eq!(session.ballot.score_for(&second), None);
}

#[test]
fn empty_battle_is_inert() {
    let mut session = session(0);
    session.select_next();
    session.play_selected();
    session.tick(Instant::now());
    assert_eq!(session.status, "Nothing selected");
    assert_eq!(session.state(), SequencerState::Idle);
    assert!(session.vote_selected(1).is_none());
}

#[test]
fn advances_falling_due_together_start_one_entry() {
    let mut session = cold_session(4);
    let now = Instant::now();
    session.set_delay(2);
    session.play_selected();
    session.tick(now);
    media(&mut session, 0).advance_clock();
    media(&mut session, 0).finish();
    session.tick(now);

    session.set_delay(0);
    session.selected = 2;
    session.play_selected();
    session.tick(now + Duration::from_millis(1_000));
    media(&mut session, 2).advance_clock();
    media(&mut session, 2).finish();
    session.tick(now + Duration::from_millis(2_000));

    session.tick(now + Duration::from_millis(2_100));
    let unpaused: Vec<usize> = (0..4)
        .filter(|index| !media(&mut session, *index).is_paused())
        .collect();
    assert_eq!(unpaused, vec![1]);
    assert_eq!(session.sequencer.active(), Some(1));
    assert_eq!(session.now_playing_markers(), vec![false, true, false, false]);
}

proptest::proptest! {
    #[test]
    fn at_most_one_entry_plays(ops in proptest::collection::vec((0u8..6, 0usize..5), 1..60)) {
        let mut session = session(5);
        let mut now = Instant::now();
        for (op, index) in ops {
            match op {
                0 => {
                    session.selected = index;
                    session.play_selected();
                }
                1 => media(&mut session, index).finish(),
                2 => session.toggle_autoplay(),
                3 => {
                    session.selected = index;
                    session.toggle_pause_selected();
                }
                4 => now += Duration::from_millis(1_200),
                _ => session.set_delay(index as u32),
            }
            session.tick(now);
            proptest::prop_assert!(playing_count(&session) <= 1);
        }
    }

    #[test]
    fn autoplay_starts_survive_with_slow_starting_elements(
        ops in proptest::collection::vec((0u8..6, 0usize..5), 1..80)
    ) {
        let mut session = cold_session(5);
        let mut now = Instant::now();
        for (op, index) in ops {
            match op {
                0 => {
                    session.selected = index;
                    session.play_selected();
                }
                1 => media(&mut session, index).finish(),
                2 => session.toggle_autoplay(),
                3 => {
                    now += Duration::from_millis(700);
                    for entry in session.registry.list_mut() {
                        entry.media_mut().advance_clock();
                    }
                }
                4 => now += Duration::from_millis(100 * index as u64),
                _ => session.set_delay(index as u32),
            }
            let controls = session.controls();
            let outcomes = session.sequencer.pump(&mut session.registry, controls, now);

            let started: Vec<usize> = outcomes
                .iter()
                .filter_map(|outcome| match outcome {
                    AdvanceOutcome::Started(next) => Some(*next),
                    _ => None,
                })
                .collect();
            proptest::prop_assert!(started.len() <= 1);
            for next in started {
                proptest::prop_assert!(!media(&mut session, next).is_paused());
                proptest::prop_assert_eq!(session.sequencer.active(), Some(next));
            }
            let unpaused = session
                .registry
                .list()
                .iter()
                .filter(|entry| !entry.media().is_paused())
                .count();
            proptest::prop_assert!(unpaused <= 1);
        }
    }
}
