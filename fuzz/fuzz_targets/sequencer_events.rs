#![no_main]

use anyhow::Result;
use battlr::model::Clip;
use battlr::registry::{MediaElement, MediaEvent, PlaybackRegistry, ReadyState};
use battlr::sequencer::{AdvanceOutcome, PlayerControls, Sequencer};
use libfuzzer_sys::fuzz_target;
use std::time::{Duration, Instant};

#[derive(Default)]
struct Element {
    paused: bool,
    ended: bool,
    position: Duration,
    ready: ReadyState,
    event: Option<MediaEvent>,
}

impl MediaElement for Element {
    fn play(&mut self) -> Result<()> {
        if !self.paused {
            return Ok(());
        }
        self.paused = false;
        self.ended = false;
        self.ready = ReadyState::HaveEnoughData;
        self.event = Some(MediaEvent::Started);
        Ok(())
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn load(&mut self) -> Result<()> {
        self.position = Duration::ZERO;
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
        self.event.take()
    }
}

fuzz_target!(|data: &[u8]| {
    let len = (data.len() % 8).max(1);
    let mut registry = PlaybackRegistry::new((0..len).map(|idx| {
        let clip = Clip {
            id: format!("{idx}.wav"),
            author: String::new(),
            title: format!("{idx}"),
            path: format!("{idx}.wav").into(),
            notes: None,
        };
        let element = Element {
            paused: true,
            ..Element::default()
        };
        (clip, element)
    }));
    let mut sequencer = Sequencer::new();
    let mut controls = PlayerControls {
        autoplay: true,
        delay_slider: 0,
    };
    let mut now = Instant::now();

    for byte in data {
        let index = usize::from(byte >> 4) % len;
        match byte % 5 {
            0 => {
                if let Some(entry) = registry.get_mut(index) {
                    let _ = entry.media_mut().play();
                }
            }
            1 => {
                if let Some(entry) = registry.get_mut(index) {
                    let media = entry.media_mut();
                    if !media.paused {
                        media.paused = true;
                        media.ended = true;
                        media.event = Some(MediaEvent::Ended);
                    }
                }
            }
            2 => controls.autoplay = !controls.autoplay,
            3 => controls.delay_slider = u32::from(byte >> 4) % 11,
            _ => {
                now += Duration::from_millis(u64::from(*byte) * 50);
                for entry in registry.list_mut() {
                    let media = entry.media_mut();
                    if !media.paused {
                        media.position += Duration::from_millis(50);
                    }
                }
            }
        }
        let outcomes = sequencer.pump(&mut registry, controls, now);
        let started: Vec<usize> = outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                AdvanceOutcome::Started(next) => Some(*next),
                _ => None,
            })
            .collect();
        assert!(started.len() <= 1);
        for next in started {
            assert_eq!(sequencer.active(), Some(next));
        }
        let unpaused = registry.list().iter().filter(|entry| !entry.media().paused).count();
        assert!(unpaused <= 1);
    }
});
