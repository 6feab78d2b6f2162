// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The metronome engine. Owns the beat state and wires the clock to sound, haptics
//! and the UI subscriber.
//!
//! All state lives behind one lock. The tick path takes it only to advance the
//! sequencer and copy what it needs; sound, haptics and the subscriber run with
//! the lock released, so any of them may call back into the engine.

use std::{
    error::Error,
    sync::{Arc, Weak},
    time::Instant,
};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, info, span, Level};

use crate::{
    clock::{Clock, Disarmed, TickFn},
    feedback::FeedbackDispatcher,
    sequencer::{BeatSequencer, BeatTick},
    session::{Session, SessionRecorder},
    sound::SoundRenderer,
    storage::Preset,
    tempo::{SoundType, TempoConfig},
    util,
};

/// Source of wall clock time in unix epoch milliseconds. Used for sessions only,
/// beats are timed by the [`Clock`].
pub type WallClock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Receives every beat. There is at most one subscriber per engine.
#[derive(Clone)]
pub enum Subscriber {
    /// Called on the clock thread for every beat. Must return quickly.
    Callback(Arc<dyn Fn(&BeatTick) + Send + Sync>),
    /// Beats are queued for polling. A full queue drops the beat.
    Channel(Sender<BeatTick>),
}

impl Subscriber {
    fn notify(&self, tick: &BeatTick) {
        match self {
            Subscriber::Callback(callback) => callback(tick),
            Subscriber::Channel(tx) => match tx.try_send(*tick) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    debug!(beat = tick.beat_index, "Subscriber is behind, dropping beat")
                }
                Err(TrySendError::Disconnected(_)) => {
                    debug!(beat = tick.beat_index, "Subscriber is gone, dropping beat")
                }
            },
        }
    }
}

/// A snapshot of the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineState {
    pub is_running: bool,
    /// The position the next beat will get.
    pub current_beat: u8,
    pub active_config: TempoConfig,
}

/// The metronome. Cheap to clone; clones control the same engine.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

struct Inner {
    clock: Arc<dyn Clock>,
    renderer: Arc<dyn SoundRenderer>,
    feedback: FeedbackDispatcher,
    recorder: Option<SessionRecorder>,
    wall_clock: WallClock,
    state: Mutex<State>,
    /// Held across initialize() and cleanup() so they pair up.
    initialized: Mutex<bool>,
}

struct State {
    running: bool,
    /// Bumped on every start and stop. A tick from an older run is ignored.
    generation: u64,
    sequencer: BeatSequencer,
    config: TempoConfig,
    session: Option<Session>,
    subscriber: Option<Subscriber>,
}

/// Builds an [`Engine`] from its parts.
pub struct EngineBuilder {
    clock: Arc<dyn Clock>,
    renderer: Arc<dyn SoundRenderer>,
    feedback: Option<FeedbackDispatcher>,
    recorder: Option<SessionRecorder>,
    config: TempoConfig,
    wall_clock: WallClock,
}

impl EngineBuilder {
    /// Haptic feedback. Defaults to none.
    pub fn feedback(mut self, feedback: FeedbackDispatcher) -> Self {
        self.feedback = Some(feedback);
        self
    }

    /// Where finished sessions go. Without a recorder sessions are discarded.
    pub fn recorder(mut self, recorder: SessionRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// The starting configuration. Defaults to [`TempoConfig::default`].
    pub fn config(mut self, config: TempoConfig) -> Self {
        self.config = config;
        self
    }

    pub fn wall_clock(mut self, wall_clock: WallClock) -> Self {
        self.wall_clock = wall_clock;
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            inner: Arc::new(Inner {
                clock: self.clock,
                renderer: self.renderer,
                feedback: self.feedback.unwrap_or_else(FeedbackDispatcher::disabled),
                recorder: self.recorder,
                wall_clock: self.wall_clock,
                state: Mutex::new(State {
                    running: false,
                    generation: 0,
                    sequencer: BeatSequencer::new(self.config.time_signature.numerator),
                    config: self.config,
                    session: None,
                    subscriber: None,
                }),
                initialized: Mutex::new(false),
            }),
        }
    }
}

impl Engine {
    pub fn builder(clock: Arc<dyn Clock>, renderer: Arc<dyn SoundRenderer>) -> EngineBuilder {
        EngineBuilder {
            clock,
            renderer,
            feedback: None,
            recorder: None,
            config: TempoConfig::default(),
            wall_clock: Arc::new(util::now_millis),
        }
    }

    /// Loads samples and opens the audio output. Calling it again is a no-op.
    pub fn initialize(&self) -> Result<(), Box<dyn Error>> {
        let mut initialized = self.inner.initialized.lock();
        if *initialized {
            return Ok(());
        }
        self.inner.renderer.initialize()?;
        *initialized = true;
        info!("Engine initialized");
        Ok(())
    }

    /// Stops the metronome, releases samples and closes the audio output.
    pub fn cleanup(&self) {
        self.stop();
        let mut initialized = self.inner.initialized.lock();
        if !*initialized {
            return;
        }
        self.inner.renderer.cleanup();
        *initialized = false;
        info!("Engine cleaned up");
    }

    /// Applies a new configuration. Takes effect on the next beat when running.
    pub fn configure(&self, config: TempoConfig) {
        let span = span!(Level::INFO, "engine");
        let _enter = span.enter();

        let disarmed = {
            let mut state = self.inner.state.lock();
            let previous = std::mem::replace(&mut state.config, config);
            let current = &state.config;

            let numerator_changed =
                previous.time_signature.numerator != current.time_signature.numerator;
            let time_signature_changed = previous.time_signature != current.time_signature;
            let interval_changed = previous.interval() != current.interval();
            let numerator = current.time_signature.numerator;
            let interval = current.interval();
            debug!(
                bpm = current.bpm,
                time_signature = %current.time_signature,
                sound = current.sound_type.as_str(),
                "Configured"
            );

            if numerator_changed {
                state.sequencer.set_numerator(numerator);
            } else if time_signature_changed && !state.running {
                state.sequencer.reset();
            }

            if state.running && interval_changed {
                info!(interval_ms = interval.as_millis() as u64, "Changing tempo");
                self.inner.clock.reconfigure(interval)
            } else {
                Disarmed::nothing()
            }
        };
        disarmed.wait();
    }

    /// Starts the metronome. The first beat plays immediately. No-op if running.
    pub fn start(&self) {
        let span = span!(Level::INFO, "engine");
        let _enter = span.enter();

        let disarmed = {
            let mut state = self.inner.state.lock();
            if state.running {
                info!("Already running");
                return;
            }

            state.running = true;
            state.generation += 1;
            state.sequencer.reset();
            state.session = Some(Session::open(&state.config, (self.inner.wall_clock)()));

            let interval = state.config.interval();
            info!(
                bpm = state.config.bpm,
                time_signature = %state.config.time_signature,
                "Starting"
            );
            let on_tick = tick_fn(Arc::downgrade(&self.inner), state.generation);
            self.inner.clock.start(interval, on_tick)
        };
        disarmed.wait();
    }

    /// Stops the metronome and records the session. No beat is delivered after
    /// this returns, unless called from within a beat. No-op if idle.
    pub fn stop(&self) {
        let span = span!(Level::INFO, "engine");
        let _enter = span.enter();

        let (disarmed, session) = {
            let mut state = self.inner.state.lock();
            if !state.running {
                info!("Not running");
                return;
            }

            state.running = false;
            state.generation += 1;
            state.sequencer.reset();
            let now = (self.inner.wall_clock)();
            let session = state.session.take().map(|session| session.finalize(now));
            info!("Stopping");
            (self.inner.clock.stop(), session)
        };
        disarmed.wait();

        if let Some(session) = session {
            match &self.inner.recorder {
                Some(recorder) => recorder.record(session),
                None => debug!(id = session.id, "No session recorder, discarding session"),
            }
        }
    }

    /// Stops if running, starts otherwise.
    pub fn toggle(&self) {
        if self.is_running() {
            self.stop();
        } else {
            self.start();
        }
    }

    pub fn load_preset(&self, preset: &Preset) {
        info!(preset = preset.name, "Loading preset");
        self.configure(preset.config.clone());
    }

    pub fn set_vibration_enabled(&self, enabled: bool) {
        self.inner.feedback.set_enabled(enabled);
    }

    pub fn play_preview(&self, sound_type: SoundType) {
        self.inner.renderer.play_preview(sound_type);
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }

    pub fn state(&self) -> EngineState {
        let state = self.inner.state.lock();
        EngineState {
            is_running: state.running,
            current_beat: state.sequencer.current_beat(),
            active_config: state.config.clone(),
        }
    }

    /// The open session, if running.
    pub fn current_session(&self) -> Option<Session> {
        self.inner.state.lock().session.clone()
    }

    /// Replaces the subscriber.
    pub fn subscribe(&self, subscriber: Subscriber) {
        self.inner.state.lock().subscriber = Some(subscriber);
    }

    /// Calls `callback` on every beat, replacing any previous subscriber.
    pub fn subscribe_callback<F>(&self, callback: F)
    where
        F: Fn(&BeatTick) + Send + Sync + 'static,
    {
        self.subscribe(Subscriber::Callback(Arc::new(callback)));
    }

    /// Queues beats on a channel holding at most `capacity` of them, replacing any
    /// previous subscriber.
    pub fn subscribe_channel(&self, capacity: usize) -> Receiver<BeatTick> {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        self.subscribe(Subscriber::Channel(tx));
        rx
    }

    pub fn unsubscribe(&self) {
        self.inner.state.lock().subscriber = None;
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.clock.stop().wait();
        let state = self.state.get_mut();
        if let (Some(session), Some(recorder)) = (state.session.take(), &self.recorder) {
            recorder.record(session.finalize((self.wall_clock)()));
        }
    }
}

fn tick_fn(inner: Weak<Inner>, generation: u64) -> TickFn {
    Arc::new(move |timestamp| {
        if let Some(inner) = inner.upgrade() {
            on_tick(&inner, generation, timestamp);
        }
    })
}

fn on_tick(inner: &Inner, generation: u64, timestamp: Instant) {
    let (tick, config, subscriber) = {
        let mut state = inner.state.lock();
        if !state.running || state.generation != generation {
            return;
        }
        let tick = state.sequencer.tick(timestamp);
        (tick, state.config.clone(), state.subscriber.clone())
    };
    debug!(beat = tick.beat_index, accent = tick.is_accent, "Beat");

    inner.renderer.play_tick(
        config.sound_type,
        tick.is_accent,
        &config.sound_modifications,
        config.volume,
    );
    inner.feedback.pulse(tick.is_accent);
    if let Some(subscriber) = subscriber {
        subscriber.notify(&tick);
    }
}

#[cfg(test)]
mod test {
    use std::{
        collections::HashMap,
        path::PathBuf,
        sync::{
            atomic::{AtomicU64, Ordering},
            Arc,
        },
        thread,
        time::{Duration, Instant},
    };

    use parking_lot::Mutex;
    use serial_test::serial;

    use super::*;
    use crate::{
        audio::{self, Device as _},
        clock::{
            mock::{self, Call},
            ThreadClock,
        },
        feedback::{self, Impact},
        sound::SampleRenderer,
        storage::{memory, Storage},
        tempo::{Subdivision, TimeSignature, MAX_NUMERATOR, MIN_NUMERATOR},
        testutil::{eventually, never},
    };

    struct Harness {
        engine: Engine,
        clock: Arc<mock::Clock>,
        device: Arc<audio::mock::Device>,
        storage: Arc<memory::Storage>,
        now: Arc<AtomicU64>,
    }

    fn harness_with(files: HashMap<SoundType, PathBuf>, clock: Arc<dyn Clock>) -> Harness {
        let device = audio::mock::Device::get("mock-engine");
        let mock_device = device.to_mock().unwrap();
        let renderer = Arc::new(SampleRenderer::new(Arc::new(device), files));
        let storage = Arc::new(memory::Storage::new());
        let now = Arc::new(AtomicU64::new(1_000_000));

        let engine = Engine::builder(clock, renderer)
            .recorder(SessionRecorder::new(storage.clone()))
            .wall_clock({
                let now = now.clone();
                Arc::new(move || now.load(Ordering::SeqCst))
            })
            .build();
        engine.initialize().unwrap();

        Harness {
            engine,
            clock: Arc::new(mock::Clock::new()),
            device: mock_device,
            storage,
            now,
        }
    }

    fn harness() -> Harness {
        let clock = Arc::new(mock::Clock::new());
        let mut harness = harness_with(HashMap::new(), clock.clone());
        harness.clock = clock;
        harness
    }

    fn recorded_beats(engine: &Engine) -> Arc<Mutex<Vec<BeatTick>>> {
        let beats = Arc::new(Mutex::new(Vec::new()));
        engine.subscribe_callback({
            let beats = beats.clone();
            move |tick| beats.lock().push(*tick)
        });
        beats
    }

    fn config(bpm: u16, numerator: i64) -> TempoConfig {
        TempoConfig {
            bpm,
            time_signature: TimeSignature::new(numerator, 4),
            ..Default::default()
        }
    }

    #[test]
    fn test_beats_cycle_through_the_bar() {
        for numerator in MIN_NUMERATOR..=MAX_NUMERATOR {
            let h = harness();
            h.engine.configure(config(120, numerator.into()));
            let beats = recorded_beats(&h.engine);

            h.engine.start();
            let count = usize::from(numerator) * 2 + 1;
            assert_eq!(count, h.clock.fire_times(count));

            let beats = beats.lock();
            for (i, beat) in beats.iter().enumerate() {
                assert_eq!((i % usize::from(numerator)) as u8, beat.beat_index);
                assert_eq!(beat.beat_index == 0, beat.is_accent);
            }
            h.engine.stop();
        }
    }

    #[test]
    fn test_start_arms_clock_with_bpm_interval() {
        let h = harness();
        h.engine.configure(config(150, 4));
        h.engine.start();

        assert_eq!(
            vec![Call::Start(Duration::from_millis(400))],
            h.clock.calls()
        );
        let state = h.engine.state();
        assert!(state.is_running);
        assert_eq!(0, state.current_beat);
        assert_eq!(150, state.active_config.bpm);
    }

    #[test]
    fn test_start_stop_records_one_session() {
        let h = harness();
        h.engine.start();
        let session = h.engine.current_session().unwrap();
        assert!(session.is_open());
        assert_eq!("1000000", session.id);

        h.engine.stop();
        assert!(h.engine.current_session().is_none());
        assert!(!h.clock.fire(), "Tick delivered after stop");

        eventually(|| h.storage.sessions().len() == 1, "Session never saved");
        let sessions = h.storage.sessions();
        assert_eq!(0, sessions[0].duration);
        assert_eq!(120, sessions[0].bpm);
        assert_eq!(1_000_000, sessions[0].end_time);
    }

    #[test]
    fn test_session_duration() {
        let h = harness();
        h.engine.configure(config(90, 3));
        h.engine.start();
        h.now.fetch_add(2500, Ordering::SeqCst);
        h.engine.stop();

        eventually(|| h.storage.sessions().len() == 1, "Session never saved");
        let session = &h.storage.sessions()[0];
        assert_eq!(2, session.duration);
        assert_eq!(90, session.bpm);
        assert_eq!(3, session.time_signature.numerator);
    }

    #[test]
    fn test_double_start_and_stop_are_noops() {
        let h = harness();
        h.engine.stop();
        h.engine.start();
        h.engine.start();
        assert_eq!(1, h.clock.start_count());

        h.engine.stop();
        h.engine.stop();
        assert_eq!(
            vec![Call::Start(Duration::from_millis(500)), Call::Stop],
            h.clock.calls()
        );

        eventually(|| h.storage.sessions().len() == 1, "Session never saved");
        never(
            || h.storage.sessions().len() > 1,
            Duration::from_millis(50),
            "Extra session saved",
        );
    }

    #[test]
    fn test_toggle() {
        let h = harness();
        h.engine.toggle();
        assert!(h.engine.is_running());
        h.engine.toggle();
        assert!(!h.engine.is_running());
        assert_eq!(2, h.clock.calls().len());
    }

    #[test]
    fn test_stop_resets_beat() {
        let h = harness();
        h.engine.start();
        h.clock.fire_times(3);
        assert_eq!(3, h.engine.state().current_beat);
        h.engine.stop();
        assert_eq!(0, h.engine.state().current_beat);

        // A restart begins on the downbeat.
        let beats = recorded_beats(&h.engine);
        h.engine.start();
        h.clock.fire();
        assert!(beats.lock()[0].is_accent);
    }

    #[test]
    fn test_configure_while_running_reconfigures_on_interval_change() {
        let h = harness();
        h.engine.start();
        h.clock.fire_times(2);

        // Same tempo, new sound: the clock is left alone and the beat carries on.
        h.engine.configure(TempoConfig {
            sound_type: SoundType::Drum,
            subdivision: Subdivision::Triplet,
            ..Default::default()
        });
        assert_eq!(1, h.clock.calls().len());
        assert_eq!(2, h.engine.state().current_beat);

        h.engine.configure(TempoConfig {
            bpm: 60,
            ..Default::default()
        });
        assert_eq!(
            vec![
                Call::Start(Duration::from_millis(500)),
                Call::Reconfigure(Duration::from_secs(1)),
            ],
            h.clock.calls()
        );
        assert_eq!(Some(Duration::from_secs(1)), h.clock.interval());
        // The numerator didn't change, so neither did the position.
        assert_eq!(2, h.engine.state().current_beat);
    }

    #[test]
    fn test_configure_resets_beat_on_numerator_change() {
        let h = harness();
        h.engine.start();
        h.clock.fire_times(2);
        h.engine.configure(config(120, 3));
        assert_eq!(0, h.engine.state().current_beat);

        let beats = recorded_beats(&h.engine);
        h.clock.fire_times(4);
        let indices: Vec<u8> = beats.lock().iter().map(|b| b.beat_index).collect();
        assert_eq!(vec![0, 1, 2, 0], indices);
    }

    #[test]
    fn test_configure_while_idle() {
        let h = harness();
        h.engine.configure(config(200, 6));
        assert!(h.clock.calls().is_empty());

        let state = h.engine.state();
        assert!(!state.is_running);
        assert_eq!(200, state.active_config.bpm);
        assert_eq!(6, state.active_config.time_signature.numerator);
    }

    #[test]
    fn test_tick_volume_and_pitch() {
        let h = harness();
        h.engine.configure(TempoConfig {
            sound_type: SoundType::Stick,
            sound_modifications: crate::tempo::SoundModifications {
                enabled: true,
                pitch: -20,
                ..Default::default()
            },
            ..Default::default()
        });
        h.engine.start();
        h.clock.fire_times(2);

        let played = h.device.played();
        assert_eq!(2, played.len());
        assert_eq!(1.0, played[0].volume);
        assert!((played[1].volume - 0.8).abs() < f32::EPSILON);
        assert!((played[0].rate - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_missing_sample_keeps_beats() {
        let clock = Arc::new(mock::Clock::new());
        let h = harness_with(
            HashMap::from([(SoundType::Click, PathBuf::from("/nonexistent/click.wav"))]),
            clock.clone(),
        );
        let beats = recorded_beats(&h.engine);

        h.engine.start();
        assert_eq!(4, clock.fire_times(4));
        assert_eq!(4, beats.lock().len());
        assert_eq!(0, h.device.played_count());
    }

    #[test]
    fn test_start_without_initialize_is_silent() {
        let device = audio::mock::Device::get("mock-uninitialized");
        let mock_device = device.to_mock().unwrap();
        let clock = Arc::new(mock::Clock::new());
        let engine = Engine::builder(
            clock.clone(),
            Arc::new(SampleRenderer::new(Arc::new(device), HashMap::new())),
        )
        .build();
        let beats = recorded_beats(&engine);

        engine.start();
        clock.fire_times(2);
        assert_eq!(2, beats.lock().len());
        assert_eq!(0, mock_device.played_count());
        engine.stop();
    }

    #[test]
    fn test_feedback_pulses() {
        let haptics = feedback::mock::Device::get("mock-haptics");
        let clock = Arc::new(mock::Clock::new());
        let engine = Engine::builder(
            clock.clone(),
            Arc::new(SampleRenderer::new(
                Arc::new(audio::mock::Device::get("mock")),
                HashMap::new(),
            )),
        )
        .feedback(FeedbackDispatcher::new(Some(Box::new(haptics.clone())), true))
        .config(config(120, 2))
        .build();

        engine.start();
        clock.fire_times(3);
        eventually(|| haptics.pulses().len() == 3, "Pulses never arrived");
        assert_eq!(
            vec![Impact::Medium, Impact::Light, Impact::Medium],
            haptics.pulses()
        );

        engine.set_vibration_enabled(false);
        clock.fire_times(2);
        never(
            || haptics.pulses().len() > 3,
            Duration::from_millis(50),
            "Pulsed with vibration off",
        );
    }

    #[test]
    fn test_channel_subscriber_drops_when_full() {
        let h = harness();
        let rx = h.engine.subscribe_channel(2);
        h.engine.start();
        h.clock.fire_times(5);

        let beats: Vec<BeatTick> = rx.try_iter().collect();
        assert_eq!(2, beats.len());
        assert_eq!(0, beats[0].beat_index);
        assert_eq!(1, beats[1].beat_index);

        // The engine kept going regardless.
        assert_eq!(5, h.device.played_count());
    }

    #[test]
    fn test_subscriber_replaced_and_removed() {
        let h = harness();
        let first = recorded_beats(&h.engine);
        let second = recorded_beats(&h.engine);
        h.engine.start();
        h.clock.fire();
        assert!(first.lock().is_empty());
        assert_eq!(1, second.lock().len());

        h.engine.unsubscribe();
        h.clock.fire();
        assert_eq!(1, second.lock().len());
    }

    #[test]
    fn test_stop_from_subscriber() {
        let h = harness();
        let handle = h.engine.clone();
        h.engine.subscribe_callback(move |tick| {
            if tick.beat_index == 2 {
                handle.stop();
            }
        });

        h.engine.start();
        assert_eq!(3, h.clock.fire_times(10));
        assert!(!h.engine.is_running());
        h.engine.unsubscribe();
    }

    #[test]
    fn test_load_preset_and_preview() {
        let h = harness();
        let preset = Preset::new("Slow", config(60, 3), 1);
        h.engine.load_preset(&preset);
        assert_eq!(preset.config, h.engine.state().active_config);

        h.engine.play_preview(SoundType::Ping);
        let played = h.device.played();
        assert_eq!(1, played.len());
        assert_eq!(crate::sound::PREVIEW_VOLUME, played[0].volume);
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let h = harness();
        h.engine.start();
        h.engine.cleanup();
        assert!(!h.engine.is_running());
        assert!(!h.device.is_open());
        h.engine.cleanup();

        // And the pair can run again.
        h.engine.initialize().unwrap();
        h.engine.initialize().unwrap();
        assert!(h.device.is_open());
        eventually(|| h.storage.sessions().len() == 1, "Session never saved");
    }

    fn thread_harness() -> Harness {
        harness_with(HashMap::new(), Arc::new(ThreadClock::new()))
    }

    fn timestamps(beats: &Arc<Mutex<Vec<BeatTick>>>) -> Vec<Instant> {
        beats.lock().iter().map(|b| b.timestamp).collect()
    }

    #[test]
    #[serial]
    fn test_thread_clock_cadence() {
        let h = thread_harness();
        h.engine.configure(config(240, 4));
        let beats = recorded_beats(&h.engine);

        h.engine.start();
        eventually(|| beats.lock().len() >= 5, "Not enough beats");
        h.engine.stop();

        let times = timestamps(&beats);
        for pair in times.windows(2).take(4) {
            let gap = pair[1] - pair[0];
            assert!(
                gap > Duration::from_millis(225) && gap < Duration::from_millis(275),
                "Beat gap was {:?}",
                gap
            );
        }

        let count = beats.lock().len();
        thread::sleep(Duration::from_millis(400));
        assert_eq!(count, beats.lock().len(), "Beat after stop returned");
    }

    #[test]
    #[serial]
    fn test_thread_clock_double_start() {
        let h = thread_harness();
        h.engine.configure(config(240, 4));
        let beats = recorded_beats(&h.engine);

        h.engine.start();
        h.engine.start();
        thread::sleep(Duration::from_millis(1100));
        h.engine.stop();

        // One clock gives 5 beats in 1.1 s at 250 ms, two would give about 10.
        let count = beats.lock().len();
        assert!((4..=6).contains(&count), "Got {} beats", count);
    }

    #[test]
    #[serial]
    fn test_thread_clock_tempo_change() {
        let h = thread_harness();
        h.engine.configure(config(120, 4));
        let beats = recorded_beats(&h.engine);

        h.engine.start();
        eventually(|| beats.lock().len() >= 2, "Not enough beats");
        let changed_at = Instant::now();
        h.engine.configure(config(60, 4));

        eventually(|| beats.lock().len() >= 4, "No beats after the tempo change");
        h.engine.stop();

        let after: Vec<Instant> = timestamps(&beats)
            .into_iter()
            .filter(|t| *t > changed_at)
            .collect();
        assert!(after[0] - changed_at >= Duration::from_millis(950));
        let gap = after[1] - after[0];
        assert!(
            gap > Duration::from_millis(950) && gap < Duration::from_millis(1050),
            "Beat gap was {:?}",
            gap
        );
    }

    #[test]
    #[serial]
    fn test_thread_clock_stop_from_subscriber() {
        let h = thread_harness();
        h.engine.configure(config(240, 4));
        let handle = h.engine.clone();
        let beats = Arc::new(Mutex::new(0));
        h.engine.subscribe_callback({
            let beats = beats.clone();
            move |tick| {
                *beats.lock() += 1;
                if tick.beat_index == 1 {
                    handle.stop();
                }
            }
        });

        h.engine.start();
        eventually(|| !h.engine.is_running(), "Engine never stopped itself");
        never(
            || *beats.lock() > 2,
            Duration::from_millis(400),
            "Beat after stop",
        );
        h.engine.unsubscribe();
        eventually(|| h.storage.sessions().len() == 1, "Session never saved");
    }

    #[test]
    #[serial]
    fn test_thread_clock_missing_sample_keeps_cadence() {
        let h = harness_with(
            HashMap::from([(SoundType::Click, PathBuf::from("/nonexistent/click.wav"))]),
            Arc::new(ThreadClock::new()),
        );
        h.engine.configure(config(240, 4));
        let beats = recorded_beats(&h.engine);

        h.engine.start();
        eventually(|| beats.lock().len() >= 4, "Not enough beats");
        h.engine.stop();

        let times = timestamps(&beats);
        for pair in times.windows(2).take(3) {
            let gap = pair[1] - pair[0];
            assert!(
                gap > Duration::from_millis(225) && gap < Duration::from_millis(275),
                "Beat gap was {:?}",
                gap
            );
        }
        assert_eq!(0, h.device.played_count());
    }
}
