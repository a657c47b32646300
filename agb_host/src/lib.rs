//! Host runtime bridging a Game Boy Advance emulation core to platform
//! video, audio, input and storage primitives.
//!
//! The core itself is an external collaborator behind the [`core::Core`]
//! trait. This crate owns the real-time glue: a dedicated emulation thread
//! paced to the native frame rate ([`pacing`]), latest-wins exchange of
//! frames and input between threads ([`sync`]), a fixed pool of audio
//! buffers with drop-on-full backpressure ([`audio`]), save memory
//! classification ([`save`]) and battery/save-state persistence
//! ([`persistence`]). [`Runtime`] composes all of it and is driven from
//! the render/UI thread.
pub mod audio;
pub mod color;
pub mod common;
pub mod core;
pub mod input;
pub mod pacing;
pub mod persistence;
pub mod save;
pub mod sensor;
pub mod sync;

use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::thread;
use std::thread::JoinHandle;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use log::info;
use log::warn;

use crate::audio::AudioBufferPool;
use crate::audio::AudioOut;
use crate::common::constants::AUDIO_SLOT_COUNT;
use crate::core::Core;
use crate::input::ButtonMap;
use crate::save::TitlePreferences;
use crate::sensor::LightSensor;
use crate::sync::InputSync;
use crate::sync::VideoFrame;
use crate::sync::VideoSync;

/// Lifecycle state of the runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum RuntimeState {
    NoGame,
    Running,
    Paused,
}

/// Construction options for [`Runtime`].
pub struct RuntimeOptions {
    pub button_map: ButtonMap,
    pub audio_slots: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            button_map: ButtonMap::default(),
            audio_slots: AUDIO_SLOT_COUNT,
        }
    }
}

/// Counters observable by tests and diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    pub video_frames: u64,
    pub audio_chunks: u64,
    pub dropped_audio_chunks: u64,
}

/// Everything guarded by the lifecycle lock. The emulation thread takes
/// this lock for each step burst, so holding it keeps the core at an
/// iteration boundary.
pub(crate) struct Session<C> {
    pub(crate) core: C,
    pub(crate) state: RuntimeState,
    pub(crate) rom_path: Option<PathBuf>,
    pub(crate) state_size: usize,
    pub(crate) preferences: TitlePreferences,
    pub(crate) button_map: ButtonMap,
    pub(crate) audio_pool: AudioBufferPool,
    pub(crate) audio_out: Box<dyn AudioOut + Send>,
    pub(crate) sensor: Box<dyn LightSensor + Send>,
    pub(crate) video_frames: u64,
    pub(crate) status: Option<String>,
}

/// State shared between the render/UI thread and the emulation thread:
/// the two synchronizer sides, the lifecycle lock and the shutdown flag.
/// The three locks are independent and never nested.
pub(crate) struct Shared<C> {
    pub(crate) video: VideoSync,
    pub(crate) input: InputSync,
    pub(crate) session: Mutex<Session<C>>,
    pub(crate) running: AtomicBool,
}

/// Top-level lifecycle controller. Owned and driven by the render/UI
/// thread; delegates execution to the emulation thread it spawns.
pub struct Runtime<C: Core + Send + 'static> {
    shared: Arc<Shared<C>>,
    worker: Option<JoinHandle<()>>,
}

impl<C: Core + Send + 'static> Runtime<C> {
    /// Builds the runtime context and spawns the emulation thread. The
    /// serialized state size is negotiated here, once, and reused for
    /// every later save/load.
    pub fn new(
        mut core: C,
        audio_out: Box<dyn AudioOut + Send>,
        sensor: Box<dyn LightSensor + Send>,
        options: RuntimeOptions,
    ) -> Result<Self> {
        let state_size = persistence::negotiate_state_size(&mut core)?;
        info!("serialized core state is {state_size} bytes");

        let shared = Arc::new(Shared {
            video: VideoSync::new(),
            input: InputSync::new(),
            session: Mutex::new(Session {
                core,
                state: RuntimeState::NoGame,
                rom_path: None,
                state_size,
                preferences: TitlePreferences::default(),
                button_map: options.button_map,
                audio_pool: AudioBufferPool::new(options.audio_slots),
                audio_out,
                sensor,
                video_frames: 0,
                status: None,
            }),
            running: AtomicBool::new(true),
        });

        let worker_shared = shared.clone();
        let worker = thread::Builder::new()
            .name("emulation".to_string())
            .spawn(move || pacing::emulation_loop(&worker_shared))
            .context("failed to spawn emulation thread")?;

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    fn session(&self) -> MutexGuard<'_, Session<C>> {
        self.shared.session.lock().unwrap()
    }

    /// Loads a ROM: classify save memory (or apply a title override),
    /// configure the core, pick up the battery image and start running.
    /// A previously loaded game has its battery persisted first.
    pub fn load_game(&self, path: &Path) -> Result<()> {
        let mut session = self.session();
        if let Some(previous) = session.rom_path.take() {
            session.state = RuntimeState::NoGame;
            persistence::save_battery(&mut session.core, &previous);
        }

        session
            .core
            .load_rom(path)
            .with_context(|| format!("failed to load {}", path.display()))?;

        let code = session.core.game_code();
        let prefs = match save::title_override(code) {
            Some(prefs) => {
                info!(
                    "using title override for {}",
                    String::from_utf8_lossy(&code)
                );
                prefs
            }
            None => {
                let detected = save::classify_save_memory(session.core.save_memory());
                info!("detected save type: {detected}");
                TitlePreferences::from_detected(detected)
            }
        };
        session.core.apply_preferences(&prefs);
        session.preferences = prefs;
        session.core.reset();

        if persistence::load_battery(&mut session.core, path) {
            session.status = Some(format!(
                "loaded savefile {}",
                persistence::battery_path(path).display()
            ));
        }

        session.rom_path = Some(path.to_path_buf());
        session.state = RuntimeState::Running;
        Ok(())
    }

    /// Persists the battery image and returns to `NoGame`.
    pub fn unload_game(&self) {
        let mut session = self.session();
        if let Some(rom_path) = session.rom_path.take() {
            info!(
                "unloading after {} video frames, {} audio chunks ({} dropped)",
                session.video_frames,
                session.audio_pool.published_chunks(),
                session.audio_pool.dropped_chunks()
            );
            if persistence::save_battery(&mut session.core, &rom_path) {
                session.status = Some(format!(
                    "wrote savefile {}",
                    persistence::battery_path(&rom_path).display()
                ));
            }
        }
        session.state = RuntimeState::NoGame;
    }

    /// While paused the emulation thread performs no core steps; the
    /// render thread keeps displaying the last published frame.
    pub fn pause(&self) {
        let mut session = self.session();
        if session.state == RuntimeState::Running {
            session.state = RuntimeState::Paused;
        }
    }

    pub fn resume(&self) {
        let mut session = self.session();
        if session.state == RuntimeState::Paused {
            session.state = RuntimeState::Running;
        }
    }

    /// Writes a save state next to the ROM. Valid while a game is loaded,
    /// running or paused. The lifecycle lock is held for the whole
    /// operation so the core cannot step mid-serialization.
    pub fn save_state(&self) -> Result<()> {
        let mut session = self.session();
        let rom_path = match &session.rom_path {
            Some(path) => path.clone(),
            None => bail!("no game loaded"),
        };
        let path = persistence::state_path(&rom_path);
        let state_size = session.state_size;
        let result = persistence::save_state(&mut session.core, &path, state_size);
        session.status = Some(match &result {
            Ok(()) => format!("wrote save state {}", path.display()),
            Err(err) => {
                warn!("{err:#}");
                format!("failed to write save state {}", path.display())
            }
        });
        result
    }

    /// Restores the save state next to the ROM. A short file or a core
    /// rejection is recoverable: the current emulation state is unchanged.
    pub fn load_state(&self) -> Result<()> {
        let mut session = self.session();
        let rom_path = match &session.rom_path {
            Some(path) => path.clone(),
            None => bail!("no game loaded"),
        };
        let path = persistence::state_path(&rom_path);
        let state_size = session.state_size;
        let result = persistence::load_state(&mut session.core, &path, state_size);
        session.status = Some(match &result {
            Ok(()) => format!("loaded save state {}", path.display()),
            Err(err) => {
                warn!("{err:#}");
                format!("failed to read save state {}", path.display())
            }
        });
        result
    }

    /// Publishes the physical key mask polled this render tick.
    pub fn publish_input(&self, keys: u32) {
        self.shared.input.publish(keys);
    }

    /// Copies the most recently published frame for presentation.
    pub fn consume_video_frame(&self, dst: &mut VideoFrame) {
        self.shared.video.consume_into(dst);
    }

    pub fn state(&self) -> RuntimeState {
        self.session().state
    }

    pub fn stats(&self) -> RuntimeStats {
        let session = self.session();
        RuntimeStats {
            video_frames: session.video_frames,
            audio_chunks: session.audio_pool.published_chunks(),
            dropped_audio_chunks: session.audio_pool.dropped_chunks(),
        }
    }

    /// Takes the most recent user-visible status line, if any.
    pub fn take_status(&self) -> Option<String> {
        self.session().status.take()
    }

    /// Direct core access while the emulation thread is held at an
    /// iteration boundary.
    pub fn with_core<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        f(&mut self.session().core)
    }

    /// Signals the emulation thread and waits for it to observe the flag
    /// and return. Platform audio/video resources must only be torn down
    /// after this returns.
    pub fn shutdown(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("emulation thread terminated with a panic");
            }
        }
    }
}

impl<C: Core + Send + 'static> Drop for Runtime<C> {
    fn drop(&mut self) {
        // Battery persistence happens before the thread and any platform
        // resources go away.
        self.unload_game();
        self.shutdown();
    }
}
