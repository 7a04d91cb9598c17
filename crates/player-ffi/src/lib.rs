// FFI bridge for the Podium playback coordinator
// The host supplies the media engine and the listener as C vtables and feeds
// engine events back through the `podium_playback_signal_*` entry points.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use podium_playback::PlayerManager;
use podium_playback_core::{
    CoordinatorConfig, EngineError, EngineSink, PlaybackState, PlayerDelegate, PlayerEngine,
    PlayerError, PlayerSnapshot, Result, TimeRange,
};
use std::collections::HashMap;
use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::sync::{Arc, Once};

/// Engine callbacks implemented by the host
#[repr(C)]
#[derive(Clone, Copy)]
pub struct PodiumEngineVTable {
    pub user_data: *mut c_void,
    /// Begin loading `url`; every signal for this load must carry `token`. Returns 0 on success.
    pub load: extern "C" fn(user_data: *mut c_void, url: *const c_char, token: u64) -> i32,
    pub unload: extern "C" fn(user_data: *mut c_void),
    pub current_time: extern "C" fn(user_data: *mut c_void) -> f64,
    /// Negative or non-finite when unknown
    pub duration: extern "C" fn(user_data: *mut c_void) -> f64,
    /// Writes the loaded range and returns 1, or returns 0 when unknown
    pub loaded_range:
        extern "C" fn(user_data: *mut c_void, start: *mut f64, duration: *mut f64) -> i32,
    pub set_rate: extern "C" fn(user_data: *mut c_void, rate: f32),
    pub pause: extern "C" fn(user_data: *mut c_void),
    /// Acknowledge with `podium_playback_signal_seek_finished(.., seq, ..)`
    pub seek: extern "C" fn(user_data: *mut c_void, target: f64, seq: u64),
    pub set_volume: extern "C" fn(user_data: *mut c_void, volume: f32),
}

/// Listener callbacks implemented by the host; any entry may be null
#[repr(C)]
#[derive(Clone, Copy)]
pub struct PodiumDelegateVTable {
    pub user_data: *mut c_void,
    pub change_player_state: Option<extern "C" fn(user_data: *mut c_void, state: i32)>,
    pub change_play_progress:
        Option<extern "C" fn(user_data: *mut c_void, progress: f64, seconds: f64)>,
    pub change_load_progress:
        Option<extern "C" fn(user_data: *mut c_void, progress: f64, seconds: f64)>,
    pub did_buffer: Option<extern "C" fn(user_data: *mut c_void, current_time: f64)>,
    pub start_player_seek_time: Option<extern "C" fn(user_data: *mut c_void)>,
    pub completion_player_seek_time: Option<extern "C" fn(user_data: *mut c_void)>,
}

pub type PodiumSeekCallback = extern "C" fn(user_data: *mut c_void, finished: i32);

type SinkSlot = Arc<Mutex<Option<EngineSink>>>;

struct HostEngine {
    vtable: PodiumEngineVTable,
    sink: SinkSlot,
}

// SAFETY: the host promises its engine callbacks may run on the coordinator thread
unsafe impl Send for HostEngine {}

impl PlayerEngine for HostEngine {
    fn load(&mut self, url: &str, sink: EngineSink) -> Result<()> {
        let c_url = CString::new(url)
            .map_err(|_| PlayerError::Load(format!("URL contains NUL byte: {}", url)))?;
        let token = sink.token();
        // Published first so the host may signal from inside `load`
        *self.sink.lock() = Some(sink);

        let code = (self.vtable.load)(self.vtable.user_data, c_url.as_ptr(), token);
        if code != 0 {
            *self.sink.lock() = None;
            return Err(PlayerError::Load(format!(
                "host engine refused {} (code {})",
                url, code
            )));
        }
        Ok(())
    }

    fn unload(&mut self) {
        *self.sink.lock() = None;
        (self.vtable.unload)(self.vtable.user_data);
    }

    fn current_time(&self) -> f64 {
        (self.vtable.current_time)(self.vtable.user_data)
    }

    fn duration(&self) -> Option<f64> {
        let duration = (self.vtable.duration)(self.vtable.user_data);
        if duration.is_finite() && duration >= 0.0 {
            Some(duration)
        } else {
            None
        }
    }

    fn loaded_time_range(&self) -> Option<TimeRange> {
        let mut start = 0.0;
        let mut duration = 0.0;
        match (self.vtable.loaded_range)(self.vtable.user_data, &mut start, &mut duration) {
            1 => Some(TimeRange::new(start, duration)),
            _ => None,
        }
    }

    fn set_rate(&mut self, rate: f32) {
        (self.vtable.set_rate)(self.vtable.user_data, rate);
    }

    fn pause(&mut self) {
        (self.vtable.pause)(self.vtable.user_data);
    }

    fn seek(&mut self, target: f64, seq: u64) {
        (self.vtable.seek)(self.vtable.user_data, target, seq);
    }

    fn set_volume(&mut self, volume: f32) {
        (self.vtable.set_volume)(self.vtable.user_data, volume);
    }
}

struct HostDelegate {
    vtable: PodiumDelegateVTable,
}

// SAFETY: the host promises its listener may be called from the coordinator thread
unsafe impl Send for HostDelegate {}

impl PlayerDelegate for HostDelegate {
    fn change_player_state(&mut self, state: PlaybackState) {
        if let Some(f) = self.vtable.change_player_state {
            f(self.vtable.user_data, state.code());
        }
    }

    fn change_play_progress(&mut self, progress: f64, seconds: f64) {
        if let Some(f) = self.vtable.change_play_progress {
            f(self.vtable.user_data, progress, seconds);
        }
    }

    fn change_load_progress(&mut self, progress: f64, seconds: f64) {
        if let Some(f) = self.vtable.change_load_progress {
            f(self.vtable.user_data, progress, seconds);
        }
    }

    fn did_buffer(&mut self, player: &PlayerSnapshot) {
        if let Some(f) = self.vtable.did_buffer {
            f(self.vtable.user_data, player.current_time);
        }
    }

    fn start_player_seek_time(&mut self) {
        if let Some(f) = self.vtable.start_player_seek_time {
            f(self.vtable.user_data);
        }
    }

    fn completion_player_seek_time(&mut self) {
        if let Some(f) = self.vtable.completion_player_seek_time {
            f(self.vtable.user_data);
        }
    }
}

/// Host pointer carried into a seek completion
struct HostPtr(*mut c_void);

// SAFETY: see HostEngine
unsafe impl Send for HostPtr {}

impl HostPtr {
    fn get(&self) -> *mut c_void {
        self.0
    }
}

#[derive(Clone)]
struct FfiPlayer {
    manager: Arc<PlayerManager>,
    sink: SinkSlot,
}

static PLAYER_REGISTRY: Lazy<Mutex<HashMap<i64, FfiPlayer>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));
static NEXT_PLAYER_ID: Lazy<Mutex<i64>> = Lazy::new(|| Mutex::new(1));
static INIT_LOGGER: Once = Once::new();

fn init_logging() {
    INIT_LOGGER.call_once(|| {
        // A logger installed by the host takes precedence
        let _ = env_logger::builder()
            .is_test(false)
            .filter_level(log::LevelFilter::Info)
            .try_init();
    });
}

fn register_player(player: FfiPlayer) -> i64 {
    let mut next = NEXT_PLAYER_ID.lock();
    let id = *next;
    *next += 1;
    drop(next);

    PLAYER_REGISTRY.lock().insert(id, player);
    id
}

/// Runs `f` with the registry unlocked, so host callbacks invoked from `f`
/// may re-enter any entry point
fn with_player<R>(id: i64, f: impl FnOnce(&FfiPlayer) -> Result<R>) -> Result<R> {
    let player = PLAYER_REGISTRY
        .lock()
        .get(&id)
        .cloned()
        .ok_or_else(|| PlayerError::InvalidState("Invalid player ID".into()))?;
    f(&player)
}

/// Sink of the current load, if `token` still names it
fn current_sink(id: i64, token: u64) -> Result<EngineSink> {
    let slot = with_player(id, |p| Ok(p.sink.clone()))?;
    let sink = slot.lock().clone();
    match sink {
        Some(sink) if sink.token() == token => Ok(sink),
        _ => Err(PlayerError::InvalidState(format!(
            "Stale session token {} for player {}",
            token, id
        ))),
    }
}

fn str_arg<'a>(ptr: *const c_char) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(PlayerError::InvalidState("Null string argument".into()));
    }
    // SAFETY: non-null, and the host passes a NUL-terminated string valid for the call
    let c_str = unsafe { CStr::from_ptr(ptr) };
    c_str
        .to_str()
        .map_err(|e| PlayerError::InvalidState(format!("Invalid UTF-8: {}", e)))
}

fn to_code(result: Result<()>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(err) => {
            log::error!("FFI error: {}", err);
            -1
        }
    }
}

fn create_player(
    engine: PodiumEngineVTable,
    delegate: PodiumDelegateVTable,
    config: CoordinatorConfig,
) -> Result<i64> {
    init_logging();
    let sink: SinkSlot = Arc::new(Mutex::new(None));
    let manager = PlayerManager::new(
        Box::new(HostEngine {
            vtable: engine,
            sink: sink.clone(),
        }),
        Box::new(HostDelegate { vtable: delegate }),
        config,
    )?;
    Ok(register_player(FfiPlayer {
        manager: Arc::new(manager),
        sink,
    }))
}

// -----------------------------------------------------------------------------
// C ABI: transport
// -----------------------------------------------------------------------------

/// Returns the player id, or -1 on failure
#[no_mangle]
pub extern "C" fn podium_playback_create(
    engine: PodiumEngineVTable,
    delegate: PodiumDelegateVTable,
) -> i64 {
    match create_player(engine, delegate, CoordinatorConfig::default()) {
        Ok(id) => id,
        Err(err) => {
            log::error!("FFI error: {}", err);
            -1
        }
    }
}

/// Like `podium_playback_create`, reading a TOML config file first
#[no_mangle]
pub extern "C" fn podium_playback_create_with_config(
    engine: PodiumEngineVTable,
    delegate: PodiumDelegateVTable,
    config_path: *const c_char,
) -> i64 {
    let result = str_arg(config_path)
        .and_then(|path| CoordinatorConfig::load(path))
        .and_then(|config| create_player(engine, delegate, config));
    match result {
        Ok(id) => id,
        Err(err) => {
            log::error!("FFI error: {}", err);
            -1
        }
    }
}

#[no_mangle]
pub extern "C" fn podium_playback_init_with_url(player_id: i64, url: *const c_char) -> i32 {
    to_code(str_arg(url).and_then(|url| with_player(player_id, |p| p.manager.init_with(url))))
}

#[no_mangle]
pub extern "C" fn podium_playback_play(player_id: i64) -> i32 {
    to_code(with_player(player_id, |p| p.manager.play()))
}

#[no_mangle]
pub extern "C" fn podium_playback_replay(player_id: i64) -> i32 {
    to_code(with_player(player_id, |p| p.manager.replay()))
}

#[no_mangle]
pub extern "C" fn podium_playback_pause(player_id: i64) -> i32 {
    to_code(with_player(player_id, |p| p.manager.pause()))
}

#[no_mangle]
pub extern "C" fn podium_playback_stop(player_id: i64) -> i32 {
    to_code(with_player(player_id, |p| p.manager.stop()))
}

/// `callback` (may be null) receives 1 if the seek landed, 0 otherwise
#[no_mangle]
pub extern "C" fn podium_playback_seek(
    player_id: i64,
    seconds: f64,
    callback: Option<PodiumSeekCallback>,
    user_data: *mut c_void,
) -> i32 {
    let host = HostPtr(user_data);
    to_code(with_player(player_id, |p| {
        p.manager.seek_to(seconds, move |finished| {
            if let Some(callback) = callback {
                callback(host.get(), finished as i32);
            }
        })
    }))
}

#[no_mangle]
pub extern "C" fn podium_playback_set_seek_time(player_id: i64, seconds: f64) -> i32 {
    to_code(with_player(player_id, |p| p.manager.set_seek_time(seconds)))
}

#[no_mangle]
pub extern "C" fn podium_playback_set_volume(player_id: i64, volume: f32) -> i32 {
    to_code(with_player(player_id, |p| p.manager.set_volume(volume)))
}

#[no_mangle]
pub extern "C" fn podium_playback_set_rate(player_id: i64, rate: f32) -> i32 {
    to_code(with_player(player_id, |p| p.manager.set_rate(rate)))
}

/// State code (Unknown = 0 ... Stopped = 6), or -1 for an unknown id
#[no_mangle]
pub extern "C" fn podium_playback_get_state(player_id: i64) -> i32 {
    match with_player(player_id, |p| Ok(p.manager.state())) {
        Ok(state) => state.code(),
        Err(err) => {
            log::error!("FFI error: {}", err);
            -1
        }
    }
}

/// Seconds, 0 while unknown, -1 for an unknown id
#[no_mangle]
pub extern "C" fn podium_playback_get_duration(player_id: i64) -> f64 {
    with_player(player_id, |p| Ok(p.manager.duration())).unwrap_or(-1.0)
}

#[no_mangle]
pub extern "C" fn podium_playback_get_current_time(player_id: i64) -> f64 {
    with_player(player_id, |p| Ok(p.manager.current_time())).unwrap_or(-1.0)
}

#[no_mangle]
pub extern "C" fn podium_playback_get_volume(player_id: i64) -> f32 {
    with_player(player_id, |p| Ok(p.manager.volume())).unwrap_or(-1.0)
}

#[no_mangle]
pub extern "C" fn podium_playback_release(player_id: i64) -> i32 {
    // Removed under the lock, shut down outside it: the owner thread may be
    // inside a host callback that signals back into the registry
    let player = PLAYER_REGISTRY.lock().remove(&player_id);
    match player {
        Some(player) => {
            player.manager.shutdown();
            log::info!("Released player {}", player_id);
            0
        }
        None => -1,
    }
}

// -----------------------------------------------------------------------------
// C ABI: engine signals
// -----------------------------------------------------------------------------

/// `duration` < 0 means unknown
#[no_mangle]
pub extern "C" fn podium_playback_signal_ready(player_id: i64, token: u64, duration: f64) -> i32 {
    let duration = if duration.is_finite() && duration >= 0.0 {
        Some(duration)
    } else {
        None
    };
    to_code(current_sink(player_id, token).map(|sink| sink.ready(duration)))
}

/// `kind`: 0 resource unavailable, 1 network, 2 decode
#[no_mangle]
pub extern "C" fn podium_playback_signal_failed(
    player_id: i64,
    token: u64,
    kind: i32,
    message: *const c_char,
) -> i32 {
    let message = str_arg(message).unwrap_or("unspecified").to_string();
    let error = match kind {
        1 => EngineError::Network(message),
        2 => EngineError::Decode(message),
        _ => EngineError::ResourceUnavailable(message),
    };
    to_code(current_sink(player_id, token).map(|sink| sink.failed(error)))
}

#[no_mangle]
pub extern "C" fn podium_playback_signal_loaded_range(
    player_id: i64,
    token: u64,
    start: f64,
    duration: f64,
) -> i32 {
    let range = TimeRange::new(start, duration);
    to_code(current_sink(player_id, token).map(|sink| sink.loaded_range(range)))
}

#[no_mangle]
pub extern "C" fn podium_playback_signal_stalled(player_id: i64, token: u64) -> i32 {
    to_code(current_sink(player_id, token).map(|sink| sink.stalled()))
}

#[no_mangle]
pub extern "C" fn podium_playback_signal_ended(player_id: i64, token: u64) -> i32 {
    to_code(current_sink(player_id, token).map(|sink| sink.ended()))
}

#[no_mangle]
pub extern "C" fn podium_playback_signal_seek_finished(
    player_id: i64,
    token: u64,
    seq: u64,
    finished: i32,
) -> i32 {
    to_code(current_sink(player_id, token).map(|sink| sink.seek_finished(seq, finished != 0)))
}
