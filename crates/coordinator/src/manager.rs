// Thread-owning front end for the playback state machine
// Commands and engine signals are serialized onto one owner thread, which also
// drives the progress tick. Getters read a snapshot and never block on it.

use crate::machine::{Command, PlaybackStateMachine};
use crate::surface::PlayerLayerView;
use crossbeam_channel::{select, Receiver, SendError, Sender};
use parking_lot::Mutex;
use podium_playback_core::{
    CoordinatorConfig, EngineSignal, PlaybackState, PlayerDelegate, PlayerEngine, PlayerError,
    PlayerSnapshot, Result, SignalForward, SnapshotCell,
};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

enum Message {
    Command(Command),
    Signal { token: u64, signal: EngineSignal },
    Shutdown,
}

/// Public handle of the playback coordinator
pub struct PlayerManager {
    sender: Sender<Message>,
    snapshot: SnapshotCell,
    layer: PlayerLayerView,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PlayerManager {
    /// Spawn the owner thread
    pub fn new(
        engine: Box<dyn PlayerEngine>,
        delegate: Box<dyn PlayerDelegate>,
        config: CoordinatorConfig,
    ) -> Result<Self> {
        config.validate()?;

        let (sender, receiver) = crossbeam_channel::unbounded::<Message>();
        let signal_tx = sender.clone();
        let forward: SignalForward = Arc::new(move |token: u64, signal: EngineSignal| {
            if signal_tx.send(Message::Signal { token, signal }).is_err() {
                log::trace!("owner thread gone, engine signal dropped");
            }
        });

        let interval = config.progress_interval();
        let machine = PlaybackStateMachine::new(engine, delegate, config, forward);
        let snapshot = machine.snapshot_cell();
        let layer = machine.layer_view();

        let worker = thread::Builder::new()
            .name("podium-playback".to_string())
            .spawn(move || run_owner(machine, receiver, interval))?;

        log::info!("Player manager created");
        Ok(Self {
            sender,
            snapshot,
            layer,
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn init_with(&self, url: &str) -> Result<()> {
        self.send(Command::InitWith(url.to_string()))
    }

    pub fn play(&self) -> Result<()> {
        self.send(Command::Play)
    }

    pub fn replay(&self) -> Result<()> {
        self.send(Command::RePlay)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(Command::Pause)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(Command::Stop)
    }

    /// `completion` runs on the owner thread, or immediately with `false` if
    /// the coordinator has shut down
    pub fn seek_to<F>(&self, seconds: f64, completion: F) -> Result<()>
    where
        F: FnOnce(bool) + Send + 'static,
    {
        self.send(Command::SeekTo {
            target: seconds,
            completion: Box::new(completion),
        })
    }

    pub fn set_seek_time(&self, seconds: f64) -> Result<()> {
        self.send(Command::SetSeekTime(seconds))
    }

    pub fn set_volume(&self, volume: f32) -> Result<()> {
        self.send(Command::SetVolume(volume))
    }

    pub fn set_rate(&self, rate: f32) -> Result<()> {
        self.send(Command::SetRate(rate))
    }

    /// Duration in seconds, 0 while unknown
    pub fn duration(&self) -> f64 {
        self.snapshot.get().duration_secs()
    }

    pub fn current_time(&self) -> f64 {
        self.snapshot.get().current_time
    }

    pub fn state(&self) -> PlaybackState {
        self.snapshot.state()
    }

    pub fn seek_time(&self) -> Option<f64> {
        self.snapshot.get().seek_time
    }

    pub fn volume(&self) -> f32 {
        self.snapshot.get().volume
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        self.snapshot.get()
    }

    pub fn layer_view(&self) -> PlayerLayerView {
        self.layer.clone()
    }

    /// Stop the owner thread. Pending seeks resolve with `false`.
    pub fn shutdown(&self) {
        let handle = match self.worker.lock().take() {
            Some(handle) => handle,
            None => return,
        };
        let _ = self.sender.send(Message::Shutdown);

        if handle.thread().id() == thread::current().id() {
            log::warn!("shutdown called from the owner thread; not joining");
            return;
        }
        if handle.join().is_err() {
            log::error!("Playback owner thread panicked");
        }
    }

    fn send(&self, command: Command) -> Result<()> {
        self.sender
            .send(Message::Command(command))
            .map_err(|SendError(message)| {
                if let Message::Command(command) = message {
                    log::warn!("{} dropped: coordinator shut down", command.name());
                    if let Command::SeekTo { completion, .. } = command {
                        completion(false);
                    }
                }
                PlayerError::Disconnected
            })
    }
}

impl Drop for PlayerManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_owner(mut machine: PlaybackStateMachine, receiver: Receiver<Message>, interval: Duration) {
    let ticker = crossbeam_channel::tick(interval);
    log::debug!("Owner thread started, tick every {}ms", interval.as_millis());

    loop {
        select! {
            recv(receiver) -> message => match message {
                Ok(Message::Command(command)) => {
                    let name = command.name();
                    if let Err(err) = machine.apply(command) {
                        log::warn!("{} failed: {}", name, err);
                    }
                }
                Ok(Message::Signal { token, signal }) => machine.handle_signal(token, signal),
                Ok(Message::Shutdown) | Err(_) => break,
            },
            recv(ticker) -> _ => machine.on_tick(),
        }
    }

    machine.shutdown();
}
