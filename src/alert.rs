use crate::config::SessionConfig;
use crate::cue::{AlertCue, CuePlayer};
use crate::error::CueError;
use chrono::Local;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;

pub type FinishedCallback = Box<dyn Fn() + Send + Sync + 'static>;

type SharedCallback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Audio cue + notification output used by the inference loop.
pub trait AlertSink {
    /// Fire-and-forget. The caller keeps a second cue from starting while one plays.
    fn play(&mut self);

    /// Registers a callback run once per finished playback.
    fn on_finished(&mut self, callback: FinishedCallback);

    /// Never blocks and never fails the caller.
    fn notify(&mut self, title: &str, body: &str);
}

/// The touched observable and the sound cooldown flag shared with the sink.
#[derive(Debug)]
pub struct AlertState {
    touched: watch::Sender<bool>,
    sound_available: Arc<AtomicBool>,
}

impl Default for AlertState {
    fn default() -> Self {
        let (touched, _) = watch::channel(false);
        AlertState {
            touched,
            sound_available: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl AlertState {
    pub fn is_touched(&self) -> bool {
        *self.touched.borrow()
    }

    pub fn set_touched(&self, touched: bool) {
        self.touched.send_if_modified(|current| {
            let changed = *current != touched;
            *current = touched;
            changed
        });
    }

    pub fn subscribe_touched(&self) -> watch::Receiver<bool> {
        self.touched.subscribe()
    }

    pub fn sound_available(&self) -> bool {
        self.sound_available.load(Ordering::SeqCst)
    }

    /// Takes the cooldown if it is free. Check and set happen in one atomic step.
    pub fn try_claim_sound(&self) -> bool {
        self.sound_available
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Callback for `AlertSink::on_finished` that frees the cooldown.
    pub fn release_on_finish(&self) -> FinishedCallback {
        let flag = self.sound_available.clone();
        Box::new(move || {
            flag.store(true, Ordering::SeqCst);
            debug!("Alert cue finished, sound available again");
        })
    }
}

/// Swallows notifications raised within `cooldown` of the last delivered one.
#[derive(Debug)]
pub struct NotificationGate {
    cooldown: Duration,
    last_delivered: Option<Instant>,
}

impl NotificationGate {
    pub fn new(cooldown: Duration) -> Self {
        NotificationGate {
            cooldown,
            last_delivered: None,
        }
    }

    pub fn permit(&mut self, now: Instant) -> bool {
        match self.last_delivered {
            Some(last) if now.duration_since(last) < self.cooldown => false,
            _ => {
                self.last_delivered = Some(now);
                true
            }
        }
    }
}

/// Plays an `AlertCue` through a `CuePlayer` and writes notifications to the log.
pub struct CueAlertSink<P: CuePlayer> {
    cue: Arc<AlertCue>,
    player: P,
    gate: NotificationGate,
    callbacks: Arc<Mutex<Vec<SharedCallback>>>,
    delivered: usize,
}

impl<P: CuePlayer> CueAlertSink<P> {
    pub fn new(cue: AlertCue, player: P, notification_cooldown: Duration) -> Self {
        CueAlertSink {
            cue: Arc::new(cue),
            player,
            gate: NotificationGate::new(notification_cooldown),
            callbacks: Arc::new(Mutex::new(vec![])),
            delivered: 0,
        }
    }

    /// Uses `alert_cue_path` when set, the bundled cue otherwise.
    pub fn from_config(config: &SessionConfig, player: P) -> Result<Self, CueError> {
        let cue = match &config.alert_cue_path {
            Some(path) => AlertCue::from_file(path)?,
            None => AlertCue::bundled()?,
        };
        Ok(CueAlertSink::new(cue, player, config.notification_cooldown()))
    }

    pub fn delivered_notifications(&self) -> usize {
        self.delivered
    }
}

/// Runs the registered callbacks outside the lock, so a callback may register another.
fn fire_finished(callbacks: &Mutex<Vec<SharedCallback>>) {
    let snapshot = match callbacks.lock() {
        Ok(callbacks) => callbacks.clone(),
        Err(e) => {
            warn!("Finished callbacks poisoned {}", e);
            return;
        }
    };
    snapshot.iter().for_each(|callback| callback());
}

impl<P: CuePlayer> AlertSink for CueAlertSink<P> {
    fn play(&mut self) {
        let callbacks = self.callbacks.clone();
        let done = Box::new(move || fire_finished(&callbacks));
        if let Err(e) = self.player.play(self.cue.clone(), done) {
            // the done callback was dropped with the failed start; free the cooldown here
            warn!("Alert cue failed to start: {}", e);
            fire_finished(&self.callbacks);
        }
    }

    fn on_finished(&mut self, callback: FinishedCallback) {
        match self.callbacks.lock() {
            Ok(mut callbacks) => callbacks.push(Arc::from(callback)),
            Err(e) => warn!("Finished callbacks poisoned {}", e),
        }
    }

    fn notify(&mut self, title: &str, body: &str) {
        if !self.gate.permit(Instant::now()) {
            debug!("Notification suppressed by cooldown");
            return;
        }
        self.delivered += 1;
        info!("[{}] {}: {}", Local::now().format("%H:%M:%S"), title, body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cue::PlaybackDone;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct HeldPlayer {
        pending: Vec<PlaybackDone>,
        fail: bool,
    }

    impl CuePlayer for HeldPlayer {
        fn play(&mut self, _cue: Arc<AlertCue>, done: PlaybackDone) -> Result<(), CueError> {
            if self.fail {
                return Err(CueError::Playback("no speaker".into()));
            }
            self.pending.push(done);
            Ok(())
        }
    }

    fn short_cue() -> AlertCue {
        AlertCue {
            samples: vec![0.0; 16],
            sample_rate: 16000,
            channels: 1,
        }
    }

    #[test]
    fn claim_is_exclusive_until_released() {
        let state = AlertState::default();
        let release = state.release_on_finish();
        assert!(state.try_claim_sound());
        assert!(!state.sound_available());
        assert!(!state.try_claim_sound());
        release();
        assert!(state.sound_available());
        assert!(state.try_claim_sound());
    }

    #[test]
    fn touched_changes_reach_subscribers() {
        let state = AlertState::default();
        let mut rx = state.subscribe_touched();
        state.set_touched(true);
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());
        state.set_touched(true);
        assert!(!rx.has_changed().unwrap());
        assert!(state.is_touched());
    }

    #[test]
    fn gate_suppresses_within_cooldown() {
        let mut gate = NotificationGate::new(Duration::from_secs(3));
        let start = Instant::now();
        assert!(gate.permit(start));
        assert!(!gate.permit(start + Duration::from_secs(1)));
        assert!(gate.permit(start + Duration::from_secs(3)));
    }

    #[test]
    fn sink_runs_finished_callbacks_when_player_completes() {
        let mut sink = CueAlertSink::new(short_cue(), HeldPlayer::default(), Duration::ZERO);
        let finished = Arc::new(AtomicUsize::new(0));
        let counter = finished.clone();
        sink.on_finished(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        sink.play();
        assert_eq!(finished.load(Ordering::SeqCst), 0);
        let done = sink.player.pending.pop().unwrap();
        done();
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_may_register_another_while_running() {
        let mut sink = CueAlertSink::new(short_cue(), HeldPlayer::default(), Duration::ZERO);
        let registry = sink.callbacks.clone();
        sink.on_finished(Box::new(move || {
            if let Ok(mut callbacks) = registry.lock() {
                callbacks.push(Arc::new(|| {}));
            }
        }));

        sink.play();
        let done = sink.player.pending.pop().unwrap();
        done();
        assert_eq!(sink.callbacks.lock().unwrap().len(), 2);
    }

    #[test]
    fn failed_start_still_reports_finished() {
        let player = HeldPlayer {
            fail: true,
            ..HeldPlayer::default()
        };
        let mut sink = CueAlertSink::new(short_cue(), player, Duration::ZERO);
        let state = AlertState::default();
        sink.on_finished(state.release_on_finish());
        assert!(state.try_claim_sound());
        sink.play();
        assert!(state.sound_available());
    }

    #[test]
    fn sink_notifications_respect_cooldown() {
        let mut sink = CueAlertSink::new(short_cue(), HeldPlayer::default(), Duration::from_secs(60));
        sink.notify("Hands off", "first");
        sink.notify("Hands off", "second");
        assert_eq!(sink.delivered_notifications(), 1);
    }

    #[test]
    fn config_without_path_uses_bundled_cue() {
        let sink = CueAlertSink::from_config(&SessionConfig::default(), HeldPlayer::default()).unwrap();
        assert!(sink.cue.duration() > Duration::ZERO);
    }
}
