//! Gradual volume increase at the start of a session

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::{AudioStream, VolumeControl};

/// Level a ramp starts from
pub const MIN_RAMP_STEP: u32 = 1;

#[derive(Debug)]
struct RampState {
    active: bool,
    current: u32,
    target: u32,
}

/// Steps a stream from [`MIN_RAMP_STEP`] up to a target, one level per
/// tick.
///
/// Each tick holds the ramp lock while it checks `active` and writes the
/// volume, so once [`VolumeRamp::stop`] returns no tick can touch the
/// stream again.
pub struct VolumeRamp {
    state: Arc<Mutex<RampState>>,
    task: Option<JoinHandle<()>>,
}

impl VolumeRamp {
    /// Set the starting step and schedule the ticks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        control: Arc<dyn VolumeControl>,
        stream: AudioStream,
        target: u32,
        step_delay: Duration,
    ) -> Self {
        let start = target.min(MIN_RAMP_STEP);
        control.set_volume(stream, start);
        debug!(stream = ?stream, start, target, delay_ms = step_delay.as_millis() as u64, "Volume ramp started");

        let state = Arc::new(Mutex::new(RampState {
            active: start < target,
            current: start,
            target,
        }));

        let task = (start < target).then(|| {
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(step_delay).await;
                    if !tick(&state, control.as_ref(), stream) {
                        break;
                    }
                }
            })
        });

        Self { state, task }
    }

    /// Set `target` once without ramping
    pub fn fixed(control: &dyn VolumeControl, stream: AudioStream, target: u32) -> Self {
        control.set_volume(stream, target);
        debug!(stream = ?stream, target, "Volume set without ramp");
        Self {
            state: Arc::new(Mutex::new(RampState {
                active: false,
                current: target,
                target,
            })),
            task: None,
        }
    }

    /// Level most recently written
    pub fn current(&self) -> u32 {
        self.lock().current
    }

    /// Level the ramp is heading for
    pub fn target(&self) -> u32 {
        self.lock().target
    }

    /// Whether ticks are still pending
    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    /// Cancel pending ticks; idempotent
    pub fn stop(&mut self) {
        self.lock().active = false;
        if let Some(task) = self.task.take() {
            task.abort();
            trace!("Volume ramp cancelled");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RampState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for VolumeRamp {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Advance one step; returns whether more ticks are needed
fn tick(state: &Mutex<RampState>, control: &dyn VolumeControl, stream: AudioStream) -> bool {
    let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
    if !state.active {
        return false;
    }

    state.current = (state.current + 1).min(state.target);
    control.set_volume(stream, state.current);
    trace!(level = state.current, target = state.target, "Volume ramp tick");

    if state.current >= state.target {
        state.active = false;
        debug!(level = state.current, "Volume ramp finished");
    }
    state.active
}
