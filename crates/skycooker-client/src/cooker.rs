//! Host-facing cooker handle.
//!
//! A [`Cooker`] serialises every operation through one async mutex, so at
//! most one command is in flight per device. Each update runs the cycle
//!
//! ```text
//! ensure_ready ──► [control action] ──► get-status ──► [disconnect if transient]
//! ```
//!
//! and publishes the outcome on a `watch` channel. Accessors read that
//! snapshot and never wait for the lock.

use chrono::{DateTime, Utc};
use serde::Serialize;
use skycooker_core::{
    CookTime, CookingMode, DeviceState, Error, ErrorKind, FirmwareVersion, OperatingStatus,
    Result,
    constants::{MAX_TEMPERATURE, MIN_TEMPERATURE},
};
use skycooker_protocol::Request;
use skycooker_transport::Transport;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, MutexGuard, watch};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, error, info, warn};

use crate::config::{CookerConfig, TimingConfig};
use crate::connection::{Connection, LinkState};
use crate::stats::StatsTracker;

/// Everything a host needs to render the device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CookerSnapshot {
    /// Last decoded status; `None` until the first successful update.
    pub state: Option<DeviceState>,
    pub link: LinkState,
    pub connected: bool,
    pub authenticated: bool,
    pub available: bool,
    pub firmware: Option<FirmwareVersion>,
    /// Percentage of successful updates over the rolling window.
    pub success_rate: u8,
    /// Outcomes currently held in that window.
    pub recorded: usize,
    pub last_update: Option<DateTime<Utc>>,
}

impl Default for CookerSnapshot {
    fn default() -> Self {
        Self {
            state: None,
            link: LinkState::Disconnected,
            connected: false,
            authenticated: false,
            available: false,
            firmware: None,
            success_rate: 0,
            recorded: 0,
            last_update: None,
        }
    }
}

pub(crate) struct Inner<T: Transport> {
    pub(crate) connection: Connection<T>,
    pub(crate) stats: StatsTracker,
    pub(crate) state: Option<DeviceState>,
    pub(crate) last_update: Option<DateTime<Utc>>,
}

/// Driver for one multicooker.
pub struct Cooker<T: Transport> {
    inner: Mutex<Inner<T>>,
    cancel: CancellationToken,
    snapshot: watch::Sender<CookerSnapshot>,
    timing: TimingConfig,
    persistent: AtomicBool,
    span: Span,
}

impl<T: Transport> std::fmt::Debug for Cooker<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cooker")
            .field("snapshot", &*self.snapshot.borrow())
            .field("persistent", &self.persistent.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Cooker<T> {
    /// Create a driver for the device behind `transport`.
    ///
    /// # Errors
    /// Returns `Error::Config` or `Error::UnsupportedModel` when the
    /// configuration does not validate.
    pub fn new(transport: T, config: &CookerConfig) -> Result<Self> {
        config.validate()?;

        let cancel = CancellationToken::new();
        let connection = Connection::new(
            transport,
            config.device.key,
            cancel.clone(),
            &config.timing,
        );
        let span = connection.span().clone();

        Ok(Self {
            inner: Mutex::new(Inner {
                connection,
                stats: StatsTracker::new(),
                state: None,
                last_update: None,
            }),
            cancel,
            snapshot: watch::Sender::new(CookerSnapshot::default()),
            timing: config.timing.clone(),
            persistent: AtomicBool::new(config.device.persistent),
            span,
        })
    }

    // ── Update cycle ─────────────────────────────────────────────────

    /// Refresh the cached status, retrying whole cycles up to `max_tries`.
    ///
    /// Returns `true` on success. Errors are logged, never raised.
    pub async fn update(&self, max_tries: u32) -> bool {
        self.update_with(max_tries, None).await
    }

    /// Run an update cycle with an optional control action before the
    /// status fetch.
    ///
    /// A cycle carrying an action is never retried. A rejected key ends the
    /// update at once without touching the statistics.
    pub async fn update_with(&self, max_tries: u32, action: Option<Request>) -> bool {
        async {
            if self.cancel.is_cancelled() {
                return false;
            }
            let mut inner = self.inner.lock().await;
            let mut tries_left = max_tries.max(1);

            loop {
                if inner.connection.state() == LinkState::Disposed {
                    return false;
                }

                let error = match self.cycle(&mut inner, action.as_ref()).await {
                    Ok(()) => {
                        inner.stats.record(true);
                        self.publish(&inner);
                        return true;
                    }
                    Err(error) => error,
                };

                inner.connection.disconnect().await;

                match error.kind() {
                    ErrorKind::Auth => {
                        error!("Authentication failed, enable pairing mode on the device");
                        self.publish(&inner);
                        return false;
                    }
                    ErrorKind::Disposed => return false,
                    _ => {}
                }

                inner.stats.record(false);
                self.publish(&inner);
                tries_left -= 1;
                warn!(error = %error, tries_left, "Update failed");

                if action.is_some() || tries_left == 0 {
                    return false;
                }

                tokio::select! {
                    _ = self.cancel.cancelled() => return false,
                    _ = tokio::time::sleep(self.timing.update_retry_interval()) => {}
                }
            }
        }
        .instrument(self.span.clone())
        .await
    }

    async fn cycle(&self, inner: &mut Inner<T>, action: Option<&Request>) -> Result<()> {
        inner.connection.ensure_ready().await?;

        if let Some(request) = action {
            debug!(command = %request.command(), "Running control action");
            inner.connection.control(request).await?;
        }

        let state = inner.connection.fetch_status().await?;
        debug!(
            status = %state.status,
            mode = %state.mode,
            temperature = state.temperature,
            "Status updated"
        );
        inner.state = Some(state);
        inner.last_update = Some(Utc::now());

        if !self.is_persistent() {
            inner.connection.disconnect().await;
        }
        Ok(())
    }

    // ── Control operations ───────────────────────────────────────────

    /// Run one control cycle, without outer retry.
    ///
    /// `build` sees the cached state and returns the request to send, or
    /// `None` when nothing needs to change. Its errors are returned before
    /// the link is touched.
    async fn run_control<F>(&self, operation: &'static str, build: F) -> Result<()>
    where
        F: FnOnce(Option<&DeviceState>) -> Result<Option<Request>>,
    {
        self.run_control_with(operation, false, build).await
    }

    /// Like [`run_control`](Self::run_control), but reads the status first
    /// when nothing is cached yet, so `build` always sees the device state.
    async fn run_stateful_control<F>(&self, operation: &'static str, build: F) -> Result<()>
    where
        F: FnOnce(Option<&DeviceState>) -> Result<Option<Request>>,
    {
        self.run_control_with(operation, true, build).await
    }

    async fn run_control_with<F>(
        &self,
        operation: &'static str,
        needs_state: bool,
        build: F,
    ) -> Result<()>
    where
        F: FnOnce(Option<&DeviceState>) -> Result<Option<Request>>,
    {
        async {
            if self.cancel.is_cancelled() {
                return Err(Error::Disposed);
            }
            let mut inner = self.inner.lock().await;
            if inner.connection.state() == LinkState::Disposed {
                return Err(Error::Disposed);
            }

            let refreshed = needs_state && inner.state.is_none();
            if refreshed && let Err(error) = self.refresh(&mut inner).await {
                return Err(self.control_failed(&mut inner, operation, error).await);
            }

            let request = match build(inner.state.as_ref()) {
                Ok(Some(request)) => request,
                outcome => {
                    if outcome.is_ok() {
                        debug!(operation, "Already in requested state");
                    }
                    if refreshed {
                        if !self.is_persistent() {
                            inner.connection.disconnect().await;
                        }
                        self.publish(&inner);
                    }
                    return outcome.map(drop);
                }
            };

            match self.cycle(&mut inner, Some(&request)).await {
                Ok(()) => {
                    inner.stats.record(true);
                    self.publish(&inner);
                    info!(operation, "Control applied");
                    Ok(())
                }
                Err(error) => Err(self.control_failed(&mut inner, operation, error).await),
            }
        }
        .instrument(self.span.clone())
        .await
    }

    /// Read the status into the cache without recording an outcome.
    async fn refresh(&self, inner: &mut Inner<T>) -> Result<()> {
        inner.connection.ensure_ready().await?;
        let state = inner.connection.fetch_status().await?;
        debug!(cooking = %state.cooking_time, "Status read before control");
        inner.state = Some(state);
        inner.last_update = Some(Utc::now());
        Ok(())
    }

    async fn control_failed(
        &self,
        inner: &mut Inner<T>,
        operation: &'static str,
        error: Error,
    ) -> Error {
        inner.connection.disconnect().await;
        if !matches!(error.kind(), ErrorKind::Auth | ErrorKind::Disposed) {
            inner.stats.record(false);
        }
        self.publish(inner);
        warn!(operation, error = %error, "Control failed");
        error
    }

    /// Select a program, optionally with temperature and duration.
    ///
    /// `CookingMode::Off` turns the cooker off instead.
    pub async fn set_mode(
        &self,
        mode: CookingMode,
        temperature: Option<u8>,
        hours: Option<u8>,
        minutes: Option<u8>,
    ) -> Result<()> {
        self.run_control("set_mode", |_| {
            mode_request(mode, temperature, hours, minutes).map(Some)
        })
        .await
    }

    /// Switch program unless it is already running.
    pub async fn set_target_mode(&self, mode: CookingMode) -> Result<()> {
        self.run_stateful_control("set_target_mode", |state| {
            let current = state.filter(|state| state.power).map(|state| state.mode);
            let unchanged = match current {
                Some(current) => current == mode,
                None => mode.is_off(),
            };
            if unchanged {
                return Ok(None);
            }
            mode_request(mode, None, None, None).map(Some)
        })
        .await
    }

    pub async fn set_temperature(&self, temperature: u8) -> Result<()> {
        self.run_control("set_temperature", |_| {
            check_temperature(temperature)?;
            Ok(Some(Request::SetTemperature(temperature)))
        })
        .await
    }

    /// Set the program temperature, clamped to 30..=120 °C.
    ///
    /// Keeps the running program and its duration; an idle cooker is
    /// switched to multicook.
    pub async fn set_target_temperature(&self, temperature: u8) -> Result<()> {
        let temperature = temperature.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE);
        self.run_stateful_control("set_target_temperature", |state| {
            if state.is_some_and(|state| state.target_temperature == temperature) {
                return Ok(None);
            }
            let (mode, time) = match state {
                Some(state) if state.power && !state.mode.is_off() => {
                    (state.mode, state.cooking_time)
                }
                _ => (CookingMode::Multicook, CookTime::default()),
            };
            Ok(Some(Request::SetMainMode {
                mode,
                temperature,
                time,
            }))
        })
        .await
    }

    pub async fn set_cooking_time(&self, hours: u8, minutes: u8) -> Result<()> {
        self.run_control("set_cooking_time", |_| {
            Ok(Some(Request::SetCookingTime(CookTime::new(hours, minutes)?)))
        })
        .await
    }

    /// Delay the start by `hours:minutes`.
    ///
    /// The device counts the delay from the end of cooking, so the cooking
    /// time is sent along. Without a cached status it is read first, in the
    /// same locked cycle.
    pub async fn set_delay_time(&self, hours: u8, minutes: u8) -> Result<()> {
        let delay = CookTime::new(hours, minutes)?;
        self.run_stateful_control("set_delay_time", |state| {
            let cooking = state.map(|state| state.cooking_time).unwrap_or_default();
            Ok(Some(Request::SetDelayTime { delay, cooking }))
        })
        .await
    }

    pub async fn set_post_heat(&self, enabled: bool) -> Result<()> {
        self.run_control("set_post_heat", |_| Ok(Some(Request::SetPostHeat(enabled))))
            .await
    }

    pub async fn turn_on(&self) -> Result<()> {
        self.run_control("turn_on", |_| Ok(Some(Request::TurnOn))).await
    }

    pub async fn turn_off(&self) -> Result<()> {
        self.run_control("turn_off", |_| Ok(Some(Request::TurnOff))).await
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Dispose the driver.
    ///
    /// Pending waits end promptly, the link is closed and the cached state
    /// cleared. Every later update returns `false`.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let mut inner = self.inner.lock().await;
        inner
            .connection
            .dispose()
            .instrument(self.span.clone())
            .await;
        inner.state = None;
        self.publish(&inner);
    }

    /// Keep the link open between updates, or close it after each one.
    pub fn set_persistent(&self, persistent: bool) {
        debug!(persistent, "Persistence changed");
        self.persistent.store(persistent, Ordering::Relaxed);
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent.load(Ordering::Relaxed)
    }

    // ── Snapshot ─────────────────────────────────────────────────────

    pub(crate) async fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().await
    }

    pub(crate) fn span(&self) -> &Span {
        &self.span
    }

    pub(crate) fn publish(&self, inner: &Inner<T>) {
        let connection = &inner.connection;
        self.snapshot.send_replace(CookerSnapshot {
            state: inner.state.clone(),
            link: connection.state(),
            connected: connection.is_connected(),
            authenticated: connection.is_authenticated(),
            available: connection.available(),
            firmware: connection.firmware(),
            success_rate: inner.stats.success_rate(),
            recorded: inner.stats.len(),
            last_update: inner.last_update,
        });
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> CookerSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified on every publish.
    pub fn subscribe(&self) -> watch::Receiver<CookerSnapshot> {
        self.snapshot.subscribe()
    }

    fn with_state<R>(&self, read: impl FnOnce(&DeviceState) -> R) -> Option<R> {
        self.snapshot.borrow().state.as_ref().map(read)
    }

    pub fn current_temperature(&self) -> Option<u8> {
        self.with_state(|state| state.temperature)
    }

    pub fn target_temperature(&self) -> Option<u8> {
        self.with_state(|state| state.target_temperature)
    }

    /// Running program; `None` while the cooker is idle.
    pub fn mode(&self) -> Option<CookingMode> {
        self.with_state(|state| state.power.then_some(state.mode))
            .flatten()
    }

    pub fn status(&self) -> Option<OperatingStatus> {
        self.with_state(|state| state.status)
    }

    pub fn cooking_time(&self) -> Option<CookTime> {
        self.with_state(|state| state.cooking_time)
    }

    pub fn delay_time(&self) -> Option<CookTime> {
        self.with_state(|state| state.delay).flatten()
    }

    pub fn post_heat(&self) -> Option<bool> {
        self.with_state(|state| state.post_heat)
    }

    pub fn timer_mode(&self) -> Option<bool> {
        self.with_state(|state| state.timer_mode)
    }

    pub fn is_connected(&self) -> bool {
        self.snapshot.borrow().connected
    }

    pub fn is_authenticated(&self) -> bool {
        self.snapshot.borrow().authenticated
    }

    pub fn is_available(&self) -> bool {
        self.snapshot.borrow().available
    }

    pub fn firmware(&self) -> Option<FirmwareVersion> {
        self.snapshot.borrow().firmware
    }

    pub fn success_rate(&self) -> u8 {
        self.snapshot.borrow().success_rate
    }
}

fn check_temperature(temperature: u8) -> Result<()> {
    if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&temperature) {
        return Err(Error::invalid_argument(format!(
            "Temperature must be {MIN_TEMPERATURE}-{MAX_TEMPERATURE} °C, got {temperature}"
        )));
    }
    Ok(())
}

fn mode_request(
    mode: CookingMode,
    temperature: Option<u8>,
    hours: Option<u8>,
    minutes: Option<u8>,
) -> Result<Request> {
    if mode.is_off() {
        return Ok(Request::TurnOff);
    }
    if let Some(temperature) = temperature {
        check_temperature(temperature)?;
    }
    Ok(Request::SetMainMode {
        mode,
        temperature: temperature.unwrap_or(0),
        time: CookTime::new(hours.unwrap_or(0), minutes.unwrap_or(0))?,
    })
}
