use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{watch, Mutex as AsyncMutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, instrument, trace, warn};
use uuid::Uuid;

use crate::codec::{self, to_hex, Command, SequenceCounter};
use crate::color;
use crate::config::{ChipType, ColorOrder, ConfigStore, DeviceConfig};
use crate::effects::{self, EffectKind, EFFECT_OFF};
use crate::identity::{Advertisement, DeviceIdentity, Model};
use crate::retry::RetryPolicy;
use crate::state::{ColorMode, DeviceState, MAX_KELVIN, MIN_KELVIN};
use crate::transport::{
    CharacteristicHandle, Connection, DisconnectCallback, NotificationCallback, Transport,
    NOTIFY_CHARACTERISTIC_UUIDS, WRITE_CHARACTERISTIC_UUIDS,
};
use crate::{Error, Result};

/// Color used for strip static and sound reactive effects when none is known
const DEFAULT_EFFECT_COLOR: (u8, u8, u8) = (0xff, 0x00, 0x00);

type ChangeCallback = Arc<dyn Fn(&DeviceState) + Send + Sync>;

/// Everything that only exists while a link is up. Guarded by the connect lock.
#[derive(Default)]
struct Link {
    connection: Option<Box<dyn Connection>>,
    write_char: Option<CharacteristicHandle>,
    notify_char: Option<CharacteristicHandle>,
    sequence: SequenceCounter,
}

struct Inner {
    mac: String,
    identity: DeviceIdentity,
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    /// The connect lock. Connects, writes and teardowns all hold it.
    link: AsyncMutex<Link>,
    connected: AtomicBool,
    expected_disconnect: AtomicBool,
    ever_connected: AtomicBool,
    state: Mutex<DeviceState>,
    state_tx: watch::Sender<DeviceState>,
    change_callback: Mutex<Option<ChangeCallback>>,
    config: RwLock<DeviceConfig>,
    config_store: Option<Arc<dyn ConfigStore>>,
    disconnect_timer: Mutex<Option<JoinHandle<()>>>,
    timer_generation: AtomicU64,
}

/// Session with one LEDnetWF light.
///
/// The session connects on demand. Every command goes through
/// [`LedNetWfDevice::connect_if_needed`], which opens the link, subscribes to
/// notifications and sends the handshake the first time. After
/// `idle_disconnect_delay_seconds` without traffic the link is released again.
///
/// Cloning is cheap and every clone drives the same session.
#[derive(Clone)]
pub struct LedNetWfDevice {
    inner: Arc<Inner>,
}

impl LedNetWfDevice {
    /// Creates a session from the device's last advertisement. Does not connect.
    pub async fn new(transport: Arc<dyn Transport>, config: DeviceConfig) -> Result<Self> {
        Self::with_options(transport, config, None, RetryPolicy::default()).await
    }

    /// Like [`LedNetWfDevice::new`], persisting LED settings changes to `store`.
    ///
    /// Values saved in the store fill in whatever `config` leaves unset.
    pub async fn new_with_store(
        transport: Arc<dyn Transport>,
        config: DeviceConfig,
        store: Arc<dyn ConfigStore>,
    ) -> Result<Self> {
        Self::with_options(transport, config, Some(store), RetryPolicy::default()).await
    }

    #[instrument(skip(transport, store))]
    pub async fn with_options(
        transport: Arc<dyn Transport>,
        mut config: DeviceConfig,
        store: Option<Arc<dyn ConfigStore>>,
        retry: RetryPolicy,
    ) -> Result<Self> {
        if let Some(store) = &store {
            if let Some(saved) = store.load(&config.mac_address)? {
                debug!("Loaded saved config for {}", config.mac_address);
                config.led_count = config.led_count.or(saved.led_count);
                config.chip_type = config.chip_type.or(saved.chip_type);
                config.color_order = config.color_order.or(saved.color_order);
            }
        }

        let data = transport.read_last_advertisement(&config.mac_address).await?;
        let advertisement = Advertisement::parse(&data)?;
        let mut state = DeviceState::from_config(&config);
        state.apply_status(&advertisement.status, advertisement.identity.model);

        info!(
            "Found {} {} (firmware {})",
            advertisement.identity.model, config.mac_address, advertisement.identity.firmware_minor
        );

        let (state_tx, _) = watch::channel(state.clone());
        Ok(Self {
            inner: Arc::new(Inner {
                mac: config.mac_address.clone(),
                identity: advertisement.identity,
                transport,
                retry,
                link: AsyncMutex::new(Link::default()),
                connected: AtomicBool::new(false),
                expected_disconnect: AtomicBool::new(false),
                ever_connected: AtomicBool::new(false),
                state: Mutex::new(state),
                state_tx,
                change_callback: Mutex::new(None),
                config: RwLock::new(config),
                config_store: store,
                disconnect_timer: Mutex::new(None),
                timer_generation: AtomicU64::new(0),
            }),
        })
    }

    pub fn mac_address(&self) -> &str {
        &self.inner.mac
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.inner.identity
    }

    pub fn model(&self) -> Model {
        self.inner.identity.model
    }

    /// Snapshot of the current state
    pub fn state(&self) -> DeviceState {
        self.inner.state.lock().clone()
    }

    pub fn config(&self) -> DeviceConfig {
        self.inner.config.read().clone()
    }

    /// Receives a snapshot after every state change
    pub fn subscribe(&self) -> watch::Receiver<DeviceState> {
        self.inner.state_tx.subscribe()
    }

    /// Installs the change callback, replacing any previous one
    pub fn set_change_callback<F>(&self, callback: F)
    where
        F: Fn(&DeviceState) + Send + Sync + 'static,
    {
        *self.inner.change_callback.lock() = Some(Arc::new(callback));
    }

    pub fn clear_change_callback(&self) {
        self.inner.change_callback.lock().take();
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Effects this model supports, sorted by name
    pub fn effect_list(&self) -> &'static [String] {
        effects::effect_list(self.model())
    }

    /// Opens the link unless it is already up
    #[instrument(skip(self), fields(mac = %self.inner.mac))]
    pub async fn connect_if_needed(&self) -> Result<()> {
        self.inner.connect().await.map(drop)
    }

    /// Encodes and writes one command. Does not wait for the device to answer.
    #[instrument(skip(self), fields(mac = %self.inner.mac))]
    pub async fn send_command(&self, command: &Command) -> Result<()> {
        let packet = command.encode(self.model())?;
        let mut link = self.inner.connect().await?;
        self.inner.write(&mut link, packet, true).await?;
        self.inner.reset_idle_timer();
        Ok(())
    }

    /// Turns the light on
    #[instrument(skip(self))]
    pub async fn turn_on(&self) -> Result<()> {
        self.send_command(&Command::TurnOn).await?;
        self.inner.update_state(|s| s.set_power(true));
        info!("Device turned on");
        Ok(())
    }

    /// Turns the light off
    #[instrument(skip(self))]
    pub async fn turn_off(&self) -> Result<()> {
        // The controller skips its fade out unless the color changed since
        // turn on, so nudge the brightness of a static HS color first
        let state = self.state();
        if let (ColorMode::Hs, Some((hue, saturation))) = (state.color_mode, state.hs_color) {
            let percent = match color::brightness_to_percent(state.brightness) {
                100 => 99,
                p => p + 1,
            };
            self.send_command(&Command::HsColor {
                hue,
                saturation,
                brightness_percent: percent,
            })
            .await?;
        }

        self.send_command(&Command::TurnOff).await?;
        self.inner.update_state(|s| s.set_power(false));
        info!("Device turned off");
        Ok(())
    }

    /// Sets a static color
    ///
    /// # Arguments
    ///
    /// * `hs` - Hue in degrees (0-360) and saturation in percent (0-100)
    /// * `brightness` - Brightness (0-255), keeps the current one if `None`
    #[instrument(skip(self))]
    pub async fn set_hs_color(&self, hs: (u16, u8), brightness: Option<u8>) -> Result<()> {
        let hs = (hs.0.min(360), hs.1.min(100));
        let (brightness, percent) = self.inner.brightness(brightness);
        self.send_command(&Command::HsColor {
            hue: hs.0,
            saturation: hs.1,
            brightness_percent: percent,
        })
        .await?;
        self.inner.update_state(|s| s.set_hs(hs, brightness));
        info!("Color set to hue {} saturation {}%", hs.0, hs.1);
        Ok(())
    }

    /// Sets a static RGB color.
    ///
    /// The strip shows it as a solid color. The ring only takes hue and
    /// saturation, so the color is converted and the session ends up in HS mode.
    #[instrument(skip(self))]
    pub async fn set_rgb_color(&self, rgb: (u8, u8, u8), brightness: Option<u8>) -> Result<()> {
        match self.model() {
            Model::Strip => {
                let (brightness, percent) = self.inner.brightness(brightness);
                self.send_command(&Command::SolidColor {
                    rgb,
                    brightness_percent: percent,
                })
                .await?;
                self.inner.update_state(|s| s.set_rgb(rgb, brightness));
                info!("Color set to RGB {:?}", rgb);
                Ok(())
            }
            Model::Ring => {
                let (h, s, _) = color::rgb_to_hsv(rgb.0, rgb.1, rgb.2);
                self.set_hs_color((h, s), brightness).await
            }
        }
    }

    /// Switches to white at the given color temperature
    ///
    /// # Arguments
    ///
    /// * `kelvin` - Clamped to [`MIN_KELVIN`]..=[`MAX_KELVIN`]
    /// * `brightness` - Brightness (0-255), keeps the current one if `None`
    #[instrument(skip(self))]
    pub async fn set_color_temp_kelvin(&self, kelvin: u32, brightness: Option<u8>) -> Result<()> {
        let kelvin = kelvin.clamp(MIN_KELVIN, MAX_KELVIN);
        let (brightness, percent) = self.inner.brightness(brightness);
        self.send_command(&Command::ColorTemp {
            temp_percent: color::kelvin_to_percent(kelvin, MIN_KELVIN, MAX_KELVIN),
            brightness_percent: percent,
        })
        .await?;
        self.inner.update_state(|s| s.set_color_temp(kelvin, brightness));
        info!("Color temperature set to {}K", kelvin);
        Ok(())
    }

    /// Changes brightness only by re-sending whatever the light currently shows
    #[instrument(skip(self))]
    pub async fn set_brightness(&self, brightness: u8) -> Result<()> {
        let state = self.state();
        match (state.color_mode, state.effect.as_deref()) {
            (ColorMode::ColorTemp, _) => {
                let kelvin = state.color_temp_kelvin.unwrap_or(MAX_KELVIN);
                self.set_color_temp_kelvin(kelvin, Some(brightness)).await
            }
            (ColorMode::Rgb, _) if state.rgb_color.is_some() => {
                let rgb = state.rgb_color.unwrap_or(DEFAULT_EFFECT_COLOR);
                self.set_rgb_color(rgb, Some(brightness)).await
            }
            (ColorMode::Brightness, Some(name)) if effects::effect_id(self.model(), name).is_ok() => {
                self.set_effect(name, Some(brightness)).await
            }
            _ => {
                let hs = state.hs_color.unwrap_or((0, 0));
                self.set_hs_color(hs, Some(brightness)).await
            }
        }
    }

    /// Starts an effect by name, see [`LedNetWfDevice::effect_list`].
    ///
    /// `"off"` stops the running effect and shows its color statically.
    #[instrument(skip(self))]
    pub async fn set_effect(&self, name: &str, brightness: Option<u8>) -> Result<()> {
        let state = self.state();
        if name == EFFECT_OFF {
            let rgb = state.current_rgb().unwrap_or((0xff, 0xff, 0xff));
            return self.set_rgb_color(rgb, brightness).await;
        }

        let model = self.model();
        let id = effects::effect_id(model, name)?;
        let (brightness, percent) = self.inner.brightness(brightness);
        let color = state.current_rgb().unwrap_or(DEFAULT_EFFECT_COLOR);
        self.send_command(&Command::Effect {
            id,
            speed: state.effect_speed,
            brightness_percent: percent,
            color,
        })
        .await?;

        let effect_color = match EffectKind::from_id(id) {
            EffectKind::Plain(_) => None,
            EffectKind::Static(_) | EffectKind::Music(_) => Some(color),
        };
        self.inner
            .update_state(|s| s.set_effect(name, brightness, effect_color));
        info!("Effect set to {}", name);
        Ok(())
    }

    /// Sets the effect speed (0-100) and re-sends the running effect with it
    #[instrument(skip(self))]
    pub async fn set_effect_speed(&self, speed: u8) -> Result<()> {
        let speed = speed.min(100);
        self.inner.update_state(|s| s.set_effect_speed(speed));

        let state = self.state();
        match state.effect.as_deref() {
            Some(name) if effects::effect_id(self.model(), name).is_ok() => {
                self.set_effect(name, Some(state.brightness)).await?;
            }
            _ => debug!("No effect running, speed {} stored", speed),
        }
        Ok(())
    }

    /// Writes LED count, chip type and color order.
    ///
    /// Missing values are taken from the current state. Incomplete or invalid
    /// settings are logged and ignored, and settings equal to the current
    /// ones are not written at all.
    #[instrument(skip(self))]
    pub async fn set_led_settings(
        &self,
        led_count: Option<u16>,
        chip_type: Option<ChipType>,
        color_order: Option<ColorOrder>,
    ) -> Result<()> {
        let model = self.model();
        let state = self.state();
        let (Some(led_count), Some(chip_type), Some(color_order)) = (
            led_count.or(state.led_count),
            chip_type.or(state.chip_type),
            color_order.or(state.color_order),
        ) else {
            warn!("LED settings are incomplete, not writing them");
            return Ok(());
        };

        if led_count == 0 || (model == Model::Ring && led_count > u16::from(u8::MAX)) {
            warn!("LED count {} is invalid for {}", led_count, model);
            return Ok(());
        }
        if chip_type.to_wire(model).is_none() {
            warn!("Chip type {} is not supported on {}", chip_type, model);
            return Ok(());
        }
        if state.led_count == Some(led_count)
            && state.chip_type == Some(chip_type)
            && state.color_order == Some(color_order)
        {
            debug!("LED settings unchanged");
            return Ok(());
        }

        self.send_command(&Command::LedSettings {
            led_count,
            chip_type,
            color_order,
        })
        .await?;
        self.inner
            .update_state(|s| s.set_led_settings(led_count, chip_type, color_order));

        let config = {
            let mut config = self.inner.config.write();
            config.led_count = Some(led_count);
            config.chip_type = Some(chip_type);
            config.color_order = Some(color_order);
            config.clone()
        };
        if let Some(store) = &self.inner.config_store {
            if let Err(e) = store.save(&config) {
                warn!("Could not save config for {}: {}", self.inner.mac, e);
            }
        }

        info!(
            "LED settings set to {} LEDs, {}, {}",
            led_count, chip_type, color_order
        );
        Ok(())
    }

    /// Makes sure the light is reachable.
    ///
    /// If the light has never been reached, a failure marks the power state as
    /// unknown. Later failures keep the last known state.
    #[instrument(skip(self), fields(mac = %self.inner.mac))]
    pub async fn update(&self) {
        match self.inner.connect().await {
            Ok(_) => debug!("Device reachable"),
            Err(e) => warn!("Update failed: {}", e),
        }
    }

    /// Disconnects and cancels the idle timer. Safe to call any number of times.
    #[instrument(skip(self), fields(mac = %self.inner.mac))]
    pub async fn stop(&self) {
        self.inner.cancel_idle_timer();
        let mut link = self.inner.link.lock().await;
        self.inner.teardown(&mut link).await;
        info!("Session stopped");
    }
}

impl Inner {
    fn model(&self) -> Model {
        self.identity.model
    }

    /// Requested brightness, or the current one, as a byte and a percentage
    fn brightness(&self, requested: Option<u8>) -> (u8, u8) {
        let current = self.state.lock().brightness;
        color::normalize_brightness(requested, Some(current))
    }

    /// Like [`Inner::ensure_connected`]. A failure before the light was ever
    /// reached marks the power state as unknown.
    async fn connect(self: &Arc<Self>) -> Result<MutexGuard<'_, Link>> {
        let result = self.ensure_connected().await;
        if result.is_err() && !self.ever_connected.load(Ordering::SeqCst) {
            self.update_state(|s| s.is_on = None);
        }
        result
    }

    /// Acquires the connect lock and connects if the link is down
    async fn ensure_connected(self: &Arc<Self>) -> Result<MutexGuard<'_, Link>> {
        let mut link = self.link.lock().await;
        if link.connection.is_some() && self.connected.load(Ordering::SeqCst) {
            trace!("Already connected");
            self.reset_idle_timer();
            return Ok(link);
        }

        if let Some(stale) = link.connection.take() {
            debug!("Dropping stale connection");
            self.expected_disconnect.store(true, Ordering::SeqCst);
            if let Err(e) = stale.disconnect().await {
                debug!("Stale connection did not disconnect cleanly: {}", e);
            }
        }
        link.write_char = None;
        link.notify_char = None;
        self.expected_disconnect.store(false, Ordering::SeqCst);

        info!("Connecting to {}", self.mac);
        let on_disconnect = self.disconnect_callback();
        let transport = &self.transport;
        let mac = self.mac.as_str();
        let connection = self
            .retry
            .run("connect", || {
                let on_disconnect = on_disconnect.clone();
                async move {
                    let device = transport.scan_for_device(mac).await?;
                    transport.connect(&device, on_disconnect).await
                }
            })
            .await?;

        let resolved = self.resolve_characteristics(connection.as_ref()).await;
        let (write_char, notify_char) = match resolved {
            Ok(chars) => chars,
            Err(e) => {
                self.abandon(connection).await;
                return Err(e);
            }
        };
        if let Err(e) = connection
            .subscribe(&notify_char, self.notification_callback())
            .await
        {
            self.abandon(connection).await;
            return Err(e);
        }

        link.connection = Some(connection);
        link.write_char = Some(write_char);
        link.notify_char = Some(notify_char);
        self.connected.store(true, Ordering::SeqCst);
        info!("Connected to {}", self.mac);

        if !self.ever_connected.load(Ordering::SeqCst) {
            if let Err(e) = self.handshake(&mut link).await {
                warn!("Handshake failed, dropping the link: {}", e);
                self.teardown(&mut link).await;
                return Err(e);
            }
            self.ever_connected.store(true, Ordering::SeqCst);
        }

        self.reset_idle_timer();
        Ok(link)
    }

    async fn resolve_characteristics(
        &self,
        connection: &dyn Connection,
    ) -> Result<(CharacteristicHandle, CharacteristicHandle)> {
        let write = probe(connection, WRITE_CHARACTERISTIC_UUIDS).await?;
        let notify = probe(connection, NOTIFY_CHARACTERISTIC_UUIDS).await?;
        debug!("Write characteristic {}, notify characteristic {}", write.uuid, notify.uuid);
        Ok((write, notify))
    }

    /// Disconnects a link that failed to set up
    async fn abandon(&self, connection: Box<dyn Connection>) {
        self.expected_disconnect.store(true, Ordering::SeqCst);
        if let Err(e) = connection.disconnect().await {
            debug!("Disconnect after failed setup: {}", e);
        }
    }

    /// First contact of the session. Asks for LED settings if any are unknown.
    async fn handshake(&self, link: &mut Link) -> Result<()> {
        debug!("Sending handshake");
        self.write(link, Command::Handshake.encode(self.model())?, false)
            .await?;

        let unknown = {
            let state = self.state.lock();
            state.chip_type.is_none() || state.color_order.is_none()
        };
        if unknown {
            debug!("LED settings unknown, querying the device");
            self.write(link, Command::QueryLedSettings.encode(self.model())?, false)
                .await?;
        }
        Ok(())
    }

    /// Writes a packet, stamping the next sequence number unless `stamp` is false
    async fn write(&self, link: &mut Link, mut packet: Vec<u8>, stamp: bool) -> Result<()> {
        if stamp {
            let sequence = link.sequence.next();
            codec::stamp_sequence(&mut packet, sequence);
        }
        let (Some(connection), Some(characteristic)) = (link.connection.as_deref(), link.write_char)
        else {
            return Err(Error::BleError("not connected".into()));
        };

        debug!("Writing to {}: {}", self.mac, to_hex(&packet));
        self.retry
            .run("write", || connection.write(&characteristic, &packet))
            .await
    }

    /// Unsubscribes and disconnects. The caller holds the connect lock.
    async fn teardown(&self, link: &mut Link) {
        self.expected_disconnect.store(true, Ordering::SeqCst);
        if let Some(connection) = link.connection.take() {
            if let Some(notify) = link.notify_char {
                if let Err(e) = connection.unsubscribe(&notify).await {
                    debug!("Unsubscribe failed: {}", e);
                }
            }
            if let Err(e) = connection.disconnect().await {
                debug!("Disconnect failed: {}", e);
            }
            info!("Disconnected from {}", self.mac);
        }
        link.write_char = None;
        link.notify_char = None;
        self.connected.store(false, Ordering::SeqCst);
    }

    fn disconnect_callback(self: &Arc<Self>) -> DisconnectCallback {
        let weak = Arc::downgrade(self);
        Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.handle_disconnect();
            }
        })
    }

    fn notification_callback(self: &Arc<Self>) -> NotificationCallback {
        let weak: Weak<Self> = Arc::downgrade(self);
        Arc::new(move |data: Vec<u8>| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_notification(&data);
            }
        })
    }

    /// The link went down. Power state stays as last known.
    fn handle_disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        if self.expected_disconnect.load(Ordering::SeqCst) {
            debug!("{} disconnected", self.mac);
        } else {
            warn!("{} disconnected unexpectedly", self.mac);
        }
        self.cancel_idle_timer();
    }

    fn handle_notification(&self, data: &[u8]) {
        let model = self.model();
        let layout = self.config.read().led_settings_layout;
        match codec::parse_notification(data, model, &layout) {
            Ok(event) => {
                debug!("Decoded notification: {:?}", event);
                self.update_state(|s| s.apply(&event, model));
            }
            Err(e) => debug!("Dropping notification {}: {}", to_hex(data), e),
        }
    }

    /// Mutates the state and notifies observers
    fn update_state(&self, f: impl FnOnce(&mut DeviceState)) {
        let snapshot = {
            let mut state = self.state.lock();
            f(&mut state);
            let snapshot = state.clone();
            self.state_tx.send_replace(snapshot.clone());
            snapshot
        };
        let callback = self.change_callback.lock().clone();
        if let Some(callback) = callback {
            callback(&snapshot);
        }
    }

    /// Restarts the idle timer. Called with the connect lock held.
    fn reset_idle_timer(self: &Arc<Self>) {
        let delay = self.config.read().idle_disconnect_delay_seconds;
        let generation = self.timer_generation.fetch_add(1, Ordering::SeqCst) + 1;

        let mut slot = self.disconnect_timer.lock();
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        if delay == 0 {
            return;
        }

        let weak = Arc::downgrade(self);
        *slot = Some(tokio::spawn(async move {
            time::sleep(Duration::from_secs(delay)).await;
            if let Some(inner) = weak.upgrade() {
                inner.idle_disconnect(generation, delay).await;
            }
        }));
    }

    fn cancel_idle_timer(&self) {
        self.timer_generation.fetch_add(1, Ordering::SeqCst);
        if let Some(timer) = self.disconnect_timer.lock().take() {
            timer.abort();
        }
    }

    async fn idle_disconnect(&self, generation: u64, delay: u64) {
        let mut link = self.link.lock().await;
        if self.timer_generation.load(Ordering::SeqCst) != generation {
            return;
        }
        // Detach our own handle so the disconnect callback cannot abort this task
        drop(self.disconnect_timer.lock().take());
        info!("Idle for {} seconds, disconnecting", delay);
        self.teardown(&mut link).await;
    }
}

/// First candidate characteristic the connection has
async fn probe(connection: &dyn Connection, candidates: &[Uuid]) -> Result<CharacteristicHandle> {
    for uuid in candidates {
        if let Some(handle) = connection.resolve_characteristic(*uuid).await? {
            return Ok(handle);
        }
    }
    Err(Error::CharacteristicNotFound(
        candidates
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(", "),
    ))
}
