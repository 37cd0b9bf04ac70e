mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::*;
use lednetwf_ble::{
    ChipType, ColorMode, ColorOrder, ConfigStore, DeviceConfig, Error, LedNetWfDevice,
    MemoryConfigStore, Model,
};

const HANDSHAKE: [u8; 12] = [
    0x00, 0x01, 0x80, 0x00, 0x00, 0x04, 0x05, 0x0a, 0x81, 0x8a, 0x8b, 0x96,
];
const QUERY_LED_SETTINGS: [u8; 13] = [
    0x00, 0x02, 0x80, 0x00, 0x00, 0x05, 0x06, 0x0a, 0x63, 0x12, 0x21, 0xf0, 0x86,
];

#[tokio::test]
async fn session_starts_from_advertisement_without_connecting() {
    let transport = Arc::new(MockTransport::ring());
    let device = session(transport.clone(), config()).await;

    let identity = device.identity();
    assert_eq!(identity.model, Model::Ring);
    assert_eq!(identity.firmware_major, 0x53);
    assert_eq!(identity.firmware_minor, "001D.0F");

    let state = device.state();
    assert_eq!(state.is_on, Some(false));
    assert_eq!(state.color_mode, ColorMode::Hs);
    assert_eq!(state.hs_color, Some((0, 100)));
    assert_eq!(state.led_count, Some(28));
    assert_eq!(state.effect_or_off(), "off");

    assert_eq!(transport.connects(), 0);
    assert!(!device.is_connected());
}

#[tokio::test]
async fn advertised_power_on_is_reported() {
    let mut advertisement = RING_ADVERTISEMENT;
    advertisement[14] = 0x23;
    let transport = Arc::new(MockTransport::new(&advertisement));
    let device = session(transport, config()).await;

    assert_eq!(device.model(), Model::Ring);
    assert_eq!(device.state().is_on, Some(true));
}

#[tokio::test]
async fn strip_advertisement_reports_running_effect() {
    let transport = Arc::new(MockTransport::strip());
    let device = session(transport, config()).await;

    let state = device.state();
    assert_eq!(device.model(), Model::Strip);
    assert_eq!(state.is_on, Some(true));
    assert_eq!(state.effect.as_deref(), Some("Effect 3"));
    assert_eq!(state.color_mode, ColorMode::Brightness);
    assert_eq!(state.hs_color, None);
    assert_eq!(state.brightness, 127);
    assert_eq!(state.effect_speed, 100);
    assert_eq!(state.led_count, Some(48));
}

#[tokio::test]
async fn unsupported_model_is_rejected() {
    let mut advertisement = RING_ADVERTISEMENT;
    advertisement[0] = 0x99;
    let transport = Arc::new(MockTransport::new(&advertisement));
    let result = LedNetWfDevice::new(transport, config()).await;

    assert!(matches!(result, Err(Error::UnsupportedModel(0x99))));
}

#[tokio::test]
async fn first_connect_sends_handshake_and_queries_unknown_settings() {
    let transport = Arc::new(MockTransport::ring());
    let device = session(transport.clone(), config()).await;

    device.turn_on().await.unwrap();

    let writes = transport.writes();
    assert_eq!(writes.len(), 3);
    assert_eq!(writes[0], HANDSHAKE);
    assert_eq!(writes[1], QUERY_LED_SETTINGS);
    assert_eq!(writes[2][9], 0x23);
    assert_eq!(device.state().is_on, Some(true));
}

#[tokio::test]
async fn known_settings_skip_the_query() {
    let transport = Arc::new(MockTransport::ring());
    let device = session(transport.clone(), known_topology_config()).await;

    device.turn_on().await.unwrap();

    let writes = transport.writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0], HANDSHAKE);
    assert_eq!(writes[1][9], 0x23);
    assert_eq!(writes[1][20], 0x90);
}

#[tokio::test]
async fn commands_are_stamped_with_increasing_sequence_numbers() {
    let transport = Arc::new(MockTransport::ring());
    let device = session(transport.clone(), known_topology_config()).await;

    device.turn_on().await.unwrap();
    device.turn_on().await.unwrap();
    device.set_hs_color((60, 100), None).await.unwrap();

    let commands = transport.command_writes();
    let sequences: Vec<[u8; 2]> = commands.iter().map(|w| [w[0], w[1]]).collect();
    assert_eq!(sequences, vec![[0, 0], [0, 1], [0, 2]]);
    // the checksum does not cover the sequence number
    assert_eq!(commands[1][20], 0x90);
}

#[tokio::test]
async fn concurrent_commands_share_one_connect() {
    let transport =
        Arc::new(MockTransport::ring().with_connect_delay(Duration::from_millis(50)));
    let device = session(transport.clone(), known_topology_config()).await;

    let (a, b) = tokio::join!(device.turn_on(), device.set_hs_color((120, 100), None));
    a.unwrap();
    b.unwrap();

    assert_eq!(transport.connects(), 1);
    assert_eq!(transport.command_writes().len(), 2);
    // only one handshake
    assert_eq!(transport.writes().len(), 3);
}

#[tokio::test]
async fn transient_connect_failures_are_retried() {
    let transport = Arc::new(
        MockTransport::ring().fail_connects(&[Failure::Transient, Failure::Transient]),
    );
    let device = session(transport.clone(), known_topology_config()).await;

    device.turn_on().await.unwrap();

    assert_eq!(transport.connects(), 3);
    assert!(device.is_connected());
}

#[tokio::test]
async fn retries_are_bounded() {
    let transport = Arc::new(MockTransport::ring().fail_connects(&[
        Failure::Transient,
        Failure::Transient,
        Failure::Transient,
    ]));
    let device = session(transport.clone(), known_topology_config()).await;

    let result = device.turn_on().await;

    assert!(matches!(result, Err(Error::Transient(_))));
    assert_eq!(transport.connects(), 3);
    assert!(transport.writes().is_empty());
}

#[tokio::test]
async fn device_not_found_is_not_retried() {
    let transport = Arc::new(MockTransport::ring().fail_connects(&[Failure::NotFound]));
    let device = session(transport.clone(), known_topology_config()).await;

    let result = device.turn_on().await;

    assert!(matches!(result, Err(Error::DeviceNotFound(_))));
    assert_eq!(transport.connects(), 1);
}

#[tokio::test]
async fn missing_characteristic_fails_and_disconnects() {
    let mut mock = MockTransport::ring();
    mock.missing_notify = true;
    let transport = Arc::new(mock);
    let device = session(transport.clone(), known_topology_config()).await;

    let result = device.connect_if_needed().await;

    assert!(matches!(result, Err(Error::CharacteristicNotFound(_))));
    assert_eq!(transport.disconnects(), 1);
    assert!(!device.is_connected());
}

#[tokio::test(start_paused = true)]
async fn idle_timer_disconnects() {
    let transport = Arc::new(MockTransport::ring());
    let config = DeviceConfig {
        idle_disconnect_delay_seconds: 5,
        ..known_topology_config()
    };
    let device = session(transport.clone(), config).await;

    device.turn_on().await.unwrap();
    assert!(device.is_connected());

    tokio::time::sleep(Duration::from_secs(6)).await;
    tokio::task::yield_now().await;

    assert!(!device.is_connected());
    assert_eq!(transport.disconnects(), 1);
    assert_eq!(transport.recorder.unsubscribes.load(Ordering::SeqCst), 1);
    // a disconnect is not a power change
    assert_eq!(device.state().is_on, Some(true));
}

#[tokio::test(start_paused = true)]
async fn commands_reset_the_idle_timer() {
    let transport = Arc::new(MockTransport::ring());
    let config = DeviceConfig {
        idle_disconnect_delay_seconds: 5,
        ..known_topology_config()
    };
    let device = session(transport.clone(), config).await;

    device.turn_on().await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;
    device.turn_off().await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;
    tokio::task::yield_now().await;
    assert!(device.is_connected());

    tokio::time::sleep(Duration::from_secs(3)).await;
    tokio::task::yield_now().await;
    assert!(!device.is_connected());
    assert_eq!(transport.connects(), 1);
}

#[tokio::test(start_paused = true)]
async fn zero_delay_keeps_the_link_open() {
    let transport = Arc::new(MockTransport::ring());
    let config = DeviceConfig {
        idle_disconnect_delay_seconds: 0,
        ..known_topology_config()
    };
    let device = session(transport.clone(), config).await;

    device.turn_on().await.unwrap();
    tokio::time::sleep(Duration::from_secs(3600)).await;

    assert!(device.is_connected());
    assert_eq!(transport.disconnects(), 0);
}

#[tokio::test]
async fn unexpected_disconnect_keeps_state_and_reconnects_on_next_command() {
    let transport = Arc::new(MockTransport::ring());
    let device = session(transport.clone(), known_topology_config()).await;

    device.turn_on().await.unwrap();
    transport.drop_link();

    assert!(!device.is_connected());
    assert_eq!(device.state().is_on, Some(true));

    device.turn_off().await.unwrap();
    assert_eq!(transport.connects(), 2);
    // the handshake is only sent once per session
    assert_eq!(
        transport.writes().iter().filter(|w| **w == HANDSHAKE).count(),
        1
    );
}

#[tokio::test]
async fn stop_is_idempotent() {
    let transport = Arc::new(MockTransport::ring());
    let device = session(transport.clone(), known_topology_config()).await;

    device.stop().await;
    device.turn_on().await.unwrap();
    device.stop().await;
    device.stop().await;

    assert_eq!(transport.disconnects(), 1);
    assert!(!device.is_connected());
}

#[tokio::test]
async fn color_notification_switches_to_hs_mode() {
    let transport = Arc::new(MockTransport::ring());
    let device = session(transport.clone(), known_topology_config()).await;
    device.set_effect("goldring", None).await.unwrap();
    assert_eq!(device.state().color_mode, ColorMode::Brightness);

    transport.notify_hex("81 00 23 61 f0 64 ff 00 00 00 00 00 1c");

    let state = device.state();
    assert_eq!(state.is_on, Some(true));
    assert_eq!(state.color_mode, ColorMode::Hs);
    assert_eq!(state.hs_color, Some((0, 100)));
    assert_eq!(state.brightness, 255);
    assert_eq!(state.effect, None);
    assert_eq!(state.effect_or_off(), "off");
}

#[tokio::test]
async fn white_notification_switches_to_color_temp() {
    let transport = Arc::new(MockTransport::ring());
    let device = session(transport.clone(), known_topology_config()).await;
    device.connect_if_needed().await.unwrap();

    transport.notify_hex("81 00 23 61 0f 32 00 00 00 00 00 00 1c");

    let state = device.state();
    assert_eq!(state.color_mode, ColorMode::ColorTemp);
    assert_eq!(state.color_temp_kelvin, Some(2700));
    assert_eq!(state.brightness, 127);
    assert_eq!(state.hs_color, None);
}

#[tokio::test]
async fn malformed_notifications_are_dropped() {
    let transport = Arc::new(MockTransport::ring());
    let device = session(transport.clone(), known_topology_config()).await;
    device.connect_if_needed().await.unwrap();
    let before = device.state();

    transport.notify_hex("zz");
    transport.notify_hex("81 00");
    transport.notify_hex("");
    let callback = transport.recorder.notify.lock().unwrap().clone().unwrap();
    callback(b"no quotes at all".to_vec());

    assert_eq!(device.state(), before);
}

#[tokio::test]
async fn led_settings_notification_updates_topology() {
    let transport = Arc::new(MockTransport::ring());
    let device = session(transport.clone(), config()).await;
    device.connect_if_needed().await.unwrap();

    transport.notify_hex("63 00 1e 06 05");

    let state = device.state();
    assert_eq!(state.led_count, Some(30));
    assert_eq!(state.chip_type, Some(ChipType::Sk6812));
    assert_eq!(state.color_order, Some(ColorOrder::Bgr));
}

#[tokio::test]
async fn change_callback_is_replaced_not_stacked() {
    let transport = Arc::new(MockTransport::ring());
    let device = session(transport.clone(), known_topology_config()).await;
    device.connect_if_needed().await.unwrap();

    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    let counter = first.clone();
    device.set_change_callback(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let counter = second.clone();
    device.set_change_callback(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    transport.notify_hex("81 00 24 61 f0 64 00 ff 00 00 00 00 1c");

    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn subscribers_see_optimistic_updates() {
    let transport = Arc::new(MockTransport::ring());
    let device = session(transport, known_topology_config()).await;
    let mut changes = device.subscribe();

    device.set_hs_color((240, 50), Some(128)).await.unwrap();

    assert!(changes.has_changed().unwrap());
    let state = changes.borrow_and_update().clone();
    assert_eq!(state.hs_color, Some((240, 50)));
    assert_eq!(state.brightness, 128);
    assert_eq!(state.color_mode, ColorMode::Hs);
}

#[tokio::test]
async fn hs_color_packet_carries_halved_hue_and_percentages() {
    let transport = Arc::new(MockTransport::ring());
    let device = session(transport.clone(), known_topology_config()).await;

    device.set_hs_color((300, 80), Some(128)).await.unwrap();

    let packet = transport.command_writes().pop().unwrap();
    assert_eq!(packet[9], 0xa1);
    assert_eq!(packet[10], 150);
    assert_eq!(packet[11], 80);
    assert_eq!(packet[12], 50);
}

#[tokio::test]
async fn ring_rgb_is_sent_as_hs() {
    let transport = Arc::new(MockTransport::ring());
    let device = session(transport.clone(), known_topology_config()).await;

    device.set_rgb_color((255, 0, 0), None).await.unwrap();

    let packet = transport.command_writes().pop().unwrap();
    assert_eq!(packet[9], 0xa1);
    assert_eq!(packet[10], 0);
    assert_eq!(packet[11], 100);
    let state = device.state();
    assert_eq!(state.color_mode, ColorMode::Hs);
    assert_eq!(state.hs_color, Some((0, 100)));
    assert_eq!(state.rgb_color, None);
}

#[tokio::test]
async fn strip_rgb_is_sent_as_solid_color() {
    let transport = Arc::new(MockTransport::strip());
    let device = session(transport.clone(), known_topology_config()).await;

    device.set_rgb_color((10, 20, 30), Some(255)).await.unwrap();

    let packet = transport.command_writes().pop().unwrap();
    assert_eq!(packet[8], 0x41);
    assert_eq!(packet[9], 0x01);
    assert_eq!(&packet[10..13], &[10, 20, 30]);
    assert_eq!(packet[17], 100);
    let state = device.state();
    assert_eq!(state.color_mode, ColorMode::Rgb);
    assert_eq!(state.rgb_color, Some((10, 20, 30)));
    assert_eq!(state.effect, None);
}

#[tokio::test]
async fn color_temp_is_ring_only() {
    let ring = Arc::new(MockTransport::ring());
    let device = session(ring.clone(), known_topology_config()).await;
    device.set_color_temp_kelvin(10_000, Some(255)).await.unwrap();
    let packet = ring.command_writes().pop().unwrap();
    assert_eq!(packet[13], 100);
    assert_eq!(packet[14], 100);
    assert_eq!(device.state().color_temp_kelvin, Some(6500));

    let strip = Arc::new(MockTransport::strip());
    let device = session(strip.clone(), known_topology_config()).await;
    let result = device.set_color_temp_kelvin(4000, None).await;
    assert!(matches!(result, Err(Error::Unsupported(_))));
    assert!(strip.writes().is_empty());
}

#[tokio::test]
async fn unknown_effect_is_rejected() {
    let transport = Arc::new(MockTransport::ring());
    let device = session(transport.clone(), known_topology_config()).await;

    let result = device.set_effect("Static Effect 3", None).await;

    assert!(matches!(result, Err(Error::EffectNotSupported(_))));
    assert!(transport.writes().is_empty());
}

#[tokio::test]
async fn strip_static_effect_uses_last_color() {
    let transport = Arc::new(MockTransport::strip());
    let device = session(transport.clone(), known_topology_config()).await;
    device.set_rgb_color((0, 255, 0), None).await.unwrap();

    device.set_effect("Static Effect 3", None).await.unwrap();

    let packet = transport.command_writes().pop().unwrap();
    assert_eq!(packet[8], 0x41);
    assert_eq!(packet[9], 0x03);
    assert_eq!(&packet[10..13], &[0, 255, 0]);
    let state = device.state();
    assert_eq!(state.effect.as_deref(), Some("Static Effect 3"));
    assert_eq!(state.color_mode, ColorMode::Brightness);
    assert_eq!(state.rgb_color, None);
    assert_eq!(state.effect_color, Some((0, 255, 0)));
}

#[tokio::test]
async fn brightness_change_resends_running_effect() {
    let transport = Arc::new(MockTransport::strip());
    let device = session(transport.clone(), known_topology_config()).await;

    device.set_brightness(128).await.unwrap();

    let packet = transport.command_writes().pop().unwrap();
    assert_eq!(packet[8], 0x42);
    assert_eq!(packet[9], 0x03);
    assert_eq!(packet[11], 50);
    assert_eq!(device.state().effect.as_deref(), Some("Effect 3"));
    assert_eq!(device.state().brightness, 128);
}

#[tokio::test]
async fn effect_speed_is_resent_with_running_effect() {
    let transport = Arc::new(MockTransport::strip());
    let device = session(transport.clone(), known_topology_config()).await;

    device.set_effect_speed(20).await.unwrap();

    let packet = transport.command_writes().pop().unwrap();
    assert_eq!(packet[9], 0x03);
    assert_eq!(packet[10], 20);
    assert_eq!(device.state().effect_speed, 20);
}

#[tokio::test]
async fn identical_led_settings_are_not_written() {
    let transport = Arc::new(MockTransport::ring());
    let device = session(transport.clone(), known_topology_config()).await;

    device
        .set_led_settings(Some(28), Some(ChipType::Ws2812b), Some(ColorOrder::Grb))
        .await
        .unwrap();

    assert!(transport.writes().is_empty());
    assert_eq!(transport.connects(), 0);
}

#[tokio::test]
async fn invalid_led_settings_are_ignored() {
    let transport = Arc::new(MockTransport::ring());
    let device = session(transport.clone(), known_topology_config()).await;

    // too many LEDs for a ring, then a chip only the strip knows
    device.set_led_settings(Some(300), None, None).await.unwrap();
    device
        .set_led_settings(None, Some(ChipType::Ws2812e), None)
        .await
        .unwrap();
    device.set_led_settings(Some(0), None, None).await.unwrap();

    assert!(transport.writes().is_empty());
    assert_eq!(device.state().led_count, Some(28));
}

#[tokio::test]
async fn led_settings_are_written_and_saved() {
    let transport = Arc::new(MockTransport::strip());
    let store = Arc::new(MemoryConfigStore::new());
    let device = LedNetWfDevice::with_options(
        transport.clone(),
        config(),
        Some(store.clone()),
        quick_retry(),
    )
    .await
    .unwrap();

    device
        .set_led_settings(Some(300), Some(ChipType::Ws2811), Some(ColorOrder::Rgb))
        .await
        .unwrap();

    let packet = transport.command_writes().pop().unwrap();
    assert_eq!(packet.len(), 19);
    assert_eq!(packet[8], 0x62);
    assert_eq!(&packet[9..11], &[0x01, 0x2c]);
    assert_eq!(&packet[11..13], &[0x00, 0x01]);
    assert_eq!(packet[13], 0x04);
    assert_eq!(packet[14], 0x00);
    assert_eq!(packet[15], 0x2c);

    let state = device.state();
    assert_eq!(state.led_count, Some(300));
    assert_eq!(state.chip_type, Some(ChipType::Ws2811));
    let saved = store.load(MAC).unwrap().unwrap();
    assert_eq!(saved.led_count, Some(300));
    assert_eq!(saved.color_order, Some(ColorOrder::Rgb));
    assert_eq!(device.config().chip_type, Some(ChipType::Ws2811));
}

#[tokio::test]
async fn failed_first_update_marks_power_unknown() {
    let transport = Arc::new(MockTransport::ring().fail_connects(&[Failure::NotFound]));
    let device = session(transport.clone(), known_topology_config()).await;
    assert_eq!(device.state().is_on, Some(false));

    device.update().await;

    assert_eq!(device.state().is_on, None);
}

#[tokio::test]
async fn failed_later_update_keeps_last_state() {
    let transport = Arc::new(MockTransport::ring());
    let device = session(transport.clone(), known_topology_config()).await;
    device.turn_on().await.unwrap();
    transport.drop_link();
    transport
        .connect_failures
        .lock()
        .unwrap()
        .push_back(Failure::Fatal);

    device.update().await;

    assert_eq!(device.state().is_on, Some(true));
}

#[tokio::test]
async fn failed_first_command_marks_power_unknown() {
    let transport = Arc::new(MockTransport::ring().fail_connects(&[Failure::NotFound]));
    let device = session(transport.clone(), known_topology_config()).await;

    let result = device.turn_on().await;

    assert!(matches!(result, Err(Error::DeviceNotFound(_))));
    assert_eq!(device.state().is_on, None);
}

#[tokio::test]
async fn failed_handshake_drops_the_link_and_is_retried() {
    let transport = Arc::new(MockTransport::ring().fail_writes(&[Failure::Fatal]));
    let device = session(transport.clone(), known_topology_config()).await;

    let result = device.turn_on().await;

    assert!(matches!(result, Err(Error::Unsupported(_))));
    assert!(!device.is_connected());
    assert_eq!(transport.disconnects(), 1);
    assert!(transport.writes().is_empty());

    device.turn_on().await.unwrap();

    assert_eq!(transport.connects(), 2);
    let writes = transport.writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0], HANDSHAKE);
    assert_eq!(writes[1][9], 0x23);
}

#[tokio::test]
async fn turn_off_nudges_a_static_color_first() {
    let transport = Arc::new(MockTransport::ring());
    let device = session(transport.clone(), known_topology_config()).await;
    device.set_hs_color((120, 100), Some(255)).await.unwrap();

    device.turn_off().await.unwrap();

    let commands = transport.command_writes();
    assert_eq!(commands.len(), 3);
    assert_eq!(&commands[1][9..13], &[0xa1, 60, 100, 99]);
    assert_eq!(commands[2][9], 0x24);
    let state = device.state();
    assert_eq!(state.is_on, Some(false));
    assert_eq!(state.brightness, 255);
}

#[tokio::test]
async fn turn_off_during_an_effect_sends_only_power() {
    let transport = Arc::new(MockTransport::strip());
    let device = session(transport.clone(), known_topology_config()).await;

    device.turn_off().await.unwrap();

    let commands = transport.command_writes();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0][9], 0x24);
}
