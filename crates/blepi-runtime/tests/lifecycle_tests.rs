//! Adapter lifecycle and connection admission
//!
//! Drives a `Peripheral` against the mock transport and checks the side
//! effects of power edges: setup order, re-registration of the same tree,
//! non-fatal address query failures and refused connections.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use blepi_harness::{EventInjector, MockTransport, MockTransportConfig, TransportCall};
use blepi_runtime::{
    create_event_channel, AdapterState, AdvertisingMode, AttStatus, BleUuid, CentralId,
    Characteristic, Notifier, Peripheral, PeripheralConfig, PeripheralError, Request, Result, Service,
    TransportEvent,
};
use tokio_test::assert_ok;

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

const APP_SERVICE: BleUuid = BleUuid::from_u128(0xFD2B4448_AA0F_4A15_A62F_EB0BE77A0000);
const SERVICE_NAME: BleUuid = BleUuid::from_u128(0xFD2B4448_AA0F_4A15_A62F_EB0BE77A0001);
const INPUT: BleUuid = BleUuid::from_u128(0xFD2B4448_AA0F_4A15_A62F_EB0BE77A0005);
const STREAM: BleUuid = BleUuid::from_u128(0xFD2B4448_AA0F_4A15_A62F_EB0BE77A0003);

fn create_test_service() -> Service {
    Service::builder(APP_SERVICE)
        .characteristic(
            Characteristic::builder(SERVICE_NAME)
                .on_read(|_req: &Request| Ok(b"PiSugar BLE Wifi Config".to_vec()))
                .build(),
        )
        .characteristic(
            Characteristic::builder(INPUT)
                .on_write(|_req: &Request, _data: &[u8]| AttStatus::Success)
                .build(),
        )
        .characteristic(
            Characteristic::builder(STREAM)
                .on_notify(|_req, n: Notifier| async move { n.cancelled().await })
                .build(),
        )
        .build()
}

fn create_test_peripheral(transport: &Arc<MockTransport>, config: PeripheralConfig) -> Peripheral {
    Peripheral::builder(config)
        .service(create_test_service())
        .build(transport.clone())
        .unwrap()
}

fn state(state: AdapterState) -> TransportEvent {
    TransportEvent::AdapterStateChanged(state)
}

fn connected(id: &str) -> TransportEvent {
    TransportEvent::CentralConnected {
        central: CentralId::new(id),
    }
}

// ----------------------------------------------------------------------------
// Power Edges
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_power_cycle_reruns_setup_once_with_same_tree() {
    let transport = Arc::new(MockTransport::default());
    let mut peripheral = create_test_peripheral(&transport, PeripheralConfig::default());

    peripheral.handle_event(state(AdapterState::PoweredOn)).await;
    peripheral.handle_event(state(AdapterState::PoweredOn)).await;
    assert_eq!(peripheral.setup_runs(), 1);
    assert!(peripheral.is_ready());

    peripheral.handle_event(state(AdapterState::PoweredOff)).await;
    assert!(!peripheral.is_ready());
    assert_eq!(peripheral.advertising_mode(), AdvertisingMode::Off);

    peripheral.handle_event(state(AdapterState::PoweredOn)).await;
    assert_eq!(peripheral.setup_runs(), 2);

    let published = transport.published().await;
    assert_eq!(published.len(), 2);
    assert_eq!(published[0], published[1]);
    assert_eq!(
        published[0],
        vec![BleUuid::from_u16(0x1800), BleUuid::from_u16(0x1801), APP_SERVICE]
    );

    let expected = AdvertisingMode::Static {
        name: "Gopher".to_string(),
        services: vec![APP_SERVICE],
    };
    let history = transport.advertising_history().await;
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|(_, mode)| *mode == expected));
}

#[tokio::test]
async fn test_setup_order() {
    let transport = Arc::new(MockTransport::default());
    let mut peripheral = create_test_peripheral(&transport, PeripheralConfig::default());
    peripheral.handle_event(state(AdapterState::PoweredOn)).await;

    let calls: Vec<TransportCall> = transport.calls().await.into_iter().map(|(_, c)| c).collect();
    assert!(matches!(calls[0], TransportCall::SupportsLe));
    assert!(matches!(calls[1], TransportCall::RawCommand { opcode: 0x1009, .. }));
    assert!(matches!(calls[2], TransportCall::SetAdvertisingParameters(p) if p.interval_min == 0x00F4 && p.channel_map == 0x07));
    assert!(matches!(calls[3], TransportCall::PublishServices(_)));
    assert!(matches!(calls[4], TransportCall::StartAdvertising(_)));
    assert_eq!(
        peripheral.bd_addr().map(|a| a.to_string()),
        Some("66:55:44:33:22:11".to_string())
    );
}

#[tokio::test]
async fn test_bd_addr_failure_is_not_fatal() {
    let transport = Arc::new(MockTransport::new(
        MockTransportConfig::default().with_bd_addr_response(None),
    ));
    let mut peripheral = create_test_peripheral(&transport, PeripheralConfig::default());
    peripheral.handle_event(state(AdapterState::PoweredOn)).await;

    assert!(peripheral.is_ready());
    assert!(peripheral.bd_addr().is_none());
    assert!(peripheral.advertising_mode().is_static());
}

#[tokio::test]
async fn test_missing_le_support_is_reported_to_application() {
    let transport = Arc::new(MockTransport::new(
        MockTransportConfig::default().with_supports_le(false),
    ));
    let observed = Arc::new(Mutex::new(Vec::new()));
    let failures = Arc::new(Mutex::new(Vec::new()));
    let (states, errors) = (observed.clone(), failures.clone());
    let mut peripheral = Peripheral::builder(PeripheralConfig::default())
        .service(create_test_service())
        .on_state_change(move |s| states.lock().unwrap().push(s))
        .on_setup_failed(move |e| errors.lock().unwrap().push(e.clone()))
        .build(transport.clone())
        .unwrap();

    peripheral.handle_event(state(AdapterState::Unauthorized)).await;
    peripheral.handle_event(state(AdapterState::PoweredOn)).await;

    assert!(!peripheral.is_ready());
    assert_eq!(peripheral.state(), AdapterState::Unsupported);
    assert_eq!(peripheral.advertising_mode(), AdvertisingMode::Off);
    assert!(transport.advertising_history().await.is_empty());
    assert!(transport.published().await.is_empty());
    assert_eq!(
        *observed.lock().unwrap(),
        vec![
            AdapterState::Unauthorized,
            AdapterState::PoweredOn,
            AdapterState::Unsupported
        ]
    );
    assert_eq!(
        *failures.lock().unwrap(),
        vec![PeripheralError::AdapterUnsupported]
    );

    // the next PoweredOn report retries setup
    peripheral.handle_event(state(AdapterState::PoweredOn)).await;
    assert_eq!(peripheral.setup_runs(), 2);
    assert_eq!(failures.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_failed_setup_leaves_nothing_registered() {
    let transport = Arc::new(MockTransport::new(
        MockTransportConfig::default().with_fail_advertising(true),
    ));
    let failures = Arc::new(Mutex::new(Vec::new()));
    let errors = failures.clone();
    let mut peripheral = Peripheral::builder(PeripheralConfig::default())
        .service(create_test_service())
        .on_setup_failed(move |e| errors.lock().unwrap().push(e.clone()))
        .build(transport.clone())
        .unwrap();

    peripheral.handle_event(state(AdapterState::PoweredOn)).await;

    assert!(!peripheral.is_ready());
    assert_eq!(peripheral.state(), AdapterState::PoweredOn);
    assert!(peripheral.registry().services().is_empty());
    assert!(matches!(
        failures.lock().unwrap().as_slice(),
        [PeripheralError::Transport(_)]
    ));
    assert_eq!(
        transport
            .count(|c| matches!(c, TransportCall::ClearServices))
            .await,
        1
    );
    assert_eq!(
        transport
            .count(|c| matches!(c, TransportCall::StopAdvertising))
            .await,
        1
    );
    assert_eq!(
        peripheral
            .registry()
            .route_read(&CentralId::new("stranger"), &BleUuid::from_u16(0x2A00)),
        Err(AttStatus::CharacteristicNotFound)
    );

    peripheral.handle_event(connected("c1")).await;
    assert_eq!(peripheral.registry().central_count(), 0);
    assert_eq!(transport.disconnects().await, vec![CentralId::new("c1")]);
}

#[tokio::test]
async fn test_invalid_tree_is_rejected_at_build() {
    let broken = Service::builder(APP_SERVICE)
        .characteristic(
            Characteristic::builder(STREAM)
                .properties(blepi_runtime::Properties::NOTIFY)
                .build(),
        )
        .build();
    let result = Peripheral::builder(PeripheralConfig::default())
        .service(broken)
        .build(Arc::new(MockTransport::default()));
    assert!(matches!(
        result,
        Err(PeripheralError::MissingNotifyHandler { characteristic }) if characteristic == STREAM
    ));
}

#[tokio::test]
async fn test_characteristic_shared_across_services_is_rejected_at_build() {
    let shared = BleUuid::from_u16(0xAAAA);
    let service = |uuid: u16| {
        Service::builder(BleUuid::from_u16(uuid))
            .characteristic(Characteristic::builder(shared).value(b"x".to_vec()).build())
            .build()
    };
    let result = Peripheral::builder(PeripheralConfig::default())
        .service(service(0xAAA0))
        .service(service(0xAAB0))
        .build(Arc::new(MockTransport::default()));
    assert!(matches!(
        result,
        Err(PeripheralError::DuplicateCharacteristic { characteristic }) if characteristic == shared
    ));
}

#[tokio::test]
async fn test_meta_service_clash_is_rejected_at_build() {
    let gap = Service::builder(BleUuid::from_u16(0x1800)).build();
    let result = Peripheral::builder(PeripheralConfig::default())
        .service(gap)
        .build(Arc::new(MockTransport::default()));
    assert!(matches!(
        result,
        Err(PeripheralError::ServiceAlreadyRegistered { service }) if service == BleUuid::from_u16(0x1800)
    ));

    let device_name = Service::builder(APP_SERVICE)
        .characteristic(
            Characteristic::builder(BleUuid::from_u16(0x2A00))
                .value(b"other".to_vec())
                .build(),
        )
        .build();
    let result = Peripheral::builder(PeripheralConfig::default())
        .service(device_name)
        .build(Arc::new(MockTransport::default()));
    assert!(matches!(
        result,
        Err(PeripheralError::DuplicateCharacteristic { .. })
    ));
}

// ----------------------------------------------------------------------------
// Connections
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_connection_before_setup_is_refused() {
    let transport = Arc::new(MockTransport::default());
    let mut peripheral = create_test_peripheral(&transport, PeripheralConfig::default());

    peripheral.handle_event(connected("early")).await;
    assert_eq!(peripheral.registry().central_count(), 0);
    assert_eq!(transport.disconnects().await, vec![CentralId::new("early")]);
}

#[tokio::test]
async fn test_connection_cap() {
    let transport = Arc::new(MockTransport::default());
    let connects = Arc::new(AtomicUsize::new(0));
    let counter = connects.clone();
    let mut peripheral = Peripheral::builder(PeripheralConfig::default())
        .service(create_test_service())
        .on_central_connected(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build(transport.clone())
        .unwrap();

    peripheral.handle_event(state(AdapterState::PoweredOn)).await;
    peripheral.handle_event(connected("c1")).await;
    peripheral.handle_event(connected("c1")).await;
    peripheral.handle_event(connected("c2")).await;

    assert_eq!(peripheral.registry().central_count(), 1);
    assert_eq!(connects.load(Ordering::SeqCst), 1);
    assert_eq!(transport.disconnects().await, vec![CentralId::new("c2")]);
}

#[tokio::test]
async fn test_power_off_severs_centrals() {
    let transport = Arc::new(MockTransport::default());
    let disconnected = Arc::new(Mutex::new(Vec::new()));
    let sink = disconnected.clone();
    let mut peripheral = Peripheral::builder(PeripheralConfig::default().with_max_connections(2))
        .service(create_test_service())
        .on_central_disconnected(move |id| sink.lock().unwrap().push(id.clone()))
        .build(transport.clone())
        .unwrap();

    peripheral.handle_event(state(AdapterState::PoweredOn)).await;
    peripheral.handle_event(connected("c1")).await;
    peripheral
        .handle_event(TransportEvent::Subscribe {
            central: CentralId::new("c1"),
            characteristic: STREAM,
        })
        .await;
    peripheral.handle_event(state(AdapterState::PoweredOff)).await;

    assert_eq!(peripheral.registry().central_count(), 0);
    assert!(peripheral.registry().services().is_empty());
    assert_eq!(*disconnected.lock().unwrap(), vec![CentralId::new("c1")]);
    assert_eq!(
        transport
            .count(|c| matches!(c, TransportCall::ClearServices))
            .await,
        1
    );
}

// ----------------------------------------------------------------------------
// End to End
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_event_loop_end_to_end() -> Result<()> {
    let transport = Arc::new(MockTransport::default());
    let peripheral = create_test_peripheral(&transport, PeripheralConfig::default());
    let (sender, receiver) = create_event_channel(16);
    let handle = peripheral.spawn(receiver);
    let injector = EventInjector::new(sender);

    injector.power_on().await?;
    injector.connect("c1").await?;

    let value = injector.read("c1", SERVICE_NAME).await?;
    assert_eq!(value, Ok(b"PiSugar BLE Wifi Config".to_vec()));
    assert_eq!(
        injector.read("c1", INPUT).await?,
        Err(AttStatus::ReadNotPermitted)
    );
    assert_eq!(
        injector.write("c1", BleUuid::from_u16(0xBEEF), b"x").await?,
        AttStatus::CharacteristicNotFound
    );
    assert_eq!(injector.write("c1", INPUT, b"hello").await?, AttStatus::Success);
    assert_eq!(
        injector.read("c1", BleUuid::from_u16(0x2A00)).await?,
        Ok(b"Gopher".to_vec())
    );

    drop(injector);
    assert_ok!(handle.await.expect("dispatch task panicked"));

    let calls = transport.calls().await;
    assert_eq!(calls[0].1, TransportCall::StopAdvertising);
    Ok(())
}
