//! Connection lifecycle tests against the virtual serial device

use cncjog_communication::{
    AutoGrantBroker, ConnectionManager, LineConfig, PermissionBroker, PermissionOutcome,
    PermissionResponder, VirtualRead, VirtualSerialDriver,
};
use cncjog_core::{
    CandidateDevice, ConnectionError, ConnectionEvent, ConnectionStatus, EventDispatcher,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

const WAIT: Duration = Duration::from_secs(3);

/// Broker that holds requests until the test answers them
#[derive(Default)]
struct ManualBroker {
    pending: Mutex<Vec<(CandidateDevice, PermissionResponder)>>,
}

impl ManualBroker {
    fn take(&self) -> (CandidateDevice, PermissionResponder) {
        self.pending.lock().remove(0)
    }

    fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}

impl PermissionBroker for ManualBroker {
    fn request_permission(&self, device: &CandidateDevice, responder: PermissionResponder) {
        self.pending.lock().push((device.clone(), responder));
    }
}

fn auto_manager(driver: &VirtualSerialDriver) -> ConnectionManager {
    ConnectionManager::new(Arc::new(driver.clone()), Arc::new(AutoGrantBroker))
}

fn manual_manager(driver: &VirtualSerialDriver) -> (ConnectionManager, Arc<ManualBroker>) {
    let broker = Arc::new(ManualBroker::default());
    let manager = ConnectionManager::new(Arc::new(driver.clone()), broker.clone());
    (manager, broker)
}

fn drain(rx: &mut broadcast::Receiver<ConnectionEvent>) -> Vec<ConnectionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Collect events until one matches, or fail after `WAIT`
fn wait_for_event(
    rx: &mut broadcast::Receiver<ConnectionEvent>,
    matches: impl Fn(&ConnectionEvent) -> bool,
) -> Vec<ConnectionEvent> {
    let deadline = Instant::now() + WAIT;
    let mut seen = Vec::new();
    while Instant::now() < deadline {
        match rx.try_recv() {
            Ok(event) => {
                let done = matches(&event);
                seen.push(event);
                if done {
                    return seen;
                }
            }
            Err(_) => thread::sleep(Duration::from_millis(2)),
        }
    }
    panic!("expected event never arrived; saw {:?}", seen);
}

fn wait_until(condition: impl Fn() -> bool) {
    let deadline = Instant::now() + WAIT;
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(2));
    }
}

fn failures(events: &[ConnectionEvent]) -> Vec<ConnectionError> {
    events
        .iter()
        .filter_map(|event| match event {
            ConnectionEvent::Failed(err) => Some(err.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_connect_with_auto_grant() {
    let driver = VirtualSerialDriver::new();
    let manager = auto_manager(&driver);
    let mut rx = manager.subscribe();
    let device = driver.device();

    manager.request_connect(device.clone()).unwrap();

    assert!(manager.is_connected());
    assert_eq!(manager.status(), ConnectionStatus::Open(device.clone()));
    assert_eq!(driver.configured(), Some(LineConfig::CNC_DEFAULT));

    let events = drain(&mut rx);
    assert_eq!(
        events,
        vec![
            ConnectionEvent::Log("Requesting permission for cncjog Virtual Controller...".into()),
            ConnectionEvent::StateChanged(ConnectionStatus::AwaitingPermission(device.clone())),
            ConnectionEvent::Log("Driver: Virtual CDC-ACM, 1 port(s)".into()),
            ConnectionEvent::Log("  Port 0: /dev/ttyVIRTUAL0:0".into()),
            ConnectionEvent::Log("Successfully connected to cncjog Virtual Controller".into()),
            ConnectionEvent::StateChanged(ConnectionStatus::Open(device)),
        ]
    );

    manager.shutdown();
    assert_eq!(driver.open_handles(), 0);
}

#[test]
fn test_permission_denied() {
    let driver = VirtualSerialDriver::new();
    let (manager, broker) = manual_manager(&driver);
    let mut rx = manager.subscribe();

    manager.request_connect(driver.device()).unwrap();
    assert_eq!(
        manager.status(),
        ConnectionStatus::AwaitingPermission(driver.device())
    );

    let (device, responder) = broker.take();
    responder.deny(device);

    assert_eq!(manager.status(), ConnectionStatus::Disconnected);
    assert_eq!(driver.open_count(), 0);

    let events = drain(&mut rx);
    assert_eq!(
        &events[events.len() - 2..],
        &[
            ConnectionEvent::Failed(ConnectionError::PermissionDenied {
                device: "cncjog Virtual Controller".into()
            }),
            ConnectionEvent::StateChanged(ConnectionStatus::Disconnected),
        ]
    );
}

#[test]
fn test_grant_without_device_uses_pending_device() {
    let driver = VirtualSerialDriver::new();
    let (manager, broker) = manual_manager(&driver);

    manager.request_connect(driver.device()).unwrap();
    let (_, responder) = broker.take();
    responder.respond(PermissionOutcome {
        device: None,
        granted: true,
    });

    assert_eq!(manager.status(), ConnectionStatus::Open(driver.device()));
    manager.shutdown();
}

#[test]
fn test_stale_permission_response_is_ignored() {
    let driver = VirtualSerialDriver::new();
    let (manager, broker) = manual_manager(&driver);

    manager.request_connect(driver.device()).unwrap();
    let (device, stale) = broker.take();
    manager.disconnect();

    manager.request_connect(driver.device()).unwrap();
    stale.grant(device);

    assert_eq!(
        manager.status(),
        ConnectionStatus::AwaitingPermission(driver.device())
    );
    assert_eq!(driver.open_count(), 0);
    assert_eq!(broker.pending(), 1);

    manager.disconnect();
    assert_eq!(manager.status(), ConnectionStatus::Disconnected);
}

#[test]
fn test_no_driver() {
    let driver = VirtualSerialDriver::new();
    driver.set_recognized(false);
    let manager = auto_manager(&driver);
    let mut rx = manager.subscribe();

    manager.request_connect(driver.device()).unwrap();

    assert_eq!(manager.status(), ConnectionStatus::Disconnected);
    assert_eq!(
        failures(&drain(&mut rx)),
        vec![ConnectionError::NoDriver {
            device: "cncjog Virtual Controller".into()
        }]
    );
}

#[test]
fn test_no_ports() {
    let driver = VirtualSerialDriver::new();
    driver.set_port_count(0);
    let manager = auto_manager(&driver);
    let mut rx = manager.subscribe();

    manager.request_connect(driver.device()).unwrap();

    assert_eq!(manager.status(), ConnectionStatus::Disconnected);
    assert_eq!(
        failures(&drain(&mut rx)),
        vec![ConnectionError::NoPorts {
            device: "cncjog Virtual Controller".into()
        }]
    );
}

#[test]
fn test_open_failure() {
    let driver = VirtualSerialDriver::new();
    driver.fail_open("device busy");
    let manager = auto_manager(&driver);
    let mut rx = manager.subscribe();

    manager.request_connect(driver.device()).unwrap();

    assert_eq!(manager.status(), ConnectionStatus::Disconnected);
    assert_eq!(
        failures(&drain(&mut rx)),
        vec![ConnectionError::FailedToOpen {
            port: "/dev/ttyVIRTUAL0:0".into(),
            reason: "device busy".into()
        }]
    );
}

#[test]
fn test_configure_failure_closes_port() {
    let driver = VirtualSerialDriver::new();
    driver.fail_configure("unsupported baud rate");
    let manager = auto_manager(&driver);
    let mut rx = manager.subscribe();

    manager.request_connect(driver.device()).unwrap();

    assert_eq!(manager.status(), ConnectionStatus::Disconnected);
    assert_eq!(driver.open_count(), 1);
    assert_eq!(driver.open_handles(), 0);
    assert!(matches!(
        failures(&drain(&mut rx)).as_slice(),
        [ConnectionError::FailedToOpen { .. }]
    ));
}

#[test]
fn test_connect_while_open_is_rejected() {
    let driver = VirtualSerialDriver::new();
    let manager = auto_manager(&driver);
    manager.request_connect(driver.device()).unwrap();

    let err = manager.request_connect(driver.device()).unwrap_err();
    assert_eq!(err, ConnectionError::invalid_state("Disconnected", "Open"));
    assert!(manager.is_connected());
    assert_eq!(driver.open_count(), 1);

    manager.shutdown();
}

#[test]
fn test_connect_while_awaiting_is_rejected() {
    let driver = VirtualSerialDriver::new();
    let (manager, broker) = manual_manager(&driver);
    manager.request_connect(driver.device()).unwrap();

    let err = manager.request_connect(driver.device()).unwrap_err();
    assert_eq!(
        err,
        ConnectionError::invalid_state("Disconnected", "AwaitingPermission")
    );
    assert_eq!(broker.pending(), 1);
}

#[test]
fn test_read_timeouts_keep_connection_open() {
    let driver = VirtualSerialDriver::new();
    for _ in 0..5 {
        driver.push_read(VirtualRead::Timeout);
    }
    let manager = auto_manager(&driver);
    let mut rx = manager.subscribe();

    manager.request_connect(driver.device()).unwrap();
    wait_until(|| driver.read_calls() >= 6);

    assert!(manager.is_connected());
    assert!(failures(&drain(&mut rx)).is_empty());
    manager.shutdown();
}

#[test]
fn test_received_text_is_trimmed_and_forwarded() {
    let driver = VirtualSerialDriver::new();
    driver.push_read(VirtualRead::text("Grbl 1.1h ['$' for help]\r\n"));
    driver.push_read(VirtualRead::text("\r\n"));
    driver.push_read(VirtualRead::text("ok\r\n"));
    let manager = auto_manager(&driver);
    let mut rx = manager.subscribe();

    manager.request_connect(driver.device()).unwrap();
    let events = wait_for_event(&mut rx, |e| *e == ConnectionEvent::Received("ok".into()));

    let received: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ConnectionEvent::Received(text) => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(received, vec!["Grbl 1.1h ['$' for help]", "ok"]);
    manager.shutdown();
}

#[test]
fn test_read_error_closes_connection_once() {
    let driver = VirtualSerialDriver::new();
    driver.push_read(VirtualRead::Error("device unplugged".into()));
    let manager = auto_manager(&driver);
    let mut rx = manager.subscribe();

    manager.request_connect(driver.device()).unwrap();
    let events = wait_for_event(&mut rx, |e| {
        *e == ConnectionEvent::StateChanged(ConnectionStatus::Disconnected)
    });

    assert_eq!(
        failures(&events),
        vec![ConnectionError::ConnectionLost {
            reason: "device unplugged".into()
        }]
    );
    assert!(!manager.is_connected());
    assert_eq!(
        manager.send(b"S100\n"),
        Err(ConnectionError::NotConnected)
    );

    manager.shutdown();
    assert!(drain(&mut rx).is_empty());
    assert_eq!(driver.open_handles(), 0);
}

#[test]
fn test_send_writes_and_reports() {
    let driver = VirtualSerialDriver::new();
    let manager = auto_manager(&driver);
    manager.request_connect(driver.device()).unwrap();
    let mut rx = manager.subscribe();

    manager.send_command("G91\nG0 X0.10\nG90\n").unwrap();

    assert_eq!(driver.written_text(), "G91\nG0 X0.10\nG90\n");
    assert_eq!(
        drain(&mut rx),
        vec![ConnectionEvent::Sent("G91\nG0 X0.10\nG90\n".into())]
    );
    manager.shutdown();
}

#[test]
fn test_controller_replies_arrive_after_send() {
    let driver = VirtualSerialDriver::new();
    driver.set_echo_ok(true);
    let manager = auto_manager(&driver);
    let mut rx = manager.subscribe();
    manager.request_connect(driver.device()).unwrap();

    manager.send_command("S1000\n").unwrap();
    wait_for_event(&mut rx, |e| *e == ConnectionEvent::Received("ok".into()));
    manager.shutdown();
}

#[test]
fn test_send_while_disconnected_is_a_no_op() {
    let driver = VirtualSerialDriver::new();
    let manager = auto_manager(&driver);
    let mut rx = manager.subscribe();

    assert_eq!(manager.send(b"S100\n"), Err(ConnectionError::NotConnected));
    assert!(driver.written().is_empty());
    assert!(drain(&mut rx).is_empty());
}

#[test]
fn test_write_failure_reports_once() {
    let driver = VirtualSerialDriver::new();
    let manager = auto_manager(&driver);
    manager.request_connect(driver.device()).unwrap();
    let mut rx = manager.subscribe();
    driver.fail_writes("broken pipe");

    let err = manager.send(b"S100\n").unwrap_err();
    assert_eq!(
        err,
        ConnectionError::ConnectionLost {
            reason: "Write failed: broken pipe".into()
        }
    );
    assert_eq!(manager.status(), ConnectionStatus::Disconnected);

    assert_eq!(
        manager.send(b"S200\n"),
        Err(ConnectionError::NotConnected)
    );
    manager.shutdown();

    let events = drain(&mut rx);
    assert_eq!(failures(&events), vec![err]);
    assert_eq!(
        events.last(),
        Some(&ConnectionEvent::StateChanged(ConnectionStatus::Disconnected))
    );
    assert_eq!(driver.open_handles(), 0);
}

#[test]
fn test_disconnect_is_idempotent() {
    let driver = VirtualSerialDriver::new();
    let manager = auto_manager(&driver);
    manager.request_connect(driver.device()).unwrap();
    let mut rx = manager.subscribe();

    manager.disconnect();
    assert_eq!(
        drain(&mut rx),
        vec![
            ConnectionEvent::Log("Disconnecting...".into()),
            ConnectionEvent::StateChanged(ConnectionStatus::Disconnected),
        ]
    );

    manager.disconnect();
    manager.shutdown();
    assert!(drain(&mut rx).is_empty());
    assert_eq!(manager.status(), ConnectionStatus::Disconnected);
    assert_eq!(driver.open_handles(), 0);
}

#[test]
fn test_reconnect_after_disconnect() {
    let driver = VirtualSerialDriver::new();
    let manager = auto_manager(&driver);

    manager.request_connect(driver.device()).unwrap();
    manager.disconnect();
    manager.request_connect(driver.device()).unwrap();

    assert!(manager.is_connected());
    assert_eq!(driver.open_count(), 2);
    // write and read handles of the new connection only
    assert_eq!(driver.open_handles(), 2);
    manager.shutdown();
    assert_eq!(driver.open_handles(), 0);
}

#[test]
fn test_reconnect_while_old_loop_is_reading() {
    let driver = VirtualSerialDriver::new();
    let manager = auto_manager(&driver);

    manager.request_connect(driver.device()).unwrap();
    wait_until(|| driver.read_calls() > 0);
    let old_reads = driver.read_calls();

    manager.disconnect();
    manager.request_connect(driver.device()).unwrap();

    assert_eq!(driver.open_handles(), 2);
    wait_until(|| driver.read_calls() > old_reads + 2);
    assert_eq!(driver.open_handles(), 2);
    manager.shutdown();
    assert_eq!(driver.open_handles(), 0);
}

#[test]
fn test_concurrent_connect_and_disconnect_leave_no_loop_behind() {
    let driver = VirtualSerialDriver::new();
    let manager = auto_manager(&driver);

    let workers: Vec<_> = (0..2)
        .map(|_| {
            let manager = manager.clone();
            let device = driver.device();
            thread::spawn(move || {
                for _ in 0..50 {
                    let _ = manager.request_connect(device.clone());
                    manager.disconnect();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    manager.shutdown();
    assert_eq!(manager.status(), ConnectionStatus::Disconnected);
    assert_eq!(driver.open_handles(), 0);
}

#[test]
fn test_send_racing_read_failure() {
    let driver = VirtualSerialDriver::new();
    let manager = ConnectionManager::with_dispatcher(
        Arc::new(driver.clone()),
        Arc::new(AutoGrantBroker),
        EventDispatcher::new(1 << 16),
    );
    let mut rx = manager.subscribe();
    manager.request_connect(driver.device()).unwrap();

    let sender = {
        let manager = manager.clone();
        thread::spawn(move || loop {
            match manager.send(b"S100\n") {
                Ok(()) => thread::sleep(Duration::from_micros(200)),
                Err(err) => return err,
            }
        })
    };
    wait_until(|| !driver.written().is_empty());
    driver.push_read(VirtualRead::Error("device unplugged".into()));

    assert_eq!(sender.join().unwrap(), ConnectionError::NotConnected);
    manager.shutdown();

    let events = drain(&mut rx);
    assert_eq!(
        failures(&events),
        vec![ConnectionError::ConnectionLost {
            reason: "device unplugged".into()
        }]
    );
    assert_eq!(
        events.last(),
        Some(&ConnectionEvent::StateChanged(ConnectionStatus::Disconnected))
    );
    assert_eq!(manager.status(), ConnectionStatus::Disconnected);
    assert_eq!(driver.open_handles(), 0);
    assert_eq!(driver.written_text().len() % "S100\n".len(), 0);
}

#[test]
fn test_list_candidates() {
    let driver = VirtualSerialDriver::new();
    let manager = auto_manager(&driver);
    assert_eq!(manager.list_candidates().unwrap(), vec![driver.device()]);

    driver.set_present(false);
    assert!(manager.list_candidates().unwrap().is_empty());
}
