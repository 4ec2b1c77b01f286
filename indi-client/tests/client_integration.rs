//! End-to-end client tests against an in-process mock server.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use indi_client::{ClientConfig, ClientError, IndiClient, LightState, WaitPolicy};

const DEF_EQ: &str = "<defNumberVector device=\"Tele\" name=\"EQ\" perm=\"rw\" state=\"Ok\">\
    <defNumber name=\"RA\" format=\"%10.6m\" min=\"0\" max=\"24\" step=\"0\">1:30:00</defNumber>\
    <defNumber name=\"DEC\" format=\"%10.6m\" min=\"-90\" max=\"90\" step=\"0\">0</defNumber>\
    </defNumberVector>";

const SET_EQ: &str = "<setNumberVector device=\"Tele\" name=\"EQ\" state=\"Ok\">\
    <oneNumber name=\"RA\">2:00:00</oneNumber></setNumberVector>";

const DEF_CONNECTION: &str = "<defSwitchVector device=\"Tele\" name=\"CONNECTION\" \
    rule=\"OneOfMany\" perm=\"rw\" state=\"Ok\">\
    <defSwitch name=\"CONNECT\" label=\"Connect\">On</defSwitch>\
    <defSwitch name=\"DISCONNECT\" label=\"Disconnect\">Off</defSwitch>\
    </defSwitchVector>";

/// Accept one connection, write the scripted frames, then capture
/// everything the client sends until it disconnects.
fn spawn_server(frames: &[&str]) -> (u16, Arc<Mutex<Vec<u8>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
    let port = listener.local_addr().expect("local addr").port();
    let received = Arc::new(Mutex::new(Vec::new()));
    let frames: Vec<String> = frames.iter().map(|s| s.to_string()).collect();
    let captured = Arc::clone(&received);
    thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            for frame in &frames {
                let _ = stream.write_all(frame.as_bytes());
            }
            let mut buf = [0u8; 4096];
            loop {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => captured.lock().expect("capture lock").extend_from_slice(&buf[..n]),
                }
            }
        }
    });
    (port, received)
}

fn test_client(port: u16) -> IndiClient {
    let config = ClientConfig::new("127.0.0.1", port)
        .with_wait_timeout(Duration::from_millis(100))
        .with_read_timeout(Duration::from_millis(10))
        .with_reconnect_backoff(Duration::from_millis(10), Duration::from_millis(50));
    let mut client = IndiClient::connect(config).expect("connect to mock server");
    // Bound every blocking accessor so a failing test ends instead of
    // hanging: keep waiting for ~5 seconds, then give up.
    let calls = AtomicUsize::new(0);
    client.set_timeout_handler(move |_, _| {
        if calls.fetch_add(1, Ordering::SeqCst) > 50 {
            WaitPolicy::GiveUp
        } else {
            WaitPolicy::Continue
        }
    });
    client
}

fn wait_for(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn define_then_query() {
    let (port, _) = spawn_server(&[DEF_EQ]);
    let mut client = test_client(port);

    let ra = client.get_float("Tele", "EQ", "RA").expect("RA value");
    assert!((ra - 1.5).abs() < 1.0 / 3600.0, "sexagesimal decode, got {ra}");
    assert_eq!(client.get_text("Tele", "EQ", "RA").as_deref(), Some("1:30:0.00"));

    let vector = client.get_vector("Tele", "EQ").expect("EQ vector");
    assert_eq!(vector.state(), LightState::Ok);
    assert_eq!(vector.elements().len(), 2);

    client.shutdown();
}

#[test]
fn set_transfer_updates_stored_value() {
    let (port, _) = spawn_server(&[DEF_EQ, SET_EQ]);
    let mut client = test_client(port);

    // The define is guaranteed first; the update lands once processed.
    assert!(client.get_vector("Tele", "EQ").is_some());
    let updated = wait_for(
        || {
            client
                .get_float("Tele", "EQ", "RA")
                .is_some_and(|ra| (ra - 2.0).abs() < 1e-9)
        },
        Duration::from_secs(2),
    );
    assert!(updated, "set transfer must update the stored element in place");

    // The element object was merged, not replaced: DEC is still there.
    assert_eq!(client.get_float("Tele", "EQ", "DEC"), Some(0.0));

    client.shutdown();
}

#[test]
fn handlers_fire_once_per_reception_and_defs_once_ever() {
    // A repeated define must not re-fire the define handler.
    let (port, _) = spawn_server(&[DEF_EQ, SET_EQ, DEF_EQ]);
    let mut client = test_client(port);

    let defs = Arc::new(AtomicUsize::new(0));
    let def_count = Arc::clone(&defs);
    client.set_def_handlers(
        |_| {},
        move |_| {
            def_count.fetch_add(1, Ordering::SeqCst);
        },
        |_| {},
        |_| {},
        |_| {},
    );

    let calls = Arc::new(AtomicUsize::new(0));
    let call_count = Arc::clone(&calls);
    let guard = client.add_element_callback("Tele", "EQ", "RA", move |_, _| {
        call_count.fetch_add(1, Ordering::SeqCst);
    });
    assert!(guard.is_some(), "registration must block until the vector exists");
    // Registration delivered the immediate first dispatch.
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Three queued vector events (def, set, def) re-dispatch through
    // process_events.
    let dispatched = wait_for(
        || {
            client.process_events().expect("process events");
            calls.load(Ordering::SeqCst) == 4
        },
        Duration::from_secs(2),
    );
    assert!(dispatched, "one dispatch per received update");
    assert_eq!(defs.load(Ordering::SeqCst), 1, "define handler fires once per pair");

    client.shutdown();
    assert!(matches!(client.process_events(), Err(ClientError::Disconnected)));
}

#[test]
fn message_routed_to_message_handler() {
    let message = "<message device=\"Tele\" timestamp=\"T0\" message=\"Telescope is connected\"/>";
    let (port, _) = spawn_server(&[DEF_EQ, message]);
    let mut client = test_client(port);

    let texts = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&texts);
    client.set_message_handler(move |message| {
        sink.lock().expect("sink lock").push(message.text.clone());
    });

    let delivered = wait_for(
        || {
            client.process_events().expect("process events");
            !texts.lock().expect("sink lock").is_empty()
        },
        Duration::from_secs(2),
    );
    assert!(delivered);
    assert_eq!(
        texts.lock().expect("sink lock")[0],
        "Telescope is connected"
    );

    client.shutdown();
}

#[test]
fn unknown_vector_tag_produces_no_entry() {
    let unknown = "<defFooVector device=\"X\" name=\"Y\"></defFooVector>";
    let (port, _) = spawn_server(&[unknown, DEF_EQ]);
    let mut client = test_client(port);

    // The recognized vector that followed the junk arrives intact.
    assert!(client.get_vector("Tele", "EQ").is_some());
    assert!(client.try_get_vector("X", "Y").is_none());

    client.shutdown();
}

#[test]
fn timeout_handler_can_give_up() {
    let (port, _) = spawn_server(&[]);
    let mut client = {
        let config = ClientConfig::new("127.0.0.1", port)
            .with_wait_timeout(Duration::from_millis(30))
            .with_read_timeout(Duration::from_millis(10));
        IndiClient::connect(config).expect("connect to mock server")
    };

    let invocations = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&invocations);
    client.set_timeout_handler(move |device, vector| {
        assert_eq!((device, vector), ("Nope", "MISSING"));
        if seen.fetch_add(1, Ordering::SeqCst) >= 2 {
            WaitPolicy::GiveUp
        } else {
            WaitPolicy::Continue
        }
    });

    let started = Instant::now();
    assert!(client.get_vector("Nope", "MISSING").is_none());
    assert!(invocations.load(Ordering::SeqCst) >= 3);
    assert!(started.elapsed() >= Duration::from_millis(80));

    client.shutdown();
}

#[test]
fn switch_selection_is_exclusive_and_transmitted() {
    let (port, received) = spawn_server(&[DEF_CONNECTION]);
    let mut client = test_client(port);

    let sent = client
        .set_and_send_switch_by_label("Tele", "CONNECTION", "Disconnect")
        .expect("send switch vector");

    assert!(!sent.element("CONNECT").expect("CONNECT").is_on());
    assert!(sent.element("DISCONNECT").expect("DISCONNECT").is_on());
    // The local state is optimistically Busy pending acknowledgement.
    assert_eq!(sent.state(), LightState::Busy);

    let frame_seen = wait_for(
        || {
            let captured = received.lock().expect("capture lock");
            let text = String::from_utf8_lossy(&captured);
            text.contains("<newSwitchVector device=\"Tele\" name=\"CONNECTION\">")
                && text.contains("<oneSwitch name=\"DISCONNECT\">On</oneSwitch>")
                && text.contains("<oneSwitch name=\"CONNECT\">Off</oneSwitch>")
        },
        Duration::from_secs(2),
    );
    assert!(frame_seen, "client-originated change must reach the wire");

    client.shutdown();
}

#[test]
fn handshake_announces_get_properties() {
    let (port, received) = spawn_server(&[]);
    let client = {
        let config = ClientConfig::new("127.0.0.1", port)
            .with_read_timeout(Duration::from_millis(10));
        IndiClient::connect(config).expect("connect to mock server")
    };

    let announced = wait_for(
        || {
            let captured = received.lock().expect("capture lock");
            String::from_utf8_lossy(&captured).contains("<getProperties version='1.5'/>")
        },
        Duration::from_secs(2),
    );
    assert!(announced);

    drop(client);
}

#[test]
fn wait_until_ok_observes_settled_state() {
    let (port, _) = spawn_server(&[DEF_EQ]);
    let mut client = test_client(port);

    client
        .wait_until_ok("Tele", "EQ", Duration::from_secs(2))
        .expect("vector settles Ok");

    client.shutdown();
}

#[test]
fn wait_until_ok_times_out_on_busy_vector() {
    let busy = "<defNumberVector device=\"Tele\" name=\"EQ\" perm=\"rw\" state=\"Busy\">\
        <defNumber name=\"RA\" format=\"%10.6m\">0</defNumber></defNumberVector>";
    let (port, _) = spawn_server(&[busy]);
    let mut client = test_client(port);

    assert!(client.get_vector("Tele", "EQ").is_some());
    let result = client.wait_until_ok("Tele", "EQ", Duration::from_millis(100));
    assert!(matches!(result, Err(ClientError::WaitTimeout { .. })));

    client.shutdown();
}

#[test]
fn connection_reset_recovers_and_reannounces() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
    let port = listener.local_addr().expect("local addr").port();
    thread::spawn(move || {
        // First connection dies immediately; the client must reconnect,
        // reissue the handshake, and receive properties on the new socket.
        if let Ok((first, _)) = listener.accept() {
            drop(first);
        }
        if let Ok((mut stream, _)) = listener.accept() {
            let _ = stream.write_all(DEF_EQ.as_bytes());
            let mut buf = [0u8; 4096];
            loop {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        }
    });

    let mut client = test_client(port);
    let recovered = wait_for(
        || client.try_get_vector("Tele", "EQ").is_some(),
        Duration::from_secs(5),
    );
    assert!(recovered, "client must survive a dropped connection");

    client.shutdown();
}
