//! Connect to a local INDI server and slew the telescope simulator.
//!
//! Run an indiserver with the telescope simulator driver, then:
//!
//! ```sh
//! cargo run --example basic_usage
//! ```

use std::time::Duration;

use indi_client::{ClientConfig, IndiClient};

const DEVICE: &str = "Telescope Simulator";

fn main() -> Result<(), indi_client::ClientError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut client = IndiClient::connect(ClientConfig::new("localhost", 7624))?;

    // Make sure the device is connected.
    client.set_and_send_switch_by_label(DEVICE, "CONNECTION", "Connect")?;
    client.wait_until_ok(DEVICE, "CONNECTION", Duration::from_secs(10))?;

    // Dump everything the server announced.
    for vector in client.vectors() {
        print!("{vector}");
    }

    // Watch right ascension while the mount moves.
    client.add_element_callback(DEVICE, "EQUATORIAL_COORD", "RA", |_, ra| {
        println!("RA is now {}", ra.text());
    });

    // Request a slew and wait for the mount to settle.
    client.set_and_send_float(DEVICE, "EQUATORIAL_COORD", "RA", 2.0)?;
    client.wait_until_ok(DEVICE, "EQUATORIAL_COORD", Duration::from_secs(60))?;

    // Pump handler dispatch a few times to print the updates.
    for _ in 0..10 {
        client.process_events()?;
        std::thread::sleep(Duration::from_millis(100));
    }

    println!(
        "final RA: {}",
        client.get_text(DEVICE, "EQUATORIAL_COORD", "RA").unwrap_or_default()
    );
    client.shutdown();
    Ok(())
}
