//! Simple network publisher test
//!
//! Publishes a counter once a second, for checking connectivity between the
//! workspace executables without running the full stack.

use comms_if::net::{MonitoredSocket, SocketOptions};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Create zmq context
    let ctx = zmq::Context::new();

    // Create socket options
    let socket_options = SocketOptions {
        bind: true,
        block_on_first_connect: false,
        ..Default::default()
    };

    // Create the socket
    let socket = MonitoredSocket::new(&ctx, zmq::PUB, socket_options, "tcp://*:5001")?;

    println!("Publisher server open on port 5001");

    // Send data to subscribers
    let mut counter = 0u64;
    loop {
        // The first part here, separated by a space, is the topic.
        // Subscribers can filter data by this topic using the
        // `.set_subscribe()` function.
        let counter_str = format!("counter {}", counter);

        match socket.send(&counter_str, 0) {
            Ok(_) => (),
            Err(e) => println!("Failed to send counter: {}", e),
        }

        // Also send a message on another topic, to demonstrate subscription
        // filtering
        socket.send("noise", 0).ok();

        counter += 1;
        std::thread::sleep(std::time::Duration::from_millis(1000));
    }
}
