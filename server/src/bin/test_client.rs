use shared::{DEFAULT_PORT, MESSAGE_TERMINATOR};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

/// Manual smoke client: connects, walks a small square, and prints every
/// server message as it arrives.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let address = std::env::args()
        .nth(1)
        .unwrap_or_else(|| format!("127.0.0.1:{}", DEFAULT_PORT));

    println!("Connecting to {}", address);
    let mut stream = TcpStream::connect(&address)?;
    println!("Connected from {}", stream.local_addr()?);

    // Print incoming messages in the background
    let reader = stream.try_clone()?;
    thread::spawn(move || print_server_messages(reader));

    let waypoints = [(3, 0), (3, 3), (0, 3), (0, 0)];
    for (x, y) in waypoints {
        let command = format!("MOVE {} {}#", x, y);
        println!("Sending: {}", command);
        stream.write_all(command.as_bytes())?;
        // Each leg is at most ~4 grid units, so this outlasts the walk
        thread::sleep(Duration::from_secs(5));
    }

    println!("Test client finished");
    Ok(())
}

fn print_server_messages(mut stream: TcpStream) {
    let mut pending = Vec::new();
    let mut buf = [0u8; 512];

    loop {
        match stream.read(&mut buf) {
            Ok(0) => {
                println!("Server closed the connection");
                return;
            }
            Ok(n) => {
                pending.extend_from_slice(&buf[..n]);
                while let Some(index) = pending.iter().position(|&b| b == MESSAGE_TERMINATOR) {
                    let message: Vec<u8> = pending.drain(..=index).take(index).collect();
                    println!("Server message:\n{}", String::from_utf8_lossy(&message));
                }
            }
            Err(e) => {
                println!("Read error: {}", e);
                return;
            }
        }
    }
}
