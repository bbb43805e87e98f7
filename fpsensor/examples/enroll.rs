//! Enrollment example

use fpsensor::{Checkpoints, Sensor};

/// Console prompts
struct Console;

impl Checkpoints for Console {
    fn waiting_for_finger(&mut self) {
        println!("Place your finger on the sensor...");
    }

    fn remove_finger(&mut self) {
        println!("Remove finger");
    }

    fn place_same_finger(&mut self) {
        println!("Place the same finger again...");
    }

    fn error(&mut self, message: &str) {
        eprintln!("Enrollment failed: {}", message);
    }

    fn enrolled(&mut self, id: u16) {
        println!("Stored as #{}", id);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let host = std::env::var("SENSOR_ADDR").unwrap_or_else(|_| "192.168.1.50".to_string());
    let id: u16 = std::env::args().nth(1).unwrap_or_else(|| "1".to_string()).parse()?;

    let sensor = Sensor::tcp(host, 2000);
    sensor.connect().await?;

    println!("Templates stored: {}", sensor.template_count().await?);
    sensor.enroll(id, &mut Console).await?;

    sensor.disconnect().await?;

    Ok(())
}
