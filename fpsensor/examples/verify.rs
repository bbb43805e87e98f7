//! Continuous verification example

use std::time::Duration;

use fpsensor::{stop_signal, Checkpoints, SearchMatch, Sensor, SensorConfig};
use tokio::time::sleep;

struct Console;

impl Checkpoints for Console {
    fn waiting_for_finger(&mut self) {}

    fn error(&mut self, message: &str) {
        println!("No match: {}", message);
    }

    fn matched(&mut self, found: SearchMatch) {
        println!("Finger #{} (confidence {})", found.id, found.confidence);
    }
}

#[tokio::main]
async fn main() -> fpsensor::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let host = std::env::var("SENSOR_ADDR").unwrap_or_else(|_| "192.168.1.50".to_string());

    let config = SensorConfig::default().with_poll_interval(Duration::from_millis(100));
    let sensor = Sensor::with_config(fpsensor::TcpTransport::new(host, 2000), config);
    sensor.connect().await?;

    // Scan for one minute
    let (handle, token) = stop_signal();
    tokio::spawn(async move {
        sleep(Duration::from_secs(60)).await;
        handle.stop();
    });

    sensor.verify_continuous(&mut Console, token).await?;

    sensor.disconnect().await?;

    Ok(())
}
