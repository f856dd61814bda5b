//! Example: Connect to an EnvisaLink and print panel events.

use envisalink_tpi::{Device, PanelState, Session, TpiConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = TpiConfig::builder()
        .host("192.168.0.100")
        .port(4025)
        .password("user")
        .access_code("1234")
        .build();

    println!("Connecting to EnvisaLink...");
    let (mut session, mut events) = Session::connect(config).await?;
    let mut panel = PanelState::new(1, 8, 0);

    session.status_report().await?;
    session.dump_bypassed_zones(1).await?;

    println!("Press Ctrl+C to disconnect...");
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    println!("Event: {:?}", event);
                    panel.apply(&event);
                }
                None => {
                    println!("Connection lost");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    println!("\n--- Partitions ---");
    for part in panel.partitions() {
        println!("  {}: {}", part.name(), part.describe());
    }

    println!("\n--- Zones ---");
    for zone in panel.zones() {
        println!("  Zone {:2}: {}", zone.id, zone.describe());
    }

    if session.is_listening() {
        session.shutdown().await?;
    } else {
        session.close().await;
    }
    println!("Disconnected.");

    Ok(())
}
