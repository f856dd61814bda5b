//! Example: Arm and disarm a partition.

use envisalink_tpi::{PanelEvent, PartitionEvent, Session, TpiConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = TpiConfig::builder()
        .host("192.168.0.100")
        .password("user")
        .build();

    let (mut session, mut events) = Session::connect(config).await?;

    // Print partition events as they arrive
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let PanelEvent::Partition { partition, event } = event {
                match event {
                    PartitionEvent::Armed(mode) => {
                        println!("Partition {} armed ({:?})", partition, mode)
                    }
                    PartitionEvent::Disarmed => println!("Partition {} disarmed", partition),
                    other => println!("Partition {}: {:?}", partition, other),
                }
            }
        }
    });

    println!("\nArming partition 1 in stay mode...");
    if let Err(e) = session.arm_stay(1).await {
        println!("Error arming partition 1: {}", e);
    }

    // Wait a bit then disarm
    tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;

    println!("\nDisarming partition 1...");
    if let Err(e) = session.disarm(1, "1234").await {
        println!("Error disarming partition 1: {}", e);
    }

    tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;
    session.shutdown().await?;
    drop(session);
    printer.await?;
    Ok(())
}
