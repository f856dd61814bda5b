// MIT License - Copyright (c) 2021 TJForc
// EnvisaLink TPI client
//
//! # envisalink-tpi
//!
//! Client for the EnvisaLink TPI (third-party interface), the line-oriented
//! TCP protocol EnvisaLink 3/4 modules expose for DSC security panels.
//!
//! The library logs in, keeps the link alive with the device's time
//! broadcasts, serializes outbound commands, and decodes the asynchronous
//! event stream into [`PanelEvent`]s delivered over a channel.
//! [`PanelState`] is an optional in-memory model driven by those events.
//!
//! ## Quick Start
//!
//! ```no_run
//! use envisalink_tpi::{PanelState, Session, TpiConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = TpiConfig::builder()
//!         .host("192.168.0.100")
//!         .password("user")
//!         .access_code("1234")
//!         .build();
//!
//!     let (mut session, mut events) = Session::connect(config).await?;
//!     let mut panel = PanelState::new(1, 8, 0);
//!
//!     session.status_report().await?;
//!     session.dump_bypassed_zones(1).await?;
//!
//!     tokio::select! {
//!         _ = async {
//!             while let Some(event) = events.recv().await {
//!                 panel.apply(&event);
//!             }
//!         } => {}
//!         _ = tokio::signal::ctrl_c() => {}
//!     }
//!
//!     session.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod constants;
pub mod devices;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod listener;
pub mod panel;
pub mod protocol;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use config::{TpiConfig, TpiConfigBuilder};
pub use error::{LoginError, LoginStep, Result, SystemErrorCode, TpiError};
pub use event::{
    BypassMap, EventReceiver, LedFlags, PanelEvent, PartitionEvent, TemperatureSource,
    TroubleFlags, ZoneEvent, ZoneTimers,
};
pub use panel::PanelState;
pub use protocol::{ArmingMode, Command, PanicKind};
pub use session::{ConnectionState, Session};
pub use devices::{CommandOutput, Device, DeviceKind, Partition, PartitionState, Zone, ZoneState};
