// MIT License - Copyright (c) 2021 TJForc
// Event listener task

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::RwLock;
use tracing::{debug, error, info, trace, warn};

use crate::codec::Frame;
use crate::constants::{inbound, outbound};
use crate::dispatcher::CommandDispatcher;
use crate::error::SystemErrorCode;
use crate::event::{decode, parse_panel_time, EventSender, PanelEvent};
use crate::protocol::Command;
use crate::session::ConnectionState;
use crate::transport::{FrameReader, Incoming};

/// Everything the listener task owns or shares with the session.
pub struct Listener {
    pub reader: FrameReader,
    pub dispatcher: Arc<CommandDispatcher>,
    pub state: Arc<RwLock<ConnectionState>>,
    pub event_tx: EventSender,
    pub access_code: Option<String>,
}

/// Tracks events that could not be delivered so each backlog is logged
/// once rather than per event.
#[derive(Debug, Default)]
struct Delivery {
    dropped: u64,
    receiver_gone: bool,
}

/// What the loop does after handling a frame.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Spawn the task that reads frames until the connection ends or the
/// device acknowledges a stop request.
pub fn spawn_listener(listener: Listener) -> tokio::task::JoinHandle<()> {
    tokio::spawn(listener.run())
}

impl Listener {
    async fn run(mut self) {
        debug!("Listener started");
        let mut delivery = Delivery::default();

        loop {
            match self.reader.receive_frame().await {
                Ok(Incoming::Frame(frame)) => {
                    if self.process_frame(frame, &mut delivery).await == Flow::Stop {
                        info!("Listener stopped on request");
                        break;
                    }
                }
                Ok(Incoming::Timeout) => {
                    warn!(
                        "No data from EnvisaLink within {:?}",
                        self.reader.timeout()
                    );
                }
                Ok(Incoming::Closed) => {
                    error!("EnvisaLink closed the connection. Listener terminated.");
                    break;
                }
                Err(e) => {
                    error!("Read failed: {}. Listener terminated.", e);
                    break;
                }
            }
        }

        *self.state.write().await = ConnectionState::Disconnected;
    }

    async fn process_frame(&self, frame: Frame, delivery: &mut Delivery) -> Flow {
        if !frame.checksum_matches() {
            warn!(
                "Checksum mismatch on {} (received {})",
                frame.code, frame.checksum
            );
        }

        match frame.code.as_str() {
            inbound::TIME_BROADCAST => match parse_panel_time(&frame.data) {
                Ok(time) => trace!("Time broadcast, panel clock {}", time),
                Err(e) => debug!("{}", e),
            },
            inbound::CHECKSUM_ERROR => {
                warn!(
                    "({}) Bad checksum error returned. Last command: {}",
                    frame.code,
                    self.last_sent().await
                );
            }
            inbound::SYSTEM_ERROR => match SystemErrorCode::from_code(&frame.data) {
                Some(code) => warn!("({}) EnvisaLink returned system error {}", frame.code, code),
                None => warn!(
                    "({}) EnvisaLink returned unknown system error code {}",
                    frame.code, frame.data
                ),
            },
            inbound::ACK => return self.process_ack(&frame).await,
            inbound::CODE_REQUIRED => {
                debug!("Code required for partition {}", frame.data);
                self.send_access_code().await;
            }
            inbound::COMMAND_OUTPUT_PRESSED => {
                self.forward(&frame, delivery);
                self.send_access_code().await;
            }
            _ => self.forward(&frame, delivery),
        }

        Flow::Continue
    }

    async fn process_ack(&self, frame: &Frame) -> Flow {
        if frame.data == outbound::TIME_BROADCAST_CONTROL && self.dispatcher.stop_requested().await {
            debug!("Time broadcasts disabled, stopping listener");
            return Flow::Stop;
        }

        let last = self.dispatcher.last_sent().await;
        if last.as_deref() != Some(frame.data.as_str()) {
            warn!(
                "({}) Command acknowledged out of sequence. Last command: {}, last acknowledged: {}",
                frame.code,
                last.as_deref().unwrap_or("none"),
                frame.data
            );
        }
        Flow::Continue
    }

    /// Hand an event to the receiver without waiting. A full channel drops
    /// the event so the read loop keeps draining the socket.
    fn forward(&self, frame: &Frame, delivery: &mut Delivery) {
        let event = match decode(&frame.code, &frame.data) {
            Ok(event) => event,
            Err(e) => {
                warn!("{}", e);
                PanelEvent::Unrecognized {
                    code: frame.code.clone(),
                    data: frame.data.clone(),
                }
            }
        };

        if let PanelEvent::Unrecognized { code, data } = &event {
            debug!("Unhandled command from EnvisaLink. Code: {}, data: {}", code, data);
        }

        match self.event_tx.try_send(event) {
            Ok(()) => {
                if delivery.dropped > 0 {
                    warn!(
                        "Event receiver caught up, {} events were dropped",
                        delivery.dropped
                    );
                    delivery.dropped = 0;
                }
            }
            Err(TrySendError::Full(_)) => {
                if delivery.dropped == 0 {
                    warn!("Event channel full, dropping events until the receiver catches up");
                }
                delivery.dropped += 1;
            }
            Err(TrySendError::Closed(_)) => {
                if !delivery.receiver_gone {
                    warn!("Event receiver dropped, events are being discarded");
                    delivery.receiver_gone = true;
                }
            }
        }
    }

    async fn send_access_code(&self) {
        let Some(code) = &self.access_code else {
            warn!("Panel requested a user code but none is configured");
            return;
        };
        let command = Command::SendCode { code: code.clone() };
        if let Err(e) = self.dispatcher.send(&command).await {
            warn!("Unable to send user code: {}", e);
        }
    }

    async fn last_sent(&self) -> String {
        self.dispatcher
            .last_sent()
            .await
            .unwrap_or_else(|| "none".to_string())
    }
}
