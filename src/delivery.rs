//! Delivery channel
//!
//! Broadcasts are formatted by the sender and pushed into one shared conduit.
//! A single `Broadcaster` task drains it and fans each line out through the
//! registry, so every session sees broadcasts in the same order. Direct
//! messages skip the conduit and go straight to the target's queue.

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::ChatError;
use crate::message::ServerMessage;
use crate::registry::Registry;

/// Default capacity of the broadcast conduit
pub const DELIVERY_CAPACITY: usize = 256;

/// Create a connected delivery channel and its broadcaster
pub fn channel(registry: Registry, capacity: usize) -> (DeliveryChannel, Broadcaster) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let delivery = DeliveryChannel {
        sender,
        registry: registry.clone(),
    };
    let broadcaster = Broadcaster { registry, receiver };
    (delivery, broadcaster)
}

/// Producer side of the delivery channel, cloned into every session
#[derive(Debug, Clone)]
pub struct DeliveryChannel {
    sender: mpsc::Sender<String>,
    registry: Registry,
}

impl DeliveryChannel {
    /// Queue `[addr]identity: text` for every online session
    pub async fn broadcast(&self, identity: &str, addr: &str, text: &str) -> Result<(), ChatError> {
        let line = ServerMessage::chat(addr, identity, text).to_string();
        self.sender
            .send(line)
            .await
            .map_err(|_| ChatError::ChannelSend)
    }

    /// Send `<from> said to you: <text>` to one identity only
    pub async fn direct_message(&self, from: &str, target: &str, text: &str) -> Result<(), ChatError> {
        let line = ServerMessage::Direct {
            from: from.to_string(),
            content: text.to_string(),
        }
        .to_string();
        self.registry.deliver_to(target, line).await
    }
}

/// The fan-out actor
///
/// Owns the receiving end of the conduit.
pub struct Broadcaster {
    registry: Registry,
    receiver: mpsc::Receiver<String>,
}

impl Broadcaster {
    /// Run the fan-out loop until every `DeliveryChannel` is dropped
    pub async fn run(mut self) {
        info!("Broadcaster started");

        while let Some(line) = self.receiver.recv().await {
            if self.registry.is_empty().await {
                debug!("Nobody online, dropping: {}", line);
                continue;
            }
            let delivered = self.registry.fan_out(&line).await;
            debug!("Fanned out to {} sessions: {}", delivered, line);
        }

        info!("Broadcaster shutting down");
    }
}
