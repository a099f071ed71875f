//! Cross-ledger message transport.
//!
//! The staking contracts only ever talk to the transport through
//! [`MessageTransport`]. [`Messaging`] is the in-memory postman used by the
//! devnet and the tests: FIFO per direction, nonces per direction, and
//! caller-driven consumption. Nothing expires.

use alloy_primitives::{keccak256, Address, B256, U256};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    L1ToL2,
    L2ToL1,
}

impl Direction {
    fn tag(self) -> u8 {
        match self {
            Direction::L1ToL2 => 0,
            Direction::L2ToL1 => 1,
        }
    }
}

/// A message as it travels between the ledgers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub direction: Direction,
    /// Contract that sent the message.
    pub from: Address,
    /// Contract the message is addressed to.
    pub to: Address,
    /// Entry point (L1 → L2) or discriminator (L2 → L1).
    pub selector: U256,
    pub payload: Vec<U256>,
    pub nonce: u64,
}

impl Envelope {
    /// Content address of the message: every field takes part, so two sends
    /// of the same payload are distinct messages.
    pub fn hash(&self) -> B256 {
        let mut data = Vec::with_capacity(1 + 20 + 20 + 32 + 8 + 8 + 32 * self.payload.len());
        data.push(self.direction.tag());
        data.extend_from_slice(self.from.as_slice());
        data.extend_from_slice(self.to.as_slice());
        data.extend_from_slice(&self.selector.to_be_bytes::<32>());
        data.extend_from_slice(&self.nonce.to_be_bytes());
        data.extend_from_slice(&(self.payload.len() as u64).to_be_bytes());
        for felt in &self.payload {
            data.extend_from_slice(&felt.to_be_bytes::<32>());
        }
        keccak256(&data)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagingError {
    #[error("message {0} was already consumed or is not pending")]
    MessageReplayOrNotFound(B256),
}

/// The two primitives the bridge core relies on.
pub trait MessageTransport {
    /// Enqueues a message and returns its hash and nonce.
    fn send_message(
        &mut self,
        direction: Direction,
        from: Address,
        to: Address,
        selector: U256,
        payload: Vec<U256>,
    ) -> (B256, u64);

    /// Consumes a pending message. Fails if it was never sent, is not yet
    /// consumable, or was already consumed.
    fn consume_message(&mut self, envelope: &Envelope) -> Result<B256, MessagingError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Messaging {
    // Sent on L1, consumable on L2.
    l1_to_l2: IndexMap<B256, Envelope>,
    // Sent on L2, not yet posted to L1.
    l2_outbox: IndexMap<B256, Envelope>,
    // Posted to L1, consumable there.
    l2_to_l1: IndexMap<B256, Envelope>,
    l1_to_l2_nonce: u64,
    l2_to_l1_nonce: u64,
}

impl Messaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// L1 → L2 messages waiting for delivery, oldest first.
    pub fn pending_l1_to_l2(&self) -> Vec<Envelope> {
        self.l1_to_l2.values().cloned().collect()
    }

    /// L2 → L1 messages that can be consumed on L1, oldest first.
    pub fn pending_l2_to_l1(&self) -> Vec<Envelope> {
        self.l2_to_l1.values().cloned().collect()
    }

    /// L2 → L1 messages that have not reached L1 yet.
    pub fn outbox(&self) -> Vec<Envelope> {
        self.l2_outbox.values().cloned().collect()
    }

    pub fn find(&self, hash: &B256) -> Option<&Envelope> {
        self.l1_to_l2
            .get(hash)
            .or_else(|| self.l2_to_l1.get(hash))
            .or_else(|| self.l2_outbox.get(hash))
    }

    pub fn is_consumable(&self, envelope: &Envelope) -> bool {
        let hash = envelope.hash();
        match envelope.direction {
            Direction::L1ToL2 => self.l1_to_l2.contains_key(&hash),
            Direction::L2ToL1 => self.l2_to_l1.contains_key(&hash),
        }
    }

    /// Posts every outbox message to L1, preserving order. Returns the
    /// hashes that became consumable.
    pub fn flush_l2_to_l1(&mut self) -> Vec<B256> {
        let posted: Vec<B256> = self.l2_outbox.keys().copied().collect();
        for (hash, envelope) in self.l2_outbox.drain(..) {
            self.l2_to_l1.insert(hash, envelope);
        }
        if !posted.is_empty() {
            log::info!("Posted {} L2 -> L1 messages", posted.len());
        }
        posted
    }
}

impl MessageTransport for Messaging {
    fn send_message(
        &mut self,
        direction: Direction,
        from: Address,
        to: Address,
        selector: U256,
        payload: Vec<U256>,
    ) -> (B256, u64) {
        let nonce = match direction {
            Direction::L1ToL2 => &mut self.l1_to_l2_nonce,
            Direction::L2ToL1 => &mut self.l2_to_l1_nonce,
        };
        let envelope = Envelope {
            direction,
            from,
            to,
            selector,
            payload,
            nonce: *nonce,
        };
        *nonce += 1;

        let hash = envelope.hash();
        log::debug!("Enqueued {:?} message {} (nonce {})", direction, hash, envelope.nonce);
        let nonce = envelope.nonce;
        match direction {
            Direction::L1ToL2 => self.l1_to_l2.insert(hash, envelope),
            Direction::L2ToL1 => self.l2_outbox.insert(hash, envelope),
        };
        (hash, nonce)
    }

    fn consume_message(&mut self, envelope: &Envelope) -> Result<B256, MessagingError> {
        let hash = envelope.hash();
        let queue = match envelope.direction {
            Direction::L1ToL2 => &mut self.l1_to_l2,
            Direction::L2ToL1 => &mut self.l2_to_l1,
        };
        queue
            .shift_remove(&hash)
            .ok_or(MessagingError::MessageReplayOrNotFound(hash))?;
        log::debug!("Consumed {:?} message {}", envelope.direction, hash);
        Ok(hash)
    }
}
