//! One-way message channel between peers of a session.
//!
//! Messages cross the link in their encoded form so that everything the
//! peers exchange goes through the same framing a network transport uses.

use std::collections::VecDeque;

use questline_core::{codec, EntityId, Message};

/// Bytes and messages that crossed a link.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Traffic {
    /// Messages sent.
    pub messages: u64,
    /// Encoded bytes sent.
    pub bytes: u64,
}

#[derive(Debug)]
struct Frame {
    peer: EntityId,
    bytes: Vec<u8>,
}

#[derive(Debug, Default)]
pub(crate) struct Link {
    frames: VecDeque<Frame>,
    traffic: Traffic,
}

impl Link {
    /// Queues `message`. `peer` is the sender on host-bound links and the
    /// recipient on client-bound ones.
    pub(crate) fn send(&mut self, peer: EntityId, message: &Message) {
        match codec::encode(message) {
            Ok(bytes) => {
                self.traffic.messages += 1;
                self.traffic.bytes += bytes.len() as u64;
                self.frames.push_back(Frame { peer, bytes });
            }
            Err(error) => log::error!("dropping message for peer {}: {error}", peer.get()),
        }
    }

    /// Decodes every queued frame in sending order.
    pub(crate) fn receive(&mut self) -> Vec<(EntityId, Message)> {
        self.frames
            .drain(..)
            .filter_map(|frame| match codec::decode(&frame.bytes) {
                Ok(message) => Some((frame.peer, message)),
                Err(error) => {
                    log::warn!("dropping corrupt frame of peer {}: {error}", frame.peer.get());
                    None
                }
            })
            .collect()
    }

    pub(crate) fn traffic(&self) -> Traffic {
        self.traffic
    }
}
