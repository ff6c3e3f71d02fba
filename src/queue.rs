//! Bounded FIFO between the I/O thread and the dispatch thread.
//!
//! The producer blocks when the queue is full instead of dropping packets.
//! [`InboundQueue::shutdown`] wakes both sides and discards whatever is
//! still queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::{bounded, select, Receiver, Sender};
use log::debug;

use crate::errors::{DriverError, Result};
use crate::packet::Packet;

/// Default number of packets buffered before the reader stalls.
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct InboundQueue {
    tx: Sender<Packet>,
    rx: Receiver<Packet>,
    // Dropping the sender disconnects `stop_rx`, which wakes every select.
    stop_tx: Arc<Mutex<Option<Sender<()>>>>,
    stop_rx: Receiver<()>,
    closed: Arc<AtomicBool>,
}

impl InboundQueue {
    pub fn bounded(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        let (stop_tx, stop_rx) = bounded(0);
        Self {
            tx,
            rx,
            stop_tx: Arc::new(Mutex::new(Some(stop_tx))),
            stop_rx,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Enqueue a packet, blocking while the queue is full.
    ///
    /// Fails with [`DriverError::QueueClosed`] once the queue is shut down.
    pub fn push(&self, packet: Packet) -> Result<()> {
        if self.is_closed() {
            return Err(DriverError::QueueClosed);
        }
        select! {
            send(self.tx, packet) -> res => res.map_err(|_| DriverError::QueueClosed),
            recv(self.stop_rx) -> _ => Err(DriverError::QueueClosed),
        }
    }

    /// Dequeue the oldest packet, blocking while the queue is empty.
    ///
    /// Returns `None` once the queue is shut down.
    pub fn pop(&self) -> Option<Packet> {
        if self.is_closed() {
            return None;
        }
        select! {
            recv(self.rx) -> packet => {
                // Both arms may be ready at once; shutdown wins.
                if self.is_closed() { None } else { packet.ok() }
            }
            recv(self.stop_rx) -> _ => None,
        }
    }

    /// Wake blocked producers/consumers and discard queued packets.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Ok(mut stop) = self.stop_tx.lock() {
            stop.take();
        }
        let discarded = self.rx.try_iter().count();
        if discarded > 0 {
            debug!("discarded {} queued packets on shutdown", discarded);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
