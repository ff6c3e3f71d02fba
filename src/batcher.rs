//! Per-channel sample batching.
//!
//! Samples arrive one device tick at a time, which is far too fine-grained
//! for consumers such as chart widgets. Each channel accumulates values and
//! hands a full batch to its listener, then starts over.

use std::sync::{Arc, Weak};

use log::{debug, trace};

/// Number of values delivered per flush.
pub const BATCH_SIZE: usize = 15;

/// Receives flushed sample batches for one channel.
///
/// Called on the dispatch thread; a slow listener delays further dispatch
/// but never the serial reader.
pub trait ChannelListener: Send + Sync {
    fn on_batch(&self, channel: u8, batch: &[i32]);
}

impl<F> ChannelListener for F
where
    F: Fn(u8, &[i32]) + Send + Sync,
{
    fn on_batch(&self, channel: u8, batch: &[i32]) {
        self(channel, batch)
    }
}

/// Non-owning listener registration.
pub type ListenerRef = Weak<dyn ChannelListener>;

/// Downgrade a listener handle into a registration.
pub fn listener_ref<L: ChannelListener + 'static>(listener: &Arc<L>) -> ListenerRef {
    let weak: Weak<L> = Arc::downgrade(listener);
    weak
}

/// Pending values of one channel plus its registered listener.
#[derive(Default)]
pub struct ChannelBuffer {
    pending: Vec<i32>,
    listener: Option<ListenerRef>,
}

impl ChannelBuffer {
    pub fn pending(&self) -> &[i32] {
        &self.pending
    }

    pub fn has_listener(&self) -> bool {
        self.listener
            .as_ref()
            .is_some_and(|l| l.strong_count() > 0)
    }
}

/// Channel buffers for the currently identified device.
pub struct SampleBatcher {
    channels: Vec<ChannelBuffer>,
    batch_size: usize,
    flushed: u64,
}

impl SampleBatcher {
    pub fn new(channel_count: u8, batch_size: usize) -> Self {
        let mut batcher = Self {
            channels: Vec::new(),
            batch_size: batch_size.max(1),
            flushed: 0,
        };
        batcher.reset(channel_count);
        batcher
    }

    /// Replace every buffer with an empty one and forget all listeners.
    pub fn reset(&mut self, channel_count: u8) {
        self.channels = (0..channel_count).map(|_| ChannelBuffer::default()).collect();
        debug!("channel buffers reset: {} channels", channel_count);
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Total number of batches flushed (with or without a listener).
    pub fn flushed(&self) -> u64 {
        self.flushed
    }

    pub fn channel(&self, channel: u8) -> Option<&ChannelBuffer> {
        self.channels.get(channel as usize)
    }

    /// Register (or with `None`, remove) the listener for a channel.
    ///
    /// Takes effect at the next flush. Returns `false` if the channel does not exist.
    pub fn set_listener(&mut self, channel: u8, listener: Option<ListenerRef>) -> bool {
        match self.channels.get_mut(channel as usize) {
            Some(buffer) => {
                buffer.listener = listener;
                true
            }
            None => false,
        }
    }

    /// Append a value; flushes the channel once it holds a full batch.
    ///
    /// Returns `true` if this append triggered a flush. Unknown channels are ignored.
    pub fn append(&mut self, channel: u8, value: i32) -> bool {
        let batch_size = self.batch_size;
        let Some(buffer) = self.channels.get_mut(channel as usize) else {
            trace!("sample for unknown channel {} ignored", channel);
            return false;
        };

        buffer.pending.push(value);
        if buffer.pending.len() < batch_size {
            return false;
        }

        // The listener gets the detached batch; the channel starts over empty.
        let batch = std::mem::replace(&mut buffer.pending, Vec::with_capacity(batch_size));
        self.flushed += 1;

        let listener = buffer.listener.as_ref().map(|l| l.upgrade());
        match listener {
            Some(Some(listener)) => listener.on_batch(channel, &batch),
            Some(None) => {
                debug!("listener for channel {} was dropped; unregistering", channel);
                buffer.listener = None;
            }
            None => {}
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        batches: Mutex<Vec<(u8, Vec<i32>)>>,
    }

    impl ChannelListener for Recorder {
        fn on_batch(&self, channel: u8, batch: &[i32]) {
            self.batches.lock().unwrap().push((channel, batch.to_vec()));
        }
    }

    #[test]
    fn flushes_exactly_one_batch_of_fifteen() {
        let recorder = Arc::new(Recorder::default());
        let mut batcher = SampleBatcher::new(1, BATCH_SIZE);
        batcher.set_listener(0, Some(listener_ref(&recorder)));

        for v in 1..=20 {
            batcher.append(0, v);
        }

        let batches = recorder.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0], (0, (1..=15).collect::<Vec<_>>()));
        assert_eq!(batcher.channel(0).unwrap().pending(), &[16, 17, 18, 19, 20]);
    }

    #[test]
    fn clears_without_listener() {
        let mut batcher = SampleBatcher::new(2, BATCH_SIZE);
        for v in 0..31 {
            batcher.append(1, v);
        }
        assert_eq!(batcher.channel(1).unwrap().pending(), &[30]);
        assert_eq!(batcher.flushed(), 2);
    }

    #[test]
    fn late_registration_is_not_retroactive() {
        let recorder = Arc::new(Recorder::default());
        let mut batcher = SampleBatcher::new(1, 3);
        assert_eq!(batcher.batch_size(), 3);
        for v in 0..4 {
            batcher.append(0, v);
        }
        batcher.set_listener(0, Some(listener_ref(&recorder)));
        batcher.append(0, 4);
        batcher.append(0, 5);

        let batches = recorder.batches.lock().unwrap();
        assert_eq!(batches.as_slice(), &[(0, vec![3, 4, 5])]);
    }

    #[test]
    fn dropped_listener_is_unregistered() {
        let recorder = Arc::new(Recorder::default());
        let mut batcher = SampleBatcher::new(1, 2);
        batcher.set_listener(0, Some(listener_ref(&recorder)));
        assert!(batcher.channel(0).unwrap().has_listener());

        drop(recorder);
        batcher.append(0, 1);
        assert!(batcher.append(0, 2));
        assert!(!batcher.channel(0).unwrap().has_listener());
    }

    #[test]
    fn closure_listener() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            Arc::new(move |ch: u8, batch: &[i32]| seen.lock().unwrap().push((ch, batch.len())))
        };
        let mut batcher = SampleBatcher::new(3, 2);
        batcher.set_listener(2, Some(listener_ref(&sink)));
        batcher.append(2, 10);
        batcher.append(2, 11);
        assert_eq!(seen.lock().unwrap().as_slice(), &[(2, 2)]);
    }

    #[test]
    fn reset_drops_values_and_listeners() {
        let recorder = Arc::new(Recorder::default());
        let mut batcher = SampleBatcher::new(2, BATCH_SIZE);
        batcher.set_listener(0, Some(listener_ref(&recorder)));
        batcher.append(0, 1);

        batcher.reset(4);
        assert_eq!(batcher.channel_count(), 4);
        assert!(batcher.channel(0).unwrap().pending().is_empty());
        assert!(!batcher.channel(0).unwrap().has_listener());
        assert!(!batcher.set_listener(4, None));
    }
}
