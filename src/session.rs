//! Per-id session records and the bounded transmit queue.
//!
//! Sessions live in fixed arrays indexed by the dense SDU ids; slots are
//! allocated once at engine construction and recycled in place. A session
//! leaves `Idle` when a message becomes active and returns to `Idle` on
//! completion, failure, or timeout.

use crate::header::SHORT_HEADER_SIZE;

/// State of one transmit session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// No message active on this id.
    Idle,
    /// A frame is with the transport, waiting for its confirmation.
    /// `last` marks the final segment of the SDU.
    AwaitingConfirmation { last: bool },
    /// Confirmed a non-final segment; waiting out the separation time
    /// before the next burst.
    AwaitingSeparation,
}

/// One slot of the transmit session table.
#[derive(Debug)]
pub struct TxSession {
    pub state: TxState,
    /// Total SDU payload length (header and metadata excluded).
    pub payload_total: usize,
    /// Payload bytes already committed to the wire. Always a multiple of
    /// 16 except when equal to `payload_total`.
    pub data_index: usize,
    /// Payload length of the next segment to send.
    pub next_len: usize,
    /// Tick countdown; confirmation timeout or separation delay,
    /// depending on `state`.
    pub timer: u32,
    /// Cached short header, reused on every segment.
    pub header: [u8; SHORT_HEADER_SIZE],
    /// Cached metadata, appended to every frame.
    pub metadata: Vec<u8>,
    /// Whether this SDU spans more than one frame.
    pub segmented: bool,
}

impl TxSession {
    pub fn new(metadata_capacity: usize) -> Self {
        Self {
            state: TxState::Idle,
            payload_total: 0,
            data_index: 0,
            next_len: 0,
            timer: 0,
            header: [0; SHORT_HEADER_SIZE],
            metadata: Vec::with_capacity(metadata_capacity),
            segmented: false,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == TxState::Idle
    }

    /// Offset of the next segment in 16-byte units.
    pub fn offset_units(&self) -> u32 {
        (self.data_index / crate::header::SEGMENT_UNIT) as u32
    }

    /// Payload bytes not yet committed to the wire.
    pub fn remaining(&self) -> usize {
        self.payload_total - self.data_index
    }

    /// Return the slot to `Idle`, keeping its allocations.
    pub fn reset(&mut self) {
        self.state = TxState::Idle;
        self.payload_total = 0;
        self.data_index = 0;
        self.next_len = 0;
        self.timer = 0;
        self.metadata.clear();
        self.segmented = false;
    }
}

/// State of one receive session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxState {
    /// No reassembly in progress on this id.
    Idle,
    /// First segment accepted; waiting for the rest of the stream.
    AwaitingNextSegment,
}

/// One slot of the receive session table.
#[derive(Debug)]
pub struct RxSession {
    pub state: RxState,
    /// Payload bytes reassembled so far.
    pub assembled: usize,
    /// Remaining buffer most recently reported by the consumer.
    pub available: usize,
    /// Inactivity tick countdown.
    pub timer: u32,
    /// Reference short header captured from the first segment.
    pub header: [u8; SHORT_HEADER_SIZE],
    /// Reference metadata captured from the first segment.
    pub metadata: Vec<u8>,
}

impl RxSession {
    pub fn new(metadata_capacity: usize) -> Self {
        Self {
            state: RxState::Idle,
            assembled: 0,
            available: 0,
            timer: 0,
            header: [0; SHORT_HEADER_SIZE],
            metadata: Vec::with_capacity(metadata_capacity),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == RxState::Idle
    }

    /// Return the slot to `Idle`, keeping its allocations.
    pub fn reset(&mut self) {
        self.state = RxState::Idle;
        self.assembled = 0;
        self.available = 0;
        self.timer = 0;
        self.metadata.clear();
    }
}

/// Ordered list of outbound ids currently being segmented.
///
/// Capacity equals the number of configured outbound ids and membership
/// is exactly the set of non-idle transmit sessions, so the queue can
/// never overflow.
#[derive(Debug)]
pub struct TransmitQueue {
    ids: Vec<u16>,
}

impl TransmitQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            ids: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn contains(&self, id: u16) -> bool {
        self.ids.contains(&id)
    }

    pub fn get(&self, pos: usize) -> Option<u16> {
        self.ids.get(pos).copied()
    }

    /// Append an id. The capacity invariant makes this infallible.
    pub fn push(&mut self, id: u16) {
        debug_assert!(self.ids.len() < self.ids.capacity());
        debug_assert!(!self.contains(id));
        self.ids.push(id);
    }

    /// Remove an id, preserving the order of the rest.
    pub fn remove(&mut self, id: u16) {
        if let Some(pos) = self.ids.iter().position(|&q| q == id) {
            self.ids.remove(pos);
        }
    }
}
