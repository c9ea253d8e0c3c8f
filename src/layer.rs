//! Collaborator contracts: upper producer/consumer and lower frame transport.
//!
//! The engine performs no I/O of its own. The upper layer feeds and drains
//! SDU payload bytes through [`SegmentProducer`] and [`SegmentConsumer`];
//! the lower layer carries finished frames through [`FrameTransport`] and
//! calls back into the engine for confirmations and inbound frames. All
//! calls are synchronous and must not block.

use std::fmt;

/// Identifier of one outbound SDU; a dense index into the transmit
/// session table, fixed at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TxSduId(pub u16);

/// Identifier of one inbound SDU; a dense index into the receive
/// session table, fixed at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RxSduId(pub u16);

impl fmt::Display for TxSduId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx:{}", self.0)
    }
}

impl fmt::Display for RxSduId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rx:{}", self.0)
    }
}

impl TxSduId {
    pub(crate) fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl RxSduId {
    pub(crate) fn index(self) -> usize {
        usize::from(self.0)
    }
}

/// Upper-layer source of outbound SDU bytes.
///
/// The producer streams one SDU per transmit session: the short header
/// first (pulled once, on the first segment), then payload bytes in
/// segment-sized slices.
pub trait SegmentProducer {
    /// Fill `buf` completely with the next bytes of the SDU for `id`.
    ///
    /// Returns `Some(available)` on success, where `available` is the
    /// number of SDU bytes remaining after this pull; `None` rejects the
    /// pull and aborts the session.
    fn pull_segment_data(&mut self, id: TxSduId, buf: &mut [u8]) -> Option<usize>;

    /// Final outcome of a transmit session that was established.
    fn transmit_complete(&mut self, id: TxSduId, ok: bool);
}

/// Upper-layer sink for inbound SDU bytes.
pub trait SegmentConsumer {
    /// Announce an incoming SDU. `total_len` is known for unsegmented
    /// frames and `None` while segments are still arriving.
    ///
    /// Returns `Some(buffer)` with the available buffer size to accept,
    /// or `None` to reject the reception.
    fn begin_receive(&mut self, id: RxSduId, total_len: Option<usize>) -> Option<usize>;

    /// Deliver the next bytes of the SDU for `id`.
    ///
    /// Returns `Some(remaining)` with the buffer space left after this
    /// push, or `None` to reject (which aborts the session).
    fn push_segment_data(&mut self, id: RxSduId, data: &[u8]) -> Option<usize>;

    /// Final outcome of a reception.
    fn receive_complete(&mut self, id: RxSduId, ok: bool);
}

/// Lower-layer frame transport.
pub trait FrameTransport {
    /// Hand one finished frame to the transport.
    ///
    /// Returns whether the frame was accepted. The transport reports
    /// completed transmission later via `tx_confirmation` on the
    /// segmentation engine.
    fn send_frame(&mut self, id: TxSduId, frame: &[u8]) -> bool;
}
