//! SOME/IP-TP segmentation and reassembly.
//!
//! This crate implements the transport-protocol sub-layer that carries
//! messages larger than a single frame: outbound SDUs are split into
//! TP segments, inbound segment streams are reassembled, with one
//! independent state machine per configured SDU id.
//!
//! # Features
//!
//! - [`SegmentationEngine`]: splits outbound SDUs, paces segments with
//!   configurable separation times and burst sizes, tracks per-frame
//!   transmit confirmations
//! - [`ReassemblyEngine`]: strictly in-order reassembly with header and
//!   metadata consistency checks and inactivity timeouts
//! - [`TpEndpoint`]: both directions behind one facade and one tick
//! - Trait-based collaborators ([`SegmentProducer`], [`SegmentConsumer`],
//!   [`FrameTransport`]); the engines perform no I/O and never block
//! - No allocation after construction; sessions, queue, and scratch
//!   buffers are sized once
//!
//! # Example
//!
//! ```
//! use someip_tp::{
//!     FrameTransport, SegmentProducer, SegmentationEngine, ShortHeader, TxChannelConfig,
//!     TxSduId,
//! };
//!
//! # fn main() -> someip_tp::Result<()> {
//! /// Streams one buffered SDU (header then payload) to the engine.
//! struct Producer {
//!     data: Vec<u8>,
//!     cursor: usize,
//! }
//!
//! impl SegmentProducer for Producer {
//!     fn pull_segment_data(&mut self, _id: TxSduId, buf: &mut [u8]) -> Option<usize> {
//!         let end = self.cursor + buf.len();
//!         buf.copy_from_slice(self.data.get(self.cursor..end)?);
//!         self.cursor = end;
//!         Some(self.data.len() - end)
//!     }
//!
//!     fn transmit_complete(&mut self, _id: TxSduId, ok: bool) {
//!         println!("transmit finished: {ok}");
//!     }
//! }
//!
//! struct Wire;
//!
//! impl FrameTransport for Wire {
//!     fn send_frame(&mut self, _id: TxSduId, frame: &[u8]) -> bool {
//!         println!("frame of {} bytes", frame.len());
//!         true
//!     }
//! }
//!
//! // SDU: short header followed by a 100-byte payload.
//! let mut sdu = ShortHeader::new(0x0100, 0x0001).to_bytes().to_vec();
//! sdu.extend_from_slice(&[0u8; 100]);
//!
//! let mut engine = SegmentationEngine::new(
//!     vec![TxChannelConfig::new(16)],
//!     Producer { data: sdu.clone(), cursor: 0 },
//!     Wire,
//! )?;
//!
//! // The first segment goes out immediately; confirmations and the
//! // cyclic poll drive the rest.
//! engine.transmit(TxSduId(0), &sdu)?;
//! while !engine.is_idle(TxSduId(0))? {
//!     engine.tx_confirmation(TxSduId(0))?;
//!     engine.poll();
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Wire Format
//!
//! Every frame starts with the 8-byte short header; segmented frames
//! insert the 4-byte TP field between header and payload and set the TP
//! flag (bit 5) in the message-type byte:
//!
//! ```text
//! +--------+--------+--------+--------+
//! |    Client ID    |   Session ID    |  (4 bytes)
//! +--------+--------+--------+--------+
//! |Proto|Iface|MsgType|RetCode|         (4 bytes)
//! +--------+--------+--------+--------+
//! |      Offset (28 bits)   |Res|More|  (4 bytes, segmented only)
//! +--------+--------+--------+--------+
//! |           Payload ...             |  (variable)
//! +--------+--------+--------+--------+
//! |           Metadata                |  (fixed per id, may be empty)
//! +--------+--------+--------+--------+
//! ```
//!
//! The offset counts 16-byte units; every non-final segment payload is a
//! multiple of 16 bytes.

pub mod config;
pub mod endpoint;
pub mod error;
pub mod header;
pub mod layer;
pub mod rx;
pub mod tx;

mod session;

// Re-export commonly used types at the crate root
pub use config::{
    RxChannelConfig, TxChannelConfig, DEFAULT_MAX_SEGMENT_PAYLOAD, DEFAULT_TIMEOUT_TICKS,
};
pub use endpoint::TpEndpoint;
pub use error::{Result, TpError};
pub use header::{
    decode_tp_fields, encode_long_header, frame_is_segmented, ShortHeader, TpHeader,
    LONG_HEADER_SIZE, PROTOCOL_VERSION, SEGMENT_UNIT, SHORT_HEADER_SIZE, TP_FLAG, TP_HEADER_SIZE,
};
pub use layer::{FrameTransport, RxSduId, SegmentConsumer, SegmentProducer, TxSduId};
pub use rx::ReassemblyEngine;
pub use tx::SegmentationEngine;
