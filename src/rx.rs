//! Reassembly engine: reconstructs inbound SDUs from TP segment streams.
//!
//! One state machine per inbound id. Segments must arrive strictly in
//! order; every frame is validated against the reference header and
//! metadata captured from the first segment, and any violation aborts
//! exactly the one affected session. The cyclic
//! [`ReassemblyEngine::poll`] ages inactivity timers.

use tracing::{debug, trace, warn};

use crate::config::RxChannelConfig;
use crate::error::{Result, TpError};
use crate::header::{
    decode_tp_fields, frame_is_segmented, TpHeader, LONG_HEADER_SIZE, MESSAGE_TYPE_OFFSET,
    SEGMENT_UNIT, SHORT_HEADER_SIZE, TP_FLAG,
};
use crate::layer::{RxSduId, SegmentConsumer};
use crate::session::{RxSession, RxState};

/// Drives reassembly for all configured inbound ids.
#[derive(Debug)]
pub struct ReassemblyEngine<C> {
    configs: Vec<RxChannelConfig>,
    sessions: Vec<RxSession>,
    consumer: C,
}

impl<C: SegmentConsumer> ReassemblyEngine<C> {
    /// Create an engine for the given per-id configurations.
    pub fn new(configs: Vec<RxChannelConfig>, consumer: C) -> Result<Self> {
        for cfg in &configs {
            cfg.validate()?;
        }

        let sessions = configs
            .iter()
            .map(|cfg| RxSession::new(cfg.metadata_len))
            .collect();

        Ok(Self {
            sessions,
            configs,
            consumer,
        })
    }

    /// Number of configured inbound ids.
    pub fn channels(&self) -> usize {
        self.configs.len()
    }

    /// Number of reassemblies currently in progress.
    pub fn active_sessions(&self) -> usize {
        self.sessions.iter().filter(|s| !s.is_idle()).count()
    }

    /// Whether the session for `id` is idle.
    pub fn is_idle(&self, id: RxSduId) -> Result<bool> {
        Ok(self.sessions[self.check_id(id)?].is_idle())
    }

    /// Access the upper-layer consumer.
    pub fn consumer(&self) -> &C {
        &self.consumer
    }

    /// Mutable access to the upper-layer consumer.
    pub fn consumer_mut(&mut self) -> &mut C {
        &mut self.consumer
    }

    /// One inbound frame from the transport.
    ///
    /// Dispatches on the TP flag: segmented frames feed the per-id state
    /// machine, unsegmented frames are forwarded as an atomic one-shot.
    /// An unsegmented frame during an active reassembly is a sequencing
    /// violation and aborts that reassembly.
    pub fn rx_indication(&mut self, id: RxSduId, frame: &[u8]) -> Result<()> {
        let idx = self.check_id(id)?;
        let meta_len = self.configs[idx].metadata_len;

        let min = SHORT_HEADER_SIZE + meta_len;
        if frame.len() < min {
            return Err(TpError::FrameTooShort {
                expected: min,
                actual: frame.len(),
            });
        }

        if frame_is_segmented(frame) {
            self.handle_segment(idx, id, frame)
        } else if self.sessions[idx].is_idle() {
            self.handle_single(idx, id, frame)
        } else {
            warn!(%id, "unsegmented frame during reassembly, aborting session");
            self.abort(idx, id);
            Err(TpError::UnexpectedFrame)
        }
    }

    /// Cyclic tick: age inactivity timers and abort expired reassemblies.
    ///
    /// Returns the number of sessions aborted. Idle ids are untouched.
    pub fn poll(&mut self) -> usize {
        let mut expired = 0;

        for idx in 0..self.sessions.len() {
            if self.sessions[idx].state != RxState::AwaitingNextSegment {
                continue;
            }
            if self.sessions[idx].timer > 0 {
                self.sessions[idx].timer -= 1;
            }
            if self.sessions[idx].timer == 0 {
                let id = RxSduId(idx as u16);
                warn!(%id, "reassembly inactivity timeout, aborting session");
                self.abort(idx, id);
                expired += 1;
            }
        }

        expired
    }

    fn handle_segment(&mut self, idx: usize, id: RxSduId, frame: &[u8]) -> Result<()> {
        let meta_len = self.configs[idx].metadata_len;

        let min = LONG_HEADER_SIZE + meta_len;
        if frame.len() < min {
            return Err(TpError::FrameTooShort {
                expected: min,
                actual: frame.len(),
            });
        }

        let tp = decode_tp_fields(frame)?;
        let payload = &frame[LONG_HEADER_SIZE..frame.len() - meta_len];
        let metadata = &frame[frame.len() - meta_len..];

        if self.sessions[idx].is_idle() {
            return self.start_session(idx, id, frame, tp, payload, metadata);
        }

        if tp.offset == 0 {
            // A fresh first segment invalidates the running reassembly:
            // abort it, then make one attempt to start over from this
            // frame.
            warn!(%id, "first segment while reassembly in progress, restarting");
            self.abort(idx, id);
            return self.start_session(idx, id, frame, tp, payload, metadata);
        }

        self.continue_session(idx, id, frame, tp, payload, metadata)
    }

    /// First segment of a new reassembly. Leaves the session idle on any
    /// rejection.
    fn start_session(
        &mut self,
        idx: usize,
        id: RxSduId,
        frame: &[u8],
        tp: TpHeader,
        payload: &[u8],
        metadata: &[u8],
    ) -> Result<()> {
        if tp.offset != 0 {
            warn!(%id, offset = tp.byte_offset(), "segment for unknown reassembly");
            return Err(TpError::OutOfSequence {
                expected: 0,
                actual: tp.byte_offset(),
            });
        }
        if !tp.more {
            warn!(%id, "first segment without more flag");
            return Err(TpError::InvalidSegment(
                "first segment without more flag".into(),
            ));
        }
        if payload.is_empty() || payload.len() % SEGMENT_UNIT != 0 {
            warn!(%id, len = payload.len(), "misaligned first segment");
            return Err(TpError::Misaligned { len: payload.len() });
        }

        // Total length is unknown until the final segment arrives.
        let Some(granted) = self.consumer.begin_receive(id, None) else {
            warn!(%id, "consumer rejected reception");
            return Err(TpError::ConsumerRejected(id.0));
        };
        let needed = SHORT_HEADER_SIZE + payload.len();
        if granted < needed {
            warn!(%id, needed, granted, "insufficient receive buffer");
            self.consumer.receive_complete(id, false);
            return Err(TpError::InsufficientBuffer { needed, granted });
        }

        // Forward the header with the TP flag cleared so it reads as an
        // ordinary unsegmented message.
        let mut fwd = [0u8; SHORT_HEADER_SIZE];
        fwd.copy_from_slice(&frame[..SHORT_HEADER_SIZE]);
        fwd[MESSAGE_TYPE_OFFSET] &= !TP_FLAG;

        if self.consumer.push_segment_data(id, &fwd).is_none() {
            warn!(%id, "consumer rejected header delivery");
            self.consumer.receive_complete(id, false);
            return Err(TpError::ConsumerRejected(id.0));
        }
        let Some(remaining) = self.consumer.push_segment_data(id, payload) else {
            warn!(%id, "consumer rejected segment delivery");
            self.consumer.receive_complete(id, false);
            return Err(TpError::ConsumerRejected(id.0));
        };

        let timeout = self.configs[idx].inactivity_timeout;
        let session = &mut self.sessions[idx];
        session.state = RxState::AwaitingNextSegment;
        session.assembled = payload.len();
        session.available = remaining;
        session.timer = timeout;
        session.header.copy_from_slice(&frame[..SHORT_HEADER_SIZE]);
        session.metadata.clear();
        session.metadata.extend_from_slice(metadata);

        trace!(%id, assembled = payload.len(), "reassembly started");
        Ok(())
    }

    /// Follow-up segment of a running reassembly. Validation order:
    /// header, sequence, buffer, metadata, alignment.
    fn continue_session(
        &mut self,
        idx: usize,
        id: RxSduId,
        frame: &[u8],
        tp: TpHeader,
        payload: &[u8],
        metadata: &[u8],
    ) -> Result<()> {
        if frame[..SHORT_HEADER_SIZE] != self.sessions[idx].header[..] {
            warn!(%id, "short header mismatch, aborting reassembly");
            self.abort(idx, id);
            return Err(TpError::HeaderMismatch);
        }

        let expected = self.sessions[idx].assembled;
        if tp.byte_offset() != expected {
            warn!(%id, expected, actual = tp.byte_offset(), "segment out of sequence");
            self.abort(idx, id);
            return Err(TpError::OutOfSequence {
                expected,
                actual: tp.byte_offset(),
            });
        }

        let available = self.sessions[idx].available;
        if payload.len() > available {
            warn!(%id, needed = payload.len(), available, "receive buffer exhausted");
            self.abort(idx, id);
            return Err(TpError::BufferExhausted {
                needed: payload.len(),
                available,
            });
        }

        if metadata != self.sessions[idx].metadata.as_slice() {
            warn!(%id, "metadata mismatch, aborting reassembly");
            self.abort(idx, id);
            return Err(TpError::MetadataMismatch);
        }

        if tp.more {
            if payload.is_empty() || payload.len() % SEGMENT_UNIT != 0 {
                warn!(%id, len = payload.len(), "misaligned non-final segment");
                self.abort(idx, id);
                return Err(TpError::Misaligned { len: payload.len() });
            }

            let Some(remaining) = self.consumer.push_segment_data(id, payload) else {
                warn!(%id, "consumer rejected segment delivery");
                self.abort(idx, id);
                return Err(TpError::ConsumerRejected(id.0));
            };

            let timeout = self.configs[idx].inactivity_timeout;
            let session = &mut self.sessions[idx];
            session.assembled += payload.len();
            session.available = remaining;
            session.timer = timeout;
            trace!(%id, assembled = session.assembled, "segment accepted");
            Ok(())
        } else {
            // Final segment: any remaining length is allowed.
            if self.consumer.push_segment_data(id, payload).is_none() {
                warn!(%id, "consumer rejected final segment delivery");
                self.abort(idx, id);
                return Err(TpError::ConsumerRejected(id.0));
            }

            self.sessions[idx].reset();
            self.consumer.receive_complete(id, true);
            debug!(%id, "reassembly complete");
            Ok(())
        }
    }

    /// Unsegmented frame while idle: an atomic one-shot with the total
    /// length known up front. No session state exists to roll back.
    fn handle_single(&mut self, idx: usize, id: RxSduId, frame: &[u8]) -> Result<()> {
        let meta_len = self.configs[idx].metadata_len;
        let deliver = frame.len() - meta_len;

        let Some(granted) = self.consumer.begin_receive(id, Some(deliver)) else {
            warn!(%id, "consumer rejected reception");
            return Err(TpError::ConsumerRejected(id.0));
        };
        if granted < deliver {
            warn!(%id, needed = deliver, granted, "insufficient receive buffer");
            self.consumer.receive_complete(id, false);
            return Err(TpError::InsufficientBuffer {
                needed: deliver,
                granted,
            });
        }
        if self.consumer.push_segment_data(id, &frame[..deliver]).is_none() {
            warn!(%id, "consumer rejected delivery");
            self.consumer.receive_complete(id, false);
            return Err(TpError::ConsumerRejected(id.0));
        }

        self.consumer.receive_complete(id, true);
        trace!(%id, len = deliver, "unsegmented frame delivered");
        Ok(())
    }

    /// Abort the running reassembly: back to idle, failure to the consumer.
    fn abort(&mut self, idx: usize, id: RxSduId) {
        self.sessions[idx].reset();
        self.consumer.receive_complete(id, false);
    }

    fn check_id(&self, id: RxSduId) -> Result<usize> {
        if id.index() < self.sessions.len() {
            Ok(id.index())
        } else {
            Err(TpError::InvalidSduId(id.0))
        }
    }
}
