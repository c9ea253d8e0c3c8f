//! Segmentation engine: splits outbound SDUs into TP frames.
//!
//! One state machine per outbound id, driven from two contexts: the
//! event-driven calls ([`SegmentationEngine::transmit`],
//! [`SegmentationEngine::tx_confirmation`], and the pull-mode
//! [`SegmentationEngine::trigger_transmit`]) and the cyclic
//! [`SegmentationEngine::poll`] that ages timers and runs bursts. No call
//! blocks; every call runs to completion and returns.

use bytes::BytesMut;
use tracing::{debug, trace, warn};

use crate::config::TxChannelConfig;
use crate::error::{Result, TpError};
use crate::header::{encode_long_header, LONG_HEADER_SIZE, SHORT_HEADER_SIZE};
use crate::layer::{FrameTransport, SegmentProducer, TxSduId};
use crate::session::{TransmitQueue, TxSession, TxState};

/// Drives segmentation for all configured outbound ids.
///
/// Sessions occupy fixed slots indexed by [`TxSduId`]; the transmit queue
/// and the frame scratch buffer are sized once at construction, so no
/// operation allocates.
#[derive(Debug)]
pub struct SegmentationEngine<P, T> {
    configs: Vec<TxChannelConfig>,
    sessions: Vec<TxSession>,
    queue: TransmitQueue,
    scratch: BytesMut,
    producer: P,
    transport: T,
}

impl<P: SegmentProducer, T: FrameTransport> SegmentationEngine<P, T> {
    /// Create an engine for the given per-id configurations.
    ///
    /// Fails if any channel configuration is inconsistent.
    pub fn new(configs: Vec<TxChannelConfig>, producer: P, transport: T) -> Result<Self> {
        let mut max_frame = 0;
        for cfg in &configs {
            cfg.validate()?;
            max_frame = max_frame.max(LONG_HEADER_SIZE + cfg.max_segment_payload + cfg.metadata_len);
        }

        let sessions = configs
            .iter()
            .map(|cfg| TxSession::new(cfg.metadata_len))
            .collect();

        Ok(Self {
            queue: TransmitQueue::new(configs.len()),
            sessions,
            scratch: BytesMut::with_capacity(max_frame),
            configs,
            producer,
            transport,
        })
    }

    /// Number of configured outbound ids.
    pub fn channels(&self) -> usize {
        self.configs.len()
    }

    /// Number of transmit sessions currently active (non-idle).
    pub fn active_sessions(&self) -> usize {
        self.queue.len()
    }

    /// Whether the session for `id` is idle.
    pub fn is_idle(&self, id: TxSduId) -> Result<bool> {
        Ok(self.sessions[self.check_id(id)?].is_idle())
    }

    /// Access the upper-layer producer.
    pub fn producer(&self) -> &P {
        &self.producer
    }

    /// Mutable access to the upper-layer producer.
    pub fn producer_mut(&mut self) -> &mut P {
        &mut self.producer
    }

    /// Access the lower-layer transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the lower-layer transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Start transmitting one SDU.
    ///
    /// `sdu` holds the complete message: short header, metadata, payload.
    /// The engine caches the header/metadata prefix here; the payload
    /// bytes themselves are pulled from the producer segment by segment.
    /// The first frame is built and handed to the transport before this
    /// call returns. On any rejection the session rolls back fully and no
    /// partial state survives.
    pub fn transmit(&mut self, id: TxSduId, sdu: &[u8]) -> Result<()> {
        let idx = self.check_id(id)?;
        let cfg = &self.configs[idx];

        if !self.sessions[idx].is_idle() {
            return Err(TpError::Busy(id.0));
        }

        let prefix = SHORT_HEADER_SIZE + cfg.metadata_len;
        if sdu.len() < prefix {
            return Err(TpError::SduTooShort {
                expected: prefix,
                actual: sdu.len(),
            });
        }

        let payload_total = sdu.len() - prefix;
        let segmented = payload_total > cfg.max_segment_payload;
        let first_len = if segmented {
            cfg.max_segment_payload
        } else {
            payload_total
        };

        let session = &mut self.sessions[idx];
        session.header.copy_from_slice(&sdu[..SHORT_HEADER_SIZE]);
        session.metadata.extend_from_slice(&sdu[SHORT_HEADER_SIZE..prefix]);
        session.payload_total = payload_total;
        session.data_index = 0;
        session.next_len = first_len;
        session.segmented = segmented;

        self.queue.push(id.0);

        match self.build_next_frame(idx) {
            Ok(len) => {
                if !self.transport.send_frame(id, &self.scratch[..len]) {
                    self.rollback(idx, id);
                    return Err(TpError::TransportRejected(id.0));
                }
            }
            Err(e) => {
                self.rollback(idx, id);
                return Err(e);
            }
        }

        trace!(%id, payload = payload_total, segmented, "transmit started");
        Ok(())
    }

    /// Build the next segment frame into the transport's buffer.
    ///
    /// Pull-mode counterpart of the burst path in [`Self::poll`]: legal
    /// once the session sits in its separation window with an expired
    /// timer. Advances the session and re-arms the confirmation timer;
    /// the caller owns putting the frame on the wire and confirming it.
    pub fn trigger_transmit(&mut self, id: TxSduId, frame: &mut [u8]) -> Result<usize> {
        let idx = self.check_id(id)?;

        let session = &self.sessions[idx];
        if session.state != TxState::AwaitingSeparation || session.timer != 0 {
            return Err(TpError::NotReady(id.0));
        }

        let needed = LONG_HEADER_SIZE + session.next_len + self.configs[idx].metadata_len;
        if frame.len() < needed {
            return Err(TpError::FrameTooShort {
                expected: needed,
                actual: frame.len(),
            });
        }

        match self.build_next_frame(idx) {
            Ok(len) => {
                frame[..len].copy_from_slice(&self.scratch[..len]);
                Ok(len)
            }
            Err(e) => {
                warn!(%id, error = %e, "segment build failed, aborting transmit session");
                self.rollback(idx, id);
                self.producer.transmit_complete(id, false);
                Err(e)
            }
        }
    }

    /// Confirmation from the transport that the in-flight frame left the
    /// wire.
    pub fn tx_confirmation(&mut self, id: TxSduId) -> Result<()> {
        let idx = self.check_id(id)?;
        let burst_size = self.configs[idx].burst_size;
        let separation = self.configs[idx].separation_time;

        match self.sessions[idx].state {
            TxState::AwaitingConfirmation { last: true } => {
                self.rollback(idx, id);
                self.producer.transmit_complete(id, true);
                debug!(%id, "transmit complete");
                Ok(())
            }
            TxState::AwaitingConfirmation { last: false } => {
                let session = &mut self.sessions[idx];
                session.state = TxState::AwaitingSeparation;
                // Burst mode sends back-to-back; no separation delay.
                session.timer = if burst_size > 1 { 0 } else { separation };
                Ok(())
            }
            _ => Err(TpError::UnexpectedConfirmation(id.0)),
        }
    }

    /// Cyclic tick: age timers, fire bursts, abort timed-out sessions.
    ///
    /// Idle ids are not queued and are untouched. Runs once per
    /// scheduling period; never blocks.
    pub fn poll(&mut self) {
        let mut pos = 0;
        while let Some(raw) = self.queue.get(pos) {
            let idx = usize::from(raw);
            let id = TxSduId(raw);

            let removed = match self.sessions[idx].state {
                TxState::AwaitingConfirmation { .. } => {
                    self.sessions[idx].timer -= 1;
                    if self.sessions[idx].timer == 0 {
                        warn!(%id, "transmit confirmation timeout, aborting session");
                        self.rollback(idx, id);
                        self.producer.transmit_complete(id, false);
                        true
                    } else {
                        false
                    }
                }
                TxState::AwaitingSeparation => {
                    if self.sessions[idx].timer > 0 {
                        self.sessions[idx].timer -= 1;
                    }
                    if self.sessions[idx].timer == 0 {
                        self.run_burst(idx, id)
                    } else {
                        false
                    }
                }
                TxState::Idle => false,
            };

            if !removed {
                pos += 1;
            }
        }
    }

    /// Send up to burst-size consecutive segments for one session.
    ///
    /// Returns whether the session was removed from the queue (abort).
    fn run_burst(&mut self, idx: usize, id: TxSduId) -> bool {
        let burst = self.configs[idx].burst_size;

        for _ in 0..burst {
            let len = match self.build_next_frame(idx) {
                Ok(len) => len,
                Err(e) => {
                    warn!(%id, error = %e, "segment build failed, aborting transmit session");
                    self.rollback(idx, id);
                    self.producer.transmit_complete(id, false);
                    return true;
                }
            };

            let last = matches!(
                self.sessions[idx].state,
                TxState::AwaitingConfirmation { last: true }
            );

            if !self.transport.send_frame(id, &self.scratch[..len]) {
                warn!(%id, "transport rejected segment, aborting transmit session");
                self.rollback(idx, id);
                self.producer.transmit_complete(id, false);
                return true;
            }
            trace!(%id, len, last, "segment sent");

            if last {
                break;
            }
        }

        false
    }

    /// Build the next frame for `idx` into the scratch buffer and advance
    /// the session: pulls from the producer, validates its reported
    /// available length, writes the header, appends metadata, moves the
    /// session to `AwaitingConfirmation` and re-arms the timer.
    fn build_next_frame(&mut self, idx: usize) -> Result<usize> {
        let id = TxSduId(idx as u16);
        let max_payload = self.configs[idx].max_segment_payload;
        let timeout = self.configs[idx].confirmation_timeout;
        let seg_len = self.sessions[idx].next_len;
        let segmented = self.sessions[idx].segmented;
        let first = self.sessions[idx].data_index == 0;
        let remaining = self.sessions[idx].remaining();

        self.scratch.clear();

        if segmented {
            let remaining_after = remaining - seg_len;
            let more = remaining_after > 0;
            let offset_units = self.sessions[idx].offset_units();

            if first {
                // The producer streams the short header ahead of the
                // payload; consume it so the payload pulls line up.
                let mut hdr = [0u8; SHORT_HEADER_SIZE];
                let avail = self
                    .producer
                    .pull_segment_data(id, &mut hdr)
                    .ok_or(TpError::ProducerRejected(id.0))?;
                if avail != remaining {
                    return Err(TpError::AvailableMismatch {
                        expected: remaining,
                        reported: avail,
                    });
                }
            }

            self.scratch.resize(LONG_HEADER_SIZE + seg_len, 0);
            let avail = self
                .producer
                .pull_segment_data(id, &mut self.scratch[LONG_HEADER_SIZE..])
                .ok_or(TpError::ProducerRejected(id.0))?;
            if avail != remaining_after {
                return Err(TpError::AvailableMismatch {
                    expected: remaining_after,
                    reported: avail,
                });
            }

            let header = encode_long_header(&self.sessions[idx].header, offset_units, more);
            self.scratch[..LONG_HEADER_SIZE].copy_from_slice(&header);
            self.scratch.extend_from_slice(&self.sessions[idx].metadata);

            let session = &mut self.sessions[idx];
            session.data_index += seg_len;
            session.next_len = session.remaining().min(max_payload);
            session.state = TxState::AwaitingConfirmation {
                last: remaining_after == 0,
            };
            session.timer = timeout;
        } else {
            // Unsegmented: the whole SDU in one pull, header included,
            // forwarded verbatim with the metadata appended.
            self.scratch.resize(SHORT_HEADER_SIZE + seg_len, 0);
            let avail = self
                .producer
                .pull_segment_data(id, &mut self.scratch[..])
                .ok_or(TpError::ProducerRejected(id.0))?;
            if avail != 0 {
                return Err(TpError::AvailableMismatch {
                    expected: 0,
                    reported: avail,
                });
            }

            self.scratch.extend_from_slice(&self.sessions[idx].metadata);

            let session = &mut self.sessions[idx];
            session.data_index = session.payload_total;
            session.next_len = 0;
            session.state = TxState::AwaitingConfirmation { last: true };
            session.timer = timeout;
        }

        Ok(self.scratch.len())
    }

    /// Return the session to idle and drop its queue entry.
    fn rollback(&mut self, idx: usize, id: TxSduId) {
        self.sessions[idx].reset();
        self.queue.remove(id.0);
    }

    fn check_id(&self, id: TxSduId) -> Result<usize> {
        if id.index() < self.sessions.len() {
            Ok(id.index())
        } else {
            Err(TpError::InvalidSduId(id.0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{decode_tp_fields, frame_is_segmented, ShortHeader, TP_FLAG};

    /// Per-id SDU byte streams (header then payload), pulled with a cursor.
    #[derive(Default)]
    struct Producer {
        streams: Vec<(Vec<u8>, usize)>,
        pulls: usize,
        fail_after_pulls: Option<usize>,
        misreport_by: usize,
        completions: Vec<(TxSduId, bool)>,
    }

    impl Producer {
        fn with_sdu_stream(data: Vec<u8>) -> Self {
            Self {
                streams: vec![(data, 0)],
                ..Self::default()
            }
        }
    }

    impl SegmentProducer for Producer {
        fn pull_segment_data(&mut self, id: TxSduId, buf: &mut [u8]) -> Option<usize> {
            self.pulls += 1;
            if let Some(n) = self.fail_after_pulls {
                if self.pulls > n {
                    return None;
                }
            }
            let (data, cursor) = self.streams.get_mut(id.index())?;
            if *cursor + buf.len() > data.len() {
                return None;
            }
            buf.copy_from_slice(&data[*cursor..*cursor + buf.len()]);
            *cursor += buf.len();
            Some(data.len() - *cursor + self.misreport_by)
        }

        fn transmit_complete(&mut self, id: TxSduId, ok: bool) {
            self.completions.push((id, ok));
        }
    }

    #[derive(Default)]
    struct Transport {
        frames: Vec<Vec<u8>>,
        accept: Option<usize>,
    }

    impl FrameTransport for Transport {
        fn send_frame(&mut self, _id: TxSduId, frame: &[u8]) -> bool {
            if let Some(n) = self.accept {
                if self.frames.len() >= n {
                    return false;
                }
            }
            self.frames.push(frame.to_vec());
            true
        }
    }

    fn test_config() -> TxChannelConfig {
        TxChannelConfig {
            max_segment_payload: 16,
            metadata_len: 0,
            confirmation_timeout: 5,
            separation_time: 0,
            burst_size: 1,
        }
    }

    fn header_bytes() -> [u8; SHORT_HEADER_SIZE] {
        ShortHeader::new(0x0100, 0x0001).to_bytes()
    }

    /// SDU bytes as passed to `transmit`: header ++ metadata ++ payload.
    fn sdu(metadata: &[u8], payload: &[u8]) -> Vec<u8> {
        let mut v = header_bytes().to_vec();
        v.extend_from_slice(metadata);
        v.extend_from_slice(payload);
        v
    }

    /// Producer stream: header ++ payload (metadata travels via `transmit`).
    fn stream(payload: &[u8]) -> Vec<u8> {
        let mut v = header_bytes().to_vec();
        v.extend_from_slice(payload);
        v
    }

    /// Drive one segmented transmission to completion, confirming every
    /// frame and polling between bursts.
    fn drive_to_completion(
        engine: &mut SegmentationEngine<Producer, Transport>,
        id: TxSduId,
        max_rounds: usize,
    ) {
        for _ in 0..max_rounds {
            if engine.is_idle(id).unwrap() {
                return;
            }
            engine.tx_confirmation(id).unwrap();
            if engine.is_idle(id).unwrap() {
                return;
            }
            engine.poll();
        }
        panic!("transmission did not complete");
    }

    #[test]
    fn test_unsegmented_single_frame() {
        let payload = vec![0xABu8; 10];
        let producer = Producer::with_sdu_stream(stream(&payload));
        let mut engine =
            SegmentationEngine::new(vec![test_config()], producer, Transport::default()).unwrap();
        let id = TxSduId(0);

        engine.transmit(id, &sdu(&[], &payload)).unwrap();

        let frames = &engine.transport().frames;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), SHORT_HEADER_SIZE + 10);
        assert!(!frame_is_segmented(&frames[0]));
        assert_eq!(&frames[0][SHORT_HEADER_SIZE..], payload.as_slice());

        engine.tx_confirmation(id).unwrap();
        assert!(engine.is_idle(id).unwrap());
        assert_eq!(engine.active_sessions(), 0);
        assert_eq!(engine.producer().completions, vec![(id, true)]);
    }

    #[test]
    fn test_segmented_40_byte_sdu() {
        // 40-byte payload over 16-byte frames: {16, 16, 8} at byte
        // offsets {0, 16, 32}, last frame more=false.
        let payload: Vec<u8> = (0..40u8).collect();
        let producer = Producer::with_sdu_stream(stream(&payload));
        let mut engine =
            SegmentationEngine::new(vec![test_config()], producer, Transport::default()).unwrap();
        let id = TxSduId(0);

        engine.transmit(id, &sdu(&[], &payload)).unwrap();
        drive_to_completion(&mut engine, id, 10);

        let frames = &engine.transport().frames;
        assert_eq!(frames.len(), 3);

        let mut reassembled = Vec::new();
        let expected = [(0u32, 16usize, true), (1, 16, true), (2, 8, false)];
        for (frame, (offset, len, more)) in frames.iter().zip(expected) {
            assert!(frame_is_segmented(frame));
            let tp = decode_tp_fields(frame).unwrap();
            assert_eq!(tp.offset, offset);
            assert_eq!(tp.more, more);
            assert_eq!(frame.len(), LONG_HEADER_SIZE + len);
            // Short header carried on every frame, TP flag set.
            assert_eq!(&frame[..6], &header_bytes()[..6]);
            assert_eq!(frame[6], header_bytes()[6] | TP_FLAG);
            reassembled.extend_from_slice(&frame[LONG_HEADER_SIZE..]);
        }

        assert_eq!(reassembled, payload);
        assert_eq!(engine.producer().completions, vec![(id, true)]);
        assert_eq!(engine.active_sessions(), 0);
    }

    #[test]
    fn test_metadata_appended_to_every_frame() {
        let cfg = TxChannelConfig {
            metadata_len: 4,
            ..test_config()
        };
        let payload: Vec<u8> = (0..32u8).collect();
        let metadata = [0xDE, 0xAD, 0xBE, 0xEF];
        let producer = Producer::with_sdu_stream(stream(&payload));
        let mut engine = SegmentationEngine::new(vec![cfg], producer, Transport::default()).unwrap();
        let id = TxSduId(0);

        engine.transmit(id, &sdu(&metadata, &payload)).unwrap();
        drive_to_completion(&mut engine, id, 10);

        let frames = &engine.transport().frames;
        assert_eq!(frames.len(), 2);
        for frame in frames {
            assert_eq!(&frame[frame.len() - 4..], &metadata);
        }
    }

    #[test]
    fn test_transmit_rejects_short_sdu() {
        let cfg = TxChannelConfig {
            metadata_len: 4,
            ..test_config()
        };
        let mut engine =
            SegmentationEngine::new(vec![cfg], Producer::default(), Transport::default()).unwrap();

        let err = engine.transmit(TxSduId(0), &[0u8; 10]).unwrap_err();
        assert_eq!(
            err,
            TpError::SduTooShort {
                expected: 12,
                actual: 10
            }
        );
        assert_eq!(engine.active_sessions(), 0);
    }

    #[test]
    fn test_transmit_rejects_invalid_id_and_busy() {
        let payload = vec![0u8; 4];
        let producer = Producer::with_sdu_stream(stream(&payload));
        let mut engine =
            SegmentationEngine::new(vec![test_config()], producer, Transport::default()).unwrap();

        assert_eq!(
            engine.transmit(TxSduId(1), &sdu(&[], &payload)),
            Err(TpError::InvalidSduId(1))
        );

        engine.transmit(TxSduId(0), &sdu(&[], &payload)).unwrap();
        assert_eq!(
            engine.transmit(TxSduId(0), &sdu(&[], &payload)),
            Err(TpError::Busy(0))
        );
    }

    #[test]
    fn test_transport_rejection_rolls_back() {
        let payload = vec![0u8; 40];
        let producer = Producer::with_sdu_stream(stream(&payload));
        let transport = Transport {
            accept: Some(0),
            ..Transport::default()
        };
        let mut engine = SegmentationEngine::new(vec![test_config()], producer, transport).unwrap();
        let id = TxSduId(0);

        let err = engine.transmit(id, &sdu(&[], &payload)).unwrap_err();
        assert_eq!(err, TpError::TransportRejected(0));

        // No partial state survives, no completion was delivered.
        assert!(engine.is_idle(id).unwrap());
        assert_eq!(engine.active_sessions(), 0);
        assert!(engine.producer().completions.is_empty());

        // The id is immediately reusable.
        engine.transport_mut().accept = None;
        engine.producer_mut().streams[0].1 = 0;
        engine.transmit(id, &sdu(&[], &payload)).unwrap();
    }

    #[test]
    fn test_producer_failure_mid_stream_aborts() {
        let payload = vec![0u8; 40];
        let producer = Producer {
            fail_after_pulls: Some(2), // header pull + first payload pull
            ..Producer::with_sdu_stream(stream(&payload))
        };
        let mut engine =
            SegmentationEngine::new(vec![test_config()], producer, Transport::default()).unwrap();
        let id = TxSduId(0);

        engine.transmit(id, &sdu(&[], &payload)).unwrap();
        engine.tx_confirmation(id).unwrap();
        engine.poll(); // burst tries the second segment, pull fails

        assert!(engine.is_idle(id).unwrap());
        assert_eq!(engine.active_sessions(), 0);
        assert_eq!(engine.producer().completions, vec![(id, false)]);
    }

    #[test]
    fn test_available_mismatch_aborts() {
        let payload = vec![0u8; 40];
        let producer = Producer {
            misreport_by: 16,
            ..Producer::with_sdu_stream(stream(&payload))
        };
        let mut engine =
            SegmentationEngine::new(vec![test_config()], producer, Transport::default()).unwrap();

        let err = engine.transmit(TxSduId(0), &sdu(&[], &payload)).unwrap_err();
        assert!(matches!(err, TpError::AvailableMismatch { .. }));
        assert_eq!(engine.active_sessions(), 0);
    }

    #[test]
    fn test_confirmation_timeout_reports_once() {
        let payload = vec![0u8; 40];
        let producer = Producer::with_sdu_stream(stream(&payload));
        let mut engine =
            SegmentationEngine::new(vec![test_config()], producer, Transport::default()).unwrap();
        let id = TxSduId(0);

        engine.transmit(id, &sdu(&[], &payload)).unwrap();

        // Confirmation never arrives; the timer expires on the fifth tick.
        for _ in 0..4 {
            engine.poll();
            assert_eq!(engine.active_sessions(), 1);
        }
        engine.poll();

        assert!(engine.is_idle(id).unwrap());
        assert_eq!(engine.active_sessions(), 0);
        assert_eq!(engine.producer().completions, vec![(id, false)]);

        // Exactly one failure; further ticks are no-ops.
        engine.poll();
        engine.poll();
        assert_eq!(engine.producer().completions.len(), 1);
    }

    #[test]
    fn test_poll_on_idle_sessions_is_noop() {
        let mut engine = SegmentationEngine::new(
            vec![test_config(), test_config()],
            Producer::default(),
            Transport::default(),
        )
        .unwrap();

        for _ in 0..10 {
            engine.poll();
        }
        assert_eq!(engine.active_sessions(), 0);
        assert!(engine.producer().completions.is_empty());
        assert!(engine.transport().frames.is_empty());
    }

    #[test]
    fn test_unexpected_confirmation() {
        let mut engine =
            SegmentationEngine::new(vec![test_config()], Producer::default(), Transport::default())
                .unwrap();

        assert_eq!(
            engine.tx_confirmation(TxSduId(0)),
            Err(TpError::UnexpectedConfirmation(0))
        );
    }

    #[test]
    fn test_separation_time_delays_next_segment() {
        let cfg = TxChannelConfig {
            separation_time: 3,
            ..test_config()
        };
        let payload = vec![0u8; 40];
        let producer = Producer::with_sdu_stream(stream(&payload));
        let mut engine = SegmentationEngine::new(vec![cfg], producer, Transport::default()).unwrap();
        let id = TxSduId(0);

        engine.transmit(id, &sdu(&[], &payload)).unwrap();
        engine.tx_confirmation(id).unwrap();

        // Two ticks of separation left after the first two polls.
        engine.poll();
        engine.poll();
        assert_eq!(engine.transport().frames.len(), 1);

        // Third tick expires the gap and sends the next segment.
        engine.poll();
        assert_eq!(engine.transport().frames.len(), 2);
    }

    #[test]
    fn test_burst_sends_back_to_back() {
        let cfg = TxChannelConfig {
            burst_size: 4,
            ..test_config()
        };
        let payload: Vec<u8> = (0..48u8).collect();
        let producer = Producer::with_sdu_stream(stream(&payload));
        let mut engine = SegmentationEngine::new(vec![cfg], producer, Transport::default()).unwrap();
        let id = TxSduId(0);

        engine.transmit(id, &sdu(&[], &payload)).unwrap();
        assert_eq!(engine.transport().frames.len(), 1);

        engine.tx_confirmation(id).unwrap();
        engine.poll();

        // The burst finishes the remaining two segments in one tick.
        assert_eq!(engine.transport().frames.len(), 3);
        let tp = decode_tp_fields(engine.transport().frames.last().unwrap()).unwrap();
        assert!(!tp.more);

        engine.tx_confirmation(id).unwrap();
        assert!(engine.is_idle(id).unwrap());
        assert_eq!(engine.producer().completions, vec![(id, true)]);
    }

    #[test]
    fn test_trigger_transmit_pull_mode() {
        let payload: Vec<u8> = (0..40u8).collect();
        let producer = Producer::with_sdu_stream(stream(&payload));
        let mut engine =
            SegmentationEngine::new(vec![test_config()], producer, Transport::default()).unwrap();
        let id = TxSduId(0);

        engine.transmit(id, &sdu(&[], &payload)).unwrap();

        // Not in the separation window yet.
        let mut buf = [0u8; 64];
        assert_eq!(
            engine.trigger_transmit(id, &mut buf),
            Err(TpError::NotReady(0))
        );

        engine.tx_confirmation(id).unwrap();
        let len = engine.trigger_transmit(id, &mut buf).unwrap();
        assert_eq!(len, LONG_HEADER_SIZE + 16);

        let tp = decode_tp_fields(&buf[..len]).unwrap();
        assert_eq!(tp.offset, 1);
        assert!(tp.more);
        assert_eq!(&buf[LONG_HEADER_SIZE..len], &payload[16..32]);

        // Pull mode bypasses the engine's transport.
        assert_eq!(engine.transport().frames.len(), 1);

        // Short destination buffers are rejected before any state change.
        engine.tx_confirmation(id).unwrap();
        let mut small = [0u8; 4];
        assert!(matches!(
            engine.trigger_transmit(id, &mut small),
            Err(TpError::FrameTooShort { .. })
        ));
        let len = engine.trigger_transmit(id, &mut buf).unwrap();
        assert_eq!(len, LONG_HEADER_SIZE + 8);
        assert!(!decode_tp_fields(&buf[..len]).unwrap().more);
    }

    #[test]
    fn test_failure_on_one_id_leaves_others_running() {
        let payload_a: Vec<u8> = (0..40u8).collect();
        let payload_b = vec![0x55u8; 8];
        let producer = Producer {
            // id 1 has no data behind it, so its first pull fails.
            streams: vec![(stream(&payload_a), 0), (Vec::new(), 0)],
            ..Producer::default()
        };

        let mut engine = SegmentationEngine::new(
            vec![test_config(), test_config()],
            producer,
            Transport::default(),
        )
        .unwrap();

        engine.transmit(TxSduId(0), &sdu(&[], &payload_a)).unwrap();

        let err = engine.transmit(TxSduId(1), &sdu(&[], &payload_b)).unwrap_err();
        assert_eq!(err, TpError::ProducerRejected(1));

        // Only the failed session rolled back.
        assert_eq!(engine.active_sessions(), 1);
        assert!(!engine.is_idle(TxSduId(0)).unwrap());
        assert!(engine.is_idle(TxSduId(1)).unwrap());

        // The surviving session still completes.
        drive_to_completion(&mut engine, TxSduId(0), 10);
        assert_eq!(engine.producer().completions, vec![(TxSduId(0), true)]);
    }
}
