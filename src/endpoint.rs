//! Combined TP endpoint: one segmentation and one reassembly engine
//! behind a single facade, sharing a scheduler tick.

use crate::config::{RxChannelConfig, TxChannelConfig};
use crate::error::Result;
use crate::layer::{FrameTransport, RxSduId, SegmentConsumer, SegmentProducer, TxSduId};
use crate::rx::ReassemblyEngine;
use crate::tx::SegmentationEngine;

/// Bidirectional TP endpoint.
///
/// Bundles the outbound [`SegmentationEngine`] and the inbound
/// [`ReassemblyEngine`] for deployments that run both directions off the
/// same scheduler. Each direction keeps its own collaborators and id
/// space; the facade only forwards.
#[derive(Debug)]
pub struct TpEndpoint<P, C, T> {
    tx: SegmentationEngine<P, T>,
    rx: ReassemblyEngine<C>,
}

impl<P, C, T> TpEndpoint<P, C, T>
where
    P: SegmentProducer,
    C: SegmentConsumer,
    T: FrameTransport,
{
    /// Create an endpoint from per-direction configurations.
    pub fn new(
        tx_configs: Vec<TxChannelConfig>,
        rx_configs: Vec<RxChannelConfig>,
        producer: P,
        consumer: C,
        transport: T,
    ) -> Result<Self> {
        Ok(Self {
            tx: SegmentationEngine::new(tx_configs, producer, transport)?,
            rx: ReassemblyEngine::new(rx_configs, consumer)?,
        })
    }

    /// Start transmitting one outbound SDU. See
    /// [`SegmentationEngine::transmit`].
    pub fn transmit(&mut self, id: TxSduId, sdu: &[u8]) -> Result<()> {
        self.tx.transmit(id, sdu)
    }

    /// Transmit confirmation from the transport. See
    /// [`SegmentationEngine::tx_confirmation`].
    pub fn tx_confirmation(&mut self, id: TxSduId) -> Result<()> {
        self.tx.tx_confirmation(id)
    }

    /// Pull-mode segment build. See
    /// [`SegmentationEngine::trigger_transmit`].
    pub fn trigger_transmit(&mut self, id: TxSduId, frame: &mut [u8]) -> Result<usize> {
        self.tx.trigger_transmit(id, frame)
    }

    /// One inbound frame from the transport. See
    /// [`ReassemblyEngine::rx_indication`].
    pub fn rx_indication(&mut self, id: RxSduId, frame: &[u8]) -> Result<()> {
        self.rx.rx_indication(id, frame)
    }

    /// One scheduler tick for both directions.
    pub fn tick(&mut self) {
        self.tx.poll();
        self.rx.poll();
    }

    /// The outbound engine.
    pub fn tx(&self) -> &SegmentationEngine<P, T> {
        &self.tx
    }

    /// Mutable access to the outbound engine.
    pub fn tx_mut(&mut self) -> &mut SegmentationEngine<P, T> {
        &mut self.tx
    }

    /// The inbound engine.
    pub fn rx(&self) -> &ReassemblyEngine<C> {
        &self.rx
    }

    /// Mutable access to the inbound engine.
    pub fn rx_mut(&mut self) -> &mut ReassemblyEngine<C> {
        &mut self.rx
    }
}
