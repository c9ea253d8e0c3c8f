//! Static per-id channel configuration.
//!
//! Every outbound and inbound SDU id gets one configuration record, fixed
//! for the lifetime of the engine. Timeouts and separation times are
//! counted in scheduler ticks (one `poll` call each).

use crate::error::{Result, TpError};
use crate::header::SEGMENT_UNIT;

/// Default maximum segment payload size.
///
/// MTU (1500) - IP header (20) - UDP header (8) - short header (8)
/// - TP header (4) = 1460, rounded down to 1456 for alignment to
/// 16-byte boundaries.
pub const DEFAULT_MAX_SEGMENT_PAYLOAD: usize = 1456;

/// Default confirmation / inactivity timeout in scheduler ticks.
pub const DEFAULT_TIMEOUT_TICKS: u32 = 100;

/// Configuration of one outbound SDU id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxChannelConfig {
    /// Largest segment payload carried by one frame; multiple of 16.
    pub max_segment_payload: usize,
    /// Fixed trailing metadata length per frame (may be 0).
    pub metadata_len: usize,
    /// Ticks to wait for a transmit confirmation before aborting.
    pub confirmation_timeout: u32,
    /// Ticks between bursts of segments.
    pub separation_time: u32,
    /// Segments sent back-to-back per burst.
    pub burst_size: u32,
}

impl TxChannelConfig {
    /// Create a configuration with the given frame capacity and defaults
    /// for the timing parameters.
    pub fn new(max_segment_payload: usize) -> Self {
        Self {
            max_segment_payload,
            metadata_len: 0,
            confirmation_timeout: DEFAULT_TIMEOUT_TICKS,
            separation_time: 0,
            burst_size: 1,
        }
    }

    /// Check the configuration for internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.max_segment_payload == 0 {
            return Err(TpError::invalid_config("max_segment_payload must be nonzero"));
        }
        if self.max_segment_payload % SEGMENT_UNIT != 0 {
            return Err(TpError::invalid_config(format!(
                "max_segment_payload {} is not a multiple of {SEGMENT_UNIT}",
                self.max_segment_payload
            )));
        }
        if self.confirmation_timeout == 0 {
            return Err(TpError::invalid_config("confirmation_timeout must be nonzero"));
        }
        if self.burst_size == 0 {
            return Err(TpError::invalid_config("burst_size must be nonzero"));
        }
        Ok(())
    }
}

impl Default for TxChannelConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SEGMENT_PAYLOAD)
    }
}

/// Configuration of one inbound SDU id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RxChannelConfig {
    /// Fixed trailing metadata length per frame (may be 0).
    pub metadata_len: usize,
    /// Ticks without a segment before an in-progress reassembly aborts.
    pub inactivity_timeout: u32,
}

impl RxChannelConfig {
    /// Create a configuration with the default inactivity timeout.
    pub fn new() -> Self {
        Self {
            metadata_len: 0,
            inactivity_timeout: DEFAULT_TIMEOUT_TICKS,
        }
    }

    /// Check the configuration for internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.inactivity_timeout == 0 {
            return Err(TpError::invalid_config("inactivity_timeout must be nonzero"));
        }
        Ok(())
    }
}

impl Default for RxChannelConfig {
    fn default() -> Self {
        Self::new()
    }
}
