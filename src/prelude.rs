//! Common requirements for crate consumers

pub use crate::{Cc1101, Error};

pub use crate::base::{Base, Clock, SharedBus, SpiBase};
pub use crate::packet::TxOutcome;
pub use crate::device::{CcMode, Config, Cc1101Channel, ModFormat, PacketInfo, RadioMode};
pub use crate::device::calibration::Band;
pub use crate::transceiver::{
    EventSink, ModuleId, Modulation, RadioSignalSample, ScanBand, ScanFlag, Transceiver,
};
