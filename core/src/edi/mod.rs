//! EDI (Encoder Distribution Interface) stack: TAG items, AF framing, PFT
//! fragmentation, network transports, and the high-level frame encoder that
//! ties them together, ETSI TS 102 693.

pub mod af;
pub mod encoder;
pub mod pft;
pub mod tag;
pub mod transport;

pub use af::{AfError, AfPacket};
pub use encoder::EdiEncoder;
pub use pft::{PfFragment, PftConfig, PftFragmenter};
pub use tag::{assemble_tag_packet, TagDeti, TagEst, TagItem, TagStarPtr, TagTist};
pub use transport::{EdiTcpSink, EdiUdpSink};
