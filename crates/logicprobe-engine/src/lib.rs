pub mod buffer;
pub mod controller;
pub mod producer;
pub mod session;
pub mod source;
pub mod transmitter;
pub mod transport;
pub mod wire;

// Public API
pub use buffer::{BufferGeometry, CaptureBuffers, HalfBuffer, HalfIndex};
pub use controller::AcquisitionController;
pub use producer::{CaptureThread, HandoffOutcome, SampleProducer};
pub use session::Session;
pub use source::{PatternSource, SampleSource};
pub use transmitter::{SampleTransmitter, TransmitWorker};
pub use transport::{MemoryTransport, Transport};
