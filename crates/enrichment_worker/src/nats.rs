mod messages;
mod metadata_request_producer;
mod metadata_response_processor;
mod processed_event_producer;
mod raw_telemetry_processor;

pub use messages::*;
pub use metadata_request_producer::*;
pub use metadata_response_processor::*;
pub use processed_event_producer::*;
pub use raw_telemetry_processor::*;
