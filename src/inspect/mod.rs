//! Capture inspection.
//!
//! Reads the per-exchange JSON files back and derives what operators look
//! for: the prompt conversation, the assistant's reconstructed answer and
//! generation statistics. Used by the `interceptor-logs` binary.

pub mod load;
pub mod summary;

pub use load::{find_exchange, load_exchanges, ChatMessage, InspectError, LoggedExchange};
pub use summary::{reconstruct_response, GenerationStats};
