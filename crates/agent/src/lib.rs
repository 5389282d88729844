//! The completion loop and layer composer for yugent.
//!
//! A round runs like this:
//!
//! 1. **Compose**: [`Llm`] checks there is exactly one model layer, hands the
//!    latest message to the log layers, and gathers the tool layers
//! 2. **Request**: [`ModelLayer`] sends the whole conversation plus the tool
//!    definitions, streamed or not
//! 3. **If tool calls**: invoke the requested tool, append the result, and
//!    request again
//! 4. **Otherwise**: append the assistant message and return it
//!
//! The loop stops when the model answers without tool calls, when the tool
//! round limit is hit, or on the first error.

pub mod composer;
pub mod local_log;
pub mod model;
pub mod options;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use composer::{Layer, Llm};
pub use local_log::LocalLog;
pub use model::ModelLayer;
pub use options::{DEFAULT_MAX_TOOL_ROUNDS, ExecuteOptions};
