//! Crate-local prelude. `use crate::prelude::*;` pulls in the error type and
//! the tracing macros used throughout collabfs.

pub use crate::error::{ClResult, Error};
pub use tracing::{debug, error, info, trace, warn};

// vim: ts=4
