//! # Workflows Module
//!
//! Public entry points that tie the [`crate::core`] models and the
//! [`crate::engine`] search together.
//!
//! - **Design Workflow** ([`design`]) - Validates a request, seeds a construct, anneals it
//!   and reports exactly one terminal event
//! - **Design Jobs** ([`job`]) - Runs the design workflow on a dedicated worker thread with
//!   its own identifier and cancellation handle

pub mod design;
pub mod job;
