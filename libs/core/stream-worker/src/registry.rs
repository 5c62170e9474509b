//! Stream definitions.
//!
//! This module provides:
//! - `StreamDef` trait for domain-specific topic definitions
//! - `MessageField` enum for the field names stored in each stream entry

use strum::{AsRefStr, Display, EnumString};

/// Field names used in stream entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Display, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum MessageField {
    /// The partition key the producer supplied.
    Key,
    /// The encoded job bytes.
    Payload,
}

/// Topic definition trait.
///
/// Producer and consumer processes share one implementation so that both sides
/// agree on the topic name and the partition count.
///
/// # Example
///
/// ```rust,ignore
/// use stream_worker::StreamDef;
///
/// pub struct EmailStream;
///
/// impl StreamDef for EmailStream {
///     const STREAM_NAME: &'static str = "general-email";
///     const CONSUMER_GROUP: &'static str = "email_workers";
/// }
/// ```
pub trait StreamDef: Send + Sync {
    /// Topic name; partition `p` is stored in stream `"{STREAM_NAME}:{p}"`.
    const STREAM_NAME: &'static str;

    /// Consumer group shared by all delivery workers.
    const CONSUMER_GROUP: &'static str;

    /// Number of partitions. Changing it remaps keys, so it is fixed per deployment.
    const PARTITIONS: u32 = 8;

    /// Maximum length of each partition stream before auto-trim (MAXLEN ~).
    const MAX_LENGTH: i64 = 100_000;
}
