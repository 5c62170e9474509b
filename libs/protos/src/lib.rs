//! Checked-in protobuf and gRPC code generated from `proto/`.
//!
//! The prost files already include!() their tonic counterparts.

pub mod notifications {
    pub mod v1 {
        include!("generated/notifications/v1/notifications.v1.rs");
    }
}
