// @generated
// This file is @generated by prost-build.
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct SendActivationEmailRequest {
    #[prost(string, tag = "1")]
    pub recipient: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub user_id: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub token: ::prost::alloc::string::String,
}
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct SendActivationEmailResponse {
    /// Queue entry id of the durable write
    #[prost(string, tag = "1")]
    pub message_id: ::prost::alloc::string::String,
}
include!("notifications.v1.tonic.rs");
// @@protoc_insertion_point(module)
