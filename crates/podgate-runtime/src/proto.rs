//! Message types of rkt's `v1alpha.PublicAPI` gRPC service.
//!
//! Only the calls podgate issues are modelled. Field tags follow
//! `api/v1alpha/api.proto` in the rkt tree, so unknown fields sent by newer
//! api-service builds are skipped by prost.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct KeyValue {
    #[prost(string, tag = "1")]
    pub key: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub value: ::prost::alloc::string::String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ImageType {
    Undefined = 0,
    AppcAci = 1,
    Docker = 2,
    Oci = 3,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ImageFormat {
    #[prost(enumeration = "ImageType", tag = "1")]
    pub r#type: i32,
    #[prost(string, tag = "2")]
    pub version: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Image {
    #[prost(message, optional, tag = "1")]
    pub base_format: ::core::option::Option<ImageFormat>,
    #[prost(string, tag = "2")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub version: ::prost::alloc::string::String,
    #[prost(int64, tag = "5")]
    pub import_timestamp: i64,
    /// JSON encoded appc image manifest.
    #[prost(bytes = "vec", tag = "6")]
    pub manifest: ::prost::alloc::vec::Vec<u8>,
    #[prost(int64, tag = "7")]
    pub size: i64,
    #[prost(message, repeated, tag = "8")]
    pub annotations: ::prost::alloc::vec::Vec<KeyValue>,
    #[prost(message, repeated, tag = "9")]
    pub labels: ::prost::alloc::vec::Vec<KeyValue>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Network {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub ipv4: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub ipv6: ::prost::alloc::string::String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum AppState {
    Undefined = 0,
    Running = 1,
    Exited = 2,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct App {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub image: ::core::option::Option<Image>,
    #[prost(enumeration = "AppState", tag = "3")]
    pub state: i32,
    #[prost(sint32, tag = "4")]
    pub exit_code: i32,
    #[prost(message, repeated, tag = "5")]
    pub annotations: ::prost::alloc::vec::Vec<KeyValue>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum PodState {
    Undefined = 0,
    Embryo = 1,
    Preparing = 2,
    Prepared = 3,
    Running = 4,
    AbortedPrepare = 5,
    Exited = 6,
    Deleting = 7,
    Garbage = 8,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Pod {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(int32, tag = "2")]
    pub pid: i32,
    #[prost(enumeration = "PodState", tag = "3")]
    pub state: i32,
    #[prost(message, repeated, tag = "4")]
    pub apps: ::prost::alloc::vec::Vec<App>,
    #[prost(message, repeated, tag = "5")]
    pub networks: ::prost::alloc::vec::Vec<Network>,
    /// JSON encoded appc pod manifest.
    #[prost(bytes = "vec", tag = "6")]
    pub manifest: ::prost::alloc::vec::Vec<u8>,
    #[prost(message, repeated, tag = "7")]
    pub annotations: ::prost::alloc::vec::Vec<KeyValue>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PodFilter {
    #[prost(string, repeated, tag = "1")]
    pub ids: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(enumeration = "PodState", repeated, tag = "2")]
    pub states: ::prost::alloc::vec::Vec<i32>,
    #[prost(string, repeated, tag = "3")]
    pub app_names: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, repeated, tag = "4")]
    pub image_ids: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, repeated, tag = "5")]
    pub network_names: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(message, repeated, tag = "6")]
    pub annotations: ::prost::alloc::vec::Vec<KeyValue>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ImageFilter {
    #[prost(string, repeated, tag = "1")]
    pub ids: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, repeated, tag = "2")]
    pub prefixes: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, repeated, tag = "3")]
    pub base_names: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, repeated, tag = "4")]
    pub keywords: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(message, repeated, tag = "5")]
    pub labels: ::prost::alloc::vec::Vec<KeyValue>,
    #[prost(int64, tag = "6")]
    pub imported_after: i64,
    #[prost(int64, tag = "7")]
    pub imported_before: i64,
    #[prost(message, repeated, tag = "8")]
    pub annotations: ::prost::alloc::vec::Vec<KeyValue>,
    #[prost(string, repeated, tag = "9")]
    pub full_names: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListPodsRequest {
    #[prost(message, repeated, tag = "1")]
    pub filters: ::prost::alloc::vec::Vec<PodFilter>,
    #[prost(bool, tag = "2")]
    pub detail: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListPodsResponse {
    #[prost(message, repeated, tag = "1")]
    pub pods: ::prost::alloc::vec::Vec<Pod>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InspectPodRequest {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InspectPodResponse {
    #[prost(message, optional, tag = "1")]
    pub pod: ::core::option::Option<Pod>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListImagesRequest {
    #[prost(message, repeated, tag = "1")]
    pub filters: ::prost::alloc::vec::Vec<ImageFilter>,
    #[prost(bool, tag = "2")]
    pub detail: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListImagesResponse {
    #[prost(message, repeated, tag = "1")]
    pub images: ::prost::alloc::vec::Vec<Image>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InspectImageRequest {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InspectImageResponse {
    #[prost(message, optional, tag = "1")]
    pub image: ::core::option::Option<Image>,
}
