//! Wire messages for `modelrpc.demo.AccountService`
//!
//! ```proto
//! message Account {
//!   int64 id = 1;
//!   optional string username = 2;
//!   optional string email = 3;
//!   optional bool is_active = 4;
//!   repeated string groups = 5;
//! }
//! message AccountListRequest {
//!   optional string username = 1;
//!   optional bool is_active = 2;
//!   optional string ordering = 3;
//! }
//! message AccountLookupRequest {
//!   int64 id = 1;
//!   optional string username = 2;
//! }
//! message AccountPartialUpdateRequest {
//!   int64 id = 1;
//!   optional string username = 2;
//!   optional string email = 3;
//!   optional bool is_active = 4;
//!   repeated string groups = 5;
//!   repeated string _partial_update_fields = 6;
//! }
//! ```

use serde::{Deserialize, Serialize};

pub use crate::protobuf::Empty;

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Account {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(string, optional, tag = "2")]
    pub username: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub email: Option<String>,
    #[prost(bool, optional, tag = "4")]
    pub is_active: Option<bool>,
    // Empty repeated fields are indistinguishable from unset ones on the wire.
    #[prost(string, repeated, tag = "5")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountListRequest {
    /// Case-insensitive substring match
    #[prost(string, optional, tag = "1")]
    pub username: Option<String>,
    #[prost(bool, optional, tag = "2")]
    pub is_active: Option<bool>,
    /// `field` or `-field`
    #[prost(string, optional, tag = "3")]
    pub ordering: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountLookupRequest {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(string, optional, tag = "2")]
    pub username: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountPartialUpdateRequest {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(string, optional, tag = "2")]
    pub username: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub email: Option<String>,
    #[prost(bool, optional, tag = "4")]
    pub is_active: Option<bool>,
    #[prost(string, repeated, tag = "5")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[prost(string, repeated, tag = "6")]
    #[serde(
        rename = "_partial_update_fields",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub partial_update_fields: Vec<String>,
}
