//! Driving adapters

pub mod grpc;
