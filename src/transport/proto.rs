//! gNMI wire messages and client stub generated from `proto/gnmi.proto`.

#![allow(clippy::enum_variant_names)]

tonic::include_proto!("gnmi");
