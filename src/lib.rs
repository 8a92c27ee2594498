//! NanoServe - single-connection HTTP/1.1 responder for tests
//!
//! This crate opens a listening socket, accepts exactly one connection, hands
//! it to a caller-supplied handler and closes it again. The `http` layer
//! builds on top of that to parse one request and answer it with a fixed
//! `200 OK` response assembled by a callback.

pub mod http;
pub mod net;
