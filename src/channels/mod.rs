//! Inbound channels. The portal has one: the HTTP gateway.

pub mod web;
