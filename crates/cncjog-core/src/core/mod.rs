//! Core abstractions: connection events and the jog listener interface

pub mod event;
pub mod listener;
