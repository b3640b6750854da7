//! End-to-end tests of the bridge against an in-process fake native library

mod harness;

mod handshake;
mod lifecycle;
mod reflection;
