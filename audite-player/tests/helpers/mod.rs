//! Shared helpers for audite-player integration tests

#![allow(dead_code)]

pub mod audio_generator;
