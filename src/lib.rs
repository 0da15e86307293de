//! Translator Mini: a bilingual (English/Vietnamese) voice and text
//! translator with an AI assistant.
//!
//! Every mode sequences three services: speech recognition
//! ([`speech::SpeechInput`]), a translation or chat provider
//! ([`chat::ChatBackend`]) and speech synthesis ([`speech::SpeechOutput`]).
//! The [`session`] module owns the turn loop and the bounded history.

pub mod app;
pub mod chat;
pub mod cli;
pub mod config;
pub mod language;
pub mod session;
pub mod speech;
