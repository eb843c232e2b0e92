use core::result;
use std::io;
use thiserror::Error;

/// A helper type for wrapping a [result::Result] such that we can reduce noise in our signatures.
pub type Result<T> = result::Result<T, Error>;

/// An error representing a failure interacting with the readiness multiplexer.
///
/// [Error::Create] covers failure to allocate the kernel object itself; every other variant
/// covers a failed operation on a live multiplexer.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to create epoll instance: {0}")]
    Create(#[source] io::Error),
    #[error("failed to register file descriptor: {0}")]
    Register(#[source] io::Error),
    #[error("failed to deregister file descriptor: {0}")]
    Deregister(#[source] io::Error),
    #[error("token does not refer to a live registration")]
    NotRegistered,
    #[error("failed waiting for readiness events: {0}")]
    Wait(#[source] io::Error),
}
