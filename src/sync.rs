//! Contains the sync API. This is only available when the `sync` feature is enabled.

mod client;
mod coll;
mod db;


use std::{future::Future, sync::LazyLock};

pub use client::{session::ClientSession, Client};
pub use coll::Collection;
pub use db::Database;

pub(crate) static TOKIO_RUNTIME: LazyLock<tokio::runtime::Runtime> =
    LazyLock::new(|| match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => panic!(
            "Error occurred when starting the underlying async runtime: {}",
            err
        ),
    });

/// Runs `fut` to completion on the runtime backing the sync API.
pub(crate) fn block_on<F: Future>(fut: F) -> F::Output {
    TOKIO_RUNTIME.block_on(fut)
}
