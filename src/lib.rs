//! This crate routes the operations of a database client to the servers of a deployment, with
//! support for multi-document transactions on sharded clusters.
//!
//! A sharded cluster is reached through several interchangeable routers, and any of them can run
//! a non-transactional operation. A transaction is different: its state lives on the router that
//! received its first operation, so every later operation of the transaction, including the
//! final commit or abort, has to go to that same router. [`ClientSession`] tracks the router a
//! transaction is pinned to and the [`Client`] honors it when dispatching.
//!
//! The crate does not speak the wire protocol or monitor the deployment itself. A topology
//! monitor publishes [`TopologyDescription`](sdam::TopologyDescription)s through a
//! [`Topology`](sdam::Topology), and commands are sent through a user-provided
//! [`CommandExecutor`].
//!
//! # Example Usage
//!
//! ```no_run
//! # use shard_session::{
//! #     bson::{doc, Document},
//! #     options::ServerAddress,
//! #     sdam::{ServerDescription, ServerType, Topology, TopologyDescription, TopologyType},
//! #     Client,
//! #     CommandExecutor,
//! # };
//! # async fn foo(executor: impl CommandExecutor) -> shard_session::error::Result<()> {
//! let topology = Topology::new(
//!     TopologyDescription::new(TopologyType::Sharded)
//!         .with_server(ServerDescription::new(
//!             ServerAddress::parse("router1:27017")?,
//!             ServerType::Mongos,
//!         ))
//!         .with_server(ServerDescription::new(
//!             ServerAddress::parse("router2:27017")?,
//!             ServerType::Mongos,
//!         )),
//! );
//! let client = Client::with_uri_str(
//!     "mongodb://router1:27017,router2:27017/",
//!     topology.watch(),
//!     executor,
//! )?;
//!
//! let coll = client.database("mydb").collection::<Document>("books");
//!
//! let mut session = client.start_session(None);
//! session.start_transaction(None)?;
//! coll.insert_one_with_session(doc! { "title": "1984" }, &mut session).await?;
//! coll.count_documents_with_session(doc! {}, &mut session).await?;
//! session.commit_transaction().await?;
//! # Ok(()) }
//! ```
//!
//! ## Using the sync API
//! A blocking API is available in the [`sync`] module behind the `"sync"` feature flag.

#![warn(missing_docs)]

pub use ::bson;
pub use futures_core::future::BoxFuture;

mod client;
mod coll;
mod command;
mod db;
pub mod error;
pub mod event;
mod operation;
pub mod options;
pub mod results;
pub mod sdam;
mod selection_criteria;
#[cfg(feature = "sync")]
pub mod sync;
mod trace;

pub use crate::{
    client::{session::ClientSession, session::TransactionState, Client},
    coll::{Collection, Namespace},
    command::{Command, CommandExecutor},
    db::Database,
};
