mod executor;
pub mod options;
pub mod session;

use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use crate::{
    command::CommandExecutor,
    db::Database,
    error::{Error, ErrorKind, Result},
    event::command::CommandEvent,
    options::{ClientOptions, ServerAddress, SessionOptions},
    sdam::{select_server, TopologyWatcher},
    selection_criteria::SelectionCriteria,
    trace::{
        command::CommandTracingEventEmitter,
        server_selection::ServerSelectionTracingEventEmitter,
        COMMAND_TRACING_EVENT_TARGET,
    },
    ClientSession,
};

use session::OperationRequest;

const DEFAULT_SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// This is the main entry point for the API. A `Client` routes operations to the servers of a
/// deployment, using the most recent [`TopologyDescription`](crate::sdam::TopologyDescription)
/// published by a topology monitor and sending commands through a [`CommandExecutor`].
///
/// `Client` uses [`std::sync::Arc`](https://doc.rust-lang.org/std/sync/struct.Arc.html) internally,
/// so it can safely be shared across threads or async tasks. For example:
///
/// ```rust
/// # use shard_session::{bson::Document, Client, error::Result};
/// # async fn start_workers(client: Client) -> Result<()> {
/// for i in 0..5 {
///     let client_ref = client.clone();
///
///     tokio::task::spawn(async move {
///         let collection = client_ref.database("items").collection::<Document>(&format!("coll{}", i));
///
///         // Do something with the collection
///     });
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    options: ClientOptions,
    topology: TopologyWatcher,
    executor: Box<dyn CommandExecutor>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("options", &self.inner.options)
            .field("topology", &self.inner.topology)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a new `Client` with the given options. Routing decisions are made against the
    /// descriptions published to `topology`, and commands are sent through `executor`.
    pub fn with_options(
        options: ClientOptions,
        topology: TopologyWatcher,
        executor: impl CommandExecutor,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                options,
                topology,
                executor: Box::new(executor),
            }),
        }
    }

    /// Creates a new `Client` configured by the connection string `uri`. See
    /// [`ClientOptions::parse`] for the supported options.
    ///
    /// Fails if `topology` already describes servers and none of them is a host of `uri`.
    pub fn with_uri_str(
        uri: impl AsRef<str>,
        topology: TopologyWatcher,
        executor: impl CommandExecutor,
    ) -> Result<Self> {
        let options = ClientOptions::parse(uri)?;

        let published = topology.peek_latest();
        if published.servers().next().is_some()
            && !options
                .hosts
                .iter()
                .any(|host| published.server(host).is_some())
        {
            return Err(Error::invalid_argument(format!(
                "none of the connection string hosts are part of the topology {}",
                published
            )));
        }

        Ok(Self::with_options(options, topology, executor))
    }

    /// Gets a handle to a database specified by `name` in the deployment the `Client` routes to.
    ///
    /// This method does not send or receive anything across the wire to the database, so it can
    /// be used repeatedly without incurring any costs from I/O.
    pub fn database(&self, name: &str) -> Database {
        Database::new(self.clone(), name)
    }

    /// Starts a new [`ClientSession`].
    pub fn start_session(&self, options: impl Into<Option<SessionOptions>>) -> ClientSession {
        ClientSession::new(self.clone(), options.into())
    }

    /// Gets the default selection criteria the `Client` uses for operations.
    pub fn selection_criteria(&self) -> Option<&SelectionCriteria> {
        self.inner.options.selection_criteria.as_ref()
    }

    /// The options this `Client` was created with.
    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    pub(crate) fn same_client(&self, other: &Client) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn emit_command_event(&self, generate_event: impl FnOnce() -> CommandEvent) {
        let tracing_emitter =
            if tracing::enabled!(target: COMMAND_TRACING_EVENT_TARGET, tracing::Level::DEBUG) {
                Some(CommandTracingEventEmitter::new(
                    self.inner.options.tracing_max_document_length_bytes,
                ))
            } else {
                None
            };
        let event_handler = self.inner.options.command_event_handler.as_ref();
        if !(tracing_emitter.is_some() || event_handler.is_some()) {
            return;
        }

        let event = generate_event();
        match (event_handler, tracing_emitter) {
            (Some(event_handler), Some(tracing_emitter)) => {
                event_handler.handle(event.clone());
                tracing_emitter.handle(event);
            }
            (Some(event_handler), None) => event_handler.handle(event),
            (None, Some(tracing_emitter)) => tracing_emitter.handle(event),
            (None, None) => {}
        }
    }

    /// Picks the server `request` goes to, waiting for the topology to change while nothing
    /// suitable is known. Routing through a session honors and maintains its router pin.
    async fn resolve_target(
        &self,
        mut session: Option<&mut ClientSession>,
        request: &OperationRequest,
        criteria: &SelectionCriteria,
        operation_name: &str,
    ) -> Result<ServerAddress> {
        if let Some(address) = session
            .as_deref()
            .and_then(|session| session.pinned_target(request))
        {
            return Ok(address.clone());
        }

        let local_threshold = self.inner.options.local_threshold;
        let start_time = Instant::now();
        let timeout = self
            .inner
            .options
            .server_selection_timeout
            .unwrap_or(DEFAULT_SERVER_SELECTION_TIMEOUT);
        let emitter =
            ServerSelectionTracingEventEmitter::new(criteria, operation_name, start_time, timeout);

        let mut watcher = self.inner.topology.clone();
        let mut state = watcher.observe_latest();
        emitter.emit_started_event(&state);

        // We only want to emit this message once per operation at most.
        let mut emitted_waiting_message = false;

        loop {
            let result = match session.as_deref_mut() {
                Some(session) => {
                    session.resolve_target(request, &state, criteria, local_threshold)
                }
                None => select_server(&state, criteria, local_threshold),
            };

            match result {
                Ok(address) => {
                    emitter.emit_succeeded_event(&state, &address);
                    return Ok(address);
                }
                Err(error) if error.is_server_selection_error() => {
                    if !emitted_waiting_message {
                        emitter.emit_waiting_event(&state);
                        emitted_waiting_message = true;
                    }

                    let change_occurred = start_time.elapsed() < timeout
                        && watcher
                            .wait_for_update(timeout.saturating_sub(start_time.elapsed()))
                            .await;
                    if !change_occurred {
                        let error: Error = ErrorKind::ServerSelection {
                            message: state.server_selection_timeout_error_message(criteria),
                        }
                        .into();
                        emitter.emit_failed_event(&state, &error);
                        return Err(error);
                    }
                    state = watcher.observe_latest();
                }
                Err(error) => {
                    emitter.emit_failed_event(&state, &error);
                    return Err(error);
                }
            }
        }
    }
}
