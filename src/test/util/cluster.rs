use std::{
    collections::HashMap,
    io,
    sync::{Arc, Mutex},
};

use futures::FutureExt;

use crate::{
    bson::{doc, Binary, Bson, Document},
    command::{Command, CommandExecutor},
    error::{Result, TRANSIENT_TRANSACTION_ERROR},
    options::ServerAddress,
    BoxFuture,
};

const NO_SUCH_TRANSACTION: i32 = 251;
const CURSOR_NOT_FOUND: i32 = 43;

/// An in-memory sharded cluster. Every router shares the same data, but transactions and cursors
/// only exist on the router that created them, the way real routers behave.
#[derive(Clone, Debug, Default)]
pub(crate) struct MockCluster {
    state: Arc<Mutex<ClusterState>>,
}

#[derive(Debug, Default)]
struct ClusterState {
    routers: HashMap<ServerAddress, Router>,
    data: HashMap<String, Vec<Document>>,
    fail_points: Vec<FailPoint>,
    next_cursor_id: i64,
}

#[derive(Debug, Default)]
struct Router {
    transactions: HashMap<TxnKey, RouterTransaction>,
    cursors: HashMap<i64, Vec<Document>>,
}

/// A transaction is identified by the session id bytes and the transaction number.
type TxnKey = (Vec<u8>, i64);

#[derive(Debug, Default)]
struct RouterTransaction {
    pending: Vec<PendingWrite>,
    committed: bool,
}

#[derive(Debug)]
enum PendingWrite {
    Insert { ns: String, doc: Document },
    Delete { ns: String, filter: Document },
}

/// Makes the next `times` matching commands fail.
#[derive(Clone, Debug)]
pub(crate) struct FailPoint {
    command_name: String,
    address: Option<ServerAddress>,
    times: usize,
    failure: Failure,
}

#[derive(Clone, Debug)]
enum Failure {
    Command { code: i32, labels: Vec<String> },
    Network,
}

impl FailPoint {
    /// Fails `command_name` with a server error carrying `code`.
    pub(crate) fn command_error(command_name: &str, code: i32) -> Self {
        Self {
            command_name: command_name.to_string(),
            address: None,
            times: 1,
            failure: Failure::Command {
                code,
                labels: Vec::new(),
            },
        }
    }

    /// Fails `command_name` as if the connection to the router was lost.
    pub(crate) fn network_error(command_name: &str) -> Self {
        Self {
            command_name: command_name.to_string(),
            address: None,
            times: 1,
            failure: Failure::Network,
        }
    }

    pub(crate) fn with_label(mut self, label: &str) -> Self {
        if let Failure::Command { ref mut labels, .. } = self.failure {
            labels.push(label.to_string());
        }
        self
    }

    /// Only fail commands sent to `address`.
    pub(crate) fn on(mut self, address: &ServerAddress) -> Self {
        self.address = Some(address.clone());
        self
    }

    pub(crate) fn times(mut self, times: usize) -> Self {
        self.times = times;
        self
    }

    fn matches(&self, address: &ServerAddress, command_name: &str) -> bool {
        self.times > 0
            && self.command_name == command_name
            && self.address.as_ref().map_or(true, |a| a == address)
    }
}

impl MockCluster {
    pub(crate) fn new(routers: impl IntoIterator<Item = ServerAddress>) -> Self {
        let cluster = Self::default();
        {
            let mut state = cluster.state.lock().unwrap();
            for address in routers {
                state.routers.insert(address, Router::default());
            }
        }
        cluster
    }

    /// Makes `address` unreachable. Its transactions and cursors are lost.
    pub(crate) fn shut_down(&self, address: &ServerAddress) {
        self.state.lock().unwrap().routers.remove(address);
    }

    /// Brings a fresh router up at `address`.
    pub(crate) fn start(&self, address: &ServerAddress) {
        self.state
            .lock()
            .unwrap()
            .routers
            .insert(address.clone(), Router::default());
    }

    pub(crate) fn fail_command(&self, fail_point: FailPoint) {
        self.state.lock().unwrap().fail_points.push(fail_point);
    }

    /// The committed documents of namespace `ns`.
    pub(crate) fn documents(&self, ns: &str) -> Vec<Document> {
        self.state
            .lock()
            .unwrap()
            .data
            .get(ns)
            .cloned()
            .unwrap_or_default()
    }

    /// The number of uncommitted transactions `address` knows about.
    pub(crate) fn open_transactions(&self, address: &ServerAddress) -> usize {
        self.state
            .lock()
            .unwrap()
            .routers
            .get(address)
            .map(|router| {
                router
                    .transactions
                    .values()
                    .filter(|txn| !txn.committed)
                    .count()
            })
            .unwrap_or(0)
    }

    fn handle(&self, address: &ServerAddress, command: Command) -> Result<Document> {
        let mut state = self.state.lock().unwrap();

        if !state.routers.contains_key(address) {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("{} is unreachable", address),
            )
            .into());
        }

        if let Some(fail_point) = state
            .fail_points
            .iter_mut()
            .find(|fp| fp.matches(address, &command.name))
        {
            fail_point.times -= 1;
            return match fail_point.failure.clone() {
                Failure::Network => Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "connection reset by fail point",
                )
                .into()),
                Failure::Command { code, labels } => Ok(error_reply(code, "FailPoint", labels)),
            };
        }

        let ClusterState {
            routers,
            data,
            next_cursor_id,
            ..
        } = &mut *state;
        let Some(Router {
            transactions,
            cursors,
        }) = routers.get_mut(address)
        else {
            return Ok(error_reply(6, "HostUnreachable", Vec::new()));
        };

        let Some(key) = txn_key(&command.body) else {
            let mut ctx = Context {
                data,
                pending: None,
                cursors,
                next_cursor_id,
            };
            return Ok(ctx.run(&command));
        };

        if command.body.get_bool("startTransaction") == Ok(true) {
            transactions.insert(key.clone(), RouterTransaction::default());
        }
        let Some(txn) = transactions.get_mut(&key) else {
            return Ok(no_such_transaction());
        };

        match command.name.as_str() {
            "commitTransaction" => {
                if !txn.committed {
                    apply(data, txn.pending.drain(..));
                    txn.committed = true;
                }
                Ok(doc! { "ok": 1 })
            }
            "abortTransaction" => {
                if txn.committed {
                    return Ok(error_reply(
                        256,
                        "TransactionCommitted",
                        Vec::new(),
                    ));
                }
                transactions.remove(&key);
                Ok(doc! { "ok": 1 })
            }
            _ if txn.committed => Ok(no_such_transaction()),
            _ => {
                let mut ctx = Context {
                    data,
                    pending: Some(&mut txn.pending),
                    cursors,
                    next_cursor_id,
                };
                Ok(ctx.run(&command))
            }
        }
    }
}

impl CommandExecutor for MockCluster {
    fn execute<'a>(
        &'a self,
        address: &'a ServerAddress,
        command: Command,
    ) -> BoxFuture<'a, Result<Document>> {
        async move {
            tokio::task::yield_now().await;
            self.handle(address, command)
        }
        .boxed()
    }
}

/// What a single command runs against: the shared data, plus the pending writes of the
/// transaction it belongs to.
struct Context<'a> {
    data: &'a mut HashMap<String, Vec<Document>>,
    pending: Option<&'a mut Vec<PendingWrite>>,
    cursors: &'a mut HashMap<i64, Vec<Document>>,
    next_cursor_id: &'a mut i64,
}

impl Context<'_> {
    fn run(&mut self, command: &Command) -> Document {
        let body = &command.body;
        let ns = |coll: &str| format!("{}.{}", command.target_db, coll);

        match command.name.as_str() {
            "insert" => {
                let ns = ns(body.get_str("insert").unwrap_or_default());
                let docs: Vec<Document> = body
                    .get_array("documents")
                    .map(|docs| {
                        docs.iter()
                            .filter_map(|doc| doc.as_document().cloned())
                            .collect()
                    })
                    .unwrap_or_default();
                let n = docs.len() as i64;
                let writes = docs.into_iter().map(|doc| PendingWrite::Insert {
                    ns: ns.clone(),
                    doc,
                });
                self.write(writes);
                doc! { "ok": 1, "n": n }
            }
            "delete" => {
                let ns = ns(body.get_str("delete").unwrap_or_default());
                let filter = body
                    .get_array("deletes")
                    .ok()
                    .and_then(|deletes| deletes.first())
                    .and_then(|delete| delete.as_document())
                    .and_then(|delete| delete.get_document("q").ok())
                    .cloned()
                    .unwrap_or_default();
                let n = self.view(&ns, &filter).len() as i64;
                self.write(std::iter::once(PendingWrite::Delete { ns, filter }));
                doc! { "ok": 1, "n": n }
            }
            "count" => {
                let ns = ns(body.get_str("count").unwrap_or_default());
                let filter = body.get_document("query").cloned().unwrap_or_default();
                let n = self.view(&ns, &filter).len() as i64;
                doc! { "ok": 1, "n": n }
            }
            "find" => {
                let ns = ns(body.get_str("find").unwrap_or_default());
                let filter = body.get_document("filter").cloned().unwrap_or_default();
                let mut docs = self.view(&ns, &filter);
                match body.get_i64("limit") {
                    Ok(limit) if limit > 0 => docs.truncate(limit as usize),
                    _ => {}
                }
                let single_batch = body.get_bool("singleBatch").unwrap_or(false);
                let batch_size = body.get_i32("batchSize").ok().map(|size| size as usize);
                let (batch, id) = match batch_size {
                    Some(size) if !single_batch && size < docs.len() => {
                        let rest = docs.split_off(size);
                        (docs, self.open_cursor(rest))
                    }
                    _ => (docs, 0),
                };
                doc! { "ok": 1, "cursor": { "id": id, "ns": ns, "firstBatch": batch } }
            }
            "getMore" => {
                let id = body.get_i64("getMore").unwrap_or_default();
                let ns = ns(body.get_str("collection").unwrap_or_default());
                let Some(mut docs) = self.cursors.remove(&id) else {
                    return error_reply(CURSOR_NOT_FOUND, "CursorNotFound", Vec::new());
                };
                let batch_size = body.get_i32("batchSize").ok().map(|size| size as usize);
                let (batch, id) = match batch_size {
                    Some(size) if size < docs.len() => {
                        let rest = docs.split_off(size);
                        self.cursors.insert(id, rest);
                        (docs, id)
                    }
                    _ => (docs, 0),
                };
                doc! { "ok": 1, "cursor": { "id": id, "ns": ns, "nextBatch": batch } }
            }
            _ => doc! { "ok": 1 },
        }
    }

    fn write(&mut self, writes: impl Iterator<Item = PendingWrite>) {
        match self.pending {
            Some(ref mut pending) => pending.extend(writes),
            None => apply(self.data, writes),
        }
    }

    /// The documents of `ns` matching `filter`, as seen by this command.
    fn view(&self, ns: &str, filter: &Document) -> Vec<Document> {
        let mut data = HashMap::new();
        data.insert(
            ns.to_string(),
            self.data.get(ns).cloned().unwrap_or_default(),
        );
        if let Some(ref pending) = self.pending {
            apply(&mut data, pending.iter().map(PendingWrite::clone_write));
        }
        data.remove(ns)
            .unwrap_or_default()
            .into_iter()
            .filter(|doc| matches_filter(doc, filter))
            .collect()
    }

    fn open_cursor(&mut self, docs: Vec<Document>) -> i64 {
        *self.next_cursor_id += 1;
        let id = *self.next_cursor_id;
        self.cursors.insert(id, docs);
        id
    }
}

impl PendingWrite {
    fn clone_write(&self) -> Self {
        match self {
            Self::Insert { ns, doc } => Self::Insert {
                ns: ns.clone(),
                doc: doc.clone(),
            },
            Self::Delete { ns, filter } => Self::Delete {
                ns: ns.clone(),
                filter: filter.clone(),
            },
        }
    }
}

fn apply(data: &mut HashMap<String, Vec<Document>>, writes: impl Iterator<Item = PendingWrite>) {
    for write in writes {
        match write {
            PendingWrite::Insert { ns, doc } => data.entry(ns).or_default().push(doc),
            PendingWrite::Delete { ns, filter } => {
                if let Some(docs) = data.get_mut(&ns) {
                    docs.retain(|doc| !matches_filter(doc, &filter));
                }
            }
        }
    }
}

/// Equality matching on top-level fields.
fn matches_filter(doc: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(key, value)| doc.get(key) == Some(value))
}

fn txn_key(body: &Document) -> Option<TxnKey> {
    if body.get_bool("autocommit") != Ok(false) {
        return None;
    }
    // session ids are UUIDs, so the binary subtype is not the generic one
    let id = match body.get_document("lsid").ok()?.get("id") {
        Some(Bson::Binary(Binary { bytes, .. })) => bytes.clone(),
        _ => return None,
    };
    let txn_number = body.get_i64("txnNumber").ok()?;
    Some((id, txn_number))
}

fn no_such_transaction() -> Document {
    error_reply(
        NO_SUCH_TRANSACTION,
        "NoSuchTransaction",
        vec![TRANSIENT_TRANSACTION_ERROR.to_string()],
    )
}

fn error_reply(code: i32, code_name: &str, labels: Vec<String>) -> Document {
    let mut reply = doc! {
        "ok": 0,
        "code": code,
        "codeName": code_name,
        "errmsg": format!("{} ({})", code_name, code),
    };
    if !labels.is_empty() {
        let labels: Vec<Bson> = labels.into_iter().map(Bson::String).collect();
        reply.insert("errorLabels", labels);
    }
    reply
}
