//! The mounted catalog view.
//!
//! A single actor task owns the [`CatalogViewModel`] and is its only writer.
//! Store reads, store writes and session delivery run as separate tasks and
//! report back over one internal channel, so every mutation is serialized in
//! arrival order without locks. Unmounting (or dropping the handle) stops the
//! actor, which releases the session subscription with it.

use resealeds_protocol::{MonitoredProduct, NewProduct};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::merge::MergeOutcome;
use super::model::{AddTicket, CatalogViewModel, LoadOutcome, LoadTicket};
use super::snapshot::CatalogSnapshot;
use crate::config::ViewConfig;
use crate::error::{CatalogError, MergeError, Result, StoreError};
use crate::session::{SessionObserver, SessionTransition, Subscription};
use crate::store::StoreHandle;

const COMMAND_CAPACITY: usize = 32;

/// A record the store confirmed, and where it landed locally.
///
/// `merge` is `None` when a sign-out cleared the catalog while the write was
/// in flight; the record exists remotely and shows up on the next load.
#[derive(Debug, Clone, PartialEq)]
pub struct AddReceipt {
    pub product: MonitoredProduct,
    pub merge: Option<MergeOutcome>,
}

enum Command {
    Reload,
    BindStore(StoreHandle),
    AddLocally {
        product: MonitoredProduct,
        reply: oneshot::Sender<std::result::Result<MergeOutcome, MergeError>>,
    },
    AddProduct {
        draft: NewProduct,
        reply: oneshot::Sender<Result<AddReceipt>>,
    },
}

enum Internal {
    Session(SessionTransition),
    LoadFinished {
        ticket: LoadTicket,
        result: std::result::Result<Vec<MonitoredProduct>, StoreError>,
    },
    AddFinished {
        ticket: AddTicket,
        result: std::result::Result<MonitoredProduct, StoreError>,
        reply: oneshot::Sender<Result<AddReceipt>>,
    },
}

/// Handle to a mounted catalog view.
pub struct CatalogView {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<CatalogSnapshot>,
    task: JoinHandle<()>,
}

impl CatalogView {
    /// Mounts the view: subscribes to `observer` for the lifetime of the view
    /// and issues the initial catalog read. Must be called inside a tokio
    /// runtime.
    pub fn mount(store: StoreHandle, observer: &SessionObserver, config: ViewConfig) -> Result<Self> {
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();

        let session_tx = internal_tx.clone();
        let subscription = observer.subscribe(move |transition| {
            let _ = session_tx.send(Internal::Session(transition));
        })?;

        let mut model = CatalogViewModel::new(config);
        model.seed_session(observer.current());
        let initial_load = model.begin_load();

        let (snapshot_tx, snapshots) = watch::channel(model.snapshot());
        let (commands, command_rx) = mpsc::channel(COMMAND_CAPACITY);

        let actor = ViewActor {
            model,
            store,
            internal_tx,
            snapshot_tx,
            _subscription: subscription,
        };
        let task = tokio::spawn(actor.run(initial_load, command_rx, internal_rx));
        info!("Catalog view mounted");

        Ok(Self {
            commands,
            snapshots,
            task,
        })
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver that observes every published snapshot.
    pub fn watch(&self) -> watch::Receiver<CatalogSnapshot> {
        self.snapshots.clone()
    }

    /// Waits for the first snapshot satisfying `predicate`.
    pub async fn wait_until<F>(&self, predicate: F) -> Result<CatalogSnapshot>
    where
        F: FnMut(&CatalogSnapshot) -> bool,
    {
        let mut snapshots = self.snapshots.clone();
        let snapshot = snapshots
            .wait_for(predicate)
            .await
            .map_err(|_| CatalogError::ViewClosed)?;
        Ok(snapshot.clone())
    }

    /// Waits until no catalog read is in flight.
    pub async fn settled(&self) -> Result<CatalogSnapshot> {
        self.wait_until(|snapshot| !snapshot.loading).await
    }

    /// Issues a fresh read, for a user-triggered refresh.
    pub async fn reload(&self) -> Result<()> {
        self.send(Command::Reload).await
    }

    /// Points the view at `store`. Reloads only if the handle identity
    /// differs from the current one.
    pub async fn bind_store(&self, store: StoreHandle) -> Result<()> {
        self.send(Command::BindStore(store)).await
    }

    /// Merges a record the store has already confirmed.
    pub async fn add_locally(&self, product: MonitoredProduct) -> Result<MergeOutcome> {
        let (reply, response) = oneshot::channel();
        self.send(Command::AddLocally { product, reply }).await?;
        let outcome = response.await.map_err(|_| CatalogError::ViewClosed)?;
        Ok(outcome?)
    }

    /// Writes `draft` through to the store, then merges the confirmed record.
    /// Refused unless a session is present.
    pub async fn add_product(&self, draft: NewProduct) -> Result<AddReceipt> {
        let (reply, response) = oneshot::channel();
        self.send(Command::AddProduct { draft, reply }).await?;
        response.await.map_err(|_| CatalogError::ViewClosed)?
    }

    /// Stops the view and waits for the actor to finish. The session
    /// subscription is released before this returns.
    pub async fn unmount(self) {
        let CatalogView { commands, task, .. } = self;
        drop(commands);
        if let Err(err) = task.await {
            warn!(error = %err, "Catalog view task ended abnormally");
        }
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| CatalogError::ViewClosed)
    }
}

struct ViewActor {
    model: CatalogViewModel,
    store: StoreHandle,
    internal_tx: mpsc::UnboundedSender<Internal>,
    snapshot_tx: watch::Sender<CatalogSnapshot>,
    _subscription: Subscription,
}

impl ViewActor {
    async fn run(
        mut self,
        initial_load: LoadTicket,
        mut commands: mpsc::Receiver<Command>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        self.spawn_read(initial_load);

        loop {
            tokio::select! {
                biased;
                Some(message) = internal.recv() => self.handle_internal(message),
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
            }
            self.publish();
        }

        info!("Catalog view unmounted");
    }

    /// Callers awaiting a reply must see the state it describes, so this
    /// runs before any reply is sent.
    fn publish(&self) {
        if self.snapshot_tx.borrow().revision != self.model.revision() {
            self.snapshot_tx.send_replace(self.model.snapshot());
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Reload => {
                debug!("Manual catalog reload");
                self.start_load();
            }
            Command::BindStore(store) => {
                if self.store.same_as(&store) {
                    debug!("Store handle unchanged; skipping reload");
                } else {
                    info!("Store handle changed; reloading catalog");
                    self.store = store;
                    self.start_load();
                }
            }
            Command::AddLocally { product, reply } => {
                let outcome = self.model.add_locally(product);
                if let Err(err) = &outcome {
                    warn!(error = %err, "Confirmed product not merged");
                }
                self.publish();
                let _ = reply.send(outcome);
            }
            Command::AddProduct { draft, reply } => {
                let ticket = match self.model.begin_add() {
                    Ok(ticket) => ticket,
                    Err(err) => {
                        debug!("Add refused without a session");
                        let _ = reply.send(Err(err));
                        return;
                    }
                };
                match draft.validate() {
                    Ok(()) => self.spawn_write(ticket, draft, reply),
                    Err(err) => {
                        let _ = reply.send(Err(err.into()));
                    }
                }
            }
        }
    }

    fn handle_internal(&mut self, message: Internal) {
        match message {
            Internal::Session(transition) => {
                let cleared = self.model.on_session_transition(&transition);
                info!(
                    kind = transition.kind.as_str(),
                    session_present = transition.session.is_present(),
                    cleared,
                    "Session transition applied"
                );
            }
            Internal::LoadFinished { ticket, result } => {
                match self.model.complete_load(ticket, result) {
                    LoadOutcome::Applied { count } => info!(count, "Catalog loaded"),
                    LoadOutcome::Failed(err) => {
                        warn!(error = %err, "Catalog read failed; keeping previous products")
                    }
                    LoadOutcome::Discarded(reason) => {
                        debug!(reason = ?reason, "Catalog read result discarded")
                    }
                }
            }
            Internal::AddFinished {
                ticket,
                result,
                reply,
            } => {
                let outcome = match result {
                    Ok(product) => match self.model.complete_add(ticket, product.clone()) {
                        Ok(merge) => {
                            info!(id = %product.id, merged = merge.is_some(), "Product added");
                            Ok(AddReceipt { product, merge })
                        }
                        Err(err) => {
                            warn!(error = %err, "Stored product could not be merged locally");
                            Err(err.into())
                        }
                    },
                    Err(err) => {
                        warn!(error = %err, "Product write failed");
                        Err(err.into())
                    }
                };
                self.publish();
                let _ = reply.send(outcome);
            }
        }
    }

    fn start_load(&mut self) {
        let ticket = self.model.begin_load();
        self.spawn_read(ticket);
    }

    fn spawn_read(&self, ticket: LoadTicket) {
        let store = self.store.clone();
        let internal = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = store.list_products().await;
            let _ = internal.send(Internal::LoadFinished { ticket, result });
        });
    }

    fn spawn_write(
        &self,
        ticket: AddTicket,
        draft: NewProduct,
        reply: oneshot::Sender<Result<AddReceipt>>,
    ) {
        let store = self.store.clone();
        let internal = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = store.insert_product(draft).await;
            let _ = internal.send(Internal::AddFinished {
                ticket,
                result,
                reply,
            });
        });
    }
}
