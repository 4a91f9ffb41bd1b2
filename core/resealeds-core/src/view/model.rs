//! Catalog view state and the rules that change it.
//!
//! Pure and synchronous: the runtime in `view::runtime` owns one of these
//! and feeds it store results and session transitions in arrival order.
//!
//! Loads and confirmed adds are ticketed. A ticket remembers the sign-out
//! epoch it was issued in, and a result whose epoch is stale is discarded at
//! commit time. That makes a sign-out win over an in-flight read no matter
//! which of the two is delivered first.

use resealeds_protocol::{ensure_ascending, MonitoredProduct, SessionEventKind};

use super::merge::{merge_confirmed, MergeOutcome};
use super::snapshot::CatalogSnapshot;
use crate::config::{DuplicatePolicy, SignOutPolicy, ViewConfig};
use crate::error::{CatalogError, MergeError, StoreError};
use crate::session::{next_state, AuthState, Session, SessionTransition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    seq: u64,
    epoch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddTicket {
    epoch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// A sign-out happened after the read was issued.
    SignedOut,
    /// A newer read was issued after this one.
    Superseded,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Applied { count: usize },
    Failed(StoreError),
    Discarded(DiscardReason),
}

#[derive(Debug, Clone, Default)]
pub struct CatalogViewModel {
    products: Vec<MonitoredProduct>,
    session: Session,
    auth: AuthState,
    config: ViewConfig,
    sign_out_epoch: u64,
    load_seq: u64,
    loads_in_flight: usize,
    // Records confirmed while a read was in flight. The read may predate the
    // write, so they are merged back into its result.
    confirmed_during_load: Vec<MonitoredProduct>,
    last_error: Option<String>,
    revision: u64,
}

impl CatalogViewModel {
    pub fn new(config: ViewConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Adopts a session the observer already knew about before this view
    /// existed.
    pub fn seed_session(&mut self, session: Session) {
        self.auth = if session.is_present() {
            AuthState::Authenticated
        } else {
            AuthState::Unauthenticated
        };
        self.session = session;
        self.revision += 1;
    }

    pub fn products(&self) -> &[MonitoredProduct] {
        &self.products
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn auth_state(&self) -> AuthState {
        self.auth
    }

    pub fn can_mutate(&self) -> bool {
        self.auth.can_mutate() && self.session.is_present()
    }

    pub fn is_loading(&self) -> bool {
        self.loads_in_flight > 0
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn begin_load(&mut self) -> LoadTicket {
        self.load_seq += 1;
        self.loads_in_flight += 1;
        self.revision += 1;
        LoadTicket {
            seq: self.load_seq,
            epoch: self.sign_out_epoch,
        }
    }

    /// Commits a read result. Failures leave the list untouched; successful
    /// reads replace it wholesale.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<MonitoredProduct>, StoreError>,
    ) -> LoadOutcome {
        self.loads_in_flight = self.loads_in_flight.saturating_sub(1);
        self.revision += 1;

        let outcome = self.commit_load(ticket, result);
        if !self.is_loading() {
            self.confirmed_during_load.clear();
        }
        outcome
    }

    fn commit_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<MonitoredProduct>, StoreError>,
    ) -> LoadOutcome {
        if ticket.epoch != self.sign_out_epoch {
            return LoadOutcome::Discarded(DiscardReason::SignedOut);
        }
        if ticket.seq != self.load_seq {
            return LoadOutcome::Discarded(DiscardReason::Superseded);
        }

        let products = match result.and_then(|products| {
            ensure_ascending(&products)?;
            Ok(products)
        }) {
            Ok(products) => products,
            Err(err) => {
                self.last_error = Some(err.to_string());
                return LoadOutcome::Failed(err);
            }
        };

        self.products = products;
        for confirmed in std::mem::take(&mut self.confirmed_during_load) {
            // The read already contains the record if it ran after the write.
            let _ = merge_confirmed(&mut self.products, confirmed, DuplicatePolicy::Reject);
        }
        self.last_error = None;
        LoadOutcome::Applied {
            count: self.products.len(),
        }
    }

    /// Applies a session lifecycle event. Returns true if cached products
    /// were dropped.
    pub fn on_session_transition(&mut self, transition: &SessionTransition) -> bool {
        // Authenticated only ever accompanies a present session.
        self.auth = match &transition.session {
            Session::Present(_) => next_state(self.auth, transition.kind),
            Session::Absent => AuthState::Unauthenticated,
        };
        self.session = transition.session.clone();
        self.revision += 1;

        if transition.kind != SessionEventKind::SignedOut
            || self.config.sign_out_policy != SignOutPolicy::ClearCatalog
        {
            return false;
        }

        self.sign_out_epoch += 1;
        self.confirmed_during_load.clear();
        let had_products = !self.products.is_empty();
        self.products.clear();
        had_products
    }

    pub fn begin_add(&self) -> Result<AddTicket, CatalogError> {
        if !self.can_mutate() {
            return Err(CatalogError::NotSignedIn);
        }
        Ok(AddTicket {
            epoch: self.sign_out_epoch,
        })
    }

    /// Merges a record the store confirmed for `ticket`. Returns `Ok(None)`
    /// when a sign-out cleared the catalog while the write was in flight.
    pub fn complete_add(
        &mut self,
        ticket: AddTicket,
        product: MonitoredProduct,
    ) -> Result<Option<MergeOutcome>, MergeError> {
        if ticket.epoch != self.sign_out_epoch {
            return Ok(None);
        }
        self.add_locally(product).map(Some)
    }

    /// Reconciles one store-confirmed record into the list by id. Never
    /// writes to the store and never assigns ids.
    pub fn add_locally(&mut self, product: MonitoredProduct) -> Result<MergeOutcome, MergeError> {
        let outcome = merge_confirmed(
            &mut self.products,
            product.clone(),
            self.config.duplicate_policy,
        )?;
        if self.is_loading() {
            self.confirmed_during_load.push(product);
        }
        self.revision += 1;
        Ok(outcome)
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        CatalogSnapshot {
            products: self.products.clone(),
            session_present: self.session.is_present(),
            can_add: self.can_mutate(),
            loading: self.is_loading(),
            last_error: self.last_error.clone(),
            revision: self.revision,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resealeds_protocol::{Identity, ProductId};

    fn product(id: i64, name: &str, price: f64) -> MonitoredProduct {
        MonitoredProduct {
            id: ProductId::new(id).unwrap(),
            name: name.to_string(),
            img: format!("/img/{}.png", id),
            price,
        }
    }

    fn ids(model: &CatalogViewModel) -> Vec<i64> {
        model.products().iter().map(|p| p.id.get()).collect()
    }

    fn signed_in() -> SessionTransition {
        SessionTransition {
            kind: SessionEventKind::SignedIn,
            session: Session::Present(Identity::new("alice").unwrap()),
        }
    }

    fn signed_out() -> SessionTransition {
        SessionTransition {
            kind: SessionEventKind::SignedOut,
            session: Session::Absent,
        }
    }

    fn loaded(products: Vec<MonitoredProduct>) -> CatalogViewModel {
        let mut model = CatalogViewModel::default();
        let ticket = model.begin_load();
        model.complete_load(ticket, Ok(products));
        model
    }

    #[test]
    fn load_replaces_state_in_store_order() {
        let mut model = CatalogViewModel::default();
        let ticket = model.begin_load();
        assert!(model.is_loading());

        let outcome = model.complete_load(
            ticket,
            Ok(vec![product(1, "A", 10.0), product(2, "B", 20.0)]),
        );
        assert_eq!(outcome, LoadOutcome::Applied { count: 2 });
        assert_eq!(ids(&model), vec![1, 2]);
        assert!(!model.is_loading());
    }

    #[test]
    fn failed_first_load_leaves_empty_list() {
        let mut model = CatalogViewModel::default();
        let ticket = model.begin_load();
        let err = StoreError::Unavailable("timeout".to_string());

        assert_eq!(
            model.complete_load(ticket, Err(err.clone())),
            LoadOutcome::Failed(err)
        );
        assert!(model.products().is_empty());
        assert!(model.snapshot().last_error.is_some());
    }

    #[test]
    fn failed_reload_keeps_previous_list() {
        let mut model = loaded(vec![product(1, "A", 10.0)]);
        let ticket = model.begin_load();
        model.complete_load(ticket, Err(StoreError::PermissionDenied("rls".to_string())));
        assert_eq!(ids(&model), vec![1]);

        let ticket = model.begin_load();
        model.complete_load(ticket, Ok(vec![product(1, "A", 10.0), product(4, "D", 1.0)]));
        assert_eq!(ids(&model), vec![1, 4]);
        assert!(model.snapshot().last_error.is_none());
    }

    #[test]
    fn unordered_read_is_rejected_whole() {
        let mut model = loaded(vec![product(1, "A", 10.0)]);
        let ticket = model.begin_load();
        let outcome =
            model.complete_load(ticket, Ok(vec![product(3, "C", 1.0), product(2, "B", 1.0)]));
        assert!(matches!(outcome, LoadOutcome::Failed(StoreError::Decode(_))));
        assert_eq!(ids(&model), vec![1]);
    }

    #[test]
    fn sign_out_clears_products() {
        let mut model = loaded(vec![product(1, "A", 10.0), product(2, "B", 20.0)]);
        model.on_session_transition(&signed_in());
        assert!(model.on_session_transition(&signed_out()));
        assert!(model.products().is_empty());
        assert!(!model.can_mutate());
    }

    #[test]
    fn sign_out_wins_when_delivered_before_load_completion() {
        let mut model = CatalogViewModel::default();
        let ticket = model.begin_load();
        model.on_session_transition(&signed_in());
        model.on_session_transition(&signed_out());

        let outcome = model.complete_load(ticket, Ok(vec![product(1, "A", 10.0)]));
        assert_eq!(outcome, LoadOutcome::Discarded(DiscardReason::SignedOut));
        assert!(model.products().is_empty());
        assert!(!model.is_loading());
    }

    #[test]
    fn sign_out_wins_when_delivered_after_load_completion() {
        let mut model = CatalogViewModel::default();
        let ticket = model.begin_load();
        model.complete_load(ticket, Ok(vec![product(1, "A", 10.0)]));
        model.on_session_transition(&signed_out());
        assert!(model.products().is_empty());
    }

    #[test]
    fn read_issued_after_sign_out_applies() {
        let mut model = loaded(vec![product(1, "A", 10.0)]);
        model.on_session_transition(&signed_out());

        let ticket = model.begin_load();
        let outcome = model.complete_load(ticket, Ok(vec![product(1, "A", 10.0)]));
        assert_eq!(outcome, LoadOutcome::Applied { count: 1 });
    }

    #[test]
    fn superseded_read_is_discarded() {
        let mut model = CatalogViewModel::default();
        let first = model.begin_load();
        let second = model.begin_load();

        model.complete_load(second, Ok(vec![product(2, "B", 1.0)]));
        let outcome = model.complete_load(first, Ok(vec![product(1, "A", 1.0)]));
        assert_eq!(outcome, LoadOutcome::Discarded(DiscardReason::Superseded));
        assert_eq!(ids(&model), vec![2]);
    }

    #[test]
    fn keep_catalog_policy_only_revokes_adding() {
        let mut model = CatalogViewModel::new(ViewConfig {
            sign_out_policy: SignOutPolicy::KeepCatalog,
            ..ViewConfig::default()
        });
        let ticket = model.begin_load();
        model.on_session_transition(&signed_in());
        model.on_session_transition(&signed_out());

        let outcome = model.complete_load(ticket, Ok(vec![product(1, "A", 10.0)]));
        assert_eq!(outcome, LoadOutcome::Applied { count: 1 });
        assert!(!model.on_session_transition(&signed_out()));
        assert_eq!(ids(&model), vec![1]);
        assert!(!model.can_mutate());
    }

    #[test]
    fn token_refresh_changes_nothing_visible() {
        let mut model = loaded(vec![product(1, "A", 10.0)]);
        model.on_session_transition(&signed_in());
        let before = model.snapshot();

        model.on_session_transition(&SessionTransition {
            kind: SessionEventKind::TokenRefreshed,
            session: Session::Present(Identity::new("alice").unwrap()),
        });
        let after = model.snapshot();
        assert_eq!(before.products, after.products);
        assert_eq!(before.can_add, after.can_add);
        assert_eq!(model.auth_state(), AuthState::Authenticated);
    }

    #[test]
    fn add_locally_keeps_ascending_order() {
        let mut model = loaded(vec![product(1, "A", 1.0), product(3, "C", 3.0)]);
        let outcome = model.add_locally(product(2, "B", 2.0));
        assert_eq!(outcome, Ok(MergeOutcome::Inserted { index: 1 }));
        assert_eq!(ids(&model), vec![1, 2, 3]);
    }

    #[test]
    fn add_locally_duplicate_follows_policy() {
        let mut model = loaded(vec![product(1, "A", 1.0)]);
        assert!(model.add_locally(product(1, "A2", 1.0)).is_err());

        let mut model = CatalogViewModel::new(ViewConfig {
            duplicate_policy: DuplicatePolicy::Overwrite,
            ..ViewConfig::default()
        });
        model.add_locally(product(1, "A", 1.0)).unwrap();
        model.add_locally(product(1, "A2", 1.0)).unwrap();
        assert_eq!(model.products()[0].name, "A2");
    }

    #[test]
    fn adding_requires_session() {
        let mut model = CatalogViewModel::default();
        assert!(matches!(model.begin_add(), Err(CatalogError::NotSignedIn)));
        model.on_session_transition(&signed_in());
        assert!(model.begin_add().is_ok());
    }

    #[test]
    fn confirmed_add_after_sign_out_is_discarded() {
        let mut model = loaded(vec![product(1, "A", 1.0)]);
        model.on_session_transition(&signed_in());
        let ticket = model.begin_add().expect("signed in");
        model.on_session_transition(&signed_out());

        assert_eq!(model.complete_add(ticket, product(2, "B", 2.0)), Ok(None));
        assert!(model.products().is_empty());
    }

    #[test]
    fn confirmed_add_survives_older_in_flight_read() {
        let mut model = loaded(vec![product(1, "A", 1.0)]);
        model.on_session_transition(&signed_in());
        let ticket = model.begin_load();
        model.add_locally(product(2, "B", 2.0)).unwrap();

        model.complete_load(ticket, Ok(vec![product(1, "A", 1.0)]));
        assert_eq!(ids(&model), vec![1, 2]);
    }

    #[test]
    fn sign_in_that_left_session_absent_stays_unauthenticated() {
        let mut model = CatalogViewModel::default();
        model.on_session_transition(&SessionTransition {
            kind: SessionEventKind::SignedIn,
            session: Session::Absent,
        });
        assert_eq!(model.auth_state(), AuthState::Unauthenticated);
        assert!(!model.can_mutate());
    }

    #[test]
    fn seeded_session_allows_adding() {
        let mut model = CatalogViewModel::default();
        model.seed_session(Session::Present(Identity::new("alice").unwrap()));
        assert!(model.can_mutate());
        assert!(model.snapshot().session_present);
    }

    #[test]
    fn end_to_end_scenario() {
        let mut model = CatalogViewModel::default();
        let ticket = model.begin_load();
        model.complete_load(ticket, Ok(vec![product(1, "A", 10.0), product(2, "B", 20.0)]));
        assert_eq!(ids(&model), vec![1, 2]);
        assert!(!model.snapshot().can_add);

        model.on_session_transition(&signed_in());
        assert!(model.snapshot().can_add);

        let ticket = model.begin_add().expect("signed in");
        model
            .complete_add(ticket, product(3, "C", 5.0))
            .expect("merge");
        assert_eq!(ids(&model), vec![1, 2, 3]);

        model.on_session_transition(&signed_out());
        assert!(model.products().is_empty());
    }
}
