//! Storage abstractions.
//!
//! [`UnitOfWork`] is one open store transaction. The workflow and archival
//! functions are written against it, so every cascade commits or rolls back
//! as a unit. [`SalesStore`] is the async face outer layers (`medrep-api`)
//! depend on; a backend implements each method by opening a transaction and
//! running the matching [`crate::workflow`] function inside it.

use std::future::Future;

use crate::{
  Result,
  auth::Credentials,
  client::{Client, ClientId, ClientInput},
  plan::{NewPlan, PlanId, WeekNumber, WeeklyPlan},
  query::{ClientFilter, PlanFilter, SnapshotFilter, Summary, SyncReport, VisitFilter},
  rep::{Actor, Rep, RepId, Role},
  snapshot::{ArchiveSnapshot, MergeReport, SnapshotId},
  visit::{DailyVisit, VisitId, VisitInput},
  workflow::{Approval, FinalizeRequest, Finalized},
};

// ─── Transaction ─────────────────────────────────────────────────────────────

/// Row-level access inside one store transaction.
///
/// Lookups return `Ok(None)` for unknown ids; callers decide whether that is
/// a `NotFound`. Inserts ignore the id carried by the value and return the
/// one the store assigned.
pub trait UnitOfWork {
  // ── Reps ──────────────────────────────────────────────────────────────

  fn rep(&mut self, id: RepId) -> Result<Option<Rep>>;

  // ── Plans ─────────────────────────────────────────────────────────────

  fn plan(&mut self, id: PlanId) -> Result<Option<WeeklyPlan>>;

  fn insert_plan(&mut self, plan: &WeeklyPlan) -> Result<PlanId>;

  fn update_plan(&mut self, plan: &WeeklyPlan) -> Result<()>;

  /// The highest-id approved plan for the key that is not archived.
  fn latest_active_approved_plan(
    &mut self,
    rep: RepId,
    week: WeekNumber,
  ) -> Result<Option<WeeklyPlan>>;

  /// The approved plan with the earliest planned date for the key, archived
  /// or not. Ties break on the lowest id.
  fn earliest_approved_plan(
    &mut self,
    rep: RepId,
    week: WeekNumber,
  ) -> Result<Option<WeeklyPlan>>;

  /// Every distinct `(rep, week)` that has an approved plan.
  fn approved_plan_keys(&mut self) -> Result<Vec<(RepId, WeekNumber)>>;

  // ── Visits ────────────────────────────────────────────────────────────

  fn visit(&mut self, id: VisitId) -> Result<Option<DailyVisit>>;

  fn insert_visit(&mut self, visit: &DailyVisit) -> Result<VisitId>;

  fn update_visit(&mut self, visit: &DailyVisit) -> Result<()>;

  /// The lowest-id visit of `rep` linked to `plan`, archived or not.
  fn visit_for_plan(
    &mut self,
    rep: RepId,
    plan: PlanId,
  ) -> Result<Option<DailyVisit>>;

  /// Every visit ever linked to `plan`, archived or not, by ascending id.
  fn visits_for_plan(&mut self, plan: PlanId) -> Result<Vec<DailyVisit>>;

  // ── Clients ───────────────────────────────────────────────────────────

  fn client(&mut self, id: ClientId) -> Result<Option<Client>>;

  fn insert_client(&mut self, client: &Client) -> Result<ClientId>;

  fn update_client(&mut self, client: &Client) -> Result<()>;

  // ── Snapshots ─────────────────────────────────────────────────────────

  /// All rows for the key, by ascending id. More than one is a duplicate.
  fn snapshots_for(
    &mut self,
    rep: RepId,
    week: WeekNumber,
  ) -> Result<Vec<ArchiveSnapshot>>;

  fn insert_snapshot(&mut self, snapshot: &ArchiveSnapshot) -> Result<SnapshotId>;

  fn update_snapshot(&mut self, snapshot: &ArchiveSnapshot) -> Result<()>;

  fn delete_snapshot(&mut self, id: SnapshotId) -> Result<()>;

  // ── Nesting ───────────────────────────────────────────────────────────

  /// Run `f` inside a nested savepoint.
  ///
  /// The inner result is `f`'s own; on `Err` its writes are rolled back while
  /// the enclosing transaction carries on. The outer result fails only if
  /// the savepoint itself could not be opened or released.
  fn savepoint<T, F>(&mut self, f: F) -> Result<Result<T>>
  where
    F: FnOnce(&mut Self) -> Result<T>,
    Self: Sized;
}

// ─── Async store ─────────────────────────────────────────────────────────────

/// Abstraction over a sales-tracking backend.
///
/// Every method takes the calling [`Actor`] and enforces role and ownership
/// rules itself. Each mutation runs in a single transaction: a cascade that
/// touches several rows either lands completely or not at all.
///
/// All methods return `Send` futures so the trait can be used from axum
/// handlers on a multi-threaded runtime.
pub trait SalesStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static + Into<crate::Error>;

  // ── Reps ──────────────────────────────────────────────────────────────

  /// Register a user. `password_hash` is an argon2 PHC string.
  fn add_rep(
    &self,
    username: String,
    role: Role,
    password_hash: String,
  ) -> impl Future<Output = Result<Rep, Self::Error>> + Send + '_;

  fn find_credentials(
    &self,
    username: String,
  ) -> impl Future<Output = Result<Option<Credentials>, Self::Error>> + Send + '_;

  // ── Plans ─────────────────────────────────────────────────────────────

  fn create_plan(
    &self,
    actor: Actor,
    input: NewPlan,
  ) -> impl Future<Output = Result<WeeklyPlan, Self::Error>> + Send + '_;

  /// Approve a pending plan, snapshot it, and archive it.
  fn approve_plan(
    &self,
    actor: Actor,
    id: PlanId,
  ) -> impl Future<Output = Result<Approval, Self::Error>> + Send + '_;

  fn reject_plan(
    &self,
    actor: Actor,
    id: PlanId,
  ) -> impl Future<Output = Result<WeeklyPlan, Self::Error>> + Send + '_;

  fn archive_plan(
    &self,
    actor: Actor,
    id: PlanId,
  ) -> impl Future<Output = Result<WeeklyPlan, Self::Error>> + Send + '_;

  /// Get-or-create the caller's visit for an approved plan.
  fn start_from_plan(
    &self,
    actor: Actor,
    id: PlanId,
  ) -> impl Future<Output = Result<DailyVisit, Self::Error>> + Send + '_;

  fn get_plan(
    &self,
    actor: Actor,
    id: PlanId,
  ) -> impl Future<Output = Result<WeeklyPlan, Self::Error>> + Send + '_;

  fn list_plans(
    &self,
    actor: Actor,
    filter: PlanFilter,
  ) -> impl Future<Output = Result<Vec<WeeklyPlan>, Self::Error>> + Send + '_;

  /// Distinct weeks with an approved plan, archived or not.
  fn approved_weeks(
    &self,
    actor: Actor,
  ) -> impl Future<Output = Result<Vec<WeekNumber>, Self::Error>> + Send + '_;

  // ── Visits ────────────────────────────────────────────────────────────

  fn save_visit(
    &self,
    actor: Actor,
    input: VisitInput,
  ) -> impl Future<Output = Result<DailyVisit, Self::Error>> + Send + '_;

  fn archive_visit(
    &self,
    actor: Actor,
    id: VisitId,
  ) -> impl Future<Output = Result<DailyVisit, Self::Error>> + Send + '_;

  fn get_visit(
    &self,
    actor: Actor,
    id: VisitId,
  ) -> impl Future<Output = Result<DailyVisit, Self::Error>> + Send + '_;

  fn list_visits(
    &self,
    actor: Actor,
    filter: VisitFilter,
  ) -> impl Future<Output = Result<Vec<DailyVisit>, Self::Error>> + Send + '_;

  // ── Clients ───────────────────────────────────────────────────────────

  fn save_client(
    &self,
    actor: Actor,
    input: ClientInput,
  ) -> impl Future<Output = Result<Client, Self::Error>> + Send + '_;

  fn archive_client(
    &self,
    actor: Actor,
    id: ClientId,
  ) -> impl Future<Output = Result<Client, Self::Error>> + Send + '_;

  /// Archive a client, plan, and visit together with one shared stamp.
  fn finalize_triplet(
    &self,
    actor: Actor,
    request: FinalizeRequest,
  ) -> impl Future<Output = Result<Finalized, Self::Error>> + Send + '_;

  fn get_client(
    &self,
    actor: Actor,
    id: ClientId,
  ) -> impl Future<Output = Result<Client, Self::Error>> + Send + '_;

  fn list_clients(
    &self,
    actor: Actor,
    filter: ClientFilter,
  ) -> impl Future<Output = Result<Vec<Client>, Self::Error>> + Send + '_;

  // ── Archive ───────────────────────────────────────────────────────────

  /// Manager only.
  fn list_snapshots(
    &self,
    actor: Actor,
    filter: SnapshotFilter,
  ) -> impl Future<Output = Result<Vec<ArchiveSnapshot>, Self::Error>> + Send + '_;

  /// Reconcile duplicate snapshot rows for one key. Manager only.
  fn merge_duplicates(
    &self,
    actor: Actor,
    rep: RepId,
    week: i64,
  ) -> impl Future<Output = Result<MergeReport, Self::Error>> + Send + '_;

  /// Rebuild snapshots for every key with an approved plan. Manager only.
  fn sync_archives(
    &self,
    actor: Actor,
  ) -> impl Future<Output = Result<SyncReport, Self::Error>> + Send + '_;

  /// Manager only.
  fn summary(
    &self,
    actor: Actor,
  ) -> impl Future<Output = Result<Summary, Self::Error>> + Send + '_;
}
