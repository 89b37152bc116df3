//! [`SqliteStore`]: the SQLite implementation of [`SalesStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::{OptionalExtension as _, TransactionBehavior, params, params_from_iter};
use tracing::info;

use medrep_core::{
  Error as CoreError,
  auth::{Credentials, require_manager, require_owner},
  client::{Client, ClientId, ClientInput},
  plan::{NewPlan, PlanId, WeekNumber, WeeklyPlan},
  query::{ClientFilter, PlanFilter, SnapshotFilter, Summary, SyncReport, VisitFilter},
  rep::{Actor, Rep, RepId, Role},
  snapshot::{ArchiveSnapshot, MergeReport},
  store::SalesStore,
  visit::{DailyVisit, VisitId, VisitInput},
  workflow::{self, Approval, FinalizeRequest, Finalized},
};

use crate::{
  Error, Result,
  encode::{
    CLIENT_COLUMNS, PLAN_COLUMNS, REP_COLUMNS, RawClient, RawPlan, RawRep,
    RawSnapshot, RawVisit, SNAPSHOT_COLUMNS, VISIT_COLUMNS, decode_week,
    encode_dt,
  },
  query::{self, Where},
  schema::SCHEMA,
  tx::SqliteTx,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A sales store backed by a single SQLite file.
///
/// Cloning shares the inner connection.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` in one immediate transaction, committing only if it succeeds.
  async fn transact<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&mut SqliteTx<'_>) -> medrep_core::Result<T> + Send + 'static,
  {
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let outcome = f(&mut SqliteTx::new(&tx));
        if outcome.is_ok() {
          tx.commit()?;
        }
        Ok(outcome)
      })
      .await?;
    Ok(outcome?)
  }

  /// Run a `SELECT` built from `filter` and decode each row.
  async fn select<R, T>(
    &self,
    table: &'static str,
    columns: &'static str,
    order: &'static str,
    filter: Where,
    read: fn(&rusqlite::Row<'_>) -> rusqlite::Result<R>,
    decode: fn(R) -> Result<T>,
  ) -> Result<Vec<T>>
  where
    R: Send + 'static,
    T: Send + 'static,
  {
    let sql = format!("SELECT {columns} FROM {table} {} ORDER BY {order}", filter.sql());
    let params = filter.into_params();
    let raws: Vec<R> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params_from_iter(params), read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(decode).collect()
  }

  async fn count(&self, sql: &'static str) -> Result<u64> {
    let n: i64 = self
      .conn
      .call(move |conn| Ok(conn.query_row(sql, [], |r| r.get(0))?))
      .await?;
    Ok(u64::try_from(n).unwrap_or(0))
  }
}

fn forbid_unless_owner(actor: &Actor, owner: RepId, what: &str) -> Result<()> {
  Ok(require_owner(actor, owner, what)?)
}

// ─── SalesStore impl ─────────────────────────────────────────────────────────

impl SalesStore for SqliteStore {
  type Error = Error;

  // ── Reps ──────────────────────────────────────────────────────────────────

  async fn add_rep(
    &self,
    username: String,
    role: Role,
    password_hash: String,
  ) -> Result<Rep> {
    let username = username.trim().to_owned();
    if username.is_empty() {
      return Err(CoreError::validation("username must not be empty").into());
    }
    let created_at = Utc::now();
    let at_str = encode_dt(created_at);
    let role_str = role.to_string();
    let name = username.clone();

    let rep_id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO reps (username, role, password_hash, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          params![name, role_str, password_hash, at_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    info!(rep_id, %username, %role, "rep registered");
    Ok(Rep { rep_id, username, role, created_at })
  }

  async fn find_credentials(&self, username: String) -> Result<Option<Credentials>> {
    let raw: Option<RawRep> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {REP_COLUMNS} FROM reps WHERE username = ?1"),
              params![username],
              RawRep::read,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawRep::into_credentials).transpose()
  }

  // ── Plans ─────────────────────────────────────────────────────────────────

  async fn create_plan(&self, actor: Actor, input: NewPlan) -> Result<WeeklyPlan> {
    self
      .transact(move |tx| workflow::create_plan(tx, &actor, input, Utc::now()))
      .await
  }

  async fn approve_plan(&self, actor: Actor, id: PlanId) -> Result<Approval> {
    self
      .transact(move |tx| workflow::approve_plan(tx, &actor, id, Utc::now()))
      .await
  }

  async fn reject_plan(&self, actor: Actor, id: PlanId) -> Result<WeeklyPlan> {
    self
      .transact(move |tx| workflow::reject_plan(tx, &actor, id, Utc::now()))
      .await
  }

  async fn archive_plan(&self, actor: Actor, id: PlanId) -> Result<WeeklyPlan> {
    self
      .transact(move |tx| workflow::archive_plan(tx, &actor, id, Utc::now()))
      .await
  }

  async fn start_from_plan(&self, actor: Actor, id: PlanId) -> Result<DailyVisit> {
    self
      .transact(move |tx| workflow::start_from_plan(tx, &actor, id, Utc::now()))
      .await
  }

  async fn get_plan(&self, actor: Actor, id: PlanId) -> Result<WeeklyPlan> {
    let plan = self.transact(move |tx| workflow::load_plan(tx, id)).await?;
    forbid_unless_owner(&actor, plan.rep_id, "plan")?;
    Ok(plan)
  }

  async fn list_plans(&self, actor: Actor, filter: PlanFilter) -> Result<Vec<WeeklyPlan>> {
    let filter = query::plans(&filter, actor.scope());
    self
      .select(
        "weekly_plans",
        PLAN_COLUMNS,
        "planned_date DESC, plan_id DESC",
        filter,
        RawPlan::read,
        RawPlan::into_plan,
      )
      .await
  }

  async fn approved_weeks(&self, actor: Actor) -> Result<Vec<WeekNumber>> {
    let scope = actor.scope();
    let weeks: Vec<i64> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT DISTINCT week_number FROM weekly_plans
           WHERE status = 'approved' AND (?1 IS NULL OR rep_id = ?1)
           ORDER BY week_number DESC",
        )?;
        let rows = stmt
          .query_map(params![scope], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    weeks.into_iter().map(decode_week).collect()
  }

  // ── Visits ────────────────────────────────────────────────────────────────

  async fn save_visit(&self, actor: Actor, input: VisitInput) -> Result<DailyVisit> {
    self
      .transact(move |tx| workflow::save_visit(tx, &actor, input, Utc::now()))
      .await
  }

  async fn archive_visit(&self, actor: Actor, id: VisitId) -> Result<DailyVisit> {
    self
      .transact(move |tx| workflow::archive_visit(tx, &actor, id, Utc::now()))
      .await
  }

  async fn get_visit(&self, actor: Actor, id: VisitId) -> Result<DailyVisit> {
    let visit = self.transact(move |tx| workflow::load_visit(tx, id)).await?;
    forbid_unless_owner(&actor, visit.rep_id, "visit")?;
    Ok(visit)
  }

  async fn list_visits(&self, actor: Actor, filter: VisitFilter) -> Result<Vec<DailyVisit>> {
    let filter = query::visits(&filter, actor.scope());
    self
      .select(
        "daily_visits",
        VISIT_COLUMNS,
        "visit_date DESC, visit_id DESC",
        filter,
        RawVisit::read,
        RawVisit::into_visit,
      )
      .await
  }

  // ── Clients ───────────────────────────────────────────────────────────────

  async fn save_client(&self, actor: Actor, input: ClientInput) -> Result<Client> {
    self
      .transact(move |tx| workflow::save_client(tx, &actor, input, Utc::now()))
      .await
  }

  async fn archive_client(&self, actor: Actor, id: ClientId) -> Result<Client> {
    self
      .transact(move |tx| workflow::archive_client(tx, &actor, id, Utc::now()))
      .await
  }

  async fn finalize_triplet(
    &self,
    actor: Actor,
    request: FinalizeRequest,
  ) -> Result<Finalized> {
    self
      .transact(move |tx| workflow::finalize_triplet(tx, &actor, request, Utc::now()))
      .await
  }

  async fn get_client(&self, actor: Actor, id: ClientId) -> Result<Client> {
    let client = self.transact(move |tx| workflow::load_client(tx, id)).await?;
    forbid_unless_owner(&actor, client.rep_id, "client")?;
    Ok(client)
  }

  async fn list_clients(&self, actor: Actor, filter: ClientFilter) -> Result<Vec<Client>> {
    let filter = query::clients(&filter, actor.scope());
    self
      .select(
        "clients",
        CLIENT_COLUMNS,
        "client_id DESC",
        filter,
        RawClient::read,
        RawClient::into_client,
      )
      .await
  }

  // ── Archive ───────────────────────────────────────────────────────────────

  async fn list_snapshots(
    &self,
    actor: Actor,
    filter: SnapshotFilter,
  ) -> Result<Vec<ArchiveSnapshot>> {
    require_manager(&actor, "browse the archive")?;
    let filter = query::snapshots(&filter);
    self
      .select(
        "archive_snapshots",
        SNAPSHOT_COLUMNS,
        "archived_at DESC, snapshot_id DESC",
        filter,
        RawSnapshot::read,
        RawSnapshot::into_snapshot,
      )
      .await
  }

  async fn merge_duplicates(
    &self,
    actor: Actor,
    rep: RepId,
    week: i64,
  ) -> Result<MergeReport> {
    self
      .transact(move |tx| workflow::merge_week(tx, &actor, rep, week))
      .await
  }

  async fn sync_archives(&self, actor: Actor) -> Result<SyncReport> {
    self
      .transact(move |tx| workflow::sync_archives(tx, &actor, Utc::now()))
      .await
  }

  async fn summary(&self, actor: Actor) -> Result<Summary> {
    require_manager(&actor, "view the summary")?;
    Ok(Summary {
      pending_plans:   self
        .count(
          "SELECT COUNT(*) FROM weekly_plans WHERE status = 'pending' AND is_deleted = 0",
        )
        .await?,
      active_visits:   self
        .count("SELECT COUNT(*) FROM daily_visits WHERE is_deleted = 0")
        .await?,
      active_clients:  self
        .count("SELECT COUNT(*) FROM clients WHERE is_deleted = 0")
        .await?,
      snapshots:       self.count("SELECT COUNT(*) FROM archive_snapshots").await?,
      archived_visits: self
        .count("SELECT COALESCE(SUM(total_visits), 0) FROM archive_snapshots")
        .await?,
    })
  }
}
