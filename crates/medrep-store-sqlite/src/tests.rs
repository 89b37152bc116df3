//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::NaiveDate;
use medrep_core::{
  Error as CoreError,
  client::ClientInput,
  plan::{NewPlan, PlanDetails, PlanStatus, WeeklyPlan},
  query::{PlanFilter, Show, SnapshotFilter, VisitFilter},
  rep::{Actor, Role},
  snapshot::ArchiveSnapshot,
  store::SalesStore,
  visit::VisitInput,
  workflow::FinalizeRequest,
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

struct Fixture {
  store:   SqliteStore,
  manager: Actor,
  rep:     Actor,
  other:   Actor,
}

async fn actor(store: &SqliteStore, name: &str, role: Role) -> Actor {
  let rep = store
    .add_rep(name.into(), role, "$argon2id$unused".into())
    .await
    .unwrap();
  Actor::from(&rep)
}

async fn fixture() -> Fixture {
  let store = store().await;
  let manager = actor(&store, "maha", Role::Manager).await;
  let rep = actor(&store, "rami", Role::Rep).await;
  let other = actor(&store, "omar", Role::Rep).await;
  Fixture { store, manager, rep, other }
}

fn day(d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(2026, 3, d).unwrap() }

fn new_plan(week: i64) -> NewPlan {
  NewPlan {
    rep_id:       None,
    week_number:  week,
    planned_date: day(2),
    details:      PlanDetails {
      plan_text: "Detail cardiology line".into(),
      product_line: "Cardio".into(),
      entity_address: "12 Tahrir St".into(),
      visit_objective: "Detailing".into(),
      ..Default::default()
    },
  }
}

fn core(err: Error) -> CoreError { err.into() }

async fn exec(s: &SqliteStore, sql: String) {
  s.conn
    .call(move |c| {
      c.execute_batch(&sql)?;
      Ok(())
    })
    .await
    .unwrap();
}

async fn snapshots(f: &Fixture, week: i64) -> Vec<ArchiveSnapshot> {
  f.store
    .list_snapshots(f.manager.clone(), SnapshotFilter {
      week: Some(week),
      ..Default::default()
    })
    .await
    .unwrap()
}

/// Create and approve a week-10 plan for `f.rep`.
async fn approved_plan(f: &Fixture) -> WeeklyPlan {
  let plan = f.store.create_plan(f.rep.clone(), new_plan(10)).await.unwrap();
  f.store
    .approve_plan(f.manager.clone(), plan.plan_id)
    .await
    .unwrap()
    .plan
}

// ─── Plans ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn week_number_bounds() {
  let f = fixture().await;
  for week in [0, 54] {
    let err = f.store.create_plan(f.rep.clone(), new_plan(week)).await.unwrap_err();
    assert!(matches!(core(err), CoreError::Validation(_)), "week {week}");
  }
  for week in [1, 53] {
    let plan = f.store.create_plan(f.rep.clone(), new_plan(week)).await.unwrap();
    assert_eq!(i64::from(plan.week_number), week);
    assert_eq!(plan.status, PlanStatus::Pending);
  }
}

#[tokio::test]
async fn other_objective_is_required() {
  let f = fixture().await;
  let mut input = new_plan(10);
  input.details.visit_objective = "Other".into();
  let err = f.store.create_plan(f.rep.clone(), input).await.unwrap_err();
  assert!(matches!(core(err), CoreError::Validation(_)));
}

#[tokio::test]
async fn manager_may_file_for_a_rep() {
  let f = fixture().await;
  let mut input = new_plan(10);
  input.rep_id = Some(f.rep.rep_id);
  let plan = f.store.create_plan(f.manager.clone(), input).await.unwrap();
  assert_eq!(plan.rep_id, f.rep.rep_id);

  let mut input = new_plan(10);
  input.rep_id = Some(f.manager.rep_id);
  let plan = f.store.create_plan(f.rep.clone(), input).await.unwrap();
  assert_eq!(plan.rep_id, f.rep.rep_id, "reps cannot file for others");

  let mut input = new_plan(10);
  input.rep_id = Some(999);
  let err = f.store.create_plan(f.manager.clone(), input).await.unwrap_err();
  assert!(matches!(core(err), CoreError::NotFound { .. }));
}

#[tokio::test]
async fn only_managers_approve() {
  let f = fixture().await;
  let plan = f.store.create_plan(f.rep.clone(), new_plan(10)).await.unwrap();

  let err = f.store.approve_plan(f.rep.clone(), plan.plan_id).await.unwrap_err();
  assert!(matches!(core(err), CoreError::Forbidden(_)));

  let approval = f.store.approve_plan(f.manager.clone(), plan.plan_id).await.unwrap();
  assert_eq!(approval.plan.status, PlanStatus::Approved);
}

#[tokio::test]
async fn approval_archives_and_snapshots() {
  let f = fixture().await;
  let plan = f.store.create_plan(f.rep.clone(), new_plan(10)).await.unwrap();

  let approval = f.store.approve_plan(f.manager.clone(), plan.plan_id).await.unwrap();
  assert_eq!(approval.plan.status, PlanStatus::Approved);
  assert!(approval.plan.deletion.is_deleted);
  assert_eq!(approval.plan.deletion.deleted_by, Some(f.rep.rep_id));
  assert!(approval.warning.is_none());

  let snapshot = approval.snapshot.expect("snapshot written");
  assert_eq!(snapshot.rep_id, f.rep.rep_id);
  assert_eq!(i64::from(snapshot.week_number), 10);
  assert_eq!(snapshot.counters.total_visits, 0);
  assert_eq!(snapshot.details.status, "Approved");
  assert_eq!(snapshot.details.targeted_line, "Cardio");

  let stored = f.store.get_plan(f.rep.clone(), plan.plan_id).await.unwrap();
  assert!(stored.deletion.is_deleted);
  assert_eq!(snapshots(&f, 10).await.len(), 1);
}

#[tokio::test]
async fn repeated_approval_keeps_one_snapshot() {
  let f = fixture().await;
  let plan = f.store.create_plan(f.rep.clone(), new_plan(10)).await.unwrap();

  let first = f.store.approve_plan(f.manager.clone(), plan.plan_id).await.unwrap();
  let second = f.store.approve_plan(f.manager.clone(), plan.plan_id).await.unwrap();

  assert!(second.plan.deletion.is_deleted);
  assert_eq!(
    first.snapshot.unwrap().snapshot_id,
    second.snapshot.unwrap().snapshot_id
  );
  assert_eq!(snapshots(&f, 10).await.len(), 1);
}

#[tokio::test]
async fn rejection_is_terminal() {
  let f = fixture().await;
  let plan = f.store.create_plan(f.rep.clone(), new_plan(10)).await.unwrap();

  let rejected = f.store.reject_plan(f.manager.clone(), plan.plan_id).await.unwrap();
  assert_eq!(rejected.status, PlanStatus::Rejected);
  assert!(!rejected.deletion.is_deleted);

  // Rejecting again is a no-op; approving is not allowed.
  f.store.reject_plan(f.manager.clone(), plan.plan_id).await.unwrap();
  let err = f.store.approve_plan(f.manager.clone(), plan.plan_id).await.unwrap_err();
  assert!(matches!(core(err), CoreError::Validation(_)));

  let listed = f
    .store
    .list_plans(f.rep.clone(), PlanFilter {
      status: Some(PlanStatus::Rejected),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(listed.len(), 1);
  assert!(snapshots(&f, 10).await.is_empty());
}

#[tokio::test]
async fn rejecting_an_approved_plan_fails() {
  let f = fixture().await;
  let plan = approved_plan(&f).await;
  let err = f.store.reject_plan(f.manager.clone(), plan.plan_id).await.unwrap_err();
  assert!(matches!(core(err), CoreError::Validation(_)));
}

#[tokio::test]
async fn missing_plan_is_not_found() {
  let f = fixture().await;
  let err = f.store.approve_plan(f.manager.clone(), 404).await.unwrap_err();
  assert!(matches!(core(err), CoreError::NotFound { id: 404, .. }));
}

#[tokio::test]
async fn plan_archive_requires_owner() {
  let f = fixture().await;
  let plan = f.store.create_plan(f.rep.clone(), new_plan(10)).await.unwrap();

  let err = f.store.archive_plan(f.other.clone(), plan.plan_id).await.unwrap_err();
  assert!(matches!(core(err), CoreError::Forbidden(_)));

  let archived = f.store.archive_plan(f.rep.clone(), plan.plan_id).await.unwrap();
  assert!(archived.deletion.is_deleted);
  assert_eq!(archived.status, PlanStatus::Pending);
}

// ─── Start from plan ─────────────────────────────────────────────────────────

#[tokio::test]
async fn start_from_plan_creates_linked_visit() {
  let f = fixture().await;
  let plan = approved_plan(&f).await;

  let visit = f.store.start_from_plan(f.rep.clone(), plan.plan_id).await.unwrap();
  assert_eq!(visit.weekly_plan_id, Some(plan.plan_id));
  assert_eq!(visit.rep_id, f.rep.rep_id);
  assert_eq!(visit.week_number.map(i64::from), Some(10));
  assert_eq!(visit.visit_date, day(2));
  assert_eq!(visit.entity, "12 Tahrir St");
  assert!(!visit.deletion.is_deleted);
  assert!(visit.last_change.ends_with("rami created"));
}

#[tokio::test]
async fn start_from_plan_is_idempotent() {
  let f = fixture().await;
  let plan = approved_plan(&f).await;

  let first = f.store.start_from_plan(f.rep.clone(), plan.plan_id).await.unwrap();
  let second = f.store.start_from_plan(f.rep.clone(), plan.plan_id).await.unwrap();
  assert_eq!(first.visit_id, second.visit_id);

  let all = f
    .store
    .list_visits(f.rep.clone(), VisitFilter { show: Show::All, ..Default::default() })
    .await
    .unwrap();
  assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn start_from_plan_restores_archived_visit() {
  let f = fixture().await;
  let plan = approved_plan(&f).await;
  let visit = f.store.start_from_plan(f.rep.clone(), plan.plan_id).await.unwrap();

  let archived = f.store.archive_visit(f.rep.clone(), visit.visit_id).await.unwrap();
  assert!(archived.deletion.is_deleted);

  let restored = f.store.start_from_plan(f.rep.clone(), plan.plan_id).await.unwrap();
  assert_eq!(restored.visit_id, visit.visit_id);
  assert!(!restored.deletion.is_deleted);
  assert_eq!(restored.deletion.deleted_at, None);
}

#[tokio::test]
async fn start_from_plan_checks_owner_and_status() {
  let f = fixture().await;
  let plan = approved_plan(&f).await;
  let err = f.store.start_from_plan(f.other.clone(), plan.plan_id).await.unwrap_err();
  assert!(matches!(core(err), CoreError::Forbidden(_)));

  let pending = f.store.create_plan(f.rep.clone(), new_plan(11)).await.unwrap();
  let err = f.store.start_from_plan(f.rep.clone(), pending.plan_id).await.unwrap_err();
  assert!(matches!(core(err), CoreError::Validation(_)));
}

#[tokio::test]
async fn start_from_plan_repairs_duplicate_snapshots() {
  let f = fixture().await;
  let plan = approved_plan(&f).await;
  exec(
    &f.store,
    format!(
      "INSERT INTO archive_snapshots (rep_id, week_number, total_visits, archived_at)
       VALUES ({}, 10, 2, '2026-03-02T00:00:00+00:00')",
      f.rep.rep_id
    ),
  )
  .await;
  assert_eq!(snapshots(&f, 10).await.len(), 2);

  f.store.start_from_plan(f.rep.clone(), plan.plan_id).await.unwrap();
  let rows = snapshots(&f, 10).await;
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].counters.total_visits, 2);
}

// ─── Visits ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn terminal_status_cascades_to_plan_and_snapshot() {
  let f = fixture().await;
  let plan = approved_plan(&f).await;
  let visit = f.store.start_from_plan(f.rep.clone(), plan.plan_id).await.unwrap();

  let saved = f
    .store
    .save_visit(f.rep.clone(), VisitInput {
      visit_id: Some(visit.visit_id),
      visit_status: Some("Done".into()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert!(saved.deletion.is_deleted);
  assert!(saved.last_change.ends_with("rami auto-archived via save"));

  let plan = f.store.get_plan(f.rep.clone(), plan.plan_id).await.unwrap();
  assert!(plan.deletion.is_deleted);

  let rows = snapshots(&f, 10).await;
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].counters.total_visits, 1);
  assert_eq!(rows[0].details.status, "Completed");
}

#[tokio::test]
async fn archive_flag_archives_regardless_of_status() {
  let f = fixture().await;
  let plan = approved_plan(&f).await;
  let visit = f.store.start_from_plan(f.rep.clone(), plan.plan_id).await.unwrap();

  let saved = f
    .store
    .save_visit(f.rep.clone(), VisitInput {
      visit_id: Some(visit.visit_id),
      visit_status: Some("rescheduled".into()),
      mark_done: true,
      ..Default::default()
    })
    .await
    .unwrap();
  assert!(saved.deletion.is_deleted);
}

#[tokio::test]
async fn non_terminal_save_records_changes() {
  let f = fixture().await;
  let plan = approved_plan(&f).await;
  let visit = f.store.start_from_plan(f.rep.clone(), plan.plan_id).await.unwrap();

  let saved = f
    .store
    .save_visit(f.rep.clone(), VisitInput {
      visit_id: Some(visit.visit_id),
      phone: Some("0100".into()),
      visit_status: Some("pending".into()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert!(!saved.deletion.is_deleted);
  assert!(
    saved
      .last_change
      .contains("rami edited | Phone: — → 0100; Visit Status: — → pending"),
    "{}",
    saved.last_change
  );
}

#[tokio::test]
async fn rep_visits_need_an_owned_approved_plan() {
  let f = fixture().await;
  let plan = approved_plan(&f).await;
  let pending = f.store.create_plan(f.rep.clone(), new_plan(11)).await.unwrap();
  let foreign = {
    let p = f.store.create_plan(f.other.clone(), new_plan(10)).await.unwrap();
    f.store.approve_plan(f.manager.clone(), p.plan_id).await.unwrap().plan
  };

  let base = VisitInput { visit_date: Some(day(3)), ..Default::default() };

  let cases = [
    None,
    Some(pending.plan_id),
    Some(foreign.plan_id),
  ];
  for plan_id in cases {
    let input = VisitInput { weekly_plan_id: plan_id, ..base.clone() };
    let err = f.store.save_visit(f.rep.clone(), input).await.unwrap_err();
    assert!(matches!(core(err), CoreError::Validation(_)), "{plan_id:?}");
  }

  let mismatched = VisitInput {
    weekly_plan_id: Some(plan.plan_id),
    week_check: Some(11),
    ..base.clone()
  };
  let err = f.store.save_visit(f.rep.clone(), mismatched).await.unwrap_err();
  assert!(matches!(core(err), CoreError::Validation(_)));

  let ok = VisitInput { weekly_plan_id: Some(plan.plan_id), week_check: Some(10), ..base };
  let visit = f.store.save_visit(f.rep.clone(), ok).await.unwrap();
  assert_eq!(visit.week_number.map(i64::from), Some(10));
}

#[tokio::test]
async fn manager_visits_skip_plan_check_and_need_a_date() {
  let f = fixture().await;

  let err = f
    .store
    .save_visit(f.manager.clone(), VisitInput {
      rep_id: Some(f.rep.rep_id),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::Validation(_)));

  let at = day(4).and_hms_opt(10, 30, 0).unwrap().and_utc();
  let visit = f
    .store
    .save_visit(f.manager.clone(), VisitInput {
      rep_id: Some(f.rep.rep_id),
      actual_datetime: Some(at),
      entity: Some("Nile Clinic".into()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(visit.rep_id, f.rep.rep_id);
  assert_eq!(visit.visit_date, day(4));
  assert_eq!(visit.weekly_plan_id, None);
}

#[tokio::test]
async fn visits_fill_blanks_from_client() {
  let f = fixture().await;
  let plan = approved_plan(&f).await;
  let client = f
    .store
    .save_client(f.rep.clone(), ClientInput {
      doctor_name: Some("Dr. Samir".into()),
      city: Some("Giza".into()),
      phone: Some("0122".into()),
      week_number: Some(10),
      ..Default::default()
    })
    .await
    .unwrap();

  let visit = f
    .store
    .save_visit(f.rep.clone(), VisitInput {
      weekly_plan_id: Some(plan.plan_id),
      client_id: Some(client.client_id),
      visit_date: Some(day(3)),
      phone: Some("0155".into()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(visit.client_id, Some(client.client_id));
  assert_eq!(visit.client_doctor, "Dr. Samir");
  assert_eq!(visit.city, "Giza");
  assert_eq!(visit.phone, "0155", "explicit values win");
}

#[tokio::test]
async fn visits_are_private_to_their_rep() {
  let f = fixture().await;
  let plan = approved_plan(&f).await;
  let visit = f.store.start_from_plan(f.rep.clone(), plan.plan_id).await.unwrap();

  let err = f.store.get_visit(f.other.clone(), visit.visit_id).await.unwrap_err();
  assert!(matches!(core(err), CoreError::Forbidden(_)));
  let err = f.store.archive_visit(f.other.clone(), visit.visit_id).await.unwrap_err();
  assert!(matches!(core(err), CoreError::Forbidden(_)));

  let theirs = f.store.list_visits(f.other.clone(), VisitFilter::default()).await.unwrap();
  assert!(theirs.is_empty());
  let all = f.store.list_visits(f.manager.clone(), VisitFilter::default()).await.unwrap();
  assert_eq!(all.len(), 1);
}

// ─── Clients ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn clients_need_a_week() {
  let f = fixture().await;
  let err = f
    .store
    .save_client(f.rep.clone(), ClientInput {
      doctor_name: Some("Dr. Samir".into()),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::Validation(_)));

  let err = f
    .store
    .save_client(f.rep.clone(), ClientInput {
      week_number: Some(60),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::Validation(_)));
}

#[tokio::test]
async fn client_for_archived_week_leaves_snapshot_alone() {
  let f = fixture().await;
  approved_plan(&f).await;

  let client = f
    .store
    .save_client(f.rep.clone(), ClientInput {
      doctor_name: Some("Dr. Samir".into()),
      week_number: Some(10),
      ..Default::default()
    })
    .await
    .unwrap();
  assert!(client.deletion.is_deleted);
  assert_eq!(client.deletion.deleted_by, Some(f.rep.rep_id));

  let rows = snapshots(&f, 10).await;
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].counters.total_visits, 0);
}

#[tokio::test]
async fn client_folds_in_a_visit() {
  let f = fixture().await;
  let plan = approved_plan(&f).await;
  let visit = f.store.start_from_plan(f.rep.clone(), plan.plan_id).await.unwrap();

  let client = f
    .store
    .save_client(f.rep.clone(), ClientInput {
      daily_visit_id: Some(visit.visit_id),
      doctor_name: Some("Dr. Samir".into()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(i64::from(client.week_number), 10);
  assert!(client.deletion.is_deleted);

  let visit = f.store.get_visit(f.rep.clone(), visit.visit_id).await.unwrap();
  assert_eq!(visit.client_id, Some(client.client_id));
  assert!(visit.deletion.is_deleted);

  let rows = snapshots(&f, 10).await;
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].counters.total_visits, 1);
  assert_eq!(rows[0].counters.unique_clients, 1);

  // The visit cannot be folded twice.
  let err = f
    .store
    .save_client(f.rep.clone(), ClientInput {
      daily_visit_id: Some(visit.visit_id),
      week_number: Some(10),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::Validation(_)));
}

#[tokio::test]
async fn client_save_archives_an_active_approved_week() {
  let f = fixture().await;
  let plan = approved_plan(&f).await;
  let visit = f.store.start_from_plan(f.rep.clone(), plan.plan_id).await.unwrap();
  exec(
    &f.store,
    format!(
      "UPDATE weekly_plans SET is_deleted = 0, deleted_at = NULL, deleted_by = NULL
       WHERE plan_id = {}",
      plan.plan_id
    ),
  )
  .await;

  f.store
    .save_client(f.rep.clone(), ClientInput {
      doctor_name: Some("Dr. Samir".into()),
      week_number: Some(10),
      ..Default::default()
    })
    .await
    .unwrap();

  let plan = f.store.get_plan(f.rep.clone(), plan.plan_id).await.unwrap();
  assert!(plan.deletion.is_deleted);
  let visit = f.store.get_visit(f.rep.clone(), visit.visit_id).await.unwrap();
  assert!(visit.deletion.is_deleted);
  assert!(visit.last_change.ends_with("auto-archived via client save"));

  let rows = snapshots(&f, 10).await;
  assert_eq!(rows[0].counters.total_visits, 1);
}

#[tokio::test]
async fn client_update_keeps_week_and_owner() {
  let f = fixture().await;
  let client = f
    .store
    .save_client(f.rep.clone(), ClientInput {
      doctor_name: Some("Dr. Samir".into()),
      week_number: Some(12),
      ..Default::default()
    })
    .await
    .unwrap();

  let updated = f
    .store
    .save_client(f.rep.clone(), ClientInput {
      client_id: Some(client.client_id),
      city: Some("Alexandria".into()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(updated.city, "Alexandria");
  assert_eq!(updated.doctor_name, "Dr. Samir");
  assert_eq!(i64::from(updated.week_number), 12);

  let err = f
    .store
    .save_client(f.other.clone(), ClientInput {
      client_id: Some(client.client_id),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::Forbidden(_)));
}

// ─── Finalize ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn finalize_archives_all_three_with_one_stamp() {
  let f = fixture().await;
  let plan = approved_plan(&f).await;
  let visit = f.store.start_from_plan(f.rep.clone(), plan.plan_id).await.unwrap();
  let client = f
    .store
    .save_client(f.rep.clone(), ClientInput {
      week_number: Some(10),
      ..Default::default()
    })
    .await
    .unwrap();

  let done = f
    .store
    .finalize_triplet(f.rep.clone(), FinalizeRequest {
      client_id: Some(client.client_id),
      plan_id:   Some(plan.plan_id),
      visit_id:  Some(visit.visit_id),
    })
    .await
    .unwrap();

  assert!(done.client.deletion.is_deleted);
  assert!(done.plan.deletion.is_deleted);
  assert!(done.visit.deletion.is_deleted);
  assert_eq!(done.client.deletion.deleted_at, done.plan.deletion.deleted_at);
  assert_eq!(done.plan.deletion.deleted_at, done.visit.deletion.deleted_at);
  assert_eq!(done.visit.deletion.deleted_by, Some(f.rep.rep_id));

  let stored = f.store.get_visit(f.rep.clone(), visit.visit_id).await.unwrap();
  assert_eq!(stored.deletion, done.visit.deletion);
}

#[tokio::test]
async fn finalize_rejections() {
  let f = fixture().await;
  let plan = approved_plan(&f).await;
  let visit = f.store.start_from_plan(f.rep.clone(), plan.plan_id).await.unwrap();
  let client = f
    .store
    .save_client(f.rep.clone(), ClientInput {
      week_number: Some(10),
      ..Default::default()
    })
    .await
    .unwrap();
  let full = FinalizeRequest {
    client_id: Some(client.client_id),
    plan_id:   Some(plan.plan_id),
    visit_id:  Some(visit.visit_id),
  };

  let missing = FinalizeRequest { visit_id: None, ..full.clone() };
  let err = f.store.finalize_triplet(f.rep.clone(), missing).await.unwrap_err();
  assert!(matches!(core(err), CoreError::Validation(_)));

  let unknown = FinalizeRequest { plan_id: Some(999), ..full.clone() };
  let err = f.store.finalize_triplet(f.rep.clone(), unknown).await.unwrap_err();
  assert!(matches!(core(err), CoreError::NotFound { id: 999, .. }));

  let err = f.store.finalize_triplet(f.other.clone(), full.clone()).await.unwrap_err();
  assert!(matches!(core(err), CoreError::Forbidden(_)));

  // Nothing was touched by the failed attempts.
  let visit = f.store.get_visit(f.rep.clone(), visit.visit_id).await.unwrap();
  assert!(!visit.deletion.is_deleted);

  f.store.finalize_triplet(f.manager.clone(), full).await.unwrap();
}

// ─── Archive maintenance ─────────────────────────────────────────────────────

#[tokio::test]
async fn merge_sums_duplicate_counters() {
  let f = fixture().await;
  for total in [3, 5] {
    exec(
      &f.store,
      format!(
        "INSERT INTO archive_snapshots
           (rep_id, week_number, total_visits, unique_clients, archived_at)
         VALUES ({}, 10, {total}, 1, '2026-03-02T00:00:00+00:00')",
        f.rep.rep_id
      ),
    )
    .await;
  }

  let report = f
    .store
    .merge_duplicates(f.manager.clone(), f.rep.rep_id, 10)
    .await
    .unwrap();
  assert_eq!(report.removed.len(), 1);
  let canonical = report.canonical.unwrap();
  assert_eq!(canonical.counters.total_visits, 8);
  assert_eq!(canonical.counters.unique_clients, 2);

  let rows = snapshots(&f, 10).await;
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].snapshot_id, canonical.snapshot_id);
  assert_eq!(rows[0].counters.total_visits, 8);

  let again = f
    .store
    .merge_duplicates(f.manager.clone(), f.rep.rep_id, 10)
    .await
    .unwrap();
  assert!(!again.merged());
  assert_eq!(again.canonical.unwrap().counters.total_visits, 8);

  let err = f
    .store
    .merge_duplicates(f.rep.clone(), f.rep.rep_id, 10)
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::Forbidden(_)));
}

#[tokio::test]
async fn snapshot_failure_does_not_block_approval() {
  let f = fixture().await;
  let plan = f.store.create_plan(f.rep.clone(), new_plan(10)).await.unwrap();
  exec(&f.store, "DROP TABLE archive_snapshots".into()).await;

  let approval = f.store.approve_plan(f.manager.clone(), plan.plan_id).await.unwrap();
  assert_eq!(approval.plan.status, PlanStatus::Approved);
  assert!(approval.plan.deletion.is_deleted);
  assert!(approval.snapshot.is_none());
  assert!(approval.warning.is_some());

  let stored = f.store.get_plan(f.manager.clone(), plan.plan_id).await.unwrap();
  assert_eq!(stored.status, PlanStatus::Approved);
  assert!(stored.deletion.is_deleted);
}

#[tokio::test]
async fn sync_rebuilds_snapshots() {
  let f = fixture().await;
  approved_plan(&f).await;
  let week_eleven = f.store.create_plan(f.rep.clone(), new_plan(11)).await.unwrap();
  f.store
    .approve_plan(f.manager.clone(), week_eleven.plan_id)
    .await
    .unwrap();

  exec(&f.store, "DELETE FROM archive_snapshots WHERE week_number = 11".into()).await;
  exec(
    &f.store,
    format!(
      "INSERT INTO archive_snapshots (rep_id, week_number, total_visits, archived_at)
       VALUES ({}, 10, 4, '2026-03-02T00:00:00+00:00')",
      f.rep.rep_id
    ),
  )
  .await;

  let report = f.store.sync_archives(f.manager.clone()).await.unwrap();
  assert_eq!(report.created, 1);
  assert_eq!(report.touched, 1);
  assert_eq!(report.merged, 1);

  assert_eq!(snapshots(&f, 10).await.len(), 1);
  assert_eq!(snapshots(&f, 10).await[0].counters.total_visits, 4);
  assert_eq!(snapshots(&f, 11).await.len(), 1);

  let err = f.store.sync_archives(f.rep.clone()).await.unwrap_err();
  assert!(matches!(core(err), CoreError::Forbidden(_)));
}

// ─── Reads ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn plan_lists_respect_show_and_owner() {
  let f = fixture().await;
  approved_plan(&f).await;
  f.store.create_plan(f.rep.clone(), new_plan(11)).await.unwrap();
  f.store.create_plan(f.other.clone(), new_plan(11)).await.unwrap();

  let list = |actor: &Actor, show| {
    let actor = actor.clone();
    let store = f.store.clone();
    async move {
      store
        .list_plans(actor, PlanFilter { show, ..Default::default() })
        .await
        .unwrap()
    }
  };

  assert_eq!(list(&f.rep, Show::Active).await.len(), 1);
  assert_eq!(list(&f.rep, Show::Deleted).await.len(), 1);
  assert_eq!(list(&f.rep, Show::All).await.len(), 2);
  assert_eq!(list(&f.manager, Show::All).await.len(), 3);

  let found = f
    .store
    .list_plans(f.manager.clone(), PlanFilter {
      show: Show::All,
      q: Some("cardio".into()),
      week: Some(10),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(found.len(), 1);
}

#[tokio::test]
async fn approved_weeks_are_scoped() {
  let f = fixture().await;
  approved_plan(&f).await;
  let p = f.store.create_plan(f.other.clone(), new_plan(12)).await.unwrap();
  f.store.approve_plan(f.manager.clone(), p.plan_id).await.unwrap();
  f.store.create_plan(f.rep.clone(), new_plan(13)).await.unwrap();

  let mine: Vec<i64> = f
    .store
    .approved_weeks(f.rep.clone())
    .await
    .unwrap()
    .into_iter()
    .map(i64::from)
    .collect();
  assert_eq!(mine, vec![10]);

  let all = f.store.approved_weeks(f.manager.clone()).await.unwrap();
  assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn archive_reads_are_for_managers() {
  let f = fixture().await;
  approved_plan(&f).await;
  f.store.create_plan(f.rep.clone(), new_plan(11)).await.unwrap();

  let err = f
    .store
    .list_snapshots(f.rep.clone(), SnapshotFilter::default())
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::Forbidden(_)));
  let err = f.store.summary(f.rep.clone()).await.unwrap_err();
  assert!(matches!(core(err), CoreError::Forbidden(_)));

  let summary = f.store.summary(f.manager.clone()).await.unwrap();
  assert_eq!(summary.pending_plans, 1);
  assert_eq!(summary.snapshots, 1);
  assert_eq!(summary.archived_visits, 0);
}

#[tokio::test]
async fn credentials_lookup() {
  let f = fixture().await;
  let creds = f.store.find_credentials("rami".into()).await.unwrap().unwrap();
  assert_eq!(creds.actor, f.rep);
  assert_eq!(creds.password_hash, "$argon2id$unused");
  assert!(f.store.find_credentials("nobody".into()).await.unwrap().is_none());

  let dup = f.store.add_rep("rami".into(), Role::Rep, "x".into()).await;
  assert!(dup.is_err());
}
