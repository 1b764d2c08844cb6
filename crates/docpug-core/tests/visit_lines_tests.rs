//! Line editing integration tests against the in-memory server.

use std::sync::Arc;

use docpug_core::api::{ApiError, MemoryApi};
use docpug_core::config::CoreConfig;
use docpug_core::context::ClinicContext;
use docpug_core::export::{expand_service_lines, lines_total};
use docpug_core::models::{LineRef, VisitDraft};
use docpug_core::store::StoreError;
use serde_json::json;

fn setup() -> (Arc<MemoryApi>, ClinicContext) {
    let api = Arc::new(MemoryApi::new());
    let ctx = ClinicContext::in_memory(CoreConfig::default(), api.clone()).unwrap();
    (api, ctx)
}

fn new_visit(ctx: &mut ClinicContext) -> String {
    let draft = VisitDraft {
        pet_id: "7".into(),
        date: "2024-06-12".into(),
        complaint: "Кульгає на ліву лапу".into(),
        ..Default::default()
    };
    ctx.visits_mut().create(&draft).unwrap().id
}

fn qty_on_hand(ctx: &ClinicContext, id: &str) -> f64 {
    ctx.stock().require(id).unwrap().qty
}

#[test]
fn test_service_line_expands_with_snapshot_totals() {
    let (_api, mut ctx) = setup();
    let visit_id = new_visit(&mut ctx);

    let visit = ctx.lines().add_service_line(&visit_id, "svc_exam", 2.0).unwrap();
    assert_eq!(visit.services.len(), 1);

    let catalog = ctx.line_catalog().unwrap();
    let lines = expand_service_lines(&visit.services, &catalog);
    assert_eq!(lines[0].name, "Огляд");
    assert_eq!(lines[0].price, 500.0);
    assert_eq!(lines[0].qty, 2.0);
    assert_eq!(lines[0].line_total, 1000.0);
    assert_eq!(lines_total(&lines), 1000.0);
}

#[test]
fn test_catalog_edit_does_not_reprice_existing_line() {
    let (_api, mut ctx) = setup();
    let visit_id = new_visit(&mut ctx);

    ctx.lines().add_service_line(&visit_id, "svc_exam", 2.0).unwrap();
    ctx.services().update("svc_exam", "Огляд лікаря", 650.0).unwrap();

    let visit = ctx.visits_mut().fetch(&visit_id).unwrap();
    let catalog = ctx.line_catalog().unwrap();
    let lines = expand_service_lines(&visit.services, &catalog);
    assert_eq!(lines[0].name, "Огляд");
    assert_eq!(lines[0].line_total, 1000.0);

    // New lines pick up the new price.
    let visit = ctx.lines().add_service_line(&visit_id, "svc_exam", 1.0).unwrap();
    let lines = expand_service_lines(&visit.services, &catalog);
    assert_eq!(lines[1].price, 650.0);
}

#[test]
fn test_remove_legacy_stock_line_restores_registry() {
    let (api, mut ctx) = setup();
    api.insert_raw_visit(json!({
        "id": 31,
        "pet_id": 7,
        "date": "2024-06-01",
        "stock": [{"stockId": "stk_meloxivet", "qty": 3}],
    }))
    .unwrap();
    ctx.stock().set_qty("stk_meloxivet", 7.0).unwrap();

    let visit = ctx
        .lines()
        .remove_stock_line("31", &LineRef::Index(0))
        .unwrap();

    assert!(visit.stock.is_empty());
    assert_eq!(qty_on_hand(&ctx, "stk_meloxivet"), 10.0);

    let stored = api.raw_visit("31").unwrap().unwrap();
    assert_eq!(stored["stock"], json!([]));
    assert_eq!(stored["stock_json"], json!([]));
}

#[test]
fn test_services_json_twin_used_when_services_empty() {
    let (api, mut ctx) = setup();
    api.insert_raw_visit(json!({
        "id": "44",
        "pet_id": "7",
        "date": "2024-06-02",
        "services": [],
        "services_json": [{"lineId": "ln_a", "serviceId": "svc_vax", "qty": 1, "priceSnap": 450}],
    }))
    .unwrap();

    let visit = ctx.visits_mut().fetch("44").unwrap();
    assert_eq!(visit.services.len(), 1);
    assert_eq!(visit.services[0].line_id, "ln_a");
    assert_eq!(visit.services[0].service_id, "svc_vax");
    assert_eq!(visit.services[0].price_snap, Some(450.0));
}

#[test]
fn test_stale_empty_response_keeps_cached_lines() {
    let (api, mut ctx) = setup();
    let visit_id = new_visit(&mut ctx);
    ctx.lines().add_service_line(&visit_id, "svc_exam", 1.0).unwrap();

    let mut record = api.raw_visit(&visit_id).unwrap().unwrap();
    record["services"] = json!([]);
    record["services_json"] = json!([]);
    api.insert_raw_visit(record).unwrap();

    let visit = ctx.visits_mut().fetch(&visit_id).unwrap();
    assert_eq!(visit.services.len(), 1);
}

#[test]
fn test_insufficient_stock_rejected_before_push() {
    let (api, mut ctx) = setup();
    let visit_id = new_visit(&mut ctx);
    let calls = api.call_count().unwrap();

    let err = ctx
        .lines()
        .add_stock_line(&visit_id, "stk_meloxivet", 11.0)
        .unwrap_err();
    assert!(matches!(err, StoreError::InsufficientStock { available, .. } if available == 10.0));
    assert!(err.user_message().contains("Мелоксивет"));

    // Only the fetch reached the server.
    assert_eq!(api.call_count().unwrap(), calls + 1);
    assert_eq!(qty_on_hand(&ctx, "stk_meloxivet"), 10.0);
}

#[test]
fn test_failed_push_surfaces_error_and_keeps_stock() {
    let (api, mut ctx) = setup();
    let visit_id = new_visit(&mut ctx);

    api.fail_next_update(ApiError::Status {
        status: 500,
        body: "boom".into(),
    })
    .unwrap();

    let err = ctx
        .lines()
        .add_stock_line(&visit_id, "stk_meloxivet", 2.0)
        .unwrap_err();
    assert!(matches!(err, StoreError::Api(ApiError::Status { status: 500, .. })));
    assert_eq!(qty_on_hand(&ctx, "stk_meloxivet"), 10.0);

    let visit = ctx.visits_mut().fetch(&visit_id).unwrap();
    assert!(visit.stock.is_empty());
}

#[test]
fn test_remove_by_line_id_keeps_order_of_others() {
    let (_api, mut ctx) = setup();
    let visit_id = new_visit(&mut ctx);

    let mut lines = ctx.lines();
    lines.add_service_line(&visit_id, "svc_exam", 1.0).unwrap();
    let visit = lines.add_service_line(&visit_id, "svc_vax", 1.0).unwrap();
    let middle = visit.services[1].line_id.clone();
    lines.add_service_line(&visit_id, "svc_trip", 1.0).unwrap();

    let visit = lines
        .remove_service_line(&visit_id, &LineRef::Id(middle))
        .unwrap();
    let ids: Vec<&str> = visit.services.iter().map(|l| l.service_id.as_str()).collect();
    assert_eq!(ids, vec!["svc_exam", "svc_trip"]);
}

#[test]
fn test_inactive_service_cannot_be_added() {
    let (_api, mut ctx) = setup();
    let visit_id = new_visit(&mut ctx);

    ctx.services().toggle_active("svc_trip").unwrap();
    let err = ctx
        .lines()
        .add_service_line(&visit_id, "svc_trip", 1.0)
        .unwrap_err();
    assert!(matches!(err, StoreError::InactiveItem { .. }));
}
