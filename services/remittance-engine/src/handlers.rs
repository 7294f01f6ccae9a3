use crate::errors::{EngineError, Result};
use crate::models::{
    ContractResponse, CreateContractRequest, ExportRequest, InitiateCycleRequest,
    ReconcileRequest,
};
use crate::scheduler::Clock;
use crate::AppState;
use actix_web::{web, HttpResponse};
use remittance_core::sniff_content_type;
use serde_json::json;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "remittance-engine",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// ---------- Contracts ----------

pub async fn create_contract(
    state: web::Data<AppState>,
    payload: web::Json<CreateContractRequest>,
) -> Result<HttpResponse> {
    payload
        .validate()
        .map_err(|e| EngineError::Validation(e.to_string()))?;
    let (terms, rules) = payload.to_terms_and_rules()?;

    let (contract, rule_rows) = state
        .db
        .create_contract(
            payload.investor_id,
            &payload.product_code,
            payload.custodial_account_id,
            &terms,
            &rules,
        )
        .await?;

    info!(
        contract_id = %contract.id,
        investor_id = %contract.investor_id,
        method = %contract.method,
        "contract created"
    );

    Ok(HttpResponse::Created().json(ContractResponse {
        contract,
        rules: rule_rows,
    }))
}

pub async fn get_contract(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let contract_id = path.into_inner();

    let contract = state
        .db
        .get_contract(contract_id)
        .await?
        .ok_or(EngineError::ContractNotFound(contract_id))?;
    let rules = state.db.get_rules(contract_id).await?;

    Ok(HttpResponse::Ok().json(ContractResponse { contract, rules }))
}

// ---------- Cycles ----------

pub async fn initiate_cycle(
    state: web::Data<AppState>,
    payload: web::Json<InitiateCycleRequest>,
) -> Result<HttpResponse> {
    let contract = state
        .db
        .get_contract(payload.contract_id)
        .await?
        .ok_or(EngineError::ContractNotFound(payload.contract_id))?;

    if !contract.active {
        return Err(EngineError::Validation(format!(
            "contract {} is inactive",
            contract.id
        )));
    }

    let cycle = state
        .scheduler
        .ensure_current_cycle(&contract, state.clock.today())
        .await?;

    Ok(HttpResponse::Created().json(cycle))
}

pub async fn get_cycle(state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse> {
    let cycle_id = path.into_inner();

    let cycle = state
        .db
        .get_cycle(cycle_id)
        .await?
        .ok_or(EngineError::CycleNotFound(cycle_id))?;
    let items = state.db.get_items(cycle_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "cycle": cycle,
        "items": items
    })))
}

pub async fn close_cycle(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let cycle = state.scheduler.close_cycle(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(cycle))
}

pub async fn calculate_cycle(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let (cycle, items) = state.scheduler.calculate_cycle(path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(json!({
        "cycle": cycle,
        "items": items
    })))
}

pub async fn lock_cycle(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let (cycle, items) = state.scheduler.lock_cycle(path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(json!({
        "cycle": cycle,
        "items": items
    })))
}

pub async fn settle_cycle(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let cycle = state.poster.settle(path.into_inner(), "api").await?;
    Ok(HttpResponse::Ok().json(cycle))
}

/// Trigger one scheduler progression pass immediately
pub async fn run_scheduler(state: web::Data<AppState>) -> Result<HttpResponse> {
    let today = state.clock.today();
    state.scheduler.run_once(today).await?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "completed",
        "as_of": today
    })))
}

// ---------- Exports ----------

pub async fn create_export(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    payload: web::Json<ExportRequest>,
) -> Result<HttpResponse> {
    let format = payload.parse_format()?;
    let export = state.exports.generate(path.into_inner(), format).await?;

    Ok(HttpResponse::Created().json(export))
}

/// Download an export artifact as its raw bytes
pub async fn get_export(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let export = state.exports.get(path.into_inner()).await?;
    let content_type = sniff_content_type(&export.content);

    Ok(HttpResponse::Ok()
        .content_type(content_type)
        .insert_header(("X-Content-Hash", export.content_hash.clone()))
        .body(export.content))
}

// ---------- Reconciliation ----------

pub async fn reconcile_cycle(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    payload: web::Json<ReconcileRequest>,
) -> Result<HttpResponse> {
    let snapshot = state
        .recon
        .reconcile(path.into_inner(), &payload.user_id)
        .await?;

    Ok(HttpResponse::Created().json(snapshot))
}

pub async fn list_unbalanced(state: web::Data<AppState>) -> Result<HttpResponse> {
    let snapshots = state.recon.unbalanced().await?;
    Ok(HttpResponse::Ok().json(snapshots))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check)).service(
        web::scope("/api/v1")
            .route("/contracts", web::post().to(create_contract))
            .route("/contracts/{id}", web::get().to(get_contract))
            .route("/cycles/initiate", web::post().to(initiate_cycle))
            .route("/cycles/{id}", web::get().to(get_cycle))
            .route("/cycles/{id}/close", web::post().to(close_cycle))
            .route("/cycles/{id}/calculate", web::post().to(calculate_cycle))
            .route("/cycles/{id}/lock", web::post().to(lock_cycle))
            .route("/cycles/{id}/settle", web::post().to(settle_cycle))
            .route("/cycles/{id}/export", web::post().to(create_export))
            .route("/exports/{id}/download", web::get().to(get_export))
            .route("/scheduler/run", web::post().to(run_scheduler))
            .route("/cycles/{id}/reconcile", web::post().to(reconcile_cycle))
            .route(
                "/reconciliation/unbalanced",
                web::get().to(list_unbalanced),
            ),
    );
}
