// The local dashboard: a single page, and a JSON API recomputing the statistics on every
// request from the dataset loaded at startup.

use actix_web::{get, web, App, HttpResponse, HttpServer, Responder};

use crate::survey::*;

const DASHBOARD_HTML: &str = include_str!("dashboard.html");

pub struct DashboardState {
    pub dataset: Dataset,
    pub config: SurveyConfig,
    pub rules: AnalysisRules,
}

#[derive(Deserialize)]
struct CrosstabQuery {
    row: String,
    col: String,
}

#[derive(Deserialize)]
struct DistributionQuery {
    column: String,
}

fn error_message(e: &SurveyError) -> String {
    match e {
        SurveyError::Analysis { source } => source.to_string(),
        other => other.to_string(),
    }
}

/// Invalid requests answer 400. The statistics that cannot be computed are reported
/// inside the 200 answer.
fn respond(state: &DashboardState, request: Request) -> HttpResponse {
    match run_request(&state.dataset, &state.config, &state.rules, &request) {
        Ok(js) => HttpResponse::Ok().json(js),
        Err(e) => {
            let message = error_message(&e);
            warn!("respond: {:?}: {}", request, message);
            HttpResponse::BadRequest().json(json!({ "error": message }))
        }
    }
}

#[get("/")]
async fn index() -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(DASHBOARD_HTML)
}

#[get("/summary")]
async fn summary(data: web::Data<DashboardState>) -> impl Responder {
    let results = match run_request(&data.dataset, &data.config, &data.rules, &Request::Summary) {
        Ok(js) => js,
        Err(e) => return HttpResponse::InternalServerError().body(error_message(&e)),
    };
    HttpResponse::Ok().json(build_summary_js(&data.config, results))
}

#[get("/variables")]
async fn variables(data: web::Data<DashboardState>) -> impl Responder {
    HttpResponse::Ok().json(report::variables_to_json(&data.dataset, &data.config))
}

#[get("/crosstab")]
async fn crosstab(
    data: web::Data<DashboardState>,
    query: web::Query<CrosstabQuery>,
) -> impl Responder {
    let q = query.into_inner();
    debug!("crosstab: {:?} x {:?}", q.row, q.col);
    respond(
        &data,
        Request::Crosstab {
            row: q.row,
            col: q.col,
        },
    )
}

#[get("/distribution")]
async fn distribution(
    data: web::Data<DashboardState>,
    query: web::Query<DistributionQuery>,
) -> impl Responder {
    let q = query.into_inner();
    debug!("distribution: {:?}", q.column);
    respond(&data, Request::Distribution { column: q.column })
}

#[get("/battery")]
async fn battery(data: web::Data<DashboardState>) -> impl Responder {
    respond(&data, Request::Battery)
}

pub fn app_config(cfg: &mut web::ServiceConfig) {
    cfg.service(index).service(
        web::scope("/api")
            .service(summary)
            .service(variables)
            .service(crosstab)
            .service(distribution)
            .service(battery),
    );
}

pub async fn serve(state: DashboardState, port: u16) -> std::io::Result<()> {
    let data = web::Data::new(state);
    info!(
        "Dashboard for {:?} available at http://127.0.0.1:{}",
        data.config.output_settings.survey_name, port
    );
    HttpServer::new(move || App::new().app_data(data.clone()).configure(app_config))
        .workers(1)
        .bind(("127.0.0.1", port))?
        .run()
        .await
}
