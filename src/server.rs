use std::sync::Arc;

use anyhow::Error;
use axum::extract::State;
use axum::http::{header::CONTENT_TYPE, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use log::{error, info};

use crate::employee_hours::compute_employee_hours;
use crate::html_report::{render_html_report, PIE_CHART_PATH};
use crate::pie_chart::render_pie_chart;
use crate::upstream::TimeEntryRepository;

/// 集計に失敗した場合にクライアントへ返すメッセージ。
pub const FAILURE_MESSAGE: &str = "Failed to retrieve or process time entries.";

pub const HTML_REPORT_PATH: &str = "/report/html-report";

#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn TimeEntryRepository>,
}

/// エンドポイントをまとめたルーターを返す。
pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route(HTML_REPORT_PATH, get(html_report))
        .route(PIE_CHART_PATH, get(pie_chart))
        .with_state(app_state)
}

/// 失敗の理由はログにだけ出力し、レスポンスには固定のメッセージを返す。
struct ReportFailure(Error);

impl<E: Into<Error>> From<E> for ReportFailure {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ReportFailure {
    fn into_response(self) -> Response {
        error!("{:#}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(CONTENT_TYPE, "text/plain; charset=utf-8")],
            FAILURE_MESSAGE,
        )
            .into_response()
    }
}

// GET /report/html-report
async fn html_report(State(app): State<AppState>) -> Result<Response, ReportFailure> {
    let employee_hours = compute_employee_hours(app.repository.as_ref()).await?;
    let html = render_html_report(&employee_hours);
    info!("html report rendered for {} employees", employee_hours.len());

    Ok((
        StatusCode::OK,
        [(CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
        .into_response())
}

// GET /report/piechart
async fn pie_chart(State(app): State<AppState>) -> Result<Response, ReportFailure> {
    let employee_hours = compute_employee_hours(app.repository.as_ref()).await?;
    let png = render_pie_chart(&employee_hours)?;
    info!("pie chart rendered for {} employees", employee_hours.len());

    Ok((StatusCode::OK, [(CONTENT_TYPE, "image/png")], png).into_response())
}
