use crate::errors::AppError;
use crate::fetch::{LoadError, Phase, RetryFetcher};
use crate::models::MemberCredential;
use crate::state::AppState;
use crate::totals::compute_tab_person_totals;
use crate::ui;
use crate::venmo::encode_component;
use axum::extract::{Path, Query, State};
use axum::response::{Html, Redirect};
use axum::Form;
use serde::Deserialize;
use tracing::{info, trace, warn};

#[derive(Debug, Deserialize)]
pub struct ViewQuery {
    pub t: Option<String>,
    pub join_error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JoinForm {
    pub display_name: String,
}

pub async fn index() -> Html<String> {
    Html(ui::render_index())
}

pub async fn bill_page(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<ViewQuery>,
) -> Html<String> {
    let Some(token) = access_token(&query) else {
        return Html(ui::render_token_required("bill"));
    };

    info!("loading bill {id}");
    let fetcher = RetryFetcher::new();
    let outcome = fetcher
        .run(|| state.api.get_bill(id, &token), log_phase)
        .await;

    match outcome {
        Some(Ok(bill)) => Html(ui::render_bill_page(&bill)),
        outcome => Html(ui::render_load_error(
            "bill",
            load_error(outcome.and_then(Result::err)),
            &format!("/b/{id}?t={}", encode_component(&token)),
        )),
    }
}

pub async fn tab_page(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<ViewQuery>,
) -> Html<String> {
    let Some(token) = access_token(&query) else {
        return Html(ui::render_token_required("tab"));
    };

    info!("loading tab {id}");
    let fetcher = RetryFetcher::new();
    let outcome = fetcher
        .run(|| state.api.get_tab(id, &token), log_phase)
        .await;

    let tab = match outcome {
        Some(Ok(tab)) => tab,
        outcome => {
            return Html(ui::render_load_error(
                "tab",
                load_error(outcome.and_then(Result::err)),
                &format!("/t/{id}?t={}", encode_component(&token)),
            ));
        }
    };

    let person_totals = compute_tab_person_totals(&tab);
    // Secondary data never blocks the page; failures already degraded to
    // empty lists inside the client.
    let images = state.api.get_tab_images(id, &token).await;
    let settlements = if tab.finalized {
        state.api.get_settlements(id, &token).await
    } else {
        Vec::new()
    };
    let members = state.api.get_tab_members(id, &token).await;
    let joined = state.members.get(id);

    Html(ui::render_tab_page(
        &tab,
        &person_totals,
        &settlements,
        &images,
        &members,
        joined.as_ref(),
        state.api.base_url(),
        &token,
        query.join_error.as_deref(),
    ))
}

pub async fn join_tab(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<ViewQuery>,
    Form(form): Form<JoinForm>,
) -> Result<Redirect, AppError> {
    let Some(token) = access_token(&query) else {
        return Ok(Redirect::to(&format!("/t/{id}")));
    };
    let back = format!("/t/{id}?t={}", encode_component(&token));

    let name = form.display_name.trim();
    if name.is_empty() || name.chars().count() > 30 {
        return Ok(join_failed(&back, "Name must be 1-30 characters"));
    }

    match state.api.join_tab(id, &token, name).await {
        Some(joined) => {
            info!("joined tab {id} as {}", joined.display_name);
            state.members.set(
                id,
                MemberCredential {
                    member_token: joined.member_token,
                    display_name: joined.display_name,
                },
            )?;
            Ok(Redirect::to(&back))
        }
        None => {
            warn!("join request for tab {id} rejected by the backend");
            Ok(join_failed(&back, "Failed to join. Please try again."))
        }
    }
}

fn access_token(query: &ViewQuery) -> Option<String> {
    query.t.clone().filter(|token| !token.is_empty())
}

fn join_failed(back: &str, message: &str) -> Redirect {
    Redirect::to(&format!("{back}&join_error={}", encode_component(message)))
}

// A fresh fetcher runs per request, so a sequence can never already be in
// flight; `None` still maps to the generic failure page.
fn load_error(error: Option<LoadError>) -> LoadError {
    error.unwrap_or(LoadError::Failed)
}

fn log_phase(phase: Phase) {
    match phase {
        Phase::Retrying {
            attempt,
            max_attempts,
        } => warn!("backend not ready, retry {attempt} of {max_attempts}"),
        Phase::Progress { percent } => trace!("retry wait {percent:.0}%"),
        Phase::Loading => {}
    }
}
