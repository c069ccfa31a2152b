// handlers/protected/boards/mod.rs - Notice boards
//
// boardCode: 0 school notice, 1 academic, 2 department (admins post),
// 3 professor notice (professors and admins post). Everyone signed in reads.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};

use crate::app::AppState;
use crate::database::models::Board;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::board_service::{BoardList, BoardListQuery, CreateBoardRequest, UpdateBoardRequest};

/// POST /api/boards/list - `{boardCode?, page, size}`, newest first.
pub async fn list_post(
    State(state): State<AppState>,
    payload: Result<Json<BoardListQuery>, JsonRejection>,
) -> ApiResult<BoardList> {
    let Json(query) = payload?;
    let boards = state.boards().list(&query).await?;
    Ok(ApiResponse::success(boards))
}

/// POST /api/boards/create - `{boardCode, title, content}`, title 1..=100 chars.
pub async fn create_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CreateBoardRequest>, JsonRejection>,
) -> ApiResult<Board> {
    let Json(request) = payload?;
    let board = state.boards().create(&user, request).await?;
    Ok(ApiResponse::created(board))
}

/// POST /api/boards/:id - Post detail; counts as a view.
pub async fn detail_post(State(state): State<AppState>, Path(board_idx): Path<i64>) -> ApiResult<Board> {
    let board = state.boards().detail(board_idx).await?;
    Ok(ApiResponse::success(board))
}

/// POST /api/boards/update/:id - Author or admin edits title and/or content.
pub async fn update_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(board_idx): Path<i64>,
    payload: Result<Json<UpdateBoardRequest>, JsonRejection>,
) -> ApiResult<Board> {
    let Json(request) = payload?;
    let board = state.boards().update(&user, board_idx, request).await?;
    Ok(ApiResponse::success(board))
}
