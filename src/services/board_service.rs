use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::database::models::{Board, NewBoard, Role};
use crate::database::Store;
use crate::middleware::AuthUser;
use crate::services::{ServiceError, ServiceResult};

pub const NOTICE_SCHOOL: i32 = 0;
pub const NOTICE_ACADEMIC: i32 = 1;
pub const NOTICE_DEPARTMENT: i32 = 2;
pub const NOTICE_PROFESSOR: i32 = 3;

const MAX_TITLE_CHARS: usize = 100;
const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardListQuery {
    pub board_code: Option<i32>,
    #[serde(default)]
    pub page: i64,
    pub size: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardList {
    pub boards: Vec<Board>,
    pub total_elements: i64,
    pub total_pages: i64,
    pub current_page: i64,
    pub page_size: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBoardRequest {
    pub board_code: i32,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBoardRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// Notice boards. School-wide categories are written by admins, professor notices
/// by professors.
pub struct BoardService {
    store: Arc<dyn Store>,
}

impl BoardService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn list(&self, query: &BoardListQuery) -> ServiceResult<BoardList> {
        let page_size = query.size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let page = query.page.max(0);

        let result = self
            .store
            .list_boards(query.board_code, page * page_size, page_size)
            .await?;

        Ok(BoardList {
            total_pages: (result.total_elements + page_size - 1) / page_size,
            total_elements: result.total_elements,
            boards: result.boards,
            current_page: page,
            page_size,
        })
    }

    pub async fn create(&self, user: &AuthUser, request: CreateBoardRequest) -> ServiceResult<Board> {
        let allowed = match request.board_code {
            NOTICE_SCHOOL | NOTICE_ACADEMIC | NOTICE_DEPARTMENT => user.role == Role::Admin,
            NOTICE_PROFESSOR => matches!(user.role, Role::Professor | Role::Admin),
            other => {
                let mut errors = HashMap::new();
                errors.insert("boardCode".to_string(), format!("unknown board code {}", other));
                return Err(ServiceError::Validation(errors));
            }
        };
        if !allowed {
            tracing::warn!("User {} may not post to board {}", user.username, request.board_code);
            return Err(ServiceError::Forbidden(
                "You do not have permission to post on this board".to_string(),
            ));
        }

        let mut errors = HashMap::new();
        let title = request.title.trim();
        validate_title(title, &mut errors);
        if request.content.trim().is_empty() {
            errors.insert("content".to_string(), "is required".to_string());
        }
        if !errors.is_empty() {
            return Err(ServiceError::Validation(errors));
        }

        let writer_name = self
            .store
            .find_user(user.user_id)
            .await?
            .map_or_else(|| user.username.clone(), |u| u.name);

        let board = self
            .store
            .create_board(NewBoard {
                board_code: request.board_code,
                title: title.to_string(),
                content: request.content,
                writer_idx: user.user_id,
                writer_name,
            })
            .await?;

        tracing::info!("Board {} posted by {} in category {}", board.board_idx, user.username, board.board_code);
        Ok(board)
    }

    /// Fetch a post and count the view.
    pub async fn detail(&self, board_idx: i64) -> ServiceResult<Board> {
        self.store
            .view_board(board_idx)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Board {} not found", board_idx)))
    }

    pub async fn update(
        &self,
        user: &AuthUser,
        board_idx: i64,
        request: UpdateBoardRequest,
    ) -> ServiceResult<Board> {
        let board = self
            .store
            .find_board(board_idx)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Board {} not found", board_idx)))?;

        if board.writer_idx != user.user_id && user.role != Role::Admin {
            return Err(ServiceError::Forbidden("Only the author can edit this post".to_string()));
        }

        let mut errors = HashMap::new();
        let title = request.title.map(|t| t.trim().to_string());
        if let Some(title) = &title {
            validate_title(title, &mut errors);
        }
        if request.content.as_deref().is_some_and(|c| c.trim().is_empty()) {
            errors.insert("content".to_string(), "must not be empty".to_string());
        }
        if !errors.is_empty() {
            return Err(ServiceError::Validation(errors));
        }

        let updated = self.store.update_board(board_idx, title, request.content).await?;
        tracing::info!("Board {} updated by {}", board_idx, user.username);
        Ok(updated)
    }
}

fn validate_title(title: &str, errors: &mut HashMap<String, String>) {
    let len = title.chars().count();
    if len == 0 || len > MAX_TITLE_CHARS {
        errors.insert(
            "title".to_string(),
            format!("must be 1 to {} characters", MAX_TITLE_CHARS),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;

    fn user(id: i64, role: Role) -> AuthUser {
        AuthUser {
            user_id: id,
            username: format!("user{}", id),
            role,
        }
    }

    fn post(code: i32, title: &str) -> CreateBoardRequest {
        CreateBoardRequest {
            board_code: code,
            title: title.to_string(),
            content: "body".to_string(),
        }
    }

    #[tokio::test]
    async fn category_permissions() {
        let service = BoardService::new(Arc::new(MemoryStore::new()));
        let professor = user(2, Role::Professor);

        assert!(matches!(
            service.create(&professor, post(NOTICE_SCHOOL, "Campus closed")).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(service.create(&professor, post(NOTICE_PROFESSOR, "Midterm room")).await.is_ok());
        assert!(matches!(
            service.create(&user(3, Role::Student), post(NOTICE_PROFESSOR, "hi")).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.create(&user(1, Role::Admin), post(9, "x")).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn title_length_is_checked() {
        let service = BoardService::new(Arc::new(MemoryStore::new()));
        let admin = user(1, Role::Admin);
        let long = "가".repeat(101);
        assert!(matches!(
            service.create(&admin, post(NOTICE_SCHOOL, &long)).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(service.create(&admin, post(NOTICE_SCHOOL, &"가".repeat(100))).await.is_ok());
    }

    #[tokio::test]
    async fn detail_counts_views_and_update_checks_author() {
        let service = BoardService::new(Arc::new(MemoryStore::new()));
        let author = user(2, Role::Professor);
        let board = service.create(&author, post(NOTICE_PROFESSOR, "Office hours")).await.unwrap();

        service.detail(board.board_idx).await.unwrap();
        let seen = service.detail(board.board_idx).await.unwrap();
        assert_eq!(seen.view_count, 2);

        let edit = UpdateBoardRequest {
            title: Some("Office hours moved".to_string()),
            content: None,
        };
        assert!(matches!(
            service.update(&user(4, Role::Professor), board.board_idx, edit.clone()).await,
            Err(ServiceError::Forbidden(_))
        ));
        let updated = service.update(&author, board.board_idx, edit).await.unwrap();
        assert_eq!(updated.title, "Office hours moved");
        assert_eq!(updated.content, "body");
    }

    #[tokio::test]
    async fn list_pages_newest_first() {
        let service = BoardService::new(Arc::new(MemoryStore::new()));
        let admin = user(1, Role::Admin);
        for i in 0..3 {
            service.create(&admin, post(NOTICE_ACADEMIC, &format!("notice {}", i))).await.unwrap();
        }
        let page = service
            .list(&BoardListQuery {
                board_code: Some(NOTICE_ACADEMIC),
                page: 0,
                size: Some(2),
            })
            .await
            .unwrap();
        assert_eq!(page.total_elements, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.boards[0].title, "notice 2");
    }
}
