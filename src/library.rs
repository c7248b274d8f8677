use crate::server::AppState;
use crate::store::{MemoryStore, RecordStore};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use hook_core::model::{Book, BorrowRequest, Loan, ReturnRequest};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LibraryError {
    #[error("invalid json payload")]
    InvalidPayload,
    #[error("book id is required")]
    MissingBookId,
    #[error("Book already exists")]
    BookExists,
    #[error("Book not found")]
    BookNotFound,
    #[error("Book not available")]
    BookUnavailable,
    #[error("Book already borrowed")]
    AlreadyBorrowed,
    #[error("Book not borrowed")]
    NotBorrowed,
}

impl IntoResponse for LibraryError {
    fn into_response(self) -> Response {
        let status = match self {
            LibraryError::BookNotFound
            | LibraryError::BookUnavailable
            | LibraryError::NotBorrowed => StatusCode::NOT_FOUND,
            LibraryError::InvalidPayload
            | LibraryError::MissingBookId
            | LibraryError::BookExists
            | LibraryError::AlreadyBorrowed => StatusCode::BAD_REQUEST,
        };

        (status, Json(json!({"message": self.to_string()}))).into_response()
    }
}

/// Book catalogue and loan ledger.
#[derive(Clone)]
pub struct Library {
    books: Arc<dyn RecordStore<Book>>,
    loans: Arc<dyn RecordStore<Loan>>,
}

impl Library {
    pub fn new(books: Arc<dyn RecordStore<Book>>, loans: Arc<dyn RecordStore<Loan>>) -> Self {
        Self { books, loans }
    }

    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStore::<Book>::new()),
            Arc::new(MemoryStore::<Loan>::new()),
        )
    }

    pub fn add_book(&self, book: Book) -> Result<(), LibraryError> {
        if book.id.trim().is_empty() {
            return Err(LibraryError::MissingBookId);
        }

        let id = book.id.clone();
        if self.books.put(&id, book) {
            Ok(())
        } else {
            Err(LibraryError::BookExists)
        }
    }

    pub fn book(&self, id: &str) -> Result<Book, LibraryError> {
        self.books.get(id).ok_or(LibraryError::BookNotFound)
    }

    pub fn books(&self) -> Vec<Book> {
        self.books.list()
    }

    pub fn borrow(&self, request: BorrowRequest) -> Result<(), LibraryError> {
        if self.books.get(&request.book_id).is_none() {
            return Err(LibraryError::BookUnavailable);
        }

        let loan = Loan {
            book_id: request.book_id.clone(),
            user: request.user,
        };
        if self.loans.put(&request.book_id, loan) {
            Ok(())
        } else {
            Err(LibraryError::AlreadyBorrowed)
        }
    }

    pub fn return_book(&self, request: ReturnRequest) -> Result<Loan, LibraryError> {
        self.loans
            .delete(&request.book_id)
            .ok_or(LibraryError::NotBorrowed)
    }
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/books", get(list_books).post(add_book))
        .route("/books/{book_id}", get(get_book))
        .route("/borrow", post(borrow_book))
        .route("/return", post(return_book))
}

async fn list_books(State(state): State<Arc<AppState>>) -> Json<Vec<Book>> {
    Json(state.library.books())
}

async fn get_book(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<String>,
) -> Result<Json<Book>, LibraryError> {
    state.library.book(&book_id).map(Json)
}

async fn add_book(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, LibraryError> {
    let book: Book = parse_body(&body)?;
    let book_id = book.id.clone();
    state.library.add_book(book)?;
    info!(book_id = %book_id, "book added");
    Ok(Json(json!({"message": "Book added successfully"})))
}

async fn borrow_book(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, LibraryError> {
    let request: BorrowRequest = parse_body(&body)?;
    state.library.borrow(request)?;
    Ok(Json(json!({"message": "Book borrowed successfully"})))
}

async fn return_book(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, LibraryError> {
    let request: ReturnRequest = parse_body(&body)?;
    state.library.return_book(request)?;
    Ok(Json(json!({"message": "Book returned successfully"})))
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, LibraryError> {
    serde_json::from_slice(body).map_err(|_| LibraryError::InvalidPayload)
}
