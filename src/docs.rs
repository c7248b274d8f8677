//! API documentation snapshot and its refresh on push.
//!
//! Readers always get a complete document: the current snapshot is an
//! `Arc<Value>` that is replaced wholesale, never edited in place. Refreshes
//! are serialised through a single writer lock.

use crate::dispatch::EventHandler;
use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use futures_util::future::BoxFuture;
use hook_core::model::PushEvent;
use serde_json::{Value, json};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::info;

/// Produces a fresh documentation artifact for a pushed revision.
pub trait DocsRegenerator: Send + Sync {
    fn regenerate<'a>(&'a self, push: &'a PushEvent) -> BoxFuture<'a, Result<Value>>;
}

#[derive(Clone)]
pub struct DocsCache {
    current: Arc<RwLock<Arc<Value>>>,
    writer: Arc<Mutex<()>>,
}

impl DocsCache {
    pub fn new(initial: Value) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(initial))),
            writer: Arc::new(Mutex::new(())),
        }
    }

    pub fn snapshot(&self) -> Arc<Value> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace(&self, document: Value) {
        let next = Arc::new(document);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = next;
    }
}

/// Builds the Swagger 2.0 document for the library API in-process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwaggerDocs;

impl DocsRegenerator for SwaggerDocs {
    fn regenerate<'a>(&'a self, push: &'a PushEvent) -> BoxFuture<'a, Result<Value>> {
        Box::pin(async move { Ok(library_swagger(push.after.as_deref())) })
    }
}

/// Push handler: regenerates the documentation when a tracked ref moves.
pub struct DocsRefreshHandler {
    regenerator: Arc<dyn DocsRegenerator>,
    cache: DocsCache,
    tracked_refs: Vec<String>,
}

impl DocsRefreshHandler {
    pub fn new(
        regenerator: Arc<dyn DocsRegenerator>,
        cache: DocsCache,
        tracked_refs: Vec<String>,
    ) -> Self {
        Self {
            regenerator,
            cache,
            tracked_refs,
        }
    }

    async fn refresh(&self, payload: &[u8]) -> Result<()> {
        let push: PushEvent = serde_json::from_slice(payload).context("parse push payload")?;

        if !self.tracked_refs.iter().any(|tracked| *tracked == push.git_ref) {
            info!(git_ref = %push.git_ref, "push to untracked ref; docs unchanged");
            return Ok(());
        }

        let _writer = self.cache.writer.lock().await;
        let document = self
            .regenerator
            .regenerate(&push)
            .await
            .context("regenerate api docs")?;
        self.cache.replace(document);

        info!(
            git_ref = %push.git_ref,
            revision = push.after.as_deref().unwrap_or("unknown"),
            "api docs regenerated"
        );
        Ok(())
    }
}

impl EventHandler for DocsRefreshHandler {
    fn handle<'a>(&'a self, payload: &'a [u8]) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.refresh(payload))
    }
}

pub fn library_swagger(revision: Option<&str>) -> Value {
    json!({
        "swagger": "2.0",
        "info": {
            "title": "Library Management API",
            "description": "API for managing books, borrowing, and returning",
            "version": "1.0",
            "x-revision": revision,
            "x-generated-at": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        },
        "basePath": "/",
        "paths": {
            "/books": {
                "get": {
                    "summary": "Retrieve all books",
                    "responses": {"200": {"description": "A list of all books"}}
                },
                "post": {
                    "summary": "Add a new book",
                    "parameters": [{
                        "in": "body",
                        "name": "book",
                        "description": "Book to add",
                        "schema": {
                            "type": "object",
                            "properties": {
                                "id": {"type": "string"},
                                "title": {"type": "string"},
                                "author": {"type": "string"}
                            }
                        }
                    }],
                    "responses": {
                        "200": {"description": "Book added successfully"},
                        "400": {"description": "Book already exists"}
                    }
                }
            },
            "/books/{book_id}": {
                "get": {
                    "summary": "Retrieve a specific book by ID",
                    "parameters": [{"name": "book_id", "in": "path", "type": "string"}],
                    "responses": {
                        "200": {"description": "Book details"},
                        "404": {"description": "Book not found"}
                    }
                }
            },
            "/borrow": {
                "post": {
                    "summary": "Borrow a book",
                    "parameters": [{
                        "in": "body",
                        "name": "borrow",
                        "description": "Book to borrow",
                        "schema": {
                            "type": "object",
                            "properties": {
                                "book_id": {"type": "string"},
                                "user": {"type": "string"}
                            }
                        }
                    }],
                    "responses": {
                        "200": {"description": "Book borrowed successfully"},
                        "400": {"description": "Book already borrowed"},
                        "404": {"description": "Book not available"}
                    }
                }
            },
            "/return": {
                "post": {
                    "summary": "Return a borrowed book",
                    "parameters": [{
                        "in": "body",
                        "name": "return",
                        "description": "Book to return",
                        "schema": {
                            "type": "object",
                            "properties": {"book_id": {"type": "string"}}
                        }
                    }],
                    "responses": {
                        "200": {"description": "Book returned successfully"},
                        "404": {"description": "Book not borrowed"}
                    }
                }
            }
        }
    })
}
