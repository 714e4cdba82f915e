//! Book catalog, users and read marks, kept in memory and persisted to one JSON file.
//!
//! Every mutation is applied to a copy, written to the file (temp file, fsync, rename),
//! and only then made visible. A failed write leaves both memory and disk unchanged.
//! The catalog is also the recommender's corpus source.

use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bookrec_core::{CorpusProvider, ItemId, ItemRecord, RecResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{ServerError, ServerResult};

pub type TelegramId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: ItemId,
    pub title: String,
    pub author: Option<String>,
    pub description: Option<String>,
    /// Comma-separated genre tags, e.g. `"фантастика,драма"`.
    pub genres: Option<String>,
}

/// Search hit: just enough to show the book in a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSummary {
    pub id: ItemId,
    pub title: String,
    pub author: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub telegram_id: TelegramId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBook {
    pub user_id: i64,
    pub book_id: ItemId,
    pub marked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CatalogData {
    next_book_id: ItemId,
    next_user_id: i64,
    books: Vec<Book>,
    users: Vec<User>,
    user_books: Vec<UserBook>,
}

impl CatalogData {
    fn user_id(&self, telegram_id: TelegramId) -> Option<i64> {
        self.users.iter().find(|u| u.telegram_id == telegram_id).map(|u| u.id)
    }

    /// Returns the internal user id for `telegram_id`, registering the user if needed.
    fn ensure_user(&mut self, telegram_id: TelegramId) -> i64 {
        if let Some(id) = self.user_id(telegram_id) {
            return id;
        }
        self.next_user_id += 1;
        let id = self.next_user_id;
        self.users.push(User { id, telegram_id });
        id
    }

    fn read_book_ids(&self, user_id: i64) -> Vec<ItemId> {
        self.user_books.iter().filter(|ub| ub.user_id == user_id).map(|ub| ub.book_id).collect()
    }
}

#[derive(Debug)]
pub struct Catalog {
    path: Option<PathBuf>,
    data: RwLock<CatalogData>,
}

impl Catalog {
    /// A catalog that lives only in memory.
    pub fn in_memory() -> Self {
        Catalog { path: None, data: RwLock::new(CatalogData::default()) }
    }

    /// Opens the catalog file at `path`, starting empty if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> ServerResult<Self> {
        let path = path.into();
        let data = match File::open(&path) {
            Ok(file) => {
                let data: CatalogData = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
                    ServerError::CatalogStorage { path: path.clone(), reason: format!("Failed to deserialize catalog: {}", e) }
                })?;
                info!(path = ?path, books = data.books.len(), users = data.users.len(), "Catalog loaded");
                data
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = ?path, "No catalog file yet; starting with an empty catalog");
                CatalogData::default()
            }
            Err(e) => return Err(storage_error(&path, e)),
        };
        Ok(Catalog { path: Some(path), data: RwLock::new(data) })
    }

    /// Writes `data` to the catalog file. Callers hold the write lock, so writes never interleave.
    async fn persist(&self, data: &CatalogData) -> ServerResult<()> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(data).map_err(|e| ServerError::CatalogStorage {
            path: path.clone(),
            reason: format!("Failed to serialize catalog: {}", e),
        })?;
        tokio::task::spawn_blocking(move || write_atomically(&path, &bytes))
            .await
            .map_err(|e| ServerError::Internal(format!("catalog write task failed: {}", e)))?
    }

    /// Adds a book and returns it with its assigned id.
    pub async fn add_book(
        &self,
        title: String,
        author: Option<String>,
        description: Option<String>,
        genres: Option<String>,
    ) -> ServerResult<Book> {
        let mut data = self.data.write().await;
        let mut next = data.clone();
        next.next_book_id += 1;
        let book = Book { id: next.next_book_id, title, author, description, genres };
        next.books.push(book.clone());
        self.persist(&next).await?;
        *data = next;
        info!(book_id = book.id, title = %book.title, "Book added");
        Ok(book)
    }

    pub async fn get_book(&self, id: ItemId) -> Option<Book> {
        self.data.read().await.books.iter().find(|b| b.id == id).cloned()
    }

    /// Books whose title or description contains `query`, ignoring case.
    pub async fn search_books(&self, query: &str) -> Vec<BookSummary> {
        let needle = query.to_lowercase();
        let data = self.data.read().await;
        data.books
            .iter()
            .filter(|b| {
                b.title.to_lowercase().contains(&needle)
                    || b.description.as_deref().map_or(false, |d| d.to_lowercase().contains(&needle))
            })
            .map(|b| BookSummary { id: b.id, title: b.title.clone(), author: b.author.clone() })
            .collect()
    }

    /// Ids of the books the user has marked as read. Unknown users are registered.
    pub async fn get_user_books(&self, telegram_id: TelegramId) -> ServerResult<Vec<ItemId>> {
        {
            let data = self.data.read().await;
            if let Some(user_id) = data.user_id(telegram_id) {
                return Ok(data.read_book_ids(user_id));
            }
        }

        let mut data = self.data.write().await;
        // Another request may have registered the user between the two locks.
        if let Some(user_id) = data.user_id(telegram_id) {
            return Ok(data.read_book_ids(user_id));
        }
        let mut next = data.clone();
        let user_id = next.ensure_user(telegram_id);
        self.persist(&next).await?;
        *data = next;
        info!(telegram_id, user_id, "Registered new user");
        Ok(Vec::new())
    }

    /// Marks `book_id` as read. Returns `false` if the mark already existed.
    pub async fn add_user_book(&self, telegram_id: TelegramId, book_id: ItemId) -> ServerResult<bool> {
        let mut data = self.data.write().await;
        if !data.books.iter().any(|b| b.id == book_id) {
            return Err(ServerError::BookNotFound(book_id));
        }
        if let Some(user_id) = data.user_id(telegram_id) {
            if data.user_books.iter().any(|ub| ub.user_id == user_id && ub.book_id == book_id) {
                return Ok(false);
            }
        }
        let mut next = data.clone();
        let user_id = next.ensure_user(telegram_id);
        next.user_books.push(UserBook { user_id, book_id, marked_at: Utc::now() });
        self.persist(&next).await?;
        *data = next;
        debug!(telegram_id, book_id, "Book marked as read");
        Ok(true)
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> ServerResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| storage_error(parent, e))?;
    }
    let temp_path = path.with_extension("json.tmp");
    let mut file = File::create(&temp_path).map_err(|e| storage_error(&temp_path, e))?;
    file.write_all(bytes).map_err(|e| storage_error(&temp_path, e))?;
    file.sync_all().map_err(|e| storage_error(&temp_path, e))?;
    drop(file);
    fs::rename(&temp_path, path).map_err(|e| storage_error(&temp_path, e))?;
    debug!(path = ?path, bytes = bytes.len(), "Catalog persisted");
    Ok(())
}

fn storage_error(path: &Path, e: std::io::Error) -> ServerError {
    ServerError::CatalogStorage { path: path.to_path_buf(), reason: e.to_string() }
}

#[async_trait]
impl CorpusProvider for Catalog {
    /// Books in ascending id order.
    async fn list_items(&self) -> RecResult<Vec<ItemRecord>> {
        let data = self.data.read().await;
        let mut items: Vec<ItemRecord> = data
            .books
            .iter()
            .map(|b| ItemRecord { id: b.id, description: b.description.clone(), genres: b.genres.clone() })
            .collect();
        items.sort_by_key(|item| item.id);
        Ok(items)
    }
}
