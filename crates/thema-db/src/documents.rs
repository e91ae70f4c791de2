//! Document Repository implementation (§4.G): transactional replace-by-user
//! storage for chunked, embeddable analysis documents.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::{postgres::PgRow, Pool, Postgres, Row};
use uuid::Uuid;

use thema_core::traits::DocumentRepository;
use thema_core::{CompletionLevel, Document, DocType, DocumentMetadata, Error, Result};

pub struct PgDocumentRepository {
    pool: Pool<Postgres>,
}

impl PgDocumentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_document_row(row: PgRow) -> Result<Document> {
        let doc_type_str: String = row.get("doc_type");
        let completion_level_str: String = row.get("completion_level");
        let data_sources: JsonValue = row.get("data_sources");
        let hypothetical_questions: JsonValue = row.get("hypothetical_questions");
        let extra: JsonValue = row.get("extra");

        Ok(Document {
            id: row.get("id"),
            user_id: row.get("user_id"),
            doc_type: doc_type_str.parse::<DocType>().map_err(Error::Internal)?,
            content: row.get("content"),
            summary_text: row.get("summary_text"),
            searchable_text: row.get("searchable_text"),
            metadata: DocumentMetadata {
                sub_type: row.get("sub_type"),
                completion_level: parse_completion_level(&completion_level_str)?,
                created_at: row.get("created_at"),
                data_sources: serde_json::from_value(data_sources).unwrap_or_default(),
                hypothetical_questions: serde_json::from_value(hypothetical_questions)
                    .unwrap_or_default(),
                extra: match extra {
                    JsonValue::Object(map) => map,
                    _ => serde_json::Map::new(),
                },
            },
            embedding: row.get("embedding"),
        })
    }
}

fn parse_completion_level(s: &str) -> Result<CompletionLevel> {
    match s {
        "none" => Ok(CompletionLevel::None),
        "low" => Ok(CompletionLevel::Low),
        "medium" => Ok(CompletionLevel::Medium),
        "high" => Ok(CompletionLevel::High),
        "partial" => Ok(CompletionLevel::Partial),
        "complete" => Ok(CompletionLevel::Complete),
        other => Err(Error::Internal(format!("invalid completion_level: {other}"))),
    }
}

#[async_trait]
impl DocumentRepository for PgDocumentRepository {
    /// Deletes every existing document for `user_id`, then inserts the new
    /// set, in a single transaction — an ETL run either fully replaces a
    /// user's documents or leaves the prior set untouched.
    async fn replace_documents(&self, user_id: Uuid, documents: Vec<Document>) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query("DELETE FROM chat_documents WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        for doc in &documents {
            let data_sources = serde_json::to_value(&doc.metadata.data_sources)?;
            let hypothetical_questions =
                serde_json::to_value(&doc.metadata.hypothetical_questions)?;
            let extra = JsonValue::Object(doc.metadata.extra.clone());

            sqlx::query(
                "INSERT INTO chat_documents
                    (id, user_id, doc_type, sub_type, content, summary_text,
                     searchable_text, completion_level, created_at, data_sources,
                     hypothetical_questions, extra, embedding)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
            )
            .bind(doc.id)
            .bind(doc.user_id)
            .bind(doc.doc_type.as_str())
            .bind(&doc.metadata.sub_type)
            .bind(&doc.content)
            .bind(&doc.summary_text)
            .bind(&doc.searchable_text)
            .bind(doc.metadata.completion_level.as_str())
            .bind(doc.metadata.created_at)
            .bind(data_sources)
            .bind(hypothetical_questions)
            .bind(extra)
            .bind(&doc.embedding)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn delete_documents_for_user(&self, user_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM chat_documents WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn list_documents_for_user(&self, user_id: Uuid) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT * FROM chat_documents WHERE user_id = $1 ORDER BY doc_type, sub_type",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter().map(Self::parse_document_row).collect()
    }

    async fn get_document(&self, doc_id: Uuid) -> Result<Option<Document>> {
        let row = sqlx::query("SELECT * FROM chat_documents WHERE id = $1")
            .bind(doc_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.map(Self::parse_document_row).transpose()
    }
}
