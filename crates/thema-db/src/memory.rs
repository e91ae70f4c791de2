//! In-memory fakes of [`JobStore`] and [`DocumentRepository`] for fast unit
//! tests that don't need a live Postgres instance.
//!
//! The teacher's [`crate::test_fixtures`] spins up a real schema-isolated
//! Postgres connection per test; these fakes are a lighter-weight substitute
//! for callers (thema-etl, thema-rag) that only need trait-level behavior,
//! not SQL fidelity.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use thema_core::traits::{DocumentRepository, JobStore, JobUpdate};
use thema_core::{new_v7, Document, Error, Job, Result};

#[derive(Default)]
pub struct MemoryJobStore {
    users_by_anp_seq: Mutex<HashMap<i64, Uuid>>,
    jobs: Mutex<HashMap<Uuid, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn ensure_user(&self, anp_seq: i64) -> Result<Uuid> {
        let mut users = self.users_by_anp_seq.lock().unwrap();
        Ok(*users.entry(anp_seq).or_insert_with(new_v7))
    }

    async fn create_job(&self, job: Job) -> Result<Job> {
        self.jobs.lock().unwrap().insert(job.id, job.clone());
        Ok(job)
    }

    async fn update_job(&self, job_id: Uuid, update: JobUpdate) -> Result<Job> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get_mut(&job_id).ok_or(Error::JobNotFound(job_id))?;

        if let Some(status) = update.status {
            job.status = status;
        }
        if let Some(progress_pct) = update.progress_pct {
            job.progress_pct = progress_pct;
        }
        if let Some(current_step) = update.current_step {
            job.current_step = current_step;
        }
        if let Some(completed_steps) = update.completed_steps {
            job.completed_steps = completed_steps;
        }
        if update.error_message.is_some() {
            job.error_message = update.error_message;
        }
        if update.error_type.is_some() {
            job.error_type = update.error_type;
        }
        if update.failed_stage.is_some() {
            job.failed_stage = update.failed_stage;
        }
        if update.query_results_summary.is_some() {
            job.query_results_summary = update.query_results_summary;
        }
        if let Some(documents_created) = update.documents_created {
            job.documents_created = documents_created;
        }
        if update.completed_at.is_some() {
            job.completed_at = update.completed_at;
        }
        job.updated_at = chrono::Utc::now();

        Ok(job.clone())
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>> {
        Ok(self.jobs.lock().unwrap().get(&job_id).cloned())
    }

    async fn list_jobs_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|j| j.user_id == user_id)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        jobs.truncate(limit.max(0) as usize);
        Ok(jobs)
    }

    async fn delete_job(&self, job_id: Uuid) -> Result<()> {
        self.jobs.lock().unwrap().remove(&job_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryDocumentRepository {
    documents: Mutex<HashMap<Uuid, Document>>,
}

impl MemoryDocumentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentRepository for MemoryDocumentRepository {
    async fn replace_documents(&self, user_id: Uuid, documents: Vec<Document>) -> Result<()> {
        let mut store = self.documents.lock().unwrap();
        store.retain(|_, d| d.user_id != user_id);
        for doc in documents {
            store.insert(doc.id, doc);
        }
        Ok(())
    }

    async fn delete_documents_for_user(&self, user_id: Uuid) -> Result<()> {
        self.documents.lock().unwrap().retain(|_, d| d.user_id != user_id);
        Ok(())
    }

    async fn list_documents_for_user(&self, user_id: Uuid) -> Result<Vec<Document>> {
        Ok(self
            .documents
            .lock()
            .unwrap()
            .values()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_document(&self, doc_id: Uuid) -> Result<Option<Document>> {
        Ok(self.documents.lock().unwrap().get(&doc_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thema_core::{CompletionLevel, DocType};

    #[tokio::test]
    async fn ensure_user_is_idempotent_per_anp_seq() {
        let store = MemoryJobStore::new();
        let a = store.ensure_user(1001).await.unwrap();
        let b = store.ensure_user(1001).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn update_job_merges_partial_fields() {
        let store = MemoryJobStore::new();
        let user_id = store.ensure_user(42).await.unwrap();
        let job = Job::new(user_id, 42);
        let job_id = job.id;
        store.create_job(job).await.unwrap();

        let updated = store
            .update_job(
                job_id,
                JobUpdate {
                    progress_pct: Some(50),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.progress_pct, 50);
        assert_eq!(updated.current_step, 0);
    }

    #[tokio::test]
    async fn update_job_missing_id_is_not_found() {
        let store = MemoryJobStore::new();
        let err = store.update_job(Uuid::nil(), JobUpdate::default()).await;
        assert!(matches!(err, Err(Error::JobNotFound(_))));
    }

    #[tokio::test]
    async fn replace_documents_clears_prior_set_for_user() {
        let repo = MemoryDocumentRepository::new();
        let user_id = new_v7();
        let doc = Document::new(
            user_id,
            DocType::UserProfile,
            "basic_info",
            serde_json::json!({"age": 29}),
            "기본 정보 요약",
            CompletionLevel::Complete,
        );
        repo.replace_documents(user_id, vec![doc]).await.unwrap();
        assert_eq!(repo.list_documents_for_user(user_id).await.unwrap().len(), 1);

        repo.replace_documents(user_id, vec![]).await.unwrap();
        assert!(repo.list_documents_for_user(user_id).await.unwrap().is_empty());
    }
}
