use std::{fmt, sync::Arc};

use {crispy_store::KvStore, tracing::debug};

use crate::{
    error::{Error, Result},
    keys::queue_key,
    session::Session,
};

/// FIFO of session keys for one job type, stored as a list at
/// `crispy:queue:<jobtype>`.
///
/// Handles hold no state besides the key, so any number of them built for
/// the same job type see the same list. Each successful [`Queue::next`]
/// returns a distinct reference: the store's pop is atomic, so two consumers
/// never both receive it. A reference popped by a consumer that then dies is
/// gone; there is no acknowledgement.
#[derive(Clone)]
pub struct Queue {
    store: Arc<dyn KvStore>,
    jobtype: String,
    key: String,
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("key", &self.key)
            .field("backend", &self.store.backend())
            .finish()
    }
}

impl Queue {
    /// The list is created by the store on first submit; nothing is checked
    /// or written here.
    pub fn new(store: Arc<dyn KvStore>, jobtype: impl Into<String>) -> Result<Self> {
        let jobtype = jobtype.into();
        if jobtype.is_empty() {
            return Err(Error::invalid("queue job type must not be empty"));
        }
        let key = queue_key(&jobtype);
        Ok(Self {
            store,
            jobtype,
            key,
        })
    }

    pub fn jobtype(&self) -> &str {
        &self.jobtype
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Number of references waiting.
    pub async fn length(&self) -> Result<usize> {
        Ok(self.store.list_len(&self.key).await?)
    }

    /// Enqueue the session's store key. Submitting the same session twice
    /// enqueues it twice. Returns the new length.
    pub async fn submit(&self, session: &Session) -> Result<usize> {
        self.submit_key(session.key()).await
    }

    /// Enqueue a raw reference.
    pub async fn submit_key(&self, reference: &str) -> Result<usize> {
        let len = self.store.list_push(&self.key, reference).await?;
        debug!(queue = %self.key, reference, len, "submitted job");
        #[cfg(feature = "metrics")]
        metrics::counter!("crispy_queue_submitted_total", "jobtype" => self.jobtype.clone())
            .increment(1);
        Ok(len)
    }

    /// Pop the oldest reference, or `None` when the queue is empty. Never
    /// waits for new submissions.
    pub async fn next(&self) -> Result<Option<String>> {
        let reference = self.store.list_pop(&self.key).await?;
        if let Some(reference) = &reference {
            debug!(queue = %self.key, reference = %reference, "claimed job");
            #[cfg(feature = "metrics")]
            metrics::counter!("crispy_queue_claimed_total", "jobtype" => self.jobtype.clone())
                .increment(1);
        }
        Ok(reference)
    }
}
