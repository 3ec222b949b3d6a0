//! Feeds journal entries to projections.

use futures_util::StreamExt;
use journal::{Journal, JournalEntry};

use crate::Result;
use crate::projection::Projection;

/// Delivers journal entries to registered projections.
///
/// Supports catching up with everything recorded so far, delivering one new
/// entry, and rebuilding every projection from scratch.
pub struct ProjectionProcessor<J: Journal> {
    journal: J,
    projections: Vec<Box<dyn Projection>>,
}

impl<J: Journal> ProjectionProcessor<J> {
    pub fn new(journal: J) -> Self {
        Self {
            journal,
            projections: Vec::new(),
        }
    }

    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Streams the whole journal, giving each projection the entries its
    /// position does not cover yet.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<()> {
        let mut positions = Vec::with_capacity(self.projections.len());
        for projection in &self.projections {
            positions.push(projection.position().await);
        }

        let mut entries = self.journal.stream_all().await?;
        let (mut read, mut applied) = (0u64, 0u64);
        while let Some(entry) = entries.next().await {
            let entry = entry?;
            read += 1;

            for (projection, position) in self.projections.iter().zip(&positions) {
                if !position.covers(&entry) {
                    projection.handle(&entry).await?;
                    applied += 1;
                }
            }
        }

        tracing::info!(
            entries = read,
            applied,
            projections = self.projections.len(),
            "catch-up complete"
        );
        Ok(())
    }

    /// Delivers a single entry to every projection that has not applied it.
    #[tracing::instrument(skip(self, entry), fields(entry_type = %entry.entry_type))]
    pub async fn process_entry(&self, entry: &JournalEntry) -> Result<()> {
        for projection in &self.projections {
            if !projection.position().await.covers(entry) {
                projection.handle(entry).await?;
            }
        }
        Ok(())
    }

    /// Resets every projection and replays the journal.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<()> {
        for projection in &self.projections {
            tracing::debug!(projection = projection.name(), "resetting");
            projection.reset().await?;
        }
        self.run_catch_up().await
    }
}
