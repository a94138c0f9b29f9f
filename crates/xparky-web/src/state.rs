//! Shared state for the axum handlers.
//!
//! The Drive snapshot and certificate index live behind `RwLock`s and are
//! refreshed once older than the configured TTL. A refresh mutex keeps
//! concurrent requests from fetching the same data twice. When Google is
//! unreachable the last snapshot keeps being served, and no new attempt is
//! made until [`REFRESH_RETRY_SECS`] have passed. Sources that fail during an
//! otherwise successful refresh keep their data from the previous snapshot.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use xparky_core::cache::{CacheManager, CachedData};
use xparky_core::models::NewSubmission;
use xparky_core::processor::CertificateFile;
use xparky_core::{
    CertificateIndex, Config, DriveSnapshot, Leaderboard, Submission, SubmissionChecks,
    SubmissionError, SubmissionStore, VerificationStatus, XpProcessor,
};

/// Seconds before Google is asked again after a failed or partial refresh
pub const REFRESH_RETRY_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Verify,
    Reject,
}

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    processor: XpProcessor,
    config: Config,
    admin_token: Option<String>,
    cache: Option<CacheManager>,
    snapshot: RwLock<Option<CachedData<DriveSnapshot>>>,
    leaderboard: RwLock<Option<Arc<Leaderboard>>>,
    certificates: RwLock<Option<CachedData<CertificateIndex>>>,
    submissions: RwLock<SubmissionStore>,
    /// Held while refreshing; remembers when the last refresh failed
    refresh_lock: Mutex<Option<DateTime<Utc>>>,
}

impl AppState {
    /// Build the state, seeding it from the on-disk cache when one is given.
    pub fn new(
        processor: XpProcessor,
        config: Config,
        admin_token: Option<String>,
        submissions: SubmissionStore,
        cache: Option<CacheManager>,
    ) -> Self {
        let snapshot = cache.as_ref().and_then(|c| match c.load_snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Ignoring unreadable snapshot cache");
                None
            }
        });
        let certificates = cache.as_ref().and_then(|c| match c.load_certificates() {
            Ok(index) => index,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Ignoring unreadable certificate cache");
                None
            }
        });

        let leaderboard = snapshot.as_ref().map(|cached| {
            info!(age = %cached.age_display(), "Serving cached leaderboard until first refresh");
            Arc::new(Leaderboard::build(&cached.data, submissions.all(), &config.points))
        });

        Self {
            inner: Arc::new(AppStateInner {
                processor,
                config,
                admin_token,
                cache,
                snapshot: RwLock::new(snapshot),
                leaderboard: RwLock::new(leaderboard),
                certificates: RwLock::new(certificates),
                submissions: RwLock::new(submissions),
                refresh_lock: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn admin_token(&self) -> Option<&str> {
        self.inner.admin_token.as_deref()
    }

    fn ttl_minutes(&self) -> i64 {
        self.inner.config.cache_ttl_minutes
    }

    // ===== Leaderboard =====

    /// The current leaderboard and its data age, without touching Google
    pub async fn cached_leaderboard(&self) -> Option<(Arc<Leaderboard>, String)> {
        let snapshot = self.inner.snapshot.read().await;
        let age = snapshot.as_ref()?.age_display();
        let board = self.inner.leaderboard.read().await.clone()?;
        Some((board, age))
    }

    /// When the data behind the leaderboard was fetched
    pub async fn data_fetched_at(&self) -> Option<DateTime<Utc>> {
        self.inner.snapshot.read().await.as_ref().map(|c| c.cached_at)
    }

    /// A snapshot with failed sources is retried sooner than a complete one
    fn is_fresh(&self, cached: &CachedData<DriveSnapshot>) -> bool {
        if cached.data.is_partial() {
            within_retry_window(cached.cached_at)
        } else {
            !cached.is_older_than(self.ttl_minutes())
        }
    }

    async fn fresh_leaderboard(&self) -> Option<Arc<Leaderboard>> {
        let snapshot = self.inner.snapshot.read().await;
        if !self.is_fresh(snapshot.as_ref()?) {
            return None;
        }
        self.inner.leaderboard.read().await.clone()
    }

    /// The leaderboard, refreshed first when stale. A failed refresh falls
    /// back to the last known leaderboard.
    pub async fn leaderboard(&self) -> Result<Arc<Leaderboard>> {
        if let Some(board) = self.fresh_leaderboard().await {
            return Ok(board);
        }

        match self.refresh(false).await {
            Ok(board) => Ok(board),
            Err(e) => match self.inner.leaderboard.read().await.clone() {
                Some(board) => {
                    warn!(error = %format!("{:#}", e), "Refresh failed, serving stale leaderboard");
                    Ok(board)
                }
                None => Err(e),
            },
        }
    }

    /// Fetch a new snapshot from Drive and Sheets. Unless `force` is set, a
    /// refresh that completed while this one waited for the lock is reused,
    /// and a refresh that failed less than [`REFRESH_RETRY_SECS`] ago is
    /// reported again without calling Google.
    pub async fn refresh(&self, force: bool) -> Result<Arc<Leaderboard>> {
        let mut last_failure = self.inner.refresh_lock.lock().await;
        if !force {
            if let Some(board) = self.fresh_leaderboard().await {
                debug!("Leaderboard refreshed by another request");
                return Ok(board);
            }
            if let Some(failed_at) = *last_failure {
                if within_retry_window(failed_at) {
                    anyhow::bail!(
                        "Google refresh failed at {}, next attempt after {}s",
                        failed_at.format("%H:%M:%S"),
                        REFRESH_RETRY_SECS
                    );
                }
            }
        }

        info!(force, "Refreshing leaderboard data");
        let mut snapshot = match self.inner.processor.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                *last_failure = Some(Utc::now());
                return Err(e);
            }
        };
        *last_failure = None;

        if snapshot.is_partial() {
            let previous = self.inner.snapshot.read().await;
            if let Some(ref cached) = *previous {
                let carried = snapshot.carry_forward(&cached.data);
                for source in carried {
                    warn!(%source, age = %cached.age_display(), "Keeping previous data for failed source");
                }
            }
        }

        let board = self.install_snapshot(snapshot).await;
        board.summary().log();
        Ok(board)
    }

    /// Replace the Drive snapshot and rebuild the leaderboard from it
    pub async fn install_snapshot(&self, snapshot: DriveSnapshot) -> Arc<Leaderboard> {
        let cached = CachedData::new(snapshot);
        if let Some(ref cache) = self.inner.cache {
            if let Err(e) = cache.save_snapshot(&cached) {
                warn!(error = %format!("{:#}", e), "Failed to write snapshot cache");
            }
        }

        let mut slot = self.inner.snapshot.write().await;
        let board = self.build_leaderboard(&cached.data).await;
        *slot = Some(cached);
        board
    }

    async fn build_leaderboard(&self, snapshot: &DriveSnapshot) -> Arc<Leaderboard> {
        let store = self.inner.submissions.read().await;
        let board = Arc::new(Leaderboard::build(snapshot, store.all(), &self.inner.config.points));
        *self.inner.leaderboard.write().await = Some(Arc::clone(&board));
        board
    }

    /// Rebuild after submissions changed; no-op before the first snapshot
    async fn rebuild_leaderboard(&self) {
        let snapshot = self.inner.snapshot.read().await;
        if let Some(ref cached) = *snapshot {
            self.build_leaderboard(&cached.data).await;
        }
    }

    // ===== Submissions =====

    pub async fn submit(&self, submission: NewSubmission) -> Result<Submission, SubmissionError> {
        let (known_students, issuances) = {
            let snapshot = self.inner.snapshot.read().await;
            match snapshot.as_ref() {
                Some(cached) => (cached.data.known_students(), cached.data.issuances.clone()),
                None => (None, None),
            }
        };

        let created = {
            let mut store = self.inner.submissions.write().await;
            store.submit(
                &submission,
                SubmissionChecks {
                    known_students: known_students.as_ref(),
                    issuances: issuances.as_ref(),
                },
            )?
        };

        self.rebuild_leaderboard().await;
        Ok(created)
    }

    pub async fn review(
        &self,
        id: u64,
        decision: ReviewDecision,
        note: Option<&str>,
    ) -> Result<Submission, SubmissionError> {
        let reviewed = {
            let mut store = self.inner.submissions.write().await;
            match decision {
                ReviewDecision::Verify => store.verify(id, note)?,
                ReviewDecision::Reject => store.reject(id, note)?,
            }
        };

        self.rebuild_leaderboard().await;
        Ok(reviewed)
    }

    pub async fn submissions(&self, status: Option<VerificationStatus>) -> Vec<Submission> {
        let store = self.inner.submissions.read().await;
        store.list(status).into_iter().cloned().collect()
    }

    // ===== Certificates =====

    pub fn certificates_enabled(&self) -> bool {
        self.inner.processor.sources().certificates_folder_id.is_some()
    }

    fn save_certificates(&self, index: &CachedData<CertificateIndex>) {
        if let Some(ref cache) = self.inner.cache {
            if let Err(e) = cache.save_certificates(index) {
                warn!(error = %format!("{:#}", e), "Failed to write certificate cache");
            }
        }
    }

    async fn ensure_certificate_index(&self) -> Result<()> {
        {
            let index = self.inner.certificates.read().await;
            if let Some(ref cached) = *index {
                if !cached.is_older_than(self.ttl_minutes()) {
                    return Ok(());
                }
            }
        }

        match self.inner.processor.try_certificate_index().await {
            Ok(index) => {
                let cached = CachedData::new(index);
                self.save_certificates(&cached);
                *self.inner.certificates.write().await = Some(cached);
                Ok(())
            }
            Err(e) => {
                if self.inner.certificates.read().await.is_none() {
                    return Err(e);
                }
                warn!(error = %format!("{:#}", e), "Certificate refresh failed, serving stale index");
                Ok(())
            }
        }
    }

    pub async fn certificate_events(&self) -> Result<Vec<String>> {
        self.ensure_certificate_index().await?;
        let index = self.inner.certificates.read().await;
        Ok(index
            .as_ref()
            .map(|c| c.data.event_names().into_iter().map(String::from).collect())
            .unwrap_or_default())
    }

    /// Make sure an event's recipients are listed. `false` for unknown events.
    async fn ensure_event(&self, event: &str) -> Result<bool> {
        self.ensure_certificate_index().await?;

        let folder_id = {
            let index = self.inner.certificates.read().await;
            match index.as_ref().and_then(|c| c.data.event(event)) {
                None => return Ok(false),
                Some(folder) if folder.is_loaded() => return Ok(true),
                Some(folder) => folder.folder_id.clone(),
            }
        };

        let recipients = self.inner.processor.try_event_recipients(&folder_id).await?;
        debug!(event = %event, recipients = recipients.len(), "Listed event certificates");

        let mut index = self.inner.certificates.write().await;
        if let Some(ref mut cached) = *index {
            cached.data.set_recipients(event, recipients);
            self.save_certificates(cached);
        }
        Ok(true)
    }

    /// Recipient names of an event, `None` when the event does not exist
    pub async fn certificate_names(&self, event: &str) -> Result<Option<Vec<String>>> {
        if !self.ensure_event(event).await? {
            return Ok(None);
        }
        let index = self.inner.certificates.read().await;
        Ok(index
            .as_ref()
            .and_then(|c| c.data.event(event))
            .map(|folder| folder.available_names()))
    }

    /// A recipient's certificate and its image bytes
    pub async fn certificate(&self, event: &str, name: &str) -> Result<Option<(CertificateFile, Vec<u8>)>> {
        if !self.ensure_event(event).await? {
            return Ok(None);
        }
        let file = {
            let index = self.inner.certificates.read().await;
            match index.as_ref().and_then(|c| c.data.find(event, name)) {
                Some(file) => file.clone(),
                None => return Ok(None),
            }
        };
        let bytes = self.inner.processor.download_certificate(&file).await?;
        Ok(Some((file, bytes)))
    }
}

fn within_retry_window(at: DateTime<Utc>) -> bool {
    Utc::now() - at < Duration::seconds(REFRESH_RETRY_SECS)
}
