//! The session that owns one user's wizard and history.
//!
//! [`Session`] applies intents under a short-lived lock, runs generation
//! without holding it, and publishes a [`WizardSnapshot`] after each change.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::client::{GeminiClient, ImageGenerator};
use crate::config::TryOnConfig;
use crate::download::DownloadFile;
use crate::encoder::{self, UploadRole};
use crate::error::{Result, TransitionError, TryOnError};
use crate::history::HistoryLedger;
use crate::types::{GenerationStatus, HistoryEntry, ImageReference, Step};
use crate::wizard::{GenerationTicket, WizardState};

/// Read-only view handed to the presentation layer after every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardSnapshot {
    pub step: Step,
    pub selected_person: Option<ImageReference>,
    pub selected_garment: Option<ImageReference>,
    pub result: Option<ImageReference>,
    pub custom_garments: Arc<[ImageReference]>,
    pub status: GenerationStatus,
    pub history: Arc<[HistoryEntry]>,
}

struct SessionInner {
    wizard: WizardState,
    history: HistoryLedger,
    // Shared with published snapshots. Both lists only ever grow, so a
    // length change is the only way their contents change.
    garments_view: Arc<[ImageReference]>,
    history_view: Arc<[HistoryEntry]>,
}

impl SessionInner {
    fn new() -> Self {
        Self {
            wizard: WizardState::new(),
            history: HistoryLedger::new(),
            garments_view: Arc::from(Vec::new()),
            history_view: Arc::from(Vec::new()),
        }
    }

    fn refresh_views(&mut self) {
        if self.garments_view.len() != self.wizard.custom_garments().len() {
            self.garments_view = Arc::from(self.wizard.custom_garments());
        }
        if self.history_view.len() != self.history.len() {
            self.history_view = Arc::from(self.history.to_vec());
        }
    }

    fn snapshot(&self) -> WizardSnapshot {
        WizardSnapshot {
            step: self.wizard.step(),
            selected_person: self.wizard.selected_person().cloned(),
            selected_garment: self.wizard.selected_garment().cloned(),
            result: self.wizard.result().cloned(),
            custom_garments: Arc::clone(&self.garments_view),
            status: self.wizard.status().clone(),
            history: Arc::clone(&self.history_view),
        }
    }
}

/// One user's try-on session.
///
/// Owns the wizard state and the history ledger, runs the generation
/// pipeline, and publishes a [`WizardSnapshot`] to subscribers after every
/// change. The state lock is only held while a transition is applied, never
/// across a network call, so intents keep flowing while a request is out.
///
/// # Example
/// ```no_run
/// use virtual_tryon::{Session, TryOnConfig};
///
/// # async fn example() -> virtual_tryon::Result<()> {
/// let session = Session::gemini(TryOnConfig::from_env()?)?;
/// session.choose_preset_person("p1")?;
/// session.advance_to_garment()?;
/// session.choose_preset_garment("g1")?;
/// if let Some(result) = session.enter_result_step().await? {
///     println!("composite {}", result.id);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Session<G: ImageGenerator> {
    generator: G,
    http: Client,
    fetch_timeout: Duration,
    catalog: Catalog,
    inner: Mutex<SessionInner>,
    updates: watch::Sender<WizardSnapshot>,
}

impl Session<GeminiClient> {
    /// Session backed by the Gemini API.
    pub fn gemini(config: TryOnConfig) -> Result<Self> {
        let fetch_timeout = config.fetch_timeout;
        let client = GeminiClient::new(config)?;
        Ok(Session::new(client).with_fetch_timeout(fetch_timeout))
    }
}

impl<G: ImageGenerator> Session<G> {
    pub fn new(generator: G) -> Self {
        let inner = SessionInner::new();
        let (updates, _) = watch::channel(inner.snapshot());
        Self {
            generator,
            http: Client::new(),
            fetch_timeout: TryOnConfig::default().fetch_timeout,
            catalog: Catalog::builtin(),
            inner: Mutex::new(inner),
            updates,
        }
    }

    /// Replace the preset catalog.
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Use a custom `reqwest::Client` for preset fetches.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// Set the timeout for preset fetches.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    // ── State access ────────────────────────────────────────────────

    pub fn snapshot(&self) -> WizardSnapshot {
        self.lock().snapshot()
    }

    /// Receive a fresh snapshot after every applied change.
    pub fn subscribe(&self) -> watch::Receiver<WizardSnapshot> {
        self.updates.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<T>(&self, f: impl FnOnce(&mut SessionInner) -> T) -> T {
        let mut inner = self.lock();
        let out = f(&mut inner);
        inner.refresh_views();
        let snapshot = inner.snapshot();
        drop(inner);
        self.updates.send_replace(snapshot);
        out
    }

    // ── Step 1 ──────────────────────────────────────────────────────

    pub fn choose_person(&self, person: ImageReference) -> Result<()> {
        self.update(|s| s.wizard.choose_person(person))?;
        Ok(())
    }

    pub fn choose_preset_person(&self, id: &str) -> Result<()> {
        let person = self
            .catalog
            .person(id)
            .cloned()
            .ok_or_else(|| TransitionError::UnknownPreset(id.to_string()))?;
        self.choose_person(person)
    }

    /// Encode a local photo and select it as the person.
    pub async fn upload_person(&self, path: &Path) -> Result<ImageReference> {
        let person = encoder::encode_local_file(path, UploadRole::Person).await?;
        self.choose_person(person.clone())?;
        Ok(person)
    }

    pub fn advance_to_garment(&self) -> Result<()> {
        self.update(|s| s.wizard.advance_to_garment())?;
        Ok(())
    }

    // ── Step 2 ──────────────────────────────────────────────────────

    pub fn choose_garment(&self, garment: ImageReference) -> Result<()> {
        self.update(|s| s.wizard.choose_garment(garment))?;
        Ok(())
    }

    pub fn choose_preset_garment(&self, id: &str) -> Result<()> {
        let garment = self
            .catalog
            .garment(id)
            .cloned()
            .ok_or_else(|| TransitionError::UnknownPreset(id.to_string()))?;
        self.choose_garment(garment)
    }

    /// Encode a local garment image, prepend it to the custom garments, and
    /// select it.
    pub async fn upload_garment(&self, path: &Path) -> Result<ImageReference> {
        let garment = encoder::encode_local_file(path, UploadRole::Garment).await?;
        self.update(|s| s.wizard.add_custom_garment(garment.clone()))?;
        Ok(garment)
    }

    /// Generate a garment from a text description.
    ///
    /// On success the garment is prepended to the custom garments, and
    /// selected if the wizard is still on the garment step. On failure
    /// nothing changes.
    pub async fn generate_garment(&self, description: &str) -> Result<ImageReference> {
        if description.trim().is_empty() {
            return Err(TryOnError::EmptyPrompt);
        }

        let garment = self.generator.synthesize_garment(description).await?;
        self.update(|s| {
            if s.wizard.step() == Step::SelectGarment {
                s.wizard.add_custom_garment(garment.clone())
            } else {
                debug!(id = %garment.id, "garment step left, keeping generated garment unselected");
                s.wizard.remember_custom_garment(garment.clone());
                Ok(())
            }
        })?;
        Ok(garment)
    }

    pub fn back_to_person(&self) -> Result<()> {
        self.update(|s| s.wizard.back_to_person())?;
        Ok(())
    }

    /// Move to the result step. Returns a ticket when a composite has to be
    /// generated; pass it to [`Session::generate`].
    pub fn advance_to_result(&self) -> Result<Option<GenerationTicket>> {
        Ok(self.update(|s| s.wizard.advance_to_result())?)
    }

    // ── Step 3 ──────────────────────────────────────────────────────

    /// Advance to the result step and run the generation it triggers, if any.
    ///
    /// Returns `Ok(None)` when no request was started (already on the result
    /// step, a result already exists, or one is pending) or when the result
    /// arrived after the user moved on.
    pub async fn enter_result_step(&self) -> Result<Option<ImageReference>> {
        match self.advance_to_result()? {
            Some(ticket) => self.generate(ticket).await,
            None => Ok(None),
        }
    }

    /// Run the composite pipeline for `ticket` and apply the outcome.
    ///
    /// Remote sources are inlined first. A ticket runs at most once; a second
    /// call with the same ticket, or a call with a stale one, sends nothing
    /// and returns `Ok(None)`. Outcomes for stale tickets are dropped and
    /// reported as `Ok(None)`.
    pub async fn generate(&self, ticket: GenerationTicket) -> Result<Option<ImageReference>> {
        let claimed = self.lock().wizard.begin(&ticket);
        if !claimed {
            debug!(epoch = ticket.epoch(), "ticket already started or stale, skipping request");
            return Ok(None);
        }

        match self.run_pipeline(&ticket).await {
            Ok(result) => {
                let applied = self.update(|s| -> Result<bool> {
                    match s.wizard.record_result(&ticket, result.clone())? {
                        Some(entry) => {
                            s.history.append(entry);
                            Ok(true)
                        }
                        None => Ok(false),
                    }
                })?;
                if applied {
                    info!(id = %result.id, "composite applied");
                    Ok(Some(result))
                } else {
                    debug!(epoch = ticket.epoch(), "discarding composite for stale selection");
                    Ok(None)
                }
            }
            Err(e) => {
                let message = e.to_string();
                if self.update(|s| s.wizard.record_failure(&ticket, message)) {
                    warn!(error = %e, "composite generation failed");
                    Err(e)
                } else {
                    debug!(error = %e, "ignoring failure for stale selection");
                    Ok(None)
                }
            }
        }
    }

    /// Re-run a failed generation with the same inputs.
    pub async fn retry(&self) -> Result<Option<ImageReference>> {
        match self.update(|s| s.wizard.retry())? {
            Some(ticket) => self.generate(ticket).await,
            None => Ok(None),
        }
    }

    async fn run_pipeline(&self, ticket: &GenerationTicket) -> Result<ImageReference> {
        let person =
            encoder::ensure_inline(&self.http, &ticket.person.source, self.fetch_timeout).await?;
        let garment =
            encoder::ensure_inline(&self.http, &ticket.garment.source, self.fetch_timeout).await?;
        self.generator.synthesize_try_on(&person, &garment).await
    }

    pub fn back_to_garment(&self) -> Result<()> {
        self.update(|s| s.wizard.back_to_garment())?;
        Ok(())
    }

    /// Clear selections and result. Custom garments and history stay.
    pub fn restart(&self) {
        self.update(|s| s.wizard.restart());
    }

    // ── History & downloads ─────────────────────────────────────────

    /// Completed generations, newest first.
    pub fn history(&self) -> Arc<[HistoryEntry]> {
        Arc::clone(&self.lock().history_view)
    }

    pub fn download_result(&self) -> Result<DownloadFile> {
        let result = self
            .lock()
            .wizard
            .result()
            .cloned()
            .ok_or(TransitionError::NoResult)?;
        DownloadFile::for_result(&result)
    }

    pub fn download_history_entry(&self, id: &str) -> Result<DownloadFile> {
        let entry = self
            .lock()
            .history
            .get(id)
            .cloned()
            .ok_or_else(|| TransitionError::UnknownHistoryEntry(id.to_string()))?;
        DownloadFile::for_history_entry(&entry)
    }
}
