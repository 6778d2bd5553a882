//! Editor sessions
//!
//! A session owns its loaded workbook and form state. Every user action
//! goes through a `Session` method, runs to completion, and leaves a
//! `Notice` describing the outcome for the next render.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::diagnostics::{price_formula_references, FormulaReference};
use crate::error::{PriceEditorError, PriceEditorResult};
use crate::export::{export_csv, preview_export, CsvExport, ExportPreview};
use crate::layout::PRICE_COUNT;
use crate::prices::{save_prices, PriceForm, PriceValues, SaveReport};
use crate::workbook::{format_number, PriceWorkbook};

pub type SessionId = Uuid;

/// Where the session's workbook came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum WorkbookSource {
    /// The bundled default file
    Bundled(PathBuf),
    /// A user upload, copied to a session-owned file
    Uploaded { path: PathBuf, filename: String },
}

impl WorkbookSource {
    pub fn path(&self) -> &Path {
        match self {
            WorkbookSource::Bundled(path) => path,
            WorkbookSource::Uploaded { path, .. } => path,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            WorkbookSource::Bundled(path) => path.display().to_string(),
            WorkbookSource::Uploaded { filename, .. } => format!("Uploaded file ({})", filename),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// A message shown at the top of the page after an action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(err: &PriceEditorError) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: err.to_string(),
        }
    }
}

/// Everything the page needs to render a session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub source: Option<String>,
    pub sheet_names: Vec<String>,
    pub form: PriceForm,
    pub notices: Vec<Notice>,
    pub export_available: bool,
    pub preview: Option<ExportPreview>,
    pub formula_references: Vec<FormulaReference>,
}

/// One user's editing session
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    workbook: Option<PriceWorkbook>,
    source: Option<WorkbookSource>,
    form: PriceForm,
    notices: Vec<Notice>,
    last_seen: Instant,
    last_used: u64,
}

impl Session {
    /// Start a session on the bundled workbook. A missing or broken default
    /// file leaves the session without a workbook, waiting for an upload.
    pub fn open_default(default_path: &Path) -> Self {
        let mut session = Self::empty();
        if !default_path.exists() {
            session.notices.push(Notice::warning(format!(
                "Default file {} not found. Please upload an Excel file.",
                default_path.display()
            )));
            return session;
        }

        match PriceWorkbook::open(default_path) {
            Ok(workbook) => {
                session.attach(workbook, WorkbookSource::Bundled(default_path.to_path_buf()))
            }
            Err(e) => {
                warn!(
                    path = %default_path.display(),
                    kind = e.kind(),
                    error = %e,
                    "default workbook failed to load"
                );
                session.notices.push(Notice::error(&e));
            }
        }
        session
    }

    /// A session with nothing loaded
    pub fn empty() -> Self {
        Self {
            id: Uuid::new_v4(),
            workbook: None,
            source: None,
            form: PriceForm::default(),
            notices: Vec::new(),
            last_seen: Instant::now(),
            last_used: 0,
        }
    }

    fn attach(&mut self, workbook: PriceWorkbook, source: WorkbookSource) {
        match PriceForm::from_workbook(&workbook) {
            Ok(form) => self.form = form,
            Err(e) => {
                self.notices.push(Notice::error(&e));
                return;
            }
        }
        info!(session = %self.id, source = %source.describe(), "workbook loaded");
        if !workbook.is_writable() {
            self.notices.push(Notice::warning(format!(
                "{} is not an .xlsx or .xlsm file. Prices can be viewed and exported but not saved.",
                source.describe()
            )));
        }
        self.workbook = Some(workbook);
        self.source = Some(source);
    }

    pub fn workbook(&self) -> Option<&PriceWorkbook> {
        self.workbook.as_ref()
    }

    pub fn source(&self) -> Option<&WorkbookSource> {
        self.source.as_ref()
    }

    pub fn form(&self) -> &PriceForm {
        &self.form
    }

    fn loaded(&self) -> PriceEditorResult<&PriceWorkbook> {
        self.workbook.as_ref().ok_or_else(no_workbook)
    }

    /// Replace the workbook with an uploaded file. The bytes are validated
    /// before anything is written, so a bad upload keeps the current workbook.
    pub fn upload(
        &mut self,
        filename: &str,
        bytes: &[u8],
        upload_dir: &Path,
    ) -> PriceEditorResult<()> {
        let result = self.try_upload(filename, bytes, upload_dir);
        match &result {
            Ok(()) => self.notices.push(Notice::info(format!("Using uploaded file {}", filename))),
            Err(e) => {
                warn!(
                    session = %self.id,
                    filename,
                    kind = e.kind(),
                    error = %e,
                    "upload rejected"
                );
                self.notices.push(Notice::error(e));
            }
        }
        result
    }

    fn try_upload(
        &mut self,
        filename: &str,
        bytes: &[u8],
        upload_dir: &Path,
    ) -> PriceEditorResult<()> {
        if bytes.is_empty() {
            return Err(PriceEditorError::Load("Uploaded file is empty".to_string()));
        }

        let stored_name = format!("{}.{}", Uuid::new_v4(), upload_extension(filename));
        let path = upload_dir.join(stored_name);
        let workbook = PriceWorkbook::from_bytes(path.clone(), bytes.to_vec())?;

        std::fs::create_dir_all(upload_dir).map_err(|e| {
            PriceEditorError::Load(format!(
                "Failed to create upload directory {}: {}",
                upload_dir.display(),
                e
            ))
        })?;
        // Stored exactly as sent; saves patch this copy
        std::fs::write(&path, bytes).map_err(|e| {
            PriceEditorError::Load(format!("Failed to store upload {}: {}", path.display(), e))
        })?;

        self.discard_upload();
        self.attach(
            workbook,
            WorkbookSource::Uploaded {
                path,
                filename: filename.to_string(),
            },
        );
        Ok(())
    }

    /// Validate the submitted inputs and save them. On any failure the
    /// submitted text stays in the form for correction.
    pub fn submit_prices(
        &mut self,
        inputs: [String; PRICE_COUNT],
    ) -> PriceEditorResult<SaveReport> {
        self.form = PriceForm::with_inputs(inputs);
        let result = self.try_submit();
        match &result {
            Ok(report) => {
                let saved = report
                    .cells
                    .iter()
                    .map(|(cell, value)| {
                        format!("{}: {}", cell, format_number(*value))
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                self.notices.push(Notice::success(format!(
                    "Prices updated successfully ({}) at {}",
                    saved,
                    report.saved_at.format("%H:%M:%S")
                )));
            }
            Err(e) => self.notices.push(Notice::error(e)),
        }
        result
    }

    fn try_submit(&mut self) -> PriceEditorResult<SaveReport> {
        self.loaded()?;
        let values = self.form.validate()?;
        self.save_values(&values)
    }

    /// Save already-validated values (JSON API, CLI)
    pub fn save_values(&mut self, values: &PriceValues) -> PriceEditorResult<SaveReport> {
        let Some(workbook) = self.workbook.as_mut() else {
            return Err(no_workbook());
        };
        let report = save_prices(workbook, values)?;
        // Re-read so the form shows exactly what was stored
        self.form = PriceForm::from_workbook(workbook)?;
        Ok(report)
    }

    /// Queue a message for the next render
    pub fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    /// Export the Export sheet. Failures are recorded as a notice.
    pub fn export(&mut self) -> PriceEditorResult<CsvExport> {
        let result = self.loaded().and_then(export_csv);
        if let Err(e) = &result {
            self.notices.push(Notice::error(e));
        }
        result
    }

    /// Snapshot for rendering; drains pending notices
    pub fn view(&mut self) -> SessionView {
        let mut notices = std::mem::take(&mut self.notices);

        let Some(workbook) = self.workbook.as_ref() else {
            return SessionView {
                source: None,
                sheet_names: Vec::new(),
                form: self.form.clone(),
                notices,
                export_available: false,
                preview: None,
                formula_references: Vec::new(),
            };
        };

        let preview = preview_export(workbook).ok();
        let formula_references = match price_formula_references(workbook) {
            Ok(refs) => refs,
            Err(e) => {
                notices.push(Notice::error(&e));
                Vec::new()
            }
        };

        SessionView {
            source: self.source.as_ref().map(|s| s.describe()),
            sheet_names: workbook.sheet_names(),
            form: self.form.clone(),
            notices,
            export_available: preview.is_some(),
            preview,
            formula_references,
        }
    }

    /// Delete the session-owned copy of an uploaded workbook, if any
    pub fn discard_upload(&mut self) {
        if let Some(WorkbookSource::Uploaded { path, .. }) = &self.source {
            if let Err(e) = std::fs::remove_file(path) {
                warn!(path = %path.display(), error = %e, "failed to remove uploaded workbook");
            }
        }
    }
}

fn no_workbook() -> PriceEditorError {
    PriceEditorError::Load("No workbook loaded. Please upload an Excel file.".to_string())
}

/// Extension for the stored copy of an upload, `xlsx` when the name has none
fn upload_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "xlsx".to_string())
}

/// Sessions idle longer than this are dropped
pub const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(30 * 60);

/// Most sessions kept at once; the least recently used one goes first
pub const DEFAULT_MAX_SESSIONS: usize = 100;

/// All live sessions, keyed by the id in the session cookie
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionId, Session>>,
    idle_timeout: Duration,
    max_sessions: usize,
    uses: AtomicU64,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_limits(DEFAULT_SESSION_IDLE, DEFAULT_MAX_SESSIONS)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(idle_timeout: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout,
            max_sessions: max_sessions.max(1),
            uses: AtomicU64::new(0),
        }
    }

    /// Run `action` against the session `id`, creating a fresh session on the
    /// default workbook when the id is unknown. Returns the id actually used.
    ///
    /// Idle sessions are evicted first; a new session evicts the least
    /// recently used ones while the store is full. Evicted sessions lose
    /// their uploaded copies.
    pub fn with_session<T>(
        &self,
        id: Option<SessionId>,
        default_path: &Path,
        action: impl FnOnce(&mut Session) -> T,
    ) -> (SessionId, T) {
        let mut sessions = match self.sessions.lock() {
            Ok(guard) => guard,
            // A panicking handler must not take every other session down with it
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Instant::now();
        self.evict_idle(&mut sessions, now);

        let id = match id.filter(|id| sessions.contains_key(id)) {
            Some(id) => id,
            None => {
                self.make_room(&mut sessions);
                Uuid::new_v4()
            }
        };
        let session = sessions.entry(id).or_insert_with(|| {
            let mut session = Session::open_default(default_path);
            session.id = id;
            session
        });
        session.last_seen = now;
        session.last_used = self.uses.fetch_add(1, Ordering::Relaxed);

        (id, action(session))
    }

    fn evict_idle(&self, sessions: &mut HashMap<SessionId, Session>, now: Instant) {
        sessions.retain(|id, session| {
            let keep = now.duration_since(session.last_seen) < self.idle_timeout;
            if !keep {
                debug!(session = %id, "evicting idle session");
                session.discard_upload();
            }
            keep
        });
    }

    fn make_room(&self, sessions: &mut HashMap<SessionId, Session>) {
        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, session)| session.last_used)
                .map(|(id, _)| *id);
            let Some(mut session) = oldest.and_then(|id| sessions.remove(&id)) else {
                break;
            };
            debug!(session = %session.id, "evicting least recently used session");
            session.discard_upload();
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all sessions, deleting their uploaded copies
    pub fn clear(&self) {
        if let Ok(mut sessions) = self.sessions.lock() {
            for session in sessions.values_mut() {
                session.discard_upload();
            }
            sessions.clear();
        }
    }
}
