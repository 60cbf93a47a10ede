//! One operator's interactive session.
//!
//! The session owns the store handle, the classifier, the admin flag and a
//! snapshot of the history. Each operation runs to completion before the
//! next; nothing happens in the background.

use chrono::{Local, NaiveDateTime};
use serde::Serialize;

use crate::admin::AdminGate;
use crate::analyzer::{detection_rate, Summary};
use crate::classifier::{decode_image, preprocess, validate_probability, Classifier, ImageInfo, RgbImage};
use crate::config::Config;
use crate::drift_tracker::DriftResult;
use crate::error::{SessionError, SessionResult};
use crate::history::History;
use crate::logging::{log, log_drift, log_prediction, obj, v_num, v_str, Domain, Level};
use crate::record::{PredictionRecord, RecordId};
use crate::report::render_report;
use crate::storage::RecordStore;

/// Result of one analysis, as shown to the operator.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub record: PredictionRecord,
    pub image: Option<ImageInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub summary: Option<Summary>,
    pub detection_rate: Option<f64>,
    pub drift: Option<DriftResult>,
}

pub struct Session {
    store: Box<dyn RecordStore>,
    classifier: Box<dyn Classifier>,
    admin: AdminGate,
    drift_window: usize,
    history: History,
}

impl Session {
    pub fn new(
        store: Box<dyn RecordStore>,
        classifier: Box<dyn Classifier>,
        admin: AdminGate,
        drift_window: usize,
    ) -> Self {
        Self {
            store,
            classifier,
            admin,
            drift_window,
            history: History::new(),
        }
    }

    pub fn from_config(cfg: &Config, store: Box<dyn RecordStore>, classifier: Box<dyn Classifier>) -> Self {
        let admin = AdminGate::new(cfg.admin_password_hash.as_deref(), cfg.admin_salt.as_deref());
        Self::new(store, classifier, admin, cfg.drift_window)
    }

    /// Confirms the model is loaded. A failure here halts the workflow.
    pub async fn ensure_model_ready(&self) -> SessionResult<()> {
        self.classifier.health_check().await.map_err(|e| {
            log(
                Level::Error,
                Domain::Classifier,
                "model_unavailable",
                obj(&[("error", v_str(&format!("{:#}", e)))]),
            );
            SessionError::Classifier(e)
        })
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn store_backend(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Reloads the history snapshot from the store.
    pub async fn refresh(&mut self) -> SessionResult<&History> {
        let records = self.store.list_all().await.map_err(SessionError::Store)?;
        self.history = History::from_records(records);
        Ok(&self.history)
    }

    /// Decodes an uploaded image and analyzes it.
    pub async fn analyze(&mut self, subject: &str, image_bytes: &[u8]) -> SessionResult<AnalysisOutcome> {
        require_subject(subject)?;
        let (image, info) = decode_image(image_bytes)
            .map_err(|e| SessionError::InvalidInput(format!("cannot read image: {:#}", e)))?;
        log(
            Level::Debug,
            Domain::Classifier,
            "image_decoded",
            obj(&[
                ("width", v_num(info.width as f64)),
                ("height", v_num(info.height as f64)),
                ("format", v_str(&info.format)),
                ("mode", v_str(&info.mode)),
            ]),
        );
        let mut outcome = self.analyze_image(subject, &image).await?;
        outcome.image = Some(info);
        Ok(outcome)
    }

    /// Validates, classifies and records. Nothing is written unless every
    /// step before the append succeeds. Once the append succeeds the outcome
    /// is returned even if the history snapshot cannot be reloaded.
    pub async fn analyze_image(&mut self, subject: &str, image: &RgbImage) -> SessionResult<AnalysisOutcome> {
        require_subject(subject)?;
        let tensor = preprocess(image).map_err(|e| SessionError::InvalidInput(format!("{:#}", e)))?;

        let probability = self
            .classifier
            .classify(&tensor)
            .await
            .and_then(validate_probability)
            .map_err(SessionError::Classifier)?;

        let record = PredictionRecord::now(subject, probability);
        let id = self.store.append(&record).await.map_err(SessionError::Store)?;
        let record = record.with_id(id);

        log_prediction(
            &id.to_string(),
            &record.subject_label,
            probability,
            record.classification().as_str(),
        );
        if let Err(err) = self.refresh().await {
            log(
                Level::Warn,
                Domain::Session,
                "refresh_failed",
                obj(&[
                    ("record_id", v_str(&id.to_string())),
                    ("error", v_str(&err.to_string())),
                ]),
            );
        }
        Ok(AnalysisOutcome { record, image: None })
    }

    /// Attaches feedback to the most recent record.
    pub async fn add_feedback(&mut self, text: &str) -> SessionResult<RecordId> {
        self.refresh().await?;
        let id = self
            .history
            .latest()
            .and_then(|r| r.id)
            .ok_or(SessionError::NoRecords)?;
        let updated = self
            .store
            .update_feedback(id, text)
            .await
            .map_err(SessionError::Store)?;
        if !updated {
            return Err(SessionError::Store(anyhow::anyhow!("record {} disappeared before feedback was saved", id)));
        }
        log(
            Level::Info,
            Domain::Session,
            "feedback_saved",
            obj(&[("record_id", v_str(&id.to_string()))]),
        );
        self.refresh().await?;
        Ok(id)
    }

    pub async fn dashboard(&mut self) -> SessionResult<Dashboard> {
        self.refresh().await?;
        let summary = self.history.summary();
        let drift = self.history.drift(self.drift_window);
        if let Some(d) = &drift {
            log_drift(d.trend.as_str(), d.drift_value, d.early_mean, d.late_mean);
        }
        Ok(Dashboard {
            detection_rate: summary.as_ref().map(detection_rate),
            summary,
            drift,
        })
    }

    pub async fn export_report(&mut self) -> SessionResult<String> {
        self.export_report_at(Local::now().naive_local()).await
    }

    pub async fn export_report_at(&mut self, generated_at: NaiveDateTime) -> SessionResult<String> {
        self.refresh().await?;
        Ok(render_report(self.history.records(), generated_at))
    }

    pub async fn clear_history(&mut self) -> SessionResult<bool> {
        let ok = self.store.clear_all().await.map_err(SessionError::Store)?;
        log(
            Level::Info,
            Domain::Session,
            "history_cleared",
            obj(&[("backend", v_str(self.store.backend_name()))]),
        );
        self.refresh().await?;
        Ok(ok)
    }

    // ---------------------------------------------------------------------
    // Admin
    // ---------------------------------------------------------------------

    pub fn login(&mut self, password: &str) -> bool {
        self.admin.login(password)
    }

    pub fn logout(&mut self) {
        self.admin.logout();
    }

    pub fn is_admin(&self) -> bool {
        self.admin.is_authenticated()
    }

    fn require_admin(&self) -> SessionResult<()> {
        if self.admin.is_authenticated() {
            Ok(())
        } else {
            Err(SessionError::NotAuthorized)
        }
    }

    /// Full record list with ids, for the admin view.
    pub async fn admin_records(&mut self) -> SessionResult<Vec<PredictionRecord>> {
        self.require_admin()?;
        Ok(self.refresh().await?.records().to_vec())
    }

    pub async fn delete_record(&mut self, id: RecordId) -> SessionResult<bool> {
        self.require_admin()?;
        let deleted = self.store.delete(id).await.map_err(SessionError::Store)?;
        log(
            Level::Info,
            Domain::Admin,
            "record_deleted",
            obj(&[
                ("record_id", v_str(&id.to_string())),
                ("found", v_str(if deleted { "yes" } else { "no" })),
            ]),
        );
        self.refresh().await?;
        Ok(deleted)
    }
}

fn require_subject(subject: &str) -> SessionResult<()> {
    if subject.trim().is_empty() {
        log(
            Level::Warn,
            Domain::Session,
            "validation_failed",
            obj(&[("reason", v_str("missing subject label"))]),
        );
        Err(SessionError::InvalidInput("a subject label is required before analysis".to_string()))
    } else {
        Ok(())
    }
}
