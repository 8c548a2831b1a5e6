//! Import/export job outcome notifications.
//!
//! Composes the notification a user receives when a bulk import or export
//! job finishes: a templated title and body plus a deep link back to the
//! import or export page, anchored on the job id. Delivery is behind the
//! [`JobNotifier`] trait; rendering and the mail channel are the
//! deployment's concern.

use async_trait::async_trait;
use url::Url;

/// Notification composition or delivery failure.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The outcome path could not be joined onto the base URL.
    #[error("invalid job url: {0}")]
    Url(#[from] url::ParseError),

    /// The notifier could not deliver the notification.
    #[error("notification delivery failed: {message}")]
    Delivery {
        /// Channel-specific description of the failure.
        message: String,
    },
}

/// How an import or export job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Import finished cleanly.
    ImportCompleted,
    /// Import refused to apply changes because of warnings.
    ImportBlocked,
    /// Import died on a server error.
    ImportFailed,
    /// Import was stopped mid-flight; partial data was saved.
    ImportStopped,
    /// Export finished cleanly.
    ExportCompleted,
    /// Export died on a server error.
    ExportCrashed,
    /// Export was refused because the item count was too large.
    ExportSizeExceeded,
}

/// Title, body and page path for one job outcome.
///
/// Titles may carry a `{filename}` placeholder, filled in by
/// [`compose`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobTemplate {
    /// Notification title.
    pub title: &'static str,
    /// Notification body.
    pub body: &'static str,
    /// Page the deep link lands on, relative to the deployment base URL.
    pub path: &'static str,
}

const IMPORT_COMPLETED: JobTemplate = JobTemplate {
    title: "{filename} was imported successfully",
    body: "Go to import page to check details or submit new import request.",
    path: "import",
};

const IMPORT_BLOCKED: JobTemplate = JobTemplate {
    title: "Could not import {filename} due to warnings",
    body: "Go to import page to check details or submit new import request.",
    path: "import",
};

const IMPORT_FAILED: JobTemplate = JobTemplate {
    title: "[WARNING] Could not import {filename} due to errors",
    body: "Your Import job failed due to a server error. Please retry import/export.",
    path: "import",
};

const IMPORT_STOPPED: JobTemplate = JobTemplate {
    title: "[WARNING] Import of {filename} was stopped",
    body: "The import was stopped. Only partial data was saved.",
    path: "import",
};

const EXPORT_COMPLETED: JobTemplate = JobTemplate {
    title: "{filename} was exported successfully",
    body: "Go to export page to download the result. If the file generated \
           for this export request has been downloaded, you can ignore the \
           email.",
    path: "export",
};

const EXPORT_CRASHED: JobTemplate = JobTemplate {
    title: "[WARNING] Your export request did not finish due to errors",
    body: "Your Export job failed due to a server error. Please restart the \
           export again. Sorry for the inconveniences.",
    path: "export",
};

const EXPORT_SIZE_EXCEEDED: JobTemplate = JobTemplate {
    title: "[WARNING] Your export request did not finish due to errors",
    body: "Too many items. The export cannot be processed. Please contact \
           our support team.",
    path: "export",
};

impl JobOutcome {
    /// The template for this outcome.
    pub fn template(&self) -> &'static JobTemplate {
        match self {
            JobOutcome::ImportCompleted => &IMPORT_COMPLETED,
            JobOutcome::ImportBlocked => &IMPORT_BLOCKED,
            JobOutcome::ImportFailed => &IMPORT_FAILED,
            JobOutcome::ImportStopped => &IMPORT_STOPPED,
            JobOutcome::ExportCompleted => &EXPORT_COMPLETED,
            JobOutcome::ExportCrashed => &EXPORT_CRASHED,
            JobOutcome::ExportSizeExceeded => &EXPORT_SIZE_EXCEEDED,
        }
    }
}

/// Deep link to the import or export page for a finished job.
///
/// Joins the outcome's page path onto `base` and, when a job id is given,
/// anchors the page on that job with a `#!&job_id={id}` fragment.
pub fn job_url(base: &Url, outcome: JobOutcome, job_id: Option<i64>) -> Result<Url, NotifyError> {
    let mut url = base.join(outcome.template().path)?;
    if let Some(id) = job_id {
        url.set_fragment(Some(&format!("!&job_id={id}")));
    }
    Ok(url)
}

/// A fully composed notification, ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobNotification {
    /// Who receives it.
    pub recipient: String,
    /// Title with the filename substituted in.
    pub title: String,
    /// Body text.
    pub body: String,
    /// Deep link to the job.
    pub url: Url,
}

/// Composes the notification for a finished job.
pub fn compose(
    outcome: JobOutcome,
    recipient: impl Into<String>,
    filename: &str,
    base: &Url,
    job_id: Option<i64>,
) -> Result<JobNotification, NotifyError> {
    let template = outcome.template();
    Ok(JobNotification {
        recipient: recipient.into(),
        title: template.title.replace("{filename}", filename),
        body: template.body.to_string(),
        url: job_url(base, outcome, job_id)?,
    })
}

/// Delivery boundary for composed notifications.
#[async_trait]
pub trait JobNotifier: Send + Sync {
    /// Delivers one notification.
    async fn notify(&self, notification: JobNotification) -> Result<(), NotifyError>;
}
