use serde::Serialize;
use serde_json::{Value, json};

use crate::model::ConversionResult;
use crate::pipeline::ProgressEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// The view of a conversion a task table would persist.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub id: String,
    pub status: TaskStatus,
    pub progress: Option<Value>,
    pub error_message: Option<String>,
}

impl TaskRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: TaskStatus::Pending,
            progress: None,
            error_message: None,
        }
    }

    pub fn start(&mut self) {
        self.status = TaskStatus::Processing;
    }

    /// Keeps only the latest event.
    pub fn record_progress(&mut self, event: &ProgressEvent) {
        self.progress = Some(event.to_json());
    }

    pub fn finish(&mut self, result: &ConversionResult) {
        if result.success {
            self.status = TaskStatus::Completed;
            self.progress = Some(json!({
                "output_path": result.output_path.as_ref().map(|path| path.display().to_string()),
                "pages_count": result.slides_count,
                "text_blocks_count": result.text_blocks_count,
            }));
            self.error_message = None;
        } else {
            self.status = TaskStatus::Failed;
            self.error_message = Some(
                result
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "conversion failed".to_string()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn success_maps_to_completed_summary() {
        let mut task = TaskRecord::new("t1");
        task.start();
        assert_eq!(task.status, TaskStatus::Processing);
        task.record_progress(&ProgressEvent::Generating { total: 3 });
        task.finish(&ConversionResult::succeeded(PathBuf::from("/out/deck.pptx"), 3, 6));
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(
            task.progress,
            Some(json!({
                "output_path": "/out/deck.pptx",
                "pages_count": 3,
                "text_blocks_count": 6,
            }))
        );
        let serialized = serde_json::to_value(&task).unwrap();
        assert_eq!(serialized["status"], "COMPLETED");
    }

    #[test]
    fn failure_keeps_last_progress_and_message() {
        let mut task = TaskRecord::new("t2");
        task.start();
        task.record_progress(&ProgressEvent::Recognizing { page: 1, total: 2 });
        task.finish(&ConversionResult::failed("disk full"));
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error_message.as_deref(), Some("disk full"));
        assert_eq!(task.progress.as_ref().unwrap()["stage"], "ocr");
    }
}
