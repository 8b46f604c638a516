use crate::models::category::CategorySelection;
use crate::models::media::MediaFile;

pub const TITLE_MIN_CHARS: usize = 3;
pub const TITLE_MAX_CHARS: usize = 100;
pub const CONTENT_MIN_CHARS: usize = 10;

/// A single failed form check, addressed to one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// A post under composition. Lives client-side until submitted; `media_key`
/// is only set once the attached file has actually been uploaded.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    pub categories: CategorySelection,
    pub location: String,
    pub media_file: Option<MediaFile>,
    pub media_key: Option<String>,
}

impl PostDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks every field and reports all failures at once, in display order.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        let title = self.title.trim();
        if title.is_empty() {
            errors.push(FieldError::new("title", "Title is required"));
        } else if title.chars().count() < TITLE_MIN_CHARS {
            errors.push(FieldError::new(
                "title",
                format!("Title must be at least {TITLE_MIN_CHARS} characters"),
            ));
        } else if title.chars().count() > TITLE_MAX_CHARS {
            errors.push(FieldError::new(
                "title",
                format!("Title must be less than {TITLE_MAX_CHARS} characters"),
            ));
        }

        let content = self.content.trim();
        if content.is_empty() {
            errors.push(FieldError::new("content", "Content is required"));
        } else if content.chars().count() < CONTENT_MIN_CHARS {
            errors.push(FieldError::new(
                "content",
                format!("Content must be at least {CONTENT_MIN_CHARS} characters"),
            ));
        }

        if self.media_file.is_none() {
            errors.push(FieldError::new("media", "Please select an image or video"));
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Clears every field back to a fresh draft.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft_with_media() -> PostDraft {
        PostDraft {
            title: "First tracks".to_string(),
            content: "Untouched powder all morning.".to_string(),
            media_file: Some(MediaFile::new("a.jpg", "image/jpeg", vec![1, 2, 3])),
            ..PostDraft::default()
        }
    }

    #[test]
    fn complete_draft_passes() {
        assert!(draft_with_media().validate().is_ok());
    }

    #[test]
    fn reports_all_failures_at_once() {
        let draft = PostDraft::new();
        let errors = draft.validate().unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, ["title", "content", "media"]);
    }

    #[test]
    fn title_bounds_are_inclusive() {
        let mut draft = draft_with_media();
        draft.title = "abc".to_string();
        assert!(draft.validate().is_ok());

        draft.title = "ab".to_string();
        let errors = draft.validate().unwrap_err();
        assert!(errors[0].message.contains("at least 3"));

        draft.title = "x".repeat(100);
        assert!(draft.validate().is_ok());
        draft.title = "x".repeat(101);
        assert!(draft.validate().is_err());
    }

    #[test]
    fn whitespace_only_content_counts_as_missing() {
        let mut draft = draft_with_media();
        draft.content = "   \n\t ".to_string();
        let errors = draft.validate().unwrap_err();
        assert_eq!(errors[0].field, "content");
        assert_eq!(errors[0].message, "Content is required");
    }

    #[test]
    fn missing_media_is_an_error() {
        let mut draft = draft_with_media();
        draft.media_file = None;
        let errors = draft.validate().unwrap_err();
        assert_eq!(errors[0].field, "media");
    }

    #[test]
    fn reset_clears_everything() {
        let mut draft = draft_with_media();
        draft.media_key = Some("uploads/post_x.jpg".to_string());
        draft.categories.add("Powder");
        draft.reset();
        assert!(draft.title.is_empty());
        assert!(draft.media_file.is_none());
        assert!(draft.media_key.is_none());
        assert!(draft.categories.is_empty());
    }
}
