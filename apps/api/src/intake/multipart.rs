use axum::extract::Multipart;

use super::Upload;
use crate::errors::AppError;

/// Multipart field carrying the resume file.
pub const FILE_FIELD: &str = "resume";
/// Multipart field carrying pasted resume text.
pub const TEXT_FIELD: &str = "resume_text";

/// What a resume form submitted: at most one file and optional pasted text.
#[derive(Debug, Default)]
pub struct ResumeForm {
    pub file: Option<Upload>,
    pub text: Option<String>,
}

/// Reads the whole multipart body. A second file is rejected and unknown
/// fields are skipped.
pub async fn read_resume_form(mut multipart: Multipart) -> Result<ResumeForm, AppError> {
    let mut form = ResumeForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(FILE_FIELD) => {
                if form.file.is_some() {
                    return Err(AppError::Validation(
                        "Only one resume file can be uploaded at a time".to_string(),
                    ));
                }
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid file: {e}")))?;
                // Browsers send an empty part when no file was picked.
                if filename.is_empty() && bytes.is_empty() {
                    continue;
                }
                form.file = Some(Upload { filename, bytes });
            }
            Some(TEXT_FIELD) => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid resume_text: {e}")))?;
                form.text = Some(text);
            }
            other => {
                tracing::debug!("Ignoring multipart field {:?}", other);
            }
        }
    }

    Ok(form)
}
