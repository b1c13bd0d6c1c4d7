use crate::error::{LexbidError, LexbidResult};
use lexbid_models::FileKind;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

pub fn validate_model<T: Validate>(model: &T) -> LexbidResult<()> {
    match model.validate() {
        Ok(()) => Ok(()),
        Err(errors) => Err(LexbidError::validation("model", format_validation_errors(&errors))),
    }
}

pub fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut messages = Vec::new();
    collect_messages("", errors, &mut messages);
    messages.join(", ")
}

fn collect_messages(prefix: &str, errors: &ValidationErrors, messages: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    let message = match error.code.as_ref() {
                        "range" => format!("Value out of range for field '{}'", path),
                        "length" => format!("Length validation failed for field '{}'", path),
                        "required" => format!("Field '{}' is required", path),
                        code => format!("Validation failed for field '{}': {}", path, code),
                    };
                    messages.push(message);
                }
            }
            ValidationErrorsKind::Struct(nested) => collect_messages(&path, nested, messages),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_messages(&format!("{}[{}]", path, index), nested, messages);
                }
            }
        }
    }
}

pub fn validate_confidence(field: &str, value: f64) -> LexbidResult<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(LexbidError::validation(
            field,
            format!("Confidence must be within 0.0..=1.0, got {}", value),
        ));
    }
    Ok(())
}

/// Check an upload before it is stored.
pub fn validate_upload(filename: &str, size: usize, max_size: usize) -> LexbidResult<FileKind> {
    if filename.trim().is_empty() {
        return Err(LexbidError::validation("filename", "File name is empty"));
    }
    if size == 0 {
        return Err(LexbidError::validation("file", "Uploaded file is empty"));
    }
    if size > max_size {
        return Err(LexbidError::validation(
            "file",
            format!("File is {} bytes, limit is {} bytes", size, max_size),
        ));
    }

    match FileKind::from_filename(filename) {
        FileKind::Unsupported => Err(LexbidError::validation(
            "filename",
            format!("Unsupported file type: {}", filename),
        )),
        kind => Ok(kind),
    }
}
