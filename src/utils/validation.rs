use crate::models::UploadKind;
use anyhow::{Result, anyhow};
use std::path::Path;

pub const PDF_MIME: &str = "application/pdf";

/// Media types accepted for donor media uploads
pub const MEDIA_MIMES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    PDF_MIME,
];

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validates file size against maximum limit
pub fn validate_file_size(size: usize, max_size: usize) -> Result<()> {
    if size == 0 {
        return Err(anyhow!(ValidationError {
            code: "EMPTY_FILE",
            message: "Uploaded file is empty".to_string(),
        }));
    }
    if size > max_size {
        return Err(anyhow!(ValidationError {
            code: "FILE_TOO_LARGE",
            message: format!(
                "File size {} bytes exceeds maximum allowed {} bytes",
                size, max_size
            ),
        }));
    }
    Ok(())
}

/// Reports must declare exactly `application/pdf`; media uses an allowlist.
pub fn validate_mime_type(content_type: &str, kind: UploadKind) -> Result<()> {
    let allowed = match kind {
        UploadKind::Report => content_type == PDF_MIME,
        UploadKind::Media => {
            let normalized = content_type
                .split(';')
                .next()
                .unwrap_or("")
                .trim()
                .to_lowercase();
            MEDIA_MIMES.contains(&normalized.as_str())
        }
    };

    if allowed {
        return Ok(());
    }

    let message = match kind {
        UploadKind::Report => format!(
            "Only PDF files are allowed for reports, got '{}'",
            content_type
        ),
        UploadKind::Media => format!("MIME type '{}' is not allowed", content_type),
    };
    Err(anyhow!(ValidationError {
        code: "INVALID_MIME_TYPE",
        message,
    }))
}

/// Reduces a client-supplied filename to a safe base name
pub fn sanitize_filename(filename: &str) -> Result<String> {
    // Client paths may use either separator
    let name = filename.rsplit(['/', '\\']).next().unwrap_or("").trim();

    if name.is_empty() || name == "." || name == ".." {
        return Err(anyhow!(ValidationError {
            code: "INVALID_FILENAME",
            message: "Filename cannot be empty".to_string(),
        }));
    }

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path components stripped from filename: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control()
                || c == ':'
                || c == '*'
                || c == '?'
                || c == '"'
                || c == '<'
                || c == '>'
                || c == '|'
                || c == ';'
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    // Limit length safely for UTF-8
    let sanitized = if sanitized.len() > 255 {
        let mut end = 255;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized[..end].to_string()
    } else {
        sanitized
    };

    if sanitized.starts_with('.') {
        return Err(anyhow!(ValidationError {
            code: "HIDDEN_FILE",
            message: "Hidden files (starting with '.') are not allowed".to_string(),
        }));
    }

    Ok(sanitized)
}

/// Resolves the optional folder hint to a clean relative folder, or the default.
pub fn normalize_folder(folder: Option<&str>, default: &str) -> Result<String> {
    let raw = folder.map(str::trim).unwrap_or("").trim_matches('/');
    if raw.is_empty() {
        return Ok(default.to_string());
    }

    for segment in raw.split('/') {
        let invalid = segment.is_empty()
            || segment == "."
            || segment == ".."
            || segment
                .chars()
                .any(|c| c.is_control() || matches!(c, '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'));
        if invalid {
            return Err(anyhow!(ValidationError {
                code: "INVALID_FOLDER",
                message: format!("Folder '{}' is not a valid relative folder", raw),
            }));
        }
    }

    Ok(raw.to_string())
}

/// Textual traversal guard for retrieval paths. Runs before any filesystem access.
pub fn validate_relative_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(anyhow!(ValidationError {
            code: "INVALID_PATH",
            message: "Path cannot be empty".to_string(),
        }));
    }

    let absolute = path.starts_with('/')
        || path.starts_with('\\')
        || Path::new(path).is_absolute()
        || path.chars().nth(1) == Some(':');
    if absolute {
        return Err(anyhow!(ValidationError {
            code: "ABSOLUTE_PATH",
            message: "Absolute paths are not allowed".to_string(),
        }));
    }

    if path.split(['/', '\\']).any(|segment| segment == "..") {
        tracing::warn!("Path traversal attempt detected: {}", path);
        return Err(anyhow!(ValidationError {
            code: "PATH_TRAVERSAL",
            message: "Parent directory segments are not allowed".to_string(),
        }));
    }

    Ok(())
}
