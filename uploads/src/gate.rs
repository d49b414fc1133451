use composer_uploads_client::UploadFile;

use crate::config::UploadPolicy;
use crate::markdown::MediaKind;
use crate::markdown::human_size;

/// Who is uploading and where.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GateOptions {
    pub for_private_message: bool,
    pub user_is_staff: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejection {
    pub file: String,
    pub reason: String,
}

#[derive(Clone, Debug, Default)]
pub struct GateDecision {
    pub admitted: Vec<UploadFile>,
    pub rejected: Vec<Rejection>,
    /// Single message summarizing the rejections, if any.
    pub user_message: Option<String>,
}

/// Decides which chosen files may become upload tasks.
pub trait UploadGate: Send {
    fn validate(
        &self,
        files: Vec<UploadFile>,
        policy: &UploadPolicy,
        options: &GateOptions,
    ) -> GateDecision;
}

/// Checks extension, size and attachment permission against the site policy.
#[derive(Clone, Copy, Debug, Default)]
pub struct PolicyGate;

impl PolicyGate {
    fn check(file: &UploadFile, policy: &UploadPolicy, options: &GateOptions) -> Result<(), String> {
        if file.size == 0 {
            return Err("Sorry, the file you are trying to upload is empty.".to_string());
        }

        let staff_pm_override = options.user_is_staff
            && options.for_private_message
            && policy.allow_staff_to_upload_any_file_in_pm;
        let ext = file.extension();
        let kind = match (&ext, file.mime_type.starts_with("image/")) {
            (Some(ext), _) => MediaKind::from_extension(ext),
            (None, true) => MediaKind::Image,
            (None, false) => MediaKind::Attachment,
        };

        if !staff_pm_override {
            let authorized = ext
                .as_deref()
                .is_some_and(|ext| policy.authorizes_extension(ext));
            if !authorized {
                return Err(format!(
                    "Sorry, the file you are trying to upload is not authorized (authorized extensions: {}).",
                    policy.extensions_label()
                ));
            }
            if kind != MediaKind::Image && !policy.allow_attachments {
                return Err("Sorry, you are not allowed to upload attachments.".to_string());
            }
        }

        let max_kb = if kind == MediaKind::Image {
            policy.max_image_size_kb
        } else {
            policy.max_attachment_size_kb
        };
        let max_bytes = max_kb.saturating_mul(1024);
        if max_bytes > 0 && file.size > max_bytes {
            return Err(format!(
                "Sorry, the file you are trying to upload is too big (maximum size is {}).",
                human_size(max_bytes)
            ));
        }
        Ok(())
    }
}

impl UploadGate for PolicyGate {
    fn validate(
        &self,
        files: Vec<UploadFile>,
        policy: &UploadPolicy,
        options: &GateOptions,
    ) -> GateDecision {
        let mut decision = GateDecision::default();
        for file in files {
            match Self::check(&file, policy, options) {
                Ok(()) => decision.admitted.push(file),
                Err(reason) => decision.rejected.push(Rejection {
                    file: file.name.clone(),
                    reason,
                }),
            }
        }
        decision.user_message = decision.rejected.first().map(|r| r.reason.clone());
        decision
    }
}
