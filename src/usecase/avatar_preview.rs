use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::domain::models::registration::Avatar;

/// Inline `data:` URI the view can show before anything is uploaded
pub fn render_preview(avatar: &Avatar) -> String {
    format!(
        "data:{};base64,{}",
        avatar.content_type(),
        STANDARD.encode(avatar.bytes())
    )
}
