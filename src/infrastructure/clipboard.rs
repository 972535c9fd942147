use crate::domain::{ClientError, ClientResult};

/// Places `text` on the system clipboard.
pub fn copy_text(text: &str) -> ClientResult<()> {
    let mut clipboard = arboard::Clipboard::new().map_err(|e| ClientError::clipboard(e.to_string()))?;
    clipboard
        .set_text(text.to_owned())
        .map_err(|e| ClientError::clipboard(e.to_string()))
}
