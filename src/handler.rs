use std::sync::Arc;

use log::{debug, info, warn};

use crate::session::Session;
use crate::youtube::MetadataLookup;
use crate::{extract_first_url, is_supported_host, resolve_video_id};

/// Turns channel messages into title announcements.
#[derive(Clone)]
pub struct MessageHandler {
    lookup: Arc<dyn MetadataLookup>,
}

impl MessageHandler {
    pub fn new(lookup: Arc<dyn MetadataLookup>) -> Self {
        Self { lookup }
    }

    /// Process one channel message and return the text to announce, if any.
    ///
    /// Charges the session's message budget once, whatever the outcome.
    /// Lookup failures are logged and swallowed here.
    pub async fn on_message(&self, session: &mut Session, text: &str) -> Option<String> {
        session.record_message();
        info!("Got message: {text}");

        let url = extract_first_url(text)?;
        info!("Found url: {url}");

        if !is_supported_host(url) {
            return None;
        }

        let video_id = resolve_video_id(url)?;
        debug!("Resolved video id {video_id}");

        match self.lookup.fetch_title(&video_id).await {
            Ok(Some(title)) => Some(title),
            Ok(None) => None,
            Err(e) => {
                warn!("Got error: {e}");
                None
            }
        }
    }
}
