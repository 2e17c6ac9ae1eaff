//! Save-on-flush mode for an open editor.

use super::document::Document;
use crate::error::SyncResult;

const LOG_TARGET: &str = "tandem::client";

/// Persists a document's current contents.
pub trait DocumentSaver: Send {
    fn save(&mut self, document: &Document) -> SyncResult<()>;
}

/// Saves a dirty document whenever its pending changes are flushed.
///
/// The editor preference wins over explicit activation: `Some(false)`
/// forbids activation, `Some(true)` activates on preference change, and
/// `None` leaves the current state alone.
pub struct AutoSaveMode {
    activated: bool,
    preference: Option<bool>,
    saver: Option<Box<dyn DocumentSaver>>,
}

impl AutoSaveMode {
    pub fn new(preference: Option<bool>) -> Self {
        let mut mode = Self {
            activated: false,
            preference: None,
            saver: None,
        };
        mode.set_preference(preference);
        mode
    }

    pub fn with_saver(mut self, saver: Box<dyn DocumentSaver>) -> Self {
        self.saver = Some(saver);
        self
    }

    /// Turn on auto save unless the preference forbids it.
    pub fn activate(&mut self) -> bool {
        if self.preference == Some(false) {
            log::debug!(target: LOG_TARGET, "Auto save disabled by preference");
            return false;
        }
        self.activated = true;
        true
    }

    pub fn deactivate(&mut self) {
        self.activated = false;
    }

    pub fn is_activated(&self) -> bool {
        self.activated
    }

    /// Apply a changed editor preference.
    pub fn set_preference(&mut self, preference: Option<bool>) {
        self.preference = preference;
        match preference {
            Some(false) if self.activated => self.deactivate(),
            Some(true) if !self.activated => {
                self.activate();
            }
            _ => {}
        }
    }

    /// Save `document` if activated and dirty. Returns whether a save ran.
    pub fn on_flush(&mut self, document: &mut Document) -> SyncResult<bool> {
        if !self.activated || !document.is_dirty() {
            return Ok(false);
        }
        let Some(saver) = self.saver.as_mut() else {
            return Ok(false);
        };
        saver.save(document)?;
        document.mark_saved();
        log::debug!(target: LOG_TARGET, "Auto saved {}", document.location());
        Ok(true)
    }
}

impl Default for AutoSaveMode {
    fn default() -> Self {
        Self::new(None)
    }
}
