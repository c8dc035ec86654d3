//! Where theme CSS ends up
//!
//! In a live host this is a `<style>` element in the document head. The
//! runtime only needs to insert and remove one element by id.

use std::sync::Mutex;

use super::ThemeError;

pub trait StyleSink: Send + Sync {
    /// Insert a style element with `id` holding `css`
    fn insert(&self, id: &str, css: &str) -> Result<(), ThemeError>;

    /// Remove the element with `id`, returning whether one existed
    fn remove(&self, id: &str) -> bool;
}

/// A style sink that records elements in memory
#[derive(Debug, Default)]
pub struct MemoryStyleSink {
    elements: Mutex<Vec<(String, String)>>,
}

impl MemoryStyleSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of elements carrying `id`
    pub fn count(&self, id: &str) -> usize {
        self.lock().iter().filter(|(element, _)| element == id).count()
    }

    pub fn css(&self, id: &str) -> Option<String> {
        self.lock()
            .iter()
            .find(|(element, _)| element == id)
            .map(|(_, css)| css.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(String, String)>> {
        self.elements.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl StyleSink for MemoryStyleSink {
    fn insert(&self, id: &str, css: &str) -> Result<(), ThemeError> {
        self.lock().push((id.to_string(), css.to_string()));
        Ok(())
    }

    fn remove(&self, id: &str) -> bool {
        let mut elements = self.lock();
        match elements.iter().position(|(element, _)| element == id) {
            Some(index) => {
                elements.remove(index);
                true
            }
            None => false,
        }
    }
}
