use std::sync::{Mutex, MutexGuard};

/// Round-robin cursor over a caller-supplied API key list.
///
/// The key list itself is not owned: call sites may pass lists of different
/// lengths, so the cursor is always read modulo the current length. The lock
/// only covers the cursor arithmetic and is never held across an await.
#[derive(Debug, Default)]
pub struct KeyRotator {
    cursor: Mutex<usize>,
}

impl KeyRotator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        // A poisoned cursor is still a valid usize.
        self.cursor.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn current(&self, keys: &[String]) -> Option<String> {
        if keys.is_empty() {
            return None;
        }
        let cursor = self.lock();
        Some(keys[*cursor % keys.len()].clone())
    }

    pub fn advance(&self, keys: &[String]) {
        if keys.len() <= 1 {
            return;
        }
        let mut cursor = self.lock();
        *cursor = (*cursor + 1) % keys.len();
        log::info!("🔑 Rotated to next API key, index {}", *cursor);
    }

    pub fn cursor(&self) -> usize {
        *self.lock()
    }
}
