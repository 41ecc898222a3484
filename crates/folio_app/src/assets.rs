//! Background loading of the character asset.
//!
//! The file is read and validated on a worker thread; the frame loop polls
//! the result with `try_recv` and never blocks on it.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use folio_core::animation::{load_character_file, CharacterAsset};

#[derive(Debug, Clone)]
pub enum AssetSlot {
    Pending,
    Ready(Rc<CharacterAsset>),
    Failed(String),
}

/// Shared between the loader and every scene that shows the character.
pub type SharedAsset = Rc<RefCell<AssetSlot>>;

pub struct CharacterLoader {
    path: PathBuf,
    rx: Option<Receiver<Result<CharacterAsset, String>>>,
    slot: SharedAsset,
}

impl CharacterLoader {
    pub fn spawn(path: PathBuf) -> Self {
        let slot = Rc::new(RefCell::new(AssetSlot::Pending));
        let (tx, rx) = mpsc::channel();
        let worker_path = path.clone();
        let spawned = thread::Builder::new()
            .name("character-loader".to_string())
            .spawn(move || {
                // The receiver may be gone if the app exited first.
                let _ = tx.send(load_character_file(&worker_path));
            });

        let rx = match spawned {
            Ok(_) => {
                log::info!("Loading character from {}", path.display());
                Some(rx)
            }
            Err(e) => {
                let message = format!("Failed to start character loader: {e}");
                log::error!("{message}");
                *slot.borrow_mut() = AssetSlot::Failed(message);
                None
            }
        };

        Self { path, rx, slot }
    }

    /// A loader that already finished, for scenes built without a thread.
    #[cfg(test)]
    pub fn with_result(path: PathBuf, result: Result<CharacterAsset, String>) -> Self {
        let slot = match result {
            Ok(asset) => AssetSlot::Ready(Rc::new(asset)),
            Err(e) => AssetSlot::Failed(e),
        };
        Self {
            path,
            rx: None,
            slot: Rc::new(RefCell::new(slot)),
        }
    }

    pub fn shared(&self) -> SharedAsset {
        self.slot.clone()
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.slot.borrow(), AssetSlot::Pending)
    }

    /// Returns true when the slot changed this call.
    pub fn poll(&mut self) -> bool {
        let Some(rx) = &self.rx else {
            return false;
        };
        let next = match rx.try_recv() {
            Ok(Ok(asset)) => {
                log::info!(
                    "Character '{}' loaded with {} clip(s)",
                    asset.character_id,
                    asset.clips.len()
                );
                AssetSlot::Ready(Rc::new(asset))
            }
            Ok(Err(e)) => {
                log::error!("{e}");
                AssetSlot::Failed(e)
            }
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Disconnected) => {
                let message = format!(
                    "Character loader for {} exited without a result",
                    self.path.display()
                );
                log::error!("{message}");
                AssetSlot::Failed(message)
            }
        };
        self.rx = None;
        *self.slot.borrow_mut() = next;
        true
    }
}
