use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::Path;

use crate::models::{CoreError, CoreErrorKind};
use crate::store::StoreResult;

/// Exclusive advisory lock over the whole load-mutate-save cycle. Acquisition
/// blocks until the holder releases; the lock is dropped with the value.
pub struct FileLock {
    file: File,
}

impl FileLock {
    pub fn acquire_exclusive(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|error| {
                storage_failure(format!(
                    "failed to create lock directory '{}': {error}",
                    parent.display()
                ))
            })?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|error| {
                storage_failure(format!(
                    "failed to open lock file '{}': {error}",
                    path.display()
                ))
            })?;

        loop {
            let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
            if result == 0 {
                break;
            }

            let os_error = std::io::Error::last_os_error();
            if os_error.raw_os_error() == Some(libc::EINTR) {
                continue;
            }

            return Err(storage_failure(format!(
                "failed to lock '{}': {os_error}",
                path.display()
            )));
        }

        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
    }
}

fn storage_failure(message: String) -> CoreError {
    CoreError {
        component: None,
        operation: None,
        task: None,
        kind: CoreErrorKind::StorageFailure,
        message,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::FileLock;

    #[test]
    fn serializes_two_threads_on_the_same_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.lock");
        let events: Arc<Mutex<Vec<(usize, &'static str)>>> = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..2)
            .map(|thread| {
                let path = path.clone();
                let events = events.clone();
                std::thread::spawn(move || {
                    let _lock = FileLock::acquire_exclusive(&path).unwrap();
                    events.lock().unwrap().push((thread, "enter"));
                    std::thread::sleep(Duration::from_millis(30));
                    events.lock().unwrap().push((thread, "exit"));
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 4);
        // Whoever entered first must exit before the other enters.
        assert_eq!(events[0].0, events[1].0);
        assert_eq!(events[2].0, events[3].0);
        assert_ne!(events[0].0, events[2].0);
    }
}
