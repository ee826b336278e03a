//! File-backed key-value storage.
//!
//! All keys live in one JSON object file. Writes go to a temporary file in the
//! same directory which then replaces the original, so a crash never leaves a
//! half-written store behind.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs::{File, create_dir_all, remove_file, rename};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use pushsync_types::{kv_adapter::KvAdapter, prelude::*, utils::random_id};

type Values = BTreeMap<String, String>;

fn read_values(path: &Path) -> ClResult<Values> {
	let json = match std::fs::read_to_string(path) {
		Ok(json) => json,
		Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Values::new()),
		Err(e) => return Err(e.into()),
	};
	if json.trim().is_empty() {
		return Ok(Values::new());
	}
	Ok(serde_json::from_str(&json)?)
}

fn file_name(path: &Path) -> String {
	path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

fn tmp_file_path(path: &Path) -> PathBuf {
	path.with_file_name(format!(".{}.tmp-{}", file_name(path), random_id()))
}

fn corrupt_file_path(path: &Path) -> PathBuf {
	path.with_file_name(format!("{}.corrupt-{}", file_name(path), random_id()))
}

#[derive(Debug)]
pub struct KvAdapterFs {
	path: Box<Path>,
	/// Serializes read-modify-write cycles
	lock: Mutex<()>,
}

impl KvAdapterFs {
	/// Opens the store at `path`, creating its directory if needed
	///
	/// The file itself is created on the first write.
	pub fn new(path: impl Into<Box<Path>>) -> ClResult<Self> {
		let path: Box<Path> = path.into();
		if path.file_name().is_none() {
			return Err(Error::ValidationError(format!("not a file path: {}", path.display())));
		}
		if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
			create_dir_all(dir)?;
		}
		Ok(Self { path, lock: Mutex::new(()) })
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Renames an unreadable store so a rewrite does not destroy it
	fn move_aside(&self) -> ClResult<PathBuf> {
		let backup = corrupt_file_path(&self.path);
		rename(&self.path, &backup)?;
		Ok(backup)
	}

	fn write_values(&self, values: &Values) -> ClResult<()> {
		let tmp_path = tmp_file_path(&self.path);
		let json = serde_json::to_string_pretty(values)?;

		let res = (|| {
			let mut file = File::create(&tmp_path)?;
			file.write_all(json.as_bytes())?;
			file.sync_all()?;
			rename(&tmp_path, &self.path)?;
			Ok::<(), Error>(())
		})();
		if let Err(e) = res {
			warn!(path = %tmp_path.display(), error = %e, "Store write failed, removing tmpfile");
			let _ignore = remove_file(&tmp_path);
			return Err(e);
		}
		Ok(())
	}
}

impl KvAdapter for KvAdapterFs {
	fn get(&self, key: &str) -> ClResult<Option<String>> {
		let _lock = self.lock.lock();
		let mut values = read_values(&self.path)?;
		Ok(values.remove(key))
	}

	fn set(&self, key: &str, value: &str) -> ClResult<()> {
		let _lock = self.lock.lock();
		let mut values = match read_values(&self.path) {
			Ok(values) => values,
			Err(Error::Parse) => {
				let backup = self.move_aside()?;
				warn!(
					path = %self.path.display(),
					backup = %backup.display(),
					"Store unreadable, moved aside; values of other keys are lost"
				);
				Values::new()
			}
			Err(e) => return Err(e),
		};
		values.insert(key.to_string(), value.to_string());
		self.write_values(&values)?;
		debug!(path = %self.path.display(), key, "Value stored");
		Ok(())
	}
}


// vim: ts=4
