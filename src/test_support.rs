use crate::install::github::ReleaseSource;
use anyhow::{anyhow, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

/// `(path, contents, mode)` entries packed into a gzipped tarball.
pub fn build_tar_gz(entries: &[(&str, &str, u32)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, contents, mode) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(contents.len() as u64);
        header.set_mode(*mode);
        builder
            .append_data(&mut header, path, contents.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

pub fn build_zip(entries: &[(&str, &str, u32)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (path, contents, mode) in entries {
        let options = zip::write::FileOptions::default().unix_permissions(*mode);
        writer.start_file(*path, options).unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// In-memory release source: a canned tag lookup and archives keyed by URL.
#[derive(Default)]
pub struct FakeSource {
    tag: Option<String>,
    tag_error: Option<String>,
    archives: HashMap<String, Vec<u8>>,
    requested: RefCell<Vec<String>>,
    lookups: Cell<usize>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tag = Some(tag.to_string());
        self
    }

    pub fn with_tag_error(mut self, message: &str) -> Self {
        self.tag_error = Some(message.to_string());
        self
    }

    pub fn with_archive(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.archives.insert(url.to_string(), bytes);
        self
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requested.borrow().clone()
    }

    pub fn tag_lookups(&self) -> usize {
        self.lookups.get()
    }
}

impl ReleaseSource for FakeSource {
    async fn latest_tag(&self, _repo: &str) -> Result<Option<String>> {
        self.lookups.set(self.lookups.get() + 1);
        match &self.tag_error {
            Some(message) => Err(anyhow!(message.clone())),
            None => Ok(self.tag.clone()),
        }
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        self.requested.borrow_mut().push(url.to_string());
        let bytes = self
            .archives
            .get(url)
            .ok_or_else(|| anyhow!("Server responded with 404 Not Found"))?;
        fs::write(dest, bytes)?;
        Ok(bytes.len() as u64)
    }
}
