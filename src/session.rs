use crate::document::{self, Document};
use crate::model::{ModelEvent, TreeModel};
use crate::statics;
use crate::value::Map;
use anyhow::Context;
use flate2::{Compression, GzBuilder, read::GzDecoder};
use std::{
    cell::Cell,
    fs,
    io::{Read, Write},
    path::{Path, PathBuf},
    rc::Rc,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileFormat {
    #[default]
    Json,
    GzipJson,
}

impl FileFormat {
    /// Format implied by a target path: `.gz` means gzip, anything else plain JSON.
    pub fn for_path(path: &Path) -> Self {
        if path.extension().and_then(|e| e.to_str()) == Some(statics::EXT_GZIP) {
            FileFormat::GzipJson
        } else {
            FileFormat::Json
        }
    }
}

/// An open document: the model being edited plus what is needed to write it
/// back (where it came from, how it was encoded, top-level keys the model does
/// not own).
///
/// Any change notified by the model marks the session dirty.
#[derive(Debug)]
pub struct Session {
    pub source_path: Option<PathBuf>,
    pub format: FileFormat,
    pub extra: Map,
    model: TreeModel,
    dirty: Rc<Cell<bool>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_model(TreeModel::new())
    }

    pub fn with_model(mut model: TreeModel) -> Self {
        let dirty = Rc::new(Cell::new(false));
        let flag = Rc::clone(&dirty);
        model.subscribe(move |_: &TreeModel, _: &ModelEvent| flag.set(true));
        Self {
            source_path: None,
            format: FileFormat::default(),
            extra: Map::new(),
            model,
            dirty,
        }
    }

    pub fn load_path(path: &Path) -> anyhow::Result<Self> {
        let mut session = Self::new();
        session.open(path)?;
        Ok(session)
    }

    /// Replace the current contents with the document at `path`.
    ///
    /// The file is read and validated completely before anything is replaced,
    /// so on error the session is left exactly as it was.
    pub fn open(&mut self, path: &Path) -> anyhow::Result<()> {
        let bytes = fs::read(path).with_context(|| format!("reading {path:?}"))?;
        let format = detect_format(path, &bytes);
        let text_bytes = match format {
            FileFormat::Json => bytes,
            FileFormat::GzipJson => {
                let mut decoder = GzDecoder::new(&bytes[..]);
                let mut out = Vec::new();
                decoder.read_to_end(&mut out).context("gzip decompress")?;
                out
            }
        };

        let text = std::str::from_utf8(&text_bytes).context("document is not valid UTF-8")?;
        let mut doc = Document::parse(text).with_context(|| format!("parsing {path:?}"))?;

        self.extra = std::mem::take(&mut doc.extra);
        document::load(doc, &mut self.model);
        self.source_path = Some(path.to_path_buf());
        self.format = format;
        self.dirty.set(false);
        tracing::info!(
            path = %path.display(),
            ?format,
            columns = self.model.column_count(),
            items = self.model.items().len(),
            "opened document"
        );
        Ok(())
    }

    pub fn model(&self) -> &TreeModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut TreeModel {
        &mut self.model
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    pub fn mark_dirty(&mut self) {
        self.dirty.set(true);
    }

    /// Current contents as a document, including preserved top-level keys.
    pub fn document(&self) -> Document {
        let mut doc = document::save(&self.model);
        doc.extra = self.extra.clone();
        doc
    }

    pub fn to_bytes(&self, format: FileFormat) -> anyhow::Result<Vec<u8>> {
        let mut text = self.document().to_pretty_string();
        text.push_str(statics::NL);
        let text_bytes = text.as_bytes();

        match format {
            FileFormat::Json => Ok(text_bytes.to_vec()),
            FileFormat::GzipJson => {
                let mut encoder = GzBuilder::new()
                    .mtime(0)
                    .write(Vec::new(), Compression::default());
                encoder.write_all(text_bytes).context("gzip compress")?;
                let bytes = encoder.finish().context("gzip finish")?;
                Ok(bytes)
            }
        }
    }

    /// Write back to the path the document was opened from (or last saved to).
    pub fn save(&mut self) -> anyhow::Result<()> {
        let path = self
            .source_path
            .clone()
            .context(statics::EN_ERR_NO_SOURCE_PATH)?;
        self.save_to_path(&path)
    }

    pub fn save_to_path(&mut self, path: &Path) -> anyhow::Result<()> {
        let format = FileFormat::for_path(path);
        let bytes = self.to_bytes(format)?;
        fs::write(path, &bytes).with_context(|| format!("writing {path:?}"))?;

        self.source_path = Some(path.to_path_buf());
        self.format = format;
        self.dirty.set(false);
        tracing::info!(path = %path.display(), ?format, bytes = bytes.len(), "saved document");
        Ok(())
    }
}

fn detect_format(path: &Path, bytes: &[u8]) -> FileFormat {
    if FileFormat::for_path(path) == FileFormat::GzipJson {
        return FileFormat::GzipJson;
    }
    if bytes.starts_with(&statics::GZIP_MAGIC) {
        return FileFormat::GzipJson;
    }
    FileFormat::Json
}
