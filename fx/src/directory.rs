//! Currency directory built once from the feed's metadata document.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use ratediff_common::{CurrencyCode, CurrencyEntry};
use tracing::{debug, info};

use crate::error::{FxError, FxResult};

const ITEM_TAG: &[u8] = b"Item";
const NAME_FIELD: &str = "Name";
const SYMBOL_FIELD: &str = "ISO_Char_Code";
const PARENT_CODE_FIELD: &str = "ParentCode";

/// Immutable lookup from currency symbol to directory entry.
///
/// Iterates in ascending symbol order.
#[derive(Debug, Clone, Default)]
pub struct CurrencyDirectory {
    entries: BTreeMap<CurrencyCode, CurrencyEntry>,
}

impl CurrencyDirectory {
    /// Build a directory from already validated entries. Later duplicates
    /// replace earlier ones.
    pub fn from_entries(entries: impl IntoIterator<Item = CurrencyEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (entry.symbol.clone(), entry))
                .collect(),
        }
    }

    /// Load the metadata document from disk.
    pub fn from_file(path: impl AsRef<Path>) -> FxResult<Self> {
        let path = path.as_ref();
        let document = std::fs::read(path)
            .map_err(|e| FxError::DirectoryLoad(format!("{}: {}", path.display(), e)))?;
        Self::from_xml(&document)
    }

    /// Parse the metadata document.
    ///
    /// Items missing a name, symbol or identifier are skipped; a document that
    /// is not well-formed XML fails the whole load.
    pub fn from_xml(document: &[u8]) -> FxResult<Self> {
        let mut reader = Reader::from_reader(document);
        reader.trim_text(true);

        let mut buf = Vec::new();
        let mut entries = BTreeMap::new();
        let mut skipped = 0usize;
        let mut item: Option<RawItem> = None;
        let mut field: Option<String> = None;
        let mut depth = 0usize;

        loop {
            let event = reader.read_event_into(&mut buf);
            match &event {
                Ok(Event::Start(_)) => depth += 1,
                Ok(Event::End(_)) => depth = depth.saturating_sub(1),
                _ => {}
            }
            match event {
                Ok(Event::Start(e)) if e.local_name().as_ref() == ITEM_TAG => {
                    item = Some(RawItem::new(id_attribute(&reader, &e)?));
                }
                Ok(Event::Start(e)) if item.is_some() => {
                    field = Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                }
                Ok(Event::Empty(e)) if e.local_name().as_ref() == ITEM_TAG => {
                    skipped += 1;
                    debug!("Skipping empty currency item");
                }
                Ok(Event::Text(t)) => {
                    if let (Some(item), Some(field)) = (item.as_mut(), field.as_ref()) {
                        let text = t.unescape().map_err(|e| {
                            FxError::DirectoryLoad(format!(
                                "bad text at position {}: {}",
                                reader.buffer_position(),
                                e
                            ))
                        })?;
                        item.fields.insert(field.clone(), text.into_owned());
                    }
                }
                Ok(Event::End(e)) if e.local_name().as_ref() == ITEM_TAG => {
                    field = None;
                    if let Some(raw) = item.take() {
                        match raw.validate() {
                            Ok(entry) => {
                                entries.insert(entry.symbol.clone(), entry);
                            }
                            Err(missing) => {
                                skipped += 1;
                                debug!(id = ?raw.id, missing, "Skipping incomplete currency item");
                            }
                        }
                    }
                }
                Ok(Event::End(_)) => field = None,
                Ok(Event::Eof) if depth > 0 => {
                    return Err(FxError::DirectoryLoad(format!(
                        "document truncated with {} unclosed element(s)",
                        depth
                    )))
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(FxError::DirectoryLoad(format!(
                        "malformed document at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {}
            }
            buf.clear();
        }

        info!(currencies = entries.len(), skipped, "Currency directory loaded");

        Ok(Self { entries })
    }

    /// Look up a currency by symbol.
    pub fn lookup(&self, symbol: &CurrencyCode) -> Option<&CurrencyEntry> {
        self.entries.get(symbol)
    }

    /// All `(symbol, display name)` pairs in iteration order.
    pub fn list(&self) -> Vec<(String, String)> {
        self.entries
            .values()
            .map(|entry| (entry.symbol.code().to_string(), entry.display_name.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fields collected for one `Item` element before validation.
#[derive(Debug)]
struct RawItem {
    id: Option<String>,
    fields: HashMap<String, String>,
}

impl RawItem {
    fn new(id: Option<String>) -> Self {
        Self {
            id,
            fields: HashMap::new(),
        }
    }

    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Turn the item into an entry, or name the first required field it lacks.
    fn validate(&self) -> Result<CurrencyEntry, &'static str> {
        let symbol = self.field(SYMBOL_FIELD).ok_or(SYMBOL_FIELD)?;
        let name = self.field(NAME_FIELD).ok_or(NAME_FIELD)?;
        let upstream_id = self
            .field(PARENT_CODE_FIELD)
            .or_else(|| self.id.as_deref().map(str::trim).filter(|id| !id.is_empty()))
            .ok_or(PARENT_CODE_FIELD)?;

        Ok(CurrencyEntry::new(symbol, name, upstream_id))
    }
}

fn id_attribute(reader: &Reader<&[u8]>, element: &BytesStart<'_>) -> FxResult<Option<String>> {
    let attribute = element
        .try_get_attribute("ID")
        .map_err(|e| FxError::DirectoryLoad(format!("bad item attribute: {}", e)))?;

    attribute
        .map(|attr| {
            attr.decode_and_unescape_value(reader)
                .map(|value| value.into_owned())
                .map_err(|e| FxError::DirectoryLoad(format!("bad item attribute: {}", e)))
        })
        .transpose()
}
