//! Archive codec for portable inventory backups.
//!
//! An archive is a ZIP container with a fixed layout:
//!
//! ```text
//! data.json            manifest: version, created_at, items[]
//! images/<filename>    one flat entry per packed image
//! ```
//!
//! Every entry is deflate-compressed. The codec knows nothing about the
//! database or HTTP layer: encoding takes records plus an [`AssetResolver`]
//! for image bytes, decoding yields manifest items plus lazy image lookup.
//!
//! # Format compatibility
//!
//! Only format version `"1.0"` is accepted. Timestamps are written as
//! RFC 3339 UTC; the decoder also accepts naive ISO-8601 timestamps (read as
//! UTC), and a `null` or absent `custom_fields` decodes to an empty map.

use anyhow::Context;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, Write};
use std::path::Path;
use tracing::{debug, warn};
use uuid::Uuid;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::validation::validate_filename;
use crate::constants::{ARCHIVE_FORMAT_VERSION, IMAGES_DIR, MANIFEST_ENTRY};
use crate::error::{Error, Result};
use crate::inventory::{ImageAsset, InventoryRecord, ItemDetails};

// =============================================================================
// Manifest document
// =============================================================================

/// Top-level manifest document stored as `data.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Manifest {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub items: Vec<ManifestItem>,
}

/// One inventory record as it appears in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestItem {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub location: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model_number: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_ts::option")]
    pub purchase_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub purchase_price: Option<f64>,
    #[serde(default)]
    pub current_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient_ts::option")]
    pub warranty_expiration: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub custom_fields: serde_json::Map<String, serde_json::Value>,
    #[serde(deserialize_with = "lenient_ts::required")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "lenient_ts::required")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub images: Vec<ManifestImage>,
}

/// Image reference inlined in a manifest item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestImage {
    pub id: Uuid,
    pub filename: String,
    #[serde(deserialize_with = "lenient_ts::required")]
    pub created_at: DateTime<Utc>,
}

impl ManifestItem {
    fn from_record(record: &InventoryRecord, images: Vec<ManifestImage>) -> Self {
        let d = &record.details;
        Self {
            id: record.id,
            name: d.name.clone(),
            category: d.category.clone(),
            location: d.location.clone(),
            brand: d.brand.clone(),
            model_number: d.model_number.clone(),
            serial_number: d.serial_number.clone(),
            purchase_date: d.purchase_date,
            purchase_price: d.purchase_price,
            current_value: d.current_value,
            warranty_expiration: d.warranty_expiration,
            notes: d.notes.clone(),
            custom_fields: d.custom_fields.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
            images,
        }
    }

    /// Descriptive, monetary and temporal fields, copied verbatim.
    pub fn details(&self) -> ItemDetails {
        ItemDetails {
            name: self.name.clone(),
            category: self.category.clone(),
            location: self.location.clone(),
            brand: self.brand.clone(),
            model_number: self.model_number.clone(),
            serial_number: self.serial_number.clone(),
            purchase_date: self.purchase_date,
            purchase_price: self.purchase_price,
            current_value: self.current_value,
            warranty_expiration: self.warranty_expiration,
            notes: self.notes.clone(),
            custom_fields: self.custom_fields.clone(),
        }
    }
}

impl From<&ImageAsset> for ManifestImage {
    fn from(asset: &ImageAsset) -> Self {
        Self {
            id: asset.id,
            filename: asset.filename.clone(),
            created_at: asset.created_at,
        }
    }
}

/// A manifest item that could not be decoded.
///
/// The rest of the archive still decodes; restore reports these per item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedItem {
    /// Item name when present, otherwise its position in the manifest.
    pub label: String,
    pub reason: String,
}

fn null_as_empty<'de, D>(
    deserializer: D,
) -> std::result::Result<serde_json::Map<String, serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

/// Timestamp parsing that accepts RFC 3339 as well as naive ISO-8601.
mod lenient_ts {
    use super::*;

    pub(super) fn parse(s: &str) -> std::result::Result<DateTime<Utc>, String> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
            return Ok(ts.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
            return Ok(naive.and_utc());
        }
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(date.and_time(NaiveTime::MIN).and_utc());
        }
        Err(format!("invalid timestamp '{s}'"))
    }

    pub(super) fn required<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub(super) fn option<'de, D>(
        deserializer: D,
    ) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) if !raw.is_empty() => parse(&raw).map(Some).map_err(serde::de::Error::custom),
            _ => Ok(None),
        }
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Supplies image bytes to the encoder.
///
/// Returning `None` means "file missing": the image is skipped, not counted,
/// and left out of the manifest.
pub trait AssetResolver {
    fn open(&self, asset: &ImageAsset) -> Option<Box<dyn Read + '_>>;
}

/// Resolves assets from their recorded filesystem path.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsAssetResolver;

impl AssetResolver for FsAssetResolver {
    fn open(&self, asset: &ImageAsset) -> Option<Box<dyn Read + '_>> {
        if !asset.file_path.is_file() {
            warn!(
                image_id = %asset.id,
                path = %asset.file_path.display(),
                "Image asset has no backing file"
            );
            return None;
        }

        match File::open(&asset.file_path) {
            Ok(file) => Some(Box::new(BufReader::new(file)) as Box<dyn Read>),
            Err(e) => {
                warn!(
                    image_id = %asset.id,
                    path = %asset.file_path.display(),
                    error = %e,
                    "Image asset is not readable"
                );
                None
            },
        }
    }
}

/// Counts reported by [`encode`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeSummary {
    pub item_count: u64,
    /// Images listed in the manifest (packed ones only).
    pub image_count: u64,
    pub skipped_images: u64,
}

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Writes `records` and their resolvable images as an archive into `writer`.
///
/// Images are written before the manifest so the manifest lists exactly the
/// images that were packed. An image filename already packed is referenced
/// again but not written twice, provided the asset's own file resolves.
///
/// # Errors
///
/// Returns an error if writing to `writer` fails or an image stream fails
/// partway through.
pub fn encode<W: Write + Seek>(
    writer: W,
    records: &[InventoryRecord],
    resolver: &dyn AssetResolver,
) -> anyhow::Result<EncodeSummary> {
    let mut zip = ZipWriter::new(writer);
    let options = entry_options();
    let mut packed: HashSet<&str> = HashSet::new();
    let mut summary = EncodeSummary::default();
    let mut items = Vec::with_capacity(records.len());

    for record in records {
        let mut images = Vec::with_capacity(record.images.len());

        for asset in &record.images {
            if packed.contains(asset.filename.as_str()) {
                // The packed entry is reused only if this asset's own file exists.
                if resolver.open(asset).is_some() {
                    images.push(ManifestImage::from(asset));
                } else {
                    summary.skipped_images += 1;
                }
                continue;
            }

            if let Err(e) = validate_filename(&asset.filename) {
                warn!(image_id = %asset.id, error = %e, "Skipping image with unsafe filename");
                summary.skipped_images += 1;
                continue;
            }

            let Some(mut reader) = resolver.open(asset) else {
                summary.skipped_images += 1;
                continue;
            };

            zip.start_file(format!("{IMAGES_DIR}/{}", asset.filename), options)
                .with_context(|| format!("Failed to start archive entry for {}", asset.filename))?;
            let bytes = io::copy(&mut reader, &mut zip)
                .with_context(|| format!("Failed to pack image {}", asset.filename))?;
            debug!(filename = %asset.filename, bytes, "Packed image");

            packed.insert(asset.filename.as_str());
            images.push(ManifestImage::from(asset));
        }

        summary.image_count += images.len() as u64;
        items.push(ManifestItem::from_record(record, images));
    }
    summary.item_count = items.len() as u64;

    let manifest = Manifest {
        version: ARCHIVE_FORMAT_VERSION.to_string(),
        created_at: Utc::now(),
        items,
    };

    zip.start_file(MANIFEST_ENTRY, options)
        .context("Failed to start manifest entry")?;
    serde_json::to_writer_pretty(&mut zip, &manifest).context("Failed to write manifest")?;
    zip.finish().context("Failed to finalize archive")?;

    Ok(summary)
}

// =============================================================================
// Decoding
// =============================================================================

#[derive(Deserialize)]
struct RawManifest {
    version: String,
    #[serde(default, deserialize_with = "lenient_ts::option")]
    created_at: Option<DateTime<Utc>>,
    items: Vec<serde_json::Value>,
}

/// A decoded archive: manifest items plus lazy access to image entries.
pub struct ArchiveReader<R> {
    zip: ZipArchive<R>,
    created_at: Option<DateTime<Utc>>,
    items: Vec<std::result::Result<ManifestItem, MalformedItem>>,
}

impl ArchiveReader<BufReader<File>> {
    /// Opens and decodes the archive at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be opened and
    /// [`Error::MalformedArchive`] if it does not decode.
    pub fn open_path(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::io(format!("opening archive {}", path.display()), e))?;
        Self::open(BufReader::new(file))
    }
}

impl<R: Read + Seek> ArchiveReader<R> {
    /// Decodes the manifest of the archive in `reader`.
    ///
    /// Image entries are not read here; a manifest-referenced image missing
    /// from `images/` only shows up when it is requested.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedArchive`] if the container is unreadable, the
    /// manifest is absent or unparseable, or its version is unsupported.
    pub fn open(reader: R) -> Result<Self> {
        let mut zip = ZipArchive::new(reader)
            .map_err(|e| Error::malformed(format!("unreadable container: {e}")))?;

        let raw = {
            let entry = match zip.by_name(MANIFEST_ENTRY) {
                Ok(entry) => entry,
                Err(ZipError::FileNotFound) => {
                    return Err(Error::malformed(format!("missing {MANIFEST_ENTRY}")));
                },
                Err(e) => {
                    return Err(Error::malformed(format!("unreadable {MANIFEST_ENTRY}: {e}")));
                },
            };
            serde_json::from_reader::<_, RawManifest>(BufReader::new(entry))
                .map_err(|e| Error::malformed(format!("invalid {MANIFEST_ENTRY}: {e}")))?
        };

        if raw.version != ARCHIVE_FORMAT_VERSION {
            return Err(Error::malformed(format!(
                "unsupported format version '{}'",
                raw.version
            )));
        }

        let items = raw
            .items
            .into_iter()
            .enumerate()
            .map(|(index, value)| decode_item(index, value))
            .collect();

        Ok(Self {
            zip,
            created_at: raw.created_at,
            items,
        })
    }

    /// When the archive was created, if the manifest records it.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Manifest items in archive order; undecodable ones as [`MalformedItem`].
    pub fn items(&self) -> &[std::result::Result<ManifestItem, MalformedItem>] {
        &self.items
    }

    /// Takes the decoded items, leaving the image lookup usable.
    pub fn take_items(&mut self) -> Vec<std::result::Result<ManifestItem, MalformedItem>> {
        std::mem::take(&mut self.items)
    }

    /// Streams the image entry `filename` into `out`.
    ///
    /// Returns `Ok(None)` when the archive has no such entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an unsafe filename,
    /// [`Error::MalformedArchive`] for a corrupt entry, and [`Error::Io`] if
    /// writing to `out` fails.
    pub fn copy_image(&mut self, filename: &str, out: &mut dyn Write) -> Result<Option<u64>> {
        let filename =
            validate_filename(filename).map_err(|e| Error::Validation(format!("{e:#}")))?;

        let mut entry = match self.zip.by_name(&format!("{IMAGES_DIR}/{filename}")) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(Error::malformed(format!("unreadable image {filename}: {e}"))),
        };

        let written = io::copy(&mut entry, out)
            .map_err(|e| Error::io(format!("extracting image {filename}"), e))?;
        Ok(Some(written))
    }

    /// Reads the image entry `filename` into memory.
    ///
    /// # Errors
    ///
    /// Same as [`ArchiveReader::copy_image`].
    pub fn image_bytes(&mut self, filename: &str) -> Result<Option<Vec<u8>>> {
        let mut buf = Vec::new();
        Ok(self.copy_image(filename, &mut buf)?.map(|_| buf))
    }
}

fn decode_item(
    index: usize,
    value: serde_json::Value,
) -> std::result::Result<ManifestItem, MalformedItem> {
    let label = value
        .get("name")
        .and_then(serde_json::Value::as_str)
        .map_or_else(|| format!("#{}", index + 1), str::to_string);

    serde_json::from_value(value).map_err(|e| MalformedItem {
        label,
        reason: e.to_string(),
    })
}
