//! Record types and per-mode mapping
//!
//! A [`RawRecord`] is one decoded row keyed by canonical header. The job's
//! [`ImportMode`] selects a mapper once; each row is then turned into a
//! [`NormalizedRecord`] whose variant matches the endpoint it will be sent to.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::normalize::{normalize_image_url, normalize_phone, normalize_postal_code, normalize_state};

/// Category reference applied to every record of a job
pub type CategoryId = i64;

const NAME_KEYS: &[&str] = &["name"];
const PROVIDER_NAME_KEYS: &[&str] = &["name", "provider name"];
const LICENSE_KEYS: &[&str] = &["license", "licence"];
const STREET_KEYS: &[&str] = &["street address", "address"];

/// Header aliases checked for the image URL, highest priority first.
///
/// Decoded rows already carry `image url` after header canonicalization; the
/// other entries serve records assembled directly with [`RawRecord::insert`].
pub const IMAGE_URL_KEYS: &[&str] = &[
    "image url",
    "image",
    "logo",
    "logo url",
    "image link",
    "photo url",
    "photo",
    "picture",
    "picture url",
];

/// One decoded row, keyed by canonical header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    fields: HashMap<String, String>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zip a canonical header row with one row of cells.
    ///
    /// Missing trailing cells are left absent, extra cells are dropped.
    pub fn from_row<I, S>(headers: &[String], cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields = headers
            .iter()
            .zip(cells)
            .filter(|(header, _)| !header.is_empty())
            .map(|(header, cell)| (header.clone(), cell.into()))
            .collect();
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.fields.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.fields.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// First trimmed, non-empty value among `keys`, or an empty string
    pub fn first_non_empty(&self, keys: &[&str]) -> String {
        keys.iter()
            .filter_map(|key| self.get(key))
            .map(str::trim)
            .find(|value| !value.is_empty())
            .unwrap_or_default()
            .to_string()
    }

    /// Trimmed value of a single key, or an empty string
    fn field(&self, key: &str) -> String {
        self.first_non_empty(&[key])
    }
}

impl<K, V> FromIterator<(K, V)> for RawRecord
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Kind of record a job imports; fixed for the lifetime of the job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Business listings (law firms and similar)
    Business,
    /// Individual medical providers
    Provider,
}

impl ImportMode {
    /// Resource path segment of the bulk-create endpoint
    pub fn resource(&self) -> &'static str {
        match self {
            Self::Business => "businesses",
            Self::Provider => "doctors",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Business => "business",
            Self::Provider => "provider",
        }
    }
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "business" | "businesses" | "lawyer" | "lawyers" => Ok(Self::Business),
            "provider" | "providers" | "doctor" | "doctors" => Ok(Self::Provider),
            other => Err(format!(
                "Invalid import mode: '{}'. Valid options: business, provider",
                other
            )),
        }
    }
}

/// Bulk-create payload for a business listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BusinessRecord {
    pub name: String,
    pub license: String,
    pub street_address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub description: String,
    pub practice_areas: String,
    pub honors: String,
    pub work_experience: String,
    pub associations: String,
    pub education: String,
    pub speaking_engagements: String,
    pub publications: String,
    pub language: String,
    pub website: String,
    pub phone: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image_url: String,
    pub category_id: CategoryId,
    pub status: &'static str,
    pub is_premium: bool,
}

/// Bulk-create payload for a medical provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProviderRecord {
    pub provider_name: String,
    pub specialty: String,
    pub license: String,
    pub street_address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub description: String,
    pub language: String,
    pub honors: String,
    pub work_experience: String,
    pub associations: String,
    pub education: String,
    pub speaking_engagements: String,
    pub publications: String,
    pub website: String,
    pub phone: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image_url: String,
    pub category_id: CategoryId,
    pub status: &'static str,
    pub is_premium: bool,
}

const ACTIVE: &str = "active";

/// A mapped record ready for (or already through) normalization
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum NormalizedRecord {
    Business(BusinessRecord),
    Provider(ProviderRecord),
}

impl NormalizedRecord {
    /// The identifying field; records where this is empty are skipped
    pub fn identity(&self) -> &str {
        match self {
            Self::Business(record) => &record.name,
            Self::Provider(record) => &record.provider_name,
        }
    }

    pub fn mode(&self) -> ImportMode {
        match self {
            Self::Business(_) => ImportMode::Business,
            Self::Provider(_) => ImportMode::Provider,
        }
    }

    /// Projection shown in the preview sample, taken before normalization
    pub fn preview_row(&self) -> PreviewRow {
        let (name, street_address, city, state, image_url) = match self {
            Self::Business(r) => (&r.name, &r.street_address, &r.city, &r.state, &r.image_url),
            Self::Provider(r) => (
                &r.provider_name,
                &r.street_address,
                &r.city,
                &r.state,
                &r.image_url,
            ),
        };
        PreviewRow {
            name: name.clone(),
            street_address: street_address.clone(),
            city: city.clone(),
            state: state.clone(),
            image_url: image_url.clone(),
        }
    }

    /// Apply the field normalizers in place of the raw values
    pub fn normalize(self) -> Self {
        match self {
            Self::Business(mut r) => {
                r.state = normalize_state(&r.state);
                r.phone = normalize_phone(&r.phone);
                r.zip = normalize_postal_code(&r.zip);
                r.image_url = normalize_image_url(&r.image_url);
                Self::Business(r)
            }
            Self::Provider(mut r) => {
                r.state = normalize_state(&r.state);
                r.phone = normalize_phone(&r.phone);
                r.zip = normalize_postal_code(&r.zip);
                r.image_url = normalize_image_url(&r.image_url);
                Self::Provider(r)
            }
        }
    }
}

/// One row of the preview sample
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreviewRow {
    pub name: String,
    pub street_address: String,
    pub city: String,
    pub state: String,
    pub image_url: String,
}

fn map_business(raw: &RawRecord, category_id: CategoryId) -> NormalizedRecord {
    NormalizedRecord::Business(BusinessRecord {
        name: raw.first_non_empty(NAME_KEYS),
        license: raw.first_non_empty(LICENSE_KEYS),
        street_address: raw.first_non_empty(STREET_KEYS),
        city: raw.field("city"),
        state: raw.field("state"),
        zip: raw.field("zip"),
        description: raw.field("description"),
        practice_areas: raw.field("practice areas"),
        honors: raw.field("honors"),
        work_experience: raw.field("work experience"),
        associations: raw.field("associations"),
        education: raw.field("education"),
        speaking_engagements: raw.field("speaking engagements"),
        publications: raw.field("publications"),
        language: raw.field("language"),
        website: raw.field("website"),
        phone: raw.field("phone"),
        image_url: raw.first_non_empty(IMAGE_URL_KEYS),
        category_id,
        status: ACTIVE,
        is_premium: false,
    })
}

fn map_provider(raw: &RawRecord, category_id: CategoryId) -> NormalizedRecord {
    let specialty = match raw.field("specialty") {
        s if s.is_empty() => raw.field("practice areas"),
        s => s,
    };
    NormalizedRecord::Provider(ProviderRecord {
        provider_name: raw.first_non_empty(PROVIDER_NAME_KEYS),
        specialty,
        license: raw.first_non_empty(LICENSE_KEYS),
        street_address: raw.first_non_empty(STREET_KEYS),
        city: raw.field("city"),
        state: raw.field("state"),
        zip: raw.field("zip"),
        description: raw.field("description"),
        language: raw.field("language"),
        honors: raw.field("honors"),
        work_experience: raw.field("work experience"),
        associations: raw.field("associations"),
        education: raw.field("education"),
        speaking_engagements: raw.field("speaking engagements"),
        publications: raw.field("publications"),
        website: raw.field("website"),
        phone: raw.field("phone"),
        image_url: raw.first_non_empty(IMAGE_URL_KEYS),
        category_id,
        status: ACTIVE,
        is_premium: false,
    })
}

/// Row mapper selected once per job
#[derive(Clone, Copy)]
pub struct RecordMapper {
    mode: ImportMode,
    category_id: CategoryId,
    map: fn(&RawRecord, CategoryId) -> NormalizedRecord,
}

impl RecordMapper {
    pub fn new(mode: ImportMode, category_id: CategoryId) -> Self {
        let map = match mode {
            ImportMode::Business => map_business,
            ImportMode::Provider => map_provider,
        };
        Self {
            mode,
            category_id,
            map,
        }
    }

    pub fn mode(&self) -> ImportMode {
        self.mode
    }

    pub fn category_id(&self) -> CategoryId {
        self.category_id
    }

    pub fn map(&self, raw: &RawRecord) -> NormalizedRecord {
        (self.map)(raw, self.category_id)
    }
}

impl fmt::Debug for RecordMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordMapper")
            .field("mode", &self.mode)
            .field("category_id", &self.category_id)
            .finish()
    }
}
