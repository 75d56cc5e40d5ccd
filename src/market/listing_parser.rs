//! Streaming listing correlator
//!
//! A listing render response carries the listings and their assets in two
//! separate top-level branches:
//!
//! ```json
//! {
//!   "success": true,
//!   "total_count": 152,
//!   "listinginfo": { "<listing id>": { "converted_fee": 15, "asset": { "id": "...", ... } } },
//!   "assets": { "<app>": { "<context>": { "<asset id>": { "market_hash_name": "..." } } } },
//!   "results_html": "..."
//! }
//! ```
//!
//! The body is read in one forward pass. Fields other than `listinginfo`,
//! `assets` and `total_count` are skipped structurally, and reading stops as
//! soon as both branches have been seen, so large trailing fields such as
//! `results_html` are never scanned.

use rust_decimal::Decimal;
use serde::de::{self, DeserializeSeed, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::marker::PhantomData;
use tracing::{debug, error};

use crate::Listing;

/// Listings correlated from one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// Listings with a positive fee and a known asset, in server order
    pub listings: Vec<Listing>,
    /// Total listings for the item, when the page carried it before the early stop
    pub total_count: Option<u64>,
    /// Whether the body could not be parsed
    pub malformed: bool,
}

impl ListingPage {
    /// Empty page standing in for an unparseable body
    pub fn malformed() -> Self {
        Self {
            malformed: true,
            ..Self::default()
        }
    }

    /// Number of listings on the page
    pub fn len(&self) -> usize {
        self.listings.len()
    }

    /// Whether the page has no listings
    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }
}

/// Parse and correlate a listing page, logging parse faults.
///
/// Never fails: a body that cannot be parsed yields [`ListingPage::malformed`].
pub fn parse_listings<R: Read>(reader: R) -> ListingPage {
    match try_parse_listings(reader) {
        Ok(page) => page,
        Err(e) => {
            error!(error = %e, "Failed to parse listing page");
            ListingPage::malformed()
        }
    }
}

/// Parse and correlate a listing page.
///
/// # Errors
/// Returns the JSON error when the body is not a listing document.
pub fn try_parse_listings<R: Read>(reader: R) -> Result<ListingPage, serde_json::Error> {
    let mut state = PageState::default();
    let mut deserializer = serde_json::Deserializer::from_reader(reader);

    match PageSeed(&mut state).deserialize(&mut deserializer) {
        Ok(()) => {}
        // Stopping early leaves the object unterminated from the deserializer's view
        Err(_) if state.is_complete() => {}
        Err(e) => return Err(e),
    }

    Ok(state.correlate())
}

/// Values collected during the pass.
#[derive(Default)]
struct PageState {
    listings: Option<Vec<(String, RawListing)>>,
    assets: Option<HashMap<String, RawAsset>>,
    total_count: Option<u64>,
}

impl PageState {
    fn is_complete(&self) -> bool {
        self.listings.is_some() && self.assets.is_some()
    }

    fn correlate(self) -> ListingPage {
        let assets = self.assets.unwrap_or_default();
        let raw_listings = self.listings.unwrap_or_default();
        let mut listings = Vec::with_capacity(raw_listings.len());

        for (key, mut raw) in raw_listings {
            if raw.listingid.is_empty() {
                raw.listingid = key;
            }
            let Some(asset_ref) = raw.asset else {
                debug!(listing_id = %raw.listingid, "Listing without asset reference");
                continue;
            };
            if asset_ref.id.is_empty() {
                debug!(listing_id = %raw.listingid, "Listing asset without id");
                continue;
            }
            let Some(asset) = assets.get(&asset_ref.id) else {
                debug!(listing_id = %raw.listingid, asset_id = %asset_ref.id, "Asset not found");
                continue;
            };
            if raw.converted_fee == 0 {
                debug!(listing_id = %raw.listingid, "Listing without fee");
                continue;
            }

            listings.push(Listing {
                app_id: asset_ref.appid,
                name: asset.market_hash_name.clone(),
                listing_id: raw.listingid,
                seller_id: raw.steamid_lister,
                subtotal: raw.converted_price,
                fee: raw.converted_fee,
                steam_fee: raw.converted_steam_fee,
                publisher_fee: raw.converted_publisher_fee,
                publisher_app_id: raw.publisher_fee_app,
                publisher_fee_percent: raw.publisher_fee_percent,
            });
        }

        ListingPage {
            listings,
            total_count: self.total_count,
            malformed: false,
        }
    }
}

/// Top-level fields the correlator reads.
#[derive(Deserialize)]
#[serde(field_identifier)]
enum Field {
    #[serde(rename = "listinginfo")]
    ListingInfo,
    #[serde(rename = "assets")]
    Assets,
    #[serde(rename = "total_count")]
    TotalCount,
    #[serde(other)]
    Other,
}

struct PageSeed<'a>(&'a mut PageState);

impl<'de> DeserializeSeed<'de> for PageSeed<'_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for PageSeed<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a listing render object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let state = self.0;
        while let Some(field) = map.next_key::<Field>()? {
            match field {
                Field::ListingInfo => {
                    let listings: FlexMap<RawListing> = map.next_value()?;
                    state.listings = Some(listings.0);
                }
                Field::Assets => {
                    let apps: FlexMap<FlexMap<FlexMap<RawAsset>>> = map.next_value()?;
                    state.assets = Some(index_assets(apps));
                }
                Field::TotalCount => {
                    let total: Flex<u64> = map.next_value()?;
                    state.total_count = Some(total.0);
                }
                Field::Other => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
            if state.is_complete() {
                return Ok(());
            }
        }
        Ok(())
    }
}

/// Flatten app → context → asset into an index keyed by asset id.
fn index_assets(apps: FlexMap<FlexMap<FlexMap<RawAsset>>>) -> HashMap<String, RawAsset> {
    let mut index = HashMap::new();
    for contexts in apps.into_values() {
        for assets in contexts.into_values() {
            for (key, asset) in assets.0 {
                let id = if asset.id.is_empty() { key } else { asset.id.clone() };
                index.insert(id, asset);
            }
        }
    }
    index
}

#[derive(Deserialize)]
struct RawListing {
    #[serde(default, deserialize_with = "flex::string")]
    listingid: String,
    #[serde(default, deserialize_with = "flex::string")]
    steamid_lister: String,
    #[serde(default, deserialize_with = "flex::u64")]
    converted_price: u64,
    #[serde(default, deserialize_with = "flex::u64")]
    converted_fee: u64,
    #[serde(default, deserialize_with = "flex::u64")]
    converted_steam_fee: u64,
    #[serde(default, deserialize_with = "flex::u64")]
    converted_publisher_fee: u64,
    #[serde(default, deserialize_with = "flex::u32")]
    publisher_fee_app: u32,
    #[serde(default, deserialize_with = "flex::decimal")]
    publisher_fee_percent: Decimal,
    #[serde(default)]
    asset: Option<RawListingAsset>,
}

#[derive(Deserialize)]
struct RawListingAsset {
    #[serde(default, deserialize_with = "flex::string")]
    id: String,
    #[serde(default, deserialize_with = "flex::u32")]
    appid: u32,
}

#[derive(Deserialize)]
struct RawAsset {
    #[serde(default, deserialize_with = "flex::string")]
    id: String,
    #[serde(default)]
    market_hash_name: String,
}

/// Object keyed by id, in document order. Steam sends `[]` for an empty one.
struct FlexMap<T>(Vec<(String, T)>);

impl<T> FlexMap<T> {
    fn into_values(self) -> Vec<T> {
        self.0.into_iter().map(|(_, value)| value).collect()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for FlexMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FlexMapVisitor(PhantomData))
    }
}

struct FlexMapVisitor<T>(PhantomData<T>);

impl<'de, T: Deserialize<'de>> Visitor<'de> for FlexMapVisitor<T> {
    type Value = FlexMap<T>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an object or an array")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, value)) = map.next_entry::<String, T>()? {
            entries.push((key, value));
        }
        Ok(FlexMap(entries))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::new();
        while let Some(value) = seq.next_element::<T>()? {
            entries.push((entries.len().to_string(), value));
        }
        Ok(FlexMap(entries))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(FlexMap(Vec::new()))
    }
}

/// Number that may arrive as a JSON number or a string.
struct Flex<T>(T);

impl<'de> Deserialize<'de> for Flex<u64> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        flex::u64(deserializer).map(Flex)
    }
}

/// Lenient scalar decoders.
mod flex {
    use rust_decimal::Decimal;
    use serde::de::{self, Unexpected, Visitor};
    use serde::Deserializer;
    use std::fmt;
    use std::str::FromStr;

    pub fn u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        deserializer.deserialize_any(U64Visitor)
    }

    pub fn u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let value = u64(deserializer)?;
        u32::try_from(value)
            .map_err(|_| de::Error::invalid_value(Unexpected::Unsigned(value), &"a 32-bit id"))
    }

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        deserializer.deserialize_any(StringVisitor)
    }

    pub fn decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
        deserializer.deserialize_any(DecimalVisitor)
    }

    struct U64Visitor;

    impl Visitor<'_> for U64Visitor {
        type Value = u64;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an unsigned integer or a numeric string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
            u64::try_from(v).map_err(|_| E::invalid_value(Unexpected::Signed(v), &self))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<u64, E> {
            if v >= 0.0 && v.fract() == 0.0 && v <= u64::MAX as f64 {
                Ok(v as u64)
            } else {
                Err(E::invalid_value(Unexpected::Float(v), &self))
            }
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                return Ok(0);
            }
            trimmed
                .parse()
                .map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
        }

        fn visit_unit<E: de::Error>(self) -> Result<u64, E> {
            Ok(0)
        }
    }

    struct StringVisitor;

    impl Visitor<'_> for StringVisitor {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string or an integer")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_unit<E: de::Error>(self) -> Result<String, E> {
            Ok(String::new())
        }
    }

    struct DecimalVisitor;

    impl Visitor<'_> for DecimalVisitor {
        type Value = Decimal;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a decimal number or a numeric string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Decimal, E> {
            Ok(Decimal::from(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Decimal, E> {
            Ok(Decimal::from(v))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Decimal, E> {
            Decimal::try_from(v).map_err(|_| E::invalid_value(Unexpected::Float(v), &self))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Decimal, E> {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                return Ok(Decimal::ZERO);
            }
            Decimal::from_str(trimmed)
                .or_else(|_| Decimal::from_scientific(trimmed))
                .map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
        }

        fn visit_unit<E: de::Error>(self) -> Result<Decimal, E> {
            Ok(Decimal::ZERO)
        }
    }
}
