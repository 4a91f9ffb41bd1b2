//! Record and session-event types for the Resealeds monitor.
//!
//! This crate is shared by the view model, the store adapters and the CLI so
//! the record shape cannot drift between them. Stores hand back loosely-typed
//! rows; the decoders here are the only way those rows become
//! [`MonitoredProduct`] values, so malformed data never reaches view state.

use std::fmt;

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Display unit for prices. The store carries no currency column.
pub const PRICE_UNIT: &str = "Lei";
pub const MAX_EVENT_ID_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("record is missing field `{0}`")]
    MissingField(&'static str),

    #[error("record field `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("record {id} arrived after {previous}; reads must be strictly ascending by id")]
    OutOfOrder { previous: ProductId, id: ProductId },

    #[error("payload is not a valid record: {0}")]
    Json(String),
}

impl DecodeError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Products
// ═══════════════════════════════════════════════════════════════════════════════

/// Store-assigned product identifier. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct ProductId(i64);

impl ProductId {
    pub fn new(raw: i64) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for ProductId {
    type Error = DecodeError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        Self::new(raw).ok_or_else(|| DecodeError::invalid("id", format!("{} is not positive", raw)))
    }
}

impl From<ProductId> for i64 {
    fn from(id: ProductId) -> Self {
        id.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredProduct {
    pub id: ProductId,
    pub name: String,
    pub img: String,
    pub price: f64,
}

impl MonitoredProduct {
    /// Route of the product's detail page.
    pub fn detail_path(&self) -> String {
        format!("/product/{}", self.id)
    }

    pub fn display_price(&self) -> String {
        format!("{} {}", self.price, PRICE_UNIT)
    }
}

/// A record as a store returns it, before validation.
///
/// Unknown columns are tolerated since stores commonly return more than the
/// four fields the catalog needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductRow {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub img: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
}

impl TryFrom<ProductRow> for MonitoredProduct {
    type Error = DecodeError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let id = ProductId::try_from(row.id.ok_or(DecodeError::MissingField("id"))?)?;
        let name = require_text(row.name, "name")?;
        let img = require_text(row.img, "img")?;
        let price = require_price(row.price)?;
        Ok(Self {
            id,
            name,
            img,
            price,
        })
    }
}

/// Draft of a product that has not been written yet. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewProduct {
    pub name: String,
    pub img: String,
    pub price: f64,
}

impl NewProduct {
    pub fn validate(&self) -> Result<(), DecodeError> {
        require_text(Some(self.name.clone()), "name")?;
        require_text(Some(self.img.clone()), "img")?;
        require_price(Some(self.price))?;
        Ok(())
    }

    /// Combines the draft with the id the store assigned to it.
    pub fn confirm(self, id: ProductId) -> MonitoredProduct {
        MonitoredProduct {
            id,
            name: self.name,
            img: self.img,
            price: self.price,
        }
    }
}

/// Decodes a full catalog read, enforcing strictly ascending ids.
///
/// Duplicates fail the same check, so a successful decode always satisfies
/// the uniqueness invariant of the local list.
pub fn decode_products<I>(rows: I) -> Result<Vec<MonitoredProduct>, DecodeError>
where
    I: IntoIterator<Item = ProductRow>,
{
    let products = rows
        .into_iter()
        .map(MonitoredProduct::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    ensure_ascending(&products)?;
    Ok(products)
}

/// Checks that ids strictly increase along `products`.
pub fn ensure_ascending(products: &[MonitoredProduct]) -> Result<(), DecodeError> {
    for pair in products.windows(2) {
        if pair[1].id <= pair[0].id {
            return Err(DecodeError::OutOfOrder {
                previous: pair[0].id,
                id: pair[1].id,
            });
        }
    }
    Ok(())
}

pub fn decode_product_json(value: Value) -> Result<MonitoredProduct, DecodeError> {
    let row: ProductRow =
        serde_json::from_value(value).map_err(|err| DecodeError::Json(err.to_string()))?;
    MonitoredProduct::try_from(row)
}

pub fn decode_products_json(value: Value) -> Result<Vec<MonitoredProduct>, DecodeError> {
    let rows: Vec<ProductRow> =
        serde_json::from_value(value).map_err(|err| DecodeError::Json(err.to_string()))?;
    decode_products(rows)
}

fn require_text(value: Option<String>, field: &'static str) -> Result<String, DecodeError> {
    match value {
        Some(candidate) if !candidate.trim().is_empty() => Ok(candidate),
        Some(_) => Err(DecodeError::invalid(field, "must not be blank")),
        None => Err(DecodeError::MissingField(field)),
    }
}

fn require_price(value: Option<f64>) -> Result<f64, DecodeError> {
    match value {
        Some(price) if price.is_finite() && price >= 0.0 => Ok(price),
        Some(price) => Err(DecodeError::invalid(
            "price",
            format!("{} is not a finite non-negative amount", price),
        )),
        None => Err(DecodeError::MissingField("price")),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Session events
// ═══════════════════════════════════════════════════════════════════════════════

/// Opaque authenticated identity as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            None
        } else {
            Some(Self(raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

impl SessionEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionEventKind::SignedIn => "signed_in",
            SessionEventKind::SignedOut => "signed_out",
            SessionEventKind::TokenRefreshed => "token_refreshed",
        }
    }
}

/// A lifecycle event pushed by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub kind: SessionEventKind,
    pub identity: Option<Identity>,
}

impl AuthEvent {
    pub fn signed_in(identity: Identity) -> Self {
        Self {
            kind: SessionEventKind::SignedIn,
            identity: Some(identity),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            kind: SessionEventKind::SignedOut,
            identity: None,
        }
    }

    pub fn token_refreshed(identity: Option<Identity>) -> Self {
        Self {
            kind: SessionEventKind::TokenRefreshed,
            identity,
        }
    }
}

/// Serialized form of an [`AuthEvent`], as it arrives from outside the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthEnvelope {
    pub event_id: String,
    pub recorded_at: String,
    pub kind: SessionEventKind,
    #[serde(default)]
    pub identity: Option<String>,
}

impl AuthEnvelope {
    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.event_id.trim().is_empty() {
            return Err(DecodeError::MissingField("event_id"));
        }
        if self.event_id.len() > MAX_EVENT_ID_LEN {
            return Err(DecodeError::invalid(
                "event_id",
                format!("must be {} characters or fewer", MAX_EVENT_ID_LEN),
            ));
        }

        if DateTime::parse_from_rfc3339(&self.recorded_at).is_err() {
            return Err(DecodeError::invalid("recorded_at", "must be RFC3339"));
        }

        if let Some(identity) = &self.identity {
            if identity.trim().is_empty() {
                return Err(DecodeError::invalid("identity", "must not be blank"));
            }
        }

        if self.kind == SessionEventKind::SignedIn && self.identity.is_none() {
            return Err(DecodeError::MissingField("identity"));
        }

        Ok(())
    }

    pub fn into_event(self) -> Result<AuthEvent, DecodeError> {
        self.validate()?;
        Ok(AuthEvent {
            kind: self.kind,
            identity: self.identity.and_then(Identity::new),
        })
    }
}

pub fn parse_auth_event(value: Value) -> Result<AuthEvent, DecodeError> {
    let envelope: AuthEnvelope =
        serde_json::from_value(value).map_err(|err| DecodeError::Json(err.to_string()))?;
    envelope.into_event()
}
