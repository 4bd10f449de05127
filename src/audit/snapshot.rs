//! Flat, display-safe snapshots of audited entities.
//!
//! Each entity kind declares an allow-list of tracked fields; anything else on
//! the entity never reaches an audit record.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{Deposit, Invoice, LineItem, LineOwner, Project, Quote, QuoteRequest};

/// Bookkeeping keys added to every snapshot
pub const ID_KEY: &str = "_id";
pub const KIND_KEY: &str = "_kind";
pub const CAPTURED_AT_KEY: &str = "_captured_at";

code_enum! {
    /// Kinds of entity an audit entry can point at.
    ///
    /// Codes are the model names registered in the content-type table.
    pub enum EntityKind {
        Project => "projeto",
        QuoteRequest => "solicitacaoorcamento",
        Quote => "orcamento",
        QuoteLineItem => "itemorcamento",
        Deposit => "acompteorcamento",
        Invoice => "facture",
        InvoiceLineItem => "itemfacture",
        Client => "cliente",
        Account => "user",
    }
}

impl EntityKind {
    /// Application label of the content type
    pub fn app_label(&self) -> &'static str {
        match self {
            EntityKind::Account => "auth",
            EntityKind::Client => "clientes",
            _ => "orcamentos",
        }
    }
}

/// Weak reference to the subject of an audit entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: i64,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: i64) -> Self {
        Self { kind, id }
    }

    pub fn account(id: i64) -> Self {
        Self::new(EntityKind::Account, id)
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

const PROJECT_FIELDS: &[&str] = &[
    "title",
    "description",
    "service_type",
    "status",
    "urgency",
    "address",
    "city",
    "area",
    "estimated_budget",
    "desired_start",
];

const QUOTE_REQUEST_FIELDS: &[&str] = &[
    "number",
    "status",
    "client",
    "requester_name",
    "requester_email",
    "requester_phone",
    "service_type",
    "service_description",
    "urgency",
    "max_budget",
];

const QUOTE_FIELDS: &[&str] = &[
    "number",
    "status",
    "title",
    "subtotal",
    "discount",
    "total",
    "execution_days",
    "valid_until",
    "payment_terms",
    "sent_at",
    "responded_at",
];

const LINE_ITEM_FIELDS: &[&str] = &[
    "reference",
    "description",
    "quantity",
    "unit_price_ht",
    "unit_price_ttc",
    "total_ht",
    "total_ttc",
    "tax_rate",
    "discount",
];

const DEPOSIT_FIELDS: &[&str] = &[
    "number",
    "kind",
    "description",
    "percentage",
    "amount_ht",
    "amount_ttc",
    "due_date",
    "status",
    "paid_at",
];

const INVOICE_FIELDS: &[&str] = &[
    "number",
    "status",
    "title",
    "subtotal",
    "discount",
    "total",
    "total_ttc",
    "due_on",
    "paid_on",
];

/// Allow-listed fields of an entity kind; `None` when the kind is not snapshot-able.
pub fn tracked_fields(kind: EntityKind) -> Option<&'static [&'static str]> {
    match kind {
        EntityKind::Project => Some(PROJECT_FIELDS),
        EntityKind::QuoteRequest => Some(QUOTE_REQUEST_FIELDS),
        EntityKind::Quote => Some(QUOTE_FIELDS),
        EntityKind::QuoteLineItem | EntityKind::InvoiceLineItem => Some(LINE_ITEM_FIELDS),
        EntityKind::Deposit => Some(DEPOSIT_FIELDS),
        EntityKind::Invoice => Some(INVOICE_FIELDS),
        EntityKind::Client | EntityKind::Account => None,
    }
}

/// A single field value before conversion to its display string
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Code(&'static str),
    Int(i64),
    Decimal(Decimal),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
}

impl FieldValue {
    /// Display-safe string: ISO-8601 dates, fixed-point decimals, stored codes.
    pub fn to_display(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Text(s) => Some(s.clone()),
            FieldValue::Code(c) => Some((*c).to_string()),
            FieldValue::Int(i) => Some(i.to_string()),
            FieldValue::Decimal(d) => Some(d.to_string()),
            FieldValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            FieldValue::DateTime(dt) => Some(dt.to_rfc3339()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<&String> for FieldValue {
    fn from(value: &String) -> Self {
        FieldValue::Text(value.clone())
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        FieldValue::Decimal(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::DateTime(value)
    }
}

/// Something the audit trail can point at and snapshot.
pub trait Auditable {
    fn entity_ref(&self) -> EntityRef;

    /// Short human label, e.g. `quote OR202512345`
    fn describe(&self) -> String;

    /// Current value of a tracked field; unknown names read as `Null`.
    fn field_value(&self, _name: &str) -> FieldValue {
        FieldValue::Null
    }
}

/// Flat field map captured from an entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(BTreeMap<String, Option<String>>);

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Option<String>) {
        self.0.insert(key.into(), value);
    }

    /// Value of a field; `None` both when absent and when null.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_deref())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Option<String>)> {
        self.0.iter()
    }

    /// Tracked fields only, without bookkeeping keys
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Option<String>)> {
        self.0.iter().filter(|(k, _)| !is_bookkeeping(k))
    }

    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

pub(crate) fn is_bookkeeping(key: &str) -> bool {
    key.starts_with('_')
}

/// Snapshot an entity's tracked fields, stamped with the current time.
pub fn serialize<E: Auditable + ?Sized>(entity: &E) -> Result<Snapshot> {
    serialize_at(entity, Utc::now())
}

/// Snapshot an entity's tracked fields.
///
/// # Errors
/// `UnsupportedEntityKind` when the kind has no allow-list.
pub fn serialize_at<E: Auditable + ?Sized>(entity: &E, captured_at: DateTime<Utc>) -> Result<Snapshot> {
    let entity_ref = entity.entity_ref();
    let fields = tracked_fields(entity_ref.kind)
        .ok_or_else(|| AppError::UnsupportedEntityKind(entity_ref.kind.as_str().to_string()))?;

    let mut snapshot = Snapshot::new();
    for name in fields {
        snapshot.insert(*name, entity.field_value(name).to_display());
    }
    snapshot.insert(ID_KEY, Some(entity_ref.id.to_string()));
    snapshot.insert(KIND_KEY, Some(entity_ref.kind.as_str().to_string()));
    snapshot.insert(CAPTURED_AT_KEY, Some(captured_at.to_rfc3339()));
    Ok(snapshot)
}

impl Auditable for Project {
    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(EntityKind::Project, self.id)
    }

    fn describe(&self) -> String {
        format!("project {}", self.title)
    }

    fn field_value(&self, name: &str) -> FieldValue {
        match name {
            "title" => (&self.title).into(),
            "description" => (&self.description).into(),
            "service_type" => FieldValue::Code(self.service_type.as_str()),
            "status" => FieldValue::Code(self.status.as_str()),
            "urgency" => FieldValue::Code(self.urgency.as_str()),
            "address" => (&self.address).into(),
            "city" => (&self.city).into(),
            "area" => self.area.into(),
            "estimated_budget" => self.estimated_budget.into(),
            "desired_start" => self.desired_start.into(),
            _ => FieldValue::Null,
        }
    }
}

impl Auditable for QuoteRequest {
    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(EntityKind::QuoteRequest, self.id)
    }

    fn describe(&self) -> String {
        format!("quote request {}", self.number)
    }

    fn field_value(&self, name: &str) -> FieldValue {
        match name {
            "number" => (&self.number).into(),
            "status" => FieldValue::Code(self.status.as_str()),
            "client" => self.client_id.into(),
            "requester_name" => (&self.requester_name).into(),
            "requester_email" => (&self.requester_email).into(),
            "requester_phone" => (&self.requester_phone).into(),
            "service_type" => FieldValue::Code(self.service_type.as_str()),
            "service_description" => (&self.service_description).into(),
            "urgency" => FieldValue::Code(self.urgency.as_str()),
            "max_budget" => self.max_budget.into(),
            _ => FieldValue::Null,
        }
    }
}

impl Auditable for Quote {
    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(EntityKind::Quote, self.id)
    }

    fn describe(&self) -> String {
        format!("quote {}", self.number)
    }

    fn field_value(&self, name: &str) -> FieldValue {
        match name {
            "number" => (&self.number).into(),
            "status" => FieldValue::Code(self.status.as_str()),
            "title" => (&self.title).into(),
            "subtotal" => self.subtotal_ht.into(),
            "discount" => self.discount_pct.into(),
            "total" => self.total_ht.into(),
            "execution_days" => FieldValue::Int(i64::from(self.execution_days)),
            "valid_until" => self.valid_until.into(),
            "payment_terms" => FieldValue::Code(self.payment_terms.as_str()),
            "sent_at" => self.sent_at.into(),
            "responded_at" => self.responded_at.into(),
            _ => FieldValue::Null,
        }
    }
}

impl Auditable for LineItem {
    fn entity_ref(&self) -> EntityRef {
        let kind = match self.owner {
            LineOwner::Quote(_) => EntityKind::QuoteLineItem,
            LineOwner::Invoice(_) => EntityKind::InvoiceLineItem,
        };
        EntityRef::new(kind, self.id)
    }

    fn describe(&self) -> String {
        format!("line {}", self.description)
    }

    fn field_value(&self, name: &str) -> FieldValue {
        match name {
            "reference" => (&self.reference).into(),
            "description" => (&self.description).into(),
            "quantity" => self.quantity.into(),
            "unit_price_ht" => self.unit_price_ht.into(),
            "unit_price_ttc" => self.unit_price_ttc.into(),
            "total_ht" => self.total_ht.into(),
            "total_ttc" => self.total_ttc.into(),
            "tax_rate" => FieldValue::Code(self.tax_rate.as_str()),
            "discount" => self.discount_pct.into(),
            _ => FieldValue::Null,
        }
    }
}

impl Auditable for Deposit {
    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(EntityKind::Deposit, self.id)
    }

    fn describe(&self) -> String {
        format!("deposit {} ({}%)", self.number, self.percentage)
    }

    fn field_value(&self, name: &str) -> FieldValue {
        match name {
            "number" => (&self.number).into(),
            "kind" => FieldValue::Code(self.kind.as_str()),
            "description" => (&self.description).into(),
            "percentage" => self.percentage.into(),
            "amount_ht" => self.amount_ht.into(),
            "amount_ttc" => self.amount_ttc.into(),
            "due_date" => self.due_date.into(),
            "status" => FieldValue::Code(self.status.as_str()),
            "paid_at" => self.paid_at.into(),
            _ => FieldValue::Null,
        }
    }
}

impl Auditable for Invoice {
    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(EntityKind::Invoice, self.id)
    }

    fn describe(&self) -> String {
        format!("invoice {}", self.number)
    }

    fn field_value(&self, name: &str) -> FieldValue {
        match name {
            "number" => (&self.number).into(),
            "status" => FieldValue::Code(self.status.as_str()),
            "title" => (&self.title).into(),
            "subtotal" => self.subtotal_ht.into(),
            "discount" => self.discount_pct.into(),
            "total" => self.total_ht.into(),
            "total_ttc" => self.total_ttc.into(),
            "due_on" => self.due_on.into(),
            "paid_on" => self.paid_on.into(),
            _ => FieldValue::Null,
        }
    }
}

impl Auditable for crate::models::Client {
    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(EntityKind::Client, self.id)
    }

    fn describe(&self) -> String {
        format!("client {}", self.name)
    }
}

impl Auditable for crate::models::Actor {
    fn entity_ref(&self) -> EntityRef {
        EntityRef::account(self.id)
    }

    fn describe(&self) -> String {
        format!("account {}", self.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Actor, Client, ServiceType};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn quote() -> Quote {
        let at = Utc.with_ymd_and_hms(2025, 6, 2, 8, 30, 0).unwrap();
        let mut quote = Quote::new(
            12,
            "OR202500012",
            3,
            1,
            "A",
            NaiveDate::from_ymd_opt(2025, 7, 2).unwrap(),
            at,
        );
        quote.notes = "internal only".into();
        quote
    }

    #[test]
    fn test_serialize_only_tracked_fields() {
        let quote = quote();
        let snapshot = serialize(&quote).unwrap();

        let keys: Vec<_> = snapshot.fields().map(|(k, _)| k.as_str()).collect();
        let mut expected = QUOTE_FIELDS.to_vec();
        expected.sort_unstable();
        assert_eq!(keys, expected);
        assert!(!snapshot.contains("notes"));
        assert_eq!(snapshot.get("title"), Some("A"));
        assert_eq!(snapshot.get("discount"), Some("0"));
        assert_eq!(snapshot.get("status"), Some("pendente"));
        assert_eq!(snapshot.get("valid_until"), Some("2025-07-02"));
        assert_eq!(snapshot.get("sent_at"), None);
    }

    #[test]
    fn test_serialize_adds_bookkeeping() {
        let at = Utc.with_ymd_and_hms(2025, 6, 3, 10, 0, 0).unwrap();
        let snapshot = serialize_at(&quote(), at).unwrap();
        assert_eq!(snapshot.get(ID_KEY), Some("12"));
        assert_eq!(snapshot.get(KIND_KEY), Some("orcamento"));
        assert_eq!(snapshot.get(CAPTURED_AT_KEY), Some(at.to_rfc3339().as_str()));
    }

    #[test]
    fn test_serialize_request_client_link() {
        let mut request = QuoteRequest::new(
            "DEV20251111",
            "Jane",
            "jane@example.com",
            ServiceType::Decoration,
            "Salon",
            Utc::now(),
        );
        request.max_budget = Some(dec!(1500.50));
        let before = serialize(&request).unwrap();
        assert_eq!(before.get("client"), None);
        assert!(before.contains("client"));
        assert_eq!(before.get("max_budget"), Some("1500.50"));

        request.client_id = Some(8);
        assert_eq!(serialize(&request).unwrap().get("client"), Some("8"));
    }

    #[test]
    fn test_unsupported_kinds() {
        let client = Client::new(1, "Dupont", "d@example.com");
        assert!(matches!(serialize(&client), Err(AppError::UnsupportedEntityKind(k)) if k == "cliente"));
        let account = Actor::new(2, "Jane", "jane@example.com");
        assert!(matches!(serialize(&account), Err(AppError::UnsupportedEntityKind(_))));
    }

    #[test]
    fn test_serialize_does_not_mutate() {
        let quote = quote();
        let copy = quote.clone();
        let _ = serialize(&quote).unwrap();
        assert_eq!(quote, copy);
    }

    #[test]
    fn test_entity_kind_codes() {
        assert_eq!(EntityKind::QuoteRequest.as_str(), "solicitacaoorcamento");
        assert_eq!(EntityKind::Account.app_label(), "auth");
        assert_eq!(EntityRef::new(EntityKind::Quote, 4).to_string(), "orcamento#4");
    }
}
