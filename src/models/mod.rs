//! Domain entities of the quote/invoice workflow

pub mod actor;
pub mod client;
pub mod deposit;
pub mod invoice;
pub mod line_item;
pub mod numbering;
pub mod project;
pub mod quote;

pub use actor::{normalize_email, Actor, RequestMeta};
pub use client::{Client, ClientTaxRate};
pub use deposit::{Deposit, DepositKind, DepositStatus};
pub use invoice::{Invoice, InvoiceStatus};
pub use line_item::{Activity, LineItem, LineOwner, Unit};
pub use numbering::NumberedDocument;
pub use project::{Project, ProjectStatus};
pub use quote::{PaymentMethod, PaymentTerms, Quote, QuoteRequest, QuoteStatus, ServiceType, Urgency};
