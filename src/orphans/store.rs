//! Persistence seams used by orphan linking

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Actor, QuoteRequest};

#[async_trait]
pub trait QuoteRequestStore: Send {
    /// Orphan requests whose requester email equals `email`, ignoring case.
    async fn orphans_for_email(&mut self, email: &str) -> Result<Vec<QuoteRequest>>;

    /// Every orphan request, oldest first.
    async fn all_orphans(&mut self) -> Result<Vec<QuoteRequest>>;

    /// Link the given requests to an account in one update.
    ///
    /// Only requests that are still orphans are touched; their ids are returned.
    async fn link_requests(&mut self, request_ids: &[i64], account_id: i64) -> Result<Vec<i64>>;

    /// Requests linked to `account_id` whose requester email matches `email`.
    async fn count_linked(&mut self, account_id: i64, email: &str) -> Result<i64>;
}

#[async_trait]
pub trait AccountStore: Send {
    /// Oldest account whose email equals `email`, ignoring case.
    async fn account_by_email(&mut self, email: &str) -> Result<Option<Actor>>;

    /// Oldest staff account, used as the actor of batch runs.
    async fn first_staff_account(&mut self) -> Result<Option<Actor>>;
}
