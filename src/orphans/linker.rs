//! Linking orphan quote requests to accounts.
//!
//! Requests submitted anonymously carry no client. When an account with the same
//! email (case-insensitive, exact) appears, those requests are attached to it and
//! every linkage is audited.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::audit::snapshot::EntityRef;
use crate::audit::store::AuditStore;
use crate::audit::writer::{AuditTrail, LinkOrigin};
use crate::error::Result;
use crate::models::{normalize_email, Actor, QuoteRequest};

use super::store::{AccountStore, QuoteRequestStore};

/// Link method recorded on notifications sent after account creation
const SIGNUP_NOTIFICATION_METHOD: &str = "signal_automatico";
/// Link method recorded on notifications sent by a batch sweep
const SWEEP_NOTIFICATION_METHOD: &str = "comando_com_notificacao";

/// Tells an account that past requests were attached to it.
#[async_trait]
pub trait LinkNotifier: Send + Sync {
    async fn notify_linked(&self, account: &Actor, linked_count: usize) -> Result<()>;
}

/// Outcome of linking for one account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkReport {
    pub total_processed: usize,
    pub total_linked: usize,
    pub request_numbers: Vec<String>,
    pub emails: BTreeSet<String>,
    pub notified: bool,
}

/// Link the orphan requests matching a newly created account.
///
/// Runs inside the caller's unit of work: the batch update comes first, then one
/// linkage entry per request, then the batch summary. A run that finds nothing
/// writes nothing, so re-triggering is safe. Notification failures are logged and
/// never abort the linking.
#[instrument(skip(trail, notifier), fields(account_id = account.id))]
pub async fn link_orphans_for_account<S>(
    trail: &mut AuditTrail<S>,
    account: &Actor,
    notifier: Option<&dyn LinkNotifier>,
) -> Result<LinkReport>
where
    S: AuditStore + QuoteRequestStore,
{
    let email = normalize_email(&account.email);
    if email.is_empty() {
        return Ok(LinkReport::default());
    }

    let orphans = trail.store_mut().orphans_for_email(&email).await?;
    if orphans.is_empty() {
        info!(email = %email, "No orphan requests found");
        return Ok(LinkReport::default());
    }

    let linked = link_and_record(trail, account, &orphans, LinkOrigin::AccountSignup).await?;

    let mut report = LinkReport {
        total_processed: orphans.len(),
        total_linked: linked.len(),
        request_numbers: linked.iter().map(|r| r.number.clone()).collect(),
        emails: linked.iter().map(|r| normalize_email(&r.requester_email)).collect(),
        notified: false,
    };

    if report.total_linked == 0 {
        return Ok(report);
    }

    trail
        .record_orphan_batch(
            Some(account),
            EntityRef::account(account.id),
            report.total_processed,
            report.total_linked,
            &report.emails,
            LinkOrigin::AccountSignup,
        )
        .await?;

    info!(
        count = report.total_linked,
        email = %email,
        "Linked orphan requests to new account"
    );

    if let Some(notifier) = notifier {
        report.notified =
            notify_and_record(trail, notifier, account, report.total_linked, SIGNUP_NOTIFICATION_METHOD)
                .await?;
    }

    Ok(report)
}

/// Options of a sweep over every orphan request
#[derive(Debug, Clone, Default)]
pub struct SweepOptions {
    /// Report what would be linked without writing anything
    pub dry_run: bool,
    /// Restrict the sweep to one requester email
    pub email: Option<String>,
    /// Notify each beneficiary account
    pub notify: bool,
}

/// One request the sweep linked (or would link)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepLink {
    pub request_number: String,
    pub requester_email: String,
    pub account_email: String,
}

/// Outcome of a sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub dry_run: bool,
    pub total_orphans: usize,
    pub links: Vec<SweepLink>,
    /// Orphan emails with no matching account
    pub unmatched_emails: BTreeSet<String>,
    /// Emails of accounts that received requests
    pub beneficiaries: BTreeSet<String>,
    pub emails_processed: BTreeSet<String>,
    pub notifications_sent: usize,
}

impl SweepReport {
    pub fn total_linked(&self) -> usize {
        self.links.len()
    }
}

/// Scan orphan requests and link each one to the account sharing its email.
///
/// Per matched email: one batch update, one detection entry, one linkage entry
/// per request. A single summary entry follows when anything was linked; its
/// actor is the oldest staff account. Dry runs write nothing.
#[instrument(skip(trail, notifier), fields(dry_run = options.dry_run))]
pub async fn sweep_orphans<S>(
    trail: &mut AuditTrail<S>,
    options: &SweepOptions,
    notifier: Option<&dyn LinkNotifier>,
) -> Result<SweepReport>
where
    S: AuditStore + QuoteRequestStore + AccountStore,
{
    let orphans = match options.email.as_deref().map(normalize_email) {
        Some(email) if !email.is_empty() => trail.store_mut().orphans_for_email(&email).await?,
        _ => trail.store_mut().all_orphans().await?,
    };

    let mut report = SweepReport {
        dry_run: options.dry_run,
        total_orphans: orphans.len(),
        ..SweepReport::default()
    };

    if orphans.is_empty() {
        warn!("No orphan requests found");
        return Ok(report);
    }

    let mut by_email: BTreeMap<String, Vec<QuoteRequest>> = BTreeMap::new();
    for request in orphans {
        let email = normalize_email(&request.requester_email);
        if email.is_empty() {
            warn!(request = %request.number, "Orphan request without an email");
            continue;
        }
        by_email.entry(email).or_default().push(request);
    }

    let mut beneficiaries: Vec<Actor> = Vec::new();

    for (email, requests) in &by_email {
        let Some(account) = trail.store_mut().account_by_email(email).await? else {
            warn!(email = %email, count = requests.len(), "No account for orphan requests");
            report.unmatched_emails.insert(email.clone());
            continue;
        };

        let linked: Vec<QuoteRequest> = if options.dry_run {
            requests.clone()
        } else {
            trail
                .record_orphan_detected(&account, email, requests.len())
                .await?;
            link_and_record(trail, &account, requests, LinkOrigin::BatchSweep).await?
        };

        if linked.is_empty() {
            continue;
        }

        report.emails_processed.insert(email.clone());
        report.beneficiaries.insert(account.email.clone());
        report.links.extend(linked.iter().map(|r| SweepLink {
            request_number: r.number.clone(),
            requester_email: r.requester_email.clone(),
            account_email: account.email.clone(),
        }));
        if !beneficiaries.iter().any(|b| b.id == account.id) {
            beneficiaries.push(account);
        }
    }

    if options.dry_run || report.links.is_empty() {
        info!(
            would_link = report.links.len(),
            total = report.total_orphans,
            dry_run = options.dry_run,
            "Orphan sweep finished without writes"
        );
        return Ok(report);
    }

    let staff = trail.store_mut().first_staff_account().await?;
    let subject = match (&staff, beneficiaries.first()) {
        (Some(staff), _) => EntityRef::account(staff.id),
        (None, Some(first)) => EntityRef::account(first.id),
        (None, None) => return Ok(report),
    };
    trail
        .record_orphan_batch(
            staff.as_ref(),
            subject,
            report.total_orphans,
            report.links.len(),
            &report.emails_processed,
            LinkOrigin::BatchSweep,
        )
        .await?;

    info!(
        linked = report.links.len(),
        total = report.total_orphans,
        "Orphan sweep finished"
    );

    if options.notify {
        if let Some(notifier) = notifier {
            for account in &beneficiaries {
                let count = trail.store_mut().count_linked(account.id, &account.email).await?;
                let count = usize::try_from(count).unwrap_or(0);
                if notify_and_record(trail, notifier, account, count, SWEEP_NOTIFICATION_METHOD).await? {
                    report.notifications_sent += 1;
                }
            }
        }
    }

    Ok(report)
}

/// Batch-update `requests` to `account`, then write one linkage entry per request
/// actually linked. Returns the linked requests in their pre-link state.
async fn link_and_record<S>(
    trail: &mut AuditTrail<S>,
    account: &Actor,
    requests: &[QuoteRequest],
    origin: LinkOrigin,
) -> Result<Vec<QuoteRequest>>
where
    S: AuditStore + QuoteRequestStore,
{
    let ids: Vec<i64> = requests.iter().map(|r| r.id).collect();
    let linked_ids = trail.store_mut().link_requests(&ids, account.id).await?;

    let linked: Vec<QuoteRequest> = requests
        .iter()
        .filter(|r| linked_ids.contains(&r.id))
        .cloned()
        .collect();

    for request in &linked {
        trail.record_orphan_linked(account, request, origin, None).await?;
    }

    Ok(linked)
}

/// Send the notification and, only once it went out, audit it.
async fn notify_and_record<S: AuditStore>(
    trail: &mut AuditTrail<S>,
    notifier: &dyn LinkNotifier,
    account: &Actor,
    count: usize,
    method: &str,
) -> Result<bool> {
    match notifier.notify_linked(account, count).await {
        Ok(()) => {
            trail.record_link_notification(account, count, method).await?;
            Ok(true)
        }
        Err(e) => {
            error!(email = %account.email, error = %e, "Failed to notify about linked requests");
            Ok(false)
        }
    }
}
