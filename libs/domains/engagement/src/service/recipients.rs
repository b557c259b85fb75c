use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use tracing::instrument;

use observability::QueryMetrics;

use super::{RECIPIENT_COLD, RECIPIENT_DETAIL, RECIPIENT_LIST, observed, validated};
use crate::config::QueryConfig;
use crate::error::EngagementResult;
use crate::filter::RecipientFilter;
use crate::models::{ColdParams, DomainScope, ListParams, Recipient, RecipientDetail, required};
use crate::pagination::{ColdRecipientPage, ListOptions, Page, RecipientSort};
use crate::repository::EngagementStore;
use crate::rollup::RecipientRollup;

/// Added to the days since the latest send when `days` is not given,
/// and used alone when the domain has sent nothing.
pub const COLD_GRACE_DAYS: i64 = 30;

/// Recipient lists, the cold list and per-recipient rollups.
pub struct RecipientService<S: EngagementStore> {
    store: Arc<S>,
    config: QueryConfig,
}

impl<S: EngagementStore> Clone for RecipientService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

/// Non-negative whole days; anything else means "derive".
fn parse_days(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|d| d.trim().parse::<i64>().ok()).filter(|d| *d >= 0)
}

fn cutoff(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    TimeDelta::try_days(days)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

impl<S: EngagementStore> RecipientService<S> {
    pub fn new(store: Arc<S>, config: QueryConfig) -> Self {
        Self { store, config }
    }

    /// Sort allow-list: `last_seen` (default), `email`, `clicked`, `opened`, `delivered`.
    #[instrument(skip(self, params), fields(domain = %domain))]
    pub async fn list(&self, domain: &str, params: ListParams) -> EngagementResult<Page<Recipient>> {
        let domain = validated(RECIPIENT_LIST, DomainScope::parse(domain))?;
        let options = ListOptions::<RecipientSort>::resolve(&params, &self.config);
        let filter = RecipientFilter::new(domain);

        let timer = QueryMetrics::start(RECIPIENT_LIST);
        let result = tokio::try_join!(
            self.store.count_recipients(&filter),
            self.store.list_recipients(&filter, options.sort, options.page),
        )
        .map(|(total, data)| Page::new(total, options.page, data));

        observed(timer, result, |p| p.data.len())
    }

    /// Recipients not seen for `days`, relative to now.
    pub async fn cold(
        &self,
        domain: &str,
        params: ColdParams,
    ) -> EngagementResult<ColdRecipientPage<Recipient>> {
        self.cold_at(domain, params, Utc::now()).await
    }

    /// [`cold`](Self::cold) with an explicit clock.
    #[instrument(skip(self, params), fields(domain = %domain))]
    pub async fn cold_at(
        &self,
        domain: &str,
        params: ColdParams,
        now: DateTime<Utc>,
    ) -> EngagementResult<ColdRecipientPage<Recipient>> {
        let domain = validated(RECIPIENT_COLD, DomainScope::parse(domain))?;
        let options = ListOptions::<RecipientSort>::resolve(&params.list_params(), &self.config);

        let timer = QueryMetrics::start(RECIPIENT_COLD);
        let result: EngagementResult<ColdRecipientPage<Recipient>> = async {
            let days = match parse_days(params.days.as_deref()) {
                Some(days) => days,
                None => self.derive_days(&domain, now).await?,
            };

            let filter = RecipientFilter::new(domain).last_seen_before(cutoff(now, days));
            let (total, data) = tokio::try_join!(
                self.store.count_recipients(&filter),
                self.store.list_recipients(&filter, options.sort, options.page),
            )?;

            Ok(ColdRecipientPage {
                days,
                page: Page::new(total, options.page, data),
            })
        }
        .await;

        observed(timer, result, |p| p.page.data.len())
    }

    async fn derive_days(&self, domain: &DomainScope, now: DateTime<Utc>) -> EngagementResult<i64> {
        let latest = self.store.latest_message_date(domain).await?;
        let days = match latest {
            Some(sent) => now.signed_duration_since(sent).num_days() + COLD_GRACE_DAYS,
            None => COLD_GRACE_DAYS,
        };
        tracing::debug!(days, ?latest, "derived cold window");
        Ok(days)
    }

    /// Counters over the recipient's joined events; `urls` in first-click order.
    #[instrument(skip(self), fields(domain = %domain))]
    pub async fn detail(&self, domain: &str, email: &str) -> EngagementResult<RecipientDetail> {
        let (domain, email) = validated(
            RECIPIENT_DETAIL,
            DomainScope::parse(domain).and_then(|d| Ok((d, required("email", email)?))),
        )?;

        let timer = QueryMetrics::start(RECIPIENT_DETAIL);
        let result = self
            .store
            .find_recipient_events(&domain, &email)
            .await
            .map(|rows| RecipientRollup::build(email, rows));
        observed(timer, result, |d| d.logs.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngagementError;
    use crate::models::{Event, EventKind, Message};
    use crate::repository::MockEngagementStore;
    use chrono::TimeZone;

    fn service(store: MockEngagementStore) -> RecipientService<MockEngagementStore> {
        RecipientService::new(Arc::new(store), QueryConfig::default())
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap()
    }

    fn cold_params(days: Option<&str>) -> ColdParams {
        ColdParams {
            days: days.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_days() {
        assert_eq!(parse_days(Some("45")), Some(45));
        assert_eq!(parse_days(Some(" 0 ")), Some(0));
        assert_eq!(parse_days(Some("-3")), None);
        assert_eq!(parse_days(Some("soon")), None);
        assert_eq!(parse_days(None), None);
    }

    #[test]
    fn test_cutoff_saturates() {
        assert_eq!(cutoff(now(), 10), now() - TimeDelta::days(10));
        assert_eq!(cutoff(now(), i64::MAX), DateTime::<Utc>::MIN_UTC);
    }

    #[tokio::test]
    async fn test_cold_uses_given_days_without_latest_lookup() {
        let mut store = MockEngagementStore::new();
        store.expect_latest_message_date().never();

        let expected_cutoff = now() - TimeDelta::days(45);
        store
            .expect_count_recipients()
            .withf(move |f: &RecipientFilter| f.last_seen_before == Some(expected_cutoff))
            .returning(|_| Ok(2));
        store
            .expect_list_recipients()
            .returning(|_, _, _| Ok(vec![]));

        let page = service(store)
            .cold_at("d1", cold_params(Some("45")), now())
            .await
            .unwrap();
        assert_eq!(page.days, 45);
        assert_eq!(page.page.total, 2);
    }

    #[tokio::test]
    async fn test_cold_derives_days_from_latest_send() {
        let mut store = MockEngagementStore::new();
        store
            .expect_latest_message_date()
            .times(1)
            .returning(|_| Ok(Some(Utc.with_ymd_and_hms(2024, 6, 20, 12, 0, 0).unwrap())));
        store.expect_count_recipients().returning(|_| Ok(0));
        store.expect_list_recipients().returning(|_, _, _| Ok(vec![]));

        let page = service(store)
            .cold_at("d1", cold_params(Some("abc")), now())
            .await
            .unwrap();
        assert_eq!(page.days, 40);
    }

    #[tokio::test]
    async fn test_cold_defaults_to_grace_when_nothing_sent() {
        let mut store = MockEngagementStore::new();
        store.expect_latest_message_date().returning(|_| Ok(None));
        store.expect_count_recipients().returning(|_| Ok(0));
        store.expect_list_recipients().returning(|_, _, _| Ok(vec![]));

        let page = service(store).cold_at("d1", cold_params(None), now()).await.unwrap();
        assert_eq!(page.days, COLD_GRACE_DAYS);
    }

    #[tokio::test]
    async fn test_detail_requires_email() {
        let err = service(MockEngagementStore::new())
            .detail("d1", "")
            .await
            .unwrap_err();
        assert!(matches!(err, EngagementError::InvalidArgument(ref m) if m == "email is required"));
    }

    #[tokio::test]
    async fn test_detail_rolls_up_joined_events() {
        let mut store = MockEngagementStore::new();
        store.expect_find_recipient_events().returning(|_, _| {
            let date = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
            let message = Message {
                id: "mid".into(),
                domain: "d1".into(),
                msg_id: "m1".into(),
                date,
                subject: "Hi".into(),
                tags: None,
                opened: 0,
                clicked: 0,
            };
            let clicked = |url: &str| Event {
                id: url.into(),
                domain: "d1".into(),
                msg_id: "m1".into(),
                email: "a@x.com".into(),
                event: EventKind::Clicked,
                date,
                url: Some(url.into()),
                tags: None,
            };
            Ok(vec![
                (clicked("u1"), message.clone()),
                (clicked("u2"), message.clone()),
                (clicked("u1"), message),
            ])
        });

        let detail = service(store).detail("d1", "a@x.com").await.unwrap();
        assert_eq!(detail.email, "a@x.com");
        assert_eq!(detail.clicks, 3);
        assert_eq!(detail.urls, vec!["u1".to_string(), "u2".to_string()]);
        assert_eq!(detail.logs[0].subject, "Hi");
    }
}
