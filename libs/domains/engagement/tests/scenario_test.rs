//! End-to-end query scenarios over the in-memory store
//!
//! Exercises the three engines together against one fixture:
//! two messages, one orphan event, two recipients and a second tenant.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use domain_engagement::*;
use std::sync::Arc;
use test_utils::assertions::assert_sorted_desc;

fn t(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
}

async fn fixture() -> EngagementServices<InMemoryEngagementStore> {
    let store = InMemoryEngagementStore::new();

    store
        .insert_messages(vec![
            NewMessage::new("d1", "m1", "Hello", t(1, 9)).with_counters(1, 1),
            NewMessage::new("d1", "m2", "Second", t(2, 9)),
            NewMessage::new("d2", "m1", "Other tenant", t(5, 9)),
        ])
        .await
        .unwrap();

    store
        .insert_events(vec![
            NewEvent::new("d1", "m1", "a@x.com", EventKind::Delivered, t(1, 10)),
            NewEvent::new("d1", "m1", "b@x.com", EventKind::Delivered, t(1, 10)),
            NewEvent::new("d1", "m1", "a@x.com", EventKind::Opened, t(1, 11)),
            NewEvent::new("d1", "m1", "a@x.com", EventKind::Opened, t(1, 12)),
            NewEvent::new("d1", "m1", "b@x.com", EventKind::Opened, t(1, 13)),
            NewEvent::new("d1", "m1", "b@x.com", EventKind::Clicked, t(1, 14)).with_url("u1"),
            NewEvent::new("d1", "m1", "b@x.com", EventKind::Clicked, t(1, 15)).with_url("u2"),
            NewEvent::new("d1", "m2", "a@x.com", EventKind::Delivered, t(2, 10)),
            NewEvent::new("d1", "m2", "b@x.com", EventKind::Bounced, t(2, 10)),
            NewEvent::new("d1", "ghost", "b@x.com", EventKind::Opened, t(3, 8)),
            NewEvent::new("d2", "m1", "a@x.com", EventKind::Opened, t(5, 10)),
        ])
        .await
        .unwrap();

    store
        .insert_recipients(vec![
            NewRecipient::new("d1", "a@x.com", t(2, 10)).with_counters(2, 2, 0),
            NewRecipient::new("d1", "b@x.com", Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
                .with_counters(1, 2, 2),
            NewRecipient::new("d2", "a@x.com", Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()),
        ])
        .await
        .unwrap();

    EngagementServices::new(Arc::new(store), QueryConfig::default())
}

fn feed_params(f: impl FnOnce(&mut FeedParams)) -> FeedParams {
    let mut params = FeedParams::default();
    f(&mut params);
    params
}

#[tokio::test]
async fn test_message_detail_rollup() {
    let services = fixture().await;
    let detail = services.messages.detail("d1", "m1").await.unwrap();

    assert_eq!(detail.message.subject, "Hello");
    assert_eq!(detail.deliveries, 2);
    assert_eq!(detail.opens, 3);
    assert_eq!(detail.unique_opens, 2);
    assert_eq!(detail.clicks, 2);
    assert_eq!(detail.unique_clicks, 1);
    assert_eq!(detail.logs.len(), 7);
    assert_sorted_desc(&detail.logs, |e| e.date, "message logs");
}

#[tokio::test]
async fn test_message_detail_is_tenant_scoped() {
    let services = fixture().await;
    let other = services.messages.detail("d2", "m1").await.unwrap();
    assert_eq!(other.message.subject, "Other tenant");
    assert_eq!(other.opens, 1);

    let err = services.messages.detail("d1", "ghost").await.unwrap_err();
    assert!(matches!(err, EngagementError::NotFound(ref m) if m == "Mail not found"));
}

#[tokio::test]
async fn test_recipient_detail_rollup() {
    let services = fixture().await;
    let detail = services.recipients.detail("d1", "b@x.com").await.unwrap();

    assert_eq!(detail.email, "b@x.com");
    assert_eq!(detail.deliveries, 1);
    // The orphan open on "ghost" has no message and is excluded.
    assert_eq!(detail.opens, 1);
    assert_eq!(detail.unique_opens, 1);
    assert_eq!(detail.clicks, 2);
    // First seen while walking the log newest first.
    assert_eq!(detail.urls, vec!["u2".to_string(), "u1".to_string()]);
    assert_eq!(detail.logs.len(), 5);
    assert!(detail.logs.iter().all(|log| log.event.msg_id != "ghost"));
    assert_eq!(detail.logs[0].subject, "Second");
    assert_sorted_desc(&detail.logs, |log| log.event.date, "recipient logs");
}

#[tokio::test]
async fn test_feed_defaults_and_orphan_subject() {
    let services = fixture().await;
    let page = services.feed.feed("d1", FeedParams::default()).await.unwrap();

    assert_eq!(page.total, 10);
    assert_eq!(page.count, 10);
    assert_eq!((page.offset, page.limit), (0, 20));
    assert_sorted_desc(&page.data, |e| e.event.date, "feed");

    let newest = &page.data[0];
    assert_eq!(newest.event.msg_id, "ghost");
    assert_eq!(newest.subject, "");
    assert!(page.data.iter().all(|e| e.event.domain == "d1"));
    assert!(page.data.iter().filter(|e| e.event.msg_id == "m1").all(|e| e.subject == "Hello"));
}

#[tokio::test]
async fn test_feed_action_filter() {
    let services = fixture().await;

    let clicks = services
        .feed
        .feed("d1", feed_params(|p| p.action = vec!["clicked".into()]))
        .await
        .unwrap();
    assert_eq!(clicks.total, 2);
    assert!(clicks.data.iter().all(|e| e.event.event == EventKind::Clicked));

    let mixed = services
        .feed
        .feed("d1", feed_params(|p| p.action = vec!["opened".into(), "bogus".into()]))
        .await
        .unwrap();
    assert_eq!(mixed.total, 4);

    let invalid = services
        .feed
        .feed("d1", feed_params(|p| p.action = vec!["bogus".into()]))
        .await
        .unwrap();
    let unfiltered = services.feed.feed("d1", FeedParams::default()).await.unwrap();
    assert_eq!(invalid, unfiltered);
}

#[tokio::test]
async fn test_feed_date_range() {
    let services = fixture().await;

    let day_two = services
        .feed
        .feed("d1", feed_params(|p| p.date = Some("2024-03-02 to 2024-03-03".into())))
        .await
        .unwrap();
    assert_eq!(day_two.total, 2);
    assert!(day_two.data.iter().all(|e| e.event.msg_id == "m2"));

    // Same start and end day is a single instant at midnight.
    let same_day = services
        .feed
        .feed("d1", feed_params(|p| p.date = Some("2024-03-02 to 2024-03-02".into())))
        .await
        .unwrap();
    assert_eq!(same_day.total, 0);

    let minutes = services
        .feed
        .feed("d1", feed_params(|p| p.date = Some("2024-03-01 11:00 to 2024-03-01T13:00".into())))
        .await
        .unwrap();
    assert_eq!(minutes.total, 3);

    let window = services
        .feed
        .feed(
            "d1",
            feed_params(|p| p.date = Some("2024-03-01T11:00:00Z to 2024-03-01T13:00:00Z".into())),
        )
        .await
        .unwrap();
    assert_eq!(window.total, 3);

    let malformed = services
        .feed
        .feed("d1", feed_params(|p| p.date = Some("2024-03-02 until 2024-03-03".into())))
        .await
        .unwrap();
    assert_eq!(malformed.total, 10);
}

#[tokio::test]
async fn test_feed_date_only_end_is_midnight() {
    let store = InMemoryEngagementStore::new();
    let evening = Utc.with_ymd_and_hms(2024, 1, 31, 18, 0, 0).unwrap();
    store
        .insert_events(vec![NewEvent::new("d1", "m1", "a@x.com", EventKind::Opened, evening)])
        .await
        .unwrap();
    let services = EngagementServices::new(Arc::new(store), QueryConfig::default());

    let through_31st = services
        .feed
        .feed("d1", feed_params(|p| p.date = Some("2024-01-01 to 2024-01-31".into())))
        .await
        .unwrap();
    assert_eq!(through_31st.total, 0);

    let through_1st = services
        .feed
        .feed("d1", feed_params(|p| p.date = Some("2024-01-01 to 2024-02-01".into())))
        .await
        .unwrap();
    assert_eq!(through_1st.total, 1);
}

#[tokio::test]
async fn test_feed_sort_and_paging() {
    let services = fixture().await;

    let by_email = services
        .feed
        .feed(
            "d1",
            feed_params(|p| {
                p.sort = Some("email".into());
                p.dir = Some("asc".into());
            }),
        )
        .await
        .unwrap();
    let emails: Vec<&str> = by_email.data.iter().map(|e| e.event.email.as_str()).collect();
    let mut sorted = emails.clone();
    sorted.sort();
    assert_eq!(emails, sorted);

    // Unknown sort behaves exactly like the default.
    let unknown = services
        .feed
        .feed("d1", feed_params(|p| p.sort = Some("subject".into())))
        .await
        .unwrap();
    let default = services.feed.feed("d1", FeedParams::default()).await.unwrap();
    assert_eq!(unknown, default);

    let first = services
        .feed
        .feed("d1", feed_params(|p| p.limit = Some("4".into())))
        .await
        .unwrap();
    let rest = services
        .feed
        .feed(
            "d1",
            feed_params(|p| {
                p.limit = Some("100".into());
                p.offset = Some("4".into());
            }),
        )
        .await
        .unwrap();
    assert_eq!(first.count, 4);
    assert_eq!(first.total, 10);
    assert_eq!(rest.count, 6);

    let stitched: Vec<&FeedEntry> = first.data.iter().chain(rest.data.iter()).collect();
    let full: Vec<&FeedEntry> = default.data.iter().collect();
    assert_eq!(stitched, full);
}

#[tokio::test]
async fn test_feed_is_idempotent() {
    let services = fixture().await;
    let params = feed_params(|p| p.action = vec!["opened".into()]);
    let first = services.feed.feed("d1", params.clone()).await.unwrap();
    let second = services.feed.feed("d1", params).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_message_list_sorting() {
    let services = fixture().await;

    let default = services.messages.list("d1", ListParams::default()).await.unwrap();
    assert_eq!(default.total, 2);
    assert_eq!(default.data[0].msg_id, "m2");

    let by_opened = services
        .messages
        .list(
            "d1",
            ListParams {
                sort: Some("opened".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(by_opened.data[0].msg_id, "m1");
}

#[tokio::test]
async fn test_recipient_list_and_cold() {
    let services = fixture().await;
    let now = t(10, 0);

    let all = services.recipients.list("d1", ListParams::default()).await.unwrap();
    assert_eq!(all.total, 2);
    assert_eq!(all.data[0].email, "a@x.com");

    let given = services
        .recipients
        .cold_at(
            "d1",
            ColdParams {
                days: Some("30".into()),
                ..Default::default()
            },
            now,
        )
        .await
        .unwrap();
    assert_eq!(given.days, 30);
    assert_eq!(given.page.total, 1);
    assert_eq!(given.page.data[0].email, "b@x.com");

    // Latest d1 send is 2024-03-02T09:00, so 7 whole days + 30.
    let derived = services
        .recipients
        .cold_at("d1", ColdParams::default(), now)
        .await
        .unwrap();
    assert_eq!(derived.days, 37);
    let cutoff = now - TimeDelta::days(derived.days);
    assert!(derived.page.data.iter().all(|r| r.last_seen <= cutoff));

    let everyone = services
        .recipients
        .cold_at(
            "d1",
            ColdParams {
                days: Some("0".into()),
                ..Default::default()
            },
            now,
        )
        .await
        .unwrap();
    assert_eq!(everyone.page.total, 2);
}

#[tokio::test]
async fn test_blank_arguments_are_rejected() {
    let services = fixture().await;

    assert!(matches!(
        services.feed.feed(" ", FeedParams::default()).await,
        Err(EngagementError::InvalidArgument(_))
    ));
    assert!(matches!(
        services.messages.detail("d1", "").await,
        Err(EngagementError::InvalidArgument(_))
    ));
    assert!(matches!(
        services.recipients.detail("d1", "  ").await,
        Err(EngagementError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn test_empty_domain_is_success() {
    let services = fixture().await;
    let page = services.feed.feed("nobody.test", FeedParams::default()).await.unwrap();
    assert_eq!((page.total, page.count), (0, 0));

    let detail = services.recipients.detail("nobody.test", "a@x.com").await.unwrap();
    assert!(detail.logs.is_empty());
    assert!(detail.urls.is_empty());
    assert_eq!(detail.opens, 0);
}
