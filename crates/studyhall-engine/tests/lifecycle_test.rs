//! End-to-end lifecycle tests for the group engine: sweep idempotence and
//! cascade completeness, join idempotence, and subscription consistency,
//! all against an in-memory database.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, Local, Utc};
use uuid::Uuid;

use studyhall_db::models::GroupRow;
use studyhall_db::{Database, format_ts};
use studyhall_engine::expiry::start_of_day;
use studyhall_engine::sweep::{sweep_expired_groups, sweep_expired_groups_before};
use studyhall_engine::views::load_all_groups;
use studyhall_engine::{
    ChangeFeed, MutationGateway, SubscriptionManager, ViewQuery, ViewUpdate,
};
use studyhall_types::api::CreateGroupRequest;

fn make_db() -> Arc<Database> {
    Arc::new(Database::open_in_memory().unwrap())
}

fn add_user(db: &Database, email: &str) -> Uuid {
    let id = Uuid::new_v4();
    db.create_user(&id.to_string(), email, "hash", email.split('@').next().unwrap())
        .unwrap();
    id
}

/// Insert a group directly, bypassing gateway validation — the only way to
/// plant an already-expired group.
fn insert_group_days_from_today(db: &Database, title: &str, days: i64) -> Uuid {
    let id = Uuid::new_v4();
    let today = Local::now().date_naive();
    let scheduled = if days >= 0 {
        today.checked_add_days(Days::new(days as u64)).unwrap()
    } else {
        today.checked_sub_days(Days::new((-days) as u64)).unwrap()
    };

    db.insert_group(&GroupRow {
        id: id.to_string(),
        title: title.to_string(),
        subject: "CS".to_string(),
        description: "prep".to_string(),
        date_string: scheduled.format("%Y-%m-%d").to_string(),
        scheduled_at: format_ts(start_of_day(scheduled)),
        created_at: format_ts(Utc::now()),
        created_by: "creator@example.com".to_string(),
    })
    .unwrap();
    id
}

async fn next_groups(sub: &mut studyhall_engine::ViewSubscription) -> Vec<studyhall_types::models::Group> {
    match tokio::time::timeout(Duration::from_secs(2), sub.recv())
        .await
        .expect("snapshot not delivered in time")
        .expect("subscription ended unexpectedly")
    {
        ViewUpdate::Groups(groups) => groups,
        other => panic!("expected a group snapshot, got {:?}", other),
    }
}

#[tokio::test]
async fn sweep_deletes_expired_groups_and_every_joined_ref() {
    let db = make_db();
    let feed = ChangeFeed::new();
    let gateway = MutationGateway::new(db.clone(), feed.clone());

    let alice = add_user(&db, "alice@example.com");
    let bob = add_user(&db, "bob@example.com");

    let expired = insert_group_days_from_today(&db, "Yesterday's group", -1);
    let live = insert_group_days_from_today(&db, "Today's group", 0);

    gateway.join_group(alice, expired).unwrap();
    gateway.join_group(alice, live).unwrap();
    gateway.join_group(bob, expired).unwrap();

    let outcome = sweep_expired_groups(&db, &feed);
    assert_eq!(outcome.groups_deleted, 1);
    assert_eq!(outcome.refs_deleted, 2);

    // group record gone, live one untouched
    assert!(db.get_group(&expired.to_string()).unwrap().is_none());
    assert!(db.get_group(&live.to_string()).unwrap().is_some());

    // cascade completeness: no ref to the swept group survives, for anyone
    for user in [alice, bob] {
        let refs = db.list_joined_groups(&user.to_string()).unwrap();
        assert!(refs.iter().all(|r| r.id != expired.to_string()));
    }
    assert_eq!(db.list_joined_groups(&alice.to_string()).unwrap().len(), 1);
}

#[tokio::test]
async fn sweep_is_idempotent() {
    let db = make_db();
    let feed = ChangeFeed::new();
    let gateway = MutationGateway::new(db.clone(), feed.clone());

    let alice = add_user(&db, "alice@example.com");
    let expired = insert_group_days_from_today(&db, "Old group", -3);
    gateway.join_group(alice, expired).unwrap();

    let first = sweep_expired_groups(&db, &feed);
    assert_eq!(first.groups_deleted, 1);
    assert_eq!(first.refs_deleted, 1);

    let second = sweep_expired_groups(&db, &feed);
    assert_eq!(second.groups_deleted, 0);
    assert_eq!(second.refs_deleted, 0);
}

#[tokio::test]
async fn sweep_defers_when_user_enumeration_fails() {
    let db = make_db();
    let feed = ChangeFeed::new();
    let gateway = MutationGateway::new(db.clone(), feed.clone());

    let alice = add_user(&db, "alice@example.com");
    let expired = insert_group_days_from_today(&db, "Old group", -1);
    gateway.join_group(alice, expired).unwrap();

    // break user enumeration: the cascade cannot run without it
    db.with_conn_mut(|conn| {
        conn.execute_batch("ALTER TABLE users RENAME TO users_unavailable")?;
        Ok(())
    })
    .unwrap();

    let outcome = sweep_expired_groups(&db, &feed);
    assert_eq!(outcome.groups_deleted, 0);
    assert_eq!(outcome.refs_deleted, 0);

    // the group record survives, so the next cycle re-derives the same
    // expired set instead of leaving the joined ref orphaned forever
    assert!(db.get_group(&expired.to_string()).unwrap().is_some());
    assert_eq!(db.list_joined_groups(&alice.to_string()).unwrap().len(), 1);

    db.with_conn_mut(|conn| {
        conn.execute_batch("ALTER TABLE users_unavailable RENAME TO users")?;
        Ok(())
    })
    .unwrap();

    let retry = sweep_expired_groups(&db, &feed);
    assert_eq!(retry.groups_deleted, 1);
    assert_eq!(retry.refs_deleted, 1);
    assert!(db.list_joined_groups(&alice.to_string()).unwrap().is_empty());
}

#[tokio::test]
async fn feed_error_is_terminal_and_worded_for_the_view() {
    let db = make_db();
    let feed = ChangeFeed::new();
    let manager = SubscriptionManager::new(db.clone(), feed.clone());

    db.with_conn_mut(|conn| {
        conn.execute_batch("DROP TABLE messages")?;
        Ok(())
    })
    .unwrap();

    let mut sub = manager.subscribe(ViewQuery::GroupMessages {
        group_id: Uuid::new_v4(),
    });

    match tokio::time::timeout(Duration::from_secs(2), sub.recv())
        .await
        .expect("failure not delivered in time")
    {
        Some(ViewUpdate::Failed(message)) => {
            assert_eq!(message, "Failed to load messages. Please try again.");
        }
        other => panic!("expected a terminal failure, got {:?}", other),
    }

    // terminal: no retry, the subscription just ends
    let next = tokio::time::timeout(Duration::from_secs(2), sub.recv())
        .await
        .expect("subscription did not end");
    assert!(next.is_none());
}

#[tokio::test]
async fn joining_twice_leaves_one_ref() {
    let db = make_db();
    let feed = ChangeFeed::new();
    let gateway = MutationGateway::new(db.clone(), feed.clone());

    let alice = add_user(&db, "alice@example.com");
    let group = insert_group_days_from_today(&db, "Group", 1);

    gateway.join_group(alice, group).unwrap();
    gateway.join_group(alice, group).unwrap();

    assert_eq!(db.list_joined_groups(&alice.to_string()).unwrap().len(), 1);
}

#[tokio::test]
async fn created_group_reaches_views_and_is_swept_the_next_day() {
    let db = make_db();
    let feed = ChangeFeed::new();
    let gateway = MutationGateway::new(db.clone(), feed.clone());
    let manager = SubscriptionManager::new(db.clone(), feed.clone());

    let alice = add_user(&db, "alice@example.com");

    let mut all_groups = manager.subscribe(ViewQuery::AllGroups);
    let mut joined = manager.subscribe(ViewQuery::JoinedGroups { user_id: alice });

    // both start empty
    assert!(next_groups(&mut all_groups).await.is_empty());
    assert!(next_groups(&mut joined).await.is_empty());

    let today = Local::now().date_naive().format("%Y-%m-%d").to_string();
    let group = gateway
        .create_group(
            "alice@example.com",
            &CreateGroupRequest {
                title: "Algorithms Study".into(),
                subject: "CS".into(),
                description: "Midterm prep".into(),
                date: today,
            },
        )
        .unwrap();

    let snapshot = next_groups(&mut all_groups).await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].title, "Algorithms Study");

    gateway.join_group(alice, group.id).unwrap();
    let snapshot = next_groups(&mut joined).await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, group.id);

    // advance the clock one day: sweep with tomorrow's cutoff
    let tomorrow = Local::now()
        .date_naive()
        .checked_add_days(Days::new(1))
        .unwrap();
    let outcome = sweep_expired_groups_before(&db, &feed, start_of_day(tomorrow));
    assert_eq!(outcome.groups_deleted, 1);
    assert_eq!(outcome.refs_deleted, 1);

    assert!(next_groups(&mut all_groups).await.is_empty());
    assert!(next_groups(&mut joined).await.is_empty());
    assert!(db.get_group(&group.id.to_string()).unwrap().is_none());
}

#[tokio::test]
async fn two_subscribers_to_one_query_see_the_same_filtered_list() {
    let db = make_db();
    let feed = ChangeFeed::new();
    let gateway = MutationGateway::new(db.clone(), feed.clone());
    let manager = SubscriptionManager::new(db.clone(), feed.clone());

    // an expired group the sweep has not reached yet
    insert_group_days_from_today(&db, "Stale group", -2);

    let mut first = manager.subscribe(ViewQuery::AllGroups);
    let mut second = manager.subscribe(ViewQuery::AllGroups);

    // initial snapshots already hide the expired group
    assert!(next_groups(&mut first).await.is_empty());
    assert!(next_groups(&mut second).await.is_empty());

    let today = Local::now().date_naive().format("%Y-%m-%d").to_string();
    gateway
        .create_group(
            "alice@example.com",
            &CreateGroupRequest {
                title: "Fresh group".into(),
                subject: "Math".into(),
                description: "Homework".into(),
                date: today,
            },
        )
        .unwrap();

    let a = next_groups(&mut first).await;
    let b = next_groups(&mut second).await;

    assert_eq!(a.len(), 1);
    assert_eq!(a[0].title, "Fresh group");
    assert_eq!(a.len(), b.len());
    assert_eq!(a[0].id, b[0].id);
}

#[tokio::test]
async fn unparseable_scheduled_timestamp_is_filtered_from_listings() {
    let db = make_db();

    db.insert_group(&GroupRow {
        id: Uuid::new_v4().to_string(),
        title: "Corrupt".into(),
        subject: "CS".into(),
        description: "bad timestamp".into(),
        date_string: "someday".into(),
        scheduled_at: "not-a-timestamp".into(),
        created_at: format_ts(Utc::now()),
        created_by: "creator@example.com".into(),
    })
    .unwrap();
    insert_group_days_from_today(&db, "Valid", 0);

    let groups = load_all_groups(&db).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].title, "Valid");
}

#[tokio::test]
async fn messages_are_ordered_by_send_time_ascending() {
    let db = make_db();
    let feed = ChangeFeed::new();
    let gateway = MutationGateway::new(db.clone(), feed.clone());

    let alice = add_user(&db, "alice@example.com");
    let group = insert_group_days_from_today(&db, "Chat group", 0);

    for body in ["first", "second", "third"] {
        let sent = gateway
            .send_message(group, alice, "alice@example.com", body)
            .unwrap();
        assert!(sent.is_some());
        // keep the store-assigned timestamps strictly apart
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let messages = studyhall_engine::views::load_messages(&db, group).unwrap();
    let bodies: Vec<&str> = messages.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, vec!["first", "second", "third"]);
    assert!(messages.windows(2).all(|w| w[0].sent_at <= w[1].sent_at));
}
